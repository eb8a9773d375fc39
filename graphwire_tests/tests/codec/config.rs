use anyhow::Result;
use graphwire_codec::{CodecConfig, CodecErr, ENV_VAR_INITIAL_CAPACITY, ENV_VAR_MAX_DEPTH};
use graphwire_types::format::{FormatErr, FormatErrKind, SegmentTag};
use graphwire_types::runtime::AllocErr;
use std::env;
use std::error::Error;

#[test]
fn config_from_env() -> Result<()> {
    env::remove_var(ENV_VAR_INITIAL_CAPACITY);
    env::remove_var(ENV_VAR_MAX_DEPTH);
    assert_eq!(CodecConfig::from_env()?, CodecConfig::default());
    assert_eq!(CodecConfig::default().initial_capacity, 1000);
    assert_eq!(CodecConfig::default().max_depth, 1000);

    env::set_var(ENV_VAR_MAX_DEPTH, "12");
    let config = CodecConfig::from_env()?;
    assert_eq!(config.max_depth, 12);
    assert_eq!(config.initial_capacity, 1000);

    env::set_var(ENV_VAR_INITIAL_CAPACITY, " 64 ");
    assert_eq!(CodecConfig::from_env()?.initial_capacity, 64);

    env::set_var(ENV_VAR_MAX_DEPTH, "deep");
    assert!(CodecConfig::from_env().is_err());

    env::remove_var(ENV_VAR_INITIAL_CAPACITY);
    env::remove_var(ENV_VAR_MAX_DEPTH);
    Ok(())
}

#[test]
fn errors_render_and_chain() {
    let format = CodecErr::from(FormatErr {
        pos: 17,
        kind: FormatErrKind::MissingPop(SegmentTag::End),
    });
    assert_eq!(
        format.to_string(),
        "Malformed segment stream at byte 17: expected Pop, found End"
    );
    assert!(format.source().is_some());
    assert!(format.as_format().is_some());

    let alloc = CodecErr::from(AllocErr::AddressSpaceExhausted);
    assert_eq!(alloc.to_string(), "Allocation failed: address space exhausted");
    assert!(alloc.as_format().is_none());

    let depth = CodecErr::DepthExceeded { limit: 3 };
    assert!(depth.source().is_none());

    let wrapped = anyhow::Error::from(depth);
    assert_eq!(wrapped.to_string(), "Nesting exceeds the limit of 3");
}
