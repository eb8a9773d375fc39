use derive_more::Display;
use graphwire_types::format::FormatErr;
use graphwire_types::runtime::AllocErr;
use std::error::Error;

#[derive(Debug, Display)]
pub enum CodecErr {
    /// The input is not the output of a well-behaved encoder.
    #[display(fmt = "{}", _0)]
    Format(FormatErr),
    /// The allocator or the output buffer ran out. Propagated unchanged.
    #[display(fmt = "Allocation failed: {}", _0)]
    Allocation(AllocErr),
    #[display(fmt = "Nesting exceeds the limit of {}", limit)]
    DepthExceeded { limit: usize },
    /// A defect in the codec or in a runtime contract implementation.
    #[display(fmt = "Invariant violated: {:#}", _0)]
    InvariantViolation(anyhow::Error),
}

impl Error for CodecErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format(e) => Some(e),
            Self::Allocation(e) => Some(e),
            Self::DepthExceeded { .. } => None,
            Self::InvariantViolation(e) => Some(&**e),
        }
    }
}

impl From<FormatErr> for CodecErr {
    fn from(e: FormatErr) -> Self {
        Self::Format(e)
    }
}

impl From<AllocErr> for CodecErr {
    fn from(e: AllocErr) -> Self {
        Self::Allocation(e)
    }
}

impl CodecErr {
    pub fn invariant(e: impl Into<anyhow::Error>) -> Self {
        Self::InvariantViolation(e.into())
    }

    pub fn as_format(&self) -> Option<&FormatErr> {
        match self {
            Self::Format(e) => Some(e),
            _ => None,
        }
    }
}
