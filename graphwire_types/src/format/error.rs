use crate::format::SegmentTag;
use derive_more::Display;
use std::error::Error;

/// A stream that is not the output of a well-behaved encoder.
#[derive(PartialEq, Eq, Clone, Debug, Display)]
#[display(fmt = "Malformed segment stream at byte {}: {}", pos, kind)]
pub struct FormatErr {
    /// Position of the first byte of the offending segment.
    pub pos: usize,
    pub kind: FormatErrKind,
}
impl Error for FormatErr {}

#[derive(PartialEq, Eq, Clone, Debug, Display)]
pub enum FormatErrKind {
    #[display(fmt = "stream ends {} bytes short", missing)]
    Truncated { missing: usize },
    #[display(fmt = "unknown segment tag {}", _0)]
    UnknownTag(u8),
    #[display(fmt = "{} segment is not allowed here", _0)]
    UnexpectedTag(SegmentTag),
    #[display(fmt = "{} segment cannot be a root", _0)]
    InvalidRoot(SegmentTag),
    #[display(fmt = "expected Pop, found {}", _0)]
    MissingPop(SegmentTag),
    #[display(fmt = "expected End, found {}", _0)]
    MissingEnd(SegmentTag),
    #[display(fmt = "{} bytes follow End", _0)]
    TrailingBytes(usize),
    #[display(fmt = "invalid boolean byte {}", _0)]
    InvalidBool(u8),
    #[display(fmt = "invalid value size {}", _0)]
    InvalidValueSize(u8),
    #[display(fmt = "invalid element alignment {}", _0)]
    InvalidAlign(u8),
    #[display(fmt = "array byte length overflows")]
    LengthOverflow,
    #[display(fmt = "Data carries {} bytes, array needs {}", found, expected)]
    DataLengthMismatch { expected: u64, found: u64 },
    #[display(fmt = "identity id {} is out of sequence, expected {}", found, expected)]
    IdOutOfSequence { expected: u32, found: u32 },
    #[display(fmt = "back-reference to undefined identity id {}", _0)]
    UnresolvedBackRef(u32),
    #[display(fmt = "root class {} does not match expected class {}", found, expected)]
    RootClassMismatch { expected: u32, found: u32 },
    #[display(fmt = "{} bytes at offset {} fall outside the container", len, offset)]
    SlotOutOfBounds { offset: u32, len: u32 },
    #[display(fmt = "{} segment does not fit the slot at offset {}", tag, offset)]
    SlotTypeMismatch { tag: SegmentTag, offset: u32 },
    #[display(fmt = "segment does not match the layout of class {}", class_id)]
    ClassShapeMismatch { class_id: u32 },
}
