use crate::format::FormatErrKind;
use derive_more::{Deref, Display, From};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

#[derive(From, Deref, Clone, Copy, PartialEq, Eq, Debug)]
pub struct SegmentTagInt(u8);
impl From<SegmentTag> for SegmentTagInt {
    fn from(tag: SegmentTag) -> Self {
        Self(tag as u8)
    }
}

/// The discriminants are part of the wire format. Never renumber them.
#[repr(u8)]
#[derive(PartialEq, Eq, Hash, Clone, Copy, FromPrimitive, Debug, Display)]
pub enum SegmentTag {
    Null = 0,
    Reference = 1,
    Pop = 2,
    Value = 3,
    Circular = 4,
    Array = 5,
    Data = 6,
    End = 7,
}
impl TryFrom<SegmentTagInt> for SegmentTag {
    type Error = FormatErrKind;
    fn try_from(int: SegmentTagInt) -> Result<Self, FormatErrKind> {
        SegmentTag::from_u8(int.0).ok_or(FormatErrKind::UnknownTag(int.0))
    }
}
