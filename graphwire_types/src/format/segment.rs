use crate::format::{SegmentTag, SegmentTagInt};
use anyhow::Result;
use derive_more::Deref;
use std::fmt::{self, Display, Formatter};
use std::io::Write;
use std::mem;


pub const TAG_LEN: usize = mem::size_of::<u8>();
const U32_LEN: usize = mem::size_of::<u32>();
const BOOL_LEN: usize = mem::size_of::<u8>();

/// The largest primitive a [`ValueSegm`] may carry.
pub const VALUE_CAPACITY: usize = mem::size_of::<u64>();

#[derive(Deref, Clone, Copy, PartialEq, Eq, Debug)]
pub struct WriteLen(usize);

/// A segment that knows its own serialized form.
pub trait SerSegment {
    fn ser_len(&self) -> usize;
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen>;
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct ValueSegm {
    pub size: u8,
    pub is_float: bool,
    pub offset: u32,
    pub value: [u8; VALUE_CAPACITY],
}
impl ValueSegm {
    pub const LEN: usize = TAG_LEN + 1 + BOOL_LEN + U32_LEN + VALUE_CAPACITY;

    /// The significant bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.value[..self.size as usize]
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct NullSegm {
    pub offset: u32,
}
impl NullSegm {
    pub const LEN: usize = TAG_LEN + U32_LEN;
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct RefSegm {
    pub class_id: u32,
    pub offset: u32,
    pub byte_len: u32,
    pub is_managed: bool,
    pub id: u32,
}
impl RefSegm {
    pub const LEN: usize = TAG_LEN + U32_LEN * 3 + BOOL_LEN + U32_LEN;
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct ArraySegm {
    pub is_static: bool,
    pub offset: u32,
    pub length: u32,
    pub align: u8,
    pub is_elem_nullable: bool,
    pub id: u32,
    pub class_id: u32,
}
impl ArraySegm {
    pub const LEN: usize = TAG_LEN + BOOL_LEN + U32_LEN * 2 + 1 + BOOL_LEN + U32_LEN * 2;

    /// Byte length of the element storage, or `None` on overflow.
    pub fn byte_len(&self) -> Option<u32> {
        let byte_len = u64::from(self.length) << self.align;
        u32::try_from(byte_len).ok()
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct CircularSegm {
    pub offset: u32,
    pub is_managed: bool,
    pub id: u32,
}
impl CircularSegm {
    pub const LEN: usize = TAG_LEN + U32_LEN + BOOL_LEN + U32_LEN;
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct DataSegm<'b> {
    pub bytes: &'b [u8],
}
impl DataSegm<'_> {
    pub const HEADER_LEN: usize = TAG_LEN + U32_LEN;
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct PopSegm;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct EndSegm;

/// One decoded segment, borrowing its Data payload from the stream.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Segment<'b> {
    Null(NullSegm),
    Reference(RefSegm),
    Pop,
    Value(ValueSegm),
    Circular(CircularSegm),
    Array(ArraySegm),
    Data(DataSegm<'b>),
    End,
}
impl Segment<'_> {
    pub fn tag(&self) -> SegmentTag {
        match self {
            Self::Null(_) => SegmentTag::Null,
            Self::Reference(_) => SegmentTag::Reference,
            Self::Pop => SegmentTag::Pop,
            Self::Value(_) => SegmentTag::Value,
            Self::Circular(_) => SegmentTag::Circular,
            Self::Array(_) => SegmentTag::Array,
            Self::Data(_) => SegmentTag::Data,
            Self::End => SegmentTag::End,
        }
    }
}
impl Display for Segment<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(s) => write!(f, "Null @{}", s.offset),
            Self::Reference(s) => write!(
                f,
                "Reference #{} class={} len={} @{}",
                s.id, s.class_id, s.byte_len, s.offset
            ),
            Self::Pop => write!(f, "Pop"),
            Self::Value(s) => write!(f, "Value {:02x?} @{}", s.bytes(), s.offset),
            Self::Circular(s) => write!(f, "Circular #{} @{}", s.id, s.offset),
            Self::Array(s) => write!(
                f,
                "Array #{} class={} length={} align={} @{}",
                s.id, s.class_id, s.length, s.align, s.offset
            ),
            Self::Data(s) => write!(f, "Data {} bytes", s.bytes.len()),
            Self::End => write!(f, "End"),
        }
    }
}

fn put(w: &mut impl Write, buf: &[u8]) -> Result<usize> {
    w.write_all(buf)?;
    Ok(buf.len())
}
fn put_tag(w: &mut impl Write, tag: SegmentTag) -> Result<usize> {
    put(w, &SegmentTagInt::from(tag).to_le_bytes())
}
fn put_bool(w: &mut impl Write, b: bool) -> Result<usize> {
    put(w, &[u8::from(b)])
}

impl SerSegment for ValueSegm {
    fn ser_len(&self) -> usize {
        Self::LEN
    }
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen> {
        let mut w_len = 0;
        w_len += put_tag(w, SegmentTag::Value)?;
        w_len += put(w, &[self.size])?;
        w_len += put_bool(w, self.is_float)?;
        w_len += put(w, &self.offset.to_le_bytes())?;
        w_len += put(w, &self.value)?;
        Ok(WriteLen(w_len))
    }
}

impl SerSegment for NullSegm {
    fn ser_len(&self) -> usize {
        Self::LEN
    }
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen> {
        let mut w_len = 0;
        w_len += put_tag(w, SegmentTag::Null)?;
        w_len += put(w, &self.offset.to_le_bytes())?;
        Ok(WriteLen(w_len))
    }
}

impl SerSegment for RefSegm {
    fn ser_len(&self) -> usize {
        Self::LEN
    }
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen> {
        let mut w_len = 0;
        w_len += put_tag(w, SegmentTag::Reference)?;
        w_len += put(w, &self.class_id.to_le_bytes())?;
        w_len += put(w, &self.offset.to_le_bytes())?;
        w_len += put(w, &self.byte_len.to_le_bytes())?;
        w_len += put_bool(w, self.is_managed)?;
        w_len += put(w, &self.id.to_le_bytes())?;
        Ok(WriteLen(w_len))
    }
}

impl SerSegment for ArraySegm {
    fn ser_len(&self) -> usize {
        Self::LEN
    }
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen> {
        let mut w_len = 0;
        w_len += put_tag(w, SegmentTag::Array)?;
        w_len += put_bool(w, self.is_static)?;
        w_len += put(w, &self.offset.to_le_bytes())?;
        w_len += put(w, &self.length.to_le_bytes())?;
        w_len += put(w, &[self.align])?;
        w_len += put_bool(w, self.is_elem_nullable)?;
        w_len += put(w, &self.id.to_le_bytes())?;
        w_len += put(w, &self.class_id.to_le_bytes())?;
        Ok(WriteLen(w_len))
    }
}

impl SerSegment for CircularSegm {
    fn ser_len(&self) -> usize {
        Self::LEN
    }
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen> {
        let mut w_len = 0;
        w_len += put_tag(w, SegmentTag::Circular)?;
        w_len += put(w, &self.offset.to_le_bytes())?;
        w_len += put_bool(w, self.is_managed)?;
        w_len += put(w, &self.id.to_le_bytes())?;
        Ok(WriteLen(w_len))
    }
}

impl SerSegment for DataSegm<'_> {
    fn ser_len(&self) -> usize {
        Self::HEADER_LEN + self.bytes.len()
    }
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen> {
        let byte_len = u32::try_from(self.bytes.len())?;
        let mut w_len = 0;
        w_len += put_tag(w, SegmentTag::Data)?;
        w_len += put(w, &byte_len.to_le_bytes())?;
        w_len += put(w, self.bytes)?;
        Ok(WriteLen(w_len))
    }
}

impl SerSegment for PopSegm {
    fn ser_len(&self) -> usize {
        TAG_LEN
    }
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen> {
        Ok(WriteLen(put_tag(w, SegmentTag::Pop)?))
    }
}

impl SerSegment for EndSegm {
    fn ser_len(&self) -> usize {
        TAG_LEN
    }
    fn ser(&self, w: &mut impl Write) -> Result<WriteLen> {
        Ok(WriteLen(put_tag(w, SegmentTag::End)?))
    }
}
