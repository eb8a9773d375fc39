use crate::format::{
    ArraySegm, CircularSegm, DataSegm, FormatErr, FormatErrKind, NullSegm, RefSegm, Segment,
    SegmentTag, SegmentTagInt, ValueSegm, VALUE_CAPACITY,
};
use std::io::{Cursor, Read};
use std::mem;

/// Forward-only reader over an in-memory segment stream.
///
/// Every read either yields a whole segment or fails; nothing is ever read twice
/// except through [`SegmentReader::peek_tag()`].
pub struct SegmentReader<'b> {
    r: Cursor<&'b [u8]>,
    segm_pos: usize,
    is_poisoned: bool,
}

impl<'b> SegmentReader<'b> {
    pub fn new(buf: &'b [u8]) -> Self {
        Self {
            r: Cursor::new(buf),
            segm_pos: 0,
            is_poisoned: false,
        }
    }

    pub fn pos(&self) -> usize {
        self.r.position() as usize
    }

    /// Position of the first byte of the segment read most recently.
    pub fn segm_pos(&self) -> usize {
        self.segm_pos
    }

    pub fn remaining(&self) -> usize {
        self.r.get_ref().len().saturating_sub(self.pos())
    }

    pub fn err(&self, kind: FormatErrKind) -> FormatErr {
        FormatErr {
            pos: self.segm_pos,
            kind,
        }
    }

    pub fn peek_tag(&self) -> Result<SegmentTag, FormatErr> {
        let pos = self.pos();
        match self.r.get_ref().get(pos) {
            None => Err(FormatErr {
                pos,
                kind: FormatErrKind::Truncated { missing: 1 },
            }),
            Some(int) => SegmentTag::try_from(SegmentTagInt::from(*int))
                .map_err(|kind| FormatErr { pos, kind }),
        }
    }

    pub fn read_segment(&mut self) -> Result<Segment<'b>, FormatErr> {
        self.segm_pos = self.pos();
        let tag = self.read_tag()?;
        let segm = match tag {
            SegmentTag::Null => Segment::Null(self.read_null_body()?),
            SegmentTag::Reference => Segment::Reference(self.read_ref_body()?),
            SegmentTag::Pop => Segment::Pop,
            SegmentTag::Value => Segment::Value(self.read_value_body()?),
            SegmentTag::Circular => Segment::Circular(self.read_circular_body()?),
            SegmentTag::Array => Segment::Array(self.read_array_body()?),
            SegmentTag::Data => Segment::Data(self.read_data_body()?),
            SegmentTag::End => Segment::End,
        };
        Ok(segm)
    }

    pub fn read_data(&mut self) -> Result<DataSegm<'b>, FormatErr> {
        match self.read_segment()? {
            Segment::Data(data) => Ok(data),
            other => Err(self.err(FormatErrKind::UnexpectedTag(other.tag()))),
        }
    }

    pub fn read_pop(&mut self) -> Result<(), FormatErr> {
        self.segm_pos = self.pos();
        match self.read_tag()? {
            SegmentTag::Pop => Ok(()),
            other => Err(self.err(FormatErrKind::MissingPop(other))),
        }
    }

    /// Consumes the terminating End, which must coincide with the end of the buffer.
    pub fn read_end(&mut self) -> Result<(), FormatErr> {
        self.segm_pos = self.pos();
        match self.read_tag()? {
            SegmentTag::End => match self.remaining() {
                0 => Ok(()),
                trailing => Err(self.err(FormatErrKind::TrailingBytes(trailing))),
            },
            other => Err(self.err(FormatErrKind::MissingEnd(other))),
        }
    }

    /* Segment bodies. Each assumes the tag has just been consumed. */

    fn read_value_body(&mut self) -> Result<ValueSegm, FormatErr> {
        let size = self.read_u8()?;
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(self.err(FormatErrKind::InvalidValueSize(size)));
        }
        let is_float = self.read_bool()?;
        let offset = self.read_u32()?;
        let mut value = [0u8; VALUE_CAPACITY];
        self.read_exact(&mut value)?;
        Ok(ValueSegm {
            size,
            is_float,
            offset,
            value,
        })
    }

    fn read_null_body(&mut self) -> Result<NullSegm, FormatErr> {
        let offset = self.read_u32()?;
        Ok(NullSegm { offset })
    }

    fn read_ref_body(&mut self) -> Result<RefSegm, FormatErr> {
        let class_id = self.read_u32()?;
        let offset = self.read_u32()?;
        let byte_len = self.read_u32()?;
        let is_managed = self.read_bool()?;
        let id = self.read_u32()?;
        Ok(RefSegm {
            class_id,
            offset,
            byte_len,
            is_managed,
            id,
        })
    }

    fn read_array_body(&mut self) -> Result<ArraySegm, FormatErr> {
        let is_static = self.read_bool()?;
        let offset = self.read_u32()?;
        let length = self.read_u32()?;
        let align = self.read_u8()?;
        if align > 3 {
            return Err(self.err(FormatErrKind::InvalidAlign(align)));
        }
        let is_elem_nullable = self.read_bool()?;
        let id = self.read_u32()?;
        let class_id = self.read_u32()?;
        Ok(ArraySegm {
            is_static,
            offset,
            length,
            align,
            is_elem_nullable,
            id,
            class_id,
        })
    }

    fn read_circular_body(&mut self) -> Result<CircularSegm, FormatErr> {
        let offset = self.read_u32()?;
        let is_managed = self.read_bool()?;
        let id = self.read_u32()?;
        Ok(CircularSegm {
            offset,
            is_managed,
            id,
        })
    }

    fn read_data_body(&mut self) -> Result<DataSegm<'b>, FormatErr> {
        let byte_len = self.read_u32()? as usize;
        let buf: &'b [u8] = *self.r.get_ref();
        let start = self.pos();
        if self.remaining() < byte_len {
            return Err(self.err(FormatErrKind::Truncated {
                missing: byte_len - self.remaining(),
            }));
        }
        let end = start + byte_len;
        self.r.set_position(end as u64);
        Ok(DataSegm {
            bytes: &buf[start..end],
        })
    }

    /* Fixed-width fields. */

    fn read_tag(&mut self) -> Result<SegmentTag, FormatErr> {
        let int = SegmentTagInt::from(self.read_u8()?);
        SegmentTag::try_from(int).map_err(|kind| self.err(kind))
    }

    fn read_bool(&mut self) -> Result<bool, FormatErr> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(self.err(FormatErrKind::InvalidBool(b))),
        }
    }

    fn read_u8(&mut self) -> Result<u8, FormatErr> {
        let mut buf = [0u8; mem::size_of::<u8>()];
        self.read_exact(&mut buf)?;
        Ok(u8::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32, FormatErr> {
        let mut buf = [0u8; mem::size_of::<u32>()];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FormatErr> {
        let remaining = self.remaining();
        if remaining < buf.len() {
            return Err(self.err(FormatErrKind::Truncated {
                missing: buf.len() - remaining,
            }));
        }
        self.r
            .read_exact(buf)
            .map_err(|_| self.err(FormatErrKind::Truncated { missing: buf.len() }))
    }
}

/// Yields segments until the buffer is exhausted. Stops after the first error.
impl<'b> Iterator for SegmentReader<'b> {
    type Item = Result<Segment<'b>, FormatErr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_poisoned || self.remaining() == 0 {
            return None;
        }
        let res = self.read_segment();
        self.is_poisoned = res.is_err();
        Some(res)
    }
}

/// Splits a whole stream into its segments, for diagnostics.
pub fn dump(buf: &[u8]) -> Result<Vec<Segment<'_>>, FormatErr> {
    SegmentReader::new(buf).collect()
}
