use crate::runtime::{Addr, ClassId, FieldVisitor, NameHash, NumType, PTR_SIZE};
use std::fmt::{self, Debug, Formatter};
use std::mem;

/// What a field or an array element holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SlotType {
    Num(NumType),
    Ref { nullable: bool },
}

impl SlotType {
    pub fn size(self) -> u32 {
        match self {
            Self::Num(ty) => ty.size(),
            Self::Ref { .. } => PTR_SIZE,
        }
    }

    pub fn align_log2(self) -> u8 {
        self.size().trailing_zeros() as u8
    }

    pub fn is_nullable(self) -> bool {
        matches!(self, Self::Ref { nullable: true })
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FieldLayout {
    pub name: String,
    pub hash: NameHash,
    pub offset: u32,
    pub ty: SlotType,
}

pub struct ObjectLayout {
    pub base: Option<ClassId>,
    /// Own declared fields, in declaration order. Includes overrides of base fields.
    pub fields: Vec<FieldLayout>,
    pub size: u32,
    pub align: u32,
    pub(crate) visitor: Option<Box<dyn FieldVisitor>>,
}
impl Debug for ObjectLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectLayout")
            .field("base", &self.base)
            .field("fields", &self.fields)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("has_custom_visitor", &self.visitor.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub enum ClassKind {
    Object(ObjectLayout),
    /// The object body is the element storage.
    StaticArray(SlotType),
    /// The object body is an [`ArrayHeader`] pointing at an `ArrayBuffer`.
    Array(SlotType),
    ArrayBuffer,
}

#[derive(Debug)]
pub struct ClassLayout {
    pub id: ClassId,
    pub name: String,
    pub kind: ClassKind,
}

impl ClassLayout {
    pub fn object(&self) -> Option<&ObjectLayout> {
        match &self.kind {
            ClassKind::Object(layout) => Some(layout),
            _ => None,
        }
    }
}

/// The body of a growable array object.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ArrayHeader {
    pub buffer: Addr,
    pub data_start: Addr,
    pub byte_length: u32,
    pub length: u32,
}

impl ArrayHeader {
    pub const SIZE: u32 = PTR_SIZE * 2 + (mem::size_of::<u32>() as u32) * 2;

    pub fn to_bytes(&self) -> [u8; Self::SIZE as usize] {
        let mut buf = [0u8; Self::SIZE as usize];
        buf[0..4].copy_from_slice(&self.buffer.to_le_bytes());
        buf[4..8].copy_from_slice(&self.data_start.to_le_bytes());
        buf[8..12].copy_from_slice(&self.byte_length.to_le_bytes());
        buf[12..16].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE as usize]) -> Self {
        let word = |i: usize| [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]];
        Self {
            buffer: Addr::from_le_bytes(word(0)),
            data_start: Addr::from_le_bytes(word(4)),
            byte_length: u32::from_le_bytes(word(8)),
            length: u32::from_le_bytes(word(12)),
        }
    }
}
