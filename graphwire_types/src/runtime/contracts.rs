use crate::runtime::{
    Addr, ArrayHeader, ClassId, ClassKind, ClassRegistry, Num, SlotType, PTR_SIZE,
};
use anyhow::{anyhow, Result};
use derive_more::Display;
use std::error::Error;

/// The content of one field or array slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FieldValue {
    Num(Num),
    Null,
    Ref(Addr),
}
impl From<Num> for FieldValue {
    fn from(num: Num) -> Self {
        Self::Num(num)
    }
}
impl From<Addr> for FieldValue {
    fn from(addr: Addr) -> Self {
        if addr.is_null() {
            Self::Null
        } else {
            Self::Ref(addr)
        }
    }
}
impl FieldValue {
    /// The referenced address; [`Addr::NULL`] for null. `None` for primitives.
    pub fn as_addr(&self) -> Option<Addr> {
        match self {
            Self::Num(_) => None,
            Self::Null => Some(Addr::NULL),
            Self::Ref(addr) => Some(*addr),
        }
    }

    pub fn as_num(&self) -> Option<Num> {
        match self {
            Self::Num(num) => Some(*num),
            _ => None,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Debug, Display)]
pub enum AllocErr {
    #[display(
        fmt = "allocating {} bytes would exceed the budget of {} bytes",
        requested,
        budget
    )]
    OutOfMemory { requested: u64, budget: u64 },
    #[display(fmt = "address space exhausted")]
    AddressSpaceExhausted,
    #[display(fmt = "could not reserve {} more bytes", _0)]
    CapacityOverflow(usize),
}
impl Error for AllocErr {}

#[derive(PartialEq, Eq, Clone, Debug, Display)]
pub enum AccessErr {
    #[display(fmt = "{} is not a live object", _0)]
    Dangling(Addr),
    #[display(
        fmt = "{} bytes at offset {} are outside {} ({} bytes)",
        len,
        offset,
        addr,
        size
    )]
    OutOfBounds {
        addr: Addr,
        offset: u32,
        len: u32,
        size: u32,
    },
}
impl Error for AccessErr {}

/// How the encoder has to treat a live object.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shape {
    /// Fields are enumerated by the class's [`crate::runtime::FieldVisitor`].
    Object(ClassId),
    Array(ArrayView),
    /// No declared fields, e.g. a bare `ArrayBuffer` or an unregistered class. The body is copied as raw bytes.
    Opaque(ClassId),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ArrayView {
    pub class_id: ClassId,
    pub is_static: bool,
    pub elem: SlotType,
    /// The object whose body holds the elements.
    pub storage: Addr,
    pub length: u32,
}
impl ArrayView {
    pub fn byte_len(&self) -> u32 {
        self.length * self.elem.size()
    }
}

/// Read access to live objects.
pub trait ObjectInspector {
    fn class_id_of(&self, addr: Addr) -> Result<ClassId, AccessErr>;
    fn size_of(&self, addr: Addr) -> Result<u32, AccessErr>;
    fn load(&self, addr: Addr, offset: u32, len: u32) -> Result<&[u8], AccessErr>;
    fn registry(&self) -> &ClassRegistry;

    fn read_slot(&self, addr: Addr, offset: u32, ty: SlotType) -> Result<FieldValue> {
        let bytes = self.load(addr, offset, ty.size())?;
        match ty {
            SlotType::Num(num_ty) => Ok(FieldValue::Num(Num::from_le_slice(num_ty, bytes)?)),
            SlotType::Ref { .. } => {
                let mut buf = [0u8; PTR_SIZE as usize];
                buf.copy_from_slice(bytes);
                Ok(FieldValue::from(Addr::from_le_bytes(buf)))
            }
        }
    }

    fn shape_of(&self, addr: Addr) -> Result<Shape> {
        let class_id = self.class_id_of(addr)?;
        let kind = match self.registry().get(class_id) {
            None => return Ok(Shape::Opaque(class_id)),
            Some(class) => &class.kind,
        };
        let shape = match kind {
            ClassKind::Object(_) => Shape::Object(class_id),
            ClassKind::ArrayBuffer => Shape::Opaque(class_id),
            ClassKind::StaticArray(elem) => Shape::Array(ArrayView {
                class_id,
                is_static: true,
                elem: *elem,
                storage: addr,
                length: self.size_of(addr)? / elem.size(),
            }),
            ClassKind::Array(elem) => {
                let mut buf = [0u8; ArrayHeader::SIZE as usize];
                buf.copy_from_slice(self.load(addr, 0, ArrayHeader::SIZE)?);
                let header = ArrayHeader::from_bytes(&buf);
                let storage_size = self.size_of(header.buffer)?;
                if u64::from(header.length) * u64::from(elem.size()) > u64::from(storage_size) {
                    return Err(anyhow!(
                        "Array {} claims {} elements but its buffer holds {} bytes",
                        addr,
                        header.length,
                        storage_size
                    ));
                }
                Shape::Array(ArrayView {
                    class_id,
                    is_static: false,
                    elem: *elem,
                    storage: header.buffer,
                    length: header.length,
                })
            }
        };
        Ok(shape)
    }
}

/// Allocation and linkage, as needed to rebuild a graph.
///
/// Every object handed out by [`MemoryManager::allocate()`] may be reclaimed
/// unless it is protected or reachable from a protected object.
pub trait MemoryManager {
    fn allocate(&mut self, class_id: ClassId, byte_len: u32) -> Result<Addr, AllocErr>;
    fn protect(&mut self, addr: Addr);
    fn release(&mut self, addr: Addr);
    /// Reports that `child` has been stored into `parent`.
    /// `is_back_edge` marks a store of an object that was already reachable.
    fn link(&mut self, parent: Addr, child: Addr, is_back_edge: bool);
    /// Overwrites part of an object body.
    fn store(&mut self, addr: Addr, offset: u32, bytes: &[u8]) -> Result<(), AccessErr>;
}
