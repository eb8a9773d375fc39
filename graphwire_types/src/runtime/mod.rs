//! The managed-memory model that encoded graphs live in.
//!
//! [`ObjectInspector`], [`FieldVisitor`] and [`MemoryManager`] are the seams the codec
//! depends on. [`Heap`] is an arena that implements all of them.

mod addr;
mod contracts;
mod heap;
mod layout;
mod name_hash;
mod num;
mod registry;
mod visitor;

pub use addr::*;
pub use contracts::*;
pub use heap::*;
pub use layout::*;
pub use name_hash::*;
pub use num::*;
pub use registry::*;
pub use visitor::*;
