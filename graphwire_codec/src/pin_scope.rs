use graphwire_types::runtime::{Addr, AllocErr, ClassId, MemoryManager};
use std::ops::{Deref, DerefMut};

/// Keeps the objects allocated through it protected until they are unpinned.
///
/// Whatever is still pinned when the scope is dropped gets released,
/// so a call that fails midway leaves no protected objects behind.
pub struct PinScope<'m, M: MemoryManager> {
    mm: &'m mut M,
    pinned: Vec<Addr>,
}

impl<'m, M: MemoryManager> PinScope<'m, M> {
    pub fn new(mm: &'m mut M) -> Self {
        Self { mm, pinned: vec![] }
    }

    /// Allocates and protects in one step.
    pub fn alloc_pinned(&mut self, class_id: ClassId, byte_len: u32) -> Result<Addr, AllocErr> {
        let addr = self.mm.allocate(class_id, byte_len)?;
        self.mm.protect(addr);
        self.pinned.push(addr);
        Ok(addr)
    }

    /// Releases `addr` if this scope pinned it.
    pub fn unpin(&mut self, addr: Addr) {
        if let Some(i) = self.pinned.iter().rposition(|pinned| *pinned == addr) {
            self.pinned.swap_remove(i);
            self.mm.release(addr);
        }
    }

    pub fn pinned(&self) -> &[Addr] {
        &self.pinned
    }
}

impl<M: MemoryManager> Deref for PinScope<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.mm
    }
}

impl<M: MemoryManager> DerefMut for PinScope<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.mm
    }
}

impl<M: MemoryManager> Drop for PinScope<'_, M> {
    fn drop(&mut self) {
        for addr in self.pinned.drain(..) {
            self.mm.release(addr);
        }
    }
}
