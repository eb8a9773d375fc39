use graphwire_types::runtime::*;

/// Delegates to a [`Heap`], remembering the class of every allocation.
/// Reads go straight through, so the decoder sees the same registry.
pub struct Recording<'h> {
    pub heap: &'h mut Heap,
    pub allocations: Vec<ClassId>,
}

impl<'h> Recording<'h> {
    pub fn new(heap: &'h mut Heap) -> Self {
        Self {
            heap,
            allocations: vec![],
        }
    }
}

impl MemoryManager for Recording<'_> {
    fn allocate(&mut self, class_id: ClassId, byte_len: u32) -> Result<Addr, AllocErr> {
        let addr = self.heap.allocate(class_id, byte_len)?;
        self.allocations.push(class_id);
        Ok(addr)
    }

    fn protect(&mut self, addr: Addr) {
        self.heap.protect(addr);
    }

    fn release(&mut self, addr: Addr) {
        self.heap.release(addr);
    }

    fn link(&mut self, parent: Addr, child: Addr, is_back_edge: bool) {
        self.heap.link(parent, child, is_back_edge);
    }

    fn store(&mut self, addr: Addr, offset: u32, bytes: &[u8]) -> Result<(), AccessErr> {
        self.heap.store(addr, offset, bytes)
    }
}

impl ObjectInspector for Recording<'_> {
    fn class_id_of(&self, addr: Addr) -> Result<ClassId, AccessErr> {
        self.heap.class_id_of(addr)
    }

    fn size_of(&self, addr: Addr) -> Result<u32, AccessErr> {
        self.heap.size_of(addr)
    }

    fn load(&self, addr: Addr, offset: u32, len: u32) -> Result<&[u8], AccessErr> {
        self.heap.load(addr, offset, len)
    }

    fn registry(&self) -> &ClassRegistry {
        self.heap.registry()
    }
}
