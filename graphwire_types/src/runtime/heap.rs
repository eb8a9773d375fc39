use crate::runtime::{
    AccessErr, Addr, AllocErr, ArrayHeader, ArrayView, ClassId, ClassKind, ClassRegistry,
    FieldValue, MemoryManager, ObjectInspector, Shape, SlotType, PTR_SIZE,
};
use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HeapConfig {
    /// Sum of all live object bodies. An allocation beyond it fails with [`AllocErr::OutOfMemory`].
    pub max_live_bytes: u64,
}
impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            max_live_bytes: 1 << 30,
        }
    }
}

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct HeapStats {
    pub allocations: u64,
    pub links: u64,
    pub back_edge_links: u64,
}

#[derive(Debug)]
struct HeapObject {
    class_id: ClassId,
    body: Vec<u8>,
    pins: u32,
}

/// An arena of managed objects, addressed by index.
///
/// Addresses are never reused, so a stale [`Addr`] always reads as dangling.
#[derive(Debug)]
pub struct Heap {
    registry: Arc<ClassRegistry>,
    /// Slot 0 backs [`Addr::NULL`] and stays empty.
    objects: Vec<Option<HeapObject>>,
    live_bytes: u64,
    config: HeapConfig,
    stats: HeapStats,
}

impl Heap {
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Self::with_config(registry, HeapConfig::default())
    }

    pub fn with_config(registry: Arc<ClassRegistry>, config: HeapConfig) -> Self {
        Self {
            registry,
            objects: vec![None],
            live_bytes: 0,
            config,
            stats: HeapStats::default(),
        }
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    pub fn live_count(&self) -> usize {
        self.objects.iter().flatten().count()
    }

    pub fn pinned_count(&self) -> usize {
        self.objects.iter().flatten().filter(|o| o.pins > 0).count()
    }

    pub fn is_live(&self, addr: Addr) -> bool {
        self.get(addr).is_ok()
    }

    fn get(&self, addr: Addr) -> Result<&HeapObject, AccessErr> {
        match self.objects.get(addr.index()) {
            Some(Some(obj)) => Ok(obj),
            _ => Err(AccessErr::Dangling(addr)),
        }
    }

    fn get_mut(&mut self, addr: Addr) -> Result<&mut HeapObject, AccessErr> {
        match self.objects.get_mut(addr.index()) {
            Some(Some(obj)) => Ok(obj),
            _ => Err(AccessErr::Dangling(addr)),
        }
    }
}

/* Building and reading graphs. */
impl Heap {
    pub fn new_object(&mut self, class_id: ClassId) -> Result<Addr> {
        let size = self.registry.object_layout(class_id)?.size;
        Ok(self.allocate(class_id, size)?)
    }

    pub fn new_static_array(&mut self, class_id: ClassId, length: u32) -> Result<Addr> {
        let elem = match &self.registry.layout(class_id)?.kind {
            ClassKind::StaticArray(elem) => *elem,
            _ => return Err(anyhow!("{class_id} is not a static array class")),
        };
        let byte_len = length
            .checked_mul(elem.size())
            .ok_or(AllocErr::CapacityOverflow(length as usize))?;
        Ok(self.allocate(class_id, byte_len)?)
    }

    /// Allocates the backing `ArrayBuffer` and then the header pointing at it.
    pub fn new_array(&mut self, class_id: ClassId, length: u32) -> Result<Addr> {
        let elem = match &self.registry.layout(class_id)?.kind {
            ClassKind::Array(elem) => *elem,
            _ => return Err(anyhow!("{class_id} is not an array class")),
        };
        let byte_length = length
            .checked_mul(elem.size())
            .ok_or(AllocErr::CapacityOverflow(length as usize))?;
        let buffer = self.allocate(ClassId::ARRAY_BUFFER, byte_length)?;
        let header = self.allocate(class_id, ArrayHeader::SIZE)?;
        let header_body = ArrayHeader {
            buffer,
            data_start: buffer,
            byte_length,
            length,
        };
        self.store(header, 0, &header_body.to_bytes())?;
        self.link(header, buffer, false);
        Ok(header)
    }

    pub fn field(&self, obj: Addr, name: &str) -> Result<FieldValue> {
        let class_id = self.class_id_of(obj)?;
        let field = self.registry.field(class_id, name)?;
        self.read_slot(obj, field.offset, field.ty)
    }

    pub fn set_field(&mut self, obj: Addr, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let class_id = self.class_id_of(obj)?;
        let field = self.registry.field(class_id, name)?;
        let (offset, ty) = (field.offset, field.ty);
        self.write_slot(obj, offset, ty, value.into())
    }

    pub fn array_view(&self, arr: Addr) -> Result<ArrayView> {
        match self.shape_of(arr)? {
            Shape::Array(view) => Ok(view),
            _ => Err(anyhow!("{arr} is not an array")),
        }
    }

    pub fn array_len(&self, arr: Addr) -> Result<u32> {
        Ok(self.array_view(arr)?.length)
    }

    pub fn array_get(&self, arr: Addr, i: u32) -> Result<FieldValue> {
        let view = self.array_view(arr)?;
        if i >= view.length {
            return Err(anyhow!("Index {i} is out of bounds of {arr} (length {})", view.length));
        }
        self.read_slot(view.storage, i * view.elem.size(), view.elem)
    }

    pub fn array_set(&mut self, arr: Addr, i: u32, value: impl Into<FieldValue>) -> Result<()> {
        let view = self.array_view(arr)?;
        if i >= view.length {
            return Err(anyhow!("Index {i} is out of bounds of {arr} (length {})", view.length));
        }
        self.write_slot(view.storage, i * view.elem.size(), view.elem, value.into())
    }

    /// The element storage, as raw bytes.
    pub fn array_bytes(&self, arr: Addr) -> Result<&[u8]> {
        let view = self.array_view(arr)?;
        Ok(self.load(view.storage, 0, view.byte_len())?)
    }

    fn write_slot(&mut self, addr: Addr, offset: u32, ty: SlotType, value: FieldValue) -> Result<()> {
        let bytes = match (ty, value) {
            (SlotType::Num(num_ty), FieldValue::Num(num)) if num.ty() == num_ty => {
                num.to_le_bytes()[..num_ty.size() as usize].to_vec()
            }
            (SlotType::Ref { nullable: true }, FieldValue::Null) => Addr::NULL.to_le_bytes().to_vec(),
            (SlotType::Ref { .. }, FieldValue::Ref(target)) => {
                self.get(target)?;
                target.to_le_bytes().to_vec()
            }
            (ty, value) => return Err(anyhow!("Cannot store {value:?} into a {ty:?} slot")),
        };
        self.store(addr, offset, &bytes)?;
        if let FieldValue::Ref(target) = value {
            self.link(addr, target, false);
        }
        Ok(())
    }
}

/* Reclamation. */
impl Heap {
    /// Frees every object not reachable from `roots` or from a protected object.
    /// Returns the number of objects freed.
    pub fn collect(&mut self, roots: &[Addr]) -> usize {
        let mut marked: HashSet<Addr> = HashSet::new();
        let mut pending: Vec<Addr> = roots.to_vec();
        pending.extend(
            self.objects
                .iter()
                .enumerate()
                .filter_map(|(i, o)| match o {
                    Some(o) if o.pins > 0 => Some(Addr(i as u32)),
                    _ => None,
                }),
        );

        while let Some(addr) = pending.pop() {
            if !self.is_live(addr) || !marked.insert(addr) {
                continue;
            }
            pending.extend(self.outgoing_refs(addr));
        }

        let mut freed = 0;
        for (i, slot) in self.objects.iter_mut().enumerate() {
            if slot.is_some() && !marked.contains(&Addr(i as u32)) {
                if let Some(obj) = slot.take() {
                    self.live_bytes -= obj.body.len() as u64;
                    freed += 1;
                }
            }
        }
        debug!(freed, live = marked.len(), "collect");
        freed
    }

    fn outgoing_refs(&self, addr: Addr) -> Vec<Addr> {
        let Ok(obj) = self.get(addr) else {
            return vec![];
        };
        let read_addr = |body: &[u8], offset: u32| -> Option<Addr> {
            let start = offset as usize;
            let word = body.get(start..start + PTR_SIZE as usize)?;
            let mut buf = [0u8; PTR_SIZE as usize];
            buf.copy_from_slice(word);
            Some(Addr::from_le_bytes(buf)).filter(|a| !a.is_null())
        };
        let ref_elems = |body: &[u8], length: u32| -> Vec<Addr> {
            (0..length)
                .filter_map(|i| read_addr(body, i * PTR_SIZE))
                .collect()
        };

        match self.registry.get(obj.class_id).map(|c| &c.kind) {
            Some(ClassKind::Object(_)) => self
                .registry
                .all_fields(obj.class_id)
                .into_iter()
                .filter(|f| matches!(f.ty, SlotType::Ref { .. }))
                .filter_map(|f| read_addr(&obj.body, f.offset))
                .collect(),
            Some(ClassKind::StaticArray(SlotType::Ref { .. })) => {
                ref_elems(&obj.body, obj.body.len() as u32 / PTR_SIZE)
            }
            Some(ClassKind::Array(elem)) => {
                let mut buf = [0u8; ArrayHeader::SIZE as usize];
                let Some(header_bytes) = obj.body.get(..ArrayHeader::SIZE as usize) else {
                    return vec![];
                };
                buf.copy_from_slice(header_bytes);
                let header = ArrayHeader::from_bytes(&buf);
                let mut refs = vec![header.buffer];
                if let (SlotType::Ref { .. }, Ok(storage)) = (elem, self.get(header.buffer)) {
                    refs.extend(ref_elems(&storage.body, header.length));
                }
                refs
            }
            _ => vec![],
        }
    }
}

impl ObjectInspector for Heap {
    fn class_id_of(&self, addr: Addr) -> Result<ClassId, AccessErr> {
        Ok(self.get(addr)?.class_id)
    }

    fn size_of(&self, addr: Addr) -> Result<u32, AccessErr> {
        Ok(self.get(addr)?.body.len() as u32)
    }

    fn load(&self, addr: Addr, offset: u32, len: u32) -> Result<&[u8], AccessErr> {
        let obj = self.get(addr)?;
        let start = offset as usize;
        let end = start + len as usize;
        obj.body.get(start..end).ok_or(AccessErr::OutOfBounds {
            addr,
            offset,
            len,
            size: obj.body.len() as u32,
        })
    }

    fn registry(&self) -> &ClassRegistry {
        &self.registry
    }
}

impl MemoryManager for Heap {
    fn allocate(&mut self, class_id: ClassId, byte_len: u32) -> Result<Addr, AllocErr> {
        let budget = self.config.max_live_bytes;
        if self.live_bytes + u64::from(byte_len) > budget {
            return Err(AllocErr::OutOfMemory {
                requested: u64::from(byte_len),
                budget,
            });
        }
        let addr = u32::try_from(self.objects.len())
            .map(Addr)
            .map_err(|_| AllocErr::AddressSpaceExhausted)?;

        let mut body = vec![];
        body.try_reserve_exact(byte_len as usize)
            .map_err(|_| AllocErr::CapacityOverflow(byte_len as usize))?;
        body.resize(byte_len as usize, 0);

        self.objects.push(Some(HeapObject {
            class_id,
            body,
            pins: 0,
        }));
        self.live_bytes += u64::from(byte_len);
        self.stats.allocations += 1;
        trace!(%addr, %class_id, byte_len, "allocate");
        Ok(addr)
    }

    fn protect(&mut self, addr: Addr) {
        if let Ok(obj) = self.get_mut(addr) {
            obj.pins += 1;
        }
    }

    fn release(&mut self, addr: Addr) {
        if let Ok(obj) = self.get_mut(addr) {
            obj.pins = obj.pins.saturating_sub(1);
        }
    }

    fn link(&mut self, parent: Addr, child: Addr, is_back_edge: bool) {
        self.stats.links += 1;
        if is_back_edge {
            self.stats.back_edge_links += 1;
        }
        trace!(%parent, %child, is_back_edge, "link");
    }

    fn store(&mut self, addr: Addr, offset: u32, bytes: &[u8]) -> Result<(), AccessErr> {
        let obj = self.get_mut(addr)?;
        let size = obj.body.len() as u32;
        let start = offset as usize;
        let end = start + bytes.len();
        match obj.body.get_mut(start..end) {
            Some(dst) => {
                dst.copy_from_slice(bytes);
                Ok(())
            }
            None => Err(AccessErr::OutOfBounds {
                addr,
                offset,
                len: bytes.len() as u32,
                size,
            }),
        }
    }
}
