use crate::{CodecConfig, CodecErr, IdentityTable};
use graphwire_types::format::{
    ArraySegm, CircularSegm, DataSegm, EndSegm, NullSegm, PopSegm, RefSegm, SerSegment, ValueSegm,
};
use graphwire_types::runtime::{Addr, AllocErr, FieldValue, ObjectInspector, Shape, SlotType};
use tracing::{debug, trace};


/// Depth-first writer of one graph. Single-use: [`Encoder::finish()`] consumes it.
pub struct Encoder<'h, H: ObjectInspector> {
    heap: &'h H,
    w: Vec<u8>,
    ids: IdentityTable,
    /// Currently open brackets.
    depth: usize,
    config: CodecConfig,
}

impl<'h, H: ObjectInspector> Encoder<'h, H> {
    pub fn new(heap: &'h H, config: CodecConfig) -> Result<Self, CodecErr> {
        let mut w = vec![];
        w.try_reserve(config.initial_capacity)
            .map_err(|_| AllocErr::CapacityOverflow(config.initial_capacity))?;
        Ok(Self {
            heap,
            w,
            ids: IdentityTable::default(),
            depth: 0,
            config,
        })
    }

    /// Writes `value` as if it sat at `offset` within the current container.
    pub fn put(&mut self, value: FieldValue, offset: u32) -> Result<(), CodecErr> {
        match value {
            FieldValue::Num(num) => {
                let ty = num.ty();
                self.emit(&ValueSegm {
                    size: ty.size() as u8,
                    is_float: ty.is_float(),
                    offset,
                    value: num.to_le_bytes(),
                })
            }
            FieldValue::Null => self.emit(&NullSegm { offset }),
            FieldValue::Ref(addr) if addr.is_null() => self.emit(&NullSegm { offset }),
            FieldValue::Ref(addr) => self.put_ref(addr, offset),
        }
    }

    fn put_ref(&mut self, addr: Addr, offset: u32) -> Result<(), CodecErr> {
        if let Some(id) = self.ids.get(addr) {
            trace!(id, %addr, "back-reference");
            return self.emit(&CircularSegm {
                offset,
                is_managed: true,
                id,
            });
        }

        let heap = self.heap;
        let shape = heap.shape_of(addr).map_err(CodecErr::invariant)?;

        if self.depth >= self.config.max_depth {
            return Err(CodecErr::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        self.depth += 1;

        let id = self.ids.assign(addr);
        trace!(id, %addr, ?shape, "define");

        match shape {
            Shape::Array(view) => {
                let elem_size = view.elem.size();
                self.emit(&ArraySegm {
                    is_static: view.is_static,
                    offset,
                    length: view.length,
                    align: view.elem.align_log2(),
                    is_elem_nullable: view.elem.is_nullable(),
                    id,
                    class_id: view.class_id.0,
                })?;
                match view.elem {
                    SlotType::Num(_) => {
                        let bytes = heap
                            .load(view.storage, 0, view.byte_len())
                            .map_err(CodecErr::invariant)?;
                        self.emit(&DataSegm { bytes })?;
                    }
                    SlotType::Ref { .. } => {
                        for i in 0..view.length {
                            let elem_offset = i * elem_size;
                            let elem = heap
                                .read_slot(view.storage, elem_offset, view.elem)
                                .map_err(CodecErr::invariant)?;
                            self.put(elem, elem_offset)?;
                        }
                    }
                }
            }
            Shape::Object(class_id) | Shape::Opaque(class_id) => {
                let byte_len = heap.size_of(addr).map_err(CodecErr::invariant)?;
                self.emit(&RefSegm {
                    class_id: class_id.0,
                    offset,
                    byte_len,
                    is_managed: true,
                    id,
                })?;
                match shape {
                    Shape::Object(_) => {
                        let fields = heap
                            .registry()
                            .visit_fields(heap, class_id, addr, &[])
                            .map_err(CodecErr::invariant)?;
                        for (field_offset, value) in fields {
                            self.put(value, field_offset)?;
                        }
                    }
                    _ => {
                        let bytes = heap.load(addr, 0, byte_len).map_err(CodecErr::invariant)?;
                        self.emit(&DataSegm { bytes })?;
                    }
                }
            }
        }

        self.emit(&PopSegm)?;
        self.depth -= 1;
        Ok(())
    }

    fn emit(&mut self, segm: &impl SerSegment) -> Result<(), CodecErr> {
        let len = segm.ser_len();
        self.w
            .try_reserve(len)
            .map_err(|_| AllocErr::CapacityOverflow(len))?;
        segm.ser(&mut self.w).map_err(CodecErr::invariant)?;
        Ok(())
    }

    /// Terminates the stream.
    pub fn finish(mut self) -> Result<Vec<u8>, CodecErr> {
        self.emit(&EndSegm)?;
        debug!(
            bytes = self.w.len(),
            identities = self.ids.len(),
            "encoded"
        );
        Ok(self.w)
    }
}

/// Encodes the graph reachable from `root`.
///
/// A null root encodes fine but is rejected by the decoder, which needs a Reference or Array at the top.
pub fn encode<H: ObjectInspector>(heap: &H, root: Addr) -> Result<Vec<u8>, CodecErr> {
    encode_with(heap, root, CodecConfig::default())
}

pub fn encode_with<H: ObjectInspector>(
    heap: &H,
    root: Addr,
    config: CodecConfig,
) -> Result<Vec<u8>, CodecErr> {
    let mut enc = Encoder::new(heap, config)?;
    enc.put(FieldValue::from(root), 0)?;
    enc.finish()
}
