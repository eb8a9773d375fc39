use crate::{AddressTable, CodecConfig, CodecErr, PinScope};
use graphwire_types::format::{
    ArraySegm, FormatErrKind, RefSegm, Segment, SegmentReader, SegmentTag, ValueSegm,
};
use graphwire_types::runtime::{
    AccessErr, Addr, ArrayHeader, ClassId, ClassKind, MemoryManager, ObjectInspector, SlotType,
};
use tracing::{debug, trace};


/// What the children of a container may write into it.
#[derive(Clone, Copy, Debug)]
enum Slots {
    /// The declared fields of an object class, found by offset.
    Fields(ClassId),
    Elements(SlotType),
    /// A body without declared slots. Only a Data payload may fill it.
    Opaque,
}

/// A container whose children are being read.
#[derive(Clone, Copy, Debug)]
struct Frame {
    /// The object the children's offsets are relative to.
    /// For a growable array this is its `ArrayBuffer`, not the header.
    container: Addr,
    slots: Slots,
}

/// Rebuilds one graph in a single forward pass. Never looks ahead more than one tag.
///
/// Every store is checked against the registered layout of its container,
/// so references only ever come from Reference, Array and Circular segments.
pub struct Decoder<'b, 'm, M: MemoryManager + ObjectInspector> {
    r: SegmentReader<'b>,
    mm: PinScope<'m, M>,
    addrs: AddressTable,
    stack: Vec<Frame>,
    config: CodecConfig,
}

impl<'b, 'm, M: MemoryManager + ObjectInspector> Decoder<'b, 'm, M> {
    pub fn new(buf: &'b [u8], mm: &'m mut M, config: CodecConfig) -> Self {
        Self {
            r: SegmentReader::new(buf),
            mm: PinScope::new(mm),
            addrs: AddressTable::default(),
            stack: vec![],
            config,
        }
    }

    /// Returns the root, which is no longer protected once this returns.
    pub fn run(self) -> Result<Addr, CodecErr> {
        self.run_expecting(None)
    }

    /// Like [`Self::run()`], failing unless the root is of class `expected`.
    pub fn run_expecting(mut self, expected: Option<ClassId>) -> Result<Addr, CodecErr> {
        let root = match self.r.read_segment()? {
            Segment::Reference(segm) => {
                self.check_root_class(expected, segm.class_id)?;
                self.open_reference(Addr::NULL, segm)?
            }
            Segment::Array(segm) => {
                self.check_root_class(expected, segm.class_id)?;
                self.open_array(Addr::NULL, segm)?
            }
            other => return Err(self.r.err(FormatErrKind::InvalidRoot(other.tag())).into()),
        };

        self.read_children()?;
        self.r.read_end()?;

        self.mm.unpin(root);
        debug!(
            %root,
            identities = self.addrs.next_id(),
            bytes = self.r.pos(),
            "decoded"
        );
        Ok(root)
    }

    fn check_root_class(&self, expected: Option<ClassId>, found: u32) -> Result<(), CodecErr> {
        match expected {
            Some(expected) if expected.0 != found => Err(self
                .r
                .err(FormatErrKind::RootClassMismatch {
                    expected: expected.0,
                    found,
                })
                .into()),
            _ => Ok(()),
        }
    }

    /// Dispatches segments until the root's bracket is closed.
    fn read_children(&mut self) -> Result<(), CodecErr> {
        while let Some(&frame) = self.stack.last() {
            match self.r.read_segment()? {
                Segment::Pop => {
                    self.stack.pop();
                    trace!(container = %frame.container, "pop");
                }
                Segment::Value(segm) => {
                    self.check_value_slot(frame.slots, &segm)?;
                    self.store(frame.container, segm.offset, segm.bytes())?;
                }
                Segment::Null(segm) => {
                    self.check_ref_slot(frame.slots, SegmentTag::Null, segm.offset)?;
                    self.store(frame.container, segm.offset, &Addr::NULL.to_le_bytes())?;
                }
                Segment::Circular(segm) => {
                    self.check_ref_slot(frame.slots, SegmentTag::Circular, segm.offset)?;
                    let target = self
                        .addrs
                        .resolve(segm.id)
                        .map_err(|kind| self.r.err(kind))?;
                    self.store(frame.container, segm.offset, &target.to_le_bytes())?;
                    if segm.is_managed {
                        self.mm.link(frame.container, target, true);
                    }
                    trace!(id = segm.id, %target, "back-reference");
                }
                Segment::Reference(segm) => {
                    self.check_ref_slot(frame.slots, SegmentTag::Reference, segm.offset)?;
                    self.open_reference(frame.container, segm)?;
                }
                Segment::Array(segm) => {
                    self.check_ref_slot(frame.slots, SegmentTag::Array, segm.offset)?;
                    self.open_array(frame.container, segm)?;
                }
                Segment::End => {
                    return Err(self.r.err(FormatErrKind::MissingPop(SegmentTag::End)).into());
                }
                other @ Segment::Data(_) => {
                    return Err(self.r.err(FormatErrKind::UnexpectedTag(other.tag())).into());
                }
            }
        }
        Ok(())
    }

    /// A Value may only fill a numeric field of exactly its type.
    fn check_value_slot(&self, slots: Slots, segm: &ValueSegm) -> Result<(), CodecErr> {
        let field_ty = match slots {
            Slots::Fields(class_id) => self
                .mm
                .registry()
                .field_at(class_id, segm.offset)
                .map(|f| f.ty),
            Slots::Elements(_) | Slots::Opaque => {
                return Err(self.r.err(FormatErrKind::UnexpectedTag(SegmentTag::Value)).into());
            }
        };
        match field_ty {
            Some(SlotType::Num(ty))
                if ty.size() == u32::from(segm.size) && ty.is_float() == segm.is_float =>
            {
                Ok(())
            }
            _ => Err(self.slot_mismatch(SegmentTag::Value, segm.offset)),
        }
    }

    /// Null, Circular, Reference and Array may only fill a reference slot.
    /// Null additionally needs the slot to be nullable.
    fn check_ref_slot(&self, slots: Slots, tag: SegmentTag, offset: u32) -> Result<(), CodecErr> {
        let slot_ty = match slots {
            Slots::Fields(class_id) => self.mm.registry().field_at(class_id, offset).map(|f| f.ty),
            Slots::Elements(elem) if offset % elem.size() == 0 => Some(elem),
            Slots::Elements(_) => None,
            Slots::Opaque => {
                return Err(self.r.err(FormatErrKind::UnexpectedTag(tag)).into());
            }
        };
        match slot_ty {
            Some(SlotType::Ref { nullable: false }) if tag == SegmentTag::Null => {
                Err(self.r.err(FormatErrKind::UnexpectedTag(tag)).into())
            }
            Some(SlotType::Ref { .. }) => Ok(()),
            _ => Err(self.slot_mismatch(tag, offset)),
        }
    }

    fn open_reference(&mut self, parent: Addr, segm: RefSegm) -> Result<Addr, CodecErr> {
        self.expect_id(segm.id)?;
        self.check_depth()?;

        let class_id = ClassId(segm.class_id);
        let slots = match self.mm.registry().get(class_id).map(|c| &c.kind) {
            Some(ClassKind::Object(layout)) if layout.size == segm.byte_len => {
                Slots::Fields(class_id)
            }
            Some(ClassKind::ArrayBuffer) | None => Slots::Opaque,
            Some(_) => return Err(self.class_mismatch(segm.class_id)),
        };

        if let Slots::Opaque = slots {
            if self.r.peek_tag() == Ok(SegmentTag::Data) {
                let data = self.r.read_data()?;
                self.check_data_len(data.bytes, segm.byte_len)?;

                let addr = self.mm.alloc_pinned(class_id, segm.byte_len)?;
                self.store(addr, 0, data.bytes)?;
                self.addrs.push(addr);
                trace!(id = segm.id, %addr, class_id = segm.class_id, "reference (opaque)");

                self.attach(parent, segm.offset, addr, segm.is_managed)?;
                self.r.read_pop()?;
                return Ok(addr);
            }
        }

        let addr = self.mm.alloc_pinned(class_id, segm.byte_len)?;
        self.addrs.push(addr);
        trace!(id = segm.id, %addr, class_id = segm.class_id, "reference");

        self.attach(parent, segm.offset, addr, segm.is_managed)?;
        self.stack.push(Frame {
            container: addr,
            slots,
        });
        Ok(addr)
    }

    fn open_array(&mut self, parent: Addr, segm: ArraySegm) -> Result<Addr, CodecErr> {
        let byte_len = segm
            .byte_len()
            .ok_or_else(|| self.r.err(FormatErrKind::LengthOverflow))?;
        self.expect_id(segm.id)?;
        self.check_depth()?;
        let elem = self.array_elem(&segm)?;

        if let SlotType::Num(_) = elem {
            if self.r.peek_tag() == Ok(SegmentTag::Data) {
                let data = self.r.read_data()?;
                self.check_data_len(data.bytes, byte_len)?;

                let (addr, storage) = self.alloc_array(&segm, byte_len)?;
                self.store(storage, 0, data.bytes)?;
                self.addrs.push(addr);
                trace!(id = segm.id, %addr, byte_len, "array (bulk)");

                self.attach(parent, segm.offset, addr, true)?;
                self.r.read_pop()?;
                return Ok(addr);
            }
        }

        let (addr, storage) = self.alloc_array(&segm, byte_len)?;
        self.addrs.push(addr);
        trace!(id = segm.id, %addr, length = segm.length, "array");

        self.attach(parent, segm.offset, addr, true)?;
        self.stack.push(Frame {
            container: storage,
            slots: Slots::Elements(elem),
        });
        Ok(addr)
    }

    /// The element type of the array class, which must agree with the segment's flags.
    fn array_elem(&self, segm: &ArraySegm) -> Result<SlotType, CodecErr> {
        let elem = match self.mm.registry().get(ClassId(segm.class_id)).map(|c| &c.kind) {
            Some(ClassKind::StaticArray(elem)) if segm.is_static => *elem,
            Some(ClassKind::Array(elem)) if !segm.is_static => *elem,
            _ => return Err(self.class_mismatch(segm.class_id)),
        };
        if segm.align != elem.align_log2() || segm.is_elem_nullable != elem.is_nullable() {
            return Err(self.class_mismatch(segm.class_id));
        }
        Ok(elem)
    }

    fn check_data_len(&self, bytes: &[u8], expected: u32) -> Result<(), CodecErr> {
        if bytes.len() as u64 != u64::from(expected) {
            return Err(self
                .r
                .err(FormatErrKind::DataLengthMismatch {
                    expected: u64::from(expected),
                    found: bytes.len() as u64,
                })
                .into());
        }
        Ok(())
    }

    /// Returns the array object and the object holding its elements.
    fn alloc_array(&mut self, segm: &ArraySegm, byte_len: u32) -> Result<(Addr, Addr), CodecErr> {
        let class_id = ClassId(segm.class_id);
        if segm.is_static {
            let addr = self.mm.alloc_pinned(class_id, byte_len)?;
            return Ok((addr, addr));
        }

        let buffer = self.mm.alloc_pinned(ClassId::ARRAY_BUFFER, byte_len)?;
        let header = self.mm.alloc_pinned(class_id, ArrayHeader::SIZE)?;
        let header_body = ArrayHeader {
            buffer,
            data_start: buffer,
            byte_length: byte_len,
            length: segm.length,
        };
        self.store(header, 0, &header_body.to_bytes())?;
        self.mm.link(header, buffer, false);
        self.mm.unpin(buffer);
        Ok((header, buffer))
    }

    /// Wires a new child into its parent. The root has no parent and stays pinned.
    fn attach(
        &mut self,
        parent: Addr,
        offset: u32,
        child: Addr,
        is_managed: bool,
    ) -> Result<(), CodecErr> {
        if parent.is_null() {
            return Ok(());
        }
        self.store(parent, offset, &child.to_le_bytes())?;
        if is_managed {
            self.mm.link(parent, child, false);
        }
        self.mm.unpin(child);
        Ok(())
    }

    fn store(&mut self, addr: Addr, offset: u32, bytes: &[u8]) -> Result<(), CodecErr> {
        self.mm.store(addr, offset, bytes).map_err(|e| match e {
            AccessErr::OutOfBounds { offset, len, .. } => {
                CodecErr::Format(self.r.err(FormatErrKind::SlotOutOfBounds { offset, len }))
            }
            AccessErr::Dangling(_) => CodecErr::invariant(e),
        })
    }

    fn slot_mismatch(&self, tag: SegmentTag, offset: u32) -> CodecErr {
        CodecErr::Format(self.r.err(FormatErrKind::SlotTypeMismatch { tag, offset }))
    }

    fn class_mismatch(&self, class_id: u32) -> CodecErr {
        CodecErr::Format(self.r.err(FormatErrKind::ClassShapeMismatch { class_id }))
    }

    fn expect_id(&self, id: u32) -> Result<(), CodecErr> {
        self.addrs
            .expect_next(id)
            .map_err(|kind| CodecErr::Format(self.r.err(kind)))
    }

    fn check_depth(&self) -> Result<(), CodecErr> {
        if self.stack.len() >= self.config.max_depth {
            return Err(CodecErr::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }
}

/// Rebuilds the graph encoded in `buf`, returning its root.
pub fn decode<M: MemoryManager + ObjectInspector>(buf: &[u8], mm: &mut M) -> Result<Addr, CodecErr> {
    Decoder::new(buf, mm, CodecConfig::default()).run()
}

/// Like [`decode()`], but the root must be an instance of `class_id`.
pub fn decode_expecting<M: MemoryManager + ObjectInspector>(
    buf: &[u8],
    mm: &mut M,
    class_id: ClassId,
) -> Result<Addr, CodecErr> {
    Decoder::new(buf, mm, CodecConfig::default()).run_expecting(Some(class_id))
}
