use crate::runtime::{Addr, ClassLayout, FieldValue, NameHash, ObjectInspector, ObjectLayout};
use anyhow::Result;


/// A field's byte offset within its object, and its current content.
pub type FieldEntry = (u32, FieldValue);

/// Enumerates the serializable fields of one class.
///
/// Implementations must not report a field whose name hash is in `skip`,
/// and must pass on to [`VisitCx::visit_base()`] everything they reported or skipped.
pub trait FieldVisitor: Send + Sync {
    fn visit_fields(&self, cx: &VisitCx<'_>, skip: &[NameHash]) -> Result<Vec<FieldEntry>>;
}

/// The object being visited, as seen by its class.
pub struct VisitCx<'a> {
    pub heap: &'a dyn ObjectInspector,
    pub class: &'a ClassLayout,
    pub layout: &'a ObjectLayout,
    pub obj: Addr,
}

impl VisitCx<'_> {
    /// Reads a declared field of this class or of a base.
    pub fn read_field(&self, name: &str) -> Result<FieldEntry> {
        let field = self.heap.registry().field(self.class.id, name)?;
        let value = self.heap.read_slot(self.obj, field.offset, field.ty)?;
        Ok((field.offset, value))
    }

    /// Continues with the base class's visitor, if there is a base.
    pub fn visit_base(&self, skip: &[NameHash]) -> Result<Vec<FieldEntry>> {
        match self.layout.base {
            None => Ok(vec![]),
            Some(base) => self
                .heap
                .registry()
                .visit_fields(self.heap, base, self.obj, skip),
        }
    }
}

/// Reports every declared field, most-derived first. Overridden base fields are reported once.
pub struct LayoutVisitor;

impl FieldVisitor for LayoutVisitor {
    fn visit_fields(&self, cx: &VisitCx<'_>, skip: &[NameHash]) -> Result<Vec<FieldEntry>> {
        let mut entries = vec![];
        let mut skip = skip.to_vec();
        for field in cx.layout.fields.iter() {
            if skip.contains(&field.hash) {
                continue;
            }
            let value = cx.heap.read_slot(cx.obj, field.offset, field.ty)?;
            entries.push((field.offset, value));
            skip.push(field.hash);
        }
        entries.extend(cx.visit_base(&skip)?);
        Ok(entries)
    }
}
