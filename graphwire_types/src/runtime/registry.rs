use crate::runtime::{
    Addr, ClassId, ClassKind, ClassLayout, FieldEntry, FieldLayout, FieldVisitor, LayoutVisitor,
    NameHash, ObjectInspector, ObjectLayout, SlotType, VisitCx,
};
use anyhow::{anyhow, Result};
use std::cmp;
use std::collections::HashMap;


fn align_up(n: u32, align: u32) -> u32 {
    n.div_ceil(align) * align
}

/// All classes known to one runtime.
///
/// Encoder and decoder must be driven by registries that assign the same [`ClassId`]s,
/// i.e. registries populated by the same sequence of `register_*` calls.
#[derive(Debug)]
pub struct ClassRegistry {
    /// `classes[i].id == ClassId(i + 1)`.
    classes: Vec<ClassLayout>,
    by_name: HashMap<String, ClassId>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            classes: vec![],
            by_name: HashMap::new(),
        };
        reg.push("ArrayBuffer", ClassKind::ArrayBuffer);
        reg
    }

    fn push(&mut self, name: &str, kind: ClassKind) -> ClassId {
        let id = ClassId(self.classes.len() as u32 + 1);
        self.classes.push(ClassLayout {
            id,
            name: name.to_string(),
            kind,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn ensure_new_name(&self, name: &str) -> Result<()> {
        match self.by_name.get(name) {
            Some(id) => Err(anyhow!("Class {name} is already registered as {id}")),
            None => Ok(()),
        }
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassLayout> {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.classes.get(i))
    }

    pub fn layout(&self, id: ClassId) -> Result<&ClassLayout> {
        self.get(id).ok_or(anyhow!("Unknown {id}"))
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn object_layout(&self, id: ClassId) -> Result<&ObjectLayout> {
        let class = self.layout(id)?;
        class
            .object()
            .ok_or(anyhow!("{} is not an object class", class.name))
    }
}

/* Registration. */
impl ClassRegistry {
    pub fn register_object(
        &mut self,
        name: &str,
        base: Option<ClassId>,
        fields: &[(&str, SlotType)],
    ) -> Result<ClassId> {
        let layout = self.build_object_layout(name, base, fields, None)?;
        Ok(self.push(name, ClassKind::Object(layout)))
    }

    /// Like [`Self::register_object()`], with a hand-written visitor in place of [`LayoutVisitor`].
    pub fn register_object_with_visitor(
        &mut self,
        name: &str,
        base: Option<ClassId>,
        fields: &[(&str, SlotType)],
        visitor: impl FieldVisitor + 'static,
    ) -> Result<ClassId> {
        let layout = self.build_object_layout(name, base, fields, Some(Box::new(visitor)))?;
        Ok(self.push(name, ClassKind::Object(layout)))
    }

    pub fn register_static_array(&mut self, name: &str, elem: SlotType) -> Result<ClassId> {
        self.ensure_new_name(name)?;
        Ok(self.push(name, ClassKind::StaticArray(elem)))
    }

    pub fn register_array(&mut self, name: &str, elem: SlotType) -> Result<ClassId> {
        self.ensure_new_name(name)?;
        Ok(self.push(name, ClassKind::Array(elem)))
    }

    /// Base fields keep their offsets. Own fields follow, each aligned to its size,
    /// except that a field named like an inherited one reuses the inherited slot.
    fn build_object_layout(
        &self,
        name: &str,
        base: Option<ClassId>,
        fields: &[(&str, SlotType)],
        visitor: Option<Box<dyn FieldVisitor>>,
    ) -> Result<ObjectLayout> {
        self.ensure_new_name(name)?;

        let (mut size, mut align) = match base {
            None => (0, 1),
            Some(base) => {
                let base_layout = self.object_layout(base)?;
                (base_layout.size, base_layout.align)
            }
        };

        let mut own_fields: Vec<FieldLayout> = Vec::with_capacity(fields.len());
        for (field_name, ty) in fields {
            if own_fields.iter().any(|f| f.name == *field_name) {
                return Err(anyhow!("Field {name}.{field_name} is declared twice"));
            }

            let inherited = match base {
                None => None,
                Some(base) => self.find_field(base, field_name),
            };
            let offset = match inherited {
                Some(inherited) if inherited.ty != *ty => {
                    return Err(anyhow!(
                        "Field {name}.{field_name} overrides an inherited {:?} with {:?}",
                        inherited.ty,
                        ty
                    ));
                }
                Some(inherited) => inherited.offset,
                None => {
                    let field_size = ty.size();
                    let offset = align_up(size, field_size);
                    size = offset + field_size;
                    align = cmp::max(align, field_size);
                    offset
                }
            };

            own_fields.push(FieldLayout {
                name: field_name.to_string(),
                hash: NameHash::of(field_name),
                offset,
                ty: *ty,
            });
        }

        Ok(ObjectLayout {
            base,
            fields: own_fields,
            size: align_up(size, align),
            align,
            visitor,
        })
    }
}

/* Field lookup. */
impl ClassRegistry {
    /// Looks in the class, then up its base chain.
    pub fn find_field(&self, id: ClassId, name: &str) -> Option<&FieldLayout> {
        let mut class = Some(id);
        while let Some(id) = class {
            let layout = self.object_layout(id).ok()?;
            if let Some(field) = layout.fields.iter().find(|f| f.name == name) {
                return Some(field);
            }
            class = layout.base;
        }
        None
    }

    pub fn field(&self, id: ClassId, name: &str) -> Result<&FieldLayout> {
        self.find_field(id, name)
            .ok_or(anyhow!("{id} has no field named {name}"))
    }

    /// The field starting exactly at `offset`, in the class or up its base chain.
    pub fn field_at(&self, id: ClassId, offset: u32) -> Option<&FieldLayout> {
        let mut class = Some(id);
        while let Some(id) = class {
            let layout = self.object_layout(id).ok()?;
            if let Some(field) = layout.fields.iter().find(|f| f.offset == offset) {
                return Some(field);
            }
            class = layout.base;
        }
        None
    }

    /// Every distinct slot of the class, own fields first.
    pub fn all_fields(&self, id: ClassId) -> Vec<&FieldLayout> {
        let mut fields: Vec<&FieldLayout> = vec![];
        let mut class = Some(id);
        while let Some(id) = class {
            let Ok(layout) = self.object_layout(id) else {
                break;
            };
            for field in layout.fields.iter() {
                if fields.iter().all(|f| f.hash != field.hash) {
                    fields.push(field);
                }
            }
            class = layout.base;
        }
        fields
    }

    /// Runs the visitor of class `id` over `obj`.
    pub fn visit_fields(
        &self,
        heap: &dyn ObjectInspector,
        id: ClassId,
        obj: Addr,
        skip: &[NameHash],
    ) -> Result<Vec<FieldEntry>> {
        let class = self.layout(id)?;
        let layout = class
            .object()
            .ok_or(anyhow!("{} has no fields to visit", class.name))?;
        let cx = VisitCx {
            heap,
            class,
            layout,
            obj,
        };
        match layout.visitor.as_ref() {
            Some(visitor) => visitor.visit_fields(&cx, skip),
            None => LayoutVisitor.visit_fields(&cx, skip),
        }
    }
}
