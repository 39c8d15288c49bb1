use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use smallvec::{SmallVec, smallvec};

use super::manifest::{write_type_manifest, write_version_manifest};
use super::primitive::{read_body, write_body};
use super::{ValueSerializer, read_object, snapshot, write_object};
use crate::error::{Error, Result};
use crate::serializer::Serializer;
use crate::session::{DeserializerSession, SerializerSession};
use crate::types::{FieldFlags, LayoutField, Primitive, TypeRef};
use crate::value::{Object, ObjectData, ObjectRef, Value};

/// Fields with this name hold a lock handle and are never serialized.
pub const SYNC_ROOT_FIELD: &str = "sync_root";

/// Decides whether a layout field is serialized.
pub type FieldFilter = fn(&LayoutField) -> bool;

#[derive(Debug)]
struct FieldPlan {
    name: Box<str>,
    depth: usize,
    slot: usize,
    /// Set if the declared type is a value type primitive, whose values are
    /// written without a manifest.
    fast: Option<Primitive>,
}

/// The generic serializer for struct types, writing their fields one by one.
///
/// Fields are ordered by the inheritance depth of their declaring type and
/// then by name, so writer and reader agree on the order without names on
/// the wire.
#[derive(Debug)]
pub struct ObjectSerializer {
    ty: TypeRef,
    fields: Vec<FieldPlan>,
    /// Whether bodies are written in the self-describing form announced by a
    /// version manifest.
    versioned: bool,
}

impl ObjectSerializer {
    /// Builds the field plan for a struct type.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `ty` isn't a struct, a field's declared type isn't
    /// registered, or a type declares the same field twice.
    pub fn new(serializer: &Serializer, ty: &TypeRef) -> Result<Self> {
        Self::with_filter(serializer, ty, |_| true)
    }

    /// Like [`Self::new`], but only serializes fields accepted by `filter`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn with_filter(serializer: &Serializer, ty: &TypeRef, filter: FieldFilter) -> Result<Self> {
        let info = ty
            .as_struct()
            .ok_or_else(|| Error::mismatch("struct type", ty.name()))?;

        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        for (slot, layout) in info.layout().iter().enumerate() {
            let field = &layout.field;
            if field
                .flags()
                .intersects(FieldFlags::NON_SERIALIZED | FieldFlags::HANDLE)
                || field.name() == SYNC_ROOT_FIELD
                || !filter(layout)
            {
                continue;
            }

            if !seen.insert((layout.depth, field.name())) {
                return Err(Error::custom(format_args!(
                    "field `{}` is declared twice by `{}`",
                    field.name(),
                    layout.declaring,
                )));
            }

            let declared = serializer.types().resolve(field.type_name())?;
            fields.push(FieldPlan {
                name: field.name().into(),
                depth: layout.depth,
                slot,
                fast: declared.primitive().filter(|p| p.is_value_type()),
            });
        }

        fields.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.name.cmp(&b.name)));

        let versioned = serializer.options().version_tolerance()
            && serializer.known_type_index(ty.name()).is_none();

        Ok(Self {
            ty: Arc::clone(ty),
            fields,
            versioned,
        })
    }

    fn allocate(&self, session: &mut DeserializerSession<'_>) -> (ObjectRef, Value) {
        let object = ObjectRef::new(Object::new(&self.ty));
        let value = Value::Object(object.clone());
        session.register(&value);
        (object, value)
    }
}

impl ValueSerializer for ObjectSerializer {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        if self.versioned {
            let names = self.fields.iter().map(|f| &*f.name);
            write_version_manifest(writer, &self.ty, names, session)
        } else {
            write_type_manifest(writer, &self.ty, session)
        }
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        let values = snapshot(value, self.ty.name(), |data| match data {
            ObjectData::Fields(f) => Some(f.clone()),
            _ => None,
        })?;

        for plan in &self.fields {
            let field = values
                .get(plan.slot)
                .ok_or_else(|| Error::mismatch(self.ty.name(), value.type_name()))?;

            match plan.fast {
                Some(p) if !self.versioned => write_body(writer, p, field)?,
                _ => write_object(writer, field, session)?,
            }
        }

        Ok(())
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let (object, value) = self.allocate(session);
        for plan in &self.fields {
            let field = match plan.fast {
                Some(p) => read_body(reader, p)?,
                None => read_object(reader, session)?,
            };

            object.write().set_slot(plan.slot, field)?;
        }

        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }

    fn with_wire_fields(self: Arc<Self>, fields: Vec<String>) -> Result<Arc<dyn ValueSerializer>> {
        // a name may occur once per inheritance level, so match them up in order
        let mut used: SmallVec<[bool; 16]> = smallvec![false; self.fields.len()];
        let mut slots = SmallVec::with_capacity(fields.len());
        for name in &fields {
            let index = self
                .fields
                .iter()
                .enumerate()
                .position(|(i, f)| !used[i] && *f.name == **name);

            if let Some(index) = index {
                used[index] = true;
                slots.push(Some(self.fields[index].slot));
            } else {
                log::debug!("Field `{name}` of `{}` is unknown and skipped.", self.ty.name());
                slots.push(None);
            }
        }

        Ok(Arc::new(VersionedObjectReader {
            object: self,
            slots,
        }))
    }
}

/// Reads struct bodies written with a version manifest.
///
/// Every field on the wire carries its own manifest, so unknown fields are
/// read and discarded, and missing fields keep their default.
struct VersionedObjectReader {
    object: Arc<ObjectSerializer>,
    /// Target slot of each wire field, in wire order.
    slots: SmallVec<[Option<usize>; 16]>,
}

impl ValueSerializer for VersionedObjectReader {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        self.object.write_manifest(writer, session)
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        self.object.write_value(writer, value, session)
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let (object, value) = self.object.allocate(session);
        for slot in &self.slots {
            let field = read_object(reader, session)?;
            if let Some(slot) = *slot {
                object.write().set_slot(slot, field)?;
            }
        }

        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        self.object.element_type()
    }
}
