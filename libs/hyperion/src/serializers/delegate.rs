use std::io;
use std::sync::Arc;

use super::manifest::write_type_manifest;
use super::member::{read_method, write_method};
use super::{ValueSerializer, read_object, snapshot, write_object};
use crate::error::Result;
use crate::session::{DeserializerSession, SerializerSession};
use crate::types::TypeRef;
use crate::value::{Delegate, Object, ObjectData, ObjectRef, Value};

/// Serializer for delegates: a method handle followed by the target.
#[derive(Debug)]
pub struct DelegateSerializer {
    ty: TypeRef,
}

impl DelegateSerializer {
    pub fn new(ty: &TypeRef) -> Self {
        Self { ty: Arc::clone(ty) }
    }
}

impl ValueSerializer for DelegateSerializer {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        write_type_manifest(writer, &self.ty, session)
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        let delegate = snapshot(value, self.ty.name(), |data| match data {
            ObjectData::Delegate(d) => Some(d.clone()),
            _ => None,
        })?;

        write_method(writer, &delegate.method)?;
        write_object(writer, &delegate.target, session)
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let method = read_method(reader, session.serializer())?;

        // the target may refer back to the delegate
        let object = ObjectRef::new(Object::with_data(
            &self.ty,
            ObjectData::Delegate(Delegate {
                target: Value::Null,
                method,
            }),
        ));
        let value = Value::Object(object.clone());
        session.register(&value);

        let target = read_object(reader, session)?;
        if let ObjectData::Delegate(d) = object.write().data_mut() {
            d.target = target;
        }

        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}
