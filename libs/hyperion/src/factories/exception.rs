use std::sync::Arc;

use super::SerializerFactory;
use crate::error::Result;
use crate::serializer::Serializer;
use crate::serializers::{ObjectSerializer, ValueSerializer};
use crate::types::{EXCEPTION, LayoutField, TypeRef};

/// Handles the base exception type and everything derived from it.
///
/// Of the fields declared by the base type only `message` and
/// `inner_exception` are kept. Fields of derived types are all serialized.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionFactory;

fn exception_field(field: &LayoutField) -> bool {
    &*field.declaring != EXCEPTION || matches!(field.field.name(), "message" | "inner_exception")
}

impl SerializerFactory for ExceptionFactory {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        ty.as_struct().is_some() && ty.is_subtype_of(EXCEPTION)
    }

    fn build(&self, serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        let object = ObjectSerializer::with_filter(serializer, ty, exception_field)?;
        Ok(Arc::new(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeInfo, TypeRegistry};

    #[test]
    fn keeps_message_and_derived_fields() {
        let mut types = TypeRegistry::new();
        let base = types.resolve(EXCEPTION).expect("built in");
        let derived = types.register(
            TypeInfo::structure("IoException")
                .base(&base)
                .field("path", "string")
                .build(),
        );

        let info = derived.as_struct().expect("struct");
        let kept: Vec<_> = info
            .layout()
            .iter()
            .filter(|f| exception_field(f))
            .map(|f| f.field.name())
            .collect();
        assert_eq!(kept, ["message", "inner_exception", "path"], "filtered layout");
    }
}
