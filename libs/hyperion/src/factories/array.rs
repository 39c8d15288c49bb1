use std::sync::Arc;

use super::SerializerFactory;
use crate::error::Result;
use crate::serializer::Serializer;
use crate::serializers::{ArraySerializer, ConsistentArraySerializer, ValueSerializer};
use crate::types::{TypeKind, TypeRef};

/// Handles array types. Arrays of value type primitives are written as
/// consistent arrays.
#[derive(Debug, Clone, Copy)]
pub struct ArrayFactory;

impl SerializerFactory for ArrayFactory {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        matches!(ty.kind(), TypeKind::Array { .. })
    }

    fn build(&self, _serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        if let Some(consistent) = ConsistentArraySerializer::new(ty) {
            return Ok(Arc::new(consistent));
        }

        Ok(Arc::new(ArraySerializer::new(ty)?))
    }
}
