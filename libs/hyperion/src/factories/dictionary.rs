use std::sync::Arc;

use super::SerializerFactory;
use crate::error::Result;
use crate::serializer::Serializer;
use crate::serializers::{DictionarySerializer, ValueSerializer};
use crate::types::{TypeKind, TypeRef};

/// Handles dictionary types in both directions.
#[derive(Debug, Clone, Copy)]
pub struct DictionaryFactory;

impl SerializerFactory for DictionaryFactory {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        matches!(ty.kind(), TypeKind::Dictionary { .. })
    }

    fn build(&self, _serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        Ok(Arc::new(DictionarySerializer::new(ty)?))
    }
}
