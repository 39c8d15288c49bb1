use std::sync::Arc;

use super::SerializerFactory;
use crate::error::Result;
use crate::serializer::Serializer;
use crate::serializers::{ImmutableCollectionSerializer, ValueSerializer};
use crate::types::{TypeKind, TypeRef};

/// Handles collections that are constructed from their complete content.
#[derive(Debug, Clone, Copy)]
pub struct ImmutableCollectionFactory;

impl SerializerFactory for ImmutableCollectionFactory {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        matches!(ty.kind(), TypeKind::Collection { immutable: true, .. })
    }

    fn build(&self, _serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        Ok(Arc::new(ImmutableCollectionSerializer::new(ty)?))
    }
}
