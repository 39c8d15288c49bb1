use std::sync::Arc;

use super::SerializerFactory;
use crate::error::Result;
use crate::serializer::Serializer;
use crate::serializers::{CollectionSerializer, ValueSerializer};
use crate::types::{TypeKind, TypeRef};

/// Catch-all for any remaining enumerable collection.
#[derive(Debug, Clone, Copy)]
pub struct EnumerableFactory;

impl SerializerFactory for EnumerableFactory {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        matches!(ty.kind(), TypeKind::Collection { immutable: false, .. })
    }

    fn build(&self, _serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        Ok(Arc::new(CollectionSerializer::new(ty)?))
    }
}
