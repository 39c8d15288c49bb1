use std::sync::Arc;

use super::SerializerFactory;
use crate::error::Result;
use crate::serializer::Serializer;
use crate::serializers::{DelegateSerializer, ValueSerializer};
use crate::types::{TypeKind, TypeRef};

/// Handles delegate types.
#[derive(Debug, Clone, Copy)]
pub struct DelegateFactory;

impl SerializerFactory for DelegateFactory {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        matches!(ty.kind(), TypeKind::Delegate)
    }

    fn build(&self, _serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        Ok(Arc::new(DelegateSerializer::new(ty)))
    }
}
