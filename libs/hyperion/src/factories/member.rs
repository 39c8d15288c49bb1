use std::sync::Arc;

use super::SerializerFactory;
use crate::error::Result;
use crate::serializer::Serializer;
use crate::serializers::{MemberSerializer, ValueSerializer};
use crate::types::{TypeKind, TypeRef};

/// Handles reflection member handles.
#[derive(Debug, Clone, Copy)]
pub struct MemberFactory;

impl SerializerFactory for MemberFactory {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        matches!(ty.kind(), TypeKind::Member)
    }

    fn build(&self, _serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        Ok(Arc::new(MemberSerializer::new(ty)))
    }
}
