use std::sync::Arc;

use super::SerializerFactory;
use crate::error::Result;
use crate::serializer::Serializer;
use crate::serializers::{ContractSerializer, ValueSerializer};
use crate::types::TypeRef;

/// Handles struct types that bring their own serialization contract.
///
/// Not part of the chain if custom contracts are ignored.
#[derive(Debug, Clone, Copy)]
pub struct ContractFactory;

impl SerializerFactory for ContractFactory {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        ty.as_struct().is_some_and(|s| s.contract().is_some())
    }

    fn build(&self, _serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        Ok(Arc::new(ContractSerializer::new(ty)?))
    }
}
