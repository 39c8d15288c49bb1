//! The serializer factory chain.
//!
//! When no serializer is cached for a type, the [`Serializer`] asks each
//! factory in turn whether it handles the type. User factories are asked
//! first, then the built-in ones below, and finally the generic
//! [`ObjectSerializer`](crate::serializers::ObjectSerializer) is used for any
//! remaining struct type.

use std::sync::Arc;

use crate::error::Result;
use crate::options::SerializerOptions;
use crate::serializer::Serializer;
use crate::serializers::ValueSerializer;
use crate::types::TypeRef;

mod array;
mod contract;
mod delegate;
mod dictionary;
mod enumerable;
mod exception;
mod immutable;
mod member;

pub use array::ArrayFactory;
pub use contract::ContractFactory;
pub use delegate::DelegateFactory;
pub use dictionary::DictionaryFactory;
pub use enumerable::EnumerableFactory;
pub use exception::ExceptionFactory;
pub use immutable::ImmutableCollectionFactory;
pub use member::MemberFactory;

/// Builds value serializers for a family of types.
///
/// The result of [`Self::build`] is cached by the [`Serializer`], so each
/// factory is asked at most once per type and direction.
pub trait SerializerFactory: Send + Sync {
    /// Whether this factory builds the serializer used to write `ty`.
    fn can_serialize(&self, serializer: &Serializer, ty: &TypeRef) -> bool;

    /// Whether this factory builds the serializer used to read `ty`.
    ///
    /// By default, the same as [`Self::can_serialize`].
    fn can_deserialize(&self, serializer: &Serializer, ty: &TypeRef) -> bool {
        self.can_serialize(serializer, ty)
    }

    /// Builds the serializer for `ty`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the type can't be handled after all. The type is
    /// then cached as unsupported with this error as the reason.
    fn build(&self, serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>>;
}

/// The built-in factories, in priority order.
pub(crate) fn builtins(options: &SerializerOptions) -> Vec<Arc<dyn SerializerFactory>> {
    let mut factories: Vec<Arc<dyn SerializerFactory>> = Vec::with_capacity(8);
    if !options.ignore_custom_serialization_contracts() {
        factories.push(Arc::new(ContractFactory));
    }

    factories.push(Arc::new(ArrayFactory));
    factories.push(Arc::new(DictionaryFactory));
    factories.push(Arc::new(ExceptionFactory));
    factories.push(Arc::new(MemberFactory));
    factories.push(Arc::new(DelegateFactory));
    factories.push(Arc::new(ImmutableCollectionFactory));
    factories.push(Arc::new(EnumerableFactory));
    factories
}
