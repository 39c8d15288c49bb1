use std::sync::Arc;

use indexmap::IndexMap;

use super::{Primitive, TypeInfo, TypeKind, TypeRef};
use crate::error::{Error, Result};

/// Name of the polymorphic `object` type.
pub const OBJECT: &str = "object";
/// Name of the built-in base exception type.
pub const EXCEPTION: &str = "Exception";
/// Name of the built-in delegate type.
pub const DELEGATE: &str = "Delegate";
/// Name of the built-in reflection member handle type.
pub const MEMBER_INFO: &str = "MemberInfo";

/// Maps type names to their descriptions.
///
/// A new registry already contains every [`Primitive`], [`OBJECT`],
/// [`EXCEPTION`], [`DELEGATE`], and [`MEMBER_INFO`]. Array types don't need
/// to be registered: `"T[]"` resolves as long as `T` does.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: IndexMap<Box<str>, TypeRef>,
    primitives: Vec<TypeRef>,
    object: TypeRef,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a registry with the built-in types.
    pub fn new() -> Self {
        let primitives: Vec<TypeRef> = Primitive::ALL
            .into_iter()
            .map(|p| Arc::new(TypeInfo::new(p.name(), TypeKind::Primitive(p))))
            .collect();
        let object = Arc::new(TypeInfo::new(OBJECT, TypeKind::Any));

        let mut this = Self {
            types: IndexMap::new(),
            primitives: primitives.clone(),
            object: Arc::clone(&object),
        };

        for ty in primitives {
            this.insert(ty);
        }

        this.insert(object);
        this.register(
            TypeInfo::structure(EXCEPTION)
                .field("class_name", "string")
                .field("message", "string")
                .field("inner_exception", EXCEPTION)
                .field("stack_trace", "string")
                .field("source", "string")
                .field("hresult", "i32")
                .build(),
        );
        this.register(TypeInfo::delegate(DELEGATE));
        this.register(TypeInfo::new(MEMBER_INFO, TypeKind::Member));
        this
    }

    /// Registers a type, returning its shared handle.
    ///
    /// Registering a name twice replaces the earlier description for later
    /// lookups. Handles that were already given out stay valid.
    pub fn register(&mut self, ty: TypeInfo) -> TypeRef {
        let ty = Arc::new(ty);
        self.insert(Arc::clone(&ty));
        ty
    }

    fn insert(&mut self, ty: TypeRef) {
        if let Some(old) = self.types.insert(ty.name().into(), ty) {
            log::warn!("Type `{}` was registered twice.", old.name());
        }
    }

    /// Gets a registered type by exact name.
    pub fn get(&self, name: &str) -> Option<&TypeRef> {
        self.types.get(name)
    }

    /// Resolves a type name, including array types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`] if the name is not registered.
    pub fn resolve(&self, name: &str) -> Result<TypeRef> {
        if let Some(ty) = self.types.get(name) {
            return Ok(Arc::clone(ty));
        }

        match name.strip_suffix("[]") {
            Some(element) => Ok(TypeInfo::array_of(&self.resolve(element)?)),
            None => Err(Error::UnknownType(name.to_owned())),
        }
    }

    /// Gets the type of a primitive.
    pub fn primitive(&self, p: Primitive) -> &TypeRef {
        // `ALL` is in manifest order starting at 1
        &self.primitives[usize::from(p.manifest() - 1)]
    }

    /// Gets the polymorphic `object` type.
    pub fn object(&self) -> &TypeRef {
        &self.object
    }

    /// Iterates all registered types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeRef> {
        self.types.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_present() {
        let registry = TypeRegistry::new();
        for p in Primitive::ALL {
            let ty = registry.resolve(p.name()).expect("primitive registered");
            assert_eq!(ty.primitive(), Some(p), "primitive kind must match");
            assert_eq!(registry.primitive(p).name(), p.name(), "index must match");
        }

        for name in [OBJECT, EXCEPTION, DELEGATE, MEMBER_INFO] {
            assert!(registry.get(name).is_some(), "{name} must be built in");
        }
    }

    #[test]
    fn resolves_nested_arrays() {
        let mut registry = TypeRegistry::new();
        registry.register(TypeInfo::structure("Point").field("x", "i32").build());

        let ty = registry.resolve("Point[][]").expect("array of arrays");
        assert_eq!(ty.name(), "Point[][]", "name must be kept");
        let TypeKind::Array { element } = ty.kind() else {
            panic!("expected array kind: {ty:?}");
        };
        assert_eq!(element.name(), "Point[]", "element is an array too");

        let err = registry.resolve("Missing[]").expect_err("not registered");
        assert!(
            matches!(&err, Error::UnknownType(name) if name == "Missing"),
            "unexpected error: {err:?}"
        );
    }
}
