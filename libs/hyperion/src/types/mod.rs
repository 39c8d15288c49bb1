//! Explicit type descriptions.
//!
//! There is no runtime reflection, so every type that takes part in an object
//! graph is described by a [`TypeInfo`] and registered in a [`TypeRegistry`].
//! Struct fields refer to their declared type by name, which is what allows
//! recursive types like linked lists to be described at all.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::Result;
use crate::value::{Object, Value};

mod registry;

pub use registry::{DELEGATE, EXCEPTION, MEMBER_INFO, OBJECT, TypeRegistry};

/// Shared handle to a type description.
pub type TypeRef = Arc<TypeInfo>;

/// Built-in scalar types.
///
/// The discriminant is the manifest byte the type is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Primitive {
    Bool = 1,
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    I128,
    U128,
    F32,
    F64,
    Char,
    String,
    Bytes,
    DateTime,
    Duration,
    Guid,
    Type,
}

impl Primitive {
    /// All primitives, in manifest order.
    pub const ALL: [Self; 20] = [
        Self::Bool,
        Self::U8,
        Self::I8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::I128,
        Self::U128,
        Self::F32,
        Self::F64,
        Self::Char,
        Self::String,
        Self::Bytes,
        Self::DateTime,
        Self::Duration,
        Self::Guid,
        Self::Type,
    ];

    /// The manifest byte this primitive is written with.
    pub const fn manifest(self) -> u8 {
        self as u8
    }

    /// Gets the primitive for a manifest byte, if any.
    pub fn from_manifest(b: u8) -> Option<Self> {
        Self::ALL.get(usize::from(b).checked_sub(1)?).copied()
    }

    /// The registered type name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::I128 => "i128",
            Self::U128 => "u128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::DateTime => "datetime",
            Self::Duration => "duration",
            Self::Guid => "guid",
            Self::Type => "type",
        }
    }

    /// Gets the primitive with a type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Whether values of this type have no identity.
    ///
    /// Value types are never reference tracked, can't be null, and are
    /// written without a manifest when they are the declared type of a field.
    pub const fn is_value_type(self) -> bool {
        !matches!(self, Self::String | Self::Bytes | Self::Type)
    }
}

bitflags! {
    /// Flags that exclude a field from serialization.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u8 {
        /// The field is explicitly marked as not serializable.
        const NON_SERIALIZED = 1 << 0;
        /// The field holds a pointer-sized platform handle.
        const HANDLE = 1 << 1;
    }
}

/// A field as declared on a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    name: Box<str>,
    type_name: Box<str>,
    flags: FieldFlags,
}

impl FieldInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the declared type. Resolved against the registry when a
    /// serializer is built.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn flags(&self) -> FieldFlags {
        self.flags
    }
}

/// A field within the flattened layout of a struct, including inherited ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutField {
    pub field: FieldInfo,
    /// The name of the type that declares the field.
    pub declaring: Box<str>,
    /// Inheritance depth of the declaring type; the root of the chain is 0.
    pub depth: usize,
}

/// Native implementation of a method, used by delegates.
pub type MethodFn = fn(&Value, &[Value]) -> Result<Value>;

/// A method declared on a struct type.
#[derive(Debug)]
pub struct MethodInfo {
    name: Box<str>,
    declaring: Box<str>,
    params: Box<[Box<str>]>,
    func: MethodFn,
}

impl MethodInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring(&self) -> &str {
        &self.declaring
    }

    /// Parameter type names. Together with the name, this is the signature.
    pub fn params(&self) -> &[Box<str>] {
        &self.params
    }

    /// Whether the method has the given name and parameter type names.
    pub fn matches(&self, name: &str, params: &[String]) -> bool {
        *self.name == *name
            && self.params.len() == params.len()
            && self.params.iter().zip(params).all(|(a, b)| **a == **b)
    }

    /// Calls the method on `target`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the native implementation returns.
    pub fn invoke(&self, target: &Value, args: &[Value]) -> Result<Value> {
        (self.func)(target, args)
    }
}

/// A type-provided alternative to field-by-field serialization.
///
/// The contract turns an instance into named entries and rebuilds it from
/// them. It takes precedence over the generic field layout unless the
/// serializer is configured to ignore custom contracts.
pub trait SerializationContract: Send + Sync {
    /// Extracts the entries to serialize.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the object cannot be represented.
    fn write_entries(&self, object: &Object) -> Result<Vec<(String, Value)>>;

    /// Rebuilds an instance of `ty` from deserialized entries.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the entries are incomplete or invalid.
    fn read_entries(&self, ty: &TypeRef, entries: Vec<(String, Value)>) -> Result<Object>;
}

/// Description of a struct type.
pub struct StructInfo {
    base: Option<TypeRef>,
    depth: usize,
    layout: Vec<LayoutField>,
    methods: Vec<Arc<MethodInfo>>,
    contract: Option<Arc<dyn SerializationContract>>,
}

impl StructInfo {
    pub fn base(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    /// All fields including inherited ones, base fields first.
    pub fn layout(&self) -> &[LayoutField] {
        &self.layout
    }

    /// Gets the layout slot of a field by name.
    ///
    /// If a derived type shadows a base field, the derived field is found.
    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.layout.iter().rposition(|f| f.field.name() == name)
    }

    /// Gets a method declared on this type or its base types.
    pub fn method(&self, name: &str, params: &[String]) -> Option<&Arc<MethodInfo>> {
        self.methods
            .iter()
            .find(|m| m.matches(name, params))
            .or_else(|| self.base.as_ref()?.as_struct()?.method(name, params))
    }

    pub fn contract(&self) -> Option<&Arc<dyn SerializationContract>> {
        self.contract.as_ref()
    }
}

impl fmt::Debug for StructInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructInfo")
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("depth", &self.depth)
            .field("layout", &self.layout)
            .field("methods", &self.methods)
            .field("contract", &self.contract.is_some())
            .finish()
    }
}

/// The shape of a type.
#[derive(Debug)]
#[non_exhaustive]
pub enum TypeKind {
    Primitive(Primitive),
    /// The polymorphic `object` type. Only used as a declared type.
    Any,
    Struct(StructInfo),
    Array {
        element: TypeRef,
    },
    Dictionary {
        key: TypeRef,
        value: TypeRef,
    },
    Collection {
        element: TypeRef,
        immutable: bool,
    },
    /// A native value without a field layout.
    Opaque,
    Delegate,
    /// A reflection handle to a field or method.
    Member,
}

/// Describes a type that can appear in an object graph.
#[derive(Debug)]
pub struct TypeInfo {
    name: Box<str>,
    kind: TypeKind,
}

impl TypeInfo {
    /// Creates a type description directly.
    pub fn new(name: impl Into<Box<str>>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Starts describing a struct type.
    pub fn structure(name: impl Into<Box<str>>) -> StructBuilder {
        StructBuilder {
            name: name.into(),
            base: None,
            fields: Vec::new(),
            methods: Vec::new(),
            contract: None,
        }
    }

    /// Creates the array type for an element type, named `"<element>[]"`.
    pub fn array_of(element: &TypeRef) -> TypeRef {
        Arc::new(Self::new(
            format!("{}[]", element.name()),
            TypeKind::Array {
                element: Arc::clone(element),
            },
        ))
    }

    pub fn dictionary(name: impl Into<Box<str>>, key: &TypeRef, value: &TypeRef) -> Self {
        Self::new(
            name,
            TypeKind::Dictionary {
                key: Arc::clone(key),
                value: Arc::clone(value),
            },
        )
    }

    pub fn collection(name: impl Into<Box<str>>, element: &TypeRef) -> Self {
        Self::new(
            name,
            TypeKind::Collection {
                element: Arc::clone(element),
                immutable: false,
            },
        )
    }

    /// A collection that can only be constructed once all elements are known.
    pub fn immutable_collection(name: impl Into<Box<str>>, element: &TypeRef) -> Self {
        Self::new(
            name,
            TypeKind::Collection {
                element: Arc::clone(element),
                immutable: true,
            },
        )
    }

    /// A native type without field layout. Needs a surrogate or a factory.
    pub fn opaque(name: impl Into<Box<str>>) -> Self {
        Self::new(name, TypeKind::Opaque)
    }

    pub fn delegate(name: impl Into<Box<str>>) -> Self {
        Self::new(name, TypeKind::Delegate)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self.kind {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructInfo> {
        match &self.kind {
            TypeKind::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this type is `name` or derives from it.
    pub fn is_subtype_of(&self, name: &str) -> bool {
        if *self.name == *name {
            return true;
        }

        self.as_struct()
            .and_then(StructInfo::base)
            .is_some_and(|b| b.is_subtype_of(name))
    }
}

/// Builds a struct [`TypeInfo`].
#[must_use]
pub struct StructBuilder {
    name: Box<str>,
    base: Option<TypeRef>,
    fields: Vec<FieldInfo>,
    methods: Vec<(Box<str>, Box<[Box<str>]>, MethodFn)>,
    contract: Option<Arc<dyn SerializationContract>>,
}

impl StructBuilder {
    /// Sets the base type. Its fields and methods are inherited.
    pub fn base(mut self, base: &TypeRef) -> Self {
        self.base = Some(Arc::clone(base));
        self
    }

    /// Declares a serializable field.
    pub fn field(self, name: impl Into<Box<str>>, type_name: impl Into<Box<str>>) -> Self {
        self.field_with(name, type_name, FieldFlags::empty())
    }

    /// Declares a field with flags.
    pub fn field_with(
        mut self,
        name: impl Into<Box<str>>,
        type_name: impl Into<Box<str>>,
        flags: FieldFlags,
    ) -> Self {
        self.fields.push(FieldInfo {
            name: name.into(),
            type_name: type_name.into(),
            flags,
        });
        self
    }

    /// Declares a method with parameter type names.
    pub fn method(mut self, name: impl Into<Box<str>>, params: &[&str], func: MethodFn) -> Self {
        let params = params.iter().map(|&p| Box::from(p)).collect();
        self.methods.push((name.into(), params, func));
        self
    }

    /// Attaches a custom serialization contract.
    pub fn contract(mut self, contract: impl SerializationContract + 'static) -> Self {
        self.contract = Some(Arc::new(contract));
        self
    }

    pub fn build(self) -> TypeInfo {
        let base_struct = self.base.as_deref().and_then(TypeInfo::as_struct);
        let depth = base_struct.map_or(0, |b| b.depth + 1);

        let mut layout = base_struct.map(|b| b.layout.clone()).unwrap_or_default();
        layout.extend(self.fields.into_iter().map(|field| LayoutField {
            field,
            declaring: self.name.clone(),
            depth,
        }));

        let methods = self
            .methods
            .into_iter()
            .map(|(name, params, func)| {
                Arc::new(MethodInfo {
                    name,
                    declaring: self.name.clone(),
                    params,
                    func,
                })
            })
            .collect();

        TypeInfo {
            name: self.name,
            kind: TypeKind::Struct(StructInfo {
                base: self.base,
                depth,
                layout,
                methods,
                contract: self.contract,
            }),
        }
    }
}
