//! The dynamic object graph model.
//!
//! A [`Value`] is either a primitive or a shared [`ObjectRef`]. Object
//! references have identity, so a graph can share nodes and contain cycles.
//! Equality on values is structural and cycle-safe.

use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{MethodInfo, Primitive, TypeKind, TypeRef};

/// A value within an object graph.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    U8(u8),
    I8(i8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    I128(i128),
    U128(u128),
    F32(f32),
    F64(f64),
    Char(char),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    DateTime(OffsetDateTime),
    Duration(time::Duration),
    Guid(Uuid),
    Type(TypeRef),
    Object(ObjectRef),
}

impl Value {
    /// Creates a new string instance.
    pub fn string(s: &str) -> Self {
        Self::String(Arc::from(s))
    }

    /// Creates a new byte array instance.
    pub fn bytes(b: &[u8]) -> Self {
        Self::Bytes(Arc::from(b))
    }

    /// Wraps an object into a new shared reference.
    pub fn object(object: Object) -> Self {
        Self::Object(ObjectRef::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The primitive kind of this value, if it is one.
    pub fn primitive(&self) -> Option<Primitive> {
        Some(match self {
            Self::Null | Self::Object(_) => return None,
            Self::Bool(_) => Primitive::Bool,
            Self::U8(_) => Primitive::U8,
            Self::I8(_) => Primitive::I8,
            Self::I16(_) => Primitive::I16,
            Self::U16(_) => Primitive::U16,
            Self::I32(_) => Primitive::I32,
            Self::U32(_) => Primitive::U32,
            Self::I64(_) => Primitive::I64,
            Self::U64(_) => Primitive::U64,
            Self::I128(_) => Primitive::I128,
            Self::U128(_) => Primitive::U128,
            Self::F32(_) => Primitive::F32,
            Self::F64(_) => Primitive::F64,
            Self::Char(_) => Primitive::Char,
            Self::String(_) => Primitive::String,
            Self::Bytes(_) => Primitive::Bytes,
            Self::DateTime(_) => Primitive::DateTime,
            Self::Duration(_) => Primitive::Duration,
            Self::Guid(_) => Primitive::Guid,
            Self::Type(_) => Primitive::Type,
        })
    }

    /// A readable name of the runtime type, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Object(o) => o.type_info().name().to_owned(),
            _ => self.primitive().map_or("?", Primitive::name).to_owned(),
        }
    }

    /// The identity of reference values.
    ///
    /// Strings, byte arrays, and objects have identity. Two distinct but
    /// equal instances have different identities.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(Arc::as_ptr(s).cast::<u8>().addr()),
            Self::Bytes(b) => Some(Arc::as_ptr(b).cast::<u8>().addr()),
            Self::Object(o) => Some(o.identity()),
            _ => None,
        }
    }

    /// The value a freshly allocated field of the given declared type holds.
    pub(crate) fn default_for(type_name: &str) -> Self {
        match Primitive::from_name(type_name) {
            Some(p) if p.is_value_type() => Self::zero(p),
            _ => Self::Null,
        }
    }

    fn zero(p: Primitive) -> Self {
        match p {
            Primitive::Bool => Self::Bool(false),
            Primitive::U8 => Self::U8(0),
            Primitive::I8 => Self::I8(0),
            Primitive::I16 => Self::I16(0),
            Primitive::U16 => Self::U16(0),
            Primitive::I32 => Self::I32(0),
            Primitive::U32 => Self::U32(0),
            Primitive::I64 => Self::I64(0),
            Primitive::U64 => Self::U64(0),
            Primitive::I128 => Self::I128(0),
            Primitive::U128 => Self::U128(0),
            Primitive::F32 => Self::F32(0.0),
            Primitive::F64 => Self::F64(0.0),
            Primitive::Char => Self::Char('\0'),
            Primitive::DateTime => Self::DateTime(OffsetDateTime::UNIX_EPOCH),
            Primitive::Duration => Self::Duration(time::Duration::ZERO),
            Primitive::Guid => Self::Guid(Uuid::nil()),
            Primitive::String | Primitive::Bytes | Primitive::Type => Self::Null,
        }
    }
}

macro_rules! impl_from {
    ($($Ty:ty => $Variant:ident),* $(,)?) => { $(
        impl From<$Ty> for Value {
            fn from(value: $Ty) -> Self {
                Self::$Variant(value)
            }
        }
    )* };
}

impl_from!(
    bool => Bool,
    u8 => U8,
    i8 => I8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    i128 => I128,
    u128 => U128,
    f32 => F32,
    f64 => F64,
    char => Char,
    OffsetDateTime => DateTime,
    time::Duration => Duration,
    Uuid => Guid,
    TypeRef => Type,
    ObjectRef => Object,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        graph_eq(self, other, &mut HashSet::new())
    }
}

/// Structural equality that terminates on cyclic graphs.
///
/// A pair of objects that is already being compared further up is assumed
/// equal; if it isn't, the comparison higher up will fail anyway.
fn graph_eq(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::U8(a), Value::U8(b)) => a == b,
        (Value::I8(a), Value::I8(b)) => a == b,
        (Value::I16(a), Value::I16(b)) => a == b,
        (Value::U16(a), Value::U16(b)) => a == b,
        (Value::I32(a), Value::I32(b)) => a == b,
        (Value::U32(a), Value::U32(b)) => a == b,
        (Value::I64(a), Value::I64(b)) => a == b,
        (Value::U64(a), Value::U64(b)) => a == b,
        (Value::I128(a), Value::I128(b)) => a == b,
        (Value::U128(a), Value::U128(b)) => a == b,
        (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
        (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
        (Value::Char(a), Value::Char(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bytes(a), Value::Bytes(b)) => a == b,
        (Value::DateTime(a), Value::DateTime(b)) => a == b && a.offset() == b.offset(),
        (Value::Duration(a), Value::Duration(b)) => a == b,
        (Value::Guid(a), Value::Guid(b)) => a == b,
        (Value::Type(a), Value::Type(b)) => a.name() == b.name(),
        (Value::Object(a), Value::Object(b)) => {
            if a.ptr_eq(b) || !seen.insert((a.identity(), b.identity())) {
                return true;
            }

            // snapshot so no lock is held while recursing
            let a = a.read().clone();
            let b = b.read().clone();
            a.ty.name() == b.ty.name() && data_eq(&a.data, &b.data, seen)
        },
        _ => false,
    }
}

fn data_eq(a: &ObjectData, b: &ObjectData, seen: &mut HashSet<(usize, usize)>) -> bool {
    fn all_eq(a: &[Value], b: &[Value], seen: &mut HashSet<(usize, usize)>) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(a, b)| graph_eq(a, b, seen))
    }

    match (a, b) {
        (ObjectData::Empty, ObjectData::Empty) => true,
        (ObjectData::Fields(a), ObjectData::Fields(b))
        | (ObjectData::Elements(a), ObjectData::Elements(b)) => all_eq(a, b, seen),
        (ObjectData::Entries(a), ObjectData::Entries(b)) => {
            a.len() == b.len()
                && a.iter().zip(b).all(|((ak, av), (bk, bv))| {
                    graph_eq(ak, bk, seen) && graph_eq(av, bv, seen)
                })
        },
        (ObjectData::Native(a), ObjectData::Native(b)) => Arc::ptr_eq(&a.0, &b.0),
        (ObjectData::Member(a), ObjectData::Member(b)) => a == b,
        (ObjectData::Delegate(a), ObjectData::Delegate(b)) => {
            method_eq(&a.method, &b.method) && graph_eq(&a.target, &b.target, seen)
        },
        _ => false,
    }
}

fn method_eq(a: &MethodInfo, b: &MethodInfo) -> bool {
    a.declaring() == b.declaring() && a.name() == b.name() && a.params() == b.params()
}

/// A shared, mutable object with identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl ObjectRef {
    pub fn new(object: Object) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    /// Locks the object for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Object> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the object for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Object> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn type_info(&self) -> TypeRef {
        Arc::clone(&self.read().ty)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0).addr()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never recurse: the graph may be cyclic
        write!(f, "ObjectRef({} @ {:#x})", self.type_info().name(), self.identity())
    }
}

/// An instance of a non-primitive type.
#[derive(Clone)]
pub struct Object {
    ty: TypeRef,
    data: ObjectData,
}

/// The content of an [`Object`], depending on its type kind.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ObjectData {
    Empty,
    /// Field values in layout order.
    Fields(Vec<Value>),
    Elements(Vec<Value>),
    Entries(Vec<(Value, Value)>),
    Native(Native),
    Member(Member),
    Delegate(Delegate),
}

/// A native Rust value held by an opaque type.
#[derive(Clone)]
pub struct Native(Arc<dyn Any + Send + Sync>);

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Native(..)")
    }
}

/// A reflection handle to a member of a struct type.
#[derive(Debug, Clone)]
pub enum Member {
    Field { declaring: TypeRef, name: Box<str> },
    Method(Arc<MethodInfo>),
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Field { declaring, name },
                Self::Field {
                    declaring: other_declaring,
                    name: other_name,
                },
            ) => declaring.name() == other_declaring.name() && name == other_name,
            (Self::Method(a), Self::Method(b)) => method_eq(a, b),
            _ => false,
        }
    }
}

/// A method bound to a target.
#[derive(Debug, Clone)]
pub struct Delegate {
    pub target: Value,
    pub method: Arc<MethodInfo>,
}

impl Delegate {
    /// Calls the bound method on the target.
    ///
    /// # Errors
    ///
    /// Returns whatever error the method returns.
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        self.method.invoke(&self.target, args)
    }
}

impl Object {
    /// Allocates an empty instance without running any user code.
    ///
    /// Fields with a value type are zeroed, all other fields are null.
    /// Collections start out empty.
    pub fn new(ty: &TypeRef) -> Self {
        let data = match ty.kind() {
            TypeKind::Struct(s) => ObjectData::Fields(
                s.layout()
                    .iter()
                    .map(|f| Value::default_for(f.field.type_name()))
                    .collect(),
            ),
            TypeKind::Array { .. } | TypeKind::Collection { .. } => {
                ObjectData::Elements(Vec::new())
            },
            TypeKind::Dictionary { .. } => ObjectData::Entries(Vec::new()),
            _ => ObjectData::Empty,
        };

        Self::with_data(ty, data)
    }

    pub fn with_data(ty: &TypeRef, data: ObjectData) -> Self {
        Self {
            ty: Arc::clone(ty),
            data,
        }
    }

    /// Creates a struct instance and assigns the given fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMember`] if a field doesn't exist.
    pub fn with_fields<'a, I>(ty: &TypeRef, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut this = Self::new(ty);
        for (name, value) in fields {
            this.set(name, value)?;
        }
        Ok(this)
    }

    /// Creates an array, collection, or other element-based instance.
    pub fn with_elements(ty: &TypeRef, elements: Vec<Value>) -> Self {
        Self::with_data(ty, ObjectData::Elements(elements))
    }

    /// Creates a dictionary instance.
    pub fn with_entries(ty: &TypeRef, entries: Vec<(Value, Value)>) -> Self {
        Self::with_data(ty, ObjectData::Entries(entries))
    }

    /// Creates an instance of an opaque type holding a native value.
    pub fn native<T: Any + Send + Sync>(ty: &TypeRef, value: T) -> Self {
        Self::with_data(ty, ObjectData::Native(Native(Arc::new(value))))
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn data(&self) -> &ObjectData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ObjectData {
        &mut self.data
    }

    /// Gets a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let slot = self.ty.as_struct()?.field_slot(name)?;
        match &self.data {
            ObjectData::Fields(fields) => fields.get(slot),
            _ => None,
        }
    }

    /// Sets a field value by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMember`] if the field doesn't exist.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let slot = self
            .ty
            .as_struct()
            .and_then(|s| s.field_slot(name))
            .ok_or_else(|| Error::UnknownMember {
                type_name: self.ty.name().to_owned(),
                member: name.to_owned(),
            })?;

        self.set_slot(slot, value)
    }

    /// Sets a field value by layout slot.
    pub(crate) fn set_slot(&mut self, slot: usize, value: Value) -> Result<()> {
        match &mut self.data {
            ObjectData::Fields(fields) => match fields.get_mut(slot) {
                Some(field) => {
                    *field = value;
                    Ok(())
                },
                None => Err(Error::mismatch(
                    format!("field slot {slot}"),
                    format!("{} fields", fields.len()),
                )),
            },
            _ => Err(Error::mismatch("struct fields", self.ty.name())),
        }
    }

    pub fn elements(&self) -> Option<&[Value]> {
        match &self.data {
            ObjectData::Elements(e) => Some(e),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[(Value, Value)]> {
        match &self.data {
            ObjectData::Entries(e) => Some(e),
            _ => None,
        }
    }

    /// Gets the native value of an opaque instance.
    pub fn downcast_native<T: Any>(&self) -> Option<&T> {
        match &self.data {
            ObjectData::Native(n) => n.0.downcast_ref(),
            _ => None,
        }
    }

    pub fn delegate(&self) -> Option<&Delegate> {
        match &self.data {
            ObjectData::Delegate(d) => Some(d),
            _ => None,
        }
    }

    pub fn member(&self) -> Option<&Member> {
        match &self.data {
            ObjectData::Member(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("ty", &self.ty.name())
            .field("data", &self.data)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeInfo;

    fn node_type() -> TypeRef {
        Arc::new(
            TypeInfo::structure("Node")
                .field("value", "i32")
                .field("next", "Node")
                .build(),
        )
    }

    #[test]
    fn new_object_has_defaults() {
        let node = Object::new(&node_type());
        assert_eq!(node.get("value"), Some(&Value::I32(0)), "value types are zeroed");
        assert_eq!(node.get("next"), Some(&Value::Null), "references are null");
        assert!(node.get("missing").is_none(), "no such field");
    }

    #[test]
    fn equality_handles_cycles() {
        let ty = node_type();
        let make = || {
            let node = ObjectRef::new(Object::new(&ty));
            node.write()
                .set("next", Value::Object(node.clone()))
                .expect("field exists");
            Value::Object(node)
        };

        let a = make();
        let b = make();
        assert_eq!(a, b, "structurally equal cycles");

        let c = make();
        if let Value::Object(c) = &c {
            c.write().set("value", Value::I32(5)).expect("field exists");
        }
        assert_ne!(a, c, "differing field");
    }

    #[test]
    fn identity_is_per_instance() {
        let a = Value::string("same");
        let b = Value::string("same");
        assert_eq!(a, b, "equal content");
        assert_ne!(a.identity(), b.identity(), "distinct instances");
        assert_eq!(a.identity(), a.clone().identity(), "clones share identity");
        assert_eq!(Value::I32(1).identity(), None, "value types have no identity");
    }
}
