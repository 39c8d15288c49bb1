//! # Hyperion
//!
//! Self-describing binary serialization of dynamic object graphs.
//!
//! Unlike a plain data format, the serialized form carries enough type
//! information to rebuild the graph without a schema on the reading side:
//! shared and cyclic references survive, fields can be polymorphic, and with
//! version tolerance the reader may have a different field layout than the
//! writer.
//!
//! Every value starts with a manifest that selects how its body is read:
//!
//! - `0`: null, no body
//! - `1..=20`: a [`Primitive`](types::Primitive) with a fixed body layout
//! - `251`: an array of value type primitives, followed by the element
//!   manifest, a length, and the raw element bodies
//! - `252`: a back reference to an earlier instance, followed by its id
//! - `253`: a full type name, on the first occurrence of a type in a stream
//! - `254`: a type name with its field names, for version tolerant streams
//! - `255`: a `u16` index into the known types and the types seen earlier in
//!   the stream
//!
//! Integers wider than a byte are written as LEB128 of their bit pattern,
//! floats are little endian, and strings and byte arrays are length-prefixed.
//!
//! There is no runtime reflection, so types are described with
//! [`TypeInfo`](types::TypeInfo) and registered in a
//! [`TypeRegistry`](types::TypeRegistry) before use.

// for benchmarks
#[cfg(test)]
use criterion as _;

pub mod error;
pub mod factories;
mod leb128;
mod options;
mod serializer;
pub mod serializers;
mod session;
pub mod stream;
mod surrogate;
pub mod types;
mod value;

pub use error::{Error, Result};
pub use options::{SerializerConfig, SerializerOptions};
pub use serializer::Serializer;
pub use session::{DeserializerSession, SerializerSession};
pub use surrogate::Surrogate;
pub use value::{Delegate, Member, Native, Object, ObjectData, ObjectRef, Value};
