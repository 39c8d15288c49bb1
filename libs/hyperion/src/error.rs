//! Error handling types.
//!
//! Serialization and deserialization share one error type, same as the
//! serializer registry and its configuration.

use std::{fmt, io};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Potential errors to encounter when serializing or deserializing an object
/// graph.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Another reason provided by a factory, surrogate, or contract.
    #[error("{0}")]
    Custom(String),
    /// The error originated from the [`io::Write`] or [`io::Read`]
    /// implementation.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Loading a [`SerializerConfig`](crate::SerializerConfig) failed.
    #[error("invalid serializer config: {0}")]
    Config(#[from] toml::de::Error),

    /// No factory, surrogate, or field layout could produce a serializer for
    /// the type. The same error is reported for every later attempt.
    #[error("type `{type_name}` is not supported: {reason}")]
    UnsupportedType { type_name: String, reason: String },
    /// The leading manifest byte does not map to any serializer.
    #[error("unknown manifest byte {0}")]
    UnknownManifest(u8),
    /// A full or version manifest named a type that isn't registered.
    #[error("unknown type `{0}`")]
    UnknownType(String),
    /// An indexed manifest pointed past the known and discovered types.
    #[error("type index {0} was never assigned")]
    UnknownTypeIndex(u16),
    /// A member handle named a field or method the type doesn't declare.
    #[error("type `{type_name}` has no member `{member}`")]
    UnknownMember { type_name: String, member: String },
    /// An object reference points to an id that was never registered.
    #[error("object reference {0} was never registered")]
    DanglingReference(u32),
    /// An object reference points to an object that is still being
    /// constructed and cannot be shared yet.
    #[error("object reference {0} points to an incomplete object")]
    UnresolvedReference(u32),
    /// The same object instance was tracked twice in one session.
    #[error("object instance was tracked twice in one session")]
    DuplicateTracking,
    /// Factories and surrogates can only be registered before the first
    /// session was started.
    #[error("serializer configuration is frozen after first use")]
    Frozen,

    /// A value was handed to a serializer built for a different shape.
    #[error("expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },
    /// A version manifest was read for a type whose serializer cannot adapt
    /// to a different field layout.
    #[error("type `{0}` does not support version manifests")]
    ManifestMismatch(String),
    /// More distinct types were written in one session than an indexed
    /// manifest can address.
    #[error("too many distinct types in one session")]
    TooManyTypes,
    /// Without reference preservation, an object contained itself.
    #[error("cycle detected at type `{0}`; enable reference preservation")]
    CycleDetected(String),
    /// The object graph nested deeper than the configured limit.
    #[error("object graph nested deeper than {0} levels")]
    DepthLimitExceeded(usize),

    /// Tried to deserialize a string but it contained invalid UTF-8.
    #[error("invalid utf-8 in data for string")]
    InvalidUtf8,
    /// Tried to deserialize a [`char`] value but its code was invalid.
    #[error("invalid char code")]
    InvalidChar,
    /// Tried to deserialize a [`bool`] value but it wasn't 0 or 1.
    #[error("invalid bool value")]
    InvalidBool,
    /// Tried to deserialize a date/time or duration outside its valid range.
    #[error("invalid date/time value")]
    InvalidDateTime,
    /// While reading LEB128 integer data, the data overflowed the target type.
    #[error("LEB encoded integer overflows target type")]
    IntegerOverflow,
    /// Past the end of the deserialized value were trailing bytes.
    #[error("trailing bytes past the end of the deserialized value: {0}")]
    TrailingBytes(usize),
}

impl Error {
    /// Creates an [`Error::Custom`] from any displayable message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
