use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::types::TypeRef;
use crate::value::Value;

type ToFn = dyn Fn(&Value) -> Result<Value> + Send + Sync;
type FromFn = dyn Fn(Value) -> Result<Value> + Send + Sync;

/// Substitutes a type that can't be serialized directly with a carrier.
///
/// Values of the target type are converted into the carrier type before
/// writing and converted back after reading. Reference identity is tracked on
/// the target value, not on the transient carrier.
#[derive(Clone)]
pub struct Surrogate {
    target: TypeRef,
    carrier: TypeRef,
    to_surrogate: Arc<ToFn>,
    from_surrogate: Arc<FromFn>,
}

impl Surrogate {
    /// Creates a new surrogate for `target` values.
    ///
    /// `to_surrogate` must return a value of the `carrier` type, and
    /// `from_surrogate` must turn it back into a `target` value.
    pub fn new<F, G>(target: &TypeRef, carrier: &TypeRef, to_surrogate: F, from_surrogate: G) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
        G: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            target: Arc::clone(target),
            carrier: Arc::clone(carrier),
            to_surrogate: Arc::new(to_surrogate),
            from_surrogate: Arc::new(from_surrogate),
        }
    }

    pub fn target(&self) -> &TypeRef {
        &self.target
    }

    pub fn carrier(&self) -> &TypeRef {
        &self.carrier
    }

    /// Whether this surrogate applies to `ty`.
    pub fn applies_to(&self, ty: &TypeRef) -> bool {
        self.target.name() == ty.name()
    }

    /// Converts a target value into its carrier.
    ///
    /// # Errors
    ///
    /// Returns the conversion function's error.
    pub fn to_surrogate(&self, value: &Value) -> Result<Value> {
        (self.to_surrogate)(value)
    }

    /// Converts a carrier back into a target value.
    ///
    /// # Errors
    ///
    /// Returns the conversion function's error.
    pub fn from_surrogate(&self, carrier: Value) -> Result<Value> {
        (self.from_surrogate)(carrier)
    }
}

impl fmt::Debug for Surrogate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surrogate")
            .field("target", &self.target.name())
            .field("carrier", &self.carrier.name())
            .finish_non_exhaustive()
    }
}
