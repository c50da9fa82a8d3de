//! The numeric boundary.
//!
//! All arithmetic the evaluator performs goes through [`NumericAdapter`],
//! so the scalar engine can be swapped without touching evaluation. The
//! in-tree [`ExactAdapter`] delegates to the exact `i64`/`f64` arithmetic
//! of the core crate; an adapter backed by a bignum or interval library
//! plugs in the same way.

use std::cmp::Ordering;

use tungsten_core::{number, NumericError, Value};

/// Scalar shapes exchanged with an external numeric engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalValue {
    Int(i64),
    /// Numerator and nonzero denominator; not necessarily reduced.
    Ratio(i64, i64),
    Float(f64),
    Complex { re: f64, im: f64 },
}

/// Numeric services consumed by the evaluator.
///
/// Methods returning `Option` answer `None` for terms outside the numeric
/// domain, which the evaluator treats as "leave symbolic".
pub trait NumericAdapter: Send {
    /// Whether a numeric term is exact. `None` for non-numbers.
    fn is_exact(&self, v: &Value) -> Option<bool>;

    /// Total order on real-valued numbers; `None` when either term is not
    /// comparable (complex or non-numeric).
    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering>;

    /// Numeric equality across kinds, so `1 == 1.0` holds.
    fn equal(&self, a: &Value, b: &Value) -> Option<bool>;

    fn add(&self, a: &Value, b: &Value) -> Result<Value, NumericError>;

    fn multiply(&self, a: &Value, b: &Value) -> Result<Value, NumericError>;

    fn power(&self, base: &Value, exponent: &Value) -> Result<Value, NumericError>;

    /// Lower a numeric atom into the exchange representation.
    fn to_external(&self, v: &Value) -> Option<ExternalValue>;

    /// Lift an exchange value back into a term.
    fn from_external(&self, x: &ExternalValue) -> Value;
}

/// Adapter over the in-tree exact arithmetic.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactAdapter;

impl NumericAdapter for ExactAdapter {
    fn is_exact(&self, v: &Value) -> Option<bool> {
        number::is_exact(v)
    }

    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        number::num_cmp(a, b)
    }

    fn equal(&self, a: &Value, b: &Value) -> Option<bool> {
        number::num_eq(a, b)
    }

    fn add(&self, a: &Value, b: &Value) -> Result<Value, NumericError> {
        number::num_add(a, b)
    }

    fn multiply(&self, a: &Value, b: &Value) -> Result<Value, NumericError> {
        number::num_mul(a, b)
    }

    fn power(&self, base: &Value, exponent: &Value) -> Result<Value, NumericError> {
        number::num_pow(base, exponent)
    }

    fn to_external(&self, v: &Value) -> Option<ExternalValue> {
        match v {
            Value::Integer(n) => Some(ExternalValue::Int(*n)),
            Value::Rational { num, den } => Some(ExternalValue::Ratio(*num, *den)),
            Value::Real { value, .. } => Some(ExternalValue::Float(*value)),
            Value::Complex { re, im } => Some(ExternalValue::Complex {
                re: re.round_to_float()?,
                im: im.round_to_float()?,
            }),
            _ => None,
        }
    }

    fn from_external(&self, x: &ExternalValue) -> Value {
        match x {
            ExternalValue::Int(n) => Value::int(*n),
            ExternalValue::Ratio(num, den) => Value::rational(*num, *den),
            ExternalValue::Float(f) => Value::real(*f),
            ExternalValue::Complex { re, im } => {
                Value::complex(Value::real(*re), Value::real(*im))
            }
        }
    }
}
