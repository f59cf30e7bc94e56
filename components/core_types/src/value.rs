//! Dynamic-language value representation.
//!
//! This module provides the core `Value` enum that represents all possible
//! runtime values. Primitive values are stored inline, while objects are
//! referenced by id so the heap owns all object storage.

use crate::{ObjectId, SymbolId};
use num_bigint::BigInt;
use num_traits::Zero;
use std::fmt;

/// Represents any runtime value.
///
/// This enum uses a tagged representation for efficient value handling.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::Smi(42);
/// let float = Value::Double(3.14);
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(number.type_of(), "number");
/// assert_eq!(float.as_number(), Some(3.14));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The undefined value
    Undefined,
    /// The null value
    Null,
    /// Boolean (true or false)
    Boolean(bool),
    /// Small integer (fits in 32 bits, tagged representation)
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// String value
    String(String),
    /// Interned symbol
    Symbol(SymbolId),
    /// Arbitrary precision integer
    BigInt(BigInt),
    /// Heap-allocated object, referenced by id
    Object(ObjectId),
}

impl Value {
    /// Returns whether this value is truthy.
    ///
    /// Falsy values: undefined, null, false, 0 (including -0), NaN, "",
    /// and 0n. All other values are truthy, including all objects.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Smi(n) => *n != 0,
            Value::Double(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) => true,
            Value::BigInt(n) => !n.is_zero(),
            Value::Object(_) => true,
        }
    }

    /// Returns the `typeof` result for this value.
    ///
    /// `null` reports "object" (the historical quirk). Callables are the
    /// heap's business: object values report "object" here and the object
    /// model upgrades function objects to "function".
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Smi(_) => "number",
            Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::BigInt(_) => "bigint",
            Value::Object(_) => "object",
        }
    }

    /// Returns the numeric value if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Smi(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the object id if this is an object.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns true if this value is a number (Smi or Double).
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Smi(_) | Value::Double(_))
    }

    /// Returns true if this value is numeric (number or BigInt).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Smi(_) | Value::Double(_) | Value::BigInt(_))
    }

    /// Returns true if this value is an object.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Returns true if this value is null or undefined.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Wraps a double, downgrading integer-valued doubles to `Smi`.
    ///
    /// Negative zero stays a `Double` so its sign is preserved.
    pub fn number(n: f64) -> Value {
        let in_smi_range = n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64;
        if in_smi_range && !(n == 0.0 && n.is_sign_negative()) {
            Value::Smi(n as i32)
        } else {
            Value::Double(n)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    // Integer-valued doubles display without decimal point
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Symbol(id) => write!(f, "{}", id),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::Object(_) => write!(f, "[object Object]"),
        }
    }
}
