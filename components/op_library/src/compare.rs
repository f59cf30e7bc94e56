//! Relational, loose and strict comparison.

use std::cmp::Ordering;

use core_types::{EvalResult, Value};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

use crate::context::Context;
use crate::convert::{to_number, to_numeric, to_primitive, PrimitiveHint};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
}

/// Evaluates a comparison operator.
pub fn compare(cx: &mut dyn Context, op: CompareOp, lhs: &Value, rhs: &Value) -> EvalResult<bool> {
    match op {
        CompareOp::Eq => loose_equals(cx, lhs, rhs),
        CompareOp::Ne => Ok(!loose_equals(cx, lhs, rhs)?),
        CompareOp::StrictEq => Ok(strict_equals(lhs, rhs)),
        CompareOp::StrictNe => Ok(!strict_equals(lhs, rhs)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            relational(cx, op, lhs, rhs)
        }
    }
}

fn relational(cx: &mut dyn Context, op: CompareOp, lhs: &Value, rhs: &Value) -> EvalResult<bool> {
    let lp = to_primitive(cx, lhs, PrimitiveHint::Number)?;
    let rp = to_primitive(cx, rhs, PrimitiveHint::Number)?;

    let ordering = if let (Value::String(a), Value::String(b)) = (&lp, &rp) {
        Some(a.as_str().cmp(b.as_str()))
    } else {
        numeric_ordering(cx, &lp, &rp)?
    };
    Ok(match (op, ordering) {
        (_, None) => false,
        (CompareOp::Lt, Some(o)) => o == Ordering::Less,
        (CompareOp::Le, Some(o)) => o != Ordering::Greater,
        (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
        (CompareOp::Ge, Some(o)) => o != Ordering::Less,
        _ => unreachable!("relational called with an equality operator"),
    })
}

/// Numeric ordering of two primitives; `None` when either side is NaN.
fn numeric_ordering(
    cx: &mut dyn Context,
    lhs: &Value,
    rhs: &Value,
) -> EvalResult<Option<Ordering>> {
    let ln = to_numeric(cx, lhs)?;
    let rn = to_numeric(cx, rhs)?;
    Ok(match (ln, rn) {
        (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(&b)),
        (Value::BigInt(a), b) => {
            let b = to_number(cx, &b)?;
            bigint_f64_ordering(&a, b)
        }
        (a, Value::BigInt(b)) => {
            let a = to_number(cx, &a)?;
            bigint_f64_ordering(&b, a).map(Ordering::reverse)
        }
        (a, b) => {
            let a = to_number(cx, &a)?;
            let b = to_number(cx, &b)?;
            a.partial_cmp(&b)
        }
    })
}

fn bigint_f64_ordering(big: &BigInt, n: f64) -> Option<Ordering> {
    if n.is_nan() {
        return None;
    }
    if n == f64::INFINITY {
        return Some(Ordering::Less);
    }
    if n == f64::NEG_INFINITY {
        return Some(Ordering::Greater);
    }
    // Compare exactly: the fractional part only matters on equality.
    let trunc = BigInt::from_f64(n.trunc())?;
    match big.cmp(&trunc) {
        Ordering::Equal => {
            let fract = n.fract();
            if fract > 0.0 {
                Some(Ordering::Less)
            } else if fract < 0.0 {
                Some(Ordering::Greater)
            } else {
                Some(Ordering::Equal)
            }
        }
        other => Some(other),
    }
}

/// Strict equality (`===`). Never runs user code.
pub fn strict_equals(lhs: &Value, rhs: &Value) -> bool {
    if lhs.is_number() && rhs.is_number() {
        // f64 equality already gives the right NaN and -0.0 answers.
        return lhs.as_number() == rhs.as_number();
    }
    match (lhs, rhs) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        (Value::BigInt(a), Value::BigInt(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => false,
    }
}

/// Loose equality (`==`), including the object-to-primitive and
/// BigInt-to-Number bridging rules.
pub fn loose_equals(cx: &mut dyn Context, lhs: &Value, rhs: &Value) -> EvalResult<bool> {
    match (lhs, rhs) {
        // Same-family comparisons collapse to strict equality.
        _ if lhs.is_number() && rhs.is_number() => Ok(strict_equals(lhs, rhs)),
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => Ok(true),
        (Value::String(_), Value::String(_))
        | (Value::Symbol(_), Value::Symbol(_))
        | (Value::BigInt(_), Value::BigInt(_))
        | (Value::Boolean(_), Value::Boolean(_))
        | (Value::Object(_), Value::Object(_)) => Ok(strict_equals(lhs, rhs)),

        (Value::Boolean(b), other) | (other, Value::Boolean(b)) => {
            let n = Value::number(if *b { 1.0 } else { 0.0 });
            loose_equals(cx, &n, other)
        }
        (Value::String(s), other @ (Value::Smi(_) | Value::Double(_)))
        | (other @ (Value::Smi(_) | Value::Double(_)), Value::String(s)) => {
            let n = to_number(cx, &Value::String(s.clone()))?;
            Ok(strict_equals(&Value::number(n), other))
        }
        (Value::BigInt(big), Value::String(s)) | (Value::String(s), Value::BigInt(big)) => {
            Ok(match s.trim().parse::<BigInt>() {
                Ok(parsed) => parsed == *big,
                Err(_) => false,
            })
        }
        (Value::BigInt(big), other) | (other, Value::BigInt(big))
            if other.is_number() =>
        {
            let n = other.as_number().unwrap_or(f64::NAN);
            Ok(bigint_f64_ordering(big, n) == Some(Ordering::Equal))
        }
        (Value::Object(_), other) if !other.is_object() && !other.is_nullish() => {
            let prim = to_primitive(cx, lhs, PrimitiveHint::Number)?;
            loose_equals(cx, &prim, rhs)
        }
        (other, Value::Object(_)) if !other.is_object() && !other.is_nullish() => {
            let prim = to_primitive(cx, rhs, PrimitiveHint::Number)?;
            loose_equals(cx, lhs, &prim)
        }
        _ => Ok(false),
    }
}
