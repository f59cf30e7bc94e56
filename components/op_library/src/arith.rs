//! Unary and binary arithmetic, including the BigInt arm of every
//! operator and the no-mixing rule between BigInt and Number operands.

use core_types::{EvalResult, JsError, Value};
use num_bigint::BigInt;
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};

use crate::context::Context;
use crate::convert::{to_int32, to_number, to_numeric, to_primitive, to_string, to_uint32};
use crate::convert::PrimitiveHint;

/// Unary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `~x`
    BitNot,
    /// `+x`
    Pos,
    /// `-x`
    Neg,
    /// `++x` / `x++` (the numeric step; old-value plumbing is the caller's)
    Inc,
    /// `--x` / `x--`
    Dec,
    /// Bare ToNumeric, used before compound assignment.
    ToNumeric,
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+` (concatenation when either primitive operand is a string)
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `<<`
    Lsh,
    /// `>>`
    Rsh,
    /// `>>>` (throws on BigInt operands)
    Ursh,
}

/// Evaluates a unary arithmetic operator.
pub fn unary_arith(cx: &mut dyn Context, op: UnaryOp, value: &Value) -> EvalResult<Value> {
    let numeric = to_numeric(cx, value)?;
    match numeric {
        Value::BigInt(n) => unary_bigint(op, n),
        other => {
            let n = to_number(cx, &other)?;
            Ok(match op {
                UnaryOp::BitNot => Value::number(!to_int32(n) as f64),
                UnaryOp::Pos | UnaryOp::ToNumeric => Value::number(n),
                UnaryOp::Neg => Value::number(-n),
                UnaryOp::Inc => Value::number(n + 1.0),
                UnaryOp::Dec => Value::number(n - 1.0),
            })
        }
    }
}

fn unary_bigint(op: UnaryOp, n: BigInt) -> EvalResult<Value> {
    Ok(match op {
        UnaryOp::BitNot => Value::BigInt(-(n + BigInt::one())),
        UnaryOp::Pos => {
            return Err(JsError::type_error("cannot convert a BigInt to a number"));
        }
        UnaryOp::Neg => Value::BigInt(-n),
        UnaryOp::Inc => Value::BigInt(n + BigInt::one()),
        UnaryOp::Dec => Value::BigInt(n - BigInt::one()),
        UnaryOp::ToNumeric => Value::BigInt(n),
    })
}

/// Evaluates a binary arithmetic or bitwise operator.
pub fn binary_arith(
    cx: &mut dyn Context,
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
) -> EvalResult<Value> {
    if op == BinaryOp::Add {
        let lp = to_primitive(cx, lhs, PrimitiveHint::Number)?;
        let rp = to_primitive(cx, rhs, PrimitiveHint::Number)?;
        if matches!(lp, Value::String(_)) || matches!(rp, Value::String(_)) {
            let mut s = to_string(cx, &lp)?;
            s.push_str(&to_string(cx, &rp)?);
            return Ok(Value::String(s));
        }
        return numeric_binary(cx, op, &lp, &rp);
    }
    numeric_binary(cx, op, lhs, rhs)
}

fn numeric_binary(
    cx: &mut dyn Context,
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
) -> EvalResult<Value> {
    let ln = to_numeric(cx, lhs)?;
    let rn = to_numeric(cx, rhs)?;
    match (ln, rn) {
        (Value::BigInt(a), Value::BigInt(b)) => bigint_binary(op, a, b),
        (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Err(JsError::type_error(
            "cannot mix BigInt and other types, use explicit conversions",
        )),
        (a, b) => {
            let a = to_number(cx, &a)?;
            let b = to_number(cx, &b)?;
            Ok(number_binary(op, a, b))
        }
    }
}

fn number_binary(op: BinaryOp, a: f64, b: f64) -> Value {
    match op {
        BinaryOp::Add => Value::number(a + b),
        BinaryOp::Sub => Value::number(a - b),
        BinaryOp::Mul => Value::number(a * b),
        BinaryOp::Div => Value::number(a / b),
        BinaryOp::Mod => Value::number(a % b),
        BinaryOp::Pow => Value::number(a.powf(b)),
        BinaryOp::BitOr => Value::number((to_int32(a) | to_int32(b)) as f64),
        BinaryOp::BitXor => Value::number((to_int32(a) ^ to_int32(b)) as f64),
        BinaryOp::BitAnd => Value::number((to_int32(a) & to_int32(b)) as f64),
        BinaryOp::Lsh => Value::number((to_int32(a) << (to_uint32(b) & 31)) as f64),
        BinaryOp::Rsh => Value::number((to_int32(a) >> (to_uint32(b) & 31)) as f64),
        BinaryOp::Ursh => Value::number((to_uint32(a) >> (to_uint32(b) & 31)) as f64),
    }
}

fn bigint_binary(op: BinaryOp, a: BigInt, b: BigInt) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(JsError::range_error("division by zero"));
            }
            a / b
        }
        BinaryOp::Mod => {
            if b.is_zero() {
                return Err(JsError::range_error("division by zero"));
            }
            a % b
        }
        BinaryOp::Pow => {
            if b.is_negative() {
                return Err(JsError::range_error("exponent must be non-negative"));
            }
            let exp = b
                .to_u32()
                .ok_or_else(|| JsError::range_error("exponent too large"))?;
            Pow::pow(a, exp)
        }
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::BitAnd => a & b,
        BinaryOp::Lsh => bigint_shift(a, &b, false)?,
        BinaryOp::Rsh => bigint_shift(a, &b, true)?,
        BinaryOp::Ursh => {
            return Err(JsError::type_error("BigInts have no unsigned right shift"));
        }
    };
    Ok(Value::BigInt(result))
}

fn bigint_shift(a: BigInt, b: &BigInt, right: bool) -> EvalResult<BigInt> {
    let amount = b
        .to_i64()
        .ok_or_else(|| JsError::range_error("shift amount too large"))?;
    // A negative shift count shifts the other way.
    let (amount, right) = if amount < 0 {
        (-amount as usize, !right)
    } else {
        (amount as usize, right)
    };
    Ok(if right { a >> amount } else { a << amount })
}
