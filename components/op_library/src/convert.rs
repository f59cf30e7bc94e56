//! Value coercions: ToBoolean, ToNumber, ToNumeric, ToString,
//! ToPropertyKey, ToPrimitive and `typeof`.

use core_types::{EvalResult, JsError, PropertyKey, Value};

use crate::context::Context;
use crate::objects::get_with_receiver;

/// Preferred result type handed to `ToPrimitive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveHint {
    /// Prefer a numeric result (`valueOf` first).
    Number,
    /// Prefer a string result (`toString` first).
    String,
}

/// ToBoolean. Never throws and never runs user code.
pub fn to_boolean(value: &Value) -> bool {
    value.is_truthy()
}

/// `typeof`, which needs the heap to tell callables from plain objects.
pub fn type_of(cx: &dyn Context, value: &Value) -> &'static str {
    if let Value::Object(id) = value {
        if cx.heap().get(*id).is_callable() {
            return "function";
        }
    }
    value.type_of()
}

/// ToPrimitive. Primitives pass through; objects run their `valueOf` /
/// `toString` methods in hint order until one returns a non-object.
pub fn to_primitive(
    cx: &mut dyn Context,
    value: &Value,
    hint: PrimitiveHint,
) -> EvalResult<Value> {
    let id = match value {
        Value::Object(id) => *id,
        _ => return Ok(value.clone()),
    };
    let order: [&str; 2] = match hint {
        PrimitiveHint::Number => ["valueOf", "toString"],
        PrimitiveHint::String => ["toString", "valueOf"],
    };
    for name in order {
        let method = get_with_receiver(cx, id, &PropertyKey::from(name), value)?;
        let callable = matches!(&method, Value::Object(m) if cx.heap().get(*m).is_callable());
        if callable {
            let result = cx.invoke(method, value.clone(), &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(JsError::type_error("cannot convert object to primitive value"))
}

/// ToNumber. BigInt and Symbol operands throw.
pub fn to_number(cx: &mut dyn Context, value: &Value) -> EvalResult<f64> {
    match value {
        Value::Undefined => Ok(f64::NAN),
        Value::Null => Ok(0.0),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Smi(n) => Ok(*n as f64),
        Value::Double(n) => Ok(*n),
        Value::String(s) => Ok(parse_number(s)),
        Value::Symbol(_) => Err(JsError::type_error("cannot convert a Symbol to a number")),
        Value::BigInt(_) => Err(JsError::type_error("cannot convert a BigInt to a number")),
        Value::Object(_) => {
            let prim = to_primitive(cx, value, PrimitiveHint::Number)?;
            to_number(cx, &prim)
        }
    }
}

/// ToNumeric: like ToNumber but BigInt operands stay BigInt.
pub fn to_numeric(cx: &mut dyn Context, value: &Value) -> EvalResult<Value> {
    let prim = to_primitive(cx, value, PrimitiveHint::Number)?;
    if matches!(prim, Value::BigInt(_)) {
        return Ok(prim);
    }
    Ok(Value::number(to_number(cx, &prim)?))
}

/// ToString. Symbol operands throw; BigInt prints without the `n` suffix.
pub fn to_string(cx: &mut dyn Context, value: &Value) -> EvalResult<String> {
    match value {
        Value::Symbol(_) => Err(JsError::type_error("cannot convert a Symbol to a string")),
        Value::BigInt(n) => Ok(n.to_string()),
        Value::Object(_) => {
            let prim = to_primitive(cx, value, PrimitiveHint::String)?;
            to_string(cx, &prim)
        }
        other => Ok(other.to_string()),
    }
}

/// ToPropertyKey: symbols stay symbols, integer-valued numbers in array
/// index range become index keys, everything else stringifies.
pub fn to_property_key(cx: &mut dyn Context, value: &Value) -> EvalResult<PropertyKey> {
    let prim = to_primitive(cx, value, PrimitiveHint::String)?;
    match prim {
        Value::Symbol(id) => Ok(PropertyKey::Symbol(id)),
        Value::Smi(n) if n >= 0 => Ok(PropertyKey::Index(n as u32)),
        Value::Double(n) => match PropertyKey::from_f64(n) {
            Some(key) => Ok(key),
            None => Ok(PropertyKey::from_str_key(&to_string(cx, &prim)?)),
        },
        other => Ok(PropertyKey::from_str_key(&to_string(cx, &other)?)),
    }
}

/// Modular conversion to a signed 32-bit integer, for bitwise operators.
pub(crate) fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// Modular conversion to an unsigned 32-bit integer.
pub(crate) fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let modulus = 2f64.powi(32);
    let r = n.trunc() % modulus;
    let r = if r < 0.0 { r + modulus } else { r };
    r as u32
}

fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return parse_radix(hex, 16);
    }
    if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
        return parse_radix(oct, 8);
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return parse_radix(bin, 2);
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_radix(digits: &str, radix: u32) -> f64 {
    match u64::from_str_radix(digits, radix) {
        Ok(n) => n as f64,
        Err(_) => f64::NAN,
    }
}
