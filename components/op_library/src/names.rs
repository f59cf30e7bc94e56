//! Scoped name resolution over environment-record chains.
//!
//! Environments are heap objects of [`ObjectKind::Environment`] linked
//! through their prototype slot; the outermost record is the global
//! environment.

use core_types::{EvalResult, JsError, PropertyKey, Value};
use memory_manager::{ObjectKind, Slot};

use crate::context::Context;

/// GetName: resolves `name` along the environment chain, throwing a
/// ReferenceError when it is unbound.
pub fn get_name(cx: &mut dyn Context, env: &Value, name: &PropertyKey) -> EvalResult<Value> {
    let mut current = env_id(cx, env)?;
    loop {
        if let Some(slot) = cx.heap().lookup_own(current, name) {
            return match cx.heap().get(current).slots[slot.index as usize].clone() {
                Slot::Data(value) => Ok(value),
                Slot::Accessor { getter: None, .. } => Ok(Value::Undefined),
                Slot::Accessor {
                    getter: Some(g), ..
                } => cx.invoke(Value::Object(g), Value::Object(current), &[]),
            };
        }
        match cx.heap().get(current).prototype {
            Some(parent) => current = parent,
            None => {
                return Err(JsError::reference_error(format!("{} is not defined", name)));
            }
        }
    }
}

/// BindName: resolves the environment record that holds `name`.
///
/// An unbound name resolves to the outermost (global) record, where a
/// subsequent non-strict write would create the binding.
pub fn bind_name(cx: &mut dyn Context, env: &Value, name: &PropertyKey) -> EvalResult<Value> {
    let mut current = env_id(cx, env)?;
    loop {
        if cx.heap().lookup_own(current, name).is_some() {
            return Ok(Value::Object(current));
        }
        match cx.heap().get(current).prototype {
            Some(parent) => current = parent,
            None => return Ok(Value::Object(current)),
        }
    }
}

/// GetIntrinsic: a well-known binding provided by the host. A missing
/// intrinsic is an engine defect, not a program error.
pub fn get_intrinsic(cx: &mut dyn Context, name: &str) -> EvalResult<Value> {
    cx.intrinsic(name).ok_or_else(|| {
        JsError::new(
            core_types::ErrorKind::InternalError,
            format!("unknown intrinsic '{}'", name),
        )
    })
}

fn env_id(cx: &dyn Context, env: &Value) -> EvalResult<core_types::ObjectId> {
    match env.as_object() {
        Some(id) if cx.heap().get(id).kind == ObjectKind::Environment => Ok(id),
        _ => Err(JsError::new(
            core_types::ErrorKind::InternalError,
            "name lookup requires an environment record",
        )),
    }
}
