//! Call and construct dispatch, spread materialization, rest arrays.

use core_types::{EvalResult, JsError, Value};

use crate::context::Context;

fn require_callable(cx: &dyn Context, callee: &Value, what: &str) -> EvalResult<()> {
    let callable = matches!(callee, Value::Object(id) if cx.heap().get(*id).is_callable());
    if callable {
        Ok(())
    } else {
        Err(JsError::type_error(format!("{} is not {}", callee, what)))
    }
}

/// Ordinary call.
pub fn call(
    cx: &mut dyn Context,
    callee: &Value,
    this: &Value,
    args: &[Value],
) -> EvalResult<Value> {
    require_callable(cx, callee, "a function")?;
    cx.invoke(callee.clone(), this.clone(), args)
}

/// Constructing call (`new`).
pub fn construct(
    cx: &mut dyn Context,
    callee: &Value,
    args: &[Value],
    new_target: &Value,
) -> EvalResult<Value> {
    require_callable(cx, callee, "a constructor")?;
    cx.construct(callee.clone(), args, new_target.clone())
}

/// Spread call: the argument array has already been materialized by
/// `OptimizeSpreadCall` or the iterator protocol.
pub fn spread_call(
    cx: &mut dyn Context,
    callee: &Value,
    this: &Value,
    args_array: &Value,
) -> EvalResult<Value> {
    let args = spread_arguments(cx, args_array)?;
    call(cx, callee, this, &args)
}

/// Spread construct (`new f(...args)`).
pub fn spread_construct(
    cx: &mut dyn Context,
    callee: &Value,
    args_array: &Value,
    new_target: &Value,
) -> EvalResult<Value> {
    let args = spread_arguments(cx, args_array)?;
    construct(cx, callee, &args, new_target)
}

fn spread_arguments(cx: &dyn Context, args_array: &Value) -> EvalResult<Vec<Value>> {
    let id = args_array
        .as_object()
        .ok_or_else(|| JsError::type_error("spread argument is not an object"))?;
    Ok(cx.heap().get(id).elements.clone())
}

/// Materializes the rest parameter: an array of the actuals past the
/// formal-parameter count.
pub fn rest(cx: &mut dyn Context, actuals: &[Value], formal_count: usize) -> EvalResult<Value> {
    let extra = &actuals[formal_count.min(actuals.len())..];
    let id = cx.heap_mut().alloc_array(0);
    cx.heap_mut().get_mut(id).elements.extend_from_slice(extra);
    Ok(Value::Object(id))
}
