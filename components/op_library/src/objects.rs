//! Property access, object and array construction, `in` / `instanceof`,
//! private-field checks and the iterator protocol.

use core_types::{EvalResult, JsError, ObjectId, PropertyKey, SymbolId, Value};
use memory_manager::{Heap, ObjectKind, PropertySlot, Slot};

use crate::context::Context;
use crate::convert::{to_number, to_property_key};

/// How a property write behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFlavor {
    /// Ordinary assignment; `strict` controls whether failures throw.
    Set {
        /// Strict-mode assignment.
        strict: bool,
    },
    /// Object-literal / class-field initialization: defines an own
    /// property directly, ignoring setters and the prototype chain.
    Init,
}

/// Which presence condition a private-field check treats as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateFieldGuard {
    /// Throw when the field already exists (class-field initialization).
    ThrowIfPresent,
    /// Throw when the field is missing (private member access).
    ThrowIfAbsent,
}

/// Where a prototype-chain lookup found its hit.
enum Found {
    Slot(ObjectId, PropertySlot),
    Element(ObjectId, u32),
}

/// Walks the prototype chain looking for `key`.
fn lookup_chain(heap: &Heap, start: ObjectId, key: &PropertyKey) -> Option<Found> {
    let mut current = Some(start);
    while let Some(id) = current {
        if let PropertyKey::Index(index) = key {
            if heap.get(id).has_element(*index) {
                return Some(Found::Element(id, *index));
            }
        }
        if let Some(slot) = heap.lookup_own(id, key) {
            return Some(Found::Slot(id, slot));
        }
        current = heap.get(id).prototype;
    }
    None
}

/// Reads `key` starting at `start`, invoking getters with `receiver` as
/// their `this` value.
pub fn get_with_receiver(
    cx: &mut dyn Context,
    start: ObjectId,
    key: &PropertyKey,
    receiver: &Value,
) -> EvalResult<Value> {
    if matches!(key, PropertyKey::String(s) if s == "length")
        && cx.heap().get(start).kind == ObjectKind::Array
    {
        return Ok(Value::number(cx.heap().get(start).elements.len() as f64));
    }
    match lookup_chain(cx.heap(), start, key) {
        None => Ok(Value::Undefined),
        Some(Found::Element(holder, index)) => Ok(cx.heap().get(holder).element(index)),
        Some(Found::Slot(holder, slot)) => {
            match cx.heap().get(holder).slots[slot.index as usize].clone() {
                Slot::Data(value) => Ok(value),
                Slot::Accessor { getter: None, .. } => Ok(Value::Undefined),
                Slot::Accessor {
                    getter: Some(g), ..
                } => cx.invoke(Value::Object(g), receiver.clone(), &[]),
            }
        }
    }
}

/// GetProp / GetElem on an arbitrary base value.
pub fn get_property(cx: &mut dyn Context, value: &Value, key: &PropertyKey) -> EvalResult<Value> {
    match value {
        Value::Undefined | Value::Null => Err(JsError::type_error(format!(
            "cannot read properties of {} (reading '{}')",
            value, key
        ))),
        Value::String(s) => Ok(string_property(s, key)),
        Value::Object(id) => get_with_receiver(cx, *id, key, value),
        // No primitive wrapper objects in this model.
        _ => Ok(Value::Undefined),
    }
}

fn string_property(s: &str, key: &PropertyKey) -> Value {
    match key {
        PropertyKey::String(name) if name == "length" => {
            Value::number(s.chars().count() as f64)
        }
        PropertyKey::Index(i) => match s.chars().nth(*i as usize) {
            Some(c) => Value::String(c.to_string()),
            None => Value::Undefined,
        },
        _ => Value::Undefined,
    }
}

/// `super.name` read: lookup starts at the supplied super base, getters
/// see the original receiver.
pub fn get_prop_super(
    cx: &mut dyn Context,
    receiver: &Value,
    object: &Value,
    key: &PropertyKey,
) -> EvalResult<Value> {
    let id = object
        .as_object()
        .ok_or_else(|| JsError::type_error("super base is not an object"))?;
    get_with_receiver(cx, id, key, receiver)
}

/// GetElem: coerce the index to a property key, then read.
pub fn get_element(cx: &mut dyn Context, lhs: &Value, index: &Value) -> EvalResult<Value> {
    let key = to_property_key(cx, index)?;
    get_property(cx, lhs, &key)
}

/// SetProp and the write half of SetElem.
pub fn set_property(
    cx: &mut dyn Context,
    target: &Value,
    key: &PropertyKey,
    rhs: &Value,
    flavor: WriteFlavor,
) -> EvalResult<()> {
    let strict = matches!(flavor, WriteFlavor::Set { strict: true });
    let id = match target {
        Value::Undefined | Value::Null => {
            return Err(JsError::type_error(format!(
                "cannot set properties of {} (setting '{}')",
                target, key
            )));
        }
        Value::Object(id) => *id,
        _ => {
            // Writes to primitives are dropped; strict mode makes that an error.
            if strict {
                return Err(JsError::type_error(format!(
                    "cannot create property '{}' on {}",
                    key,
                    target.type_of()
                )));
            }
            return Ok(());
        }
    };

    if matches!(key, PropertyKey::String(s) if s == "length")
        && cx.heap().get(id).kind == ObjectKind::Array
    {
        return set_array_length(cx, id, rhs);
    }

    if matches!(flavor, WriteFlavor::Init) {
        cx.heap_mut().define_data_property(id, key.clone(), rhs.clone());
        return Ok(());
    }

    match lookup_chain(cx.heap(), id, key) {
        Some(Found::Slot(holder, slot)) => {
            match cx.heap().get(holder).slots[slot.index as usize].clone() {
                Slot::Accessor {
                    setter: Some(s), ..
                } => {
                    cx.invoke(Value::Object(s), target.clone(), &[rhs.clone()])?;
                    Ok(())
                }
                Slot::Accessor { setter: None, .. } => {
                    if strict {
                        Err(JsError::type_error(format!(
                            "cannot set property '{}' which has only a getter",
                            key
                        )))
                    } else {
                        Ok(())
                    }
                }
                Slot::Data(_) if holder == id => {
                    cx.heap_mut().get_mut(id).slots[slot.index as usize] =
                        Slot::Data(rhs.clone());
                    Ok(())
                }
                // Data property on a prototype: the write shadows it with
                // a new own property.
                Slot::Data(_) => {
                    cx.heap_mut().define_data_property(id, key.clone(), rhs.clone());
                    Ok(())
                }
            }
        }
        _ => {
            cx.heap_mut().define_data_property(id, key.clone(), rhs.clone());
            Ok(())
        }
    }
}

fn set_array_length(cx: &mut dyn Context, id: ObjectId, rhs: &Value) -> EvalResult<()> {
    let n = to_number(cx, rhs)?;
    let len = n as u32;
    if len as f64 != n {
        return Err(JsError::range_error("invalid array length"));
    }
    cx.heap_mut()
        .get_mut(id)
        .elements
        .resize(len as usize, Value::Undefined);
    Ok(())
}

/// SetElem: coerce the index, then write.
pub fn set_element(
    cx: &mut dyn Context,
    target: &Value,
    index: &Value,
    rhs: &Value,
    flavor: WriteFlavor,
) -> EvalResult<()> {
    let key = to_property_key(cx, index)?;
    set_property(cx, target, &key, rhs, flavor)
}

/// The `in` operator.
pub fn has_property(cx: &mut dyn Context, key: &Value, target: &Value) -> EvalResult<bool> {
    let id = target.as_object().ok_or_else(|| {
        JsError::type_error(format!(
            "cannot use 'in' operator to search for a property in {}",
            target
        ))
    })?;
    let key = to_property_key(cx, key)?;
    Ok(lookup_chain(cx.heap(), id, &key).is_some())
}

/// `Object.hasOwn` / `hasOwnProperty`: own properties only.
pub fn has_own(cx: &mut dyn Context, key: &Value, target: &Value) -> EvalResult<bool> {
    if target.is_nullish() {
        return Err(JsError::type_error("cannot convert undefined or null to object"));
    }
    let key = to_property_key(cx, key)?;
    let id = match target.as_object() {
        Some(id) => id,
        None => return Ok(false),
    };
    if let PropertyKey::Index(index) = key {
        if cx.heap().get(id).has_element(index) {
            return Ok(true);
        }
    }
    Ok(cx.heap().lookup_own(id, &key).is_some())
}

/// Checks presence of a private field, throwing per the guard flavor.
/// Returns whether the field is present.
pub fn check_private_field(
    cx: &mut dyn Context,
    target: &Value,
    key: &Value,
    guard: PrivateFieldGuard,
) -> EvalResult<bool> {
    let sym = match key {
        Value::Symbol(sym) if cx.heap().symbol(*sym).is_private => *sym,
        _ => {
            return Err(JsError::type_error("private field key must be a private name"));
        }
    };
    let id = target
        .as_object()
        .ok_or_else(|| private_field_error(cx, sym))?;
    let present = cx
        .heap()
        .lookup_own(id, &PropertyKey::Symbol(sym))
        .is_some();
    match guard {
        PrivateFieldGuard::ThrowIfPresent if present => Err(JsError::type_error(
            "cannot initialize private field twice on the same object",
        )),
        PrivateFieldGuard::ThrowIfAbsent if !present => Err(private_field_error(cx, sym)),
        _ => Ok(present),
    }
}

fn private_field_error(cx: &dyn Context, sym: SymbolId) -> JsError {
    JsError::type_error(format!(
        "cannot access private field {}: object is not an instance of the declaring class",
        cx.heap().symbol(sym).description
    ))
}

/// The `instanceof` operator.
pub fn instance_of(cx: &mut dyn Context, lhs: &Value, rhs: &Value) -> EvalResult<bool> {
    let ctor = match rhs.as_object() {
        Some(id) if cx.heap().get(id).is_callable() => id,
        _ => {
            return Err(JsError::type_error(
                "right-hand side of 'instanceof' is not callable",
            ));
        }
    };
    let prototype = get_with_receiver(cx, ctor, &PropertyKey::from("prototype"), rhs)?;
    let proto_id = prototype.as_object().ok_or_else(|| {
        JsError::type_error("constructor 'prototype' property is not an object")
    })?;

    let mut current = match lhs.as_object() {
        Some(id) => cx.heap().get(id).prototype,
        None => return Ok(false),
    };
    while let Some(id) = current {
        if id == proto_id {
            return Ok(true);
        }
        current = cx.heap().get(id).prototype;
    }
    Ok(false)
}

/// Allocates an empty plain object.
pub fn new_object(cx: &mut dyn Context) -> EvalResult<Value> {
    Ok(Value::Object(cx.heap_mut().alloc_object()))
}

/// Allocates an array of the given length, which must be a valid array
/// length.
pub fn new_array(cx: &mut dyn Context, length: &Value) -> EvalResult<Value> {
    let n = to_number(cx, length)?;
    let len = n as u32;
    if len as f64 != n {
        return Err(JsError::range_error("invalid array length"));
    }
    Ok(Value::Object(cx.heap_mut().alloc_array(len)))
}

/// GetIterator: fetch and call the `Symbol.iterator` method; the result
/// must be an object.
pub fn get_iterator(cx: &mut dyn Context, value: &Value) -> EvalResult<Value> {
    let method = get_property(cx, value, &PropertyKey::Symbol(SymbolId::ITERATOR))?;
    let callable = matches!(&method, Value::Object(m) if cx.heap().get(*m).is_callable());
    if !callable {
        return Err(JsError::type_error(format!("{} is not iterable", value)));
    }
    let iterator = cx.invoke(method, value.clone(), &[])?;
    if !iterator.is_object() {
        return Err(JsError::type_error("iterator result is not an object"));
    }
    Ok(iterator)
}

/// Decides whether a spread argument can skip the iterator protocol.
///
/// A dense array with no own `Symbol.iterator` override can be spread
/// directly from its elements; the answer is the array itself when
/// eligible and `undefined` otherwise.
pub fn optimize_spread_call(cx: &mut dyn Context, value: &Value) -> EvalResult<Value> {
    if let Some(id) = value.as_object() {
        let obj = cx.heap().get(id);
        let plain_array = obj.kind == ObjectKind::Array
            && cx
                .heap()
                .lookup_own(id, &PropertyKey::Symbol(SymbolId::ITERATOR))
                .is_none();
        if plain_array {
            return Ok(value.clone());
        }
    }
    Ok(Value::Undefined)
}
