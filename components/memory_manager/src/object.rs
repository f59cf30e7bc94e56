//! Heap object representation.

use core_types::{FunctionId, ObjectId, Value};

use crate::shape::ShapeId;
use crate::trace::{TraceEdges, Tracer};

/// Coarse classification of a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Ordinary object.
    Plain,
    /// Array with dense elements.
    Array,
    /// Callable object backed by a host function.
    Function,
    /// Environment record on a scope chain.
    Environment,
}

/// A named property slot: plain data or an accessor pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Data slot holding a value.
    Data(Value),
    /// Accessor slot holding function objects.
    Accessor {
        /// Getter function object, if any.
        getter: Option<ObjectId>,
        /// Setter function object, if any.
        setter: Option<ObjectId>,
    },
}

/// A heap-allocated object: shape, named slots, dense elements, prototype.
///
/// Named properties live in `slots` at the offsets the object's shape
/// dictates; integer-keyed properties live in the dense `elements` vector
/// and do not affect the shape.
#[derive(Debug)]
pub struct JsObject {
    /// Current layout.
    pub shape: ShapeId,
    /// Named property storage, indexed per the shape's table.
    pub slots: Vec<Slot>,
    /// Dense element storage.
    pub elements: Vec<Value>,
    /// Prototype link (also the enclosing-scope link for environments).
    pub prototype: Option<ObjectId>,
    /// Backing host function for callables.
    pub function: Option<FunctionId>,
    /// Object classification.
    pub kind: ObjectKind,
}

impl JsObject {
    /// Creates an empty object of the given kind and root shape.
    pub fn new(kind: ObjectKind, shape: ShapeId) -> Self {
        JsObject {
            shape,
            slots: Vec::new(),
            elements: Vec::new(),
            prototype: None,
            function: None,
            kind,
        }
    }

    /// Returns true if the object is callable.
    pub fn is_callable(&self) -> bool {
        self.function.is_some()
    }

    /// Reads a dense element, `Undefined` past the end.
    pub fn element(&self, index: u32) -> Value {
        self.elements
            .get(index as usize)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Writes a dense element, growing with `Undefined` as needed.
    pub fn set_element(&mut self, index: u32, value: Value) {
        let index = index as usize;
        if index >= self.elements.len() {
            self.elements.resize(index + 1, Value::Undefined);
        }
        self.elements[index] = value;
    }

    /// True if the object has a dense element at `index`.
    pub fn has_element(&self, index: u32) -> bool {
        (index as usize) < self.elements.len()
    }
}

impl TraceEdges for JsObject {
    fn trace_edges(&self, tracer: &mut Tracer) {
        tracer.trace_shape(self.shape);
        if let Some(proto) = self.prototype {
            tracer.trace_object(proto);
        }
        for slot in &self.slots {
            match slot {
                Slot::Data(value) => tracer.trace_value(value),
                Slot::Accessor { getter, setter } => {
                    if let Some(g) = getter {
                        tracer.trace_object(*g);
                    }
                    if let Some(s) = setter {
                        tracer.trace_object(*s);
                    }
                }
            }
        }
        for element in &self.elements {
            tracer.trace_value(element);
        }
    }
}
