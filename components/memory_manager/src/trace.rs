//! GC edge enumeration.
//!
//! The collector itself is an external collaborator; this layer only has to
//! make every live reference enumerable at any point where a collection may
//! run. A `Tracer` gathers the outgoing edges of whatever is passed to it.

use core_types::{ObjectId, Value};

use crate::shape::ShapeId;

/// A single outgoing GC edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Reference to a heap object.
    Object(ObjectId),
    /// Reference to a shape.
    Shape(ShapeId),
}

/// Collects outgoing edges during a trace pass.
#[derive(Debug, Default)]
pub struct Tracer {
    edges: Vec<Edge>,
}

impl Tracer {
    /// Creates an empty tracer.
    pub fn new() -> Self {
        Tracer::default()
    }

    /// Records an object edge.
    pub fn trace_object(&mut self, id: ObjectId) {
        self.edges.push(Edge::Object(id));
    }

    /// Records a shape edge.
    pub fn trace_shape(&mut self, id: ShapeId) {
        self.edges.push(Edge::Shape(id));
    }

    /// Records an edge for a value if it references the heap.
    pub fn trace_value(&mut self, value: &Value) {
        if let Value::Object(id) = value {
            self.trace_object(*id);
        }
    }

    /// All edges recorded so far.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// True if an edge to the given object was recorded.
    pub fn has_object(&self, id: ObjectId) -> bool {
        self.edges.contains(&Edge::Object(id))
    }

    /// True if an edge to the given shape was recorded.
    pub fn has_shape(&self, id: ShapeId) -> bool {
        self.edges.contains(&Edge::Shape(id))
    }
}

/// Implemented by anything holding GC references the collector must see.
pub trait TraceEdges {
    /// Enumerates every outgoing edge into the tracer.
    fn trace_edges(&self, tracer: &mut Tracer);
}
