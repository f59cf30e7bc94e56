//! Object model and GC edge discipline for the inline-cache engine.
//!
//! This crate provides:
//! - Shape (hidden class) registry with a shared transition tree
//! - Heap-owned objects with data/accessor slots and dense elements
//! - Operand shape descriptors used as inline-cache guard keys
//! - GC edge tracing and the pre-write barrier log applied before cache
//!   chain mutations remove object references

#![warn(missing_docs)]
#![warn(clippy::all)]

mod barriers;
mod heap;
mod object;
mod shape;
mod trace;

pub use barriers::BarrierLog;
pub use heap::{Heap, SymbolInfo};
pub use object::{JsObject, ObjectKind, Slot};
pub use shape::{OperandShape, PropertySlot, ShapeId, ShapeRegistry, SlotKind};
pub use trace::{Edge, TraceEdges, Tracer};
