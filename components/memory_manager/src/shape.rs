//! Shape (hidden class) system for optimizing property access.
//!
//! Shapes enable fast property access by tracking object layout and using
//! offset-based lookups instead of hash table lookups. Objects with the same
//! properties added in the same order share a shape, and shapes form a
//! shared transition tree so the same sequence of additions always yields
//! the same `ShapeId`.

use core_types::{PropertyKey, Value};
use std::collections::HashMap;

use crate::Heap;

/// Identifier of a shape in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(pub u32);

/// Whether a slot holds a plain data value or an accessor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Ordinary data slot.
    Data,
    /// Getter/setter slot.
    Accessor,
}

/// Location of a named property within an object's slot vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySlot {
    /// Offset in the slots vector.
    pub index: u32,
    /// Data or accessor.
    pub kind: SlotKind,
}

#[derive(Debug)]
struct ShapeData {
    /// Number of named slots objects of this shape carry.
    slot_count: u32,
    /// Full key table for O(1) lookup.
    table: HashMap<PropertyKey, PropertySlot>,
    /// Shared transitions: adding `key` to this shape yields the same child
    /// shape every time.
    transitions: HashMap<(PropertyKey, SlotKind), ShapeId>,
}

/// Registry owning every shape and the transition tree between them.
///
/// # Example
///
/// ```
/// use memory_manager::{ShapeRegistry, SlotKind};
/// use core_types::PropertyKey;
///
/// let mut shapes = ShapeRegistry::new();
/// let root = shapes.root();
/// let (with_x, x_slot) = shapes.transition_add(root, PropertyKey::from("x"), SlotKind::Data);
/// let (with_xy, y_slot) = shapes.transition_add(with_x, PropertyKey::from("y"), SlotKind::Data);
///
/// assert_eq!(x_slot, 0);
/// assert_eq!(y_slot, 1);
/// assert_eq!(shapes.lookup(with_xy, &PropertyKey::from("x")).unwrap().index, 0);
///
/// // Same addition sequence shares the same shape.
/// let (again, _) = shapes.transition_add(root, PropertyKey::from("x"), SlotKind::Data);
/// assert_eq!(again, with_x);
/// ```
#[derive(Debug)]
pub struct ShapeRegistry {
    shapes: Vec<ShapeData>,
}

impl ShapeRegistry {
    /// Creates a registry containing only the empty root shape.
    pub fn new() -> Self {
        ShapeRegistry {
            shapes: vec![ShapeData {
                slot_count: 0,
                table: HashMap::new(),
                transitions: HashMap::new(),
            }],
        }
    }

    /// The empty root shape.
    pub fn root(&self) -> ShapeId {
        ShapeId(0)
    }

    /// Looks up a named property in a shape.
    pub fn lookup(&self, shape: ShapeId, key: &PropertyKey) -> Option<PropertySlot> {
        self.data(shape).table.get(key).copied()
    }

    /// Number of named slots an object of this shape carries.
    pub fn slot_count(&self, shape: ShapeId) -> u32 {
        self.data(shape).slot_count
    }

    /// Transitions `shape` by adding `key`, returning the child shape and
    /// the slot index the new property occupies.
    ///
    /// Transitions are shared: repeating the same addition from the same
    /// shape returns the existing child.
    pub fn transition_add(
        &mut self,
        shape: ShapeId,
        key: PropertyKey,
        kind: SlotKind,
    ) -> (ShapeId, u32) {
        debug_assert!(
            self.lookup(shape, &key).is_none(),
            "transition_add on a key the shape already has"
        );

        if let Some(&child) = self.data(shape).transitions.get(&(key.clone(), kind)) {
            let slot = self.data(child).slot_count - 1;
            return (child, slot);
        }

        let parent = self.data(shape);
        let slot = parent.slot_count;
        let mut table = parent.table.clone();
        table.insert(key.clone(), PropertySlot { index: slot, kind });

        let child = ShapeId(self.shapes.len() as u32);
        self.shapes.push(ShapeData {
            slot_count: slot + 1,
            table,
            transitions: HashMap::new(),
        });
        self.shapes[shape.0 as usize]
            .transitions
            .insert((key, kind), child);
        (child, slot)
    }

    fn data(&self, shape: ShapeId) -> &ShapeData {
        &self.shapes[shape.0 as usize]
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque, comparable descriptor of an operand's runtime layout.
///
/// Inline-cache guards compare operand shapes for equality; objects carry
/// their layout's `ShapeId`, primitives their type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// The undefined value.
    Undefined,
    /// The null value.
    Null,
    /// Any boolean.
    Boolean,
    /// Small integer.
    Smi,
    /// Double-precision number.
    Double,
    /// Any string.
    String,
    /// Any symbol.
    Symbol,
    /// Any BigInt.
    BigInt,
    /// Object with the given layout.
    Object(ShapeId),
}

impl OperandShape {
    /// Computes the shape descriptor of a value.
    pub fn of(value: &Value, heap: &Heap) -> OperandShape {
        match value {
            Value::Undefined => OperandShape::Undefined,
            Value::Null => OperandShape::Null,
            Value::Boolean(_) => OperandShape::Boolean,
            Value::Smi(_) => OperandShape::Smi,
            Value::Double(_) => OperandShape::Double,
            Value::String(_) => OperandShape::String,
            Value::Symbol(_) => OperandShape::Symbol,
            Value::BigInt(_) => OperandShape::BigInt,
            Value::Object(id) => OperandShape::Object(heap.shape_of(*id)),
        }
    }
}
