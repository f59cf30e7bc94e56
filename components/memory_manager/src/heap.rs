//! Heap owning every object, shape and symbol.

use core_types::{FunctionId, ObjectId, PropertyKey, SymbolId, Value};

use crate::object::{JsObject, ObjectKind, Slot};
use crate::shape::{PropertySlot, ShapeId, ShapeRegistry, SlotKind};

/// Metadata of an interned symbol.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    /// Human-readable description.
    pub description: String,
    /// True for private-name symbols.
    pub is_private: bool,
}

/// The heap: object storage, shape registry and symbol table.
#[derive(Debug)]
pub struct Heap {
    objects: Vec<JsObject>,
    /// Shape registry shared by all objects.
    pub shapes: ShapeRegistry,
    symbols: Vec<SymbolInfo>,
}

impl Heap {
    /// Creates an empty heap with the well-known iterator symbol interned.
    pub fn new() -> Self {
        let mut heap = Heap {
            objects: Vec::new(),
            shapes: ShapeRegistry::new(),
            symbols: Vec::new(),
        };
        let iterator = heap.new_symbol("Symbol.iterator", false);
        debug_assert_eq!(iterator, SymbolId::ITERATOR);
        heap
    }

    /// Allocates a plain object.
    pub fn alloc_object(&mut self) -> ObjectId {
        self.alloc(ObjectKind::Plain)
    }

    /// Allocates an array with `length` undefined elements.
    pub fn alloc_array(&mut self, length: u32) -> ObjectId {
        let id = self.alloc(ObjectKind::Array);
        self.objects[id.0 as usize]
            .elements
            .resize(length as usize, Value::Undefined);
        id
    }

    /// Allocates a callable object backed by the given host function.
    pub fn alloc_function(&mut self, function: FunctionId) -> ObjectId {
        let id = self.alloc(ObjectKind::Function);
        self.objects[id.0 as usize].function = Some(function);
        id
    }

    /// Allocates an environment record whose enclosing scope is `parent`.
    pub fn alloc_environment(&mut self, parent: Option<ObjectId>) -> ObjectId {
        let id = self.alloc(ObjectKind::Environment);
        self.objects[id.0 as usize].prototype = parent;
        id
    }

    fn alloc(&mut self, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        let root = self.shapes.root();
        self.objects.push(JsObject::new(kind, root));
        id
    }

    /// Borrows an object. Panics on a dangling id; that is an engine defect,
    /// not a runtime condition.
    pub fn get(&self, id: ObjectId) -> &JsObject {
        &self.objects[id.0 as usize]
    }

    /// Mutably borrows an object.
    pub fn get_mut(&mut self, id: ObjectId) -> &mut JsObject {
        &mut self.objects[id.0 as usize]
    }

    /// Current shape of an object.
    pub fn shape_of(&self, id: ObjectId) -> ShapeId {
        self.get(id).shape
    }

    /// Interns a new symbol.
    pub fn new_symbol(&mut self, description: &str, is_private: bool) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolInfo {
            description: description.to_string(),
            is_private,
        });
        id
    }

    /// Metadata of an interned symbol.
    pub fn symbol(&self, id: SymbolId) -> &SymbolInfo {
        &self.symbols[id.0 as usize]
    }

    /// Looks up an own named property of an object.
    pub fn lookup_own(&self, id: ObjectId, key: &PropertyKey) -> Option<PropertySlot> {
        self.shapes.lookup(self.get(id).shape, key)
    }

    /// Defines or overwrites an own data property, transitioning the shape
    /// if the key is new. Index keys go to dense elements and leave the
    /// shape untouched.
    pub fn define_data_property(&mut self, id: ObjectId, key: PropertyKey, value: Value) {
        if let PropertyKey::Index(index) = key {
            self.get_mut(id).set_element(index, value);
            return;
        }
        match self.lookup_own(id, &key) {
            Some(slot) => {
                self.get_mut(id).slots[slot.index as usize] = Slot::Data(value);
            }
            None => {
                let shape = self.get(id).shape;
                let (new_shape, slot) = self.shapes.transition_add(shape, key, SlotKind::Data);
                let obj = self.get_mut(id);
                obj.shape = new_shape;
                debug_assert_eq!(obj.slots.len(), slot as usize);
                obj.slots.push(Slot::Data(value));
            }
        }
    }

    /// Defines an own accessor property.
    pub fn define_accessor_property(
        &mut self,
        id: ObjectId,
        key: PropertyKey,
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
    ) {
        let accessor = Slot::Accessor { getter, setter };
        match self.lookup_own(id, &key) {
            Some(slot) => {
                self.get_mut(id).slots[slot.index as usize] = accessor;
            }
            None => {
                let shape = self.get(id).shape;
                let (new_shape, slot) = self.shapes.transition_add(shape, key, SlotKind::Accessor);
                let obj = self.get_mut(id);
                obj.shape = new_shape;
                while obj.slots.len() < slot as usize {
                    obj.slots.push(Slot::Data(Value::Undefined));
                }
                obj.slots.push(accessor);
            }
        }
    }

    /// Number of objects allocated.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
