//! Stubs and the per-unit stub arena.

use std::rc::Rc;

use arrayvec::ArrayVec;
use core_types::{EvalResult, ObjectId, PropertyKey, Value};
use memory_manager::{Edge, OperandShape, Tracer};

use crate::cache_state::CacheState;
use crate::engine::Engine;
use crate::kind::{OpKind, SitePayload};

/// Maximum number of guarded operand positions per stub.
pub const MAX_GUARDS: usize = 4;

/// Guard tuple: one expected shape per guarded operand position,
/// compared against the leading operands at dispatch time.
pub type Guards = ArrayVec<OperandShape, MAX_GUARDS>;

/// The executable behavior of a specialized stub.
///
/// Produced by a [`CodeGenerator`](crate::specializer::CodeGenerator);
/// runs only after the stub's guards matched.
pub type StubEffect = Rc<dyn Fn(&mut Engine, &[Value]) -> EvalResult<Value>>;

/// What the specializer asks the code generator to build.
#[derive(Clone)]
pub struct StubDescription {
    /// Kind of the owning site.
    pub kind: OpKind,
    /// Site metadata snapshot the effect is compiled against.
    pub payload: SitePayload,
    /// Guard tuple over the leading operands.
    pub guards: Guards,
    /// Property key captured at attach time, if the stub is key-specific.
    pub key: Option<PropertyKey>,
    /// Template object captured at attach time.
    pub template: Option<ObjectId>,
    /// Whether the stub's effect can re-enter the call machinery.
    pub makes_gc_calls: bool,
}

impl std::fmt::Debug for StubDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubDescription")
            .field("kind", &self.kind)
            .field("guards", &self.guards)
            .field("key", &self.key)
            .field("template", &self.template)
            .field("makes_gc_calls", &self.makes_gc_calls)
            .finish()
    }
}

/// A stub description committed to executable form.
pub struct CompiledStub {
    /// The dispatchable effect.
    pub effect: StubEffect,
}

/// A guarded fast path at the head segment of a chain.
pub struct SpecializedStub {
    pub(crate) guards: Guards,
    pub(crate) effect: StubEffect,
    pub(crate) next: Option<StubHandle>,
    pub(crate) key: Option<PropertyKey>,
    pub(crate) template: Option<ObjectId>,
    pub(crate) makes_gc_calls: bool,
}

impl SpecializedStub {
    pub(crate) fn new(desc: &StubDescription, effect: StubEffect) -> Self {
        SpecializedStub {
            guards: desc.guards.clone(),
            effect,
            next: None,
            key: desc.key.clone(),
            template: desc.template,
            makes_gc_calls: desc.makes_gc_calls,
        }
    }

    /// Tests the guard tuple against the leading operand shapes.
    pub fn guards_match(&self, shapes: &[OperandShape]) -> bool {
        self.guards.len() <= shapes.len()
            && self.guards.iter().zip(shapes).all(|(g, s)| g == s)
    }

    /// The guard tuple.
    pub fn guards(&self) -> &Guards {
        &self.guards
    }

    /// GC edges held by this stub.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for guard in &self.guards {
            if let OperandShape::Object(shape) = guard {
                edges.push(Edge::Shape(*shape));
            }
        }
        if let Some(template) = self.template {
            edges.push(Edge::Object(template));
        }
        edges
    }

    /// Reports this stub's edges to a tracer.
    pub fn trace(&self, tracer: &mut Tracer) {
        for edge in self.edges() {
            match edge {
                Edge::Object(id) => tracer.trace_object(id),
                Edge::Shape(id) => tracer.trace_shape(id),
            }
        }
    }
}

impl std::fmt::Debug for SpecializedStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecializedStub")
            .field("guards", &self.guards)
            .field("next", &self.next)
            .field("key", &self.key)
            .field("template", &self.template)
            .field("makes_gc_calls", &self.makes_gc_calls)
            .finish()
    }
}

/// The permanent generic tail of a chain.
///
/// References the runtime-wide trampoline for its kind (by kind index)
/// and owns the site's cache state, entered count and, for a few kinds,
/// a cached template object.
#[derive(Debug)]
pub struct FallbackStub {
    kind: OpKind,
    state: CacheState,
    entered_count: u64,
    template: Option<ObjectId>,
}

impl FallbackStub {
    /// Fresh fallback stub for a site of the given kind.
    pub fn new(kind: OpKind) -> Self {
        FallbackStub {
            kind,
            state: CacheState::new(),
            entered_count: 0,
            template: None,
        }
    }

    /// Kind of the owning site; also the trampoline-table index.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// The site's cache state.
    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// Mutable cache state.
    pub fn state_mut(&mut self) -> &mut CacheState {
        &mut self.state
    }

    /// Times the generic path has run for this site.
    pub fn entered_count(&self) -> u64 {
        self.entered_count
    }

    pub(crate) fn increment_entered_count(&mut self) {
        self.entered_count += 1;
    }

    /// Cached template object, for NewArray/NewObject/Rest sites.
    pub fn template(&self) -> Option<ObjectId> {
        self.template
    }

    pub(crate) fn set_template(&mut self, template: ObjectId) {
        self.template = Some(template);
    }

    /// Reports the fallback stub's edges to a tracer.
    pub fn trace(&self, tracer: &mut Tracer) {
        if let Some(template) = self.template {
            tracer.trace_object(template);
        }
    }
}

/// Generation-counted handle into a [`StubSpace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct SpaceSlot {
    generation: u32,
    stub: Option<SpecializedStub>,
    retired: bool,
}

/// Per-unit arena for specialized stubs.
///
/// Unlinked stubs are retired, not freed: the slot stops resolving
/// immediately, but its storage is only returned to the free list when
/// [`StubSpace::note_safe_point`] establishes that no activation can
/// still resume into it.
#[derive(Debug, Default)]
pub struct StubSpace {
    slots: Vec<SpaceSlot>,
    free: Vec<u32>,
    pending_free: Vec<u32>,
}

impl StubSpace {
    /// An empty arena.
    pub fn new() -> Self {
        StubSpace::default()
    }

    /// Inserts a stub, reusing a free slot when one exists.
    pub fn insert(&mut self, stub: SpecializedStub) -> StubHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.stub = Some(stub);
            slot.retired = false;
            StubHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(SpaceSlot {
                generation: 0,
                stub: Some(stub),
                retired: false,
            });
            StubHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Resolves a handle. Retired or stale handles resolve to nothing.
    pub fn get(&self, handle: StubHandle) -> Option<&SpecializedStub> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation || slot.retired {
            return None;
        }
        slot.stub.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: StubHandle) -> Option<&mut SpecializedStub> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.retired {
            return None;
        }
        slot.stub.as_mut()
    }

    /// Retires a handle: excluded from resolution at once, storage kept
    /// until the next safe point.
    pub fn retire(&mut self, handle: StubHandle) {
        let slot = &mut self.slots[handle.index as usize];
        assert_eq!(
            slot.generation, handle.generation,
            "retiring a stale stub handle"
        );
        assert!(!slot.retired, "retiring a stub twice");
        slot.retired = true;
        self.pending_free.push(handle.index);
    }

    /// Frees every retired slot; no activation can reference them anymore.
    pub fn note_safe_point(&mut self) {
        for index in self.pending_free.drain(..) {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.stub = None;
            slot.retired = false;
            self.free.push(index);
        }
    }

    /// Number of slots awaiting the next safe point.
    pub fn pending_free(&self) -> usize {
        self.pending_free.len()
    }

    /// Total slots ever allocated, reused or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Reports edges of every stub still physically present, including
    /// retired ones an in-flight activation may reference.
    pub fn trace(&self, tracer: &mut Tracer) {
        for slot in &self.slots {
            if let Some(stub) = &slot.stub {
                stub.trace(tracer);
            }
        }
    }

    /// Edges of every stub still physically present.
    pub fn all_edges(&self) -> Vec<Edge> {
        self.slots
            .iter()
            .filter_map(|s| s.stub.as_ref())
            .flat_map(|s| s.edges())
            .collect()
    }
}
