//! The engine: owns the heap, the per-unit cache scripts, the pluggable
//! specializer and backend, and the dispatch entry point that walks a
//! site's chain before falling through to the trampoline.

use std::collections::HashMap;
use std::rc::Rc;

use core_types::{EvalResult, FunctionId, JsError, ObjectId, PropertyKey, Value};
use memory_manager::{BarrierLog, Heap, OperandShape, Tracer};
use op_library::Context;
use tracing::debug;

use crate::cache_state::{CacheConfig, CacheMode};
use crate::kind::{OpSite, SiteId, UnitId};
use crate::script::IcScript;
use crate::specializer::{
    ClosureCodeGenerator, CodeGenerator, ShapeGuardSpecializer, Specializer,
};
use crate::stub_frame::StubFrames;
use crate::tier_bridge::{ResumePoint, ResumeVariant, TierBridge};
use crate::trampoline::TrampolineTable;

/// A host function body. Receives the engine for re-entrant dispatch,
/// the `this` value, and the argument slice.
pub type HostFn = Rc<dyn Fn(&mut Engine, Value, &[Value]) -> EvalResult<Value>>;

/// Inline-cache engine for one isolate's worth of units.
pub struct Engine {
    pub(crate) heap: Heap,
    pub(crate) config: CacheConfig,
    pub(crate) units: Vec<IcScript>,
    functions: Vec<HostFn>,
    intrinsics: HashMap<String, Value>,
    pub(crate) specializer: Box<dyn Specializer>,
    pub(crate) codegen: Box<dyn CodeGenerator>,
    pub(crate) tier: Option<Box<dyn TierBridge>>,
    barrier: BarrierLog,
    pub(crate) frames: StubFrames,
}

impl Engine {
    /// An engine with the default cache policy, specializer and backend.
    pub fn new() -> Self {
        Engine::with_config(CacheConfig::default())
    }

    /// An engine with an explicit cache policy.
    pub fn with_config(config: CacheConfig) -> Self {
        Engine {
            heap: Heap::new(),
            config,
            units: Vec::new(),
            functions: Vec::new(),
            intrinsics: HashMap::new(),
            specializer: Box::new(ShapeGuardSpecializer),
            codegen: Box::new(ClosureCodeGenerator),
            tier: None,
            barrier: BarrierLog::new(),
            frames: StubFrames::new(),
        }
    }

    /// Replaces the attach policy.
    pub fn set_specializer(&mut self, specializer: Box<dyn Specializer>) {
        self.specializer = specializer;
    }

    /// Replaces the stub backend.
    pub fn set_code_generator(&mut self, codegen: Box<dyn CodeGenerator>) {
        self.codegen = codegen;
    }

    /// Installs the optimizing-tier listener.
    pub fn set_tier_bridge(&mut self, tier: Box<dyn TierBridge>) {
        self.tier = Some(tier);
    }

    /// Registers a unit's operation sites and returns its id.
    pub fn add_unit(&mut self, sites: Vec<OpSite>) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        self.units.push(IcScript::new(sites, &mut self.heap));
        id
    }

    /// Registers a host function body and returns its callable value.
    pub fn register_function(
        &mut self,
        body: impl Fn(&mut Engine, Value, &[Value]) -> EvalResult<Value> + 'static,
    ) -> Value {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(Rc::new(body));
        Value::Object(self.heap.alloc_function(id))
    }

    /// Binds an intrinsic name resolvable through GetIntrinsic sites.
    pub fn define_intrinsic(&mut self, name: &str, value: Value) {
        self.intrinsics.insert(name.to_string(), value);
    }

    /// Executes one operation at a site.
    ///
    /// Walks the site's chain head to tail testing each stub's guards
    /// against the leading operand shapes; the first match runs that
    /// stub's effect. No match falls through to the kind's fallback
    /// handler from the process-wide trampoline table.
    ///
    /// Callers supply `operands` in the kind's fixed layout; a slice
    /// shorter than [`OpKind::min_operands`](crate::OpKind::min_operands) is a
    /// caller bug, checked in debug builds.
    pub fn dispatch(&mut self, site: SiteId, operands: &[Value]) -> EvalResult<Value> {
        debug_assert!(
            operands.len() >= self.unit(site.unit).entry(site.index).site().kind.min_operands(),
            "short operand slice for {}",
            self.unit(site.unit).entry(site.index).site().kind
        );
        let saved = self.frames.begin_invocation();
        let result = self.dispatch_inner(site, operands);
        self.frames.end_invocation(saved);
        result
    }

    fn dispatch_inner(&mut self, site: SiteId, operands: &[Value]) -> EvalResult<Value> {
        let shapes: Vec<OperandShape> = operands
            .iter()
            .map(|v| OperandShape::of(v, &self.heap))
            .collect();
        let handles = {
            let unit = self.unit(site.unit);
            unit.entry(site.index).chain().handles(unit.space())
        };
        for handle in handles {
            // The effect may re-enter the engine; clone it out so the
            // arena borrow ends before it runs.
            let effect = {
                let unit = self.unit(site.unit);
                unit.space()
                    .get(handle)
                    .filter(|stub| stub.guards_match(&shapes))
                    .map(|stub| stub.effect.clone())
            };
            if let Some(effect) = effect {
                return effect(self, operands);
            }
        }
        let kind = self.unit(site.unit).entry(site.index).site().kind;
        let handler = TrampolineTable::global().handler(kind);
        handler(self, site, operands)
    }

    /// Throws away a site's specialized stubs, keeping its cache state.
    ///
    /// Used when an external invariant a stub depends on breaks, for
    /// example a shape's property moving between slots. The mode is
    /// deliberately untouched; re-learning is the state machine's call.
    pub fn invalidate(&mut self, site: SiteId) {
        let removed = {
            let (unit, barrier) = self.unit_and_barrier(site.unit);
            unit.discard_entry(site.index, barrier)
        };
        let fallback = self.fallback_mut(site);
        fallback.state_mut().note_unlinked(removed);
        debug!(kind = fallback.kind().name(), removed, "site invalidated");
    }

    /// Reclaims storage of stubs retired since the previous safe point.
    /// Must only be called when no stub activation is on the stack.
    pub fn note_safe_point(&mut self) {
        assert_eq!(
            self.frames.depth(),
            0,
            "safe point with a stub frame on the stack"
        );
        for unit in &mut self.units {
            unit.note_safe_point();
        }
    }

    /// Reports every live GC edge held by stubs and templates.
    pub fn trace(&self, tracer: &mut Tracer) {
        for unit in &self.units {
            unit.trace(tracer);
        }
    }

    /// Marks a site as feeding profile data to the optimizing tier.
    pub fn mark_transpiled(&mut self, site: SiteId) {
        self.fallback_mut(site)
            .state_mut()
            .set_used_by_transpiler();
    }

    /// Records that optimized code exists for a unit, arming fallback
    /// notifications for its transpiler-flagged sites.
    pub fn note_optimized_unit(&mut self, unit: UnitId) {
        self.unit_mut(unit).set_has_optimized_code();
    }

    /// The resume point optimized code should return to after
    /// deoptimizing at a site of this kind.
    pub fn deopt_resume_target(&self, site: SiteId) -> ResumePoint {
        let kind = self.unit(site.unit).entry(site.index).site().kind;
        TrampolineTable::global().resume(kind)
    }

    /// Re-executes a site after deoptimization.
    ///
    /// For constructing kinds the optimized frame's receiver is kept
    /// when the call's own result is not an object.
    pub fn resume_after_deopt(
        &mut self,
        site: SiteId,
        operands: &[Value],
        saved_receiver: Value,
    ) -> EvalResult<Value> {
        debug_assert!(
            operands.len()
                >= self.unit(site.unit).entry(site.index).site().kind.min_operands(),
            "short operand slice for a deopt resume"
        );
        let resume = self.deopt_resume_target(site);
        match resume.variant {
            ResumeVariant::Constructing => {
                // The optimized frame already allocated its receiver, so
                // the call is replayed against it instead of building a
                // fresh one. Operand layout is callee, this, args...,
                // new_target.
                let last = operands.len() - 1;
                let args = &operands[2..last.max(2)];
                let saved = self.frames.begin_invocation();
                let result = self.with_stub_frame(|engine| {
                    op_library::call(engine, &operands[0], &saved_receiver, args)
                });
                self.frames.end_invocation(saved);
                let result = result?;
                Ok(if result.is_object() {
                    result
                } else {
                    saved_receiver
                })
            }
            ResumeVariant::Normal | ResumeVariant::AlternateReceiver => {
                self.dispatch(site, operands)
            }
        }
    }

    /// Runs `body` inside a stub frame. Panics if the current dispatcher
    /// invocation already has one open.
    pub fn with_stub_frame<T>(
        &mut self,
        body: impl FnOnce(&mut Engine) -> EvalResult<T>,
    ) -> EvalResult<T> {
        self.frames.enter();
        let result = body(self);
        self.frames.leave();
        result
    }

    /// Write-barrier log populated by chain unlinks.
    pub fn barrier(&self) -> &BarrierLog {
        &self.barrier
    }

    pub(crate) fn unit(&self, unit: UnitId) -> &IcScript {
        &self.units[unit.0 as usize]
    }

    pub(crate) fn unit_mut(&mut self, unit: UnitId) -> &mut IcScript {
        &mut self.units[unit.0 as usize]
    }

    pub(crate) fn unit_and_barrier(&mut self, unit: UnitId) -> (&mut IcScript, &BarrierLog) {
        (&mut self.units[unit.0 as usize], &self.barrier)
    }

    pub(crate) fn fallback(&self, site: SiteId) -> &crate::stub::FallbackStub {
        self.unit(site.unit).entry(site.index).chain().fallback()
    }

    pub(crate) fn fallback_mut(&mut self, site: SiteId) -> &mut crate::stub::FallbackStub {
        self.unit_mut(site.unit)
            .entry_mut(site.index)
            .chain_mut()
            .fallback_mut()
    }

    /// Current cache mode of a site.
    pub fn cache_mode(&self, site: SiteId) -> CacheMode {
        self.fallback(site).state().mode()
    }

    /// Number of specialized stubs linked at a site.
    pub fn num_specialized(&self, site: SiteId) -> usize {
        self.unit(site.unit).num_specialized(site.index)
    }

    /// Times the generic path has run at a site.
    pub fn entered_count(&self, site: SiteId) -> u64 {
        self.fallback(site).entered_count()
    }

    /// Counted attach failures at a site.
    pub fn attach_failures(&self, site: SiteId) -> u32 {
        self.fallback(site).state().attach_failures()
    }

    /// Stubs ever unlinked from a site.
    pub fn unlinked_count(&self, site: SiteId) -> u32 {
        self.fallback(site).state().unlinked()
    }

    /// Retired stubs awaiting the next safe point in a unit.
    pub fn pending_free(&self, unit: UnitId) -> usize {
        self.unit(unit).space().pending_free()
    }

    /// The template object cached at a NewArray/NewObject/Rest site.
    pub fn template_of(&self, site: SiteId) -> Option<ObjectId> {
        self.fallback(site).template()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Context for Engine {
    fn heap(&self) -> &Heap {
        &self.heap
    }

    fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    fn invoke(&mut self, callee: Value, this: Value, args: &[Value]) -> EvalResult<Value> {
        let function = callee
            .as_object()
            .and_then(|id| self.heap.get(id).function)
            .ok_or_else(|| JsError::type_error(format!("{} is not a function", callee)))?;
        let body = Rc::clone(&self.functions[function.0 as usize]);
        body(self, this, args)
    }

    fn construct(
        &mut self,
        callee: Value,
        args: &[Value],
        _new_target: Value,
    ) -> EvalResult<Value> {
        let prototype =
            op_library::get_property(self, &callee, &PropertyKey::from_str_key("prototype"))?;
        let receiver = self.heap.alloc_object();
        if let Some(proto) = prototype.as_object() {
            self.heap.get_mut(receiver).prototype = Some(proto);
        }
        let result = self.invoke(callee, Value::Object(receiver), args)?;
        Ok(if result.is_object() {
            result
        } else {
            Value::Object(receiver)
        })
    }

    fn intrinsic(&self, name: &str) -> Option<Value> {
        self.intrinsics.get(name).cloned()
    }
}
