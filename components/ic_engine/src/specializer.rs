//! The external capabilities consumed on the attach path: a specializer
//! that decides which stub fits the observed operands, and a code
//! generator that turns the decision into an executable stub.

use std::rc::Rc;

use core_types::{PropertyKey, Value};
use memory_manager::{Heap, OperandShape};
use thiserror::Error;

use crate::cache_state::CacheMode;
use crate::kind::{OpKind, SitePayload};
use crate::stub::{CompiledStub, Guards, StubDescription};

/// Everything the specializer may look at for one attach attempt.
///
/// Observing only: a specializer must not mutate visible program state,
/// and must be safe to call repeatedly with the same inputs.
pub struct AttachRequest<'a> {
    /// Kind of the site.
    pub kind: OpKind,
    /// Site metadata.
    pub payload: &'a SitePayload,
    /// The concrete operand values of this invocation.
    pub operands: &'a [Value],
    /// Current cache mode; megamorphic mode relaxes acceptance criteria.
    pub mode: CacheMode,
    /// The already-computed result, for kinds that attach after their
    /// effect (GetIntrinsic, template-caching constructors).
    pub result: Option<&'a Value>,
    /// Read access to the object model.
    pub heap: &'a Heap,
}

impl AttachRequest<'_> {
    /// Shape descriptor of one operand.
    pub fn operand_shape(&self, index: usize) -> OperandShape {
        OperandShape::of(&self.operands[index], self.heap)
    }

    /// Guard tuple over the first `count` operands.
    pub fn leading_guards(&self, count: usize) -> Guards {
        let mut guards = Guards::new();
        for i in 0..count.min(self.operands.len()).min(crate::stub::MAX_GUARDS) {
            guards.push(self.operand_shape(i));
        }
        guards
    }
}

/// Why an attach decision is postponed until after the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// The store is about to add a new slot; the guard must use the
    /// pre-store shape, but the stub is only worth attaching once the
    /// addition is known to have committed.
    AddSlot,
}

/// Outcome of one attach attempt.
pub enum AttachDecision {
    /// Commit this description via the code generator.
    Attach(StubDescription),
    /// These operands cannot be specialized; counts as a failure.
    NoAction,
    /// Valid operands, but not safely specializable right now; counts as
    /// handled, not as a failure.
    TemporarilyUnoptimizable,
    /// Decision depends on the effect the fallback is about to perform.
    Deferred(DeferReason),
}

/// Per-kind stub synthesis policy.
pub trait Specializer {
    /// Decides whether to specialize for the observed operands.
    fn try_attach(&mut self, req: AttachRequest<'_>) -> AttachDecision;

    /// Second phase of a deferred write-path attach: the store has
    /// committed, `old_shape` is the receiver's pre-store shape the stub
    /// must guard on.
    fn try_attach_add_slot(
        &mut self,
        req: AttachRequest<'_>,
        old_shape: OperandShape,
    ) -> AttachDecision;
}

/// Code generation failed; the dispatcher degrades this to "no stub
/// attached".
#[derive(Debug, Error)]
pub enum CodegenError {
    /// No room left for generated code.
    #[error("out of code memory")]
    OutOfMemory,
    /// The description asks for something this backend cannot emit.
    #[error("unsupported stub description: {0}")]
    Unsupported(String),
}

/// Turns stub descriptions into executable stubs.
pub trait CodeGenerator {
    /// Compiles a description; deterministic for a given description.
    fn compile(&mut self, desc: &StubDescription) -> Result<CompiledStub, CodegenError>;
}

/// Default specializer: one shape-guarded stub per distinct operand
/// shape tuple, learning mode only.
///
/// Megamorphic sites get no relaxed stubs from this policy; a host with
/// a real backend supplies its own `Specializer` for those.
#[derive(Debug, Default)]
pub struct ShapeGuardSpecializer;

impl ShapeGuardSpecializer {
    fn guard_count(kind: OpKind, operand_count: usize) -> usize {
        let wanted = match kind {
            OpKind::BinaryArith
            | OpKind::Compare
            | OpKind::InstanceOf
            | OpKind::In
            | OpKind::HasOwn
            | OpKind::SetElem => 2,
            OpKind::NewObject | OpKind::GetIntrinsic | OpKind::Rest => 0,
            OpKind::Call
            | OpKind::CallConstructing
            | OpKind::SpreadCall
            | OpKind::SpreadCallConstructing => 1,
            _ => 1,
        };
        wanted.min(operand_count)
    }

    fn describe(req: &AttachRequest<'_>, guards: Guards, key: Option<PropertyKey>) -> StubDescription {
        StubDescription {
            kind: req.kind,
            payload: req.payload.clone(),
            guards,
            key,
            template: req
                .result
                .filter(|_| req.kind.caches_template())
                .and_then(|v| v.as_object()),
            makes_gc_calls: req.kind.makes_gc_calls(),
        }
    }
}

impl Specializer for ShapeGuardSpecializer {
    fn try_attach(&mut self, req: AttachRequest<'_>) -> AttachDecision {
        if req.mode != CacheMode::Learning {
            return AttachDecision::NoAction;
        }
        match req.kind {
            OpKind::InstanceOf => {
                let callable = matches!(
                    req.operands.get(1),
                    Some(Value::Object(id)) if req.heap.get(*id).is_callable()
                );
                if !callable {
                    // Permanently inapplicable; the failure count must
                    // still advance so the site stops retrying.
                    return AttachDecision::NoAction;
                }
            }
            OpKind::Call
            | OpKind::CallConstructing
            | OpKind::SpreadCall
            | OpKind::SpreadCallConstructing => {
                let callable = matches!(
                    req.operands.first(),
                    Some(Value::Object(id)) if req.heap.get(*id).is_callable()
                );
                if !callable {
                    return AttachDecision::NoAction;
                }
            }
            OpKind::SetProp => {
                if let (Some(Value::Object(id)), SitePayload::NamedWrite { name, .. }) =
                    (req.operands.first(), req.payload)
                {
                    if req.heap.lookup_own(*id, name).is_none() {
                        // The store will add a slot; guard on the
                        // pre-store shape once the store commits.
                        return AttachDecision::Deferred(DeferReason::AddSlot);
                    }
                }
            }
            OpKind::SetElem => {
                // Dense-element stores never transition the shape, so a
                // pre-store attach is only sound for index keys.
                let dense = matches!(req.operands.get(1), Some(Value::Smi(n)) if *n >= 0);
                if !dense {
                    return AttachDecision::TemporarilyUnoptimizable;
                }
            }
            _ => {}
        }

        let guards = req.leading_guards(Self::guard_count(req.kind, req.operands.len()));
        let key = match req.payload {
            SitePayload::Name(name) | SitePayload::NamedWrite { name, .. } => Some(name.clone()),
            _ => None,
        };
        AttachDecision::Attach(Self::describe(&req, guards, key))
    }

    fn try_attach_add_slot(
        &mut self,
        req: AttachRequest<'_>,
        old_shape: OperandShape,
    ) -> AttachDecision {
        if req.mode != CacheMode::Learning {
            return AttachDecision::NoAction;
        }
        let mut guards = Guards::new();
        guards.push(old_shape);
        for i in 1..Self::guard_count(req.kind, req.operands.len()) {
            guards.push(req.operand_shape(i));
        }
        let key = match req.payload {
            SitePayload::NamedWrite { name, .. } => Some(name.clone()),
            _ => None,
        };
        AttachDecision::Attach(Self::describe(&req, guards, key))
    }
}

/// Default backend: "compiles" a description to a closure that replays
/// the generic semantics for operands its guards accepted.
#[derive(Debug, Default)]
pub struct ClosureCodeGenerator;

impl CodeGenerator for ClosureCodeGenerator {
    fn compile(&mut self, desc: &StubDescription) -> Result<CompiledStub, CodegenError> {
        let kind = desc.kind;
        let payload = desc.payload.clone();
        Ok(CompiledStub {
            effect: Rc::new(move |engine, operands| {
                crate::fallback::compute(engine, kind, &payload, operands)
            }),
        })
    }
}
