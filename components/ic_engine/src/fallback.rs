//! Fallback dispatch: the per-kind generic path behind every chain.
//!
//! Each invocation follows the same contract: count the entry, notify
//! the optimizing tier when it asked to hear about this site, run the
//! state-machine transition check, consult the specializer when the
//! state allows it, and always compute the result through the operation
//! library, because an attach only ever affects future invocations.

use core_types::{EvalResult, JsError, Value};
use memory_manager::OperandShape;
use tracing::{debug, trace};

use crate::engine::Engine;
use crate::kind::{OpKind, SiteId, SitePayload};
use crate::specializer::{AttachDecision, AttachRequest, DeferReason};
use crate::stub::SpecializedStub;
use crate::trampoline::FallbackHandler;

/// Picks the driver for a kind's trampoline-table row.
pub(crate) fn handler_for(kind: OpKind) -> FallbackHandler {
    if kind.is_write_path() {
        write_fallback
    } else if kind.computes_before_attach() {
        compute_first_fallback
    } else {
        read_fallback
    }
}

/// How one attach attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachOutcome {
    /// A stub was committed to the chain.
    Attached,
    /// Handled without a stub; not a failure.
    Handled,
    /// Eligible but nothing attached.
    Failed,
    /// Write path: decision postponed until after the store.
    Deferred,
    /// The state machine forbade an attempt.
    Skipped,
}

impl AttachOutcome {
    fn counts_as_failure(self) -> bool {
        // A "not attached" failure is recorded even when the state check
        // made attachment ineligible, so permanently-inapplicable sites
        // still advance the state machine.
        !matches!(self, AttachOutcome::Attached | AttachOutcome::Handled)
    }
}

enum AttachPhase {
    Initial,
    AddSlot(OperandShape),
}

/// Entry bookkeeping plus the entry transition check. Returns the
/// specialized-stub count as it stands after that check; the post-effect
/// re-check is evaluated against this count, not a fresh one.
fn prologue(engine: &mut Engine, site: SiteId) -> usize {
    let fallback = engine.fallback_mut(site);
    fallback.increment_entered_count();
    let kind = fallback.kind();
    let entered = fallback.entered_count();
    let flagged = fallback.state().used_by_transpiler();
    trace!(kind = kind.name(), unit = site.unit.0, index = site.index, entered, "fallback hit");

    if flagged && engine.unit(site.unit).has_optimized_code() {
        if let Some(tier) = engine.tier.as_mut() {
            tier.notify_fallback_hit(site);
        }
    }
    let num_specialized = engine.unit(site.unit).num_specialized(site.index);
    check_transition(engine, site, num_specialized);
    engine.unit(site.unit).num_specialized(site.index)
}

/// Runs one transition step against the given stub count; a crossed edge
/// discards the chain.
fn check_transition(engine: &mut Engine, site: SiteId, num_specialized: usize) {
    let config = engine.config;
    let crossed = engine
        .fallback_mut(site)
        .state_mut()
        .maybe_transition(num_specialized, &config);
    if crossed {
        let removed = {
            let (unit, barrier) = engine.unit_and_barrier(site.unit);
            unit.discard_entry(site.index, barrier)
        };
        let fallback = engine.fallback_mut(site);
        fallback.state_mut().note_unlinked(removed);
        debug!(
            kind = fallback.kind().name(),
            mode = ?fallback.state().mode(),
            removed,
            "cache state advanced, chain discarded"
        );
    }
}

fn attempt_attach(
    engine: &mut Engine,
    site: SiteId,
    operands: &[Value],
    result: Option<&Value>,
    phase: AttachPhase,
) -> AttachOutcome {
    let (kind, payload) = {
        let entry = engine.unit(site.unit).entry(site.index);
        (entry.site().kind, entry.site().payload.clone())
    };
    let mode = engine.fallback(site).state().mode();
    let decision = {
        let req = AttachRequest {
            kind,
            payload: &payload,
            operands,
            mode,
            result,
            heap: &engine.heap,
        };
        match phase {
            AttachPhase::Initial => engine.specializer.try_attach(req),
            AttachPhase::AddSlot(old_shape) => {
                engine.specializer.try_attach_add_slot(req, old_shape)
            }
        }
    };

    match decision {
        AttachDecision::Attach(desc) => match engine.codegen.compile(&desc) {
            Ok(compiled) => {
                // The chain may have gained an equal stub through nested
                // execution; re-read it rather than trusting anything
                // cached before the specializer ran.
                let duplicate = {
                    let unit = engine.unit(site.unit);
                    unit.entry(site.index)
                        .chain()
                        .has_stub_with_guards(unit.space(), &desc.guards)
                };
                if duplicate {
                    trace!(kind = kind.name(), "equal-guard stub already present");
                    return AttachOutcome::Handled;
                }
                let stub = SpecializedStub::new(&desc, compiled.effect);
                engine.unit_mut(site.unit).attach_stub(site.index, stub);
                engine.fallback_mut(site).state_mut().note_attached();
                debug!(kind = kind.name(), guards = ?desc.guards, "attached specialized stub");
                AttachOutcome::Attached
            }
            Err(err) => {
                debug!(kind = kind.name(), %err, "stub compilation failed");
                AttachOutcome::Failed
            }
        },
        AttachDecision::NoAction => AttachOutcome::Failed,
        AttachDecision::TemporarilyUnoptimizable => AttachOutcome::Handled,
        AttachDecision::Deferred(DeferReason::AddSlot) => AttachOutcome::Deferred,
    }
}

/// Post-effect transition re-check.
///
/// Reacts only to state advanced by nested execution inside the effect:
/// this invocation's own attach and failure are weighed at the next
/// fallback entry, so the invocation that fills the chain to capacity
/// (or records the capping failure) leaves it intact until the next
/// miss.
fn recheck_after_effect(
    engine: &mut Engine,
    site: SiteId,
    entry_stubs: usize,
    failures_before: u32,
) {
    if engine.fallback(site).state().attach_failures() != failures_before {
        check_transition(engine, site, entry_stubs);
    }
}

fn site_snapshot(engine: &Engine, site: SiteId) -> (OpKind, SitePayload, bool) {
    let entry = engine.unit(site.unit).entry(site.index);
    (
        entry.site().kind,
        entry.site().payload.clone(),
        entry.site().never_specializes(),
    )
}

/// Driver for kinds that attach on the observed operands and then
/// compute. Covers the call kinds too; their non-tail call runs inside a
/// stub frame opened by [`compute`].
fn read_fallback(engine: &mut Engine, site: SiteId, operands: &[Value]) -> EvalResult<Value> {
    let entry_stubs = prologue(engine, site);
    let (kind, payload, never_specializes) = site_snapshot(engine, site);

    let mut outcome = AttachOutcome::Skipped;
    if engine.fallback(site).state().can_attach_stub() && !never_specializes {
        outcome = attempt_attach(engine, site, operands, None, AttachPhase::Initial);
    }
    if !never_specializes && outcome.counts_as_failure() {
        engine.fallback_mut(site).state_mut().note_attach_failure();
    }

    let failures = engine.fallback(site).state().attach_failures();
    let value = compute(engine, kind, &payload, operands)?;
    recheck_after_effect(engine, site, entry_stubs, failures);
    Ok(value)
}

/// Driver for kinds that need the computed result in hand before the
/// attach attempt (GetIntrinsic and the template-caching constructors).
fn compute_first_fallback(
    engine: &mut Engine,
    site: SiteId,
    operands: &[Value],
) -> EvalResult<Value> {
    let entry_stubs = prologue(engine, site);
    let (kind, payload, _) = site_snapshot(engine, site);

    let failures = engine.fallback(site).state().attach_failures();
    let value = compute(engine, kind, &payload, operands)?;
    if kind.caches_template() {
        if let Some(id) = value.as_object() {
            engine.fallback_mut(site).set_template(id);
        }
    }
    recheck_after_effect(engine, site, entry_stubs, failures);

    let mut outcome = AttachOutcome::Skipped;
    if engine.fallback(site).state().can_attach_stub() {
        outcome = attempt_attach(engine, site, operands, Some(&value), AttachPhase::Initial);
    }
    if outcome.counts_as_failure() {
        engine.fallback_mut(site).state_mut().note_attach_failure();
    }
    Ok(value)
}

/// Driver for the write path: the attach attempt is split around the
/// effectful store. A `Deferred` first phase stores first, then attaches
/// with the pre-store shape as guard key; at most one stub can result.
fn write_fallback(engine: &mut Engine, site: SiteId, operands: &[Value]) -> EvalResult<Value> {
    let entry_stubs = prologue(engine, site);
    let (kind, payload, _) = site_snapshot(engine, site);

    let old_shape = operands
        .first()
        .map(|v| OperandShape::of(v, &engine.heap));

    let mut outcome = AttachOutcome::Skipped;
    if engine.fallback(site).state().can_attach_stub() {
        outcome = attempt_attach(engine, site, operands, None, AttachPhase::Initial);
    }

    let failures = engine.fallback(site).state().attach_failures();
    let value = compute(engine, kind, &payload, operands)?;

    // The store (a setter, a coercion) may have re-entered this site;
    // re-read the state before the post-effect attempt.
    recheck_after_effect(engine, site, entry_stubs, failures);
    if outcome == AttachOutcome::Deferred {
        if let (true, Some(old_shape)) =
            (engine.fallback(site).state().can_attach_stub(), old_shape)
        {
            outcome = attempt_attach(
                engine,
                site,
                operands,
                Some(&value),
                AttachPhase::AddSlot(old_shape),
            );
        }
    }
    if outcome.counts_as_failure() {
        engine.fallback_mut(site).state_mut().note_attach_failure();
    }
    Ok(value)
}

/// The unspecialized semantics of one operation, shared by fallback
/// drivers and by closure-compiled stub effects. Contributes no caching
/// of its own; correctness comes entirely from `op_library`.
pub(crate) fn compute(
    engine: &mut Engine,
    kind: OpKind,
    payload: &SitePayload,
    operands: &[Value],
) -> EvalResult<Value> {
    match kind {
        OpKind::ToBool => Ok(Value::Boolean(op_library::to_boolean(&operands[0]))),
        OpKind::UnaryArith => {
            let op = match payload {
                SitePayload::Unary(op) => *op,
                _ => panic!("UnaryArith site without an operator payload"),
            };
            op_library::unary_arith(engine, op, &operands[0])
        }
        OpKind::BinaryArith => {
            let op = match payload {
                SitePayload::Binary(op) => *op,
                _ => panic!("BinaryArith site without an operator payload"),
            };
            op_library::binary_arith(engine, op, &operands[0], &operands[1])
        }
        OpKind::Compare => {
            let op = match payload {
                SitePayload::Compare(op) => *op,
                _ => panic!("Compare site without an operator payload"),
            };
            Ok(Value::Boolean(op_library::compare(
                engine,
                op,
                &operands[0],
                &operands[1],
            )?))
        }
        OpKind::NewArray => op_library::new_array(engine, &operands[0]),
        OpKind::NewObject => op_library::new_object(engine),
        OpKind::SetElem => {
            let flavor = match payload {
                SitePayload::ElemWrite(flavor) => *flavor,
                _ => panic!("SetElem site without a write flavor"),
            };
            op_library::set_element(engine, &operands[0], &operands[1], &operands[2], flavor)?;
            Ok(operands[2].clone())
        }
        OpKind::SetProp => {
            let (name, flavor) = match payload {
                SitePayload::NamedWrite { name, flavor } => (name.clone(), *flavor),
                _ => panic!("SetProp site without a name payload"),
            };
            op_library::set_property(engine, &operands[0], &name, &operands[1], flavor)?;
            Ok(operands[1].clone())
        }
        OpKind::GetProp => {
            let name = payload_name(payload, "GetProp");
            op_library::get_property(engine, &operands[0], &name)
        }
        OpKind::GetPropSuper => {
            let name = payload_name(payload, "GetPropSuper");
            op_library::get_prop_super(engine, &operands[0], &operands[1], &name)
        }
        OpKind::GetElem => op_library::get_element(engine, &operands[0], &operands[1]),
        OpKind::GetElemSuper => {
            let id = operands[2]
                .as_object()
                .ok_or_else(|| JsError::type_error("super base is not an object"))?;
            let key = op_library::to_property_key(engine, &operands[1])?;
            op_library::get_with_receiver(engine, id, &key, &operands[0])
        }
        OpKind::In => Ok(Value::Boolean(op_library::has_property(
            engine,
            &operands[0],
            &operands[1],
        )?)),
        OpKind::HasOwn => Ok(Value::Boolean(op_library::has_own(
            engine,
            &operands[0],
            &operands[1],
        )?)),
        OpKind::CheckPrivateField => {
            let guard = match payload {
                SitePayload::PrivateCheck(guard) => *guard,
                _ => panic!("CheckPrivateField site without a guard flavor"),
            };
            Ok(Value::Boolean(op_library::check_private_field(
                engine,
                &operands[0],
                &operands[1],
                guard,
            )?))
        }
        OpKind::GetName => {
            let name = payload_name(payload, "GetName");
            op_library::get_name(engine, &operands[0], &name)
        }
        OpKind::BindName => {
            let name = payload_name(payload, "BindName");
            op_library::bind_name(engine, &operands[0], &name)
        }
        OpKind::GetIntrinsic => {
            let name = match payload {
                SitePayload::Intrinsic(name) => name.clone(),
                _ => panic!("GetIntrinsic site without an intrinsic name"),
            };
            op_library::get_intrinsic(engine, &name)
        }
        OpKind::Call => engine.with_stub_frame(|engine| {
            op_library::call(engine, &operands[0], &operands[1], &operands[2..])
        }),
        OpKind::CallConstructing => {
            // Operand layout is callee, this, args..., new_target.
            let last = operands.len() - 1;
            let (args, new_target) = (&operands[2..last.max(2)], &operands[last]);
            engine.with_stub_frame(|engine| {
                op_library::construct(engine, &operands[0], args, new_target)
            })
        }
        OpKind::SpreadCall => engine.with_stub_frame(|engine| {
            op_library::spread_call(engine, &operands[0], &operands[1], &operands[2])
        }),
        OpKind::SpreadCallConstructing => engine.with_stub_frame(|engine| {
            op_library::spread_construct(engine, &operands[0], &operands[2], &operands[3])
        }),
        OpKind::InstanceOf => Ok(Value::Boolean(op_library::instance_of(
            engine,
            &operands[0],
            &operands[1],
        )?)),
        OpKind::TypeOf => Ok(Value::String(
            op_library::type_of(&*engine, &operands[0]).to_string(),
        )),
        OpKind::ToPropertyKey => {
            let key = op_library::to_property_key(engine, &operands[0])?;
            Ok(key_to_value(key))
        }
        OpKind::GetIterator => op_library::get_iterator(engine, &operands[0]),
        OpKind::OptimizeSpreadCall => op_library::optimize_spread_call(engine, &operands[0]),
        OpKind::Rest => {
            let formal_count = match payload {
                SitePayload::Rest { formal_count } => *formal_count,
                _ => panic!("Rest site without a formal count"),
            };
            op_library::rest(engine, operands, formal_count)
        }
    }
}

fn payload_name(payload: &SitePayload, kind: &str) -> core_types::PropertyKey {
    match payload {
        SitePayload::Name(name) => name.clone(),
        _ => panic!("{} site without a name payload", kind),
    }
}

fn key_to_value(key: core_types::PropertyKey) -> Value {
    match key {
        core_types::PropertyKey::String(s) => Value::String(s),
        core_types::PropertyKey::Index(i) => Value::number(i as f64),
        core_types::PropertyKey::Symbol(s) => Value::Symbol(s),
    }
}
