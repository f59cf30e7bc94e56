//! Cache Lifecycle Integration Tests
//!
//! Drives whole sites through the learning / megamorphic / generic state
//! machine and checks chain contents, counters and discard behavior at
//! every step.

use core_types::{ErrorKind, Value};
use ic_engine::{
    AttachDecision, AttachRequest, CacheConfig, CacheMode, CodeGenerator, CodegenError,
    CompiledStub, Engine, OpKind, OpSite, SiteId, SitePayload, Specializer, StubDescription,
};
use memory_manager::OperandShape;
use op_library::BinaryOp;

fn add_site_engine(config: CacheConfig) -> (Engine, SiteId) {
    let mut engine = Engine::with_config(config);
    let unit = engine.add_unit(vec![OpSite::with_payload(
        OpKind::BinaryArith,
        SitePayload::Binary(BinaryOp::Add),
    )]);
    (engine, SiteId { unit, index: 0 })
}

const S1: [Value; 2] = [Value::Smi(1), Value::Smi(2)];
const S2: [Value; 2] = [Value::Double(1.5), Value::Smi(2)];
const S3: [Value; 2] = [Value::Smi(1), Value::Double(2.5)];

/// The canonical small-capacity walkthrough: two learns, one hit, then
/// the capacity edge discards the chain and the site goes megamorphic.
#[test]
fn test_capacity_walkthrough_at_k2() {
    let config = CacheConfig {
        max_specialized_stubs: 2,
        ..CacheConfig::default()
    };
    let (mut engine, site) = add_site_engine(config);

    engine.dispatch(site, &S1).unwrap();
    assert_eq!(engine.num_specialized(site), 1);
    assert_eq!(engine.cache_mode(site), CacheMode::Learning);

    engine.dispatch(site, &S2).unwrap();
    assert_eq!(engine.num_specialized(site), 2);

    // S1 again is a pure stub hit.
    let v = engine.dispatch(site, &S1).unwrap();
    assert_eq!(v, Value::Smi(3));
    assert_eq!(engine.entered_count(site), 2);

    // S3 misses; the capacity edge fires at fallback entry, the chain
    // is discarded, and megamorphic mode refuses the default policy.
    let v = engine.dispatch(site, &S3).unwrap();
    assert_eq!(v, Value::Double(3.5));
    assert_eq!(engine.cache_mode(site), CacheMode::Megamorphic);
    assert_eq!(engine.num_specialized(site), 0);
    assert_eq!(engine.entered_count(site), 3);
    assert_eq!(engine.unlinked_count(site), 2);
    assert_eq!(engine.attach_failures(site), 1);
}

/// The stub count converges to the number of distinct operand shape
/// tuples when capacity allows, and never exceeds capacity when not.
#[test]
fn test_stub_count_converges_to_distinct_tuples() {
    let (mut engine, site) = add_site_engine(CacheConfig::default());
    let tuples = [&S1, &S2, &S3];
    for _ in 0..10 {
        for operands in tuples {
            engine.dispatch(site, operands).unwrap();
        }
    }
    assert_eq!(engine.num_specialized(site), tuples.len());
    assert_eq!(engine.entered_count(site), tuples.len() as u64);
    assert_eq!(engine.cache_mode(site), CacheMode::Learning);
}

#[test]
fn test_stub_count_bounded_by_capacity() {
    let config = CacheConfig {
        max_specialized_stubs: 2,
        ..CacheConfig::default()
    };
    let (mut engine, site) = add_site_engine(config);
    for round in 0..12 {
        for operands in [&S1, &S2, &S3] {
            engine.dispatch(site, operands).unwrap();
            assert!(
                engine.num_specialized(site) <= 2,
                "capacity exceeded in round {}",
                round
            );
        }
    }
    // Capacity pushed the site megamorphic, and the continued misses
    // there exhausted the failure budget too.
    assert_eq!(engine.cache_mode(site), CacheMode::Generic);
    // Results stay correct with no stubs at all.
    assert_eq!(engine.dispatch(site, &S3).unwrap(), Value::Double(3.5));
}

/// A specializer that never attaches, driving both failure edges.
struct NeverAttach;

impl Specializer for NeverAttach {
    fn try_attach(&mut self, _req: AttachRequest<'_>) -> AttachDecision {
        AttachDecision::NoAction
    }

    fn try_attach_add_slot(
        &mut self,
        _req: AttachRequest<'_>,
        _old_shape: OperandShape,
    ) -> AttachDecision {
        AttachDecision::NoAction
    }
}

#[test]
fn test_failure_budget_drives_site_to_generic() {
    let config = CacheConfig::default();
    let (mut engine, site) = add_site_engine(config);
    engine.set_specializer(Box::new(NeverAttach));

    let mut modes = vec![engine.cache_mode(site)];
    let budget = config.max_learning_failures + config.max_megamorphic_failures + 3;
    for _ in 0..budget {
        assert_eq!(engine.dispatch(site, &S1).unwrap(), Value::Smi(3));
        modes.push(engine.cache_mode(site));
    }
    assert!(
        modes.windows(2).all(|w| w[0] <= w[1]),
        "mode regressed: {:?}",
        modes
    );
    assert!(modes.contains(&CacheMode::Megamorphic));
    assert_eq!(*modes.last().unwrap(), CacheMode::Generic);
    assert_eq!(engine.num_specialized(site), 0);

    // Generic is terminal.
    for _ in 0..16 {
        engine.dispatch(site, &S2).unwrap();
    }
    assert_eq!(engine.cache_mode(site), CacheMode::Generic);
}

/// A specializer that reports transient ineligibility, which must not
/// consume failure budget.
struct AlwaysTransient;

impl Specializer for AlwaysTransient {
    fn try_attach(&mut self, _req: AttachRequest<'_>) -> AttachDecision {
        AttachDecision::TemporarilyUnoptimizable
    }

    fn try_attach_add_slot(
        &mut self,
        _req: AttachRequest<'_>,
        _old_shape: OperandShape,
    ) -> AttachDecision {
        AttachDecision::TemporarilyUnoptimizable
    }
}

#[test]
fn test_transient_ineligibility_is_not_a_counted_failure() {
    let (mut engine, site) = add_site_engine(CacheConfig::default());
    engine.set_specializer(Box::new(AlwaysTransient));
    for _ in 0..32 {
        engine.dispatch(site, &S1).unwrap();
    }
    assert_eq!(engine.attach_failures(site), 0);
    assert_eq!(engine.cache_mode(site), CacheMode::Learning);
    assert_eq!(engine.num_specialized(site), 0);
}

/// A backend that cannot materialize any stub.
struct FailingBackend;

impl CodeGenerator for FailingBackend {
    fn compile(&mut self, _desc: &StubDescription) -> Result<CompiledStub, CodegenError> {
        Err(CodegenError::OutOfMemory)
    }
}

#[test]
fn test_backend_failure_counts_and_advances_the_state_machine() {
    let config = CacheConfig::default();
    let (mut engine, site) = add_site_engine(config);
    engine.set_code_generator(Box::new(FailingBackend));

    for _ in 0..config.max_learning_failures {
        engine.dispatch(site, &S1).unwrap();
    }
    assert_eq!(
        engine.attach_failures(site),
        config.max_learning_failures
    );
    engine.dispatch(site, &S1).unwrap();
    assert_eq!(engine.cache_mode(site), CacheMode::Megamorphic);
    assert_eq!(engine.num_specialized(site), 0);
}

/// A failure recorded by a nested invocation of the same site must be
/// weighed by the outer invocation's post-effect re-check, without
/// waiting for another fallback entry.
#[test]
fn test_nested_failure_at_same_site_crosses_edge_before_outer_returns() {
    let config = CacheConfig {
        max_learning_failures: 1,
        ..CacheConfig::default()
    };
    let mut engine = Engine::with_config(config);
    let unit = engine.add_unit(vec![OpSite::new(OpKind::Call)]);
    let site = SiteId { unit, index: 0 };

    let body = engine.register_function(move |engine, _, _| {
        // Re-enters the same call site with a non-callable callee; that
        // nested fallback records the capping attach failure and throws.
        let err = engine
            .dispatch(site, &[Value::Smi(0), Value::Undefined])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        Ok(Value::Smi(1))
    });

    let v = engine.dispatch(site, &[body, Value::Undefined]).unwrap();
    assert_eq!(v, Value::Smi(1));
    assert_eq!(engine.entered_count(site), 2);
    // The outer invocation observed the nested failure on its way out:
    // the learning edge fired and discarded the stub the outer
    // invocation had attached for its callable callee.
    assert_eq!(engine.cache_mode(site), CacheMode::Megamorphic);
    assert_eq!(engine.num_specialized(site), 0);
    assert_eq!(engine.unlinked_count(site), 1);
}

#[test]
fn test_invalidate_keeps_mode_and_allows_relearning() {
    let (mut engine, site) = add_site_engine(CacheConfig::default());
    engine.dispatch(site, &S1).unwrap();
    engine.dispatch(site, &S2).unwrap();
    assert_eq!(engine.num_specialized(site), 2);

    engine.invalidate(site);
    assert_eq!(engine.num_specialized(site), 0);
    assert_eq!(engine.unlinked_count(site), 2);
    assert_eq!(engine.cache_mode(site), CacheMode::Learning);

    engine.dispatch(site, &S1).unwrap();
    assert_eq!(engine.num_specialized(site), 1);
}

#[test]
fn test_retired_storage_reclaimed_only_at_safe_points() {
    let (mut engine, site) = add_site_engine(CacheConfig::default());
    engine.dispatch(site, &S1).unwrap();
    engine.dispatch(site, &S2).unwrap();
    engine.invalidate(site);

    assert_eq!(engine.pending_free(site.unit), 2);
    // Dispatch between retire and safe point stays sound.
    assert_eq!(engine.dispatch(site, &S1).unwrap(), Value::Smi(3));
    engine.note_safe_point();
    assert_eq!(engine.pending_free(site.unit), 0);
    assert_eq!(engine.dispatch(site, &S2).unwrap(), Value::Double(3.5));
}

#[test]
fn test_sites_learn_independently() {
    let mut engine = Engine::new();
    let unit = engine.add_unit(vec![
        OpSite::with_payload(OpKind::BinaryArith, SitePayload::Binary(BinaryOp::Add)),
        OpSite::with_payload(OpKind::BinaryArith, SitePayload::Binary(BinaryOp::Mul)),
    ]);
    let add = SiteId { unit, index: 0 };
    let mul = SiteId { unit, index: 1 };

    assert_eq!(engine.dispatch(add, &S1).unwrap(), Value::Smi(3));
    assert_eq!(engine.dispatch(mul, &S1).unwrap(), Value::Smi(2));
    assert_eq!(engine.num_specialized(add), 1);
    assert_eq!(engine.num_specialized(mul), 1);

    engine.invalidate(add);
    assert_eq!(engine.num_specialized(add), 0);
    assert_eq!(engine.num_specialized(mul), 1);
}
