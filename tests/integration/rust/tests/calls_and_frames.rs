//! Call Path Integration Tests
//!
//! Calls, constructing calls, spreads and rest materialization through
//! engine dispatch, plus the stub-frame discipline around non-tail calls
//! and the deoptimization resume points.

use core_types::{ErrorKind, PropertyKey, Value};
use ic_engine::{
    CacheMode, Engine, OpKind, OpSite, ResumeVariant, SiteId, SitePayload, TierBridge, UnitId,
};
use op_library::Context;
use std::cell::RefCell;
use std::rc::Rc;

fn engine_with(sites: Vec<OpSite>) -> (Engine, UnitId) {
    let mut engine = Engine::new();
    let unit = engine.add_unit(sites);
    (engine, unit)
}

#[test]
fn test_call_passes_this_and_arguments() {
    let (mut engine, unit) = engine_with(vec![OpSite::new(OpKind::Call)]);
    let site = SiteId { unit, index: 0 };

    let callee = engine.register_function(|_, this, args| {
        assert_eq!(args, &[Value::Smi(1), Value::Smi(2)]);
        match this {
            Value::Smi(base) => Ok(Value::Smi(base + args.len() as i32)),
            _ => Ok(Value::Undefined),
        }
    });
    let v = engine
        .dispatch(site, &[callee, Value::Smi(10), Value::Smi(1), Value::Smi(2)])
        .unwrap();
    assert_eq!(v, Value::Smi(12));
}

#[test]
fn test_calling_a_non_function_throws() {
    let (mut engine, unit) = engine_with(vec![OpSite::new(OpKind::Call)]);
    let site = SiteId { unit, index: 0 };
    let err = engine
        .dispatch(site, &[Value::Smi(3), Value::Undefined])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
    // The miss still consumed failure budget for this unoptimizable site.
    assert_eq!(engine.attach_failures(site), 1);
}

#[test]
fn test_construct_wires_prototype_and_keeps_object_results() {
    let (mut engine, unit) = engine_with(vec![OpSite::new(OpKind::CallConstructing)]);
    let site = SiteId { unit, index: 0 };

    let ctor = engine.register_function(|engine, this, args| {
        let id = this.as_object().unwrap();
        engine.heap_mut().define_data_property(
            id,
            PropertyKey::from_str_key("arg"),
            args[0].clone(),
        );
        Ok(Value::Undefined)
    });
    let proto = engine.heap_mut().alloc_object();
    engine.heap_mut().define_data_property(
        ctor.as_object().unwrap(),
        PropertyKey::from_str_key("prototype"),
        Value::Object(proto),
    );

    let instance = engine
        .dispatch(
            site,
            &[ctor.clone(), Value::Undefined, Value::Smi(5), ctor.clone()],
        )
        .unwrap();
    let id = instance.as_object().unwrap();
    assert_eq!(engine.heap().get(id).prototype, Some(proto));
    assert_eq!(
        op_library::get_property(&mut engine, &instance, &PropertyKey::from_str_key("arg"))
            .unwrap(),
        Value::Smi(5)
    );

    // A constructor returning an object overrides the fresh receiver.
    let replacement = engine.heap_mut().alloc_object();
    let override_ctor =
        engine.register_function(move |_, _, _| Ok(Value::Object(replacement)));
    let got = engine
        .dispatch(
            site,
            &[override_ctor.clone(), Value::Undefined, override_ctor],
        )
        .unwrap();
    assert_eq!(got, Value::Object(replacement));
}

#[test]
fn test_spread_call_unpacks_dense_elements() {
    let (mut engine, unit) = engine_with(vec![
        OpSite::new(OpKind::SpreadCall),
        OpSite::new(OpKind::OptimizeSpreadCall),
    ]);
    let call_site = SiteId { unit, index: 0 };
    let opt_site = SiteId { unit, index: 1 };

    let sum = engine.register_function(|_, _, args| {
        let mut total = 0;
        for arg in args {
            if let Value::Smi(n) = arg {
                total += n;
            }
        }
        Ok(Value::Smi(total))
    });
    let args = engine.heap_mut().alloc_array(0);
    engine
        .heap_mut()
        .get_mut(args)
        .elements
        .extend([Value::Smi(1), Value::Smi(2), Value::Smi(3)]);

    // The spread argument is optimizable as a dense array.
    assert_eq!(
        engine.dispatch(opt_site, &[Value::Object(args)]).unwrap(),
        Value::Object(args)
    );
    let v = engine
        .dispatch(call_site, &[sum, Value::Undefined, Value::Object(args)])
        .unwrap();
    assert_eq!(v, Value::Smi(6));

    // Non-arrays are not optimizable spreads.
    let plain = engine.heap_mut().alloc_object();
    assert_eq!(
        engine.dispatch(opt_site, &[Value::Object(plain)]).unwrap(),
        Value::Undefined
    );
}

#[test]
fn test_spread_construct_builds_an_instance() {
    let (mut engine, unit) = engine_with(vec![OpSite::new(OpKind::SpreadCallConstructing)]);
    let site = SiteId { unit, index: 0 };

    let ctor = engine.register_function(|engine, this, args| {
        let id = this.as_object().unwrap();
        engine.heap_mut().define_data_property(
            id,
            PropertyKey::from_str_key("count"),
            Value::Smi(args.len() as i32),
        );
        Ok(Value::Undefined)
    });
    let args = engine.heap_mut().alloc_array(0);
    engine
        .heap_mut()
        .get_mut(args)
        .elements
        .extend([Value::Smi(1), Value::Smi(2)]);

    let instance = engine
        .dispatch(
            site,
            &[ctor.clone(), Value::Undefined, Value::Object(args), ctor],
        )
        .unwrap();
    assert_eq!(
        op_library::get_property(
            &mut engine,
            &instance,
            &PropertyKey::from_str_key("count")
        )
        .unwrap(),
        Value::Smi(2)
    );
}

#[test]
fn test_rest_handles_missing_and_extra_actuals() {
    let (mut engine, unit) = engine_with(vec![OpSite::with_payload(
        OpKind::Rest,
        SitePayload::Rest { formal_count: 2 },
    )]);
    let site = SiteId { unit, index: 0 };

    let short = engine.dispatch(site, &[Value::Smi(1)]).unwrap();
    assert!(engine.heap().get(short.as_object().unwrap()).elements.is_empty());

    let long = engine
        .dispatch(site, &[Value::Smi(1), Value::Smi(2), Value::Smi(3)])
        .unwrap();
    assert_eq!(
        engine.heap().get(long.as_object().unwrap()).elements,
        vec![Value::Smi(3)]
    );
    // Every dispatch materializes a fresh array.
    assert_ne!(short.as_object(), long.as_object());
}

#[test]
fn test_recursion_through_call_sites_keeps_frames_balanced() {
    let (mut engine, unit) = engine_with(vec![OpSite::new(OpKind::Call)]);
    let site = SiteId { unit, index: 0 };

    // f(n) = n <= 0 ? 0 : n + f(n - 1), every call through the site.
    let cell: Rc<RefCell<Value>> = Rc::new(RefCell::new(Value::Undefined));
    let cell_for_body = Rc::clone(&cell);
    let f = engine.register_function(move |engine, _, args| {
        let n = match args[0] {
            Value::Smi(n) => n,
            _ => 0,
        };
        if n <= 0 {
            return Ok(Value::Smi(0));
        }
        let callee = cell_for_body.borrow().clone();
        let rest = engine.dispatch(site, &[callee, Value::Undefined, Value::Smi(n - 1)])?;
        match rest {
            Value::Smi(r) => Ok(Value::Smi(n + r)),
            other => Ok(other),
        }
    });
    *cell.borrow_mut() = f.clone();

    let v = engine
        .dispatch(site, &[f, Value::Undefined, Value::Smi(5)])
        .unwrap();
    assert_eq!(v, Value::Smi(15));
    // Recursive hits went through the attached stub, not the fallback.
    assert_eq!(engine.entered_count(site), 1);
    assert_eq!(engine.num_specialized(site), 1);
}

#[test]
fn test_resume_targets_reflect_operation_kind() {
    let (engine, unit) = engine_with(vec![
        OpSite::new(OpKind::GetElem),
        OpSite::new(OpKind::GetElemSuper),
        OpSite::new(OpKind::SpreadCallConstructing),
    ]);
    let target = |index| {
        engine
            .deopt_resume_target(SiteId { unit, index })
            .variant
    };
    assert_eq!(target(0), ResumeVariant::Normal);
    assert_eq!(target(1), ResumeVariant::AlternateReceiver);
    assert_eq!(target(2), ResumeVariant::Constructing);
}

#[test]
fn test_deopt_resume_replays_constructing_call_against_saved_receiver() {
    let (mut engine, unit) = engine_with(vec![OpSite::new(OpKind::CallConstructing)]);
    let site = SiteId { unit, index: 0 };

    let ctor = engine.register_function(|engine, this, _| {
        let id = this.as_object().unwrap();
        engine.heap_mut().define_data_property(
            id,
            PropertyKey::from_str_key("touched"),
            Value::Boolean(true),
        );
        Ok(Value::Smi(0))
    });
    let saved = engine.heap_mut().alloc_object();

    let result = engine
        .resume_after_deopt(
            site,
            &[ctor.clone(), Value::Undefined, ctor],
            Value::Object(saved),
        )
        .unwrap();
    // The primitive return is dropped in favor of the optimized frame's
    // receiver, which the constructor body mutated in place.
    assert_eq!(result, Value::Object(saved));
    assert_eq!(
        op_library::get_property(
            &mut engine,
            &result,
            &PropertyKey::from_str_key("touched")
        )
        .unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn test_deopt_resume_on_read_kind_just_redispatches() {
    let (mut engine, unit) = engine_with(vec![OpSite::with_payload(
        OpKind::GetProp,
        SitePayload::Name(PropertyKey::from_str_key("x")),
    )]);
    let site = SiteId { unit, index: 0 };
    let obj = engine.heap_mut().alloc_object();
    engine
        .heap_mut()
        .define_data_property(obj, PropertyKey::from_str_key("x"), Value::Smi(4));

    let v = engine
        .resume_after_deopt(site, &[Value::Object(obj)], Value::Undefined)
        .unwrap();
    assert_eq!(v, Value::Smi(4));
}

struct Recorder(Rc<RefCell<Vec<SiteId>>>);

impl TierBridge for Recorder {
    fn notify_fallback_hit(&mut self, site: SiteId) {
        self.0.borrow_mut().push(site);
    }
}

#[test]
fn test_tier_notifications_need_both_flag_and_optimized_code() {
    let (mut engine, unit) = engine_with(vec![OpSite::new(OpKind::Call)]);
    let site = SiteId { unit, index: 0 };
    let hits = Rc::new(RefCell::new(Vec::new()));
    engine.set_tier_bridge(Box::new(Recorder(Rc::clone(&hits))));

    let callee = engine.register_function(|_, _, _| Ok(Value::Smi(1)));

    // Flagged but the unit has no optimized code: silent.
    engine.mark_transpiled(site);
    engine
        .dispatch(site, &[callee.clone(), Value::Undefined])
        .unwrap();
    assert!(hits.borrow().is_empty());

    engine.note_optimized_unit(unit);
    engine.invalidate(site);
    engine
        .dispatch(site, &[callee, Value::Undefined])
        .unwrap();
    assert_eq!(hits.borrow().len(), 1);
    assert_eq!(engine.cache_mode(site), CacheMode::Learning);
}
