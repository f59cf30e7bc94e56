//! Write Path Integration Tests
//!
//! SetProp and SetElem through engine dispatch: the two-phase add-slot
//! protocol, setter invocation, strict failures and the megamorphic
//! behavior of hot polymorphic write sites.

use core_types::{ErrorKind, PropertyKey, Value};
use ic_engine::{CacheConfig, CacheMode, Engine, OpKind, OpSite, SiteId, SitePayload};
use memory_manager::Slot;
use op_library::{Context, WriteFlavor};

fn set_prop_site(name: &str, flavor: WriteFlavor) -> OpSite {
    OpSite::with_payload(
        OpKind::SetProp,
        SitePayload::NamedWrite {
            name: PropertyKey::from_str_key(name),
            flavor,
        },
    )
}

fn one_site(engine: &mut Engine, site: OpSite) -> SiteId {
    let unit = engine.add_unit(vec![site]);
    SiteId { unit, index: 0 }
}

#[test]
fn test_add_slot_write_transitions_shape_and_attaches_once() {
    let mut engine = Engine::new();
    let site = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: false }),
    );
    let obj = engine.heap_mut().alloc_object();
    let old_shape = engine.heap().shape_of(obj);

    let v = engine
        .dispatch(site, &[Value::Object(obj), Value::Smi(1)])
        .unwrap();
    assert_eq!(v, Value::Smi(1));
    assert_ne!(engine.heap().shape_of(obj), old_shape);
    assert_eq!(engine.num_specialized(site), 1);
    assert_eq!(engine.attach_failures(site), 0);

    // A second object still on the old shape takes the same transition
    // through the attached add-slot stub.
    let other = engine.heap_mut().alloc_object();
    engine
        .dispatch(site, &[Value::Object(other), Value::Smi(2)])
        .unwrap();
    assert_eq!(engine.entered_count(site), 1);
    assert_eq!(engine.heap().shape_of(other), engine.heap().shape_of(obj));
    assert_eq!(
        engine.heap().get(other).slots[0],
        Slot::Data(Value::Smi(2))
    );
}

#[test]
fn test_existing_slot_write_overwrites_in_place() {
    let mut engine = Engine::new();
    let site = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: false }),
    );
    let obj = engine.heap_mut().alloc_object();
    engine
        .heap_mut()
        .define_data_property(obj, PropertyKey::from_str_key("x"), Value::Smi(1));
    let shape = engine.heap().shape_of(obj);

    engine
        .dispatch(site, &[Value::Object(obj), Value::Smi(2)])
        .unwrap();
    assert_eq!(engine.heap().shape_of(obj), shape);
    assert_eq!(engine.heap().get(obj).slots[0], Slot::Data(Value::Smi(2)));
    assert_eq!(engine.num_specialized(site), 1);
}

#[test]
fn test_setter_receives_receiver_and_rhs() {
    let mut engine = Engine::new();
    let site = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: false }),
    );

    let setter = engine.register_function(|engine, this, args| {
        let id = this.as_object().unwrap();
        engine.heap_mut().define_data_property(
            id,
            PropertyKey::from_str_key("stored"),
            args[0].clone(),
        );
        Ok(Value::Undefined)
    });
    let obj = engine.heap_mut().alloc_object();
    engine.heap_mut().define_accessor_property(
        obj,
        PropertyKey::from_str_key("x"),
        None,
        setter.as_object(),
    );

    let v = engine
        .dispatch(site, &[Value::Object(obj), Value::Smi(9)])
        .unwrap();
    // The dispatched value is the rhs, not the setter's return.
    assert_eq!(v, Value::Smi(9));
    assert_eq!(
        op_library::get_property(
            &mut engine,
            &Value::Object(obj),
            &PropertyKey::from_str_key("stored")
        )
        .unwrap(),
        Value::Smi(9)
    );
}

#[test]
fn test_strict_write_to_getter_only_property_throws() {
    let mut engine = Engine::new();
    let strict = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: true }),
    );
    let sloppy = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: false }),
    );

    let getter = engine.register_function(|_, _, _| Ok(Value::Smi(1)));
    let obj = engine.heap_mut().alloc_object();
    engine.heap_mut().define_accessor_property(
        obj,
        PropertyKey::from_str_key("x"),
        getter.as_object(),
        None,
    );

    let err = engine
        .dispatch(strict, &[Value::Object(obj), Value::Smi(2)])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);

    // The sloppy write is silently dropped.
    let v = engine
        .dispatch(sloppy, &[Value::Object(obj), Value::Smi(2)])
        .unwrap();
    assert_eq!(v, Value::Smi(2));
}

#[test]
fn test_init_flavor_defines_own_property_ignoring_setters() {
    let mut engine = Engine::new();
    let site = one_site(&mut engine, set_prop_site("x", WriteFlavor::Init));

    let setter = engine.register_function(|_, _, _| {
        panic!("initialization must not invoke inherited setters")
    });
    let proto = engine.heap_mut().alloc_object();
    engine.heap_mut().define_accessor_property(
        proto,
        PropertyKey::from_str_key("x"),
        None,
        setter.as_object(),
    );
    let obj = engine.heap_mut().alloc_object();
    engine.heap_mut().get_mut(obj).prototype = Some(proto);

    engine
        .dispatch(site, &[Value::Object(obj), Value::Smi(3)])
        .unwrap();
    assert_eq!(engine.heap().get(obj).slots[0], Slot::Data(Value::Smi(3)));
}

/// The deferred add-slot attach keys on the shape snapshotted before the
/// store, even when the store runs a setter that transitions the
/// receiver's shape in between.
#[test]
fn test_deferred_attach_keys_on_pre_store_shape_despite_setter_mutation() {
    let mut engine = Engine::new();
    let site = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: false }),
    );

    let setter = engine.register_function(|engine, this, _| {
        let id = this.as_object().unwrap();
        engine.heap_mut().define_data_property(
            id,
            PropertyKey::from_str_key("marker"),
            Value::Smi(1),
        );
        Ok(Value::Undefined)
    });
    let proto = engine.heap_mut().alloc_object();
    engine.heap_mut().define_accessor_property(
        proto,
        PropertyKey::from_str_key("x"),
        None,
        setter.as_object(),
    );
    let receiver = engine.heap_mut().alloc_object();
    let pre_store_shape = engine.heap().shape_of(receiver);
    engine.heap_mut().get_mut(receiver).prototype = Some(proto);

    let v = engine
        .dispatch(site, &[Value::Object(receiver), Value::Smi(5)])
        .unwrap();
    assert_eq!(v, Value::Smi(5));
    // The setter moved the receiver off its pre-store shape mid-store;
    // the deferred attach still committed exactly one stub.
    assert_ne!(engine.heap().shape_of(receiver), pre_store_shape);
    assert_eq!(engine.num_specialized(site), 1);
    assert_eq!(engine.attach_failures(site), 0);

    // An object still on the pre-store shape goes through the stub.
    let fresh = engine.heap_mut().alloc_object();
    assert_eq!(engine.heap().shape_of(fresh), pre_store_shape);
    engine
        .dispatch(site, &[Value::Object(fresh), Value::Smi(6)])
        .unwrap();
    assert_eq!(engine.entered_count(site), 1);
    assert_eq!(
        engine.heap().get(fresh).slots[0],
        Slot::Data(Value::Smi(6))
    );

    // The mutated receiver no longer matches the guard and re-enters
    // the fallback.
    engine
        .dispatch(site, &[Value::Object(receiver), Value::Smi(7)])
        .unwrap();
    assert_eq!(engine.entered_count(site), 2);
}

#[test]
fn test_write_shadows_prototype_data_property() {
    let mut engine = Engine::new();
    let site = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: false }),
    );

    let proto = engine.heap_mut().alloc_object();
    engine
        .heap_mut()
        .define_data_property(proto, PropertyKey::from_str_key("x"), Value::Smi(1));
    let obj = engine.heap_mut().alloc_object();
    engine.heap_mut().get_mut(obj).prototype = Some(proto);

    engine
        .dispatch(site, &[Value::Object(obj), Value::Smi(2)])
        .unwrap();
    assert_eq!(engine.heap().get(obj).slots[0], Slot::Data(Value::Smi(2)));
    // The prototype's copy is untouched.
    assert_eq!(engine.heap().get(proto).slots[0], Slot::Data(Value::Smi(1)));
}

#[test]
fn test_set_elem_dense_store_keeps_shape() {
    let mut engine = Engine::new();
    let site = one_site(
        &mut engine,
        OpSite::with_payload(
            OpKind::SetElem,
            SitePayload::ElemWrite(WriteFlavor::Set { strict: false }),
        ),
    );
    let arr = engine.heap_mut().alloc_array(2);
    let shape = engine.heap().shape_of(arr);

    let v = engine
        .dispatch(
            site,
            &[Value::Object(arr), Value::Smi(1), Value::Smi(42)],
        )
        .unwrap();
    assert_eq!(v, Value::Smi(42));
    assert_eq!(engine.heap().get(arr).element(1), Value::Smi(42));
    assert_eq!(engine.heap().shape_of(arr), shape);
    assert_eq!(engine.num_specialized(site), 1);

    // Same shapes again run through the stub.
    engine
        .dispatch(site, &[Value::Object(arr), Value::Smi(0), Value::Smi(7)])
        .unwrap();
    assert_eq!(engine.entered_count(site), 1);
    assert_eq!(engine.heap().get(arr).element(0), Value::Smi(7));
}

#[test]
fn test_set_elem_named_key_stores_without_attaching() {
    let mut engine = Engine::new();
    let site = one_site(
        &mut engine,
        OpSite::with_payload(
            OpKind::SetElem,
            SitePayload::ElemWrite(WriteFlavor::Set { strict: false }),
        ),
    );
    let obj = engine.heap_mut().alloc_object();

    // A string key is transiently unoptimizable for this kind: the
    // store happens, no stub, no failure counted.
    engine
        .dispatch(
            site,
            &[
                Value::Object(obj),
                Value::String("name".into()),
                Value::Smi(1),
            ],
        )
        .unwrap();
    assert_eq!(engine.num_specialized(site), 0);
    assert_eq!(engine.attach_failures(site), 0);
    assert_eq!(
        op_library::get_property(
            &mut engine,
            &Value::Object(obj),
            &PropertyKey::from_str_key("name")
        )
        .unwrap(),
        Value::Smi(1)
    );
}

#[test]
fn test_array_length_write_resizes_elements() {
    let mut engine = Engine::new();
    let site = one_site(
        &mut engine,
        set_prop_site("length", WriteFlavor::Set { strict: false }),
    );
    let arr = engine.heap_mut().alloc_array(4);

    engine
        .dispatch(site, &[Value::Object(arr), Value::Smi(1)])
        .unwrap();
    assert_eq!(engine.heap().get(arr).elements.len(), 1);

    let err = engine
        .dispatch(site, &[Value::Object(arr), Value::Double(1.5)])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RangeError);
}

#[test]
fn test_polymorphic_write_site_degrades_and_still_stores() {
    let config = CacheConfig {
        max_specialized_stubs: 2,
        ..CacheConfig::default()
    };
    let mut engine = Engine::with_config(config);
    let site = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: false }),
    );

    // Objects with distinct shapes, each already owning `x`.
    let mut objects = Vec::new();
    for i in 0..4 {
        let obj = engine.heap_mut().alloc_object();
        for j in 0..=i {
            let key = PropertyKey::from_str_key(&format!("p{}", j));
            engine.heap_mut().define_data_property(obj, key, Value::Smi(0));
        }
        engine
            .heap_mut()
            .define_data_property(obj, PropertyKey::from_str_key("x"), Value::Smi(0));
        objects.push(obj);
    }

    let mut modes = Vec::new();
    for round in 0..6 {
        for &obj in &objects {
            engine
                .dispatch(site, &[Value::Object(obj), Value::Smi(round)])
                .unwrap();
            assert!(engine.num_specialized(site) <= 2);
            modes.push(engine.cache_mode(site));
        }
    }
    // Capacity pushes the site megamorphic, then the failure budget in
    // megamorphic mode finishes the slide to generic.
    assert!(modes.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(engine.cache_mode(site), CacheMode::Generic);
    for &obj in &objects {
        let slot = engine.heap().lookup_own(obj, &PropertyKey::from_str_key("x")).unwrap();
        assert_eq!(
            engine.heap().get(obj).slots[slot.index as usize],
            Slot::Data(Value::Smi(5))
        );
    }
}

#[test]
fn test_write_to_primitive_is_dropped_or_throws_by_strictness() {
    let mut engine = Engine::new();
    let sloppy = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: false }),
    );
    let strict = one_site(
        &mut engine,
        set_prop_site("x", WriteFlavor::Set { strict: true }),
    );

    let v = engine
        .dispatch(sloppy, &[Value::Smi(1), Value::Smi(2)])
        .unwrap();
    assert_eq!(v, Value::Smi(2));

    let err = engine
        .dispatch(strict, &[Value::Smi(1), Value::Smi(2)])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}
