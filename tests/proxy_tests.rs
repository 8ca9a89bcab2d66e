use scriptable::{
    Attributes, Callable, EnumOptions, ObjectConfig, ObjectRef, PropertyDescriptor, PropertyKey,
    ProxyObject, RuntimeError, ScriptObject, Strictness, Value,
};

fn obj() -> ObjectRef {
    ScriptObject::new(ObjectConfig::single())
}

fn key(name: &str) -> PropertyKey {
    PropertyKey::from(name)
}

fn set(o: &ObjectRef, name: &str, value: Value) {
    o.put(&key(name), o, value, Strictness::Sloppy).unwrap();
}

fn fun<F>(name: &str, f: F) -> Value
where
    F: Fn(&Value, &[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
{
    Value::Function(Callable::from_closure(name, f))
}

fn handler_with(trap: &str, value: Value) -> ObjectRef {
    let h = obj();
    set(&h, trap, value);
    h
}

/// Array-like list object, the shape ownKeys traps return.
fn list(values: &[Value]) -> ObjectRef {
    let l = obj();
    for (i, v) in values.iter().enumerate() {
        l.define_property(&PropertyKey::from(i as u32), v.clone(), Attributes::EMPTY)
            .unwrap();
    }
    l.define_property(
        &key("length"),
        Value::Number(values.len() as f64),
        Attributes::DONTENUM,
    )
    .unwrap();
    l
}

#[test]
fn trapless_proxy_forwards_to_the_target() {
    let target = obj();
    set(&target, "x", Value::Number(1.0));
    let proxy = ProxyObject::new(target.clone(), obj());
    assert!(proxy.is_proxy());

    assert_eq!(proxy.get(&key("x"), &target).unwrap(), Some(Value::Number(1.0)));
    assert!(proxy.has(&key("x")).unwrap());
    assert!(!proxy.has(&key("y")).unwrap());

    proxy
        .put(&key("y"), &target, Value::Number(2.0), Strictness::Sloppy)
        .unwrap();
    assert_eq!(target.get(&key("y"), &target).unwrap(), Some(Value::Number(2.0)));

    proxy.delete(&key("y"), Strictness::Sloppy).unwrap();
    assert!(!target.has(&key("y")).unwrap());

    assert_eq!(proxy.ids(EnumOptions::enumerable()).unwrap(), vec![key("x")]);
    assert!(proxy.is_extensible().unwrap());
}

#[test]
fn get_trap_intercepts_reads() {
    let target = obj();
    set(&target, "x", Value::Number(1.0));
    let handler = handler_with(
        "get",
        fun("get", |_this, args| {
            // args: target, key, receiver
            assert_eq!(args[1], Value::string("x"));
            Ok(Value::Number(42.0))
        }),
    );
    let proxy = ProxyObject::new(target.clone(), handler);
    assert_eq!(proxy.get(&key("x"), &target).unwrap(), Some(Value::Number(42.0)));
}

#[test]
fn get_trap_cannot_misreport_a_frozen_data_property() {
    let target = obj();
    target
        .define_property(&key("x"), Value::Number(1.0), Attributes::READONLY | Attributes::PERMANENT)
        .unwrap();
    let handler = handler_with("get", fun("get", |_this, _args| Ok(Value::Number(2.0))));
    let proxy = ProxyObject::new(target.clone(), handler);
    let err = proxy.get(&key("x"), &target).unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "get", .. }));

    // Reporting the true value is fine.
    let honest = handler_with("get", fun("get", |_this, _args| Ok(Value::Number(1.0))));
    let proxy = ProxyObject::new(target.clone(), honest);
    assert_eq!(proxy.get(&key("x"), &target).unwrap(), Some(Value::Number(1.0)));
}

#[test]
fn get_trap_cannot_invent_a_value_for_a_getterless_accessor() {
    let target = obj();
    let setter = Callable::from_closure("s", |_this, _args| Ok(Value::Undefined));
    let mut desc = PropertyDescriptor::new();
    desc.set_setter(Some(setter));
    target.define_own_property(&key("x"), &desc).unwrap();

    let handler = handler_with("get", fun("get", |_this, _args| Ok(Value::Number(1.0))));
    let proxy = ProxyObject::new(target.clone(), handler);
    let err = proxy.get(&key("x"), &target).unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "get", .. }));

    let honest = handler_with("get", fun("get", |_this, _args| Ok(Value::Undefined)));
    let proxy = ProxyObject::new(target.clone(), honest);
    assert_eq!(proxy.get(&key("x"), &target).unwrap(), Some(Value::Undefined));
}

#[test]
fn rejecting_set_trap_is_silent_sloppy_and_fatal_strict() {
    let target = obj();
    let handler = handler_with("set", fun("set", |_this, _args| Ok(Value::Bool(false))));
    let proxy = ProxyObject::new(target.clone(), handler);

    proxy
        .put(&key("x"), &target, Value::Number(1.0), Strictness::Sloppy)
        .unwrap();
    assert!(!target.has(&key("x")).unwrap());

    let err = proxy
        .put(&key("x"), &target, Value::Number(1.0), Strictness::Strict)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TrapRejected { trap: "set" }));
}

#[test]
fn set_trap_cannot_claim_success_on_a_frozen_property() {
    let target = obj();
    target
        .define_property(&key("x"), Value::Number(1.0), Attributes::READONLY | Attributes::PERMANENT)
        .unwrap();
    let handler = handler_with("set", fun("set", |_this, _args| Ok(Value::Bool(true))));
    let proxy = ProxyObject::new(target.clone(), handler);
    let err = proxy
        .put(&key("x"), &target, Value::Number(2.0), Strictness::Sloppy)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "set", .. }));

    // Claiming to write the current value back is consistent.
    proxy
        .put(&key("x"), &target, Value::Number(1.0), Strictness::Sloppy)
        .unwrap();
}

#[test]
fn has_trap_cannot_hide_a_non_configurable_property() {
    let target = obj();
    target
        .define_property(&key("x"), Value::Number(1.0), Attributes::PERMANENT)
        .unwrap();
    let handler = handler_with("has", fun("has", |_this, _args| Ok(Value::Bool(false))));
    let proxy = ProxyObject::new(target, handler);
    let err = proxy.has(&key("x")).unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "has", .. }));
}

#[test]
fn has_trap_cannot_hide_keys_of_a_non_extensible_target() {
    let target = obj();
    set(&target, "x", Value::Number(1.0));
    target.prevent_extensions().unwrap();
    let handler = handler_with("has", fun("has", |_this, _args| Ok(Value::Bool(false))));
    let proxy = ProxyObject::new(target, handler);
    let err = proxy.has(&key("x")).unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "has", .. }));

    // Hiding a key the target never had is allowed.
    assert!(!proxy.has(&key("missing")).unwrap());
}

#[test]
fn delete_trap_rejection_and_invariants() {
    let target = obj();
    target
        .define_property(&key("x"), Value::Number(1.0), Attributes::PERMANENT)
        .unwrap();

    let refusing = handler_with(
        "deleteProperty",
        fun("deleteProperty", |_this, _args| Ok(Value::Bool(false))),
    );
    let proxy = ProxyObject::new(target.clone(), refusing);
    proxy.delete(&key("x"), Strictness::Sloppy).unwrap();
    let err = proxy.delete(&key("x"), Strictness::Strict).unwrap_err();
    assert!(matches!(err, RuntimeError::TrapRejected { trap: "deleteProperty" }));

    // Claiming to delete a non-configurable property is a violation.
    let lying = handler_with(
        "deleteProperty",
        fun("deleteProperty", |_this, _args| Ok(Value::Bool(true))),
    );
    let proxy = ProxyObject::new(target, lying);
    let err = proxy.delete(&key("x"), Strictness::Sloppy).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ProxyInvariant { trap: "deleteProperty", .. }
    ));
}

#[test]
fn gopd_trap_result_is_completed_and_validated() {
    let target = obj();
    let reported = obj();
    set(&reported, "value", Value::Number(5.0));
    set(&reported, "configurable", Value::Bool(true));
    let handler = handler_with(
        "getOwnPropertyDescriptor",
        fun("getOwnPropertyDescriptor", move |_this, _args| {
            Ok(Value::Object(reported.clone()))
        }),
    );
    let proxy = ProxyObject::new(target, handler);

    let desc = proxy.own_property_descriptor(&key("x")).unwrap().unwrap();
    assert_eq!(desc.value(), &Value::Number(5.0));
    assert!(desc.is_configurable());
    // Absent fields come back defaulted, never missing.
    assert!(desc.has_writable() && !desc.is_writable());
    assert!(desc.has_enumerable() && !desc.is_enumerable());
}

#[test]
fn gopd_trap_cannot_report_absence_of_a_non_configurable_property() {
    let target = obj();
    target
        .define_property(&key("x"), Value::Number(1.0), Attributes::PERMANENT)
        .unwrap();
    let handler = handler_with(
        "getOwnPropertyDescriptor",
        fun("getOwnPropertyDescriptor", |_this, _args| Ok(Value::Undefined)),
    );
    let proxy = ProxyObject::new(target, handler);
    let err = proxy.own_property_descriptor(&key("x")).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ProxyInvariant { trap: "getOwnPropertyDescriptor", .. }
    ));
}

#[test]
fn gopd_trap_cannot_invent_a_non_configurable_property() {
    let target = obj();
    let reported = obj();
    set(&reported, "value", Value::Number(5.0));
    // configurable absent reads as false once completed
    let handler = handler_with(
        "getOwnPropertyDescriptor",
        fun("getOwnPropertyDescriptor", move |_this, _args| {
            Ok(Value::Object(reported.clone()))
        }),
    );
    let proxy = ProxyObject::new(target, handler);
    let err = proxy.own_property_descriptor(&key("x")).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ProxyInvariant { trap: "getOwnPropertyDescriptor", .. }
    ));
}

#[test]
fn define_property_trap_rejection_and_validation() {
    let target = obj();
    let refusing = handler_with(
        "defineProperty",
        fun("defineProperty", |_this, _args| Ok(Value::Bool(false))),
    );
    let proxy = ProxyObject::new(target.clone(), refusing);
    let err = proxy
        .define_own_property(&key("x"), &PropertyDescriptor::value_only(Value::Number(1.0)))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TrapRejected { trap: "defineProperty" }));

    // Claiming to define a non-configurable property the target lacks.
    let lying = handler_with(
        "defineProperty",
        fun("defineProperty", |_this, _args| Ok(Value::Bool(true))),
    );
    let proxy = ProxyObject::new(target, lying);
    let mut pinned = PropertyDescriptor::value_only(Value::Number(1.0));
    pinned.set_configurable(false);
    let err = proxy.define_own_property(&key("x"), &pinned).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ProxyInvariant { trap: "defineProperty", .. }
    ));
}

#[test]
fn own_keys_trap_filters_by_enumerability() {
    let target = obj();
    set(&target, "a", Value::Number(1.0));
    target
        .define_property(&key("b"), Value::Number(2.0), Attributes::DONTENUM)
        .unwrap();
    let handler = handler_with(
        "ownKeys",
        fun("ownKeys", |_this, _args| {
            Ok(Value::Object(list(&[Value::string("a"), Value::string("b")])))
        }),
    );
    let proxy = ProxyObject::new(target, handler);
    assert_eq!(proxy.ids(EnumOptions::enumerable()).unwrap(), vec![key("a")]);
    assert_eq!(proxy.ids(EnumOptions::all()).unwrap(), vec![key("a"), key("b")]);
}

#[test]
fn own_keys_trap_cannot_omit_a_non_configurable_key() {
    let target = obj();
    set(&target, "a", Value::Number(1.0));
    target
        .define_property(&key("pinned"), Value::Number(2.0), Attributes::PERMANENT)
        .unwrap();
    let handler = handler_with(
        "ownKeys",
        fun("ownKeys", |_this, _args| {
            Ok(Value::Object(list(&[Value::string("a")])))
        }),
    );
    let proxy = ProxyObject::new(target, handler);
    let err = proxy.ids(EnumOptions::all()).unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "ownKeys", .. }));
}

#[test]
fn own_keys_trap_must_match_a_non_extensible_target_exactly() {
    let target = obj();
    set(&target, "a", Value::Number(1.0));
    target.prevent_extensions().unwrap();
    let handler = handler_with(
        "ownKeys",
        fun("ownKeys", |_this, _args| {
            Ok(Value::Object(list(&[Value::string("a"), Value::string("extra")])))
        }),
    );
    let proxy = ProxyObject::new(target, handler);
    let err = proxy.ids(EnumOptions::all()).unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "ownKeys", .. }));
}

#[test]
fn own_keys_trap_rejects_duplicates() {
    let target = obj();
    let handler = handler_with(
        "ownKeys",
        fun("ownKeys", |_this, _args| {
            Ok(Value::Object(list(&[Value::string("a"), Value::string("a")])))
        }),
    );
    let proxy = ProxyObject::new(target, handler);
    let err = proxy.ids(EnumOptions::all()).unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "ownKeys", .. }));
}

#[test]
fn prototype_traps_agree_with_a_non_extensible_target() {
    let real_proto = obj();
    let target = ScriptObject::with_prototype(ObjectConfig::single(), real_proto.clone());
    target.prevent_extensions().unwrap();

    let handler = handler_with(
        "getPrototypeOf",
        fun("getPrototypeOf", |_this, _args| Ok(Value::Null)),
    );
    let proxy = ProxyObject::new(target.clone(), handler);
    let err = proxy.prototype().unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ProxyInvariant { trap: "getPrototypeOf", .. }
    ));

    let honest = handler_with(
        "getPrototypeOf",
        fun("getPrototypeOf", move |_this, _args| {
            Ok(Value::Object(real_proto.clone()))
        }),
    );
    let proxy = ProxyObject::new(target, honest);
    assert!(proxy.prototype().unwrap().is_some());
}

#[test]
fn set_prototype_trap_rejection() {
    let target = obj();
    let handler = handler_with(
        "setPrototypeOf",
        fun("setPrototypeOf", |_this, _args| Ok(Value::Bool(false))),
    );
    let proxy = ProxyObject::new(target, handler);
    let err = proxy.set_prototype(Some(obj())).unwrap_err();
    assert!(matches!(err, RuntimeError::TrapRejected { trap: "setPrototypeOf" }));
}

#[test]
fn is_extensible_trap_must_agree_with_the_target() {
    let target = obj();
    let lying = handler_with(
        "isExtensible",
        fun("isExtensible", |_this, _args| Ok(Value::Bool(false))),
    );
    let proxy = ProxyObject::new(target.clone(), lying);
    let err = proxy.is_extensible().unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ProxyInvariant { trap: "isExtensible", .. }
    ));

    target.prevent_extensions().unwrap();
    assert!(!proxy.is_extensible().unwrap());
}

#[test]
fn prevent_extensions_trap_needs_the_target_locked_down() {
    let target = obj();
    let handler = handler_with(
        "preventExtensions",
        fun("preventExtensions", |_this, _args| Ok(Value::Bool(true))),
    );
    let proxy = ProxyObject::new(target.clone(), handler);
    let err = proxy.prevent_extensions().unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::ProxyInvariant { trap: "preventExtensions", .. }
    ));

    target.prevent_extensions().unwrap();
    proxy.prevent_extensions().unwrap();
}

#[test]
fn apply_trap_receives_packed_arguments() {
    let target = obj();
    let handler = handler_with(
        "apply",
        fun("apply", |_this, args| {
            // args: target, this, argument list
            let Value::Object(list) = &args[2] else {
                panic!("argument list is not an object");
            };
            let len = list.get(&PropertyKey::from("length"), list).unwrap();
            assert_eq!(len, Some(Value::Number(2.0)));
            let first = list.get(&PropertyKey::from(0u32), list).unwrap();
            let second = list.get(&PropertyKey::from(1u32), list).unwrap();
            match (first, second) {
                (Some(Value::Number(a)), Some(Value::Number(b))) => Ok(Value::Number(a + b)),
                other => panic!("unexpected arguments: {other:?}"),
            }
        }),
    );
    let proxy = ProxyObject::new(target, handler);
    let result = proxy
        .call(&Value::Undefined, &[Value::Number(2.0), Value::Number(3.0)])
        .unwrap();
    assert_eq!(result, Value::Number(5.0));
}

#[test]
fn construct_trap_must_return_an_object() {
    let target = obj();
    let handler = handler_with(
        "construct",
        fun("construct", |_this, _args| Ok(Value::Number(1.0))),
    );
    let proxy = ProxyObject::new(target.clone(), handler);
    let err = proxy.construct(&[]).unwrap_err();
    assert!(matches!(err, RuntimeError::ProxyInvariant { trap: "construct", .. }));

    let returning = target.clone();
    let handler = handler_with(
        "construct",
        fun("construct", move |_this, _args| {
            Ok(Value::Object(returning.clone()))
        }),
    );
    let proxy = ProxyObject::new(target.clone(), handler);
    let built = proxy.construct(&[]).unwrap();
    assert_eq!(built, Value::Object(target));
}

#[test]
fn revoked_proxy_fails_every_operation() {
    let target = obj();
    set(&target, "x", Value::Number(1.0));
    let (proxy, revoker) = ProxyObject::revocable(target.clone(), obj());

    assert_eq!(proxy.get(&key("x"), &target).unwrap(), Some(Value::Number(1.0)));
    revoker.call(&Value::Undefined, &[]).unwrap();

    let err = proxy.get(&key("x"), &target).unwrap_err();
    assert!(matches!(err, RuntimeError::RevokedProxy { .. }));
    let err = proxy.has(&key("x")).unwrap_err();
    assert!(matches!(err, RuntimeError::RevokedProxy { .. }));
    let err = proxy.ids(EnumOptions::all()).unwrap_err();
    assert!(matches!(err, RuntimeError::RevokedProxy { .. }));

    // Revoking twice is harmless.
    revoker.call(&Value::Undefined, &[]).unwrap();
}
