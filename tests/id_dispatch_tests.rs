use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use scriptable::builtins::{
    BuiltinClass, InstanceIdInfo, MethodTag, PrototypeId, PrototypeValues, export_class,
};
use scriptable::{
    Attributes, EnumOptions, ObjectConfig, ObjectRef, PropertyDescriptor, PropertyKey,
    RuntimeError, ScriptObject, Strictness, Value, get_property,
};

const COUNT: u16 = 1;
const KIND: u16 = 2;

const PROTO_INCREMENT: PrototypeId = 1;
const PROTO_LIMIT: PrototypeId = 2;
const PROTO_LABEL: PrototypeId = 3;
const MAX_PROTO: u16 = 3;

/// A small built-in class: a per-instance counter with a constant kind
/// tag, plus one method, one constant, and one plain value on its
/// prototype.
struct Counter {
    me: Weak<Counter>,
    counts: Mutex<HashMap<u64, f64>>,
    inits: AtomicUsize,
}

impl Counter {
    fn new() -> Arc<Counter> {
        Arc::new_cyclic(|me| Counter {
            me: me.clone(),
            counts: Mutex::new(HashMap::new()),
            inits: AtomicUsize::new(0),
        })
    }

    fn new_instance(self: &Arc<Self>) -> ObjectRef {
        let obj = ScriptObject::new(ObjectConfig::single());
        let plain = obj.plain().unwrap();
        plain.attach_class(Arc::clone(self) as Arc<dyn BuiltinClass>);
        self.counts.lock().unwrap().insert(plain.id(), 0.0);
        obj
    }
}

impl BuiltinClass for Counter {
    fn class_name(&self) -> &str {
        "Counter"
    }

    fn max_instance_id(&self) -> u16 {
        2
    }

    fn find_instance_id(&self, key: &PropertyKey) -> Option<InstanceIdInfo> {
        match key.as_str()? {
            "count" => Some(InstanceIdInfo::new(Attributes::EMPTY, COUNT)),
            "kind" => Some(InstanceIdInfo::new(
                Attributes::READONLY | Attributes::PERMANENT,
                KIND,
            )),
            _ => None,
        }
    }

    fn instance_id_key(&self, id: u16) -> PropertyKey {
        match id {
            COUNT => PropertyKey::from("count"),
            KIND => PropertyKey::from("kind"),
            _ => panic!("Counter: no instance id {id}"),
        }
    }

    fn instance_value(&self, obj: &ScriptObject, id: u16) -> Option<Value> {
        match id {
            COUNT => self
                .counts
                .lock()
                .unwrap()
                .get(&obj.id())
                .copied()
                .map(Value::Number),
            KIND => Some(Value::string("counter")),
            _ => None,
        }
    }

    fn set_instance_value(&self, obj: &ScriptObject, id: u16, value: Option<Value>) {
        if id != COUNT {
            return;
        }
        let mut counts = self.counts.lock().unwrap();
        match value {
            Some(Value::Number(n)) => {
                counts.insert(obj.id(), n);
            }
            Some(_) => {}
            None => {
                counts.remove(&obj.id());
            }
        }
    }

    fn find_prototype_id(&self, key: &PropertyKey) -> Option<PrototypeId> {
        match key.as_str()? {
            "increment" => Some(PROTO_INCREMENT),
            "limit" => Some(PROTO_LIMIT),
            "label" => Some(PROTO_LABEL),
            _ => None,
        }
    }

    fn init_prototype_id(&self, table: &PrototypeValues, id: PrototypeId) {
        self.inits.fetch_add(1, Ordering::Relaxed);
        match id {
            PROTO_INCREMENT => table.init_method(id, "increment", Attributes::DONTENUM),
            PROTO_LIMIT => table.init_value(
                id,
                PropertyKey::from("limit"),
                Value::Number(10.0),
                Attributes::READONLY | Attributes::PERMANENT,
            ),
            PROTO_LABEL => table.init_value(
                id,
                PropertyKey::from("label"),
                Value::string("plain"),
                Attributes::EMPTY,
            ),
            _ => panic!("Counter: no prototype id {id}"),
        }
    }

    fn call_method(
        &self,
        tag: MethodTag,
        this: &Value,
        _args: &[Value],
    ) -> Result<Value, RuntimeError> {
        match tag {
            MethodTag::Constructor => {
                let class = self.me.upgrade().expect("class alive");
                Ok(Value::Object(class.new_instance()))
            }
            MethodTag::Prototype(PROTO_INCREMENT) => {
                let Some(obj) = this.as_object().and_then(|o| o.plain().map(|p| p.id())) else {
                    return Err(RuntimeError::NotCallable {
                        what: "increment receiver".to_string(),
                    });
                };
                let mut counts = self.counts.lock().unwrap();
                let slot = counts.entry(obj).or_insert(0.0);
                *slot += 1.0;
                Ok(Value::Number(*slot))
            }
            MethodTag::Prototype(other) => panic!("Counter: unhandled prototype id {other}"),
        }
    }

    fn fill_constructor(&self, ctor: &ObjectRef) -> Result<(), RuntimeError> {
        ctor.define_property(
            &PropertyKey::from("MAX"),
            Value::Number(1000.0),
            Attributes::READONLY | Attributes::PERMANENT | Attributes::DONTENUM,
        )
    }
}

fn exported() -> (ObjectRef, ObjectRef, Arc<Counter>) {
    let scope = ScriptObject::new(ObjectConfig::single());
    let class = Counter::new();
    let ctor = export_class(
        &scope,
        Arc::clone(&class) as Arc<dyn BuiltinClass>,
        MAX_PROTO,
        false,
        ObjectConfig::single(),
    )
    .unwrap();
    (scope, ctor, class)
}

fn proto_of(ctor: &ObjectRef) -> ObjectRef {
    match ctor.get(&PropertyKey::from("prototype"), ctor).unwrap() {
        Some(Value::Object(p)) => p,
        other => panic!("missing prototype: {other:?}"),
    }
}

#[test]
fn export_wires_constructor_and_prototype() {
    let (scope, ctor, _class) = exported();
    let proto = proto_of(&ctor);
    let back = proto.get(&PropertyKey::from("constructor"), &proto).unwrap();
    assert!(matches!(back, Some(Value::Object(c)) if c.ptr_eq(&ctor)));
    let installed = scope.get(&PropertyKey::from("Counter"), &scope).unwrap();
    assert!(matches!(installed, Some(Value::Object(c)) if c.ptr_eq(&ctor)));
    // Constructor-side statics from fill_constructor.
    assert_eq!(
        ctor.get(&PropertyKey::from("MAX"), &ctor).unwrap(),
        Some(Value::Number(1000.0))
    );
}

#[test]
fn prototype_ids_initialize_lazily_and_once() {
    let (_scope, ctor, class) = exported();
    assert_eq!(class.inits.load(Ordering::Relaxed), 0);

    let proto = proto_of(&ctor);
    assert_eq!(
        proto.get(&PropertyKey::from("limit"), &proto).unwrap(),
        Some(Value::Number(10.0))
    );
    assert_eq!(class.inits.load(Ordering::Relaxed), 1);

    // A second touch does not re-initialize.
    proto.get(&PropertyKey::from("limit"), &proto).unwrap();
    assert_eq!(class.inits.load(Ordering::Relaxed), 1);
}

#[test]
fn constructor_builds_instances_with_the_instance_tier() {
    let (_scope, ctor, _class) = exported();
    let instance = match ctor.construct(&[]).unwrap() {
        Value::Object(o) => o,
        other => panic!("expected object, got {other}"),
    };
    instance.set_prototype(Some(proto_of(&ctor))).unwrap();

    assert_eq!(
        instance.get(&PropertyKey::from("count"), &instance).unwrap(),
        Some(Value::Number(0.0))
    );
    assert_eq!(
        instance.get(&PropertyKey::from("kind"), &instance).unwrap(),
        Some(Value::string("counter"))
    );

    let increment = get_property(&instance, &PropertyKey::from("increment"))
        .unwrap()
        .unwrap();
    let Value::Function(increment) = increment else {
        panic!("increment is not callable");
    };
    increment.call(&Value::Object(instance.clone()), &[]).unwrap();
    increment.call(&Value::Object(instance.clone()), &[]).unwrap();
    assert_eq!(
        instance.get(&PropertyKey::from("count"), &instance).unwrap(),
        Some(Value::Number(2.0))
    );
}

#[test]
fn instance_id_writes_route_through_the_class() {
    let class = Counter::new();
    let instance = class.new_instance();
    instance
        .put(&PropertyKey::from("count"), &instance, Value::Number(7.0), Strictness::Sloppy)
        .unwrap();
    assert_eq!(
        class.counts.lock().unwrap().get(&instance.plain().unwrap().id()),
        Some(&7.0)
    );
}

#[test]
fn readonly_instance_id_rejects_writes() {
    let class = Counter::new();
    let instance = class.new_instance();
    instance
        .put(&PropertyKey::from("kind"), &instance, Value::string("x"), Strictness::Sloppy)
        .unwrap();
    assert_eq!(
        instance.get(&PropertyKey::from("kind"), &instance).unwrap(),
        Some(Value::string("counter"))
    );
    let err = instance
        .put(&PropertyKey::from("kind"), &instance, Value::string("x"), Strictness::Strict)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ReadOnlyProperty { .. }));
}

#[test]
fn instance_tier_wins_over_generic_slots() {
    let class = Counter::new();
    let instance = class.new_instance();
    let plain = instance.plain().unwrap();

    // Empty the instance id, then create a generic slot under the name.
    instance.delete(&PropertyKey::from("count"), Strictness::Sloppy).unwrap();
    instance
        .put(&PropertyKey::from("count"), &instance, Value::string("slot"), Strictness::Sloppy)
        .unwrap();
    assert_eq!(
        instance.get(&PropertyKey::from("count"), &instance).unwrap(),
        Some(Value::string("slot"))
    );

    // Once the id holds a value again, it shadows the slot.
    class.set_instance_value(plain, COUNT, Some(Value::Number(9.0)));
    assert_eq!(
        instance.get(&PropertyKey::from("count"), &instance).unwrap(),
        Some(Value::Number(9.0))
    );
}

#[test]
fn instance_id_attribute_changes_are_refused_by_default() {
    let class = Counter::new();
    let instance = class.new_instance();
    // Restating the current attributes is a no-op.
    instance
        .set_attributes(&PropertyKey::from("count"), Attributes::EMPTY)
        .unwrap();
    let err = instance
        .set_attributes(&PropertyKey::from("count"), Attributes::DONTENUM)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::AttributeChangeUnsupported { .. }));
}

#[test]
fn instance_ids_appear_in_enumeration() {
    let class = Counter::new();
    let instance = class.new_instance();
    let ids = instance.ids(EnumOptions::enumerable()).unwrap();
    assert!(ids.contains(&PropertyKey::from("count")));
    assert!(ids.contains(&PropertyKey::from("kind")));
}

#[test]
fn readonly_prototype_id_rejects_writes() {
    let (_scope, ctor, _class) = exported();
    let proto = proto_of(&ctor);
    let err = proto
        .put(&PropertyKey::from("limit"), &proto, Value::Number(0.0), Strictness::Strict)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ReadOnlyProperty { .. }));
}

#[test]
fn deleted_prototype_id_stays_deleted() {
    let (_scope, ctor, class) = exported();
    let proto = proto_of(&ctor);
    assert_eq!(
        proto.get(&PropertyKey::from("label"), &proto).unwrap(),
        Some(Value::string("plain"))
    );
    proto.delete(&PropertyKey::from("label"), Strictness::Sloppy).unwrap();
    assert_eq!(proto.get(&PropertyKey::from("label"), &proto).unwrap(), None);

    let inits = class.inits.load(Ordering::Relaxed);
    proto.get(&PropertyKey::from("label"), &proto).unwrap();
    assert_eq!(class.inits.load(Ordering::Relaxed), inits);
}

#[test]
fn accessor_redefinition_displaces_a_prototype_id_into_a_slot() {
    let (_scope, ctor, _class) = exported();
    let proto = proto_of(&ctor);

    let getter =
        scriptable::Callable::from_closure("g", |_this, _args| Ok(Value::string("accessor")));
    let mut desc = PropertyDescriptor::new();
    desc.set_getter(Some(getter)).set_configurable(true);
    proto.define_own_property(&PropertyKey::from("label"), &desc).unwrap();

    assert_eq!(
        proto.get(&PropertyKey::from("label"), &proto).unwrap(),
        Some(Value::string("accessor"))
    );
    let exported = proto
        .own_property_descriptor(&PropertyKey::from("label"))
        .unwrap()
        .unwrap();
    assert!(exported.getter().is_some());
}

#[test]
fn non_configurable_prototype_id_refuses_accessor_displacement() {
    let (_scope, ctor, _class) = exported();
    let proto = proto_of(&ctor);
    let getter = scriptable::Callable::from_closure("g", |_this, _args| Ok(Value::Undefined));
    let mut desc = PropertyDescriptor::new();
    desc.set_getter(Some(getter));
    let err = proto
        .define_own_property(&PropertyKey::from("limit"), &desc)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ChangeKind { .. }));
}

#[test]
fn enumerating_the_prototype_materializes_every_id() {
    let (_scope, ctor, class) = exported();
    let proto = proto_of(&ctor);
    let all = proto.ids(EnumOptions::all()).unwrap();
    assert!(all.contains(&PropertyKey::from("increment")));
    assert!(all.contains(&PropertyKey::from("limit")));
    assert!(all.contains(&PropertyKey::from("label")));
    assert_eq!(class.inits.load(Ordering::Relaxed), MAX_PROTO as usize);

    // The method is non-enumerable by default.
    let visible = proto.ids(EnumOptions::enumerable()).unwrap();
    assert!(!visible.contains(&PropertyKey::from("increment")));
}

#[test]
fn sealed_export_materializes_eagerly_and_freezes() {
    let scope = ScriptObject::new(ObjectConfig::single());
    let class = Counter::new();
    let ctor = export_class(
        &scope,
        Arc::clone(&class) as Arc<dyn BuiltinClass>,
        MAX_PROTO,
        true,
        ObjectConfig::single(),
    )
    .unwrap();
    assert_eq!(class.inits.load(Ordering::Relaxed), MAX_PROTO as usize);

    let proto = proto_of(&ctor);
    assert!(proto.is_sealed());
    let err = proto
        .put(&PropertyKey::from("label"), &proto, Value::Number(1.0), Strictness::Sloppy)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::ModifySealed { .. }));
    assert_eq!(
        proto.get(&PropertyKey::from("limit"), &proto).unwrap(),
        Some(Value::Number(10.0))
    );
}
