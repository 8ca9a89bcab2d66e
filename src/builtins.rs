//! Id-dispatch tiers for built-in classes. A class maps a small fixed set
//! of property keys to integer ids; instance ids live in per-object state
//! managed by the class, prototype ids live in a lazily initialized table
//! on the class prototype object. Both tiers take precedence over generic
//! slots of the same key.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::config::{EnumOptions, ObjectConfig};
use crate::errors::RuntimeError;
use crate::key::PropertyKey;
use crate::object::{Attributes, ObjectRef, ScriptObject};
use crate::value::{Callable, Value};

/// Prototype ids are small positive integers, `1..=max_id`.
pub type PrototypeId = u16;

/// Attributes and id of one instance-tier property, packed the way the
/// tier reports them: fixed attributes, id chosen by the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceIdInfo {
    id: u16,
    attributes: Attributes,
}

impl InstanceIdInfo {
    pub fn new(attributes: Attributes, id: u16) -> Self {
        assert!(id != 0, "instance ids start at 1");
        Self { id, attributes }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }
}

/// Which handler a method call routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodTag {
    /// The class constructor, invoked as a function or with `construct`.
    Constructor,
    /// A prototype method, by its prototype id.
    Prototype(PrototypeId),
}

/// A built-in class: key-to-id mapping plus the hooks the tiers call.
/// Hooks for ids the class never reports are unreachable; the defaults
/// panic to surface registration bugs.
pub trait BuiltinClass: Send + Sync + 'static {
    fn class_name(&self) -> &str;

    fn max_instance_id(&self) -> u16 {
        0
    }

    fn find_instance_id(&self, _key: &PropertyKey) -> Option<InstanceIdInfo> {
        None
    }

    fn instance_id_key(&self, id: u16) -> PropertyKey {
        panic!("{}: no instance id {id}", self.class_name());
    }

    /// Current value of an instance id, `None` when logically empty.
    fn instance_value(&self, _obj: &ScriptObject, id: u16) -> Option<Value> {
        panic!("{}: no instance id {id}", self.class_name());
    }

    /// Stores or clears an instance id value. Clearing happens on delete.
    fn set_instance_value(&self, _obj: &ScriptObject, id: u16, _value: Option<Value>) {
        panic!("{}: no instance id {id}", self.class_name());
    }

    /// Attribute changes on instance ids are opt-in per class.
    fn set_instance_attributes(
        &self,
        _obj: &ScriptObject,
        id: u16,
        _attributes: Attributes,
    ) -> Result<(), RuntimeError> {
        Err(RuntimeError::AttributeChangeUnsupported {
            key: self.instance_id_key(id).to_string(),
            class_name: self.class_name().to_string(),
        })
    }

    fn find_prototype_id(&self, _key: &PropertyKey) -> Option<PrototypeId> {
        None
    }

    /// Populates one prototype id on first touch through
    /// `table.init_value` or `table.init_method`. Must initialize exactly
    /// the id it was asked for.
    fn init_prototype_id(&self, _table: &PrototypeValues, id: PrototypeId) {
        panic!("{}: no prototype id {id}", self.class_name());
    }

    /// Dispatches the constructor or a prototype method.
    fn call_method(
        &self,
        tag: MethodTag,
        _this: &Value,
        _args: &[Value],
    ) -> Result<Value, RuntimeError> {
        panic!("{}: unhandled method tag {tag:?}", self.class_name());
    }

    /// Extra properties on the constructor object, installed at export.
    fn fill_constructor(&self, _ctor: &ObjectRef) -> Result<(), RuntimeError> {
        Ok(())
    }
}

pub(crate) struct BuiltinData {
    pub(crate) class: Arc<dyn BuiltinClass>,
    pub(crate) prototype_values: Option<PrototypeValues>,
}

/// One materialized prototype-id entry. A deleted entry stays in the
/// table with its value cleared so it never re-initializes.
#[derive(Clone)]
struct Entry {
    key: PropertyKey,
    value: Option<Value>,
    attributes: Attributes,
}

/// A resolved, live prototype-id entry as the tiers see it.
pub(crate) struct ResolvedEntry {
    pub(crate) value: Value,
    pub(crate) attributes: Attributes,
}

/// Lazily initialized backing store for the prototype-id tier. The table
/// itself is allocated on first touch; each id is populated on first
/// touch by the class's `init_prototype_id` hook.
pub struct PrototypeValues {
    class: Arc<dyn BuiltinClass>,
    max_id: u16,
    table: OnceCell<Mutex<Vec<Option<Entry>>>>,
}

impl PrototypeValues {
    pub(crate) fn new(class: Arc<dyn BuiltinClass>, max_id: u16) -> Self {
        assert!(max_id != 0, "a prototype map needs at least one id");
        Self {
            class,
            max_id,
            table: OnceCell::new(),
        }
    }

    pub(crate) fn max_id(&self) -> u16 {
        self.max_id
    }

    fn table(&self) -> &Mutex<Vec<Option<Entry>>> {
        self.table
            .get_or_init(|| Mutex::new(vec![None; self.max_id as usize]))
    }

    fn index(&self, id: PrototypeId) -> usize {
        assert!(
            1 <= id && id <= self.max_id,
            "{}: prototype id {id} out of range 1..={}",
            self.class.class_name(),
            self.max_id
        );
        (id - 1) as usize
    }

    /// Forces initialization of `id`. Panics if the class hook does not
    /// populate the id it was asked for.
    fn ensure(&self, id: PrototypeId) {
        let index = self.index(id);
        if self.table().lock()[index].is_some() {
            return;
        }
        // Initialize outside the lock; the hook calls back into init_value.
        self.class.init_prototype_id(self, id);
        if self.table().lock()[index].is_none() {
            panic!(
                "{}: init_prototype_id did not initialize id {id}",
                self.class.class_name()
            );
        }
    }

    /// Called by `init_prototype_id` hooks to supply the entry for `id`.
    /// The key must map back to `id` through `find_prototype_id`.
    pub fn init_value(&self, id: PrototypeId, key: PropertyKey, value: Value, attributes: Attributes) {
        assert_eq!(
            self.class.find_prototype_id(&key),
            Some(id),
            "{}: key '{key}' does not map to prototype id {id}",
            self.class.class_name()
        );
        let index = self.index(id);
        let mut table = self.table().lock();
        // First initialization wins under a racing ensure.
        if table[index].is_none() {
            table[index] = Some(Entry {
                key,
                value: Some(value),
                attributes,
            });
        }
    }

    /// Shorthand for initializing a method entry: builds a callable that
    /// routes through the class dispatch table.
    pub fn init_method(&self, id: PrototypeId, name: &str, attributes: Attributes) {
        let class = Arc::clone(&self.class);
        let method = Callable::from_closure(name, move |this, args| {
            class.call_method(MethodTag::Prototype(id), this, args)
        });
        self.init_value(id, PropertyKey::from(name), Value::Function(method), attributes);
    }

    /// Live entry for `id`, forcing initialization. `None` means deleted.
    pub(crate) fn resolved_entry(&self, id: PrototypeId) -> Option<ResolvedEntry> {
        self.ensure(id);
        let index = self.index(id);
        let table = self.table().lock();
        let entry = table[index].as_ref().expect("ensured entry");
        entry.value.clone().map(|value| ResolvedEntry {
            value,
            attributes: entry.attributes,
        })
    }

    /// Existence check that never forces initialization: an untouched id
    /// is assumed to exist.
    pub(crate) fn has_unresolved(&self, id: PrototypeId) -> bool {
        let Some(table) = self.table.get() else {
            return true;
        };
        let index = self.index(id);
        match &table.lock()[index] {
            None => true,
            Some(entry) => entry.value.is_some(),
        }
    }

    pub(crate) fn store(&self, id: PrototypeId, value: Value) {
        let index = self.index(id);
        let mut table = self.table().lock();
        match &mut table[index] {
            Some(entry) => entry.value = Some(value),
            None => panic!(
                "{}: storing into unresolved prototype id {id}",
                self.class.class_name()
            ),
        }
    }

    pub(crate) fn set_attributes(&self, id: PrototypeId, attributes: Attributes) {
        let index = self.index(id);
        let mut table = self.table().lock();
        match &mut table[index] {
            Some(entry) => entry.attributes = attributes,
            None => panic!(
                "{}: setting attributes on unresolved prototype id {id}",
                self.class.class_name()
            ),
        }
    }

    /// Clears the entry. It stays materialized so it never re-initializes.
    pub(crate) fn delete(&self, id: PrototypeId) {
        let index = self.index(id);
        let mut table = self.table().lock();
        if let Some(entry) = &mut table[index] {
            entry.value = None;
            entry.attributes = Attributes::EMPTY;
        }
    }

    pub(crate) fn ensure_all(&self) {
        for id in 1..=self.max_id {
            self.ensure(id);
        }
    }

    /// Appends the tier's live keys to `out`, skipping keys already
    /// reported by an earlier tier. Enumeration materializes every id.
    pub(crate) fn collect_names(&self, options: EnumOptions, out: &mut Vec<PropertyKey>) {
        for id in 1..=self.max_id {
            self.ensure(id);
            let index = self.index(id);
            let entry = {
                let table = self.table().lock();
                table[index].clone()
            };
            let Some(entry) = entry else { continue };
            if entry.value.is_none() {
                continue;
            }
            if entry.attributes.is_dont_enum() && !options.include_non_enumerable {
                continue;
            }
            if entry.key.is_symbol() && !options.include_symbols {
                continue;
            }
            if !out.contains(&entry.key) {
                out.push(entry.key);
            }
        }
    }
}

/// Builds the prototype and constructor pair for a class, wires them
/// together, and installs the constructor on `scope` under the class
/// name. Returns the constructor.
pub fn export_class(
    scope: &ObjectRef,
    class: Arc<dyn BuiltinClass>,
    max_prototype_id: u16,
    sealed: bool,
    config: ObjectConfig,
) -> Result<ObjectRef, RuntimeError> {
    let proto = ScriptObject::new(config);
    proto
        .plain()
        .expect("freshly built object is plain")
        .activate_prototype_map(Arc::clone(&class), max_prototype_id);

    let ctor_name = class.class_name().to_string();
    let call_class = Arc::clone(&class);
    let call_handler = Callable::from_closure(&ctor_name, move |this, args| {
        call_class.call_method(MethodTag::Constructor, this, args)
    });
    let construct_class = Arc::clone(&class);
    let construct_handler = Callable::from_closure(&ctor_name, move |this, args| {
        construct_class.call_method(MethodTag::Constructor, this, args)
    });
    let ctor = ScriptObject::builder(config)
        .callable(call_handler)
        .constructable(construct_handler)
        .build();

    ctor.define_property(
        &PropertyKey::from("prototype"),
        Value::Object(proto.clone()),
        Attributes::READONLY | Attributes::DONTENUM | Attributes::PERMANENT,
    )?;
    proto.define_property(
        &PropertyKey::from("constructor"),
        Value::Object(ctor.clone()),
        Attributes::DONTENUM,
    )?;
    class.fill_constructor(&ctor)?;

    if let Some(plain) = proto.plain() {
        plain.set_parent_scope(Some(scope.clone()));
    }

    if sealed {
        proto.seal()?;
        ctor.seal()?;
    }

    scope.define_property(
        &PropertyKey::from(class.class_name()),
        Value::Object(ctor.clone()),
        Attributes::DONTENUM,
    )?;
    Ok(ctor)
}
