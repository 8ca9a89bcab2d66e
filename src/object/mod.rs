pub mod attributes;
mod container;
mod define;
mod slot;
mod slot_map;

pub use attributes::Attributes;
pub use container::SlotMapContainer;
pub(crate) use define::check_descriptor_compat;
pub use slot::Slot;
pub use slot_map::{SlotAccess, SlotMap};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::builtins::{BuiltinClass, BuiltinData, PrototypeValues};
use crate::config::{EnumOptions, ObjectConfig, Strictness};
use crate::descriptor::PropertyDescriptor;
use crate::errors::RuntimeError;
use crate::key::PropertyKey;
use crate::object::slot::WriteOutcome;
use crate::proxy::ProxyObject;
use crate::value::{Callable, Value};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque key for the per-object side-value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl Token {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Token {
        Token(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared handle to an object. Equality of handles is pointer identity.
#[derive(Clone)]
pub enum ObjectRef {
    Plain(Arc<ScriptObject>),
    Proxy(Arc<ProxyObject>),
}

impl ObjectRef {
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        match (self, other) {
            (ObjectRef::Plain(a), ObjectRef::Plain(b)) => Arc::ptr_eq(a, b),
            (ObjectRef::Proxy(a), ObjectRef::Proxy(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn plain(&self) -> Option<&ScriptObject> {
        match self {
            ObjectRef::Plain(o) => Some(o),
            ObjectRef::Proxy(_) => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, ObjectRef::Proxy(_))
    }

    /// Own-property read. `receiver` is the object the access originally
    /// targeted; getters run against it.
    pub fn get(
        &self,
        key: &PropertyKey,
        receiver: &ObjectRef,
    ) -> Result<Option<Value>, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.get(key, receiver),
            ObjectRef::Proxy(p) => p.get(key, receiver),
        }
    }

    /// Own-property existence test, ignoring the prototype chain.
    pub fn has(&self, key: &PropertyKey) -> Result<bool, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => Ok(o.has(key)),
            ObjectRef::Proxy(p) => p.has(key),
        }
    }

    /// Own-level write. Returns `false` when the property belongs on the
    /// receiver instead (a writable data slot found on a prototype).
    pub fn put(
        &self,
        key: &PropertyKey,
        receiver: &ObjectRef,
        value: Value,
        strictness: Strictness,
    ) -> Result<bool, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.put(self, key, receiver, value, strictness),
            ObjectRef::Proxy(p) => p.put(key, receiver, value, strictness),
        }
    }

    pub fn delete(&self, key: &PropertyKey, strictness: Strictness) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.delete(key, strictness),
            ObjectRef::Proxy(p) => p.delete(key, strictness),
        }
    }

    pub fn ids(&self, options: EnumOptions) -> Result<Vec<PropertyKey>, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => Ok(o.ids(options)),
            ObjectRef::Proxy(p) => p.ids(options),
        }
    }

    pub fn define_own_property(
        &self,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.define_own_property(key, desc),
            ObjectRef::Proxy(p) => p.define_own_property(key, desc),
        }
    }

    pub fn own_property_descriptor(
        &self,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.own_property_descriptor(key),
            ObjectRef::Proxy(p) => p.own_property_descriptor(key),
        }
    }

    /// Defines or replaces a data property, then pins its attributes.
    /// Embedder convenience; bypasses setters.
    pub fn define_property(
        &self,
        key: &PropertyKey,
        value: Value,
        attributes: Attributes,
    ) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.define_property(key, value, attributes),
            ObjectRef::Proxy(p) => p.target()?.define_property(key, value, attributes),
        }
    }

    /// Installs a getter and/or setter, converting an existing data
    /// property in place.
    pub fn define_accessor(
        &self,
        key: &PropertyKey,
        getter: Option<Callable>,
        setter: Option<Callable>,
        attributes: Attributes,
    ) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.define_accessor(key, getter, setter, attributes),
            ObjectRef::Proxy(p) => p.target()?.define_accessor(key, getter, setter, attributes),
        }
    }

    pub fn get_attributes(&self, key: &PropertyKey) -> Result<Attributes, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.get_attributes(key),
            ObjectRef::Proxy(p) => p.target()?.get_attributes(key),
        }
    }

    pub fn set_attributes(
        &self,
        key: &PropertyKey,
        attributes: Attributes,
    ) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.set_attributes(key, attributes),
            ObjectRef::Proxy(p) => p.target()?.set_attributes(key, attributes),
        }
    }

    /// Declares a const binding, hoisted but not yet initialized.
    pub fn define_const(&self, key: &PropertyKey) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.define_const(self, key).map(drop),
            ObjectRef::Proxy(p) => {
                let target = p.target()?;
                target.define_const(key)
            }
        }
    }

    /// Initializes a const binding declared with `define_const`.
    /// Assigning to an initialized const is silently ignored; declaring
    /// over a non-const binding is an error.
    pub fn put_const(
        &self,
        key: &PropertyKey,
        value: Value,
        strictness: Strictness,
    ) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.put_const(self, key, value, strictness).map(drop),
            ObjectRef::Proxy(p) => {
                let target = p.target()?;
                target.put_const(key, value, strictness)
            }
        }
    }

    pub fn is_const(&self, key: &PropertyKey) -> bool {
        match self {
            ObjectRef::Plain(o) => o.is_const(key),
            ObjectRef::Proxy(p) => p
                .target()
                .map(|t| t.is_const(key))
                .unwrap_or(false),
        }
    }

    pub fn prototype(&self) -> Result<Option<ObjectRef>, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => Ok(o.prototype()),
            ObjectRef::Proxy(p) => p.prototype(),
        }
    }

    pub fn set_prototype(&self, proto: Option<ObjectRef>) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.set_prototype(self, proto),
            ObjectRef::Proxy(p) => p.set_prototype(proto),
        }
    }

    pub fn is_extensible(&self) -> Result<bool, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => Ok(o.is_extensible()),
            ObjectRef::Proxy(p) => p.is_extensible(),
        }
    }

    pub fn prevent_extensions(&self) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => {
                o.prevent_extensions();
                Ok(())
            }
            ObjectRef::Proxy(p) => p.prevent_extensions(),
        }
    }

    pub fn seal(&self) -> Result<(), RuntimeError> {
        match self {
            ObjectRef::Plain(o) => {
                o.seal();
                Ok(())
            }
            ObjectRef::Proxy(p) => p.target()?.seal(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        match self {
            ObjectRef::Plain(o) => o.is_sealed(),
            ObjectRef::Proxy(p) => p.target().map(|t| t.is_sealed()).unwrap_or(false),
        }
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.call(this, args),
            ObjectRef::Proxy(p) => p.call(this, args),
        }
    }

    pub fn construct(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            ObjectRef::Plain(o) => o.construct(args),
            ObjectRef::Proxy(p) => p.construct(self, args),
        }
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectRef::Plain(o) => write!(f, "ObjectRef(#{})", o.id()),
            ObjectRef::Proxy(_) => write!(f, "ObjectRef(proxy)"),
        }
    }
}

/// A plain object: attribute-aware slot storage plus the object-level
/// state (prototype, scope, extensibility, sealing, side values, and the
/// optional built-in class tiers).
pub struct ScriptObject {
    id: u64,
    config: ObjectConfig,
    pub(crate) slots: SlotMapContainer,
    prototype: RwLock<Option<ObjectRef>>,
    parent_scope: RwLock<Option<ObjectRef>>,
    extensible: AtomicBool,
    sealed: AtomicBool,
    associated: OnceCell<Mutex<FxHashMap<Token, Value>>>,
    pub(crate) builtin: OnceCell<BuiltinData>,
    call_handler: Option<Callable>,
    construct_handler: Option<Callable>,
}

impl std::fmt::Debug for ScriptObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptObject")
            .field("id", &self.id)
            .field("slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl ScriptObject {
    pub fn new(config: ObjectConfig) -> ObjectRef {
        Self::builder(config).build()
    }

    pub fn with_prototype(config: ObjectConfig, proto: ObjectRef) -> ObjectRef {
        Self::builder(config).prototype(proto).build()
    }

    pub fn builder(config: ObjectConfig) -> ObjectBuilder {
        ObjectBuilder {
            config,
            prototype: None,
            parent_scope: None,
            call_handler: None,
            construct_handler: None,
            slot_capacity: 0,
            extensible: true,
            sealed: false,
        }
    }

    /// Stable identity for side tables kept by embedders.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> ObjectConfig {
        self.config
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible.load(Ordering::Acquire)
    }

    pub fn prevent_extensions(&self) {
        self.extensible.store(false, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Seals the object: no additions, deletions, or attribute changes
    /// afterwards. Lazily initialized built-in entries are materialized
    /// first so nothing mutable hides behind the seal.
    pub fn seal(&self) {
        if self.is_sealed() {
            return;
        }
        if let Some(b) = self.builtin.get() {
            if let Some(pv) = &b.prototype_values {
                pv.ensure_all();
            }
        }
        self.sealed.store(true, Ordering::Release);
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.prototype.read().clone()
    }

    pub fn parent_scope(&self) -> Option<ObjectRef> {
        self.parent_scope.read().clone()
    }

    pub fn set_parent_scope(&self, scope: Option<ObjectRef>) {
        *self.parent_scope.write() = scope;
    }

    /// Attaches a side value under an opaque token. The first association
    /// wins; the stored value is returned either way.
    pub fn associate_value(&self, token: Token, value: Value) -> Value {
        let table = self
            .associated
            .get_or_init(|| Mutex::new(FxHashMap::default()));
        table.lock().entry(token).or_insert(value).clone()
    }

    pub fn associated_value(&self, token: Token) -> Option<Value> {
        self.associated
            .get()
            .and_then(|t| t.lock().get(&token).cloned())
    }

    /// Marks this object as an instance of a built-in class, enabling the
    /// instance-id tier. Panics if a class is already attached.
    pub fn attach_class(&self, class: Arc<dyn BuiltinClass>) {
        let data = BuiltinData {
            class,
            prototype_values: None,
        };
        if self.builtin.set(data).is_err() {
            panic!("object already has a built-in class attached");
        }
    }

    /// Turns this object into the prototype of a built-in class, enabling
    /// the lazily initialized prototype-id tier for ids `1..=max_id`.
    pub fn activate_prototype_map(&self, class: Arc<dyn BuiltinClass>, max_id: u16) {
        let data = BuiltinData {
            prototype_values: Some(PrototypeValues::new(class.clone(), max_id)),
            class,
        };
        if self.builtin.set(data).is_err() {
            panic!("prototype map already activated");
        }
    }

    fn set_prototype(&self, self_ref: &ObjectRef, proto: Option<ObjectRef>) -> Result<(), RuntimeError> {
        let unchanged = match (&proto, &*self.prototype.read()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        };
        if unchanged {
            return Ok(());
        }
        if !self.is_extensible() {
            return Err(RuntimeError::PrototypeNotExtensible);
        }
        let mut cursor = proto.clone();
        while let Some(link) = cursor {
            if link.ptr_eq(self_ref) {
                return Err(RuntimeError::CyclicPrototype);
            }
            cursor = link.prototype()?;
        }
        *self.prototype.write() = proto;
        Ok(())
    }

    pub(crate) fn get(
        &self,
        key: &PropertyKey,
        receiver: &ObjectRef,
    ) -> Result<Option<Value>, RuntimeError> {
        if let Some(b) = self.builtin.get() {
            if let Some(info) = b.class.find_instance_id(key) {
                if let Some(v) = b.class.instance_value(self, info.id()) {
                    return Ok(Some(v));
                }
                // logically empty id falls through to the later tiers
            }
            if let Some(pv) = &b.prototype_values {
                if let Some(id) = b.class.find_prototype_id(key) {
                    if let Some(entry) = pv.resolved_entry(id) {
                        return Ok(Some(entry.value));
                    }
                }
            }
        }
        let slot = self.slots.read(|m| m.query(key).cloned());
        match slot {
            None => Ok(None),
            Some(slot) => slot.read(&Value::Object(receiver.clone())),
        }
    }

    pub(crate) fn has(&self, key: &PropertyKey) -> bool {
        if let Some(b) = self.builtin.get() {
            if let Some(info) = b.class.find_instance_id(key) {
                if info.attributes().is_permanent()
                    || b.class.instance_value(self, info.id()).is_some()
                {
                    return true;
                }
            }
            if let Some(pv) = &b.prototype_values {
                if let Some(id) = b.class.find_prototype_id(key) {
                    if pv.has_unresolved(id) {
                        return true;
                    }
                }
            }
        }
        self.slots.read(|m| m.query(key).is_some())
    }

    pub(crate) fn put(
        &self,
        self_ref: &ObjectRef,
        key: &PropertyKey,
        receiver: &ObjectRef,
        value: Value,
        strictness: Strictness,
    ) -> Result<bool, RuntimeError> {
        if let Some(b) = self.builtin.get() {
            if let Some(info) = b.class.find_instance_id(key) {
                let present = info.attributes().is_permanent()
                    || b.class.instance_value(self, info.id()).is_some();
                if present {
                    if self.is_sealed() {
                        return Err(RuntimeError::sealed(key));
                    }
                    if info.attributes().is_readonly() {
                        return if strictness.is_strict() {
                            Err(RuntimeError::read_only(key))
                        } else {
                            Ok(true)
                        };
                    }
                    if receiver.ptr_eq(self_ref) {
                        b.class.set_instance_value(self, info.id(), Some(value));
                        return Ok(true);
                    }
                    return receiver.put(key, receiver, value, strictness);
                }
            }
            if let Some(pv) = &b.prototype_values {
                if let Some(id) = b.class.find_prototype_id(key) {
                    if let Some(entry) = pv.resolved_entry(id) {
                        if self.is_sealed() {
                            return Err(RuntimeError::sealed(key));
                        }
                        if entry.attributes.is_readonly() {
                            return if strictness.is_strict() {
                                Err(RuntimeError::read_only(key))
                            } else {
                                Ok(true)
                            };
                        }
                        if receiver.ptr_eq(self_ref) {
                            pv.store(id, value);
                            return Ok(true);
                        }
                        return receiver.put(key, receiver, value, strictness);
                    }
                }
            }
        }
        self.put_generic(self_ref, key, receiver, value, strictness)
    }

    fn put_generic(
        &self,
        self_ref: &ObjectRef,
        key: &PropertyKey,
        receiver: &ObjectRef,
        value: Value,
        strictness: Strictness,
    ) -> Result<bool, RuntimeError> {
        let is_receiver = receiver.ptr_eq(self_ref);
        let outcome = if is_receiver {
            self.slots.write(|m| {
                if m.query(key).is_none() {
                    if !self.is_extensible() {
                        return if strictness.is_strict() {
                            Err(RuntimeError::not_extensible(key))
                        } else {
                            Ok(WriteOutcome::Done)
                        };
                    }
                    if self.is_sealed() {
                        return Err(RuntimeError::sealed(key));
                    }
                }
                let slot = m.modify(key, SlotAccess::Modify).unwrap();
                slot.write_outcome(&value, true, strictness)
            })
        } else {
            // Slot found on a prototype: decide on a clone, never write it.
            let existing = self.slots.read(|m| m.query(key).cloned());
            match existing {
                None => return Ok(false),
                Some(mut slot) => slot.write_outcome(&value, false, strictness),
            }
        };
        match outcome? {
            WriteOutcome::Done => Ok(true),
            WriteOutcome::Forward => Ok(false),
            WriteOutcome::CallSetter(setter) => {
                setter.call(&Value::Object(receiver.clone()), &[value])?;
                Ok(true)
            }
        }
    }

    pub(crate) fn delete(
        &self,
        key: &PropertyKey,
        strictness: Strictness,
    ) -> Result<(), RuntimeError> {
        if self.is_sealed() {
            return Err(RuntimeError::sealed(key));
        }
        if let Some(b) = self.builtin.get() {
            if let Some(info) = b.class.find_instance_id(key) {
                let present = info.attributes().is_permanent()
                    || b.class.instance_value(self, info.id()).is_some();
                if present {
                    if info.attributes().is_permanent() {
                        return if strictness.is_strict() {
                            Err(RuntimeError::DeleteNonConfigurable {
                                key: key.to_string(),
                            })
                        } else {
                            Ok(())
                        };
                    }
                    b.class.set_instance_value(self, info.id(), None);
                    return Ok(());
                }
            }
            if let Some(pv) = &b.prototype_values {
                if let Some(id) = b.class.find_prototype_id(key) {
                    if let Some(entry) = pv.resolved_entry(id) {
                        if entry.attributes.is_permanent() {
                            return if strictness.is_strict() {
                                Err(RuntimeError::DeleteNonConfigurable {
                                    key: key.to_string(),
                                })
                            } else {
                                Ok(())
                            };
                        }
                        pv.delete(id);
                        return Ok(());
                    }
                }
            }
        }
        self.slots.write(|m| match m.query(key) {
            None => Ok(()),
            Some(s) if s.attributes().is_permanent() => {
                if strictness.is_strict() {
                    Err(RuntimeError::DeleteNonConfigurable {
                        key: key.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            Some(_) => {
                m.remove(key);
                Ok(())
            }
        })
    }

    pub(crate) fn ids(&self, options: EnumOptions) -> Vec<PropertyKey> {
        let mut out: Vec<PropertyKey> = self.slots.read(|m| {
            m.iter()
                .filter(|s| {
                    (options.include_non_enumerable || s.attributes().is_enumerable())
                        && (options.include_symbols || !s.key().is_symbol())
                })
                .map(|s| s.key().clone())
                .collect()
        });
        if let Some(b) = self.builtin.get() {
            if let Some(pv) = &b.prototype_values {
                pv.collect_names(options, &mut out);
            }
            for id in 1..=b.class.max_instance_id() {
                let key = b.class.instance_id_key(id);
                let info = b
                    .class
                    .find_instance_id(&key)
                    .expect("instance id key must map back to its id");
                let present = info.attributes().is_permanent()
                    || b.class.instance_value(self, id).is_some();
                if !present {
                    continue;
                }
                if info.attributes().is_dont_enum() && !options.include_non_enumerable {
                    continue;
                }
                if key.is_symbol() && !options.include_symbols {
                    continue;
                }
                if !out.contains(&key) {
                    out.push(key);
                }
            }
        }
        if options.indices_first {
            sort_indices_first(&mut out);
        }
        out
    }

    pub(crate) fn get_attributes(&self, key: &PropertyKey) -> Result<Attributes, RuntimeError> {
        if let Some(b) = self.builtin.get() {
            if let Some(info) = b.class.find_instance_id(key) {
                let present = info.attributes().is_permanent()
                    || b.class.instance_value(self, info.id()).is_some();
                if present {
                    return Ok(info.attributes());
                }
            }
            if let Some(pv) = &b.prototype_values {
                if let Some(id) = b.class.find_prototype_id(key) {
                    if let Some(entry) = pv.resolved_entry(id) {
                        return Ok(entry.attributes);
                    }
                }
            }
        }
        self.slots
            .read(|m| m.query(key).map(|s| s.attributes()))
            .ok_or_else(|| RuntimeError::PropertyNotFound {
                key: key.to_string(),
            })
    }

    pub(crate) fn set_attributes(
        &self,
        key: &PropertyKey,
        attributes: Attributes,
    ) -> Result<(), RuntimeError> {
        if self.is_sealed() {
            return Err(RuntimeError::sealed(key));
        }
        if let Some(b) = self.builtin.get() {
            if let Some(info) = b.class.find_instance_id(key) {
                let present = info.attributes().is_permanent()
                    || b.class.instance_value(self, info.id()).is_some();
                if present {
                    if attributes == info.attributes() {
                        return Ok(());
                    }
                    return b.class.set_instance_attributes(self, info.id(), attributes);
                }
            }
            if let Some(pv) = &b.prototype_values {
                if let Some(id) = b.class.find_prototype_id(key) {
                    if pv.resolved_entry(id).is_some() {
                        pv.set_attributes(id, attributes);
                        return Ok(());
                    }
                }
            }
        }
        let found = self.slots.write(|m| match m.query_mut(key) {
            Some(slot) => {
                slot.set_attributes(attributes);
                true
            }
            None => false,
        });
        if found {
            Ok(())
        } else {
            Err(RuntimeError::PropertyNotFound {
                key: key.to_string(),
            })
        }
    }

    pub(crate) fn define_property(
        &self,
        key: &PropertyKey,
        value: Value,
        attributes: Attributes,
    ) -> Result<(), RuntimeError> {
        if self.is_sealed() {
            return Err(RuntimeError::sealed(key));
        }
        self.slots.write(|m| {
            let slot = m
                .modify(key, SlotAccess::ConvertAccessorToValue)
                .unwrap();
            slot.store_value(value);
            slot.set_attributes(attributes);
        });
        Ok(())
    }

    pub(crate) fn define_accessor(
        &self,
        key: &PropertyKey,
        getter: Option<Callable>,
        setter: Option<Callable>,
        attributes: Attributes,
    ) -> Result<(), RuntimeError> {
        if self.is_sealed() {
            return Err(RuntimeError::sealed(key));
        }
        self.slots.write(|m| {
            let slot = m.modify(key, SlotAccess::ModifyAccessor).unwrap();
            if getter.is_some() {
                slot.set_getter(getter);
            }
            if setter.is_some() {
                slot.set_setter(setter);
            }
            slot.set_attributes(attributes);
        });
        Ok(())
    }

    pub(crate) fn define_const(
        &self,
        self_ref: &ObjectRef,
        key: &PropertyKey,
    ) -> Result<bool, RuntimeError> {
        self.put_const_impl(self_ref, key, self_ref, Value::Undefined, Strictness::Sloppy, false)
    }

    pub(crate) fn put_const(
        &self,
        self_ref: &ObjectRef,
        key: &PropertyKey,
        value: Value,
        strictness: Strictness,
    ) -> Result<bool, RuntimeError> {
        self.put_const_impl(self_ref, key, self_ref, value, strictness, true)
    }

    fn put_const_impl(
        &self,
        self_ref: &ObjectRef,
        key: &PropertyKey,
        receiver: &ObjectRef,
        value: Value,
        strictness: Strictness,
        initialize: bool,
    ) -> Result<bool, RuntimeError> {
        if !receiver.ptr_eq(self_ref) {
            return Ok(false);
        }
        if !self.is_extensible() && self.slots.read(|m| m.query(key).is_none()) {
            return if strictness.is_strict() {
                Err(RuntimeError::not_extensible(key))
            } else {
                Ok(true)
            };
        }
        self.slots.write(|m| {
            if m.query(key).is_none() && self.is_sealed() {
                return Err(RuntimeError::sealed(key));
            }
            let slot = m.modify(key, SlotAccess::ModifyConst).unwrap();
            let attr = slot.attributes();
            if !attr.is_readonly() {
                return Err(RuntimeError::ConstRedeclaration {
                    key: key.to_string(),
                });
            }
            if attr.is_uninitialized_const() {
                slot.store_value(value.clone());
                if initialize {
                    slot.set_attributes(attr.without(Attributes::UNINITIALIZED_CONST));
                }
            }
            Ok(true)
        })
    }

    pub(crate) fn is_const(&self, key: &PropertyKey) -> bool {
        self.slots.read(|m| {
            m.query(key).is_some_and(|s| {
                s.attributes()
                    .contains(Attributes::READONLY.with(Attributes::PERMANENT))
            })
        })
    }

    pub(crate) fn call(&self, this: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        match &self.call_handler {
            Some(handler) => handler.call(this, args),
            None => Err(RuntimeError::NotCallable {
                what: "object".to_string(),
            }),
        }
    }

    pub(crate) fn construct(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        match &self.construct_handler {
            Some(handler) => handler.call(&Value::Undefined, args),
            None => Err(RuntimeError::NotConstructable {
                what: "object".to_string(),
            }),
        }
    }
}

pub(crate) fn sort_indices_first(keys: &mut Vec<PropertyKey>) {
    let mut indices: Vec<u32> = Vec::new();
    let mut rest: Vec<PropertyKey> = Vec::new();
    for key in keys.drain(..) {
        match key {
            PropertyKey::Index(i) => indices.push(i),
            other => rest.push(other),
        }
    }
    indices.sort_unstable();
    keys.extend(indices.into_iter().map(PropertyKey::Index));
    keys.extend(rest);
}

pub struct ObjectBuilder {
    config: ObjectConfig,
    prototype: Option<ObjectRef>,
    parent_scope: Option<ObjectRef>,
    call_handler: Option<Callable>,
    construct_handler: Option<Callable>,
    slot_capacity: usize,
    extensible: bool,
    sealed: bool,
}

impl ObjectBuilder {
    pub fn prototype(mut self, proto: ObjectRef) -> Self {
        self.prototype = Some(proto);
        self
    }

    pub fn parent_scope(mut self, scope: ObjectRef) -> Self {
        self.parent_scope = Some(scope);
        self
    }

    pub fn callable(mut self, handler: Callable) -> Self {
        self.call_handler = Some(handler);
        self
    }

    pub fn constructable(mut self, handler: Callable) -> Self {
        self.construct_handler = Some(handler);
        self
    }

    pub(crate) fn slot_capacity(mut self, capacity: usize) -> Self {
        self.slot_capacity = capacity;
        self
    }

    pub(crate) fn extensible(mut self, extensible: bool) -> Self {
        self.extensible = extensible;
        self
    }

    pub(crate) fn sealed(mut self, sealed: bool) -> Self {
        self.sealed = sealed;
        self
    }

    pub fn build(self) -> ObjectRef {
        ObjectRef::Plain(Arc::new(ScriptObject {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            config: self.config,
            slots: SlotMapContainer::with_capacity(self.config.threading, self.slot_capacity),
            prototype: RwLock::new(self.prototype),
            parent_scope: RwLock::new(self.parent_scope),
            extensible: AtomicBool::new(self.extensible),
            sealed: AtomicBool::new(self.sealed),
            associated: OnceCell::new(),
            builtin: OnceCell::new(),
            call_handler: self.call_handler,
            construct_handler: self.construct_handler,
        }))
    }
}

/// Finds the closest object in the prototype chain owning `key`.
pub fn get_base(obj: &ObjectRef, key: &PropertyKey) -> Result<Option<ObjectRef>, RuntimeError> {
    let mut cursor = Some(obj.clone());
    while let Some(link) = cursor {
        if link.has(key)? {
            return Ok(Some(link));
        }
        cursor = link.prototype()?;
    }
    Ok(None)
}

/// Reads `key` through the prototype chain. Getters run against `obj`,
/// the original receiver, wherever in the chain they are found.
pub fn get_property(obj: &ObjectRef, key: &PropertyKey) -> Result<Option<Value>, RuntimeError> {
    let mut cursor = Some(obj.clone());
    while let Some(link) = cursor {
        if let Some(value) = link.get(key, obj)? {
            return Ok(Some(value));
        }
        cursor = link.prototype()?;
    }
    Ok(None)
}

pub fn has_property(obj: &ObjectRef, key: &PropertyKey) -> Result<bool, RuntimeError> {
    Ok(get_base(obj, key)?.is_some())
}

/// Writes `key`, delegating to the owner in the prototype chain. A
/// writable data property on a prototype shadows onto `obj` instead of
/// mutating the prototype.
pub fn put_property(
    obj: &ObjectRef,
    key: &PropertyKey,
    value: Value,
    strictness: Strictness,
) -> Result<(), RuntimeError> {
    let base = get_base(obj, key)?.unwrap_or_else(|| obj.clone());
    let handled = base.put(key, obj, value.clone(), strictness)?;
    if !handled {
        obj.put(key, obj, value, strictness)?;
    }
    Ok(())
}

/// Deletes `key` from whichever chain member owns it, if any.
pub fn delete_property(
    obj: &ObjectRef,
    key: &PropertyKey,
    strictness: Strictness,
) -> Result<(), RuntimeError> {
    match get_base(obj, key)? {
        Some(base) => base.delete(key, strictness),
        None => Ok(()),
    }
}
