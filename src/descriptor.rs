use crate::config::{ObjectConfig, Strictness};
use crate::errors::RuntimeError;
use crate::key::PropertyKey;
use crate::object::attributes::Attributes;
use crate::object::{ObjectRef, ScriptObject, get_property, has_property};
use crate::value::{Callable, Value};

const HAS_VALUE: u8 = 0x01;
const HAS_GET: u8 = 0x02;
const HAS_SET: u8 = 0x04;
const HAS_WRITABLE: u8 = 0x08;
const HAS_ENUMERABLE: u8 = 0x10;
const HAS_CONFIGURABLE: u8 = 0x20;

const DATA_SET: u8 = HAS_VALUE | HAS_WRITABLE | HAS_ENUMERABLE | HAS_CONFIGURABLE;
const ACCESSOR_SET: u8 = HAS_GET | HAS_SET | HAS_ENUMERABLE | HAS_CONFIGURABLE;

/// A property descriptor that remembers which fields were supplied.
/// Absent boolean fields default to false, so the attribute view of an
/// empty descriptor is fully restrictive.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    present: u8,
    value: Value,
    getter: Option<Callable>,
    setter: Option<Callable>,
    attributes: Attributes,
}

impl Default for PropertyDescriptor {
    fn default() -> Self {
        Self {
            present: 0,
            value: Value::Undefined,
            getter: None,
            setter: None,
            attributes: Attributes::restrictive(),
        }
    }
}

impl PropertyDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fully populated data descriptor.
    pub fn data(value: Value, attributes: Attributes) -> Self {
        Self {
            present: DATA_SET,
            value,
            getter: None,
            setter: None,
            attributes,
        }
    }

    /// A fully populated accessor descriptor.
    pub fn accessor(
        getter: Option<Callable>,
        setter: Option<Callable>,
        attributes: Attributes,
    ) -> Self {
        Self {
            present: ACCESSOR_SET,
            value: Value::Undefined,
            getter,
            setter,
            attributes,
        }
    }

    /// A descriptor carrying only a value field.
    pub fn value_only(value: Value) -> Self {
        let mut d = Self::new();
        d.set_value(value);
        d
    }

    pub fn set_value(&mut self, value: Value) -> &mut Self {
        self.present |= HAS_VALUE;
        self.value = value;
        self
    }

    pub fn set_getter(&mut self, getter: Option<Callable>) -> &mut Self {
        self.present |= HAS_GET;
        self.getter = getter;
        self
    }

    pub fn set_setter(&mut self, setter: Option<Callable>) -> &mut Self {
        self.present |= HAS_SET;
        self.setter = setter;
        self
    }

    pub fn set_writable(&mut self, writable: bool) -> &mut Self {
        self.present |= HAS_WRITABLE;
        self.attributes = if writable {
            self.attributes.without(Attributes::READONLY)
        } else {
            self.attributes.with(Attributes::READONLY)
        };
        self
    }

    pub fn set_enumerable(&mut self, enumerable: bool) -> &mut Self {
        self.present |= HAS_ENUMERABLE;
        self.attributes = if enumerable {
            self.attributes.without(Attributes::DONTENUM)
        } else {
            self.attributes.with(Attributes::DONTENUM)
        };
        self
    }

    pub fn set_configurable(&mut self, configurable: bool) -> &mut Self {
        self.present |= HAS_CONFIGURABLE;
        self.attributes = if configurable {
            self.attributes.without(Attributes::PERMANENT)
        } else {
            self.attributes.with(Attributes::PERMANENT)
        };
        self
    }

    pub fn has_value(&self) -> bool {
        self.present & HAS_VALUE != 0
    }

    pub fn has_getter(&self) -> bool {
        self.present & HAS_GET != 0
    }

    pub fn has_setter(&self) -> bool {
        self.present & HAS_SET != 0
    }

    pub fn has_writable(&self) -> bool {
        self.present & HAS_WRITABLE != 0
    }

    pub fn has_enumerable(&self) -> bool {
        self.present & HAS_ENUMERABLE != 0
    }

    pub fn has_configurable(&self) -> bool {
        self.present & HAS_CONFIGURABLE != 0
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn getter(&self) -> Option<&Callable> {
        self.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&Callable> {
        self.setter.as_ref()
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn is_writable(&self) -> bool {
        self.attributes.is_writable()
    }

    pub fn is_enumerable(&self) -> bool {
        self.attributes.is_enumerable()
    }

    pub fn is_configurable(&self) -> bool {
        self.attributes.is_configurable()
    }

    pub fn is_data(&self) -> bool {
        self.present & (HAS_VALUE | HAS_WRITABLE) != 0
    }

    pub fn is_accessor(&self) -> bool {
        self.present & (HAS_GET | HAS_SET) != 0
    }

    pub fn is_generic(&self) -> bool {
        !self.is_data() && !self.is_accessor()
    }

    /// Rejects descriptors naming both data and accessor fields.
    pub fn check_valid(&self, key: &PropertyKey) -> Result<(), RuntimeError> {
        if self.is_data() && self.is_accessor() {
            return Err(RuntimeError::BothDataAndAccessor {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Overlays the attribute fields present in this descriptor onto an
    /// existing attribute set; absent fields leave the old bits alone.
    pub fn apply_to(&self, base: Attributes) -> Attributes {
        let mut out = base;
        if self.has_writable() {
            out = if self.is_writable() {
                out.without(Attributes::READONLY)
            } else {
                out.with(Attributes::READONLY)
            };
        }
        if self.has_enumerable() {
            out = if self.is_enumerable() {
                out.without(Attributes::DONTENUM)
            } else {
                out.with(Attributes::DONTENUM)
            };
        }
        if self.has_configurable() {
            out = if self.is_configurable() {
                out.without(Attributes::PERMANENT)
            } else {
                out.with(Attributes::PERMANENT)
            };
        }
        out
    }

    /// Fills in absent fields with their defaults: accessor descriptors
    /// get explicit `get`/`set`, data descriptors explicit value and
    /// writability, and both get explicit enumerability and
    /// configurability (absent reads as false).
    pub fn complete(&mut self) {
        if self.is_accessor() {
            if !self.has_getter() {
                self.set_getter(None);
            }
            if !self.has_setter() {
                self.set_setter(None);
            }
        } else {
            if !self.has_value() {
                self.set_value(Value::Undefined);
            }
            if !self.has_writable() {
                self.set_writable(false);
            }
        }
        if !self.has_enumerable() {
            self.set_enumerable(false);
        }
        if !self.has_configurable() {
            self.set_configurable(false);
        }
    }

    fn fully_populated(&self) -> bool {
        self.present & DATA_SET == DATA_SET || self.present & ACCESSOR_SET == ACCESSOR_SET
    }

    /// Builds a descriptor from a script object's `value`, `writable`,
    /// `get`, `set`, `enumerable` and `configurable` properties, read
    /// through its prototype chain.
    pub fn from_object(source: &ObjectRef) -> Result<PropertyDescriptor, RuntimeError> {
        let mut desc = PropertyDescriptor::new();

        if has_property(source, &PropertyKey::from("enumerable"))? {
            let v = get_property(source, &PropertyKey::from("enumerable"))?;
            desc.set_enumerable(v.map_or(false, |v| v.truthy()));
        }
        if has_property(source, &PropertyKey::from("configurable"))? {
            let v = get_property(source, &PropertyKey::from("configurable"))?;
            desc.set_configurable(v.map_or(false, |v| v.truthy()));
        }
        if has_property(source, &PropertyKey::from("value"))? {
            let v = get_property(source, &PropertyKey::from("value"))?;
            desc.set_value(v.unwrap_or(Value::Undefined));
        }
        if has_property(source, &PropertyKey::from("writable"))? {
            let v = get_property(source, &PropertyKey::from("writable"))?;
            desc.set_writable(v.map_or(false, |v| v.truthy()));
        }
        if has_property(source, &PropertyKey::from("get"))? {
            let v = get_property(source, &PropertyKey::from("get"))?.unwrap_or(Value::Undefined);
            desc.set_getter(descriptor_callable(v, "get")?);
        }
        if has_property(source, &PropertyKey::from("set"))? {
            let v = get_property(source, &PropertyKey::from("set"))?.unwrap_or(Value::Undefined);
            desc.set_setter(descriptor_callable(v, "set")?);
        }
        Ok(desc)
    }

    /// Exports this descriptor as a script object. Panics unless the
    /// descriptor carries a complete data or accessor field set; partial
    /// descriptors are an embedder bug at this boundary.
    pub fn to_object(&self, config: ObjectConfig) -> Result<ObjectRef, RuntimeError> {
        assert!(
            self.fully_populated(),
            "exporting a partially populated property descriptor"
        );
        let obj = ScriptObject::new(config);
        let sloppy = Strictness::Sloppy;
        if self.present & HAS_GET != 0 || self.present & HAS_SET != 0 {
            let get = self.getter.clone().map_or(Value::Undefined, Value::Function);
            let set = self.setter.clone().map_or(Value::Undefined, Value::Function);
            obj.put(&PropertyKey::from("get"), &obj, get, sloppy)?;
            obj.put(&PropertyKey::from("set"), &obj, set, sloppy)?;
        } else {
            obj.put(&PropertyKey::from("value"), &obj, self.value.clone(), sloppy)?;
            obj.put(
                &PropertyKey::from("writable"),
                &obj,
                Value::Bool(self.is_writable()),
                sloppy,
            )?;
        }
        obj.put(
            &PropertyKey::from("enumerable"),
            &obj,
            Value::Bool(self.is_enumerable()),
            sloppy,
        )?;
        obj.put(
            &PropertyKey::from("configurable"),
            &obj,
            Value::Bool(self.is_configurable()),
            sloppy,
        )?;
        Ok(obj)
    }
}

fn descriptor_callable(value: Value, field: &str) -> Result<Option<Callable>, RuntimeError> {
    match value {
        Value::Undefined => Ok(None),
        Value::Function(f) => Ok(Some(f)),
        other => Err(RuntimeError::NotCallable {
            what: format!("descriptor field '{field}' of type {}", other.type_name()),
        }),
    }
}
