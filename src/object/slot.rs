use crate::config::Strictness;
use crate::descriptor::PropertyDescriptor;
use crate::errors::RuntimeError;
use crate::key::PropertyKey;
use crate::object::attributes::Attributes;
use crate::value::{Callable, Value};

/// One property: key, attributes, and either a stored value or an
/// accessor pair.
#[derive(Debug, Clone)]
pub struct Slot {
    key: PropertyKey,
    attributes: Attributes,
    kind: SlotKind,
}

#[derive(Debug, Clone)]
pub enum SlotKind {
    Value(Value),
    Accessor {
        getter: Option<Callable>,
        setter: Option<Callable>,
        /// Value the slot held before it was converted to an accessor.
        /// Kept so converting back restores it; never observable while the
        /// slot stays an accessor.
        stash: Value,
    },
}

/// Outcome of a write attempt against a single slot. `Forward` means the
/// slot belongs to a prototype and the receiver must create its own copy.
pub(crate) enum WriteOutcome {
    Done,
    CallSetter(Callable),
    Forward,
}

impl Slot {
    pub fn new_value(key: PropertyKey, value: Value, attributes: Attributes) -> Self {
        Self {
            key,
            attributes,
            kind: SlotKind::Value(value),
        }
    }

    pub fn new_accessor(key: PropertyKey, attributes: Attributes) -> Self {
        Self {
            key,
            attributes,
            kind: SlotKind::Accessor {
                getter: None,
                setter: None,
                stash: Value::Undefined,
            },
        }
    }

    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.kind, SlotKind::Accessor { .. })
    }

    pub fn getter(&self) -> Option<&Callable> {
        match &self.kind {
            SlotKind::Accessor { getter, .. } => getter.as_ref(),
            SlotKind::Value(_) => None,
        }
    }

    pub fn setter(&self) -> Option<&Callable> {
        match &self.kind {
            SlotKind::Accessor { setter, .. } => setter.as_ref(),
            SlotKind::Value(_) => None,
        }
    }

    pub fn stored_value(&self) -> Option<&Value> {
        match &self.kind {
            SlotKind::Value(v) => Some(v),
            SlotKind::Accessor { .. } => None,
        }
    }

    /// Overwrites the stored value without attribute checks. Callers are
    /// responsible for readonly enforcement.
    pub fn store_value(&mut self, value: Value) {
        match &mut self.kind {
            SlotKind::Value(v) => *v = value,
            SlotKind::Accessor { .. } => {
                panic!("store_value on accessor slot '{}'", self.key)
            }
        }
    }

    pub fn set_getter(&mut self, callable: Option<Callable>) {
        match &mut self.kind {
            SlotKind::Accessor { getter, .. } => *getter = callable,
            SlotKind::Value(_) => panic!("set_getter on value slot '{}'", self.key),
        }
    }

    pub fn set_setter(&mut self, callable: Option<Callable>) {
        match &mut self.kind {
            SlotKind::Accessor { setter, .. } => *setter = callable,
            SlotKind::Value(_) => panic!("set_setter on value slot '{}'", self.key),
        }
    }

    /// Becomes an accessor slot, keeping key, attributes, and insertion
    /// position. The old value is stashed.
    pub fn convert_to_accessor(&mut self) {
        if let SlotKind::Value(v) = &self.kind {
            self.kind = SlotKind::Accessor {
                getter: None,
                setter: None,
                stash: v.clone(),
            };
        }
    }

    /// Becomes a value slot again, restoring the stashed value.
    pub fn convert_to_value(&mut self) {
        if let SlotKind::Accessor { stash, .. } = &self.kind {
            self.kind = SlotKind::Value(stash.clone());
        }
    }

    /// Reads through the slot. An accessor with no getter yields `None`.
    pub fn read(&self, receiver: &Value) -> Result<Option<Value>, RuntimeError> {
        match &self.kind {
            SlotKind::Value(v) => Ok(Some(v.clone())),
            SlotKind::Accessor { getter: Some(g), .. } => Ok(Some(g.call(receiver, &[])?)),
            SlotKind::Accessor { getter: None, .. } => Ok(None),
        }
    }

    /// Decides how a write against this slot proceeds. `owner_is_receiver`
    /// is false when the slot was found on a prototype of the object the
    /// write targets.
    pub(crate) fn write_outcome(
        &mut self,
        value: &Value,
        owner_is_receiver: bool,
        strictness: Strictness,
    ) -> Result<WriteOutcome, RuntimeError> {
        match &mut self.kind {
            SlotKind::Accessor {
                setter: Some(s), ..
            } => Ok(WriteOutcome::CallSetter(s.clone())),
            SlotKind::Accessor { setter: None, .. } => {
                if strictness.is_strict() {
                    Err(RuntimeError::NoSetter {
                        key: self.key.to_string(),
                    })
                } else {
                    Ok(WriteOutcome::Done)
                }
            }
            SlotKind::Value(v) => {
                if self.attributes.is_readonly() {
                    if strictness.is_strict() {
                        Err(RuntimeError::read_only(&self.key))
                    } else {
                        Ok(WriteOutcome::Done)
                    }
                } else if owner_is_receiver {
                    *v = value.clone();
                    Ok(WriteOutcome::Done)
                } else {
                    Ok(WriteOutcome::Forward)
                }
            }
        }
    }

    /// Exports a fully populated descriptor for this slot.
    pub fn to_descriptor(&self) -> PropertyDescriptor {
        match &self.kind {
            SlotKind::Value(v) => PropertyDescriptor::data(v.clone(), self.attributes),
            SlotKind::Accessor { getter, setter, .. } => {
                PropertyDescriptor::accessor(getter.clone(), setter.clone(), self.attributes)
            }
        }
    }
}
