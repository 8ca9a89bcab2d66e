//! Snapshots of plain objects: the materialized slots plus the
//! extensibility and sealing flags. Built-in prototype maps are recorded
//! by their maximum id and reactivated on restore without repopulating;
//! entries initialize lazily again from the class.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builtins::BuiltinClass;
use crate::config::ObjectConfig;
use crate::errors::SnapshotError;
use crate::key::PropertyKey;
use crate::object::{Attributes, ObjectRef, ScriptObject, Slot};
use crate::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub extensible: bool,
    pub sealed: bool,
    pub slots: Vec<SlotSnapshot>,
    pub max_prototype_id: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub key: KeySnapshot,
    pub attributes: u8,
    pub value: ValueSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeySnapshot {
    String(String),
    Index(u32),
}

/// Only primitives travel; object graphs, functions, and symbols have no
/// portable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValueSnapshot {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// Exports the object's own slots. Fails on accessor properties and on
/// values that are not primitives.
pub fn snapshot(obj: &ScriptObject) -> Result<ObjectSnapshot, SnapshotError> {
    let slots = obj.slots.read(|m| {
        m.iter()
            .map(snapshot_slot)
            .collect::<Result<Vec<_>, SnapshotError>>()
    })?;
    let max_prototype_id = obj
        .builtin
        .get()
        .and_then(|b| b.prototype_values.as_ref())
        .map(|pv| pv.max_id());
    Ok(ObjectSnapshot {
        extensible: obj.is_extensible(),
        sealed: obj.is_sealed(),
        slots,
        max_prototype_id,
    })
}

fn snapshot_slot(slot: &Slot) -> Result<SlotSnapshot, SnapshotError> {
    let key = match slot.key() {
        PropertyKey::String(s) => KeySnapshot::String(s.to_string()),
        PropertyKey::Index(i) => KeySnapshot::Index(*i),
        PropertyKey::Symbol(_) => return Err(SnapshotError::SymbolKey),
    };
    if slot.is_accessor() {
        return Err(SnapshotError::AccessorProperty {
            key: slot.key().to_string(),
        });
    }
    let value = match slot.stored_value().expect("non-accessor slot") {
        Value::Undefined => ValueSnapshot::Undefined,
        Value::Null => ValueSnapshot::Null,
        Value::Bool(b) => ValueSnapshot::Bool(*b),
        Value::Number(n) => ValueSnapshot::Number(*n),
        Value::String(s) => ValueSnapshot::String(s.to_string()),
        Value::Symbol(_) | Value::Object(_) | Value::Function(_) => {
            return Err(SnapshotError::UnsupportedValue {
                key: slot.key().to_string(),
            });
        }
    };
    Ok(SlotSnapshot {
        key,
        attributes: slot.attributes().bits(),
        value,
    })
}

/// Rebuilds a plain object. The storage backing is chosen up front from
/// the slot count.
pub fn restore(snapshot: &ObjectSnapshot, config: ObjectConfig) -> ObjectRef {
    restore_inner(snapshot, config, None)
}

/// Rebuilds an object carrying a built-in prototype map. The map is
/// reactivated empty; ids repopulate lazily from the class.
pub fn restore_with_class(
    snapshot: &ObjectSnapshot,
    class: Arc<dyn BuiltinClass>,
    config: ObjectConfig,
) -> ObjectRef {
    restore_inner(snapshot, config, Some(class))
}

fn restore_inner(
    snapshot: &ObjectSnapshot,
    config: ObjectConfig,
    class: Option<Arc<dyn BuiltinClass>>,
) -> ObjectRef {
    let obj = ScriptObject::builder(config)
        .slot_capacity(snapshot.slots.len())
        .extensible(snapshot.extensible)
        .sealed(snapshot.sealed)
        .build();
    let plain = obj.plain().expect("freshly built object is plain");
    plain.slots.write(|m| {
        for slot in &snapshot.slots {
            let key = match &slot.key {
                KeySnapshot::String(s) => PropertyKey::from(s.as_str()),
                KeySnapshot::Index(i) => PropertyKey::from(*i),
            };
            let value = match &slot.value {
                ValueSnapshot::Undefined => Value::Undefined,
                ValueSnapshot::Null => Value::Null,
                ValueSnapshot::Bool(b) => Value::Bool(*b),
                ValueSnapshot::Number(n) => Value::Number(*n),
                ValueSnapshot::String(s) => Value::string(s),
            };
            m.add_slot(Slot::new_value(key, value, Attributes::checked(slot.attributes)));
        }
    });
    if let (Some(class), Some(max_id)) = (class, snapshot.max_prototype_id) {
        plain.activate_prototype_map(class, max_id);
    }
    obj
}
