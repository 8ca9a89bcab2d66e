use crate::config::Strictness;
use crate::descriptor::PropertyDescriptor;
use crate::errors::RuntimeError;
use crate::key::PropertyKey;
use crate::object::attributes::Attributes;
use crate::object::slot_map::SlotAccess;
use crate::object::ScriptObject;
use crate::value::{Value, callable_eq, same_value};

impl ScriptObject {
    /// Creates or reconfigures one own property from a descriptor,
    /// enforcing the compatibility rules for non-configurable properties.
    /// Succeeding twice with the same descriptor is always allowed.
    pub(crate) fn define_own_property(
        &self,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<(), RuntimeError> {
        desc.check_valid(key)?;
        let mut displaced = false;
        if let Some(b) = self.builtin.get() {
            if let Some(info) = b.class.find_instance_id(key) {
                let present = info.attributes().is_permanent()
                    || b.class.instance_value(self, info.id()).is_some();
                if present {
                    let current = self.own_property_descriptor(key)?;
                    self.check_property_change(key, current.as_ref(), desc)?;
                    if desc.is_accessor() {
                        // Displace the built-in entry; a slot replaces it.
                        self.delete(key, Strictness::Sloppy)?;
                        displaced = true;
                    } else {
                        self.check_sealed_define(key, current.as_ref(), desc)?;
                        if desc.has_value() && !info.attributes().is_readonly() {
                            let old = b.class.instance_value(self, info.id());
                            if !old.is_some_and(|v| same_value(&v, desc.value())) {
                                b.class
                                    .set_instance_value(self, info.id(), Some(desc.value().clone()));
                            }
                        }
                        let applied = desc.apply_to(info.attributes());
                        self.set_attributes(key, applied)?;
                        return Ok(());
                    }
                }
            }
            if let Some(pv) = &b.prototype_values {
                if let Some(id) = b.class.find_prototype_id(key) {
                    if let Some(entry) = pv.resolved_entry(id) {
                        let current =
                            PropertyDescriptor::data(entry.value.clone(), entry.attributes);
                        self.check_property_change(key, Some(&current), desc)?;
                        self.check_sealed_define(key, Some(&current), desc)?;
                        if desc.is_accessor() {
                            pv.delete(id);
                            displaced = true;
                        } else {
                            if desc.has_value() {
                                pv.store(id, desc.value().clone());
                            }
                            pv.set_attributes(id, desc.apply_to(entry.attributes));
                            return Ok(());
                        }
                    }
                }
            }
        }
        self.define_own_generic(key, desc, displaced)
    }

    fn define_own_generic(
        &self,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
        displaced: bool,
    ) -> Result<(), RuntimeError> {
        let current = self.slot_descriptor(key);
        if !displaced {
            self.check_property_change(key, current.as_ref(), desc)?;
            self.check_sealed_define(key, current.as_ref(), desc)?;
        }

        let base = match &current {
            Some(c) => c.attributes(),
            // Absent boolean fields read as false for new properties.
            None => Attributes::restrictive(),
        };
        let applied = desc.apply_to(base);

        self.slots.write(|m| {
            if desc.is_accessor() {
                let slot = m.modify(key, SlotAccess::ModifyAccessor).unwrap();
                if desc.has_getter() {
                    slot.set_getter(desc.getter().cloned());
                }
                if desc.has_setter() {
                    slot.set_setter(desc.setter().cloned());
                }
                slot.set_attributes(applied);
            } else {
                let access = if current.as_ref().is_some_and(|c| c.is_accessor()) {
                    SlotAccess::ConvertAccessorToValue
                } else {
                    SlotAccess::Modify
                };
                let slot = m.modify(key, access).unwrap();
                if desc.has_value() {
                    slot.store_value(desc.value().clone());
                } else if current.is_none() {
                    slot.store_value(Value::Undefined);
                }
                slot.set_attributes(applied);
            }
        });
        Ok(())
    }

    /// Current-state compatibility checks. `current` is `None` for a new
    /// property; then only extensibility matters.
    pub(crate) fn check_property_change(
        &self,
        key: &PropertyKey,
        current: Option<&PropertyDescriptor>,
        desc: &PropertyDescriptor,
    ) -> Result<(), RuntimeError> {
        let Some(current) = current else {
            if !self.is_extensible() {
                return Err(RuntimeError::not_extensible(key));
            }
            return Ok(());
        };
        check_descriptor_compat(key, current, desc)
    }

    /// After sealing, the only define still permitted is a pure value
    /// update of an existing writable data property.
    fn check_sealed_define(
        &self,
        key: &PropertyKey,
        current: Option<&PropertyDescriptor>,
        desc: &PropertyDescriptor,
    ) -> Result<(), RuntimeError> {
        if !self.is_sealed() {
            return Ok(());
        }
        let value_only = desc.has_value()
            && !desc.has_writable()
            && !desc.has_enumerable()
            && !desc.has_configurable()
            && !desc.is_accessor();
        let writable_data = current.is_some_and(|c| {
            c.is_writable() && c.getter().is_none() && c.setter().is_none()
        });
        if value_only && writable_data {
            Ok(())
        } else {
            Err(RuntimeError::sealed(key))
        }
    }

    /// Fully populated descriptor for one own property, or `None`.
    pub(crate) fn own_property_descriptor(
        &self,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, RuntimeError> {
        if let Some(b) = self.builtin.get() {
            if let Some(info) = b.class.find_instance_id(key) {
                let value = b.class.instance_value(self, info.id());
                if value.is_some() || info.attributes().is_permanent() {
                    return Ok(Some(PropertyDescriptor::data(
                        value.unwrap_or(Value::Undefined),
                        info.attributes(),
                    )));
                }
            }
            if let Some(pv) = &b.prototype_values {
                if let Some(id) = b.class.find_prototype_id(key) {
                    if let Some(entry) = pv.resolved_entry(id) {
                        return Ok(Some(PropertyDescriptor::data(
                            entry.value,
                            entry.attributes,
                        )));
                    }
                }
            }
        }
        Ok(self.slot_descriptor(key))
    }

    fn slot_descriptor(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.slots.read(|m| m.query(key).map(|s| s.to_descriptor()))
    }
}

/// Whether `desc` may replace the non-generic parts of `current`. Only
/// non-configurable properties constrain redefinition; redefining with
/// the property's current state is always allowed.
pub(crate) fn check_descriptor_compat(
    key: &PropertyKey,
    current: &PropertyDescriptor,
    desc: &PropertyDescriptor,
) -> Result<(), RuntimeError> {
    if current.is_configurable() {
        return Ok(());
    }

    if desc.has_configurable() && desc.is_configurable() {
        return Err(RuntimeError::ChangeConfigurable {
            key: key.to_string(),
        });
    }
    if desc.has_enumerable() && desc.is_enumerable() != current.is_enumerable() {
        return Err(RuntimeError::ChangeEnumerable {
            key: key.to_string(),
        });
    }
    if desc.is_generic() {
        return Ok(());
    }

    let current_is_accessor = current.getter().is_some() || current.setter().is_some();
    if desc.is_data() && !current_is_accessor {
        if !current.is_writable() {
            if desc.has_writable() && desc.is_writable() {
                return Err(RuntimeError::ChangeWritable {
                    key: key.to_string(),
                });
            }
            if desc.has_value() && !same_value(desc.value(), current.value()) {
                return Err(RuntimeError::ChangeValue {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    } else if desc.is_accessor() && current_is_accessor {
        if desc.has_getter() && !callable_eq(desc.getter(), current.getter()) {
            return Err(RuntimeError::ChangeAccessor {
                key: key.to_string(),
            });
        }
        if desc.has_setter() && !callable_eq(desc.setter(), current.setter()) {
            return Err(RuntimeError::ChangeAccessor {
                key: key.to_string(),
            });
        }
        Ok(())
    } else {
        Err(RuntimeError::ChangeKind {
            key: key.to_string(),
        })
    }
}
