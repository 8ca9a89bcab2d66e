//! Meta-object protocol: a proxy pairs a target object with a handler
//! object whose trap properties intercept the fundamental operations.
//! Absent traps forward to the target; trap results are validated
//! against the target's current state so a proxy cannot misreport
//! non-configurable or non-extensible facts.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{EnumOptions, Strictness};
use crate::descriptor::PropertyDescriptor;
use crate::errors::RuntimeError;
use crate::key::PropertyKey;
use crate::object::{
    ObjectRef, check_descriptor_compat, get_property, sort_indices_first,
};
use crate::value::{Callable, Value, same_value};

#[derive(Clone)]
struct ProxyParts {
    target: ObjectRef,
    handler: ObjectRef,
}

/// A revocable forwarding object. Revocation drops both the target and
/// the handler; every later operation fails.
pub struct ProxyObject {
    state: RwLock<Option<ProxyParts>>,
}

impl std::fmt::Debug for ProxyObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let revoked = self.state.read().is_none();
        f.debug_struct("ProxyObject")
            .field("revoked", &revoked)
            .finish()
    }
}

impl ProxyObject {
    pub fn new(target: ObjectRef, handler: ObjectRef) -> ObjectRef {
        ObjectRef::Proxy(Arc::new(ProxyObject {
            state: RwLock::new(Some(ProxyParts { target, handler })),
        }))
    }

    /// Builds a proxy together with a revoker function. Calling the
    /// revoker more than once is harmless.
    pub fn revocable(target: ObjectRef, handler: ObjectRef) -> (ObjectRef, Callable) {
        let proxy = Arc::new(ProxyObject {
            state: RwLock::new(Some(ProxyParts { target, handler })),
        });
        let for_revoker = Arc::clone(&proxy);
        let revoker = Callable::from_closure("revoke", move |_this, _args| {
            for_revoker.revoke();
            Ok(Value::Undefined)
        });
        (ObjectRef::Proxy(proxy), revoker)
    }

    /// Enters the terminal revoked state.
    pub fn revoke(&self) {
        *self.state.write() = None;
    }

    pub fn is_revoked(&self) -> bool {
        self.state.read().is_none()
    }

    fn parts(&self, operation: &'static str) -> Result<ProxyParts, RuntimeError> {
        self.state
            .read()
            .clone()
            .ok_or(RuntimeError::RevokedProxy { operation })
    }

    pub(crate) fn target(&self) -> Result<ObjectRef, RuntimeError> {
        Ok(self.parts("access")?.target)
    }

    /// Looks up a trap on the handler, through its prototype chain.
    /// Undefined and null mean no trap; anything else must be callable.
    fn trap(&self, parts: &ProxyParts, name: &'static str) -> Result<Option<Value>, RuntimeError> {
        match get_property(&parts.handler, &PropertyKey::from(name))? {
            None | Some(Value::Undefined) | Some(Value::Null) => Ok(None),
            Some(v @ Value::Function(_)) | Some(v @ Value::Object(_)) => Ok(Some(v)),
            Some(other) => Err(RuntimeError::NotCallable {
                what: format!("'{name}' trap of type {}", other.type_name()),
            }),
        }
    }

    fn call_trap(
        parts: &ProxyParts,
        trap: &Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let this = Value::Object(parts.handler.clone());
        match trap {
            Value::Function(f) => f.call(&this, args),
            Value::Object(o) => o.call(&this, args),
            _ => unreachable!("trap lookup only yields callables"),
        }
    }

    pub(crate) fn get(
        &self,
        key: &PropertyKey,
        receiver: &ObjectRef,
    ) -> Result<Option<Value>, RuntimeError> {
        let parts = self.parts("get")?;
        let Some(trap) = self.trap(&parts, "get")? else {
            return parts.target.get(key, receiver);
        };
        let result = Self::call_trap(
            &parts,
            &trap,
            &[
                Value::Object(parts.target.clone()),
                key_value(key),
                Value::Object(receiver.clone()),
            ],
        )?;
        if let Some(desc) = parts.target.own_property_descriptor(key)? {
            if !desc.is_configurable() {
                let is_accessor = desc.getter().is_some() || desc.setter().is_some();
                if !is_accessor && !desc.is_writable() && !same_value(&result, desc.value()) {
                    return Err(RuntimeError::invariant(
                        "get",
                        format!("'{key}' is non-configurable, non-writable on the target"),
                    ));
                }
                if is_accessor && desc.getter().is_none() && !result.is_undefined() {
                    return Err(RuntimeError::invariant(
                        "get",
                        format!("'{key}' has no getter on the target"),
                    ));
                }
            }
        }
        Ok(Some(result))
    }

    pub(crate) fn put(
        &self,
        key: &PropertyKey,
        receiver: &ObjectRef,
        value: Value,
        strictness: Strictness,
    ) -> Result<bool, RuntimeError> {
        let parts = self.parts("set")?;
        let Some(trap) = self.trap(&parts, "set")? else {
            return parts.target.put(key, receiver, value, strictness);
        };
        let result = Self::call_trap(
            &parts,
            &trap,
            &[
                Value::Object(parts.target.clone()),
                key_value(key),
                value.clone(),
                Value::Object(receiver.clone()),
            ],
        )?;
        if !result.truthy() {
            return if strictness.is_strict() {
                Err(RuntimeError::TrapRejected { trap: "set" })
            } else {
                Ok(true)
            };
        }
        if let Some(desc) = parts.target.own_property_descriptor(key)? {
            if !desc.is_configurable() {
                let is_accessor = desc.getter().is_some() || desc.setter().is_some();
                if !is_accessor && !desc.is_writable() && !same_value(&value, desc.value()) {
                    return Err(RuntimeError::invariant(
                        "set",
                        format!("'{key}' is non-configurable, non-writable on the target"),
                    ));
                }
                if is_accessor && desc.setter().is_none() {
                    return Err(RuntimeError::invariant(
                        "set",
                        format!("'{key}' has no setter on the target"),
                    ));
                }
            }
        }
        Ok(true)
    }

    pub(crate) fn has(&self, key: &PropertyKey) -> Result<bool, RuntimeError> {
        let parts = self.parts("has")?;
        let Some(trap) = self.trap(&parts, "has")? else {
            return parts.target.has(key);
        };
        let result = Self::call_trap(
            &parts,
            &trap,
            &[Value::Object(parts.target.clone()), key_value(key)],
        )?
        .truthy();
        if !result {
            if let Some(desc) = parts.target.own_property_descriptor(key)? {
                if !desc.is_configurable() {
                    return Err(RuntimeError::invariant(
                        "has",
                        format!("cannot hide non-configurable '{key}'"),
                    ));
                }
                if !parts.target.is_extensible()? {
                    return Err(RuntimeError::invariant(
                        "has",
                        format!("cannot hide '{key}' of a non-extensible target"),
                    ));
                }
            }
        }
        Ok(result)
    }

    pub(crate) fn delete(
        &self,
        key: &PropertyKey,
        strictness: Strictness,
    ) -> Result<(), RuntimeError> {
        let parts = self.parts("deleteProperty")?;
        let Some(trap) = self.trap(&parts, "deleteProperty")? else {
            return parts.target.delete(key, strictness);
        };
        let result = Self::call_trap(
            &parts,
            &trap,
            &[Value::Object(parts.target.clone()), key_value(key)],
        )?
        .truthy();
        if !result {
            return if strictness.is_strict() {
                Err(RuntimeError::TrapRejected {
                    trap: "deleteProperty",
                })
            } else {
                Ok(())
            };
        }
        if let Some(desc) = parts.target.own_property_descriptor(key)? {
            if !desc.is_configurable() {
                return Err(RuntimeError::invariant(
                    "deleteProperty",
                    format!("cannot delete non-configurable '{key}'"),
                ));
            }
            if !parts.target.is_extensible()? {
                return Err(RuntimeError::invariant(
                    "deleteProperty",
                    format!("cannot delete '{key}' of a non-extensible target"),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn own_property_descriptor(
        &self,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, RuntimeError> {
        let parts = self.parts("getOwnPropertyDescriptor")?;
        let Some(trap) = self.trap(&parts, "getOwnPropertyDescriptor")? else {
            return parts.target.own_property_descriptor(key);
        };
        let result = Self::call_trap(
            &parts,
            &trap,
            &[Value::Object(parts.target.clone()), key_value(key)],
        )?;
        let target_desc = parts.target.own_property_descriptor(key)?;
        match result {
            Value::Undefined => {
                if let Some(desc) = &target_desc {
                    if !desc.is_configurable() {
                        return Err(RuntimeError::invariant(
                            "getOwnPropertyDescriptor",
                            format!("cannot report non-configurable '{key}' as absent"),
                        ));
                    }
                    if !parts.target.is_extensible()? {
                        return Err(RuntimeError::invariant(
                            "getOwnPropertyDescriptor",
                            format!("cannot hide '{key}' of a non-extensible target"),
                        ));
                    }
                }
                Ok(None)
            }
            Value::Object(desc_obj) => {
                let mut desc = PropertyDescriptor::from_object(&desc_obj)?;
                desc.check_valid(key)?;
                desc.complete();
                match &target_desc {
                    None => {
                        if !parts.target.is_extensible()? {
                            return Err(RuntimeError::invariant(
                                "getOwnPropertyDescriptor",
                                format!("cannot add '{key}' to a non-extensible target"),
                            ));
                        }
                        if !desc.is_configurable() {
                            return Err(RuntimeError::invariant(
                                "getOwnPropertyDescriptor",
                                format!("cannot report absent '{key}' as non-configurable"),
                            ));
                        }
                    }
                    Some(current) => {
                        check_descriptor_compat(key, current, &desc).map_err(|e| {
                            RuntimeError::invariant("getOwnPropertyDescriptor", e.to_string())
                        })?;
                        if !desc.is_configurable() && current.is_configurable() {
                            return Err(RuntimeError::invariant(
                                "getOwnPropertyDescriptor",
                                format!("cannot report configurable '{key}' as non-configurable"),
                            ));
                        }
                    }
                }
                Ok(Some(desc))
            }
            other => Err(RuntimeError::invariant(
                "getOwnPropertyDescriptor",
                format!("trap returned {} instead of an object", other.type_name()),
            )),
        }
    }

    pub(crate) fn define_own_property(
        &self,
        key: &PropertyKey,
        desc: &PropertyDescriptor,
    ) -> Result<(), RuntimeError> {
        let parts = self.parts("defineProperty")?;
        let Some(trap) = self.trap(&parts, "defineProperty")? else {
            return parts.target.define_own_property(key, desc);
        };
        let mut completed = desc.clone();
        completed.complete();
        let desc_value = completed.to_object(target_config(&parts.target))?;
        let result = Self::call_trap(
            &parts,
            &trap,
            &[
                Value::Object(parts.target.clone()),
                key_value(key),
                Value::Object(desc_value),
            ],
        )?
        .truthy();
        if !result {
            return Err(RuntimeError::TrapRejected {
                trap: "defineProperty",
            });
        }
        let target_desc = parts.target.own_property_descriptor(key)?;
        let setting_non_configurable = desc.has_configurable() && !desc.is_configurable();
        match &target_desc {
            None => {
                if !parts.target.is_extensible()? {
                    return Err(RuntimeError::invariant(
                        "defineProperty",
                        format!("'{key}' was not added to the non-extensible target"),
                    ));
                }
                if setting_non_configurable {
                    return Err(RuntimeError::invariant(
                        "defineProperty",
                        format!("'{key}' cannot be non-configurable while absent on the target"),
                    ));
                }
            }
            Some(current) => {
                check_descriptor_compat(key, current, desc)
                    .map_err(|e| RuntimeError::invariant("defineProperty", e.to_string()))?;
                if setting_non_configurable && current.is_configurable() {
                    return Err(RuntimeError::invariant(
                        "defineProperty",
                        format!("'{key}' is configurable on the target"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn ids(&self, options: EnumOptions) -> Result<Vec<PropertyKey>, RuntimeError> {
        let parts = self.parts("ownKeys")?;
        let Some(trap) = self.trap(&parts, "ownKeys")? else {
            return parts.target.ids(options);
        };
        let result =
            Self::call_trap(&parts, &trap, &[Value::Object(parts.target.clone())])?;
        let keys = keys_from_list(&result)?;

        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(RuntimeError::invariant(
                    "ownKeys",
                    format!("duplicate key '{key}'"),
                ));
            }
        }
        let target_keys = parts.target.ids(EnumOptions::all())?;
        for target_key in &target_keys {
            if keys.contains(target_key) {
                continue;
            }
            let desc = parts.target.own_property_descriptor(target_key)?;
            if desc.is_some_and(|d| !d.is_configurable()) {
                return Err(RuntimeError::invariant(
                    "ownKeys",
                    format!("missing non-configurable key '{target_key}'"),
                ));
            }
            if !parts.target.is_extensible()? {
                return Err(RuntimeError::invariant(
                    "ownKeys",
                    format!("missing key '{target_key}' of a non-extensible target"),
                ));
            }
        }
        if !parts.target.is_extensible()? {
            for key in &keys {
                if !target_keys.contains(key) {
                    return Err(RuntimeError::invariant(
                        "ownKeys",
                        format!("extra key '{key}' on a non-extensible target"),
                    ));
                }
            }
        }

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if key.is_symbol() && !options.include_symbols {
                continue;
            }
            if !options.include_non_enumerable {
                let enumerable = self
                    .own_property_descriptor(&key)?
                    .is_some_and(|d| d.is_enumerable());
                if !enumerable {
                    continue;
                }
            }
            out.push(key);
        }
        if options.indices_first {
            sort_indices_first(&mut out);
        }
        Ok(out)
    }

    pub(crate) fn prototype(&self) -> Result<Option<ObjectRef>, RuntimeError> {
        let parts = self.parts("getPrototypeOf")?;
        let Some(trap) = self.trap(&parts, "getPrototypeOf")? else {
            return parts.target.prototype();
        };
        let result =
            Self::call_trap(&parts, &trap, &[Value::Object(parts.target.clone())])?;
        let reported = match result {
            Value::Null => None,
            Value::Object(o) => Some(o),
            other => {
                return Err(RuntimeError::invariant(
                    "getPrototypeOf",
                    format!("trap returned {}", other.type_name()),
                ));
            }
        };
        if !parts.target.is_extensible()? {
            let actual = parts.target.prototype()?;
            let agrees = match (&reported, &actual) {
                (None, None) => true,
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            };
            if !agrees {
                return Err(RuntimeError::invariant(
                    "getPrototypeOf",
                    "prototype of a non-extensible target misreported",
                ));
            }
        }
        Ok(reported)
    }

    pub(crate) fn set_prototype(&self, proto: Option<ObjectRef>) -> Result<(), RuntimeError> {
        let parts = self.parts("setPrototypeOf")?;
        let Some(trap) = self.trap(&parts, "setPrototypeOf")? else {
            return parts.target.set_prototype(proto);
        };
        let proto_value = proto
            .clone()
            .map_or(Value::Null, Value::Object);
        let result = Self::call_trap(
            &parts,
            &trap,
            &[Value::Object(parts.target.clone()), proto_value],
        )?
        .truthy();
        if !result {
            return Err(RuntimeError::TrapRejected {
                trap: "setPrototypeOf",
            });
        }
        if !parts.target.is_extensible()? {
            let actual = parts.target.prototype()?;
            let agrees = match (&proto, &actual) {
                (None, None) => true,
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            };
            if !agrees {
                return Err(RuntimeError::invariant(
                    "setPrototypeOf",
                    "cannot change the prototype of a non-extensible target",
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn is_extensible(&self) -> Result<bool, RuntimeError> {
        let parts = self.parts("isExtensible")?;
        let Some(trap) = self.trap(&parts, "isExtensible")? else {
            return parts.target.is_extensible();
        };
        let result =
            Self::call_trap(&parts, &trap, &[Value::Object(parts.target.clone())])?.truthy();
        if result != parts.target.is_extensible()? {
            return Err(RuntimeError::invariant(
                "isExtensible",
                "trap disagrees with the target",
            ));
        }
        Ok(result)
    }

    pub(crate) fn prevent_extensions(&self) -> Result<(), RuntimeError> {
        let parts = self.parts("preventExtensions")?;
        let Some(trap) = self.trap(&parts, "preventExtensions")? else {
            return parts.target.prevent_extensions();
        };
        let result =
            Self::call_trap(&parts, &trap, &[Value::Object(parts.target.clone())])?.truthy();
        if !result {
            return Err(RuntimeError::TrapRejected {
                trap: "preventExtensions",
            });
        }
        if parts.target.is_extensible()? {
            return Err(RuntimeError::invariant(
                "preventExtensions",
                "target is still extensible",
            ));
        }
        Ok(())
    }

    pub(crate) fn call(&self, this: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let parts = self.parts("apply")?;
        let Some(trap) = self.trap(&parts, "apply")? else {
            return parts.target.call(this, args);
        };
        let args_list = Value::Object(list_to_object(&parts.target, args)?);
        Self::call_trap(
            &parts,
            &trap,
            &[
                Value::Object(parts.target.clone()),
                this.clone(),
                args_list,
            ],
        )
    }

    pub(crate) fn construct(
        &self,
        self_ref: &ObjectRef,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let parts = self.parts("construct")?;
        let Some(trap) = self.trap(&parts, "construct")? else {
            return parts.target.construct(args);
        };
        let args_list = Value::Object(list_to_object(&parts.target, args)?);
        let result = Self::call_trap(
            &parts,
            &trap,
            &[
                Value::Object(parts.target.clone()),
                args_list,
                Value::Object(self_ref.clone()),
            ],
        )?;
        match result {
            Value::Object(_) => Ok(result),
            other => Err(RuntimeError::invariant(
                "construct",
                format!("trap returned {} instead of an object", other.type_name()),
            )),
        }
    }
}

fn key_value(key: &PropertyKey) -> Value {
    match key {
        PropertyKey::String(s) => Value::String(s.clone()),
        PropertyKey::Index(i) => Value::string(&i.to_string()),
        PropertyKey::Symbol(s) => Value::Symbol(s.clone()),
    }
}

/// Reads an array-like trap result: a `length` property and integer
/// indices holding strings or symbols.
fn keys_from_list(value: &Value) -> Result<Vec<PropertyKey>, RuntimeError> {
    let Value::Object(list) = value else {
        return Err(RuntimeError::invariant(
            "ownKeys",
            format!("trap returned {} instead of a list", value.type_name()),
        ));
    };
    let length = match get_property(list, &PropertyKey::from("length"))? {
        Some(Value::Number(n)) if n.fract() == 0.0 && n >= 0.0 => n as u32,
        _ => {
            return Err(RuntimeError::invariant(
                "ownKeys",
                "trap result has no usable length",
            ));
        }
    };
    let mut keys = Vec::with_capacity(length as usize);
    for i in 0..length {
        match get_property(list, &PropertyKey::from(i))? {
            Some(Value::String(s)) => keys.push(PropertyKey::String(s)),
            Some(Value::Symbol(s)) => keys.push(PropertyKey::Symbol(s)),
            other => {
                return Err(RuntimeError::invariant(
                    "ownKeys",
                    format!(
                        "list element {i} is {}",
                        other.map_or("absent", |v| v.type_name())
                    ),
                ));
            }
        }
    }
    Ok(keys)
}

/// Packs call arguments into an array-like object for apply/construct
/// traps.
fn list_to_object(like: &ObjectRef, args: &[Value]) -> Result<ObjectRef, RuntimeError> {
    let list = crate::object::ScriptObject::new(target_config(like));
    for (i, arg) in args.iter().enumerate() {
        list.define_property(
            &PropertyKey::from(i as u32),
            arg.clone(),
            crate::object::Attributes::EMPTY,
        )?;
    }
    list.define_property(
        &PropertyKey::from("length"),
        Value::Number(args.len() as f64),
        crate::object::Attributes::DONTENUM,
    )?;
    Ok(list)
}

fn target_config(target: &ObjectRef) -> crate::config::ObjectConfig {
    target.plain().map(|o| o.config()).unwrap_or_default()
}
