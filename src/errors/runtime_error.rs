use miette::Diagnostic;
use thiserror::Error;

/// Script-visible failures. Internal consistency bugs panic instead.
#[derive(Debug, Error, Diagnostic)]
pub enum RuntimeError {
    #[error("cannot assign to read-only property '{key}'")]
    ReadOnlyProperty { key: String },

    #[error("cannot delete non-configurable property '{key}'")]
    DeleteNonConfigurable { key: String },

    #[error("cannot add property '{key}' to a non-extensible object")]
    NotExtensible { key: String },

    #[error("cannot modify a sealed object: '{key}'")]
    ModifySealed { key: String },

    #[error("property '{key}' not found")]
    PropertyNotFound { key: String },

    #[error("redeclaration of const '{key}'")]
    ConstRedeclaration { key: String },

    #[error("cannot set property '{key}' which has only a getter")]
    NoSetter { key: String },

    #[error("cannot make non-configurable property '{key}' configurable")]
    ChangeConfigurable { key: String },

    #[error("cannot change enumerability of non-configurable property '{key}'")]
    ChangeEnumerable { key: String },

    #[error("cannot make non-writable property '{key}' writable")]
    ChangeWritable { key: String },

    #[error("cannot change the value of read-only property '{key}'")]
    ChangeValue { key: String },

    #[error("cannot change the getter or setter of non-configurable property '{key}'")]
    ChangeAccessor { key: String },

    #[error("cannot convert non-configurable property '{key}' between data and accessor")]
    ChangeKind { key: String },

    #[error("property descriptor for '{key}' has both data and accessor fields")]
    BothDataAndAccessor { key: String },

    #[error("{what} is not a function")]
    NotCallable { what: String },

    #[error("{what} is not a constructor")]
    NotConstructable { what: String },

    #[error("cannot change attributes of built-in property '{key}' on {class_name}")]
    AttributeChangeUnsupported { key: String, class_name: String },

    #[error("cannot perform '{operation}' on a revoked proxy")]
    RevokedProxy { operation: &'static str },

    #[error("proxy '{trap}' trap violated an invariant: {message}")]
    ProxyInvariant {
        trap: &'static str,
        message: String,
    },

    #[error("proxy '{trap}' trap returned a falsy result")]
    TrapRejected { trap: &'static str },

    #[error("cannot set the prototype of a non-extensible object")]
    PrototypeNotExtensible,

    #[error("prototype chain would contain a cycle")]
    CyclicPrototype,
}

impl RuntimeError {
    pub(crate) fn read_only(key: impl ToString) -> Self {
        RuntimeError::ReadOnlyProperty {
            key: key.to_string(),
        }
    }

    pub(crate) fn not_extensible(key: impl ToString) -> Self {
        RuntimeError::NotExtensible {
            key: key.to_string(),
        }
    }

    pub(crate) fn sealed(key: impl ToString) -> Self {
        RuntimeError::ModifySealed {
            key: key.to_string(),
        }
    }

    pub(crate) fn invariant(trap: &'static str, message: impl Into<String>) -> Self {
        RuntimeError::ProxyInvariant {
            trap,
            message: message.into(),
        }
    }
}
