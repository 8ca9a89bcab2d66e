//! Dynamic object and property model for a scripting-language runtime:
//! attribute-aware slot storage, the descriptor-driven define-own-property
//! algorithm, id-dispatched built-in classes, and a validating proxy
//! layer. Objects are shared handles; the locking discipline is chosen
//! per object at construction.

pub mod builtins;
pub mod config;
pub mod descriptor;
pub mod errors;
pub mod key;
pub mod object;
pub mod persist;
pub mod proxy;
pub mod symbol;
pub mod value;

pub use config::{EnumOptions, ObjectConfig, Strictness, Threading};
pub use descriptor::PropertyDescriptor;
pub use errors::{RuntimeError, ScriptableError, SnapshotError};
pub use key::PropertyKey;
pub use object::{
    Attributes, ObjectRef, ScriptObject, Token, delete_property, get_base, get_property,
    has_property, put_property,
};
pub use proxy::ProxyObject;
pub use symbol::Symbol;
pub use value::{Callable, Value, same_value};
