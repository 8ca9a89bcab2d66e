/// Threading discipline of an object, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threading {
    /// Lightweight storage for single-threaded embeddings.
    #[default]
    Single,
    /// Reader/writer locked storage safe to share across threads.
    Shared,
}

/// Construction-time configuration for objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectConfig {
    pub threading: Threading,
}

impl ObjectConfig {
    pub fn single() -> Self {
        Self {
            threading: Threading::Single,
        }
    }

    pub fn shared() -> Self {
        Self {
            threading: Threading::Shared,
        }
    }
}

/// Strict-mode flag, passed explicitly to every mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    #[default]
    Sloppy,
    Strict,
}

impl Strictness {
    pub fn is_strict(self) -> bool {
        self == Strictness::Strict
    }
}

/// Controls which keys enumeration reports and in what order.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumOptions {
    pub include_non_enumerable: bool,
    pub include_symbols: bool,
    /// Report integer-index keys first, ascending, ahead of the other keys
    /// in their insertion order.
    pub indices_first: bool,
}

impl EnumOptions {
    /// Enumerable string and index keys only, in insertion order.
    pub fn enumerable() -> Self {
        Self::default()
    }

    /// Every own key including symbols, regardless of attributes.
    pub fn all() -> Self {
        Self {
            include_non_enumerable: true,
            include_symbols: true,
            indices_first: false,
        }
    }
}
