use serde::{Deserialize, Serialize};

/// Property attribute bitset. The empty set is a fully permissive data
/// property: writable, enumerable, configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attributes(u8);

impl Attributes {
    pub const EMPTY: Attributes = Attributes(0);
    /// Writes are rejected.
    pub const READONLY: Attributes = Attributes(0x01);
    /// Hidden from default enumeration.
    pub const DONTENUM: Attributes = Attributes(0x02);
    /// Deletion and reconfiguration are rejected.
    pub const PERMANENT: Attributes = Attributes(0x04);
    /// A const binding declared but not yet initialized.
    pub const UNINITIALIZED_CONST: Attributes = Attributes(0x08);
    /// The full const combination.
    pub const CONST: Attributes = Attributes(0x01 | 0x04 | 0x08);

    const MASK: u8 = 0x0f;

    /// Validates raw bits. Panics on unknown bits; attribute values come
    /// from embedder code, not from scripts.
    pub fn checked(bits: u8) -> Attributes {
        assert!(
            bits & !Self::MASK == 0,
            "invalid property attribute bits: {bits:#04x}"
        );
        Attributes(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Attributes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: Attributes) -> Attributes {
        Attributes(self.0 | other.0)
    }

    pub fn without(self, other: Attributes) -> Attributes {
        Attributes(self.0 & !other.0)
    }

    pub fn is_readonly(self) -> bool {
        self.contains(Self::READONLY)
    }

    pub fn is_dont_enum(self) -> bool {
        self.contains(Self::DONTENUM)
    }

    pub fn is_permanent(self) -> bool {
        self.contains(Self::PERMANENT)
    }

    pub fn is_uninitialized_const(self) -> bool {
        self.contains(Self::UNINITIALIZED_CONST)
    }

    pub fn is_writable(self) -> bool {
        !self.is_readonly()
    }

    pub fn is_enumerable(self) -> bool {
        !self.is_dont_enum()
    }

    pub fn is_configurable(self) -> bool {
        !self.is_permanent()
    }

    /// The default for properties created through define-own-property with
    /// an incomplete descriptor: absent fields read as false.
    pub fn restrictive() -> Attributes {
        Self::READONLY.with(Self::DONTENUM).with(Self::PERMANENT)
    }
}

impl std::ops::BitOr for Attributes {
    type Output = Attributes;

    fn bitor(self, rhs: Attributes) -> Attributes {
        self.with(rhs)
    }
}
