use rustc_hash::FxHashMap;

use crate::key::PropertyKey;
use crate::object::attributes::Attributes;
use crate::object::slot::Slot;
use crate::value::Value;

/// How a lookup may change the map when the key is missing or the slot has
/// the wrong kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAccess {
    /// Never creates or converts.
    Query,
    /// Creates an empty-attribute value slot when absent.
    Modify,
    /// Creates a slot carrying the const attribute combination when absent.
    ModifyConst,
    /// Creates or converts to an accessor slot, preserving attributes and
    /// insertion order on conversion.
    ModifyAccessor,
    /// Converts an accessor slot back to a value slot in place.
    ConvertAccessorToValue,
}

const EMBEDDED_MAX: usize = 8;

/// Insertion-ordered property storage. Small objects use a linear vector;
/// past a threshold the map promotes itself to a hash table that keeps a
/// separate order list. Deletion is infrequent, so linear removal is fine.
#[derive(Debug)]
pub struct SlotMap {
    repr: Repr,
}

#[derive(Debug)]
enum Repr {
    Embedded(Vec<Slot>),
    Hashed {
        order: Vec<PropertyKey>,
        slots: FxHashMap<PropertyKey, Slot>,
    },
}

impl SlotMap {
    pub fn new() -> Self {
        Self {
            repr: Repr::Embedded(Vec::new()),
        }
    }

    /// Picks the backing immediately from an expected size, used when
    /// rebuilding an object from a snapshot.
    pub fn with_capacity(expected: usize) -> Self {
        if expected > EMBEDDED_MAX {
            Self {
                repr: Repr::Hashed {
                    order: Vec::with_capacity(expected),
                    slots: FxHashMap::default(),
                },
            }
        } else {
            Self {
                repr: Repr::Embedded(Vec::with_capacity(expected)),
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Embedded(v) => v.len(),
            Repr::Hashed { order, .. } => order.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn query(&self, key: &PropertyKey) -> Option<&Slot> {
        match &self.repr {
            Repr::Embedded(v) => v.iter().find(|s| s.key() == key),
            Repr::Hashed { slots, .. } => slots.get(key),
        }
    }

    pub fn query_mut(&mut self, key: &PropertyKey) -> Option<&mut Slot> {
        match &mut self.repr {
            Repr::Embedded(v) => v.iter_mut().find(|s| s.key() == key),
            Repr::Hashed { slots, .. } => slots.get_mut(key),
        }
    }

    /// Access-mode driven lookup. Returns `None` only for `Query` misses;
    /// the modify modes always yield a slot.
    pub fn modify(&mut self, key: &PropertyKey, access: SlotAccess) -> Option<&mut Slot> {
        let exists = self.query(key).is_some();
        if !exists {
            match access {
                SlotAccess::Query => return None,
                SlotAccess::Modify | SlotAccess::ConvertAccessorToValue => {
                    self.insert(Slot::new_value(
                        key.clone(),
                        Value::Undefined,
                        Attributes::EMPTY,
                    ));
                }
                SlotAccess::ModifyConst => {
                    self.insert(Slot::new_value(
                        key.clone(),
                        Value::Undefined,
                        Attributes::CONST,
                    ));
                }
                SlotAccess::ModifyAccessor => {
                    self.insert(Slot::new_accessor(key.clone(), Attributes::EMPTY));
                }
            }
            return self.query_mut(key);
        }

        let slot = self.query_mut(key).unwrap();
        match access {
            SlotAccess::ModifyAccessor => slot.convert_to_accessor(),
            SlotAccess::ConvertAccessorToValue => slot.convert_to_value(),
            _ => {}
        }
        Some(slot)
    }

    /// Appends a slot assumed absent, used when restoring a snapshot.
    pub fn add_slot(&mut self, slot: Slot) {
        debug_assert!(self.query(slot.key()).is_none());
        self.insert(slot);
    }

    pub fn remove(&mut self, key: &PropertyKey) {
        match &mut self.repr {
            Repr::Embedded(v) => {
                if let Some(pos) = v.iter().position(|s| s.key() == key) {
                    v.remove(pos);
                }
            }
            Repr::Hashed { order, slots } => {
                if slots.remove(key).is_some() {
                    let pos = order.iter().position(|k| k == key).unwrap();
                    order.remove(pos);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> + '_ {
        SlotIter {
            map: self,
            next: 0,
        }
    }

    fn insert(&mut self, slot: Slot) {
        match &mut self.repr {
            Repr::Embedded(v) => {
                v.push(slot);
                if v.len() > EMBEDDED_MAX {
                    self.promote();
                }
            }
            Repr::Hashed { order, slots } => {
                order.push(slot.key().clone());
                slots.insert(slot.key().clone(), slot);
            }
        }
    }

    fn promote(&mut self) {
        if let Repr::Embedded(v) = &mut self.repr {
            let taken = std::mem::take(v);
            let mut order = Vec::with_capacity(taken.len());
            let mut slots = FxHashMap::default();
            for slot in taken {
                order.push(slot.key().clone());
                slots.insert(slot.key().clone(), slot);
            }
            self.repr = Repr::Hashed { order, slots };
        }
    }
}

impl Default for SlotMap {
    fn default() -> Self {
        Self::new()
    }
}

struct SlotIter<'a> {
    map: &'a SlotMap,
    next: usize,
}

impl<'a> Iterator for SlotIter<'a> {
    type Item = &'a Slot;

    fn next(&mut self) -> Option<&'a Slot> {
        let i = self.next;
        self.next += 1;
        match &self.map.repr {
            Repr::Embedded(v) => v.get(i),
            Repr::Hashed { order, slots } => order.get(i).map(|k| &slots[k]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(map: &SlotMap) -> Vec<String> {
        map.iter().map(|s| s.key().to_string()).collect()
    }

    #[test]
    fn insertion_order_survives_promotion() {
        let mut map = SlotMap::new();
        for i in 0..20u32 {
            map.modify(&PropertyKey::from(format!("k{i}")), SlotAccess::Modify);
        }
        assert_eq!(map.len(), 20);
        let expected: Vec<String> = (0..20).map(|i| format!("k{i}")).collect();
        assert_eq!(keys(&map), expected);
    }

    #[test]
    fn query_never_creates() {
        let mut map = SlotMap::new();
        assert!(map.modify(&PropertyKey::from("a"), SlotAccess::Query).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn string_and_index_keys_do_not_collide() {
        let mut map = SlotMap::new();
        map.modify(&PropertyKey::from("0"), SlotAccess::Modify);
        map.modify(&PropertyKey::from(0u32), SlotAccess::Modify);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn accessor_conversion_preserves_order_and_attributes() {
        let mut map = SlotMap::new();
        map.modify(&PropertyKey::from("a"), SlotAccess::Modify);
        let b = map.modify(&PropertyKey::from("b"), SlotAccess::Modify).unwrap();
        b.set_attributes(Attributes::DONTENUM);
        map.modify(&PropertyKey::from("c"), SlotAccess::Modify);

        let b = map
            .modify(&PropertyKey::from("b"), SlotAccess::ModifyAccessor)
            .unwrap();
        assert!(b.is_accessor());
        assert_eq!(b.attributes(), Attributes::DONTENUM);
        assert_eq!(keys(&map), vec!["a", "b", "c"]);
    }

    #[test]
    fn accessor_round_trip_restores_stashed_value() {
        let mut map = SlotMap::new();
        let key = PropertyKey::from("x");
        let slot = map.modify(&key, SlotAccess::Modify).unwrap();
        slot.store_value(Value::Number(7.0));

        map.modify(&key, SlotAccess::ModifyAccessor);
        let back = map
            .modify(&key, SlotAccess::ConvertAccessorToValue)
            .unwrap();
        assert_eq!(back.stored_value(), Some(&Value::Number(7.0)));
    }

    #[test]
    fn modify_const_creates_const_slot() {
        let mut map = SlotMap::new();
        let slot = map
            .modify(&PropertyKey::from("c"), SlotAccess::ModifyConst)
            .unwrap();
        assert_eq!(slot.attributes(), Attributes::CONST);
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut map = SlotMap::new();
        for name in ["a", "b", "c"] {
            map.modify(&PropertyKey::from(name), SlotAccess::Modify);
        }
        map.remove(&PropertyKey::from("b"));
        assert_eq!(keys(&map), vec!["a", "c"]);
        map.remove(&PropertyKey::from("missing"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn remove_after_promotion() {
        let mut map = SlotMap::new();
        for i in 0..12u32 {
            map.modify(&PropertyKey::from(i), SlotAccess::Modify);
        }
        map.remove(&PropertyKey::from(5u32));
        assert_eq!(map.len(), 11);
        assert!(map.query(&PropertyKey::from(5u32)).is_none());
        assert!(map.query(&PropertyKey::from(6u32)).is_some());
    }
}
