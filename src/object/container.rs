use parking_lot::{Mutex, RwLock};

use crate::config::Threading;
use crate::object::slot_map::SlotMap;

/// Wraps a slot map in the locking discipline chosen at construction.
/// `Plain` objects take a word-sized mutex that is uncontended in
/// single-threaded embeddings; `Locked` objects allow concurrent readers.
///
/// Both variants hand out access through closures so guards cannot escape.
/// Callers must not invoke user callbacks (getters, setters, traps) inside
/// a closure; clone what is needed and call outside.
#[derive(Debug)]
pub enum SlotMapContainer {
    Plain(Mutex<SlotMap>),
    Locked(RwLock<SlotMap>),
}

impl SlotMapContainer {
    pub fn new(threading: Threading) -> Self {
        Self::from_map(threading, SlotMap::new())
    }

    pub fn with_capacity(threading: Threading, expected: usize) -> Self {
        Self::from_map(threading, SlotMap::with_capacity(expected))
    }

    fn from_map(threading: Threading, map: SlotMap) -> Self {
        match threading {
            Threading::Single => SlotMapContainer::Plain(Mutex::new(map)),
            Threading::Shared => SlotMapContainer::Locked(RwLock::new(map)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&SlotMap) -> R) -> R {
        match self {
            SlotMapContainer::Plain(m) => f(&m.lock()),
            SlotMapContainer::Locked(l) => f(&l.read()),
        }
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut SlotMap) -> R) -> R {
        match self {
            SlotMapContainer::Plain(m) => f(&mut m.lock()),
            SlotMapContainer::Locked(l) => f(&mut l.write()),
        }
    }

    pub fn len(&self) -> usize {
        self.read(|m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.read(|m| m.is_empty())
    }
}
