//! Identity-keyed slot map.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Trait for records that have an ID field.
pub trait HasId {
    /// Get the record's unique identifier.
    fn id(&self) -> &str;
}

/// Map from key to an immutable, shared value.
///
/// Writers always replace a whole slot; readers hold an `Arc` to whatever was
/// there when they looked and never see a half-applied update.
#[derive(Debug)]
pub struct KeyedStore<T> {
    slots: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> KeyedStore<T> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Replace the slot, returning the previous value.
    pub fn put(&self, key: impl Into<String>, value: T) -> Option<Arc<T>> {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value))
    }

    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner).remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: HasId + Clone> KeyedStore<Vec<T>> {
    /// Swap the record with `record.id()` inside the list at `key`.
    ///
    /// Builds a new list and replaces the slot. Returns false when the slot or
    /// the record is missing.
    pub fn replace_record(&self, key: &str, record: T) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = slots.get(key) else {
            return false;
        };
        let Some(index) = current.iter().position(|r| r.id() == record.id()) else {
            return false;
        };

        let mut updated: Vec<T> = current.as_ref().clone();
        updated[index] = record;
        slots.insert(key.to_string(), Arc::new(updated));
        true
    }

    pub fn find_record(&self, key: &str, id: &str) -> Option<T> {
        self.get(key)?.iter().find(|r| r.id() == id).cloned()
    }
}

impl<T> Default for KeyedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
