use super::{ChangeEntry, ValueSlot};
use crate::core::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-entity map from property name to [`ChangeEntry`].
///
/// Not internally synchronized: concurrent mutation of one change set must be
/// serialized by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    owner: String,
    entries: HashMap<String, ChangeEntry>,
    /// Property names in order of their first modification.
    modified_order: Vec<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::for_entity("entity")
    }

    /// Change set whose `NotFound` errors name `owner`.
    pub fn for_entity(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: HashMap::new(),
            modified_order: Vec::new(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&ChangeEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| DbError::not_found(&self.owner, name))
    }

    pub fn current_value(&self, name: &str) -> Result<&ValueSlot> {
        self.get(name).map(ChangeEntry::current_value)
    }

    pub fn is_modified(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(ChangeEntry::is_modified)
            .unwrap_or(false)
    }

    pub fn initialize(&mut self, name: &str, value: ValueSlot) {
        self.initialize_with(name, value, |_| {});
    }

    /// Records a loaded value; `on_first_insert` runs before a new entry is created.
    pub fn initialize_with<F>(&mut self, name: &str, value: ValueSlot, on_first_insert: F)
    where
        F: FnOnce(&str),
    {
        match self.entries.get_mut(name) {
            Some(entry) => entry.initialize(value),
            None => {
                on_first_insert(name);
                self.entries
                    .insert(name.to_string(), ChangeEntry::initialized(value));
            }
        }
    }

    pub fn modify(&mut self, name: &str, value: ValueSlot) {
        self.modify_with(name, value, |_| {});
    }

    /// Records a write; `on_first_insert` runs before a new entry is created.
    pub fn modify_with<F>(&mut self, name: &str, value: ValueSlot, on_first_insert: F)
    where
        F: FnOnce(&str),
    {
        match self.entries.get_mut(name) {
            Some(entry) => entry.modify(value),
            None => {
                on_first_insert(name);
                self.entries
                    .insert(name.to_string(), ChangeEntry::modified(value));
            }
        }
        self.record_modified(name);
    }

    /// `flag = false` resets an existing entry; `flag = true` marks the
    /// property dirty without changing its value, creating a value-less
    /// modified entry when none exists.
    pub fn mark_modified(&mut self, name: &str, flag: bool) {
        if !flag {
            if let Some(entry) = self.entries.get_mut(name) {
                entry.reset();
            }
            return;
        }

        match self.entries.get_mut(name) {
            Some(entry) => entry.mark_modified(),
            None => {
                self.entries
                    .insert(name.to_string(), ChangeEntry::modified(ValueSlot::empty()));
            }
        }
        self.record_modified(name);
    }

    /// Names of modified properties in order of first modification.
    ///
    /// Lazy and restartable; call again for a fresh pass.
    pub fn modified_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.modified_order
            .iter()
            .filter(|name| self.is_modified(name))
            .map(String::as_str)
    }

    pub fn has_modifications(&self) -> bool {
        self.entries.values().any(ChangeEntry::is_modified)
    }

    pub fn reset_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.reset();
        }
    }

    /// Accepts every entry after a successful save, including entries cleared
    /// to an empty value.
    pub fn accept_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.accept();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChangeEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    fn record_modified(&mut self, name: &str) {
        if !self.modified_order.iter().any(|existing| existing == name) {
            self.modified_order.push(name.to_string());
        }
    }
}
