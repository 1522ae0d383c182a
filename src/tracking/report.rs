use super::{EntityState, RemovedAssociation, ValueSlot};
use crate::core::{DbError, EntityKey, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyChange {
    pub name: String,
    pub old: ValueSlot,
    pub new: ValueSlot,
}

/// Pending work for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityChanges {
    pub key: EntityKey,
    pub type_name: String,
    pub table_name: String,
    pub state: EntityState,
    pub properties: Vec<PropertyChange>,
    pub removed_associations: Vec<RemovedAssociation>,
}

impl EntityChanges {
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|change| change.name.as_str())
    }
}

/// Everything a save must hand to the writer, in graph insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PendingChanges {
    entities: Vec<EntityChanges>,
}

impl PendingChanges {
    pub fn new(entities: Vec<EntityChanges>) -> Self {
        Self { entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityChanges> {
        self.entities.iter()
    }

    pub fn get(&self, key: EntityKey) -> Option<&EntityChanges> {
        self.entities.iter().find(|changes| changes.key == key)
    }

    pub fn with_state(&self, state: EntityState) -> impl Iterator<Item = &EntityChanges> {
        self.entities.iter().filter(move |changes| changes.state == state)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| DbError::ExecutionError(format!("serialize pending changes: {}", err)))
    }
}
