use super::{ChangeSet, EntityState, RelationLink, RemovedAssociation, ValueSlot};
use crate::core::{DbError, EntityKey, Result, Value};
use crate::metadata::{EntityMetadata, PropertyMetadata};
use std::sync::Arc;

/// A tracked entity instance.
///
/// Property values live in the entity's [`ChangeSet`]; typed accessors
/// generated by `tracked_entity!` read and write through it.
#[derive(Debug, Clone)]
pub struct Entity {
    key: EntityKey,
    metadata: Arc<EntityMetadata>,
    changes: ChangeSet,
    state: EntityState,
    link: Option<RelationLink>,
    removed: Vec<RemovedAssociation>,
}

impl Entity {
    pub fn new(metadata: Arc<EntityMetadata>) -> Self {
        Self::with_key(EntityKey::new(), metadata)
    }

    pub fn with_key(key: EntityKey, metadata: Arc<EntityMetadata>) -> Self {
        Self {
            key,
            changes: ChangeSet::for_entity(metadata.type_name.clone()),
            metadata,
            state: EntityState::Unchanged,
            link: None,
            removed: Vec::new(),
        }
    }

    pub fn key(&self) -> EntityKey {
        self.key
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn type_name(&self) -> &str {
        &self.metadata.type_name
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn link(&self) -> Option<&RelationLink> {
        self.link.as_ref()
    }

    pub fn removed_associations(&self) -> &[RemovedAssociation] {
        &self.removed
    }

    pub fn property(&self, name: &str) -> Result<&PropertyMetadata> {
        self.metadata
            .property(name)
            .ok_or_else(|| DbError::not_found(self.type_name(), name))
    }

    /// Current value of a tracked property.
    pub fn value(&self, name: &str) -> Result<&ValueSlot> {
        self.changes.current_value(name)
    }

    /// Records a value read from the store. Does not change state.
    pub fn load_value(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        let slot = self.typed_slot(name, value)?;
        self.changes.initialize(name, slot);
        Ok(())
    }

    pub(crate) fn load_slot(&mut self, name: &str, slot: ValueSlot) -> Result<()> {
        self.load_value(name, slot.into_value())
    }

    /// Writes a property through the change set.
    ///
    /// Primary-key properties are only writable while `Attached`.
    pub fn set_value(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        let property = self.property(name)?;
        if property.primary_key && !self.state.allows_key_update() {
            return Err(DbError::PrimaryKeyUpdateViolation {
                entity: self.type_name().to_string(),
                property: name.to_string(),
                state: self.state.to_string(),
            });
        }
        if value.is_none() && !property.nullable {
            return Err(DbError::ConstraintViolation(format!(
                "Property '{}.{}' cannot be empty",
                self.type_name(),
                name
            )));
        }

        let slot = self.typed_slot(name, value)?;
        self.changes.modify(name, slot);
        self.state = self.state.on_modify();
        Ok(())
    }

    /// Marks a property dirty without changing its value.
    pub fn mark_modified(&mut self, name: &str) -> Result<()> {
        self.property(name)?;
        self.changes.mark_modified(name, true);
        self.state = self.state.on_modify();
        Ok(())
    }

    /// Marks every mapped property dirty.
    pub fn mark_all_modified(&mut self) {
        let names: Vec<String> = self
            .metadata
            .properties()
            .iter()
            .filter(|property| !property.primary_key)
            .map(|property| property.name.clone())
            .collect();
        for name in names {
            self.changes.mark_modified(&name, true);
        }
        self.state = self.state.on_modify();
    }

    pub fn attach(&mut self) {
        self.state = self.state.on_attach();
    }

    pub fn detach(&mut self) {
        self.state = self.state.on_detach();
    }

    pub fn reset_unchanged(&mut self) {
        self.state = self.state.on_reset();
    }

    /// Folds every pending value into its old slot after a successful save.
    pub fn accept_changes(&mut self) {
        self.changes.accept_all();
        self.removed.clear();
        self.reset_unchanged();
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_pending() || self.changes.has_modifications() || !self.removed.is_empty()
    }

    pub(crate) fn set_link(&mut self, link: Option<RelationLink>) {
        self.link = link;
    }

    pub(crate) fn record_removed(&mut self, property: &str, child: EntityKey) {
        let removed = RemovedAssociation {
            property: property.to_string(),
            child,
        };
        if !self.removed.contains(&removed) {
            self.removed.push(removed);
        }
    }

    fn typed_slot(&self, name: &str, value: Option<Value>) -> Result<ValueSlot> {
        let property = self.property(name)?;
        if let Some(value) = value.as_ref() {
            if !property.data_type.is_compatible(value) {
                return Err(DbError::TypeMismatch(format!(
                    "Property '{}.{}' expects {}, got {}",
                    self.type_name(),
                    name,
                    property.data_type,
                    value.type_name()
                )));
            }
        }
        Ok(ValueSlot::typed(value, property.data_type))
    }
}
