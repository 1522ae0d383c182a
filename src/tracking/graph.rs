use super::{Entity, EntityState, RelationLink, ValueSlot};
use super::report::{EntityChanges, PendingChanges, PropertyChange};
use crate::core::{DbError, EntityKey, Result, Value};
use crate::metadata::EntityMetadata;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Graph shared with the background lazy-load worker.
pub type SharedGraph = Arc<Mutex<EntityGraph>>;

/// Arena of tracked entities.
///
/// Relations are stored as [`EntityKey`]s and back-references as
/// [`RelationLink`]s, so cycles in the object graph never form ownership cycles.
/// Modification notifications travel at most one hop: from a child to the
/// parent property that holds it.
#[derive(Debug, Default)]
pub struct EntityGraph {
    entities: HashMap<EntityKey, Entity>,
    order: Vec<EntityKey>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.entities.contains_key(&key)
    }

    pub fn insert(&mut self, entity: Entity) -> EntityKey {
        let key = entity.key();
        if self.entities.insert(key, entity).is_none() {
            self.order.push(key);
        }
        key
    }

    /// Tracks a new, empty entity in the `Unchanged` state (a loaded row).
    pub fn track(&mut self, metadata: Arc<EntityMetadata>) -> EntityKey {
        self.insert(Entity::new(metadata))
    }

    /// Tracks a new entity in the `Attached` state (pending insert).
    pub fn add(&mut self, metadata: Arc<EntityMetadata>) -> EntityKey {
        let mut entity = Entity::new(metadata);
        entity.attach();
        self.insert(entity)
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(&key)
    }

    pub fn entity(&self, key: EntityKey) -> Result<&Entity> {
        self.entities
            .get(&key)
            .ok_or_else(|| DbError::ExecutionError(format!("Entity {} is not tracked", key)))
    }

    pub fn entity_mut(&mut self, key: EntityKey) -> Result<&mut Entity> {
        self.entities
            .get_mut(&key)
            .ok_or_else(|| DbError::ExecutionError(format!("Entity {} is not tracked", key)))
    }

    pub fn remove(&mut self, key: EntityKey) -> Option<Entity> {
        let removed = self.entities.remove(&key)?;
        self.order.retain(|existing| *existing != key);
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|key| self.entities.get(key))
    }

    pub fn parent_of(&self, key: EntityKey) -> Option<&RelationLink> {
        self.entities.get(&key).and_then(Entity::link)
    }

    pub fn load_value(&mut self, key: EntityKey, name: &str, value: Option<Value>) -> Result<()> {
        self.entity_mut(key)?.load_value(name, value)
    }

    pub(crate) fn load_slot(&mut self, key: EntityKey, name: &str, slot: ValueSlot) -> Result<()> {
        self.entity_mut(key)?.load_slot(name, slot)
    }

    /// Writes a property and notifies the owning parent.
    ///
    /// Emptying a reference whose target is `Detached` deletes the association
    /// instead of just clearing the foreign key.
    pub fn set_value(&mut self, key: EntityKey, name: &str, value: Option<Value>) -> Result<()> {
        let entity = self.entity(key)?;
        let property = entity.property(name)?;

        let released = if property.is_relation() && !property.is_collection() {
            let previous = entity.changes().current_value(name).ok().and_then(|slot| {
                slot.value().and_then(Value::as_reference)
            });
            let next = value.as_ref().and_then(Value::as_reference);
            previous.filter(|previous| Some(*previous) != next)
        } else {
            None
        };

        // A rejected write leaves links and removed associations untouched.
        self.entity_mut(key)?.set_value(name, value)?;
        if let Some(previous) = released {
            self.release_child(key, name, previous, false);
        }
        self.forward_to_parent(key)
    }

    /// Marks `name` dirty on `key` and forwards one hop to the parent.
    pub fn notify_modified(&mut self, key: EntityKey, name: &str) -> Result<()> {
        self.entity_mut(key)?.mark_modified(name)?;
        self.forward_to_parent(key)
    }

    /// Points a single-valued relation at `child`, linking the child back.
    pub fn set_reference(&mut self, parent: EntityKey, name: &str, child: Option<EntityKey>) -> Result<()> {
        self.expect_relation(parent, name, false)?;
        let Some(child) = child else {
            return self.set_value(parent, name, None);
        };

        self.entity(child)?;
        self.set_value(parent, name, Some(Value::Reference(child)))?;
        self.link_child(parent, name, child)
    }

    /// Appends `child` to a collection relation, linking the child back.
    pub fn add_to_collection(&mut self, parent: EntityKey, name: &str, child: EntityKey) -> Result<()> {
        self.expect_relation(parent, name, true)?;
        self.entity(child)?;

        let mut members = self.collection_members(parent, name)?;
        if !members.contains(&child) {
            members.push(child);
            self.set_value(parent, name, Some(Value::References(members)))?;
        }
        self.link_child(parent, name, child)
    }

    /// Removes `child` from a collection relation; the child becomes `Detached`.
    pub fn remove_from_collection(&mut self, parent: EntityKey, name: &str, child: EntityKey) -> Result<()> {
        self.expect_relation(parent, name, true)?;
        let mut members = self.collection_members(parent, name)?;
        let before = members.len();
        members.retain(|member| *member != child);
        if members.len() == before {
            return Ok(());
        }

        self.set_value(parent, name, Some(Value::References(members)))?;
        self.release_child(parent, name, child, true);
        Ok(())
    }

    /// Clears a collection relation as one change: every member is treated as
    /// removed and detached, rather than mutated one by one.
    pub fn clear_collection(&mut self, parent: EntityKey, name: &str) -> Result<()> {
        self.expect_relation(parent, name, true)?;
        let members = self.collection_members(parent, name)?;

        self.set_value(parent, name, Some(Value::References(Vec::new())))?;
        for child in members {
            self.release_child(parent, name, child, true);
        }
        Ok(())
    }

    pub fn attach(&mut self, key: EntityKey) -> Result<()> {
        self.entity_mut(key)?.attach();
        Ok(())
    }

    pub fn detach(&mut self, key: EntityKey) -> Result<()> {
        self.entity_mut(key)?.detach();
        Ok(())
    }

    /// Snapshot of everything a save has to write.
    pub fn pending_changes(&self) -> PendingChanges {
        let entities = self
            .iter()
            .filter(|entity| entity.is_dirty())
            .map(|entity| {
                let changes = entity.changes();
                let properties = changes
                    .modified_names()
                    .filter_map(|name| {
                        let entry = changes.get(name).ok()?;
                        Some(PropertyChange {
                            name: name.to_string(),
                            old: entry.old_value().clone(),
                            new: entry.current_value().clone(),
                        })
                    })
                    .collect();

                EntityChanges {
                    key: entity.key(),
                    type_name: entity.type_name().to_string(),
                    table_name: entity.metadata().table_name.clone(),
                    state: entity.state(),
                    properties,
                    removed_associations: entity.removed_associations().to_vec(),
                }
            })
            .collect();

        PendingChanges::new(entities)
    }

    /// Accepts all pending changes after a successful save. Detached entities
    /// are dropped from the graph.
    pub fn accept_all(&mut self) {
        let detached: Vec<EntityKey> = self
            .iter()
            .filter(|entity| entity.state() == EntityState::Detached)
            .map(Entity::key)
            .collect();
        for key in detached {
            self.remove(key);
        }

        for entity in self.entities.values_mut() {
            entity.accept_changes();
        }
    }

    fn forward_to_parent(&mut self, key: EntityKey) -> Result<()> {
        let Some(link) = self.parent_of(key).cloned() else {
            return Ok(());
        };
        // A dangling link means the parent left the graph.
        let Some(parent) = self.entities.get_mut(&link.parent) else {
            return Ok(());
        };
        debug!(child = %key, parent = %link.parent, property = %link.property, "propagating modification");
        parent.mark_modified(&link.property)
    }

    fn link_child(&mut self, parent: EntityKey, name: &str, child: EntityKey) -> Result<()> {
        let child = self.entity_mut(child)?;
        child.set_link(Some(RelationLink::new(parent, name)));
        Ok(())
    }

    /// Drops the back-reference from `child` and records a removed association
    /// when the child is (or becomes) detached.
    fn release_child(&mut self, parent: EntityKey, name: &str, child: EntityKey, detach: bool) {
        let mut deleted = false;
        if let Some(child_entity) = self.entities.get_mut(&child) {
            if child_entity.link().is_some_and(|link| link.points_to(parent, name)) {
                child_entity.set_link(None);
            }
            if detach {
                child_entity.detach();
            }
            deleted = child_entity.state() == EntityState::Detached;
        }
        if deleted {
            if let Some(parent_entity) = self.entities.get_mut(&parent) {
                parent_entity.record_removed(name, child);
            }
        }
    }

    fn expect_relation(&self, key: EntityKey, name: &str, collection: bool) -> Result<()> {
        let entity = self.entity(key)?;
        let property = entity.property(name)?;
        if !property.is_relation() || property.is_collection() != collection {
            let expected = if collection { "collection relation" } else { "reference relation" };
            return Err(DbError::TypeMismatch(format!(
                "Property '{}.{}' is not a {}",
                entity.type_name(),
                name,
                expected
            )));
        }
        Ok(())
    }

    fn collection_members(&self, key: EntityKey, name: &str) -> Result<Vec<EntityKey>> {
        let entity = self.entity(key)?;
        if !entity.changes().has(name) {
            return Ok(Vec::new());
        }
        Ok(entity
            .value(name)?
            .value()
            .and_then(Value::as_references)
            .map(<[EntityKey]>::to_vec)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::metadata::{PropertyMetadata, RelationKind};

    fn node() -> Arc<EntityMetadata> {
        Arc::new(
            EntityMetadata::new("Node", "nodes")
                .with_property(PropertyMetadata::new("label", DataType::Text))
                .with_property(PropertyMetadata::relation("children", RelationKind::OneToMany, "Node"))
                .with_property(PropertyMetadata::relation("peer", RelationKind::OneToOne, "Node")),
        )
    }

    fn loaded(graph: &mut EntityGraph, label: &str) -> EntityKey {
        let key = graph.track(node());
        graph.load_value(key, "label", Some(Value::from(label))).unwrap();
        key
    }

    #[test]
    fn test_child_modification_marks_parent_relation_only() {
        let mut graph = EntityGraph::new();
        let grandparent = loaded(&mut graph, "g");
        let parent = loaded(&mut graph, "p");
        let child = loaded(&mut graph, "c");
        graph.add_to_collection(grandparent, "children", parent).unwrap();
        graph.add_to_collection(parent, "children", child).unwrap();
        graph.accept_all();

        graph.set_value(child, "label", Some(Value::from("c2"))).unwrap();

        assert_eq!(graph.entity(child).unwrap().state(), EntityState::Modified);
        let parent_entity = graph.entity(parent).unwrap();
        assert_eq!(parent_entity.state(), EntityState::Modified);
        assert!(parent_entity.changes().is_modified("children"));
        assert!(!parent_entity.changes().is_modified("label"));

        let grandparent_entity = graph.entity(grandparent).unwrap();
        assert_eq!(grandparent_entity.state(), EntityState::Unchanged);
        assert!(!grandparent_entity.changes().is_modified("children"));
    }

    #[test]
    fn test_cyclic_links_do_not_recurse() {
        let mut graph = EntityGraph::new();
        let a = loaded(&mut graph, "a");
        let b = loaded(&mut graph, "b");
        graph.set_reference(a, "peer", Some(b)).unwrap();
        graph.set_reference(b, "peer", Some(a)).unwrap();
        graph.accept_all();

        graph.set_value(a, "label", Some(Value::from("a2"))).unwrap();
        assert!(graph.entity(b).unwrap().changes().is_modified("peer"));
        assert!(!graph.entity(a).unwrap().changes().is_modified("peer"));
    }

    #[test]
    fn test_relinking_replaces_owner() {
        let mut graph = EntityGraph::new();
        let first = loaded(&mut graph, "first");
        let second = loaded(&mut graph, "second");
        let child = loaded(&mut graph, "child");

        graph.add_to_collection(first, "children", child).unwrap();
        graph.add_to_collection(second, "children", child).unwrap();
        assert_eq!(graph.parent_of(child), Some(&RelationLink::new(second, "children")));
    }

    #[test]
    fn test_emptying_detached_reference_deletes_association() {
        let mut graph = EntityGraph::new();
        let owner = loaded(&mut graph, "owner");
        let target = loaded(&mut graph, "target");
        graph.set_reference(owner, "peer", Some(target)).unwrap();
        graph.accept_all();

        graph.detach(target).unwrap();
        graph.set_reference(owner, "peer", None).unwrap();

        let owner_entity = graph.entity(owner).unwrap();
        assert!(owner_entity.value("peer").unwrap().is_empty());
        assert_eq!(owner_entity.removed_associations().len(), 1);
        assert_eq!(owner_entity.removed_associations()[0].child, target);
        assert!(graph.parent_of(target).is_none());
    }

    #[test]
    fn test_rejected_reference_write_keeps_link() {
        let mut graph = EntityGraph::new();
        let owner = loaded(&mut graph, "owner");
        let target = loaded(&mut graph, "target");
        graph.set_reference(owner, "peer", Some(target)).unwrap();
        graph.accept_all();
        graph.detach(target).unwrap();

        assert!(matches!(
            graph.set_value(owner, "peer", Some(Value::Integer(1))),
            Err(DbError::TypeMismatch(_))
        ));

        let owner_entity = graph.entity(owner).unwrap();
        assert_eq!(
            owner_entity.value("peer").unwrap().value(),
            Some(&Value::Reference(target))
        );
        assert!(owner_entity.removed_associations().is_empty());
        assert_eq!(graph.parent_of(target), Some(&RelationLink::new(owner, "peer")));
    }

    #[test]
    fn test_emptying_live_reference_keeps_child() {
        let mut graph = EntityGraph::new();
        let owner = loaded(&mut graph, "owner");
        let target = loaded(&mut graph, "target");
        graph.set_reference(owner, "peer", Some(target)).unwrap();
        graph.accept_all();

        graph.set_reference(owner, "peer", None).unwrap();
        assert!(graph.entity(owner).unwrap().removed_associations().is_empty());
        assert_eq!(graph.entity(target).unwrap().state(), EntityState::Unchanged);
        assert!(graph.parent_of(target).is_none());
    }

    #[test]
    fn test_clear_collection_removes_all_members() {
        let mut graph = EntityGraph::new();
        let parent = loaded(&mut graph, "p");
        let kids: Vec<_> = (0..3).map(|i| loaded(&mut graph, &format!("k{i}"))).collect();
        for kid in &kids {
            graph.add_to_collection(parent, "children", *kid).unwrap();
        }
        graph.accept_all();

        graph.clear_collection(parent, "children").unwrap();

        let parent_entity = graph.entity(parent).unwrap();
        assert_eq!(parent_entity.removed_associations().len(), 3);
        assert_eq!(parent_entity.changes().modified_names().collect::<Vec<_>>(), vec!["children"]);
        for kid in &kids {
            assert_eq!(graph.entity(*kid).unwrap().state(), EntityState::Detached);
        }

        graph.accept_all();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_collection_api_rejects_reference_property() {
        let mut graph = EntityGraph::new();
        let a = loaded(&mut graph, "a");
        let b = loaded(&mut graph, "b");
        assert!(matches!(
            graph.add_to_collection(a, "peer", b),
            Err(DbError::TypeMismatch(_))
        ));
    }
}
