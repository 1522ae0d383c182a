// ============================================================================
// Change Tracking Module
// ============================================================================
//
// Tracks the in-memory state of mapped entities:
// - ValueSlot / ChangeEntry: dual-slot (old/new) record per property
// - ChangeSet: property name -> ChangeEntry, with modified-name enumeration
// - EntityState: Unchanged / Attached / Detached / Modified lifecycle
// - EntityGraph: arena owning entities; relations and back-links are keys
//
// ============================================================================

pub mod change_set;
pub mod entity;
pub mod entry;
pub mod graph;
pub mod report;
pub mod slot;
pub mod state;

pub use change_set::ChangeSet;
pub use entity::Entity;
pub use entry::ChangeEntry;
pub use graph::{EntityGraph, SharedGraph};
pub use report::{EntityChanges, PendingChanges, PropertyChange};
pub use slot::ValueSlot;
pub use state::{EntityState, RelationLink, RemovedAssociation};
