use crate::core::EntityKey;
use serde::{Deserialize, Serialize};

/// Entity lifecycle state.
///
/// ```text
/// Unchanged ──modify──> Modified
/// Unchanged/Modified ──attach──> Attached
/// any ──detach──> Detached
/// Attached/Modified ──reset_unchanged──> Unchanged
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityState {
    #[default]
    Unchanged,
    Attached,
    Detached,
    Modified,
}

impl EntityState {
    /// Primary keys are writable only on newly attached entities.
    pub fn allows_key_update(&self) -> bool {
        matches!(self, Self::Attached)
    }

    pub fn on_modify(self) -> Self {
        match self {
            Self::Unchanged => Self::Modified,
            other => other,
        }
    }

    pub fn on_attach(self) -> Self {
        Self::Attached
    }

    pub fn on_detach(self) -> Self {
        Self::Detached
    }

    pub fn on_reset(self) -> Self {
        match self {
            Self::Attached | Self::Modified => Self::Unchanged,
            other => other,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityState::Unchanged => write!(f, "UNCHANGED"),
            EntityState::Attached => write!(f, "ATTACHED"),
            EntityState::Detached => write!(f, "DETACHED"),
            EntityState::Modified => write!(f, "MODIFIED"),
        }
    }
}

/// Non-owning back-reference from a child to the parent property holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationLink {
    pub parent: EntityKey,
    pub property: String,
}

impl RelationLink {
    pub fn new(parent: EntityKey, property: impl Into<String>) -> Self {
        Self {
            parent,
            property: property.into(),
        }
    }

    pub fn points_to(&self, parent: EntityKey, property: &str) -> bool {
        self.parent == parent && self.property == property
    }
}

/// An association the persistence layer must delete on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedAssociation {
    pub property: String,
    pub child: EntityKey,
}
