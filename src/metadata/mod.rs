//! Mapping metadata consumed by the tracking layer.
//!
//! Producing metadata (table/column discovery) belongs to the surrounding
//! mapping layer. This module only defines the shape the tracker reads: property
//! names, declared types, primary-key and nullability flags, and relation
//! annotations carrying the lazy loader name.

use crate::core::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    OneToMany,
    ManyToOne,
    OneToOne,
}

impl RelationKind {
    /// Collection-valued relations hold `Value::References`.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::OneToMany)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMetadata {
    pub kind: RelationKind,
    /// Type name of the related entity.
    pub target: String,
    /// Name of the loader registered for on-demand population.
    pub loader: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub name: String,
    pub field_name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub nullable: bool,
    pub relation: Option<RelationMetadata>,
}

impl PropertyMetadata {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            field_name: name.clone(),
            name,
            data_type,
            primary_key: false,
            nullable: false,
            relation: None,
        }
    }

    /// Builds a relation-valued property. The declared type follows the kind.
    pub fn relation(name: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Self {
        Self::new(name, DataType::Reference).related(kind, target)
    }

    /// Turns this property into a relation, replacing its declared type.
    pub fn related(mut self, kind: RelationKind, target: impl Into<String>) -> Self {
        self.data_type = if kind.is_collection() {
            DataType::ReferenceSet
        } else {
            DataType::Reference
        };
        self.nullable = true;
        self.relation = Some(RelationMetadata {
            kind,
            target: target.into(),
            loader: self.loader_name().map(str::to_string),
        });
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Sets the loader annotation. Has no effect on non-relation properties.
    pub fn loader(mut self, loader: impl Into<String>) -> Self {
        if let Some(relation) = self.relation.as_mut() {
            relation.loader = Some(loader.into());
        }
        self
    }

    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    pub fn is_collection(&self) -> bool {
        self.relation
            .as_ref()
            .map(|relation| relation.kind.is_collection())
            .unwrap_or(false)
    }

    pub fn loader_name(&self) -> Option<&str> {
        self.relation.as_ref().and_then(|relation| relation.loader.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub type_name: String,
    pub table_name: String,
    properties: Vec<PropertyMetadata>,
}

impl EntityMetadata {
    pub fn new(type_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table_name: table_name.into(),
            properties: Vec::new(),
        }
    }

    /// Adds a property, replacing any earlier one with the same name.
    pub fn with_property(mut self, property: PropertyMetadata) -> Self {
        self.properties.retain(|existing| existing.name != property.name);
        self.properties.push(property);
        self
    }

    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|property| property.name == name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter().filter(|property| property.primary_key)
    }

    pub fn relations(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter().filter(|property| property.is_relation())
    }
}

/// Source of metadata for mapped types.
pub trait MetadataProvider: Send + Sync {
    fn metadata(&self, type_name: &str) -> Option<Arc<EntityMetadata>>;
}

/// In-memory metadata source keyed by type name.
#[derive(Default)]
pub struct MetadataRegistry {
    entries: RwLock<HashMap<String, Arc<EntityMetadata>>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, metadata: EntityMetadata) -> crate::core::Result<Arc<EntityMetadata>> {
        let metadata = Arc::new(metadata);
        let mut entries = self.entries.write()?;
        entries.insert(metadata.type_name.clone(), metadata.clone());
        Ok(metadata)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataProvider for MetadataRegistry {
    fn metadata(&self, type_name: &str) -> Option<Arc<EntityMetadata>> {
        self.entries.read().ok()?.get(type_name).cloned()
    }
}
