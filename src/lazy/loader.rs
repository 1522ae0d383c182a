use crate::core::Result;
use crate::metadata::PropertyMetadata;
use crate::tracking::{Entity, ValueSlot};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Produces the value of a relation property on demand.
///
/// Return an empty slot when there is no data; never fail for "nothing found".
pub trait Loader: Send + Sync {
    fn get_value(&self, entity: &Entity, property: &PropertyMetadata) -> Result<ValueSlot>;
}

impl<F> Loader for F
where
    F: Fn(&Entity, &PropertyMetadata) -> Result<ValueSlot> + Send + Sync,
{
    fn get_value(&self, entity: &Entity, property: &PropertyMetadata) -> Result<ValueSlot> {
        self(entity, property)
    }
}

/// Loaders keyed by the name carried in a relation's loader annotation.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: RwLock<HashMap<String, Arc<dyn Loader>>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, loader: impl Loader + 'static) -> Result<()> {
        let mut loaders = self.loaders.write()?;
        loaders.insert(name.into(), Arc::new(loader));
        Ok(())
    }

    /// Zero or one loader for `property`.
    pub fn resolve(&self, property: &PropertyMetadata) -> Option<Arc<dyn Loader>> {
        let name = property.loader_name()?;
        self.loaders.read().ok()?.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaders
            .read()
            .map(|loaders| loaders.contains_key(name))
            .unwrap_or(false)
    }
}
