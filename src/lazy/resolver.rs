use super::{Loader, LoaderRegistry};
use crate::core::{DbError, EntityKey, Result};
use crate::metadata::PropertyMetadata;
use crate::tracking::{Entity, EntityGraph, SharedGraph, ValueSlot};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Completion hook for a background load.
pub type OnLoaded = Box<dyn FnOnce(Result<ValueSlot>) + Send + 'static>;

/// Populates relation properties on demand.
#[derive(Clone)]
pub struct LazyResolver {
    registry: Arc<LoaderRegistry>,
}

impl LazyResolver {
    pub fn new(registry: Arc<LoaderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<LoaderRegistry> {
        &self.registry
    }

    /// Runs the loader for `property` and returns its value.
    pub fn load(&self, entity: &Entity, property: &str) -> Result<ValueSlot> {
        let (metadata, loader) = self.resolve(entity, property)?;
        loader.get_value(entity, &metadata)
    }

    /// Loads and records the value on the tracked entity (load path, state unchanged).
    pub fn load_into(&self, graph: &mut EntityGraph, key: EntityKey, property: &str) -> Result<ValueSlot> {
        let slot = self.load(graph.entity(key)?, property)?;
        graph.load_slot(key, property, slot.clone())?;
        Ok(slot)
    }

    /// Runs the loader on a blocking worker of the current tokio runtime.
    ///
    /// Loader resolution happens on the caller's thread, so a missing loader
    /// fails immediately. On completion `on_loaded` receives the result; without
    /// a hook the value goes through [`EntityGraph::set_value`], so the entity is
    /// marked modified and its parent is notified. Use [`load_into`](Self::load_into)
    /// to populate without dirtying. Overlapping loads of the same
    /// `(key, property)` are not deduplicated and race on the final write.
    pub fn async_load(
        &self,
        graph: &SharedGraph,
        key: EntityKey,
        property: &str,
        on_loaded: Option<OnLoaded>,
    ) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| {
            DbError::ExecutionError("background lazy load requires a tokio runtime".to_string())
        })?;

        let (metadata, loader) = {
            let guard = graph.lock()?;
            self.resolve(guard.entity(key)?, property)?
        };

        debug!(entity = %key, property = %metadata.name, "dispatching background lazy load");
        let graph = graph.clone();
        runtime.spawn_blocking(move || {
            let snapshot = match graph.lock() {
                Ok(guard) => guard.entity(key).cloned(),
                Err(err) => Err(err.into()),
            };
            let result = snapshot.and_then(|entity| loader.get_value(&entity, &metadata));

            match (on_loaded, result) {
                (Some(on_loaded), result) => on_loaded(result),
                (None, Ok(slot)) => {
                    let written = graph
                        .lock()
                        .map_err(DbError::from)
                        .and_then(|mut guard| guard.set_value(key, &metadata.name, slot.into_value()));
                    if let Err(err) = written {
                        warn!(entity = %key, property = %metadata.name, error = %err, "lazy load write-back failed");
                    }
                }
                (None, Err(err)) => {
                    warn!(entity = %key, property = %metadata.name, error = %err, "background lazy load failed");
                }
            }
        });

        Ok(())
    }

    fn resolve(&self, entity: &Entity, property: &str) -> Result<(PropertyMetadata, Arc<dyn Loader>)> {
        let metadata = entity.property(property)?.clone();
        let loader = self
            .registry
            .resolve(&metadata)
            .ok_or_else(|| DbError::LazyLoadUnavailable {
                entity: entity.type_name().to_string(),
                key: entity.key().to_string(),
                property: property.to_string(),
            })?;
        Ok((metadata, loader))
    }
}
