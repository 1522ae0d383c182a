use super::services::{ServiceProvider, same_provider};
use crate::core::Result;
use lazy_static::lazy_static;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Identifies one database configuration: provider, connection information
/// and the service provider contexts for it are resolved from.
#[derive(Clone)]
pub struct InstanceIdentification {
    provider: String,
    connection_info: String,
    services: Arc<dyn ServiceProvider>,
    service_scope: Option<Arc<dyn ServiceProvider>>,
}

impl InstanceIdentification {
    pub fn new(
        provider: impl Into<String>,
        connection_info: impl Into<String>,
        services: Arc<dyn ServiceProvider>,
    ) -> Self {
        Self {
            provider: provider.into(),
            connection_info: connection_info.into(),
            services,
            service_scope: None,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn connection_info(&self) -> &str {
        &self.connection_info
    }

    pub fn services(&self) -> &Arc<dyn ServiceProvider> {
        &self.services
    }

    /// Child scope created when the identification was registered.
    pub fn service_scope(&self) -> Option<&Arc<dyn ServiceProvider>> {
        self.service_scope.as_ref()
    }
}

/// Structural equality. The service scope is excluded; the service provider
/// is compared by identity.
impl PartialEq for InstanceIdentification {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider
            && self.connection_info == other.connection_info
            && same_provider(&self.services, &other.services)
    }
}

impl std::fmt::Debug for InstanceIdentification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceIdentification")
            .field("provider", &self.provider)
            .field("connection_info", &self.connection_info)
            .field("scoped", &self.service_scope.is_some())
            .finish()
    }
}

struct RegisteredInstance {
    name: String,
    identification: InstanceIdentification,
}

/// Deduplicates equivalent instance identifications under opaque names.
pub struct InstanceRegistry {
    entries: Mutex<Vec<RegisteredInstance>>,
}

lazy_static! {
    static ref GLOBAL_INSTANCE_REGISTRY: InstanceRegistry = InstanceRegistry::new();
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Process-wide registry.
    ///
    /// Statics are never dropped, so [`dispose`](Self::dispose) must be called
    /// explicitly at shutdown to release the registered service scopes.
    pub fn global() -> &'static InstanceRegistry {
        &GLOBAL_INSTANCE_REGISTRY
    }

    /// Returns the name under which `identification` is registered,
    /// registering it first when no structurally equal entry exists.
    ///
    /// The whole check-then-insert runs under one lock, so concurrent calls
    /// with equal identifications agree on a single name and only one service
    /// scope is ever created for it.
    pub fn try_add(&self, identification: InstanceIdentification) -> Result<String> {
        let mut entries = self.entries.lock()?;

        if let Some(existing) = entries
            .iter()
            .find(|entry| entry.identification == identification)
        {
            debug!(name = %existing.name, provider = %identification.provider, "instance already registered");
            return Ok(existing.name.clone());
        }

        let name = Uuid::new_v4().simple().to_string();
        entries.push(RegisteredInstance {
            name: name.clone(),
            identification,
        });

        if let Some(entry) = entries.last_mut() {
            let scope = entry.identification.services.create_scope();
            entry.identification.service_scope = Some(scope);
            debug!(name = %name, provider = %entry.identification.provider, "registered instance");
        }
        Ok(name)
    }

    pub fn try_get(&self, name: &str) -> Option<InstanceIdentification> {
        if name.is_empty() {
            return None;
        }
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.identification.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disposes every registered service scope and forgets all entries.
    /// Returns the number of scopes disposed.
    pub fn dispose(&self) -> usize {
        let drained: Vec<RegisteredInstance> = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.drain(..).collect()
        };

        let mut disposed = 0;
        for entry in drained {
            if let Some(scope) = entry.identification.service_scope {
                scope.dispose();
                disposed += 1;
            }
        }
        if disposed > 0 {
            debug!(disposed, "disposed instance registry");
        }
        disposed
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InstanceRegistry {
    fn drop(&mut self) {
        self.dispose();
    }
}
