use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Service location contract consumed by the instance registry and the
/// context pool's construction-path resolution.
pub trait ServiceProvider: Send + Sync {
    fn get_service(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;

    /// Child provider sharing this provider's registrations.
    fn create_scope(&self) -> Arc<dyn ServiceProvider>;

    fn dispose(&self) {}
}

impl dyn ServiceProvider {
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get_service(TypeId::of::<T>())?.downcast::<T>().ok()
    }
}

pub(crate) fn same_provider(a: &Arc<dyn ServiceProvider>, b: &Arc<dyn ServiceProvider>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Scope bookkeeping shared by a root container and all of its descendants.
#[derive(Debug, Default)]
pub struct ScopeCounters {
    created: AtomicUsize,
    disposed: AtomicUsize,
}

impl ScopeCounters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// In-memory type map implementing [`ServiceProvider`].
pub struct ServiceContainer {
    services: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    counters: Arc<ScopeCounters>,
    depth: usize,
    disposed: AtomicBool,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            counters: Arc::new(ScopeCounters::default()),
            depth: 0,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn with<T: Any + Send + Sync>(self, service: T) -> Self {
        self.register(Arc::new(service));
        self
    }

    pub fn register<T: Any + Send + Sync>(&self, service: Arc<T>) {
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        services.insert(TypeId::of::<T>(), service);
    }

    pub fn into_provider(self) -> Arc<dyn ServiceProvider> {
        Arc::new(self)
    }

    pub fn counters(&self) -> Arc<ScopeCounters> {
        self.counters.clone()
    }

    /// Zero for a root container, one for its scopes, and so on.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceProvider for ServiceContainer {
    fn get_service(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        if self.is_disposed() {
            return None;
        }
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        services.get(&type_id).cloned()
    }

    fn create_scope(&self) -> Arc<dyn ServiceProvider> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner).clone();
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        debug!(depth = self.depth + 1, services = services.len(), "created service scope");
        Arc::new(ServiceContainer {
            services: RwLock::new(services),
            counters: self.counters.clone(),
            depth: self.depth + 1,
            disposed: AtomicBool::new(false),
        })
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.depth > 0 {
            self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        }
        self.services.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeting(&'static str);

    #[test]
    fn test_typed_lookup() {
        let provider = ServiceContainer::new().with(Greeting("hello")).into_provider();

        let greeting = provider.get::<Greeting>().unwrap();
        assert_eq!(greeting.0, "hello");
        assert!(provider.get::<String>().is_none());
    }

    #[test]
    fn test_scope_copies_registrations_and_counts() {
        let root = ServiceContainer::new().with(Greeting("hi"));
        let counters = root.counters();
        let root = root.into_provider();

        let scope = root.create_scope();
        assert_eq!(counters.created(), 1);
        assert_eq!(scope.get::<Greeting>().unwrap().0, "hi");

        scope.dispose();
        scope.dispose();
        assert_eq!(counters.disposed(), 1);
        assert!(scope.get::<Greeting>().is_none());
        assert!(root.get::<Greeting>().is_some());
    }
}
