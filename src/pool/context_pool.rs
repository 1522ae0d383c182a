use super::config::ContextOptions;
use super::factory::{ConstructionContext, ContextFactory};
use super::lease::Lease;
use crate::core::Result;
use crate::instance::ServiceProvider;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// A heavyweight context the pool can recycle.
pub trait PooledContext: Send + 'static {
    /// Clears per-rental state before the context goes back to the pool.
    fn reset_state(&mut self) {}

    /// Called before a context the pool will not keep is disposed.
    fn detach_from_pool(&mut self) {}

    fn dispose(&mut self);
}

pub(crate) struct PoolInner<C> {
    options: ContextOptions,
    services: Arc<dyn ServiceProvider>,
    factory: ContextFactory<C>,
    idle: Mutex<VecDeque<C>>,
    created: AtomicUsize,
    leased: AtomicUsize,
    disposed: AtomicUsize,
    closed: AtomicBool,
}

impl<C: PooledContext> PoolInner<C> {
    /// Takes a context back from a lease: recycled while there is idle
    /// capacity, disposed permanently otherwise.
    pub(crate) fn give_back(&self, mut context: C) {
        self.leased.fetch_sub(1, Ordering::SeqCst);
        context.reset_state();

        let rejected = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.closed.load(Ordering::SeqCst) && idle.len() < self.options.pool_max_size {
                idle.push_back(context);
                None
            } else {
                Some(context)
            }
        };

        match rejected {
            None => debug!(provider = %self.options.provider, "recycled pooled context"),
            Some(mut context) => {
                context.detach_from_pool();
                context.dispose();
                self.disposed.fetch_add(1, Ordering::SeqCst);
                debug!(provider = %self.options.provider, "disposed pooled context over capacity");
            }
        }
    }
}

/// Bounded pool of contexts built by a [`ContextFactory`].
///
/// Renting never blocks: with no idle context a new one is constructed.
/// `pool_max_size` bounds how many returned contexts are kept for reuse.
pub struct ContextPool<C: PooledContext> {
    inner: Arc<PoolInner<C>>,
}

impl<C: PooledContext> Clone for ContextPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: PooledContext> ContextPool<C> {
    pub fn new(
        options: ContextOptions,
        services: Arc<dyn ServiceProvider>,
        factory: ContextFactory<C>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                options,
                services,
                factory,
                idle: Mutex::new(VecDeque::new()),
                created: AtomicUsize::new(0),
                leased: AtomicUsize::new(0),
                disposed: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn options(&self) -> &ContextOptions {
        &self.inner.options
    }

    pub fn services(&self) -> &Arc<dyn ServiceProvider> {
        &self.inner.services
    }

    /// Rents a context, reusing an idle one when available.
    ///
    /// Construction failures are returned as-is; a
    /// [`ConstructionUnsatisfiable`](crate::core::DbError::ConstructionUnsatisfiable)
    /// error will not go away on retry.
    pub fn rent(&self) -> Result<Lease<C>> {
        let recycled = self.inner.idle.lock()?.pop_front();

        let context = match recycled {
            Some(context) => context,
            None => {
                let cx = ConstructionContext {
                    services: &self.inner.services,
                    options: &self.inner.options,
                };
                let context = self.inner.factory.create(&cx)?;
                self.inner.created.fetch_add(1, Ordering::SeqCst);
                context
            }
        };

        self.inner.leased.fetch_add(1, Ordering::SeqCst);
        Ok(Lease::new(context, Arc::clone(&self.inner)))
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.inner.idle.lock().unwrap_or_else(PoisonError::into_inner).len();
        PoolStats {
            created: self.inner.created.load(Ordering::SeqCst),
            idle,
            leased: self.inner.leased.load(Ordering::SeqCst),
            disposed: self.inner.disposed.load(Ordering::SeqCst),
            max_size: self.inner.options.pool_max_size,
        }
    }

    /// Disposes every idle context. Contexts still on lease are disposed when
    /// their lease ends.
    pub fn dispose(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let drained: Vec<C> = {
            let mut idle = self.inner.idle.lock().unwrap_or_else(PoisonError::into_inner);
            idle.drain(..).collect()
        };
        for mut context in drained {
            context.detach_from_pool();
            context.dispose();
            self.inner.disposed.fetch_add(1, Ordering::SeqCst);
        }
        debug!(provider = %self.inner.options.provider, "disposed context pool");
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub created: usize,
    pub idle: usize,
    pub leased: usize,
    pub disposed: usize,
    pub max_size: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {} leased, {}/{} idle, {} created, {} disposed",
            self.leased, self.idle, self.max_size, self.created, self.disposed
        )
    }
}
