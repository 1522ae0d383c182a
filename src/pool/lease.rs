use super::context_pool::{PoolInner, PooledContext};
use std::sync::Arc;

/// RAII guard for one rented context.
///
/// Ending the lease (explicitly or on drop) hands the context back to the
/// pool, which recycles it or disposes it when the pool is full. Afterwards
/// [`context`](Self::context) returns `None`.
pub struct Lease<C: PooledContext> {
    context: Option<C>,
    pool: Arc<PoolInner<C>>,
}

impl<C: PooledContext> Lease<C> {
    pub(crate) fn new(context: C, pool: Arc<PoolInner<C>>) -> Self {
        Self {
            context: Some(context),
            pool,
        }
    }

    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut C> {
        self.context.as_mut()
    }

    pub fn is_active(&self) -> bool {
        self.context.is_some()
    }

    /// Ends the lease. Calling it again does nothing.
    pub fn dispose(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.give_back(context);
        }
    }
}

impl<C: PooledContext> Drop for Lease<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}
