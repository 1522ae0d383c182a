// ============================================================================
// Context Pooling Module
// ============================================================================
//
// Bounded recycling of heavyweight contexts:
//
// - config:  ContextOptions (provider, connection info, pool bound)
// - factory: constructors registered per pooled type
// - context_pool: the ContextPool and its statistics
// - lease:   RAII handle over one rented context
//
// ============================================================================

pub mod config;
pub mod factory;
pub mod lease;
pub mod context_pool;

pub use config::{ContextOptions, DEFAULT_POOL_MAX_SIZE};
pub use factory::{ConstructionContext, ConstructorArgs, ContextFactory, ResolveParam, Service};
pub use lease::Lease;
pub use context_pool::{ContextPool, PoolStats, PooledContext};
