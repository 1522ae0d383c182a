// ============================================================================
// Tracked Persistence Core
// ============================================================================
//
// Change tracking, ambient transaction scopes, instance deduplication and
// context pooling for an object/relational mapping layer. SQL generation and
// drivers live outside; this crate only decides what changed and which
// database handle, inside which transaction, it goes to.
//
// ============================================================================

pub mod core;
pub mod instance;
pub mod lazy;
pub mod metadata;
pub mod persist;
pub mod pool;
pub mod prelude;
pub mod tracking;
pub mod transaction;

#[doc(hidden)]
pub use paste;

pub use core::{DataType, DbError, EntityKey, IsolationLevel, Result, TrackedValue, Value};
pub use instance::{InstanceIdentification, InstanceRegistry, ServiceContainer, ServiceProvider};
pub use lazy::{LazyResolver, Loader, LoaderRegistry};
pub use metadata::{EntityMetadata, MetadataProvider, MetadataRegistry, PropertyMetadata, RelationKind};
pub use persist::{ChangeWriter, UnitOfWork};
pub use pool::{ContextFactory, ContextOptions, ContextPool, Lease, PoolStats, PooledContext, Service};
pub use tracking::{ChangeEntry, ChangeSet, Entity, EntityGraph, EntityState, PendingChanges, ValueSlot};
pub use transaction::{
    DatabaseContext, DatabaseHandle, SharedHandle, TransactionScope, TransactionScopeOptions,
    share_handle,
};
