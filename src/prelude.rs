//! Commonly used types, for `use tracked_persist::prelude::*`.

pub use crate::core::{DataType, DbError, EntityKey, IsolationLevel, Result, TrackedValue, Value};
pub use crate::instance::{InstanceIdentification, InstanceRegistry, ServiceContainer, ServiceProvider};
pub use crate::lazy::{LazyResolver, Loader, LoaderRegistry};
pub use crate::metadata::{EntityMetadata, PropertyMetadata, RelationKind};
pub use crate::persist::{ChangeWriter, UnitOfWork};
pub use crate::pool::{ContextFactory, ContextOptions, ContextPool, Lease, PooledContext, Service};
pub use crate::tracked_entity;
pub use crate::tracking::{Entity, EntityGraph, EntityState, PendingChanges, SharedGraph, ValueSlot};
pub use crate::transaction::{
    DatabaseContext, DatabaseHandle, SharedHandle, TransactionScope, TransactionScopeOptions,
    share_handle,
};
