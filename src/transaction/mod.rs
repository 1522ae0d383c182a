// ============================================================================
// Transaction Scope Module
// ============================================================================
//
// Ambient, call-context-local transaction scopes over pluggable database
// handles.
//
// - handle:  the DatabaseHandle seam and its shared form
// - options: isolation level and timeout applied on enlistment
// - ambient: thread-local scope chain and database contexts
// - scope:   the RAII TransactionScope
//
// ============================================================================

pub mod ambient;
pub mod handle;
pub mod options;
pub mod scope;

pub use ambient::{
    AcquiredDatabase, DEFAULT_INSTANCE, DatabaseContext, acquire_database, current_database,
    in_transaction_scope, scope_depth, scoped_database,
};
pub use handle::{DatabaseHandle, SharedHandle, share_handle};
pub use options::TransactionScopeOptions;
pub use scope::{ScopePhase, TransactionScope};
