// ============================================================================
// Ambient Transaction Scope
// ============================================================================
//
// A scope aggregates one database handle per instance name and commits or
// rolls back all of them when it ends. Scopes nest strictly (LIFO) per thread:
//
//   Open ──complete──> Completing ──> Completed
//     │
//     └──dispose/drop──> RollingBack ──> RolledBack
//
// Terminal states are sticky; further complete/dispose calls are no-ops.
//
// ============================================================================

use super::ambient::{self, DEFAULT_INSTANCE};
use super::handle::{DatabaseHandle, SharedHandle, same_handle};
use super::options::TransactionScopeOptions;
use crate::core::{DbError, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{MutexGuard, PoisonError};
use tracing::{debug, warn};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePhase {
    Open,
    Completing,
    Completed,
    RollingBack,
    RolledBack,
}

impl ScopePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::RolledBack)
    }
}

impl std::fmt::Display for ScopePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopePhase::Open => write!(f, "OPEN"),
            ScopePhase::Completing => write!(f, "COMPLETING"),
            ScopePhase::Completed => write!(f, "COMPLETED"),
            ScopePhase::RollingBack => write!(f, "ROLLING BACK"),
            ScopePhase::RolledBack => write!(f, "ROLLED BACK"),
        }
    }
}

struct Enlisted {
    instance: String,
    handle: SharedHandle,
    /// Adopted handles belong to an enclosing database context and are not
    /// disposed by the scope.
    owned: bool,
}

pub(crate) struct ScopeState {
    id: u64,
    options: TransactionScopeOptions,
    databases: RefCell<Vec<Enlisted>>,
    phase: Cell<ScopePhase>,
    disposed: Cell<bool>,
}

fn lock<'a>(handle: &'a SharedHandle) -> MutexGuard<'a, dyn DatabaseHandle + 'static> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScopeState {
    fn new(options: TransactionScopeOptions) -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::SeqCst),
            options,
            databases: RefCell::new(Vec::new()),
            phase: Cell::new(ScopePhase::Open),
            disposed: Cell::new(false),
        }
    }

    pub(crate) fn get(&self, instance: &str) -> Option<SharedHandle> {
        self.databases
            .borrow()
            .iter()
            .find(|enlisted| enlisted.instance == instance)
            .map(|enlisted| enlisted.handle.clone())
    }

    /// Registers `handle` for `instance`, beginning a transaction on it.
    ///
    /// First writer wins: when `instance` is already registered the existing
    /// handle is returned and `handle` is left untouched.
    pub(crate) fn enlist(&self, instance: &str, handle: SharedHandle, owned: bool) -> Result<SharedHandle> {
        if let Some(existing) = self.get(instance) {
            return Ok(existing);
        }

        {
            let mut guard = lock(&handle);
            guard.set_timeout(self.options.timeout);
            if !guard.in_transaction() {
                if let Err(err) = guard.begin_transaction(self.options.isolation_level) {
                    if owned {
                        guard.dispose();
                    }
                    return Err(err);
                }
            }
        }

        debug!(
            scope = self.id,
            instance = %instance,
            owned,
            isolation = %self.options.isolation_level,
            "enlisted database handle"
        );
        self.databases.borrow_mut().push(Enlisted {
            instance: instance.to_string(),
            handle: handle.clone(),
            owned,
        });
        Ok(handle)
    }

    fn take_databases(&self) -> Vec<Enlisted> {
        std::mem::take(&mut *self.databases.borrow_mut())
    }
}

/// RAII ambient transaction scope.
///
/// Creating a scope makes it current on this thread; dropping it without
/// [`complete`](Self::complete) rolls back every enlisted handle. The type is
/// neither `Send` nor `Sync`: a scope belongs to the call context that opened it.
pub struct TransactionScope {
    state: Rc<ScopeState>,
}

impl TransactionScope {
    pub fn new() -> Result<Self> {
        Self::with_options(TransactionScopeOptions::default())
    }

    /// Opens a scope. When a database context for [`DEFAULT_INSTANCE`] encloses
    /// the call and no outer scope already holds that instance, its handle is
    /// adopted and a transaction is started on it immediately.
    pub fn with_options(options: TransactionScopeOptions) -> Result<Self> {
        let state = Rc::new(ScopeState::new(options));

        if ambient::scoped_database(DEFAULT_INSTANCE).is_none() {
            if let Some(handle) = ambient::current_database(DEFAULT_INSTANCE) {
                state.enlist(DEFAULT_INSTANCE, handle, false)?;
            }
        }

        ambient::push_scope(state.clone());
        debug!(scope = state.id, depth = ambient::scope_depth(), "opened transaction scope");
        Ok(Self { state })
    }

    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn options(&self) -> TransactionScopeOptions {
        self.state.options
    }

    pub fn phase(&self) -> ScopePhase {
        self.state.phase.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.get()
    }

    pub fn is_current(&self) -> bool {
        ambient::is_current(&self.state)
    }

    /// Registers a handle for `instance` in this scope and starts its
    /// transaction. Later registrations for the same instance are ignored.
    ///
    /// Returns `false` when the handle was not registered: the instance was
    /// already taken, or the scope is disposed or not current.
    pub fn set_database(&self, instance: &str, handle: SharedHandle) -> Result<bool> {
        if self.is_disposed() || !self.is_current() {
            debug!(scope = self.state.id, instance = %instance, "set_database on inactive scope ignored");
            return Ok(false);
        }
        let registered = self.state.enlist(instance, handle.clone(), true)?;
        Ok(same_handle(&registered, &handle))
    }

    /// Handle registered in this scope for `instance`.
    pub fn get_database(&self, instance: &str) -> Option<SharedHandle> {
        self.state.get(instance)
    }

    pub fn instance_names(&self) -> Vec<String> {
        self.state
            .databases
            .borrow()
            .iter()
            .map(|enlisted| enlisted.instance.clone())
            .collect()
    }

    /// Commits every enlisted handle.
    ///
    /// Ignored unless this scope is current and not yet disposed. Commit is
    /// best-effort: a failing handle does not stop the others; it is rolled
    /// back and reported in [`DbError::PartialCommit`].
    pub fn complete(&mut self) -> Result<()> {
        if self.is_disposed() {
            debug!(scope = self.state.id, "complete on disposed scope ignored");
            return Ok(());
        }
        if !self.is_current() {
            warn!(scope = self.state.id, "complete on non-current scope ignored");
            return Ok(());
        }

        self.state.phase.set(ScopePhase::Completing);
        let mut failed = Vec::new();
        for enlisted in self.state.take_databases() {
            let mut handle = lock(&enlisted.handle);
            if handle.commit_transaction() {
                debug!(scope = self.state.id, instance = %enlisted.instance, "committed");
                if enlisted.owned {
                    handle.dispose();
                }
            } else {
                warn!(scope = self.state.id, instance = %enlisted.instance, "commit failed");
                if handle.rollback_transaction() && enlisted.owned {
                    handle.dispose();
                }
                failed.push(enlisted.instance);
            }
        }

        self.finish(ScopePhase::Completed);
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DbError::PartialCommit { failed })
        }
    }

    /// Rolls back every enlisted handle. A second call is a no-op.
    pub fn dispose(&mut self) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        if !self.is_current() {
            // Still unlinked below: the chain never holds a disposed scope.
            warn!(scope = self.state.id, "transaction scope disposed out of order");
        }

        self.state.phase.set(ScopePhase::RollingBack);
        let mut failed = Vec::new();
        for enlisted in self.state.take_databases() {
            let mut handle = lock(&enlisted.handle);
            if handle.rollback_transaction() {
                debug!(scope = self.state.id, instance = %enlisted.instance, "rolled back");
                if enlisted.owned {
                    handle.dispose();
                }
            } else {
                warn!(scope = self.state.id, instance = %enlisted.instance, "rollback failed");
                failed.push(enlisted.instance);
            }
        }

        self.finish(ScopePhase::RolledBack);
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DbError::PartialRollback { failed })
        }
    }

    fn finish(&mut self, phase: ScopePhase) {
        self.state.disposed.set(true);
        self.state.phase.set(phase);
        ambient::remove_scope(&self.state);
        debug!(scope = self.state.id, phase = %phase, depth = ambient::scope_depth(), "closed transaction scope");
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(scope = self.state.id, error = %err, "implicit scope rollback incomplete");
        }
    }
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("id", &self.state.id)
            .field("phase", &self.phase())
            .field("instances", &self.instance_names())
            .finish()
    }
}
