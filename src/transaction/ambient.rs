//! Call-context-local ambient state.
//!
//! Two thread-local stacks live here: the chain of open
//! [`TransactionScope`](super::TransactionScope)s and the enclosing
//! non-transactional [`DatabaseContext`]s. Both are pushed and popped by RAII
//! guards, so every exit path (including `?` and unwinding) restores the
//! previous state.

use super::handle::SharedHandle;
use super::scope::ScopeState;
use crate::core::Result;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Instance name adopted by a new scope from the enclosing database context.
pub const DEFAULT_INSTANCE: &str = "default";

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SCOPES: RefCell<Vec<Rc<ScopeState>>> = const { RefCell::new(Vec::new()) };
    static CONTEXTS: RefCell<Vec<(u64, String, SharedHandle)>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn push_scope(scope: Rc<ScopeState>) {
    SCOPES.with(|scopes| scopes.borrow_mut().push(scope));
}

/// Removes `scope` from the chain. Returns `false` when it was not on top.
pub(crate) fn remove_scope(scope: &Rc<ScopeState>) -> bool {
    SCOPES.with(|scopes| {
        let mut scopes = scopes.borrow_mut();
        match scopes.iter().rposition(|candidate| Rc::ptr_eq(candidate, scope)) {
            Some(index) => {
                let was_top = index + 1 == scopes.len();
                scopes.remove(index);
                was_top
            }
            None => false,
        }
    })
}

pub(crate) fn is_current(scope: &Rc<ScopeState>) -> bool {
    SCOPES.with(|scopes| {
        scopes
            .borrow()
            .last()
            .is_some_and(|current| Rc::ptr_eq(current, scope))
    })
}

pub(crate) fn current_scope() -> Option<Rc<ScopeState>> {
    SCOPES.with(|scopes| scopes.borrow().last().cloned())
}

/// Open scopes, innermost first.
pub(crate) fn scope_chain() -> Vec<Rc<ScopeState>> {
    SCOPES.with(|scopes| scopes.borrow().iter().rev().cloned().collect())
}

/// Number of open scopes on this thread.
pub fn scope_depth() -> usize {
    SCOPES.with(|scopes| scopes.borrow().len())
}

pub fn in_transaction_scope() -> bool {
    scope_depth() > 0
}

/// Innermost non-transactional database handle for `instance`.
pub fn current_database(instance: &str) -> Option<SharedHandle> {
    CONTEXTS.with(|contexts| {
        contexts
            .borrow()
            .iter()
            .rev()
            .find(|(_, name, _)| name == instance)
            .map(|(_, _, handle)| handle.clone())
    })
}

/// Scope-chain lookup: the innermost scope that registered `instance`.
pub fn scoped_database(instance: &str) -> Option<SharedHandle> {
    scope_chain().iter().find_map(|scope| scope.get(instance))
}

/// Makes a handle the ambient database for `instance` until dropped.
///
/// Code running inside a context without a transaction scope uses the handle
/// directly; a scope opened inside a context for [`DEFAULT_INSTANCE`] adopts it.
pub struct DatabaseContext {
    id: u64,
    instance: String,
}

impl DatabaseContext {
    pub fn enter(instance: impl Into<String>, handle: SharedHandle) -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::SeqCst);
        let instance = instance.into();
        CONTEXTS.with(|contexts| {
            contexts.borrow_mut().push((id, instance.clone(), handle));
        });
        debug!(context = id, instance = %instance, "entered database context");
        Self { id, instance }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl Drop for DatabaseContext {
    fn drop(&mut self) {
        CONTEXTS.with(|contexts| {
            contexts.borrow_mut().retain(|(id, _, _)| *id != self.id);
        });
        debug!(context = self.id, instance = %self.instance, "left database context");
    }
}

/// Where a handle handed out by [`acquire_database`] came from.
///
/// Only `Opened` handles belong to the caller; the others must not be
/// committed or disposed by it.
pub enum AcquiredDatabase {
    /// Registered in an open scope; the scope commits or rolls it back.
    Scoped(SharedHandle),
    /// Enclosing non-transactional context; no transaction is running.
    Ambient(SharedHandle),
    /// Freshly opened for the caller.
    Opened(SharedHandle),
}

impl AcquiredDatabase {
    pub fn handle(&self) -> &SharedHandle {
        match self {
            Self::Scoped(handle) | Self::Ambient(handle) | Self::Opened(handle) => handle,
        }
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, Self::Scoped(_))
    }
}

/// Routes a request for `instance` through the ambient state.
///
/// Inside a scope, a handle already registered anywhere in the chain is reused,
/// so one instance shares one handle and one transaction regardless of call
/// depth. Otherwise the enclosing database context is adopted, and only then is
/// `open` called; either way the handle is enlisted in the current scope.
pub fn acquire_database<F>(instance: &str, open: F) -> Result<AcquiredDatabase>
where
    F: FnOnce() -> Result<SharedHandle>,
{
    let Some(scope) = current_scope() else {
        if let Some(handle) = current_database(instance) {
            return Ok(AcquiredDatabase::Ambient(handle));
        }
        return Ok(AcquiredDatabase::Opened(open()?));
    };

    if let Some(handle) = scoped_database(instance) {
        return Ok(AcquiredDatabase::Scoped(handle));
    }

    let handle = match current_database(instance) {
        Some(handle) => scope.enlist(instance, handle, false)?,
        None => scope.enlist(instance, open()?, true)?,
    };
    Ok(AcquiredDatabase::Scoped(handle))
}
