use crate::core::{DbError, IsolationLevel, Result};
use crate::tracking::{EntityGraph, PendingChanges};
use crate::transaction::{AcquiredDatabase, DatabaseHandle, SharedHandle, acquire_database};
use tracing::{debug, warn};

/// Turns pending changes into statements against a database handle.
///
/// Statement generation lives outside this crate; implementations receive the
/// handle with a transaction already running.
pub trait ChangeWriter {
    fn write(&mut self, handle: &mut dyn DatabaseHandle, changes: &PendingChanges) -> Result<()>;
}

impl<F> ChangeWriter for F
where
    F: FnMut(&mut dyn DatabaseHandle, &PendingChanges) -> Result<()>,
{
    fn write(&mut self, handle: &mut dyn DatabaseHandle, changes: &PendingChanges) -> Result<()> {
        self(handle, changes)
    }
}

/// Saves an [`EntityGraph`] through the ambient database for one instance.
///
/// Inside a transaction scope the scope's handle is used and the scope decides
/// the outcome. Outside one, the save runs in its own transaction on the
/// enclosing database context's handle or on a freshly opened one.
pub struct UnitOfWork<O> {
    instance: String,
    open: O,
    isolation_level: IsolationLevel,
}

impl<O> UnitOfWork<O>
where
    O: Fn() -> Result<SharedHandle>,
{
    pub fn new(instance: impl Into<String>, open: O) -> Self {
        Self {
            instance: instance.into(),
            open,
            isolation_level: IsolationLevel::default(),
        }
    }

    /// Isolation level of the local transaction used outside a scope.
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Writes every pending change, then accepts them on the graph.
    ///
    /// Returns the number of entities written. On error the graph keeps its
    /// pending changes.
    pub fn save_changes<W>(&self, graph: &mut EntityGraph, writer: &mut W) -> Result<usize>
    where
        W: ChangeWriter + ?Sized,
    {
        let pending = graph.pending_changes();
        if pending.is_empty() {
            debug!(instance = %self.instance, "nothing to save");
            return Ok(0);
        }

        match acquire_database(&self.instance, || (self.open)())? {
            AcquiredDatabase::Scoped(handle) => {
                let mut guard = handle.lock()?;
                writer.write(&mut *guard, &pending)?;
            }
            AcquiredDatabase::Ambient(handle) => {
                self.write_locally(&handle, writer, &pending, false)?;
            }
            AcquiredDatabase::Opened(handle) => {
                self.write_locally(&handle, writer, &pending, true)?;
            }
        }

        graph.accept_all();
        debug!(instance = %self.instance, entities = pending.len(), "saved changes");
        Ok(pending.len())
    }

    fn write_locally<W>(
        &self,
        handle: &SharedHandle,
        writer: &mut W,
        pending: &PendingChanges,
        owned: bool,
    ) -> Result<()>
    where
        W: ChangeWriter + ?Sized,
    {
        let mut guard = handle.lock()?;
        let local = !guard.in_transaction();
        if local {
            if let Err(err) = guard.begin_transaction(self.isolation_level) {
                if owned {
                    guard.dispose();
                }
                return Err(err);
            }
        }

        let result = match writer.write(&mut *guard, pending) {
            Ok(()) => {
                if !local || guard.commit_transaction() {
                    Ok(())
                } else {
                    warn!(instance = %self.instance, "commit failed");
                    guard.rollback_transaction();
                    Err(DbError::PartialCommit {
                        failed: vec![self.instance.clone()],
                    })
                }
            }
            Err(err) => {
                if local && !guard.rollback_transaction() {
                    warn!(instance = %self.instance, "rollback after failed save did not go through");
                }
                Err(err)
            }
        };

        if owned {
            guard.dispose();
        }
        result
    }
}
