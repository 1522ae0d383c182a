use crate::core::{IsolationLevel, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A live database connection as seen by the transaction layer.
///
/// The core never issues SQL through a handle; it only begins and ends
/// transactions and routes the handle by instance name.
pub trait DatabaseHandle: Send {
    fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<()>;

    /// Returns `true` when the commit went through.
    fn commit_transaction(&mut self) -> bool;

    /// Returns `true` when the rollback went through.
    fn rollback_transaction(&mut self) -> bool;

    fn in_transaction(&self) -> bool;

    fn timeout(&self) -> Option<Duration>;

    fn set_timeout(&mut self, timeout: Option<Duration>);

    fn dispose(&mut self);
}

/// A handle shared between a scope and the code running inside it.
pub type SharedHandle = Arc<Mutex<dyn DatabaseHandle>>;

pub fn share_handle<H: DatabaseHandle + 'static>(handle: H) -> SharedHandle {
    Arc::new(Mutex::new(handle))
}

pub(crate) fn same_handle(a: &SharedHandle, b: &SharedHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
