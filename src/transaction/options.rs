use crate::core::IsolationLevel;
use std::time::Duration;

/// Options applied when a scope begins a transaction on a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionScopeOptions {
    /// Defaults to `ReadUncommitted`.
    pub isolation_level: IsolationLevel,

    /// Translated into the handle's timeout setting. `None` means no timeout.
    pub timeout: Option<Duration>,
}

impl TransactionScopeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.isolation_level = isolation_level;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
