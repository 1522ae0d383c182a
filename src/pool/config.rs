use crate::core::{DbError, IsolationLevel, Result};
use crate::instance::{InstanceIdentification, ServiceProvider};
use crate::transaction::TransactionScopeOptions;
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound on idle pooled contexts.
pub const DEFAULT_POOL_MAX_SIZE: usize = 128;

/// Options a pooled context is constructed with.
///
/// Parsable from `"<provider>://<connection-info>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    /// Database provider name (`sqlite`, `postgres`, ...)
    pub provider: String,

    /// Provider-specific connection information
    pub connection_info: String,

    /// Name assigned by the instance registry, if registered
    pub instance_name: Option<String>,

    /// Maximum number of idle contexts the pool keeps
    pub pool_max_size: usize,

    pub isolation_level: IsolationLevel,

    pub transaction_timeout: Option<Duration>,
}

impl ContextOptions {
    pub fn new(provider: &str, connection_info: &str) -> Self {
        Self {
            provider: provider.to_string(),
            connection_info: connection_info.to_string(),
            instance_name: None,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            isolation_level: IsolationLevel::default(),
            transaction_timeout: None,
        }
    }

    pub fn instance_name(mut self, name: &str) -> Self {
        self.instance_name = Some(name.to_string());
        self
    }

    pub fn pool_max_size(mut self, max: usize) -> Self {
        self.pool_max_size = max;
        self
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = Some(timeout);
        self
    }

    /// Parse from connection string
    ///
    /// Format: `"<provider>://<connection-info>"`
    ///
    /// ```ignore
    /// let options = ContextOptions::from_url("sqlite://data/app.db")?;
    /// assert_eq!(options.provider, "sqlite");
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let Some((provider, connection_info)) = url.split_once("://") else {
            return Err(DbError::ConfigError(format!(
                "Connection string '{}' must look like '<provider>://<connection-info>'",
                url
            )));
        };

        let options = Self::new(provider.trim(), connection_info.trim());
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(DbError::ConfigError("Provider must not be empty".to_string()));
        }
        if self.provider.chars().any(char::is_whitespace) {
            return Err(DbError::ConfigError(format!(
                "Provider '{}' must not contain whitespace",
                self.provider
            )));
        }
        if self.connection_info.is_empty() {
            return Err(DbError::ConfigError(
                "Connection information must not be empty".to_string(),
            ));
        }
        if self.pool_max_size == 0 {
            return Err(DbError::ConfigError(
                "pool_max_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Options a transaction scope should be opened with for this context.
    pub fn scope_options(&self) -> TransactionScopeOptions {
        let options = TransactionScopeOptions::new().isolation_level(self.isolation_level);
        match self.transaction_timeout {
            Some(timeout) => options.timeout(timeout),
            None => options,
        }
    }

    pub fn to_identification(&self, services: Arc<dyn ServiceProvider>) -> InstanceIdentification {
        InstanceIdentification::new(&self.provider, &self.connection_info, services)
    }
}
