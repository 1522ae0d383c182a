use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Property '{property}' is not tracked on '{entity}'")]
    NotFound { entity: String, property: String },

    #[error("Primary key '{property}' of '{entity}' cannot be updated while entity is {state}")]
    PrimaryKeyUpdateViolation {
        entity: String,
        property: String,
        state: String,
    },

    #[error("No lazy loader available for '{entity}.{property}' (key {key})")]
    LazyLoadUnavailable {
        entity: String,
        key: String,
        property: String,
    },

    #[error("No satisfiable constructor for pooled context '{0}'")]
    ConstructionUnsatisfiable(String),

    #[error("Commit failed for instances: {}", failed.join(", "))]
    PartialCommit { failed: Vec<String> },

    #[error("Rollback failed for instances: {}", failed.join(", "))]
    PartialRollback { failed: Vec<String> },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub(crate) fn not_found(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            property: property.into(),
        }
    }

    /// Returns `true` for errors that indicate a mapping or usage bug rather
    /// than a transient condition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::PrimaryKeyUpdateViolation { .. }
                | Self::ConstructionUnsatisfiable(_)
                | Self::ConfigError(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
