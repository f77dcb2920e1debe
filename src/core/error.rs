use thiserror::Error;

use crate::engine::EngineError;

/// Errors surfaced by the ledger access layer.
///
/// The engine's native errors ([`EngineError`]) never cross the repository
/// boundary raw; they arrive wrapped in [`DbError::DataAccess`] or, for
/// connection acquisition, flattened into [`DbError::Connectivity`].
#[derive(Error, Debug)]
pub enum DbError {
    /// The driver or pool could not produce a usable connection.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// A statement failed inside the storage engine.
    #[error("data access error during {operation} for key '{key}'")]
    DataAccess {
        operation: &'static str,
        key: String,
        #[source]
        source: EngineError,
    },

    /// A by-key lookup matched zero rows.
    #[error("account '{0}' not found")]
    NotFound(String),

    /// A business rule rejected the operation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Illegal use of the transaction lifecycle, e.g. committing a unit of
    /// work that already reached a terminal state.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// The unit of work rolled back; wraps the error that triggered it.
    #[error("transaction aborted and rolled back")]
    TransactionAborted(#[source] Box<DbError>),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// The error that originally failed, unwrapping the rollback envelope
    /// added by the transaction coordinator.
    pub fn root_cause(&self) -> &DbError {
        match self {
            DbError::TransactionAborted(inner) => inner.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_nested_aborts() {
        let inner = DbError::NotFound("acct".to_string());
        let wrapped = DbError::TransactionAborted(Box::new(inner));
        assert!(matches!(wrapped.root_cause(), DbError::NotFound(key) if key == "acct"));
    }

    #[test]
    fn root_cause_is_identity_for_plain_errors() {
        let err = DbError::Validation("blocked".to_string());
        assert!(matches!(err.root_cause(), DbError::Validation(_)));
    }
}
