//! The storage engine backing the ledger.
//!
//! Plays the role of the relational driver: it authenticates connections and
//! owns the committed state of the single `account` table. Everything above
//! this module talks to it exclusively through [`Connection`] handles and
//! prepared statements.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::connection::Connection;

/// Native errors raised by the engine.
///
/// These are the "driver errors" of the stack; the repository wraps them in
/// [`crate::core::DbError::DataAccess`] before they reach callers.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("access denied for user '{0}'")]
    AccessDenied(String),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("duplicate key '{0}'")]
    DuplicateKey(String),

    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("parameter {0} is not bound")]
    UnboundParameter(usize),

    #[error("parameter index {0} out of range")]
    ParameterIndex(usize),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("statement does not produce an update count")]
    NotAnUpdate,

    #[error("statement does not produce a result set")]
    NotAQuery,

    #[error("no transaction in progress")]
    NoTransaction,
}

/// A write staged on a connection while auto-commit is disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StagedRow {
    Put(i64),
    Delete,
}

struct Shared {
    rows: RwLock<BTreeMap<String, i64>>,
    username: String,
    password: String,
    next_conn_id: AtomicU64,
}

/// Cloneable handle to one ledger database instance.
///
/// All clones share the same committed state. Connections are handed out via
/// [`Database::connect`] after a credential check; a failed check surfaces to
/// providers as a connectivity failure.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Shared>,
}

impl Database {
    /// Create an empty database accepting the given credentials.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            inner: Arc::new(Shared {
                rows: RwLock::new(BTreeMap::new()),
                username: username.to_string(),
                password: password.to_string(),
                next_conn_id: AtomicU64::new(1),
            }),
        }
    }

    /// Open a new connection, verifying credentials first.
    pub fn connect(&self, username: &str, password: &str) -> Result<Connection, EngineError> {
        if username != self.inner.username || password != self.inner.password {
            return Err(EngineError::AccessDenied(username.to_string()));
        }

        let id = self.inner.next_conn_id.fetch_add(1, Ordering::SeqCst);
        debug!(id, "connection established");
        Ok(Connection::new(id, self.clone()))
    }

    /// Number of committed rows. Diagnostics only.
    pub fn row_count(&self) -> usize {
        self.inner.rows.read().len()
    }

    pub(crate) fn get(&self, key: &str) -> Option<i64> {
        self.inner.rows.read().get(key).copied()
    }

    pub(crate) fn insert_new(&self, key: &str, balance: i64) -> Result<(), EngineError> {
        let mut rows = self.inner.rows.write();
        if rows.contains_key(key) {
            return Err(EngineError::DuplicateKey(key.to_string()));
        }
        rows.insert(key.to_string(), balance);
        Ok(())
    }

    pub(crate) fn put_existing(&self, key: &str, balance: i64) -> u64 {
        match self.inner.rows.write().get_mut(key) {
            Some(slot) => {
                *slot = balance;
                1
            }
            None => 0,
        }
    }

    pub(crate) fn remove(&self, key: &str) -> u64 {
        if self.inner.rows.write().remove(key).is_some() {
            1
        } else {
            0
        }
    }

    /// Publish a set of staged writes under a single write lock.
    pub(crate) fn apply(&self, staged: BTreeMap<String, StagedRow>) {
        let mut rows = self.inner.rows.write();
        for (key, change) in staged {
            match change {
                StagedRow::Put(balance) => {
                    rows.insert(key, balance);
                }
                StagedRow::Delete => {
                    rows.remove(&key);
                }
            }
        }
    }
}
