//! Transaction coordination.
//!
//! A [`UnitOfWork`] binds one connection to a sequence of repository calls
//! so they commit or roll back together. The binding is an explicit
//! [`Session`] handle threaded through calls; there is no ambient
//! thread-local "current connection".
//!
//! State transitions:
//! ```text
//! NotStarted ──begin──> Active ──commit──> Committed
//!                         │
//!                         └──rollback──> RolledBack
//! ```
//! Both `Committed` and `RolledBack` are terminal; further transitions fail
//! with [`DbError::Transaction`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::connection::Connection;
use crate::connection::pool::ConnectionLease;
use crate::connection::provider::ConnectionProvider;
use crate::core::{DbError, Result};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a unit of work, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Lifecycle state of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    NotStarted,
    Active,
    Committed,
    RolledBack,
}

impl TxStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, TxStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Committed | TxStatus::RolledBack)
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::NotStarted => write!(f, "NOT_STARTED"),
            TxStatus::Active => write!(f, "ACTIVE"),
            TxStatus::Committed => write!(f, "COMMITTED"),
            TxStatus::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

/// Where a repository call gets its connection from.
pub enum Session<'a> {
    /// No enclosing unit of work: acquire a connection for this single call
    /// and release it afterwards.
    AutoCommit(&'a dyn ConnectionProvider),
    /// Reuse the connection bound to an in-flight unit of work; the
    /// coordinator owns its release.
    Bound(&'a mut ConnectionLease),
}

impl Session<'_> {
    pub(crate) fn with_connection<T>(
        &mut self,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        match self {
            Session::Bound(lease) => f(lease.connection()),
            Session::AutoCommit(provider) => {
                let mut lease = provider.acquire()?;
                f(lease.connection())
            }
        }
    }
}

/// Demarcates units of work over connections from a provider.
pub struct TransactionManager {
    provider: Arc<dyn ConnectionProvider>,
}

impl TransactionManager {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    /// Start a unit of work: acquire a connection, disable auto-commit,
    /// bind the connection for the duration.
    pub fn begin(&self) -> Result<UnitOfWork> {
        let mut lease = self.provider.acquire()?;
        lease
            .connection()
            .set_auto_commit(false)
            .map_err(|error| DbError::Transaction(error.to_string()))?;
        let uow = UnitOfWork {
            id: TransactionId::new(),
            lease: Some(lease),
            status: TxStatus::Active,
            started_at: Instant::now(),
        };
        debug!(id = %uow.id, "transaction started");
        Ok(uow)
    }

    /// Run `work` under a transaction: commit on normal return, roll back
    /// on any error and propagate it wrapped in
    /// [`DbError::TransactionAborted`].
    pub fn run<T>(&self, work: impl FnOnce(&mut Session<'_>) -> Result<T>) -> Result<T> {
        let mut uow = self.begin()?;
        let outcome = {
            let mut session = uow.session();
            work(&mut session)
        };

        match outcome {
            Ok(value) => {
                uow.commit()?;
                Ok(value)
            }
            Err(cause) => {
                if let Err(rollback_error) = uow.rollback() {
                    error!(id = %uow.id, error = %rollback_error, "rollback failed");
                }
                Err(DbError::TransactionAborted(Box::new(cause)))
            }
        }
    }
}

/// One in-flight transaction and its bound connection.
///
/// The connection returns to its provider as part of [`commit`] and
/// [`rollback`]; dropping while still active rolls back first, so abandoned
/// work never commits or holds a connection.
///
/// [`commit`]: UnitOfWork::commit
/// [`rollback`]: UnitOfWork::rollback
pub struct UnitOfWork {
    id: TransactionId,
    lease: Option<ConnectionLease>,
    status: TxStatus,
    started_at: Instant,
}

impl UnitOfWork {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// The explicit handle repository calls use to reach the bound
    /// connection.
    ///
    /// # Panics
    ///
    /// Panics if the unit of work has already committed or rolled back.
    pub fn session(&mut self) -> Session<'_> {
        Session::Bound(self.lease_mut())
    }

    /// Flush staged writes, finish the unit of work, and return the
    /// connection to its provider.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active("commit")?;
        self.lease_mut()
            .connection()
            .commit()
            .map_err(|error| DbError::Transaction(error.to_string()))?;
        self.status = TxStatus::Committed;
        debug!(
            id = %self.id,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "transaction committed"
        );
        self.release();
        Ok(())
    }

    /// Discard staged writes, finish the unit of work, and return the
    /// connection to its provider.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_active("rollback")?;
        self.lease_mut()
            .connection()
            .rollback()
            .map_err(|error| DbError::Transaction(error.to_string()))?;
        self.status = TxStatus::RolledBack;
        debug!(id = %self.id, "transaction rolled back");
        self.release();
        Ok(())
    }

    fn ensure_active(&self, action: &str) -> Result<()> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(DbError::Transaction(format!(
                "cannot {action}: transaction {} is {}",
                self.id, self.status
            )))
        }
    }

    fn lease_mut(&mut self) -> &mut ConnectionLease {
        self.lease
            .as_mut()
            .expect("active unit of work holds a connection")
    }

    /// Restore auto-commit and hand the connection back to the provider.
    fn release(&mut self) {
        if let Some(mut lease) = self.lease.take() {
            if let Err(error) = lease.connection().set_auto_commit(true) {
                warn!(id = %self.id, %error, "failed to restore auto-commit on release");
            }
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.status.is_active() {
            warn!(id = %self.id, "unit of work dropped while active; rolling back");
            if let Err(error) = self.rollback() {
                error!(id = %self.id, %error, "rollback on drop failed");
            }
        }
    }
}
