//! Embedded in-memory account ledger with connection pooling and
//! transactional transfers.
//!
//! The crate layers a JDBC-style access stack over a small in-memory
//! engine: a [`ConnectionProvider`] obtains connections (fresh or pooled),
//! an [`AccountRepository`] issues parameterized point statements, a
//! [`TransactionManager`] demarcates units of work over a single bound
//! connection, and [`TransferService`] composes them into the transfer
//! operation.
//!
//! ```
//! use ledgerdb::{Account, ConnectionConfig, Ledger};
//!
//! # fn main() -> ledgerdb::Result<()> {
//! let ledger = Ledger::open(ConnectionConfig::new("admin", "adminpass"))?;
//! let repository = ledger.repository();
//!
//! let mut session = ledger.session();
//! repository.save(&mut session, &Account::new("alice", 10_000))?;
//! repository.save(&mut session, &Account::new("bob", 10_000))?;
//!
//! ledger.transfer_service().account_transfer("alice", "bob", 2_000)?;
//!
//! assert_eq!(repository.find_by_id(&mut session, "alice")?.balance(), 8_000);
//! assert_eq!(repository.find_by_id(&mut session, "bob")?.balance(), 12_000);
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod core;
pub mod engine;
pub mod repository;
pub mod service;
pub mod transaction;

use std::sync::Arc;

pub use connection::Connection;
pub use connection::config::{AcquireMode, ConnectionConfig};
pub use connection::pool::{ConnectionLease, ConnectionPool, PoolStats};
pub use connection::provider::{ConnectionProvider, DirectProvider, provider_for};
pub use connection::statement::{Row, Rows, Statement, Value};
pub use core::{Account, DbError, Result};
pub use engine::{Database, EngineError};
pub use repository::AccountRepository;
pub use service::{BLOCKED_ACCOUNT_ID, TransferService};
pub use transaction::{Session, TransactionId, TransactionManager, TxStatus, UnitOfWork};

/// One ledger instance wired per deployment configuration.
///
/// Bundles the engine with the provider the configuration selects and hands
/// out the access-layer components.
pub struct Ledger {
    database: Database,
    provider: Arc<dyn ConnectionProvider>,
}

impl Ledger {
    /// Create an empty ledger and the connection provider `config` selects.
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        let database = Database::new(&config.username, &config.password);
        let provider = provider_for(&config, &database)?;
        Ok(Self { database, provider })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn provider(&self) -> Arc<dyn ConnectionProvider> {
        Arc::clone(&self.provider)
    }

    pub fn repository(&self) -> AccountRepository {
        AccountRepository::new()
    }

    pub fn transaction_manager(&self) -> TransactionManager {
        TransactionManager::new(Arc::clone(&self.provider))
    }

    pub fn transfer_service(&self) -> TransferService {
        TransferService::new(Arc::clone(&self.provider))
    }

    /// An auto-commit session: each repository call acquires and releases
    /// its own connection.
    pub fn session(&self) -> Session<'_> {
        Session::AutoCommit(self.provider.as_ref())
    }
}
