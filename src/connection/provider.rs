use std::sync::Arc;

use tracing::debug;

use super::config::{AcquireMode, ConnectionConfig};
use super::pool::{ConnectionLease, ConnectionPool};
use crate::core::{DbError, Result};
use crate::engine::Database;

/// Hands out connections per the configured acquisition strategy.
///
/// Repository calls running inside a unit of work never touch a provider;
/// they reuse the transaction-bound connection through
/// [`Session::Bound`](crate::transaction::Session).
pub trait ConnectionProvider: Send + Sync {
    /// Produce a usable connection, failing with [`DbError::Connectivity`]
    /// when the engine or pool cannot deliver one.
    fn acquire(&self) -> Result<ConnectionLease>;
}

/// Opens a fresh connection for every acquisition.
pub struct DirectProvider {
    db: Database,
    username: String,
    password: String,
}

impl DirectProvider {
    pub fn new(config: &ConnectionConfig, db: &Database) -> Self {
        Self {
            db: db.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

impl ConnectionProvider for DirectProvider {
    fn acquire(&self) -> Result<ConnectionLease> {
        let conn = self
            .db
            .connect(&self.username, &self.password)
            .map_err(|error| DbError::Connectivity(error.to_string()))?;
        debug!(id = conn.id(), "opened direct connection");
        Ok(ConnectionLease::direct(conn))
    }
}

impl ConnectionProvider for ConnectionPool {
    fn acquire(&self) -> Result<ConnectionLease> {
        self.get()
    }
}

/// Build the provider selected by deployment configuration.
pub fn provider_for(
    config: &ConnectionConfig,
    db: &Database,
) -> Result<Arc<dyn ConnectionProvider>> {
    config.validate().map_err(DbError::Connectivity)?;
    match config.acquire {
        AcquireMode::Direct => Ok(Arc::new(DirectProvider::new(config, db))),
        AcquireMode::Pooled => Ok(Arc::new(ConnectionPool::new(config.clone(), db)?)),
    }
}
