//! Bounded connection pool.
//!
//! Connections are pre-created up to the configured minimum and handed out
//! as [`ConnectionLease`] guards that return them on drop. Idle connections
//! past their idle timeout or maximum lifetime are discarded on the next
//! acquisition.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use super::Connection;
use super::config::ConnectionConfig;
use crate::core::{DbError, Result};
use crate::engine::Database;

const ACQUIRE_RETRY_INTERVAL: Duration = Duration::from_millis(10);

struct IdleConnection {
    connection: Connection,
    created_at: Instant,
    last_used: Instant,
}

impl IdleConnection {
    fn new(connection: Connection) -> Self {
        Self::with_age(connection, Instant::now())
    }

    /// Re-admit a returned connection, keeping its original creation time
    /// so `max_lifetime` measures connection age, not time since return.
    fn with_age(connection: Connection, created_at: Instant) -> Self {
        Self {
            connection,
            created_at,
            last_used: Instant::now(),
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|lifetime| self.created_at.elapsed() > lifetime)
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.last_used.elapsed() > timeout)
    }
}

pub struct ConnectionPool {
    config: ConnectionConfig,
    db: Database,
    available: Arc<Mutex<VecDeque<IdleConnection>>>,
    total: Arc<AtomicUsize>,
}

impl ConnectionPool {
    /// Create a pool over the given database, pre-creating the configured
    /// minimum number of connections.
    pub fn new(config: ConnectionConfig, db: &Database) -> Result<Self> {
        config.validate().map_err(DbError::Connectivity)?;

        let pool = Self {
            config,
            db: db.clone(),
            available: Arc::new(Mutex::new(VecDeque::new())),
            total: Arc::new(AtomicUsize::new(0)),
        };
        pool.ensure_min_connections()?;
        Ok(pool)
    }

    /// Borrow a connection, blocking up to `connect_timeout`.
    pub fn get(&self) -> Result<ConnectionLease> {
        let start = Instant::now();

        loop {
            if let Some((connection, created_at)) = self.try_get_available() {
                return Ok(ConnectionLease::pooled(connection, self.home(), created_at));
            }

            if let Some(connection) = self.try_create()? {
                return Ok(ConnectionLease::pooled(connection, self.home(), Instant::now()));
            }

            if start.elapsed() > self.config.connect_timeout {
                return Err(DbError::Connectivity(
                    "connection pool exhausted: no connection became available".to_string(),
                ));
            }

            thread::sleep(ACQUIRE_RETRY_INTERVAL);
        }
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.available.lock().len();
        let total = self.total.load(Ordering::SeqCst);
        PoolStats {
            total_connections: total,
            available_connections: available,
            active_connections: total.saturating_sub(available),
            max_connections: self.config.max_connections,
        }
    }

    /// Pop an idle connection, discarding any that aged out.
    fn try_get_available(&self) -> Option<(Connection, Instant)> {
        let mut available = self.available.lock();

        let before = available.len();
        available.retain(|idle| {
            !idle.is_expired(self.config.max_lifetime)
                && !idle.is_idle_too_long(self.config.idle_timeout)
        });
        let removed = before - available.len();
        if removed > 0 {
            self.total.fetch_sub(removed, Ordering::SeqCst);
        }

        available
            .pop_front()
            .map(|idle| (idle.connection, idle.created_at))
    }

    fn try_create(&self) -> Result<Option<Connection>> {
        // reserve the slot before connecting, so concurrent acquisitions
        // cannot overshoot `max_connections`
        let mut total = self.total.load(Ordering::SeqCst);
        loop {
            if total >= self.config.max_connections {
                return Ok(None);
            }
            match self.total.compare_exchange(
                total,
                total + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(current) => total = current,
            }
        }

        match self.db.connect(&self.config.username, &self.config.password) {
            Ok(connection) => Ok(Some(connection)),
            Err(error) => {
                self.total.fetch_sub(1, Ordering::SeqCst);
                Err(DbError::Connectivity(error.to_string()))
            }
        }
    }

    fn ensure_min_connections(&self) -> Result<()> {
        let mut available = self.available.lock();
        while self.total.load(Ordering::SeqCst) < self.config.min_connections {
            let connection = self
                .db
                .connect(&self.config.username, &self.config.password)
                .map_err(|error| DbError::Connectivity(error.to_string()))?;
            available.push_back(IdleConnection::new(connection));
            self.total.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn home(&self) -> LeaseHome {
        LeaseHome {
            available: Arc::clone(&self.available),
            total: Arc::clone(&self.total),
        }
    }
}

/// Pool statistics snapshot.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pool: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

pub(crate) struct LeaseHome {
    available: Arc<Mutex<VecDeque<IdleConnection>>>,
    total: Arc<AtomicUsize>,
}

/// RAII guard over a borrowed connection.
///
/// On drop, any uncommitted work is rolled back, auto-commit is restored,
/// and the connection returns to its pool; leases from a direct provider
/// simply close the connection.
pub struct ConnectionLease {
    conn: Option<Connection>,
    home: Option<LeaseHome>,
    created_at: Instant,
}

impl ConnectionLease {
    pub(crate) fn direct(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            home: None,
            created_at: Instant::now(),
        }
    }

    pub(crate) fn pooled(conn: Connection, home: LeaseHome, created_at: Instant) -> Self {
        Self {
            conn: Some(conn),
            home: Some(home),
            created_at,
        }
    }

    /// The leased connection.
    pub fn connection(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .expect("connection already returned to the pool")
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        if conn.has_uncommitted_changes() {
            warn!(
                id = conn.id(),
                "connection released with uncommitted work; rolling back"
            );
            let _ = conn.rollback();
        }

        match &self.home {
            Some(home) if conn.is_open() => {
                if conn.set_auto_commit(true).is_ok() {
                    home.available
                        .lock()
                        .push_back(IdleConnection::with_age(conn, self.created_at));
                } else {
                    home.total.fetch_sub(1, Ordering::SeqCst);
                }
            }
            Some(home) => {
                // closed connections never go back to the pool
                home.total.fetch_sub(1, Ordering::SeqCst);
            }
            None => {}
        }
    }
}
