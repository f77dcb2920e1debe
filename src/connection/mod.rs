pub mod config;
pub mod pool;
pub mod provider;
pub mod statement;

use std::collections::BTreeMap;

use crate::engine::{Database, EngineError, StagedRow};
use self::statement::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    Closed,
}

/// A live connection to the engine.
///
/// Statements run in auto-commit mode by default: each one applies
/// immediately. Disabling auto-commit starts staging writes on this
/// connection; they stay invisible to other connections until [`commit`]
/// publishes them, and [`rollback`] discards them. Enabling auto-commit
/// while writes are staged commits them, per driver convention.
///
/// [`commit`]: Connection::commit
/// [`rollback`]: Connection::rollback
pub struct Connection {
    id: u64,
    db: Database,
    state: ConnectionState,
    auto_commit: bool,
    staged: BTreeMap<String, StagedRow>,
}

impl Connection {
    pub(crate) fn new(id: u64, db: Database) -> Self {
        Self {
            id,
            db,
            state: ConnectionState::Active,
            auto_commit: true,
            staged: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Active
    }

    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Whether this connection is holding staged, uncommitted writes.
    pub fn has_uncommitted_changes(&self) -> bool {
        !self.auto_commit && !self.staged.is_empty()
    }

    /// Prepare one of the fixed account statements for execution.
    pub fn prepare(&mut self, sql: &str) -> Result<Statement<'_>, EngineError> {
        self.ensure_open()?;
        Statement::new(self, sql)
    }

    /// Toggle auto-commit. Turning it back on commits any open transaction.
    pub fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), EngineError> {
        self.ensure_open()?;
        if auto_commit && !self.auto_commit && !self.staged.is_empty() {
            self.flush();
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    /// Publish staged writes to the shared store.
    pub fn commit(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;
        if self.auto_commit {
            return Err(EngineError::NoTransaction);
        }
        self.flush();
        Ok(())
    }

    /// Discard staged writes.
    pub fn rollback(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;
        if self.auto_commit {
            return Err(EngineError::NoTransaction);
        }
        self.staged.clear();
        Ok(())
    }

    /// Close the connection, discarding any uncommitted work.
    pub fn close(&mut self) {
        self.staged.clear();
        self.state = ConnectionState::Closed;
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(EngineError::ConnectionClosed)
        }
    }

    fn flush(&mut self) {
        self.db.apply(std::mem::take(&mut self.staged));
    }

    /// Merged view of a key: staged overlay first, committed state second.
    fn lookup(&self, key: &str) -> Option<i64> {
        if !self.auto_commit {
            if let Some(staged) = self.staged.get(key) {
                return match staged {
                    StagedRow::Put(balance) => Some(*balance),
                    StagedRow::Delete => None,
                };
            }
        }
        self.db.get(key)
    }

    pub(crate) fn exec_insert(&mut self, key: &str, balance: i64) -> Result<u64, EngineError> {
        self.ensure_open()?;
        if self.auto_commit {
            self.db.insert_new(key, balance)?;
        } else {
            if self.lookup(key).is_some() {
                return Err(EngineError::DuplicateKey(key.to_string()));
            }
            self.staged.insert(key.to_string(), StagedRow::Put(balance));
        }
        Ok(1)
    }

    pub(crate) fn exec_select(&self, key: &str) -> Result<Option<i64>, EngineError> {
        self.ensure_open()?;
        Ok(self.lookup(key))
    }

    pub(crate) fn exec_update(&mut self, key: &str, balance: i64) -> Result<u64, EngineError> {
        self.ensure_open()?;
        if self.auto_commit {
            Ok(self.db.put_existing(key, balance))
        } else if self.lookup(key).is_some() {
            self.staged.insert(key.to_string(), StagedRow::Put(balance));
            Ok(1)
        } else {
            Ok(0)
        }
    }

    pub(crate) fn exec_delete(&mut self, key: &str) -> Result<u64, EngineError> {
        self.ensure_open()?;
        if self.auto_commit {
            Ok(self.db.remove(key))
        } else if self.lookup(key).is_some() {
            self.staged.insert(key.to_string(), StagedRow::Delete);
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
