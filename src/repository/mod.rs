//! Keyed access to the account table.
//!
//! Every operation runs through an explicit [`Session`]: inside a unit of
//! work it reuses the bound connection, otherwise it acquires one for the
//! single statement and releases it afterwards. Engine failures are logged
//! with the operation and key, then re-raised as
//! [`DbError::DataAccess`] — never swallowed.

use tracing::{debug, error};

use crate::connection::Connection;
use crate::core::{Account, DbError, Result};
use crate::engine::EngineError;
use crate::transaction::Session;

const INSERT_ACCOUNT: &str = "insert into account (account_id, balance) values (?, ?)";
const SELECT_ACCOUNT: &str = "select account_id, balance from account where account_id = ?";
const UPDATE_BALANCE: &str = "update account set balance = ? where account_id = ?";
const DELETE_ACCOUNT: &str = "delete from account where account_id = ?";

fn with_statement<T>(
    session: &mut Session<'_>,
    operation: &'static str,
    key: &str,
    f: impl FnOnce(&mut Connection) -> std::result::Result<T, EngineError>,
) -> Result<T> {
    session.with_connection(|conn| {
        f(conn).map_err(|source| {
            error!(operation, key, error = %source, "statement failed");
            DbError::DataAccess {
                operation,
                key: key.to_string(),
                source,
            }
        })
    })
}

#[derive(Debug, Default)]
pub struct AccountRepository;

impl AccountRepository {
    pub fn new() -> Self {
        Self
    }

    /// Insert a new account row.
    pub fn save(&self, session: &mut Session<'_>, account: &Account) -> Result<()> {
        with_statement(session, "save", account.account_id(), |conn| {
            let mut stmt = conn.prepare(INSERT_ACCOUNT)?;
            stmt.bind_text(1, account.account_id())?;
            stmt.bind_int(2, account.balance())?;
            stmt.execute_update()
        })?;
        debug!(account_id = account.account_id(), "account saved");
        Ok(())
    }

    /// Point lookup by key. Zero rows is [`DbError::NotFound`].
    pub fn find_by_id(&self, session: &mut Session<'_>, account_id: &str) -> Result<Account> {
        let found = with_statement(session, "find_by_id", account_id, |conn| {
            let mut stmt = conn.prepare(SELECT_ACCOUNT)?;
            stmt.bind_text(1, account_id)?;
            let mut rows = stmt.execute_query()?;
            match rows.next() {
                Some(row) => Ok(Some(Account::new(
                    row.get_text("account_id")?.to_string(),
                    row.get_int("balance")?,
                ))),
                None => Ok(None),
            }
        })?;

        found.ok_or_else(|| DbError::NotFound(account_id.to_string()))
    }

    /// Set the balance for a key. Returns the affected-row count; updating
    /// a missing key affects zero rows and is not an error.
    pub fn update(&self, session: &mut Session<'_>, account_id: &str, balance: i64) -> Result<u64> {
        let affected = with_statement(session, "update", account_id, |conn| {
            let mut stmt = conn.prepare(UPDATE_BALANCE)?;
            stmt.bind_int(1, balance)?;
            stmt.bind_text(2, account_id)?;
            stmt.execute_update()
        })?;
        debug!(account_id, balance, affected, "balance updated");
        Ok(affected)
    }

    /// Delete by key. Returns the affected-row count; deleting a missing
    /// key is a no-op returning zero.
    pub fn delete(&self, session: &mut Session<'_>, account_id: &str) -> Result<u64> {
        let affected = with_statement(session, "delete", account_id, |conn| {
            let mut stmt = conn.prepare(DELETE_ACCOUNT)?;
            stmt.bind_text(1, account_id)?;
            stmt.execute_update()
        })?;
        debug!(account_id, affected, "account deleted");
        Ok(affected)
    }
}
