//! The one piece of business logic: transferring money between accounts.

use std::sync::Arc;

use tracing::info;

use crate::connection::provider::ConnectionProvider;
use crate::core::{Account, DbError, Result};
use crate::repository::AccountRepository;
use crate::transaction::TransactionManager;

/// Transfers to this account id are rejected, modeling a business-rule
/// failure injected mid-transfer.
pub const BLOCKED_ACCOUNT_ID: &str = "ex";

pub struct TransferService {
    transactions: TransactionManager,
    repository: AccountRepository,
}

impl TransferService {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            transactions: TransactionManager::new(provider),
            repository: AccountRepository::new(),
        }
    }

    /// Move `amount` from one account to another inside a single unit of
    /// work. Either both balance updates commit or neither does; the error
    /// that aborted the transfer propagates wrapped in
    /// [`DbError::TransactionAborted`].
    pub fn account_transfer(&self, from_id: &str, to_id: &str, amount: i64) -> Result<()> {
        info!(from_id, to_id, amount, "account transfer requested");

        self.transactions.run(|session| {
            let from = self.repository.find_by_id(session, from_id)?;
            let to = self.repository.find_by_id(session, to_id)?;

            self.repository
                .update(session, from_id, from.balance() - amount)?;
            validate_destination(&to)?;
            self.repository
                .update(session, to_id, to.balance() + amount)?;
            Ok(())
        })
    }
}

fn validate_destination(account: &Account) -> Result<()> {
    if account.account_id() == BLOCKED_ACCOUNT_ID {
        return Err(DbError::Validation(format!(
            "transfers to account '{BLOCKED_ACCOUNT_ID}' are blocked"
        )));
    }
    Ok(())
}
