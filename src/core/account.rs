use serde::{Deserialize, Serialize};

/// One row of the account table: a unique identifier and its balance.
///
/// The identifier is immutable after creation; the balance is always
/// defined once the row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    account_id: String,
    balance: i64,
}

impl Account {
    pub fn new(account_id: impl Into<String>, balance: i64) -> Self {
        Self {
            account_id: account_id.into(),
            balance,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }
}
