pub mod account;
pub mod error;

pub use account::Account;
pub use error::{DbError, Result};
