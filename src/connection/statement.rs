//! Prepared statements for the fixed account schema.
//!
//! The engine accepts exactly the four parameterized point statements used
//! by the account table; parameters are bound positionally with explicit
//! types and are never spliced into the statement text.

use super::Connection;
use crate::engine::EngineError;

const COLUMN_ACCOUNT_ID: &str = "account_id";
const COLUMN_BALANCE: &str = "balance";

/// A typed parameter or column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    InsertAccount,
    SelectById,
    UpdateBalance,
    DeleteById,
}

impl StatementKind {
    fn parameter_count(self) -> usize {
        match self {
            StatementKind::InsertAccount | StatementKind::UpdateBalance => 2,
            StatementKind::SelectById | StatementKind::DeleteById => 1,
        }
    }
}

/// Match SQL text against the supported statements, ignoring whitespace
/// differences and case.
fn classify(sql: &str) -> Result<StatementKind, EngineError> {
    let normalized = sql
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();

    match normalized.as_str() {
        "insert into account (account_id, balance) values (?, ?)" => {
            Ok(StatementKind::InsertAccount)
        }
        "select account_id, balance from account where account_id = ?" => {
            Ok(StatementKind::SelectById)
        }
        "update account set balance = ? where account_id = ?" => Ok(StatementKind::UpdateBalance),
        "delete from account where account_id = ?" => Ok(StatementKind::DeleteById),
        _ => Err(EngineError::UnsupportedStatement(sql.to_string())),
    }
}

/// A parameterized statement bound to a connection.
pub struct Statement<'c> {
    conn: &'c mut Connection,
    kind: StatementKind,
    params: Vec<Option<Value>>,
}

impl<'c> Statement<'c> {
    pub(crate) fn new(conn: &'c mut Connection, sql: &str) -> Result<Self, EngineError> {
        let kind = classify(sql)?;
        let params = vec![None; kind.parameter_count()];
        Ok(Self { conn, kind, params })
    }

    /// Bind a text parameter at a 1-based position.
    pub fn bind_text(&mut self, index: usize, value: &str) -> Result<(), EngineError> {
        self.bind(index, Value::Text(value.to_string()))
    }

    /// Bind an integer parameter at a 1-based position.
    pub fn bind_int(&mut self, index: usize, value: i64) -> Result<(), EngineError> {
        self.bind(index, Value::Int(value))
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<(), EngineError> {
        if index == 0 || index > self.params.len() {
            return Err(EngineError::ParameterIndex(index));
        }
        self.params[index - 1] = Some(value);
        Ok(())
    }

    fn text_param(&self, index: usize) -> Result<String, EngineError> {
        match self.params.get(index - 1) {
            Some(Some(Value::Text(text))) => Ok(text.clone()),
            Some(Some(Value::Int(_))) => Err(EngineError::TypeMismatch(format!(
                "parameter {index} expects text"
            ))),
            _ => Err(EngineError::UnboundParameter(index)),
        }
    }

    fn int_param(&self, index: usize) -> Result<i64, EngineError> {
        match self.params.get(index - 1) {
            Some(Some(Value::Int(value))) => Ok(*value),
            Some(Some(Value::Text(_))) => Err(EngineError::TypeMismatch(format!(
                "parameter {index} expects an integer"
            ))),
            _ => Err(EngineError::UnboundParameter(index)),
        }
    }

    /// Execute a write statement, returning the affected-row count.
    pub fn execute_update(self) -> Result<u64, EngineError> {
        match self.kind {
            StatementKind::InsertAccount => {
                let key = self.text_param(1)?;
                let balance = self.int_param(2)?;
                self.conn.exec_insert(&key, balance)
            }
            StatementKind::UpdateBalance => {
                let balance = self.int_param(1)?;
                let key = self.text_param(2)?;
                self.conn.exec_update(&key, balance)
            }
            StatementKind::DeleteById => {
                let key = self.text_param(1)?;
                self.conn.exec_delete(&key)
            }
            StatementKind::SelectById => Err(EngineError::NotAnUpdate),
        }
    }

    /// Execute a query statement, returning an owned row cursor.
    pub fn execute_query(self) -> Result<Rows, EngineError> {
        match self.kind {
            StatementKind::SelectById => {
                let key = self.text_param(1)?;
                let rows = match self.conn.exec_select(&key)? {
                    Some(balance) => vec![Row {
                        values: vec![
                            (COLUMN_ACCOUNT_ID, Value::Text(key)),
                            (COLUMN_BALANCE, Value::Int(balance)),
                        ],
                    }],
                    None => Vec::new(),
                };
                Ok(Rows {
                    rows: rows.into_iter(),
                })
            }
            _ => Err(EngineError::NotAQuery),
        }
    }
}

/// Cursor over the rows produced by a query.
pub struct Rows {
    rows: std::vec::IntoIter<Row>,
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }
}

/// A single result row with by-name typed column access.
pub struct Row {
    values: Vec<(&'static str, Value)>,
}

impl Row {
    fn value(&self, column: &str) -> Result<&Value, EngineError> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| EngineError::ColumnNotFound(column.to_string()))
    }

    pub fn get_text(&self, column: &str) -> Result<&str, EngineError> {
        match self.value(column)? {
            Value::Text(text) => Ok(text),
            Value::Int(_) => Err(EngineError::TypeMismatch(format!(
                "column '{column}' is not text"
            ))),
        }
    }

    pub fn get_int(&self, column: &str) -> Result<i64, EngineError> {
        match self.value(column)? {
            Value::Int(value) => Ok(*value),
            Value::Text(_) => Err(EngineError::TypeMismatch(format!(
                "column '{column}' is not an integer"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Database;

    fn test_connection() -> Connection {
        let db = Database::new("admin", "adminpass");
        db.connect("admin", "adminpass").unwrap()
    }

    #[test]
    fn classify_is_whitespace_and_case_insensitive() {
        assert!(classify("SELECT account_id,   balance FROM account WHERE account_id = ?").is_ok());
        assert!(matches!(
            classify("select * from account"),
            Err(EngineError::UnsupportedStatement(_))
        ));
    }

    #[test]
    fn insert_then_select_round_trips() {
        let mut conn = test_connection();

        let mut stmt = conn
            .prepare("insert into account (account_id, balance) values (?, ?)")
            .unwrap();
        stmt.bind_text(1, "alice").unwrap();
        stmt.bind_int(2, 100).unwrap();
        assert_eq!(stmt.execute_update().unwrap(), 1);

        let mut stmt = conn
            .prepare("select account_id, balance from account where account_id = ?")
            .unwrap();
        stmt.bind_text(1, "alice").unwrap();
        let mut rows = stmt.execute_query().unwrap();
        let row = rows.next().unwrap();
        assert_eq!(row.get_text("account_id").unwrap(), "alice");
        assert_eq!(row.get_int("balance").unwrap(), 100);
        assert!(rows.next().is_none());
    }

    #[test]
    fn unbound_parameter_fails_at_execute() {
        let mut conn = test_connection();
        let mut stmt = conn
            .prepare("insert into account (account_id, balance) values (?, ?)")
            .unwrap();
        stmt.bind_text(1, "alice").unwrap();
        assert!(matches!(
            stmt.execute_update(),
            Err(EngineError::UnboundParameter(2))
        ));
    }

    #[test]
    fn bind_rejects_out_of_range_index() {
        let mut conn = test_connection();
        let mut stmt = conn
            .prepare("delete from account where account_id = ?")
            .unwrap();
        assert!(matches!(
            stmt.bind_text(2, "alice"),
            Err(EngineError::ParameterIndex(2))
        ));
        assert!(matches!(
            stmt.bind_int(0, 1),
            Err(EngineError::ParameterIndex(0))
        ));
    }

    #[test]
    fn type_mismatch_fails_at_execute() {
        let mut conn = test_connection();
        let mut stmt = conn
            .prepare("update account set balance = ? where account_id = ?")
            .unwrap();
        stmt.bind_text(1, "not-a-balance").unwrap();
        stmt.bind_text(2, "alice").unwrap();
        assert!(matches!(
            stmt.execute_update(),
            Err(EngineError::TypeMismatch(_))
        ));
    }

    #[test]
    fn query_and_update_cannot_be_swapped() {
        let mut conn = test_connection();

        let mut stmt = conn
            .prepare("select account_id, balance from account where account_id = ?")
            .unwrap();
        stmt.bind_text(1, "alice").unwrap();
        assert!(matches!(
            stmt.execute_update(),
            Err(EngineError::NotAnUpdate)
        ));

        let mut stmt = conn
            .prepare("delete from account where account_id = ?")
            .unwrap();
        stmt.bind_text(1, "alice").unwrap();
        assert!(matches!(stmt.execute_query(), Err(EngineError::NotAQuery)));
    }

    #[test]
    fn missing_column_is_reported() {
        let row = Row {
            values: vec![(COLUMN_BALANCE, Value::Int(5))],
        };
        assert!(matches!(
            row.get_text("account_id"),
            Err(EngineError::ColumnNotFound(_))
        ));
        assert!(matches!(
            row.get_text(COLUMN_BALANCE),
            Err(EngineError::TypeMismatch(_))
        ));
    }
}
