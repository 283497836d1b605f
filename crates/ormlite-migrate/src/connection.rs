//! The database capability the migration engine runs against.
//!
//! The engine only ever sends literal SQL text and reads rows back, so the
//! capability is two methods wide. [`sqlx::SqliteConnection`] implements it.

use std::future::Future;

use ormlite_core::Value;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row as _, TypeInfo as _, ValueRef as _};

use crate::error::Result;

/// One result row, in column order.
pub type Row = Vec<Value>;

/// A connection that executes literal SQL.
pub trait DatabaseConnection: Send {
    /// Executes one statement and returns its rows (empty for DDL).
    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Closes the connection.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

impl DatabaseConnection for SqliteConnection {
    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>> {
        let rows = sqlx::query(sql).fetch_all(&mut *self).await?;
        rows.iter().map(row_values).collect()
    }

    async fn close(self) -> Result<()> {
        sqlx::Connection::close(self).await?;
        Ok(())
    }
}

/// Reads every column of `row` by its runtime storage class.
fn row_values(row: &SqliteRow) -> Result<Row> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let storage = raw.type_info().name().to_ascii_uppercase();
            let value = match storage.as_str() {
                "REAL" | "FLOAT" | "DOUBLE" => Value::Real(row.try_get_unchecked(i)?),
                "BLOB" => Value::Blob(row.try_get_unchecked(i)?),
                s if s.contains("INT") => Value::Integer(row.try_get_unchecked(i)?),
                _ => Value::Text(row.try_get_unchecked(i)?),
            };
            Ok(value)
        })
        .collect()
}
