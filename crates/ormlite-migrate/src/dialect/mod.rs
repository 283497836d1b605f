//! Database dialect implementations.
//!
//! A dialect knows how to read the table catalog and how to render each
//! migration operation as SQL for one database system.

mod sqlite;

pub use sqlite::SqliteDialect;

use crate::operations::MigrationOperation;

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the query listing every user table as `(name, create_sql)`
    /// rows.
    fn catalog_query(&self) -> &'static str;

    /// Returns the statement opening an exclusive transaction.
    fn begin_exclusive(&self) -> &'static str;

    /// Generates SQL for a migration operation.
    fn generate_sql(&self, operation: &MigrationOperation) -> Vec<String>;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
