//! Column-presence migrations for SQLite.
//!
//! `ormlite-migrate` brings a live database schema in line with the models
//! declared in an [`ormlite_core::Registry`]:
//! - Tables with a model but no table are created
//! - Tables without a model are dropped
//! - Columns are added or dropped so each table has exactly the declared
//!   fields
//!
//! Column types, nullability and defaults of existing columns are never
//! compared. A column must be dropped and re-added to change them.
//!
//! # Architecture
//!
//! - **Introspect** - Reads column names from stored `CREATE TABLE` text
//! - **Autodetector** - Diffs the catalog against the models
//! - **Operations** - `CreateTable`, `DropTable`, `AddColumn`, `DropColumn`
//! - **Dialect** - Renders operations as SQLite DDL
//! - **Executor** - Runs a diff inside one exclusive transaction
//!
//! # Example
//!
//! ```rust,no_run
//! use ormlite_core::{Field, Registry, ValueType};
//! use sqlx::{Connection, SqliteConnection};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = Registry::new();
//! registry.declare(
//!     "persons",
//!     [
//!         Field::new("age", ValueType::Integer),
//!         Field::new("name", ValueType::Text),
//!     ],
//! )?;
//!
//! let mut conn = SqliteConnection::connect("sqlite:db.sqlite3").await?;
//! let report = ormlite_migrate::migrate(&mut conn, &registry).await?;
//! for sql in &report.statements {
//!     println!("{sql};");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Apply the models in models.json
//! ormlite-migrate --models models.json migrate
//!
//! # Show the SQL a migration would run
//! ormlite-migrate sql-migrate
//!
//! # List the live tables and their columns
//! ormlite-migrate inspect
//! ```

pub mod autodetector;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod operations;
pub mod schema_file;

use ormlite_core::Registry;

use crate::connection::DatabaseConnection;
use crate::dialect::SqliteDialect;
use crate::executor::{MigrationExecutor, MigrationReport};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::autodetector::{Autodetector, CatalogTable};
    pub use crate::connection::{DatabaseConnection, Row};
    pub use crate::dialect::{MigrationDialect, SqliteDialect};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{MigrationExecutor, MigrationReport};
    pub use crate::introspect::{parse_column_names, parse_create_table, LiveTable};
    pub use crate::operations::MigrationOperation;
    pub use crate::schema_file::ModelFile;
}

/// Migrates `conn` to the models declared in `registry` with the SQLite
/// dialect.
pub async fn migrate<C: DatabaseConnection>(
    conn: &mut C,
    registry: &Registry,
) -> error::Result<MigrationReport> {
    MigrationExecutor::new(SqliteDialect::new())
        .migrate(conn, registry.models())
        .await
}
