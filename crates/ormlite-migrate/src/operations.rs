//! Forward-only schema operations.

use std::fmt;
use std::sync::Arc;

use ormlite_core::Model;

/// A single schema change produced by the autodetector.
#[derive(Debug, Clone)]
pub enum MigrationOperation {
    /// Create a table for a declared model.
    CreateTable {
        /// The model to create a table for.
        model: Arc<Model>,
    },

    /// Drop a table that no longer has a model.
    DropTable {
        /// Table name.
        name: String,
    },

    /// Add a declared column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Rendered column definition.
        definition: String,
    },

    /// Drop a column that is no longer declared.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
}

impl MigrationOperation {
    /// Creates a `CreateTable` operation.
    #[must_use]
    pub fn create_table(model: Arc<Model>) -> Self {
        Self::CreateTable { model }
    }

    /// Creates a `DropTable` operation.
    #[must_use]
    pub fn drop_table(name: impl Into<String>) -> Self {
        Self::DropTable { name: name.into() }
    }

    /// Creates an `AddColumn` operation.
    #[must_use]
    pub fn add_column(
        table: impl Into<String>,
        column: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self::AddColumn {
            table: table.into(),
            column: column.into(),
            definition: definition.into(),
        }
    }

    /// Creates a `DropColumn` operation.
    #[must_use]
    pub fn drop_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::DropColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Returns the table this operation touches.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { model } => model.table_name(),
            Self::DropTable { name } => name,
            Self::AddColumn { table, .. } | Self::DropColumn { table, .. } => table,
        }
    }

    /// Returns whether this operation can lose data.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::DropTable { .. } | Self::DropColumn { .. })
    }
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { model } => write!(f, "Create table {}", model.table_name()),
            Self::DropTable { name } => write!(f, "Drop table {name}"),
            Self::AddColumn {
                table, definition, ..
            } => write!(f, "Add column for {table}: {definition}"),
            Self::DropColumn { table, column } => write!(f, "Drop column for {table}: {column}"),
        }
    }
}
