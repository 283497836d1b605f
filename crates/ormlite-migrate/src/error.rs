//! Error types for the migration engine.

use std::path::PathBuf;

use ormlite_core::OrmError;

/// Errors that can occur while planning or applying a migration.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A model declaration or literal could not be rendered.
    #[error(transparent)]
    Orm(#[from] OrmError),

    /// A table definition from the catalog does not have the expected shape.
    #[error("Failed to parse table definition ({message}): {sql}")]
    SchemaParse {
        /// The raw `CREATE TABLE` text.
        sql: String,
        /// What the parser expected.
        message: String,
    },

    /// The catalog returned a row of an unexpected shape.
    #[error("Unexpected catalog row: {0}")]
    Catalog(String),

    /// Database error during migration execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading model files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A model file is not valid JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A model file is valid JSON but describes an invalid model.
    #[error("Invalid model file '{path}': {message}")]
    InvalidModelFile {
        /// Path to the model file.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}

impl MigrateError {
    /// Creates a `SchemaParse` error.
    pub fn schema_parse(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaParse {
            sql: sql.into(),
            message: message.into(),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
