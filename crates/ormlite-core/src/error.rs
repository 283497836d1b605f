//! Error types for model declaration and value encoding.

use thiserror::Error;

/// Errors raised while declaring models or rendering values.
#[derive(Debug, Error)]
pub enum OrmError {
    /// A value type has no storage mapping, or a value has no literal encoder.
    #[error("missing adapter for type '{type_name}'")]
    MissingAdapter {
        /// Name of the type that could not be resolved.
        type_name: String,
    },

    /// A foreign key reference has more than two dot-separated segments.
    #[error("invalid foreign key reference '{0}': expected \"table\" or \"table.column\"")]
    InvalidForeignKey(String),

    /// More than one field of a model is marked as the primary key.
    #[error("model '{table}' declares multiple primary keys: {}", .fields.join(", "))]
    MultiplePrimaryKeys {
        /// Table name of the offending model.
        table: String,
        /// Every field marked as primary key.
        fields: Vec<String>,
    },

    /// A field name is not a lowercase identifier, so it would not be
    /// recognised as a live column when the table is read back.
    #[error("model '{table}' declares field '{field}': names must match [a-z][a-zA-Z0-9_]*")]
    InvalidFieldName {
        /// Table name of the offending model.
        table: String,
        /// The rejected field name.
        field: String,
    },

    /// Two fields of one model share a name.
    #[error("model '{table}' declares field '{field}' more than once")]
    DuplicateField {
        /// Table name of the offending model.
        table: String,
        /// The repeated field name.
        field: String,
    },

    /// A row read back from a table has fewer values than the model has fields.
    #[error("row for '{table}' has {actual} values, expected at least {expected}")]
    RowShape {
        /// Table name of the model.
        table: String,
        /// Number of declared fields.
        expected: usize,
        /// Number of values in the row.
        actual: usize,
    },

    /// Raw stored bytes could not be converted by an adapter.
    #[error("cannot convert stored {sql_type} value: {message}")]
    Convert {
        /// Storage type of the column.
        sql_type: String,
        /// Adapter-specific failure description.
        message: String,
    },
}

impl OrmError {
    /// Creates a `MissingAdapter` error for the named type.
    pub fn missing_adapter(type_name: impl Into<String>) -> Self {
        Self::MissingAdapter {
            type_name: type_name.into(),
        }
    }

    /// Creates a `Convert` error.
    pub fn convert(sql_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Convert {
            sql_type: sql_type.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for declaration and encoding operations.
pub type Result<T> = std::result::Result<T, OrmError>;
