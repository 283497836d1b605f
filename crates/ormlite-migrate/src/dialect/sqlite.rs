//! SQLite dialect for migrations.
//!
//! Requires SQLite 3.35.0 or later for `ALTER TABLE ... DROP COLUMN`.

use ormlite_core::Model;

use crate::operations::MigrationOperation;

use super::MigrationDialect;

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generates SQL for creating a model's table.
    ///
    /// Column definitions come first in field order, then the foreign key
    /// constraints, then the model's raw constraints. Tables with a primary
    /// key are created `WITHOUT ROWID`.
    fn create_table_sql(&self, model: &Model) -> String {
        let definitions: Vec<String> = model
            .columns()
            .iter()
            .map(|c| c.definition.clone())
            .chain(model.foreign_key_constraints())
            .chain(model.constraints().iter().cloned())
            .collect();

        let mut sql = format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(model.table_name()),
            definitions.join(", ")
        );
        if model.primary_key().is_some() {
            sql.push_str(" WITHOUT ROWID");
        }
        sql
    }

    /// Generates SQL for dropping a table.
    fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    /// Generates SQL for adding a column.
    fn add_column_sql(&self, table: &str, definition: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            definition
        )
    }

    /// Generates SQL for dropping a column.
    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn catalog_query(&self) -> &'static str {
        "SELECT tbl_name, sql FROM sqlite_schema \
         WHERE type = 'table' AND tbl_name NOT LIKE 'sqlite\\_%' ESCAPE '\\'"
    }

    fn begin_exclusive(&self) -> &'static str {
        "BEGIN EXCLUSIVE TRANSACTION"
    }

    fn generate_sql(&self, operation: &MigrationOperation) -> Vec<String> {
        match operation {
            MigrationOperation::CreateTable { model } => vec![self.create_table_sql(model)],

            MigrationOperation::DropTable { name } => vec![self.drop_table_sql(name)],

            MigrationOperation::AddColumn {
                table, definition, ..
            } => vec![self.add_column_sql(table, definition)],

            MigrationOperation::DropColumn { table, column } => {
                vec![self.drop_column_sql(table, column)]
            }
        }
    }
}
