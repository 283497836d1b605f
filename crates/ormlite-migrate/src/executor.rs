//! Migration executor.
//!
//! This module reads the live catalog, diffs it against the declared models
//! and applies the resulting operations inside one exclusive transaction.

use ormlite_core::{ModelRegistry, Value};
use tracing::{debug, info, warn};

use crate::autodetector::{Autodetector, CatalogTable};
use crate::connection::DatabaseConnection;
use crate::dialect::MigrationDialect;
use crate::error::{MigrateError, Result};
use crate::operations::MigrationOperation;

/// The outcome of a migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Operations detected, in execution order.
    pub operations: Vec<MigrationOperation>,
    /// SQL statements generated for the operations, in execution order.
    pub statements: Vec<String>,
    /// Whether the statements were committed.
    pub applied: bool,
}

impl MigrationReport {
    /// Returns whether the schema already matched the models.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Executes migrations against a database connection.
#[derive(Debug, Clone)]
pub struct MigrationExecutor<D: MigrationDialect> {
    dialect: D,
    autodetector: Autodetector,
    dry_run: bool,
}

impl<D: MigrationDialect> MigrationExecutor<D> {
    /// Creates a new migration executor.
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            autodetector: Autodetector::new(),
            dry_run: false,
        }
    }

    /// Enables dry-run mode (the transaction is rolled back instead of
    /// committed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Reads every user table and its `CREATE TABLE` statement.
    pub async fn catalog<C: DatabaseConnection>(
        &self,
        conn: &mut C,
    ) -> Result<Vec<CatalogTable>> {
        let rows = conn.execute(self.dialect.catalog_query()).await?;
        rows.into_iter()
            .map(|row| {
                let mut columns = row.into_iter();
                match (columns.next(), columns.next(), columns.next()) {
                    (Some(Value::Text(name)), Some(Value::Text(sql)), None) => {
                        Ok(CatalogTable::new(name, sql))
                    }
                    other => Err(MigrateError::Catalog(format!("{other:?}"))),
                }
            })
            .collect()
    }

    /// Computes the operations a migration would run, without a transaction.
    pub async fn plan<C: DatabaseConnection>(
        &self,
        conn: &mut C,
        models: &ModelRegistry,
    ) -> Result<Vec<MigrationOperation>> {
        let catalog = self.catalog(conn).await?;
        self.autodetector.diff(&catalog, models)
    }

    /// Renders the SQL for a list of operations.
    #[must_use]
    pub fn sql_for(&self, operations: &[MigrationOperation]) -> Vec<String> {
        operations
            .iter()
            .flat_map(|op| self.dialect.generate_sql(op))
            .collect()
    }

    /// Brings the database schema in line with `models`.
    ///
    /// Everything runs inside one exclusive transaction. Any failure,
    /// including a failed `COMMIT`, rolls the transaction back and is
    /// returned unchanged.
    pub async fn migrate<C: DatabaseConnection>(
        &self,
        conn: &mut C,
        models: &ModelRegistry,
    ) -> Result<MigrationReport> {
        info!(
            dialect = self.dialect.name(),
            dry_run = self.dry_run,
            "Starting migration"
        );
        conn.execute(self.dialect.begin_exclusive()).await?;

        let outcome = match self.apply(conn, models).await {
            Ok(report) => self.finish(conn, report).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => {
                info!(
                    operations = report.operations.len(),
                    statements = report.statements.len(),
                    applied = report.applied,
                    "Migration finished"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Migration failed, rolling back");
                if let Err(rollback) = conn.execute("ROLLBACK").await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Ends the transaction: rolled back in dry-run mode, committed otherwise.
    async fn finish<C: DatabaseConnection>(
        &self,
        conn: &mut C,
        mut report: MigrationReport,
    ) -> Result<MigrationReport> {
        if self.dry_run {
            conn.execute("ROLLBACK").await?;
        } else {
            conn.execute("COMMIT").await?;
            report.applied = true;
        }
        Ok(report)
    }

    /// Runs the diff and its statements inside an open transaction.
    async fn apply<C: DatabaseConnection>(
        &self,
        conn: &mut C,
        models: &ModelRegistry,
    ) -> Result<MigrationReport> {
        let operations = self.plan(conn, models).await?;
        let mut statements = Vec::new();

        for operation in &operations {
            for sql in self.dialect.generate_sql(operation) {
                debug!(sql = %sql, "Executing SQL");
                conn.execute(&sql).await?;
                statements.push(sql);
            }
            log_operation(operation);
        }

        Ok(MigrationReport {
            operations,
            statements,
            applied: false,
        })
    }
}

fn log_operation(operation: &MigrationOperation) {
    match operation {
        MigrationOperation::CreateTable { model } => {
            info!(table = %model.table_name(), "Table created");
        }
        MigrationOperation::DropTable { name } => info!(table = %name, "Table dropped"),
        MigrationOperation::AddColumn {
            table, definition, ..
        } => info!(table = %table, column = %definition, "Add column"),
        MigrationOperation::DropColumn { table, column } => {
            info!(table = %table, column = %column, "Drop column");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Row;
    use crate::dialect::SqliteDialect;
    use ormlite_core::{Field, Registry, ValueType};
    use sqlx::{Connection, SqliteConnection};

    /// Wraps a real connection and records every statement sent to it.
    struct Recording {
        inner: SqliteConnection,
        log: Vec<String>,
    }

    impl Recording {
        async fn open() -> Self {
            Self {
                inner: SqliteConnection::connect("sqlite::memory:").await.unwrap(),
                log: Vec::new(),
            }
        }
    }

    impl DatabaseConnection for Recording {
        async fn execute(&mut self, sql: &str) -> Result<Vec<Row>> {
            self.log.push(sql.to_string());
            DatabaseConnection::execute(&mut self.inner, sql).await
        }

        async fn close(self) -> Result<()> {
            DatabaseConnection::close(self.inner).await
        }
    }

    /// Returns canned catalog rows and accepts everything else.
    struct Scripted {
        catalog: Vec<Row>,
        log: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl Scripted {
        fn new(catalog: Vec<Row>) -> Self {
            Self {
                catalog,
                log: Vec::new(),
                fail_on: None,
            }
        }
    }

    impl DatabaseConnection for Scripted {
        async fn execute(&mut self, sql: &str) -> Result<Vec<Row>> {
            self.log.push(sql.to_string());
            if self.fail_on == Some(sql) {
                return Err(MigrateError::Database(sqlx::Error::Protocol(format!(
                    "{sql} failed"
                ))));
            }
            if sql.starts_with("SELECT") {
                Ok(self.catalog.clone())
            } else {
                Ok(Vec::new())
            }
        }

        async fn close(self) -> Result<()> {
            Ok(())
        }
    }

    fn executor() -> MigrationExecutor<SqliteDialect> {
        MigrationExecutor::new(SqliteDialect::new())
    }

    fn persons() -> Registry {
        let mut registry = Registry::new();
        registry
            .declare(
                "persons",
                [
                    Field::new("age", ValueType::Integer),
                    Field::new("name", ValueType::Text),
                ],
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_migrate_wraps_statements_in_exclusive_transaction() {
        let registry = persons();
        let mut conn = Recording::open().await;

        let report = executor().migrate(&mut conn, registry.models()).await.unwrap();

        assert!(report.applied);
        assert_eq!(
            report.statements,
            vec![r#"CREATE TABLE "persons" (age INTEGER NOT NULL, name TEXT NOT NULL)"#]
        );
        assert_eq!(conn.log.first().map(String::as_str), Some("BEGIN EXCLUSIVE TRANSACTION"));
        assert_eq!(conn.log.last().map(String::as_str), Some("COMMIT"));
        assert_eq!(conn.log.len(), 4);
    }

    #[tokio::test]
    async fn test_second_migration_is_a_no_op() {
        let registry = persons();
        let mut conn = Recording::open().await;
        let exec = executor();

        exec.migrate(&mut conn, registry.models()).await.unwrap();
        conn.log.clear();
        let report = exec.migrate(&mut conn, registry.models()).await.unwrap();

        assert!(report.is_empty());
        assert!(report.statements.is_empty());
        // BEGIN, catalog query, COMMIT
        assert_eq!(conn.log.len(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_rolls_back() {
        let registry = persons();
        let mut conn = Recording::open().await;

        let report = executor()
            .dry_run(true)
            .migrate(&mut conn, registry.models())
            .await
            .unwrap();
        assert!(!report.applied);
        assert_eq!(report.statements.len(), 1);
        assert_eq!(conn.log.last().map(String::as_str), Some("ROLLBACK"));

        let catalog = executor().catalog(&mut conn).await.unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_returns_error() {
        let registry = persons();
        let mut conn = Scripted::new(vec![vec![
            Value::Text("persons".to_string()),
            Value::Text("Crit TABlE".to_string()),
        ]]);

        let err = executor()
            .migrate(&mut conn, registry.models())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::SchemaParse { .. }));
        assert_eq!(conn.log.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!conn.log.iter().any(|sql| sql == "COMMIT"));
    }

    #[tokio::test]
    async fn test_malformed_catalog_row() {
        let registry = persons();
        let mut conn = Scripted::new(vec![vec![Value::Integer(1)]]);

        let err = executor()
            .migrate(&mut conn, registry.models())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Catalog(_)));
    }

    #[tokio::test]
    async fn test_plan_and_sql_for() {
        let registry = persons();
        let mut conn = Scripted::new(vec![vec![
            Value::Text("persons".to_string()),
            Value::Text("CREATE TABLE persons (age INTEGER, legacy TEXT)".to_string()),
        ]]);
        let exec = executor();

        let ops = exec.plan(&mut conn, registry.models()).await.unwrap();
        assert_eq!(
            exec.sql_for(&ops),
            vec![
                r#"ALTER TABLE "persons" ADD COLUMN name TEXT NOT NULL"#,
                r#"ALTER TABLE "persons" DROP COLUMN "legacy""#,
            ]
        );
        // No transaction for a plan
        assert_eq!(conn.log.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let registry = persons();
        let mut conn = Scripted::new(Vec::new());
        conn.fail_on = Some("COMMIT");

        let err = executor()
            .migrate(&mut conn, registry.models())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Database(_)));
        assert_eq!(
            conn.log.iter().map(String::as_str).collect::<Vec<_>>(),
            vec![
                "BEGIN EXCLUSIVE TRANSACTION",
                SqliteDialect::new().catalog_query(),
                r#"CREATE TABLE "persons" (age INTEGER NOT NULL, name TEXT NOT NULL)"#,
                "COMMIT",
                "ROLLBACK",
            ]
        );
    }
}
