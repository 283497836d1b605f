//! Autodetector for generating migrations from model changes.
//!
//! This module compares the tables in the database catalog with the declared
//! models and produces the operations that reconcile them. Only table and
//! column presence is compared; type, nullability and default changes are
//! not detected.

use std::collections::HashSet;
use std::sync::Arc;

use ormlite_core::{Model, ModelRegistry};

use crate::error::Result;
use crate::introspect::parse_column_names;
use crate::operations::MigrationOperation;

/// A table definition read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTable {
    /// Table name.
    pub name: String,
    /// The stored `CREATE TABLE` statement.
    pub sql: String,
}

impl CatalogTable {
    /// Creates a catalog entry.
    #[must_use]
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Detects schema changes and generates migration operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Autodetector;

impl Autodetector {
    /// Creates a new autodetector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the operations that turn the `catalog` tables into the
    /// declared `models`.
    ///
    /// Tables to create come first, in model order. Then, in catalog order,
    /// each table is either dropped or has its columns reconciled.
    pub fn diff(
        &self,
        catalog: &[CatalogTable],
        models: &ModelRegistry,
    ) -> Result<Vec<MigrationOperation>> {
        let mut operations = Vec::new();

        let live_names: HashSet<&str> = catalog.iter().map(|t| t.name.as_str()).collect();

        // Tables to create (declared but not in the catalog)
        for (name, model) in models.models() {
            if !live_names.contains(name) {
                operations.push(MigrationOperation::create_table(Arc::clone(model)));
            }
        }

        for table in catalog {
            match models.get(&table.name) {
                // Tables to drop (in the catalog but not declared)
                None => operations.push(MigrationOperation::drop_table(&table.name)),
                Some(model) => operations.extend(self.diff_table(&table.name, &table.sql, model)?),
            }
        }

        Ok(operations)
    }

    /// Compares one live table with its model.
    fn diff_table(
        &self,
        name: &str,
        sql: &str,
        model: &Model,
    ) -> Result<Vec<MigrationOperation>> {
        let mut operations = Vec::new();
        let live_columns = parse_column_names(sql)?;

        // New columns, in declaration order
        for column in model.columns() {
            if !live_columns.contains(&column.field.name) {
                operations.push(MigrationOperation::add_column(
                    name,
                    &column.field.name,
                    &column.definition,
                ));
            }
        }

        // Dropped columns
        let declared: HashSet<&str> = model.fields().map(|f| f.name.as_str()).collect();
        for column in &live_columns {
            if !declared.contains(column.as_str()) {
                operations.push(MigrationOperation::drop_column(name, column));
            }
        }

        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use ormlite_core::{Field, Registry, ValueType};

    fn detector() -> Autodetector {
        Autodetector::new()
    }

    fn persons(registry: &mut Registry, fields: Vec<Field>) {
        registry.declare("persons", fields).unwrap();
    }

    #[test]
    fn test_detect_new_table() {
        let mut registry = Registry::new();
        persons(&mut registry, vec![Field::new("age", ValueType::Integer)]);

        let ops = detector().diff(&[], registry.models()).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            MigrationOperation::CreateTable { model } if model.table_name() == "persons"
        ));
    }

    #[test]
    fn test_detect_dropped_table() {
        let registry = Registry::new();
        let catalog = [CatalogTable::new(
            "persons",
            "CREATE TABLE \"persons\" (age INTEGER NOT NULL)",
        )];

        let ops = detector().diff(&catalog, registry.models()).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], MigrationOperation::DropTable { name } if name == "persons"));
    }

    #[test]
    fn test_added_columns_follow_declaration_order() {
        let mut registry = Registry::new();
        persons(
            &mut registry,
            vec![
                Field::new("zeta", ValueType::Text),
                Field::new("age", ValueType::Integer),
                Field::new("middle", ValueType::Real),
                Field::new("alpha", ValueType::of::<bool>()),
            ],
        );
        let catalog = [CatalogTable::new(
            "persons",
            "CREATE TABLE \"persons\" (age INTEGER NOT NULL)",
        )];

        let ops = detector().diff(&catalog, registry.models()).unwrap();
        let added: Vec<&str> = ops
            .iter()
            .map(|op| match op {
                MigrationOperation::AddColumn { column, .. } => column.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(added, vec!["zeta", "middle", "alpha"]);

        match &ops[2] {
            MigrationOperation::AddColumn { definition, .. } => {
                assert_eq!(definition, "alpha BOOL NOT NULL");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_detect_dropped_columns() {
        let mut registry = Registry::new();
        persons(&mut registry, vec![Field::new("age", ValueType::Integer)]);
        let catalog = [CatalogTable::new(
            "persons",
            "CREATE TABLE \"persons\" (age INTEGER NOT NULL, address TEXT, phone INTEGER)",
        )];

        let ops = detector().diff(&catalog, registry.models()).unwrap();
        let mut dropped: Vec<&str> = ops
            .iter()
            .map(|op| match op {
                MigrationOperation::DropColumn { table, column } => {
                    assert_eq!(table, "persons");
                    column.as_str()
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        dropped.sort_unstable();
        assert_eq!(dropped, vec!["address", "phone"]);
    }

    #[test]
    fn test_no_changes() {
        let mut registry = Registry::new();
        persons(
            &mut registry,
            vec![
                Field::new("age", ValueType::Integer),
                Field::new("name", ValueType::Text),
            ],
        );
        let catalog = [CatalogTable::new(
            "persons",
            "CREATE TABLE \"persons\" (age INTEGER NOT NULL, name TEXT NOT NULL)",
        )];

        let ops = detector().diff(&catalog, registry.models()).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_complex_changes() {
        let mut registry = Registry::new();
        persons(
            &mut registry,
            vec![
                Field::new("age", ValueType::Integer),
                Field::new("email", ValueType::Text),
            ],
        );
        registry
            .declare("posts", [Field::new("title", ValueType::Text)])
            .unwrap();
        let catalog = [
            CatalogTable::new(
                "persons",
                "CREATE TABLE \"persons\" (age INTEGER NOT NULL, old_field TEXT)",
            ),
            CatalogTable::new("to_drop", "CREATE TABLE \"to_drop\" (id INTEGER)"),
        ];

        let ops = detector().diff(&catalog, registry.models()).unwrap();
        let summary: Vec<String> = ops.iter().map(ToString::to_string).collect();
        assert_eq!(
            summary,
            vec![
                "Create table posts",
                "Add column for persons: email TEXT NOT NULL",
                "Drop column for persons: old_field",
                "Drop table to_drop",
            ]
        );
    }

    #[test]
    fn test_unparseable_catalog_sql() {
        let mut registry = Registry::new();
        persons(&mut registry, vec![Field::new("age", ValueType::Integer)]);
        let catalog = [CatalogTable::new("persons", "Crit TABlE")];

        let err = detector().diff(&catalog, registry.models()).unwrap_err();
        assert!(matches!(err, MigrateError::SchemaParse { .. }));
    }

    #[test]
    fn test_unparseable_sql_of_dropped_table_is_ignored() {
        let registry = Registry::new();
        let catalog = [CatalogTable::new("legacy", "Crit TABlE")];

        let ops = detector().diff(&catalog, registry.models()).unwrap();
        assert!(matches!(&ops[0], MigrationOperation::DropTable { .. }));
    }
}
