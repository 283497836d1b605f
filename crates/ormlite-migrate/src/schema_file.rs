//! JSON model files.
//!
//! The CLI has no compiled-in models, so it reads them from a file:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "name": "persons",
//!       "fields": [
//!         { "name": "age", "type": "int" },
//!         { "name": "address", "type": "str", "optional": true, "default": "" },
//!         { "name": "subscribed_at", "type": "datetime", "optional": true }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! A `default` key that is present, even as `null`, declares a static
//! default. Strings given as defaults for adapter types are decoded by the
//! adapter.

use std::path::{Path, PathBuf};

use ormlite_core::{Field, ModelDefinition, OrmError, Registry, Value, ValueType};
use serde::{Deserialize, Deserializer};

use crate::error::{MigrateError, Result};

/// A parsed model file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    /// Declared tables, in file order.
    pub tables: Vec<TableDecl>,
    #[serde(skip)]
    source: PathBuf,
}

/// One table of a model file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDecl {
    /// Table name.
    pub name: String,
    /// Fields, in column order.
    pub fields: Vec<FieldDecl>,
    /// Raw table constraints.
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// One field of a table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    /// Field (column) name.
    pub name: String,
    /// Type name, resolved through the type registry.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the column accepts NULL.
    #[serde(default)]
    pub optional: bool,
    /// Whether the field is the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Foreign key reference, `table` or `table.column`.
    #[serde(default)]
    pub foreign_key: Option<String>,
    /// Static default value.
    #[serde(default, deserialize_with = "present")]
    pub default: Option<serde_json::Value>,
}

/// Maps a present key to `Some`, so an explicit `null` survives.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl ModelFile {
    /// Reads and parses a model file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut file = Self::parse(&text)?;
        file.source = path.to_path_buf();
        Ok(file)
    }

    /// Parses model file text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Declares every table of this file in `registry`.
    pub fn declare_into(&self, registry: &mut Registry) -> Result<()> {
        for table in &self.tables {
            let definition = self.definition(registry, table)?;
            registry.declare_model(definition)?;
        }
        Ok(())
    }

    fn definition(&self, registry: &Registry, table: &TableDecl) -> Result<ModelDefinition> {
        let mut definition = ModelDefinition::new(&table.name);
        for decl in &table.fields {
            definition = definition.field(self.field(registry, decl)?);
        }
        for constraint in &table.constraints {
            definition = definition.constraint(constraint);
        }
        Ok(definition)
    }

    fn field(&self, registry: &Registry, decl: &FieldDecl) -> Result<Field> {
        let base = registry
            .types()
            .type_named(&decl.type_name)
            .ok_or_else(|| OrmError::missing_adapter(&decl.type_name))?;
        let value_type = if decl.optional {
            ValueType::optional(base.clone())
        } else {
            base.clone()
        };

        let mut field = Field::new(&decl.name, value_type);
        if decl.primary_key {
            field = field.primary_key();
        }
        if let Some(reference) = &decl.foreign_key {
            field = field.foreign_key(reference)?;
        }
        if let Some(default) = &decl.default {
            field = field.default(self.default_value(registry, &base, decl, default)?);
        }
        Ok(field)
    }

    fn default_value(
        &self,
        registry: &Registry,
        base: &ValueType,
        decl: &FieldDecl,
        json: &serde_json::Value,
    ) -> Result<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::from(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Integer(i)),
                None => n.as_f64().map(Value::Real).ok_or_else(|| {
                    self.invalid(format!("default of '{}' is out of range: {n}", decl.name))
                }),
            },
            serde_json::Value::String(s) => match base {
                ValueType::Custom(_) => {
                    let sql_type = registry.types().storage_type_of(base)?;
                    Ok(registry.types().convert(sql_type, Value::Text(s.clone()))?)
                }
                _ => Ok(Value::Text(s.clone())),
            },
            other => Err(self.invalid(format!(
                "default of '{}' must be a scalar, got {other}",
                decl.name
            ))),
        }
    }

    fn invalid(&self, message: String) -> MigrateError {
        MigrateError::InvalidModelFile {
            path: self.source.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    const PERSONS: &str = r#"{
        "tables": [
            {
                "name": "persons",
                "fields": [
                    { "name": "age", "type": "int" },
                    { "name": "name", "type": "str" },
                    { "name": "address", "type": "str", "optional": true, "default": "" },
                    { "name": "phone", "type": "int", "optional": true, "default": null },
                    { "name": "born", "type": "date", "default": "1990-01-02" },
                    { "name": "funny", "type": "bool", "default": true }
                ]
            },
            {
                "name": "pets",
                "fields": [
                    { "name": "id", "type": "str", "primary_key": true },
                    { "name": "owner", "type": "str", "foreign_key": "persons.name" }
                ],
                "constraints": ["UNIQUE (owner)"]
            }
        ]
    }"#;

    #[test]
    fn test_declare_from_json() {
        let mut registry = Registry::new();
        ModelFile::parse(PERSONS)
            .unwrap()
            .declare_into(&mut registry)
            .unwrap();

        let persons = registry.models().get("persons").unwrap();
        let definitions: Vec<&str> = persons
            .columns()
            .iter()
            .map(|c| c.definition.as_str())
            .collect();
        assert_eq!(
            definitions,
            vec![
                "age INTEGER NOT NULL",
                "name TEXT NOT NULL",
                "address TEXT",
                "phone INTEGER",
                "born DATE DEFAULT '1990-01-02' NOT NULL",
                "funny BOOL DEFAULT 'T' NOT NULL",
            ]
        );
        assert_eq!(
            persons.column("born").unwrap().field.resolve_default(),
            Some(Value::from(NaiveDate::from_ymd_opt(1990, 1, 2).unwrap()))
        );

        let pets = registry.models().get("pets").unwrap();
        assert_eq!(pets.primary_key().unwrap().name, "id");
        assert_eq!(pets.constraints(), ["UNIQUE (owner)".to_string()]);
        assert_eq!(
            pets.foreign_key_constraints().collect::<Vec<_>>(),
            vec!["FOREIGN KEY (owner) REFERENCES persons(name)"]
        );
    }

    #[test]
    fn test_unknown_type_is_missing_adapter() {
        let file = ModelFile::parse(
            r#"{"tables": [{"name": "t", "fields": [{"name": "x", "type": "uuid"}]}]}"#,
        )
        .unwrap();
        let err = file.declare_into(&mut Registry::new()).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Orm(OrmError::MissingAdapter { .. })
        ));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = ModelFile::parse(r#"{"tables": [], "views": []}"#).unwrap_err();
        assert!(matches!(err, MigrateError::Serialization(_)));
    }

    #[test]
    fn test_non_scalar_default() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"{{"tables": [{{"name": "t", "fields": [{{"name": "x", "type": "str", "default": [1]}}]}}]}}"#
        )
        .unwrap();

        let file = ModelFile::load(tmp.path()).unwrap();
        let err = file.declare_into(&mut Registry::new()).unwrap_err();
        match err {
            MigrateError::InvalidModelFile { path, message } => {
                assert_eq!(path, tmp.path());
                assert!(message.contains("'x'"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelFile::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }
}
