//! Model declarations and the model registry.
//!
//! A model is declared from a [`ModelDefinition`]: a table name, an ordered
//! list of [`Field`]s and optional raw table constraints. Declaring validates
//! the definition against a [`TypeRegistry`] and freezes it into a [`Model`]
//! whose column definitions are rendered once, up front.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{OrmError, Result};
use crate::types::{TypeRegistry, Value, ValueType};

/// A foreign key reference: `table` or `table.column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referenced column. Defaults to the referencing field's name.
    pub column: Option<String>,
}

impl ForeignKey {
    /// Creates a reference to `table`, using the field's own name as column.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: None,
        }
    }

    /// Sets the referenced column.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Parses `"table"` or `"table.column"`.
    pub fn parse(reference: &str) -> Result<Self> {
        let parts: Vec<&str> = reference.split('.').collect();
        if parts.len() > 2 || parts.iter().any(|part| part.is_empty()) {
            return Err(OrmError::InvalidForeignKey(reference.to_string()));
        }
        let fk = Self::new(parts[0]);
        Ok(match parts.get(1) {
            Some(column) => fk.column(*column),
            None => fk,
        })
    }

    /// Renders the table constraint for the referencing field.
    #[must_use]
    pub fn to_constraint(&self, field_name: &str) -> String {
        format!(
            "FOREIGN KEY ({field_name}) REFERENCES {}({})",
            self.table,
            self.column.as_deref().unwrap_or(field_name)
        )
    }
}

impl FromStr for ForeignKey {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A per-row default computed at insertion time.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default of a field.
#[derive(Clone, Default)]
pub enum FieldDefault {
    /// No default: the value must always be supplied.
    #[default]
    None,
    /// A static default, rendered into the column definition.
    Value(Value),
    /// A default computed per row. Cannot be expressed as a column default.
    Factory(DefaultFactory),
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// One typed column declaration.
#[derive(Debug, Clone)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Declared value type.
    pub value_type: ValueType,
    /// Default value or factory.
    pub default: FieldDefault,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Foreign key reference, if any.
    pub foreign_key: Option<ForeignKey>,
}

impl Field {
    /// Creates a required field.
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: FieldDefault::None,
            primary_key: false,
            foreign_key: None,
        }
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets a static default.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Sets a per-row default factory.
    #[must_use]
    pub fn default_factory(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    /// Sets a foreign key from a `"table"` or `"table.column"` reference.
    pub fn foreign_key(self, reference: &str) -> Result<Self> {
        Ok(self.references(ForeignKey::parse(reference)?))
    }

    /// Sets a foreign key.
    #[must_use]
    pub fn references(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    /// Returns the default for a new row, evaluating the factory if any.
    #[must_use]
    pub fn resolve_default(&self) -> Option<Value> {
        match &self.default {
            FieldDefault::None => None,
            FieldDefault::Value(value) => Some(value.clone()),
            FieldDefault::Factory(factory) => Some(factory()),
        }
    }
}

/// Renders the column definition fragment for `field`.
///
/// The constraint is the first that applies of: `PRIMARY KEY`; nothing for
/// an optional type or a `NULL` default; nothing for a default factory;
/// `DEFAULT <literal> NOT NULL`; `NOT NULL`.
pub fn column_definition(field: &Field, types: &TypeRegistry) -> Result<String> {
    let sql_type = types.storage_type_of(&field.value_type)?;

    let constraint = if field.primary_key {
        "PRIMARY KEY".to_string()
    } else if field.value_type.is_optional() {
        String::new()
    } else {
        match &field.default {
            FieldDefault::Value(value) => {
                let literal = types.literal_of(value)?;
                if literal == "NULL" {
                    String::new()
                } else {
                    format!("DEFAULT {literal} NOT NULL")
                }
            }
            FieldDefault::Factory(_) => String::new(),
            FieldDefault::None => "NOT NULL".to_string(),
        }
    };

    Ok(format!("{} {sql_type} {constraint}", field.name)
        .trim_end()
        .to_string())
}

/// Returns whether `name` is usable as a column name: a lowercase ASCII
/// letter followed by letters, digits or `_`.
///
/// Live column names are read back from the catalog with the same check.
#[must_use]
pub fn is_column_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A model as written by application code, before validation.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    /// Table name.
    pub table_name: String,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// Raw table constraints appended to `CREATE TABLE`.
    pub constraints: Vec<String>,
}

impl ModelDefinition {
    /// Creates an empty definition for `table_name`.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            fields: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends several fields.
    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Appends a raw table constraint, e.g. `UNIQUE (a, b)`.
    #[must_use]
    pub fn constraint(mut self, sql: impl Into<String>) -> Self {
        self.constraints.push(sql.into());
        self
    }
}

/// A validated field with its resolved storage type and column definition.
#[derive(Debug, Clone)]
pub struct Column {
    /// The declared field.
    pub field: Field,
    /// Storage type name.
    pub sql_type: &'static str,
    /// Rendered column definition, e.g. `age INTEGER NOT NULL`.
    pub definition: String,
}

/// A declared, validated model.
#[derive(Debug, Clone)]
pub struct Model {
    table_name: String,
    columns: Vec<Column>,
    constraints: Vec<String>,
}

impl Model {
    /// Validates `definition` and renders its column definitions.
    pub fn from_definition(definition: ModelDefinition, types: &TypeRegistry) -> Result<Self> {
        let ModelDefinition {
            table_name,
            fields,
            constraints,
        } = definition;

        let mut seen = HashSet::new();
        for field in &fields {
            if !is_column_identifier(&field.name) {
                return Err(OrmError::InvalidFieldName {
                    table: table_name,
                    field: field.name.clone(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(OrmError::DuplicateField {
                    table: table_name,
                    field: field.name.clone(),
                });
            }
        }

        let primary_keys: Vec<String> = fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.clone())
            .collect();
        if primary_keys.len() > 1 {
            return Err(OrmError::MultiplePrimaryKeys {
                table: table_name,
                fields: primary_keys,
            });
        }

        let columns = fields
            .into_iter()
            .map(|field| {
                let sql_type = types.storage_type_of(&field.value_type)?;
                let definition = column_definition(&field, types)?;
                Ok(Column {
                    field,
                    sql_type,
                    definition,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            table_name,
            columns,
            constraints,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.columns.iter().map(|c| &c.field)
    }

    /// Returns a column by field name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field.name == name)
    }

    /// Returns the primary key field, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Field> {
        self.fields().find(|f| f.primary_key)
    }

    /// Returns the `FOREIGN KEY` constraints in field order.
    pub fn foreign_key_constraints(&self) -> impl Iterator<Item = String> + '_ {
        self.fields().filter_map(|field| {
            field
                .foreign_key
                .as_ref()
                .map(|fk| fk.to_constraint(&field.name))
        })
    }

    /// Returns the raw table constraints.
    #[must_use]
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    /// Pairs a raw row with the field names, converting each value through
    /// the adapter for its column's storage type.
    ///
    /// Values beyond the declared fields are ignored.
    pub fn decode_row(
        &self,
        types: &TypeRegistry,
        row: Vec<Value>,
    ) -> Result<Vec<(String, Value)>> {
        if row.len() < self.columns.len() {
            return Err(OrmError::RowShape {
                table: self.table_name.clone(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.columns
            .iter()
            .zip(row)
            .map(|(column, raw)| {
                Ok((column.field.name.clone(), types.convert(column.sql_type, raw)?))
            })
            .collect()
    }
}

/// Table name to model bindings.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<Model>>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a model. A later declaration for the same
    /// table replaces the earlier one.
    pub fn declare(
        &mut self,
        types: &TypeRegistry,
        definition: ModelDefinition,
    ) -> Result<Arc<Model>> {
        debug!(table = %definition.table_name, "Declaring model");
        let model = Arc::new(Model::from_definition(definition, types)?);

        let table = model.table_name().to_string();
        if self.models.contains_key(&table) {
            warn!(table = %table, "Re-registering the sql table");
        }
        self.models.insert(table, Arc::clone(&model));
        Ok(model)
    }

    /// Returns the model bound to `table`.
    #[must_use]
    pub fn get(&self, table: &str) -> Option<&Arc<Model>> {
        self.models.get(table)
    }

    /// Returns whether `table` is bound.
    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.models.contains_key(table)
    }

    /// Iterates `(table name, model)` pairs in table name order.
    pub fn models(&self) -> impl Iterator<Item = (&str, &Arc<Model>)> {
        self.models.iter().map(|(name, model)| (name.as_str(), model))
    }

    /// Returns the number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns whether no models are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Removes the binding for `table`.
    pub fn unregister(&mut self, table: &str) -> Option<Arc<Model>> {
        self.models.remove(table)
    }

    /// Removes every binding.
    pub fn unregister_all(&mut self) {
        self.models.clear();
    }
}
