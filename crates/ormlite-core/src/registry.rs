//! The caller-owned declaration context.

use std::sync::Arc;

use crate::adapters::register_builtin;
use crate::error::Result;
use crate::model::{Field, Model, ModelDefinition, ModelRegistry};
use crate::types::{Adapter, TypeRegistry, Value};

/// Types and models known to one application.
///
/// Adapters must be registered before the models that use them are declared,
/// and all models must be declared before migrating.
///
/// # Example
///
/// ```
/// use ormlite_core::{Field, Registry, ValueType};
///
/// let mut registry = Registry::new();
/// let persons = registry
///     .declare(
///         "persons",
///         [
///             Field::new("age", ValueType::Integer),
///             Field::new("name", ValueType::Text),
///             Field::new("address", ValueType::optional(ValueType::Text)).default(""),
///         ],
///     )
///     .unwrap();
///
/// assert_eq!(persons.columns()[0].definition, "age INTEGER NOT NULL");
/// assert_eq!(persons.columns()[2].definition, "address TEXT");
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    types: TypeRegistry,
    models: ModelRegistry,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a registry with the built-in `bool`, `date` and `datetime`
    /// adapters.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::bare();
        register_builtin(&mut registry.types);
        registry
    }

    /// Creates a registry without any adapters.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            types: TypeRegistry::new(),
            models: ModelRegistry::new(),
        }
    }

    /// Returns the type registry.
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Returns the model registry.
    #[must_use]
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Registers a value type adapter.
    pub fn register_adapter<A: Adapter>(&mut self, adapter: A) {
        self.types.register(adapter);
    }

    /// Declares a model from a table name and its fields.
    pub fn declare(
        &mut self,
        table_name: impl Into<String>,
        fields: impl IntoIterator<Item = Field>,
    ) -> Result<Arc<Model>> {
        self.declare_model(ModelDefinition::new(table_name).fields(fields))
    }

    /// Declares a model from a full definition.
    pub fn declare_model(&mut self, definition: ModelDefinition) -> Result<Arc<Model>> {
        self.models.declare(&self.types, definition)
    }

    /// Removes the model bound to `table`.
    pub fn unregister(&mut self, table: &str) -> Option<Arc<Model>> {
        self.models.unregister(table)
    }

    /// Removes every declared model. Adapters stay registered.
    pub fn unregister_all(&mut self) {
        self.models.unregister_all();
    }

    /// Renders `value` as SQL literal text.
    pub fn literal_of(&self, value: &Value) -> Result<String> {
        self.types.literal_of(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use crate::types::ValueType;

    #[test]
    fn test_bare_registry_has_no_adapters() {
        let mut registry = Registry::bare();
        let result = registry.declare("flags", [Field::new("on", ValueType::of::<bool>())]);
        assert!(matches!(result, Err(OrmError::MissingAdapter { .. })));

        registry.register_adapter(crate::adapters::BoolAdapter);
        let model = registry
            .declare("flags", [Field::new("on", ValueType::of::<bool>())])
            .unwrap();
        assert_eq!(model.columns()[0].definition, "on BOOL NOT NULL");
    }

    #[test]
    fn test_unregister() {
        let mut registry = Registry::new();
        registry
            .declare("a", [Field::new("x", ValueType::Text)])
            .unwrap();
        registry
            .declare("b", [Field::new("x", ValueType::Text)])
            .unwrap();

        assert!(registry.unregister("a").is_some());
        assert!(registry.unregister("a").is_none());
        assert_eq!(registry.models().len(), 1);

        registry.unregister_all();
        assert!(registry.models().is_empty());
        assert!(registry.types().has_adapter::<bool>());
    }

    #[test]
    fn test_literal_of() {
        let registry = Registry::new();
        assert_eq!(registry.literal_of(&Value::from(true)).unwrap(), "'T'");
        assert!(Registry::bare().literal_of(&Value::from(true)).is_err());
    }
}
