//! Value types, runtime values and the adapter-backed type registry.
//!
//! The [`TypeRegistry`] maps declared [`ValueType`]s to SQLite storage type
//! names and renders [`Value`]s as SQL literal text. Text, integer, real and
//! blob values are handled natively; every other type goes through a
//! registered [`Adapter`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::debug;

use crate::error::{OrmError, Result};

/// Identity of a Rust type that is stored through an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the Rust type name, used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    /// UTF-8 text, stored as `TEXT`.
    Text,
    /// 64-bit signed integer, stored as `INTEGER`.
    Integer,
    /// Double precision float, stored as `REAL`.
    Real,
    /// Raw bytes, stored as `BLOB`.
    Blob,
    /// A nullable value of the inner type.
    Optional(Box<ValueType>),
    /// A sum of several types. Never has a storage type.
    Union(Vec<ValueType>),
    /// A type handled by a registered adapter.
    Custom(TypeKey),
}

impl ValueType {
    /// Returns the value type for the Rust type `T`.
    ///
    /// `String`, the integer primitives that fit in an `i64`, the float
    /// primitives and `Vec<u8>` map to the built-in kinds; anything else is
    /// an adapter type.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        let id = TypeId::of::<T>();
        if id == TypeId::of::<String>() || id == TypeId::of::<&'static str>() {
            Self::Text
        } else if [
            TypeId::of::<i64>(),
            TypeId::of::<i32>(),
            TypeId::of::<i16>(),
            TypeId::of::<i8>(),
            TypeId::of::<isize>(),
            TypeId::of::<u32>(),
            TypeId::of::<u16>(),
            TypeId::of::<u8>(),
        ]
        .contains(&id)
        {
            Self::Integer
        } else if id == TypeId::of::<f64>() || id == TypeId::of::<f32>() {
            Self::Real
        } else if id == TypeId::of::<Vec<u8>>() {
            Self::Blob
        } else {
            Self::Custom(TypeKey::of::<T>())
        }
    }

    /// Wraps `inner` as a nullable type.
    #[must_use]
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Builds a union of the given variants.
    #[must_use]
    pub fn union(variants: impl IntoIterator<Item = Self>) -> Self {
        Self::Union(variants.into_iter().collect())
    }

    /// Returns whether the type is nullable.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Returns the type with every optional layer removed.
    #[must_use]
    pub fn strip_optional(&self) -> &Self {
        match self {
            Self::Optional(inner) => inner.strip_optional(),
            other => other,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Integer => f.write_str("integer"),
            Self::Real => f.write_str("real"),
            Self::Blob => f.write_str("blob"),
            Self::Optional(inner) => write!(f, "{inner} | null"),
            Self::Union(variants) => {
                for (i, variant) in variants.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{variant}")?;
                }
                Ok(())
            }
            Self::Custom(key) => f.write_str(key.name()),
        }
    }
}

/// A value of an adapter type, type-erased.
#[derive(Clone)]
pub struct CustomValue {
    key: TypeKey,
    inner: Arc<dyn Any + Send + Sync>,
    eq: fn(&dyn Any, &dyn Any) -> bool,
    debug: fn(&dyn Any, &mut fmt::Formatter<'_>) -> fmt::Result,
}

impl CustomValue {
    /// Wraps `value`.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + PartialEq + fmt::Debug + Send + Sync,
    {
        Self {
            key: TypeKey::of::<T>(),
            inner: Arc::new(value),
            eq: eq_erased::<T>,
            debug: debug_erased::<T>,
        }
    }

    /// Returns the key of the wrapped type.
    #[must_use]
    pub const fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Returns the wrapped value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        &*self.inner
    }
}

fn eq_erased<T: Any + PartialEq>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn debug_erased<T: Any + fmt::Debug>(value: &dyn Any, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => value.fmt(f),
        None => f.write_str("<?>"),
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && (self.eq)(self.as_any(), other.as_any())
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.debug)(self.as_any(), f)
    }
}

/// A runtime value: a literal to render, a default, or a decoded column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
    /// Binary value.
    Blob(Vec<u8>),
    /// A sequence, rendered as a parenthesized literal list.
    List(Vec<Value>),
    /// A value of an adapter type.
    Custom(CustomValue),
}

impl Value {
    /// Wraps a value of an adapter type.
    pub fn custom<T>(value: T) -> Self
    where
        T: Any + PartialEq + fmt::Debug + Send + Sync,
    {
        Self::Custom(CustomValue::new(value))
    }

    /// Returns whether this is `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the wrapped adapter value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(custom) => custom.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns the raw bytes an adapter decodes from.
    fn raw_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Text(s) => Some(s.clone().into_bytes()),
            Self::Blob(b) => Some(b.clone()),
            Self::Integer(i) => Some(i.to_string().into_bytes()),
            Self::Real(r) => Some(r.to_string().into_bytes()),
            Self::Null | Self::List(_) | Self::Custom(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Storage mapping for one Rust type.
///
/// `adapt` produces the text stored in the database (the registry quotes it
/// when rendering a literal); `convert` turns the stored bytes back into a
/// value.
pub trait Adapter: Send + Sync + 'static {
    /// The Rust type this adapter stores.
    type Value: Any + Clone + PartialEq + fmt::Debug + Send + Sync;

    /// Short name used to refer to the type in schema files (e.g. `"date"`).
    fn name(&self) -> &'static str;

    /// Storage type emitted in column definitions (e.g. `"DATE"`).
    fn sql_type(&self) -> &'static str;

    /// Encodes a value as stored text.
    fn adapt(&self, value: &Self::Value) -> String;

    /// Decodes stored bytes.
    fn convert(&self, raw: &[u8]) -> Result<Self::Value>;
}

trait ErasedAdapter: Send + Sync {
    fn type_key(&self) -> TypeKey;
    fn adapter_name(&self) -> &'static str;
    fn storage_type(&self) -> &'static str;
    fn encode(&self, value: &CustomValue) -> Option<String>;
    fn decode(&self, raw: &[u8]) -> Result<Value>;
}

impl<A: Adapter> ErasedAdapter for A {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<A::Value>()
    }

    fn adapter_name(&self) -> &'static str {
        Adapter::name(self)
    }

    fn storage_type(&self) -> &'static str {
        Adapter::sql_type(self)
    }

    fn encode(&self, value: &CustomValue) -> Option<String> {
        value.downcast_ref::<A::Value>().map(|v| self.adapt(v))
    }

    fn decode(&self, raw: &[u8]) -> Result<Value> {
        self.convert(raw).map(Value::custom)
    }
}

/// Maps value types to storage types and renders SQL literals.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    by_type: HashMap<TypeId, Arc<dyn ErasedAdapter>>,
    by_name: HashMap<&'static str, TypeKey>,
    converters: HashMap<String, Arc<dyn ErasedAdapter>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry")
            .field("adapters", &names)
            .finish()
    }
}

impl TypeRegistry {
    /// Creates a registry that knows only the built-in value kinds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter`, replacing any adapter for the same Rust type.
    ///
    /// The adapter's storage type also becomes a conversion target for
    /// [`TypeRegistry::convert`], so rows read afterwards decode through it.
    pub fn register<A: Adapter>(&mut self, adapter: A) {
        let adapter: Arc<dyn ErasedAdapter> = Arc::new(adapter);
        let key = adapter.type_key();
        debug!(
            name = adapter.adapter_name(),
            sql_type = adapter.storage_type(),
            "Registering adapter"
        );

        if let Some(previous) = self.by_type.insert(key.id, Arc::clone(&adapter)) {
            self.by_name.remove(previous.adapter_name());
            self.converters
                .remove(&previous.storage_type().to_ascii_uppercase());
        }
        self.by_name.insert(adapter.adapter_name(), key);
        self.converters
            .insert(adapter.storage_type().to_ascii_uppercase(), adapter);
    }

    /// Returns whether an adapter is registered for `T`.
    #[must_use]
    pub fn has_adapter<T: Any>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Resolves a type name as written in schema files.
    ///
    /// Built-in kinds answer to `str`/`text`, `int`/`integer`,
    /// `float`/`real` and `bytes`/`blob`; adapter types answer to their
    /// [`Adapter::name`].
    #[must_use]
    pub fn type_named(&self, name: &str) -> Option<ValueType> {
        match name {
            "str" | "text" => Some(ValueType::Text),
            "int" | "integer" => Some(ValueType::Integer),
            "float" | "real" => Some(ValueType::Real),
            "bytes" | "blob" => Some(ValueType::Blob),
            other => self.by_name.get(other).copied().map(ValueType::Custom),
        }
    }

    /// Returns the storage type name for a declared value type.
    pub fn storage_type_of(&self, value_type: &ValueType) -> Result<&'static str> {
        match value_type.strip_optional() {
            ValueType::Text => Ok("TEXT"),
            ValueType::Integer => Ok("INTEGER"),
            ValueType::Real => Ok("REAL"),
            ValueType::Blob => Ok("BLOB"),
            ValueType::Custom(key) => self
                .by_type
                .get(&key.id)
                .map(|adapter| adapter.storage_type())
                .ok_or_else(|| OrmError::missing_adapter(key.name())),
            other => Err(OrmError::missing_adapter(other.to_string())),
        }
    }

    /// Renders `value` as SQL literal text.
    pub fn literal_of(&self, value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Real(r) => Ok(real_literal(*r)),
            Value::Text(s) => Ok(quote(s)),
            Value::Blob(bytes) => Ok(blob_literal(bytes)),
            Value::List(items) => {
                let parts = items
                    .iter()
                    .map(|item| self.literal_of(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", parts.join(",")))
            }
            Value::Custom(custom) => self
                .by_type
                .get(&custom.type_key().id)
                .and_then(|adapter| adapter.encode(custom))
                .map(|text| quote(&text))
                .ok_or_else(|| OrmError::missing_adapter(custom.type_key().name())),
        }
    }

    /// Converts a raw column value read from a column of `sql_type`.
    ///
    /// Values of storage types with a registered adapter are decoded by that
    /// adapter; everything else is returned unchanged.
    pub fn convert(&self, sql_type: &str, raw: Value) -> Result<Value> {
        let Some(adapter) = self.converters.get(&sql_type.to_ascii_uppercase()) else {
            return Ok(raw);
        };
        match raw.raw_bytes() {
            Some(bytes) => adapter.decode(&bytes),
            None => Ok(raw),
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn real_literal(value: f64) -> String {
    if value.is_nan() {
        return "NULL".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "9e999" } else { "-9e999" }.to_string();
    }
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

fn blob_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out.push('\'');
    out
}
