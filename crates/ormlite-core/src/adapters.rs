//! Built-in adapters for booleans, dates and timestamps.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{OrmError, Result};
use crate::types::{Adapter, TypeRegistry, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Registers every built-in adapter.
pub fn register_builtin(types: &mut TypeRegistry) {
    types.register(BoolAdapter);
    types.register(DateTimeAdapter);
    types.register(DateAdapter);
}

fn utf8<'a>(sql_type: &str, raw: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(raw).map_err(|e| OrmError::convert(sql_type, e.to_string()))
}

/// Stores `bool` as `'T'` / `'F'` in a `BOOL` column.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolAdapter;

impl Adapter for BoolAdapter {
    type Value = bool;

    fn name(&self) -> &'static str {
        "bool"
    }

    fn sql_type(&self) -> &'static str {
        "BOOL"
    }

    fn adapt(&self, value: &bool) -> String {
        let flag = if *value { "T" } else { "F" };
        flag.to_string()
    }

    fn convert(&self, raw: &[u8]) -> Result<bool> {
        match raw {
            b"T" => Ok(true),
            b"F" => Ok(false),
            other => Err(OrmError::convert(
                "BOOL",
                format!("expected 'T' or 'F', got {:?}", String::from_utf8_lossy(other)),
            )),
        }
    }
}

/// Stores [`NaiveDate`] as ISO-8601 text in a `DATE` column.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateAdapter;

impl Adapter for DateAdapter {
    type Value = NaiveDate;

    fn name(&self) -> &'static str {
        "date"
    }

    fn sql_type(&self) -> &'static str {
        "DATE"
    }

    fn adapt(&self, value: &NaiveDate) -> String {
        value.format(DATE_FORMAT).to_string()
    }

    fn convert(&self, raw: &[u8]) -> Result<NaiveDate> {
        let text = utf8("DATE", raw)?;
        NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map_err(|e| OrmError::convert("DATE", format!("{text:?}: {e}")))
    }
}

/// Stores [`NaiveDateTime`] as ISO-8601 text in a `TIMESTAMP` column.
///
/// Fractional seconds are written only when present. Both `T` and a space
/// are accepted as the date/time separator when reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeAdapter;

impl Adapter for DateTimeAdapter {
    type Value = NaiveDateTime;

    fn name(&self) -> &'static str {
        "datetime"
    }

    fn sql_type(&self) -> &'static str {
        "TIMESTAMP"
    }

    fn adapt(&self, value: &NaiveDateTime) -> String {
        value.format(DATETIME_FORMAT).to_string()
    }

    fn convert(&self, raw: &[u8]) -> Result<NaiveDateTime> {
        let text = utf8("TIMESTAMP", raw)?;
        NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .map_err(|e| OrmError::convert("TIMESTAMP", format!("{text:?}: {e}")))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::custom(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::custom(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::custom(v)
    }
}
