use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DbErr, QueryResult};
use serde::ser::{Serialize, SerializeMap, Serializer};
use uuid::Uuid;

// 2^63; every float of smaller magnitude truncates into an i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A loosely typed cell read from a data-driven query
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Bool(bool),
}

impl FieldValue {
    /// Decodes the column at `index`, whatever its SQL type.
    pub fn from_row(row: &QueryResult, index: usize) -> Result<Self, DbErr> {
        if let Ok(value) = row.try_get_by_index::<Option<i64>>(index) {
            return Ok(value.map_or(Self::Null, Self::Integer));
        }
        if let Ok(value) = row.try_get_by_index::<Option<i32>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Integer(v.into())));
        }
        if let Ok(value) = row.try_get_by_index::<Option<i16>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Integer(v.into())));
        }
        if let Ok(value) = row.try_get_by_index::<Option<String>>(index) {
            return Ok(value.map_or(Self::Null, Self::Text));
        }
        if let Ok(value) = row.try_get_by_index::<Option<f64>>(index) {
            return Ok(value.map_or(Self::Null, Self::Float));
        }
        if let Ok(value) = row.try_get_by_index::<Option<f32>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Float(v.into())));
        }
        if let Ok(value) = row.try_get_by_index::<Option<Decimal>>(index) {
            return Ok(value.map_or(Self::Null, Self::Decimal));
        }
        if let Ok(value) = row.try_get_by_index::<Option<bool>>(index) {
            return Ok(value.map_or(Self::Null, Self::Bool));
        }
        if let Ok(value) = row.try_get_by_index::<Option<NaiveDateTime>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Text(v.to_string())));
        }
        if let Ok(value) = row.try_get_by_index::<Option<NaiveDate>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Text(v.to_string())));
        }
        if let Ok(value) = row.try_get_by_index::<Option<DateTime<Utc>>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Text(v.to_rfc3339())));
        }
        if let Ok(value) = row.try_get_by_index::<Option<DateTime<FixedOffset>>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Text(v.to_rfc3339())));
        }
        if let Ok(value) = row.try_get_by_index::<Option<NaiveTime>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Text(v.to_string())));
        }
        if let Ok(value) = row.try_get_by_index::<Option<Uuid>>(index) {
            return Ok(value.map_or(Self::Null, |v| Self::Text(v.to_string())));
        }

        Err(DbErr::Type(format!(
            "column {} is missing or has an unsupported type",
            index
        )))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text written into the label's CSV data source.
    ///
    /// Floats are truncated toward zero; labels never carry fractional values.
    /// Floats outside the `i64` range (and NaN) keep their plain text form.
    /// Booleans are written as `True` / `False`, which is what existing
    /// templates expect.
    pub fn label_text(&self) -> String {
        match self {
            Self::Float(f) if f.is_finite() && f.abs() < I64_BOUND => {
                (f.trunc() as i64).to_string()
            }
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Column name to value mapping that keeps the order of the query's columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    entries: Vec<(String, FieldValue)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field; an existing name keeps its position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<N: Into<String>, V: Into<FieldValue>> FromIterator<(N, V)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut set = FieldSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
