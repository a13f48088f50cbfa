//! Dynamically typed query values
//!
//! Result columns are only known at runtime, so each cell is decoded from
//! its wire bytes into a [`SqlValue`] chosen by the column's Postgres type.
//! Enums decode as their labels and domains as their base type. Arrays
//! decode element by element. Types without a mapping stay raw bytes.

use super::wire;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind, PgValueFormat, PgValueRef};
use sqlx::types::Uuid;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// A single decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Serialized as base64
    Bytes(Vec<u8>),
    /// JSON/JSONB columns, passed through as nested structure
    Json(serde_json::Value),
    Array(Vec<SqlValue>),
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_unit(),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Int(i) => serializer.serialize_i64(*i),
            SqlValue::Float(f) => serializer.serialize_f64(*f),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Bytes(b) => serializer.serialize_str(&BASE64.encode(b)),
            SqlValue::Json(v) => v.serialize(serializer),
            SqlValue::Array(items) => items.serialize(serializer),
        }
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// One result row: column name to value, in result-set column order
///
/// Serializes as a JSON object. A repeated column name keeps its first
/// position and the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column's value, replacing any earlier value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: SqlValue) {
        let name = name.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Decode every column of a Postgres row
pub fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let raw = row.try_get_raw(column.ordinal())?;
        let value = decode_value(raw, column.type_info()).map_err(|source| {
            sqlx::Error::ColumnDecode {
                index: format!("{:?}", column.name()),
                source,
            }
        })?;
        decoded.insert(column.name(), value);
    }
    Ok(decoded)
}

/// What decoding needs to know about a column's type
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ColumnType {
    /// Upper-cased type name, e.g. `INT4` or `NUMERIC`
    Named(String),
    Enum,
    Array(Box<ColumnType>),
}

impl ColumnType {
    pub(crate) fn of(ty: &PgTypeInfo) -> Self {
        match ty.kind() {
            PgTypeKind::Enum(_) => ColumnType::Enum,
            PgTypeKind::Array(element) => ColumnType::Array(Box::new(Self::of(element))),
            PgTypeKind::Domain(base) => Self::of(base),
            _ => ColumnType::Named(ty.name().to_ascii_uppercase()),
        }
    }
}

fn decode_value(raw: PgValueRef<'_>, ty: &PgTypeInfo) -> Result<SqlValue, BoxDynError> {
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    match raw.format() {
        PgValueFormat::Text => Ok(SqlValue::Text(raw.as_str()?.to_owned())),
        PgValueFormat::Binary => decode_binary(&ColumnType::of(ty), raw.as_bytes()?),
    }
}

/// Decode one binary-format value; types without a mapping stay raw bytes
pub(crate) fn decode_binary(ty: &ColumnType, bytes: &[u8]) -> Result<SqlValue, BoxDynError> {
    let name = match ty {
        ColumnType::Enum => return Ok(SqlValue::Text(std::str::from_utf8(bytes)?.to_owned())),
        ColumnType::Array(element) => {
            let array = wire::array(bytes)?;
            return nest(element, &array.dims, &mut array.elements.into_iter());
        }
        ColumnType::Named(name) => name.as_str(),
    };

    let value = match name {
        "BOOL" => SqlValue::Bool(wire::bool(bytes)?),
        "INT2" | "INT4" | "INT8" => SqlValue::Int(wire::int(bytes)?),
        "OID" | "REGCLASS" | "REGTYPE" | "REGPROC" | "XID" | "CID" => {
            SqlValue::Int(wire::oid(bytes)?.into())
        }
        "FLOAT4" | "FLOAT8" => float(wire::float(bytes)?),
        // Kept as text so no precision is lost
        "NUMERIC" => SqlValue::Text(wire::numeric(bytes)?),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "XML" | "CITEXT" => {
            SqlValue::Text(std::str::from_utf8(bytes)?.to_owned())
        }
        // The single-byte internal "char" type
        "\"CHAR\"" => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        "UUID" => SqlValue::Text(Uuid::from_slice(bytes)?.to_string()),
        "JSON" => SqlValue::Json(serde_json::from_slice(bytes)?),
        "JSONB" => SqlValue::Json(serde_json::from_slice(wire::jsonb(bytes)?)?),
        "BYTEA" => SqlValue::Bytes(bytes.to_vec()),
        "DATE" => SqlValue::Text(wire::date(bytes)?),
        "TIME" => SqlValue::Text(wire::time(bytes)?),
        "TIMETZ" => SqlValue::Text(wire::timetz(bytes)?),
        "TIMESTAMP" => SqlValue::Text(wire::timestamp(bytes)?),
        "TIMESTAMPTZ" => SqlValue::Text(wire::timestamptz(bytes)?),
        "INTERVAL" => SqlValue::Text(wire::format_interval(&wire::interval(bytes)?)),
        "INET" | "CIDR" => SqlValue::Text(wire::inet(bytes)?),
        _ => SqlValue::Bytes(bytes.to_vec()),
    };
    Ok(value)
}

/// Rebuild nested JSON arrays from row-major elements
fn nest<'a>(
    element: &ColumnType,
    dims: &[usize],
    items: &mut impl Iterator<Item = Option<&'a [u8]>>,
) -> Result<SqlValue, BoxDynError> {
    let Some((&len, inner)) = dims.split_first() else {
        return Ok(SqlValue::Array(Vec::new()));
    };

    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        let value = if inner.is_empty() {
            match items.next().flatten() {
                Some(bytes) => decode_binary(element, bytes)?,
                None => SqlValue::Null,
            }
        } else {
            nest(element, inner, items)?
        };
        values.push(value);
    }
    Ok(SqlValue::Array(values))
}

/// JSON has no NaN or infinity, so those become text
fn float(value: f64) -> SqlValue {
    if value.is_finite() {
        SqlValue::Float(value)
    } else if value.is_nan() {
        SqlValue::Text("NaN".to_string())
    } else if value > 0.0 {
        SqlValue::Text("Infinity".to_string())
    } else {
        SqlValue::Text("-Infinity".to_string())
    }
}
