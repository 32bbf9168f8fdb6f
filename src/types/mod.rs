//! Logical field types and the pure casting functions behind them.
//!
//! Every cast returns [`CastResult`]: the typed [`Value`] on success, or a
//! [`CastFailure`] describing why the raw value was rejected. The failure arm
//! is the only error sentinel, so `Null`, `NaN` and empty collections are
//! always legitimate values.

pub mod geo;
pub mod numeric;
pub mod temporal;
pub mod text;

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow, bail};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::data::Value;

pub type CastResult = std::result::Result<Value, CastFailure>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct CastFailure {
    pub reason: String,
}

impl CastFailure {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub(crate) fn expected(type_name: &str, raw: &JsonValue) -> Self {
        Self::new(format!("Value {} is not a valid {type_name}", describe_raw(raw)))
    }
}

fn describe_raw(raw: &JsonValue) -> String {
    match raw {
        JsonValue::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    Array,
    Object,
    Date,
    Time,
    DateTime,
    Duration,
    Year,
    YearMonth,
    GeoPoint,
    GeoJson,
    Any,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Null => "null",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DateTime => "datetime",
            FieldType::Duration => "duration",
            FieldType::Year => "year",
            FieldType::YearMonth => "yearmonth",
            FieldType::GeoPoint => "geopoint",
            FieldType::GeoJson => "geojson",
            FieldType::Any => "any",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "string",
            "integer",
            "number",
            "boolean",
            "null",
            "array",
            "object",
            "date",
            "time",
            "datetime",
            "duration",
            "year",
            "yearmonth",
            "geopoint",
            "geojson",
            "any",
        ]
    }

    /// Named formats accepted by this type besides `default`. Temporal types
    /// additionally accept arbitrary strftime patterns.
    pub fn formats(&self) -> &'static [&'static str] {
        match self {
            FieldType::String => &["email", "uri", "uuid", "binary"],
            FieldType::Date | FieldType::Time | FieldType::DateTime => &["any"],
            FieldType::GeoPoint => &["array", "object"],
            FieldType::GeoJson => &["topojson"],
            _ => &[],
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Time | FieldType::DateTime)
    }

    /// Resolves a descriptor `format` string into the closed [`Format`] set.
    pub fn parse_format(&self, raw: &str) -> Result<Format> {
        if raw == "default" {
            return Ok(Format::Default);
        }
        let format = match (self, raw) {
            (FieldType::String, "email") => Format::Email,
            (FieldType::String, "uri") => Format::Uri,
            (FieldType::String, "uuid") => Format::Uuid,
            (FieldType::String, "binary") => Format::Binary,
            (FieldType::GeoPoint, "array") => Format::Array,
            (FieldType::GeoPoint, "object") => Format::Object,
            (FieldType::GeoJson, "topojson") => Format::TopoJson,
            (ty, "any") if ty.is_temporal() => Format::Any,
            (ty, pattern) if ty.is_temporal() => {
                let pattern = pattern.strip_prefix("fmt:").unwrap_or(pattern);
                temporal::validate_pattern(pattern)?;
                Format::Pattern(pattern.to_string())
            }
            (ty, other) => bail!(
                "Format '{other}' is not supported for type '{}' (expected one of: default{})",
                ty.as_str(),
                ty.formats()
                    .iter()
                    .map(|f| format!(", {f}"))
                    .collect::<String>()
            ),
        };
        Ok(format)
    }

    pub fn cast(&self, format: &Format, raw: &JsonValue, options: &CastOptions) -> CastResult {
        match self {
            FieldType::String => text::cast_string(format, raw),
            FieldType::Integer => numeric::cast_integer(raw, options),
            FieldType::Number => numeric::cast_number(raw, options),
            FieldType::Boolean => text::cast_boolean(raw, options),
            FieldType::Null => text::cast_null(raw),
            FieldType::Array => text::cast_array(raw),
            FieldType::Object => text::cast_object(raw),
            FieldType::Date => temporal::cast_date(format, raw),
            FieldType::Time => temporal::cast_time(format, raw),
            FieldType::DateTime => temporal::cast_datetime(format, raw),
            FieldType::Duration => temporal::cast_duration(raw),
            FieldType::Year => temporal::cast_year(raw),
            FieldType::YearMonth => temporal::cast_yearmonth(raw),
            FieldType::GeoPoint => geo::cast_geopoint(format, raw),
            FieldType::GeoJson => geo::cast_geojson(format, raw),
            FieldType::Any => Ok(Value::Any(raw.clone())),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "string" => Ok(FieldType::String),
            "integer" => Ok(FieldType::Integer),
            "number" => Ok(FieldType::Number),
            "boolean" => Ok(FieldType::Boolean),
            "null" => Ok(FieldType::Null),
            "array" => Ok(FieldType::Array),
            "object" => Ok(FieldType::Object),
            "date" => Ok(FieldType::Date),
            "time" => Ok(FieldType::Time),
            "datetime" => Ok(FieldType::DateTime),
            "duration" => Ok(FieldType::Duration),
            "year" => Ok(FieldType::Year),
            "yearmonth" => Ok(FieldType::YearMonth),
            "geopoint" => Ok(FieldType::GeoPoint),
            "geojson" => Ok(FieldType::GeoJson),
            "any" => Ok(FieldType::Any),
            other => Err(anyhow!(
                "Unknown field type '{other}'. Supported types: {}",
                FieldType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    Default,
    /// Permissive temporal parsing over a list of common layouts.
    Any,
    /// Explicit strftime pattern for temporal types.
    Pattern(String),
    Email,
    Uri,
    Uuid,
    Binary,
    Array,
    Object,
    TopoJson,
}

/// Lexical options of a field, parsed once when the field is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CastOptions {
    pub decimal_char: String,
    pub group_char: String,
    pub bare_number: bool,
    pub currency: bool,
    pub true_values: Option<Vec<String>>,
    pub false_values: Option<Vec<String>>,
}

impl Default for CastOptions {
    fn default() -> Self {
        Self {
            decimal_char: ".".to_string(),
            group_char: String::new(),
            bare_number: true,
            currency: false,
            true_values: None,
            false_values: None,
        }
    }
}

pub(crate) fn raw_str<'a>(raw: &'a JsonValue, type_name: &str) -> Result<&'a str, CastFailure> {
    raw.as_str()
        .ok_or_else(|| CastFailure::expected(type_name, raw))
}
