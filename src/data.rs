use std::{cmp::Ordering, fmt, str::FromStr};

use anyhow::{Result, anyhow, bail, ensure};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

/// A successfully cast cell. Cast failures are never represented here; they
/// travel as the `Err` arm of [`crate::types::CastResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Null,
    Array(Vec<JsonValue>),
    Object(Map<String, JsonValue>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Always expressed in UTC.
    DateTime(NaiveDateTime),
    Duration(IsoDuration),
    Year(i32),
    YearMonth(YearMonth),
    GeoPoint(GeoPoint),
    GeoJson(JsonValue),
    Any(JsonValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lon, self.lat)
    }
}

/// ISO 8601 duration (`PnYnMnDTnHnMnS`). Calendar components are kept apart
/// because their length in seconds depends on the anchor date.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IsoDuration {
    pub years: u64,
    pub months: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: f64,
}

impl FromStr for IsoDuration {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let body = value
            .strip_prefix('P')
            .ok_or_else(|| anyhow!("Duration '{value}' must start with 'P'"))?;
        ensure!(!body.is_empty(), "Duration '{value}' has no components");
        let (date_part, time_part) = match body.split_once('T') {
            Some((date, time)) => {
                ensure!(!time.is_empty(), "Duration '{value}' has an empty time part");
                (date, Some(time))
            }
            None => (body, None),
        };

        let mut duration = IsoDuration::default();
        for (designator, amount) in duration_components(date_part, &['Y', 'M', 'W', 'D'])? {
            let amount: u64 = amount
                .parse()
                .map_err(|_| anyhow!("Invalid duration amount '{amount}' in '{value}'"))?;
            match designator {
                'Y' => duration.years = amount,
                'M' => duration.months = amount,
                'W' => duration.days = duration.days.saturating_add(amount.saturating_mul(7)),
                _ => duration.days = duration.days.saturating_add(amount),
            }
        }
        if let Some(time) = time_part {
            for (designator, amount) in duration_components(time, &['H', 'M', 'S'])? {
                match designator {
                    'S' => {
                        duration.seconds = amount.replace(',', ".").parse().map_err(|_| {
                            anyhow!("Invalid duration seconds '{amount}' in '{value}'")
                        })?
                    }
                    other => {
                        let amount: u64 = amount.parse().map_err(|_| {
                            anyhow!("Invalid duration amount '{amount}' in '{value}'")
                        })?;
                        if other == 'H' {
                            duration.hours = amount;
                        } else {
                            duration.minutes = amount;
                        }
                    }
                }
            }
        }
        Ok(duration)
    }
}

/// Splits `1Y2M3D` into designator/amount pairs, enforcing designator order.
fn duration_components<'a>(part: &'a str, designators: &[char]) -> Result<Vec<(char, &'a str)>> {
    let mut components = Vec::new();
    let mut start = 0usize;
    let mut next_allowed = 0usize;
    for (idx, ch) in part.char_indices() {
        if ch.is_ascii_digit() || ch == '.' || ch == ',' {
            continue;
        }
        let position = designators
            .iter()
            .position(|d| *d == ch)
            .ok_or_else(|| anyhow!("Unexpected duration designator '{ch}'"))?;
        ensure!(
            position >= next_allowed,
            "Duration designator '{ch}' is out of order"
        );
        let amount = &part[start..idx];
        ensure!(!amount.is_empty(), "Duration designator '{ch}' has no amount");
        components.push((ch, amount));
        next_allowed = position + 1;
        start = idx + ch.len_utf8();
    }
    if start != part.len() {
        bail!("Duration component '{}' has no designator", &part[start..]);
    }
    Ok(components)
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("P");
        if self.years > 0 {
            out.push_str(&format!("{}Y", self.years));
        }
        if self.months > 0 {
            out.push_str(&format!("{}M", self.months));
        }
        if self.days > 0 {
            out.push_str(&format!("{}D", self.days));
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0.0 {
            out.push('T');
            if self.hours > 0 {
                out.push_str(&format!("{}H", self.hours));
            }
            if self.minutes > 0 {
                out.push_str(&format!("{}M", self.minutes));
            }
            if self.seconds > 0.0 {
                out.push_str(&format!("{}S", self.seconds));
            }
        }
        if out.len() == 1 {
            out.push_str("T0S");
        }
        f.write_str(&out)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Maps an uncast source value onto the closest variant without any parsing.
    pub fn from_raw(raw: JsonValue) -> Self {
        match raw {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Array(items),
            JsonValue::Object(map) => Value::Object(map),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Duration(_) => "duration",
            Value::Year(_) => "year",
            Value::YearMonth(_) => "yearmonth",
            Value::GeoPoint(_) => "geopoint",
            Value::GeoJson(_) => "geojson",
            Value::Any(_) => "any",
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Number(f) => format_number(*f),
            Value::Boolean(b) => b.to_string(),
            Value::Null => String::new(),
            Value::Array(items) => JsonValue::Array(items.clone()).to_string(),
            Value::Object(map) => JsonValue::Object(map.clone()).to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            Value::Duration(d) => d.to_string(),
            Value::Year(y) => format!("{y:04}"),
            Value::YearMonth(ym) => ym.to_string(),
            Value::GeoPoint(p) => p.to_string(),
            Value::GeoJson(json) => json.to_string(),
            Value::Any(JsonValue::String(s)) => s.clone(),
            Value::Any(json) => json.to_string(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Number(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(format_number(*f))),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Null => JsonValue::Null,
            Value::Array(items) => JsonValue::Array(items.clone()),
            Value::Object(map) => JsonValue::Object(map.clone()),
            Value::Year(y) => JsonValue::from(*y),
            Value::GeoPoint(p) => serde_json::json!([p.lon, p.lat]),
            Value::GeoJson(json) | Value::Any(json) => json.clone(),
            Value::Date(_)
            | Value::Time(_)
            | Value::DateTime(_)
            | Value::Duration(_)
            | Value::YearMonth(_) => JsonValue::String(self.as_display()),
        }
    }

    /// Character count for strings, item count for collections.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Orders two values of the same logical type. Integers and numbers are
    /// mutually comparable; everything else compares only within its variant.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Number(b)) => (*a as f64).partial_cmp(b),
            (Value::Number(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Year(a), Value::Year(b)) => Some(a.cmp(b)),
            (Value::YearMonth(a), Value::YearMonth(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Canonical token used by uniqueness tracking. `-0.0` and `0.0` share one.
    pub fn unique_key(&self) -> String {
        match self {
            Value::Number(f) if *f == 0.0 => Value::Number(0.0).to_json().to_string(),
            _ => self.to_json().to_string(),
        }
    }

    /// Compares a typed value with a cell of a reference dataset. Reference
    /// cells may be typed JSON or untyped text, so text falls back to the
    /// value's display form.
    pub fn matches_reference(&self, reference: &JsonValue) -> bool {
        match (self, reference) {
            (Value::Null, JsonValue::Null) => true,
            (Value::Null, _) | (_, JsonValue::Null) => false,
            (Value::Integer(a), JsonValue::Number(n)) => match n.as_i64() {
                Some(b) => *a == b,
                None => n.as_f64() == Some(*a as f64),
            },
            (Value::Number(a), JsonValue::Number(n)) => n.as_f64() == Some(*a),
            (_, JsonValue::String(s)) => self.as_display() == *s,
            _ => self.to_json() == *reference,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        value.to_string()
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%d/%m/%Y",
        "%m/%d/%Y",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%d.%m.%Y",
        "%Y%m%d",
        "%B %d, %Y",
        "%b %d, %Y",
        "%d %B %Y",
        "%d %b %Y",
    ];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_naive_time(value: &str) -> Result<NaiveTime> {
    const TIME_FORMATS: &[&str] = &[
        "%H:%M:%S",
        "%H:%M:%S%.f",
        "%H:%M",
        "%I:%M:%S %p",
        "%I:%M %p",
        "%H%M%S",
    ];
    for fmt in TIME_FORMATS {
        if let Ok(parsed) = NaiveTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as time"))
}
