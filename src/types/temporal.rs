use anyhow::{Result, bail};
use chrono::{
    DateTime, NaiveDate, NaiveDateTime, NaiveTime,
    format::{Item, StrftimeItems},
};
use serde_json::Value as JsonValue;

use super::{CastFailure, CastResult, Format, raw_str};
use crate::data::{
    IsoDuration, Value, YearMonth, parse_naive_date, parse_naive_datetime, parse_naive_time,
};

const DEFAULT_DATE: &str = "%Y-%m-%d";
const DEFAULT_TIME: &str = "%H:%M:%S";
const DEFAULT_DATETIME: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Rejects strftime patterns chrono cannot interpret.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if !pattern.contains('%') {
        bail!("Format '{pattern}' is not a strftime pattern");
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        bail!("Format '{pattern}' contains an invalid strftime specifier");
    }
    Ok(())
}

pub fn cast_date(format: &Format, raw: &JsonValue) -> CastResult {
    let text = raw_str(raw, "date")?;
    let parsed = match format {
        Format::Any => parse_naive_date(text).ok(),
        Format::Pattern(pattern) => NaiveDate::parse_from_str(text, pattern).ok(),
        _ => NaiveDate::parse_from_str(text, DEFAULT_DATE).ok(),
    };
    parsed
        .map(Value::Date)
        .ok_or_else(|| CastFailure::expected("date", raw))
}

pub fn cast_time(format: &Format, raw: &JsonValue) -> CastResult {
    let text = raw_str(raw, "time")?;
    let parsed = match format {
        Format::Any => parse_naive_time(text).ok(),
        Format::Pattern(pattern) => NaiveTime::parse_from_str(text, pattern).ok(),
        _ => NaiveTime::parse_from_str(text, DEFAULT_TIME).ok(),
    };
    parsed
        .map(Value::Time)
        .ok_or_else(|| CastFailure::expected("time", raw))
}

pub fn cast_datetime(format: &Format, raw: &JsonValue) -> CastResult {
    let text = raw_str(raw, "datetime")?;
    let parsed = match format {
        Format::Any => parse_naive_datetime(text).ok(),
        Format::Pattern(pattern) => DateTime::parse_from_str(text, pattern)
            .map(|dt| dt.naive_utc())
            .or_else(|_| NaiveDateTime::parse_from_str(text, pattern))
            .ok(),
        _ => NaiveDateTime::parse_from_str(text, DEFAULT_DATETIME).ok(),
    };
    parsed
        .map(Value::DateTime)
        .ok_or_else(|| CastFailure::expected("datetime", raw))
}

pub fn cast_duration(raw: &JsonValue) -> CastResult {
    let text = raw_str(raw, "duration")?;
    text.parse::<IsoDuration>()
        .map(Value::Duration)
        .map_err(|err| CastFailure::new(format!("Value '{text}' is not a valid duration: {err}")))
}

pub fn cast_year(raw: &JsonValue) -> CastResult {
    let year = match raw {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse::<i64>().ok()
        }
        _ => None,
    };
    match year {
        Some(y) if (0..=9999).contains(&y) => Ok(Value::Year(y as i32)),
        _ => Err(CastFailure::expected("year", raw)),
    }
}

pub fn cast_yearmonth(raw: &JsonValue) -> CastResult {
    let parts = match raw {
        JsonValue::String(s) => s.split_once('-').and_then(|(year, month)| {
            let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
            if year.len() == 4 && digits(year) && month.len() <= 2 && digits(month) {
                Some((year.parse::<i64>().ok()?, month.parse::<i64>().ok()?))
            } else {
                None
            }
        }),
        JsonValue::Array(items) if items.len() == 2 => items[0].as_i64().zip(items[1].as_i64()),
        _ => None,
    };
    match parts {
        Some((year, month)) if (0..=9999).contains(&year) && (1..=12).contains(&month) => {
            Ok(Value::YearMonth(YearMonth {
                year: year as i32,
                month: month as u32,
            }))
        }
        _ => Err(CastFailure::expected("yearmonth", raw)),
    }
}
