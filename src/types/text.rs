use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::{CastFailure, CastOptions, CastResult, Format, raw_str};
use crate::data::Value;

const DEFAULT_TRUE_VALUES: &[&str] = &["yes", "y", "true", "t", "1"];
const DEFAULT_FALSE_VALUES: &[&str] = &["no", "n", "false", "f", "0"];
const NULL_LITERALS: &[&str] = &["null", "none", "nil", "nan", "-", ""];

pub fn cast_string(format: &Format, raw: &JsonValue) -> CastResult {
    let text = raw_str(raw, "string")?;
    let valid = match format {
        Format::Email => is_email(text),
        Format::Uri => is_uri(text),
        Format::Uuid => Uuid::parse_str(text).is_ok(),
        Format::Binary => STANDARD.decode(text).is_ok(),
        _ => true,
    };
    if valid {
        Ok(Value::String(text.to_string()))
    } else {
        Err(CastFailure::new(format!(
            "Value '{text}' does not match the string format {format:?}"
        )))
    }
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !text.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

fn is_uri(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
        && !text.chars().any(char::is_whitespace)
}

pub fn cast_boolean(raw: &JsonValue, options: &CastOptions) -> CastResult {
    let literal = match raw {
        JsonValue::Bool(b) => return Ok(Value::Boolean(*b)),
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        _ => return Err(CastFailure::expected("boolean", raw)),
    };
    if matches_literal(&literal, options.true_values.as_deref(), DEFAULT_TRUE_VALUES) {
        Ok(Value::Boolean(true))
    } else if matches_literal(&literal, options.false_values.as_deref(), DEFAULT_FALSE_VALUES) {
        Ok(Value::Boolean(false))
    } else {
        Err(CastFailure::expected("boolean", raw))
    }
}

/// Custom literal sets match exactly; the default sets ignore case and padding.
fn matches_literal(literal: &str, custom: Option<&[String]>, defaults: &[&str]) -> bool {
    match custom {
        Some(values) => values.iter().any(|v| v == literal),
        None => {
            let lowered = literal.trim().to_ascii_lowercase();
            defaults.contains(&lowered.as_str())
        }
    }
}

pub fn cast_null(raw: &JsonValue) -> CastResult {
    match raw {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s)
            if NULL_LITERALS.contains(&s.trim().to_ascii_lowercase().as_str()) =>
        {
            Ok(Value::Null)
        }
        _ => Err(CastFailure::expected("null", raw)),
    }
}

pub fn cast_array(raw: &JsonValue) -> CastResult {
    match raw {
        JsonValue::Array(items) => Ok(Value::Array(items.clone())),
        JsonValue::String(s) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Array(items)) => Ok(Value::Array(items)),
            _ => Err(CastFailure::expected("array", raw)),
        },
        _ => Err(CastFailure::expected("array", raw)),
    }
}

pub fn cast_object(raw: &JsonValue) -> CastResult {
    match raw {
        JsonValue::Object(map) => Ok(Value::Object(map.clone())),
        JsonValue::String(s) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Object(map)) => Ok(Value::Object(map)),
            _ => Err(CastFailure::expected("object", raw)),
        },
        _ => Err(CastFailure::expected("object", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_formats_validate_syntax() {
        assert!(cast_string(&Format::Email, &json!("ada@example.org")).is_ok());
        assert!(cast_string(&Format::Email, &json!("ada@localhost")).is_err());
        assert!(cast_string(&Format::Uri, &json!("https://example.org/a?b=c")).is_ok());
        assert!(cast_string(&Format::Uri, &json!("not a uri")).is_err());
        assert!(
            cast_string(&Format::Uuid, &json!("67e55044-10b1-426f-9247-bb680e5fe0c8")).is_ok()
        );
        assert!(cast_string(&Format::Uuid, &json!("67e55044")).is_err());
        assert!(cast_string(&Format::Binary, &json!("aGVsbG8=")).is_ok());
        assert!(cast_string(&Format::Binary, &json!("***")).is_err());
        assert!(cast_string(&Format::Default, &json!(5)).is_err());
    }

    #[test]
    fn custom_boolean_literals_are_exact() {
        let options = CastOptions {
            true_values: Some(vec!["Ja".to_string()]),
            false_values: Some(vec!["Nein".to_string()]),
            ..CastOptions::default()
        };
        assert_eq!(cast_boolean(&json!("Ja"), &options), Ok(Value::Boolean(true)));
        assert_eq!(cast_boolean(&json!("Nein"), &options), Ok(Value::Boolean(false)));
        assert!(cast_boolean(&json!("ja"), &options).is_err());
        assert!(cast_boolean(&json!("yes"), &options).is_err());
        assert_eq!(cast_boolean(&json!(true), &options), Ok(Value::Boolean(true)));
    }

    #[test]
    fn null_literals() {
        for raw in ["", "null", "NONE", "nil", "-", "NaN"] {
            assert_eq!(cast_null(&json!(raw)), Ok(Value::Null), "{raw}");
        }
        assert!(cast_null(&json!("0")).is_err());
    }

    #[test]
    fn collections_accept_native_and_encoded_forms() {
        assert_eq!(cast_array(&json!("[1, 2]")), Ok(Value::Array(vec![json!(1), json!(2)])));
        assert_eq!(cast_array(&json!("[]")), Ok(Value::Array(Vec::new())));
        assert!(cast_array(&json!("{}")).is_err());
        assert!(cast_object(&json!("{\"a\": 1}")).is_ok());
        assert!(cast_object(&json!("[1]")).is_err());
    }
}
