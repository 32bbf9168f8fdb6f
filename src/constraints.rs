use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    data::Value,
    error::Error,
    types::{CastOptions, FieldType, Format},
};

/// The `constraints` member of a field descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<JsonValue>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        *self == Constraints::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Required,
    Unique,
    Pattern,
    Enum,
    MinLength,
    MaxLength,
    Minimum,
    Maximum,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::Required => "required",
            ConstraintKind::Unique => "unique",
            ConstraintKind::Pattern => "pattern",
            ConstraintKind::Enum => "enum",
            ConstraintKind::MinLength => "minLength",
            ConstraintKind::MaxLength => "maxLength",
            ConstraintKind::Minimum => "minimum",
            ConstraintKind::Maximum => "maximum",
        }
    }

    pub fn supported_by(&self, field_type: FieldType) -> bool {
        match self {
            ConstraintKind::MinLength | ConstraintKind::MaxLength => matches!(
                field_type,
                FieldType::String | FieldType::Array | FieldType::Object
            ),
            ConstraintKind::Minimum | ConstraintKind::Maximum => matches!(
                field_type,
                FieldType::Integer
                    | FieldType::Number
                    | FieldType::Date
                    | FieldType::Time
                    | FieldType::DateTime
                    | FieldType::Year
                    | FieldType::YearMonth
            ),
            _ => true,
        }
    }
}

/// Constraints compiled against one field's type: the pattern is anchored and
/// enum/range bounds are already cast to typed values.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    required: bool,
    unique: bool,
    pattern: Option<(String, Regex)>,
    enum_values: Option<Vec<Value>>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    minimum: Option<Value>,
    maximum: Option<Value>,
}

impl ConstraintSet {
    pub fn compile(
        field_name: &str,
        constraints: &Constraints,
        field_type: FieldType,
        format: &Format,
        options: &CastOptions,
    ) -> Result<Self, Vec<Error>> {
        let mut errors = Vec::new();
        let mut unsupported = |kind: ConstraintKind, present: bool| {
            if present && !kind.supported_by(field_type) {
                errors.push(Error::structural(format!(
                    "fields/{field_name}: constraint '{}' is not supported for type '{field_type}'",
                    kind.as_str()
                )));
            }
        };
        unsupported(ConstraintKind::MinLength, constraints.min_length.is_some());
        unsupported(ConstraintKind::MaxLength, constraints.max_length.is_some());
        unsupported(ConstraintKind::Minimum, constraints.minimum.is_some());
        unsupported(ConstraintKind::Maximum, constraints.maximum.is_some());

        let mut cast_bound = |kind: ConstraintKind, raw: &JsonValue| -> Option<Value> {
            match field_type.cast(format, raw, options) {
                Ok(value) => Some(value),
                Err(failure) => {
                    errors.push(Error::structural(format!(
                        "fields/{field_name}: constraint '{}' value {raw} cannot be cast to '{field_type}': {failure}",
                        kind.as_str()
                    )));
                    None
                }
            }
        };

        let enum_values = constraints.enum_values.as_ref().map(|values| {
            values
                .iter()
                .filter_map(|raw| cast_bound(ConstraintKind::Enum, raw))
                .collect::<Vec<_>>()
        });
        let minimum = if ConstraintKind::Minimum.supported_by(field_type) {
            constraints
                .minimum
                .as_ref()
                .and_then(|raw| cast_bound(ConstraintKind::Minimum, raw))
        } else {
            None
        };
        let maximum = if ConstraintKind::Maximum.supported_by(field_type) {
            constraints
                .maximum
                .as_ref()
                .and_then(|raw| cast_bound(ConstraintKind::Maximum, raw))
        } else {
            None
        };

        let pattern = match constraints.pattern.as_deref() {
            Some(source) => match Regex::new(&format!("^(?:{source})$")) {
                Ok(regex) => Some((source.to_string(), regex)),
                Err(err) => {
                    errors.push(Error::structural(format!(
                        "fields/{field_name}: constraint 'pattern' is not a valid regular expression: {err}"
                    )));
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            required: constraints.required.unwrap_or(false),
            unique: constraints.unique.unwrap_or(false),
            pattern,
            enum_values,
            min_length: constraints.min_length,
            max_length: constraints.max_length,
            minimum,
            maximum,
        })
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Evaluated on the raw text before casting. Non-string raw values are not
    /// subject to the pattern.
    pub fn check_raw(&self, field_name: &str, raw: &JsonValue) -> Result<(), Error> {
        if let (Some((source, regex)), JsonValue::String(text)) = (&self.pattern, raw)
            && !check_pattern(regex, text)
        {
            return Err(Error::constraint(
                ConstraintKind::Pattern.as_str(),
                format!("Value '{text}' of field '{field_name}' does not match the pattern '{source}'"),
            ));
        }
        Ok(())
    }

    /// Checks every value-level constraint, reporting the first violation.
    pub fn check_value(&self, field_name: &str, value: &Value) -> Result<(), Error> {
        let violation = |kind: ConstraintKind, message: String| {
            Err(Error::constraint(kind.as_str(), message))
        };
        if !check_required(self.required, value) {
            return violation(
                ConstraintKind::Required,
                format!("Field '{field_name}' requires a value"),
            );
        }
        if let Some(allowed) = &self.enum_values
            && !check_enum(allowed, value)
        {
            return violation(
                ConstraintKind::Enum,
                format!("Value '{value}' of field '{field_name}' is not one of the allowed values"),
            );
        }
        if let Some(min) = self.min_length
            && !check_min_length(min, value)
        {
            return violation(
                ConstraintKind::MinLength,
                format!("Value '{value}' of field '{field_name}' is shorter than {min}"),
            );
        }
        if let Some(max) = self.max_length
            && !check_max_length(max, value)
        {
            return violation(
                ConstraintKind::MaxLength,
                format!("Value '{value}' of field '{field_name}' is longer than {max}"),
            );
        }
        if let Some(min) = &self.minimum
            && !check_minimum(min, value)
        {
            return violation(
                ConstraintKind::Minimum,
                format!("Value '{value}' of field '{field_name}' is below the minimum {min}"),
            );
        }
        if let Some(max) = &self.maximum
            && !check_maximum(max, value)
        {
            return violation(
                ConstraintKind::Maximum,
                format!("Value '{value}' of field '{field_name}' is above the maximum {max}"),
            );
        }
        Ok(())
    }
}

pub fn check_required(required: bool, value: &Value) -> bool {
    !(required && value.is_null())
}

pub fn check_pattern(pattern: &Regex, raw: &str) -> bool {
    pattern.is_match(raw)
}

pub fn check_enum(allowed: &[Value], value: &Value) -> bool {
    value.is_null() || allowed.iter().any(|candidate| candidate == value)
}

pub fn check_min_length(min: usize, value: &Value) -> bool {
    value.length().is_none_or(|len| len >= min)
}

pub fn check_max_length(max: usize, value: &Value) -> bool {
    value.length().is_none_or(|len| len <= max)
}

pub fn check_minimum(min: &Value, value: &Value) -> bool {
    value.is_null() || value.compare(min).is_some_and(|ord| ord.is_ge())
}

pub fn check_maximum(max: &Value, value: &Value) -> bool {
    value.is_null() || value.compare(max).is_some_and(|ord| ord.is_le())
}
