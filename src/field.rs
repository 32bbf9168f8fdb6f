use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{
    constraints::{ConstraintSet, Constraints},
    data::Value,
    error::Error,
    types::{CastOptions, FieldType, Format},
};

fn default_type() -> String {
    "string".to_string()
}

fn default_format() -> String {
    "default".to_string()
}

/// One entry of the descriptor's `fields` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub field_type: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdf_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_char: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_char: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bare_number: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_values: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.as_str().to_string(),
            format: default_format(),
            constraints: Constraints::default(),
            title: None,
            description: None,
            rdf_type: None,
            decimal_char: None,
            group_char: None,
            bare_number: None,
            currency: None,
            true_values: None,
            false_values: None,
            extra: Map::new(),
        }
    }

    fn cast_options(&self) -> CastOptions {
        let defaults = CastOptions::default();
        CastOptions {
            decimal_char: self.decimal_char.clone().unwrap_or(defaults.decimal_char),
            group_char: self.group_char.clone().unwrap_or(defaults.group_char),
            bare_number: self.bare_number.unwrap_or(defaults.bare_number),
            currency: self.currency.unwrap_or(defaults.currency),
            true_values: self.true_values.clone(),
            false_values: self.false_values.clone(),
        }
    }
}

#[derive(Debug, Clone)]
enum FieldKind {
    Resolved {
        field_type: FieldType,
        format: Format,
        options: CastOptions,
        constraints: ConstraintSet,
    },
    /// Kept by non-strict schemas for descriptors that could not be resolved.
    Degraded { reason: String },
}

/// A column descriptor bound to its type, format, lexical options and
/// compiled constraints.
#[derive(Debug, Clone)]
pub struct Field {
    descriptor: FieldDescriptor,
    kind: FieldKind,
    missing_values: Vec<String>,
}

impl Field {
    pub fn build(descriptor: FieldDescriptor, missing_values: &[String]) -> Result<Self, Vec<Error>> {
        let name = descriptor.name.as_str();
        let field_type: FieldType = descriptor
            .field_type
            .parse()
            .map_err(|err| vec![Error::structural(format!("fields/{name}: {err}"))])?;
        let format = field_type
            .parse_format(&descriptor.format)
            .map_err(|err| vec![Error::structural(format!("fields/{name}: {err}"))])?;
        if descriptor.format.starts_with("fmt:") {
            warn!(
                "Field '{name}' uses the deprecated 'fmt:' format prefix; use '{}' instead",
                descriptor.format.trim_start_matches("fmt:")
            );
        }
        let options = descriptor.cast_options();
        if options.decimal_char.is_empty() {
            return Err(vec![Error::structural(format!(
                "fields/{name}: decimalChar must not be empty"
            ))]);
        }
        let constraints =
            ConstraintSet::compile(name, &descriptor.constraints, field_type, &format, &options)?;
        Ok(Self {
            kind: FieldKind::Resolved {
                field_type,
                format,
                options,
                constraints,
            },
            missing_values: missing_values.to_vec(),
            descriptor,
        })
    }

    /// A field whose every cast fails with `reason`.
    pub fn degraded(
        descriptor: FieldDescriptor,
        missing_values: &[String],
        reason: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            kind: FieldKind::Degraded {
                reason: reason.into(),
            },
            missing_values: missing_values.to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub fn field_type(&self) -> Option<FieldType> {
        match &self.kind {
            FieldKind::Resolved { field_type, .. } => Some(*field_type),
            FieldKind::Degraded { .. } => None,
        }
    }

    pub fn format(&self) -> Option<&Format> {
        match &self.kind {
            FieldKind::Resolved { format, .. } => Some(format),
            FieldKind::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.kind, FieldKind::Degraded { .. })
    }

    pub fn is_required(&self) -> bool {
        self.constraint_set().is_some_and(ConstraintSet::is_required)
    }

    pub fn is_unique(&self) -> bool {
        self.constraint_set().is_some_and(ConstraintSet::is_unique)
    }

    fn constraint_set(&self) -> Option<&ConstraintSet> {
        match &self.kind {
            FieldKind::Resolved { constraints, .. } => Some(constraints),
            FieldKind::Degraded { .. } => None,
        }
    }

    pub fn is_missing(&self, raw: &JsonValue) -> bool {
        match raw {
            JsonValue::Null => true,
            JsonValue::String(s) => self.missing_values.iter().any(|m| m == s),
            _ => false,
        }
    }

    /// Casts one raw cell. Missing values become `Null` before any check;
    /// `pattern` sees the raw text, every other constraint the typed value.
    pub fn cast_value(&self, raw: &JsonValue, check_constraints: bool) -> Result<Value, Error> {
        let name = self.name();
        let (field_type, format, options, constraints) = match &self.kind {
            FieldKind::Resolved {
                field_type,
                format,
                options,
                constraints,
            } => (field_type, format, options, constraints),
            FieldKind::Degraded { reason } => {
                return Err(Error::cast(format!(
                    "Field '{name}' cannot cast values: {reason}"
                )));
            }
        };

        if self.is_missing(raw) {
            if check_constraints {
                constraints.check_value(name, &Value::Null)?;
            }
            return Ok(Value::Null);
        }
        if check_constraints {
            constraints.check_raw(name, raw)?;
        }
        let value = field_type.cast(format, raw, options).map_err(|failure| {
            Error::cast(format!(
                "Field '{name}' cannot cast value to '{field_type}': {failure}"
            ))
        })?;
        if check_constraints {
            constraints.check_value(name, &value)?;
        }
        Ok(value)
    }

    pub fn test_value(&self, raw: &JsonValue, check_constraints: bool) -> bool {
        self.cast_value(raw, check_constraints).is_ok()
    }
}
