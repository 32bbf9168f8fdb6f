//! Structural validation of descriptors plus the key consistency passes.
//!
//! The structural profile is pluggable through [`ProfileValidator`]; the
//! built-in [`TableSchemaProfile`] covers the Table Schema shape rules. Key
//! consistency is always checked by the schema itself.

use std::{collections::HashSet, fmt::Debug};

use serde_json::{Map, Value as JsonValue};

use crate::{
    error::Error,
    schema::{Descriptor, KeyFields},
};

#[derive(Debug, Default)]
pub struct ProfileReport {
    pub valid: bool,
    pub errors: Vec<Error>,
}

impl ProfileReport {
    pub fn from_errors(errors: Vec<Error>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Structural check of a raw descriptor document.
pub trait ProfileValidator: Debug + Send + Sync {
    fn validate(&self, descriptor: &JsonValue) -> ProfileReport;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TableSchemaProfile;

impl ProfileValidator for TableSchemaProfile {
    fn validate(&self, descriptor: &JsonValue) -> ProfileReport {
        let mut errors = Vec::new();
        let Some(root) = descriptor.as_object() else {
            errors.push(Error::structural("descriptor must be an object"));
            return ProfileReport::from_errors(errors);
        };

        match root.get("fields") {
            Some(JsonValue::Array(fields)) => {
                for (idx, field) in fields.iter().enumerate() {
                    check_field(idx, field, &mut errors);
                }
            }
            Some(_) => errors.push(Error::structural("fields: must be an array")),
            None => errors.push(Error::structural("fields: is required")),
        }

        if let Some(pk) = root.get("primaryKey")
            && !is_key_fields(pk)
        {
            errors.push(Error::structural(
                "primaryKey: must be a string or an array of strings",
            ));
        }

        match root.get("foreignKeys") {
            None => {}
            Some(JsonValue::Array(keys)) => {
                for (idx, key) in keys.iter().enumerate() {
                    check_foreign_key(idx, key, &mut errors);
                }
            }
            Some(_) => errors.push(Error::structural("foreignKeys: must be an array")),
        }

        if let Some(missing) = root.get("missingValues")
            && !is_string_array(missing)
        {
            errors.push(Error::structural(
                "missingValues: must be an array of strings",
            ));
        }

        ProfileReport::from_errors(errors)
    }
}

fn is_string_array(value: &JsonValue) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(JsonValue::is_string))
}

fn is_key_fields(value: &JsonValue) -> bool {
    value.is_string() || is_string_array(value)
}

fn check_field(idx: usize, field: &JsonValue, errors: &mut Vec<Error>) {
    let Some(map) = field.as_object() else {
        errors.push(Error::structural(format!("fields/{idx}: must be an object")));
        return;
    };
    match map.get("name") {
        Some(JsonValue::String(name)) if !name.is_empty() => {}
        _ => errors.push(Error::structural(format!(
            "fields/{idx}/name: must be a non-empty string"
        ))),
    }
    for key in [
        "type",
        "format",
        "title",
        "description",
        "rdfType",
        "decimalChar",
        "groupChar",
    ] {
        expect_kind(map, key, idx, JsonValue::is_string, "a string", errors);
    }
    for key in ["bareNumber", "currency"] {
        expect_kind(map, key, idx, JsonValue::is_boolean, "a boolean", errors);
    }
    for key in ["trueValues", "falseValues"] {
        expect_kind(map, key, idx, is_string_array, "an array of strings", errors);
    }

    match map.get("constraints") {
        None => {}
        Some(JsonValue::Object(constraints)) => {
            let prefix = format!("{idx}/constraints");
            for key in ["required", "unique"] {
                expect_kind(constraints, key, &prefix, JsonValue::is_boolean, "a boolean", errors);
            }
            expect_kind(constraints, "pattern", &prefix, JsonValue::is_string, "a string", errors);
            for key in ["minLength", "maxLength"] {
                expect_kind(
                    constraints,
                    key,
                    &prefix,
                    JsonValue::is_u64,
                    "a non-negative integer",
                    errors,
                );
            }
            expect_kind(
                constraints,
                "enum",
                &prefix,
                |v| v.as_array().is_some_and(|items| !items.is_empty()),
                "a non-empty array",
                errors,
            );
        }
        Some(_) => errors.push(Error::structural(format!(
            "fields/{idx}/constraints: must be an object"
        ))),
    }
}

fn expect_kind(
    map: &Map<String, JsonValue>,
    key: &str,
    location: impl std::fmt::Display,
    check: impl Fn(&JsonValue) -> bool,
    expected: &str,
    errors: &mut Vec<Error>,
) {
    if let Some(value) = map.get(key)
        && !check(value)
    {
        errors.push(Error::structural(format!(
            "fields/{location}/{key}: must be {expected}"
        )));
    }
}

fn check_foreign_key(idx: usize, key: &JsonValue, errors: &mut Vec<Error>) {
    let Some(map) = key.as_object() else {
        errors.push(Error::structural(format!(
            "foreignKeys/{idx}: must be an object"
        )));
        return;
    };
    if !map.get("fields").is_some_and(is_key_fields) {
        errors.push(Error::structural(format!(
            "foreignKeys/{idx}/fields: must be a string or an array of strings"
        )));
    }
    match map.get("reference") {
        Some(JsonValue::Object(reference)) => {
            if !reference.get("resource").is_some_and(JsonValue::is_string) {
                errors.push(Error::structural(format!(
                    "foreignKeys/{idx}/reference/resource: must be a string"
                )));
            }
            if !reference.get("fields").is_some_and(is_key_fields) {
                errors.push(Error::structural(format!(
                    "foreignKeys/{idx}/reference/fields: must be a string or an array of strings"
                )));
            }
        }
        _ => errors.push(Error::structural(format!(
            "foreignKeys/{idx}/reference: must be an object"
        ))),
    }
}

/// Every primary key member must name an existing field.
pub fn check_primary_key(descriptor: &Descriptor) -> Vec<Error> {
    let Some(primary_key) = &descriptor.primary_key else {
        return Vec::new();
    };
    let names: HashSet<&str> = descriptor.fields.iter().map(|f| f.name.as_str()).collect();
    primary_key
        .names()
        .iter()
        .filter(|member| !names.contains(member.as_str()))
        .map(|member| Error::PrimaryKey {
            message: format!("primary key '{member}' must match a schema field name"),
        })
        .collect()
}

pub fn check_foreign_keys(descriptor: &Descriptor) -> Vec<Error> {
    let names: HashSet<&str> = descriptor.fields.iter().map(|f| f.name.as_str()).collect();
    let mut errors = Vec::new();
    for fk in &descriptor.foreign_keys {
        for member in fk.fields.names() {
            if !names.contains(member.as_str()) {
                errors.push(Error::ForeignKeyDescriptor {
                    message: format!("foreign key field '{member}' must match a schema field name"),
                });
            }
        }
        let same_shape = matches!(
            (&fk.fields, &fk.reference.fields),
            (KeyFields::Single(_), KeyFields::Single(_))
                | (KeyFields::Multiple(_), KeyFields::Multiple(_))
        );
        if !same_shape || fk.fields.len() != fk.reference.fields.len() {
            errors.push(Error::ForeignKeyDescriptor {
                message: format!(
                    "foreign key fields {:?} must have the same shape and arity as reference fields {:?}",
                    fk.fields.names(),
                    fk.reference.fields.names()
                ),
            });
        }
        if fk.reference.resource.is_empty() {
            for member in fk.reference.fields.names() {
                if !names.contains(member.as_str()) {
                    errors.push(Error::ForeignKeyDescriptor {
                        message: format!(
                            "self-referencing foreign key field '{member}' must match a schema field name"
                        ),
                    });
                }
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: JsonValue) -> Descriptor {
        serde_json::from_value(value).expect("descriptor")
    }

    #[test]
    fn structural_errors_are_collected() {
        let report = TableSchemaProfile.validate(&json!({
            "fields": [
                {"name": ""},
                {"name": "a", "constraints": {"required": "yes", "minLength": -1}},
                "oops"
            ],
            "primaryKey": 5,
            "missingValues": [1]
        }));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 6);
        assert!(
            report
                .errors
                .iter()
                .all(|e| matches!(e, Error::Structural { .. }))
        );
    }

    #[test]
    fn minimal_descriptor_is_valid() {
        let report = TableSchemaProfile.validate(&json!({"fields": [{"name": "id"}]}));
        assert!(report.valid);
        assert!(TableSchemaProfile.validate(&json!([])).errors.len() == 1);
    }

    #[test]
    fn primary_key_must_name_fields() {
        let errors = check_primary_key(&descriptor(json!({
            "fields": [{"name": "id"}],
            "primaryKey": "missing"
        })));
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::PrimaryKey { .. }));

        let errors = check_primary_key(&descriptor(json!({
            "fields": [{"name": "a"}, {"name": "b"}],
            "primaryKey": ["a", "b", "c"]
        })));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn foreign_key_shape_and_self_reference() {
        let errors = check_foreign_keys(&descriptor(json!({
            "fields": [{"name": "id"}, {"name": "parent"}],
            "foreignKeys": [
                {"fields": "parent", "reference": {"resource": "", "fields": "id"}},
                {"fields": "parent", "reference": {"resource": "", "fields": ["id"]}},
                {"fields": ["parent"], "reference": {"resource": "", "fields": ["nope"]}},
                {"fields": "ghost", "reference": {"resource": "other", "fields": "id"}}
            ]
        })));
        assert_eq!(errors.len(), 3);
        assert!(
            errors
                .iter()
                .all(|e| matches!(e, Error::ForeignKeyDescriptor { .. }))
        );
    }
}
