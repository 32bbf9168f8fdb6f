use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{
    data::Value,
    error::{Error, Result},
    field::{Field, FieldDescriptor},
    infer,
    profile::{ProfileValidator, TableSchemaProfile, check_foreign_keys, check_primary_key},
};

fn default_missing_values() -> Vec<String> {
    vec![String::new()]
}

/// A Table Schema descriptor. Unknown top-level properties are kept in
/// `extra` and written back verbatim on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<KeyFields>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default = "default_missing_values")]
    pub missing_values: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            missing_values: default_missing_values(),
            extra: Map::new(),
        }
    }
}

/// `"name"` or `["a", "b"]`; the two shapes are distinct for foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyFields {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyFields {
    pub fn names(&self) -> &[String] {
        match self {
            KeyFields::Single(name) => std::slice::from_ref(name),
            KeyFields::Multiple(names) => names,
        }
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub fields: KeyFields,
    pub reference: Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub resource: String,
    pub fields: KeyFields,
}

impl Reference {
    /// An empty resource name refers to the dataset being read.
    pub fn is_self_reference(&self) -> bool {
        self.resource.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Fail construction on any descriptor error instead of recording it.
    pub strict: bool,
    pub profile: Arc<dyn ProfileValidator>,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            strict: false,
            profile: Arc::new(TableSchemaProfile),
        }
    }
}

impl SchemaOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CastRowOptions {
    pub fail_fast: bool,
    pub skip_constraints: bool,
}

#[derive(Debug)]
pub struct Schema {
    descriptor: Descriptor,
    pending: Option<Descriptor>,
    fields: Vec<Field>,
    errors: Vec<Error>,
    profile: Arc<dyn ProfileValidator>,
}

impl Schema {
    pub fn new(descriptor: Descriptor) -> Result<Self> {
        Self::with_options(descriptor, SchemaOptions::default())
    }

    pub fn with_options(descriptor: Descriptor, options: SchemaOptions) -> Result<Self> {
        let raw = serde_json::to_value(&descriptor)
            .map_err(|err| Error::structural(format!("descriptor is not serializable: {err}")))?;
        Self::from_value(raw, options)
    }

    /// Builds from a raw descriptor document. The document is validated
    /// structurally before it is interpreted, so malformed descriptors still
    /// produce a (degraded) schema in non-strict mode.
    pub fn from_value(raw: JsonValue, options: SchemaOptions) -> Result<Self> {
        let report = options.profile.validate(&raw);
        let mut errors = report.errors;

        let (descriptor, unreadable) = match serde_json::from_value::<Descriptor>(raw.clone()) {
            Ok(descriptor) => (descriptor, Vec::new()),
            Err(err) => {
                if errors.is_empty() {
                    errors.push(Error::structural(format!(
                        "descriptor could not be read: {err}"
                    )));
                }
                lenient_descriptor(&raw)
            }
        };

        errors.extend(check_primary_key(&descriptor));
        errors.extend(check_foreign_keys(&descriptor));

        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for (idx, field_descriptor) in descriptor.fields.iter().enumerate() {
            if unreadable.contains(&idx) {
                fields.push(Field::degraded(
                    field_descriptor.clone(),
                    &descriptor.missing_values,
                    "field descriptor could not be read",
                ));
                continue;
            }
            match Field::build(field_descriptor.clone(), &descriptor.missing_values) {
                Ok(field) => fields.push(field),
                Err(field_errors) => {
                    let reason = field_errors
                        .first()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    fields.push(Field::degraded(
                        field_descriptor.clone(),
                        &descriptor.missing_values,
                        reason,
                    ));
                    errors.extend(field_errors);
                }
            }
        }

        if options.strict && !errors.is_empty() {
            return Err(Error::InvalidSchema { errors });
        }
        debug!(
            "Built schema with {} field(s); {} descriptor error(s)",
            fields.len(),
            errors.len()
        );
        Ok(Self {
            descriptor,
            pending: None,
            fields,
            errors,
            profile: options.profile,
        })
    }

    /// Loads a JSON or YAML descriptor file and builds a schema from it.
    pub fn load(path: &Path, options: SchemaOptions) -> anyhow::Result<Self> {
        let raw = load_descriptor(path)?;
        Self::from_value(raw, options)
            .with_context(|| format!("Building schema from {path:?}"))
    }

    /// Infers field types from sample rows; see [`infer::infer_descriptor`].
    pub fn infer(headers: &[String], rows: &[Vec<JsonValue>]) -> Result<Self> {
        let descriptor = infer::infer_descriptor(headers, rows, &default_missing_values());
        Self::new(descriptor)
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name() == name)
    }

    pub fn primary_key(&self) -> &[String] {
        self.descriptor
            .primary_key
            .as_ref()
            .map(KeyFields::names)
            .unwrap_or_default()
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.descriptor.foreign_keys
    }

    pub fn missing_values(&self) -> &[String] {
        &self.descriptor.missing_values
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Casts a whole row positionally. A length mismatch is reported on its
    /// own; column failures carry their 1-based column number.
    pub fn cast_row(&self, row: &[JsonValue], options: &CastRowOptions) -> Result<Vec<Value>> {
        if row.len() != self.fields.len() {
            return Err(Error::row_shape(self.fields.len(), row.len()));
        }
        let mut values = Vec::with_capacity(row.len());
        let mut errors = Vec::new();
        for (idx, (field, raw)) in self.fields.iter().zip(row).enumerate() {
            match field.cast_value(raw, !options.skip_constraints) {
                Ok(value) => values.push(value),
                Err(err) => {
                    let err = err.with_column_number(idx + 1);
                    if options.fail_fast {
                        return Err(err);
                    }
                    errors.push(err);
                }
            }
        }
        if errors.is_empty() {
            Ok(values)
        } else {
            Err(Error::cast_errors(errors))
        }
    }

    /// Staged copy of the descriptor; changes take effect on [`Schema::commit`].
    pub fn descriptor_mut(&mut self) -> &mut Descriptor {
        self.pending.get_or_insert_with(|| self.descriptor.clone())
    }

    pub fn add_field(&mut self, field: FieldDescriptor) {
        self.descriptor_mut().fields.push(field);
    }

    pub fn remove_field(&mut self, name: &str) -> Option<FieldDescriptor> {
        let descriptor = self.descriptor_mut();
        let position = descriptor.fields.iter().position(|f| f.name == name)?;
        Some(descriptor.fields.remove(position))
    }

    /// Rebuilds the schema from the staged descriptor. Returns `false` when
    /// nothing changed. A failed rebuild leaves the schema untouched and the
    /// staged changes in place.
    pub fn commit(&mut self, strict: bool) -> Result<bool> {
        let Some(pending) = self.pending.take() else {
            return Ok(false);
        };
        if pending == self.descriptor {
            return Ok(false);
        }
        let options = SchemaOptions {
            strict,
            profile: Arc::clone(&self.profile),
        };
        match Self::with_options(pending.clone(), options) {
            Ok(rebuilt) => {
                info!(
                    "Committed schema changes ({} field(s))",
                    rebuilt.fields.len()
                );
                *self = rebuilt;
                Ok(true)
            }
            Err(err) => {
                self.pending = Some(pending);
                Err(err)
            }
        }
    }

    /// Writes the descriptor as JSON or YAML, chosen by file extension.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let rendered = match extension(path).as_deref() {
            Some("json") => serde_json::to_string_pretty(&self.descriptor)
                .context("Serializing schema descriptor to JSON")?,
            Some("yml") | Some("yaml") => serde_yaml::to_string(&self.descriptor)
                .context("Serializing schema descriptor to YAML")?,
            _ => bail!("Unsupported descriptor extension for {path:?} (expected .json, .yml or .yaml)"),
        };
        fs::write(path, rendered).with_context(|| format!("Writing schema file {path:?}"))?;
        info!("Saved schema descriptor to {path:?}");
        Ok(())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Reads a JSON or YAML descriptor document from disk without interpreting it.
pub fn load_descriptor(path: &Path) -> anyhow::Result<JsonValue> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading schema file {path:?}"))?;
    match extension(path).as_deref() {
        Some("yml") | Some("yaml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Parsing YAML descriptor {path:?}")),
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Parsing JSON descriptor {path:?}")),
    }
}

/// Best-effort reading of a descriptor that does not deserialize as a whole.
/// Returns the descriptor and the indices of fields that had to be replaced.
fn lenient_descriptor(raw: &JsonValue) -> (Descriptor, Vec<usize>) {
    let mut descriptor = Descriptor::default();
    let mut unreadable = Vec::new();
    let Some(root) = raw.as_object() else {
        return (descriptor, unreadable);
    };
    if let Some(JsonValue::Array(items)) = root.get("fields") {
        for (idx, item) in items.iter().enumerate() {
            match serde_json::from_value::<FieldDescriptor>(item.clone()) {
                Ok(field) => descriptor.fields.push(field),
                Err(_) => {
                    let name = item
                        .get("name")
                        .and_then(JsonValue::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("field{}", idx + 1));
                    descriptor
                        .fields
                        .push(FieldDescriptor::new(name, crate::types::FieldType::String));
                    unreadable.push(idx);
                }
            }
        }
    }
    descriptor.primary_key = root
        .get("primaryKey")
        .and_then(|pk| serde_json::from_value(pk.clone()).ok());
    if let Some(JsonValue::Array(keys)) = root.get("foreignKeys") {
        descriptor.foreign_keys = keys
            .iter()
            .filter_map(|key| serde_json::from_value(key.clone()).ok())
            .collect();
    }
    if let Some(missing) = root
        .get("missingValues")
        .and_then(|m| serde_json::from_value(m.clone()).ok())
    {
        descriptor.missing_values = missing;
    }
    (descriptor, unreadable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: JsonValue) -> Schema {
        Schema::from_value(value, SchemaOptions::default()).expect("non-strict build")
    }

    #[test]
    fn defaults_are_expanded() {
        let schema = schema(json!({"fields": [{"name": "id"}]}));
        assert!(schema.is_valid());
        assert_eq!(schema.missing_values(), &[String::new()]);
        let field = schema.field("id").expect("id field");
        assert_eq!(field.descriptor().field_type, "string");
        assert_eq!(field.descriptor().format, "default");
    }

    #[test]
    fn strict_build_aggregates_every_error() {
        let err = Schema::from_value(
            json!({
                "fields": [{"name": "id", "type": "money"}, {"name": "b"}],
                "primaryKey": "missing"
            }),
            SchemaOptions::strict(),
        )
        .expect_err("invalid schema");
        match err {
            Error::InvalidSchema { errors } => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| matches!(e, Error::PrimaryKey { .. })));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn non_strict_keeps_degraded_fields() {
        let schema = schema(json!({
            "fields": [
                {"name": "a", "type": "integer"},
                {"name": "b", "constraints": {"minLength": "three"}}
            ]
        }));
        assert!(!schema.is_valid());
        assert_eq!(schema.fields().len(), 2);
        assert!(!schema.fields()[0].is_degraded());
        assert!(schema.fields()[1].is_degraded());
    }

    #[test]
    fn descriptor_is_copied_on_build() {
        let mut raw = json!({"fields": [{"name": "id", "type": "integer"}]});
        let schema = schema(raw.clone());
        raw["fields"][0]["type"] = json!("string");
        assert_eq!(schema.descriptor().fields[0].field_type, "integer");
    }

    #[test]
    fn cast_row_collects_errors_in_column_order() {
        let schema = schema(json!({"fields": [
            {"name": "a", "type": "integer"},
            {"name": "b", "type": "boolean"},
            {"name": "c", "type": "integer"}
        ]}));
        let err = schema
            .cast_row(&[json!("x"), json!("true"), json!("y")], &CastRowOptions::default())
            .expect_err("two bad columns");
        let columns: Vec<_> = err.nested().iter().map(Error::column_number).collect();
        assert_eq!(columns, vec![Some(1), Some(3)]);

        let first = schema
            .cast_row(
                &[json!("x"), json!("true"), json!("y")],
                &CastRowOptions {
                    fail_fast: true,
                    ..CastRowOptions::default()
                },
            )
            .expect_err("fail fast");
        assert!(first.nested().is_empty());
        assert_eq!(first.column_number(), Some(1));
    }

    #[test]
    fn skip_constraints_only_casts() {
        let schema = schema(json!({"fields": [
            {"name": "a", "type": "integer", "constraints": {"maximum": 5}}
        ]}));
        assert!(schema.cast_row(&[json!("9")], &CastRowOptions::default()).is_err());
        let skipped = CastRowOptions {
            skip_constraints: true,
            ..CastRowOptions::default()
        };
        assert_eq!(
            schema.cast_row(&[json!("9")], &skipped).expect("cast"),
            vec![Value::Integer(9)]
        );
    }

    #[test]
    fn extra_properties_survive_serialization() {
        let schema = schema(json!({
            "fields": [{"name": "id", "x-note": "kept"}],
            "x-owner": "data-team"
        }));
        let raw = serde_json::to_value(schema.descriptor()).expect("serialize");
        assert_eq!(raw["x-owner"], json!("data-team"));
        assert_eq!(raw["fields"][0]["x-note"], json!("kept"));
    }
}
