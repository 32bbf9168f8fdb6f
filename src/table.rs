//! Schema-driven streaming row pipeline.
//!
//! A [`TableIter`] pulls raw rows from a [`RowSource`] one at a time and moves
//! through `AwaitingHeader → Streaming → {Completed | Failed | Cancelled}`.
//! Cross-row state (uniqueness of values) lives in a [`UniqueKeyCache`] owned
//! by the iterator, so concurrent iterations over one [`Table`] never share it.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use itertools::Itertools;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
    data::Value,
    error::{Error, Result},
    schema::{CastRowOptions, Schema},
    source::RowSource,
};

/// Where column names come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSpec {
    /// The source row with this 1-based number holds the headers.
    Row(usize),
    /// Headers supplied out-of-band; every source row is data.
    Names(Vec<String>),
    None,
}

impl Default for HeaderSpec {
    fn default() -> Self {
        HeaderSpec::Row(1)
    }
}

pub type Relations = HashMap<String, Vec<Map<String, JsonValue>>>;

#[derive(Debug, Clone)]
pub struct IterOptions {
    /// Disable to pass raw rows through untouched.
    pub cast: bool,
    pub keyed: bool,
    pub extended: bool,
    /// Yield errors in place of failing rows and keep going.
    pub force_cast: bool,
    pub relations: Option<Relations>,
    /// Stop after this many emitted items.
    pub limit: Option<usize>,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            cast: true,
            keyed: false,
            extended: false,
            force_cast: false,
            relations: None,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableRow {
    Values(Vec<Value>),
    /// Name/value pairs in column order. Repeated header names are kept.
    #[serde(serialize_with = "serialize_pairs")]
    Keyed(Vec<(String, Value)>),
    #[serde(rename_all = "camelCase")]
    Extended {
        row_number: usize,
        headers: Vec<String>,
        values: Vec<Value>,
    },
}

impl TableRow {
    /// Positional values in column order.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            TableRow::Values(values) | TableRow::Extended { values, .. } => values.iter().collect(),
            TableRow::Keyed(pairs) => pairs.iter().map(|(_, value)| value).collect(),
        }
    }

    /// First value under `name`; positional rows have no names.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            TableRow::Values(_) => None,
            TableRow::Keyed(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            TableRow::Extended {
                headers, values, ..
            } => headers
                .iter()
                .position(|header| header == name)
                .and_then(|idx| values.get(idx)),
        }
    }
}

/// Keyed rows serialize as a JSON object in column order.
fn serialize_pairs<S>(pairs: &[(String, Value)], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (name, value) in pairs {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    AwaitingHeader,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Failed | PipelineState::Cancelled
        )
    }
}

#[derive(Debug)]
struct UniqueKey {
    columns: Vec<usize>,
    names: Vec<String>,
    seen: HashSet<Vec<String>>,
}

/// Value tuples seen so far for every unique-constrained column set.
#[derive(Debug, Default)]
pub struct UniqueKeyCache {
    keys: Vec<UniqueKey>,
}

impl UniqueKeyCache {
    /// One entry per `unique` field plus one composite entry for a multi-member
    /// primary key. Membership in a composite key adds no entry of its own, but
    /// an explicit `unique` on a member is still tracked. A single-member
    /// primary key is tracked like a unique field.
    pub fn for_schema(schema: &Schema) -> Self {
        let primary: Vec<usize> = schema
            .primary_key()
            .iter()
            .filter_map(|name| schema.column_index(name))
            .sorted()
            .dedup()
            .collect();
        let composite = primary.len() > 1;

        let mut keys = Vec::new();
        for (idx, field) in schema.fields().iter().enumerate() {
            let in_primary = primary.contains(&idx);
            if field.is_unique() || (!composite && in_primary) {
                keys.push(UniqueKey {
                    columns: vec![idx],
                    names: vec![field.name().to_string()],
                    seen: HashSet::new(),
                });
            }
        }
        if composite {
            keys.push(UniqueKey {
                names: primary
                    .iter()
                    .map(|idx| schema.fields()[*idx].name().to_string())
                    .collect(),
                columns: primary,
                seen: HashSet::new(),
            });
        }
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn tuple(columns: &[usize], values: &[Value]) -> Option<Vec<String>> {
        let cells: Vec<&Value> = columns.iter().filter_map(|idx| values.get(*idx)).collect();
        if cells.iter().all(|value| value.is_null()) {
            return None;
        }
        Some(cells.iter().map(|value| value.unique_key()).collect())
    }

    /// Checks every key before recording any of them, so a rejected row leaves
    /// the cache unchanged.
    pub fn check_and_insert(&mut self, values: &[Value]) -> Result<()> {
        let tuples: Vec<Option<Vec<String>>> = self
            .keys
            .iter()
            .map(|key| Self::tuple(&key.columns, values))
            .collect();
        for (key, tuple) in self.keys.iter().zip(&tuples) {
            if let Some(tuple) = tuple
                && key.seen.contains(tuple)
            {
                let shown = key
                    .columns
                    .iter()
                    .filter_map(|idx| values.get(*idx))
                    .join(", ");
                let err = Error::constraint(
                    "unique",
                    format!(
                        "Duplicate value ({shown}) for unique field(s) {}",
                        key.names.iter().map(|n| format!("'{n}'")).join(", ")
                    ),
                );
                return Err(match key.columns.as_slice() {
                    [single] => err.with_column_number(single + 1),
                    _ => err,
                });
            }
        }
        for (key, tuple) in self.keys.iter_mut().zip(tuples) {
            if let Some(tuple) = tuple {
                key.seen.insert(tuple);
            }
        }
        Ok(())
    }
}

/// A schema bound to a header policy. Iteration state is created per call to
/// [`Table::iter`].
#[derive(Debug, Clone)]
pub struct Table {
    schema: Arc<Schema>,
    headers: HeaderSpec,
}

impl Table {
    pub fn new(schema: impl Into<Arc<Schema>>, headers: HeaderSpec) -> Self {
        Self {
            schema: schema.into(),
            headers,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn header_spec(&self) -> &HeaderSpec {
        &self.headers
    }

    pub fn iter<S: RowSource>(&self, source: S, options: IterOptions) -> TableIter<'_, S> {
        TableIter::new(self, source, options)
    }

    /// Collects every row. Stops at the first error unless `force_cast` is
    /// set, in which case failing rows are logged and skipped.
    pub fn read<S: RowSource>(&self, source: S, options: IterOptions) -> Result<Vec<TableRow>> {
        let force_cast = options.force_cast;
        let mut rows = Vec::new();
        for item in self.iter(source, options) {
            match item {
                Ok(row) => rows.push(row),
                Err(err) if force_cast && !matches!(err, Error::Source(_)) => warn!(
                    "Skipping row {}: {err}",
                    err.row_number()
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "?".to_string())
                ),
                Err(err) => return Err(err),
            }
        }
        Ok(rows)
    }

    /// Infers a schema from up to `sample_rows` data rows of `source`.
    pub fn infer<S: RowSource>(
        mut source: S,
        headers: &HeaderSpec,
        sample_rows: usize,
    ) -> anyhow::Result<Schema> {
        let mut names = match headers {
            HeaderSpec::Names(names) => Some(names.clone()),
            _ => None,
        };
        let mut sample = Vec::new();
        let mut row_number = 0usize;
        while sample.len() < sample_rows {
            let Some(row) = source.next_row() else {
                break;
            };
            let row = row?;
            row_number += 1;
            if let HeaderSpec::Row(header_row) = headers {
                if row_number < *header_row {
                    continue;
                }
                if row_number == *header_row {
                    names = Some(row.iter().map(cell_text).collect());
                    continue;
                }
            }
            sample.push(row);
        }
        let names = names.unwrap_or_else(|| {
            let width = sample.first().map(Vec::len).unwrap_or(0);
            (1..=width).map(|i| format!("field{i}")).collect()
        });
        debug!(
            "Inferring schema for {} column(s) from {} row(s)",
            names.len(),
            sample.len()
        );
        Ok(Schema::infer(&names, &sample)?)
    }
}

fn cell_text(cell: &JsonValue) -> String {
    match cell {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct TableIter<'a, S> {
    schema: &'a Schema,
    source: Option<S>,
    options: IterOptions,
    state: PipelineState,
    header_row: Option<usize>,
    headers: Option<Vec<String>>,
    header_captured: bool,
    cache: UniqueKeyCache,
    rows_read: usize,
    emitted: usize,
}

impl<'a, S: RowSource> TableIter<'a, S> {
    fn new(table: &'a Table, source: S, options: IterOptions) -> Self {
        let (header_row, headers) = match &table.headers {
            HeaderSpec::Row(n) => (Some((*n).max(1)), None),
            HeaderSpec::Names(names) => (None, Some(names.clone())),
            HeaderSpec::None => (None, None),
        };
        let mut iter = Self {
            schema: table.schema.as_ref(),
            source: Some(source),
            options,
            state: PipelineState::AwaitingHeader,
            header_row,
            headers,
            header_captured: false,
            cache: UniqueKeyCache::default(),
            rows_read: 0,
            emitted: 0,
        };
        if iter.header_row.is_none() {
            iter.enter_streaming();
        }
        iter
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Raw rows pulled from the source so far, header rows included.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn enter_streaming(&mut self) {
        self.cache = UniqueKeyCache::for_schema(self.schema);
        self.state = PipelineState::Streaming;
        info!(
            "Streaming rows ({} unique key(s) tracked)",
            self.cache.len()
        );
    }

    /// Moves to a terminal state and releases the source.
    fn finish(&mut self, state: PipelineState) {
        self.state = state;
        self.source = None;
        info!(
            "Pipeline {state:?} after {} row(s) read, {} emitted",
            self.rows_read, self.emitted
        );
    }

    fn process(&mut self, raw: Vec<JsonValue>) -> Result<TableRow> {
        if !self.options.cast {
            let values = raw.into_iter().map(Value::from_raw).collect();
            return Ok(self.shape(values));
        }
        if self.header_captured
            && let Some(headers) = &self.headers
        {
            let field_names = self.schema.field_names();
            if headers.len() != field_names.len()
                || headers.iter().zip(&field_names).any(|(h, f)| h != f)
            {
                return Err(Error::HeaderMismatch {
                    row_number: None,
                    header_names: headers.clone(),
                    field_names: field_names.iter().map(|f| f.to_string()).collect(),
                });
            }
        }

        let mut values = self.schema.cast_row(&raw, &CastRowOptions::default())?;
        self.cache.check_and_insert(&values)?;
        if let Some(relations) = &self.options.relations {
            resolve_foreign_keys(self.schema, relations, &mut values)?;
        }
        Ok(self.shape(values))
    }

    fn shape(&self, values: Vec<Value>) -> TableRow {
        let names = || -> Vec<String> {
            match &self.headers {
                Some(headers) if !self.options.cast || self.header_captured => headers.clone(),
                _ => self
                    .schema
                    .field_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            }
        };
        if self.options.extended {
            TableRow::Extended {
                row_number: self.rows_read,
                headers: names(),
                values,
            }
        } else if self.options.keyed {
            TableRow::Keyed(names().into_iter().zip(values).collect())
        } else {
            TableRow::Values(values)
        }
    }
}

impl<S: RowSource> Iterator for TableIter<'_, S> {
    type Item = Result<TableRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state.is_terminal() {
                return None;
            }
            if self.options.limit.is_some_and(|limit| self.emitted >= limit) {
                self.finish(PipelineState::Cancelled);
                return None;
            }
            let next = self.source.as_mut()?.next_row();
            let raw = match next {
                None => {
                    self.finish(PipelineState::Completed);
                    return None;
                }
                Some(Err(err)) => {
                    self.rows_read += 1;
                    self.finish(PipelineState::Failed);
                    return Some(Err(Error::Source(err)));
                }
                Some(Ok(raw)) => raw,
            };
            self.rows_read += 1;

            if self.state == PipelineState::AwaitingHeader {
                let header_row = self.header_row.unwrap_or(1);
                if self.rows_read < header_row {
                    debug!("Skipping row {} before the header row", self.rows_read);
                    continue;
                }
                self.headers = Some(raw.iter().map(cell_text).collect());
                self.header_captured = true;
                debug!("Captured header row {}", self.rows_read);
                self.enter_streaming();
                continue;
            }

            let row_number = self.rows_read;
            match self.process(raw) {
                Ok(row) => {
                    self.emitted += 1;
                    return Some(Ok(row));
                }
                Err(err) => {
                    let err = err.with_row_number(row_number);
                    if self.options.force_cast {
                        debug!("Row {row_number} substituted by error: {err}");
                        self.emitted += 1;
                    } else {
                        self.finish(PipelineState::Failed);
                    }
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Replaces each referencing column with the matched reference row. Rows whose
/// resource is not supplied, or whose key has a null member, pass unchanged.
fn resolve_foreign_keys(schema: &Schema, relations: &Relations, values: &mut [Value]) -> Result<()> {
    let original = values.to_vec();
    for fk in schema.foreign_keys() {
        let resource = &fk.reference.resource;
        let Some(reference_rows) = relations.get(resource) else {
            continue;
        };
        let Some(columns) = fk
            .fields
            .names()
            .iter()
            .map(|name| schema.column_index(name))
            .collect::<Option<Vec<usize>>>()
        else {
            continue;
        };
        let key: Vec<&Value> = columns.iter().map(|idx| &original[*idx]).collect();
        if key.iter().any(|value| value.is_null()) {
            continue;
        }
        let reference_fields = fk.reference.fields.names();
        let matched = reference_rows.iter().find(|row| {
            reference_fields
                .iter()
                .zip(&key)
                .all(|(name, value)| row.get(name).is_some_and(|cell| value.matches_reference(cell)))
        });
        match matched {
            Some(row) => {
                for idx in &columns {
                    values[*idx] = Value::Object(row.clone());
                }
            }
            None => {
                let shown = key.iter().join(", ");
                let target = if fk.reference.is_self_reference() {
                    "this table".to_string()
                } else {
                    format!("'{resource}'")
                };
                return Err(Error::ForeignKeyViolation {
                    message: format!(
                        "Foreign key ({}) value ({shown}) has no match in {target}",
                        fk.fields.names().join(", ")
                    ),
                    resource: resource.clone(),
                    row_number: None,
                });
            }
        }
    }
    Ok(())
}
