use log::debug;
use serde_json::Value as JsonValue;

use crate::{
    field::FieldDescriptor,
    schema::Descriptor,
    types::{CastOptions, FieldType, Format},
};

/// Candidate types in order of preference; `string` is the fallback.
const CANDIDATES: &[FieldType] = &[
    FieldType::Integer,
    FieldType::Number,
    FieldType::Boolean,
    FieldType::Date,
    FieldType::DateTime,
    FieldType::Time,
    FieldType::YearMonth,
];

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    non_missing: usize,
    matches: [usize; CANDIDATES.len()],
}

impl TypeCandidate {
    fn update(&mut self, raw: &JsonValue, missing_values: &[String]) {
        let is_missing = match raw {
            JsonValue::Null => true,
            JsonValue::String(s) => missing_values.iter().any(|m| m == s),
            _ => false,
        };
        if is_missing {
            return;
        }
        self.non_missing += 1;
        let options = CastOptions::default();
        for (slot, candidate) in self.matches.iter_mut().zip(CANDIDATES) {
            if candidate.cast(&Format::Default, raw, &options).is_ok() {
                *slot += 1;
            }
        }
    }

    /// The most specific type a strict majority of non-missing values cast to.
    fn decide(&self) -> FieldType {
        if self.non_missing == 0 {
            return FieldType::String;
        }
        CANDIDATES
            .iter()
            .zip(self.matches)
            .find(|(_, hits)| hits * 2 > self.non_missing)
            .map(|(candidate, _)| *candidate)
            .unwrap_or(FieldType::String)
    }
}

/// Builds a descriptor naming one field per header, typed from the sample rows.
/// Rows shorter than the header contribute nothing for the absent columns.
pub fn infer_descriptor(
    headers: &[String],
    rows: &[Vec<JsonValue>],
    missing_values: &[String],
) -> Descriptor {
    let mut candidates = vec![TypeCandidate::default(); headers.len()];
    for row in rows {
        for (candidate, raw) in candidates.iter_mut().zip(row) {
            candidate.update(raw, missing_values);
        }
    }
    let fields = headers
        .iter()
        .zip(&candidates)
        .map(|(name, candidate)| {
            let field_type = candidate.decide();
            debug!(
                "Inferred '{name}' as {field_type} from {} value(s)",
                candidate.non_missing
            );
            FieldDescriptor::new(name.clone(), field_type)
        })
        .collect();
    Descriptor {
        fields,
        missing_values: missing_values.to_vec(),
        ..Descriptor::default()
    }
}
