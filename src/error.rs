//! Error taxonomy shared by schema construction, row casting and the table
//! pipeline.
//!
//! Every data problem surfaces as an [`Error`] value rather than a panic.
//! Errors form a tree: an aggregate schema error or a row-level cast error
//! carries the individual failures in [`Error::nested`]. Use
//! [`Error::to_record`] to obtain the serializable [`ErrorRecord`] view.

use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The descriptor does not conform to the structural profile.
    #[error("Descriptor validation error: {message}")]
    Structural { message: String },

    #[error("{message}")]
    PrimaryKey { message: String },

    #[error("{message}")]
    ForeignKeyDescriptor { message: String },

    /// Raised by strict schema construction when any descriptor error was found.
    #[error("There are {} error(s) in the schema descriptor", errors.len())]
    InvalidSchema { errors: Vec<Error> },

    #[error("{message}")]
    RowShape {
        message: String,
        row_number: Option<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("The column header names do not match the field names in the schema")]
    HeaderMismatch {
        row_number: Option<usize>,
        header_names: Vec<String>,
        field_names: Vec<String>,
    },

    #[error("{message}")]
    Cast {
        message: String,
        row_number: Option<usize>,
        column_number: Option<usize>,
        errors: Vec<Error>,
    },

    #[error("{message}")]
    ConstraintViolation {
        constraint: &'static str,
        message: String,
        row_number: Option<usize>,
        column_number: Option<usize>,
    },

    #[error("{message}")]
    ForeignKeyViolation {
        message: String,
        resource: String,
        row_number: Option<usize>,
    },

    #[error("Failed to read source row: {0:#}")]
    Source(anyhow::Error),
}

/// Serializable view of an [`Error`] tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorRecord>,
}

impl Error {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Error::Structural {
            message: message.into(),
        }
    }

    pub(crate) fn row_shape(expected: usize, actual: usize) -> Self {
        Error::RowShape {
            message: format!(
                "Row has {actual} value(s) but the schema defines {expected} field(s)"
            ),
            row_number: None,
            expected,
            actual,
        }
    }

    pub(crate) fn cast(message: impl Into<String>) -> Self {
        Error::Cast {
            message: message.into(),
            row_number: None,
            column_number: None,
            errors: Vec::new(),
        }
    }

    /// Wraps per-column failures into one row-level cast error, keeping their order.
    pub(crate) fn cast_errors(errors: Vec<Error>) -> Self {
        Error::Cast {
            message: format!(
                "There are {} cast error(s) in the row (see nested errors)",
                errors.len()
            ),
            row_number: None,
            column_number: None,
            errors,
        }
    }

    pub(crate) fn constraint(constraint: &'static str, message: impl Into<String>) -> Self {
        Error::ConstraintViolation {
            constraint,
            message: message.into(),
            row_number: None,
            column_number: None,
        }
    }

    pub fn row_number(&self) -> Option<usize> {
        match self {
            Error::RowShape { row_number, .. }
            | Error::HeaderMismatch { row_number, .. }
            | Error::Cast { row_number, .. }
            | Error::ConstraintViolation { row_number, .. }
            | Error::ForeignKeyViolation { row_number, .. } => *row_number,
            _ => None,
        }
    }

    pub fn column_number(&self) -> Option<usize> {
        match self {
            Error::Cast { column_number, .. }
            | Error::ConstraintViolation { column_number, .. } => *column_number,
            _ => None,
        }
    }

    pub fn nested(&self) -> &[Error] {
        match self {
            Error::InvalidSchema { errors } | Error::Cast { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Name of the violated constraint, for constraint violations only.
    pub fn constraint_name(&self) -> Option<&'static str> {
        match self {
            Error::ConstraintViolation { constraint, .. } => Some(constraint),
            _ => None,
        }
    }

    /// Stamps the row number on this error and on every nested error.
    pub fn with_row_number(mut self, number: usize) -> Self {
        match &mut self {
            Error::RowShape { row_number, .. }
            | Error::HeaderMismatch { row_number, .. }
            | Error::ConstraintViolation { row_number, .. }
            | Error::ForeignKeyViolation { row_number, .. } => *row_number = Some(number),
            Error::Cast {
                row_number, errors, ..
            } => {
                *row_number = Some(number);
                let nested = std::mem::take(errors);
                *errors = nested
                    .into_iter()
                    .map(|err| err.with_row_number(number))
                    .collect();
            }
            _ => {}
        }
        self
    }

    pub fn with_column_number(mut self, number: usize) -> Self {
        match &mut self {
            Error::Cast { column_number, .. }
            | Error::ConstraintViolation { column_number, .. } => *column_number = Some(number),
            _ => {}
        }
        self
    }

    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            message: self.to_string(),
            row_number: self.row_number(),
            column_number: self.column_number(),
            errors: self.nested().iter().map(Error::to_record).collect(),
        }
    }
}
