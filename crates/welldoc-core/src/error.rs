use std::path::PathBuf;

use thiserror::Error;

use crate::blueprint::ValueType;

/// Failures raised while loading, validating, or registering blueprints.
///
/// All of these are fatal to the blueprint concerned, never to the process:
/// the caller can fix the blueprint and try again.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read blueprint {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("blueprint is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed blueprint at {location}: {detail}")]
    Malformed { location: String, detail: String },

    #[error("unresolved reference `{reference}` at {location}")]
    UnresolvedReference { reference: String, location: String },

    #[error("unsupported type `{found}` at {location}")]
    UnsupportedType { location: String, found: String },

    #[error("cardinality conflict at {location}: {detail}")]
    CardinalityConflict { location: String, detail: String },

    #[error("duplicate field `{field}` in `{group}`")]
    DuplicateField { group: String, field: String },

    #[error("field `{field}` in `{group}` has an empty instruction")]
    MissingInstruction { group: String, field: String },

    #[error("definition `{group}` references itself through nested fields")]
    CyclicReference { group: String },

    #[error("document class `{document_class}` is declared by both `{first}` and `{second}`")]
    DuplicateDocumentClass {
        document_class: String,
        first: String,
        second: String,
    },
}

/// Failures raised while projecting an extraction result into a table.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("group `{group}` is not present in the result for blueprint `{schema}`")]
    UnknownGroup { group: String, schema: String },

    #[error("`{column}` is not a column of group `{group}`")]
    UnknownColumn { group: String, column: String },

    #[error("no registered blueprint named `{schema}`")]
    UnknownSchema { schema: String },

    #[error("{group}[{row}].{field}: expected {expected}, found {found}")]
    TypeMismatch {
        group: String,
        row: usize,
        field: String,
        expected: Expected,
        found: String,
    },
}

/// The shape a value was required to have when a [`NormalizeError::TypeMismatch`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Scalar(ValueType),
    Record,
    Records,
}

impl std::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(t) => write!(f, "{}", t.as_str()),
            Self::Record => f.write_str("an object"),
            Self::Records => f.write_str("an array of objects"),
        }
    }
}

/// Failures raised while reading a custom-output document.
#[derive(Debug, Error)]
pub enum ResultError {
    #[error("failed to read result {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("result is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("result has no matched blueprint")]
    MissingMatchedBlueprint,
}
