//! Core types for welldoc: blueprint schemas, the batch registry, extraction
//! results, and their normalisation into tables.

pub mod blueprint;
mod error;
mod loader;
pub mod registry;
pub mod result;
pub mod schema;
pub mod sort_key;
pub mod table;

pub use blueprint::{
    Cardinality, FieldSpec, GroupSpec, InferenceMode, NestedGroup, RootProperty, Schema,
    SchemaParts, ValueType,
};
pub use error::{Expected, NormalizeError, ResultError, SchemaError};
pub use registry::{MatchOutcome, Registry};
pub use result::{ExtractionResult, SegmentSummary};
pub use table::{Cell, Column, Scalar, TabularView, to_form, to_table};
