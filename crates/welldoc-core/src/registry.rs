//! Blueprint registry for one extraction batch.
//!
//! A batch may hold at most one blueprint per document class: two blueprints
//! of the same class make the service's blueprint matching unreliable.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::result::ExtractionResult;
use crate::table::{TabularView, to_form, to_table};
use crate::{NormalizeError, Schema, SchemaError};

/// Outcome of comparing the blueprint the caller expected with the one the
/// service matched. A mismatch is informative, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    Mismatch { expected: String, matched: String },
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched)
    }
}

/// Validated blueprints registered together.
#[derive(Debug, Clone)]
pub struct Registry {
    schemas: Vec<Schema>,
}

impl Registry {
    /// Register a batch of blueprints.
    ///
    /// Fails if two blueprints share a document class.
    pub fn register_batch(schemas: Vec<Schema>) -> Result<Self, SchemaError> {
        let mut by_class: HashMap<&str, &str> = HashMap::new();
        for schema in &schemas {
            if let Some(first) = by_class.insert(schema.document_class(), schema.name()) {
                return Err(SchemaError::DuplicateDocumentClass {
                    document_class: schema.document_class().to_string(),
                    first: first.to_string(),
                    second: schema.name().to_string(),
                });
            }
        }
        info!(count = schemas.len(), "registered blueprint batch");
        Ok(Self { schemas })
    }

    /// Load blueprint files and register them as one batch.
    pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, SchemaError> {
        let schemas = paths
            .iter()
            .map(|p| Schema::from_path(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::register_batch(schemas)
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name() == name)
    }

    pub fn by_document_class(&self, document_class: &str) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|s| s.document_class() == document_class)
    }

    /// `(document class, description)` of every registered blueprint.
    pub fn document_classes(&self) -> Vec<(&str, &str)> {
        self.schemas
            .iter()
            .map(|s| (s.document_class(), s.description()))
            .collect()
    }

    /// Compare the blueprint the caller expected against the service's match,
    /// logging a warning on mismatch.
    pub fn check_match(&self, expected: &str, result: &ExtractionResult) -> MatchOutcome {
        if result.matched_schema == expected {
            return MatchOutcome::Matched;
        }
        warn!(
            expected,
            matched = %result.matched_schema,
            confidence = ?result.match_confidence,
            "service matched a different blueprint than expected"
        );
        MatchOutcome::Mismatch {
            expected: expected.to_string(),
            matched: result.matched_schema.clone(),
        }
    }

    /// Blueprint the service reported for `result`.
    pub fn matched_schema(&self, result: &ExtractionResult) -> Result<&Schema, NormalizeError> {
        self.get(&result.matched_schema)
            .ok_or_else(|| NormalizeError::UnknownSchema {
                schema: result.matched_schema.clone(),
            })
    }

    /// [`to_table`] against the blueprint the service matched.
    pub fn to_table(
        &self,
        result: &ExtractionResult,
        group: &str,
        sort_key: Option<&str>,
    ) -> Result<TabularView, NormalizeError> {
        to_table(self.matched_schema(result)?, result, group, sort_key)
    }

    /// [`to_form`] against the blueprint the service matched.
    pub fn to_form(&self, result: &ExtractionResult) -> Result<TabularView, NormalizeError> {
        to_form(self.matched_schema(result)?, result)
    }
}
