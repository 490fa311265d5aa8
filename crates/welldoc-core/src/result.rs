//! Extraction results as returned by the document-automation service.
//!
//! One [`ExtractionResult`] per processed document segment. The extracted
//! values stay as raw JSON until the normaliser interprets them against a
//! blueprint.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ResultError;

/// The service's output for one document segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Name of the blueprint the service selected.
    pub matched_schema: String,
    pub matched_arn: Option<String>,
    /// Service confidence in the blueprint match.
    pub match_confidence: Option<f64>,
    pub document_class: Option<String>,
    pub page_indices: Vec<u32>,
    /// Root property name → record or sequence of records (or a scalar for
    /// document-level fields).
    pub values: Map<String, Value>,
    /// Per-field confidence tree mirroring `values`.
    pub explainability: Option<Value>,
}

/// Segment-level overview of a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub page_indices: Vec<u32>,
    pub matched_blueprint_name: String,
    pub confidence: Option<f64>,
    pub document_class_type: Option<String>,
}

#[derive(Deserialize)]
struct RawOutput {
    matched_blueprint: Option<RawMatch>,
    document_class: Option<RawClass>,
    split_document: Option<RawSplit>,
    #[serde(default)]
    inference_result: Option<Map<String, Value>>,
    #[serde(default)]
    explainability_info: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawMatch {
    name: Option<String>,
    arn: Option<String>,
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct RawClass {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct RawSplit {
    #[serde(default)]
    page_indices: Option<Vec<u32>>,
}

impl ExtractionResult {
    /// Build a result directly from extracted values.
    pub fn new(matched_schema: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            matched_schema: matched_schema.into(),
            matched_arn: None,
            match_confidence: None,
            document_class: None,
            page_indices: Vec::new(),
            values,
            explainability: None,
        }
    }

    /// Parse a custom-output document.
    pub fn from_value(value: Value) -> Result<Self, ResultError> {
        let raw: RawOutput = serde_json::from_value(value)?;
        let matched = raw
            .matched_blueprint
            .ok_or(ResultError::MissingMatchedBlueprint)?;
        let matched_schema = matched.name.ok_or(ResultError::MissingMatchedBlueprint)?;
        Ok(Self {
            matched_schema,
            matched_arn: matched.arn,
            match_confidence: matched.confidence,
            document_class: raw.document_class.and_then(|c| c.kind),
            page_indices: raw
                .split_document
                .and_then(|s| s.page_indices)
                .unwrap_or_default(),
            values: raw.inference_result.unwrap_or_default(),
            explainability: raw
                .explainability_info
                .and_then(|info| info.into_iter().next()),
        })
    }

    pub fn from_json(text: &str) -> Result<Self, ResultError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ResultError> {
        let text = std::fs::read_to_string(path).map_err(|source| ResultError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn summary(&self) -> SegmentSummary {
        SegmentSummary {
            page_indices: self.page_indices.clone(),
            matched_blueprint_name: self.matched_schema.clone(),
            confidence: self.match_confidence,
            document_class_type: self.document_class.clone(),
        }
    }

    /// Confidence reported for one extracted value.
    ///
    /// `index` selects an item of a repeated group; `field` selects a field of
    /// a group record. A document-level field takes neither.
    pub fn field_confidence(
        &self,
        property: &str,
        index: Option<usize>,
        field: Option<&str>,
    ) -> Option<f64> {
        let mut node = self.explainability.as_ref()?.get(property)?;
        if let Some(i) = index {
            node = node.get(i)?;
        }
        if let Some(f) = field {
            node = node.get(f)?;
        }
        node.get("confidence")?.as_f64()
    }
}
