//! Concurrent extraction of a batch of documents.

use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};
use welldoc_core::{ExtractionResult, MatchOutcome, Registry};

use crate::{Extractor, ServiceError};

/// A document to extract, optionally with the blueprint it should match.
#[derive(Debug, Clone)]
pub struct DocumentJob {
    pub document: String,
    pub expected_schema: Option<String>,
}

impl DocumentJob {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            expected_schema: None,
        }
    }

    pub fn expecting(mut self, schema: impl Into<String>) -> Self {
        self.expected_schema = Some(schema.into());
        self
    }
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub document: String,
    pub results: Result<Vec<ExtractionResult>, ServiceError>,
    /// Segments the service matched to a different blueprint than expected.
    pub mismatches: Vec<MatchOutcome>,
}

impl Extractor {
    /// Extract every document concurrently, each within its own `timeout`.
    ///
    /// Outcomes are returned in input order; one failing or slow document
    /// does not affect the others.
    pub async fn run_batch(
        &self,
        jobs: &[DocumentJob],
        registry: &Registry,
        timeout: Duration,
    ) -> Vec<DocumentOutcome> {
        let outcomes = join_all(jobs.iter().map(|job| async move {
            let results = self.extract(&job.document, registry, timeout).await;
            let mismatches = match (&results, &job.expected_schema) {
                (Ok(segments), Some(expected)) => segments
                    .iter()
                    .map(|r| registry.check_match(expected, r))
                    .filter(|m| !m.is_match())
                    .collect(),
                _ => Vec::new(),
            };
            if let Err(e) = &results {
                warn!(document = %job.document, error = %e, "document failed");
            }
            DocumentOutcome {
                document: job.document.clone(),
                results,
                mismatches,
            }
        }))
        .await;

        let failed = outcomes.iter().filter(|o| o.results.is_err()).count();
        info!(documents = jobs.len(), failed, "batch finished");
        outcomes
    }
}
