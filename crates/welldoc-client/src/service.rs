//! The extraction-service boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use welldoc_core::{ExtractionResult, Registry};

use crate::ServiceError;

/// One extraction job to start: a document, the blueprints to match it
/// against, and where the service should write its output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    pub input_uri: String,
    pub output_uri: String,
    /// Names of the registered blueprints, for logging.
    pub blueprints: Vec<String>,
    /// Service ARNs of the blueprints to match against. Empty when the
    /// project already carries them.
    pub blueprint_arns: Vec<String>,
    pub project: Option<String>,
    pub profile: String,
    pub stage: String,
}

impl InvocationRequest {
    pub fn new(
        input_uri: impl Into<String>,
        output_uri: impl Into<String>,
        registry: &Registry,
    ) -> Self {
        Self {
            input_uri: input_uri.into(),
            output_uri: output_uri.into(),
            blueprints: registry
                .schemas()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
            blueprint_arns: Vec::new(),
            project: None,
            profile: String::new(),
            stage: crate::config::DEFAULT_STAGE.to_string(),
        }
    }
}

/// Handle to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub invocation_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum JobState {
    Created,
    InProgress,
    Success,
    /// The service failed; the job may succeed if resubmitted.
    ServiceError,
    /// The service rejected the input document.
    ClientError,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::ServiceError | Self::ClientError)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    /// Location of the job metadata once the job has succeeded.
    pub output_uri: Option<String>,
    pub message: Option<String>,
}

/// Metadata the service writes when a job finishes.
///
/// A document may be split into several segments, each with its own custom
/// output when a blueprint matched.
#[derive(Debug, Clone, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub output_metadata: Vec<AssetMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetMetadata {
    #[serde(default)]
    pub segment_metadata: Vec<SegmentMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentMetadata {
    pub custom_output_path: Option<String>,
    pub custom_output_status: Option<String>,
}

impl JobMetadata {
    /// Custom-output locations of every segment that has one.
    pub fn custom_output_paths(&self) -> Vec<&str> {
        self.output_metadata
            .iter()
            .flat_map(|a| a.segment_metadata.iter())
            .filter_map(|s| s.custom_output_path.as_deref())
            .collect()
    }
}

/// Operations the managed extraction service provides.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn submit(&self, request: &InvocationRequest) -> Result<JobHandle, ServiceError>;

    async fn status(&self, job: &JobHandle) -> Result<JobStatus, ServiceError>;

    /// Fetch every segment result listed in the job metadata at `output_uri`.
    async fn fetch_results(&self, output_uri: &str) -> Result<Vec<ExtractionResult>, ServiceError>;

    /// Ask the service to stop a pending job.
    async fn abort(&self, job: &JobHandle) -> Result<(), ServiceError>;
}
