//! Client side of document extraction: job submission, polling with
//! retry and timeouts, abort on abandonment, and concurrent batches.

mod batch;
mod config;
mod error;
mod job;
mod location;
mod retry;
pub mod service;

#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
mod mock;

pub use batch::{DocumentJob, DocumentOutcome};
pub use config::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REGION, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_STAGE,
    ServiceConfig,
};
pub use error::ServiceError;
pub use job::{Extractor, PendingJob};
pub use location::ObjectLocation;
pub use retry::RetryPolicy;
pub use service::{ExtractionService, InvocationRequest, JobHandle, JobMetadata, JobState, JobStatus};

#[cfg(feature = "http")]
pub use http::HttpExtractionService;
