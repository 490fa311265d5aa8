//! Submitting documents and waiting for their extraction jobs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use welldoc_core::{ExtractionResult, Registry};

use crate::service::{ExtractionService, InvocationRequest, JobHandle, JobState};
use crate::{ServiceConfig, ServiceError};

/// Drives extraction jobs against an [`ExtractionService`].
pub struct Extractor {
    service: Arc<dyn ExtractionService>,
    config: ServiceConfig,
}

impl Extractor {
    pub fn new(service: Arc<dyn ExtractionService>, config: ServiceConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Invocation payload for `document` against every blueprint in `registry`.
    pub fn request(&self, document: &str, registry: &Registry) -> InvocationRequest {
        let mut request = InvocationRequest::new(document, &self.config.output_prefix, registry);
        request.project = self.config.project.clone();
        request.blueprint_arns = self.config.blueprint_arns.clone();
        request.profile = self.config.profile_id();
        request.stage = self.config.stage.clone();
        request
    }

    /// Start a job for `document`. Transient submission failures are retried.
    pub async fn submit(
        &self,
        document: &str,
        registry: &Registry,
    ) -> Result<PendingJob, ServiceError> {
        let request = self.request(document, registry);
        let handle = self
            .config
            .retry
            .run("submit", || self.service.submit(&request))
            .await?;
        info!(
            document,
            invocation = %handle.invocation_id,
            blueprints = request.blueprints.len(),
            "submitted extraction job"
        );
        Ok(PendingJob::new(Arc::clone(&self.service), handle))
    }

    /// Poll `job` until it finishes or `timeout` elapses.
    ///
    /// Returns one result per matched document segment. On
    /// [`ServiceError::Timeout`] the job stays pending: wait on it again,
    /// [`cancel`](PendingJob::cancel) it, or drop it to abandon it.
    pub async fn wait(
        &self,
        job: &mut PendingJob,
        timeout: Duration,
    ) -> Result<Vec<ExtractionResult>, ServiceError> {
        let invocation = job.handle.invocation_id.clone();
        match tokio::time::timeout(timeout, self.poll(job)).await {
            Ok(outcome) => outcome.and_then(|finished| finished),
            Err(_) => {
                warn!(invocation = %invocation, waited_ms = timeout.as_millis() as u64, "job still pending");
                Err(ServiceError::Timeout {
                    job: invocation,
                    waited: timeout,
                })
            }
        }
    }

    /// Submit `document` and wait for it within an overall `timeout`.
    ///
    /// Jobs that end in the service's own error state are resubmitted with
    /// backoff up to the configured attempt limit. Transport failures that
    /// outlast the per-call retries are returned as they are. A job still
    /// running when the budget runs out is aborted.
    pub async fn extract(
        &self,
        document: &str,
        registry: &Registry,
        timeout: Duration,
    ) -> Result<Vec<ExtractionResult>, ServiceError> {
        match tokio::time::timeout(timeout, self.extract_attempts(document, registry)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(document, waited_ms = timeout.as_millis() as u64, "extraction timed out");
                Err(ServiceError::Timeout {
                    job: document.to_string(),
                    waited: timeout,
                })
            }
        }
    }

    async fn extract_attempts(
        &self,
        document: &str,
        registry: &Registry,
    ) -> Result<Vec<ExtractionResult>, ServiceError> {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut job = self.submit(document, registry).await?;
            match self.poll(&mut job).await? {
                Err(e @ ServiceError::Transient(_)) if retry.should_retry(attempt) => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        document,
                        attempt,
                        max = retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "job failed, resubmitting"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Poll until the job settles. The outer error is a service call that
    /// failed after its retries; the inner result is how the job ended.
    async fn poll(
        &self,
        job: &mut PendingJob,
    ) -> Result<Result<Vec<ExtractionResult>, ServiceError>, ServiceError> {
        let handle = job.handle.clone();
        loop {
            let status = self
                .config
                .retry
                .run("status", || self.service.status(&handle))
                .await?;
            debug!(invocation = %handle.invocation_id, state = ?status.state, "polled job");

            let message = status.message.unwrap_or_default();
            match status.state {
                JobState::Created | JobState::InProgress => {
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
                JobState::ClientError => {
                    job.settle();
                    return Ok(Err(ServiceError::MalformedDocument(message)));
                }
                JobState::ServiceError => {
                    job.settle();
                    return Ok(Err(ServiceError::Transient(message)));
                }
                JobState::Success => {
                    job.settle();
                    let Some(output) = status.output_uri else {
                        return Ok(Err(ServiceError::Transient(format!(
                            "job {} succeeded without an output location",
                            handle.invocation_id
                        ))));
                    };
                    let results = self
                        .config
                        .retry
                        .run("fetch results", || self.service.fetch_results(&output))
                        .await?;
                    info!(
                        invocation = %handle.invocation_id,
                        segments = results.len(),
                        "extraction job finished"
                    );
                    return Ok(Ok(results));
                }
            }
        }
    }
}

// ── Pending job guard ──

/// A submitted job that has not reached a terminal state.
///
/// Dropping an unsettled job sends a best-effort abort to the service.
pub struct PendingJob {
    service: Arc<dyn ExtractionService>,
    handle: JobHandle,
    settled: bool,
}

impl PendingJob {
    fn new(service: Arc<dyn ExtractionService>, handle: JobHandle) -> Self {
        Self {
            service,
            handle,
            settled: false,
        }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Whether the job reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    fn settle(&mut self) {
        self.settled = true;
    }

    /// Ask the service to abort the job.
    ///
    /// If the abort is not acknowledged the job is abandoned anyway; its
    /// output must not be read.
    pub async fn cancel(mut self) -> Result<(), ServiceError> {
        self.settled = true;
        match self.service.abort(&self.handle).await {
            Ok(()) => {
                info!(invocation = %self.handle.invocation_id, "aborted job");
                Ok(())
            }
            Err(e) => {
                warn!(
                    invocation = %self.handle.invocation_id,
                    error = %e,
                    "abort not acknowledged, discarding job"
                );
                Err(e)
            }
        }
    }
}

impl Drop for PendingJob {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(invocation = %self.handle.invocation_id, "no runtime to abort abandoned job");
            return;
        };
        let service = Arc::clone(&self.service);
        let handle = self.handle.clone();
        runtime.spawn(async move {
            match service.abort(&handle).await {
                Ok(()) => debug!(invocation = %handle.invocation_id, "aborted abandoned job"),
                Err(e) => warn!(
                    invocation = %handle.invocation_id,
                    error = %e,
                    "abort of abandoned job not acknowledged"
                ),
            }
        });
    }
}
