//! In-memory extraction service for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, json};
use welldoc_core::{ExtractionResult, Registry, Schema};

use crate::service::{ExtractionService, InvocationRequest, JobHandle, JobState, JobStatus};
use crate::{RetryPolicy, ServiceConfig, ServiceError};

const BLUEPRINT: &str = include_str!("../../welldoc-core/testdata/well_completion_report.json");

/// Scripted service: each document has a queue of job states returned by
/// successive status calls; the last state repeats.
pub(crate) struct MockService {
    scripts: Mutex<HashMap<String, VecDeque<JobState>>>,
    submits: AtomicUsize,
    aborts: AtomicUsize,
    status_calls: AtomicUsize,
    fail_abort: bool,
    fail_status: bool,
    matched: String,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            submits: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            fail_abort: false,
            fail_status: false,
            matched: "well_completion_report".into(),
        }
    }

    pub fn script(self, document: &str, states: &[JobState]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(document.to_string(), states.iter().copied().collect());
        self
    }

    pub fn matching(mut self, blueprint: &str) -> Self {
        self.matched = blueprint.to_string();
        self
    }

    pub fn failing_abort(mut self) -> Self {
        self.fail_abort = true;
        self
    }

    /// Every status call fails as if the service were unreachable.
    pub fn failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionService for MockService {
    async fn submit(&self, request: &InvocationRequest) -> Result<JobHandle, ServiceError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(JobHandle {
            invocation_id: format!("{}#{n}", request.input_uri),
        })
    }

    async fn status(&self, job: &JobHandle) -> Result<JobStatus, ServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status {
            return Err(ServiceError::Transient("connection reset".into()));
        }
        let document = job
            .invocation_id
            .rsplit_once('#')
            .map(|(d, _)| d)
            .unwrap_or(&job.invocation_id);
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(document).ok_or_else(|| ServiceError::Rejected {
            status: 404,
            body: document.to_string(),
        })?;
        let state = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            *queue.front().unwrap()
        };
        Ok(JobStatus {
            state,
            output_uri: Some(format!("{document}/job_metadata.json")),
            message: Some(format!("{state:?}")),
        })
    }

    async fn fetch_results(&self, _output_uri: &str) -> Result<Vec<ExtractionResult>, ServiceError> {
        let mut values = Map::new();
        values.insert("Operator".into(), json!("Permian Basin Resources LLC"));
        values.insert("Casing_Summary".into(), json!([{ "Size": "7", "Weight": 23 }]));
        Ok(vec![ExtractionResult::new(self.matched.clone(), values)])
    }

    async fn abort(&self, _job: &JobHandle) -> Result<(), ServiceError> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        if self.fail_abort {
            Err(ServiceError::Transient("abort not supported".into()))
        } else {
            Ok(())
        }
    }
}

pub(crate) fn fast_config() -> ServiceConfig {
    ServiceConfig {
        output_prefix: "s3://well-reports/output".into(),
        poll_interval_ms: 1,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            backoff_factor: 2.0,
            max_delay_ms: 4,
        },
        ..Default::default()
    }
}

pub(crate) fn registry() -> Registry {
    let schema = Schema::from_json("well_completion_report", BLUEPRINT).unwrap();
    Registry::register_batch(vec![schema]).unwrap()
}
