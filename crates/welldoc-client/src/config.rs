//! Service configuration, passed explicitly to every client.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{RetryPolicy, ServiceError};

/// Default project stage.
pub const DEFAULT_STAGE: &str = "LIVE";

/// Default region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default delay between job status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Default timeout for a single HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 50_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Base URL of the document-automation runtime API.
    pub endpoint: String,
    /// Path-style object store base URL; `s3://bucket/key` resolves to
    /// `{storage_endpoint}/bucket/key`.
    pub storage_endpoint: String,
    pub region: String,
    /// Data-automation profile identifier sent with every invocation.
    pub profile: Option<String>,
    /// Project the registered blueprints belong to.
    pub project: Option<String>,
    /// Blueprint ARNs sent with every invocation.
    pub blueprint_arns: Vec<String>,
    pub stage: String,
    /// Where the service writes job output, e.g. `s3://reports-bucket/output`.
    pub output_prefix: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            storage_endpoint: String::new(),
            region: DEFAULT_REGION.to_string(),
            profile: None,
            project: None,
            blueprint_arns: Vec::new(),
            stage: DEFAULT_STAGE.to_string(),
            output_prefix: String::new(),
            auth_token: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            retry: RetryPolicy::default(),
        }
    }
}

impl ServiceConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn from_path(path: &Path) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        info!(path = %path.display(), "loaded service config");
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Profile identifier, falling back to the region's standard profile.
    pub fn profile_id(&self) -> String {
        self.profile
            .clone()
            .unwrap_or_else(|| format!("{}:data-automation-profile/us.data-automation-v1", self.region))
    }
}
