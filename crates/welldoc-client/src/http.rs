//! HTTP client for the managed document-automation service.

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use welldoc_core::{ExtractionResult, Schema};

use crate::service::{
    ExtractionService, InvocationRequest, JobHandle, JobMetadata, JobState, JobStatus,
};
use crate::{ObjectLocation, ServiceConfig, ServiceError};

// ── Wire types ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokePayload<'a> {
    input_configuration: S3Uri<'a>,
    output_configuration: S3Uri<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_automation_configuration: Option<ProjectRef<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    blueprints: Vec<BlueprintRef<'a>>,
    data_automation_profile_arn: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct S3Uri<'a> {
    s3_uri: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRef<'a> {
    data_automation_project_arn: &'a str,
    stage: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlueprintRef<'a> {
    blueprint_arn: &'a str,
    stage: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvocationRef<'a> {
    invocation_arn: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvokeResponse {
    invocation_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: JobState,
    output_configuration: Option<OutputConfiguration>,
    error_type: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputConfiguration {
    s3_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListProjectsRequest<'a> {
    project_stage_filter: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListProjectsResponse {
    #[serde(default)]
    projects: Vec<ProjectSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSummary {
    project_arn: String,
    project_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBlueprintRequest<'a> {
    blueprint_name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    blueprint_stage: &'a str,
    /// The blueprint document itself, as a JSON string.
    schema: String,
}

#[derive(Debug, Deserialize)]
struct CreateBlueprintResponse {
    blueprint: CreatedBlueprint,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedBlueprint {
    blueprint_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectRequest<'a> {
    project_name: &'a str,
    project_description: &'a str,
    project_stage: &'a str,
    standard_output_configuration: Value,
    custom_output_configuration: CustomOutput<'a>,
    override_configuration: Value,
}

#[derive(Debug, Serialize)]
struct CustomOutput<'a> {
    blueprints: Vec<ProjectBlueprint<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectBlueprint<'a> {
    blueprint_arn: &'a str,
    blueprint_stage: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectResponse {
    project_arn: String,
}

fn invoke_payload(request: &InvocationRequest) -> InvokePayload<'_> {
    InvokePayload {
        input_configuration: S3Uri {
            s3_uri: &request.input_uri,
        },
        output_configuration: S3Uri {
            s3_uri: &request.output_uri,
        },
        data_automation_configuration: request.project.as_deref().map(|arn| ProjectRef {
            data_automation_project_arn: arn,
            stage: &request.stage,
        }),
        blueprints: request
            .blueprint_arns
            .iter()
            .map(|arn| BlueprintRef {
                blueprint_arn: arn,
                stage: &request.stage,
            })
            .collect(),
        data_automation_profile_arn: &request.profile,
    }
}

fn blueprint_payload<'a>(schema: &'a Schema, stage: &'a str) -> CreateBlueprintRequest<'a> {
    CreateBlueprintRequest {
        blueprint_name: schema.name(),
        kind: "DOCUMENT",
        blueprint_stage: stage,
        schema: schema.to_json_string(),
    }
}

/// Projects split multi-document files and keep the standard page-level
/// output alongside the blueprint output.
fn project_payload<'a>(
    name: &'a str,
    stage: &'a str,
    blueprint_arns: &'a [String],
) -> CreateProjectRequest<'a> {
    CreateProjectRequest {
        project_name: name,
        project_description: "Well report extraction",
        project_stage: stage,
        standard_output_configuration: json!({
            "document": {
                "extraction": {
                    "granularity": { "types": ["DOCUMENT", "PAGE"] },
                    "boundingBox": { "state": "ENABLED" }
                },
                "generativeField": { "state": "ENABLED" },
                "outputFormat": {
                    "textFormat": { "types": ["MARKDOWN"] },
                    "additionalFileFormat": { "state": "ENABLED" }
                }
            }
        }),
        custom_output_configuration: CustomOutput {
            blueprints: blueprint_arns
                .iter()
                .map(|arn| ProjectBlueprint {
                    blueprint_arn: arn,
                    blueprint_stage: stage,
                })
                .collect(),
        },
        override_configuration: json!({ "document": { "splitter": { "state": "ENABLED" } } }),
    }
}

impl From<StatusResponse> for JobStatus {
    fn from(resp: StatusResponse) -> Self {
        let message = match (resp.error_type, resp.error_message) {
            (Some(kind), Some(msg)) => Some(format!("{kind}: {msg}")),
            (kind, msg) => msg.or(kind),
        };
        Self {
            state: resp.status,
            output_uri: resp.output_configuration.map(|o| o.s3_uri),
            message,
        }
    }
}

// ── Client ──

/// [`ExtractionService`] over the service's JSON API, with job output read
/// from a path-style object store.
pub struct HttpExtractionService {
    client: reqwest::Client,
    endpoint: String,
    storage_endpoint: String,
    stage: String,
    auth_token: Option<String>,
}

impl HttpExtractionService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            storage_endpoint: config.storage_endpoint.trim_end_matches('/').to_string(),
            stage: config.stage.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post<B>(&self, operation: &str, body: &B) -> Result<reqwest::Response, ServiceError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{operation}", self.endpoint);
        debug!(url = %url, "calling extraction service");
        let resp = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        check(resp).await
    }

    async fn call<B, T>(&self, operation: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        Ok(self.post(operation, body).await?.json().await?)
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<String, ServiceError> {
        let url = location.url(&self.storage_endpoint);
        debug!(url = %url, "reading object");
        let resp = self.authorized(self.client.get(&url)).send().await?;
        Ok(check(resp).await?.text().await?)
    }

    /// Upload a local document so the service can read it from `location`.
    pub async fn upload_document(
        &self,
        local_path: &Path,
        location: &ObjectLocation,
    ) -> Result<(), ServiceError> {
        let bytes = tokio::fs::read(local_path).await?;
        let size = bytes.len();
        let url = location.url(&self.storage_endpoint);
        let resp = self
            .authorized(self.client.put(&url))
            .body(bytes)
            .send()
            .await?;
        check(resp).await?;
        info!(path = %local_path.display(), location = %location, size, "uploaded document");
        Ok(())
    }

    /// ARN of the project called `name` in the configured stage, if any.
    pub async fn find_project(&self, name: &str) -> Result<Option<String>, ServiceError> {
        let resp: ListProjectsResponse = self
            .call(
                "listDataAutomationProjects",
                &ListProjectsRequest {
                    project_stage_filter: &self.stage,
                },
            )
            .await?;
        let found = resp
            .projects
            .into_iter()
            .find(|p| p.project_name == name)
            .map(|p| p.project_arn);
        match &found {
            Some(arn) => info!(project = name, arn = %arn, "found project"),
            None => warn!(project = name, stage = %self.stage, "no project with that name"),
        }
        Ok(found)
    }

    /// Register `schema` with the service and return the blueprint's ARN.
    pub async fn create_blueprint(&self, schema: &Schema) -> Result<String, ServiceError> {
        let resp: CreateBlueprintResponse = self
            .call("createBlueprint", &blueprint_payload(schema, &self.stage))
            .await?;
        let arn = resp.blueprint.blueprint_arn;
        info!(blueprint = schema.name(), arn = %arn, "created blueprint");
        Ok(arn)
    }

    /// Create a project that matches documents against `blueprint_arns`.
    pub async fn create_project(
        &self,
        name: &str,
        blueprint_arns: &[String],
    ) -> Result<String, ServiceError> {
        if blueprint_arns.is_empty() {
            return Err(ServiceError::Rejected {
                status: 400,
                body: format!("project {name} needs at least one blueprint"),
            });
        }
        let resp: CreateProjectResponse = self
            .call(
                "createDataAutomationProject",
                &project_payload(name, &self.stage, blueprint_arns),
            )
            .await?;
        info!(project = name, arn = %resp.project_arn, blueprints = blueprint_arns.len(), "created project");
        Ok(resp.project_arn)
    }

    /// ARN of the project called `name`, creating it over `blueprint_arns`
    /// when the configured stage has none.
    pub async fn ensure_project(
        &self,
        name: &str,
        blueprint_arns: &[String],
    ) -> Result<String, ServiceError> {
        match self.find_project(name).await? {
            Some(arn) => Ok(arn),
            None => self.create_project(name, blueprint_arns).await,
        }
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::from_status(status.as_u16(), body))
}

#[async_trait]
impl ExtractionService for HttpExtractionService {
    async fn submit(&self, request: &InvocationRequest) -> Result<JobHandle, ServiceError> {
        let resp: InvokeResponse = self
            .call("invokeDataAutomationAsync", &invoke_payload(request))
            .await?;
        Ok(JobHandle {
            invocation_id: resp.invocation_arn,
        })
    }

    async fn status(&self, job: &JobHandle) -> Result<JobStatus, ServiceError> {
        let resp: StatusResponse = self
            .call(
                "getDataAutomationStatus",
                &InvocationRef {
                    invocation_arn: &job.invocation_id,
                },
            )
            .await?;
        Ok(resp.into())
    }

    async fn fetch_results(&self, output_uri: &str) -> Result<Vec<ExtractionResult>, ServiceError> {
        let metadata: JobMetadata =
            serde_json::from_str(&self.get_object(&ObjectLocation::parse(output_uri)?).await?)?;
        let paths = metadata.custom_output_paths();
        if paths.is_empty() {
            warn!(output = output_uri, "job produced no custom output");
        }
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let text = self.get_object(&ObjectLocation::parse(path)?).await?;
            results.push(ExtractionResult::from_json(&text)?);
        }
        Ok(results)
    }

    async fn abort(&self, job: &JobHandle) -> Result<(), ServiceError> {
        self.post(
            "abortDataAutomation",
            &InvocationRef {
                invocation_arn: &job.invocation_id,
            },
        )
        .await?;
        info!(invocation = %job.invocation_id, "abort requested");
        Ok(())
    }
}
