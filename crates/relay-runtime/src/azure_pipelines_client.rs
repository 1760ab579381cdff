use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::credentials::CachedCredential;
use crate::external_services::{BuildHost, PipelineRunRequest, QueueBuildRequest};
use crate::transport_helpers::{send_with_retry, RetryPolicy};

pub const AZURE_DEVOPS_API_VERSION: &str = "7.1";

#[derive(Clone)]
/// Azure DevOps build and pipelines REST client.
pub struct AzurePipelinesClient {
    http: reqwest::Client,
    organization_url: String,
    credential: Arc<CachedCredential>,
    organization_credentials: BTreeMap<String, Arc<CachedCredential>>,
    retry: RetryPolicy,
}

fn normalize_organization(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

fn web_link(value: &Value) -> Option<String> {
    value
        .pointer("/_links/web/href")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// Request body for the classic build queue endpoint. Build parameters travel
/// as a JSON-encoded string.
fn queue_build_body(request: &QueueBuildRequest) -> Result<Value> {
    let mut body = Map::new();
    body.insert("definition".to_string(), json!({ "id": request.definition_id }));
    if let Some(queue_id) = request.queue_id {
        body.insert("queue".to_string(), json!({ "id": queue_id }));
    }
    body.insert(
        "sourceBranch".to_string(),
        Value::String(request.source_branch.clone()),
    );
    if !request.source_version.is_empty() {
        body.insert(
            "sourceVersion".to_string(),
            Value::String(request.source_version.clone()),
        );
    }
    let parameters = serde_json::to_string(&request.parameters)
        .context("failed to encode build parameters")?;
    body.insert("parameters".to_string(), Value::String(parameters));
    Ok(Value::Object(body))
}

fn pipeline_run_body(request: &PipelineRunRequest) -> Value {
    let repositories = request
        .repository_overrides
        .iter()
        .map(|(alias, ref_name)| (alias.clone(), json!({ "refName": ref_name })))
        .collect::<Map<String, Value>>();
    json!({
        "resources": { "repositories": repositories },
        "templateParameters": request.template_parameters,
    })
}

impl AzurePipelinesClient {
    pub fn new(
        organization_url: impl Into<String>,
        credential: Arc<CachedCredential>,
        request_timeout_ms: u64,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create azure pipelines client")?;
        Ok(Self {
            http,
            organization_url: organization_url.into().trim_end_matches('/').to_string(),
            credential,
            organization_credentials: BTreeMap::new(),
            retry,
        })
    }

    /// Uses `credential` instead of the default one for requests against
    /// `organization_url`.
    pub fn with_organization_credential(
        mut self,
        organization_url: &str,
        credential: Arc<CachedCredential>,
    ) -> Self {
        self.organization_credentials
            .insert(normalize_organization(organization_url), credential);
        self
    }

    fn organization<'a>(&'a self, override_url: Option<&'a str>) -> &'a str {
        override_url
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .unwrap_or(self.organization_url.as_str())
    }

    fn credential_for(&self, organization: &str) -> &CachedCredential {
        self.organization_credentials
            .get(&normalize_organization(organization))
            .unwrap_or(&self.credential)
    }

    async fn post_json(
        &self,
        operation: &str,
        organization: &str,
        url: &str,
        body: &Value,
    ) -> Result<Value> {
        let token = self.credential_for(organization).token().await?;
        let response = send_with_retry("azure pipelines", operation, self.retry, &[], || {
            token.apply(
                self.http
                    .post(url)
                    .query(&[("api-version", AZURE_DEVOPS_API_VERSION)])
                    .json(body),
            )
        })
        .await?;
        response
            .json::<Value>()
            .await
            .with_context(|| format!("failed to decode azure pipelines {operation}"))
    }
}

#[async_trait]
impl BuildHost for AzurePipelinesClient {
    async fn queue_build(&self, request: &QueueBuildRequest) -> Result<String> {
        let organization = self.organization(request.organization.as_deref());
        let url = format!("{organization}/{}/_apis/build/builds", request.project);
        let body = queue_build_body(request)?;
        let response = self
            .post_json("queue build", organization, &url, &body)
            .await?;
        web_link(&response).ok_or_else(|| {
            anyhow!(
                "azure pipelines queue build response for definition {} has no web link",
                request.definition_id
            )
        })
    }

    async fn run_pipeline(&self, request: &PipelineRunRequest) -> Result<String> {
        let organization = self.organization(request.organization.as_deref());
        let url = format!(
            "{organization}/{}/_apis/pipelines/{}/runs",
            request.project, request.pipeline_id
        );
        let response = self
            .post_json("run pipeline", organization, &url, &pipeline_run_body(request))
            .await?;
        web_link(&response).ok_or_else(|| {
            anyhow!(
                "azure pipelines run response for pipeline {} has no web link",
                request.pipeline_id
            )
        })
    }
}
