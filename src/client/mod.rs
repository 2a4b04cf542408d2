pub mod types;

use crate::config::ClientConfig;
use crate::download::{self, ArtifactKind};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Method, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use types::*;

/// Request body variants accepted by the backend
pub enum Body {
    Empty,
    Json(Value),
    Multipart(Form),
}

/// HTTP client for the generation backend
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    submission_timeout: Duration,
    http_client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, submission_timeout: Duration) -> ClientResult<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::Validation(format!("Invalid API base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Validation(format!("Invalid API base URL: {}", base_url)));
        }

        Ok(Self {
            base_url,
            submission_timeout,
            http_client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(config.api_base_url(), config.submission_timeout())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::General(format!("Cannot extend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue a request and return the successful response. Non-2xx statuses
    /// become `ClientError::Server` carrying the body's `detail` or `fallback`.
    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Body,
        fallback: &str,
    ) -> ClientResult<Response> {
        tracing::debug!(%method, %url, "sending request");

        let mut builder = self.http_client.request(method, url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        builder = match body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Multipart(form) => builder.multipart(form),
        };

        let response = builder
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, fallback).await);
        }
        Ok(response)
    }

    /// Core JSON request: `request(method, path, body) -> parsed JSON`
    pub async fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Body,
        fallback: &str,
    ) -> ClientResult<Value> {
        let url = self.endpoint(segments)?;
        let response = self.send(method, url, query, body, fallback).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Same as [`request`](Self::request), aborted after the submission timeout.
    async fn submit(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        body: Body,
        fallback: &str,
    ) -> ClientResult<TaskCreated> {
        let limit = self.submission_timeout;
        let value = tokio::time::timeout(
            limit,
            self.request(Method::POST, segments, query, body, fallback),
        )
        .await
        .map_err(|_| {
            tracing::warn!(timeout = ?limit, "task submission timed out");
            ClientError::SubmissionTimeout(limit)
        })??;

        let created = task_created(value, fallback)?;
        tracing::info!(task_id = %created.task_id, "task created");
        Ok(created)
    }

    /// Liveness probe
    pub async fn health(&self) -> ClientResult<Value> {
        self.request(Method::GET, &["health"], &[], Body::Empty, "Health check failed")
            .await
    }

    /// Parse a document synchronously and return the parsed data
    pub async fn parse_document(&self, file: &UploadFile, options: &ParseOptions) -> ClientResult<Value> {
        let query = [
            ("include_metadata", options.include_metadata.to_string()),
            ("cleanup", options.cleanup.to_string()),
            ("max_pages_per_batch", options.max_pages_per_batch.to_string()),
        ];
        let form = Form::new().part("file", file.to_part());
        let value = self
            .request(
                Method::POST,
                &["api", "parser", "parse"],
                &query,
                Body::Multipart(form),
                "Document parsing failed",
            )
            .await?;
        decode::<ApiEnvelope<Value>>(value)?.into_data("Document parsing failed")
    }

    /// Create a tender generation task from an uploaded document
    pub async fn generate_tender(&self, file: &UploadFile, options: &TenderOptions) -> ClientResult<TaskCreated> {
        let mut query = vec![("quality_level", options.quality_level.clone())];
        if let Some(ref provider) = options.model_provider {
            query.push(("model_provider", provider.clone()));
        }
        let form = Form::new().part("file", file.to_part());
        self.submit(
            &["api", "tender", "generate"],
            &query,
            Body::Multipart(form),
            "Failed to create tender generation task",
        )
        .await
    }

    pub async fn tender_status(&self, task_id: &str) -> ClientResult<Value> {
        self.request(
            Method::GET,
            &["api", "tender", "status", task_id],
            &[],
            Body::Empty,
            "Failed to fetch task status",
        )
        .await
    }

    pub async fn history_records(&self, query: &HistoryQuery) -> ClientResult<HistoryPage> {
        let value = self
            .request(
                Method::GET,
                &["api", "history", "records"],
                &query.to_query(),
                Body::Empty,
                "Failed to fetch history records",
            )
            .await?;
        decode(value)
    }

    pub async fn delete_history_record(&self, record_id: &str) -> ClientResult<Value> {
        self.request(
            Method::DELETE,
            &["api", "history", "records", record_id],
            &[],
            Body::Empty,
            "Delete failed",
        )
        .await
    }

    /// Download a history record as a file
    pub async fn export_history_record(&self, record_id: &str) -> ClientResult<ExportedRecord> {
        let url = self.endpoint(&["api", "history", "export", record_id])?;
        let response = self
            .send(Method::GET, url, &[], Body::Empty, "Export failed")
            .await?;

        let headers = response.headers();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let filename = headers
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(download::filename_from_disposition)
            .unwrap_or_else(|| format!("tender_document_{}.md", record_id));

        let bytes = response
            .bytes()
            .await
            .map_err(ClientError::from_reqwest)?
            .to_vec();

        Ok(ExportedRecord {
            filename,
            content_type,
            bytes,
        })
    }

    /// Run the server-side content filter over a JSON document
    pub async fn filter_json(&self, document: Value) -> ClientResult<Value> {
        let value = self
            .request(
                Method::POST,
                &["api", "filter", "process"],
                &[],
                Body::Json(document),
                "JSON filtering failed",
            )
            .await?;
        decode::<ApiEnvelope<Value>>(value)?.into_data("JSON filtering failed")
    }

    /// Create a bid-proposal task from an uploaded tender JSON file
    pub async fn upload_bid_json(&self, file: &UploadFile, options: &BidProposalOptions) -> ClientResult<TaskCreated> {
        let mut form = Form::new()
            .part("file", file.to_part())
            .text("generate_outline_only", options.generate_outline_only.to_string());
        if let Some(ref model_name) = options.model_name {
            form = form.text("model_name", model_name.clone());
        }
        if let Some(batch_size) = options.batch_size {
            form = form.text("batch_size", batch_size.to_string());
        }
        self.submit(
            &["api", "gender_book", "upload_json"],
            &[],
            Body::Multipart(form),
            "Bid proposal generation failed",
        )
        .await
    }

    /// Create a bid-proposal task from an in-memory tender document
    pub async fn generate_bid_from_json(&self, document: Value, options: &BidProposalOptions) -> ClientResult<TaskCreated> {
        let mut body = serde_json::to_value(options)?;
        body["tender_document_json"] = document;
        self.submit(
            &["api", "gender_book", "generate_from_json"],
            &[],
            Body::Json(body),
            "Bid proposal generation failed",
        )
        .await
    }

    pub async fn bid_status(&self, task_id: &str) -> ClientResult<Value> {
        self.request(
            Method::GET,
            &["api", "gender_book", "status", task_id],
            &[],
            Body::Empty,
            "Failed to fetch task status",
        )
        .await
    }

    pub async fn bid_tasks(&self, limit: u32, offset: u32) -> ClientResult<TaskList> {
        let query = [("limit", limit.to_string()), ("offset", offset.to_string())];
        let value = self
            .request(
                Method::GET,
                &["api", "gender_book", "tasks"],
                &query,
                Body::Empty,
                "Failed to fetch task list",
            )
            .await?;
        ensure_success(&value, "Failed to fetch task list")?;
        decode(value)
    }

    pub async fn delete_bid_task(&self, task_id: &str) -> ClientResult<()> {
        let value = self
            .request(
                Method::DELETE,
                &["api", "gender_book", "tasks", task_id],
                &[],
                Body::Empty,
                "Failed to delete task",
            )
            .await?;
        ensure_success(&value, "Failed to delete task")
    }

    /// Analyze a tender document without generating a proposal
    pub async fn analyze_bid_json(&self, document: Value, model_name: Option<&str>) -> ClientResult<Value> {
        let mut body = json!({ "json_data": document });
        if let Some(model_name) = model_name {
            body["model_name"] = json!(model_name);
        }
        let value = self
            .request(
                Method::POST,
                &["api", "gender_book", "analyze_json"],
                &[],
                Body::Json(body),
                "Content analysis failed",
            )
            .await?;
        decode::<ApiEnvelope<Value>>(value)?.into_data("Content analysis failed")
    }

    /// Absolute download URL of a generated artifact
    pub fn artifact_url(&self, kind: ArtifactKind, filename: &str) -> String {
        download::artifact_url(self.base_url(), kind, filename)
    }
}

/// Extract the server's `detail` text from an error response
pub(crate) async fn error_from_response(response: Response, fallback: &str) -> ClientError {
    let status = response.status().as_u16();
    let detail = match response.text().await {
        Ok(body) => extract_detail(&body),
        Err(_) => None,
    };
    let detail = detail.unwrap_or_else(|| fallback.to_string());
    tracing::debug!(status, %detail, "request rejected by server");
    ClientError::server(status, detail)
}

pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}

fn ensure_success(value: &Value, fallback: &str) -> ClientResult<()> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let detail = ["error", "message"]
            .iter()
            .filter_map(|key| value.get(*key).and_then(Value::as_str))
            .find(|s| !s.trim().is_empty())
            .unwrap_or(fallback);
        return Err(ClientError::server(200, detail));
    }
    Ok(())
}

/// Accepts both the bare `{task_id, ...}` body and the `{success, task_id, data}` envelope
fn task_created(value: Value, fallback: &str) -> ClientResult<TaskCreated> {
    if value.get("success").is_some() {
        let envelope = decode::<ApiEnvelope<Value>>(value)?.into_result(fallback)?;
        let status_url = envelope
            .data
            .as_ref()
            .and_then(|d| d.get("status_url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let task_id = envelope
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ClientError::Decode(format!("{}: response has no task_id", fallback)))?;
        return Ok(TaskCreated {
            task_id,
            message: envelope.message,
            status_url,
        });
    }

    match value.get("task_id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => decode(value),
        _ => {
            let detail = value
                .get("detail")
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string();
            Err(ClientError::server(200, detail))
        }
    }
}

/// Where the poller reads task status from
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn fetch_status(&self, task_id: &str) -> ClientResult<Value>;
}

/// Status endpoint of the tender generator
pub struct TenderStatus(pub Arc<ApiClient>);

#[async_trait]
impl TaskStatusSource for TenderStatus {
    async fn fetch_status(&self, task_id: &str) -> ClientResult<Value> {
        self.0.tender_status(task_id).await
    }
}

/// Status endpoint of the bid-proposal generator
pub struct BidStatus(pub Arc<ApiClient>);

#[async_trait]
impl TaskStatusSource for BidStatus {
    async fn fetch_status(&self, task_id: &str) -> ClientResult<Value> {
        self.0.bid_status(task_id).await
    }
}
