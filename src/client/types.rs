use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lifecycle status reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// What a task has produced so far. Only terminal statuses carry a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    InProgress,
    Completed(TaskResult),
    Failed(String),
}

/// One observed snapshot of a server task.
///
/// Built only through [`crate::manager::mapper::map_status_payload`], which
/// guarantees that `status` and `outcome` agree.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub outcome: TaskOutcome,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Task {
    pub fn result(&self) -> Option<&TaskResult> {
        match &self.outcome {
            TaskOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Payload of a completed task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docx_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_content: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TaskResult {
    /// Inline text to offer when the server produced no downloadable file
    pub fn inline_text(&self) -> Option<&str> {
        self.docx_content
            .as_deref()
            .or(self.bid_content.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn has_files(&self) -> bool {
        self.word_filename.is_some() || self.markdown_filename.is_some()
    }
}

/// `{success, data, message, error}` wrapper used by most endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub task_id: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Turn `success: false` into an error, keeping the envelope otherwise.
    pub fn into_result(self, fallback: &str) -> Result<Self, ClientError> {
        if self.success {
            return Ok(self);
        }
        let detail = non_empty(self.error)
            .or_else(|| non_empty(self.message))
            .unwrap_or_else(|| fallback.to_string());
        Err(ClientError::server(200, detail))
    }

    pub fn into_data(self, fallback: &str) -> Result<T, ClientError> {
        self.into_result(fallback)?
            .data
            .ok_or_else(|| ClientError::Decode("response has no data field".to_string()))
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Response of every task-creating endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskCreated {
    pub task_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status_url: Option<String>,
}

/// Page of bid-proposal tasks
#[derive(Debug, Clone, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub tasks: Vec<serde_json::Value>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub limit: u32,
    pub offset: u32,
    pub status: Option<String>,
    pub model: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            status: None,
            model: None,
            date_from: None,
            date_to: None,
        }
    }
}

impl HistoryQuery {
    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            limit: per_page,
            offset: page.saturating_sub(1) * per_page,
            ..Default::default()
        }
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        let optional = [
            ("status", &self.status),
            ("model", &self.model),
            ("date_from", &self.date_from),
            ("date_to", &self.date_to),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                query.push((key, value.clone()));
            }
        }
        query
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub records: Vec<HistoryRecord>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRecord {
    pub record_id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub model_provider: String,
    #[serde(default)]
    pub quality_level: String,
    #[serde(default)]
    pub generation_time: String,
    pub processing_duration: Option<f64>,
    #[serde(default)]
    pub status: String,
    pub error_message: Option<String>,
    pub tender_summary: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// A history record exported as a file
#[derive(Debug, Clone)]
pub struct ExportedRecord {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    pub include_metadata: bool,
    pub cleanup: bool,
    pub max_pages_per_batch: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            cleanup: true,
            max_pages_per_batch: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenderOptions {
    pub model_provider: Option<String>,
    pub quality_level: String,
}

impl Default for TenderOptions {
    fn default() -> Self {
        Self {
            model_provider: None,
            quality_level: "standard".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BidProposalOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub generate_outline_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
}

/// A file selected for upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ClientError::Validation(format!("Not a file: {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub(crate) fn to_part(&self) -> reqwest::multipart::Part {
        reqwest::multipart::Part::bytes(self.bytes.clone()).file_name(self.file_name.clone())
    }
}
