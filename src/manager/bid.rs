use super::validation::{self, JSON_EXTENSIONS};
use super::{Submission, Workflow};
use crate::binder::{NoticeLevel, TaskView};
use crate::client::types::{BidProposalOptions, TaskCreated, TaskList, UploadFile};
use crate::client::{ApiClient, BidStatus};
use crate::config::ClientConfig;
use crate::download::{ArtifactKind, BlobHandle};
use crate::error::{ClientError, ClientResult};
use crate::poller::PollerState;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Input of one bid-proposal generation
#[derive(Debug, Clone)]
pub enum BidRequest {
    Upload {
        file: UploadFile,
        options: BidProposalOptions,
    },
    Document {
        document: Value,
        options: BidProposalOptions,
    },
}

#[async_trait]
impl Submission for BidRequest {
    async fn submit(&self, api: &ApiClient) -> ClientResult<TaskCreated> {
        match self {
            BidRequest::Upload { file, options } => api.upload_bid_json(file, options).await,
            BidRequest::Document { document, options } => {
                api.generate_bid_from_json(document.clone(), options).await
            }
        }
    }
}

/// Turns a tender JSON document into a bid proposal and tracks the task
pub struct BidProposalGenerator {
    workflow: Workflow<BidRequest>,
    default_model: String,
}

impl BidProposalGenerator {
    pub fn new(api: Arc<ApiClient>, config: &ClientConfig) -> Self {
        let source = Arc::new(BidStatus(api.clone()));
        Self {
            workflow: Workflow::new(api, source, config),
            default_model: config.generation.default_model_provider.clone(),
        }
    }

    /// Options carrying the configured default model
    pub fn default_options(&self) -> BidProposalOptions {
        BidProposalOptions {
            model_name: Some(self.default_model.clone()),
            ..Default::default()
        }
    }

    /// Validate the selected file, create the task and start polling it
    pub async fn generate(
        &self,
        file: Option<UploadFile>,
        options: BidProposalOptions,
    ) -> ClientResult<TaskCreated> {
        let file = validation::check_upload(file, JSON_EXTENSIONS, self.workflow.max_file_size())
            .and_then(|file| {
                let document = validation::parse_json_file(&file)?;
                validation::require_tender_document(&document)?;
                Ok(file)
            })
            .map_err(|e| self.workflow.fail(e))?;

        tracing::info!(file = %file.file_name, size = file.size(), "submitting bid proposal");
        self.workflow
            .launch(BidRequest::Upload { file, options })
            .await
    }

    /// Same as [`generate`](Self::generate) for a document already in memory
    pub async fn generate_from_value(
        &self,
        document: Value,
        options: BidProposalOptions,
    ) -> ClientResult<TaskCreated> {
        validation::require_tender_document(&document).map_err(|e| self.workflow.fail(e))?;
        self.workflow
            .launch(BidRequest::Document { document, options })
            .await
    }

    /// Pasted tender JSON
    pub async fn generate_from_text(
        &self,
        text: &str,
        options: BidProposalOptions,
    ) -> ClientResult<TaskCreated> {
        let document = validation::require_text(text, validation::MIN_TEXT_CHARS)
            .and_then(|text| {
                serde_json::from_str::<Value>(text).map_err(|e| {
                    ClientError::Validation(format!("Input is not valid JSON: {}", e))
                })
            })
            .map_err(|e| self.workflow.fail(e))?;
        self.generate_from_value(document, options).await
    }

    /// Content analysis; no task is created
    pub async fn analyze(&self, file: Option<UploadFile>, model_name: Option<&str>) -> ClientResult<Value> {
        let document = validation::check_upload(file, JSON_EXTENSIONS, self.workflow.max_file_size())
            .and_then(|file| validation::parse_json_file(&file))
            .map_err(|e| self.workflow.fail(e))?;

        self.workflow
            .views()
            .show(TaskView::notice(NoticeLevel::Info, "Analyzing document..."));
        match self.workflow.api().analyze_bid_json(document, model_name).await {
            Ok(analysis) => {
                self.workflow
                    .views()
                    .show(TaskView::notice(NoticeLevel::Success, "Analysis complete"));
                Ok(analysis)
            }
            Err(e) => Err(self.workflow.fail(e)),
        }
    }

    /// Resubmit the last request
    pub async fn retry(&self) -> ClientResult<TaskCreated> {
        self.workflow.retry().await
    }

    /// Delete the task on the server, then drop any local state about it
    pub async fn delete(&self, task_id: &str) -> ClientResult<()> {
        if let Err(e) = self.workflow.api().delete_bid_task(task_id).await {
            return Err(self.workflow.fail(e));
        }
        tracing::info!(task_id, "bid task deleted");
        self.workflow.forget(task_id).await;
        Ok(())
    }

    pub async fn list_tasks(&self, limit: u32, offset: u32) -> ClientResult<TaskList> {
        self.workflow.api().bid_tasks(limit, offset).await
    }

    pub async fn refresh(&self) -> bool {
        self.workflow.poller().refresh().await
    }

    pub async fn stop(&self) -> bool {
        self.workflow.poller().stop().await
    }

    pub async fn state(&self) -> PollerState {
        self.workflow.state().await
    }

    pub fn current_view(&self) -> TaskView {
        self.workflow.views().current()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskView> {
        self.workflow.subscribe()
    }

    pub async fn download(&self, kind: ArtifactKind, filename: &str, dest_dir: &Path) -> ClientResult<PathBuf> {
        self.workflow.download(kind, filename, dest_dir).await
    }

    /// Blob for the generated text when the task produced no files
    pub async fn inline_download(&self) -> Option<BlobHandle> {
        self.workflow.inline_download().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn generator(base_url: &str) -> BidProposalGenerator {
        let api = Arc::new(ApiClient::new(base_url, Duration::from_secs(5)).unwrap());
        BidProposalGenerator::new(api, &ClientConfig::default())
    }

    #[tokio::test]
    async fn test_wrong_file_type_is_rejected_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let upload = server
            .mock("POST", "/api/gender_book/upload_json")
            .expect(0)
            .create_async()
            .await;

        let generator = generator(&server.url());
        let file = UploadFile::new("scan.png", vec![1, 2, 3]);
        let err = generator
            .generate(Some(file), BidProposalOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(
            generator.current_view(),
            TaskView::Notice { level: NoticeLevel::Error, .. }
        ));
        assert_eq!(generator.state().await, PollerState::Idle);
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_content_is_rejected() {
        let generator = generator("http://127.0.0.1:9");
        let file = UploadFile::new("tender.json", br#"{"title": "x"}"#.to_vec());
        let err = generator
            .generate(Some(file), BidProposalOptions::default())
            .await
            .unwrap_err();
        assert!(err.user_message().contains("content"));

        let err = generator
            .generate(None, BidProposalOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_short_text_is_rejected() {
        let generator = generator("http://127.0.0.1:9");
        let err = generator
            .generate_from_text("  {}  ", BidProposalOptions::default())
            .await
            .unwrap_err();
        assert!(err.user_message().contains("at least"));

        let err = generator
            .generate_from_text("this is not json at all", BidProposalOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_retry_without_previous_request() {
        let generator = generator("http://127.0.0.1:9");
        assert!(generator.retry().await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_default_options_use_configured_model() {
        let generator = generator("http://127.0.0.1:9");
        let options = generator.default_options();
        assert_eq!(options.model_name.as_deref(), Some("deepseek"));
        assert!(!options.generate_outline_only);
    }
}
