use super::validation::{self, PARSER_EXTENSIONS, TENDER_SOURCE_EXTENSIONS};
use super::{Submission, Workflow};
use crate::binder::{NoticeLevel, TaskView};
use crate::client::types::{ParseOptions, TaskCreated, TenderOptions, UploadFile};
use crate::client::{ApiClient, TenderStatus};
use crate::config::ClientConfig;
use crate::download::{ArtifactKind, BlobHandle};
use crate::error::ClientResult;
use crate::poller::PollerState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct TenderRequest {
    pub file: UploadFile,
    pub options: TenderOptions,
}

#[async_trait]
impl Submission for TenderRequest {
    async fn submit(&self, api: &ApiClient) -> ClientResult<TaskCreated> {
        api.generate_tender(&self.file, &self.options).await
    }
}

/// Generates tender documents from a source PDF or Word file
pub struct TenderGenerator {
    workflow: Workflow<TenderRequest>,
    default_provider: String,
}

impl TenderGenerator {
    pub fn new(api: Arc<ApiClient>, config: &ClientConfig) -> Self {
        let source = Arc::new(TenderStatus(api.clone()));
        Self {
            workflow: Workflow::new(api, source, config),
            default_provider: config.generation.default_model_provider.clone(),
        }
    }

    pub fn default_options(&self) -> TenderOptions {
        TenderOptions {
            model_provider: Some(self.default_provider.clone()),
            ..Default::default()
        }
    }

    pub async fn generate(
        &self,
        file: Option<UploadFile>,
        options: TenderOptions,
    ) -> ClientResult<TaskCreated> {
        let file = validation::check_upload(
            file,
            TENDER_SOURCE_EXTENSIONS,
            self.workflow.max_file_size(),
        )
        .map_err(|e| self.workflow.fail(e))?;

        tracing::info!(file = %file.file_name, quality = %options.quality_level, "submitting tender generation");
        self.workflow.launch(TenderRequest { file, options }).await
    }

    /// Parse a document and keep the result as a downloadable JSON blob
    pub async fn parse(&self, file: Option<UploadFile>, options: &ParseOptions) -> ClientResult<BlobHandle> {
        let file = validation::check_upload(file, PARSER_EXTENSIONS, self.workflow.max_file_size())
            .map_err(|e| self.workflow.fail(e))?;

        self.workflow
            .views()
            .show(TaskView::notice(NoticeLevel::Info, "Parsing document..."));

        let parsed = match self.workflow.api().parse_document(&file, options).await {
            Ok(parsed) => parsed,
            Err(e) => return Err(self.workflow.fail(e)),
        };
        let handle = self
            .workflow
            .blobs()
            .create_json(&parsed, &file.file_name)
            .await
            .map_err(|e| self.workflow.fail(e))?;

        self.workflow
            .views()
            .show(TaskView::notice(NoticeLevel::Success, "Document parsed"));
        Ok(handle)
    }

    pub async fn retry(&self) -> ClientResult<TaskCreated> {
        self.workflow.retry().await
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

    pub async fn inline_download(&self) -> Option<BlobHandle> {
        self.workflow.inline_download().await
    }
}
