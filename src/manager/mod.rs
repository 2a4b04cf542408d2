pub mod bid;
pub mod mapper;
pub mod tender;
pub mod validation;

pub use bid::{BidProposalGenerator, BidRequest};
pub use tender::{TenderGenerator, TenderRequest};

use crate::binder::{ArtifactLinks, NoticeLevel, TaskView, ViewSink};
use crate::client::types::TaskCreated;
use crate::client::{ApiClient, TaskStatusSource};
use crate::config::ClientConfig;
use crate::download::{self, ArtifactKind, BlobHandle, BlobStore};
use crate::error::{ClientError, ClientResult};
use crate::poller::{PollerState, TaskPoller};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// A task-creating request that can be replayed by `retry`
#[async_trait]
pub trait Submission: Clone + Send + Sync {
    async fn submit(&self, api: &ApiClient) -> ClientResult<TaskCreated>;
}

/// Create → poll → bind lifecycle shared by the generators
pub(crate) struct Workflow<R: Submission> {
    api: Arc<ApiClient>,
    poller: TaskPoller,
    views: Arc<ViewSink>,
    blobs: BlobStore,
    max_file_size: u64,
    last_request: Mutex<Option<R>>,
}

impl<R: Submission> Workflow<R> {
    pub(crate) fn new(
        api: Arc<ApiClient>,
        source: Arc<dyn TaskStatusSource>,
        config: &ClientConfig,
    ) -> Self {
        let views = Arc::new(ViewSink::new(ArtifactLinks {
            base_url: api.base_url().to_string(),
            filename_prefix: config.download.default_filename_prefix.clone(),
        }));
        let poller = TaskPoller::new(source, views.clone(), config.polling_interval());

        Self {
            api,
            poller,
            views,
            blobs: BlobStore::new(config.blob_release_delay()),
            max_file_size: config.max_file_size_bytes(),
            last_request: Mutex::new(None),
        }
    }

    /// Render the error into the view and hand it back
    pub(crate) fn fail(&self, err: ClientError) -> ClientError {
        if err.is_validation() {
            tracing::debug!(error = %err, "input rejected");
        } else {
            tracing::warn!(error = %err, "action failed");
        }
        self.views.show(TaskView::error(&err));
        err
    }

    pub(crate) async fn launch(&self, request: R) -> ClientResult<TaskCreated> {
        self.poller.stop().await;
        *self.last_request.lock().await = Some(request.clone());
        self.views
            .show(TaskView::notice(NoticeLevel::Info, "Creating generation task..."));

        match request.submit(&self.api).await {
            Ok(created) => {
                self.views.show(TaskView::pending(&created.task_id));
                self.poller.start(created.task_id.clone()).await;
                Ok(created)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub(crate) async fn retry(&self) -> ClientResult<TaskCreated> {
        let request = self.last_request.lock().await.clone();
        match request {
            Some(request) => self.launch(request).await,
            None => Err(self.fail(ClientError::Validation(
                "There is no previous generation to retry".to_string(),
            ))),
        }
    }

    /// Stop polling `task_id` if it is the active task and clear its view
    pub(crate) async fn forget(&self, task_id: &str) {
        if self.poller.task_id().await.as_deref() == Some(task_id) {
            self.poller.stop().await;
        }
        if self.views.current().task_id() == Some(task_id) {
            self.views
                .show(TaskView::notice(NoticeLevel::Success, "Task deleted"));
        }
    }

    pub(crate) async fn download(
        &self,
        kind: ArtifactKind,
        filename: &str,
        dest_dir: &Path,
    ) -> ClientResult<PathBuf> {
        let url = self.api.artifact_url(kind, filename);
        download::download_to_file(self.api.http(), &url, dest_dir, filename)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Blob for the inline content of the current completed view, if any
    pub(crate) async fn inline_download(&self) -> Option<BlobHandle> {
        match self.views.current() {
            TaskView::Completed {
                inline: Some(inline),
                ..
            } => Some(
                self.blobs
                    .create(inline.content.into_bytes(), inline.mime, inline.filename)
                    .await,
            ),
            _ => None,
        }
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.api
    }

    pub(crate) fn views(&self) -> &ViewSink {
        &self.views
    }

    pub(crate) fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub(crate) fn poller(&self) -> &TaskPoller {
        &self.poller
    }

    pub(crate) fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<TaskView> {
        self.views.subscribe()
    }

    pub(crate) async fn state(&self) -> PollerState {
        self.poller.state().await
    }
}
