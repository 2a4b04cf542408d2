//! Maps task snapshots onto view state. Formatting only; the workflows in
//! [`crate::manager`] decide what happens next.

use crate::client::types::{Task, TaskResult, TaskStatus};
use crate::config::ClientConfig;
use crate::download::{self, blob::TEXT_MIME, ArtifactKind};
use crate::error::ClientError;
use crate::poller::SnapshotSink;
use tokio::sync::watch;

/// Progress shown before the server reports any
pub const PLACEHOLDER_PERCENT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Retry,
    Delete,
}

/// A server-hosted artifact the user can fetch
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadAction {
    pub kind: ArtifactKind,
    pub filename: String,
    pub url: String,
}

/// Inline content offered when no artifact file was produced
#[derive(Debug, Clone, PartialEq)]
pub struct InlineDownload {
    pub filename: String,
    pub mime: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskView {
    Idle,
    Notice {
        level: NoticeLevel,
        text: String,
    },
    Progress {
        task_id: String,
        status_label: &'static str,
        percent: u8,
        message: String,
    },
    Completed {
        task_id: String,
        downloads: Vec<DownloadAction>,
        inline: Option<InlineDownload>,
        result: TaskResult,
        finished_at: Option<String>,
    },
    Failed {
        task_id: String,
        error: String,
        actions: Vec<FailureAction>,
    },
}

impl TaskView {
    /// Initial display right after a task is created
    pub fn pending(task_id: impl Into<String>) -> Self {
        TaskView::Progress {
            task_id: task_id.into(),
            status_label: status_label(TaskStatus::Pending),
            percent: PLACEHOLDER_PERCENT,
            message: status_label(TaskStatus::Pending).to_string(),
        }
    }

    pub fn notice(level: NoticeLevel, text: impl Into<String>) -> Self {
        TaskView::Notice {
            level,
            text: text.into(),
        }
    }

    pub fn error(err: &ClientError) -> Self {
        Self::notice(NoticeLevel::Error, err.user_message())
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            TaskView::Progress { task_id, .. }
            | TaskView::Completed { task_id, .. }
            | TaskView::Failed { task_id, .. } => Some(task_id),
            TaskView::Idle | TaskView::Notice { .. } => None,
        }
    }
}

pub fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::Processing => "Processing",
        TaskStatus::Completed => "Completed",
        TaskStatus::Failed => "Failed",
    }
}

/// What the binder needs to build download actions
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactLinks {
    pub base_url: String,
    pub filename_prefix: String,
}

impl ArtifactLinks {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            base_url: config.api_base_url().to_string(),
            filename_prefix: config.download.default_filename_prefix.clone(),
        }
    }
}

pub fn render(snapshot: &Task, links: &ArtifactLinks) -> TaskView {
    if let Some(result) = snapshot.result() {
        return render_completed(snapshot, result, links);
    }
    if let Some(error) = snapshot.error() {
        return TaskView::Failed {
            task_id: snapshot.task_id.clone(),
            error: error.to_string(),
            actions: vec![FailureAction::Retry, FailureAction::Delete],
        };
    }

    let label = status_label(snapshot.status);
    TaskView::Progress {
        task_id: snapshot.task_id.clone(),
        status_label: label,
        percent: snapshot.progress.unwrap_or(PLACEHOLDER_PERCENT),
        message: snapshot
            .message
            .clone()
            .unwrap_or_else(|| label.to_string()),
    }
}

fn render_completed(snapshot: &Task, result: &TaskResult, links: &ArtifactLinks) -> TaskView {
    let files = [
        (ArtifactKind::Word, &result.word_filename),
        (ArtifactKind::Markdown, &result.markdown_filename),
    ];
    let downloads: Vec<DownloadAction> = files
        .into_iter()
        .filter_map(|(kind, filename)| {
            filename.as_ref().map(|filename| DownloadAction {
                kind,
                filename: filename.clone(),
                url: download::artifact_url(&links.base_url, kind, filename),
            })
        })
        .collect();

    let inline = if downloads.is_empty() {
        result.inline_text().map(|content| InlineDownload {
            filename: format!("{}_{}.txt", links.filename_prefix, snapshot.task_id),
            mime: TEXT_MIME,
            content: content.to_string(),
        })
    } else {
        None
    };

    TaskView::Completed {
        task_id: snapshot.task_id.clone(),
        downloads,
        inline,
        result: result.clone(),
        finished_at: snapshot.updated_at.clone(),
    }
}

/// Renders every applied snapshot and publishes it to subscribers
pub struct ViewSink {
    links: ArtifactLinks,
    sender: watch::Sender<TaskView>,
}

impl ViewSink {
    pub fn new(links: ArtifactLinks) -> Self {
        let (sender, _) = watch::channel(TaskView::Idle);
        Self { links, sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskView> {
        self.sender.subscribe()
    }

    pub fn show(&self, view: TaskView) {
        self.sender.send_replace(view);
    }

    pub fn current(&self) -> TaskView {
        self.sender.borrow().clone()
    }

    pub fn clear(&self) {
        self.show(TaskView::Idle);
    }
}

impl SnapshotSink for ViewSink {
    fn on_snapshot(&self, snapshot: &Task) {
        self.show(render(snapshot, &self.links));
    }
}
