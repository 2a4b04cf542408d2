use crate::error::{ClientError, ClientResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

pub const JSON_MIME: &str = "application/json";
pub const TEXT_MIME: &str = "text/plain;charset=utf-8";

/// In-memory downloadable object
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub id: String,
    pub mime: String,
    pub filename: String,
    pub bytes: Arc<Vec<u8>>,
}

impl Blob {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

type BlobMap = Mutex<HashMap<String, Blob>>;

/// Registry of live blobs. Every blob is released automatically after
/// `release_delay`; releasing earlier is allowed and idempotent.
#[derive(Clone)]
pub struct BlobStore {
    blobs: Arc<BlobMap>,
    release_delay: Duration,
}

impl BlobStore {
    pub fn new(release_delay: Duration) -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            release_delay,
        }
    }

    pub async fn create(
        &self,
        bytes: Vec<u8>,
        mime: impl Into<String>,
        filename: impl Into<String>,
    ) -> BlobHandle {
        let blob = Blob {
            id: format!("blob:{}", uuid::Uuid::new_v4()),
            mime: mime.into(),
            filename: filename.into(),
            bytes: Arc::new(bytes),
        };
        let id = blob.id.clone();
        tracing::debug!(id = %id, filename = %blob.filename, size = blob.size(), "blob created");
        self.blobs.lock().await.insert(id.clone(), blob);

        Self::schedule_release(Arc::downgrade(&self.blobs), id.clone(), self.release_delay);

        BlobHandle {
            id,
            store: self.clone(),
        }
    }

    /// Pretty-printed JSON named after the input file, e.g. `tender_parsed.json`
    pub async fn create_json(
        &self,
        value: &serde_json::Value,
        original_name: &str,
    ) -> ClientResult<BlobHandle> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let filename = super::derived_filename(original_name, "_parsed", "json");
        Ok(self.create(bytes, JSON_MIME, filename).await)
    }

    pub async fn create_text(&self, text: &str, filename: impl Into<String>) -> BlobHandle {
        self.create(text.as_bytes().to_vec(), TEXT_MIME, filename).await
    }

    fn schedule_release(blobs: Weak<BlobMap>, id: String, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(blobs) = blobs.upgrade() {
                if blobs.lock().await.remove(&id).is_some() {
                    tracing::debug!(id = %id, "blob released after timeout");
                }
            }
        });
    }

    pub async fn get(&self, id: &str) -> Option<Blob> {
        self.blobs.lock().await.get(id).cloned()
    }

    /// Write the blob to `dir` under its filename
    pub async fn save(&self, id: &str, dir: &Path) -> ClientResult<PathBuf> {
        let blob = self
            .get(id)
            .await
            .ok_or_else(|| ClientError::BlobNotFound(id.to_string()))?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&blob.filename);
        tokio::fs::write(&path, blob.bytes.as_slice()).await?;
        Ok(path)
    }

    /// Returns `false` when the blob was already released
    pub async fn release(&self, id: &str) -> bool {
        let removed = self.blobs.lock().await.remove(id).is_some();
        if removed {
            tracing::debug!(id, "blob released");
        }
        removed
    }

    pub async fn live_count(&self) -> usize {
        self.blobs.lock().await.len()
    }
}

/// Handle to one blob in a [`BlobStore`]
#[derive(Clone)]
pub struct BlobHandle {
    id: String,
    store: BlobStore,
}

impl std::fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobHandle").field("id", &self.id).finish()
    }
}

impl BlobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn blob(&self) -> Option<Blob> {
        self.store.get(&self.id).await
    }

    pub async fn save(&self, dir: &Path) -> ClientResult<PathBuf> {
        self.store.save(&self.id, dir).await
    }

    pub async fn release(&self) -> bool {
        self.store.release(&self.id).await
    }
}
