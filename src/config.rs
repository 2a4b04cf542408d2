use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `api.base_url`
pub const BASE_URL_ENV: &str = "TENDER_API_BASE_URL";

/// Runtime configuration, laid out like `frontend_config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiSettings,
    pub ui: UiSettings,
    pub download: DownloadSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: crate::DEFAULT_API_BASE_URL.to_string(),
            timeout_ms: 60_000,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub status_polling_interval_ms: u64,
    pub auto_cleanup_blob_urls_ms: u64,
    pub max_file_size_mb: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            status_polling_interval_ms: 3_000,
            auto_cleanup_blob_urls_ms: 60_000,
            max_file_size_mb: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub default_filename_prefix: String,
    pub supported_formats: Vec<String>,
    pub fallback_format: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            default_filename_prefix: "bid_proposal".to_string(),
            supported_formats: vec!["word".to_string(), "markdown".to_string()],
            fallback_format: "txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub default_model_provider: String,
    pub enable_optimization_default: bool,
    pub include_analysis_default: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_model_provider: "deepseek".to_string(),
            enable_optimization_default: true,
            include_analysis_default: true,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ClientError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&raw)
    }

    /// Fetch the configuration document, falling back to the defaults when it
    /// cannot be retrieved or parsed.
    pub async fn load(url: &str) -> Self {
        match Self::fetch(url).await {
            Ok(config) => {
                tracing::info!(url, "loaded client configuration");
                config
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "configuration unavailable, using defaults");
                Self::default()
            }
        }
    }

    async fn fetch(url: &str) -> Result<Self, ClientError> {
        let response = reqwest::get(url)
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::server(
                status.as_u16(),
                "configuration document unavailable",
            ));
        }

        let body = response
            .text()
            .await
            .map_err(ClientError::from_reqwest)?;
        Self::from_json_str(&body)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                self.api.base_url = base_url.trim().to_string();
            }
        }
        self
    }

    pub fn api_base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }

    /// A zero interval falls back to the default
    pub fn polling_interval(&self) -> Duration {
        match self.ui.status_polling_interval_ms {
            0 => Duration::from_millis(UiSettings::default().status_polling_interval_ms),
            ms => Duration::from_millis(ms),
        }
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    pub fn blob_release_delay(&self) -> Duration {
        Duration::from_millis(self.ui.auto_cleanup_blob_urls_ms)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.ui.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}
