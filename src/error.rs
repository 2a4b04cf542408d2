use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Submission timed out after {0:?}")]
    SubmissionTimeout(Duration),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob not found or already released: {0}")]
    BlobNotFound(String),

    #[error("General error: {0}")]
    General(String),
}

impl ClientError {
    /// Classify a transport error. Submission timeouts are raised by the
    /// caller that owns the deadline, never here.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ClientError::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return ClientError::Server {
                status: status.as_u16(),
                detail: err.to_string(),
            };
        }
        ClientError::Connection(err.to_string())
    }

    pub fn server(status: u16, detail: impl Into<String>) -> Self {
        ClientError::Server {
            status,
            detail: detail.into(),
        }
    }

    /// Text shown to the user in the result area.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Connection(_) => {
                "Connection failed, check that the backend service is running".to_string()
            }
            ClientError::Server { detail, .. } => detail.clone(),
            ClientError::Validation(msg) => msg.clone(),
            ClientError::SubmissionTimeout(_) => {
                "Request timed out; the task may still have been created, check the task status later"
                    .to_string()
            }
            ClientError::Decode(msg) => format!("Unexpected response: {}", msg),
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
