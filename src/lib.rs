//! # Tender Task Client
//!
//! Async client for the document parsing and tender/bid generation service.
//!
//! ## Features
//!
//! - Typed HTTP client for every service endpoint
//! - Cancellable task polling with stale-response protection
//! - View-state rendering of task snapshots with download actions
//! - Streaming artifact downloads and self-releasing in-memory blobs
//! - Bid proposal and tender generation workflows with local validation

pub mod binder;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod manager;
pub mod poller;

pub use binder::{TaskView, ViewSink};
pub use client::{ApiClient, BidStatus, TaskStatusSource, TenderStatus};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use manager::{BidProposalGenerator, TenderGenerator};
pub use poller::{PollerState, TaskPoller};

/// Default service endpoint
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Path of the configuration document relative to the service origin
pub const DEFAULT_CONFIG_PATH: &str = "/config/frontend_config.json";
