//! Contracts of the collaborators the dispatch core talks to. Each one is an
//! async trait object so the HTTP backend, the simulated backend and test
//! doubles can be swapped at startup.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::driver::{CourierRecord, CourierStatus};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PortError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Upstream(String),

    #[error("storage: {0}")]
    Storage(String),
}

pub type PortResult<T> = Result<T, PortError>;

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentPayload {
    pub driver_id: String,
    pub driver_name: String,
}

/// Package status endpoints of the backend, keyed by tracking number.
#[async_trait]
pub trait PackageStatusApi: Send + Sync {
    async fn mark_ready(&self, tracking_number: &str) -> PortResult<()>;

    async fn assign(&self, tracking_number: &str, payload: &AssignmentPayload) -> PortResult<()>;
}

#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn list_all(&self) -> PortResult<Vec<CourierRecord>>;

    async fn update_status(&self, id: &str, status: CourierStatus) -> PortResult<CourierRecord>;
}

/// Best-effort outbound messages. `Ok(false)` means the provider declined.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_sms(&self, phone: &str, message: &str) -> PortResult<bool>;

    async fn send_push(&self, user_id: &str, title: &str, message: &str) -> PortResult<bool>;
}

/// Key-value blob persistence for serialized snapshots.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn load(&self, key: &str) -> PortResult<Option<String>>;

    async fn save(&self, key: &str, blob: &str) -> PortResult<()>;
}
