//! Tilework Backend
//!
//! The process boundary the tiling engine talks across. The backend owns the
//! native webviews and the persisted workspace configuration; the engine only
//! tells it where things go.
//!
//! This crate provides:
//! - The [`Backend`] trait, one method per backend call
//! - [`IpcBackend`], a client for a backend reachable over TCP
//! - [`MemoryBackend`], an in-process backend that records every call

mod client;
mod memory;

pub use client::IpcBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tilework_ipc::{AppLayoutInfo, IpcError, WorkspaceRecord};

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to connect to backend at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend request timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error("Unexpected backend response: {0}")]
    Protocol(String),

    #[error("Backend rejected request: {0}")]
    Remote(String),
}

/// Calls the tiling engine makes into the backend.
///
/// Every call is best-effort from the engine's point of view: failures are
/// logged by the caller and never retried.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Replace the placement table with this batch. Apps not listed are
    /// considered unplaced.
    async fn apply_layout(&self, layouts: Vec<AppLayoutInfo>) -> Result<(), BackendError>;

    /// Guarantee a webview exists for `app_id` without changing visibility.
    async fn ensure_webview_exists(&self, app_id: &str) -> Result<(), BackendError>;

    /// Persist a workspace's tiling mode and ordered tile list.
    async fn update_workspace_tiling(
        &self,
        workspace_id: &str,
        tiling_layout: &str,
        tile_assignments: Vec<String>,
    ) -> Result<(), BackendError>;

    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<WorkspaceRecord>, BackendError>;

    async fn get_active_workspace(&self) -> Result<Option<WorkspaceRecord>, BackendError>;

    /// Report the content-area bounds used for single-app placement.
    async fn set_content_area_bounds(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), BackendError>;
}
