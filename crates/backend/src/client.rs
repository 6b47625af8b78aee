use crate::{Backend, BackendError};
use async_trait::async_trait;
use std::time::Duration;
use tilework_ipc::{
    decode_line, encode_line, AppLayoutInfo, BackendRequest, BackendResponse, WorkspaceRecord,
    MAX_IPC_MESSAGE_SIZE,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Backend reachable over TCP. Each call opens a connection, writes one
/// request line and reads one response line.
#[derive(Debug, Clone)]
pub struct IpcBackend {
    addr: String,
    timeout: Duration,
}

impl IpcBackend {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn request(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let line = encode_line(&request)?;
        match tokio::time::timeout(self.timeout, self.exchange(&line)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        }
    }

    async fn exchange(&self, line: &str) -> Result<BackendResponse, BackendError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| BackendError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        debug!("-> backend {}: {}", self.addr, line.trim_end());
        stream.write_all(line.as_bytes()).await?;

        let mut reader = BufReader::new(stream.take(MAX_IPC_MESSAGE_SIZE as u64));
        let mut response = String::new();
        if reader.read_line(&mut response).await? == 0 {
            return Err(BackendError::Protocol(
                "connection closed before response".to_string(),
            ));
        }
        debug!("<- backend {}: {}", self.addr, response.trim_end());

        Ok(decode_line(&response)?)
    }

    async fn request_ok(&self, request: BackendRequest) -> Result<(), BackendError> {
        match self.request(request).await? {
            BackendResponse::Ok => Ok(()),
            BackendResponse::Error { message } => Err(BackendError::Remote(message)),
            other => Err(BackendError::Protocol(format!("{other:?}"))),
        }
    }

    async fn request_workspace(
        &self,
        request: BackendRequest,
    ) -> Result<Option<WorkspaceRecord>, BackendError> {
        match self.request(request).await? {
            BackendResponse::Workspace { workspace } => Ok(workspace),
            BackendResponse::Error { message } => Err(BackendError::Remote(message)),
            other => Err(BackendError::Protocol(format!("{other:?}"))),
        }
    }
}

#[async_trait]
impl Backend for IpcBackend {
    async fn apply_layout(&self, layouts: Vec<AppLayoutInfo>) -> Result<(), BackendError> {
        self.request_ok(BackendRequest::ApplyLayout { layouts }).await
    }

    async fn ensure_webview_exists(&self, app_id: &str) -> Result<(), BackendError> {
        self.request_ok(BackendRequest::EnsureWebviewExists {
            app_id: app_id.to_string(),
        })
        .await
    }

    async fn update_workspace_tiling(
        &self,
        workspace_id: &str,
        tiling_layout: &str,
        tile_assignments: Vec<String>,
    ) -> Result<(), BackendError> {
        self.request_ok(BackendRequest::UpdateWorkspaceTiling {
            workspace_id: workspace_id.to_string(),
            tiling_layout: tiling_layout.to_string(),
            tile_assignments,
        })
        .await
    }

    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<WorkspaceRecord>, BackendError> {
        self.request_workspace(BackendRequest::GetWorkspace {
            workspace_id: workspace_id.to_string(),
        })
        .await
    }

    async fn get_active_workspace(&self) -> Result<Option<WorkspaceRecord>, BackendError> {
        self.request_workspace(BackendRequest::GetActiveWorkspace).await
    }

    async fn set_content_area_bounds(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), BackendError> {
        self.request_ok(BackendRequest::SetContentAreaBounds {
            x,
            y,
            width,
            height,
        })
        .await
    }
}
