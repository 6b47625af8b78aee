//! Tilework IPC Protocol
//!
//! Shared types for the two process boundaries of the tiling engine:
//! - UI / CLI -> engine: [`IpcCommand`] answered by [`IpcResponse`]
//! - engine -> backend: [`BackendRequest`] answered by [`BackendResponse`]
//!
//! Both use newline-delimited JSON, one request and one response per
//! connection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default address the engine listens on for UI and CLI commands.
pub const DEFAULT_ENGINE_ADDR: &str = "127.0.0.1:47615";

/// Upper bound for a single framed message, in bytes.
pub const MAX_IPC_MESSAGE_SIZE: usize = 64 * 1024;

/// Errors raised while framing or parsing messages.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Message of {0} bytes exceeds the {1} byte limit")]
    MessageTooLarge(usize, usize),
}

/// Placement of one app's webview, in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLayoutInfo {
    pub app_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Workspace as stored by the configuration backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Layout mode name; empty for workspaces that never tiled.
    #[serde(default)]
    pub tiling_layout: String,
    /// Tile index -> app id, `""` for unassigned.
    #[serde(default)]
    pub tile_assignments: Vec<String>,
}

/// Commands sent from the UI host or the CLI to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Select a layout mode by name (e.g. `split-vertical`).
    SetLayoutMode { mode: String },
    /// Show an app in a tile.
    AssignApp { tile: usize, app_id: String },
    /// Mark a tile as active.
    FocusTile { tile: usize },

    /// The content area moved or resized (screen coordinates).
    ContainerResized {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    /// Pointer pressed on the divider.
    DividerPointerDown,
    /// Pointer moved while the divider is held (screen coordinates).
    DividerPointerMove { x: f64, y: f64 },
    /// Pointer released.
    DividerPointerUp,
    /// Divider double-clicked; resets the ratio.
    DividerDoubleClick,
    /// Set the divider position directly.
    SetSplitRatio { ratio: f64 },

    /// The active workspace changed.
    SwitchWorkspace { workspace_id: String },

    /// Query the current tiling state.
    QueryTiling,
    /// Re-apply the current layout.
    Apply,
    /// Reload configuration from file.
    Reload,
    /// Stop the engine.
    Stop,
}

/// Responses from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully.
    Ok,
    /// Command executed, but something the user should see happened.
    Warning { message: String },
    /// Command failed; state is unchanged.
    Error { message: String },
    /// Tiling state query response.
    TilingState {
        workspace_id: Option<String>,
        mode: String,
        split_ratio: f64,
        active_tile: Option<usize>,
        /// Tile index -> app id, `""` for unassigned.
        tiles: Vec<String>,
        dragging: bool,
        /// Batch the current state would send to the backend.
        placements: Vec<AppLayoutInfo>,
    },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Create a warning response.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }
}

/// Calls the engine makes into the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendRequest {
    /// Full replacement of the webview placement table.
    ApplyLayout { layouts: Vec<AppLayoutInfo> },
    /// Make sure a webview exists for the app, without showing it.
    EnsureWebviewExists { app_id: String },
    /// Persist a workspace's tiling configuration.
    UpdateWorkspaceTiling {
        workspace_id: String,
        tiling_layout: String,
        tile_assignments: Vec<String>,
    },
    /// Read one workspace record.
    GetWorkspace { workspace_id: String },
    /// Read the record of the active workspace.
    GetActiveWorkspace,
    /// Content-area bounds for single-app placement.
    SetContentAreaBounds {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

/// Backend answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendResponse {
    Ok,
    Error { message: String },
    Workspace { workspace: Option<WorkspaceRecord> },
}

/// Serialize a message as a single newline-terminated JSON line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, IpcError> {
    let mut line = serde_json::to_string(message).map_err(IpcError::Encode)?;
    line.push('\n');
    if line.len() > MAX_IPC_MESSAGE_SIZE {
        return Err(IpcError::MessageTooLarge(line.len(), MAX_IPC_MESSAGE_SIZE));
    }
    Ok(line)
}

/// Parse one JSON line, ignoring surrounding whitespace.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, IpcError> {
    if line.len() > MAX_IPC_MESSAGE_SIZE {
        return Err(IpcError::MessageTooLarge(line.len(), MAX_IPC_MESSAGE_SIZE));
    }
    serde_json::from_str(line.trim()).map_err(IpcError::Decode)
}
