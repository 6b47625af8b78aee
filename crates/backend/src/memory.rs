use crate::{Backend, BackendError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tilework_ipc::{AppLayoutInfo, BackendRequest, WorkspaceRecord};
use tracing::debug;

/// Number of calls kept in the call log.
const CALL_LOG_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct MemoryInner {
    workspaces: Vec<WorkspaceRecord>,
    active: Option<String>,
    calls: VecDeque<BackendRequest>,
    failing: bool,
}

/// In-process backend.
///
/// Serves workspace records from memory and records every call it receives.
/// Used when the engine runs without a backend address, and as a test
/// double for the engine.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with workspace records and the active workspace id.
    pub fn with_workspaces(workspaces: Vec<WorkspaceRecord>, active: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                workspaces,
                active: Some(active.into()),
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Most recent calls, oldest first.
    pub fn calls(&self) -> Vec<BackendRequest> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Every `apply_layout` batch in the call log, oldest first.
    pub fn applied_layouts(&self) -> Vec<Vec<AppLayoutInfo>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendRequest::ApplyLayout { layouts } => Some(layouts.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn workspace(&self, workspace_id: &str) -> Option<WorkspaceRecord> {
        self.lock()
            .workspaces
            .iter()
            .find(|w| w.id == workspace_id)
            .cloned()
    }

    /// Record a call, failing it if the backend is set to fail.
    fn record(&self, request: BackendRequest) -> Result<MutexGuard<'_, MemoryInner>, BackendError> {
        debug!("memory backend: {:?}", request);
        let mut inner = self.lock();
        if inner.calls.len() == CALL_LOG_CAPACITY {
            inner.calls.pop_front();
        }
        inner.calls.push_back(request);
        if inner.failing {
            return Err(BackendError::Remote("backend unavailable".to_string()));
        }
        Ok(inner)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn apply_layout(&self, layouts: Vec<AppLayoutInfo>) -> Result<(), BackendError> {
        self.record(BackendRequest::ApplyLayout { layouts })?;
        Ok(())
    }

    async fn ensure_webview_exists(&self, app_id: &str) -> Result<(), BackendError> {
        self.record(BackendRequest::EnsureWebviewExists {
            app_id: app_id.to_string(),
        })?;
        Ok(())
    }

    async fn update_workspace_tiling(
        &self,
        workspace_id: &str,
        tiling_layout: &str,
        tile_assignments: Vec<String>,
    ) -> Result<(), BackendError> {
        let mut inner = self.record(BackendRequest::UpdateWorkspaceTiling {
            workspace_id: workspace_id.to_string(),
            tiling_layout: tiling_layout.to_string(),
            tile_assignments: tile_assignments.clone(),
        })?;
        let record = inner
            .workspaces
            .iter_mut()
            .find(|w| w.id == workspace_id)
            .ok_or_else(|| BackendError::Remote("Workspace not found".to_string()))?;
        record.tiling_layout = tiling_layout.to_string();
        record.tile_assignments = tile_assignments;
        Ok(())
    }

    async fn get_workspace(&self, workspace_id: &str) -> Result<Option<WorkspaceRecord>, BackendError> {
        let inner = self.record(BackendRequest::GetWorkspace {
            workspace_id: workspace_id.to_string(),
        })?;
        Ok(inner.workspaces.iter().find(|w| w.id == workspace_id).cloned())
    }

    async fn get_active_workspace(&self) -> Result<Option<WorkspaceRecord>, BackendError> {
        let inner = self.record(BackendRequest::GetActiveWorkspace)?;
        let Some(active) = inner.active.as_deref() else {
            return Ok(None);
        };
        Ok(inner.workspaces.iter().find(|w| w.id == active).cloned())
    }

    async fn set_content_area_bounds(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), BackendError> {
        self.record(BackendRequest::SetContentAreaBounds {
            x,
            y,
            width,
            height,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(id: &str, layout: &str, tiles: &[&str]) -> WorkspaceRecord {
        WorkspaceRecord {
            id: id.to_string(),
            name: id.to_string(),
            tiling_layout: layout.to_string(),
            tile_assignments: tiles.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_update_and_read_back_tiling() {
        let backend = MemoryBackend::with_workspaces(vec![workspace("default", "", &[])], "default");

        backend
            .update_workspace_tiling("default", "grid", vec!["a".into(), "".into(), "c".into()])
            .await
            .unwrap();

        let record = backend.get_active_workspace().await.unwrap().unwrap();
        assert_eq!(record.tiling_layout, "grid");
        assert_eq!(record.tile_assignments, vec!["a", "", "c"]);
    }

    #[tokio::test]
    async fn test_update_unknown_workspace_fails() {
        let backend = MemoryBackend::new();
        let err = backend
            .update_workspace_tiling("nope", "grid", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Remote(_)));
    }

    #[tokio::test]
    async fn test_calls_are_recorded_in_order() {
        let backend = MemoryBackend::new();
        backend.ensure_webview_exists("slack").await.unwrap();
        backend.apply_layout(vec![]).await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            BackendRequest::EnsureWebviewExists {
                app_id: "slack".to_string()
            }
        );
        assert_eq!(backend.applied_layouts(), vec![Vec::<AppLayoutInfo>::new()]);
    }

    #[tokio::test]
    async fn test_failing_backend_still_records() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);
        assert!(backend.apply_layout(vec![]).await.is_err());
        assert_eq!(backend.calls().len(), 1);

        backend.set_failing(false);
        assert!(backend.apply_layout(vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_call_log_is_bounded() {
        let backend = MemoryBackend::new();
        for _ in 0..(CALL_LOG_CAPACITY + 10) {
            backend.apply_layout(vec![]).await.unwrap();
        }
        assert_eq!(backend.calls().len(), CALL_LOG_CAPACITY);
    }

    #[tokio::test]
    async fn test_no_active_workspace() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get_active_workspace().await.unwrap(), None);
    }
}
