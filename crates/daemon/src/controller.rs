//! Engine controller.
//!
//! Owns the tiling state of the active workspace and turns commands into
//! state changes and backend calls. All state lives on the event loop; the
//! backend is reached through spawned tasks and the layout submitter, or
//! awaited in the few places where ordering matters (workspace switch,
//! shutdown).

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::submit::LayoutSubmitter;
use crate::DaemonEvent;
use std::sync::Arc;
use tilework_backend::Backend;
use tilework_core_layout::{
    AppPlacement, LayoutMode, LayoutOutcome, Point, Rect, TileAssignments, TilingState,
    WorkspaceTiling,
};
use tilework_ipc::{AppLayoutInfo, IpcCommand, IpcResponse, WorkspaceRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Toast text shown when tiling collapses to a single app.
pub const NARROW_WARNING: &str = "Window too narrow for tiling layout";

/// The part of the tiling state that is persisted (plus the ratio, whose
/// changes also count as a settle).
#[derive(Debug, Clone, PartialEq)]
struct Settled {
    mode: LayoutMode,
    assignments: TileAssignments,
    split_ratio: f64,
}

pub struct Controller {
    state: TilingState,
    workspace_id: Option<String>,
    backend: Arc<dyn Backend>,
    events: mpsc::Sender<DaemonEvent>,
    config: Config,
    persist: Debouncer,
    /// A layout recompute is owed at the next flush.
    dirty: bool,
    settled: Settled,
    submitter: LayoutSubmitter,
    /// Bumped whenever a workspace is loaded. Ready events from an older
    /// generation are dropped.
    generation: u64,
    /// The most recent persistence write, possibly still running.
    persist_task: Option<JoinHandle<()>>,
    /// Last tiling written (or loaded) for a workspace.
    persisted: Option<(String, WorkspaceTiling)>,
}

fn to_layout_info(placement: AppPlacement) -> AppLayoutInfo {
    AppLayoutInfo {
        app_id: placement.app_id,
        x: placement.rect.x,
        y: placement.rect.y,
        width: placement.rect.width,
        height: placement.rect.height,
    }
}

impl Controller {
    pub fn new(config: Config, backend: Arc<dyn Backend>, events: mpsc::Sender<DaemonEvent>) -> Self {
        let state = TilingState::new(config.tiling.thresholds(), config.tiling.default_split_ratio);
        let persist = Debouncer::new(config.tiling.persist_debounce());
        let settled = Settled {
            mode: state.mode(),
            assignments: state.assignments().clone(),
            split_ratio: state.split_ratio(),
        };
        let submitter = LayoutSubmitter::spawn(backend.clone());
        Self {
            state,
            workspace_id: None,
            backend,
            events,
            config,
            persist,
            dirty: false,
            settled,
            submitter,
            generation: 0,
            persist_task: None,
            persisted: None,
        }
    }

    pub fn state(&self) -> &TilingState {
        &self.state
    }

    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }

    fn current_settled(&self) -> Settled {
        Settled {
            mode: self.state.mode(),
            assignments: self.state.assignments().clone(),
            split_ratio: self.state.split_ratio(),
        }
    }

    /// Load the active workspace's tiling from the backend at startup.
    pub async fn bootstrap(&mut self) {
        match self.backend.get_active_workspace().await {
            Ok(Some(record)) => {
                info!("Active workspace '{}'", record.id);
                self.load_record(&record);
            }
            Ok(None) => {
                warn!(
                    "Backend reported no active workspace, assuming '{}'",
                    self.config.behavior.default_workspace
                );
                self.mark_loaded(self.config.behavior.default_workspace.clone());
            }
            Err(e) => {
                warn!(
                    "Failed to read active workspace: {}. Assuming '{}'",
                    e, self.config.behavior.default_workspace
                );
                self.mark_loaded(self.config.behavior.default_workspace.clone());
            }
        }
        self.dirty = true;
    }

    fn load_record(&mut self, record: &WorkspaceRecord) {
        let tiling = WorkspaceTiling::from_record(&record.tiling_layout, &record.tile_assignments);
        info!(
            "Restoring workspace '{}': layout {} with {} tile(s)",
            record.id,
            tiling.mode,
            tiling.tiles.iter().filter(|t| !t.is_empty()).count()
        );
        self.state.restore(&tiling);
        self.mark_loaded(record.id.clone());
    }

    /// The current state is what `workspace_id` has stored.
    fn mark_loaded(&mut self, workspace_id: String) {
        self.generation += 1;
        self.settled = self.current_settled();
        self.persisted = Some((workspace_id.clone(), self.state.snapshot()));
        self.workspace_id = Some(workspace_id);
    }

    /// Handle a single command from the UI host or the CLI.
    pub async fn handle_command(&mut self, cmd: IpcCommand) -> IpcResponse {
        debug!("Command: {:?}", cmd);
        match cmd {
            IpcCommand::SetLayoutMode { mode } => {
                let mode: LayoutMode = match mode.parse() {
                    Ok(mode) => mode,
                    Err(e) => return IpcResponse::error(e.to_string()),
                };
                if self.state.set_mode(mode) {
                    info!("Layout mode -> {}", mode);
                    self.dirty = true;
                }
                IpcResponse::Ok
            }
            IpcCommand::AssignApp { tile, app_id } => match self.state.assign_app(tile, app_id.clone()) {
                Ok(previous) => {
                    match previous {
                        Some(prev) if prev != app_id => {
                            info!("Tile {} -> '{}' (replacing '{}')", tile, app_id, prev)
                        }
                        _ => info!("Tile {} -> '{}'", tile, app_id),
                    }
                    self.dirty = true;
                    self.prepare_tile(tile, app_id);
                    IpcResponse::Ok
                }
                Err(e) => IpcResponse::error(e.to_string()),
            },
            IpcCommand::FocusTile { tile } => match self.state.focus_tile(tile) {
                Ok(()) => IpcResponse::Ok,
                Err(e) => IpcResponse::error(e.to_string()),
            },
            IpcCommand::ContainerResized {
                x,
                y,
                width,
                height,
            } => {
                let valid = [x, y, width, height].iter().all(|v| v.is_finite())
                    && width >= 0.0
                    && height >= 0.0;
                if !valid {
                    return IpcResponse::error(format!(
                        "Invalid container bounds: {x},{y} {width}x{height}"
                    ));
                }
                self.state.set_container(Rect::new(x, y, width, height));
                self.dirty = true;
                self.forward_content_bounds(x, y, width, height);
                IpcResponse::Ok
            }
            IpcCommand::DividerPointerDown => {
                if !self.state.mode().has_divider() {
                    return IpcResponse::error(format!(
                        "Layout {} has no divider",
                        self.state.mode()
                    ));
                }
                if !self.state.begin_drag() {
                    debug!("Divider drag already in progress");
                }
                IpcResponse::Ok
            }
            IpcCommand::DividerPointerMove { x, y } => {
                if let Some(ratio) = self.state.drag_to(Point::new(x, y)) {
                    debug!("Divider dragged to ratio {:.3}", ratio);
                    self.dirty = true;
                }
                IpcResponse::Ok
            }
            IpcCommand::DividerPointerUp => {
                if self.state.end_drag() {
                    debug!("Divider released at ratio {:.3}", self.state.split_ratio());
                }
                IpcResponse::Ok
            }
            IpcCommand::DividerDoubleClick => {
                if !self.state.mode().has_divider() {
                    return IpcResponse::error(format!(
                        "Layout {} has no divider",
                        self.state.mode()
                    ));
                }
                self.state.reset_split_ratio();
                self.dirty = true;
                IpcResponse::Ok
            }
            IpcCommand::SetSplitRatio { ratio } => {
                if !ratio.is_finite() {
                    return IpcResponse::error(format!("Invalid split ratio: {ratio}"));
                }
                let stored = self.state.set_split_ratio(ratio);
                debug!("Split ratio -> {:.3}", stored);
                self.dirty = true;
                IpcResponse::Ok
            }
            IpcCommand::SwitchWorkspace { workspace_id } => self.switch_workspace(workspace_id).await,
            IpcCommand::QueryTiling => self.query(),
            IpcCommand::Apply => {
                self.dirty = true;
                IpcResponse::Ok
            }
            IpcCommand::Reload => match Config::load() {
                Ok(config) => {
                    self.apply_config(config);
                    IpcResponse::Ok
                }
                Err(e) => IpcResponse::error(format!("Failed to reload config: {e:#}")),
            },
            // The IPC server triggers shutdown once the response is written.
            IpcCommand::Stop => IpcResponse::Ok,
        }
    }

    /// Apply a new configuration. Socket and backend addresses only take
    /// effect after a restart.
    pub fn apply_config(&mut self, mut config: Config) {
        for w in config.validate() {
            warn!("Config: {} - {}", w.field, w.message);
        }
        if config.ipc.listen_addr != self.config.ipc.listen_addr
            || config.ipc.backend_addr != self.config.ipc.backend_addr
        {
            info!("IPC address changes take effect after restart");
        }
        self.state.set_thresholds(config.tiling.thresholds());
        self.persist.set_delay(config.tiling.persist_debounce());
        self.config = config;
        self.dirty = true;
        info!(
            "Configuration applied (persist debounce {}ms)",
            self.persist.delay().as_millis()
        );
    }

    fn query(&self) -> IpcResponse {
        IpcResponse::TilingState {
            workspace_id: self.workspace_id.clone(),
            mode: self.state.mode().to_string(),
            split_ratio: self.state.split_ratio(),
            active_tile: self.state.active_tile(),
            tiles: self.state.assignments().to_tile_list(),
            dragging: self.state.is_dragging(),
            placements: if self.state.mode() == LayoutMode::Single {
                Vec::new()
            } else {
                self.state
                    .placements(None)
                    .into_iter()
                    .map(to_layout_info)
                    .collect()
            },
        }
    }

    /// Make sure a freshly assigned app has a webview, then re-apply the
    /// layout with that tile pinned to it.
    fn prepare_tile(&self, tile: usize, app_id: String) {
        let backend = self.backend.clone();
        let events = self.events.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            if let Err(e) = backend.ensure_webview_exists(&app_id).await {
                warn!("Failed to prepare webview for '{}': {}", app_id, e);
            }
            let ready = DaemonEvent::TileReady {
                generation,
                tile,
                app_id,
            };
            if events.send(ready).await.is_err() {
                debug!("Event loop closed before tile {} was ready", tile);
            }
        });
    }

    /// The webview for a newly assigned app exists (or failed to); place it.
    ///
    /// Ignored when the workspace changed since the assignment or the tile
    /// has been given to another app in the meantime.
    pub fn tile_ready(&mut self, generation: u64, tile: usize, app_id: &str) -> Option<String> {
        if generation != self.generation || self.state.assignments().get(tile) != Some(app_id) {
            debug!("Ignoring stale ready event for tile {} ('{}')", tile, app_id);
            return None;
        }
        let outcome = self.state.compute_layout_with(Some((tile, app_id)));
        self.apply_outcome(outcome)
    }

    fn forward_content_bounds(&self, x: f64, y: f64, width: f64, height: f64) {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.set_content_area_bounds(x, y, width, height).await {
                warn!("Failed to set content area bounds: {}", e);
            }
        });
    }

    /// Run the owed layout recompute, if any, and schedule persistence when
    /// the persisted state changed. Returns the user-facing warning, if the
    /// recompute produced one.
    pub fn flush(&mut self) -> Option<String> {
        let warning = if std::mem::take(&mut self.dirty) {
            let outcome = self.state.compute_layout();
            self.apply_outcome(outcome)
        } else {
            None
        };

        let current = self.current_settled();
        if current != self.settled {
            self.settled = current;
            self.schedule_persist();
        }

        warning
    }

    fn apply_outcome(&mut self, outcome: LayoutOutcome) -> Option<String> {
        match outcome {
            LayoutOutcome::Inactive => None,
            LayoutOutcome::NotReady => {
                debug!("Content area not measured yet, skipping layout");
                None
            }
            LayoutOutcome::TooNarrow { previous, min_width } => {
                warn!(
                    "Content area {}px wide is below {}px for {}, falling back to single",
                    self.state.container().width,
                    min_width,
                    previous
                );
                Some(NARROW_WARNING.to_string())
            }
            LayoutOutcome::Placements(placements) => {
                self.submit_layout(placements);
                None
            }
        }
    }

    fn submit_layout(&self, placements: Vec<AppPlacement>) {
        if placements.is_empty() {
            debug!("No occupied tiles, nothing to place");
            return;
        }
        let layouts: Vec<AppLayoutInfo> = placements.into_iter().map(to_layout_info).collect();
        debug!("Applying layout for {} app(s)", layouts.len());
        self.submitter.submit(layouts);
    }

    fn schedule_persist(&mut self) {
        let events = self.events.clone();
        self.persist.schedule(async move {
            let _ = events.send(DaemonEvent::PersistTiling).await;
        });
    }

    /// Debounce elapsed: persist the current workspace's tiling in the
    /// background. Writes run one after another in issue order.
    pub fn persist_settled(&mut self) {
        let Some(workspace_id) = self.workspace_id.clone() else {
            debug!("No active workspace, skipping tiling persistence");
            return;
        };
        let tiling = self.state.snapshot();
        self.persisted = Some((workspace_id.clone(), tiling.clone()));
        let backend = self.backend.clone();
        let previous = self.persist_task.take();
        self.persist_task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            persist_tiling(backend.as_ref(), &workspace_id, tiling).await;
        }));
    }

    /// Wait for the background persistence write, if one is running.
    async fn finish_persist(&mut self) {
        if let Some(task) = self.persist_task.take() {
            if let Err(e) = task.await {
                warn!("Tiling persistence task failed: {}", e);
            }
        }
    }

    /// Persist the outgoing workspace, then load the incoming one.
    pub async fn switch_workspace(&mut self, workspace_id: String) -> IpcResponse {
        self.persist.cancel();
        self.state.end_drag();
        self.finish_persist().await;

        if let Some(outgoing) = self.workspace_id.clone() {
            persist_tiling(self.backend.as_ref(), &outgoing, self.state.snapshot()).await;
        }

        let response = match self.backend.get_workspace(&workspace_id).await {
            Ok(Some(record)) => {
                self.load_record(&record);
                IpcResponse::Ok
            }
            Ok(None) => {
                warn!("Workspace '{}' not found, resetting tiling", workspace_id);
                self.reset_for(&workspace_id);
                IpcResponse::warning(format!("Workspace '{workspace_id}' not found, tiling reset"))
            }
            Err(e) => {
                warn!("Failed to load workspace '{}': {}", workspace_id, e);
                self.reset_for(&workspace_id);
                IpcResponse::warning(format!(
                    "Could not load tiling for workspace '{workspace_id}'"
                ))
            }
        };
        info!("Switched to workspace '{}'", workspace_id);
        self.dirty = true;
        response
    }

    fn reset_for(&mut self, workspace_id: &str) {
        self.state.restore(&WorkspaceTiling::default());
        self.mark_loaded(workspace_id.to_string());
    }

    /// Finish persistence before exit: wait for a write already under way,
    /// then write the current tiling if it differs from the last one written.
    pub async fn shutdown(&mut self) {
        if self.persist.cancel() {
            debug!("Persistence debounce still pending at exit");
        }
        self.finish_persist().await;

        let Some(workspace_id) = self.workspace_id.clone() else {
            return;
        };
        let tiling = self.state.snapshot();
        let unchanged = matches!(
            &self.persisted,
            Some((id, persisted)) if *id == workspace_id && *persisted == tiling
        );
        if unchanged {
            debug!("Tiling for '{}' already persisted", workspace_id);
            return;
        }
        info!("Persisting tiling for '{}' before exit", workspace_id);
        self.persisted = Some((workspace_id.clone(), tiling.clone()));
        persist_tiling(self.backend.as_ref(), &workspace_id, tiling).await;
    }
}

async fn persist_tiling(backend: &dyn Backend, workspace_id: &str, tiling: WorkspaceTiling) {
    match backend
        .update_workspace_tiling(workspace_id, tiling.mode.as_str(), tiling.tiles)
        .await
    {
        Ok(()) => debug!("Persisted tiling for '{}' ({})", workspace_id, tiling.mode),
        Err(e) => warn!("Failed to persist tiling for '{}': {}", workspace_id, e),
    }
}
