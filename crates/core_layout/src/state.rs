use crate::{
    clamp_ratio, compute_tile_rects, AppId, DividerDrag, LayoutError, LayoutMode, Point, Rect,
    TileAssignments, DEFAULT_SPLIT_RATIO,
};
use serde::{Deserialize, Serialize};

/// Minimum container widths below which tiling collapses to `single`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NarrowThresholds {
    /// Minimum width for two- and four-tile modes.
    pub min_width: f64,
    /// Minimum width for `three-column`.
    pub min_width_three_column: f64,
}

impl Default for NarrowThresholds {
    fn default() -> Self {
        Self {
            min_width: 500.0,
            min_width_three_column: 600.0,
        }
    }
}

impl NarrowThresholds {
    pub fn min_width_for(&self, mode: LayoutMode) -> f64 {
        match mode {
            LayoutMode::ThreeColumn => self.min_width_three_column,
            _ => self.min_width,
        }
    }
}

/// Where an app's webview should be placed, in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPlacement {
    pub app_id: AppId,
    pub rect: Rect,
}

/// Result of a layout application pass.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOutcome {
    /// Mode is `single`; the active-app display owns placement.
    Inactive,
    /// The container has not been measured yet.
    NotReady,
    /// The container is too narrow; the state was reverted to `single`.
    TooNarrow { previous: LayoutMode, min_width: f64 },
    /// Complete placement batch for every occupied tile. May be empty.
    Placements(Vec<AppPlacement>),
}

/// Tiling configuration as persisted on a workspace record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkspaceTiling {
    pub mode: LayoutMode,
    /// Tile index -> app id, `""` for unassigned.
    pub tiles: Vec<String>,
}

impl WorkspaceTiling {
    /// Build from the raw record fields, tolerating empty or unknown modes.
    pub fn from_record(tiling_layout: &str, tile_assignments: &[String]) -> Self {
        Self {
            mode: LayoutMode::from_stored(tiling_layout),
            tiles: tile_assignments.to_vec(),
        }
    }
}

/// Tiling state of the content area for the active workspace.
#[derive(Debug, Clone)]
pub struct TilingState {
    mode: LayoutMode,
    assignments: TileAssignments,
    split_ratio: f64,
    active_tile: Option<usize>,
    /// Content-area bounds in screen coordinates.
    container: Rect,
    thresholds: NarrowThresholds,
    drag: DividerDrag,
}

impl Default for TilingState {
    fn default() -> Self {
        Self::new(NarrowThresholds::default(), DEFAULT_SPLIT_RATIO)
    }
}

impl TilingState {
    pub fn new(thresholds: NarrowThresholds, split_ratio: f64) -> Self {
        Self {
            mode: LayoutMode::Single,
            assignments: TileAssignments::new(),
            split_ratio: clamp_ratio(split_ratio),
            active_tile: None,
            container: Rect::default(),
            thresholds,
            drag: DividerDrag::new(),
        }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn assignments(&self) -> &TileAssignments {
        &self.assignments
    }

    pub fn split_ratio(&self) -> f64 {
        self.split_ratio
    }

    pub fn active_tile(&self) -> Option<usize> {
        self.active_tile
    }

    pub fn container(&self) -> Rect {
        self.container
    }

    pub fn thresholds(&self) -> NarrowThresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: NarrowThresholds) {
        self.thresholds = thresholds;
    }

    /// Switch layout mode. Returning to `single` clears every assignment;
    /// other switches keep existing entries, including ones beyond the new
    /// tile count. Returns true if the mode changed.
    pub fn set_mode(&mut self, mode: LayoutMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        if mode == LayoutMode::Single {
            self.assignments.clear();
            self.active_tile = None;
        }
        if !mode.has_divider() {
            self.drag.end();
        }
        true
    }

    /// Store a clamped split ratio and return the stored value.
    pub fn set_split_ratio(&mut self, ratio: f64) -> f64 {
        self.split_ratio = clamp_ratio(ratio);
        self.split_ratio
    }

    /// Double-click on the divider.
    pub fn reset_split_ratio(&mut self) -> f64 {
        self.set_split_ratio(DEFAULT_SPLIT_RATIO)
    }

    /// Update the content-area bounds reported by the resize observer.
    pub fn set_container(&mut self, bounds: Rect) {
        self.container = bounds;
    }

    /// Container-local rectangles for the current mode.
    pub fn tile_rects(&self) -> Vec<Rect> {
        compute_tile_rects(self.mode, self.container.size(), self.split_ratio)
    }

    /// Assign an app to a tile and make that tile active. Returns the app
    /// previously shown in the tile; its webview is left alive.
    pub fn assign_app(
        &mut self,
        tile: usize,
        app_id: impl Into<AppId>,
    ) -> Result<Option<AppId>, LayoutError> {
        let app_id = app_id.into();
        if app_id.is_empty() {
            return Err(LayoutError::EmptyAppId);
        }
        self.check_tile(tile)?;
        let previous = self.assignments.assign(tile, app_id);
        self.active_tile = Some(tile);
        Ok(previous)
    }

    /// Mark a tile as active without changing assignments.
    pub fn focus_tile(&mut self, tile: usize) -> Result<(), LayoutError> {
        self.check_tile(tile)?;
        self.active_tile = Some(tile);
        Ok(())
    }

    fn check_tile(&self, tile: usize) -> Result<(), LayoutError> {
        let count = self.mode.tile_count();
        if tile >= count {
            return Err(LayoutError::TileOutOfBounds(tile, self.mode, count));
        }
        Ok(())
    }

    /// Screen-space placements for every occupied tile, without applying the
    /// narrow-window policy. `pinned` overrides one tile's app.
    pub fn placements(&self, pinned: Option<(usize, &str)>) -> Vec<AppPlacement> {
        let (origin_x, origin_y) = (self.container.x, self.container.y);
        self.tile_rects()
            .into_iter()
            .enumerate()
            .filter_map(|(index, rect)| {
                let app_id = match pinned {
                    Some((pinned_index, app_id)) if pinned_index == index => Some(app_id),
                    _ => self.assignments.get(index),
                };
                app_id.filter(|id| !id.is_empty()).map(|id| AppPlacement {
                    app_id: id.to_string(),
                    rect: rect.offset(origin_x, origin_y),
                })
            })
            .collect()
    }

    /// Run one layout application pass.
    pub fn compute_layout(&mut self) -> LayoutOutcome {
        self.compute_layout_with(None)
    }

    /// Layout application pass with one tile pinned to a specific app, used
    /// once a freshly assigned app's webview is known to exist.
    ///
    /// An unmeasured container is checked before the width threshold, so a
    /// zero width at startup reports `NotReady` instead of collapsing the
    /// restored layout to single.
    pub fn compute_layout_with(&mut self, pinned: Option<(usize, &str)>) -> LayoutOutcome {
        if self.mode == LayoutMode::Single {
            return LayoutOutcome::Inactive;
        }
        if !self.container.size().is_measured() {
            return LayoutOutcome::NotReady;
        }

        let min_width = self.thresholds.min_width_for(self.mode);
        if self.container.width < min_width {
            let previous = self.mode;
            self.set_mode(LayoutMode::Single);
            return LayoutOutcome::TooNarrow { previous, min_width };
        }

        LayoutOutcome::Placements(self.placements(pinned))
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Pointer down on the divider. Returns false if the mode has none.
    pub fn begin_drag(&mut self) -> bool {
        self.drag.begin(self.mode)
    }

    /// Pointer moved during a drag. Returns the new ratio if it was updated.
    pub fn drag_to(&mut self, pointer: Point) -> Option<f64> {
        let ratio = self.drag.ratio_at(pointer, self.container)?;
        Some(self.set_split_ratio(ratio))
    }

    /// Pointer released. Returns true if a drag was in progress.
    pub fn end_drag(&mut self) -> bool {
        self.drag.end()
    }

    /// Tiling configuration to persist for the current workspace.
    pub fn snapshot(&self) -> WorkspaceTiling {
        WorkspaceTiling {
            mode: self.mode,
            tiles: self.assignments.to_tile_list(),
        }
    }

    /// Load a workspace's stored tiling configuration. The split ratio is
    /// not part of the record and is left untouched.
    pub fn restore(&mut self, tiling: &WorkspaceTiling) {
        self.mode = tiling.mode;
        self.assignments = if tiling.mode == LayoutMode::Single {
            TileAssignments::new()
        } else {
            TileAssignments::from_tile_list(&tiling.tiles)
        };
        self.active_tile = None;
        self.drag.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DragAxis;

    fn measured(mode: LayoutMode, width: f64) -> TilingState {
        let mut state = TilingState::default();
        state.set_container(Rect::new(0.0, 0.0, width, 800.0));
        state.set_mode(mode);
        state
    }

    #[test]
    fn test_end_to_end_split_vertical() {
        let mut state = TilingState::default();
        state.set_container(Rect::new(50.0, 50.0, 1200.0, 800.0));
        state.set_mode(LayoutMode::SplitVertical);
        state.set_split_ratio(0.3);

        let rects = state.tile_rects();
        assert_eq!(rects.len(), 2);
        assert!((rects[0].width - 360.0).abs() < 1e-9);
        assert!((rects[1].x - 360.0).abs() < 1e-9);
        assert!((rects[1].width - 840.0).abs() < 1e-9);

        state.assign_app(0, "slack").unwrap();
        state.assign_app(1, "gmail").unwrap();

        let LayoutOutcome::Placements(batch) = state.compute_layout() else {
            panic!("expected placements");
        };
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].app_id, "slack");
        assert_eq!(batch[0].rect, Rect::new(50.0, 50.0, 360.0, 800.0));
        assert_eq!(batch[1].app_id, "gmail");
        assert_eq!(batch[1].rect, Rect::new(410.0, 50.0, 840.0, 800.0));
    }

    #[test]
    fn test_layout_is_idempotent() {
        let mut state = measured(LayoutMode::Grid, 1600.0);
        state.assign_app(0, "a").unwrap();
        state.assign_app(3, "d").unwrap();

        let first = state.compute_layout();
        let second = state.compute_layout();
        assert_eq!(first, second);
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    #[test]
    fn test_unoccupied_tiles_are_omitted() {
        let mut state = measured(LayoutMode::ThreeColumn, 1200.0);
        state.assign_app(1, "notion").unwrap();

        let LayoutOutcome::Placements(batch) = state.compute_layout() else {
            panic!("expected placements");
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].rect.x, 400.0);
    }

    #[test]
    fn test_no_assignments_gives_empty_batch() {
        let mut state = measured(LayoutMode::SplitHorizontal, 1200.0);
        assert_eq!(state.compute_layout(), LayoutOutcome::Placements(Vec::new()));
    }

    #[test]
    fn test_single_mode_is_inactive() {
        let mut state = measured(LayoutMode::Single, 1200.0);
        assert_eq!(state.compute_layout(), LayoutOutcome::Inactive);
    }

    #[test]
    fn test_unmeasured_container_is_not_ready() {
        let mut state = TilingState::default();
        state.set_mode(LayoutMode::Grid);
        state.assign_app(0, "a").unwrap();
        assert_eq!(state.compute_layout(), LayoutOutcome::NotReady);
        // Not-ready must not trigger the narrow fallback.
        assert_eq!(state.mode(), LayoutMode::Grid);
        assert_eq!(state.assignments().len(), 1);
    }

    #[test]
    fn test_narrow_fallback_three_column() {
        let mut state = measured(LayoutMode::ThreeColumn, 599.0);
        state.assign_app(0, "a").unwrap();
        assert_eq!(
            state.compute_layout(),
            LayoutOutcome::TooNarrow {
                previous: LayoutMode::ThreeColumn,
                min_width: 600.0
            }
        );
        assert_eq!(state.mode(), LayoutMode::Single);
        assert!(state.assignments().is_empty());
    }

    #[test]
    fn test_narrow_fallback_split_vertical() {
        let mut state = measured(LayoutMode::SplitVertical, 499.0);
        state.assign_app(1, "b").unwrap();
        assert!(matches!(
            state.compute_layout(),
            LayoutOutcome::TooNarrow { previous: LayoutMode::SplitVertical, .. }
        ));
        assert_eq!(state.mode(), LayoutMode::Single);
        assert!(state.assignments().is_empty());
    }

    #[test]
    fn test_narrow_boundary_does_not_fall_back() {
        let mut state = measured(LayoutMode::ThreeColumn, 600.0);
        state.assign_app(0, "a").unwrap();
        assert!(matches!(state.compute_layout(), LayoutOutcome::Placements(_)));
        assert_eq!(state.mode(), LayoutMode::ThreeColumn);

        let mut state = measured(LayoutMode::SplitVertical, 500.0);
        state.assign_app(0, "a").unwrap();
        assert!(matches!(state.compute_layout(), LayoutOutcome::Placements(_)));
        assert_eq!(state.mode(), LayoutMode::SplitVertical);
    }

    #[test]
    fn test_custom_thresholds() {
        let mut state = measured(LayoutMode::Grid, 700.0);
        state.set_thresholds(NarrowThresholds {
            min_width: 800.0,
            min_width_three_column: 900.0,
        });
        assert!(matches!(state.compute_layout(), LayoutOutcome::TooNarrow { min_width, .. } if min_width == 800.0));
    }

    #[test]
    fn test_switch_to_single_clears_assignments() {
        let mut state = measured(LayoutMode::Grid, 1600.0);
        for (tile, app) in ["a", "b", "c", "d"].iter().enumerate() {
            state.assign_app(tile, *app).unwrap();
        }
        assert_eq!(state.assignments().len(), 4);

        assert!(state.set_mode(LayoutMode::Single));
        assert!(state.assignments().is_empty());
        assert_eq!(state.active_tile(), None);
    }

    #[test]
    fn test_stale_indices_survive_but_are_not_placed() {
        let mut state = measured(LayoutMode::Grid, 1600.0);
        state.assign_app(0, "a").unwrap();
        state.assign_app(3, "d").unwrap();

        state.set_mode(LayoutMode::SplitVertical);
        assert_eq!(state.assignments().get(3), Some("d"));

        let LayoutOutcome::Placements(batch) = state.compute_layout() else {
            panic!("expected placements");
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].app_id, "a");

        // Switching back brings the stale entry into view again.
        state.set_mode(LayoutMode::Grid);
        let LayoutOutcome::Placements(batch) = state.compute_layout() else {
            panic!("expected placements");
        };
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_assign_rejects_out_of_range_and_empty() {
        let mut state = measured(LayoutMode::SplitVertical, 1200.0);
        assert_eq!(
            state.assign_app(2, "a"),
            Err(LayoutError::TileOutOfBounds(2, LayoutMode::SplitVertical, 2))
        );
        assert_eq!(state.assign_app(0, ""), Err(LayoutError::EmptyAppId));
        assert!(state.assignments().is_empty());
    }

    #[test]
    fn test_assign_sets_active_tile_and_returns_previous() {
        let mut state = measured(LayoutMode::SplitVertical, 1200.0);
        assert_eq!(state.assign_app(1, "slack"), Ok(None));
        assert_eq!(state.active_tile(), Some(1));
        assert_eq!(state.assign_app(1, "gmail"), Ok(Some("slack".to_string())));

        state.focus_tile(0).unwrap();
        assert_eq!(state.active_tile(), Some(0));
        assert!(state.focus_tile(5).is_err());
    }

    #[test]
    fn test_pinned_tile_overrides_assignment() {
        let mut state = measured(LayoutMode::SplitVertical, 1200.0);
        state.assign_app(0, "slack").unwrap();

        let LayoutOutcome::Placements(batch) = state.compute_layout_with(Some((1, "gmail"))) else {
            panic!("expected placements");
        };
        let ids: Vec<_> = batch.iter().map(|p| p.app_id.as_str()).collect();
        assert_eq!(ids, vec!["slack", "gmail"]);
    }

    #[test]
    fn test_drag_updates_ratio() {
        let mut state = TilingState::default();
        state.set_container(Rect::new(100.0, 0.0, 1000.0, 800.0));
        state.set_mode(LayoutMode::SplitVertical);

        assert_eq!(state.drag_to(Point::new(400.0, 0.0)), None);
        assert!(state.begin_drag());
        let ratio = state.drag_to(Point::new(400.0, 0.0)).unwrap();
        assert!((ratio - 0.3).abs() < 1e-12);
        assert_eq!(state.drag_to(Point::new(0.0, 0.0)), Some(0.1));
        assert!(state.end_drag());
        assert_eq!(state.split_ratio(), 0.1);

        assert_eq!(state.reset_split_ratio(), 0.5);
    }

    #[test]
    fn test_drag_not_available_without_divider() {
        let mut state = measured(LayoutMode::Grid, 1600.0);
        assert!(!state.begin_drag());
        assert!(!state.is_dragging());
    }

    #[test]
    fn test_mode_change_cancels_drag_without_divider() {
        let mut state = measured(LayoutMode::SplitHorizontal, 1200.0);
        assert!(state.begin_drag());
        state.set_mode(LayoutMode::Grid);
        assert!(!state.is_dragging());
        assert_eq!(state.mode().divider_axis(), None::<DragAxis>);
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut state = measured(LayoutMode::ThreeColumn, 1800.0);
        state.assign_app(0, "slack").unwrap();
        state.assign_app(2, "gmail").unwrap();
        state.set_split_ratio(0.7);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.mode, LayoutMode::ThreeColumn);
        assert_eq!(snapshot.tiles, vec!["slack", "", "gmail"]);

        let mut other = TilingState::default();
        other.restore(&snapshot);
        assert_eq!(other.mode(), LayoutMode::ThreeColumn);
        assert_eq!(other.assignments(), state.assignments());
        assert_eq!(other.split_ratio(), 0.5);
    }

    #[test]
    fn test_restore_single_ignores_stored_tiles() {
        let mut state = TilingState::default();
        state.restore(&WorkspaceTiling::from_record("", &["slack".to_string()]));
        assert_eq!(state.mode(), LayoutMode::Single);
        assert!(state.assignments().is_empty());
    }

    #[test]
    fn test_new_clamps_initial_ratio() {
        let state = TilingState::new(NarrowThresholds::default(), 2.0);
        assert_eq!(state.split_ratio(), 0.9);
    }
}
