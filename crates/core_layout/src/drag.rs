use crate::{clamp_ratio, LayoutMode, Rect};
use serde::{Deserialize, Serialize};

/// A pointer position in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis along which a divider moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DragAxis {
    /// Divider between left and right tiles; the ratio follows pointer x.
    X,
    /// Divider between top and bottom tiles; the ratio follows pointer y.
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { axis: DragAxis },
}

/// Modal divider drag: at most one drag is in progress at a time.
#[derive(Debug, Clone, Default)]
pub struct DividerDrag {
    state: DragState,
}

impl DividerDrag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Pointer pressed on the divider. Returns false when the mode has no
    /// divider or a drag is already in progress.
    pub fn begin(&mut self, mode: LayoutMode) -> bool {
        if self.is_dragging() {
            return false;
        }
        match mode.divider_axis() {
            Some(axis) => {
                self.state = DragState::Dragging { axis };
                true
            }
            None => false,
        }
    }

    /// Ratio for a pointer position while dragging, relative to the
    /// container's screen bounds. `None` when idle or the container has no
    /// extent along the drag axis.
    pub fn ratio_at(&self, pointer: Point, container: Rect) -> Option<f64> {
        let DragState::Dragging { axis } = self.state else {
            return None;
        };
        let (position, origin, extent) = match axis {
            DragAxis::X => (pointer.x, container.x, container.width),
            DragAxis::Y => (pointer.y, container.y, container.height),
        };
        if extent <= 0.0 {
            return None;
        }
        Some(clamp_ratio((position - origin) / extent))
    }

    /// Pointer released. Returns true if a drag was in progress.
    pub fn end(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.state = DragState::Idle;
        was_dragging
    }
}
