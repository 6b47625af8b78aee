//! Tilework Core Layout Engine
//!
//! Platform-agnostic tiling layout engine for a multi-app content area.
//!
//! The content area is partitioned into a fixed set of rectangular tiles
//! chosen by a [`LayoutMode`]:
//! - Tile geometry is a pure function of mode, container size and split ratio
//! - Apps are assigned to tiles by index; unassigned tiles produce no placement
//! - Two-tile modes expose a single draggable divider with a clamped ratio
//! - Containers narrower than a mode-dependent minimum collapse to `single`

mod assignments;
mod drag;
mod state;

pub use assignments::TileAssignments;
pub use drag::{DividerDrag, DragAxis, DragState, Point};
pub use state::{AppPlacement, LayoutOutcome, NarrowThresholds, TilingState, WorkspaceTiling};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of an installed web-app.
pub type AppId = String;

/// Lower bound for the divider position.
pub const MIN_SPLIT_RATIO: f64 = 0.1;
/// Upper bound for the divider position.
pub const MAX_SPLIT_RATIO: f64 = 0.9;
/// Divider position after a double-click reset.
pub const DEFAULT_SPLIT_RATIO: f64 = 0.5;

/// Errors that can occur during layout operations.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("Unknown layout mode: {0}")]
    UnknownMode(String),

    #[error("Tile index {0} is out of bounds for layout {1} ({2} tiles)")]
    TileOutOfBounds(usize, LayoutMode, usize),

    #[error("App id must not be empty")]
    EmptyAppId,
}

/// Clamp a split ratio into `[MIN_SPLIT_RATIO, MAX_SPLIT_RATIO]`.
///
/// NaN is treated as the default ratio so a corrupt value can never poison
/// the geometry.
pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return DEFAULT_SPLIT_RATIO;
    }
    ratio.clamp(MIN_SPLIT_RATIO, MAX_SPLIT_RATIO)
}

/// A rectangle in pixels. Tile rects are container-local; placements are
/// in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Size of this rectangle, dropping its origin.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Translate the rectangle by an origin offset.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Check if this rectangle has a non-empty overlap with another.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }
}

/// Measured size of the content-area viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A container that has not been measured yet has a zero dimension.
    pub fn is_measured(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Tiling layout of the content area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    /// One app fills the container; tiling is inactive.
    #[default]
    Single,
    /// Left and right halves split by a vertical divider.
    SplitVertical,
    /// Top and bottom halves split by a horizontal divider.
    SplitHorizontal,
    /// Three equal columns, no divider.
    ThreeColumn,
    /// Wide left tile, narrow right tile.
    TwoThirdsLeft,
    /// Narrow left tile, wide right tile.
    TwoThirdsRight,
    /// Four equal quadrants, no divider.
    Grid,
}

impl LayoutMode {
    /// Every mode, in picker order.
    pub const ALL: [LayoutMode; 7] = [
        LayoutMode::Single,
        LayoutMode::SplitVertical,
        LayoutMode::SplitHorizontal,
        LayoutMode::ThreeColumn,
        LayoutMode::TwoThirdsLeft,
        LayoutMode::TwoThirdsRight,
        LayoutMode::Grid,
    ];

    /// Wire name of the mode, as stored in workspace records.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Single => "single",
            LayoutMode::SplitVertical => "split-vertical",
            LayoutMode::SplitHorizontal => "split-horizontal",
            LayoutMode::ThreeColumn => "three-column",
            LayoutMode::TwoThirdsLeft => "two-thirds-left",
            LayoutMode::TwoThirdsRight => "two-thirds-right",
            LayoutMode::Grid => "grid",
        }
    }

    /// Number of tiles the mode partitions the container into.
    pub fn tile_count(&self) -> usize {
        match self {
            LayoutMode::Single => 1,
            LayoutMode::SplitVertical
            | LayoutMode::SplitHorizontal
            | LayoutMode::TwoThirdsLeft
            | LayoutMode::TwoThirdsRight => 2,
            LayoutMode::ThreeColumn => 3,
            LayoutMode::Grid => 4,
        }
    }

    /// Axis along which the divider moves, if the mode has one.
    pub fn divider_axis(&self) -> Option<DragAxis> {
        match self {
            LayoutMode::SplitVertical | LayoutMode::TwoThirdsLeft | LayoutMode::TwoThirdsRight => {
                Some(DragAxis::X)
            }
            LayoutMode::SplitHorizontal => Some(DragAxis::Y),
            LayoutMode::Single | LayoutMode::ThreeColumn | LayoutMode::Grid => None,
        }
    }

    pub fn has_divider(&self) -> bool {
        self.divider_axis().is_some()
    }

    /// Parse a stored layout string leniently.
    ///
    /// Workspace records written before tiling existed carry an empty string,
    /// and unknown names fall back to `single`.
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutMode {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| LayoutError::UnknownMode(s.to_string()))
    }
}

/// Compute container-local tile rectangles for a layout.
///
/// Returns an empty list while the container is unmeasured. The ratio is
/// clamped at the point of use, so a stored out-of-range value is harmless.
pub fn compute_tile_rects(mode: LayoutMode, size: Size, ratio: f64) -> Vec<Rect> {
    if !size.is_measured() {
        return Vec::new();
    }

    let Size { width, height } = size;
    let ratio = clamp_ratio(ratio);

    match mode {
        LayoutMode::Single => vec![Rect::new(0.0, 0.0, width, height)],
        LayoutMode::SplitVertical | LayoutMode::TwoThirdsLeft => {
            let left = width * ratio;
            vec![
                Rect::new(0.0, 0.0, left, height),
                Rect::new(left, 0.0, width - left, height),
            ]
        }
        LayoutMode::TwoThirdsRight => {
            // Mirrored: the ratio describes the right tile.
            let right = width * ratio;
            let left = width - right;
            vec![
                Rect::new(0.0, 0.0, left, height),
                Rect::new(left, 0.0, right, height),
            ]
        }
        LayoutMode::SplitHorizontal => {
            let top = height * ratio;
            vec![
                Rect::new(0.0, 0.0, width, top),
                Rect::new(0.0, top, width, height - top),
            ]
        }
        LayoutMode::ThreeColumn => {
            let third = width / 3.0;
            (0..3)
                .map(|i| Rect::new(width * i as f64 / 3.0, 0.0, third, height))
                .collect()
        }
        LayoutMode::Grid => {
            let half_w = width / 2.0;
            let half_h = height / 2.0;
            vec![
                Rect::new(0.0, 0.0, half_w, half_h),
                Rect::new(half_w, 0.0, half_w, half_h),
                Rect::new(0.0, half_h, half_w, half_h),
                Rect::new(half_w, half_h, half_w, half_h),
            ]
        }
    }
}
