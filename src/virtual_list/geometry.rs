//! Row geometry: item heights, visible counts and scrollable extent.
//!
//! All rows in a given window mode share one fixed height, so every
//! position-to-pixel conversion is a multiplication.

use serde::{Deserialize, Serialize};

/// Row height in compact mode (pixels)
pub const COMPACT_ROW_HEIGHT: f64 = 48.0;

/// Row height in expanded mode (pixels)
pub const EXPANDED_ROW_HEIGHT: f64 = 72.0;

/// Display density of the list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    Compact,
    Expanded,
}

impl Default for WindowMode {
    fn default() -> Self {
        WindowMode::Expanded
    }
}

impl WindowMode {
    pub fn item_height(&self) -> f64 {
        match self {
            WindowMode::Compact => COMPACT_ROW_HEIGHT,
            WindowMode::Expanded => EXPANDED_ROW_HEIGHT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowMode::Compact => "compact",
            WindowMode::Expanded => "expanded",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            WindowMode::Compact => WindowMode::Expanded,
            WindowMode::Expanded => WindowMode::Compact,
        }
    }
}

/// Derived list dimensions for one viewport size and mode
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dimensions {
    pub item_height_px: f64,
    /// Rows needed to cover the viewport, plus one for a partial trailing row
    pub visible_count: usize,
    /// Height of the scroll spacer
    pub total_height_px: f64,
}

impl Dimensions {
    /// Top edge of the row at `index`
    pub fn item_top(&self, index: usize) -> f64 {
        index as f64 * self.item_height_px
    }

    /// Index of the row whose box contains `offset_px`
    pub fn index_at(&self, offset_px: f64) -> usize {
        (offset_px.max(0.0) / self.item_height_px).floor() as usize
    }

    /// Largest scroll offset that still fills the viewport
    pub fn max_scroll_offset(&self, viewport_height_px: f64) -> f64 {
        (self.total_height_px - viewport_height_px).max(0.0)
    }
}

/// Computes row dimensions. Pure; safe to call on every resize.
pub fn compute_dimensions(
    viewport_height_px: f64,
    window_mode: WindowMode,
    total_count: usize,
) -> Dimensions {
    let item_height_px = window_mode.item_height();
    let visible_count = if viewport_height_px > 0.0 {
        (viewport_height_px / item_height_px).ceil() as usize + 1
    } else {
        1
    };

    Dimensions {
        item_height_px,
        visible_count,
        total_height_px: total_count as f64 * item_height_px,
    }
}
