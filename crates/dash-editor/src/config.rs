//! Per-dashboard layout configuration.

use crate::commands::DEFAULT_CAPACITY;
use dash_core::format::{DEFAULT_DASHBOARD_HEIGHT, DEFAULT_DASHBOARD_WIDTH};
use dash_core::model::Position;
use dash_core::store::DEFAULT_MIN_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How committed geometry is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Raw pixel geometry.
    #[default]
    Free,
    /// Geometry quantized to `grid_size` cells; overlapping widgets are
    /// displaced on commit.
    Grid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub mode: LayoutMode,
    /// Grid cell edge in pixels.
    pub grid_size: f64,
    pub min_width: f64,
    pub min_height: f64,
    /// Pointer travel (px, either axis) before a press becomes a drag.
    pub drag_threshold: f64,
    pub undo_capacity: usize,
    /// Delay before newly attached content is measured for fit-to-content.
    pub fit_delay_ms: u64,
    /// Canvas size.
    pub width: f64,
    pub height: f64,
    /// Size given to new content before it has been measured.
    pub default_width: f64,
    pub default_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Free,
            grid_size: 10.0,
            min_width: DEFAULT_MIN_SIZE,
            min_height: DEFAULT_MIN_SIZE,
            drag_threshold: 5.0,
            undo_capacity: DEFAULT_CAPACITY,
            fit_delay_ms: 100,
            width: DEFAULT_DASHBOARD_WIDTH,
            height: DEFAULT_DASHBOARD_HEIGHT,
            default_width: 320.0,
            default_height: 200.0,
        }
    }
}

impl LayoutConfig {
    /// Parse a JSON config; omitted keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn grid() -> Self {
        Self {
            mode: LayoutMode::Grid,
            ..Self::default()
        }
    }

    pub fn fit_delay(&self) -> Duration {
        Duration::from_millis(self.fit_delay_ms)
    }

    /// Offset applied to pasted copies.
    pub fn paste_offset(&self) -> f64 {
        match self.mode {
            LayoutMode::Grid => self.grid_size,
            LayoutMode::Free => 10.0,
        }
    }

    /// Raise width/height to the configured minimum and keep the box on
    /// the canvas's positive quadrant.
    pub fn clamp(&self, pos: Position) -> Position {
        Position {
            left: pos.left.max(0.0),
            top: pos.top.max(0.0),
            width: pos.width.max(self.min_width),
            height: pos.height.max(self.min_height),
        }
    }

    /// Quantize to the grid (grid mode only), then clamp.
    pub fn place(&self, pos: Position) -> Position {
        let pos = match self.mode {
            LayoutMode::Free => pos,
            LayoutMode::Grid => snap(pos, self.grid_size),
        };
        let clamped = self.clamp(pos);
        match self.mode {
            // Clamping may have pushed a size off the grid
            LayoutMode::Grid => Position {
                width: ceil_to(clamped.width, self.grid_size),
                height: ceil_to(clamped.height, self.grid_size),
                ..clamped
            },
            LayoutMode::Free => clamped,
        }
    }
}

/// Round every edge to the nearest multiple of `cell`; sizes are at least
/// one cell.
pub fn snap(pos: Position, cell: f64) -> Position {
    if cell <= 0.0 {
        return pos;
    }
    let round = |v: f64| (v / cell).round() * cell;
    Position {
        left: round(pos.left),
        top: round(pos.top),
        width: round(pos.width).max(cell),
        height: round(pos.height).max(cell),
    }
}

fn ceil_to(v: f64, cell: f64) -> f64 {
    if cell <= 0.0 {
        v
    } else {
        (v / cell).ceil() * cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn omitted_keys_take_defaults() {
        let cfg = LayoutConfig::from_json(r#"{ "mode": "grid", "gridSize": 25 }"#).unwrap();
        assert_eq!(cfg.mode, LayoutMode::Grid);
        assert_eq!(cfg.grid_size, 25.0);
        assert_eq!(cfg.drag_threshold, 5.0);
        assert_eq!(cfg.undo_capacity, 10);
    }

    #[test]
    fn free_mode_commits_raw_geometry() {
        let cfg = LayoutConfig::default();
        let pos = Position::new(13.3, 7.7, 101.5, 99.2);
        assert_eq!(cfg.place(pos), pos);
    }

    #[test]
    fn grid_mode_quantizes() {
        let cfg = LayoutConfig::grid();
        assert_eq!(
            cfg.place(Position::new(13.0, 7.0, 101.0, 96.0)),
            Position::new(10.0, 10.0, 100.0, 100.0)
        );
    }

    #[test]
    fn grid_size_never_below_minimum() {
        let cfg = LayoutConfig {
            min_width: 25.0,
            ..LayoutConfig::grid()
        };
        assert_eq!(cfg.place(Position::new(0.0, 0.0, 21.0, 10.0)).width, 30.0);
    }

    #[test]
    fn clamp_keeps_box_on_canvas() {
        let cfg = LayoutConfig::default();
        assert_eq!(
            cfg.clamp(Position::new(-20.0, -1.0, 2.0, 300.0)),
            Position::new(0.0, 0.0, 10.0, 300.0)
        );
    }
}
