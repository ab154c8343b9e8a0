//! Shared helpers for dash-editor integration tests.
#![allow(dead_code)]

use dash_core::id::{SourceRef, WidgetId};
use dash_core::model::{Position, WidgetInfo, WidgetRecord};
use dash_editor::RenderAdapter;
use std::collections::HashMap;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Adapter that records what the reconciler asked the UI to show.
#[derive(Default)]
pub struct Recorder {
    pub placed: HashMap<WidgetId, Position>,
    pub removed: Vec<WidgetId>,
    pub sizes: HashMap<WidgetId, (f64, f64)>,
    pub drag_image: Option<Position>,
    pub drop_zone: Option<Position>,
    pub inert: Vec<WidgetId>,
}

impl RenderAdapter for Recorder {
    fn place(&mut self, id: WidgetId, position: &Position) {
        self.placed.insert(id, *position);
    }

    fn remove(&mut self, id: WidgetId) {
        self.placed.remove(&id);
        self.removed.push(id);
    }

    fn measure(&self, id: WidgetId) -> Option<(f64, f64)> {
        self.sizes.get(&id).copied()
    }

    fn show_drag_image(&mut self, _snapshot: &WidgetRecord, position: &Position) {
        self.drag_image = Some(*position);
    }

    fn hide_drag_image(&mut self) {
        self.drag_image = None;
    }

    fn show_drop_zone(&mut self, zone: &Position) {
        self.drop_zone = Some(*zone);
    }

    fn hide_drop_zone(&mut self) {
        self.drop_zone = None;
    }

    fn set_interactive(&mut self, id: WidgetId, interactive: bool) {
        if interactive {
            self.inert.retain(|other| *other != id);
        } else {
            self.inert.push(id);
        }
    }
}

pub fn info(
    container: &str,
    item: &str,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
) -> WidgetInfo {
    WidgetInfo::new(
        SourceRef::new(container, item),
        Position::new(left, top, width, height),
    )
}
