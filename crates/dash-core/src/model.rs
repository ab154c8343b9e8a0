//! Widget record model.
//!
//! A widget is one placement of external content on the dashboard canvas.
//! Geometry is a plain numeric [`Position`]; translating it into visual
//! units is the host renderer's job.

use crate::id::{SourceRef, WidgetId};
use serde::{Deserialize, Serialize};

// ─── Geometry ────────────────────────────────────────────────────────────

/// Placement box in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Position {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.left + 0.5 * self.width,
            self.top + 0.5 * self.height,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Merge a patch over this position; unset fields are kept.
    pub fn merged(&self, patch: &PositionPatch) -> Self {
        Self {
            left: patch.left.unwrap_or(self.left),
            top: patch.top.unwrap_or(self.top),
            width: patch.width.unwrap_or(self.width),
            height: patch.height.unwrap_or(self.height),
        }
    }

    /// The patch that, merged over `self`, yields `target`. Only differing
    /// fields are set.
    pub fn diff(&self, target: &Position) -> PositionPatch {
        fn pick(old: f64, new: f64) -> Option<f64> {
            (old != new).then_some(new)
        }
        PositionPatch {
            left: pick(self.left, target.left),
            top: pick(self.top, target.top),
            width: pick(self.width, target.width),
            height: pick(self.height, target.height),
        }
    }
}

/// Partial position update. `None` means "leave unchanged".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl PositionPatch {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.top.is_none() && self.width.is_none() && self.height.is_none()
    }

    /// Patch that sets every field of `pos`.
    pub fn full(pos: Position) -> Self {
        Self {
            left: Some(pos.left),
            top: Some(pos.top),
            width: Some(pos.width),
            height: Some(pos.height),
        }
    }

    pub fn moved_to(left: f64, top: f64) -> Self {
        Self {
            left: Some(left),
            top: Some(top),
            ..Self::default()
        }
    }

    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    /// The patch restoring `old` for exactly the fields this patch sets.
    pub fn inverse_against(&self, old: &Position) -> Self {
        Self {
            left: self.left.map(|_| old.left),
            top: self.top.map(|_| old.top),
            width: self.width.map(|_| old.width),
            height: self.height.map(|_| old.height),
        }
    }

    /// Field-level writes this patch expands to.
    pub fn writes(&self) -> impl Iterator<Item = (Field, FieldValue)> + '_ {
        [
            (Field::Left, self.left),
            (Field::Top, self.top),
            (Field::Width, self.width),
            (Field::Height, self.height),
        ]
        .into_iter()
        .filter_map(|(f, v)| v.map(|v| (f, FieldValue::Number(v))))
    }
}

// ─── Records ─────────────────────────────────────────────────────────────

/// One stored widget placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRecord {
    pub id: WidgetId,
    pub source: SourceRef,
    pub position: Position,
    /// Tombstone: excluded from iteration, still readable by id.
    pub removed: bool,
    /// Dirty flag, set on every committed mutation.
    pub changed: bool,
    /// Placeholder for a source that could not be resolved at load time.
    #[serde(default)]
    pub missing: bool,
}

impl WidgetRecord {
    pub fn new(id: WidgetId, source: SourceRef, position: Position) -> Self {
        Self {
            id,
            source,
            position,
            removed: false,
            changed: false,
            missing: false,
        }
    }
}

/// Arguments of `add_widget`. `id` is generated when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetInfo {
    pub id: Option<WidgetId>,
    pub source: SourceRef,
    pub position: Position,
    pub missing: bool,
}

impl WidgetInfo {
    pub fn new(source: SourceRef, position: Position) -> Self {
        Self {
            id: None,
            source,
            position,
            missing: false,
        }
    }

    pub fn with_id(mut self, id: WidgetId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn into_record(self) -> WidgetRecord {
        let mut record = WidgetRecord::new(
            self.id.unwrap_or_else(WidgetId::fresh),
            self.source,
            self.position,
        );
        record.missing = self.missing;
        record
    }
}

// ─── Field schema ────────────────────────────────────────────────────────

/// Writable fields of a widget record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Left,
    Top,
    Width,
    Height,
    Removed,
    Changed,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Left,
        Field::Top,
        Field::Width,
        Field::Height,
        Field::Removed,
        Field::Changed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Left => "left",
            Field::Top => "top",
            Field::Width => "width",
            Field::Height => "height",
            Field::Removed => "removed",
            Field::Changed => "changed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Field::Left | Field::Top | Field::Width | Field::Height)
    }
}

/// Value carried by a single field write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
}
