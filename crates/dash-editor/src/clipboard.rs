//! Widget clipboard.
//!
//! Holds copies of placements, not records: pasting always creates new
//! records with fresh ids. The clipboard is owned by the host so it can be
//! shared between dashboards.

use dash_core::id::SourceRef;
use dash_core::model::{Position, WidgetRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct ClipEntry {
    pub source: SourceRef,
    pub position: Position,
}

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    entries: Vec<ClipEntry>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with copies of `records`.
    pub fn fill<'a>(&mut self, records: impl IntoIterator<Item = &'a WidgetRecord>) {
        self.entries = records
            .into_iter()
            .map(|r| ClipEntry {
                source: r.source.clone(),
                position: r.position,
            })
            .collect();
    }

    pub fn entries(&self) -> &[ClipEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
