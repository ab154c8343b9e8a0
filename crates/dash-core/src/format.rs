//! Persisted dashboard file format.
//!
//! ```json
//! {
//!   "version": 1,
//!   "name": "sales",
//!   "dashboardWidth": 1280,
//!   "dashboardHeight": 720,
//!   "paths": { "notebooks/q3.ipynb": "nb-41" },
//!   "outputs": { "nb-41": [{ "cellId": "c1", "left": 0, "top": 0, "width": 320, "height": 200 }] }
//! }
//! ```
//!
//! Parsing validates in a fixed order and fails before anything is built,
//! so a rejected file never reaches the store.

use crate::error::{LoadError, LoadResult};
use crate::model::Position;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

pub const DEFAULT_DASHBOARD_WIDTH: f64 = 1280.0;
pub const DEFAULT_DASHBOARD_HEIGHT: f64 = 720.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFile {
    pub version: f64,
    pub name: String,
    pub dashboard_width: f64,
    pub dashboard_height: f64,
    /// Container path → container id at save time.
    pub paths: BTreeMap<String, String>,
    /// Container id → placements of that container's items.
    pub outputs: BTreeMap<String, Vec<OutputEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEntry {
    pub cell_id: String,
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl OutputEntry {
    pub fn position(&self) -> Position {
        Position::new(self.left, self.top, self.width, self.height)
    }
}

impl DashboardFile {
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            version: FORMAT_VERSION as f64,
            name: name.into(),
            dashboard_width: width,
            dashboard_height: height,
            paths: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn to_json(&self) -> String {
        // Only strings, numbers and maps of those
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.values().map(Vec::len).sum()
    }
}

/// Parse and validate a dashboard file.
///
/// Order: `version` (a differing version only warns), `paths`, `outputs`,
/// then each output entry (`cellId`, `left`, `top`, `width`, `height`).
pub fn parse_dashboard(text: &str) -> LoadResult<DashboardFile> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(root) = value else {
        return Err(LoadError::NotAnObject);
    };

    let version = match root.get("version") {
        None => return Err(LoadError::MissingField("version")),
        Some(v) => v.as_f64().ok_or(LoadError::WrongType {
            field: "version",
            expected: "a number",
        })?,
    };
    if version != FORMAT_VERSION as f64 {
        log::warn!(
            "dashboard file version {version} differs from supported version {FORMAT_VERSION}"
        );
    }

    let paths = parse_paths(&root)?;
    let outputs = parse_outputs(&root)?;

    let name = root
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let dashboard_width = root
        .get("dashboardWidth")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_DASHBOARD_WIDTH);
    let dashboard_height = root
        .get("dashboardHeight")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_DASHBOARD_HEIGHT);

    Ok(DashboardFile {
        version,
        name,
        dashboard_width,
        dashboard_height,
        paths,
        outputs,
    })
}

fn parse_paths(root: &Map<String, Value>) -> LoadResult<BTreeMap<String, String>> {
    let Some(paths) = root.get("paths") else {
        return Err(LoadError::MissingField("paths"));
    };
    let wrong = LoadError::WrongType {
        field: "paths",
        expected: "an object of strings",
    };
    let Value::Object(paths) = paths else {
        return Err(wrong);
    };
    let mut out = BTreeMap::new();
    for (path, id) in paths {
        let Some(id) = id.as_str() else {
            return Err(wrong);
        };
        out.insert(path.clone(), id.to_string());
    }
    Ok(out)
}

fn parse_outputs(root: &Map<String, Value>) -> LoadResult<BTreeMap<String, Vec<OutputEntry>>> {
    let Some(outputs) = root.get("outputs") else {
        return Err(LoadError::MissingField("outputs"));
    };
    let wrong = || LoadError::WrongType {
        field: "outputs",
        expected: "an object of arrays",
    };
    let Value::Object(outputs) = outputs else {
        return Err(wrong());
    };

    let mut out = BTreeMap::new();
    for (container, entries) in outputs {
        let Value::Array(entries) = entries else {
            return Err(wrong());
        };
        let parsed = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_entry(container, index, entry))
            .collect::<LoadResult<Vec<_>>>()?;
        out.insert(container.clone(), parsed);
    }
    Ok(out)
}

fn parse_entry(container: &str, index: usize, entry: &Value) -> LoadResult<OutputEntry> {
    let malformed = |field| LoadError::MalformedOutput {
        container: container.to_string(),
        index,
        field,
    };
    let number = |field: &'static str| {
        entry
            .get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed(field))
    };

    let cell_id = entry
        .get("cellId")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("cellId"))?
        .to_string();
    let left = number("left")?;
    let top = number("top")?;
    let width = number("width")?;
    let height = number("height")?;

    Ok(OutputEntry {
        cell_id,
        top,
        left,
        width,
        height,
    })
}
