use crate::id::WidgetId;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Contract violations raised by the record store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("no widget record with id {0}")]
    NotFound(WidgetId),
    #[error("widget id {0} is already in use")]
    DuplicateId(WidgetId),
    #[error("unknown field `{field}` written to {id}")]
    UnknownField { id: WidgetId, field: String },
    #[error("field `{field}` of {id} expects a {expected} value")]
    WrongType {
        id: WidgetId,
        field: &'static str,
        expected: &'static str,
    },
    #[error("field `{field}` of {id} must be finite")]
    NonFinite { id: WidgetId, field: &'static str },
    #[error("{id} would commit {field} = {value}, below the minimum {min}")]
    BelowMinimum {
        id: WidgetId,
        field: &'static str,
        value: f64,
        min: f64,
    },
    #[error("a transaction is already open")]
    NestedTransaction,
    #[error("no transaction is open")]
    NoTransaction,
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Failures reading a persisted dashboard. All of them abort the load
/// before the store is touched.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("dashboard file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dashboard file must be a JSON object")]
    NotAnObject,
    #[error("dashboard file is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("dashboard field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("output {index} of container `{container}` has a missing or malformed `{field}`")]
    MalformedOutput {
        container: String,
        index: usize,
        field: &'static str,
    },
    #[error("file I/O failed: {0}")]
    Io(String),
}
