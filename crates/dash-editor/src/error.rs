use dash_core::error::{LoadError, StoreError};
use thiserror::Error;

pub type DashboardResult<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("dashboard has not been saved to a path yet")]
    NoPath,
}
