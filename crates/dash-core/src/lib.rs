pub mod collab;
pub mod error;
pub mod format;
pub mod id;
pub mod model;
pub mod store;
pub mod transaction;

pub use collab::{ContentResolver, FileIo, PathResolver};
pub use error::{LoadError, StoreError};
pub use format::{DashboardFile, OutputEntry, parse_dashboard};
pub use id::{SourceRef, WidgetId};
pub use model::*;
pub use store::WidgetStore;
pub use transaction::{ChangeKind, ChangeSet, Subscription};
