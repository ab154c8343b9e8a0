pub mod clipboard;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod input;
pub mod ops;
pub mod reconciler;
pub mod shortcuts;

pub use clipboard::{ClipEntry, Clipboard};
pub use commands::{Journal, Target, UndoableAction};
pub use config::{LayoutConfig, LayoutMode};
pub use dashboard::Dashboard;
pub use error::{DashboardError, DashboardResult};
pub use geometry::Placement;
pub use gesture::GestureKind;
pub use input::{HitTarget, Modifiers, PointerButton, PointerEvent};
pub use ops::LayoutOp;
pub use reconciler::{Reconciler, RenderAdapter};
pub use shortcuts::{ShortcutAction, ShortcutMap};
