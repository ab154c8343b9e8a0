//! Input abstraction layer.
//!
//! Normalizes host pointer events into the small set the gesture state
//! machine consumes.

/// Keyboard modifiers held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Which part of a widget a press landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Body,
    ResizeHandle,
}

/// A normalized pointer event in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down {
        x: f64,
        y: f64,
        button: PointerButton,
        modifiers: Modifiers,
    },
    Move {
        x: f64,
        y: f64,
    },
    Up {
        x: f64,
        y: f64,
    },
}

impl PointerEvent {
    pub fn press(x: f64, y: f64) -> Self {
        Self::Down {
            x,
            y,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        match self {
            Self::Down { x, y, .. } | Self::Move { x, y } | Self::Up { x, y } => (*x, *y),
        }
    }
}
