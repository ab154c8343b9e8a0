//! Per-widget pointer interaction state machine.
//!
//! ```text
//!        press body            release (past threshold) → commit
//!  Idle ───────────▶ Dragging ─────────────────────────────▶ Idle
//!    │  press handle            release (under threshold) → click
//!    └────────────▶ Resizing ──────────────────────────────▶ Idle
//! ```
//!
//! Geometry during a gesture is transient: it is shown, never written.
//! Only the release outcome becomes a store mutation.

use crate::config::LayoutConfig;
use crate::input::{HitTarget, PointerButton, PointerEvent};
use dash_core::model::{Position, WidgetRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize,
}

/// Bookkeeping for one in-flight gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Gesture {
    pub kind: GestureKind,
    /// Pointer position at press.
    pub start: (f64, f64),
    /// Committed geometry at press.
    pub origin: Position,
    /// Copy of the record at press, rendered as the drag image.
    pub snapshot: WidgetRecord,
    /// Geometry following the pointer.
    pub transient: Position,
    /// Set once pointer travel reached the drag threshold.
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Dragging(Gesture),
    Resizing(Gesture),
}

/// What a release produced: geometry to commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureOutcome {
    pub kind: GestureKind,
    pub from: Position,
    pub to: Position,
}

/// Result of feeding one event to an [`Interaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Event does not apply in the current state.
    Ignored,
    Pressed(GestureKind),
    /// Pointer moved but has not yet passed the threshold.
    Pending,
    /// New transient geometry.
    Moved(Position),
    /// Gesture ended; `None` means it was a click.
    Released(Option<GestureOutcome>),
}

#[derive(Debug, Clone, Default)]
pub struct Interaction {
    state: GestureState,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GestureState::Idle)
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        match &self.state {
            GestureState::Idle => None,
            GestureState::Dragging(g) | GestureState::Resizing(g) => Some(g),
        }
    }

    /// Feed one pointer event. `target` is the widget part under the
    /// pointer for presses; `record` is the widget's committed record.
    pub fn handle(
        &mut self,
        event: &PointerEvent,
        target: Option<HitTarget>,
        record: &WidgetRecord,
        config: &LayoutConfig,
    ) -> Step {
        match event {
            PointerEvent::Down {
                x,
                y,
                button,
                modifiers,
            } => {
                if !self.is_idle() {
                    return Step::Ignored;
                }
                let accepted = match button {
                    PointerButton::Primary => true,
                    PointerButton::Secondary => !modifiers.any(),
                    PointerButton::Middle => false,
                };
                let Some(target) = target.filter(|_| accepted) else {
                    return Step::Ignored;
                };
                let kind = match target {
                    HitTarget::Body => GestureKind::Drag,
                    HitTarget::ResizeHandle => GestureKind::Resize,
                };
                let gesture = Gesture {
                    kind,
                    start: (*x, *y),
                    origin: record.position,
                    snapshot: record.clone(),
                    transient: record.position,
                    started: false,
                };
                self.state = match kind {
                    GestureKind::Drag => GestureState::Dragging(gesture),
                    GestureKind::Resize => GestureState::Resizing(gesture),
                };
                log::trace!("{} press → {kind:?}", record.id);
                Step::Pressed(kind)
            }
            PointerEvent::Move { x, y } => {
                let Some(gesture) = self.gesture_mut() else {
                    return Step::Ignored;
                };
                if !track(gesture, *x, *y, config) {
                    return Step::Pending;
                }
                Step::Moved(gesture.transient)
            }
            PointerEvent::Up { x, y } => {
                let (GestureState::Dragging(mut gesture) | GestureState::Resizing(mut gesture)) =
                    std::mem::take(&mut self.state)
                else {
                    return Step::Ignored;
                };
                if !track(&mut gesture, *x, *y, config) {
                    log::trace!("{} release under threshold: click", gesture.snapshot.id);
                    return Step::Released(None);
                }
                Step::Released(Some(GestureOutcome {
                    kind: gesture.kind,
                    from: gesture.origin,
                    to: gesture.transient,
                }))
            }
        }
    }

    /// Drop any in-flight gesture, returning it so visual state can be
    /// restored. Nothing is committed.
    pub fn abort(&mut self) -> Option<Gesture> {
        match std::mem::take(&mut self.state) {
            GestureState::Idle => None,
            GestureState::Dragging(g) | GestureState::Resizing(g) => Some(g),
        }
    }

    fn gesture_mut(&mut self) -> Option<&mut Gesture> {
        match &mut self.state {
            GestureState::Idle => None,
            GestureState::Dragging(g) | GestureState::Resizing(g) => Some(g),
        }
    }
}

/// Update transient geometry for pointer position `(x, y)`. Returns
/// whether the gesture has started.
fn track(gesture: &mut Gesture, x: f64, y: f64, config: &LayoutConfig) -> bool {
    let dx = x - gesture.start.0;
    let dy = y - gesture.start.1;
    if !gesture.started {
        if dx.abs() < config.drag_threshold && dy.abs() < config.drag_threshold {
            return false;
        }
        gesture.started = true;
    }
    let origin = gesture.origin;
    gesture.transient = match gesture.kind {
        GestureKind::Drag => Position {
            left: origin.left + dx,
            top: origin.top + dy,
            ..origin
        },
        GestureKind::Resize => Position {
            width: (origin.width + dx).max(config.min_width),
            height: (origin.height + dy).max(config.min_height),
            ..origin
        },
    };
    true
}
