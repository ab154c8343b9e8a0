//! Layout reconciler: live widget views ↔ record store.
//!
//! The reconciler subscribes to the store and keeps one view per live
//! record. Store notifications are the only trigger for re-reading
//! records; `sync` drains them and pushes the differences to the host's
//! [`RenderAdapter`].
//!
//! Pointer gestures are resolved here into [`UndoableAction`]s. The
//! reconciler never writes to the store itself: the caller performs the
//! returned action through the journal, and the resulting commit comes
//! back through `sync` like any other change.

use crate::commands::UndoableAction;
use crate::config::{LayoutConfig, LayoutMode};
use crate::geometry::{drop_target, settle};
use crate::gesture::{GestureKind, Interaction, Step};
use crate::input::{HitTarget, PointerEvent};
use crate::ops::LayoutOp;
use dash_core::id::WidgetId;
use dash_core::model::{Position, WidgetRecord};
use dash_core::store::WidgetStore;
use dash_core::transaction::{ChangeSet, Subscription};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// Host UI surface the reconciler drives. Positions are canvas pixels.
pub trait RenderAdapter {
    /// Create or move the view for `id`.
    fn place(&mut self, id: WidgetId, position: &Position);
    /// Destroy the view for `id`.
    fn remove(&mut self, id: WidgetId);
    /// Natural size of the view's content, once it has rendered.
    fn measure(&self, id: WidgetId) -> Option<(f64, f64)>;

    fn show_drag_image(&mut self, _snapshot: &WidgetRecord, _position: &Position) {}
    fn hide_drag_image(&mut self) {}
    fn show_drop_zone(&mut self, _zone: &Position) {}
    fn hide_drop_zone(&mut self) {}
    /// Dim the view and stop it taking input while it is being moved.
    fn set_interactive(&mut self, _id: WidgetId, _interactive: bool) {}
    fn capture_pointer(&mut self, _id: WidgetId) {}
    fn release_pointer(&mut self, _id: WidgetId) {}
}

struct View {
    position: Position,
    interaction: Interaction,
}

struct PendingFit {
    id: WidgetId,
    due: Duration,
}

pub struct Reconciler {
    views: HashMap<WidgetId, View>,
    inbox: Rc<RefCell<VecDeque<ChangeSet>>>,
    _subscription: Subscription,
    fits: Vec<PendingFit>,
    clock: Duration,
}

impl Reconciler {
    /// Subscribe to `store`. Records already present get views on the
    /// first `full_sync`; later ones on `sync`.
    pub fn attach(store: &WidgetStore) -> Self {
        let inbox: Rc<RefCell<VecDeque<ChangeSet>>> = Rc::default();
        let sink = Rc::clone(&inbox);
        let subscription =
            store.subscribe(move |change| sink.borrow_mut().push_back(change.clone()));
        Self {
            views: HashMap::new(),
            inbox,
            _subscription: subscription,
            fits: Vec::new(),
            clock: Duration::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.views.contains_key(&id)
    }

    /// Position currently shown for `id` (transient during a gesture).
    pub fn view_position(&self, id: WidgetId) -> Option<Position> {
        self.views.get(&id).map(|v| v.position)
    }

    pub fn gesture_kind(&self, id: WidgetId) -> Option<GestureKind> {
        self.views
            .get(&id)
            .and_then(|v| v.interaction.gesture())
            .map(|g| g.kind)
    }

    /// Whether a store notification is waiting for `sync`.
    pub fn has_pending(&self) -> bool {
        !self.inbox.borrow().is_empty()
    }

    // ─── Store → views ───────────────────────────────────────────────────

    /// Apply every queued change set, in commit order.
    pub fn sync(&mut self, store: &WidgetStore, adapter: &mut dyn RenderAdapter) {
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(change) = next else {
                break;
            };
            for id in change.ids() {
                self.reconcile_one(store, id, adapter);
            }
        }
    }

    /// Re-place every view from the store regardless of notifications.
    pub fn full_sync(&mut self, store: &WidgetStore, adapter: &mut dyn RenderAdapter) {
        self.inbox.borrow_mut().clear();
        let stale: Vec<WidgetId> = self
            .views
            .keys()
            .copied()
            .filter(|id| store.get_widget_info(*id).is_none_or(|r| r.removed))
            .collect();
        for id in stale {
            self.destroy(id, adapter);
        }
        let live: Vec<WidgetId> = store.get_widgets().map(|r| r.id).collect();
        for id in live {
            self.reconcile_one(store, id, adapter);
        }
    }

    fn reconcile_one(
        &mut self,
        store: &WidgetStore,
        id: WidgetId,
        adapter: &mut dyn RenderAdapter,
    ) {
        match store.get_widget_info(id).filter(|r| !r.removed) {
            Some(record) => {
                let view = self.views.entry(id).or_insert_with(|| View {
                    position: record.position,
                    interaction: Interaction::new(),
                });
                // A commit under an in-flight gesture wins over it
                if let Some(gesture) = view.interaction.abort() {
                    log::debug!("{id}: record changed mid-gesture, aborting");
                    finish_visuals(adapter, id, gesture.kind);
                }
                view.position = record.position;
                adapter.place(id, &record.position);
            }
            None => self.destroy(id, adapter),
        }
    }

    fn destroy(&mut self, id: WidgetId, adapter: &mut dyn RenderAdapter) {
        if let Some(mut view) = self.views.remove(&id) {
            if let Some(gesture) = view.interaction.abort() {
                finish_visuals(adapter, id, gesture.kind);
            }
            adapter.remove(id);
        }
    }

    // ─── Gestures ────────────────────────────────────────────────────────

    /// Press on widget `id`. Returns whether a gesture started.
    pub fn pointer_down(
        &mut self,
        store: &WidgetStore,
        config: &LayoutConfig,
        id: WidgetId,
        target: HitTarget,
        event: &PointerEvent,
        adapter: &mut dyn RenderAdapter,
    ) -> bool {
        let (Some(view), Some(record)) = (self.views.get_mut(&id), store.get_widget_info(id)) else {
            return false;
        };
        match view.interaction.handle(event, Some(target), record, config) {
            Step::Pressed(_) => {
                adapter.capture_pointer(id);
                adapter.set_interactive(id, false);
                adapter.show_drag_image(record, &record.position);
                true
            }
            _ => false,
        }
    }

    /// Pointer motion during a gesture on `id`.
    pub fn pointer_move(
        &mut self,
        store: &WidgetStore,
        config: &LayoutConfig,
        id: WidgetId,
        x: f64,
        y: f64,
        adapter: &mut dyn RenderAdapter,
    ) {
        let Some(record) = store.get_widget_info(id) else {
            return;
        };
        let Some(view) = self.views.get_mut(&id) else {
            return;
        };
        let kind = view.interaction.gesture().map(|g| g.kind);
        let Step::Moved(transient) =
            view.interaction
                .handle(&PointerEvent::Move { x, y }, None, record, config)
        else {
            return;
        };
        view.position = transient;
        adapter.place(id, &transient);
        adapter.show_drag_image(record, &transient);
        if kind == Some(GestureKind::Drag) {
            let zone = preview(store, config, id, transient);
            adapter.show_drop_zone(&zone);
        }
        log::trace!("{id} transient {transient:?}");
    }

    /// Release during a gesture on `id`.
    ///
    /// Returns the action committing the gesture, or `None` for a click, a
    /// gesture that ends where it began, or an unknown widget.
    pub fn pointer_up(
        &mut self,
        store: &WidgetStore,
        config: &LayoutConfig,
        id: WidgetId,
        x: f64,
        y: f64,
        adapter: &mut dyn RenderAdapter,
    ) -> Option<UndoableAction<LayoutOp>> {
        let record = store.get_widget_info(id)?;
        let view = self.views.get_mut(&id)?;
        let kind = view.interaction.gesture().map(|g| g.kind)?;
        let step = view
            .interaction
            .handle(&PointerEvent::Up { x, y }, None, record, config);
        finish_visuals(adapter, id, kind);

        let Step::Released(Some(outcome)) = step else {
            // Click: show the committed geometry again
            view.position = record.position;
            adapter.place(id, &record.position);
            return None;
        };

        let description = match outcome.kind {
            GestureKind::Drag => "Move widget",
            GestureKind::Resize => "Resize widget",
        };
        let ops = placement_ops(store, config, id, outcome.to);
        if ops.is_empty() {
            view.position = record.position;
            adapter.place(id, &record.position);
            return None;
        }
        Some(UndoableAction::capture(store, LayoutOp::batch(ops), description))
    }

    /// Cancel any gesture on `id`, restoring its committed geometry
    /// without writing.
    pub fn abort(&mut self, store: &WidgetStore, id: WidgetId, adapter: &mut dyn RenderAdapter) {
        let Some(view) = self.views.get_mut(&id) else {
            return;
        };
        let Some(gesture) = view.interaction.abort() else {
            return;
        };
        finish_visuals(adapter, id, gesture.kind);
        let committed = store
            .get_widget_info(id)
            .map(|r| r.position)
            .unwrap_or(gesture.origin);
        view.position = committed;
        adapter.place(id, &committed);
        log::debug!("{id}: gesture aborted");
    }

    /// Abort every in-flight gesture (e.g. the container is going away).
    pub fn abort_all(&mut self, store: &WidgetStore, adapter: &mut dyn RenderAdapter) {
        let ids: Vec<WidgetId> = self.views.keys().copied().collect();
        for id in ids {
            self.abort(store, id, adapter);
        }
    }

    // ─── Fit-to-content ──────────────────────────────────────────────────

    /// Measure `id` once `fit_delay` has elapsed and size it to its
    /// content. Cannot be cancelled; skipped if the view is gone by then.
    pub fn schedule_fit(&mut self, id: WidgetId, config: &LayoutConfig) {
        self.fits.push(PendingFit {
            id,
            due: self.clock + config.fit_delay(),
        });
    }

    pub fn pending_fits(&self) -> usize {
        self.fits.len()
    }

    /// Advance the deferral clock and return actions for every due fit.
    pub fn advance(
        &mut self,
        elapsed: Duration,
        store: &WidgetStore,
        config: &LayoutConfig,
        adapter: &dyn RenderAdapter,
    ) -> Vec<UndoableAction<LayoutOp>> {
        self.clock += elapsed;
        let now = self.clock;
        let (due, waiting): (Vec<PendingFit>, Vec<PendingFit>) =
            std::mem::take(&mut self.fits).into_iter().partition(|f| f.due <= now);
        self.fits = waiting;

        let mut actions = Vec::new();
        for fit in due {
            // Disposal check
            let Some(view) = self.views.get(&fit.id) else {
                log::trace!("{}: fit skipped, view disposed", fit.id);
                continue;
            };
            if !view.interaction.is_idle() {
                continue;
            }
            let Some(record) = store.get_widget_info(fit.id).filter(|r| !r.removed) else {
                continue;
            };
            let Some((width, height)) = adapter.measure(fit.id) else {
                continue;
            };
            let target = Position {
                width,
                height,
                ..record.position
            };
            let ops = placement_ops(store, config, fit.id, target);
            if !ops.is_empty() {
                actions.push(UndoableAction::capture(
                    store,
                    LayoutOp::batch(ops),
                    "Fit widget to content",
                ));
            }
        }
        actions
    }
}

/// Restore the visual flags a gesture changed.
fn finish_visuals(adapter: &mut dyn RenderAdapter, id: WidgetId, kind: GestureKind) {
    adapter.hide_drag_image();
    if kind == GestureKind::Drag {
        adapter.hide_drop_zone();
    }
    adapter.set_interactive(id, true);
    adapter.release_pointer(id);
}

/// Live neighbours of `id` with their committed positions.
fn neighbours(store: &WidgetStore, id: WidgetId) -> Vec<(WidgetId, Position)> {
    store
        .get_widgets()
        .filter(|r| r.id != id)
        .map(|r| (r.id, r.position))
        .collect()
}

/// Where a drag of `id` to `transient` would land.
fn preview(
    store: &WidgetStore,
    config: &LayoutConfig,
    id: WidgetId,
    transient: Position,
) -> Position {
    let placed = config.place(transient);
    match config.mode {
        LayoutMode::Free => placed,
        LayoutMode::Grid => drop_target(placed, &neighbours(store, id)),
    }
}

/// Ops committing `id` at `target`: the widget's own update plus, in grid
/// mode, updates for every neighbour it displaces. Empty when nothing
/// would change.
pub(crate) fn placement_ops(
    store: &WidgetStore,
    config: &LayoutConfig,
    id: WidgetId,
    target: Position,
) -> Vec<LayoutOp> {
    let Some(record) = store.get_widget_info(id) else {
        return Vec::new();
    };
    let placed = config.place(target);
    let (position, displaced) = match config.mode {
        LayoutMode::Free => (placed, Vec::new()),
        LayoutMode::Grid => {
            let settled = settle(placed, &neighbours(store, id));
            (settled.position, settled.displaced)
        }
    };

    let mut ops = Vec::new();
    let patch = record.position.diff(&position);
    if !patch.is_empty() {
        ops.push(LayoutOp::Update { id, patch });
    }
    for (other, pos) in displaced {
        if let Some(current) = store.get_widget_info(other) {
            ops.push(LayoutOp::Update {
                id: other,
                patch: current.position.diff(&pos),
            });
        }
    }
    ops
}

/// Ops inserting `records` at positions placed per the layout mode. In grid
/// mode each new box settles among live widgets and the boxes inserted
/// before it; widgets it displaces get updates in the same list.
pub(crate) fn insertion_ops(
    store: &WidgetStore,
    config: &LayoutConfig,
    records: Vec<WidgetRecord>,
) -> Vec<LayoutOp> {
    let mut boxes: Vec<(WidgetId, Position)> =
        store.get_widgets().map(|r| (r.id, r.position)).collect();
    let existing = boxes.len();

    let mut fresh = Vec::with_capacity(records.len());
    for record in records {
        let placed = config.place(record.position);
        let position = match config.mode {
            LayoutMode::Free => placed,
            LayoutMode::Grid => {
                let settled = settle(placed, &boxes);
                for (id, pos) in settled.displaced {
                    if let Some(slot) = boxes.iter_mut().find(|(other, _)| *other == id) {
                        slot.1 = pos;
                    }
                }
                settled.position
            }
        };
        boxes.push((record.id, position));
        fresh.push(record);
    }

    let mut ops = Vec::new();
    for (mut record, (_, position)) in fresh.into_iter().zip(&boxes[existing..]) {
        record.position = *position;
        ops.push(LayoutOp::insert(record));
    }
    for (id, position) in &boxes[..existing] {
        if let Some(current) = store.get_widget_info(*id) {
            let patch = current.position.diff(position);
            if !patch.is_empty() {
                ops.push(LayoutOp::Update { id: *id, patch });
            }
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Journal;
    use dash_core::id::SourceRef;
    use dash_core::model::{PositionPatch, WidgetInfo};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        placed: HashMap<WidgetId, Position>,
        removed: Vec<WidgetId>,
        sizes: HashMap<WidgetId, (f64, f64)>,
        drag_image: bool,
        drop_zone: Option<Position>,
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
        fn show_drag_image(&mut self, _snapshot: &WidgetRecord, _position: &Position) {
            self.drag_image = true;
        }
        fn hide_drag_image(&mut self) {
            self.drag_image = false;
        }
        fn show_drop_zone(&mut self, zone: &Position) {
            self.drop_zone = Some(*zone);
        }
        fn hide_drop_zone(&mut self) {
            self.drop_zone = None;
        }
    }

    fn setup(name: &str) -> (WidgetStore, Reconciler, Recorder, WidgetId) {
        let mut store = WidgetStore::default();
        let reconciler = Reconciler::attach(&store);
        let id = store
            .add_widget(
                WidgetInfo::new(SourceRef::new("nb", name), Position::new(10.0, 10.0, 200.0, 150.0))
                    .with_id(WidgetId::intern(name)),
            )
            .unwrap();
        (store, reconciler, Recorder::default(), id)
    }

    #[test]
    fn sync_follows_store_commits() {
        let (mut store, mut rec, mut ui, id) = setup("rc_follow");
        assert!(rec.has_pending());
        rec.sync(&store, &mut ui);
        assert_eq!(ui.placed[&id], Position::new(10.0, 10.0, 200.0, 150.0));

        store.update_widget(id, &PositionPatch::moved_to(40.0, 0.0)).unwrap();
        rec.sync(&store, &mut ui);
        assert_eq!(ui.placed[&id].left, 40.0);

        store.delete_widget(id).unwrap();
        rec.sync(&store, &mut ui);
        assert!(!rec.contains(id));
        assert_eq!(ui.removed, vec![id]);
    }

    #[test]
    fn drag_is_transient_until_committed() {
        let (mut store, mut rec, mut ui, id) = setup("rc_drag");
        let config = LayoutConfig::default();
        rec.sync(&store, &mut ui);

        let press = PointerEvent::press(20.0, 20.0);
        assert!(rec.pointer_down(&store, &config, id, HitTarget::Body, &press, &mut ui));
        rec.pointer_move(&store, &config, id, 60.0, 60.0, &mut ui);
        assert_eq!(rec.view_position(id), Some(Position::new(50.0, 50.0, 200.0, 150.0)));
        assert_eq!(ui.drop_zone, Some(Position::new(50.0, 50.0, 200.0, 150.0)));
        // Nothing written yet
        assert_eq!(store.get_widget_info(id).unwrap().position.left, 10.0);

        let action = rec.pointer_up(&store, &config, id, 60.0, 60.0, &mut ui).unwrap();
        assert_eq!(action.description(), "Move widget");
        assert!(!ui.drag_image);
        assert_eq!(ui.drop_zone, None);

        let mut journal = Journal::new(10);
        journal.perform(&mut store, action).unwrap();
        rec.sync(&store, &mut ui);
        assert_eq!(ui.placed[&id], Position::new(50.0, 50.0, 200.0, 150.0));
    }

    #[test]
    fn release_under_threshold_is_a_click() {
        let (store, mut rec, mut ui, id) = setup("rc_click");
        let config = LayoutConfig::default();
        rec.sync(&store, &mut ui);

        let press = PointerEvent::press(20.0, 20.0);
        rec.pointer_down(&store, &config, id, HitTarget::Body, &press, &mut ui);
        rec.pointer_move(&store, &config, id, 24.0, 23.0, &mut ui);
        assert_eq!(rec.view_position(id).unwrap().left, 10.0);
        assert!(rec.pointer_up(&store, &config, id, 24.0, 23.0, &mut ui).is_none());
        assert_eq!(rec.gesture_kind(id), None);
    }

    #[test]
    fn commit_mid_gesture_aborts_it() {
        let (mut store, mut rec, mut ui, id) = setup("rc_interrupt");
        let config = LayoutConfig::default();
        rec.sync(&store, &mut ui);

        let press = PointerEvent::press(210.0, 160.0);
        rec.pointer_down(&store, &config, id, HitTarget::ResizeHandle, &press, &mut ui);
        rec.pointer_move(&store, &config, id, 260.0, 200.0, &mut ui);
        assert_eq!(rec.gesture_kind(id), Some(GestureKind::Resize));

        store.update_widget(id, &PositionPatch::moved_to(0.0, 300.0)).unwrap();
        rec.sync(&store, &mut ui);
        assert_eq!(rec.gesture_kind(id), None);
        assert!(!ui.drag_image);
        assert_eq!(ui.placed[&id], Position::new(0.0, 300.0, 200.0, 150.0));
        assert!(rec.pointer_up(&store, &config, id, 260.0, 200.0, &mut ui).is_none());
    }

    #[test]
    fn abort_restores_committed_geometry() {
        let (store, mut rec, mut ui, id) = setup("rc_abort");
        let config = LayoutConfig::default();
        rec.sync(&store, &mut ui);

        let press = PointerEvent::press(20.0, 20.0);
        rec.pointer_down(&store, &config, id, HitTarget::Body, &press, &mut ui);
        rec.pointer_move(&store, &config, id, 120.0, 20.0, &mut ui);
        rec.abort(&store, id, &mut ui);
        assert_eq!(ui.placed[&id], Position::new(10.0, 10.0, 200.0, 150.0));
        assert_eq!(rec.gesture_kind(id), None);
    }

    #[test]
    fn fit_waits_for_delay() {
        let (store, mut rec, mut ui, id) = setup("rc_fit");
        let config = LayoutConfig::default();
        rec.sync(&store, &mut ui);
        ui.sizes.insert(id, (400.0, 90.0));

        rec.schedule_fit(id, &config);
        assert!(rec.advance(Duration::from_millis(50), &store, &config, &ui).is_empty());
        assert_eq!(rec.pending_fits(), 1);

        let actions = rec.advance(Duration::from_millis(50), &store, &config, &ui);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].description(), "Fit widget to content");
        assert_eq!(rec.pending_fits(), 0);
    }

    #[test]
    fn fit_skipped_once_view_is_gone() {
        let (mut store, mut rec, mut ui, id) = setup("rc_fit_gone");
        let config = LayoutConfig::default();
        rec.sync(&store, &mut ui);
        ui.sizes.insert(id, (400.0, 90.0));

        rec.schedule_fit(id, &config);
        store.delete_widget(id).unwrap();
        rec.sync(&store, &mut ui);
        assert!(rec.advance(Duration::from_millis(200), &store, &config, &ui).is_empty());
    }

    #[test]
    fn grid_preview_drops_below_lower_half() {
        let mut store = WidgetStore::default();
        let mut rec = Reconciler::attach(&store);
        let mut ui = Recorder::default();
        let config = LayoutConfig::grid();
        let top = WidgetId::intern("rc_grid_top");
        let moving = WidgetId::intern("rc_grid_moving");
        let a = Position::new(0.0, 0.0, 100.0, 100.0);
        let b = Position::new(0.0, 200.0, 100.0, 100.0);
        store
            .add_widget(WidgetInfo::new(SourceRef::new("nb", "a"), a).with_id(top))
            .unwrap();
        store
            .add_widget(WidgetInfo::new(SourceRef::new("nb", "b"), b).with_id(moving))
            .unwrap();
        rec.sync(&store, &mut ui);

        let press = PointerEvent::press(50.0, 250.0);
        rec.pointer_down(&store, &config, moving, HitTarget::Body, &press, &mut ui);
        rec.pointer_move(&store, &config, moving, 50.0, 110.0, &mut ui);
        assert_eq!(ui.drop_zone, Some(Position::new(0.0, 100.0, 100.0, 100.0)));
    }
}
