//! Dashboard editor facade.
//!
//! Ties one record store to its undo journal, reconciler and layout
//! configuration, and exposes the operations a host wires to its UI:
//! add/delete, undo/redo, pointer gestures, clipboard, save/load.
//!
//! Every mutation runs as an [`UndoableAction`] through the journal. Calls
//! that take a [`RenderAdapter`] sync views before returning; the others
//! leave the resulting notification queued for the next `sync`.

use crate::clipboard::Clipboard;
use crate::commands::{Journal, Target, UndoableAction};
use crate::config::{LayoutConfig, LayoutMode};
use crate::error::{DashboardError, DashboardResult};
use crate::input::{HitTarget, PointerEvent};
use crate::ops::LayoutOp;
use crate::reconciler::{Reconciler, RenderAdapter, insertion_ops, placement_ops};
use crate::shortcuts::ShortcutAction;
use dash_core::collab::{ContentResolver, FileIo, PathResolver};
use dash_core::error::{LoadError, StoreError};
use dash_core::format::{DashboardFile, OutputEntry, parse_dashboard};
use dash_core::id::{SourceRef, WidgetId};
use dash_core::model::{Position, PositionPatch, WidgetInfo, WidgetRecord};
use dash_core::store::WidgetStore;
use std::collections::HashMap;
use std::time::Duration;

pub struct Dashboard {
    name: String,
    path: Option<String>,
    config: LayoutConfig,
    store: WidgetStore,
    journal: Journal<LayoutOp>,
    reconciler: Reconciler,
}

impl Dashboard {
    pub fn new(name: impl Into<String>, config: LayoutConfig) -> Self {
        let store = WidgetStore::new(config.min_width, config.min_height);
        let reconciler = Reconciler::attach(&store);
        Self {
            name: name.into(),
            path: None,
            journal: Journal::new(config.undo_capacity),
            config,
            store,
            reconciler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn set_mode(&mut self, mode: LayoutMode) {
        self.config.mode = mode;
    }

    pub fn store(&self) -> &WidgetStore {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn widget(&self, id: WidgetId) -> Option<&WidgetRecord> {
        self.store.get_widget_info(id)
    }

    pub fn position(&self, id: WidgetId) -> Option<Position> {
        self.widget(id).map(|r| r.position)
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    fn perform(&mut self, forward: LayoutOp, description: &str) -> DashboardResult<()> {
        let action = UndoableAction::capture(&self.store, forward, description);
        self.journal.perform(&mut self.store, action)?;
        Ok(())
    }

    // ─── Record operations ───────────────────────────────────────────────

    /// Add a widget. Geometry is placed per the layout mode; in grid mode
    /// widgets it lands on are displaced in the same undo step.
    pub fn add_widget(&mut self, info: WidgetInfo) -> DashboardResult<WidgetId> {
        let record = info.into_record();
        let id = record.id;
        let ops = insertion_ops(&self.store, &self.config, vec![record]);
        self.perform(LayoutOp::batch(ops), "Add widget")?;
        Ok(id)
    }

    /// Attach new content at `(left, top)` with the default size, and
    /// schedule a fit-to-content measurement.
    pub fn insert_content(
        &mut self,
        source: SourceRef,
        left: f64,
        top: f64,
    ) -> DashboardResult<WidgetId> {
        let position = Position::new(
            left,
            top,
            self.config.default_width,
            self.config.default_height,
        );
        let id = self.add_widget(WidgetInfo::new(source, position))?;
        self.reconciler.schedule_fit(id, &self.config);
        Ok(id)
    }

    pub fn update_widget(&mut self, id: WidgetId, patch: &PositionPatch) -> DashboardResult<()> {
        let current = self.store.get_widget_info(id).ok_or(StoreError::NotFound(id))?;
        let ops = placement_ops(&self.store, &self.config, id, current.position.merged(patch));
        if ops.is_empty() {
            return Ok(());
        }
        self.perform(LayoutOp::batch(ops), "Update widget")
    }

    /// Tombstone a widget. Deleting a removed widget does nothing.
    pub fn delete_widget(&mut self, id: WidgetId) -> DashboardResult<()> {
        match self.store.get_widget_info(id) {
            None => Err(StoreError::NotFound(id).into()),
            Some(r) if r.removed => Ok(()),
            Some(_) => self.perform(LayoutOp::Delete(id), "Delete widget"),
        }
    }

    /// Tombstone every live widget in `ids` as one undo step.
    pub fn delete_widgets(&mut self, ids: &[WidgetId]) -> DashboardResult<usize> {
        let ops: Vec<LayoutOp> = self.live(ids).map(|r| LayoutOp::Delete(r.id)).collect();
        let count = ops.len();
        if count > 0 {
            self.perform(LayoutOp::batch(ops), "Delete widgets")?;
        }
        Ok(count)
    }

    fn live<'a>(&'a self, ids: &'a [WidgetId]) -> impl Iterator<Item = &'a WidgetRecord> + 'a {
        ids.iter()
            .filter_map(|id| self.store.get_widget_info(*id))
            .filter(|r| !r.removed)
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> DashboardResult<Option<String>> {
        Ok(self.journal.undo(&mut self.store)?)
    }

    pub fn redo(&mut self) -> DashboardResult<Option<String>> {
        Ok(self.journal.redo(&mut self.store)?)
    }

    pub fn has_undo(&self) -> bool {
        self.journal.has_undo()
    }

    pub fn has_redo(&self) -> bool {
        self.journal.has_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.journal.undo_len()
    }

    // ─── Views & gestures ────────────────────────────────────────────────

    pub fn sync(&mut self, adapter: &mut dyn RenderAdapter) {
        self.reconciler.sync(&self.store, adapter);
    }

    pub fn full_sync(&mut self, adapter: &mut dyn RenderAdapter) {
        self.reconciler.full_sync(&self.store, adapter);
    }

    pub fn pointer_down(
        &mut self,
        id: WidgetId,
        target: HitTarget,
        event: &PointerEvent,
        adapter: &mut dyn RenderAdapter,
    ) -> bool {
        self.reconciler
            .pointer_down(&self.store, &self.config, id, target, event, adapter)
    }

    pub fn pointer_move(&mut self, id: WidgetId, x: f64, y: f64, adapter: &mut dyn RenderAdapter) {
        self.reconciler
            .pointer_move(&self.store, &self.config, id, x, y, adapter);
    }

    /// Finish a gesture. Returns whether anything was committed.
    pub fn pointer_up(
        &mut self,
        id: WidgetId,
        x: f64,
        y: f64,
        adapter: &mut dyn RenderAdapter,
    ) -> DashboardResult<bool> {
        let action = self
            .reconciler
            .pointer_up(&self.store, &self.config, id, x, y, adapter);
        let Some(action) = action else {
            return Ok(false);
        };
        let result = self.journal.perform(&mut self.store, action);
        self.reconciler.sync(&self.store, adapter);
        result?;
        Ok(true)
    }

    pub fn abort_gesture(&mut self, id: WidgetId, adapter: &mut dyn RenderAdapter) {
        self.reconciler.abort(&self.store, id, adapter);
    }

    /// Abort every in-flight gesture, e.g. before the host tears down the
    /// container's views.
    pub fn abort_all_gestures(&mut self, adapter: &mut dyn RenderAdapter) {
        self.reconciler.abort_all(&self.store, adapter);
    }

    /// Run due fit-to-content measurements. Returns how many committed.
    ///
    /// A fit that fails to commit does not stop the others; the first
    /// failure is returned after every due fit has run and views are synced.
    pub fn advance(
        &mut self,
        elapsed: Duration,
        adapter: &mut dyn RenderAdapter,
    ) -> DashboardResult<usize> {
        let actions = self
            .reconciler
            .advance(elapsed, &self.store, &self.config, adapter);
        let mut committed = 0;
        let mut first_error = None;
        for action in actions {
            let description = action.description().to_string();
            match self.journal.perform(&mut self.store, action) {
                Ok(()) => committed += 1,
                Err(err) => {
                    log::warn!("{description}: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }
        self.reconciler.sync(&self.store, adapter);
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(committed),
        }
    }

    /// Move widget `id` into `dest` at `position`.
    ///
    /// Records belong to one store, so this tombstones the record here and
    /// creates a new one (new id, same source) in `dest`. Each side gets its
    /// own undo entry. Returns `None` if `id` is not a live widget.
    pub fn transfer_to(
        &mut self,
        dest: &mut Dashboard,
        id: WidgetId,
        position: Position,
        origin_adapter: &mut dyn RenderAdapter,
        dest_adapter: &mut dyn RenderAdapter,
    ) -> DashboardResult<Option<WidgetId>> {
        self.reconciler.abort(&self.store, id, origin_adapter);
        let Some(record) = self.store.get_widget_info(id).filter(|r| !r.removed) else {
            return Ok(None);
        };

        let mut moved = WidgetRecord::new(WidgetId::fresh(), record.source.clone(), position);
        moved.missing = record.missing;
        let new_id = moved.id;

        // The destination entry is recorded only once both sides committed
        let ops = insertion_ops(&dest.store, &dest.config, vec![moved]);
        let arrival =
            UndoableAction::capture(&dest.store, LayoutOp::batch(ops), "Move widget in");
        dest.store.apply(arrival.forward())?;
        if let Err(err) = self.perform(LayoutOp::Delete(id), "Move widget out") {
            dest.store.apply(arrival.inverse())?;
            return Err(err);
        }
        dest.journal.record(arrival);
        log::debug!("moved {id} from `{}` to `{}` as {new_id}", self.name, dest.name);
        self.reconciler.sync(&self.store, origin_adapter);
        dest.reconciler.sync(&dest.store, dest_adapter);
        Ok(Some(new_id))
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    /// Copy the live widgets among `ids`. Returns how many were copied.
    pub fn copy(&self, ids: &[WidgetId], clipboard: &mut Clipboard) -> usize {
        let records: Vec<&WidgetRecord> = self.live(ids).collect();
        clipboard.fill(records.iter().copied());
        records.len()
    }

    pub fn cut(&mut self, ids: &[WidgetId], clipboard: &mut Clipboard) -> DashboardResult<usize> {
        if self.copy(ids, clipboard) == 0 {
            return Ok(0);
        }
        let ops: Vec<LayoutOp> = self.live(ids).map(|r| LayoutOp::Delete(r.id)).collect();
        let count = ops.len();
        self.perform(LayoutOp::batch(ops), "Cut")?;
        Ok(count)
    }

    /// Insert copies of the clipboard contents, offset so they do not
    /// cover the originals. Returns the new ids.
    pub fn paste(&mut self, clipboard: &Clipboard) -> DashboardResult<Vec<WidgetId>> {
        let offset = self.config.paste_offset();
        let records: Vec<WidgetRecord> = clipboard
            .entries()
            .iter()
            .map(|entry| {
                let shifted = Position {
                    left: entry.position.left + offset,
                    top: entry.position.top + offset,
                    ..entry.position
                };
                WidgetRecord::new(WidgetId::fresh(), entry.source.clone(), shifted)
            })
            .collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<WidgetId> = records.iter().map(|r| r.id).collect();
        let ops = insertion_ops(&self.store, &self.config, records);
        self.perform(LayoutOp::batch(ops), "Paste")?;
        Ok(ids)
    }

    /// Run a keyboard action against the host's selection and clipboard.
    pub fn dispatch(
        &mut self,
        action: ShortcutAction,
        selection: &mut Vec<WidgetId>,
        clipboard: &mut Clipboard,
    ) -> DashboardResult<()> {
        match action {
            ShortcutAction::Undo => {
                self.undo()?;
            }
            ShortcutAction::Redo => {
                self.redo()?;
            }
            ShortcutAction::Copy => {
                self.copy(selection, clipboard);
            }
            ShortcutAction::Cut => {
                self.cut(selection, clipboard)?;
                selection.clear();
            }
            ShortcutAction::Paste => {
                *selection = self.paste(clipboard)?;
            }
            ShortcutAction::Delete => {
                self.delete_widgets(selection)?;
                selection.clear();
            }
            ShortcutAction::ToggleGrid => {
                self.config.mode = match self.config.mode {
                    LayoutMode::Free => LayoutMode::Grid,
                    LayoutMode::Grid => LayoutMode::Free,
                };
            }
            ShortcutAction::Deselect => selection.clear(),
        }
        Ok(())
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Snapshot live widgets in file form, ordered top-to-bottom.
    pub fn to_file<P: PathResolver + ?Sized>(&self, paths: &P) -> DashboardFile {
        let mut file = DashboardFile::new(self.name.clone(), self.config.width, self.config.height);
        let mut records: Vec<&WidgetRecord> = self.store.get_widgets().collect();
        records.sort_by(|a, b| {
            a.position
                .top
                .total_cmp(&b.position.top)
                .then(a.position.left.total_cmp(&b.position.left))
                .then(a.id.cmp(&b.id))
        });
        for record in records {
            let container = &record.source.container;
            if let Some(path) = paths.path_for(container) {
                file.paths.insert(path, container.clone());
            }
            file.outputs
                .entry(container.clone())
                .or_default()
                .push(OutputEntry {
                    cell_id: record.source.item.clone(),
                    top: record.position.top,
                    left: record.position.left,
                    width: record.position.width,
                    height: record.position.height,
                });
        }
        file
    }

    /// Write to the dashboard's current path and mark it clean.
    pub fn save<F, P>(&mut self, fs: &mut F, paths: &P) -> DashboardResult<()>
    where
        F: FileIo + ?Sized,
        P: PathResolver + ?Sized,
    {
        let path = self.path.clone().ok_or(DashboardError::NoPath)?;
        let file = self.to_file(paths);
        fs.write(&path, &file.to_json())?;
        self.store.clear_all_changed();
        log::debug!("saved `{}` to {path}: {} widget(s)", self.name, file.output_count());
        Ok(())
    }

    pub fn save_as<F, P>(&mut self, path: &str, fs: &mut F, paths: &P) -> DashboardResult<()>
    where
        F: FileIo + ?Sized,
        P: PathResolver + ?Sized,
    {
        self.path = Some(path.to_string());
        self.save(fs, paths)
    }

    /// Move the backing file. The in-memory state is untouched.
    pub fn rename<F: FileIo + ?Sized>(
        &mut self,
        new_path: &str,
        fs: &mut F,
    ) -> DashboardResult<()> {
        let old = self.path.as_deref().ok_or(DashboardError::NoPath)?;
        fs.rename(old, new_path)?;
        self.path = Some(new_path.to_string());
        Ok(())
    }

    /// Read and validate a dashboard file and build a clean dashboard.
    ///
    /// Validation errors abort before any record exists. Container ids in
    /// the file are re-mapped through `paths` so content that was reopened
    /// under a new id still resolves; items `content` cannot resolve become
    /// placeholders flagged `missing`.
    pub fn load<F, P, C>(
        path: &str,
        fs: &F,
        paths: &P,
        content: &C,
        config: LayoutConfig,
    ) -> DashboardResult<Self>
    where
        F: FileIo + ?Sized,
        P: PathResolver + ?Sized,
        C: ContentResolver + ?Sized,
    {
        let text = fs
            .read(path)
            .map_err(|err| LoadError::Io(format!("{path}: {err}")))?;
        let file = parse_dashboard(&text)?;

        let config = LayoutConfig {
            width: file.dashboard_width,
            height: file.dashboard_height,
            ..config
        };
        let mut dash = Dashboard::new(file.name.clone(), config);
        dash.path = Some(path.to_string());

        let remap: HashMap<&str, String> = file
            .paths
            .iter()
            .filter_map(|(p, saved_id)| paths.id_for(p).map(|live| (saved_id.as_str(), live)))
            .collect();

        let mut missing = 0usize;
        dash.store.begin_transaction()?;
        for (saved_id, entries) in &file.outputs {
            let container = remap
                .get(saved_id.as_str())
                .cloned()
                .unwrap_or_else(|| saved_id.clone());
            for entry in entries {
                let unresolved = content.resolve(&container, &entry.cell_id).is_none();
                if unresolved {
                    log::warn!(
                        "{container}/{}: content not found, loading placeholder",
                        entry.cell_id
                    );
                    missing += 1;
                }
                let info = WidgetInfo {
                    id: None,
                    source: SourceRef::new(container.clone(), entry.cell_id.clone()),
                    position: dash.config.clamp(entry.position()),
                    missing: unresolved,
                };
                if let Err(err) = dash.store.add_widget(info) {
                    dash.store.cancel_transaction()?;
                    return Err(err.into());
                }
            }
        }
        dash.store.end_transaction()?;
        dash.store.clear_all_changed();

        log::debug!(
            "loaded `{}` from {path}: {} widget(s), {missing} missing",
            dash.name,
            dash.store.len()
        );
        Ok(dash)
    }
}
