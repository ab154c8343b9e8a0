//! Transactional widget record store.
//!
//! The store is the single source of truth for widget placements. Every
//! mutation goes through a transaction: either an explicit
//! `begin_transaction`/`end_transaction` bracket, or the implicit one each
//! of `add_widget`, `update_widget` and `delete_widget` opens when called
//! outside a bracket. A bracket commits all of its writes or none of them.

use crate::error::{StoreError, StoreResult};
use crate::id::WidgetId;
use crate::model::{Field, FieldValue, Position, PositionPatch, WidgetInfo, WidgetRecord};
use crate::transaction::{ChangeKind, ChangeSet, ObserverList, Pending, StagedWrite, Subscription};
use std::collections::HashMap;
use std::rc::Rc;

/// Smallest width/height a record may commit with, unless configured.
pub const DEFAULT_MIN_SIZE: f64 = 10.0;

pub struct WidgetStore {
    records: HashMap<WidgetId, WidgetRecord>,
    pending: Option<Pending>,
    min_width: f64,
    min_height: f64,
    seq: u64,
    observers: Rc<ObserverList>,
}

impl Default for WidgetStore {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIZE, DEFAULT_MIN_SIZE)
    }
}

impl WidgetStore {
    pub fn new(min_width: f64, min_height: f64) -> Self {
        Self {
            records: HashMap::new(),
            pending: None,
            min_width,
            min_height,
            seq: 0,
            observers: Rc::new(ObserverList::default()),
        }
    }

    pub fn min_size(&self) -> (f64, f64) {
        (self.min_width, self.min_height)
    }

    /// Sequence number of the last commit (0 before the first).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    // ─── Transactions ────────────────────────────────────────────────────

    pub fn begin_transaction(&mut self) -> StoreResult<()> {
        if self.pending.is_some() {
            return Err(StoreError::NestedTransaction);
        }
        self.pending = Some(Pending::default());
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    /// Validate and commit the open bracket.
    ///
    /// Returns the broadcast change set, or `None` when the bracket staged
    /// no writes (nothing is broadcast then). On error the bracket is
    /// discarded and the store is exactly as it was before `begin`.
    pub fn end_transaction(&mut self) -> StoreResult<Option<ChangeSet>> {
        let pending = self.pending.take().ok_or(StoreError::NoTransaction)?;
        if pending.writes.is_empty() {
            return Ok(None);
        }
        let (staged, inserted) = match self.stage(&pending) {
            Ok(staged) => staged,
            Err(err) => {
                log::debug!("transaction rejected: {err}");
                return Err(err);
            }
        };

        let mut change = ChangeSet {
            seq: self.seq + 1,
            entries: Default::default(),
        };
        let mut ids: Vec<WidgetId> = staged.keys().copied().collect();
        ids.sort();
        for id in ids {
            let after = staged[&id].removed;
            let kind = match self.records.get(&id).map(|r| r.removed) {
                None => ChangeKind::Added,
                Some(true) if inserted.contains(&id) => ChangeKind::Added,
                Some(false) if after => ChangeKind::Removed,
                Some(true) if !after => ChangeKind::Restored,
                _ => ChangeKind::Updated,
            };
            change.entries.push((id, kind));
        }

        self.records.extend(staged);
        self.seq = change.seq;
        log::debug!(
            "commit #{}: {} record(s) {:?}",
            change.seq,
            change.len(),
            change.entries
        );
        self.observers.broadcast(&change);
        Ok(Some(change))
    }

    /// Discard the open bracket without committing anything.
    pub fn cancel_transaction(&mut self) -> StoreResult<()> {
        self.pending
            .take()
            .map(|_| ())
            .ok_or(StoreError::NoTransaction)
    }

    /// Replay staged writes over copies of the touched records.
    fn stage(
        &self,
        pending: &Pending,
    ) -> StoreResult<(HashMap<WidgetId, WidgetRecord>, Vec<WidgetId>)> {
        let mut staged: HashMap<WidgetId, WidgetRecord> = HashMap::new();
        let mut inserted = Vec::new();
        let mut explicit_dirty: HashMap<WidgetId, bool> = HashMap::new();

        for write in &pending.writes {
            match write {
                StagedWrite::Insert(record) => {
                    let live = staged
                        .get(&record.id)
                        .or_else(|| self.records.get(&record.id))
                        .is_some_and(|r| !r.removed);
                    if live {
                        return Err(StoreError::DuplicateId(record.id));
                    }
                    if let Some(field) = non_finite_field(&record.position) {
                        return Err(StoreError::NonFinite {
                            id: record.id,
                            field,
                        });
                    }
                    staged.insert(record.id, record.clone());
                    inserted.push(record.id);
                }
                StagedWrite::Set { id, field, value } => {
                    let id = *id;
                    let field = Field::from_name(field).ok_or_else(|| StoreError::UnknownField {
                        id,
                        field: field.clone(),
                    })?;
                    if !staged.contains_key(&id) {
                        let current =
                            self.records.get(&id).ok_or(StoreError::NotFound(id))?;
                        staged.insert(id, current.clone());
                    }
                    let Some(record) = staged.get_mut(&id) else {
                        return Err(StoreError::NotFound(id));
                    };
                    apply_field(record, field, *value)?;
                    if field == Field::Changed {
                        explicit_dirty.insert(id, record.changed);
                    }
                }
            }
        }

        for (id, record) in staged.iter_mut() {
            record.changed = explicit_dirty.get(id).copied().unwrap_or(true);
            if record.removed {
                continue;
            }
            let pos = &record.position;
            if pos.width < self.min_width {
                return Err(StoreError::BelowMinimum {
                    id: *id,
                    field: "width",
                    value: pos.width,
                    min: self.min_width,
                });
            }
            if pos.height < self.min_height {
                return Err(StoreError::BelowMinimum {
                    id: *id,
                    field: "height",
                    value: pos.height,
                    min: self.min_height,
                });
            }
        }
        Ok((staged, inserted))
    }

    /// Queue `writes` in the open bracket, or commit it on its own.
    fn write(&mut self, writes: Vec<StagedWrite>) -> StoreResult<()> {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.writes.extend(writes);
                Ok(())
            }
            None => {
                self.pending = Some(Pending { writes });
                self.end_transaction().map(|_| ())
            }
        }
    }

    /// Tombstone state of `id` as the open bracket sees it.
    fn removed_state(&self, id: WidgetId) -> Option<bool> {
        self.pending
            .as_ref()
            .and_then(|p| p.removed_state(id))
            .or_else(|| self.records.get(&id).map(|r| r.removed))
    }

    // ─── Field-level writes ──────────────────────────────────────────────

    /// Stage one raw field write. Requires an open explicit bracket;
    /// validation happens when the bracket ends.
    pub fn set_field(&mut self, id: WidgetId, field: &str, value: FieldValue) -> StoreResult<()> {
        let pending = self.pending.as_mut().ok_or(StoreError::NoTransaction)?;
        pending.writes.push(StagedWrite::Set {
            id,
            field: field.to_string(),
            value,
        });
        Ok(())
    }

    // ─── Record operations ───────────────────────────────────────────────

    /// Insert a new live record and return its id.
    ///
    /// A tombstoned record with the same id is revived with the new
    /// contents; a live one is a [`StoreError::DuplicateId`].
    pub fn add_widget(&mut self, info: WidgetInfo) -> StoreResult<WidgetId> {
        let record = info.into_record();
        let id = record.id;
        if self.removed_state(id) == Some(false) {
            return Err(StoreError::DuplicateId(id));
        }
        self.write(vec![StagedWrite::Insert(record)])?;
        Ok(id)
    }

    /// Merge `patch` into the record's position. Tombstoned records are
    /// valid targets.
    pub fn update_widget(&mut self, id: WidgetId, patch: &PositionPatch) -> StoreResult<()> {
        if self.removed_state(id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        let writes = patch
            .writes()
            .map(|(field, value)| StagedWrite::Set {
                id,
                field: field.name().to_string(),
                value,
            })
            .collect();
        self.write(writes)
    }

    /// Tombstone a record. Deleting a tombstone again is a no-op.
    pub fn delete_widget(&mut self, id: WidgetId) -> StoreResult<()> {
        match self.removed_state(id) {
            None => Err(StoreError::NotFound(id)),
            Some(true) => Ok(()),
            Some(false) => self.write(vec![set_removed(id, true)]),
        }
    }

    /// Flip a tombstone back to live. Only used to reverse a delete.
    pub fn restore_widget(&mut self, id: WidgetId) -> StoreResult<()> {
        match self.removed_state(id) {
            None => Err(StoreError::NotFound(id)),
            Some(false) => Ok(()),
            Some(true) => self.write(vec![set_removed(id, false)]),
        }
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    /// Live (non-removed) records, in unspecified order.
    pub fn get_widgets(&self) -> impl Iterator<Item = &WidgetRecord> + '_ {
        self.records.values().filter(|r| !r.removed)
    }

    /// Any record by id, tombstones included.
    pub fn get_widget_info(&self, id: WidgetId) -> Option<&WidgetRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.get_widgets().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Dirty tracking ──────────────────────────────────────────────────

    /// Whether any record, tombstones included, changed since the flags
    /// were last cleared.
    pub fn is_dirty(&self) -> bool {
        self.records.values().any(|r| r.changed)
    }

    /// Reset one dirty flag. Not a mutation: nothing is broadcast.
    pub fn clear_changed(&mut self, id: WidgetId) -> StoreResult<()> {
        let record = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.changed = false;
        Ok(())
    }

    pub fn clear_all_changed(&mut self) {
        for record in self.records.values_mut() {
            record.changed = false;
        }
    }

    // ─── Observers ───────────────────────────────────────────────────────

    /// Register `callback` to receive every future change set.
    pub fn subscribe(&self, callback: impl FnMut(&ChangeSet) + 'static) -> Subscription {
        self.observers.subscribe(Box::new(callback))
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

fn set_removed(id: WidgetId, removed: bool) -> StagedWrite {
    StagedWrite::Set {
        id,
        field: Field::Removed.name().to_string(),
        value: FieldValue::Bool(removed),
    }
}

/// First position field holding NaN or an infinity.
fn non_finite_field(pos: &Position) -> Option<&'static str> {
    [
        (Field::Left, pos.left),
        (Field::Top, pos.top),
        (Field::Width, pos.width),
        (Field::Height, pos.height),
    ]
    .into_iter()
    .find(|(_, v)| !v.is_finite())
    .map(|(f, _)| f.name())
}

fn apply_field(record: &mut WidgetRecord, field: Field, value: FieldValue) -> StoreResult<()> {
    let id = record.id;
    match (field, value) {
        (f, FieldValue::Number(n)) if f.is_numeric() => {
            if !n.is_finite() {
                return Err(StoreError::NonFinite { id, field: f.name() });
            }
            let pos = &mut record.position;
            match f {
                Field::Left => pos.left = n,
                Field::Top => pos.top = n,
                Field::Width => pos.width = n,
                _ => pos.height = n,
            }
            Ok(())
        }
        (Field::Removed, FieldValue::Bool(b)) => {
            record.removed = b;
            Ok(())
        }
        (Field::Changed, FieldValue::Bool(b)) => {
            record.changed = b;
            Ok(())
        }
        (f, _) => Err(StoreError::WrongType {
            id,
            field: f.name(),
            expected: if f.is_numeric() { "number" } else { "boolean" },
        }),
    }
}
