//! Transaction staging and change notification.
//!
//! Writes issued between `begin_transaction` and `end_transaction` are
//! staged here and only become visible when the whole bracket validates.
//! Each successful commit produces one [`ChangeSet`] that is broadcast to
//! every live [`Subscription`].

use crate::id::WidgetId;
use crate::model::{FieldValue, WidgetRecord};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

// ─── Staging ─────────────────────────────────────────────────────────────

/// One staged write.
#[derive(Debug, Clone)]
pub(crate) enum StagedWrite {
    Insert(WidgetRecord),
    Set {
        id: WidgetId,
        field: String,
        value: FieldValue,
    },
}

/// Writes collected by an open transaction, in issue order.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    pub(crate) writes: Vec<StagedWrite>,
}

impl Pending {
    /// Tombstone state of `id` as seen by the staged writes, newest first.
    /// `None` if no staged write decides it.
    pub(crate) fn removed_state(&self, id: WidgetId) -> Option<bool> {
        self.writes.iter().rev().find_map(|w| match w {
            StagedWrite::Insert(r) if r.id == id => Some(false),
            StagedWrite::Set {
                id: wid,
                field,
                value: FieldValue::Bool(b),
            } if *wid == id && field == "removed" => Some(*b),
            _ => None,
        })
    }
}

// ─── Change sets ─────────────────────────────────────────────────────────

/// Consolidated effect of one commit on one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
    Restored,
}

/// Immutable summary of one committed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    /// Commit sequence number, strictly increasing per store.
    pub seq: u64,
    /// Each affected record exactly once.
    pub entries: SmallVec<[(WidgetId, ChangeKind); 4]>,
}

impl ChangeSet {
    pub fn ids(&self) -> impl Iterator<Item = WidgetId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn kind_of(&self, id: WidgetId) -> Option<ChangeKind> {
        self.entries
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, k)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Observers ───────────────────────────────────────────────────────────

type Callback = Box<dyn FnMut(&ChangeSet)>;

#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Callback)>>,
    notifying: Cell<bool>,
    /// Ids disposed while a broadcast was running.
    dropped: RefCell<Vec<u64>>,
}

impl ObserverList {
    pub(crate) fn subscribe(self: &Rc<Self>, callback: Callback) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, callback));
        Subscription {
            list: Rc::downgrade(self),
            id,
        }
    }

    fn remove(&self, id: u64) {
        self.entries.borrow_mut().retain(|(eid, _)| *eid != id);
        if self.notifying.get() {
            self.dropped.borrow_mut().push(id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Deliver `change` to every observer in subscription order.
    ///
    /// Callbacks may subscribe or dispose during delivery; new observers
    /// start with the next commit.
    pub(crate) fn broadcast(&self, change: &ChangeSet) {
        let mut running = std::mem::take(&mut *self.entries.borrow_mut());
        self.notifying.set(true);
        for (id, callback) in running.iter_mut() {
            if self.dropped.borrow().contains(id) {
                continue;
            }
            callback(change);
        }
        self.notifying.set(false);

        let dropped = std::mem::take(&mut *self.dropped.borrow_mut());
        running.retain(|(id, _)| !dropped.contains(id));
        let mut entries = self.entries.borrow_mut();
        running.append(&mut entries);
        *entries = running;
    }
}

/// Disposer handle returned by `subscribe`. The observer stays registered
/// until this is dropped or disposed.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    list: Weak<ObserverList>,
    id: u64,
}

impl Subscription {
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
