//! Store mutations as values.
//!
//! A `LayoutOp` describes one change to the record store. Every op has an
//! inverse computed from the store state just before it runs; the pair is
//! what the undo journal stores.

use dash_core::error::StoreResult;
use dash_core::id::WidgetId;
use dash_core::model::{Position, PositionPatch, WidgetInfo, WidgetRecord};
use dash_core::store::WidgetStore;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOp {
    /// Create a record, or revive its own tombstone.
    Insert(Box<WidgetRecord>),
    Update { id: WidgetId, patch: PositionPatch },
    Delete(WidgetId),
    Restore(WidgetId),
    /// Applied inside one transaction, so one notification.
    Batch(Vec<LayoutOp>),
}

impl LayoutOp {
    pub fn insert(record: WidgetRecord) -> Self {
        Self::Insert(Box::new(record))
    }

    /// Collapse a list of ops: one op stays bare, several become a batch.
    pub fn batch(mut ops: Vec<LayoutOp>) -> Self {
        if ops.len() == 1 {
            ops.remove(0)
        } else {
            Self::Batch(ops)
        }
    }
}

/// Apply `op` to `store` as one transaction.
///
/// Joins the caller's bracket when one is already open.
pub fn apply_op(store: &mut WidgetStore, op: &LayoutOp) -> StoreResult<()> {
    if store.in_transaction() {
        return apply_staged(store, op);
    }
    store.begin_transaction()?;
    if let Err(err) = apply_staged(store, op) {
        store.cancel_transaction()?;
        return Err(err);
    }
    store.end_transaction().map(|_| ())
}

fn apply_staged(store: &mut WidgetStore, op: &LayoutOp) -> StoreResult<()> {
    match op {
        LayoutOp::Insert(record) => {
            let info = WidgetInfo {
                id: Some(record.id),
                source: record.source.clone(),
                position: record.position,
                missing: record.missing,
            };
            store.add_widget(info).map(|_| ())
        }
        LayoutOp::Update { id, patch } => store.update_widget(*id, patch),
        LayoutOp::Delete(id) => store.delete_widget(*id),
        LayoutOp::Restore(id) => store.restore_widget(*id),
        LayoutOp::Batch(ops) => ops.iter().try_for_each(|op| apply_staged(store, op)),
    }
}

/// Compute the op that undoes `op`, given the store as it is before `op`.
pub fn inverse_of(store: &WidgetStore, op: &LayoutOp) -> LayoutOp {
    let mut shadow = Shadow::default();
    inverse_with(store, op, &mut shadow)
}

/// Positions and tombstone states as earlier ops of the same batch leave
/// them, so later ops in the batch invert against the right state.
#[derive(Default)]
struct Shadow {
    positions: HashMap<WidgetId, Position>,
    removed: HashMap<WidgetId, bool>,
}

impl Shadow {
    fn position(&self, store: &WidgetStore, id: WidgetId) -> Option<Position> {
        self.positions
            .get(&id)
            .copied()
            .or_else(|| store.get_widget_info(id).map(|r| r.position))
    }

    fn removed(&self, store: &WidgetStore, id: WidgetId) -> Option<bool> {
        self.removed
            .get(&id)
            .copied()
            .or_else(|| store.get_widget_info(id).map(|r| r.removed))
    }
}

fn inverse_with(store: &WidgetStore, op: &LayoutOp, shadow: &mut Shadow) -> LayoutOp {
    match op {
        LayoutOp::Insert(record) => {
            shadow.positions.insert(record.id, record.position);
            shadow.removed.insert(record.id, false);
            LayoutOp::Delete(record.id)
        }
        LayoutOp::Update { id, patch } => match shadow.position(store, *id) {
            Some(old) => {
                shadow.positions.insert(*id, old.merged(patch));
                LayoutOp::Update {
                    id: *id,
                    patch: patch.inverse_against(&old),
                }
            }
            // Unknown id: the forward op fails, nothing to undo
            None => op.clone(),
        },
        LayoutOp::Delete(id) => match shadow.removed(store, *id) {
            Some(false) => {
                shadow.removed.insert(*id, true);
                LayoutOp::Restore(*id)
            }
            _ => op.clone(),
        },
        LayoutOp::Restore(id) => match shadow.removed(store, *id) {
            Some(true) => {
                shadow.removed.insert(*id, false);
                LayoutOp::Delete(*id)
            }
            _ => op.clone(),
        },
        LayoutOp::Batch(ops) => {
            let mut inverses: Vec<LayoutOp> =
                ops.iter().map(|op| inverse_with(store, op, shadow)).collect();
            inverses.reverse();
            LayoutOp::Batch(inverses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::id::SourceRef;
    use pretty_assertions::assert_eq;

    fn seeded(name: &str) -> (WidgetStore, WidgetId) {
        let mut store = WidgetStore::default();
        let id = store
            .add_widget(
                WidgetInfo::new(
                    SourceRef::new("nb", name),
                    Position::new(10.0, 10.0, 200.0, 150.0),
                )
                .with_id(WidgetId::intern(name)),
            )
            .unwrap();
        (store, id)
    }

    #[test]
    fn update_inverse_restores_only_touched_fields() {
        let (mut store, id) = seeded("ops_upd");
        let op = LayoutOp::Update {
            id,
            patch: PositionPatch::moved_to(50.0, 50.0),
        };
        let inv = inverse_of(&store, &op);
        apply_op(&mut store, &op).unwrap();
        apply_op(&mut store, &inv).unwrap();
        assert_eq!(
            store.get_widget_info(id).unwrap().position,
            Position::new(10.0, 10.0, 200.0, 150.0)
        );
    }

    #[test]
    fn delete_inverse_is_restore() {
        let (store, id) = seeded("ops_del");
        assert_eq!(
            inverse_of(&store, &LayoutOp::Delete(id)),
            LayoutOp::Restore(id)
        );
    }

    #[test]
    fn batch_inverse_accounts_for_earlier_ops() {
        let (mut store, id) = seeded("ops_batch");
        let op = LayoutOp::Batch(vec![
            LayoutOp::Update {
                id,
                patch: PositionPatch::moved_to(20.0, 20.0),
            },
            LayoutOp::Update {
                id,
                patch: PositionPatch::moved_to(30.0, 30.0),
            },
        ]);
        let inv = inverse_of(&store, &op);
        apply_op(&mut store, &op).unwrap();
        assert_eq!(store.get_widget_info(id).unwrap().position.left, 30.0);
        apply_op(&mut store, &inv).unwrap();
        assert_eq!(store.get_widget_info(id).unwrap().position.left, 10.0);
    }

    #[test]
    fn failing_batch_leaves_store_untouched() {
        let (mut store, id) = seeded("ops_fail");
        let seq = store.seq();
        let op = LayoutOp::Batch(vec![
            LayoutOp::Update {
                id,
                patch: PositionPatch::moved_to(99.0, 99.0),
            },
            LayoutOp::Delete(WidgetId::intern("ops_nobody")),
        ]);
        assert!(apply_op(&mut store, &op).is_err());
        assert_eq!(store.seq(), seq);
        assert_eq!(store.get_widget_info(id).unwrap().position.left, 10.0);
        assert!(!store.in_transaction());
    }

    #[test]
    fn insert_over_own_tombstone_revives() {
        let (mut store, id) = seeded("ops_revive");
        let record = store.get_widget_info(id).unwrap().clone();
        apply_op(&mut store, &LayoutOp::Delete(id)).unwrap();
        apply_op(&mut store, &LayoutOp::insert(record)).unwrap();
        assert!(!store.get_widget_info(id).unwrap().removed);
    }
}
