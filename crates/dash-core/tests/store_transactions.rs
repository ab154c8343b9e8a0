//! Integration tests: transaction brackets and observer delivery
//! (dash-core).

use dash_core::error::StoreError;
use dash_core::id::{SourceRef, WidgetId};
use dash_core::model::{FieldValue, Position, PositionPatch, WidgetInfo};
use dash_core::store::WidgetStore;
use dash_core::transaction::{ChangeKind, ChangeSet, Subscription};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn widget(name: &str) -> WidgetInfo {
    WidgetInfo::new(
        SourceRef::new("nb", name),
        Position::new(0.0, 0.0, 100.0, 100.0),
    )
    .with_id(WidgetId::intern(name))
}

type Log = Rc<RefCell<Vec<(&'static str, u64)>>>;

fn tagged(store: &WidgetStore, log: &Log, tag: &'static str) -> Subscription {
    let sink = Rc::clone(log);
    store.subscribe(move |cs: &ChangeSet| sink.borrow_mut().push((tag, cs.seq)))
}

// ─── Brackets ───────────────────────────────────────────────────────────

#[test]
fn bracket_commits_atomically() {
    init_logging();
    let mut store = WidgetStore::default();
    let a = store.add_widget(widget("tx_atomic_a")).unwrap();
    let log: Log = Rc::default();
    let _sub = tagged(&store, &log, "obs");

    store.begin_transaction().unwrap();
    store.set_field(a, "left", FieldValue::Number(40.0)).unwrap();
    let b = store.add_widget(widget("tx_atomic_b")).unwrap();
    store.delete_widget(a).unwrap();
    // Staged writes are not visible before commit
    assert_eq!(store.get_widget_info(a).unwrap().position.left, 0.0);
    assert!(store.get_widget_info(b).is_none());

    let change = store.end_transaction().unwrap().unwrap();
    assert_eq!(change.kind_of(a), Some(ChangeKind::Removed));
    assert_eq!(change.kind_of(b), Some(ChangeKind::Added));
    assert_eq!(log.borrow().len(), 1);

    let tomb = store.get_widget_info(a).unwrap();
    assert!(tomb.removed);
    assert_eq!(tomb.position.left, 40.0);
}

#[test]
fn rejected_bracket_broadcasts_nothing() {
    init_logging();
    let mut store = WidgetStore::default();
    let a = store.add_widget(widget("tx_reject")).unwrap();
    let seq = store.seq();
    let log: Log = Rc::default();
    let _sub = tagged(&store, &log, "obs");

    store.begin_transaction().unwrap();
    store.update_widget(a, &PositionPatch::moved_to(5.0, 5.0)).unwrap();
    store.set_field(a, "colour", FieldValue::Number(1.0)).unwrap();
    let err = store.end_transaction().unwrap_err();

    assert_eq!(
        err,
        StoreError::UnknownField {
            id: a,
            field: "colour".into()
        }
    );
    assert!(!store.in_transaction());
    assert_eq!(store.seq(), seq);
    assert_eq!(store.get_widget_info(a).unwrap().position.left, 0.0);
    assert!(log.borrow().is_empty());
}

#[test]
fn empty_and_cancelled_brackets_are_silent() {
    init_logging();
    let mut store = WidgetStore::default();
    let a = store.add_widget(widget("tx_empty")).unwrap();
    let log: Log = Rc::default();
    let _sub = tagged(&store, &log, "obs");

    store.begin_transaction().unwrap();
    assert_eq!(store.end_transaction().unwrap(), None);

    store.begin_transaction().unwrap();
    store.delete_widget(a).unwrap();
    store.cancel_transaction().unwrap();
    assert!(!store.get_widget_info(a).unwrap().removed);
    assert!(log.borrow().is_empty());
}

#[test]
fn misuse_is_reported_at_the_call() {
    let mut store = WidgetStore::default();
    let a = store.add_widget(widget("tx_misuse")).unwrap();
    assert_eq!(
        store.set_field(a, "left", FieldValue::Number(1.0)),
        Err(StoreError::NoTransaction)
    );
    assert_eq!(store.end_transaction(), Err(StoreError::NoTransaction));
    assert_eq!(store.cancel_transaction(), Err(StoreError::NoTransaction));
}

// ─── Observers ──────────────────────────────────────────────────────────

#[test]
fn observers_run_in_subscription_order() {
    init_logging();
    let mut store = WidgetStore::default();
    let log: Log = Rc::default();
    let _first = tagged(&store, &log, "first");
    let _second = tagged(&store, &log, "second");

    store.add_widget(widget("obs_order")).unwrap();
    let seq = store.seq();
    assert_eq!(*log.borrow(), vec![("first", seq), ("second", seq)]);
}

#[test]
fn observer_disposed_mid_broadcast_is_skipped() {
    init_logging();
    let mut store = WidgetStore::default();
    let log: Log = Rc::default();

    let victim: Rc<RefCell<Option<Subscription>>> = Rc::default();
    let held = Rc::clone(&victim);
    let _killer = store.subscribe(move |_| {
        held.borrow_mut().take();
    });
    *victim.borrow_mut() = Some(tagged(&store, &log, "victim"));
    assert_eq!(store.observer_count(), 2);

    store.add_widget(widget("obs_dispose")).unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(store.observer_count(), 1);
}

#[test]
fn subscription_outliving_store_is_harmless() {
    let store = WidgetStore::default();
    let log: Log = Rc::default();
    let sub = tagged(&store, &log, "late");
    drop(store);
    sub.dispose();
}
