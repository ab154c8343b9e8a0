//! Undo/Redo journal.
//!
//! Every mutation is wrapped in an `UndoableAction` holding the forward op
//! and its inverse. `perform` runs the forward op and pushes the action;
//! undo pops it and runs the inverse. Both stacks are bounded: pushing onto
//! a full stack silently evicts the oldest entry.

use crate::ops::{LayoutOp, apply_op, inverse_of};
use dash_core::error::StoreError;
use dash_core::store::WidgetStore;
use std::collections::VecDeque;

/// Default depth of each stack.
pub const DEFAULT_CAPACITY: usize = 10;

/// Something a journal can run ops against.
pub trait Target<Op> {
    type Error;

    fn apply(&mut self, op: &Op) -> Result<(), Self::Error>;
}

impl Target<LayoutOp> for WidgetStore {
    type Error = StoreError;

    fn apply(&mut self, op: &LayoutOp) -> Result<(), StoreError> {
        apply_op(self, op)
    }
}

/// A forward op paired with the op that reverses it. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoableAction<Op> {
    forward: Op,
    inverse: Op,
    description: String,
}

impl<Op> UndoableAction<Op> {
    pub fn new(forward: Op, inverse: Op, description: impl Into<String>) -> Self {
        Self {
            forward,
            inverse,
            description: description.into(),
        }
    }

    pub fn forward(&self) -> &Op {
        &self.forward
    }

    pub fn inverse(&self) -> &Op {
        &self.inverse
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl UndoableAction<LayoutOp> {
    /// Build an action from `forward`, taking the inverse from the store's
    /// current state.
    pub fn capture(store: &WidgetStore, forward: LayoutOp, description: &str) -> Self {
        let inverse = inverse_of(store, &forward);
        Self::new(forward, inverse, description)
    }
}

/// Bounded two-stack history.
pub struct Journal<Op> {
    undo_stack: VecDeque<UndoableAction<Op>>,
    redo_stack: VecDeque<UndoableAction<Op>>,
    capacity: usize,
}

impl<Op> Default for Journal<Op> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<Op> Journal<Op> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            undo_stack: VecDeque::with_capacity(capacity),
            redo_stack: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `action`'s forward op and record it. A fresh action discards
    /// any redo history. Nothing is recorded if the op fails.
    pub fn perform<T>(&mut self, target: &mut T, action: UndoableAction<Op>) -> Result<(), T::Error>
    where
        T: Target<Op>,
    {
        target.apply(&action.forward)?;
        log::debug!("perform: {}", action.description);
        self.record(action);
        Ok(())
    }

    /// Push an action whose forward op the caller already applied.
    pub fn record(&mut self, action: UndoableAction<Op>) {
        self.redo_stack.clear();
        push_bounded(&mut self.undo_stack, action, self.capacity);
    }

    /// Reverse the most recent action. Returns its description, or `None`
    /// when there is nothing to undo. On failure the stacks are unchanged.
    pub fn undo<T>(&mut self, target: &mut T) -> Result<Option<String>, T::Error>
    where
        T: Target<Op>,
    {
        let Some(action) = self.undo_stack.pop_back() else {
            return Ok(None);
        };
        if let Err(err) = target.apply(&action.inverse) {
            self.undo_stack.push_back(action);
            return Err(err);
        }
        log::debug!("undo: {}", action.description);
        let desc = action.description.clone();
        push_bounded(&mut self.redo_stack, action, self.capacity);
        Ok(Some(desc))
    }

    /// Re-apply the most recently undone action.
    pub fn redo<T>(&mut self, target: &mut T) -> Result<Option<String>, T::Error>
    where
        T: Target<Op>,
    {
        let Some(action) = self.redo_stack.pop_back() else {
            return Ok(None);
        };
        if let Err(err) = target.apply(&action.forward) {
            self.redo_stack.push_back(action);
            return Err(err);
        }
        log::debug!("redo: {}", action.description);
        let desc = action.description.clone();
        push_bounded(&mut self.undo_stack, action, self.capacity);
        Ok(Some(desc))
    }

    pub fn has_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn has_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Description of the action `undo` would reverse next.
    pub fn peek_undo(&self) -> Option<&str> {
        self.undo_stack.back().map(|a| a.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn push_bounded<Op>(
    stack: &mut VecDeque<UndoableAction<Op>>,
    action: UndoableAction<Op>,
    cap: usize,
) {
    if stack.len() >= cap {
        stack.pop_front();
    }
    stack.push_back(action);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Integer register; ops are signed deltas, `i64::MIN` fails.
    #[derive(Default)]
    struct Counter(i64);

    impl Target<i64> for Counter {
        type Error = &'static str;

        fn apply(&mut self, op: &i64) -> Result<(), &'static str> {
            if *op == i64::MIN {
                return Err("poisoned op");
            }
            self.0 += op;
            Ok(())
        }
    }

    fn add(n: i64) -> UndoableAction<i64> {
        UndoableAction::new(n, -n, format!("add {n}"))
    }

    #[test]
    fn undo_redo_roundtrip() {
        let mut counter = Counter::default();
        let mut journal = Journal::new(10);
        journal.perform(&mut counter, add(5)).unwrap();
        assert_eq!(counter.0, 5);

        assert_eq!(journal.undo(&mut counter).unwrap().as_deref(), Some("add 5"));
        assert_eq!(counter.0, 0);
        assert_eq!(journal.redo(&mut counter).unwrap().as_deref(), Some("add 5"));
        assert_eq!(counter.0, 5);
    }

    #[test]
    fn empty_stacks_are_no_ops() {
        let mut counter = Counter::default();
        let mut journal: Journal<i64> = Journal::default();
        assert_eq!(journal.undo(&mut counter), Ok(None));
        assert_eq!(journal.redo(&mut counter), Ok(None));
        assert!(!journal.has_undo());
        assert!(!journal.has_redo());
    }

    #[test]
    fn fresh_action_clears_redo() {
        let mut counter = Counter::default();
        let mut journal = Journal::new(10);
        journal.perform(&mut counter, add(1)).unwrap();
        journal.undo(&mut counter).unwrap();
        assert!(journal.has_redo());
        journal.perform(&mut counter, add(2)).unwrap();
        assert!(!journal.has_redo());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut counter = Counter::default();
        let mut journal = Journal::new(3);
        for n in 1..=4 {
            journal.perform(&mut counter, add(n)).unwrap();
        }
        assert_eq!(journal.undo_len(), 3);
        while journal.undo(&mut counter).unwrap().is_some() {}
        // add 1 was evicted and can never be reversed
        assert_eq!(counter.0, 1);
        assert_eq!(journal.redo_len(), 3);
    }

    #[test]
    fn strict_lifo_order() {
        let mut counter = Counter::default();
        let mut journal = Journal::new(10);
        journal.perform(&mut counter, add(1)).unwrap();
        journal.perform(&mut counter, add(10)).unwrap();
        assert_eq!(journal.peek_undo(), Some("add 10"));
        assert_eq!(journal.undo(&mut counter).unwrap().as_deref(), Some("add 10"));
        assert_eq!(journal.undo(&mut counter).unwrap().as_deref(), Some("add 1"));
    }

    #[test]
    fn failed_perform_records_nothing() {
        let mut counter = Counter::default();
        let mut journal = Journal::new(10);
        journal.perform(&mut counter, add(1)).unwrap();
        journal.undo(&mut counter).unwrap();
        let poisoned = UndoableAction::new(i64::MIN, 0, "bad");
        assert!(journal.perform(&mut counter, poisoned).is_err());
        assert_eq!(journal.undo_len(), 0);
        // redo history survives a rejected action
        assert!(journal.has_redo());
    }

    #[test]
    fn record_pushes_without_applying() {
        let mut counter = Counter::default();
        let mut journal = Journal::new(10);
        journal.perform(&mut counter, add(2)).unwrap();
        journal.undo(&mut counter).unwrap();
        assert!(journal.has_redo());

        counter.0 += 7;
        journal.record(add(7));
        assert_eq!(counter.0, 7);
        assert!(!journal.has_redo());
        assert_eq!(journal.undo(&mut counter).unwrap().as_deref(), Some("add 7"));
        assert_eq!(counter.0, 0);
    }

    #[test]
    fn failed_undo_keeps_action() {
        let mut counter = Counter::default();
        let mut journal = Journal::new(10);
        journal
            .perform(&mut counter, UndoableAction::new(1, i64::MIN, "one-way"))
            .unwrap();
        assert!(journal.undo(&mut counter).is_err());
        assert_eq!(journal.undo_len(), 1);
        assert_eq!(journal.redo_len(), 0);
    }
}
