//! Bounded undo/redo history over position tables.
//!
//! The history is a linear list of [`PositionSnapshot`]s with a cursor. The
//! cursor is either at the *live edge* (the newest snapshot is current) or at a
//! concrete index after one or more undos. Saving while the cursor is behind
//! the live edge prunes the redo branch.
//!
//! Applying a snapshot is not a user action. While the result of an undo or
//! redo is being applied, [`save`](LayoutHistory::save) is ignored until the
//! owner calls [`finish_applying`](LayoutHistory::finish_applying), which
//! [`DiagramState`](crate::DiagramState) does at the start of the next
//! externally triggered operation.

use std::{collections::VecDeque, time::SystemTime};

use log::{debug, trace};

use keel_core::position::PositionMap;

/// One saved position table. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    positions: PositionMap,
    timestamp: SystemTime,
    label: String,
}

impl PositionSnapshot {
    fn new(positions: PositionMap, label: &str) -> Self {
        Self {
            positions,
            timestamp: SystemTime::now(),
            label: label.to_string(),
        }
    }

    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    /// Wall-clock time the snapshot was recorded.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// What produced the snapshot, e.g. `drag` or `reflow`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Linear, branch-truncating snapshot history.
///
/// # Examples
///
/// ```
/// use keel::LayoutHistory;
/// use keel_core::{geometry::Point, identifier::Id, position::PositionMap};
///
/// let table = |x: f32| -> PositionMap { [(Id::new("a"), Point::new(x, 0.0))].into_iter().collect() };
///
/// let mut history = LayoutHistory::new(10);
/// history.save(&table(1.0), "drag");
/// history.save(&table(2.0), "drag");
///
/// assert_eq!(history.undo(), Some(table(1.0)));
/// history.finish_applying();
/// assert_eq!(history.redo(), Some(table(2.0)));
/// ```
#[derive(Debug, Clone)]
pub struct LayoutHistory {
    snapshots: VecDeque<PositionSnapshot>,
    /// `None` is the live edge.
    cursor: Option<usize>,
    max_snapshots: usize,
    applying: bool,
}

impl LayoutHistory {
    /// Creates an empty history holding at most `max_snapshots` entries.
    ///
    /// A bound of zero is raised to one.
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cursor: None,
            max_snapshots: max_snapshots.max(1),
            applying: false,
        }
    }

    /// Records a copy of `positions` and returns whether it was recorded.
    ///
    /// Ignored while an undo/redo result is being applied. Otherwise drops
    /// every snapshot after the cursor, appends, evicts the oldest entries
    /// beyond the bound and moves the cursor to the live edge.
    pub fn save(&mut self, positions: &PositionMap, label: &str) -> bool {
        if self.applying {
            debug!(label; "Ignoring snapshot while applying history");
            return false;
        }

        if let Some(cursor) = self.cursor {
            let pruned = self.snapshots.len() - (cursor + 1);
            self.snapshots.truncate(cursor + 1);
            debug!(pruned; "Pruned redo branch");
        }

        self.snapshots
            .push_back(PositionSnapshot::new(positions.clone(), label));
        while self.snapshots.len() > self.max_snapshots {
            self.snapshots.pop_front();
        }
        self.cursor = None;

        debug!(label, depth = self.snapshots.len(); "Snapshot saved");
        trace!(positions:?; "Snapshot positions");
        true
    }

    /// Steps back one snapshot and returns its positions.
    ///
    /// Returns `None` unless there is a snapshot before the current one.
    pub fn undo(&mut self) -> Option<PositionMap> {
        let index = self.current_index()?;
        if index == 0 {
            return None;
        }

        self.cursor = Some(index - 1);
        self.applying = true;
        debug!(index = index - 1; "Undo");
        Some(self.snapshots[index - 1].positions.clone())
    }

    /// Steps forward one snapshot and returns its positions.
    ///
    /// Returns `None` at the live edge or at the newest snapshot.
    pub fn redo(&mut self) -> Option<PositionMap> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.snapshots.len() {
            return None;
        }

        self.cursor = Some(cursor + 1);
        self.applying = true;
        debug!(index = cursor + 1; "Redo");
        Some(self.snapshots[cursor + 1].positions.clone())
    }

    /// Removes every snapshot and returns to the live edge.
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
    }

    /// Re-enables [`save`](Self::save) after an undo/redo result was applied.
    pub fn finish_applying(&mut self) {
        self.applying = false;
    }

    /// Returns true while an undo/redo result is being applied.
    pub fn is_applying(&self) -> bool {
        self.applying
    }

    pub fn can_undo(&self) -> bool {
        self.current_index().is_some_and(|index| index > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor + 1 < self.snapshots.len())
    }

    /// Index of the current snapshot; the live edge is the last index.
    pub fn current_index(&self) -> Option<usize> {
        self.cursor.or_else(|| self.snapshots.len().checked_sub(1))
    }

    /// The snapshot the live state is expected to match.
    pub fn current(&self) -> Option<&PositionSnapshot> {
        self.current_index().map(|index| &self.snapshots[index])
    }

    /// Number of recorded snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &PositionSnapshot> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use keel_core::{geometry::Point, identifier::Id};

    use super::*;

    fn table(x: f32) -> PositionMap {
        [
            (Id::new("a"), Point::new(x, 0.0)),
            (Id::new("b"), Point::new(0.0, x)),
        ]
        .into_iter()
        .collect()
    }

    /// Undo followed by the owner's next operation.
    fn undo(history: &mut LayoutHistory) -> Option<PositionMap> {
        history.finish_applying();
        history.undo()
    }

    fn redo(history: &mut LayoutHistory) -> Option<PositionMap> {
        history.finish_applying();
        history.redo()
    }

    #[test]
    fn test_empty_history() {
        let mut history = LayoutHistory::new(10);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), None);
        assert!(history.current().is_none());
        assert!(!history.is_applying());
    }

    #[test]
    fn test_single_snapshot_cannot_undo() {
        let mut history = LayoutHistory::new(10);
        assert!(history.save(&table(1.0), "drag"));
        assert!(!history.can_undo());
        assert_eq!(history.undo(), None);
        assert!(!history.is_applying());
    }

    #[test]
    fn test_undo_redo_walk() {
        let mut history = LayoutHistory::new(10);
        history.save(&table(1.0), "load");
        history.save(&table(2.0), "drag");
        history.save(&table(3.0), "drag");

        assert_eq!(undo(&mut history), Some(table(2.0)));
        assert!(history.can_undo());
        assert!(history.can_redo());
        assert_eq!(undo(&mut history), Some(table(1.0)));
        assert!(!history.can_undo());
        assert_eq!(undo(&mut history), None);

        assert_eq!(redo(&mut history), Some(table(2.0)));
        assert_eq!(redo(&mut history), Some(table(3.0)));
        assert!(!history.can_redo());
        assert_eq!(redo(&mut history), None);
    }

    #[test]
    fn test_save_ignored_while_applying() {
        let mut history = LayoutHistory::new(10);
        history.save(&table(1.0), "drag");
        history.save(&table(2.0), "drag");

        history.undo();
        assert!(history.is_applying());
        assert!(!history.save(&table(9.0), "echo"));
        assert_eq!(history.len(), 2);
        assert!(history.can_redo());

        history.finish_applying();
        assert!(history.save(&table(9.0), "drag"));
    }

    #[test]
    fn test_save_after_undo_prunes_redo_branch() {
        let mut history = LayoutHistory::new(10);
        history.save(&table(1.0), "drag");
        history.save(&table(2.0), "drag");
        history.save(&table(3.0), "drag");

        undo(&mut history);
        undo(&mut history);
        history.finish_applying();
        history.save(&table(7.0), "drag");

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.current().unwrap().positions(), &table(7.0));
        assert_eq!(undo(&mut history), Some(table(1.0)));
    }

    #[test]
    fn test_bound_evicts_oldest() {
        let mut history = LayoutHistory::new(3);
        for x in 1..=5 {
            history.save(&table(x as f32), "drag");
        }
        assert_eq!(history.len(), 3);
        let labels: Vec<f32> = history
            .snapshots()
            .map(|snapshot| snapshot.positions()[&Id::new("a")].x())
            .collect();
        assert_eq!(labels, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_zero_bound_keeps_one() {
        let mut history = LayoutHistory::new(0);
        history.save(&table(1.0), "drag");
        history.save(&table(2.0), "drag");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut history = LayoutHistory::new(10);
        history.save(&table(1.0), "drag");
        history.save(&table(2.0), "drag");
        undo(&mut history);
        history.clear();
        assert!(history.is_empty());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.current_index(), None);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut history = LayoutHistory::new(10);
        let mut live = table(1.0);
        history.save(&live, "drag");
        live.insert(Id::new("a"), Point::new(99.0, 99.0));
        assert_eq!(history.current().unwrap().positions(), &table(1.0));
        assert_eq!(history.current().unwrap().label(), "drag");
        assert!(history.current().unwrap().timestamp() <= SystemTime::now());
    }

    // ===================
    // Property checks
    // ===================

    /// After N saves, undo succeeds N-1 times, each time returning the
    /// snapshot saved just before the current one.
    fn check_undo_depth(count: usize) -> Result<(), TestCaseError> {
        let mut history = LayoutHistory::new(count.max(1));
        for x in 0..count {
            history.save(&table(x as f32), "drag");
        }

        for expected in (0..count.saturating_sub(1)).rev() {
            prop_assert_eq!(undo(&mut history), Some(table(expected as f32)));
        }
        prop_assert_eq!(undo(&mut history), None);
        Ok(())
    }

    /// Undo then redo restores exactly the table that was current before.
    fn check_undo_redo_roundtrip(count: usize, undos: usize) -> Result<(), TestCaseError> {
        let mut history = LayoutHistory::new(64);
        for x in 0..count {
            history.save(&table(x as f32), "drag");
        }
        for _ in 0..undos {
            undo(&mut history);
        }

        let before = history.current().map(|snapshot| snapshot.positions().clone());
        if undo(&mut history).is_some() {
            prop_assert_eq!(redo(&mut history), before);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn undo_depth(count in 0usize..20) {
            check_undo_depth(count)?;
        }

        #[test]
        fn undo_redo_roundtrip(count in 1usize..20, undos in 0usize..20) {
            check_undo_redo_roundtrip(count, undos)?;
        }
    }
}
