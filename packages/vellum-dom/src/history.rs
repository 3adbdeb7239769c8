//! Linear undo/redo over per-node snapshots.
//!
//! Instead of whole-tree snapshots, each step stores records only for the
//! nodes that changed at that step. Resolving a node's state at a step walks
//! its sparse list down to the nearest recorded entry, so the cost of a step
//! is bounded by the size of the edit, not the size of the tree.

use std::collections::BTreeMap;

use crate::json::{NodeRecord, TEXT_NAME};
use crate::range::Range;
use crate::text::word_token_count;

/// Per-document history stack. Step 0 is the baseline recorded when the
/// document is created (or history is cleared); `stack_offset` points at the
/// step the tree currently matches.
pub(crate) struct History {
    /// Sparse snapshot lists per node id, ordered by step.
    entries: BTreeMap<usize, Vec<(usize, NodeRecord)>>,
    /// One range per recorded step.
    ranges: Vec<Range>,
    stack_offset: usize,
}

/// Everything needed to move the tree to another step: the records that
/// differ between here and there, and the range to restore.
pub(crate) struct HistoryRestore {
    pub target: usize,
    pub records: Vec<NodeRecord>,
    pub range: Range,
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            ranges: Vec::new(),
            stack_offset: 0,
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.ranges.clear();
        self.stack_offset = 0;
    }

    /// Number of recorded steps, including the baseline.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn can_undo(&self) -> bool {
        self.stack_offset > 0
    }

    pub fn can_redo(&self) -> bool {
        self.stack_offset + 1 < self.ranges.len()
    }

    pub fn set_offset(&mut self, offset: usize) {
        debug_assert!(offset < self.ranges.len());
        self.stack_offset = offset;
    }

    /// Record step 0. Expects a freshly reset stack and the full tree.
    pub fn record_baseline(&mut self, records: &[NodeRecord], range: Range) {
        debug_assert!(self.ranges.is_empty());
        for record in records {
            self.entries.insert(record.id, vec![(0, record.clone())]);
        }
        self.ranges.push(range);
        self.stack_offset = 0;
    }

    /// Record a committed diff as a new step.
    ///
    /// A diff holding nothing but one visible-text change is checked for
    /// keystroke coalescing: when the node already changed at the current
    /// step and the old and new contents split into the same number of word
    /// tokens, the edit is still "the same word" and overwrites the current
    /// step instead of opening a new one.
    pub fn record(&mut self, diff: &[NodeRecord], range: Range) {
        if self.coalesce(diff, range) {
            return;
        }

        // A new edit after an undo washes out the redo tail.
        if self.stack_offset + 1 < self.ranges.len() {
            let offset = self.stack_offset;
            self.entries.values_mut().for_each(|entries| {
                entries.retain(|(step, _)| *step <= offset);
            });
            self.entries.retain(|_, entries| !entries.is_empty());
            self.ranges.truncate(offset + 1);
        }

        self.stack_offset += 1;
        let step = self.stack_offset;
        for record in diff {
            // An unchanged node needs no new entry; resolution walks back
            // to the previous one.
            if self.resolve(record.id, step) == Some(record) {
                continue;
            }
            self.entries
                .entry(record.id)
                .or_default()
                .push((step, record.clone()));
        }
        self.ranges.push(range);
        #[cfg(feature = "tracing")]
        tracing::debug!(step, nodes = diff.len(), "recorded history step");
    }

    fn coalesce(&mut self, diff: &[NodeRecord], range: Range) -> bool {
        // Only at the tip of the stack: overwriting a mid-stack step would
        // leave a redo tail recorded against the old content.
        if self.stack_offset == 0 || self.stack_offset + 1 != self.ranges.len() {
            return false;
        }
        let [record] = diff else {
            return false;
        };
        if record.name.as_deref() != Some(TEXT_NAME) {
            return false;
        }
        let step = self.stack_offset;
        let Some(entries) = self.entries.get_mut(&record.id) else {
            return false;
        };
        let Some(entry) = entries.last_mut().filter(|(last, _)| *last == step) else {
            return false;
        };
        let (Some(old), Some(new)) = (entry.1.value.as_deref(), record.value.as_deref()) else {
            return false;
        };
        if word_token_count(old) != word_token_count(new) {
            return false;
        }
        entry.1 = record.clone();
        self.ranges[step] = range;
        #[cfg(feature = "tracing")]
        tracing::debug!(step, "coalesced text edit into current step");
        true
    }

    pub fn prepare_undo(&self) -> Option<HistoryRestore> {
        if !self.can_undo() {
            return None;
        }
        Some(self.restore_to(self.stack_offset - 1))
    }

    pub fn prepare_redo(&self) -> Option<HistoryRestore> {
        if !self.can_redo() {
            return None;
        }
        Some(self.restore_to(self.stack_offset + 1))
    }

    /// The node's recorded state at `step`: its nearest entry at or below
    /// that step. `None` when the node did not exist yet.
    pub fn resolve(&self, id: usize, step: usize) -> Option<&NodeRecord> {
        let entries = self.entries.get(&id)?;
        entries
            .iter()
            .rev()
            .find(|(entry_step, _)| *entry_step <= step)
            .map(|(_, record)| record)
    }

    /// Records whose resolved state differs between the current offset and
    /// `target`. A node resolving to the same recorded entry on both sides
    /// did not change across the gap and is skipped; a node with no state at
    /// the target is dropped there by its parent's child list.
    fn restore_to(&self, target: usize) -> HistoryRestore {
        let mut records = Vec::new();
        for entries in self.entries.values() {
            let here = resolved_index(entries, self.stack_offset);
            let there = resolved_index(entries, target);
            if here == there {
                continue;
            }
            if let Some(index) = there {
                records.push(entries[index].1.clone());
            }
        }
        HistoryRestore {
            target,
            records,
            range: self.ranges[target],
        }
    }
}

fn resolved_index(entries: &[(usize, NodeRecord)], step: usize) -> Option<usize> {
    entries
        .iter()
        .rposition(|(entry_step, _)| *entry_step <= step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::RangePoint;

    fn range(offset: usize) -> Range {
        Range::collapsed(RangePoint { id: 1, offset })
    }

    fn text(id: usize, value: &str) -> NodeRecord {
        NodeRecord {
            id,
            name: Some(TEXT_NAME.to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    fn element(id: usize, name: &str, child_ids: Vec<usize>) -> NodeRecord {
        NodeRecord {
            id,
            name: Some(name.to_string()),
            child_ids,
            ..Default::default()
        }
    }

    fn base() -> History {
        let mut history = History::new();
        history.record_baseline(
            &[element(0, "#root", vec![1]), text(1, "a")],
            range(1),
        );
        history
    }

    #[test]
    fn boundaries_are_no_ops() {
        let history = base();
        assert!(history.prepare_undo().is_none());
        assert!(history.prepare_redo().is_none());
    }

    #[test]
    fn undo_resolves_to_previous_state() {
        let mut history = base();
        history.record(&[text(1, "ab")], range(2));
        let restore = history.prepare_undo().unwrap();
        assert_eq!(restore.target, 0);
        assert_eq!(restore.records.len(), 1);
        assert_eq!(restore.records[0].value.as_deref(), Some("a"));
        assert_eq!(restore.range, range(1));
    }

    #[test]
    fn unchanged_nodes_stay_out_of_the_diff() {
        let mut history = base();
        history.record(&[text(1, "ab")], range(2));
        // The root never changed after the baseline: one entry, skipped by
        // the identity check on both sides.
        let restore = history.prepare_undo().unwrap();
        assert!(restore.records.iter().all(|record| record.id == 1));
    }

    #[test]
    fn same_word_typing_overwrites_the_current_step() {
        let mut history = base();
        history.record(&[text(1, "ah")], range(2));
        history.record(&[text(1, "ahe")], range(3));
        history.record(&[text(1, "ahello")], range(6));
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.resolve(1, 1).unwrap().value.as_deref(),
            Some("ahello")
        );
    }

    #[test]
    fn a_space_opens_a_new_step() {
        let mut history = base();
        history.record(&[text(1, "ahello")], range(6));
        history.record(&[text(1, "ahello ")], range(7));
        history.record(&[text(1, "ahello w")], range(8));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn multi_node_diffs_never_coalesce() {
        let mut history = base();
        history.record(&[text(1, "ab")], range(2));
        history.record(&[element(0, "#root", vec![1, 2]), text(2, "c")], range(1));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn new_edit_truncates_the_redo_tail() {
        let mut history = base();
        history.record(&[text(1, "ab")], range(2));
        history.record(&[text(1, "ab c")], range(4));
        let restore = history.prepare_undo().unwrap();
        history.set_offset(restore.target);
        assert!(history.can_redo());
        history.record(&[text(1, "abX")], range(3));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.resolve(1, 2).unwrap().value.as_deref(),
            Some("abX")
        );
    }

    #[test]
    fn coalescing_is_disabled_while_undone() {
        let mut history = base();
        history.record(&[text(1, "ab")], range(2));
        history.record(&[text(1, "ab cd")], range(5));
        let restore = history.prepare_undo().unwrap();
        history.set_offset(restore.target);
        // Same token count as step 1, but the redo tail must go.
        history.record(&[text(1, "ax")], range(2));
        assert_eq!(history.len(), 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn resolve_walks_down_to_the_nearest_entry() {
        let mut history = base();
        history.record(&[text(1, "ab")], range(2));
        history.record(&[element(0, "#root", vec![1, 2]), text(2, "x")], range(1));
        // Node 1 did not change at step 2.
        assert_eq!(history.resolve(1, 2).unwrap().value.as_deref(), Some("ab"));
        // Node 2 did not exist before step 2.
        assert!(history.resolve(2, 1).is_none());
    }
}
