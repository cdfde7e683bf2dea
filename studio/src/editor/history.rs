//! Snapshot-based undo/redo over the draft's sections.
//!
//! Full-copy snapshots, not diffs: documents are tens of questions, copies
//! are cheap, and an entire class of diff/patch bugs never exists. Only the
//! `sections` value is versioned; dialog state, selection, and in-flight
//! generation flags live outside history.

use survey_types::Section;

#[derive(Debug, Clone)]
pub struct HistoryRing {
    snapshots: Vec<Vec<Section>>,
    cursor: usize,
}

impl HistoryRing {
    /// A ring always holds at least one snapshot: the state it was born with.
    pub fn new(initial: Vec<Section>) -> Self {
        Self {
            snapshots: vec![initial],
            cursor: 0,
        }
    }

    /// Commit a new snapshot: discard any redo future beyond the cursor,
    /// append, and advance the cursor to the new last index.
    pub fn push(&mut self, snapshot: Vec<Section>) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Step back and return the snapshot to restore. `None` at the floor:
    /// a disabled affordance, not an error. Never pushes.
    pub fn undo(&mut self) -> Option<&[Section]> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(&self.snapshots[self.cursor])
    }

    /// Step forward again. `None` when there is no future to restore.
    pub fn redo(&mut self) -> Option<&[Section]> {
        if self.cursor + 1 >= self.snapshots.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.snapshots[self.cursor])
    }

    /// Number of snapshots currently held (always at least one).
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
