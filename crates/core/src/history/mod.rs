//! Linear undo/redo journal over immutable state snapshots.

use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

/// The edit a journal entry was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditKind {
    InsertPoint,
    MovePoint,
    SetBpm,
    DeletePoint,
    ClearAll,
    UpdateSignature,
    RemoveSignature,
    MoveSignature,
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EditKind::InsertPoint => "insert timing point",
            EditKind::MovePoint => "move timing point",
            EditKind::SetBpm => "change bpm",
            EditKind::DeletePoint => "delete timing point",
            EditKind::ClearAll => "clear timing",
            EditKind::UpdateSignature => "change time signature",
            EditKind::RemoveSignature => "remove time signature",
            EditKind::MoveSignature => "move time signature",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
struct HistoryEntry<S> {
    /// `None` for the base state the journal started from.
    kind: Option<EditKind>,
    snapshot: S,
}

/// The journal stores and replays snapshots without looking inside them.
/// Entry 0 is the base state; the cursor points at the entry matching the
/// live state.
#[derive(Debug, Clone)]
pub struct EditHistory<S> {
    entries: VecDeque<HistoryEntry<S>>,
    cursor: usize,
    limit: usize,
}

impl<S: Clone> EditHistory<S> {
    /// `limit` caps the number of retained entries, base included.
    pub fn new(initial: S, limit: usize) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(HistoryEntry {
            kind: None,
            snapshot: initial,
        });
        Self {
            entries,
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Appends the state reached by an edit, dropping any redo tail.
    pub fn record(&mut self, kind: EditKind, snapshot: S) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(HistoryEntry {
            kind: Some(kind),
            snapshot,
        });
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    pub fn undo(&mut self) -> Option<S> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].snapshot.clone())
    }

    pub fn redo(&mut self) -> Option<S> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].snapshot.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Edit that the next undo reverts.
    pub fn undo_label(&self) -> Option<EditKind> {
        if self.cursor == 0 {
            return None;
        }
        self.entries[self.cursor].kind
    }

    /// Edit that the next redo reapplies.
    pub fn redo_label(&self) -> Option<EditKind> {
        self.entries.get(self.cursor + 1).and_then(|entry| entry.kind)
    }

    pub fn current(&self) -> &S {
        &self.entries[self.cursor].snapshot
    }

    /// Forgets everything and starts over from `initial`.
    pub fn reset(&mut self, initial: S) {
        self.entries.clear();
        self.entries.push_back(HistoryEntry {
            kind: None,
            snapshot: initial,
        });
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}
