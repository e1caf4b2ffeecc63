use std::collections::VecDeque;

use crate::io::EncodedImage;

/// Default number of committed states kept per session.
pub const MAX_HISTORY_SIZE: usize = 20;

/// Label given to the first entry of every session.
pub const ORIGINAL_LABEL: &str = "Original";

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// One committed state of the editing session. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub image: EncodedImage,
    pub label: String,
}

impl HistoryEntry {
    pub fn new(image: EncodedImage, label: impl Into<String>) -> Self {
        Self {
            image,
            label: label.into(),
        }
    }
}

// ============================================================================
// HISTORY LOG - bounded, linear undo/redo over image snapshots
// ============================================================================

/// Linear snapshot history with a movable cursor.
///
/// Invariants:
/// - `index` is `None` exactly when the log is empty, otherwise `< len`.
/// - `len <= max_history_size`; appending past capacity evicts the oldest entry.
/// - Appending after an undo discards everything past the cursor (no branches).
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    index: Option<usize>,
    max_history_size: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(MAX_HISTORY_SIZE)
    }
}

impl HistoryLog {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            index: None,
            max_history_size: max_history_size.max(1),
        }
    }

    /// Start over with a single "Original" entry.
    pub fn initialize(&mut self, image: EncodedImage) {
        self.entries.clear();
        self.entries.push_back(HistoryEntry::new(image, ORIGINAL_LABEL));
        self.index = Some(0);
    }

    /// Commit a new state after the cursor and make it current.
    ///
    /// An empty log is treated as a fresh start: the entry becomes the only
    /// one, keeping its label.
    pub fn append(&mut self, image: EncodedImage, label: impl Into<String>) {
        let keep = match self.index {
            Some(i) => i + 1,
            None => {
                tracing::debug!("history: append on empty log, starting fresh");
                0
            }
        };
        self.entries.truncate(keep);

        if self.entries.len() >= self.max_history_size {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry::new(image, label));
        self.index = Some(self.entries.len() - 1);
    }

    /// Step back one entry. Returns the new current entry, or `None` if
    /// already at the oldest.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        match self.index {
            Some(i) if i > 0 => {
                self.index = Some(i - 1);
                self.entries.get(i - 1)
            }
            _ => None,
        }
    }

    /// Step forward one entry. Returns the new current entry, or `None` if
    /// already at the newest.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        match self.index {
            Some(i) if i + 1 < self.entries.len() => {
                self.index = Some(i + 1);
                self.entries.get(i + 1)
            }
            _ => None,
        }
    }

    /// Move the cursor directly to `index` (history panel click).
    /// Returns `false` for out-of-range or unchanged positions.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index >= self.entries.len() || self.index == Some(index) {
            return false;
        }
        self.index = Some(index);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.index.is_some_and(|i| i > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.index.is_some_and(|i| i + 1 < self.entries.len())
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.index.and_then(|i| self.entries.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Labels oldest first.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Label of the edit an undo would revert.
    pub fn undo_label(&self) -> Option<&str> {
        if self.can_undo() {
            self.current().map(|e| e.label.as_str())
        } else {
            None
        }
    }

    /// Label of the edit a redo would re-apply.
    pub fn redo_label(&self) -> Option<&str> {
        let next = self.index? + 1;
        self.entries.get(next).map(|e| e.label.as_str())
    }

    /// Encoded bytes held across all entries. Clones of the same image share
    /// a buffer, so this is an upper bound.
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(|e| e.image.memory_size()).sum()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.index = None;
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
