//! Undo journal.
//!
//! A linear, doubly-traversable log of edit records. The chain is a vector
//! of entries plus an explicit position index: `entries[..position]` are
//! applied, everything after is the redo tail. Starting new work while not
//! at the tail truncates it (linear undo, no branching).
//!
//! Logical actions that span several primitive edits are bracketed by
//! sentinel records so they undo and redo as one unit.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::document::CursorPos;
use crate::model::line::Line;

/// One edit record, tagged by kind and carrying exactly the fields needed
/// to invert it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edit {
    /// Boundary of an atomic undo unit. No payload.
    Sentinel,

    /// A codepoint was inserted at (line, offset).
    InsertChar {
        line: usize,
        offset: usize,
        codepoint: u32,
    },

    /// The codepoint `old_codepoint` was removed from (line, offset).
    DeleteChar {
        line: usize,
        offset: usize,
        old_codepoint: u32,
    },

    /// `old_codepoint` at (line, offset) was overwritten with `codepoint`.
    ReplaceChar {
        line: usize,
        offset: usize,
        codepoint: u32,
        old_codepoint: u32,
    },

    /// The line at `line` was removed; `contents` is an exact snapshot so
    /// undo can resurrect it.
    RemoveLine { line: usize, contents: Box<Line> },

    /// An empty line was inserted at `line`.
    AddLine { line: usize },

    /// The line at `line` was replaced wholesale.
    ReplaceLine {
        line: usize,
        contents: Box<Line>,
        old_contents: Box<Line>,
    },

    /// Line `line + 1` was merged into line `line`; `split_col` is the
    /// merge seam (the original length of line `line`).
    MergeLines { line: usize, split_col: usize },

    /// Line `line` was split at column `split_col`.
    SplitLine { line: usize, split_col: usize },
}

impl Edit {
    /// Whether this record is an undo-unit boundary.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Edit::Sentinel)
    }

    /// The lowest line index this record touches, used to seed the
    /// rehighlight pass after undo/redo.
    pub fn touched_line(&self) -> Option<usize> {
        match *self {
            Edit::Sentinel => None,
            Edit::InsertChar { line, .. }
            | Edit::DeleteChar { line, .. }
            | Edit::ReplaceChar { line, .. }
            | Edit::RemoveLine { line, .. }
            | Edit::AddLine { line }
            | Edit::ReplaceLine { line, .. }
            | Edit::MergeLines { line, .. }
            | Edit::SplitLine { line, .. } => Some(line),
        }
    }
}

/// A journal node: the edit plus the cursor on either side of it, so undo
/// and redo can put the cursor back where the user left it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub edit: Edit,
    pub cursor_before: CursorPos,
    pub cursor_after: CursorPos,
}

/// The undo journal for one document.
#[derive(Debug, Clone)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    /// Entries before this index are applied; the rest are the redo tail.
    position: usize,
    /// Journal position at the last save, if it still exists in the chain.
    saved_at: Option<usize>,
    /// An unmatched opening sentinel is outstanding.
    group_open: bool,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

impl Journal {
    /// A new journal; the empty position counts as saved.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            position: 0,
            saved_at: Some(0),
            group_open: false,
        }
    }

    /// Number of records in the chain.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no records have ever been pushed (or all were truncated).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current chain position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// All records, applied and redo tail alike.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Whether an opening sentinel is outstanding.
    pub fn group_open(&self) -> bool {
        self.group_open
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.entries.len()
    }

    /// Append a record after the current position, discarding any redo
    /// tail first.
    pub fn push(&mut self, entry: JournalEntry) {
        self.truncate_redo_tail();
        self.entries.push(entry);
        self.position = self.entries.len();
    }

    fn truncate_redo_tail(&mut self) {
        if self.position < self.entries.len() {
            tracing::trace!(
                discarded = self.entries.len() - self.position,
                "new edit after undo, dropping redo tail"
            );
            self.entries.truncate(self.position);
            if matches!(self.saved_at, Some(saved) if saved > self.entries.len()) {
                // The saved state no longer exists on the chain; the
                // document stays modified until the next save.
                self.saved_at = None;
            }
        }
    }

    /// Open an atomic undo unit. Groups do not nest; opening a second one
    /// is a caller bug and is ignored after a debug assert.
    pub fn begin_group(&mut self, cursor: CursorPos) {
        debug_assert!(!self.group_open, "undo groups do not nest");
        if self.group_open {
            tracing::warn!("begin_group while a group is open; ignoring");
            return;
        }
        self.group_open = true;
        self.push(JournalEntry {
            edit: Edit::Sentinel,
            cursor_before: cursor,
            cursor_after: cursor,
        });
    }

    /// Close the current undo unit. An empty group leaves no trace in the
    /// chain.
    pub fn end_group(&mut self, cursor: CursorPos) {
        debug_assert!(self.group_open, "end_group without begin_group");
        if !self.group_open {
            tracing::warn!("end_group without begin_group; ignoring");
            return;
        }
        self.group_open = false;
        if self
            .entries
            .last()
            .is_some_and(|entry| entry.edit.is_sentinel())
            && self.position == self.entries.len()
        {
            self.entries.pop();
            self.position = self.entries.len();
            return;
        }
        self.push(JournalEntry {
            edit: Edit::Sentinel,
            cursor_before: cursor,
            cursor_after: cursor,
        });
    }

    /// Step the position backward over one undo unit and return its
    /// records, most recent first, sentinels excluded.
    ///
    /// The caller applies each record's inverse effect in the returned
    /// order.
    pub fn undo(&mut self) -> Result<Vec<JournalEntry>, CoreError> {
        if !self.can_undo() {
            return Err(CoreError::NothingToUndo);
        }
        let mut group = Vec::new();
        if self.entries[self.position - 1].edit.is_sentinel() {
            // Closing sentinel: walk back to the matching opening one.
            self.position -= 1;
            while self.position > 0 && !self.entries[self.position - 1].edit.is_sentinel() {
                self.position -= 1;
                group.push(self.entries[self.position].clone());
            }
            if self.position > 0 {
                self.position -= 1;
            }
        } else {
            self.position -= 1;
            group.push(self.entries[self.position].clone());
        }
        Ok(group)
    }

    /// Step the position forward over one undo unit and return its
    /// records in application order, sentinels excluded.
    ///
    /// The caller re-applies each record's forward effect.
    pub fn redo(&mut self) -> Result<Vec<JournalEntry>, CoreError> {
        if !self.can_redo() {
            return Err(CoreError::NothingToRedo);
        }
        let mut group = Vec::new();
        if self.entries[self.position].edit.is_sentinel() {
            self.position += 1;
            while self.position < self.entries.len()
                && !self.entries[self.position].edit.is_sentinel()
            {
                group.push(self.entries[self.position].clone());
                self.position += 1;
            }
            if self.position < self.entries.len() {
                self.position += 1;
            }
        } else {
            group.push(self.entries[self.position].clone());
            self.position += 1;
        }
        Ok(group)
    }

    /// Record the current position as the saved state.
    pub fn mark_saved(&mut self) {
        self.saved_at = Some(self.position);
    }

    /// Whether the current position is the saved one. This is an identity
    /// comparison on chain positions, not a dirty bit, so undoing back to
    /// the save point reports unmodified again.
    pub fn is_at_saved_position(&self) -> bool {
        self.saved_at == Some(self.position)
    }

    /// Write the chain as JSON Lines, one record per line.
    pub fn save_to_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        use std::io::Write;
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        for entry in &self.entries {
            let json = serde_json::to_string(entry)?;
            writeln!(writer, "{json}")?;
        }
        Ok(())
    }

    /// Read a chain written by [`Journal::save_to_file`]. The position is
    /// restored to the tail and the saved marker is cleared.
    pub fn load_from_file(path: &std::path::Path) -> std::io::Result<Self> {
        use std::io::BufRead;
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);

        let mut journal = Self::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: JournalEntry = serde_json::from_str(&line)?;
            journal.entries.push(entry);
        }
        journal.position = journal.entries.len();
        journal.saved_at = None;
        Ok(journal)
    }
}
