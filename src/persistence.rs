//! Per-file saved-state hooks.
//!
//! An external collaborator remembers where the cursor was the last time
//! each file was open. The core only calls these hooks; the storage format
//! belongs to the implementation behind the trait.

use anyhow::Result;

use crate::model::document::{CursorPos, Document};

/// Saved editor state for one file, keyed by its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    pub cursor: CursorPos,
    pub view_offset: usize,
}

/// A pluggable store of per-file saved state.
pub trait StateStore {
    /// Restore saved state into the document, if any is known for its
    /// file. Returns whether anything was restored.
    fn fetch(&mut self, doc: &mut Document) -> Result<bool>;

    /// Record the document's current cursor and view state.
    fn update(&mut self, doc: &Document) -> Result<()>;
}

/// In-memory store, used in tests and as the fallback when no on-disk
/// store is configured.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: std::collections::HashMap<std::path::PathBuf, SavedState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn fetch(&mut self, doc: &mut Document) -> Result<bool> {
        let Some(path) = doc.file_name().map(|p| p.to_path_buf()) else {
            return Ok(false);
        };
        let Some(state) = self.entries.get(&path).copied() else {
            return Ok(false);
        };
        doc.set_cursor(state.cursor);
        doc.view_offset = state.view_offset;
        tracing::trace!(path = %path.display(), "restored per-file state");
        Ok(true)
    }

    fn update(&mut self, doc: &Document) -> Result<()> {
        let Some(path) = doc.file_name() else {
            return Ok(());
        };
        self.entries.insert(
            path.to_path_buf(),
            SavedState {
                cursor: doc.cursor(),
                view_offset: doc.view_offset,
            },
        );
        Ok(())
    }
}
