//! Line storage.
//!
//! A `Line` is a growable sequence of [`Cell`]s plus the per-line state the
//! rest of the core hangs off it: the cached end-of-line scan state used to
//! seed the next line's highlight pass, the transient current-line marker,
//! and the VCS diff status refreshed on demand by an external collaborator.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::cell::Cell;

/// Cells reserved up front for a freshly created line.
///
/// Sized for a typical line of source text so short-lived edit churn does
/// not reallocate; growth past this is the vector's amortized doubling.
pub const INITIAL_LINE_CAPACITY: usize = 32;

/// Diff marker against the version-control baseline for one line.
///
/// Computed by an external collaborator (the core only stores it) and
/// rendered in the gutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RevStatus {
    /// Line matches the baseline.
    #[default]
    Unchanged,
    /// Line does not exist in the baseline.
    Added,
    /// Line differs from the baseline.
    Modified,
    /// Lines were deleted from the baseline immediately after this one.
    DeletedBelow,
}

/// One line of text: an owned, growable sequence of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    cells: Vec<Cell>,

    /// Scan state at the end of this line, cached to seed the next line's
    /// highlight pass. `None` means not yet computed or invalidated by an
    /// edit.
    pub istate: Option<i32>,

    /// Whether the cursor is on this line. Recomputed every render pass,
    /// never persisted.
    #[serde(skip)]
    pub is_current: bool,

    /// Diff marker, refreshed on demand.
    #[serde(skip)]
    pub rev_status: RevStatus,
}

impl Line {
    /// An empty line with the default capacity reserved.
    pub fn new() -> Self {
        Self {
            cells: Vec::with_capacity(INITIAL_LINE_CAPACITY),
            istate: None,
            is_current: false,
            rev_status: RevStatus::Unchanged,
        }
    }

    /// A line owning the given cells.
    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            istate: None,
            is_current: false,
            rev_status: RevStatus::Unchanged,
        }
    }

    /// Build a line from a string, computing cell widths as we go.
    pub fn from_str(text: &str, tab_stop: u8) -> Self {
        Self::from_cells(text.chars().map(|c| Cell::from_char(c, tab_stop)).collect())
    }

    /// Number of codepoints on this line.
    pub fn codepoint_count(&self) -> usize {
        self.cells.len()
    }

    /// True when the line holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total display width of the line in terminal cells.
    pub fn display_width(&self) -> usize {
        self.cells.iter().map(|c| c.display_width() as usize).sum()
    }

    /// The line's cells.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// The cell at `index`, if in bounds.
    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Append a cell.
    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    /// Insert a cell before `index` (`index == len` appends).
    pub fn insert_at(&mut self, index: usize, cell: Cell) -> Result<(), CoreError> {
        if index > self.cells.len() {
            return Err(CoreError::IndexOutOfBounds {
                index,
                len: self.cells.len(),
            });
        }
        self.cells.insert(index, cell);
        Ok(())
    }

    /// Remove and return the cell at `index`.
    pub fn delete_at(&mut self, index: usize) -> Result<Cell, CoreError> {
        if index >= self.cells.len() {
            return Err(CoreError::IndexOutOfBounds {
                index,
                len: self.cells.len(),
            });
        }
        Ok(self.cells.remove(index))
    }

    /// Overwrite the cell at `index`, returning the previous cell.
    pub fn replace_at(&mut self, index: usize, cell: Cell) -> Result<Cell, CoreError> {
        let len = self.cells.len();
        let slot = self
            .cells
            .get_mut(index)
            .ok_or(CoreError::IndexOutOfBounds { index, len })?;
        Ok(std::mem::replace(slot, cell))
    }

    /// Split this line at `index`; `self` keeps the cells before it and the
    /// returned line takes the rest. Both lines' cached scan state is
    /// invalidated.
    pub fn split_at(&mut self, index: usize) -> Result<Line, CoreError> {
        if index > self.cells.len() {
            return Err(CoreError::IndexOutOfBounds {
                index,
                len: self.cells.len(),
            });
        }
        let rest = self.cells.split_off(index);
        self.istate = None;
        let mut right = Line::from_cells(rest);
        right.rev_status = self.rev_status;
        Ok(right)
    }

    /// Append another line's cells to this one, consuming it. The merged
    /// line's cached scan state is invalidated.
    pub fn append_merge(&mut self, mut other: Line) {
        self.cells.append(&mut other.cells);
        self.istate = None;
    }

    /// The line's text as a string. Codepoints that are not valid scalar
    /// values render as the replacement character.
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.ch().unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// Count of leading whitespace cells (for auto-indent).
    pub fn leading_whitespace(&self) -> usize {
        self.cells
            .iter()
            .take_while(|c| matches!(c.ch(), Some(' ') | Some('\t')))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cell::HighlightKind;

    fn line(text: &str) -> Line {
        Line::from_str(text, 4)
    }

    #[test]
    fn insert_and_delete_round_trip() {
        let mut l = line("hllo");
        l.insert_at(1, Cell::from_char('e', 4)).unwrap();
        assert_eq!(l.text(), "hello");
        let removed = l.delete_at(1).unwrap();
        assert_eq!(removed.ch(), Some('e'));
        assert_eq!(l.text(), "hllo");
    }

    #[test]
    fn bounds_are_rejected() {
        let mut l = line("ab");
        assert!(matches!(
            l.insert_at(3, Cell::from_char('x', 4)),
            Err(CoreError::IndexOutOfBounds { index: 3, len: 2 })
        ));
        assert!(l.delete_at(2).is_err());
        assert!(l.replace_at(2, Cell::from_char('x', 4)).is_err());
        assert!(l.split_at(3).is_err());
    }

    #[test]
    fn split_and_merge_invalidate_istate() {
        let mut l = line("hello world");
        l.istate = Some(7);
        let right = l.split_at(5).unwrap();
        assert_eq!(l.text(), "hello");
        assert_eq!(right.text(), " world");
        assert_eq!(l.istate, None);
        assert_eq!(right.istate, None);

        let mut merged = line("hello");
        merged.istate = Some(3);
        merged.append_merge(line(" world"));
        assert_eq!(merged.text(), "hello world");
        assert_eq!(merged.istate, None);
    }

    #[test]
    fn display_width_sums_cells() {
        let l = line("a\t界");
        assert_eq!(l.display_width(), 1 + 4 + 2);
        assert_eq!(l.codepoint_count(), 3);
    }

    #[test]
    fn snapshot_skips_transient_fields() {
        let mut l = line("x");
        l.istate = Some(2);
        l.is_current = true;
        l.rev_status = RevStatus::Modified;
        l.cells_mut()[0].set_category(HighlightKind::Keyword);

        let json = serde_json::to_string(&l).unwrap();
        let back: Line = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text(), "x");
        assert_eq!(back.istate, Some(2));
        assert_eq!(back.cells()[0].flags().category(), HighlightKind::Keyword);
        assert!(!back.is_current);
        assert_eq!(back.rev_status, RevStatus::Unchanged);
    }
}
