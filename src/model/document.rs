//! The document buffer.
//!
//! A `Document` owns the lines of one open file together with the cursor,
//! selection, mode machine, syntax assignment, and undo journal. Every
//! content mutation flows through here: the line store is updated, a
//! journal record is pushed, and the highlight engine rescans from the
//! touched line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::CoreError;
use crate::model::cell::{Cell, CellFlags, Overlay};
use crate::model::history::{Edit, Journal, JournalEntry};
use crate::model::line::{Line, RevStatus};
use crate::syntax::engine;
use crate::syntax::registry::SyntaxDefinition;

/// Line ending format used in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineEnding {
    /// Unix format (`\n`).
    #[default]
    LF,
    /// Windows format (`\r\n`).
    CRLF,
    /// Old Mac format (`\r`), rare but supported.
    CR,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LF => "\n",
            Self::CRLF => "\r\n",
            Self::CR => "\r",
        }
    }

    /// Name shown in the status bar.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LF => "LF",
            Self::CRLF => "CRLF",
            Self::CR => "CR",
        }
    }

    fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::CRLF
        } else if text.contains('\r') {
            Self::CR
        } else {
            Self::LF
        }
    }
}

/// Editor mode state machine. `Normal` is the initial state; transitions
/// are driven by the (external) command dispatcher, but the document
/// enforces which operations each mode permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Normal,
    Insert,
    Replace,
    LineSelection,
    CharSelection,
    ColumnSelection,
    ColumnInsert,
    DirectoryBrowse,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Insert => "insert",
            Self::Replace => "replace",
            Self::LineSelection => "line-selection",
            Self::CharSelection => "char-selection",
            Self::ColumnSelection => "column-selection",
            Self::ColumnInsert => "column-insert",
            Self::DirectoryBrowse => "directory-browse",
        }
    }

    /// Modes in which content mutation is permitted.
    pub fn allows_content_edit(&self) -> bool {
        matches!(self, Self::Insert | Self::Replace | Self::ColumnInsert)
    }

    /// The three selection states.
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            Self::LineSelection | Self::CharSelection | Self::ColumnSelection
        )
    }
}

/// A cursor position: line index and codepoint column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CursorPos {
    pub line: usize,
    pub col: usize,
}

/// Cursor motion directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Shape requested for a new selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionShape {
    Lines,
    Chars,
    Columns,
}

/// Active selection state. The region always runs from the anchor to the
/// current cursor, so extending a selection is just cursor motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    /// Whole lines between the anchor line and the cursor line.
    Lines { anchor_line: usize },
    /// Codepoint range between anchor and cursor.
    Chars { anchor: CursorPos },
    /// Rectangle spanned by anchor and cursor.
    Columns { anchor: CursorPos },
}

/// Lines reserved up front when loading a document.
const INITIAL_DOCUMENT_CAPACITY: usize = 64;

/// The in-memory representation of one open file.
#[derive(Debug)]
pub struct Document {
    config: Config,
    file_name: Option<PathBuf>,
    lines: Vec<Line>,

    cursor: CursorPos,
    /// First visible line (vertical scroll offset).
    pub view_offset: usize,
    /// First visible display column (horizontal scroll offset).
    pub view_col_offset: usize,
    /// Sticky target column for vertical motion.
    preferred_column: usize,

    selection: Selection,
    mode: Mode,
    syntax: Option<Arc<SyntaxDefinition>>,
    journal: Journal,

    pub read_only: bool,
    pub uses_tabs: bool,
    pub line_ending: LineEnding,
}

impl Document {
    /// An empty document: one blank line, journal at its saved position.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            file_name: None,
            lines: vec![Line::new()],
            cursor: CursorPos::default(),
            view_offset: 0,
            view_col_offset: 0,
            preferred_column: 0,
            selection: Selection::None,
            mode: Mode::Normal,
            syntax: None,
            journal: Journal::new(),
            read_only: false,
            uses_tabs: false,
            line_ending: LineEnding::default(),
        }
    }

    /// Load a file into a fresh document.
    ///
    /// Invalid byte sequences decode to visible replacement markers and
    /// editing continues. Nothing is shared with any existing document, so
    /// a failed load cannot leave one half-overwritten.
    pub fn open(config: Config, path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);

        let mut doc = Self::new(config);
        doc.line_ending = LineEnding::detect(&text);
        doc.lines = Vec::with_capacity(INITIAL_DOCUMENT_CAPACITY);
        let tab_stop = doc.config.tab_stop;
        for raw in text.split(doc.line_ending.as_str()) {
            doc.lines.push(Line::from_str(raw, tab_stop));
        }
        // A trailing line terminator yields one phantom empty line.
        if doc.lines.len() > 1 && doc.lines.last().is_some_and(Line::is_empty) {
            doc.lines.pop();
        }
        if doc.lines.is_empty() {
            doc.lines.push(Line::new());
        }

        doc.uses_tabs = doc
            .lines
            .iter()
            .any(|l| matches!(l.get(0).and_then(|c| c.ch()), Some('\t')));
        doc.read_only = std::fs::metadata(path)
            .map(|m| m.permissions().readonly())
            .unwrap_or(false);
        doc.file_name = Some(path.to_path_buf());
        doc.journal.mark_saved();

        tracing::debug!(
            path = %path.display(),
            lines = doc.lines.len(),
            ending = doc.line_ending.display_name(),
            "opened document"
        );
        Ok(doc)
    }

    /// Write the document back to its file and mark the journal position
    /// as saved. The in-memory state is untouched on failure.
    pub fn save(&mut self) -> anyhow::Result<()> {
        let path = self
            .file_name
            .clone()
            .context("document has no file name")?;
        self.save_as(&path)
    }

    /// Write the document to `path`, adopting it as the file name.
    pub fn save_as(&mut self, path: &Path) -> anyhow::Result<()> {
        use std::io::Write;
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);
        for line in &self.lines {
            writer.write_all(line.text().as_bytes())?;
            writer.write_all(self.line_ending.as_str().as_bytes())?;
        }
        writer.flush().context("failed to flush document")?;

        self.file_name = Some(path.to_path_buf());
        self.journal.mark_saved();
        tracing::debug!(path = %path.display(), "saved document");
        Ok(())
    }

    // --- accessors -------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn cursor(&self) -> CursorPos {
        self.cursor
    }

    pub fn preferred_column(&self) -> usize {
        self.preferred_column
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn syntax(&self) -> Option<&Arc<SyntaxDefinition>> {
        self.syntax.as_ref()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The document's text, lines joined with the active line ending.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push_str(self.line_ending.as_str());
            }
            out.push_str(&line.text());
        }
        out
    }

    /// True iff the journal position differs from the last-saved marker.
    pub fn is_modified(&self) -> bool {
        !self.journal.is_at_saved_position()
    }

    /// Move the last-saved marker to the current journal position.
    pub fn mark_saved(&mut self) {
        self.journal.mark_saved();
    }

    // --- mode and syntax -------------------------------------------------

    /// Change mode. Leaving the selection states (other than into
    /// ColumnInsert, which consumes the column selection) drops the
    /// selection.
    pub fn set_mode(&mut self, mode: Mode) {
        tracing::trace!(from = self.mode.name(), to = mode.name(), "mode change");
        self.mode = mode;
        if !mode.is_selection() && mode != Mode::ColumnInsert {
            self.clear_selection();
        }
    }

    /// Reassign the syntax definition. No cached scan state can be trusted
    /// against a different scan function, so every line is invalidated and
    /// the whole document rescanned.
    pub fn set_syntax(&mut self, syntax: Option<Arc<SyntaxDefinition>>) {
        self.syntax = syntax;
        match &self.syntax {
            Some(def) => {
                let def = def.clone();
                engine::full_recompute(&def, &mut self.lines);
            }
            None => {
                for line in &mut self.lines {
                    line.istate = None;
                    for cell in line.cells_mut() {
                        cell.set_category(crate::model::cell::HighlightKind::None);
                    }
                }
            }
        }
    }

    fn rehighlight_from(&mut self, line: usize) {
        if let Some(def) = self.syntax.clone() {
            let start = line.min(self.lines.len() - 1);
            engine::recompute_from(&def, &mut self.lines, start);
        }
    }

    fn require_content_mode(&self) -> Result<(), CoreError> {
        if self.mode.allows_content_edit() {
            Ok(())
        } else {
            Err(CoreError::InvalidModeForOperation {
                mode: self.mode.name(),
            })
        }
    }

    fn record(&mut self, edit: Edit, cursor_before: CursorPos) {
        if !self.config.history_enabled {
            return;
        }
        self.journal.push(JournalEntry {
            edit,
            cursor_before,
            cursor_after: self.cursor,
        });
    }

    /// Bracket a multi-step logical action so it undoes as one unit.
    pub fn begin_undo_group(&mut self) {
        if self.config.history_enabled {
            self.journal.begin_group(self.cursor);
        }
    }

    pub fn end_undo_group(&mut self) {
        if self.config.history_enabled {
            self.journal.end_group(self.cursor);
        }
    }

    /// Open a group for a compound primitive, unless the caller already
    /// bracketed a larger action around it.
    fn begin_internal_group(&mut self) -> bool {
        if self.config.history_enabled && !self.journal.group_open() {
            self.journal.begin_group(self.cursor);
            true
        } else {
            false
        }
    }

    // --- content mutation ------------------------------------------------

    fn cell_for_codepoint(&self, codepoint: u32) -> Cell {
        match char::from_u32(codepoint) {
            Some(c) => Cell::from_char(c, self.config.tab_stop),
            // Journal corruption rather than user input; render one cell.
            None => Cell::encode(codepoint.min(crate::model::cell::MAX_CODEPOINT), 1, CellFlags::default())
                .unwrap_or_else(|_| Cell::from_char(char::REPLACEMENT_CHARACTER, 1)),
        }
    }

    /// Insert a codepoint at the cursor and advance it.
    ///
    /// In Replace mode an existing codepoint under the cursor is
    /// overwritten instead; in ColumnInsert mode the insertion applies to
    /// every line of the column selection as one undo unit.
    pub fn insert_codepoint(&mut self, c: char) -> Result<(), CoreError> {
        self.require_content_mode()?;
        if self.mode == Mode::ColumnInsert {
            return self.column_insert_codepoint(c);
        }

        let before = self.cursor;
        let CursorPos { line, col } = self.cursor;
        let cell = Cell::from_char(c, self.config.tab_stop);
        let len = self.line_len(line)?;

        let edit = if self.mode == Mode::Replace && col < len {
            let old = self.lines[line].replace_at(col, cell)?;
            Edit::ReplaceChar {
                line,
                offset: col,
                codepoint: c as u32,
                old_codepoint: old.codepoint(),
            }
        } else {
            self.lines[line].insert_at(col, cell)?;
            Edit::InsertChar {
                line,
                offset: col,
                codepoint: c as u32,
            }
        };

        self.cursor.col += 1;
        self.preferred_column = self.cursor.col;
        self.lines[line].istate = None;
        self.record(edit, before);
        self.rehighlight_from(line);
        Ok(())
    }

    fn column_insert_codepoint(&mut self, c: char) -> Result<(), CoreError> {
        let Selection::Columns { anchor } = self.selection else {
            return Err(CoreError::InvalidModeForOperation {
                mode: self.mode.name(),
            });
        };
        let before = self.cursor;
        let col = anchor.col.min(self.cursor.col);
        let (first, last) = order(anchor.line, self.cursor.line);

        let grouped = self.begin_internal_group();
        for line in first..=last {
            if col > self.lines[line].codepoint_count() {
                continue;
            }
            let cell = Cell::from_char(c, self.config.tab_stop);
            self.lines[line].insert_at(col, cell)?;
            self.lines[line].istate = None;
            self.record(
                Edit::InsertChar {
                    line,
                    offset: col,
                    codepoint: c as u32,
                },
                before,
            );
        }
        self.cursor.col = col + 1;
        self.preferred_column = self.cursor.col;
        if grouped {
            self.end_undo_group();
        }
        self.rehighlight_from(first);
        Ok(())
    }

    /// Delete one codepoint at the cursor, per mode convention: before the
    /// cursor in Insert/ColumnInsert (backspace), at the cursor in Replace.
    /// A backspace at column 0 merges the line into its predecessor.
    pub fn delete_codepoint(&mut self) -> Result<(), CoreError> {
        self.require_content_mode()?;
        let before = self.cursor;
        let CursorPos { line, col } = self.cursor;

        if self.mode == Mode::Replace {
            if col >= self.line_len(line)? {
                return Ok(());
            }
            let removed = self.lines[line].delete_at(col)?;
            self.lines[line].istate = None;
            self.record(
                Edit::DeleteChar {
                    line,
                    offset: col,
                    old_codepoint: removed.codepoint(),
                },
                before,
            );
            self.rehighlight_from(line);
            return Ok(());
        }

        if col > 0 {
            let removed = self.lines[line].delete_at(col - 1)?;
            self.cursor.col -= 1;
            self.preferred_column = self.cursor.col;
            self.lines[line].istate = None;
            self.record(
                Edit::DeleteChar {
                    line,
                    offset: col - 1,
                    old_codepoint: removed.codepoint(),
                },
                before,
            );
            self.rehighlight_from(line);
            Ok(())
        } else if line > 0 {
            let seam = self.lines[line - 1].codepoint_count();
            let merged = self.lines.remove(line);
            self.lines[line - 1].append_merge(merged);
            self.cursor = CursorPos {
                line: line - 1,
                col: seam,
            };
            self.preferred_column = seam;
            self.record(
                Edit::MergeLines {
                    line: line - 1,
                    split_col: seam,
                },
                before,
            );
            self.rehighlight_from(line - 1);
            Ok(())
        } else {
            Ok(())
        }
    }

    /// Split the current line at `at_col`. With auto-indent the new line
    /// inherits the original's leading whitespace, bracketed with the
    /// split as one undo unit.
    pub fn split_line(&mut self, at_col: usize) -> Result<(), CoreError> {
        self.require_content_mode()?;
        let before = self.cursor;
        let line = self.cursor.line;
        let len = self.line_len(line)?;
        if at_col > len {
            return Err(CoreError::IndexOutOfBounds {
                index: at_col,
                len,
            });
        }

        let indent_cells: Vec<Cell> = if self.config.auto_indent {
            let count = self.lines[line].leading_whitespace().min(at_col);
            self.lines[line].cells()[..count].to_vec()
        } else {
            Vec::new()
        };

        let grouped = !indent_cells.is_empty() && self.begin_internal_group();

        let right = self.lines[line].split_at(at_col)?;
        self.lines.insert(line + 1, right);
        self.cursor = CursorPos {
            line: line + 1,
            col: 0,
        };
        self.record(
            Edit::SplitLine {
                line,
                split_col: at_col,
            },
            before,
        );

        for (offset, cell) in indent_cells.into_iter().enumerate() {
            let cursor_before = self.cursor;
            self.lines[line + 1].insert_at(offset, cell)?;
            self.cursor.col = offset + 1;
            self.record(
                Edit::InsertChar {
                    line: line + 1,
                    offset,
                    codepoint: cell.codepoint(),
                },
                cursor_before,
            );
        }

        if grouped {
            self.end_undo_group();
        }
        self.preferred_column = self.cursor.col;
        self.rehighlight_from(line);
        Ok(())
    }

    /// Merge the next line into the current one.
    pub fn merge_with_next(&mut self) -> Result<(), CoreError> {
        self.require_content_mode()?;
        let before = self.cursor;
        let line = self.cursor.line;
        if line + 1 >= self.lines.len() {
            return Err(CoreError::IndexOutOfBounds {
                index: line + 1,
                len: self.lines.len(),
            });
        }
        let seam = self.lines[line].codepoint_count();
        let merged = self.lines.remove(line + 1);
        self.lines[line].append_merge(merged);
        self.record(
            Edit::MergeLines {
                line,
                split_col: seam,
            },
            before,
        );
        self.rehighlight_from(line);
        Ok(())
    }

    /// Insert an empty line at `at_index`.
    pub fn open_line(&mut self, at_index: usize) -> Result<(), CoreError> {
        self.require_content_mode()?;
        let before = self.cursor;
        if at_index > self.lines.len() {
            return Err(CoreError::IndexOutOfBounds {
                index: at_index,
                len: self.lines.len(),
            });
        }
        self.lines.insert(at_index, Line::new());
        self.cursor = CursorPos {
            line: at_index,
            col: 0,
        };
        self.preferred_column = 0;
        self.record(Edit::AddLine { line: at_index }, before);
        self.rehighlight_from(at_index);
        Ok(())
    }

    /// Remove the line at `at_index`, keeping an exact snapshot in the
    /// journal so undo can resurrect it. Removing the only line of a
    /// document clears it instead, preserving the one-line invariant.
    pub fn remove_line(&mut self, at_index: usize) -> Result<(), CoreError> {
        self.require_content_mode()?;
        let before = self.cursor;
        if at_index >= self.lines.len() {
            return Err(CoreError::IndexOutOfBounds {
                index: at_index,
                len: self.lines.len(),
            });
        }

        if self.lines.len() == 1 {
            let old = std::mem::replace(&mut self.lines[0], Line::new());
            self.cursor = CursorPos::default();
            self.preferred_column = 0;
            self.record(
                Edit::ReplaceLine {
                    line: 0,
                    contents: Box::new(self.lines[0].clone()),
                    old_contents: Box::new(old),
                },
                before,
            );
            self.rehighlight_from(0);
            return Ok(());
        }

        let removed = self.lines.remove(at_index);
        if self.cursor.line >= self.lines.len() {
            self.cursor.line = self.lines.len() - 1;
        }
        self.clamp_cursor_col();
        self.record(
            Edit::RemoveLine {
                line: at_index,
                contents: Box::new(removed),
            },
            before,
        );
        if at_index < self.lines.len() {
            self.rehighlight_from(at_index);
        }
        Ok(())
    }

    // --- cursor and selection --------------------------------------------

    fn line_len(&self, line: usize) -> Result<usize, CoreError> {
        self.lines
            .get(line)
            .map(Line::codepoint_count)
            .ok_or(CoreError::IndexOutOfBounds {
                index: line,
                len: self.lines.len(),
            })
    }

    fn clamp_cursor_col(&mut self) {
        let len = self.lines[self.cursor.line].codepoint_count();
        if self.cursor.col > len {
            self.cursor.col = len;
        }
    }

    /// Move the cursor one step.
    ///
    /// Vertical motion aims at `preferred_column`, clamping to the
    /// destination line's width without overwriting the preference, so a
    /// traversal through short lines remembers the original column.
    /// Horizontal motion rewrites the preference.
    pub fn move_cursor(&mut self, direction: Direction) {
        match direction {
            Direction::Up => {
                if self.cursor.line > 0 {
                    self.cursor.line -= 1;
                    self.cursor.col = self
                        .preferred_column
                        .min(self.lines[self.cursor.line].codepoint_count());
                }
            }
            Direction::Down => {
                if self.cursor.line + 1 < self.lines.len() {
                    self.cursor.line += 1;
                    self.cursor.col = self
                        .preferred_column
                        .min(self.lines[self.cursor.line].codepoint_count());
                }
            }
            Direction::Left => {
                if self.cursor.col > 0 {
                    self.cursor.col -= 1;
                }
                self.preferred_column = self.cursor.col;
            }
            Direction::Right => {
                let len = self.lines[self.cursor.line].codepoint_count();
                if self.cursor.col < len {
                    self.cursor.col += 1;
                }
                self.preferred_column = self.cursor.col;
            }
        }
        if self.mode.is_selection() {
            self.refresh_selection_overlays();
        }
    }

    /// Place the cursor explicitly, clamping to the document.
    pub fn set_cursor(&mut self, pos: CursorPos) {
        self.cursor.line = pos.line.min(self.lines.len() - 1);
        self.cursor.col = pos.col.min(self.lines[self.cursor.line].codepoint_count());
        self.preferred_column = self.cursor.col;
    }

    /// Start a selection of the given shape anchored at `anchor`. Pure
    /// state change: selections are not journaled.
    pub fn set_selection(
        &mut self,
        shape: SelectionShape,
        anchor: CursorPos,
    ) -> Result<(), CoreError> {
        if !self.mode.is_selection() {
            return Err(CoreError::InvalidModeForOperation {
                mode: self.mode.name(),
            });
        }
        self.selection = match shape {
            SelectionShape::Lines => Selection::Lines {
                anchor_line: anchor.line,
            },
            SelectionShape::Chars => Selection::Chars { anchor },
            SelectionShape::Columns => Selection::Columns { anchor },
        };
        self.refresh_selection_overlays();
        Ok(())
    }

    /// Drop the selection and its overlay bits. Categories are untouched.
    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
        for line in &mut self.lines {
            for cell in line.cells_mut() {
                cell.remove_overlay(Overlay::SELECTED);
            }
        }
    }

    /// Recompute the SELECTED overlay from the anchor and cursor.
    pub fn refresh_selection_overlays(&mut self) {
        for line in &mut self.lines {
            for cell in line.cells_mut() {
                cell.remove_overlay(Overlay::SELECTED);
            }
        }
        let cursor = self.cursor;
        match self.selection {
            Selection::None => {}
            Selection::Lines { anchor_line } => {
                let (first, last) = order(anchor_line, cursor.line);
                for line in &mut self.lines[first..=last] {
                    for cell in line.cells_mut() {
                        cell.add_overlay(Overlay::SELECTED);
                    }
                }
            }
            Selection::Chars { anchor } => {
                let (start, end) = order_pos(anchor, cursor);
                for line_no in start.line..=end.line {
                    let len = self.lines[line_no].codepoint_count();
                    let from = if line_no == start.line { start.col } else { 0 };
                    let to = if line_no == end.line { end.col.min(len) } else { len };
                    for cell in &mut self.lines[line_no].cells_mut()[from.min(len)..to] {
                        cell.add_overlay(Overlay::SELECTED);
                    }
                }
            }
            Selection::Columns { anchor } => {
                let (first, last) = order(anchor.line, cursor.line);
                let (left, right) = order(anchor.col, cursor.col);
                for line in &mut self.lines[first..=last] {
                    let len = line.codepoint_count();
                    let from = left.min(len);
                    let to = (right + 1).min(len);
                    for cell in &mut line.cells_mut()[from..to] {
                        cell.add_overlay(Overlay::SELECTED);
                    }
                }
            }
        }
    }

    // --- search overlays --------------------------------------------------

    /// Mark every occurrence of `needle` with the SEARCH_MATCH overlay and
    /// return the match count. With smart case, an all-lowercase needle
    /// matches case-insensitively.
    pub fn set_search_matches(&mut self, needle: &str) -> usize {
        self.clear_search_matches();
        if needle.is_empty() {
            return 0;
        }
        let needle: Vec<char> = needle.chars().collect();
        let fold = self.config.smart_case && needle.iter().all(|c| !c.is_uppercase());
        let mut count = 0;

        for line in &mut self.lines {
            let chars: Vec<Option<char>> = line.cells().iter().map(|c| c.ch()).collect();
            let mut i = 0;
            while i + needle.len() <= chars.len() {
                let hit = needle.iter().enumerate().all(|(k, n)| {
                    chars[i + k].is_some_and(|c| {
                        if fold {
                            c.to_lowercase().eq(n.to_lowercase())
                        } else {
                            c == *n
                        }
                    })
                });
                if hit {
                    for cell in &mut line.cells_mut()[i..i + needle.len()] {
                        cell.add_overlay(Overlay::SEARCH_MATCH);
                    }
                    count += 1;
                    i += needle.len();
                } else {
                    i += 1;
                }
            }
        }
        count
    }

    /// Drop all SEARCH_MATCH overlays. Used when a search prompt is
    /// aborted: only this transient state is discarded, never content.
    pub fn clear_search_matches(&mut self) {
        for line in &mut self.lines {
            for cell in line.cells_mut() {
                cell.remove_overlay(Overlay::SEARCH_MATCH);
            }
        }
    }

    // --- render-pass helpers ----------------------------------------------

    /// Recompute the transient current-line markers for a render pass.
    pub fn refresh_current_line(&mut self) {
        let current = self.cursor.line;
        for (i, line) in self.lines.iter_mut().enumerate() {
            line.is_current = i == current;
        }
    }

    /// Store a diff marker computed by the VCS collaborator.
    pub fn set_rev_status(&mut self, line: usize, status: RevStatus) -> Result<(), CoreError> {
        let len = self.lines.len();
        let slot = self
            .lines
            .get_mut(line)
            .ok_or(CoreError::IndexOutOfBounds { index: line, len })?;
        slot.rev_status = status;
        Ok(())
    }

    // --- undo / redo ------------------------------------------------------

    /// Undo one atomic unit. Returns the number of edits reverted.
    pub fn undo(&mut self) -> Result<usize, CoreError> {
        let group = self.journal.undo()?;
        let mut lowest = usize::MAX;
        for entry in &group {
            self.apply_inverse(&entry.edit)?;
            if let Some(line) = entry.edit.touched_line() {
                lowest = lowest.min(line);
            }
        }
        if let Some(earliest) = group.last() {
            self.cursor = earliest.cursor_before;
        }
        self.finish_history_motion(lowest);
        Ok(group.len())
    }

    /// Redo one atomic unit. Returns the number of edits replayed.
    pub fn redo(&mut self) -> Result<usize, CoreError> {
        let group = self.journal.redo()?;
        let mut lowest = usize::MAX;
        for entry in &group {
            self.apply_forward(&entry.edit)?;
            if let Some(line) = entry.edit.touched_line() {
                lowest = lowest.min(line);
            }
        }
        if let Some(latest) = group.last() {
            self.cursor = latest.cursor_after;
        }
        self.finish_history_motion(lowest);
        Ok(group.len())
    }

    fn finish_history_motion(&mut self, lowest_line: usize) {
        self.selection = Selection::None;
        self.cursor.line = self.cursor.line.min(self.lines.len() - 1);
        self.clamp_cursor_col();
        self.preferred_column = self.cursor.col;
        if lowest_line != usize::MAX {
            self.rehighlight_from(lowest_line);
        }
        // A replayed group can invalidate disjoint regions; the first pass
        // stops at the first stable exit state, so sweep up any line still
        // carrying an invalid cache.
        if self.syntax.is_some() {
            while let Some(stale) = self.lines.iter().position(|l| l.istate.is_none()) {
                self.rehighlight_from(stale);
            }
        }
    }

    /// Apply the inverse effect of a record, restoring the prior content
    /// codepoint-for-codepoint.
    fn apply_inverse(&mut self, edit: &Edit) -> Result<(), CoreError> {
        match edit {
            Edit::Sentinel => {}
            Edit::InsertChar { line, offset, .. } => {
                self.lines[*line].delete_at(*offset)?;
                self.lines[*line].istate = None;
            }
            Edit::DeleteChar {
                line,
                offset,
                old_codepoint,
            } => {
                let cell = self.cell_for_codepoint(*old_codepoint);
                self.lines[*line].insert_at(*offset, cell)?;
                self.lines[*line].istate = None;
            }
            Edit::ReplaceChar {
                line,
                offset,
                old_codepoint,
                ..
            } => {
                let cell = self.cell_for_codepoint(*old_codepoint);
                self.lines[*line].replace_at(*offset, cell)?;
                self.lines[*line].istate = None;
            }
            Edit::RemoveLine { line, contents } => {
                // Resurrect the snapshot; its cached scan state is stale
                // and must be re-derived, not trusted.
                let mut restored = (**contents).clone();
                restored.istate = None;
                self.lines.insert(*line, restored);
            }
            Edit::AddLine { line } => {
                self.lines.remove(*line);
            }
            Edit::ReplaceLine {
                line, old_contents, ..
            } => {
                let mut restored = (**old_contents).clone();
                restored.istate = None;
                self.lines[*line] = restored;
            }
            Edit::MergeLines { line, split_col } => {
                let right = self.lines[*line].split_at(*split_col)?;
                self.lines.insert(*line + 1, right);
            }
            Edit::SplitLine { line, .. } => {
                let merged = self.lines.remove(*line + 1);
                self.lines[*line].append_merge(merged);
            }
        }
        Ok(())
    }

    /// Re-apply a record's forward effect.
    fn apply_forward(&mut self, edit: &Edit) -> Result<(), CoreError> {
        match edit {
            Edit::Sentinel => {}
            Edit::InsertChar {
                line,
                offset,
                codepoint,
            } => {
                let cell = self.cell_for_codepoint(*codepoint);
                self.lines[*line].insert_at(*offset, cell)?;
                self.lines[*line].istate = None;
            }
            Edit::DeleteChar { line, offset, .. } => {
                self.lines[*line].delete_at(*offset)?;
                self.lines[*line].istate = None;
            }
            Edit::ReplaceChar {
                line,
                offset,
                codepoint,
                ..
            } => {
                let cell = self.cell_for_codepoint(*codepoint);
                self.lines[*line].replace_at(*offset, cell)?;
                self.lines[*line].istate = None;
            }
            Edit::RemoveLine { line, .. } => {
                self.lines.remove(*line);
                if self.lines.is_empty() {
                    self.lines.push(Line::new());
                }
            }
            Edit::AddLine { line } => {
                self.lines.insert(*line, Line::new());
            }
            Edit::ReplaceLine { line, contents, .. } => {
                let mut restored = (**contents).clone();
                restored.istate = None;
                self.lines[*line] = restored;
            }
            Edit::MergeLines { line, .. } => {
                let merged = self.lines.remove(*line + 1);
                self.lines[*line].append_merge(merged);
            }
            Edit::SplitLine { line, split_col } => {
                let right = self.lines[*line].split_at(*split_col)?;
                self.lines.insert(*line + 1, right);
            }
        }
        Ok(())
    }
}

fn order(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn order_pos(a: CursorPos, b: CursorPos) -> (CursorPos, CursorPos) {
    if (a.line, a.col) <= (b.line, b.col) {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cell::HighlightKind;

    fn doc_with(text: &str) -> Document {
        let mut doc = Document::new(Config::default());
        doc.set_mode(Mode::Insert);
        for c in text.chars() {
            if c == '\n' {
                let col = doc.cursor().col;
                doc.split_line(col).unwrap();
            } else {
                doc.insert_codepoint(c).unwrap();
            }
        }
        doc
    }

    #[test]
    fn insert_into_empty_document() {
        let mut doc = Document::new(Config::default());
        assert!(!doc.is_modified());
        doc.set_mode(Mode::Insert);
        doc.insert_codepoint('x').unwrap();
        assert_eq!(doc.line(0).unwrap().text(), "x");
        assert_eq!(doc.cursor(), CursorPos { line: 0, col: 1 });
        assert!(doc.is_modified());

        doc.undo().unwrap();
        assert_eq!(doc.line(0).unwrap().text(), "");
        assert_eq!(doc.cursor(), CursorPos { line: 0, col: 0 });
        assert!(!doc.is_modified());
    }

    #[test]
    fn mutation_requires_an_editing_mode() {
        let mut doc = Document::new(Config::default());
        assert_eq!(
            doc.insert_codepoint('x'),
            Err(CoreError::InvalidModeForOperation { mode: "normal" })
        );
        doc.set_mode(Mode::LineSelection);
        assert!(doc.delete_codepoint().is_err());
        assert!(doc.split_line(0).is_err());
        doc.set_mode(Mode::Insert);
        assert!(doc.insert_codepoint('x').is_ok());
    }

    #[test]
    fn selection_requires_a_selection_mode() {
        let mut doc = doc_with("abc");
        doc.set_mode(Mode::Normal);
        assert!(doc
            .set_selection(SelectionShape::Chars, CursorPos::default())
            .is_err());
        doc.set_mode(Mode::CharSelection);
        assert!(doc
            .set_selection(SelectionShape::Chars, CursorPos::default())
            .is_ok());
    }

    #[test]
    fn replace_mode_overwrites_in_place() {
        let mut doc = doc_with("abc");
        doc.set_mode(Mode::Replace);
        doc.set_cursor(CursorPos { line: 0, col: 1 });
        doc.insert_codepoint('X').unwrap();
        assert_eq!(doc.line(0).unwrap().text(), "aXc");

        doc.undo().unwrap();
        assert_eq!(doc.line(0).unwrap().text(), "abc");
        doc.redo().unwrap();
        assert_eq!(doc.line(0).unwrap().text(), "aXc");
    }

    #[test]
    fn split_line_round_trip() {
        let mut doc = doc_with("ab");
        doc.set_cursor(CursorPos { line: 0, col: 1 });
        doc.split_line(1).unwrap();
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line(0).unwrap().text(), "a");
        assert_eq!(doc.line(1).unwrap().text(), "b");

        doc.undo().unwrap();
        assert_eq!(doc.line_count(), 1);
        assert_eq!(doc.line(0).unwrap().text(), "ab");
    }

    #[test]
    fn auto_indent_split_undoes_as_one_unit() {
        let mut doc = doc_with("    body");
        doc.split_line(8).unwrap();
        assert_eq!(doc.line(1).unwrap().text(), "    ");
        assert_eq!(doc.cursor(), CursorPos { line: 1, col: 4 });

        doc.undo().unwrap();
        assert_eq!(doc.line_count(), 1);
        assert_eq!(doc.line(0).unwrap().text(), "    body");

        doc.redo().unwrap();
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line(1).unwrap().text(), "    ");
        assert_eq!(doc.cursor(), CursorPos { line: 1, col: 4 });
    }

    #[test]
    fn backspace_at_column_zero_merges_lines() {
        let mut doc = doc_with("ab\ncd");
        doc.set_cursor(CursorPos { line: 1, col: 0 });
        doc.delete_codepoint().unwrap();
        assert_eq!(doc.line_count(), 1);
        assert_eq!(doc.line(0).unwrap().text(), "abcd");
        assert_eq!(doc.cursor(), CursorPos { line: 0, col: 2 });

        doc.undo().unwrap();
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line(1).unwrap().text(), "cd");
    }

    #[test]
    fn remove_line_resurrects_verbatim() {
        let mut doc = doc_with("one\ntwo\nthree");
        doc.remove_line(1).unwrap();
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line(1).unwrap().text(), "three");

        doc.undo().unwrap();
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line(1).unwrap().text(), "two");
    }

    #[test]
    fn removing_the_only_line_clears_it() {
        let mut doc = doc_with("solo");
        doc.remove_line(0).unwrap();
        assert_eq!(doc.line_count(), 1);
        assert_eq!(doc.line(0).unwrap().text(), "");

        doc.undo().unwrap();
        assert_eq!(doc.line(0).unwrap().text(), "solo");
    }

    #[test]
    fn grouped_deletes_undo_in_one_step() {
        let mut doc = doc_with("abcdef");
        doc.set_cursor(CursorPos { line: 0, col: 6 });
        doc.begin_undo_group();
        doc.delete_codepoint().unwrap();
        doc.delete_codepoint().unwrap();
        doc.delete_codepoint().unwrap();
        doc.end_undo_group();
        assert_eq!(doc.line(0).unwrap().text(), "abc");

        let reverted = doc.undo().unwrap();
        assert_eq!(reverted, 3);
        assert_eq!(doc.line(0).unwrap().text(), "abcdef");
        assert_eq!(doc.cursor(), CursorPos { line: 0, col: 6 });
    }

    #[test]
    fn preferred_column_survives_short_lines() {
        let mut doc = doc_with("0123456789\nab\n0123456789");
        doc.set_cursor(CursorPos { line: 0, col: 5 });
        doc.move_cursor(Direction::Down);
        assert_eq!(doc.cursor(), CursorPos { line: 1, col: 2 });
        doc.move_cursor(Direction::Up);
        assert_eq!(doc.cursor(), CursorPos { line: 0, col: 5 });
    }

    #[test]
    fn dirty_state_follows_the_journal_position() {
        let mut doc = doc_with("hello");
        assert!(doc.is_modified());
        doc.mark_saved();
        assert!(!doc.is_modified());
        doc.insert_codepoint('!').unwrap();
        assert!(doc.is_modified());
        doc.undo().unwrap();
        assert!(!doc.is_modified());
        doc.redo().unwrap();
        assert!(doc.is_modified());
    }

    #[test]
    fn column_insert_hits_every_selected_line() {
        let mut doc = doc_with("aa\nbb\ncc");
        doc.set_mode(Mode::ColumnSelection);
        doc.set_selection(SelectionShape::Columns, CursorPos { line: 0, col: 1 })
            .unwrap();
        doc.set_cursor(CursorPos { line: 2, col: 1 });
        doc.set_mode(Mode::ColumnInsert);
        doc.insert_codepoint('|').unwrap();
        assert_eq!(doc.line(0).unwrap().text(), "a|a");
        assert_eq!(doc.line(1).unwrap().text(), "b|b");
        assert_eq!(doc.line(2).unwrap().text(), "c|c");

        let reverted = doc.undo().unwrap();
        assert_eq!(reverted, 3);
        assert_eq!(doc.text(), "aa\nbb\ncc");
    }

    #[test]
    fn selection_overlays_are_positional_and_transient() {
        let mut doc = doc_with("abcd");
        doc.set_mode(Mode::CharSelection);
        doc.set_selection(SelectionShape::Chars, CursorPos { line: 0, col: 1 })
            .unwrap();
        doc.set_cursor(CursorPos { line: 0, col: 3 });
        doc.refresh_selection_overlays();

        let selected: Vec<bool> = doc
            .line(0)
            .unwrap()
            .cells()
            .iter()
            .map(|c| c.flags().overlay().contains(Overlay::SELECTED))
            .collect();
        assert_eq!(selected, vec![false, true, true, false]);

        doc.set_mode(Mode::Normal);
        assert!(doc
            .line(0)
            .unwrap()
            .cells()
            .iter()
            .all(|c| !c.flags().overlay().contains(Overlay::SELECTED)));
    }

    #[test]
    fn search_overlays_respect_smart_case() {
        let mut doc = doc_with("Foo foo FOO");
        assert_eq!(doc.set_search_matches("foo"), 3);
        assert_eq!(doc.set_search_matches("Foo"), 1);
        doc.clear_search_matches();
        assert!(doc
            .line(0)
            .unwrap()
            .cells()
            .iter()
            .all(|c| !c.flags().overlay().contains(Overlay::SEARCH_MATCH)));
    }

    #[test]
    fn disabled_history_records_nothing() {
        let mut doc = Document::new(Config {
            history_enabled: false,
            ..Config::default()
        });
        doc.set_mode(Mode::Insert);
        doc.insert_codepoint('x').unwrap();
        assert!(doc.journal().is_empty());
        assert_eq!(doc.undo(), Err(CoreError::NothingToUndo));
    }

    #[test]
    fn set_syntax_forces_a_full_recompute() {
        use crate::syntax::registry::SyntaxDefinition;
        use crate::syntax::engine::ScanCursor;

        fn all_keywords(cursor: &mut ScanCursor<'_>) -> i32 {
            cursor.paint_rest(HighlightKind::Keyword);
            0
        }

        let mut doc = doc_with("one\ntwo");
        let def = Arc::new(SyntaxDefinition {
            name: "kw",
            extensions: &[],
            scan: all_keywords,
            prefers_spaces: true,
        });
        doc.set_syntax(Some(def));
        assert!(doc.lines().iter().all(|l| l.istate == Some(0)));
        assert!(doc.lines().iter().flat_map(|l| l.cells()).all(|c| {
            c.flags().category() == HighlightKind::Keyword
        }));

        doc.set_syntax(None);
        assert!(doc.lines().iter().all(|l| l.istate.is_none()));
        assert!(doc.lines().iter().flat_map(|l| l.cells()).all(|c| {
            c.flags().category() == HighlightKind::None
        }));
    }

    #[test]
    fn file_round_trip_preserves_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crlf.txt");
        std::fs::write(&path, b"one\r\ntwo\r\n").unwrap();

        let mut doc = Document::open(Config::default(), &path).unwrap();
        assert_eq!(doc.line_ending, LineEnding::CRLF);
        assert_eq!(doc.line_count(), 2);
        assert!(!doc.is_modified());

        doc.set_mode(Mode::Insert);
        doc.set_cursor(CursorPos { line: 1, col: 3 });
        doc.insert_codepoint('!').unwrap();
        doc.save().unwrap();
        assert!(!doc.is_modified());
        assert_eq!(std::fs::read(&path).unwrap(), b"one\r\ntwo!\r\n");
    }

    #[test]
    fn invalid_bytes_decode_to_replacement_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, b"ok\xFF\xFEend").unwrap();

        let doc = Document::open(Config::default(), &path).unwrap();
        let text = doc.line(0).unwrap().text();
        assert!(text.starts_with("ok"));
        assert!(text.contains(char::REPLACEMENT_CHARACTER));
        assert!(text.ends_with("end"));
    }
}
