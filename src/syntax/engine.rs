//! Incremental syntax highlighting.
//!
//! Each line caches the scan state at its end (`istate`). An edit to line
//! `n` rescans `n` seeded from line `n - 1`'s cache; the scan propagates to
//! `n + 1` only while a line's exit state actually changed. Most edits stay
//! inside one line's scan constructs, so the pass stops immediately; an
//! edit that opens or closes a multi-line construct walks forward exactly
//! as far as its effects reach, in the worst case to the end of the
//! document.
//!
//! The incremental result is always identical to a full rescan of the
//! final document state — that equivalence is what the cache comparison
//! guarantees, and the property tests exercise it.

use crate::model::cell::HighlightKind;
use crate::model::line::Line;
use crate::syntax::registry::SyntaxDefinition;

/// Scan state seeding the first line of a document.
pub const INITIAL_STATE: i32 = 0;

/// Transient view of one line handed to a language's scan function.
///
/// Exists only for the duration of one scan call chain; never persisted.
pub struct ScanCursor<'a> {
    line: &'a mut Line,
    line_no: usize,
    /// Running scan state. The value left here at end of line becomes the
    /// line's cached `istate`.
    pub state: i32,
    pos: usize,
}

impl<'a> ScanCursor<'a> {
    fn new(line: &'a mut Line, line_no: usize, state: i32) -> Self {
        Self {
            line,
            line_no,
            state,
            pos: 0,
        }
    }

    /// Index of the line being scanned.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Current intra-line position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Number of cells on the line.
    pub fn len(&self) -> usize {
        self.line.codepoint_count()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// True once every cell has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.line.codepoint_count()
    }

    /// The codepoint `offset` cells ahead of the current position.
    pub fn codepoint(&self, offset: usize) -> Option<u32> {
        self.line.get(self.pos + offset).map(|c| c.codepoint())
    }

    /// Like [`ScanCursor::codepoint`] but as a `char`.
    pub fn ch(&self, offset: usize) -> Option<char> {
        self.line.get(self.pos + offset).and_then(|c| c.ch())
    }

    /// Classify the next `count` cells and advance past them. Overlay bits
    /// on the painted cells are preserved.
    pub fn paint(&mut self, count: usize, kind: HighlightKind) {
        let end = (self.pos + count).min(self.line.codepoint_count());
        for cell in &mut self.line.cells_mut()[self.pos..end] {
            cell.set_category(kind);
        }
        self.pos = end;
    }

    /// Classify everything from the current position to end of line.
    pub fn paint_rest(&mut self, kind: HighlightKind) {
        let count = self.line.codepoint_count() - self.pos;
        self.paint(count, kind);
    }

    /// Advance `count` cells, classifying them as plain text.
    pub fn skip(&mut self, count: usize) {
        self.paint(count, HighlightKind::None);
    }
}

/// Run one line through the definition's scan function, painting its cells
/// and returning the end-of-line state.
fn scan_line(definition: &SyntaxDefinition, line: &mut Line, line_no: usize, seed: i32) -> i32 {
    let mut cursor = ScanCursor::new(line, line_no, seed);
    while !cursor.at_end() {
        let before = cursor.pos;
        cursor.state = (definition.scan)(&mut cursor);
        if cursor.pos == before {
            // A rule that consumes nothing would scan forever.
            debug_assert!(false, "scan function did not advance");
            tracing::warn!(line = line_no, pos = before, "scan rule did not advance");
            cursor.skip(1);
        }
    }
    cursor.state
}

/// Rescan from `start_line`, propagating only while exit states change.
///
/// The seed comes from the previous line's cached `istate` (or the fixed
/// initial state at line 0). If `start_line`'s predecessor has no valid
/// cache, the scan is widened backward until it finds one, so the seed is
/// always sound. Returns the number of lines actually rescanned.
pub fn recompute_from(definition: &SyntaxDefinition, lines: &mut [Line], start_line: usize) -> usize {
    if lines.is_empty() || start_line >= lines.len() {
        return 0;
    }

    let mut start = start_line;
    while start > 0 && lines[start - 1].istate.is_none() {
        start -= 1;
    }

    let mut state = if start == 0 {
        INITIAL_STATE
    } else {
        lines[start - 1].istate.unwrap_or(INITIAL_STATE)
    };

    let mut index = start;
    let mut scanned = 0;
    loop {
        let previous = lines[index].istate;
        state = scan_line(definition, &mut lines[index], index, state);
        lines[index].istate = Some(state);
        scanned += 1;
        // The next line was computed with this line's old exit state; if
        // that state is unchanged the rest of the document is already
        // consistent.
        if previous == Some(state) {
            break;
        }
        index += 1;
        if index == lines.len() {
            break;
        }
    }

    tracing::trace!(
        syntax = definition.name,
        from = start,
        scanned,
        "rehighlight"
    );
    scanned
}

/// Invalidate every cached state and rescan the whole document. Used when
/// the syntax assignment changes, since no cache can be trusted against a
/// different scan function.
pub fn full_recompute(definition: &SyntaxDefinition, lines: &mut [Line]) -> usize {
    for line in lines.iter_mut() {
        line.istate = None;
    }
    recompute_from(definition, lines, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cell::HighlightKind;

    /// Toy language for exercising the engine: `#` comments to end of
    /// line, `/* */` block comments that span lines (state 1 while open),
    /// digits as numerals.
    fn toy_scan(cursor: &mut ScanCursor<'_>) -> i32 {
        const IN_BLOCK: i32 = 1;
        if cursor.state == IN_BLOCK {
            if cursor.ch(0) == Some('*') && cursor.ch(1) == Some('/') {
                cursor.paint(2, HighlightKind::Comment);
                return INITIAL_STATE;
            }
            cursor.paint(1, HighlightKind::Comment);
            return IN_BLOCK;
        }
        match cursor.ch(0) {
            Some('/') if cursor.ch(1) == Some('*') => {
                cursor.paint(2, HighlightKind::Comment);
                IN_BLOCK
            }
            Some('#') => {
                cursor.paint_rest(HighlightKind::Comment);
                INITIAL_STATE
            }
            Some(c) if c.is_ascii_digit() => {
                cursor.paint(1, HighlightKind::Numeral);
                INITIAL_STATE
            }
            _ => {
                cursor.skip(1);
                INITIAL_STATE
            }
        }
    }

    fn toy() -> SyntaxDefinition {
        SyntaxDefinition {
            name: "toy",
            extensions: &["toy"],
            scan: toy_scan,
            prefers_spaces: true,
        }
    }

    fn lines(texts: &[&str]) -> Vec<Line> {
        texts.iter().map(|t| Line::from_str(t, 4)).collect()
    }

    fn categories(line: &Line) -> Vec<HighlightKind> {
        line.cells().iter().map(|c| c.flags().category()).collect()
    }

    #[test]
    fn single_line_constructs_stop_immediately() {
        let def = toy();
        let mut doc = lines(&["a1 # note", "bare", "text"]);
        full_recompute(&def, &mut doc);

        // Editing line 0 cannot change any exit state, so exactly the
        // edited line and its (unchanged) successor comparison run.
        let scanned = recompute_from(&def, &mut doc, 0);
        assert_eq!(scanned, 1);
        assert_eq!(
            categories(&doc[0])[0..2],
            [HighlightKind::None, HighlightKind::Numeral]
        );
        assert_eq!(categories(&doc[0])[3..5], [HighlightKind::Comment; 2]);
    }

    #[test]
    fn block_comment_state_crosses_lines() {
        let def = toy();
        let mut doc = lines(&["a /* open", "inside", "close */ b"]);
        full_recompute(&def, &mut doc);

        assert_eq!(doc[0].istate, Some(1));
        assert_eq!(doc[1].istate, Some(1));
        assert_eq!(doc[2].istate, Some(0));
        assert!(categories(&doc[1])
            .iter()
            .all(|k| *k == HighlightKind::Comment));
        assert_eq!(*categories(&doc[2]).last().unwrap(), HighlightKind::None);
    }

    #[test]
    fn closing_a_block_repropagates_to_stability() {
        let def = toy();
        let mut doc = lines(&["/* open", "x", "y", "z"]);
        full_recompute(&def, &mut doc);
        assert!(doc.iter().all(|l| l.istate == Some(1)));

        // Terminate the comment on line 0; every following line's seed
        // changes, so the scan must walk the whole document.
        doc[0] = Line::from_str("/* open */", 4);
        let scanned = recompute_from(&def, &mut doc, 0);
        assert_eq!(scanned, 4);
        assert!(doc.iter().all(|l| l.istate == Some(0)));
        assert_eq!(categories(&doc[1]), vec![HighlightKind::None]);
    }

    #[test]
    fn painting_preserves_overlays() {
        use crate::model::cell::Overlay;
        let def = toy();
        let mut doc = lines(&["# c"]);
        for cell in doc[0].cells_mut() {
            cell.add_overlay(Overlay::SEARCH_MATCH);
        }
        full_recompute(&def, &mut doc);
        for cell in doc[0].cells() {
            assert_eq!(cell.flags().category(), HighlightKind::Comment);
            assert_eq!(cell.flags().overlay(), Overlay::SEARCH_MATCH);
        }
    }

    #[test]
    fn invalid_predecessor_cache_widens_the_scan() {
        let def = toy();
        let mut doc = lines(&["/*", "a", "b"]);
        full_recompute(&def, &mut doc);
        doc[0].istate = None;
        doc[1].istate = None;
        // Asking for line 2 must not trust the invalidated caches above it.
        let scanned = recompute_from(&def, &mut doc, 2);
        assert_eq!(scanned, 3);
        assert_eq!(doc[2].istate, Some(1));
    }
}
