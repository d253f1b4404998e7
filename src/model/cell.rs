//! Packed character cells.
//!
//! A `Cell` is one character position in a line: its codepoint, its display
//! width in terminal cells, and its highlight flags, packed into a single
//! `u32`. The layout mirrors the on-screen grid storage:
//!
//! ```text
//! bits  0..4   display width (0..=15)
//! bits  4..11  flags: low five bits base category, two overlay bits
//! bits 11..32  codepoint (0..=0x10FFFF)
//! ```
//!
//! The range contracts are enforced at construction; everything past
//! `encode` is a pure bit transformation.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

use crate::error::CoreError;

/// Highest encodable codepoint (21 bits, the Unicode ceiling).
pub const MAX_CODEPOINT: u32 = 0x10FFFF;

/// Highest encodable display width.
pub const MAX_WIDTH: u8 = 0xF;

/// Highest raw flag value (7 bits: 5 category + 2 overlay).
pub const MAX_FLAGS: u8 = 0x7F;

const WIDTH_BITS: u32 = 4;
const FLAG_BITS: u32 = 7;
const FLAG_SHIFT: u32 = WIDTH_BITS;
const CODEPOINT_SHIFT: u32 = WIDTH_BITS + FLAG_BITS;
const CATEGORY_MASK: u8 = 0x1F;

/// Base highlight category of a cell.
///
/// This is the *semantic* classification assigned by the syntax engine;
/// transient per-position state (selection, search match) lives in the
/// orthogonal [`Overlay`] bits instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HighlightKind {
    None = 0,
    Keyword = 1,
    String = 2,
    Comment = 3,
    Type = 4,
    Pragma = 5,
    Numeral = 6,
    Error = 7,
    DiffPlus = 8,
    DiffMinus = 9,
    Notice = 10,
    Bold = 11,
    Link = 12,
    Escape = 13,
}

impl HighlightKind {
    /// Map a 5-bit category ordinal back to a kind.
    ///
    /// Ordinals outside the closed set read as `None`; the codec itself
    /// preserves them bit-for-bit (see [`CellFlags::bits`]).
    pub fn from_bits(bits: u8) -> Self {
        match bits & CATEGORY_MASK {
            1 => Self::Keyword,
            2 => Self::String,
            3 => Self::Comment,
            4 => Self::Type,
            5 => Self::Pragma,
            6 => Self::Numeral,
            7 => Self::Error,
            8 => Self::DiffPlus,
            9 => Self::DiffMinus,
            10 => Self::Notice,
            11 => Self::Bold,
            12 => Self::Link,
            13 => Self::Escape,
            _ => Self::None,
        }
    }
}

bitflags! {
    /// Transient positional highlight bits, independent of the category.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct Overlay: u8 {
        /// Cell is inside the active selection.
        const SELECTED = 1 << 5;
        /// Cell is part of the current search match set.
        const SEARCH_MATCH = 1 << 6;
    }
}

/// The 7-bit flag field of a cell: base category plus overlay bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellFlags(u8);

impl CellFlags {
    /// Flags carrying a category and no overlays.
    pub fn from_kind(kind: HighlightKind) -> Self {
        Self(kind as u8)
    }

    /// Validate a raw 7-bit flag value.
    pub fn from_bits(bits: u8) -> Result<Self, CoreError> {
        if bits > MAX_FLAGS {
            return Err(CoreError::OutOfRange {
                field: "flags",
                value: bits as u32,
                max: MAX_FLAGS as u32,
            });
        }
        Ok(Self(bits))
    }

    /// Raw 7-bit value, exactly as encoded.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// The base category, ignoring overlay bits.
    pub fn category(self) -> HighlightKind {
        HighlightKind::from_bits(self.0)
    }

    /// The overlay bits, ignoring the category.
    pub fn overlay(self) -> Overlay {
        Overlay::from_bits_truncate(self.0)
    }

    /// Add overlay bits without disturbing the category.
    pub fn with_overlay(self, overlay: Overlay) -> Self {
        Self(self.0 | overlay.bits())
    }

    /// Remove overlay bits without disturbing the category.
    pub fn without_overlay(self, overlay: Overlay) -> Self {
        Self(self.0 & !overlay.bits())
    }

    /// Replace the category, preserving overlay bits.
    pub fn with_category(self, kind: HighlightKind) -> Self {
        Self((self.0 & !CATEGORY_MASK) | kind as u8)
    }
}

/// One character position, packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell(u32);

impl Cell {
    /// Pack a codepoint, display width, and flags into a cell.
    ///
    /// Callers clamp widths before encoding; a width or codepoint outside
    /// its field is a caller bug and is rejected with `OutOfRange`.
    pub fn encode(codepoint: u32, width: u8, flags: CellFlags) -> Result<Self, CoreError> {
        if codepoint > MAX_CODEPOINT {
            return Err(CoreError::OutOfRange {
                field: "codepoint",
                value: codepoint,
                max: MAX_CODEPOINT,
            });
        }
        if width > MAX_WIDTH {
            return Err(CoreError::OutOfRange {
                field: "display_width",
                value: width as u32,
                max: MAX_WIDTH as u32,
            });
        }
        Ok(Self(
            (codepoint << CODEPOINT_SHIFT)
                | ((flags.bits() as u32) << FLAG_SHIFT)
                | width as u32,
        ))
    }

    /// Build a cell from a character, computing its display width.
    ///
    /// Tabs take the configured stop width, other control characters take
    /// two cells (caret notation), and everything else is measured by its
    /// Unicode width (zero for combining marks).
    pub fn from_char(c: char, tab_stop: u8) -> Self {
        let width = if c == '\t' {
            tab_stop.min(MAX_WIDTH)
        } else if c.is_control() {
            2
        } else {
            c.width().unwrap_or(1).min(MAX_WIDTH as usize) as u8
        };
        // Both fields are already in range, so the encode cannot fail.
        Self(
            ((c as u32) << CODEPOINT_SHIFT)
                | ((CellFlags::default().bits() as u32) << FLAG_SHIFT)
                | width as u32,
        )
    }

    /// Unpack into (codepoint, display width, flags).
    pub fn decode(self) -> (u32, u8, CellFlags) {
        (self.codepoint(), self.display_width(), self.flags())
    }

    /// The stored codepoint.
    pub fn codepoint(self) -> u32 {
        self.0 >> CODEPOINT_SHIFT
    }

    /// The stored codepoint as a `char`, if it is a valid scalar value.
    pub fn ch(self) -> Option<char> {
        char::from_u32(self.codepoint())
    }

    /// The stored display width in terminal cells.
    pub fn display_width(self) -> u8 {
        (self.0 & ((1 << WIDTH_BITS) - 1)) as u8
    }

    /// The stored flag field.
    pub fn flags(self) -> CellFlags {
        CellFlags(((self.0 >> FLAG_SHIFT) & ((1 << FLAG_BITS) - 1)) as u8)
    }

    fn set_flags(&mut self, flags: CellFlags) {
        let mask = ((1u32 << FLAG_BITS) - 1) << FLAG_SHIFT;
        self.0 = (self.0 & !mask) | ((flags.bits() as u32) << FLAG_SHIFT);
    }

    /// Assign the highlight category, preserving overlay bits.
    pub fn set_category(&mut self, kind: HighlightKind) {
        self.set_flags(self.flags().with_category(kind));
    }

    /// Add overlay bits.
    pub fn add_overlay(&mut self, overlay: Overlay) {
        self.set_flags(self.flags().with_overlay(overlay));
    }

    /// Remove overlay bits.
    pub fn remove_overlay(&mut self, overlay: Overlay) {
        self.set_flags(self.flags().without_overlay(overlay));
    }

    /// Replace the codepoint and width in place.
    ///
    /// Overlays are positional; editing the character underneath one makes
    /// it stale, so any overlay bits are cleared. The category is left for
    /// the next highlight pass to reassign.
    pub fn set_codepoint(&mut self, codepoint: u32, width: u8) -> Result<(), CoreError> {
        let flags = self
            .flags()
            .without_overlay(Overlay::SELECTED | Overlay::SEARCH_MATCH);
        *self = Self::encode(codepoint, width, flags)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_rejects_out_of_range() {
        let flags = CellFlags::default();
        assert!(matches!(
            Cell::encode(0x110000, 1, flags),
            Err(CoreError::OutOfRange { field: "codepoint", .. })
        ));
        assert!(matches!(
            Cell::encode('a' as u32, 16, flags),
            Err(CoreError::OutOfRange { field: "display_width", .. })
        ));
        assert!(CellFlags::from_bits(128).is_err());
    }

    #[test]
    fn round_trip_extremes() {
        for (cp, w, f) in [(0u32, 0u8, 0u8), (0x10FFFF, 15, 127), ('界' as u32, 2, 3)] {
            let cell = Cell::encode(cp, w, CellFlags::from_bits(f).unwrap()).unwrap();
            assert_eq!(cell.decode(), (cp, w, CellFlags::from_bits(f).unwrap()));
        }
    }

    #[test]
    fn overlay_is_orthogonal_to_category() {
        let mut cell = Cell::from_char('x', 4);
        cell.set_category(HighlightKind::Keyword);
        cell.add_overlay(Overlay::SELECTED);
        assert_eq!(cell.flags().category(), HighlightKind::Keyword);
        assert_eq!(cell.flags().overlay(), Overlay::SELECTED);

        cell.set_category(HighlightKind::String);
        assert_eq!(cell.flags().overlay(), Overlay::SELECTED);

        cell.add_overlay(Overlay::SEARCH_MATCH);
        cell.remove_overlay(Overlay::SELECTED);
        assert_eq!(cell.flags().category(), HighlightKind::String);
        assert_eq!(cell.flags().overlay(), Overlay::SEARCH_MATCH);
    }

    #[test]
    fn editing_codepoint_clears_overlays() {
        let mut cell = Cell::from_char('x', 4);
        cell.set_category(HighlightKind::Comment);
        cell.add_overlay(Overlay::SEARCH_MATCH);
        cell.set_codepoint('y' as u32, 1).unwrap();
        assert_eq!(cell.ch(), Some('y'));
        assert!(cell.flags().overlay().is_empty());
        assert_eq!(cell.flags().category(), HighlightKind::Comment);
    }

    #[test]
    fn char_widths() {
        assert_eq!(Cell::from_char('a', 4).display_width(), 1);
        assert_eq!(Cell::from_char('\t', 8).display_width(), 8);
        assert_eq!(Cell::from_char('\u{1}', 4).display_width(), 2);
        assert_eq!(Cell::from_char('界', 4).display_width(), 2);
        // Combining mark occupies no cells of its own.
        assert_eq!(Cell::from_char('\u{0301}', 4).display_width(), 0);
    }
}
