//! The logical key enumeration.
//!
//! This closed set is the contract between raw input decoding (an external
//! collaborator that turns terminal bytes into these values) and all
//! editing logic, which consumes only this enumeration. Printable
//! codepoints pass through unchanged as [`Key::Char`]; everything else is a
//! distinct value, including the bounded-read timeout sentinel.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Modifier state attached to navigation keys.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[repr(transparent)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
    }
}

/// Arrow directions, paired with [`Modifiers`] in [`Key::Arrow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrowKey {
    Up,
    Down,
    Left,
    Right,
}

/// A logical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// The bounded-timeout read expired with no input.
    Timeout,
    /// A printable codepoint, passed through unchanged.
    Char(char),
    /// Ctrl plus a letter or symbol (`Ctrl('a')` for ^A).
    Ctrl(char),
    Backspace,
    Tab,
    ShiftTab,
    Enter,
    Escape,
    Delete,
    /// Function key (F1..).
    Function(u8),
    Home,
    End,
    PageUp,
    PageDown,
    /// Arrow key with its modifier state.
    Arrow(ArrowKey, Modifiers),
    /// Marker that a mouse report follows in the input stream.
    Mouse,
}

impl Key {
    /// Display name, for binding tables and the status line.
    pub fn name(&self) -> String {
        match self {
            Self::Timeout => "<timeout>".into(),
            Self::Char(c) => c.to_string(),
            Self::Ctrl(c) => format!("^{}", c.to_ascii_uppercase()),
            Self::Backspace => "<backspace>".into(),
            Self::Tab => "<tab>".into(),
            Self::ShiftTab => "<shift-tab>".into(),
            Self::Enter => "<enter>".into(),
            Self::Escape => "<escape>".into(),
            Self::Delete => "<delete>".into(),
            Self::Function(n) => format!("<f{n}>"),
            Self::Home => "<home>".into(),
            Self::End => "<end>".into(),
            Self::PageUp => "<page-up>".into(),
            Self::PageDown => "<page-down>".into(),
            Self::Arrow(arrow, modifiers) => {
                let mut name = String::from("<");
                if modifiers.contains(Modifiers::ALT) {
                    name.push_str("alt-");
                }
                if modifiers.contains(Modifiers::CTRL) {
                    name.push_str("ctrl-");
                }
                if modifiers.contains(Modifiers::SHIFT) {
                    name.push_str("shift-");
                }
                name.push_str(match arrow {
                    ArrowKey::Up => "up",
                    ArrowKey::Down => "down",
                    ArrowKey::Left => "left",
                    ArrowKey::Right => "right",
                });
                name.push('>');
                name
            }
            Self::Mouse => "<mouse>".into(),
        }
    }

    /// Whether this key carries a printable codepoint to insert.
    pub fn printable(&self) -> Option<char> {
        match self {
            Self::Char(c) => Some(*c),
            Self::Tab => Some('\t'),
            _ => None,
        }
    }
}
