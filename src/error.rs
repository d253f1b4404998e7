//! Core error taxonomy.
//!
//! Bounds and mode violations are caller bugs: they are rejected with an
//! error in release builds and additionally assert in debug builds at the
//! call sites that detect them. `NothingToUndo`/`NothingToRedo` are not
//! failures at all from the user's point of view; callers surface them as a
//! status message and carry on.

use thiserror::Error;

/// Errors produced by the editing core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A value exceeded its field's range during cell encoding.
    #[error("value out of range for {field}: {value:#x} (max {max:#x})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    /// An index was outside a line's or document's bounds.
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A content or selection operation was attempted in a mode that does
    /// not permit it.
    #[error("operation not valid in {mode} mode")]
    InvalidModeForOperation { mode: &'static str },

    /// Undo requested at the root of the journal.
    #[error("already at oldest change")]
    NothingToUndo,

    /// Redo requested at the tip of the journal.
    #[error("already at newest change")]
    NothingToRedo,
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, CoreError>;
