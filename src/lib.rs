//! keel — the editing core of a terminal text editor.
//!
//! This crate is the part of the editor that must be exactly right: the
//! in-memory document representation, its undo journal, and the
//! incremental syntax-highlighting engine that keeps per-cell highlight
//! state consistent with a full rescan as the document mutates.
//!
//! Rendering, raw input decoding, command dispatch, and color themes are
//! external collaborators; they talk to the core through the [`input`]
//! key enumeration, the [`registry`] tables, and the [`persistence`]
//! hooks.
//!
//! # Layers
//!
//! - [`model::cell`] — one character position, packed and validated
//! - [`model::line`] — a growable sequence of cells
//! - [`model::document`] — lines + cursor + selection + mode, mediating
//!   all mutation through the journal
//! - [`model::history`] — the undo journal: linear, grouped, position-based
//! - [`syntax`] — per-line scan-state highlighting with bounded
//!   recomputation

pub mod config;
pub mod error;
pub mod input;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod syntax;

pub use config::Config;
pub use error::CoreError;
pub use model::cell::{Cell, CellFlags, HighlightKind, Overlay};
pub use model::document::{
    CursorPos, Direction, Document, LineEnding, Mode, Selection, SelectionShape,
};
pub use model::history::{Edit, Journal, JournalEntry};
pub use model::line::{Line, RevStatus};
pub use syntax::engine::{recompute_from, ScanCursor, INITIAL_STATE};
pub use syntax::registry::{ScanFn, SyntaxDefinition, SyntaxRegistry};
