//! Editing configuration.
//!
//! The original design kept these knobs in process-global state; here they
//! travel in an explicit `Config` value held by each [`Document`], so tests
//! and embedders can run documents with different settings side by side.
//!
//! [`Document`]: crate::model::document::Document

use serde::{Deserialize, Serialize};

/// Behavior settings consumed by the editing core.
///
/// Only the knobs the core itself reads live here; rendering and terminal
/// capability settings belong to the (external) front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display width of a tab character, in cells.
    #[serde(default = "default_tab_stop")]
    pub tab_stop: u8,

    /// Copy the previous line's leading whitespace when opening or
    /// splitting lines.
    #[serde(default = "default_true")]
    pub auto_indent: bool,

    /// Record edits in the undo journal. Disabling this makes every edit
    /// permanent and `is_modified` sticky until save.
    #[serde(default = "default_true")]
    pub history_enabled: bool,

    /// Case-insensitive search unless the needle contains an uppercase
    /// codepoint.
    #[serde(default = "default_true")]
    pub smart_case: bool,
}

fn default_tab_stop() -> u8 {
    4
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tab_stop: default_tab_stop(),
            auto_indent: true,
            history_enabled: true,
            smart_case: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.tab_stop, 4);
        assert!(config.auto_indent);
        assert!(config.history_enabled);
    }

    #[test]
    fn partial_config_overrides() {
        let config: Config =
            serde_json::from_str(r#"{"tab_stop": 8, "auto_indent": false}"#).unwrap();
        assert_eq!(config.tab_stop, 8);
        assert!(!config.auto_indent);
        assert!(config.history_enabled);
    }
}
