//! Action and theme registration.
//!
//! Both tables are process-wide and append-only, but they are ordinary
//! objects populated by an explicit initialization routine at startup;
//! nothing registers itself from link-time side effects. The command
//! dispatcher (external) looks actions up here to invoke editing
//! operations; the renderer (external) resolves theme names here. Color
//! values themselves are a rendering concern and never enter the core.

use bitflags::bitflags;

use crate::error::CoreError;
use crate::input::keys::Key;
use crate::model::document::Document;

bitflags! {
    /// How an action expects to receive its argument.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    pub struct ActionOptions: u8 {
        /// The action consumes the key that triggered it.
        const TAKES_KEY = 1 << 0;
        /// The action takes a caller-supplied argument.
        const TAKES_ARGUMENT = 1 << 1;
        /// The dispatcher must prompt the user for the argument.
        const PROMPTS = 1 << 2;
    }
}

/// Input handed to an action by the dispatcher, per its option flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionInput<'a> {
    None,
    Key(Key),
    Argument(&'a str),
}

/// An editing operation invokable by name.
pub type ActionFn = fn(&mut Document, ActionInput<'_>) -> Result<(), CoreError>;

/// A registered action.
pub struct ActionDef {
    pub name: &'static str,
    pub action: ActionFn,
    pub options: ActionOptions,
    pub description: &'static str,
}

impl std::fmt::Debug for ActionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDef")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("description", &self.description)
            .finish()
    }
}

/// Loads a theme's colors into the renderer. Opaque to the core.
pub type ThemeLoader = fn();

/// A registered theme.
#[derive(Clone, Copy)]
pub struct ThemeDef {
    pub name: &'static str,
    pub load: ThemeLoader,
}

impl std::fmt::Debug for ThemeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeDef").field("name", &self.name).finish()
    }
}

/// The process-wide action and theme tables.
#[derive(Debug, Default)]
pub struct Registry {
    actions: Vec<ActionDef>,
    themes: Vec<ThemeDef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action the dispatcher can invoke by name.
    pub fn register_action(
        &mut self,
        name: &'static str,
        action: ActionFn,
        options: ActionOptions,
        description: &'static str,
    ) {
        tracing::debug!(name, "registering action");
        self.actions.push(ActionDef {
            name,
            action,
            options,
            description,
        });
    }

    /// Register a theme loader by name.
    pub fn register_theme(&mut self, name: &'static str, load: ThemeLoader) {
        tracing::debug!(name, "registering theme");
        self.themes.push(ThemeDef { name, load });
    }

    /// Look an action up by name; later registrations shadow earlier ones.
    pub fn action(&self, name: &str) -> Option<&ActionDef> {
        self.actions.iter().rev().find(|a| a.name == name)
    }

    /// Look a theme up by name.
    pub fn theme(&self, name: &str) -> Option<&ThemeDef> {
        self.themes.iter().rev().find(|t| t.name == name)
    }

    pub fn actions(&self) -> &[ActionDef] {
        &self.actions
    }

    pub fn themes(&self) -> &[ThemeDef] {
        &self.themes
    }
}
