//! Syntax definitions and their registry.
//!
//! A definition is immutable and shared: many documents reference the same
//! `Arc<SyntaxDefinition>`. The registry is an explicit object populated by
//! an initialization routine at startup — registration is append-only and
//! nothing runs before `main`.

use std::path::Path;
use std::sync::Arc;

use crate::syntax::engine::ScanCursor;

/// A language's scan function.
///
/// Called repeatedly over one line; each call classifies at least one cell
/// (via the cursor's paint helpers) and returns the state to carry into the
/// next call. The value returned at end of line becomes the line's cached
/// `istate`, seeding the next line's scan.
pub type ScanFn = fn(&mut ScanCursor<'_>) -> i32;

/// Everything the engine needs to highlight one language.
pub struct SyntaxDefinition {
    /// Language name, used for explicit assignment.
    pub name: &'static str,
    /// File extensions this language claims.
    pub extensions: &'static [&'static str],
    /// The per-line scan function.
    pub scan: ScanFn,
    /// Whether this language indents with spaces rather than tabs.
    pub prefers_spaces: bool,
}

impl std::fmt::Debug for SyntaxDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxDefinition")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("prefers_spaces", &self.prefers_spaces)
            .finish()
    }
}

/// Append-only registry of syntax definitions.
#[derive(Debug, Default)]
pub struct SyntaxRegistry {
    definitions: Vec<Arc<SyntaxDefinition>>,
}

impl SyntaxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Later registrations win name collisions so a
    /// user-supplied language can shadow a built-in one.
    pub fn register(&mut self, definition: SyntaxDefinition) -> Arc<SyntaxDefinition> {
        tracing::debug!(name = definition.name, "registering syntax");
        let definition = Arc::new(definition);
        self.definitions.push(definition.clone());
        definition
    }

    /// Look a definition up by its registered name.
    pub fn by_name(&self, name: &str) -> Option<Arc<SyntaxDefinition>> {
        self.definitions
            .iter()
            .rev()
            .find(|d| d.name == name)
            .cloned()
    }

    /// Pick a definition for a file path by extension.
    pub fn for_path(&self, path: &Path) -> Option<Arc<SyntaxDefinition>> {
        let ext = path.extension()?.to_str()?;
        self.definitions
            .iter()
            .rev()
            .find(|d| d.extensions.iter().any(|e| *e == ext))
            .cloned()
    }

    /// Registered definitions, in registration order.
    pub fn definitions(&self) -> &[Arc<SyntaxDefinition>] {
        &self.definitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough(cursor: &mut ScanCursor<'_>) -> i32 {
        cursor.skip(1);
        0
    }

    fn definition(name: &'static str, extensions: &'static [&'static str]) -> SyntaxDefinition {
        SyntaxDefinition {
            name,
            extensions,
            scan: passthrough,
            prefers_spaces: true,
        }
    }

    #[test]
    fn lookup_by_name_and_extension() {
        let mut registry = SyntaxRegistry::new();
        registry.register(definition("rust", &["rs"]));
        registry.register(definition("c", &["c", "h"]));

        assert_eq!(registry.by_name("c").unwrap().name, "c");
        assert!(registry.by_name("ada").is_none());
        assert_eq!(
            registry.for_path(Path::new("src/main.rs")).unwrap().name,
            "rust"
        );
        assert_eq!(registry.for_path(Path::new("list.h")).unwrap().name, "c");
        assert!(registry.for_path(Path::new("notes.txt")).is_none());
    }

    #[test]
    fn later_registration_shadows_earlier() {
        let mut registry = SyntaxRegistry::new();
        registry.register(definition("rust", &["rs"]));
        registry.register(definition("rust", &["rs"]));
        assert_eq!(registry.definitions().len(), 2);
        assert!(Arc::ptr_eq(
            &registry.by_name("rust").unwrap(),
            &registry.definitions()[1]
        ));
    }
}
