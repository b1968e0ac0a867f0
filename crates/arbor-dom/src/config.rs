//! DOM Configuration

/// Tree-wide settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomConfig {
    /// Deepest reaction scope nesting before scopes stop being pushed.
    ///
    /// Past this depth, reactions queued by a callback join the enclosing
    /// scope instead of running in a scope of their own.
    pub max_reaction_depth: usize,
}

impl Default for DomConfig {
    fn default() -> Self {
        Self {
            max_reaction_depth: 256,
        }
    }
}

impl DomConfig {
    pub fn with_max_reaction_depth(mut self, depth: usize) -> Self {
        self.max_reaction_depth = depth;
        self
    }
}
