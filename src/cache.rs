/*!
The pattern cache.

Compiling is much more expensive than matching, so callers that build
patterns from strings repeatedly go through an [`Engine`]: a handle
owning a cache of compiled patterns keyed by their source string. This
replaces hidden process-global state — create an engine where you need
one, share the `Arc`ed patterns it hands out, and drop it to release
everything it cached.
*/

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::re::Pattern;

/// A cache of compiled patterns keyed by source string.
#[derive(Debug, Default)]
pub struct Engine {
    patterns: HashMap<String, Arc<Pattern>>,
}

impl Engine {
    /// Create an engine with an empty cache.
    pub fn new() -> Engine {
        Engine::default()
    }

    /// Compile a pattern through the cache: the same source string is
    /// only ever compiled once per engine.
    pub fn compile(&mut self, pattern: &str) -> Result<Arc<Pattern>, Error> {
        if let Some(found) = self.patterns.get(pattern) {
            return Ok(Arc::clone(found));
        }
        let compiled = Arc::new(Pattern::new(pattern)?);
        self.patterns.insert(pattern.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Compile (through the cache) and search.
    pub fn is_match(&mut self, pattern: &str, haystack: &str) -> Result<bool, Error> {
        Ok(self.compile(pattern)?.search(haystack).is_some())
    }

    /// Compile (through the cache) and test the entire input.
    pub fn is_entire_match(
        &mut self,
        pattern: &str,
        haystack: &str,
    ) -> Result<bool, Error> {
        Ok(self.compile(pattern)?.entire(haystack).is_some())
    }

    /// The number of patterns currently cached.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the cache holds no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Drop every cached pattern. Handed-out `Arc`s stay valid.
    pub fn clear(&mut self) {
        self.patterns.clear();
    }
}
