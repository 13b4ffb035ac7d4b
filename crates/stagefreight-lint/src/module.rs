//! The `Module` trait and the explicit registry that replaces the
//! teacher's process-wide `lint.Register(name, constructor)` pattern with a
//! registry the embedding caller builds and owns.

use crate::error::Result;
use async_trait::async_trait;
use stagefreight_core::Finding;
use std::path::Path;

/// A cache-TTL policy a module declares for its own findings (§4.6): a
/// negative value means never cache, zero means cache forever, positive is
/// an expiry in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    Never,
    Forever,
    ExpiresAfterSecs(u64),
}

/// One lint/freshness check, run once per matching file.
#[async_trait]
pub trait Module: Send + Sync {
    /// Stable identifier used in the cache key and in `Finding::module`.
    fn name(&self) -> &str;

    /// Cache-TTL policy for this module's findings.
    fn cache_ttl(&self) -> CacheTtl {
        CacheTtl::ExpiresAfterSecs(3600)
    }

    /// Schema version folded into the cache key; bump when a module's
    /// finding shape or semantics change incompatibly.
    fn schema_version(&self) -> u32 {
        1
    }

    /// The module's configuration, serialized for inclusion in the cache
    /// key — two differently-configured runs of the same module must not
    /// collide on the same cache entry.
    fn config_json(&self) -> String {
        "{}".to_string()
    }

    /// Whether this module claims `path` at all (by extension/basename);
    /// files it doesn't claim are never dispatched to `check`.
    fn claims(&self, path: &Path) -> bool;

    /// Runs the check against one file's content, returning its findings.
    async fn check(&self, path: &Path, content: &str) -> Result<Vec<Finding>>;
}

/// An explicit, caller-constructed set of modules to dispatch against —
/// never a global registry.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, module: Box<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn modules(&self) -> &[Box<dyn Module>] {
        &self.modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Module for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn claims(&self, _path: &Path) -> bool {
            true
        }

        async fn check(&self, _path: &Path, _content: &str) -> Result<Vec<Finding>> {
            Ok(vec![])
        }
    }

    #[test]
    fn registry_holds_registered_modules_in_order() {
        let registry = ModuleRegistry::new().register(Box::new(Noop)).register(Box::new(Noop));
        assert_eq!(registry.modules().len(), 2);
    }
}
