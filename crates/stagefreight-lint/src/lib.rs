pub mod cache;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod module;
pub mod walk;

pub use engine::{EngineConfig, EngineReport, ModuleStats, run};
pub use error::{LintError, Result};
pub use freshness::FreshnessModule;
pub use module::{CacheTtl, Module, ModuleRegistry};
