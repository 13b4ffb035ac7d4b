//! Shared primitives used by every other `stagefreight` crate: the data
//! model, the pattern/policy matcher, version algebra, the HTTP cache,
//! config loading, and the retention engine.

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod pattern;
pub mod retention;
pub mod version;

pub use error::{CoreError, Result};
pub use model::{
    CacheEntry, Dependency, Ecosystem, Finding, FindingSeverity, RetentionPolicy, TagInfo,
    VulnInfo, VulnSeverity, cache_key,
};
pub use pattern::{Condition, matches as pattern_matches, match_patterns};
pub use version::{DecomposedTag, UpdateDelta, UpdateType, decompose, tag_newer};
