use thiserror::Error;

/// Error type shared by the module registry, cache and dispatch engine.
#[derive(Error, Debug)]
pub enum LintError {
    #[error("module {module} failed on {file}: {reason}")]
    ModuleFailed { module: String, file: String, reason: String },

    #[error(transparent)]
    Freshness(#[from] stagefreight_freshness::FreshnessError),

    #[error(transparent)]
    Core(#[from] stagefreight_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LintError>;
