use thiserror::Error;

/// Error type shared by ecosystem parsers, resolvers, the vulnerability
/// correlator and the rule engine.
#[derive(Error, Debug)]
pub enum FreshnessError {
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error(transparent)]
    Core(#[from] stagefreight_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("registry request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {method} {url}: {body_truncated}")]
    HttpStatus {
        status: u16,
        method: String,
        url: String,
        body_truncated: String,
    },
}

pub type Result<T> = std::result::Result<T, FreshnessError>;
