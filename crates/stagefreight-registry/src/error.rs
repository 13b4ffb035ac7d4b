use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("unknown registry provider: {0}")]
    UnknownProvider(String),

    #[error("missing credentials: expected {0}_USER/{0}_PASS")]
    MissingCredentials(String),

    #[error("registry request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {method} {url}: {body_truncated}")]
    HttpStatus { status: u16, method: String, url: String, body_truncated: String },

    #[error("permission denied (403) for {method} {url}: {body_truncated}")]
    Forbidden { method: String, url: String, body_truncated: String },

    #[error("unexpected response shape from {0}: {1}")]
    UnexpectedResponse(String, String),

    #[error("local docker command failed: {0}")]
    LocalDocker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] stagefreight_core::CoreError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
