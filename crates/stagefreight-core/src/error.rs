use thiserror::Error;

/// Core error type shared by the pattern engine, version algebra, cache,
/// config loader and retention engine.
///
/// # Examples
///
/// ```
/// use stagefreight_core::error::CoreError;
///
/// let err = CoreError::InvalidPattern("re:(".into());
/// assert!(err.to_string().contains("invalid pattern"));
/// ```
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("config validation failed: {0}")]
    Validation(String),

    #[error("unsupported config schema version {found}; expected 1 (hint: {hint})")]
    UnsupportedSchema { found: i64, hint: String },

    #[error("retention policy is not active")]
    InactivePolicy,

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

/// Convenience alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Aggregates multiple validation failures into a single semicolon-joined
/// error, per the error-handling design's "Validation errors" contract.
pub fn aggregate_validation(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_validation_empty_is_ok() {
        assert!(aggregate_validation(vec![]).is_ok());
    }

    #[test]
    fn aggregate_validation_joins_with_semicolons() {
        let err = aggregate_validation(vec!["a bad".into(), "b bad".into()]).unwrap_err();
        assert_eq!(err.to_string(), "config validation failed: a bad; b bad");
    }

    #[test]
    fn unsupported_schema_message() {
        let err = CoreError::UnsupportedSchema {
            found: 0,
            hint: "add `version: 1`".into(),
        };
        assert!(err.to_string().contains("add `version: 1`"));
    }
}
