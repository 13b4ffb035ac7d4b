//! Strict, schema-versioned YAML configuration loading.
//!
//! Grounded on the teacher's `DepsConfig` (`serde(default = "fn")` fields,
//! loaded once at startup) generalized to this toolkit's versioned-schema
//! contract: a `version: 1` field is mandatory, unknown fields are a hard
//! error, and a handful of deprecated field names are accepted through an
//! alias pass that surfaces a warning instead of silently renaming.

use crate::error::{CoreError, Result};
use crate::model::RetentionPolicy;
use crate::pattern::PolicyMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

fn default_min_severity() -> String {
    "moderate".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

/// One ecosystem's endpoint override: a configurable base URL and an
/// optional environment variable whose value becomes a `Bearer` token.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct EcosystemOverride {
    pub base_url: Option<String>,
    pub auth_env: Option<String>,
}

/// Vulnerability-correlator configuration (§4.4).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VulnConfig {
    #[serde(default = "default_min_severity")]
    pub min_severity: String,
}

impl Default for VulnConfig {
    fn default() -> Self {
        Self { min_severity: default_min_severity() }
    }
}

/// Release-badge output configuration; `file` is a deprecated alias for
/// `output`, applied during [`load`] and surfaced as a warning.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BadgeConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// Major/minor/patch update-gap tolerance; a non-zero axis means "allow up
/// to N versions of drift on this axis before it's a finding".
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToleranceConfig {
    #[serde(default)]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub patch: u32,
}

/// One rule-engine package rule (§4.5): matches when every specified field
/// matches (AND); a match may override severity, disable the dependency,
/// tag it with a group, or mark it for automerge.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageRuleConfig {
    #[serde(default)]
    pub match_packages: Vec<String>,
    #[serde(default)]
    pub match_ecosystems: Vec<String>,
    #[serde(default)]
    pub match_update_types: Vec<String>,
    #[serde(default)]
    pub match_vulnerability: Option<bool>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub automerge: Option<bool>,
}

/// Top-level, schema-versioned configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagefreightConfig {
    pub version: i64,
    #[serde(default)]
    pub policies: PolicyMap,
    #[serde(default)]
    pub ecosystems: HashMap<String, EcosystemOverride>,
    #[serde(default)]
    pub vuln: VulnConfig,
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub badge: BadgeConfig,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub rules: Vec<PackageRuleConfig>,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
}

/// A loaded config paired with any deprecation-alias warnings raised while
/// normalizing it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: StagefreightConfig,
    pub warnings: Vec<String>,
}

const SUPPORTED_SCHEMA_VERSION: i64 = 1;

/// Loads and validates a config document from `path`.
///
/// A missing or mismatched `version` field is a hard
/// [`CoreError::UnsupportedSchema`] error with a migration hint. Unknown
/// fields fail the load (strict decoding, via `deny_unknown_fields`).
/// Deprecated field aliases are applied and returned as warnings rather
/// than failing.
pub fn load(path: &Path) -> Result<LoadedConfig> {
    let raw = std::fs::read_to_string(path)?;
    load_str(&raw)
}

/// As [`load`], but reads from an in-memory YAML string.
pub fn load_str(raw: &str) -> Result<LoadedConfig> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw)?;

    let version = value
        .get("version")
        .and_then(serde_yaml::Value::as_i64);
    match version {
        Some(v) if v == SUPPORTED_SCHEMA_VERSION => {}
        Some(v) => {
            return Err(CoreError::UnsupportedSchema {
                found: v,
                hint: format!("only schema version {SUPPORTED_SCHEMA_VERSION} is supported"),
            });
        }
        None => {
            return Err(CoreError::UnsupportedSchema {
                found: 0,
                hint: format!("add `version: {SUPPORTED_SCHEMA_VERSION}` at the document root"),
            });
        }
    }

    let mut config: StagefreightConfig = serde_yaml::from_value(value)?;
    let mut warnings = Vec::new();

    if let Some(file) = config.badge.file.take() {
        warnings.push("config key `badge.file` is deprecated; use `badge.output` instead".to_string());
        if config.badge.output.is_none() {
            config.badge.output = Some(file);
        }
    }

    Ok(LoadedConfig { config, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_version_is_unsupported_schema_with_hint() {
        let err = load_str("policies: {}\n").unwrap_err();
        match err {
            CoreError::UnsupportedSchema { found: 0, hint } => {
                assert!(hint.contains("version: 1"));
            }
            other => panic!("expected UnsupportedSchema, got {other:?}"),
        }
    }

    #[test]
    fn wrong_version_is_rejected() {
        let err = load_str("version: 2\n").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedSchema { found: 2, .. }));
    }

    #[test]
    fn unknown_field_fails_strict_decode() {
        let err = load_str("version: 1\nbogus_field: true\n").unwrap_err();
        assert!(matches!(err, CoreError::Yaml(_)));
    }

    #[test]
    fn defaults_apply_when_sections_absent() {
        let loaded = load_str("version: 1\n").unwrap();
        assert_eq!(loaded.config.vuln.min_severity, "moderate");
        assert_eq!(loaded.config.http_timeout_secs, 10);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn badge_file_alias_migrates_to_output_with_warning() {
        let loaded = load_str("version: 1\nbadge:\n  file: badge.svg\n").unwrap();
        assert_eq!(loaded.config.badge.output.as_deref(), Some("badge.svg"));
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("deprecated"));
    }

    #[test]
    fn explicit_output_wins_over_file_alias() {
        let loaded = load_str(
            "version: 1\nbadge:\n  file: old.svg\n  output: new.svg\n",
        )
        .unwrap();
        assert_eq!(loaded.config.badge.output.as_deref(), Some("new.svg"));
    }

    #[test]
    fn policy_map_and_ecosystem_overrides_parse() {
        let loaded = load_str(
            "version: 1\npolicies:\n  main: \"^main$\"\necosystems:\n  gomod:\n    base_url: https://proxy.example.com\n    auth_env: GOPROXY_TOKEN\n",
        )
        .unwrap();
        assert_eq!(loaded.config.policies.get("main").unwrap(), "^main$");
        let go_mod = loaded.config.ecosystems.get("gomod").unwrap();
        assert_eq!(go_mod.base_url.as_deref(), Some("https://proxy.example.com"));
    }
}
