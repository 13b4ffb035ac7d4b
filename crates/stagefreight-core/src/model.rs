//! The shared data model: `Dependency`, `VulnInfo`, `Finding`, `TagInfo` and
//! `RetentionPolicy`, plus the cache key/entry shape the lint engine persists.

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// A named software distribution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ecosystem {
    DockerImage,
    DockerTool,
    #[serde(rename = "gomod")]
    GoMod,
    Cargo,
    Npm,
    AlpineApk,
    DebianApt,
    Pip,
}

impl Ecosystem {
    /// Whether this ecosystem's dependencies can be auto-updated in place
    /// (§4.7: only Docker images, Docker tools, and Go modules qualify).
    pub fn is_auto_updatable(self) -> bool {
        matches!(self, Ecosystem::DockerImage | Ecosystem::DockerTool | Ecosystem::GoMod)
    }

    /// The OSV ecosystem name this maps to, if any (docker-* is unmapped).
    pub fn osv_ecosystem(self) -> Option<&'static str> {
        match self {
            Ecosystem::GoMod => Some("Go"),
            Ecosystem::Npm => Some("npm"),
            Ecosystem::Pip => Some("PyPI"),
            Ecosystem::Cargo => Some("crates.io"),
            Ecosystem::AlpineApk => Some("Alpine"),
            Ecosystem::DebianApt => Some("Debian"),
            Ecosystem::DockerImage | Ecosystem::DockerTool => None,
        }
    }
}

/// Severity scale shared by vulnerability findings (OSV/CVSS) and rule-engine
/// escalation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VulnSeverity {
    Unknown,
    Low,
    Moderate,
    High,
    Critical,
}

/// One vulnerability correlated against a `Dependency`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnInfo {
    pub id: String,
    pub summary: String,
    pub severity: VulnSeverity,
    pub fixed_in: Option<String>,
}

/// A version-pinned reference extracted from a project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
    pub ecosystem: Ecosystem,
    pub file_path: String,
    pub line_number: usize,
    pub indirect: bool,
    pub source_url: Option<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<VulnInfo>,
    pub advisory: Option<String>,
}

impl Dependency {
    /// Whether `current_version == latest_version` (ordinary string
    /// equality; version algebra handles semantic "no update available").
    pub fn is_up_to_date(&self) -> bool {
        !self.latest_version.is_empty() && self.current_version == self.latest_version
    }

    pub fn has_vulnerabilities(&self) -> bool {
        !self.vulnerabilities.is_empty()
    }
}

/// Container-registry tag metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub digest: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// An additive retention policy; non-negative counts per time bucket.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_last: u32,
    pub keep_daily: u32,
    pub keep_weekly: u32,
    pub keep_monthly: u32,
    pub keep_yearly: u32,
}

impl RetentionPolicy {
    pub fn is_active(&self) -> bool {
        self.keep_last > 0
            || self.keep_daily > 0
            || self.keep_weekly > 0
            || self.keep_monthly > 0
            || self.keep_yearly > 0
    }
}

// Accepts either a bare scalar (shorthand for `keep_last`) or the full
// struct form in serialized configuration.
impl<'de> Deserialize<'de> for RetentionPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shorthand {
            Scalar(u32),
            Full {
                #[serde(default)]
                keep_last: u32,
                #[serde(default)]
                keep_daily: u32,
                #[serde(default)]
                keep_weekly: u32,
                #[serde(default)]
                keep_monthly: u32,
                #[serde(default)]
                keep_yearly: u32,
            },
        }

        Ok(match Shorthand::deserialize(deserializer)? {
            Shorthand::Scalar(keep_last) => RetentionPolicy {
                keep_last,
                ..Default::default()
            },
            Shorthand::Full {
                keep_last,
                keep_daily,
                keep_weekly,
                keep_monthly,
                keep_yearly,
            } => RetentionPolicy {
                keep_last,
                keep_daily,
                keep_weekly,
                keep_monthly,
                keep_yearly,
            },
        })
    }
}

/// Diagnostic severity for lint findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Info,
    Warning,
    Critical,
}

/// One diagnostic emitted by a lint module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub module: String,
    pub severity: FindingSeverity,
    pub message: String,
}

/// A cached lint result, keyed by [`cache_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub findings: Vec<Finding>,
    pub cached_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// SHA-256 of `content ‖ module_name ‖ module_config_json ‖ schema_version`,
/// hex-encoded, per the cache key contract in the data model.
pub fn cache_key(content: &str, module_name: &str, module_config_json: &str, schema_version: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(module_name.as_bytes());
    hasher.update(module_config_json.as_bytes());
    hasher.update(schema_version.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_policy_scalar_shorthand() {
        let policy: RetentionPolicy = serde_json::from_str("3").unwrap();
        assert_eq!(policy.keep_last, 3);
        assert_eq!(policy.keep_daily, 0);
    }

    #[test]
    fn retention_policy_full_struct() {
        let policy: RetentionPolicy =
            serde_json::from_str(r#"{"keep_last":3,"keep_daily":7}"#).unwrap();
        assert_eq!(policy.keep_last, 3);
        assert_eq!(policy.keep_daily, 7);
        assert_eq!(policy.keep_weekly, 0);
    }

    #[test]
    fn retention_policy_active_iff_any_field_positive() {
        assert!(!RetentionPolicy::default().is_active());
        assert!(RetentionPolicy { keep_yearly: 1, ..Default::default() }.is_active());
    }

    #[test]
    fn cache_key_is_stable_and_sensitive_to_every_component() {
        let k1 = cache_key("content", "module", "{}", 1);
        let k2 = cache_key("content", "module", "{}", 1);
        assert_eq!(k1, k2);

        let k3 = cache_key("other", "module", "{}", 1);
        assert_ne!(k1, k3);

        let k4 = cache_key("content", "other-module", "{}", 1);
        assert_ne!(k1, k4);

        let k5 = cache_key("content", "module", "{}", 2);
        assert_ne!(k1, k5);
    }

    #[test]
    fn dependency_up_to_date() {
        let dep = Dependency {
            name: "serde".into(),
            current_version: "1.0.0".into(),
            latest_version: "1.0.0".into(),
            ecosystem: Ecosystem::Cargo,
            file_path: "Cargo.toml".into(),
            line_number: 3,
            indirect: false,
            source_url: None,
            vulnerabilities: vec![],
            advisory: None,
        };
        assert!(dep.is_up_to_date());
        assert!(!dep.has_vulnerabilities());
    }

    #[test]
    fn ecosystem_auto_updatable_matches_spec() {
        assert!(Ecosystem::DockerImage.is_auto_updatable());
        assert!(Ecosystem::DockerTool.is_auto_updatable());
        assert!(Ecosystem::GoMod.is_auto_updatable());
        assert!(!Ecosystem::Cargo.is_auto_updatable());
        assert!(!Ecosystem::Npm.is_auto_updatable());
        assert!(!Ecosystem::Pip.is_auto_updatable());
    }

    #[test]
    fn ecosystem_osv_mapping() {
        assert_eq!(Ecosystem::GoMod.osv_ecosystem(), Some("Go"));
        assert_eq!(Ecosystem::DockerImage.osv_ecosystem(), None);
    }
}
