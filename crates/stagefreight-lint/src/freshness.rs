//! Wraps the whole freshness pipeline — parse, resolve, correlate, rule
//! engine — behind a single [`Module`] implementation so the engine's
//! content-addressed dispatch and caching apply to it just like any other
//! check.

use crate::error::{LintError, Result};
use crate::module::{CacheTtl, Module};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

use stagefreight_core::cache::HttpCache;
use stagefreight_core::config::{EcosystemOverride, PackageRuleConfig, StagefreightConfig, ToleranceConfig};
use stagefreight_core::version::{UpdateType, apk_delta, apt_delta, semver_delta};
use stagefreight_core::{Ecosystem, Finding, VulnSeverity};

use stagefreight_freshness::ecosystems::cargo::CargoEcosystem;
use stagefreight_freshness::ecosystems::docker::DockerEcosystem;
use stagefreight_freshness::ecosystems::gomod::GoModEcosystem;
use stagefreight_freshness::ecosystems::npm::NpmEcosystem;
use stagefreight_freshness::ecosystems::pip::PipEcosystem;
use stagefreight_freshness::ecosystems::{EndpointConfig, Parser, Resolver, dispatch_ecosystem};
use stagefreight_freshness::rules::{self, CompiledRuleHandle};
use stagefreight_freshness::vuln;

fn parse_vuln_severity(label: &str) -> VulnSeverity {
    match label.to_lowercase().as_str() {
        "critical" => VulnSeverity::Critical,
        "high" => VulnSeverity::High,
        "moderate" | "medium" => VulnSeverity::Moderate,
        "low" => VulnSeverity::Low,
        _ => VulnSeverity::Unknown,
    }
}

fn dominant_update_type(ecosystem: Ecosystem, current: &str, latest: &str) -> Option<UpdateType> {
    let delta = match ecosystem {
        Ecosystem::AlpineApk => apk_delta(current, latest),
        Ecosystem::DebianApt => apt_delta(current, latest),
        _ => semver_delta(current, latest),
    };
    delta.and_then(|d| d.dominant())
}

pub struct FreshnessModule {
    http_cache: HttpCache,
    client: reqwest::Client,
    ecosystems_config: HashMap<String, EcosystemOverride>,
    ignore: Vec<String>,
    rules_config: Vec<PackageRuleConfig>,
    rules: Vec<CompiledRuleHandle>,
    tolerance: ToleranceConfig,
    min_severity: VulnSeverity,
}

impl FreshnessModule {
    pub fn new(config: &StagefreightConfig, http_cache: HttpCache, client: reqwest::Client) -> Self {
        Self {
            http_cache,
            client,
            ecosystems_config: config.ecosystems.clone(),
            ignore: config.ignore.clone(),
            rules_config: config.rules.clone(),
            rules: rules::compile_rules(&config.rules),
            tolerance: config.tolerance,
            min_severity: parse_vuln_severity(&config.vuln.min_severity),
        }
    }

    fn endpoint_for(&self, name: &str) -> EndpointConfig {
        self.ecosystems_config
            .get(name)
            .map(|o| EndpointConfig { base_url: o.base_url.clone(), auth_env: o.auth_env.clone() })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Module for FreshnessModule {
    fn name(&self) -> &str {
        "freshness"
    }

    fn cache_ttl(&self) -> CacheTtl {
        CacheTtl::ExpiresAfterSecs(3600)
    }

    fn config_json(&self) -> String {
        serde_json::json!({
            "ignore": self.ignore,
            "tolerance": {
                "major": self.tolerance.major,
                "minor": self.tolerance.minor,
                "patch": self.tolerance.patch,
            },
            "min_severity": format!("{:?}", self.min_severity),
            "rules": format!("{:?}", self.rules_config),
        })
        .to_string()
    }

    fn claims(&self, path: &Path) -> bool {
        dispatch_ecosystem(path).is_some()
    }

    async fn check(&self, path: &Path, content: &str) -> Result<Vec<Finding>> {
        let Some(ecosystem) = dispatch_ecosystem(path) else {
            return Ok(Vec::new());
        };

        let mut deps = match ecosystem {
            Ecosystem::Cargo => CargoEcosystem::new(self.endpoint_for("cargo")).parse(path, content),
            Ecosystem::Npm => NpmEcosystem::new(self.endpoint_for("npm")).parse(path, content),
            Ecosystem::Pip => PipEcosystem::new(self.endpoint_for("pip")).parse(path, content),
            Ecosystem::GoMod => GoModEcosystem::new(self.endpoint_for("gomod")).parse(path, content),
            Ecosystem::DockerImage | Ecosystem::DockerTool => {
                DockerEcosystem::new(self.endpoint_for("docker")).parse(path, content)
            }
            Ecosystem::AlpineApk | Ecosystem::DebianApt => Ok(Vec::new()),
        }
        .map_err(|e| LintError::ModuleFailed {
            module: self.name().to_string(),
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

        deps.retain(|d| !rules::is_ignored(&self.ignore, &d.name));

        for dep in &mut deps {
            let result = match dep.ecosystem {
                Ecosystem::Cargo => {
                    CargoEcosystem::new(self.endpoint_for("cargo")).resolve_latest(&self.http_cache, dep).await
                }
                Ecosystem::Npm => {
                    NpmEcosystem::new(self.endpoint_for("npm")).resolve_latest(&self.http_cache, dep).await
                }
                Ecosystem::Pip => {
                    PipEcosystem::new(self.endpoint_for("pip")).resolve_latest(&self.http_cache, dep).await
                }
                Ecosystem::GoMod => {
                    GoModEcosystem::new(self.endpoint_for("gomod")).resolve_latest(&self.http_cache, dep).await
                }
                Ecosystem::DockerImage | Ecosystem::DockerTool => {
                    DockerEcosystem::new(self.endpoint_for("docker")).resolve_latest(&self.http_cache, dep).await
                }
                Ecosystem::AlpineApk | Ecosystem::DebianApt => Ok((dep.current_version.clone(), None)),
            };

            let (latest, source_url) = result.map_err(|e| LintError::ModuleFailed {
                module: self.name().to_string(),
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
            dep.latest_version = latest;
            dep.source_url = source_url;
        }

        vuln::correlate(&self.client, &mut deps, self.min_severity).await;

        let mut findings = Vec::new();
        for dep in &deps {
            let dominant = dominant_update_type(dep.ecosystem, &dep.current_version, &dep.latest_version);
            let outcome = rules::evaluate_rules(&self.rules, dep, dominant);
            if !outcome.enabled {
                continue;
            }
            findings.extend(rules::findings_for(dep, &outcome, &self.tolerance));
        }

        if matches!(ecosystem, Ecosystem::DockerImage | Ecosystem::DockerTool) {
            let parsed = stagefreight_freshness::ecosystems::docker::parser::parse_dockerfile(content);
            let docker = DockerEcosystem::new(self.endpoint_for("docker"));
            let extra = docker.check_package_installs(&self.client, &parsed, &path.display().to_string()).await;
            findings.extend(extra);
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_module() -> FreshnessModule {
        let config = StagefreightConfig {
            version: 1,
            policies: Default::default(),
            ecosystems: HashMap::new(),
            vuln: Default::default(),
            retention: Default::default(),
            badge: Default::default(),
            cache_dir: None,
            http_timeout_secs: 10,
            ignore: vec!["ignored-pkg".to_string()],
            rules: vec![],
            tolerance: ToleranceConfig::default(),
        };
        let client = reqwest::Client::new();
        let http_cache = HttpCache::new(client.clone(), Duration::from_secs(60));
        FreshnessModule::new(&config, http_cache, client)
    }

    #[test]
    fn claims_known_manifests_only() {
        let module = test_module();
        assert!(module.claims(Path::new("Cargo.toml")));
        assert!(!module.claims(Path::new("README.md")));
    }

    #[tokio::test]
    async fn ignored_packages_never_resolve_or_emit_findings() {
        let module = test_module();
        let manifest = "[package]\nname = \"x\"\nversion = \"0.1.0\"\n\n[dependencies]\nignored-pkg = \"1.0.0\"\n";
        let findings = module.check(Path::new("Cargo.toml"), manifest).await.unwrap();
        assert!(findings.is_empty());
    }
}
