//! The Docker pipeline: `Dockerfile` base images and pinned tools, plus the
//! nested Alpine APK and Debian APT sub-checkers and the digest lock.
//! These have no standalone manifest file — they're only reachable by
//! detecting the base image a `Dockerfile` resolves to.

pub mod apk;
pub mod apt;
pub mod base_images;
pub mod digest_lock;
pub mod parser;
pub mod pinned_tools;

use super::{EndpointConfig, Parser, Resolver};
use crate::error::Result;
use async_trait::async_trait;
use parser::DockerfileParse;
use stagefreight_core::cache::HttpCache;
use stagefreight_core::version::newest_in_family;
use stagefreight_core::{Dependency, Ecosystem, Finding, FindingSeverity};
use std::path::Path;

pub struct DockerEcosystem {
    pub endpoint: EndpointConfig,
}

impl DockerEcosystem {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }
}

impl Parser for DockerEcosystem {
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<Dependency>> {
        let parsed = parser::parse_dockerfile(content);
        let file_path = path.display().to_string();
        let mut deps = Vec::new();

        let aliases: Vec<&str> = parsed.stages.iter().filter_map(|s| s.alias.as_deref()).collect();
        for stage in &parsed.stages {
            if stage.image == "scratch" || aliases.contains(&stage.image.as_str()) {
                continue;
            }
            let (repo, tag) = base_images::split_image_ref(&stage.image);
            if tag.is_empty() {
                continue;
            }
            deps.push(Dependency {
                name: repo,
                current_version: tag,
                latest_version: String::new(),
                ecosystem: Ecosystem::DockerImage,
                file_path: file_path.clone(),
                line_number: stage.line,
                indirect: false,
                source_url: None,
                vulnerabilities: Vec::new(),
                advisory: None,
            });
        }

        let github_urls = parser::scan_github_release_urls(&parsed.runs);
        for tool in pinned_tools::match_pinned_tools(&parsed.env_vars, &github_urls) {
            deps.push(Dependency {
                name: format!("{}/{}", tool.owner, tool.repo),
                current_version: tool.current_version,
                latest_version: String::new(),
                ecosystem: Ecosystem::DockerTool,
                file_path: file_path.clone(),
                line_number: tool.line,
                indirect: false,
                source_url: None,
                vulnerabilities: Vec::new(),
                advisory: None,
            });
        }

        Ok(deps)
    }
}

#[async_trait]
impl Resolver for DockerEcosystem {
    async fn resolve_latest(&self, cache: &HttpCache, dep: &Dependency) -> Result<(String, Option<String>)> {
        match dep.ecosystem {
            Ecosystem::DockerImage => {
                let tags = base_images::list_tags(cache, &self.endpoint, &dep.name).await?;
                let current_family = stagefreight_core::decompose(&dep.current_version).family;
                let candidates: Vec<String> = tags
                    .into_iter()
                    .filter(|t| stagefreight_core::decompose(t).family == current_family)
                    .collect();
                let latest = newest_in_family(&dep.current_version, &candidates)
                    .map(str::to_string)
                    .unwrap_or_else(|| dep.current_version.clone());
                Ok((latest, Some(format!("https://hub.docker.com/_/{}", dep.name))))
            }
            Ecosystem::DockerTool => {
                let (owner, repo) = dep.name.split_once('/').unwrap_or((dep.name.as_str(), ""));
                let latest = pinned_tools::resolve_tool_latest(cache, &self.endpoint, owner, repo).await?;
                Ok((latest, Some(format!("https://github.com/{owner}/{repo}/releases"))))
            }
            other => {
                tracing::warn!(ecosystem = ?other, "docker resolver invoked for a non-docker dependency");
                Ok((dep.current_version.clone(), None))
            }
        }
    }
}

impl DockerEcosystem {
    /// Finds the `FromStage` whose `FROM` precedes `run_line`, i.e. the
    /// stage that RUN instruction executes in.
    fn stage_for_run<'a>(parsed: &'a DockerfileParse, run_line: usize) -> Option<&'a parser::FromStage> {
        parsed.stages.iter().filter(|s| s.line <= run_line).max_by_key(|s| s.line)
    }

    /// Checks `apk add`/`apt-get install` packages against the base image's
    /// Alpine or Debian repository index. These packages carry no in-file
    /// pin, so there's nothing to diff against — this reports the latest
    /// available version as an informational finding rather than a
    /// `Dependency`.
    pub async fn check_package_installs(&self, client: &reqwest::Client, parsed: &DockerfileParse, file_path: &str) -> Vec<Finding> {
        let installs = parser::scan_run_for_installs(&parsed.runs);
        let mut findings = Vec::new();

        for install in &installs {
            let Some(stage) = Self::stage_for_run(parsed, install.line) else { continue };

            match install.manager {
                "apk" => {
                    let Some((major, minor)) = apk::detect_alpine_version(&stage.image) else { continue };
                    let Ok(main) = apk::fetch_apkindex(client, &self.endpoint, major, minor, "main").await else { continue };
                    let community = apk::fetch_apkindex(client, &self.endpoint, major, minor, "community").await.unwrap_or_default();
                    let main_index = apk::parse_apkindex(&main);
                    let community_index = apk::parse_apkindex(&community);
                    for package in &install.packages {
                        if let Some(latest) = apk::find_latest_version(&main_index, &community_index, package) {
                            findings.push(Finding {
                                file: file_path.to_string(),
                                line: install.line,
                                column: 0,
                                module: "freshness".to_string(),
                                severity: FindingSeverity::Info,
                                message: format!("{package} (apk) latest in alpine {major}.{minor} is {latest}"),
                            });
                        }
                    }
                }
                "apt" => {
                    let Some((_, codename)) = apt::detect_codename(&stage.image) else { continue };
                    let Ok(raw) = apt::fetch_packages(client, &self.endpoint, &codename).await else { continue };
                    let index = apt::parse_packages(&raw);
                    for package in &install.packages {
                        if let Some(latest) = index.get(package) {
                            findings.push(Finding {
                                file: file_path.to_string(),
                                line: install.line,
                                column: 0,
                                module: "freshness".to_string(),
                                severity: FindingSeverity::Info,
                                message: format!("{package} (apt) latest in {codename} is {latest}"),
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_extracts_base_images_and_pinned_tools() {
        let content = "\
FROM golang:1.22-alpine AS builder
ARG GH_CLI_VERSION=2.40.0
RUN curl -L https://github.com/cli/cli/releases/download/v2.40.0/gh.tar.gz
FROM scratch
COPY --from=builder /app /app
";
        let eco = DockerEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("Dockerfile"), content).unwrap();
        assert!(deps.iter().any(|d| d.ecosystem == Ecosystem::DockerImage && d.name == "golang"));
        assert!(deps.iter().any(|d| d.ecosystem == Ecosystem::DockerTool));
        assert!(!deps.iter().any(|d| d.name == "scratch"));
    }
}
