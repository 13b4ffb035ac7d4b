//! Turns resolved dependencies into the subset the update applier may
//! safely touch (§4.7's `filter_update_candidates`).

use crate::git;
use stagefreight_core::{Dependency, Ecosystem};
use std::path::Path;

/// Policy knobs for candidate filtering; `ecosystems` is an allowlist
/// (`None` means "no ecosystem restriction").
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub ecosystems: Option<Vec<Ecosystem>>,
    pub security_only: bool,
}

#[derive(Debug, Clone)]
pub struct SkippedCandidate {
    pub dep: Dependency,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct FilteredCandidates {
    pub accepted: Vec<Dependency>,
    pub skipped: Vec<SkippedCandidate>,
}

fn docker_image_rejection(dep: &Dependency) -> Option<&'static str> {
    if dep.ecosystem != Ecosystem::DockerImage {
        return None;
    }
    if dep.current_version.is_empty() {
        Some("digest-pinned base image has no tag to bump")
    } else if dep.current_version.contains('$') {
        Some("ARG-parameterized image reference")
    } else if dep.current_version == "latest" {
        Some("untagged or `:latest` image reference")
    } else {
        None
    }
}

/// Drops deps that are up-to-date, indirect, outside the ecosystem
/// allowlist, in a non-auto-updatable ecosystem, lacking CVEs under a
/// security-only policy, untracked by git, or (Docker images only)
/// digest-pinned / ARG-parameterized / untagged / `:latest`.
pub async fn filter_update_candidates(repo_root: &Path, deps: Vec<Dependency>, options: &ApplyOptions) -> FilteredCandidates {
    let mut out = FilteredCandidates::default();

    for dep in deps {
        let reason = if dep.is_up_to_date() {
            Some("already up to date".to_string())
        } else if dep.indirect {
            Some("indirect dependency".to_string())
        } else if options.ecosystems.as_ref().is_some_and(|allow| !allow.contains(&dep.ecosystem)) {
            Some("ecosystem excluded by policy".to_string())
        } else if !dep.ecosystem.is_auto_updatable() {
            Some(format!("{:?} is not an auto-updatable ecosystem", dep.ecosystem))
        } else if options.security_only && !dep.has_vulnerabilities() {
            Some("no known vulnerabilities (security-only policy)".to_string())
        } else if !git::is_tracked(repo_root, &dep.file_path).await {
            Some("file is not tracked by git".to_string())
        } else {
            docker_image_rejection(&dep).map(str::to_string)
        };

        match reason {
            Some(reason) => out.skipped.push(SkippedCandidate { dep, reason }),
            None => out.accepted.push(dep),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(ecosystem: Ecosystem, current: &str, latest: &str) -> Dependency {
        Dependency {
            name: "x".to_string(),
            current_version: current.to_string(),
            latest_version: latest.to_string(),
            ecosystem,
            file_path: "Dockerfile".to_string(),
            line_number: 1,
            indirect: false,
            source_url: None,
            vulnerabilities: Vec::new(),
            advisory: None,
        }
    }

    #[tokio::test]
    async fn non_auto_updatable_ecosystem_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let deps = vec![dep(Ecosystem::Cargo, "1.0.0", "1.1.0")];
        let result = filter_update_candidates(dir.path(), deps, &ApplyOptions::default()).await;
        assert!(result.accepted.is_empty());
        assert_eq!(result.skipped.len(), 1);
    }

    #[tokio::test]
    async fn untagged_docker_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let deps = vec![dep(Ecosystem::DockerImage, "latest", "1.2")];
        let result = filter_update_candidates(dir.path(), deps, &ApplyOptions::default()).await;
        assert!(result.accepted.is_empty());
        assert!(result.skipped[0].reason.contains("latest"));
    }

    #[tokio::test]
    async fn arg_parameterized_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let deps = vec![dep(Ecosystem::DockerImage, "${GO_VERSION}", "1.22")];
        let result = filter_update_candidates(dir.path(), deps, &ApplyOptions::default()).await;
        assert!(result.accepted.is_empty());
        assert!(result.skipped[0].reason.contains("ARG"));
    }

    #[tokio::test]
    async fn security_only_drops_unvulnerable_deps() {
        let dir = tempfile::tempdir().unwrap();
        let options = ApplyOptions { security_only: true, ..Default::default() };
        let deps = vec![dep(Ecosystem::GoMod, "1.0.0", "1.1.0")];
        let result = filter_update_candidates(dir.path(), deps, &options).await;
        assert!(result.accepted.is_empty());
        assert!(result.skipped[0].reason.contains("security-only"));
    }
}
