//! Per-ecosystem parsers and resolvers, plus the file-basename dispatch
//! table that routes a project file to its ecosystem.

pub mod cargo;
pub mod docker;
pub mod gomod;
pub mod npm;
pub mod pip;

use crate::error::Result;
use async_trait::async_trait;
use stagefreight_core::cache::HttpCache;
use stagefreight_core::{Dependency, Ecosystem};
use std::path::Path;

/// A configurable endpoint override: base URL and an optional environment
/// variable whose value becomes a `Bearer` token.
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    pub base_url: Option<String>,
    pub auth_env: Option<String>,
}

impl EndpointConfig {
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url.clone().unwrap_or_else(|| default.to_string())
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.auth_env.as_ref().and_then(|name| std::env::var(name).ok())
    }

    pub fn auth_headers(&self) -> Vec<(&'static str, String)> {
        match self.bearer_token() {
            Some(token) => vec![("Authorization", format!("Bearer {token}"))],
            None => vec![],
        }
    }
}

/// Extracts version-pinned dependencies (with `current_version` and
/// `line_number`) from a project file's content.
pub trait Parser {
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<Dependency>>;
}

/// Populates `latest_version` and `source_url` for one already-parsed
/// dependency.
#[async_trait]
pub trait Resolver {
    async fn resolve_latest(&self, cache: &HttpCache, dep: &Dependency) -> Result<(String, Option<String>)>;
}

/// Routes a file path to its ecosystem by basename, per §4.2's dispatch
/// table. Returns `None` for files no ecosystem claims.
pub fn dispatch_ecosystem(path: &Path) -> Option<Ecosystem> {
    let basename = path.file_name()?.to_str()?;

    if basename == "Dockerfile"
        || basename.starts_with("Dockerfile.")
        || basename.ends_with(".dockerfile")
    {
        return Some(Ecosystem::DockerImage);
    }
    if basename == "go.mod" {
        return Some(Ecosystem::GoMod);
    }
    if basename == "Cargo.toml" {
        return Some(Ecosystem::Cargo);
    }
    if basename == "package.json" {
        return Some(Ecosystem::Npm);
    }
    if basename.starts_with("requirements") && basename.ends_with(".txt") {
        return Some(Ecosystem::Pip);
    }
    if basename == "Pipfile" {
        return Some(Ecosystem::Pip);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_matches_dockerfile_variants() {
        assert_eq!(dispatch_ecosystem(Path::new("Dockerfile")), Some(Ecosystem::DockerImage));
        assert_eq!(dispatch_ecosystem(Path::new("docker/Dockerfile.prod")), Some(Ecosystem::DockerImage));
        assert_eq!(dispatch_ecosystem(Path::new("tool.dockerfile")), Some(Ecosystem::DockerImage));
    }

    #[test]
    fn dispatch_matches_manifest_files() {
        assert_eq!(dispatch_ecosystem(Path::new("go.mod")), Some(Ecosystem::GoMod));
        assert_eq!(dispatch_ecosystem(Path::new("Cargo.toml")), Some(Ecosystem::Cargo));
        assert_eq!(dispatch_ecosystem(Path::new("package.json")), Some(Ecosystem::Npm));
        assert_eq!(dispatch_ecosystem(Path::new("requirements-dev.txt")), Some(Ecosystem::Pip));
        assert_eq!(dispatch_ecosystem(Path::new("Pipfile")), Some(Ecosystem::Pip));
    }

    #[test]
    fn dispatch_ignores_unrelated_files() {
        assert_eq!(dispatch_ecosystem(Path::new("README.md")), None);
    }
}
