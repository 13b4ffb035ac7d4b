//! Pinned-tool freshness: matches `*_VERSION` build args against GitHub
//! release download URLs found in the same Dockerfile, then queries the
//! GitHub releases API for the latest tag.

use super::parser::EnvVar;
use crate::ecosystems::EndpointConfig;
use crate::error::{FreshnessError, Result};
use serde::Deserialize;
use stagefreight_core::cache::HttpCache;

#[derive(Debug, Clone)]
pub struct PinnedTool {
    pub env_name: String,
    pub current_version: String,
    pub owner: String,
    pub repo: String,
    pub line: usize,
}

/// Heuristically matches each `*_VERSION` variable to a GitHub release URL
/// by case-insensitive substring match between the repo name and the
/// variable's name stem (the part before `_VERSION`).
pub fn match_pinned_tools(env_vars: &[EnvVar], github_urls: &[(String, String, usize)]) -> Vec<PinnedTool> {
    let mut out = Vec::new();

    for env in env_vars {
        let Some(stem) = env.name.strip_suffix("_VERSION") else { continue };
        let stem_lower = stem.to_lowercase();

        for (owner, repo, _url_line) in github_urls {
            let repo_lower = repo.to_lowercase();
            if repo_lower.contains(&stem_lower) || stem_lower.contains(&repo_lower) {
                out.push(PinnedTool {
                    env_name: env.name.clone(),
                    current_version: env.value.clone(),
                    owner: owner.clone(),
                    repo: repo.clone(),
                    line: env.line,
                });
                break;
            }
        }
    }

    out
}

#[derive(Deserialize)]
struct GitHubRelease {
    tag_name: String,
}

/// Queries `GET /repos/{owner}/{repo}/releases/latest` for the newest
/// release tag.
pub async fn resolve_tool_latest(
    cache: &HttpCache,
    endpoint: &EndpointConfig,
    owner: &str,
    repo: &str,
) -> Result<String> {
    let base = endpoint.base_url_or("https://api.github.com");
    let url = format!("{base}/repos/{owner}/{repo}/releases/latest");

    let mut headers = endpoint.auth_headers();
    headers.push(("User-Agent", "stagefreight".to_string()));
    let header_refs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let body = cache.get(&url, &header_refs).await?;
    let release: GitHubRelease = serde_json::from_str(&body).map_err(|e| FreshnessError::Parse {
        path: url.clone(),
        reason: e.to_string(),
    })?;
    Ok(release.tag_name)
}
