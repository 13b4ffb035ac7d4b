//! Base-image freshness: for each non-scratch, non-alias `FROM` stage,
//! paginate the registry's tag list, filter by the current tag's family,
//! and select the newest by [`tag_newer`].

use super::parser::FromStage;
use crate::ecosystems::EndpointConfig;
use crate::error::{FreshnessError, Result};
use serde::Deserialize;
use stagefreight_core::cache::HttpCache;
use stagefreight_core::version::{decompose, is_date_like, newest_in_family};
use std::collections::HashSet;

/// Splits an image reference into `(repository, tag)`. Digest-pinned
/// references (`repo@sha256:...`) return an empty tag — callers should skip
/// these, they have nothing to compare.
pub fn split_image_ref(image: &str) -> (String, String) {
    if let Some(at_idx) = image.find('@') {
        return (image[..at_idx].to_string(), String::new());
    }
    let last_slash = image.rfind('/').unwrap_or(0);
    match image[last_slash..].find(':') {
        Some(rel) => {
            let idx = last_slash + rel;
            (image[..idx].to_string(), image[idx + 1..].to_string())
        }
        None => (image.to_string(), "latest".to_string()),
    }
}

#[derive(Deserialize)]
struct TagsPage {
    results: Vec<TagEntry>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// Docker Hub's official-image repo path for single-segment names
/// (`golang` -> `library/golang`).
fn docker_hub_repo_path(repo: &str) -> String {
    if repo.contains('/') {
        repo.to_string()
    } else {
        format!("library/{repo}")
    }
}

const MAX_PAGES: usize = 20;

/// Paginates a Docker Hub-shaped tag list endpoint, following `next` links
/// up to [`MAX_PAGES`].
pub async fn list_tags(cache: &HttpCache, endpoint: &EndpointConfig, repo: &str) -> Result<Vec<String>> {
    let base = endpoint.base_url_or("https://registry.hub.docker.com/v2/repositories");
    let path = docker_hub_repo_path(repo);
    let mut url = Some(format!("{base}/{path}/tags/?page_size=100"));
    let mut tags = Vec::new();
    let headers = endpoint.auth_headers();
    let header_refs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let mut pages = 0;
    while let Some(current) = url {
        if pages >= MAX_PAGES {
            break;
        }
        let body = cache.get(&current, &header_refs).await?;
        let page: TagsPage = serde_json::from_str(&body).map_err(|e| FreshnessError::Parse {
            path: current.clone(),
            reason: e.to_string(),
        })?;
        tags.extend(page.results.into_iter().map(|t| t.name));
        url = page.next;
        pages += 1;
    }

    Ok(tags)
}

#[derive(Debug, Clone)]
pub struct BaseImageFinding {
    pub stage_image: String,
    pub current_tag: String,
    pub latest_tag: Option<String>,
    pub advisory: Option<String>,
    pub line: usize,
}

/// Evaluates every `FROM` stage, skipping `scratch` and references to an
/// earlier stage's alias.
pub async fn check_base_images(
    cache: &HttpCache,
    endpoint: &EndpointConfig,
    stages: &[FromStage],
) -> Vec<BaseImageFinding> {
    let aliases: HashSet<&str> = stages.iter().filter_map(|s| s.alias.as_deref()).collect();
    let mut findings = Vec::new();

    for stage in stages {
        if stage.image == "scratch" || aliases.contains(stage.image.as_str()) {
            continue;
        }

        let (repo, tag) = split_image_ref(&stage.image);
        if tag.is_empty() {
            continue;
        }

        let Ok(tags) = list_tags(cache, endpoint, &repo).await else {
            continue;
        };

        let current = decompose(&tag);
        let candidates: Vec<String> = tags
            .into_iter()
            .filter(|t| decompose(t).family == current.family)
            .collect();
        let latest_tag = newest_in_family(&tag, &candidates).map(str::to_string);

        let is_unstable = current.version.is_none()
            || current.pre_rank != 0
            || current.version.is_some_and(is_date_like);

        let advisory = if is_unstable {
            Some(format!(
                "image {} uses a non-versioned or pre-release tag ({tag}); consider pinning to a stable release",
                stage.image
            ))
        } else {
            None
        };

        findings.push(BaseImageFinding {
            stage_image: stage.image.clone(),
            current_tag: tag,
            latest_tag,
            advisory,
            line: stage.line,
        });
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_tagged_reference() {
        assert_eq!(split_image_ref("golang:1.22-alpine"), ("golang".to_string(), "1.22-alpine".to_string()));
    }

    #[test]
    fn splits_reference_with_registry_port() {
        assert_eq!(
            split_image_ref("registry.example.com:5000/team/app:v1"),
            ("registry.example.com:5000/team/app".to_string(), "v1".to_string())
        );
    }

    #[test]
    fn untagged_reference_defaults_to_latest() {
        assert_eq!(split_image_ref("nginx"), ("nginx".to_string(), "latest".to_string()));
    }

    #[test]
    fn digest_pinned_reference_has_empty_tag() {
        let (repo, tag) = split_image_ref("nginx@sha256:abcdef");
        assert_eq!(repo, "nginx");
        assert!(tag.is_empty());
    }

    #[tokio::test]
    async fn check_base_images_skips_scratch_and_aliases() {
        let stages = vec![
            FromStage { image: "golang:1.22".to_string(), alias: Some("builder".to_string()), line: 1 },
            FromStage { image: "builder".to_string(), alias: None, line: 2 },
            FromStage { image: "scratch".to_string(), alias: None, line: 3 },
        ];
        let cache = HttpCache::new(reqwest::Client::new(), std::time::Duration::from_secs(0));
        let findings = check_base_images(&cache, &EndpointConfig::default(), &stages).await;
        // only the real golang:1.22 stage is a candidate; network failure in
        // tests is swallowed (best-effort), so we only assert it was tried
        // and nothing was emitted for the alias/scratch stages.
        assert!(findings.len() <= 1);
    }
}
