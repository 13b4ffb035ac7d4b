//! GitHub Container Registry: GitHub's REST packages API, tried as a user
//! package first and an org package second.

use crate::credentials::Credentials;
use crate::error::{RegistryError, Result};
use crate::http::{check_status, map_transport_err};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use stagefreight_core::TagInfo;

const API_BASE: &str = "https://api.github.com";

#[derive(Deserialize)]
struct PackageVersion {
    id: u64,
    created_at: chrono::DateTime<chrono::Utc>,
    metadata: VersionMetadata,
}

#[derive(Deserialize)]
struct VersionMetadata {
    container: ContainerMetadata,
}

#[derive(Deserialize)]
struct ContainerMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

pub struct GhcrProvider {
    client: reqwest::Client,
    credentials: Credentials,
}

impl GhcrProvider {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self { client, credentials }
    }

    fn auth_header(&self) -> Result<String> {
        self.credentials
            .password
            .clone()
            .map(|token| format!("Bearer {token}"))
            .ok_or_else(|| RegistryError::MissingCredentials("GHCR".to_string()))
    }

    /// Splits `owner/package` out of a GHCR repo reference
    /// (`ghcr.io/owner/package` or bare `owner/package`).
    fn split_repo(repo: &str) -> Result<(&str, &str)> {
        let trimmed = repo.strip_prefix("ghcr.io/").unwrap_or(repo);
        trimmed
            .split_once('/')
            .ok_or_else(|| RegistryError::UnexpectedResponse(repo.to_string(), "expected owner/package".to_string()))
    }

    async fn fetch_versions(&self, owner: &str, package: &str) -> Result<Vec<PackageVersion>> {
        let auth = self.auth_header()?;
        let mut versions = Vec::new();

        for scope in ["users", "orgs"] {
            let mut page = 1;
            let mut found_any_page = false;
            loop {
                let url = format!("{API_BASE}/{scope}/{owner}/packages/container/{package}/versions?per_page=100&page={page}");
                let response = self
                    .client
                    .get(&url)
                    .header("Authorization", &auth)
                    .header("Accept", "application/vnd.github+json")
                    .header("User-Agent", "stagefreight")
                    .send()
                    .await
                    .map_err(|e| map_transport_err(&url, e))?;

                if response.status() == StatusCode::NOT_FOUND && page == 1 {
                    break;
                }
                let response = check_status(Method::GET, &url, response).await?;
                let batch: Vec<PackageVersion> = response.json().await.map_err(|e| map_transport_err(&url, e))?;
                found_any_page = true;
                if batch.is_empty() {
                    break;
                }
                let batch_len = batch.len();
                versions.extend(batch);
                if batch_len < 100 {
                    break;
                }
                page += 1;
            }
            if found_any_page {
                return Ok(versions);
            }
        }

        Err(RegistryError::HttpStatus {
            status: 404,
            method: "GET".to_string(),
            url: format!("{API_BASE}/users|orgs/{owner}/packages/container/{package}/versions"),
            body_truncated: "package not found under user or org scope".to_string(),
        })
    }
}

#[async_trait]
impl Provider for GhcrProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let (owner, package) = Self::split_repo(repo)?;
        let versions = self.fetch_versions(owner, package).await?;

        let mut tags = Vec::new();
        for version in &versions {
            for tag in &version.metadata.container.tags {
                tags.push(TagInfo { name: tag.clone(), digest: version.id.to_string(), created_at: Some(version.created_at) });
            }
        }
        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tags)
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let (owner, package) = Self::split_repo(repo)?;
        let versions = self.fetch_versions(owner, package).await?;
        let auth = self.auth_header()?;

        let Some(version) = versions.iter().find(|v| v.metadata.container.tags.iter().any(|t| t == tag)) else {
            return Err(RegistryError::UnexpectedResponse(repo.to_string(), format!("no version found for tag {tag}")));
        };

        for scope in ["users", "orgs"] {
            let url = format!("{API_BASE}/{scope}/{owner}/packages/container/{package}/versions/{}", version.id);
            let response = self
                .client
                .delete(&url)
                .header("Authorization", &auth)
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", "stagefreight")
                .send()
                .await
                .map_err(|e| map_transport_err(&url, e))?;
            if response.status() == StatusCode::NOT_FOUND {
                continue;
            }
            return check_status(Method::DELETE, &url, response).await.map(|_| ());
        }

        Err(RegistryError::UnexpectedResponse(repo.to_string(), "delete failed under both scopes".to_string()))
    }

    async fn update_description(&self, _repo: &str, _short: &str, _full: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_repo_strips_registry_host() {
        assert_eq!(GhcrProvider::split_repo("ghcr.io/acme/widget").unwrap(), ("acme", "widget"));
        assert_eq!(GhcrProvider::split_repo("acme/widget").unwrap(), ("acme", "widget"));
    }

    #[test]
    fn split_repo_rejects_bare_name() {
        assert!(GhcrProvider::split_repo("widget").is_err());
    }
}
