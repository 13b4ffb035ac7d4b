//! GitLab Container Registry: resolve a repository ID from its path, then
//! paginate/delete tags through the project registry API.

use crate::credentials::Credentials;
use crate::error::{RegistryError, Result};
use crate::http::{check_status, map_transport_err};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use stagefreight_core::TagInfo;

#[derive(Deserialize)]
struct RepositoryEntry {
    id: u64,
    path: String,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Deserialize)]
struct TagDetail {
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct GitLabProvider {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl GitLabProvider {
    /// `base_url` is the GitLab instance's API root, resolved by the
    /// caller from `CI_SERVER_URL` or by stripping a `registry.` prefix
    /// off the configured registry host.
    pub fn new(client: reqwest::Client, credentials: Credentials, base_url: String) -> Self {
        Self { client, credentials, base_url: base_url.trim_end_matches('/').to_string() }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials.password {
            Some(token) => builder.header("PRIVATE-TOKEN", token),
            None => builder,
        }
    }

    async fn resolve_repository_id(&self, project_path: &str, repo: &str) -> Result<u64> {
        let encoded_project = urlencoding::encode(project_path);
        let mut page = 1;
        loop {
            let url = format!("{}/api/v4/projects/{encoded_project}/registry/repositories?per_page=100&page={page}", self.base_url);
            let response = self.auth(self.client.get(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
            let response = check_status(Method::GET, &url, response).await?;
            let entries: Vec<RepositoryEntry> = response.json().await.map_err(|e| map_transport_err(&url, e))?;
            if entries.is_empty() {
                break;
            }
            if let Some(found) = entries.iter().find(|e| e.path == repo) {
                return Ok(found.id);
            }
            page += 1;
        }

        Err(RegistryError::UnexpectedResponse(repo.to_string(), "no matching container repository".to_string()))
    }
}

#[async_trait]
impl Provider for GitLabProvider {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let (project_path, _) = repo.rsplit_once('/').unwrap_or(("", repo));
        let repository_id = self.resolve_repository_id(project_path, repo).await?;

        let mut tags = Vec::new();
        let mut page = 1;
        loop {
            let url = format!("{}/api/v4/projects/{project_path}/registry/repositories/{repository_id}/tags?per_page=100&page={page}", self.base_url);
            let response = self.auth(self.client.get(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
            let response = check_status(Method::GET, &url, response).await?;
            let entries: Vec<TagEntry> = response.json().await.map_err(|e| map_transport_err(&url, e))?;
            if entries.is_empty() {
                break;
            }

            for entry in entries {
                let detail_url = format!(
                    "{}/api/v4/projects/{project_path}/registry/repositories/{repository_id}/tags/{}",
                    self.base_url,
                    urlencoding::encode(&entry.name)
                );
                let detail_response = self.auth(self.client.get(&detail_url)).send().await.map_err(|e| map_transport_err(&detail_url, e))?;
                let detail_response = check_status(Method::GET, &detail_url, detail_response).await?;
                let detail: TagDetail = detail_response.json().await.map_err(|e| map_transport_err(&detail_url, e))?;
                tags.push(TagInfo { name: entry.name, digest: detail.digest.unwrap_or_default(), created_at: detail.created_at });
            }
            page += 1;
        }

        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tags)
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let (project_path, _) = repo.rsplit_once('/').unwrap_or(("", repo));
        let repository_id = self.resolve_repository_id(project_path, repo).await?;
        let url = format!(
            "{}/api/v4/projects/{project_path}/registry/repositories/{repository_id}/tags/{}",
            self.base_url,
            urlencoding::encode(tag)
        );
        let response = self.auth(self.client.delete(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
        check_status(Method::DELETE, &url, response).await?;
        Ok(())
    }

    async fn update_description(&self, _repo: &str, _short: &str, _full: &str) -> Result<()> {
        Ok(())
    }
}

/// Derives the GitLab API base from `CI_SERVER_URL` when set, else strips
/// a leading `registry.` off `registry_host`.
pub fn resolve_base_url(registry_host: &str) -> String {
    if let Ok(ci_server) = std::env::var("CI_SERVER_URL") {
        return ci_server;
    }
    let stripped = registry_host.strip_prefix("registry.").unwrap_or(registry_host);
    format!("https://{stripped}")
}
