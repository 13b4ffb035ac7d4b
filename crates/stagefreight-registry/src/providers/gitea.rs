//! Gitea: the package-registry REST API, one container version per tag.

use crate::credentials::Credentials;
use crate::error::Result;
use crate::http::{check_status, map_transport_err};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use stagefreight_core::TagInfo;

#[derive(Deserialize)]
struct PackageEntry {
    id: u64,
    version: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

pub struct GiteaProvider {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl GiteaProvider {
    pub fn new(client: reqwest::Client, credentials: Credentials, base_url: String) -> Self {
        Self { client, credentials, base_url: base_url.trim_end_matches('/').to_string() }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.credentials.username, &self.credentials.password) {
            (Some(user), Some(pass)) => builder.basic_auth(user, Some(pass)),
            _ => builder,
        }
    }

    fn split_repo(repo: &str) -> (&str, &str) {
        repo.split_once('/').unwrap_or((repo, repo))
    }

    async fn fetch_packages(&self, owner: &str, name: &str) -> Result<Vec<PackageEntry>> {
        let mut packages = Vec::new();
        let mut page = 1;
        loop {
            let url = format!("{}/api/v1/packages/{owner}/container/{name}?page={page}&limit=50", self.base_url);
            let response = self.auth(self.client.get(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
            let response = check_status(Method::GET, &url, response).await?;
            let batch: Vec<PackageEntry> = response.json().await.map_err(|e| map_transport_err(&url, e))?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len();
            packages.extend(batch);
            if batch_len < 50 {
                break;
            }
            page += 1;
        }
        Ok(packages)
    }
}

#[async_trait]
impl Provider for GiteaProvider {
    fn name(&self) -> &'static str {
        "gitea"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let (owner, name) = Self::split_repo(repo);
        let packages = self.fetch_packages(owner, name).await?;

        let mut tags: Vec<TagInfo> = packages
            .into_iter()
            .map(|p| TagInfo { name: p.version, digest: p.id.to_string(), created_at: Some(p.created_at) })
            .collect();
        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tags)
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let (owner, name) = Self::split_repo(repo);
        let url = format!("{}/api/v1/packages/{owner}/container/{name}/{tag}", self.base_url);
        let response = self.auth(self.client.delete(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
        check_status(Method::DELETE, &url, response).await?;
        Ok(())
    }

    async fn update_description(&self, _repo: &str, _short: &str, _full: &str) -> Result<()> {
        Ok(())
    }
}
