//! JFrog Artifactory: the Docker-compatible `v2/tags/list` endpoint for
//! names, paired with the storage API for per-tag creation timestamps.

use crate::credentials::Credentials;
use crate::error::Result;
use crate::http::{check_status, map_transport_err};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use stagefreight_core::TagInfo;

#[derive(Deserialize)]
struct TagsListResponse {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct StorageInfo {
    #[serde(default)]
    created: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    checksums: Option<Checksums>,
}

#[derive(Deserialize)]
struct Checksums {
    sha256: String,
}

pub struct JfrogProvider {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
    docker_repo_key: String,
}

impl JfrogProvider {
    pub fn new(client: reqwest::Client, credentials: Credentials, base_url: String, docker_repo_key: String) -> Self {
        Self { client, credentials, base_url: base_url.trim_end_matches('/').to_string(), docker_repo_key }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.credentials.username, &self.credentials.password) {
            (Some(user), Some(pass)) => builder.basic_auth(user, Some(pass)),
            _ => builder,
        }
    }
}

#[async_trait]
impl Provider for JfrogProvider {
    fn name(&self) -> &'static str {
        "jfrog"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let list_url = format!("{}/api/docker/{}/v2/{repo}/tags/list", self.base_url, self.docker_repo_key);
        let response = self.auth(self.client.get(&list_url)).send().await.map_err(|e| map_transport_err(&list_url, e))?;
        let response = check_status(Method::GET, &list_url, response).await?;
        let list: TagsListResponse = response.json().await.map_err(|e| map_transport_err(&list_url, e))?;

        let mut tags = Vec::new();
        for name in list.tags {
            let storage_url = format!("{}/api/storage/{}/{repo}/{name}", self.base_url, self.docker_repo_key);
            let info: Option<StorageInfo> = self
                .auth(self.client.get(&storage_url))
                .send()
                .await
                .ok()
                .and_then(|r| r.error_for_status().ok());
            let info = match info {
                Some(response) => response.json().await.ok(),
                None => None,
            };
            let (created_at, digest) = match info {
                Some(i) => (i.created, i.checksums.map(|c| c.sha256).unwrap_or_default()),
                None => (None, String::new()),
            };
            tags.push(TagInfo { name, digest, created_at });
        }

        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tags)
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let url = format!("{}/{}/{repo}/{tag}", self.base_url, self.docker_repo_key);
        let response = self.auth(self.client.delete(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
        check_status(Method::DELETE, &url, response).await?;
        Ok(())
    }

    async fn update_description(&self, _repo: &str, _short: &str, _full: &str) -> Result<()> {
        Ok(())
    }
}
