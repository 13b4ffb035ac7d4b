//! Harbor: the v2.0 artifacts API, paginated with `with_tag=true`.

use crate::credentials::Credentials;
use crate::error::Result;
use crate::http::{check_status, map_transport_err};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use stagefreight_core::TagInfo;

#[derive(Deserialize)]
struct Artifact {
    digest: String,
    push_time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    tags: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

pub struct HarborProvider {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl HarborProvider {
    pub fn new(client: reqwest::Client, credentials: Credentials, base_url: String) -> Self {
        Self { client, credentials, base_url: base_url.trim_end_matches('/').to_string() }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.credentials.username, &self.credentials.password) {
            (Some(user), Some(pass)) => builder.basic_auth(user, Some(pass)),
            _ => builder,
        }
    }

    /// Splits `project/repository` from a Harbor repo reference.
    fn split_repo(repo: &str) -> (&str, &str) {
        repo.split_once('/').unwrap_or((repo, repo))
    }

    async fn fetch_artifacts(&self, repo: &str) -> Result<Vec<Artifact>> {
        let (project, repository) = Self::split_repo(repo);
        let encoded_repository = urlencoding::encode(repository);
        let mut artifacts = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/api/v2.0/projects/{project}/repositories/{encoded_repository}/artifacts?page={page}&page_size=100&with_tag=true",
                self.base_url
            );
            let response = self.auth(self.client.get(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
            let response = check_status(Method::GET, &url, response).await?;
            let batch: Vec<Artifact> = response.json().await.map_err(|e| map_transport_err(&url, e))?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len();
            artifacts.extend(batch);
            if batch_len < 100 {
                break;
            }
            page += 1;
        }
        Ok(artifacts)
    }
}

#[async_trait]
impl Provider for HarborProvider {
    fn name(&self) -> &'static str {
        "harbor"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let artifacts = self.fetch_artifacts(repo).await?;
        let mut tags = Vec::new();
        for artifact in &artifacts {
            for tag in &artifact.tags {
                tags.push(TagInfo { name: tag.name.clone(), digest: artifact.digest.clone(), created_at: Some(artifact.push_time) });
            }
        }
        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tags)
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let (project, repository) = Self::split_repo(repo);
        let encoded_repository = urlencoding::encode(repository);
        let url = format!("{}/api/v2.0/projects/{project}/repositories/{encoded_repository}/artifacts/{tag}", self.base_url);
        let response = self.auth(self.client.delete(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
        check_status(Method::DELETE, &url, response).await?;
        Ok(())
    }

    async fn update_description(&self, _repo: &str, _short: &str, _full: &str) -> Result<()> {
        Ok(())
    }
}
