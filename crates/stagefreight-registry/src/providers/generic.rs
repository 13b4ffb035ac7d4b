//! A bare OCI Distribution v2 client, used for registries with no
//! vendor-specific API: tag listing and manifest-digest deletion only, no
//! creation timestamps (the spec exposes none over plain v2) and no
//! description support.

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

pub struct GenericOciProvider {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl GenericOciProvider {
    pub fn new(client: reqwest::Client, credentials: Credentials, base_url: String) -> Self {
        Self { client, credentials, base_url: base_url.trim_end_matches('/').to_string() }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.credentials.username, &self.credentials.password) {
            (Some(user), Some(pass)) => builder.basic_auth(user, Some(pass)),
            _ => builder,
        }
    }
}

#[async_trait]
impl Provider for GenericOciProvider {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let url = format!("{}/v2/{repo}/tags/list", self.base_url);
        let response = self.auth(self.client.get(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
        let response = check_status(Method::GET, &url, response).await?;
        let list: TagsListResponse = response.json().await.map_err(|e| map_transport_err(&url, e))?;

        Ok(list.tags.into_iter().map(|name| TagInfo { name, digest: String::new(), created_at: None }).collect())
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let manifest_url = format!("{}/v2/{repo}/manifests/{tag}", self.base_url);
        let head = self
            .auth(self.client.head(&manifest_url))
            .header("Accept", "application/vnd.oci.image.manifest.v1+json")
            .send()
            .await
            .map_err(|e| map_transport_err(&manifest_url, e))?;
        let head = check_status(Method::HEAD, &manifest_url, head).await?;
        let digest = head
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(tag)
            .to_string();

        let delete_url = format!("{}/v2/{repo}/manifests/{digest}", self.base_url);
        let response = self.auth(self.client.delete(&delete_url)).send().await.map_err(|e| map_transport_err(&delete_url, e))?;
        check_status(Method::DELETE, &delete_url, response).await?;
        Ok(())
    }

    async fn update_description(&self, _repo: &str, _short: &str, _full: &str) -> Result<()> {
        Ok(())
    }
}
