//! Quay.io: paginated tag listing via `has_additional`, bearer-token auth.

use crate::credentials::Credentials;
use crate::error::Result;
use crate::http::{check_status, map_transport_err};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use stagefreight_core::TagInfo;

const BASE_URL: &str = "https://quay.io";

#[derive(Deserialize)]
struct TagsPage {
    tags: Vec<TagEntry>,
    has_additional: bool,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    manifest_digest: Option<String>,
    #[serde(default)]
    last_modified: Option<String>,
}

pub struct QuayProvider {
    client: reqwest::Client,
    credentials: Credentials,
}

impl QuayProvider {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self { client, credentials }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials.password {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn parse_rfc2822(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc2822(raw).ok().map(|dt| dt.with_timezone(&chrono::Utc))
}

#[async_trait]
impl Provider for QuayProvider {
    fn name(&self) -> &'static str {
        "quay"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let mut tags = Vec::new();
        let mut page = 1;
        loop {
            let url = format!("{BASE_URL}/api/v1/repository/{repo}/tag/?page={page}&limit=100&onlyActiveTags=true");
            let response = self.auth(self.client.get(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
            let response = check_status(Method::GET, &url, response).await?;
            let page_body: TagsPage = response.json().await.map_err(|e| map_transport_err(&url, e))?;

            for entry in page_body.tags {
                tags.push(TagInfo {
                    name: entry.name,
                    digest: entry.manifest_digest.unwrap_or_default(),
                    created_at: entry.last_modified.as_deref().and_then(parse_rfc2822),
                });
            }
            if !page_body.has_additional {
                break;
            }
            page += 1;
        }

        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tags)
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let url = format!("{BASE_URL}/api/v1/repository/{repo}/tag/{tag}");
        let response = self.auth(self.client.delete(&url)).send().await.map_err(|e| map_transport_err(&url, e))?;
        check_status(Method::DELETE, &url, response).await?;
        Ok(())
    }

    async fn update_description(&self, repo: &str, _short: &str, full: &str) -> Result<()> {
        let url = format!("{BASE_URL}/api/v1/repository/{repo}");
        let response = self
            .auth(self.client.put(&url))
            .json(&serde_json::json!({ "description": full }))
            .send()
            .await
            .map_err(|e| map_transport_err(&url, e))?;
        check_status(Method::PUT, &url, response).await?;
        Ok(())
    }
}
