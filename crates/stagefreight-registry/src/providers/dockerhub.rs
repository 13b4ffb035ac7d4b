//! Docker Hub: JWT login, paginated tag listing, tag deletion, and
//! truncated description updates.

use crate::credentials::Credentials;
use crate::error::{RegistryError, Result};
use crate::http::{check_status, map_transport_err};
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use stagefreight_core::TagInfo;
use tokio::sync::OnceCell;

const BASE_URL: &str = "https://hub.docker.com";
const SHORT_DESCRIPTION_MAX: usize = 100;
const FULL_DESCRIPTION_MAX: usize = 25000;

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct TagsPage {
    next: Option<String>,
    results: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    tag_last_pushed: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    images: Vec<ImageEntry>,
}

#[derive(Deserialize)]
struct ImageEntry {
    #[serde(default)]
    digest: Option<String>,
}

pub struct DockerHubProvider {
    client: reqwest::Client,
    credentials: Credentials,
    token: OnceCell<String>,
}

impl DockerHubProvider {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self { client, credentials, token: OnceCell::new() }
    }

    async fn jwt(&self) -> Result<&str> {
        self.token
            .get_or_try_init(|| async {
                let Some(username) = &self.credentials.username else {
                    return Err(RegistryError::MissingCredentials("DOCKERHUB".to_string()));
                };
                let Some(password) = &self.credentials.password else {
                    return Err(RegistryError::MissingCredentials("DOCKERHUB".to_string()));
                };

                let url = format!("{BASE_URL}/v2/users/login/");
                let response = self
                    .client
                    .post(&url)
                    .json(&serde_json::json!({ "username": username, "password": password }))
                    .send()
                    .await
                    .map_err(|e| map_transport_err(&url, e))?;
                let response = check_status(Method::POST, &url, response).await?;
                let login: LoginResponse = response.json().await.map_err(|e| map_transport_err(&url, e))?;
                Ok(login.token)
            })
            .await
            .map(String::as_str)
    }

    async fn authed(&self, method: Method, url: &str) -> Result<reqwest::RequestBuilder> {
        let token = self.jwt().await?;
        Ok(self.client.request(method, url).header("Authorization", format!("JWT {token}")))
    }
}

#[async_trait]
impl Provider for DockerHubProvider {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let mut tags = Vec::new();
        let mut url = Some(format!("{BASE_URL}/v2/repositories/{repo}/tags/?page_size=100"));

        while let Some(next_url) = url {
            let request = self.authed(Method::GET, &next_url).await?;
            let response = request.send().await.map_err(|e| map_transport_err(&next_url, e))?;
            let response = check_status(Method::GET, &next_url, response).await?;
            let page: TagsPage = response.json().await.map_err(|e| map_transport_err(&next_url, e))?;

            for entry in page.results {
                let digest = entry.digest.or_else(|| entry.images.first().and_then(|i| i.digest.clone())).unwrap_or_default();
                tags.push(TagInfo { name: entry.name, digest, created_at: entry.tag_last_pushed });
            }
            url = page.next;
        }

        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tags)
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let url = format!("{BASE_URL}/v2/repositories/{repo}/tags/{tag}/");
        let request = self.authed(Method::DELETE, &url).await?;
        let response = request.send().await.map_err(|e| map_transport_err(&url, e))?;
        check_status(Method::DELETE, &url, response).await?;
        Ok(())
    }

    async fn update_description(&self, repo: &str, short: &str, full: &str) -> Result<()> {
        let url = format!("{BASE_URL}/v2/repositories/{repo}/");
        let short = truncate_at_word_boundary(short, SHORT_DESCRIPTION_MAX);
        let full: String = full.chars().take(FULL_DESCRIPTION_MAX).collect();

        let request = self.authed(Method::PATCH, &url).await?;
        let response = request
            .json(&serde_json::json!({ "description": short, "full_description": full }))
            .send()
            .await
            .map_err(|e| map_transport_err(&url, e))?;
        check_status(Method::PATCH, &url, response).await?;
        Ok(())
    }
}

/// Truncates `text` to at most `max_len` bytes without splitting a word,
/// backing off to the previous space when the cut lands mid-word.
fn truncate_at_word_boundary(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut cut = max_len;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let slice = &text[..cut];
    match slice.rfind(' ') {
        Some(idx) => slice[..idx].to_string(),
        None => slice.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_backs_off_to_word_boundary() {
        let text = "a quick brown fox jumps over the lazy dog and keeps running";
        let truncated = truncate_at_word_boundary(text, 20);
        assert!(truncated.len() <= 20);
        assert_eq!(truncated, "a quick brown fox");
    }

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_at_word_boundary("short", 100), "short");
    }
}
