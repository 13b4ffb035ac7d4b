//! Local Docker daemon: shells out to `docker images`/`docker rmi` instead
//! of talking to any remote registry API.

use crate::error::{RegistryError, Result};
use crate::provider::Provider;
use async_trait::async_trait;
use stagefreight_core::TagInfo;
use tokio::process::Command;

const FORMAT_TEMPLATE: &str = r#"{"tag":"{{.Tag}}","digest":"{{.Digest}}","created":"{{.CreatedAt}}"}"#;

#[derive(serde::Deserialize)]
struct ImageLine {
    tag: String,
    digest: String,
    created: String,
}

pub struct LocalDockerProvider;

impl LocalDockerProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalDockerProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for LocalDockerProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>> {
        let output = Command::new("docker")
            .args(["images", "--format", FORMAT_TEMPLATE, "--filter", &format!("reference={repo}")])
            .output()
            .await?;

        if !output.status.success() {
            return Err(RegistryError::LocalDocker(String::from_utf8_lossy(&output.stderr).to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut tags = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let Ok(entry) = serde_json::from_str::<ImageLine>(line) else { continue };
            if entry.tag.is_empty() || entry.tag == "<none>" {
                continue;
            }
            let created_at = chrono::DateTime::parse_from_str(&entry.created, "%Y-%m-%d %H:%M:%S %z %Z")
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc));
            tags.push(TagInfo { name: entry.tag, digest: entry.digest, created_at });
        }

        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tags)
    }

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()> {
        let output = Command::new("docker").args(["rmi", &format!("{repo}:{tag}")]).output().await?;
        if !output.status.success() {
            return Err(RegistryError::LocalDocker(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(())
    }

    async fn update_description(&self, _repo: &str, _short: &str, _full: &str) -> Result<()> {
        Ok(())
    }
}
