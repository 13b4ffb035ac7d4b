//! The registry [`Provider`] trait (§4.10): list/delete/describe tags
//! behind one interface, implemented once per registry vendor plus a
//! local-Docker-daemon fallback.

use crate::error::Result;
use async_trait::async_trait;
use stagefreight_core::TagInfo;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Canonical provider name (`docker`, `github`, `gitlab`, `quay`,
    /// `jfrog`, `harbor`, `gitea`, `local`).
    fn name(&self) -> &'static str;

    /// Lists every tag for `repo`, sorted newest-first.
    async fn list_tags(&self, repo: &str) -> Result<Vec<TagInfo>>;

    async fn delete_tag(&self, repo: &str, tag: &str) -> Result<()>;

    /// Updates the repository's short/full description. A no-op
    /// (`Ok(())`) for providers without description support.
    async fn update_description(&self, repo: &str, short: &str, full: &str) -> Result<()>;
}
