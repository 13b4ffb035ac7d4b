//! Normalizes a configured provider name and builds the matching
//! [`Provider`], resolving credentials from the env-prefix convention
//! along the way.

use crate::credentials;
use crate::error::{RegistryError, Result};
use crate::provider::Provider;
use crate::providers::{dockerhub, generic, ghcr, gitea, gitlab, harbor, jfrog, local, quay};
use std::time::Duration;

/// Normalizes a configured provider alias to its canonical name
/// (`dockerhub` -> `docker`, `ghcr` -> `github`).
pub fn normalize_name(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "dockerhub" => "docker".to_string(),
        "ghcr" => "github".to_string(),
        other => other.to_string(),
    }
}

/// Extra, provider-specific configuration the factory needs beyond a
/// name/credentials-prefix pair.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    pub base_url: Option<String>,
    pub docker_repo_key: Option<String>,
    pub http_timeout_secs: u64,
}

pub struct ProviderFactory;

impl ProviderFactory {
    /// Builds the provider behind `canonical_name` (already normalized via
    /// [`normalize_name`]), using `credential_prefix_env` (e.g. `DOCKERHUB`,
    /// `GHCR`, `GITLAB`) to resolve credentials.
    pub fn build(canonical_name: &str, credential_prefix: &str, options: &ProviderOptions) -> Result<Box<dyn Provider>> {
        let timeout = if options.http_timeout_secs > 0 { options.http_timeout_secs } else { 10 };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| RegistryError::Http { url: "<client build>".to_string(), source: e })?;

        let name = canonical_name.to_lowercase();
        match name.as_str() {
            "local" => Ok(Box::new(local::LocalDockerProvider::new())),
            "docker" => Ok(Box::new(dockerhub::DockerHubProvider::new(client, credentials::resolve(credential_prefix)))),
            "github" => Ok(Box::new(ghcr::GhcrProvider::new(client, credentials::resolve(credential_prefix)))),
            "gitlab" => {
                let base_url = options
                    .base_url
                    .clone()
                    .unwrap_or_else(|| gitlab::resolve_base_url("gitlab.com"));
                Ok(Box::new(gitlab::GitLabProvider::new(client, credentials::resolve_gitlab(credential_prefix), base_url)))
            }
            "quay" => Ok(Box::new(quay::QuayProvider::new(client, credentials::resolve(credential_prefix)))),
            "jfrog" => {
                let base_url = options.base_url.clone().ok_or_else(|| RegistryError::UnknownProvider("jfrog requires base_url".to_string()))?;
                let docker_repo_key = options.docker_repo_key.clone().unwrap_or_else(|| "docker".to_string());
                Ok(Box::new(jfrog::JfrogProvider::new(client, credentials::resolve(credential_prefix), base_url, docker_repo_key)))
            }
            "harbor" => {
                let base_url = options.base_url.clone().ok_or_else(|| RegistryError::UnknownProvider("harbor requires base_url".to_string()))?;
                Ok(Box::new(harbor::HarborProvider::new(client, credentials::resolve(credential_prefix), base_url)))
            }
            "gitea" => {
                let base_url = options.base_url.clone().ok_or_else(|| RegistryError::UnknownProvider("gitea requires base_url".to_string()))?;
                Ok(Box::new(gitea::GiteaProvider::new(client, credentials::resolve(credential_prefix), base_url)))
            }
            "generic" => {
                let base_url = options.base_url.clone().ok_or_else(|| RegistryError::UnknownProvider("generic requires base_url".to_string()))?;
                Ok(Box::new(generic::GenericOciProvider::new(client, credentials::resolve(credential_prefix), base_url)))
            }
            other => Err(RegistryError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_aliases() {
        assert_eq!(normalize_name("dockerhub"), "docker");
        assert_eq!(normalize_name("ghcr"), "github");
        assert_eq!(normalize_name("DockerHub"), "docker");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let err = ProviderFactory::build("nonexistent", "X", &ProviderOptions::default()).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownProvider(_)));
    }

    #[test]
    fn local_provider_needs_no_credentials() {
        let provider = ProviderFactory::build("local", "UNUSED", &ProviderOptions::default()).unwrap();
        assert_eq!(provider.name(), "local");
    }
}
