//! The digest lock: tracks the last-seen registry manifest digest for
//! non-versioned image references (`latest`, `noble`, `sha-*`) in
//! `.stagefreight/freshness.lock`, emitting an info-severity finding when a
//! digest changes between runs.

use crate::ecosystems::EndpointConfig;
use crate::error::{FreshnessError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagefreight_core::{Finding, FindingSeverity};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEntry {
    pub digest: String,
    pub checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FreshnessLock {
    #[serde(default)]
    pub digests: HashMap<String, LockEntry>,
}

/// Loads the lock file, falling back to an empty lock when the file is
/// missing or malformed (best-effort, per the data model's documented
/// limitation).
pub fn load(path: &Path) -> FreshnessLock {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_yaml::from_str(&raw).unwrap_or_default(),
        Err(_) => FreshnessLock::default(),
    }
}

/// Best-effort persists the lock file, creating parent directories as
/// needed.
pub fn save(path: &Path, lock: &FreshnessLock) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_yaml::to_string(lock)?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// Queries the registry's manifest digest for `repo:reference` via a v2
/// `HEAD` request.
pub async fn compute_manifest_digest(
    client: &reqwest::Client,
    endpoint: &EndpointConfig,
    repo: &str,
    reference: &str,
) -> Result<String> {
    let base = endpoint.base_url_or("https://registry-1.docker.io");
    let url = format!("{base}/v2/{repo}/manifests/{reference}");

    let mut request = client.head(&url).header(
        "Accept",
        "application/vnd.docker.distribution.manifest.v2+json, \
         application/vnd.oci.image.manifest.v1+json, \
         application/vnd.docker.distribution.manifest.list.v2+json",
    );
    for (name, value) in endpoint.auth_headers() {
        request = request.header(name, value);
    }

    let response = request
        .send()
        .await
        .map_err(|source| FreshnessError::Http { url: url.clone(), source })?;

    if !response.status().is_success() {
        return Err(FreshnessError::HttpStatus {
            status: response.status().as_u16(),
            method: "HEAD".to_string(),
            url,
            body_truncated: String::new(),
        });
    }

    response
        .headers()
        .get("Docker-Content-Digest")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| FreshnessError::Parse { path: url, reason: "missing Docker-Content-Digest header".to_string() })
}

/// Compares `new_digest` against the lock's prior entry for `reference`,
/// recording the new digest unconditionally and emitting an info finding
/// only when a prior entry existed with a different digest. A reference
/// seen for the first time is recorded silently.
pub fn check_and_update(
    lock: &mut FreshnessLock,
    reference: &str,
    new_digest: &str,
    now: DateTime<Utc>,
    file: &str,
    line: usize,
) -> Option<Finding> {
    let previous = lock.digests.get(reference).cloned();

    let finding = previous.as_ref().and_then(|entry| {
        if entry.digest != new_digest {
            Some(Finding {
                file: file.to_string(),
                line,
                column: 0,
                module: "freshness".to_string(),
                severity: FindingSeverity::Info,
                message: format!(
                    "digest for {reference} changed since last check at {}",
                    entry.checked.to_rfc3339()
                ),
            })
        } else {
            None
        }
    });

    lock.digests.insert(reference.to_string(), LockEntry { digest: new_digest.to_string(), checked: now });
    finding
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn first_sighting_is_recorded_silently() {
        let mut lock = FreshnessLock::default();
        let finding = check_and_update(&mut lock, "nginx:latest", "sha256:aaa", Utc::now(), "Dockerfile", 1);
        assert!(finding.is_none());
        assert_eq!(lock.digests["nginx:latest"].digest, "sha256:aaa");
    }

    #[test]
    fn digest_change_emits_info_finding_with_previous_timestamp() {
        let mut lock = FreshnessLock::default();
        let earlier = Utc::now() - Duration::days(3);
        lock.digests.insert("nginx:latest".to_string(), LockEntry { digest: "sha256:aaa".to_string(), checked: earlier });

        let finding = check_and_update(&mut lock, "nginx:latest", "sha256:bbb", Utc::now(), "Dockerfile", 1).unwrap();
        assert_eq!(finding.severity, FindingSeverity::Info);
        assert!(finding.message.contains(&earlier.to_rfc3339()));
        assert_eq!(lock.digests["nginx:latest"].digest, "sha256:bbb");
    }

    #[test]
    fn unchanged_digest_emits_nothing() {
        let mut lock = FreshnessLock::default();
        lock.digests.insert("nginx:latest".to_string(), LockEntry { digest: "sha256:aaa".to_string(), checked: Utc::now() });
        let finding = check_and_update(&mut lock, "nginx:latest", "sha256:aaa", Utc::now(), "Dockerfile", 1);
        assert!(finding.is_none());
    }

    #[test]
    fn load_missing_file_yields_empty_lock() {
        let lock = load(Path::new("/nonexistent/freshness.lock"));
        assert!(lock.digests.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("freshness.lock");
        let mut lock = FreshnessLock::default();
        lock.digests.insert("nginx:latest".to_string(), LockEntry { digest: "sha256:aaa".to_string(), checked: Utc::now() });
        save(&path, &lock).unwrap();
        let loaded = load(&path);
        assert_eq!(loaded.digests["nginx:latest"].digest, "sha256:aaa");
    }
}
