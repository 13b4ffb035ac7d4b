//! The filesystem cache (§4.6): directory resolution precedence, a
//! content-addressed `<cache_dir>/<key[0..2]>/<key>.json` layout, and
//! TTL-aware reads with self-healing of corrupt entries.

use crate::error::Result;
use crate::module::CacheTtl;
use chrono::Utc;
use sha2::{Digest, Sha256};
use stagefreight_core::{CacheEntry, Finding};
use std::path::{Path, PathBuf};

/// Resolves the lint cache directory, in precedence order:
/// `$STAGEFREIGHT_CACHE_DIR/lint`, then `configured` relative to `root`,
/// then `<user_cache>/stagefreight/<12-hex of SHA-256(abs_root)>/lint`.
pub fn resolve_cache_dir(root: &Path, configured: Option<&str>) -> PathBuf {
    if let Ok(env_dir) = std::env::var("STAGEFREIGHT_CACHE_DIR") {
        return PathBuf::from(env_dir).join("lint");
    }
    if let Some(configured) = configured {
        return root.join(configured);
    }

    let user_cache = std::env::var("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".cache")))
        .unwrap_or_else(|_| std::env::temp_dir());

    let abs_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(abs_root.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    user_cache.join("stagefreight").join(&digest[..12]).join("lint")
}

fn entry_path(cache_dir: &Path, key: &str) -> PathBuf {
    cache_dir.join(&key[0..2]).join(format!("{key}.json"))
}

/// Reads a cache entry, honoring `ttl`. Returns `None` on a cache miss, an
/// expired entry, or `CacheTtl::Never`. A corrupt entry is deleted and
/// treated as a miss.
pub async fn read_cached(cache_dir: &Path, key: &str, ttl: CacheTtl) -> Option<Vec<Finding>> {
    if matches!(ttl, CacheTtl::Never) {
        return None;
    }

    let path = entry_path(cache_dir, key);
    let raw = tokio::fs::read_to_string(&path).await.ok()?;

    match serde_json::from_str::<CacheEntry>(&raw) {
        Ok(entry) => {
            if let CacheTtl::ExpiresAfterSecs(secs) = ttl {
                let cached_at = entry.cached_at?;
                let age = Utc::now().signed_duration_since(cached_at).num_seconds();
                if age < 0 || age as u64 > secs {
                    return None;
                }
            }
            Some(entry.findings)
        }
        Err(_) => {
            let _ = tokio::fs::remove_file(&path).await;
            None
        }
    }
}

/// Writes `findings` to the cache entry for `key`, creating parent
/// directories as needed.
pub async fn write_cache(cache_dir: &Path, key: &str, findings: &[Finding]) -> Result<()> {
    let path = entry_path(cache_dir, key);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let entry = CacheEntry { findings: findings.to_vec(), cached_at: Some(Utc::now()) };
    let raw = serde_json::to_string(&entry)?;
    tokio::fs::write(&path, raw).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagefreight_core::FindingSeverity;

    fn sample_findings() -> Vec<Finding> {
        vec![Finding {
            file: "Cargo.toml".to_string(),
            line: 1,
            column: 0,
            module: "freshness".to_string(),
            severity: FindingSeverity::Info,
            message: "hello".to_string(),
        }]
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let findings = sample_findings();
        write_cache(dir.path(), "abcd1234", &findings).await.unwrap();
        let read = read_cached(dir.path(), "abcd1234", CacheTtl::Forever).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].message, "hello");
    }

    #[tokio::test]
    async fn never_ttl_always_misses() {
        let dir = tempfile::tempdir().unwrap();
        write_cache(dir.path(), "abcd1234", &sample_findings()).await.unwrap();
        assert!(read_cached(dir.path(), "abcd1234", CacheTtl::Never).await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        write_cache(dir.path(), "abcd1234", &sample_findings()).await.unwrap();
        assert!(read_cached(dir.path(), "abcd1234", CacheTtl::ExpiresAfterSecs(0)).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_deleted_and_treated_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = entry_path(dir.path(), "deadbeef");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(read_cached(dir.path(), "deadbeef", CacheTtl::Forever).await.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn env_var_takes_precedence_over_configured_and_default() {
        unsafe { std::env::set_var("STAGEFREIGHT_CACHE_DIR", "/tmp/override") };
        let resolved = resolve_cache_dir(Path::new("/repo"), Some("custom-cache"));
        unsafe { std::env::remove_var("STAGEFREIGHT_CACHE_DIR") };
        assert_eq!(resolved, PathBuf::from("/tmp/override/lint"));
    }
}
