//! HTTP conditional-GET cache shared by the freshness resolvers, the
//! vulnerability correlator, and the registry providers.
//!
//! Grounded directly on the teacher's `HttpCache`: an in-memory
//! `DashMap` of URL to `CachedResponse`, bounded by [`MAX_CACHE_ENTRIES`],
//! revalidated with `ETag`/`If-None-Match` and `Last-Modified`/
//! `If-Modified-Since` so repeat polls of the same registry endpoint don't
//! re-download bodies that haven't changed.

use crate::error::{CoreError, Result};
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Hard cap on cached entries; oldest-by-insertion entries are evicted once
/// exceeded.
pub const MAX_CACHE_ENTRIES: usize = 1000;

/// A cached HTTP response body plus the revalidation headers needed to
/// issue a conditional GET next time.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    fetched_at: Instant,
}

/// HTTPS-only guard; tests may exercise plain HTTP against a local mock
/// server.
fn ensure_https(url: &str) -> Result<()> {
    if cfg!(test) || url.starts_with("https://") {
        Ok(())
    } else {
        Err(CoreError::CacheError(format!(
            "refusing to cache non-HTTPS URL: {url}"
        )))
    }
}

/// An in-memory conditional-GET cache keyed by request URL.
pub struct HttpCache {
    client: reqwest::Client,
    entries: DashMap<String, CachedResponse>,
    ttl: Duration,
}

impl HttpCache {
    pub fn new(client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            client,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fetches `url`, using a conditional GET when a fresh cache entry
    /// exists. Returns the response body, caching it for subsequent calls.
    pub async fn get(&self, url: &str, extra_headers: &[(&str, &str)]) -> Result<String> {
        ensure_https(url)?;

        let cached = self.entries.get(url).map(|e| e.clone());
        if let Some(entry) = &cached
            && entry.fetched_at.elapsed() < self.ttl
        {
            return Ok(entry.body.clone());
        }

        let mut request = self.client.get(url);
        if let Some(entry) = &cached {
            if let Some(etag) = &entry.etag {
                request = request.header("If-None-Match", etag);
            }
            if let Some(last_modified) = &entry.last_modified {
                request = request.header("If-Modified-Since", last_modified);
            }
        }
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|source| CoreError::Http { url: url.to_string(), source })?;

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                return Ok(entry.body);
            }
            return Err(CoreError::CacheError(format!(
                "304 Not Modified for {url} with no prior cache entry"
            )));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::HttpStatus {
                status,
                method: "GET".to_string(),
                url: url.to_string(),
                body_truncated: body.chars().take(500).collect(),
            });
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let last_modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|source| CoreError::Http { url: url.to_string(), source })?;

        self.insert(
            url.to_string(),
            CachedResponse {
                body: body.clone(),
                etag,
                last_modified,
                fetched_at: Instant::now(),
            },
        );

        Ok(body)
    }

    fn insert(&self, url: String, entry: CachedResponse) {
        if self.entries.len() >= MAX_CACHE_ENTRIES && !self.entries.contains_key(&url) {
            if let Some(oldest_key) = self
                .entries
                .iter()
                .min_by_key(|e| e.fetched_at)
                .map(|e| e.key().clone())
            {
                self.entries.remove(&oldest_key);
            }
        }
        self.entries.insert(url, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
