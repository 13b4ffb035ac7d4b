//! Alpine APK freshness: detects the Alpine major.minor release from the
//! base image, fetches and parses the `main`/`community` `APKINDEX`, and
//! looks up the latest version for a package installed via `apk add`.

use crate::ecosystems::EndpointConfig;
use crate::error::{FreshnessError, Result};
use flate2::read::GzDecoder;
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;
use tar::Archive;

fn alpine_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"alpine:?(\d+)\.(\d+)").unwrap())
}

/// Detects `major.minor` from text like `alpine:3.19` or an embedded
/// `alpine3.19` suffix.
pub fn detect_alpine_version(text: &str) -> Option<(u32, u32)> {
    let caps = alpine_version_re().captures(&text.to_lowercase())?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Fetches and ungzips/untars one Alpine repository's `APKINDEX`, returning
/// its raw field-per-line record text.
pub async fn fetch_apkindex(
    client: &reqwest::Client,
    endpoint: &EndpointConfig,
    major: u32,
    minor: u32,
    repo_name: &str,
) -> Result<String> {
    let base = endpoint.base_url_or("https://dl-cdn.alpinelinux.org/alpine");
    let url = format!("{base}/v{major}.{minor}/{repo_name}/x86_64/APKINDEX.tar.gz");

    let mut request = client.get(&url);
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
            method: "GET".to_string(),
            url: url.clone(),
            body_truncated: String::new(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| FreshnessError::Http { url: url.clone(), source })?;

    let decoder = GzDecoder::new(&bytes[..]);
    let mut archive = Archive::new(decoder);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_path_buf();
        if path.to_string_lossy() == "APKINDEX" {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return Ok(content);
        }
    }

    Err(FreshnessError::Parse { path: url, reason: "APKINDEX entry not found in archive".to_string() })
}

/// Parses `P:`/`V:` field-per-line records (blank-line separated) into a
/// `package -> version` map.
pub fn parse_apkindex(content: &str) -> HashMap<String, String> {
    let mut packages = HashMap::new();
    let mut name: Option<String> = None;
    let mut version: Option<String> = None;

    for line in content.lines() {
        if line.is_empty() {
            if let (Some(n), Some(v)) = (name.take(), version.take()) {
                packages.insert(n, v);
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("P:") {
            name = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("V:") {
            version = Some(rest.to_string());
        }
    }
    if let (Some(n), Some(v)) = (name, version) {
        packages.insert(n, v);
    }

    packages
}

/// Looks up `package`'s latest version, `main` taking precedence over
/// `community`.
pub fn find_latest_version<'a>(
    main: &'a HashMap<String, String>,
    community: &'a HashMap<String, String>,
    package: &str,
) -> Option<&'a str> {
    main.get(package).or_else(|| community.get(package)).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_version_from_image_tag() {
        assert_eq!(detect_alpine_version("alpine:3.19"), Some((3, 19)));
    }

    #[test]
    fn detects_version_from_embedded_suffix() {
        assert_eq!(detect_alpine_version("golang:1.22-alpine3.19"), Some((3, 19)));
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(detect_alpine_version("debian:bookworm"), None);
    }

    #[test]
    fn parses_apkindex_records() {
        let content = "C:Q1abc\nP:curl\nV:8.5.0-r0\nA:x86_64\n\nC:Q1def\nP:git\nV:2.43.0-r0\n\n";
        let packages = parse_apkindex(content);
        assert_eq!(packages.get("curl").unwrap(), "8.5.0-r0");
        assert_eq!(packages.get("git").unwrap(), "2.43.0-r0");
    }

    #[test]
    fn main_repo_takes_precedence_over_community() {
        let mut main = HashMap::new();
        main.insert("curl".to_string(), "8.5.0-r0".to_string());
        let mut community = HashMap::new();
        community.insert("curl".to_string(), "8.4.0-r0".to_string());
        community.insert("jq".to_string(), "1.7-r0".to_string());

        assert_eq!(find_latest_version(&main, &community, "curl"), Some("8.5.0-r0"));
        assert_eq!(find_latest_version(&main, &community, "jq"), Some("1.7-r0"));
    }
}
