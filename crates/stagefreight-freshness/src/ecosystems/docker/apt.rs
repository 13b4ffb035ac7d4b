//! Debian APT freshness: detects the distro + codename from the base
//! image, fetches and parses the `main` component's `Packages.gz`, and
//! looks up the latest version for a package installed via
//! `apt-get install`.

use crate::ecosystems::EndpointConfig;
use crate::error::{FreshnessError, Result};
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::io::Read;

const DEBIAN_CODENAMES: &[&str] = &["buster", "bullseye", "bookworm", "trixie"];
const UBUNTU_CODENAMES: &[&str] = &["focal", "jammy", "kinetic", "lunar", "mantic", "noble"];

fn extract_after(text: &str, prefix: &str) -> Option<String> {
    let idx = text.find(prefix)?;
    let rest = &text[idx + prefix.len()..];
    let codename: String = rest.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
    if codename.is_empty() { None } else { Some(codename) }
}

/// Detects `(distro, codename)` from `debian:<codename>`, `ubuntu:<codename>`,
/// or a suffix match against the known codename set.
pub fn detect_codename(text: &str) -> Option<(String, String)> {
    let lower = text.to_lowercase();

    if let Some(codename) = extract_after(&lower, "debian:") {
        return Some(("debian".to_string(), codename));
    }
    if let Some(codename) = extract_after(&lower, "ubuntu:") {
        return Some(("ubuntu".to_string(), codename));
    }

    for codename in DEBIAN_CODENAMES {
        if lower.contains(codename) {
            return Some(("debian".to_string(), codename.to_string()));
        }
    }
    for codename in UBUNTU_CODENAMES {
        if lower.contains(codename) {
            return Some(("ubuntu".to_string(), codename.to_string()));
        }
    }

    None
}

/// Fetches and gunzips `dists/<codename>/main/binary-amd64/Packages.gz`.
pub async fn fetch_packages(client: &reqwest::Client, endpoint: &EndpointConfig, codename: &str) -> Result<String> {
    let base = endpoint.base_url_or("https://deb.debian.org/debian");
    let url = format!("{base}/dists/{codename}/main/binary-amd64/Packages.gz");

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

    let mut decoder = GzDecoder::new(&bytes[..]);
    let mut content = String::new();
    decoder.read_to_string(&mut content)?;
    Ok(content)
}

/// Parses `Package:`/`Version:` field-per-line records (blank-line
/// separated) into a `package -> version` map.
pub fn parse_packages(content: &str) -> HashMap<String, String> {
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
        if let Some(rest) = line.strip_prefix("Package: ") {
            name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Version: ") {
            version = Some(rest.trim().to_string());
        }
    }
    if let (Some(n), Some(v)) = (name, version) {
        packages.insert(n, v);
    }

    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_codename_from_explicit_tag() {
        assert_eq!(detect_codename("debian:bookworm-slim"), Some(("debian".to_string(), "bookworm".to_string())));
        assert_eq!(detect_codename("ubuntu:noble"), Some(("ubuntu".to_string(), "noble".to_string())));
    }

    #[test]
    fn detects_codename_from_suffix() {
        assert_eq!(detect_codename("python:3.12-bookworm"), Some(("debian".to_string(), "bookworm".to_string())));
    }

    #[test]
    fn parses_packages_records() {
        let content = "Package: curl\nVersion: 7.88.1-10+deb12u5\nArchitecture: amd64\n\nPackage: git\nVersion: 1:2.39.2-1.1\n\n";
        let packages = parse_packages(content);
        assert_eq!(packages.get("curl").unwrap(), "7.88.1-10+deb12u5");
        assert_eq!(packages.get("git").unwrap(), "1:2.39.2-1.1");
    }
}
