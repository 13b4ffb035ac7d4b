//! The Cargo ecosystem: `Cargo.toml` `[dependencies]`/`[dev-dependencies]`/
//! `[build-dependencies]`/`[workspace.dependencies]` tables.
//!
//! Grounded on the teacher's `deps-cargo` parser (`toml_edit`-based section
//! walking, inline-table vs. string dependency values), simplified to a
//! plain `line_number` instead of LSP position tracking.

use super::{EndpointConfig, Parser, Resolver};
use crate::error::{FreshnessError, Result};
use async_trait::async_trait;
use stagefreight_core::cache::HttpCache;
use stagefreight_core::{Dependency, Ecosystem};
use std::path::Path;
use toml_edit::{DocumentMut, Item};

const SECTIONS: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

/// Strips Cargo's range operators (`^ ~ >= > <= < =`) from a version
/// requirement string.
fn strip_range_operators(spec: &str) -> String {
    let trimmed = spec.trim();
    for op in [">=", "<=", "^", "~", ">", "<", "="] {
        if let Some(rest) = trimmed.strip_prefix(op) {
            return rest.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Extracts `(version_spec, indirect)` from a dependency value; `None` when
/// the dependency has no registry version (path/git-only).
fn version_from_item(item: &Item) -> Option<String> {
    if let Some(s) = item.as_str() {
        return Some(s.to_string());
    }
    if let Some(table) = item.as_table_like() {
        if table.get("path").is_some() || table.get("git").is_some() {
            if table.get("version").is_none() {
                return None;
            }
        }
        return table.get("version").and_then(|v| v.as_str()).map(str::to_string);
    }
    None
}

/// Finds the 1-based line number of `name`'s key within a given section
/// header path, by scanning raw text (span-free, robust to reformatting).
fn find_line_number(content: &str, section_path: &[&str], name: &str) -> usize {
    let mut current_path: Vec<String> = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let inner = trimmed.trim_start_matches('[').trim_end_matches(']');
            current_path = inner.split('.').map(str::to_string).collect();
            continue;
        }
        if current_path.len() != section_path.len()
            || !current_path.iter().zip(section_path).all(|(a, b)| a == b)
        {
            continue;
        }
        let key = trimmed.split_once('=').map(|(k, _)| k.trim());
        if let Some(key) = key {
            let unquoted = key.trim_matches('"');
            if unquoted == name {
                return idx + 1;
            }
        }
    }
    0
}

pub struct CargoEcosystem {
    pub endpoint: EndpointConfig,
}

impl CargoEcosystem {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }
}

impl Parser for CargoEcosystem {
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<Dependency>> {
        let doc: DocumentMut = content.parse().map_err(|e| FreshnessError::Parse {
            path: path.display().to_string(),
            reason: format!("invalid TOML: {e}"),
        })?;

        let mut deps = Vec::new();
        let file_path = path.display().to_string();

        for section in SECTIONS {
            if let Some(table) = doc.get(section).and_then(Item::as_table_like) {
                for (name, item) in table.iter() {
                    let Some(version) = version_from_item(item) else { continue };
                    deps.push(Dependency {
                        name: name.to_string(),
                        current_version: strip_range_operators(&version),
                        latest_version: String::new(),
                        ecosystem: Ecosystem::Cargo,
                        file_path: file_path.clone(),
                        line_number: find_line_number(content, &[section], name),
                        indirect: false,
                        source_url: None,
                        vulnerabilities: Vec::new(),
                        advisory: None,
                    });
                }
            }
        }

        if let Some(ws_deps) = doc
            .get("workspace")
            .and_then(|w| w.get("dependencies"))
            .and_then(Item::as_table_like)
        {
            for (name, item) in ws_deps.iter() {
                let Some(version) = version_from_item(item) else { continue };
                deps.push(Dependency {
                    name: name.to_string(),
                    current_version: strip_range_operators(&version),
                    latest_version: String::new(),
                    ecosystem: Ecosystem::Cargo,
                    file_path: file_path.clone(),
                    line_number: find_line_number(content, &["workspace", "dependencies"], name),
                    indirect: false,
                    source_url: None,
                    vulnerabilities: Vec::new(),
                    advisory: None,
                });
            }
        }

        Ok(deps)
    }
}

#[derive(serde::Deserialize)]
struct CratesIoResponse {
    #[serde(rename = "crate")]
    krate: CrateField,
}

#[derive(serde::Deserialize)]
struct CrateField {
    max_version: String,
}

#[async_trait]
impl Resolver for CargoEcosystem {
    async fn resolve_latest(&self, cache: &HttpCache, dep: &Dependency) -> Result<(String, Option<String>)> {
        let base = self.endpoint.base_url_or("https://crates.io/api/v1");
        let url = format!("{base}/crates/{}", dep.name);
        let body = cache.get(&url, &[]).await?;
        let parsed: CratesIoResponse = serde_json::from_str(&body).map_err(|e| FreshnessError::Parse {
            path: url.clone(),
            reason: e.to_string(),
        })?;
        let source_url = format!("https://crates.io/crates/{}", dep.name);
        Ok((parsed.krate.max_version, Some(source_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[package]
name = "demo"

[dependencies]
serde = "1.0.200"
tokio = { version = "^1.35", features = ["full"] }
local-crate = { path = "../local" }

[dev-dependencies]
criterion = "~0.5"

[workspace.dependencies]
regex = ">=1.10"
"#;

    #[test]
    fn parses_string_and_table_dependencies() {
        let eco = CargoEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("Cargo.toml"), MANIFEST).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"serde"));
        assert!(names.contains(&"tokio"));
        assert!(names.contains(&"criterion"));
        assert!(names.contains(&"regex"));
        assert!(!names.contains(&"local-crate"));
    }

    #[test]
    fn strips_range_operators() {
        let eco = CargoEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("Cargo.toml"), MANIFEST).unwrap();
        let tokio = deps.iter().find(|d| d.name == "tokio").unwrap();
        assert_eq!(tokio.current_version, "1.35");
        let regex = deps.iter().find(|d| d.name == "regex").unwrap();
        assert_eq!(regex.current_version, "1.10");
    }

    #[test]
    fn records_line_numbers() {
        let eco = CargoEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("Cargo.toml"), MANIFEST).unwrap();
        let serde = deps.iter().find(|d| d.name == "serde").unwrap();
        assert_eq!(serde.line_number, 6);
    }
}
