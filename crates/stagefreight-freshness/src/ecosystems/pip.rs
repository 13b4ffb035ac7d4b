//! The Python ecosystem: `requirements*.txt` and `Pipfile`
//! `[packages]`/`[dev-packages]` sections.

use super::{EndpointConfig, Parser, Resolver};
use crate::error::{FreshnessError, Result};
use async_trait::async_trait;
use stagefreight_core::cache::HttpCache;
use stagefreight_core::{Dependency, Ecosystem};
use std::path::Path;
use toml_edit::{DocumentMut, Item};

const PIN_OPERATORS: [&str; 8] = ["===", "==", "~=", "!=", ">=", "<=", ">", "<"];

/// Parses one `requirements.txt` line into `(name, version)`, skipping
/// blank/comment/option lines, trailing inline comments, and environment
/// markers. Takes the first version when a comma-separated range follows.
fn parse_requirement_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('-') {
        return None;
    }

    let without_comment = trimmed.split('#').next().unwrap_or(trimmed).trim();
    let without_marker = without_comment.split(';').next().unwrap_or(without_comment).trim();

    for op in PIN_OPERATORS {
        if let Some(idx) = without_marker.find(op) {
            let name = without_marker[..idx].trim();
            if name.is_empty() {
                return None;
            }
            let rest = &without_marker[idx + op.len()..];
            let version = rest.split(',').next().unwrap_or(rest).trim();
            return Some((name.to_string(), version.to_string()));
        }
    }
    None
}

fn strip_pin_operator(spec: &str) -> String {
    let trimmed = spec.trim();
    for op in PIN_OPERATORS {
        if let Some(rest) = trimmed.strip_prefix(op) {
            return rest.trim().to_string();
        }
    }
    trimmed.to_string()
}

fn parse_requirements_txt(path: &Path, content: &str) -> Vec<Dependency> {
    let file_path = path.display().to_string();
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let (name, version) = parse_requirement_line(line)?;
            Some(Dependency {
                name,
                current_version: version,
                latest_version: String::new(),
                ecosystem: Ecosystem::Pip,
                file_path: file_path.clone(),
                line_number: idx + 1,
                indirect: false,
                source_url: None,
                vulnerabilities: Vec::new(),
                advisory: None,
            })
        })
        .collect()
}

fn pipfile_value_spec(item: &Item) -> Option<String> {
    if let Some(s) = item.as_str() {
        return Some(s.to_string());
    }
    item.as_table_like()?.get("version").and_then(|v| v.as_str()).map(str::to_string)
}

fn find_line_number(content: &str, section: &str, name: &str) -> usize {
    let mut current_section = String::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            current_section = trimmed.trim_start_matches('[').trim_end_matches(']').to_string();
            continue;
        }
        if current_section != section {
            continue;
        }
        if let Some((key, _)) = trimmed.split_once('=') {
            if key.trim().trim_matches('"') == name {
                return idx + 1;
            }
        }
    }
    0
}

fn parse_pipfile(path: &Path, content: &str) -> Result<Vec<Dependency>> {
    let doc: DocumentMut = content.parse().map_err(|e| FreshnessError::Parse {
        path: path.display().to_string(),
        reason: format!("invalid Pipfile TOML: {e}"),
    })?;

    let mut deps = Vec::new();
    let file_path = path.display().to_string();

    for section in ["packages", "dev-packages"] {
        if let Some(table) = doc.get(section).and_then(Item::as_table_like) {
            for (name, item) in table.iter() {
                let Some(spec) = pipfile_value_spec(item) else { continue };
                if spec == "*" {
                    continue;
                }
                deps.push(Dependency {
                    name: name.to_string(),
                    current_version: strip_pin_operator(&spec),
                    latest_version: String::new(),
                    ecosystem: Ecosystem::Pip,
                    file_path: file_path.clone(),
                    line_number: find_line_number(content, section, name),
                    indirect: false,
                    source_url: None,
                    vulnerabilities: Vec::new(),
                    advisory: None,
                });
            }
        }
    }

    Ok(deps)
}

pub struct PipEcosystem {
    pub endpoint: EndpointConfig,
}

impl PipEcosystem {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }
}

impl Parser for PipEcosystem {
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<Dependency>> {
        let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if basename == "Pipfile" {
            parse_pipfile(path, content)
        } else {
            Ok(parse_requirements_txt(path, content))
        }
    }
}

#[derive(serde::Deserialize)]
struct PypiInfo {
    info: PypiInfoInner,
}

#[derive(serde::Deserialize)]
struct PypiInfoInner {
    version: String,
}

#[async_trait]
impl Resolver for PipEcosystem {
    async fn resolve_latest(&self, cache: &HttpCache, dep: &Dependency) -> Result<(String, Option<String>)> {
        let base = self.endpoint.base_url_or("https://pypi.org/pypi");
        let url = format!("{base}/{}/json", dep.name);
        let body = cache.get(&url, &[]).await?;
        let parsed: PypiInfo = serde_json::from_str(&body).map_err(|e| FreshnessError::Parse {
            path: url.clone(),
            reason: e.to_string(),
        })?;
        let source_url = format!("https://pypi.org/project/{}/", dep.name);
        Ok((parsed.info.version, Some(source_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_requirements_txt_with_comments_and_markers() {
        let content = "# comment\n\nrequests==2.31.0\nnumpy>=1.26.0,<2.0 ; python_version >= '3.9'\n-e ./local\nflask~=3.0  # web framework\n";
        let eco = PipEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("requirements.txt"), content).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "requests");
        assert_eq!(deps[0].current_version, "2.31.0");
        assert_eq!(deps[1].name, "numpy");
        assert_eq!(deps[1].current_version, "1.26.0");
        assert_eq!(deps[2].name, "flask");
        assert_eq!(deps[2].current_version, "3.0");
    }

    #[test]
    fn parses_pipfile_packages_sections() {
        let content = "[packages]\nrequests = \"==2.31.0\"\ndjango = {version = \"~=4.2\", extras = [\"bcrypt\"]}\n\n[dev-packages]\npytest = \"*\"\n";
        let eco = PipEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("Pipfile"), content).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"requests"));
        assert!(names.contains(&"django"));
        assert!(!names.contains(&"pytest"));
        let django = deps.iter().find(|d| d.name == "django").unwrap();
        assert_eq!(django.current_version, "4.2");
    }
}
