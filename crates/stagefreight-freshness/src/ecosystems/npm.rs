//! The npm ecosystem: `package.json` `dependencies` and `devDependencies`.

use super::{EndpointConfig, Parser, Resolver};
use crate::error::{FreshnessError, Result};
use async_trait::async_trait;
use serde_json::Value;
use stagefreight_core::cache::HttpCache;
use stagefreight_core::{Dependency, Ecosystem};
use std::path::Path;

const NON_REGISTRY_PREFIXES: [&str; 7] =
    ["workspace:", "file:", "git:", "git+", "http:", "https:", "link:"];

/// Strips npm range operators and trailing `.x`/`*` wildcard segments.
fn normalize_spec(spec: &str) -> String {
    let mut s = spec.trim();
    for op in ["^", "~", ">=", "<=", ">", "<", "="] {
        if let Some(rest) = s.strip_prefix(op) {
            s = rest.trim();
            break;
        }
    }
    let mut owned = s.to_string();
    loop {
        if let Some(stripped) = owned.strip_suffix(".x") {
            owned = stripped.to_string();
            continue;
        }
        if let Some(stripped) = owned.strip_suffix(".*") {
            owned = stripped.to_string();
            continue;
        }
        if owned == "*" {
            owned.clear();
        }
        break;
    }
    owned
}

/// Finds the byte span of a top-level JSON object's value (between its
/// opening and closing brace), locating it by its `"key":` prefix.
fn find_object_span(content: &str, key: &str) -> Option<(usize, usize)> {
    let needle = format!("\"{key}\"");
    let key_idx = content.find(&needle)?;
    let after_key = &content[key_idx + needle.len()..];
    let colon_rel = after_key.find(':')?;
    let after_colon = &after_key[colon_rel + 1..];
    let brace_rel = after_colon.find('{')?;
    let open_abs = key_idx + needle.len() + colon_rel + 1 + brace_rel;

    let mut depth = 0usize;
    for (i, c) in content[open_abs..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open_abs + 1, open_abs + i));
                }
            }
            _ => {}
        }
    }
    None
}

fn line_of(content: &str, abs_idx: usize) -> usize {
    content[..abs_idx].matches('\n').count() + 1
}

fn find_line_number(content: &str, span: (usize, usize), name: &str) -> usize {
    let (start, end) = span;
    let section = &content[start..end];
    let needle = format!("\"{name}\"");
    match section.find(&needle) {
        Some(rel) => line_of(content, start + rel),
        None => 0,
    }
}

pub struct NpmEcosystem {
    pub endpoint: EndpointConfig,
}

impl NpmEcosystem {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }
}

impl Parser for NpmEcosystem {
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<Dependency>> {
        let value: Value = serde_json::from_str(content).map_err(|e| FreshnessError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut deps = Vec::new();
        let file_path = path.display().to_string();

        for section in ["dependencies", "devDependencies"] {
            let Some(obj) = value.get(section).and_then(Value::as_object) else { continue };
            let span = find_object_span(content, section);

            for (name, spec_value) in obj {
                let Some(raw_spec) = spec_value.as_str() else { continue };
                if NON_REGISTRY_PREFIXES.iter().any(|p| raw_spec.starts_with(p)) {
                    continue;
                }

                deps.push(Dependency {
                    name: name.clone(),
                    current_version: normalize_spec(raw_spec),
                    latest_version: String::new(),
                    ecosystem: Ecosystem::Npm,
                    file_path: file_path.clone(),
                    line_number: span.map(|s| find_line_number(content, s, name)).unwrap_or(0),
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
struct NpmLatest {
    version: String,
}

#[async_trait]
impl Resolver for NpmEcosystem {
    async fn resolve_latest(&self, cache: &HttpCache, dep: &Dependency) -> Result<(String, Option<String>)> {
        let base = self.endpoint.base_url_or("https://registry.npmjs.org");
        let url = format!("{base}/{}/latest", dep.name);
        let body = cache.get(&url, &[]).await?;
        let parsed: NpmLatest = serde_json::from_str(&body).map_err(|e| FreshnessError::Parse {
            path: url.clone(),
            reason: e.to_string(),
        })?;
        let source_url = format!("https://www.npmjs.com/package/{}", dep.name);
        Ok((parsed.version, Some(source_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
  "name": "demo",
  "dependencies": {
    "react": "^18.2.0",
    "lodash": "~4.17.x",
    "local-pkg": "file:../local"
  },
  "devDependencies": {
    "vitest": ">=1.0.0"
  }
}
"#;

    #[test]
    fn parses_dependencies_and_dev_dependencies() {
        let eco = NpmEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("package.json"), MANIFEST).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"react"));
        assert!(names.contains(&"vitest"));
        assert!(!names.contains(&"local-pkg"));
    }

    #[test]
    fn strips_operators_and_wildcards() {
        let eco = NpmEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("package.json"), MANIFEST).unwrap();
        let react = deps.iter().find(|d| d.name == "react").unwrap();
        assert_eq!(react.current_version, "18.2.0");
        let lodash = deps.iter().find(|d| d.name == "lodash").unwrap();
        assert_eq!(lodash.current_version, "4.17");
    }

    #[test]
    fn rejects_non_registry_specs() {
        assert_eq!(normalize_spec("1.0.0"), "1.0.0");
        let eco = NpmEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("package.json"), MANIFEST).unwrap();
        assert!(deps.iter().all(|d| d.name != "local-pkg"));
    }
}
