//! The Go modules ecosystem: `go.mod` `require` directives, single-line and
//! block forms.
//!
//! Grounded on the teacher's `deps-go` parser: regex-scanned `require`
//! lines, `// indirect` trailing comment detection, and the module-proxy
//! path-escaping scheme used to resolve `@latest`.

use super::{EndpointConfig, Parser, Resolver};
use crate::error::{FreshnessError, Result};
use async_trait::async_trait;
use regex::Regex;
use stagefreight_core::cache::HttpCache;
use stagefreight_core::{Dependency, Ecosystem};
use std::path::Path;
use std::sync::OnceLock;

fn require_single_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*require\s+(\S+)\s+(\S+)(\s*//\s*indirect)?\s*$").unwrap())
}

fn require_block_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*require\s*\(\s*$").unwrap())
}

fn require_block_entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\S+)\s+(\S+)(\s*//\s*indirect)?\s*$").unwrap())
}

/// Escapes a Go module path for the module-proxy URL scheme: each uppercase
/// letter becomes `!` followed by its lowercase form.
pub fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub struct GoModEcosystem {
    pub endpoint: EndpointConfig,
}

impl GoModEcosystem {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }
}

impl Parser for GoModEcosystem {
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<Dependency>> {
        let mut deps = Vec::new();
        let file_path = path.display().to_string();
        let mut in_block = false;

        for (idx, line) in content.lines().enumerate() {
            let line_number = idx + 1;

            if in_block {
                if line.trim() == ")" {
                    in_block = false;
                    continue;
                }
                if let Some(caps) = require_block_entry_re().captures(line) {
                    deps.push(Dependency {
                        name: caps[1].to_string(),
                        current_version: caps[2].to_string(),
                        latest_version: String::new(),
                        ecosystem: Ecosystem::GoMod,
                        file_path: file_path.clone(),
                        line_number,
                        indirect: caps.get(3).is_some(),
                        source_url: None,
                        vulnerabilities: Vec::new(),
                        advisory: None,
                    });
                }
                continue;
            }

            if require_block_start_re().is_match(line) {
                in_block = true;
                continue;
            }

            if let Some(caps) = require_single_re().captures(line) {
                deps.push(Dependency {
                    name: caps[1].to_string(),
                    current_version: caps[2].to_string(),
                    latest_version: String::new(),
                    ecosystem: Ecosystem::GoMod,
                    file_path: file_path.clone(),
                    line_number,
                    indirect: caps.get(3).is_some(),
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
struct GoProxyLatest {
    #[serde(rename = "Version")]
    version: String,
}

#[async_trait]
impl Resolver for GoModEcosystem {
    async fn resolve_latest(&self, cache: &HttpCache, dep: &Dependency) -> Result<(String, Option<String>)> {
        // indirect entries are not resolved (§4.2.2)
        if dep.indirect {
            return Ok((dep.current_version.clone(), None));
        }

        let base = self.endpoint.base_url_or("https://proxy.golang.org");
        let escaped = escape_module_path(&dep.name);
        let url = format!("{base}/{escaped}/@latest");
        let body = cache.get(&url, &[]).await?;
        let parsed: GoProxyLatest = serde_json::from_str(&body).map_err(|e| FreshnessError::Parse {
            path: url.clone(),
            reason: e.to_string(),
        })?;
        let source_url = format!("https://pkg.go.dev/{}", dep.name);
        Ok((parsed.version, Some(source_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_uppercase_module_segments() {
        assert_eq!(escape_module_path("github.com/BurntSushi/toml"), "github.com/!burnt!sushi/toml");
    }

    #[test]
    fn parses_single_line_require_with_indirect_comment() {
        let content = "module example.com/app\n\ngo 1.22\n\nrequire golang.org/x/net v0.21.0 // indirect\n";
        let eco = GoModEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("go.mod"), content).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "golang.org/x/net");
        assert_eq!(deps[0].current_version, "v0.21.0");
        assert!(deps[0].indirect);
        assert_eq!(deps[0].line_number, 5);
    }

    #[test]
    fn parses_require_block() {
        let content = "module example.com/app\n\nrequire (\n\tgithub.com/foo/bar v1.2.3\n\tgithub.com/baz/qux v0.0.1 // indirect\n)\n";
        let eco = GoModEcosystem::new(EndpointConfig::default());
        let deps = eco.parse(Path::new("go.mod"), content).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "github.com/foo/bar");
        assert!(!deps[0].indirect);
        assert!(deps[1].indirect);
    }
}
