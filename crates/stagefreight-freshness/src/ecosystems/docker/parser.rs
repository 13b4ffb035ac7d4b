//! Single-pass Dockerfile tokenizer: `FROM` stages, `ENV`/`ARG` variables,
//! and `RUN` bodies, with trailing-backslash line continuations joined and
//! the terminating physical line number preserved.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct FromStage {
    pub image: String,
    pub alias: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct RunCommand {
    pub body: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DockerfileParse {
    pub stages: Vec<FromStage>,
    pub env_vars: Vec<EnvVar>,
    pub runs: Vec<RunCommand>,
}

fn from_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^from\s+(\S+)(?:\s+as\s+(\S+))?").unwrap())
}

/// Strips a leading instruction keyword (case-insensitive), returning the
/// rest of the line when it matches.
fn strip_instruction<'a>(trimmed: &'a str, instr: &str) -> Option<&'a str> {
    if trimmed.len() <= instr.len() {
        return None;
    }
    if trimmed[..instr.len()].eq_ignore_ascii_case(instr)
        && trimmed.as_bytes()[instr.len()].is_ascii_whitespace()
    {
        Some(trimmed[instr.len()..].trim_start())
    } else {
        None
    }
}

fn unquote(s: &str) -> String {
    let t = s.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        t[1..t.len() - 1].to_string()
    } else {
        t.to_string()
    }
}

/// Minimal shell-word tokenizer respecting double quotes; good enough for
/// Dockerfile `ENV`/`ARG` lines.
fn shell_words(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parses an `ENV`/`ARG` instruction body, supporting both `ENV K V` and
/// multi-var `ENV K1=V1 K2="quoted value" K3=V3`.
fn parse_env_or_arg(rest: &str) -> Vec<(String, String)> {
    let tokens = shell_words(rest);
    if tokens.is_empty() {
        return Vec::new();
    }

    if !tokens[0].contains('=') {
        let name = tokens[0].clone();
        let value = tokens[1..].join(" ");
        return vec![(name, unquote(&value))];
    }

    tokens
        .iter()
        .filter_map(|t| t.split_once('=').map(|(k, v)| (k.to_string(), unquote(v))))
        .collect()
}

/// Parses `content` into its `FROM`/`ENV`/`ARG`/`RUN` instructions.
pub fn parse_dockerfile(content: &str) -> DockerfileParse {
    let lines: Vec<&str> = content.lines().collect();
    let mut parse = DockerfileParse::default();
    let mut i = 0;

    while i < lines.len() {
        let mut logical = String::new();
        let mut last = i;
        loop {
            let line = lines[last].trim_end();
            if let Some(stripped) = line.strip_suffix('\\') {
                logical.push_str(stripped.trim_end());
                logical.push(' ');
                last += 1;
                if last >= lines.len() {
                    break;
                }
            } else {
                logical.push_str(line);
                break;
            }
        }

        let line_number = last + 1;
        let trimmed = logical.trim();

        if let Some(caps) = from_re().captures(trimmed) {
            parse.stages.push(FromStage {
                image: caps[1].to_string(),
                alias: caps.get(2).map(|m| m.as_str().to_string()),
                line: line_number,
            });
        } else if let Some(rest) = strip_instruction(trimmed, "ENV").or_else(|| strip_instruction(trimmed, "ARG")) {
            for (name, value) in parse_env_or_arg(rest) {
                parse.env_vars.push(EnvVar { name, value, line: line_number });
            }
        } else if let Some(rest) = strip_instruction(trimmed, "RUN") {
            parse.runs.push(RunCommand { body: rest.to_string(), line: line_number });
        }

        i = last + 1;
    }

    parse
}

#[derive(Debug, Clone)]
pub struct PackageInstall {
    pub manager: &'static str,
    pub packages: Vec<String>,
    pub line: usize,
}

fn extract_packages(rest: &str) -> Vec<String> {
    rest.split_whitespace()
        .filter(|t| !t.starts_with('-') && *t != "\\")
        .map(str::to_string)
        .collect()
}

/// Splits each `RUN` body on `&&` and scans each segment for `apk add`,
/// `apt-get install`, or `pip`/`pip3 install` invocations.
pub fn scan_run_for_installs(runs: &[RunCommand]) -> Vec<PackageInstall> {
    let mut out = Vec::new();
    for run in runs {
        for segment in run.body.split("&&") {
            let seg = segment.trim();
            if let Some(rest) = seg.strip_prefix("apk add") {
                out.push(PackageInstall { manager: "apk", packages: extract_packages(rest), line: run.line });
            } else if let Some((_, rest)) = seg.split_once("apt-get install") {
                out.push(PackageInstall { manager: "apt", packages: extract_packages(rest), line: run.line });
            } else if let Some((_, rest)) = seg.split_once("pip3 install").or_else(|| seg.split_once("pip install")) {
                out.push(PackageInstall { manager: "pip", packages: extract_packages(rest), line: run.line });
            }
        }
    }
    out
}

fn github_release_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"github\.com/([\w.\-]+)/([\w.\-]+)/releases/download/").unwrap())
}

/// Scans `RUN` bodies for GitHub release download URLs, returning
/// `(owner, repo, line)` for each match.
pub fn scan_github_release_urls(runs: &[RunCommand]) -> Vec<(String, String, usize)> {
    let mut out = Vec::new();
    for run in runs {
        for caps in github_release_re().captures_iter(&run.body) {
            out.push((caps[1].to_string(), caps[2].to_string(), run.line));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_from_with_alias() {
        let content = "FROM golang:1.22 AS builder\nFROM scratch\nCOPY --from=builder /app /app\n";
        let parse = parse_dockerfile(content);
        assert_eq!(parse.stages.len(), 2);
        assert_eq!(parse.stages[0].image, "golang:1.22");
        assert_eq!(parse.stages[0].alias.as_deref(), Some("builder"));
        assert_eq!(parse.stages[1].image, "scratch");
    }

    #[test]
    fn joins_continuation_lines_preserving_terminating_line_number() {
        let content = "RUN apt-get update && \\\n    apt-get install -y curl\n";
        let parse = parse_dockerfile(content);
        assert_eq!(parse.runs.len(), 1);
        assert_eq!(parse.runs[0].line, 2);
        assert!(parse.runs[0].body.contains("apt-get install -y curl"));
    }

    #[test]
    fn parses_single_var_and_multi_var_env() {
        let content = "ENV PATH /usr/local/bin\nENV FOO=bar BAZ=\"quoted value\"\n";
        let parse = parse_dockerfile(content);
        assert_eq!(parse.env_vars[0].name, "PATH");
        assert_eq!(parse.env_vars[0].value, "/usr/local/bin");
        assert_eq!(parse.env_vars[1].name, "FOO");
        assert_eq!(parse.env_vars[1].value, "bar");
        assert_eq!(parse.env_vars[2].name, "BAZ");
        assert_eq!(parse.env_vars[2].value, "quoted value");
    }

    #[test]
    fn scans_run_bodies_for_package_installs() {
        let content = "RUN apk add --no-cache curl git && apt-get install -y build-essential\n";
        let parse = parse_dockerfile(content);
        let installs = scan_run_for_installs(&parse.runs);
        assert_eq!(installs.len(), 2);
        assert_eq!(installs[0].manager, "apk");
        assert!(installs[0].packages.contains(&"curl".to_string()));
        assert_eq!(installs[1].manager, "apt");
    }

    #[test]
    fn scans_github_release_urls() {
        let content = "RUN curl -L https://github.com/cli/cli/releases/download/v2.40.0/gh.tar.gz\n";
        let parse = parse_dockerfile(content);
        let urls = scan_github_release_urls(&parse.runs);
        assert_eq!(urls, vec![("cli".to_string(), "cli".to_string(), 1)]);
    }
}
