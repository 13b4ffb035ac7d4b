//! Hash-guarded Dockerfile line replacement: each edit is verified against
//! the line content recorded at resolution time before it's written, and
//! again immediately before the write lands (§4.7 "Dockerfile updater").

use crate::error::{ApplyError, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use stagefreight_core::{Dependency, Ecosystem};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

fn instruction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(FROM|ENV|ARG)\b").unwrap())
}

fn hash_line(line: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Builds the replacement text for one dependency's recorded line, or
/// `None` if the line no longer contains the expected current-version
/// token (the double-check guard never fires on a line that never
/// matched in the first place).
fn build_replacement(line: &str, dep: &Dependency) -> Option<String> {
    if !instruction_re().is_match(line) {
        return None;
    }
    let (needle, replacement) = if dep.ecosystem == Ecosystem::DockerImage {
        (format!("{}:{}", dep.name, dep.current_version), format!("{}:{}", dep.name, dep.latest_version))
    } else {
        (dep.current_version.clone(), dep.latest_version.clone())
    };
    if !line.contains(&needle) {
        return None;
    }
    Some(line.replacen(&needle, &replacement, 1))
}

#[derive(Debug, Clone)]
struct PlannedEdit {
    line_index: usize,
    expected_hash: String,
    new_line: String,
}

#[derive(Debug, Default)]
pub struct DockerUpdateOutcome {
    pub applied: Vec<Dependency>,
    pub skipped: Vec<(Dependency, String)>,
}

/// Groups `candidates` by file, plans one edit per dependency against the
/// file content on disk right now, then re-reads each file immediately
/// before writing to confirm no line drifted between planning and write.
pub async fn apply(repo_root: &Path, candidates: Vec<Dependency>) -> Result<DockerUpdateOutcome> {
    let mut outcome = DockerUpdateOutcome::default();
    if candidates.is_empty() {
        return Ok(outcome);
    }

    let mut by_file: HashMap<String, Vec<Dependency>> = HashMap::new();
    for dep in candidates {
        by_file.entry(dep.file_path.clone()).or_default().push(dep);
    }

    for (file_path, deps) in by_file {
        let abs_path = repo_root.join(&file_path);
        let original = tokio::fs::read_to_string(&abs_path).await?;
        let lines: Vec<&str> = original.lines().collect();

        let mut edits = Vec::new();
        for dep in deps {
            let idx = dep.line_number.saturating_sub(1);
            let Some(&line) = lines.get(idx) else {
                outcome.skipped.push((dep, format!("line {} out of range", dep.line_number)));
                continue;
            };
            match build_replacement(line, &dep) {
                Some(new_line) => edits.push((dep, PlannedEdit { line_index: idx, expected_hash: hash_line(line), new_line })),
                None => outcome.skipped.push((dep, "line content no longer matches the recorded version".to_string())),
            }
        }

        if edits.is_empty() {
            continue;
        }
        edits.sort_by_key(|(_, edit)| edit.line_index);

        // Double-check guard: re-read immediately before writing.
        let current = tokio::fs::read_to_string(&abs_path).await?;
        let current_lines: Vec<&str> = current.lines().collect();
        for (dep, edit) in &edits {
            let current_line = current_lines.get(edit.line_index).copied().unwrap_or("");
            if hash_line(current_line) != edit.expected_hash {
                return Err(ApplyError::StaleLine { file: file_path.clone(), line: dep.line_number });
            }
        }

        let mut new_lines: Vec<String> = current_lines.iter().map(|s| (*s).to_string()).collect();
        for (dep, edit) in &edits {
            let Some(slot) = new_lines.get_mut(edit.line_index) else {
                return Err(ApplyError::LineOutOfRange { file: file_path.clone(), line: dep.line_number });
            };
            *slot = edit.new_line.clone();
        }

        let trailing_newline = current.ends_with('\n');
        let mut rendered = new_lines.join("\n");
        if trailing_newline {
            rendered.push('\n');
        }
        tokio::fs::write(&abs_path, rendered).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o644);
            tokio::fs::set_permissions(&abs_path, perms).await?;
        }

        outcome.applied.extend(edits.into_iter().map(|(dep, _)| dep));
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dockerfile_dep(current: &str, latest: &str, line: usize) -> Dependency {
        Dependency {
            name: "golang".to_string(),
            current_version: current.to_string(),
            latest_version: latest.to_string(),
            ecosystem: Ecosystem::DockerImage,
            file_path: "Dockerfile".to_string(),
            line_number: line,
            indirect: false,
            source_url: None,
            vulnerabilities: Vec::new(),
            advisory: None,
        }
    }

    #[tokio::test]
    async fn rewrites_from_line_in_place() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM golang:1.21-alpine AS builder\nRUN true\n").unwrap();

        let outcome = apply(dir.path(), vec![dockerfile_dep("1.21-alpine", "1.22-alpine", 1)]).await.unwrap();
        assert_eq!(outcome.applied.len(), 1);

        let rewritten = std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap();
        assert!(rewritten.starts_with("FROM golang:1.22-alpine AS builder"));
    }

    #[tokio::test]
    async fn skips_when_line_no_longer_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM golang:9.9.9-alpine AS builder\n").unwrap();

        let outcome = apply(dir.path(), vec![dockerfile_dep("1.21-alpine", "1.22-alpine", 1)]).await.unwrap();
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
    }
}
