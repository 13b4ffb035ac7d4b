//! Batches `go get`/`go mod tidy` per module directory, skipping modules
//! pinned by a `replace` directive (§4.7 "Go updater").

use crate::error::ApplyError;
use crate::toolchain::{GoToolchain, parse_go_version};
use regex::Regex;
use stagefreight_core::Dependency;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;

fn replace_single_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*replace\s+(\S+)(?:\s+\S+)?\s*=>\s*\S+(?:\s+\S+)?\s*$").unwrap())
}

fn replace_block_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*replace\s*\(\s*$").unwrap())
}

fn replace_block_entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\S+)(?:\s+\S+)?\s*=>\s*\S+(?:\s+\S+)?\s*$").unwrap())
}

/// Returns the set of module paths pinned by a `replace` directive in
/// `go_mod_content` (both block and single-line forms).
pub fn parse_replaced_modules(go_mod_content: &str) -> HashSet<String> {
    let mut replaced = HashSet::new();
    let mut in_block = false;

    for line in go_mod_content.lines() {
        if in_block {
            if line.trim() == ")" {
                in_block = false;
                continue;
            }
            if let Some(caps) = replace_block_entry_re().captures(line) {
                replaced.insert(caps[1].to_string());
            }
            continue;
        }
        if replace_block_start_re().is_match(line) {
            in_block = true;
        } else if let Some(caps) = replace_single_re().captures(line) {
            replaced.insert(caps[1].to_string());
        }
    }
    replaced
}

fn module_dir_of(dep: &Dependency) -> PathBuf {
    Path::new(&dep.file_path).parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone)]
pub struct ReplacedSkip {
    pub dep: Dependency,
    pub module_dir: PathBuf,
}

/// Per module directory, the deps actually batched into `go get`.
#[derive(Debug, Clone)]
pub struct TouchedModule {
    pub dir: PathBuf,
    pub applied: Vec<Dependency>,
}

#[derive(Debug, Default)]
pub struct GoUpdateOutcome {
    pub touched: Vec<TouchedModule>,
    pub skipped_replaced: Vec<ReplacedSkip>,
    pub first_error: Option<ApplyError>,
}

async fn run_checked(mut cmd: Command, dir: &Path) -> Result<(), ApplyError> {
    let label = format!("{:?}", cmd.as_std());
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(ApplyError::CommandFailed {
            command: label,
            dir: dir.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

/// Detects workspace mode (`go.work` at the repo root) and the `go`
/// version directive governing the container-fallback image tag, so the
/// caller can resolve a [`GoToolchain`] once and reuse it for both the
/// applier and the verifier.
pub async fn detect_workspace_and_version(repo_root: &Path, candidates: &[Dependency]) -> (bool, String) {
    let workspace_mode = repo_root.join("go.work").exists();
    let version_source = if workspace_mode {
        tokio::fs::read_to_string(repo_root.join("go.work")).await.unwrap_or_default()
    } else {
        String::new()
    };
    let go_version = if version_source.is_empty() {
        let mut dirs: Vec<PathBuf> = candidates.iter().map(module_dir_of).collect();
        dirs.sort();
        dirs.dedup();
        dirs.first()
            .and_then(|dir| std::fs::read_to_string(repo_root.join(dir).join("go.mod")).ok())
            .map(|c| parse_go_version(&c))
            .unwrap_or_else(|| "1.24".to_string())
    } else {
        parse_go_version(&version_source)
    };
    (workspace_mode, go_version)
}

/// Groups `candidates` (already filtered to the `gomod` ecosystem) by
/// module directory, skips deps pinned via `replace`, then batch-runs
/// `go get`/`go mod tidy` per directory. Stops at the first command
/// failure; directories processed before the failure are still reported.
pub async fn apply(repo_root: &Path, candidates: Vec<Dependency>, toolchain: &GoToolchain, workspace_mode: bool) -> GoUpdateOutcome {
    let mut outcome = GoUpdateOutcome::default();
    if candidates.is_empty() {
        return outcome;
    }

    let mut by_dir: HashMap<PathBuf, Vec<Dependency>> = HashMap::new();
    for dep in candidates {
        by_dir.entry(module_dir_of(&dep)).or_default().push(dep);
    }

    let mut dirs: Vec<PathBuf> = by_dir.keys().cloned().collect();
    dirs.sort();

    for dir in dirs {
        let deps = by_dir.remove(&dir).unwrap_or_default();
        let abs_dir = repo_root.join(&dir);
        let go_mod_content = tokio::fs::read_to_string(abs_dir.join("go.mod")).await.unwrap_or_default();
        let replaced = parse_replaced_modules(&go_mod_content);

        let mut to_update = Vec::new();
        for dep in deps {
            if replaced.contains(&dep.name) {
                outcome.skipped_replaced.push(ReplacedSkip { dep, module_dir: dir.clone() });
            } else {
                to_update.push(dep);
            }
        }

        if to_update.is_empty() {
            continue;
        }

        let args: Vec<String> = to_update.iter().map(|d| format!("{}@{}", d.name, d.latest_version)).collect();
        let mut get_args: Vec<&str> = vec!["get"];
        get_args.extend(args.iter().map(String::as_str));

        if let Err(e) = run_checked(toolchain.command(repo_root, &abs_dir, workspace_mode, &get_args), &abs_dir).await {
            tracing::warn!(dir = %abs_dir.display(), error = %e, "go get failed");
            outcome.first_error = Some(e);
            break;
        }
        if let Err(e) = run_checked(toolchain.command(repo_root, &abs_dir, workspace_mode, &["mod", "tidy"]), &abs_dir).await {
            tracing::warn!(dir = %abs_dir.display(), error = %e, "go mod tidy failed");
            outcome.first_error = Some(e);
            break;
        }

        tracing::info!(dir = %dir.display(), deps = to_update.len(), "go module updated");
        outcome.touched.push(TouchedModule { dir, applied: to_update });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_line_replace() {
        let replaced = parse_replaced_modules("module x\n\nreplace github.com/foo/bar => ../bar\n");
        assert!(replaced.contains("github.com/foo/bar"));
    }

    #[test]
    fn parses_block_replace() {
        let content = "module x\n\nreplace (\n\tgithub.com/foo/bar => ../bar\n\tgithub.com/baz/qux v1.0.0 => github.com/fork/qux v1.0.1\n)\n";
        let replaced = parse_replaced_modules(content);
        assert!(replaced.contains("github.com/foo/bar"));
        assert!(replaced.contains("github.com/baz/qux"));
    }

    #[test]
    fn non_replaced_module_is_untouched() {
        let replaced = parse_replaced_modules("module x\n\nrequire github.com/foo/bar v1.0.0\n");
        assert!(replaced.is_empty());
    }
}
