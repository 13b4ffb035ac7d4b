//! Git preconditions: a clean working tree before the applier touches
//! anything, and per-file tracked/untracked status used by the candidate
//! filter.

use crate::error::{ApplyError, Result};
use std::path::Path;
use tokio::process::Command;

/// Runs `git status --porcelain` at `repo_root` and hard-fails, listing the
/// dirty paths, unless the tree is clean.
pub async fn ensure_clean(repo_root: &Path) -> Result<()> {
    let output = Command::new("git").arg("status").arg("--porcelain").current_dir(repo_root).output().await?;

    if !output.status.success() {
        return Err(ApplyError::CommandFailed {
            command: "git status --porcelain".to_string(),
            dir: repo_root.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let dirty: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    if !dirty.is_empty() {
        tracing::warn!(paths = %dirty.join(", "), "refusing to apply updates to a dirty working tree");
        return Err(ApplyError::DirtyWorkingTree(dirty.join(", ")));
    }
    Ok(())
}

/// Whether `relative_path` is tracked by git (`git ls-files --error-unmatch`).
pub async fn is_tracked(repo_root: &Path, relative_path: &str) -> bool {
    Command::new("git")
        .arg("ls-files")
        .arg("--error-unmatch")
        .arg(relative_path)
        .current_dir(repo_root)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn init_repo(dir: &Path) {
        StdCommand::new("git").arg("init").arg("-q").current_dir(dir).output().unwrap();
        StdCommand::new("git").args(["config", "user.email", "a@b.c"]).current_dir(dir).output().unwrap();
        StdCommand::new("git").args(["config", "user.name", "t"]).current_dir(dir).output().unwrap();
    }

    #[tokio::test]
    async fn clean_repo_passes() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        StdCommand::new("git").args(["add", "."]).current_dir(dir.path()).output().unwrap();
        StdCommand::new("git").args(["commit", "-q", "-m", "init"]).current_dir(dir.path()).output().unwrap();

        assert!(ensure_clean(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn dirty_repo_fails_with_paths() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();

        let err = ensure_clean(dir.path()).await.unwrap_err();
        assert!(matches!(err, ApplyError::DirtyWorkingTree(_)));
    }

    #[tokio::test]
    async fn untracked_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();

        assert!(!is_tracked(dir.path(), "a.txt").await);
    }
}
