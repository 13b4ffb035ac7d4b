//! Runs `go test` and `govulncheck` against every Go module directory the
//! applier touched (§4.8).

use crate::error::ApplyError;
use crate::toolchain::GoToolchain;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct VerifyOutcome {
    pub log: String,
    pub first_error: Option<ApplyError>,
}

async fn run_and_log(toolchain: &GoToolchain, repo_root: &Path, module_dir: &Path, workspace_mode: bool, args: &[&str], header: &str, log: &mut String) -> Result<(), ApplyError> {
    log.push_str(header);
    log.push('\n');

    let output = toolchain.command(repo_root, module_dir, workspace_mode, args).output().await?;
    log.push_str(&String::from_utf8_lossy(&output.stdout));
    log.push_str(&String::from_utf8_lossy(&output.stderr));
    log.push('\n');

    if output.status.success() {
        Ok(())
    } else {
        Err(ApplyError::CommandFailed {
            command: args.join(" "),
            dir: module_dir.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Deduplicates and sorts `touched_dirs`, then for each runs `go test
/// ./...` followed by `govulncheck ./...`. The first failure is retained
/// as `first_error`; logs from every directory are still concatenated.
pub async fn verify(repo_root: &Path, touched_dirs: &[PathBuf], toolchain: &GoToolchain, workspace_mode: bool) -> VerifyOutcome {
    let mut dirs = touched_dirs.to_vec();
    dirs.sort();
    dirs.dedup();

    let mut outcome = VerifyOutcome::default();
    for dir in dirs {
        let abs_dir = repo_root.join(&dir);

        let header = format!("=== go test ./... ({}) ===", dir.display());
        if let Err(e) = run_and_log(toolchain, repo_root, &abs_dir, workspace_mode, &["test", "./..."], &header, &mut outcome.log).await {
            if outcome.first_error.is_none() {
                outcome.first_error = Some(e);
            }
            continue;
        }

        let header = format!("=== govulncheck ./... ({}) ===", dir.display());
        let args = ["run", "golang.org/x/vuln/cmd/govulncheck@latest", "./..."];
        if let Err(e) = run_and_log(toolchain, repo_root, &abs_dir, workspace_mode, &args, &header, &mut outcome.log).await {
            if outcome.first_error.is_none() {
                outcome.first_error = Some(e);
            }
        }
    }

    outcome
}
