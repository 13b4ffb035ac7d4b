//! Orchestrates the update applier, verifier and artifact generator: given
//! a repo root and the dependencies a freshness pass already resolved,
//! this crate enforces the git-clean precondition, filters to updatable
//! candidates, applies Go and Dockerfile updates, verifies touched Go
//! modules, and writes the run's artifacts.

pub mod artifacts;
pub mod candidates;
pub mod docker_updater;
pub mod error;
pub mod git;
pub mod go_updater;
pub mod toolchain;
pub mod verifier;

pub use artifacts::RunSummary;
pub use candidates::{ApplyOptions, FilteredCandidates, SkippedCandidate, filter_update_candidates};
pub use error::{ApplyError, Result};

use stagefreight_core::{Dependency, Ecosystem};
use std::path::{Path, PathBuf};

/// Artifact-generator knobs not already implied by the repo/candidate set.
#[derive(Debug, Clone)]
pub struct ArtifactOptions {
    pub output_dir: PathBuf,
    pub policy: String,
    pub stagefreight_version: String,
    pub bundle: bool,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".stagefreight/deps"),
            policy: String::new(),
            stagefreight_version: env!("CARGO_PKG_VERSION").to_string(),
            bundle: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunOutcome {
    pub applied: Vec<Dependency>,
    pub skipped: Vec<SkippedCandidate>,
    pub touched_go_dirs: Vec<PathBuf>,
    pub verify_log: Option<String>,
    pub verify_error: Option<String>,
    pub first_error: Option<ApplyError>,
}

/// Runs the full applier pipeline: git-clean precondition, candidate
/// filtering, Go/Dockerfile updates, verification of touched Go modules,
/// and artifact generation. A dirty working tree is a hard error raised
/// before anything else runs; every other failure is recorded on
/// [`RunOutcome::first_error`] so partial progress and artifacts are still
/// reported.
pub async fn run(repo_root: &Path, deps: Vec<Dependency>, apply_options: &ApplyOptions, artifact_options: &ArtifactOptions) -> Result<RunOutcome> {
    git::ensure_clean(repo_root).await?;

    let filtered = filter_update_candidates(repo_root, deps, apply_options).await;
    let mut outcome = RunOutcome { skipped: filtered.skipped, ..Default::default() };

    let (go_candidates, docker_candidates): (Vec<Dependency>, Vec<Dependency>) =
        filtered.accepted.into_iter().partition(|d| d.ecosystem == Ecosystem::GoMod);

    if !go_candidates.is_empty() {
        let (workspace_mode, go_version) = go_updater::detect_workspace_and_version(repo_root, &go_candidates).await;
        match toolchain::GoToolchain::resolve(&go_version).await {
            Ok(toolchain) => {
                let go_outcome = go_updater::apply(repo_root, go_candidates, &toolchain, workspace_mode).await;
                outcome.touched_go_dirs = go_outcome.touched.iter().map(|t| t.dir.clone()).collect();
                outcome.applied.extend(go_outcome.touched.into_iter().flat_map(|t| t.applied));
                outcome.skipped.extend(go_outcome.skipped_replaced.into_iter().map(|r| SkippedCandidate {
                    dep: r.dep,
                    reason: format!("module is pinned via a `replace` directive in {}", r.module_dir.display()),
                }));
                if go_outcome.first_error.is_some() {
                    outcome.first_error = go_outcome.first_error;
                } else if !outcome.touched_go_dirs.is_empty() {
                    let verify_outcome = verifier::verify(repo_root, &outcome.touched_go_dirs, &toolchain, workspace_mode).await;
                    outcome.verify_log = Some(verify_outcome.log);
                    outcome.verify_error = verify_outcome.first_error.as_ref().map(ToString::to_string);
                }
            }
            Err(e) => outcome.first_error = Some(e),
        }
    }

    if !docker_candidates.is_empty() {
        match docker_updater::apply(repo_root, docker_candidates).await {
            Ok(docker_outcome) => {
                outcome.applied.extend(docker_outcome.applied);
                outcome.skipped.extend(docker_outcome.skipped.into_iter().map(|(dep, reason)| SkippedCandidate { dep, reason }));
            }
            Err(e) => {
                if outcome.first_error.is_none() {
                    outcome.first_error = Some(e);
                }
            }
        }
    }

    let summary = RunSummary {
        policy: artifact_options.policy.clone(),
        stagefreight_version: artifact_options.stagefreight_version.clone(),
        applied: &outcome.applied,
        skipped: &outcome.skipped,
        verify_log: outcome.verify_log.as_deref(),
        verify_error: outcome.verify_error.as_deref(),
    };
    let output_dir = if artifact_options.output_dir.is_absolute() {
        artifact_options.output_dir.clone()
    } else {
        repo_root.join(&artifact_options.output_dir)
    };
    artifacts::write_artifacts(repo_root, &output_dir, &summary, artifact_options.bundle).await?;

    Ok(outcome)
}
