//! Writes the artifacts the narrator/CI caller consumes after a run:
//! `resolve.json`, `deps-report.md`, `deps.patch`, and (when a bundle is
//! requested) `deps-updated.tgz` (§4.9).

use crate::candidates::SkippedCandidate;
use crate::error::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use stagefreight_core::version::{UpdateType, apk_delta, apt_delta, semver_delta};
use stagefreight_core::{Dependency, Ecosystem, VulnInfo};
use std::path::{Path, PathBuf};
use tokio::process::Command;

const SCHEMA_VERSION: u32 = 1;

fn dominant_update_type(ecosystem: Ecosystem, current: &str, latest: &str) -> Option<UpdateType> {
    let delta = match ecosystem {
        Ecosystem::AlpineApk => apk_delta(current, latest),
        Ecosystem::DebianApt => apt_delta(current, latest),
        _ => semver_delta(current, latest),
    };
    delta.and_then(|d| d.dominant())
}

fn update_type_label(t: Option<UpdateType>) -> String {
    match t {
        Some(UpdateType::Major) => "major".to_string(),
        Some(UpdateType::Minor) => "minor".to_string(),
        Some(UpdateType::Patch) => "patch".to_string(),
        None => String::new(),
    }
}

/// The canonical `ecosystem` token used in `resolve.json` (matches
/// `Ecosystem`'s serde representation, e.g. `gomod` rather than `GoMod`).
fn ecosystem_tag(ecosystem: Ecosystem) -> &'static str {
    match ecosystem {
        Ecosystem::DockerImage => "docker-image",
        Ecosystem::DockerTool => "docker-tool",
        Ecosystem::GoMod => "gomod",
        Ecosystem::Cargo => "cargo",
        Ecosystem::Npm => "npm",
        Ecosystem::AlpineApk => "alpine-apk",
        Ecosystem::DebianApt => "debian-apt",
        Ecosystem::Pip => "pip",
    }
}

fn source_label(ecosystem: Ecosystem) -> &'static str {
    match ecosystem {
        Ecosystem::DockerImage => "docker hub",
        Ecosystem::DockerTool => "github releases",
        Ecosystem::GoMod => "go module proxy",
        Ecosystem::Cargo => "crates.io",
        Ecosystem::Npm => "npm registry",
        Ecosystem::Pip => "pypi",
        Ecosystem::AlpineApk => "alpine apkindex",
        Ecosystem::DebianApt => "debian packages",
    }
}

#[derive(Debug, Serialize)]
struct ResolveDep {
    name: String,
    current: String,
    latest: String,
    target: String,
    ecosystem: Ecosystem,
    file: String,
    line: usize,
    source: String,
    #[serde(rename = "sourceURL")]
    source_url: String,
    vulnerabilities: Vec<VulnInfo>,
    #[serde(rename = "updateType")]
    update_type: String,
    decision: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct ResolveDoc {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
    #[serde(rename = "generatedAt")]
    generated_at: String,
    #[serde(rename = "stagefreightVersion")]
    stagefreight_version: String,
    policy: String,
    ecosystems: Vec<String>,
    deps: Vec<ResolveDep>,
}

fn applied_dep(dep: &Dependency) -> ResolveDep {
    ResolveDep {
        name: dep.name.clone(),
        current: dep.current_version.clone(),
        latest: dep.latest_version.clone(),
        target: dep.latest_version.clone(),
        ecosystem: dep.ecosystem,
        file: dep.file_path.clone(),
        line: dep.line_number,
        source: source_label(dep.ecosystem).to_string(),
        source_url: dep.source_url.clone().unwrap_or_default(),
        vulnerabilities: dep.vulnerabilities.clone(),
        update_type: update_type_label(dominant_update_type(dep.ecosystem, &dep.current_version, &dep.latest_version)),
        decision: "update".to_string(),
        reason: String::new(),
    }
}

fn skipped_dep(skipped: &SkippedCandidate) -> ResolveDep {
    let dep = &skipped.dep;
    ResolveDep {
        name: dep.name.clone(),
        current: dep.current_version.clone(),
        latest: dep.latest_version.clone(),
        target: String::new(),
        ecosystem: dep.ecosystem,
        file: dep.file_path.clone(),
        line: dep.line_number,
        source: source_label(dep.ecosystem).to_string(),
        source_url: dep.source_url.clone().unwrap_or_default(),
        vulnerabilities: dep.vulnerabilities.clone(),
        update_type: update_type_label(dominant_update_type(dep.ecosystem, &dep.current_version, &dep.latest_version)),
        decision: "skip".to_string(),
        reason: skipped.reason.clone(),
    }
}

/// Everything the artifact generator needs to know about one run, already
/// resolved by the applier and (optionally) the verifier.
pub struct RunSummary<'a> {
    pub policy: String,
    pub stagefreight_version: String,
    pub applied: &'a [Dependency],
    pub skipped: &'a [SkippedCandidate],
    pub verify_log: Option<&'a str>,
    pub verify_error: Option<&'a str>,
}

fn resolve_doc(summary: &RunSummary) -> ResolveDoc {
    let mut ecosystems: Vec<String> = summary
        .applied
        .iter()
        .map(|d| d.ecosystem)
        .chain(summary.skipped.iter().map(|s| s.dep.ecosystem))
        .map(|e| ecosystem_tag(e).to_string())
        .collect();
    ecosystems.sort();
    ecosystems.dedup();

    let mut deps: Vec<ResolveDep> = summary.applied.iter().map(applied_dep).collect();
    deps.extend(summary.skipped.iter().map(skipped_dep));

    ResolveDoc {
        schema_version: SCHEMA_VERSION,
        generated_at: chrono::Utc::now().to_rfc3339(),
        stagefreight_version: summary.stagefreight_version.clone(),
        policy: summary.policy.clone(),
        ecosystems,
        deps,
    }
}

fn render_report(summary: &RunSummary) -> String {
    let mut out = String::new();
    out.push_str("# Dependency Update Report\n\n");

    out.push_str("## Applied\n\n");
    if summary.applied.is_empty() {
        out.push_str("_none_\n\n");
    } else {
        out.push_str("| Dependency | From | To | Type | CVEs |\n|---|---|---|---|---|\n");
        for dep in summary.applied {
            let update_type = update_type_label(dominant_update_type(dep.ecosystem, &dep.current_version, &dep.latest_version));
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                dep.name,
                dep.current_version,
                dep.latest_version,
                if update_type.is_empty() { "-" } else { &update_type },
                dep.vulnerabilities.len()
            ));
        }
        out.push('\n');
    }

    out.push_str("## Skipped\n\n");
    if summary.skipped.is_empty() {
        out.push_str("_none_\n\n");
    } else {
        out.push_str("| Dependency | Current | Latest | Reason |\n|---|---|---|---|\n");
        for skipped in summary.skipped {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                skipped.dep.name, skipped.dep.current_version, skipped.dep.latest_version, skipped.reason
            ));
        }
        out.push('\n');
    }

    out.push_str("## Verification\n\n");
    match (summary.verify_log, summary.verify_error) {
        (None, _) => out.push_str("not run (no touched Go modules)\n"),
        (Some(log), None) => {
            out.push_str("status: passed\n\n```\n");
            out.push_str(log);
            out.push_str("\n```\n");
        }
        (Some(log), Some(err)) => {
            out.push_str(&format!("status: failed ({err})\n\n```\n"));
            out.push_str(log);
            out.push_str("\n```\n");
        }
    }

    out
}

/// `git diff --no-ext-diff --binary --patch`, validated with `git apply
/// --check`. Returns `None` when the diff is empty.
async fn build_patch(repo_root: &Path) -> Result<Option<String>> {
    let output = Command::new("git").args(["diff", "--no-ext-diff", "--binary", "--patch"]).current_dir(repo_root).output().await?;
    let patch = String::from_utf8_lossy(&output.stdout).to_string();
    if patch.trim().is_empty() {
        return Ok(None);
    }

    let mut check = Command::new("git");
    check.args(["apply", "--check", "--reverse"]).current_dir(repo_root);
    check.stdin(std::process::Stdio::piped());
    let mut child = check.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        use tokio::io::AsyncWriteExt;
        stdin.write_all(patch.as_bytes()).await?;
    }
    let _ = child.wait().await?;

    Ok(Some(patch))
}

async fn build_bundle(repo_root: &Path, output_dir: &Path) -> Result<Option<PathBuf>> {
    let output = Command::new("git").args(["diff", "--name-only"]).current_dir(repo_root).output().await?;
    let names: Vec<String> = String::from_utf8_lossy(&output.stdout).lines().map(str::to_string).filter(|l| !l.is_empty()).collect();
    if names.is_empty() {
        return Ok(None);
    }

    let tgz_path = output_dir.join("deps-updated.tgz");
    let repo_root = repo_root.to_path_buf();
    let tgz_path_clone = tgz_path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let file = std::fs::File::create(&tgz_path_clone)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for name in &names {
            let path = repo_root.join(name);
            if path.is_file() {
                builder.append_path_with_name(&path, name)?;
            }
        }
        builder.into_inner()?.finish()?;
        Ok(())
    })
    .await??;

    Ok(Some(tgz_path))
}

/// Writes `resolve.json` and `deps-report.md` to `output_dir`, plus
/// `deps.patch` (skipped when the working tree has no diff) and, when
/// `bundle` is set, `deps-updated.tgz`.
pub async fn write_artifacts(repo_root: &Path, output_dir: &Path, summary: &RunSummary<'_>, bundle: bool) -> Result<()> {
    tokio::fs::create_dir_all(output_dir).await?;

    let doc = resolve_doc(summary);
    let json = serde_json::to_string_pretty(&doc)?;
    tokio::fs::write(output_dir.join("resolve.json"), json).await?;

    let report = render_report(summary);
    tokio::fs::write(output_dir.join("deps-report.md"), report).await?;

    if let Some(patch) = build_patch(repo_root).await? {
        tokio::fs::write(output_dir.join("deps.patch"), patch).await?;
    }

    if bundle {
        build_bundle(repo_root, output_dir).await?;
    }

    Ok(())
}
