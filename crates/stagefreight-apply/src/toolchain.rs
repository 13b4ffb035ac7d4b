//! Go toolchain resolution: PATH, then `$STAGEFREIGHT_GO_HOME`, then
//! `/toolcache`, then a container runtime as a last resort. The chosen
//! strategy is resolved once per run and reused for every invocation
//! (§4.7, §4.8, Design Notes "container-runtime fallback").

use crate::error::{ApplyError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

const PASSTHROUGH_ENV: &[&str] = &["GOPROXY", "GONOSUMDB", "GOPRIVATE", "GONOSUMCHECK", "GONOPROXY", "GOFLAGS"];
const CONTAINER_RUNTIMES: &[&str] = &["docker", "podman", "nerdctl"];

#[derive(Debug, Clone)]
pub enum GoToolchain {
    Binary(PathBuf),
    Container { runtime: String, image: String },
}

async fn binary_works(path: &Path) -> bool {
    Command::new(path).arg("version").output().await.map(|o| o.status.success()).unwrap_or(false)
}

async fn find_container_runtime() -> Option<String> {
    for runtime in CONTAINER_RUNTIMES {
        if Command::new(runtime).arg("--version").output().await.map(|o| o.status.success()).unwrap_or(false) {
            return Some((*runtime).to_string());
        }
    }
    None
}

impl GoToolchain {
    /// Resolves the toolchain strategy for this run. `go_version` is the
    /// `go` directive parsed from `go.work`/`go.mod` (default `"1.24"`),
    /// used only by the container fallback to pick an image tag.
    pub async fn resolve(go_version: &str) -> Result<Self> {
        if binary_works(Path::new("go")).await {
            return Ok(Self::Binary(PathBuf::from("go")));
        }

        if let Ok(go_home) = std::env::var("STAGEFREIGHT_GO_HOME") {
            let candidate = PathBuf::from(go_home).join("bin").join("go");
            if binary_works(&candidate).await {
                return Ok(Self::Binary(candidate));
            }
        }

        let toolcache = PathBuf::from("/toolcache/go/bin/go");
        if binary_works(&toolcache).await {
            return Ok(Self::Binary(toolcache));
        }

        if let Some(runtime) = find_container_runtime().await {
            return Ok(Self::Container { runtime, image: format!("golang:{go_version}-alpine") });
        }

        Err(ApplyError::NoGoToolchain)
    }

    /// Builds a `go <args>` invocation.
    ///
    /// `workspace_mode` (a `go.work` at the repo root) invokes with cwd
    /// `repo_root` and `-C <module_dir>`; otherwise cwd is `module_dir`
    /// directly.
    pub fn command(&self, repo_root: &Path, module_dir: &Path, workspace_mode: bool, args: &[&str]) -> Command {
        match self {
            Self::Binary(go) => {
                let mut cmd = Command::new(go);
                if workspace_mode {
                    cmd.current_dir(repo_root).arg("-C").arg(module_dir);
                } else {
                    cmd.current_dir(module_dir);
                }
                cmd.args(args);
                cmd
            }
            Self::Container { runtime, image } => {
                let relative = module_dir.strip_prefix(repo_root).unwrap_or(module_dir);
                let workdir = Path::new("/src").join(relative);
                let mut cmd = Command::new(runtime);
                cmd.current_dir(repo_root)
                    .arg("run")
                    .arg("--rm")
                    .arg("-v")
                    .arg(format!("{}:/src", repo_root.display()))
                    .arg("-w")
                    .arg(workdir);
                for var in PASSTHROUGH_ENV {
                    if let Ok(value) = std::env::var(var) {
                        cmd.arg("-e").arg(format!("{var}={value}"));
                    }
                }
                cmd.arg(image).arg("go").args(args);
                cmd
            }
        }
    }
}

/// Parses the `go <version>` directive out of a `go.mod`/`go.work` body,
/// defaulting to `"1.24"` when absent.
pub fn parse_go_version(content: &str) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("go ") {
            let version = rest.trim();
            if !version.is_empty() {
                return version.to_string();
            }
        }
    }
    "1.24".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_directive() {
        assert_eq!(parse_go_version("module x\n\ngo 1.22.3\n"), "1.22.3");
    }

    #[test]
    fn defaults_when_directive_absent() {
        assert_eq!(parse_go_version("module x\n"), "1.24");
    }
}
