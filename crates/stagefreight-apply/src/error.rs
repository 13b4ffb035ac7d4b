use thiserror::Error;

/// Error type shared by the candidate filter, Go/Dockerfile updaters,
/// verifier and artifact generator.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("working tree is not clean: {0}")]
    DirtyWorkingTree(String),

    #[error("no Go toolchain available (checked PATH, STAGEFREIGHT_GO_HOME, /toolcache, and docker/podman/nerdctl)")]
    NoGoToolchain,

    #[error("line {line} in {file} changed since it was resolved; refusing to write")]
    StaleLine { file: String, line: usize },

    #[error("{file}:{line} is out of range for the current file contents")]
    LineOutOfRange { file: String, line: usize },

    #[error("command {command} failed in {dir}: {stderr}")]
    CommandFailed { command: String, dir: String, stderr: String },

    #[error("go.mod in {dir} has no `module` directive")]
    MissingModuleDirective { dir: String },

    #[error(transparent)]
    Core(#[from] stagefreight_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ApplyError>;
