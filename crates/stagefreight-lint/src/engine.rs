//! The dispatch engine (§4.6 / §5): walks the tree, schedules one worker
//! per `(file, module)` pair under a bounded semaphore, and accumulates
//! findings and per-module stats behind a single mutex held only across
//! the append.

use crate::cache::{read_cached, resolve_cache_dir, write_cache};
use crate::error::LintError;
use crate::module::ModuleRegistry;
use crate::walk::{ExcludeSet, walk_files};
use stagefreight_core::{Finding, cache_key};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, Semaphore};

pub struct EngineConfig {
    pub root: PathBuf,
    pub exclude: Vec<String>,
    pub cache_dir_override: Option<String>,
}

/// Per-module counters: files checked, how many were cache hits, how many
/// errored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleStats {
    pub checked: usize,
    pub cache_hits: usize,
    pub errors: usize,
}

pub struct EngineReport {
    pub findings: Vec<Finding>,
    pub stats: HashMap<String, ModuleStats>,
    pub first_error: Option<LintError>,
}

/// Runs every registered module against every file it claims under `root`,
/// subject to `config.exclude`. All workers complete even after the first
/// error — that error is retained and returned, not propagated early.
pub async fn run(registry: &ModuleRegistry, config: &EngineConfig) -> EngineReport {
    let exclude = ExcludeSet::compile(&config.exclude);
    let files = walk_files(&config.root, &exclude);
    let cache_dir = resolve_cache_dir(&config.root, config.cache_dir_override.as_deref());

    let permits = 2 * std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1);
    let semaphore = Semaphore::new(permits);

    let findings: Mutex<Vec<Finding>> = Mutex::new(Vec::new());
    let stats: Mutex<HashMap<String, ModuleStats>> = Mutex::new(HashMap::new());
    let first_error: Mutex<Option<LintError>> = Mutex::new(None);

    let mut work: Vec<(&Path, &dyn crate::module::Module)> = Vec::new();
    for file in &files {
        for module in registry.modules() {
            if module.claims(file) {
                work.push((file.as_path(), module.as_ref()));
            }
        }
    }

    let tasks = work.into_iter().map(|(file, module)| {
        let semaphore = &semaphore;
        let findings = &findings;
        let stats = &stats;
        let first_error = &first_error;
        let cache_dir = &cache_dir;
        async move {
            let _permit = semaphore.acquire().await.expect("semaphore is never closed");

            let Ok(content) = tokio::fs::read_to_string(file).await else { return };
            let key = cache_key(&content, module.name(), &module.config_json(), module.schema_version());

            if let Some(cached) = read_cached(cache_dir, &key, module.cache_ttl()).await {
                findings.lock().await.extend(cached);
                let mut s = stats.lock().await;
                let entry = s.entry(module.name().to_string()).or_default();
                entry.checked += 1;
                entry.cache_hits += 1;
                return;
            }

            match module.check(file, &content).await {
                Ok(result) => {
                    let _ = write_cache(cache_dir, &key, &result).await;
                    findings.lock().await.extend(result);
                    stats.lock().await.entry(module.name().to_string()).or_default().checked += 1;
                }
                Err(err) => {
                    let mut s = stats.lock().await;
                    let entry = s.entry(module.name().to_string()).or_default();
                    entry.checked += 1;
                    entry.errors += 1;
                    drop(s);

                    let mut first = first_error.lock().await;
                    if first.is_none() {
                        *first = Some(LintError::ModuleFailed {
                            module: module.name().to_string(),
                            file: file.display().to_string(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
    });

    futures::future::join_all(tasks).await;

    EngineReport {
        findings: findings.into_inner(),
        stats: stats.into_inner(),
        first_error: first_error.into_inner(),
    }
}
