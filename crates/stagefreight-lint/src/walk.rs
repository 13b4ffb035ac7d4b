//! Directory walking and the exclude-glob contract (§4.6): patterns
//! containing `/` or `**` match the full relative path; plain patterns
//! match the basename only. Hidden directories (basename starting with
//! `.`) are never descended into.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A compiled exclude-glob set, split into full-path and basename-only
/// matchers per the dispatch rule.
pub struct ExcludeSet {
    full_path: GlobSet,
    basename: GlobSet,
}

impl ExcludeSet {
    pub fn compile(patterns: &[String]) -> Self {
        let mut full_builder = GlobSetBuilder::new();
        let mut basename_builder = GlobSetBuilder::new();

        for pattern in patterns {
            let Ok(glob) = Glob::new(pattern) else { continue };
            if pattern.contains('/') || pattern.contains("**") {
                full_builder.add(glob);
            } else {
                basename_builder.add(glob);
            }
        }

        Self {
            full_path: full_builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap()),
            basename: basename_builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap()),
        }
    }

    pub fn is_excluded(&self, relative_path: &Path) -> bool {
        if self.full_path.is_match(relative_path) {
            return true;
        }
        relative_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.basename.is_match(name))
    }
}

/// Walks `root`, skipping hidden directories and files matched by
/// `exclude`, returning every remaining regular file's absolute path.
pub fn walk_files(root: &Path, exclude: &ExcludeSet) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        !entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
    });

    for entry in walker.filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if !exclude.is_excluded(relative) {
            files.push(entry.path().to_path_buf());
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn basename_pattern_matches_anywhere_by_name_only() {
        let exclude = ExcludeSet::compile(&["*.lock".to_string()]);
        assert!(exclude.is_excluded(Path::new("deep/nested/Cargo.lock")));
        assert!(!exclude.is_excluded(Path::new("Cargo.toml")));
    }

    #[test]
    fn slash_pattern_matches_full_relative_path() {
        let exclude = ExcludeSet::compile(&["vendor/**".to_string()]);
        assert!(exclude.is_excluded(Path::new("vendor/foo/bar.rs")));
        assert!(!exclude.is_excluded(Path::new("src/vendor.rs")));
    }

    #[test]
    fn walk_skips_hidden_directories_but_not_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("config"), "x").unwrap();
        fs::write(dir.path().join(".env"), "x").unwrap();
        fs::write(dir.path().join("Cargo.toml"), "x").unwrap();

        let exclude = ExcludeSet::compile(&[]);
        let files = walk_files(dir.path(), &exclude);
        let names: Vec<_> = files.iter().filter_map(|p| p.file_name()?.to_str()).collect();

        assert!(names.contains(&"Cargo.toml"));
        assert!(names.contains(&".env"));
        assert!(!names.contains(&"config"));
    }
}
