//! Include / exclude gating
//!
//! Patterns are anchored against the path relative to the project root, with
//! `/` separators. `*` and `?` never cross a separator; `**` spans any number
//! of directories. A pattern without a `/` also matches the bare file name.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{EngineError, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
pub struct FileFilter {
    root: PathBuf,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FileFilter {
    pub fn new(root: impl Into<PathBuf>, include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// A filter that admits everything.
    pub fn permissive(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        self.exclude.iter().any(|p| matches(p, &relative))
    }

    pub fn is_included(&self, path: &Path) -> bool {
        if self.include.is_empty() {
            return true;
        }
        let relative = self.relative(path);
        self.include.iter().any(|p| matches(p, &relative))
    }

    /// Whether the surrounding system may touch `path`.
    pub fn allows(&self, path: &Path) -> bool {
        !self.is_excluded(path) && self.is_included(path)
    }

    /// Files under `dir` that the filter allows, in path order.
    pub fn discover(&self, dir: &Path) -> Vec<PathBuf> {
        let pattern = dir.join("**").join("*");
        let mut files: Vec<PathBuf> = match glob::glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths
                .filter_map(|entry| entry.ok())
                .filter(|path| path.is_file() && self.allows(path))
                .collect(),
            Err(e) => {
                tracing::warn!("invalid discovery pattern for {}: {}", dir.display(), e);
                Vec::new()
            }
        };
        files.sort();
        files
    }

    fn relative(&self, path: &Path) -> String {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root).unwrap_or(path)
        } else {
            path
        };
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| EngineError::Config(format!("glob '{}': {}", p, e)))
        })
        .collect()
}

fn matches(pattern: &Pattern, relative: &str) -> bool {
    if pattern.matches_with(relative, MATCH_OPTIONS) {
        return true;
    }
    if !pattern.as_str().contains('/') {
        if let Some(name) = relative.rsplit('/').next() {
            return pattern.matches_with(name, MATCH_OPTIONS);
        }
    }
    false
}
