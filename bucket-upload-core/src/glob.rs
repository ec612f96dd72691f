//! Filesystem glob evaluation.
//!
//! [`FsGlob`] walks the literal directory prefix of a pattern with `walkdir`
//! and tests every entry against a `globset` matcher. Supported syntax:
//! `*`, `?`, `[abc]`, `{a,b}` and `**` for recursive matching. A single `*`
//! never crosses a `/`.
//!
//! Returned paths keep the form of the pattern: `*.txt` yields `a.txt`, not
//! `./a.txt`, and absolute patterns yield absolute paths.

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;
use walkdir::WalkDir;

use crate::contract::GlobEvaluator;
use crate::error::GlobError;

const META_CHARS: &[char] = &['*', '?', '[', ']', '{', '}', '\\'];

/// Glob evaluator backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsGlob;

impl FsGlob {
    pub fn new() -> Self {
        Self
    }
}

impl GlobEvaluator for FsGlob {
    fn glob(&self, pattern: &str) -> Result<Vec<String>, GlobError> {
        let matcher = compile(pattern)?;
        let split = PatternSplit::new(pattern);

        if !split.has_wildcards() {
            let exists = Path::new(pattern).symlink_metadata().is_ok();
            debug!(pattern, exists, "Literal glob pattern");
            return Ok(if exists {
                vec![pattern.to_string()]
            } else {
                Vec::new()
            });
        }

        let walk_root = if split.root.is_empty() { "." } else { split.root.as_str() };
        if !Path::new(walk_root).exists() {
            debug!(pattern, root = walk_root, "Glob root does not exist, no matches");
            return Ok(Vec::new());
        }

        let mut walker = WalkDir::new(walk_root).sort_by_file_name();
        if let Some(depth) = split.max_depth() {
            walker = walker.max_depth(depth);
        }

        let mut matches = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| GlobError::Walk {
                pattern: pattern.to_string(),
                source,
            })?;
            let path = if split.root.is_empty() {
                entry.path().strip_prefix(".").unwrap_or(entry.path())
            } else {
                entry.path()
            };
            if path.as_os_str().is_empty() || !matcher.is_match(path) {
                continue;
            }
            // Matches are handed on as strings, so a lossy name would point elsewhere.
            let candidate = path.to_str().ok_or_else(|| GlobError::NonUtf8 {
                pattern: pattern.to_string(),
                path: path.to_path_buf(),
            })?;
            matches.push(candidate.to_string());
        }

        debug!(pattern, matches = matches.len(), "Glob evaluated");
        Ok(matches)
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher, GlobError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| GlobError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// A pattern cut at its first wildcard component.
#[derive(Debug, PartialEq, Eq)]
struct PatternSplit {
    /// Literal directory prefix, `/`-joined. Empty for the current directory.
    root: String,
    /// Components from the first wildcard component onwards.
    rest: Vec<String>,
}

impl PatternSplit {
    fn new(pattern: &str) -> Self {
        let components: Vec<&str> = pattern.split('/').collect();
        let first_wild = components
            .iter()
            .position(|c| c.contains(META_CHARS))
            .unwrap_or(components.len());

        let root = match &components[..first_wild] {
            [""] => "/".to_string(),
            literal => literal.join("/"),
        };
        let rest = components[first_wild..]
            .iter()
            .map(|c| c.to_string())
            .collect();
        Self { root, rest }
    }

    fn has_wildcards(&self) -> bool {
        !self.rest.is_empty()
    }

    /// Walk depth needed below the root, or `None` when `**` makes it unbounded.
    fn max_depth(&self) -> Option<usize> {
        if self.rest.iter().any(|c| c.contains("**")) {
            None
        } else {
            Some(self.rest.len())
        }
    }
}
