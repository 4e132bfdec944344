//! Path include/exclude rules for file sets
//!
//! Patterns use Ant syntax: `*` stays within one path segment, `**` spans
//! any number of segments and a trailing `/` means "everything below".

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

use crate::FilterError;

/// Version-control and editor droppings skipped unless disabled.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/.repository/**",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/RCS",
    "**/RCS/**",
    "**/SCCS",
    "**/SCCS/**",
    "**/vssver.scc",
    "**/project.pj",
    "**/.svn",
    "**/.svn/**",
    "**/.arch-ids",
    "**/.arch-ids/**",
    "**/.bzr",
    "**/.bzr/**",
    "**/.MySCMServerInfo",
    "**/.DS_Store",
    "**/.metadata",
    "**/.metadata/**",
    "**/.hg",
    "**/.hg/**",
    "**/.git",
    "**/.git/**",
    "**/.gitignore",
    "**/.gitattributes",
    "**/BitKeeper",
    "**/BitKeeper/**",
    "**/ChangeSet",
    "**/ChangeSet/**",
    "**/_darcs",
    "**/_darcs/**",
    "**/.darcsrepo",
    "**/.darcsrepo/**",
    "**/-darcs-backup*",
    "**/.darcs-temp-mail",
];

/// Translate an Ant-style pattern into globset syntax.
fn normalize_pattern(pattern: &str) -> String {
    let mut p = pattern.trim().replace('\\', "/");
    while p.starts_with("./") {
        p.drain(..2);
    }
    let mut p = p.trim_start_matches('/').to_string();
    if p.ends_with('/') {
        p.push_str("**");
    }
    p
}

fn build_set<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet, FilterError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let normalized = normalize_pattern(pattern);
        if normalized.is_empty() {
            continue;
        }
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|e| FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| FilterError::InvalidPattern {
        pattern: "<set>".to_string(),
        reason: e.to_string(),
    })
}

/// Include/exclude rules evaluated against `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    includes: Option<GlobSet>,
    excludes: GlobSet,
}

impl PathFilter {
    /// Empty `includes` means every path is a candidate.
    pub fn new(
        includes: &[String],
        excludes: &[String],
        use_default_excludes: bool,
    ) -> Result<Self, FilterError> {
        let includes = if includes.iter().all(|p| p.trim().is_empty()) {
            None
        } else {
            Some(build_set(includes.iter().map(String::as_str))?)
        };

        let defaults: &[&str] = if use_default_excludes {
            DEFAULT_EXCLUDES
        } else {
            &[]
        };
        let excludes = build_set(
            defaults
                .iter()
                .copied()
                .chain(excludes.iter().map(String::as_str)),
        )?;

        Ok(Self { includes, excludes })
    }

    /// A filter that accepts everything.
    pub fn accept_all() -> Self {
        Self {
            includes: None,
            excludes: GlobSet::empty(),
        }
    }

    fn as_unix(path: &Path) -> String {
        path.to_string_lossy().replace('\\', "/")
    }

    /// Whether a file at `path` belongs in the set.
    pub fn is_included(&self, path: &Path) -> bool {
        let path = Self::as_unix(path);
        let included = self
            .includes
            .as_ref()
            .map(|set| set.is_match(path.as_str()))
            .unwrap_or(true);
        included && !self.excludes.is_match(path.as_str())
    }

    /// Whether `path` matches an exclude pattern; used to prune directories.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excludes.is_match(Self::as_unix(path).as_str())
    }
}
