//! Artifact and path filtering
//!
//! Selects artifacts and projects by coordinate patterns and scope, and
//! files by Ant-style path patterns.

pub mod artifacts;
pub mod paths;
pub mod pattern;

pub use artifacts::{filter_artifacts, filter_projects, ArtifactFilter, FilterOutcome, ScopeFilter};
pub use paths::{PathFilter, DEFAULT_EXCLUDES};
pub use pattern::ArtifactPattern;

/// Errors raised while compiling or applying filters
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("the following include patterns were never triggered: {}", .0.join(", "))]
    UnmatchedIncludes(Vec<String>),
}
