//! Artifact and project selection by coordinate patterns and scope.

use assembly_model::{Artifact, Project, Scope};

use crate::pattern::ArtifactPattern;
use crate::FilterError;

/// Additional predicate AND-ed with the include/exclude patterns.
pub trait ArtifactFilter {
    fn include(&self, artifact: &Artifact) -> bool;
}

/// Accepts artifacts whose scope equals the configured scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeFilter {
    scope: Scope,
}

impl ScopeFilter {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl ArtifactFilter for ScopeFilter {
    fn include(&self, artifact: &Artifact) -> bool {
        artifact.scope == self.scope
    }
}

/// Result of a filtering pass.
#[derive(Debug, Clone)]
pub struct FilterOutcome<T> {
    /// Surviving candidates, in input order.
    pub kept: Vec<T>,
    /// Include patterns that matched no candidate.
    pub unmatched_includes: Vec<String>,
    /// Exclude patterns that matched no candidate.
    pub unmatched_excludes: Vec<String>,
}

impl<T> FilterOutcome<T> {
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

/// Ids an artifact can be matched against.
fn candidate_ids(artifact: &Artifact, act_transitively: bool) -> Vec<String> {
    let mut ids = vec![artifact.id(), artifact.conflict_id()];
    if act_transitively {
        ids.extend(artifact.dependency_trail.iter().cloned());
    }
    ids
}

struct PatternSet {
    includes: Vec<ArtifactPattern>,
    excludes: Vec<ArtifactPattern>,
    include_hits: Vec<bool>,
    exclude_hits: Vec<bool>,
}

impl PatternSet {
    fn new(includes: &[String], excludes: &[String]) -> Result<Self, FilterError> {
        let includes = ArtifactPattern::compile_all(includes)?;
        let excludes = ArtifactPattern::compile_all(excludes)?;
        Ok(Self {
            include_hits: vec![false; includes.len()],
            exclude_hits: vec![false; excludes.len()],
            includes,
            excludes,
        })
    }

    /// Evaluate every pattern so hit tracking stays complete.
    fn accepts(&mut self, ids: &[String]) -> bool {
        let id_refs = || ids.iter().map(String::as_str);

        let mut included = self.includes.is_empty();
        for (pattern, hit) in self.includes.iter().zip(self.include_hits.iter_mut()) {
            if pattern.matches_any(id_refs()) {
                *hit = true;
                included = true;
            }
        }

        let mut excluded = false;
        for (pattern, hit) in self.excludes.iter().zip(self.exclude_hits.iter_mut()) {
            if pattern.matches_any(id_refs()) {
                *hit = true;
                excluded = true;
            }
        }

        included && !excluded
    }

    fn finish<T>(self, kept: Vec<T>, strict: bool) -> Result<FilterOutcome<T>, FilterError> {
        let unmatched_includes: Vec<String> = self
            .includes
            .iter()
            .zip(self.include_hits.iter())
            .filter(|(_, hit)| !**hit)
            .map(|(p, _)| p.as_str().to_string())
            .collect();
        let unmatched_excludes: Vec<String> = self
            .excludes
            .iter()
            .zip(self.exclude_hits.iter())
            .filter(|(_, hit)| !**hit)
            .map(|(p, _)| p.as_str().to_string())
            .collect();

        if strict && !unmatched_includes.is_empty() {
            return Err(FilterError::UnmatchedIncludes(unmatched_includes));
        }

        Ok(FilterOutcome {
            kept,
            unmatched_includes,
            unmatched_excludes,
        })
    }
}

/// Select artifacts by include/exclude patterns plus extra filters.
///
/// No includes means everything is included; an exclude always wins. With
/// `act_transitively`, a pattern also matches when it matches any entry of
/// the artifact's dependency trail. In `strict` mode an include pattern that
/// matched nothing is an error.
pub fn filter_artifacts(
    candidates: &[Artifact],
    includes: &[String],
    excludes: &[String],
    strict: bool,
    act_transitively: bool,
    extra_filters: &[&dyn ArtifactFilter],
) -> Result<FilterOutcome<Artifact>, FilterError> {
    let mut patterns = PatternSet::new(includes, excludes)?;
    let mut kept = Vec::with_capacity(candidates.len());

    for artifact in candidates {
        if !extra_filters.iter().all(|f| f.include(artifact)) {
            continue;
        }
        let ids = candidate_ids(artifact, act_transitively);
        if patterns.accepts(&ids) {
            kept.push(artifact.clone());
        }
    }

    patterns.finish(kept, strict)
}

/// Select projects by include/exclude patterns over their main artifact.
pub fn filter_projects(
    candidates: &[Project],
    includes: &[String],
    excludes: &[String],
    act_transitively: bool,
) -> Result<FilterOutcome<Project>, FilterError> {
    let mut patterns = PatternSet::new(includes, excludes)?;
    let mut kept = Vec::with_capacity(candidates.len());

    for project in candidates {
        let ids = candidate_ids(&project.artifact(), act_transitively);
        if patterns.accepts(&ids) {
            kept.push(project.clone());
        }
    }

    patterns.finish(kept, false)
}
