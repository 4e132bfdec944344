//! Dependency set processing for a project.

use std::collections::HashSet;

use assembly_filter::{filter_artifacts, ArtifactFilter, ScopeFilter};
use assembly_model::descriptor::DEFAULT_DEPENDENCY_MAPPING;
use assembly_model::{Artifact, DependencySet, Project};

use super::AddArtifactTask;
use crate::archive::Archiver;
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::{AssemblyError, AssemblyResult};
use crate::format::{parse_mode, ExpressionContext};
use crate::resolve::Collaborators;

const COMPONENT: &str = "dependency-sets";

/// Adds the dependencies of `project` selected by each dependency set.
///
/// Used directly by the dependency-set phase and, per module, by module-set
/// binaries. When a visited set is attached, artifacts whose conflict id was
/// already added are skipped and newly added ones are recorded.
pub struct AddDependencySetsTask<'a> {
    dependency_sets: &'a [DependencySet],
    project: &'a Project,
    module: Option<(&'a Project, &'a Artifact)>,
    collaborators: &'a Collaborators,
    diagnostics: &'a SharedDiagnostics,
    visited: Option<&'a mut HashSet<String>>,
}

impl<'a> AddDependencySetsTask<'a> {
    pub fn new(
        dependency_sets: &'a [DependencySet],
        project: &'a Project,
        collaborators: &'a Collaborators,
        diagnostics: &'a SharedDiagnostics,
    ) -> Self {
        Self {
            dependency_sets,
            project,
            module: None,
            collaborators,
            diagnostics,
            visited: None,
        }
    }

    /// Expose `module.*` expressions for the module being processed.
    pub fn with_module(mut self, module: &'a Project, module_artifact: &'a Artifact) -> Self {
        self.module = Some((module, module_artifact));
        self
    }

    pub fn with_visited(mut self, visited: &'a mut HashSet<String>) -> Self {
        self.visited = Some(visited);
        self
    }

    pub fn execute(
        &mut self,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
    ) -> AssemblyResult<()> {
        for set in self.dependency_sets {
            self.add_dependency_set(set, archiver, config)?;
        }
        Ok(())
    }

    /// Candidates for one set: the project's own artifacts when requested,
    /// then its dependencies.
    fn candidates(
        &self,
        set: &DependencySet,
        config: &AssemblyConfig,
    ) -> AssemblyResult<Vec<Artifact>> {
        let mut candidates = Vec::new();
        let own_scope = set.scope.unwrap_or_default();
        if set.use_project_artifact {
            candidates.push(self.project.artifact().with_scope(own_scope));
        }
        if set.use_project_attachments {
            let trail = vec![self.project.artifact().id()];
            candidates.extend(
                self.project
                    .attachments()
                    .into_iter()
                    .map(|a| a.with_scope(own_scope).with_trail(trail.clone())),
            );
        }
        candidates.extend(
            self.collaborators
                .dependency_resolver
                .resolve_dependencies(self.project, set.use_transitive_dependencies, config)?,
        );
        Ok(candidates)
    }

    fn add_dependency_set(
        &mut self,
        set: &DependencySet,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
    ) -> AssemblyResult<()> {
        let transitive_filtering = set.use_transitive_filtering && set.use_transitive_dependencies;
        if set.use_transitive_filtering && !set.use_transitive_dependencies {
            self.diagnostics.warn(
                COMPONENT,
                "Dependency set has use_transitive_filtering without \
                 use_transitive_dependencies; transitive filtering will be ignored",
            );
        }
        let candidates = self.candidates(set, config)?;

        let scope_filter = set.scope.map(ScopeFilter::new);
        let extra: Vec<&dyn ArtifactFilter> = scope_filter
            .as_ref()
            .map(|f| f as &dyn ArtifactFilter)
            .into_iter()
            .collect();
        let outcome = filter_artifacts(
            &candidates,
            &set.includes,
            &set.excludes,
            set.use_strict_filtering,
            transitive_filtering,
            &extra,
        )?;

        if !outcome.unmatched_includes.is_empty() {
            self.diagnostics.warn(
                COMPONENT,
                &format!(
                    "The following patterns were never triggered in this artifact inclusion filter: {}",
                    outcome.unmatched_includes.join(", ")
                ),
            );
        }
        if outcome.is_empty() {
            self.diagnostics.debug(
                COMPONENT,
                &format!("No artifacts selected for {}", self.project.id()),
            );
            return Ok(());
        }

        let file_mode = parse_mode(set.file_mode.as_deref())?;
        let directory_mode = parse_mode(set.directory_mode.as_deref())?;
        let mapping = set.mapping_or(DEFAULT_DEPENDENCY_MAPPING);

        for artifact in &outcome.kept {
            if let Some(visited) = self.visited.as_deref_mut() {
                if !visited.insert(artifact.conflict_id()) {
                    self.diagnostics.debug(
                        COMPONENT,
                        &format!("Skipping {}: already added", artifact.id()),
                    );
                    continue;
                }
            }

            let artifact_project = self
                .collaborators
                .project_builder
                .build_project(artifact, config)
                .map_err(|e| {
                    AssemblyError::configuration_caused_by(
                        format!("Error retrieving POM of module-dependency: {}", artifact.id()),
                        e,
                    )
                })?;

            let context = match self.module {
                Some((module, module_artifact)) => {
                    ExpressionContext::for_module(module, Some(module_artifact))
                        .with_artifact(artifact, Some(&artifact_project))
                }
                None => ExpressionContext::for_artifact(artifact, Some(&artifact_project)),
            };

            AddArtifactTask::new(artifact, context, mapping)
                .output_directory(set.output_directory.as_deref())
                .modes(file_mode, directory_mode)
                .unpack(set.unpack, set.unpack_options.as_ref())
                .execute(archiver, config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveRecorder;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::resolve::{ProjectBuilder, ResolveError};
    use assembly_model::Scope;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn dependency(dir: &Path, group: &str, id: &str, scope: Scope) -> Artifact {
        let file = dir.join(format!("{}-1.0.jar", id));
        fs::write(&file, id).unwrap();
        Artifact::new(group, id, "1.0").with_scope(scope).with_file(file)
    }

    fn project(dir: &Path) -> Project {
        let mut project = Project::new("org.example", "app", "1.0");
        project.basedir = dir.to_path_buf();
        project.dependencies = vec![
            dependency(dir, "org", "a", Scope::Compile),
            dependency(dir, "org", "b", Scope::Runtime),
            dependency(dir, "com.foo", "c", Scope::Runtime),
        ];
        project
    }

    struct FailingBuilder;

    impl ProjectBuilder for FailingBuilder {
        fn build_project(&self, artifact: &Artifact, _: &AssemblyConfig) -> Result<Project, ResolveError> {
            Err(ResolveError::Project {
                id: artifact.id(),
                reason: "pom missing".to_string(),
            })
        }
    }

    #[test]
    fn test_runtime_scope_with_exclude() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path());
        let config = AssemblyConfig::new(project.clone());
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let collaborators = Collaborators::local(None, diagnostics.clone());
        let sets = vec![DependencySet {
            scope: Some(Scope::Runtime),
            excludes: vec!["com.foo:*".to_string()],
            output_directory: Some("lib".to_string()),
            ..DependencySet::default()
        }];

        let mut recorder = ArchiveRecorder::new();
        AddDependencySetsTask::new(&sets, &project, &collaborators, &diagnostics)
            .execute(&mut recorder, &config)
            .unwrap();
        assert_eq!(recorder.targets(), vec!["lib/b-1.0.jar"]);
    }

    #[test]
    fn test_visited_set_skips_repeats() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path());
        let config = AssemblyConfig::new(project.clone());
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let collaborators = Collaborators::local(None, diagnostics.clone());
        let sets = vec![DependencySet::default()];

        let mut visited = HashSet::new();
        visited.insert("org:a:jar".to_string());
        let mut recorder = ArchiveRecorder::new();
        AddDependencySetsTask::new(&sets, &project, &collaborators, &diagnostics)
            .with_visited(&mut visited)
            .execute(&mut recorder, &config)
            .unwrap();

        assert_eq!(recorder.targets(), vec!["b-1.0.jar", "c-1.0.jar"]);
        assert!(visited.contains("com.foo:c:jar"));
    }

    #[test]
    fn test_project_artifact_takes_set_scope() {
        let dir = TempDir::new().unwrap();
        let mut project = project(dir.path());
        let jar = dir.path().join("app-1.0.jar");
        fs::write(&jar, "app").unwrap();
        project.artifact_file = Some(jar);
        let config = AssemblyConfig::new(project.clone());
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let collaborators = Collaborators::local(None, diagnostics.clone());
        let sets = vec![DependencySet {
            scope: Some(Scope::Runtime),
            use_project_artifact: true,
            includes: vec!["org.example:*".to_string()],
            ..DependencySet::default()
        }];

        let mut recorder = ArchiveRecorder::new();
        AddDependencySetsTask::new(&sets, &project, &collaborators, &diagnostics)
            .execute(&mut recorder, &config)
            .unwrap();
        assert_eq!(recorder.targets(), vec!["app-1.0.jar"]);
    }

    #[test]
    fn test_project_builder_failure_names_artifact() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path());
        let config = AssemblyConfig::new(project.clone());
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let collaborators = Collaborators::local(None, diagnostics.clone())
            .with_project_builder(Arc::new(FailingBuilder));
        let sets = vec![DependencySet::default()];

        let mut recorder = ArchiveRecorder::new();
        let err = AddDependencySetsTask::new(&sets, &project, &collaborators, &diagnostics)
            .execute(&mut recorder, &config)
            .unwrap_err();
        assert_eq!(
            err.message(),
            "Error retrieving POM of module-dependency: org:a:jar:1.0"
        );
    }

    #[test]
    fn test_strict_filtering_fails_on_unmatched_include() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path());
        let config = AssemblyConfig::new(project.clone());
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let collaborators = Collaborators::local(None, diagnostics.clone());
        let sets = vec![DependencySet {
            includes: vec!["org:nothing".to_string()],
            use_strict_filtering: true,
            ..DependencySet::default()
        }];

        let mut recorder = ArchiveRecorder::new();
        let err = AddDependencySetsTask::new(&sets, &project, &collaborators, &diagnostics)
            .execute(&mut recorder, &config)
            .unwrap_err();
        assert!(err.to_string().contains("org:nothing"));
    }

    #[test]
    fn test_transitive_filtering_without_transitive_dependencies_warns() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path());
        let config = AssemblyConfig::new(project.clone());
        let sink = CollectingDiagnostics::new();
        let diagnostics: SharedDiagnostics = sink.clone();
        let collaborators = Collaborators::local(None, diagnostics.clone());
        let sets = vec![DependencySet {
            use_transitive_dependencies: false,
            use_transitive_filtering: true,
            ..DependencySet::default()
        }];

        let mut recorder = ArchiveRecorder::new();
        AddDependencySetsTask::new(&sets, &project, &collaborators, &diagnostics)
            .execute(&mut recorder, &config)
            .unwrap();

        assert_eq!(recorder.len(), 3);
        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("transitive filtering will be ignored"));
    }
}
