//! Local repository lookup and dependency resolution.

use std::path::PathBuf;
use std::sync::Arc;

use assembly_model::{Artifact, Project};

use super::{ArtifactResolver, DependencyResolver, ResolveError};
use crate::config::AssemblyConfig;

/// Finds artifacts in a Maven-layout repository on disk.
#[derive(Debug, Clone, Default)]
pub struct LocalRepositoryResolver {
    repository: Option<PathBuf>,
}

impl LocalRepositoryResolver {
    pub fn new(repository: Option<PathBuf>) -> Self {
        Self { repository }
    }

    /// Where `artifact` would live in the repository.
    pub fn path_of(&self, artifact: &Artifact) -> Option<PathBuf> {
        self.repository
            .as_ref()
            .map(|repo| repo.join(artifact.repository_path()))
    }
}

impl ArtifactResolver for LocalRepositoryResolver {
    fn resolve(&self, artifact: &Artifact) -> Result<PathBuf, ResolveError> {
        if let Some(file) = artifact.file.as_ref().filter(|f| f.is_file()) {
            return Ok(file.clone());
        }
        match self.path_of(artifact) {
            Some(path) if path.is_file() => Ok(path),
            _ => Err(ResolveError::NotFound(artifact.id())),
        }
    }
}

/// Reads dependencies from the project model and fills in missing files.
///
/// Missing files come from the reactor project that builds the artifact,
/// then from the artifact resolver.
pub struct DefaultDependencyResolver {
    artifacts: Arc<dyn ArtifactResolver>,
}

impl DefaultDependencyResolver {
    pub fn new(artifacts: Arc<dyn ArtifactResolver>) -> Self {
        Self { artifacts }
    }
}

/// The built file of the reactor project producing `artifact`.
fn reactor_file(reactor: &[Project], artifact: &Artifact) -> Option<PathBuf> {
    let project = reactor.iter().find(|p| p.matches(artifact))?;
    let file = match artifact.classifier.as_deref() {
        None => project.artifact_file.clone(),
        Some(classifier) => project
            .attached_artifacts
            .iter()
            .find(|a| a.classifier == classifier)
            .and_then(|a| a.file.clone()),
    };
    file.filter(|f| f.is_file())
}

/// A dependency is direct when its trail is `[project, dependency]`.
fn is_direct(artifact: &Artifact) -> bool {
    artifact.dependency_trail.len() <= 2
}

impl DependencyResolver for DefaultDependencyResolver {
    fn resolve_dependencies(
        &self,
        project: &Project,
        transitive: bool,
        config: &AssemblyConfig,
    ) -> Result<Vec<Artifact>, ResolveError> {
        let root = project.artifact().id();
        let mut resolved = Vec::with_capacity(project.dependencies.len());

        for dependency in &project.dependencies {
            if !transitive && !is_direct(dependency) {
                continue;
            }
            let mut artifact = dependency.clone();
            if artifact.dependency_trail.is_empty() {
                artifact.dependency_trail = vec![root.clone(), artifact.id()];
            }
            if artifact.file.as_ref().map_or(true, |f| !f.is_file()) {
                artifact.file = reactor_file(&config.reactor_projects, &artifact)
                    .or_else(|| self.artifacts.resolve(&artifact).ok());
            }
            resolved.push(artifact);
        }
        Ok(resolved)
    }
}
