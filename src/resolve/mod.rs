//! Collaborators the phases rely on
//!
//! Artifact resolution, dependency resolution, project lookup and repository
//! assembly sit behind traits so phases can be driven by local, file-backed
//! implementations or by test doubles.

mod artifacts;
mod projects;
mod repository;

pub use artifacts::{DefaultDependencyResolver, LocalRepositoryResolver};
pub use projects::ReactorProjectBuilder;
pub use repository::{DefaultRepositoryAssembler, METADATA_FILE};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assembly_model::{Artifact, Project, Repository};

use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;

/// Errors raised by collaborators
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("artifact {0} could not be resolved")]
    NotFound(String),

    #[error("artifact {0} has no file")]
    Unresolved(String),

    #[error("cannot build project for {id}: {reason}")]
    Project { id: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("filter error: {0}")]
    Filter(#[from] assembly_filter::FilterError),
}

impl ResolveError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        ResolveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Coordinates to local file.
pub trait ArtifactResolver: Send + Sync {
    fn resolve(&self, artifact: &Artifact) -> Result<PathBuf, ResolveError>;
}

/// Project to its resolved dependency artifacts.
pub trait DependencyResolver: Send + Sync {
    /// Dependencies of `project`, direct only unless `transitive`.
    ///
    /// Dependencies built by `config`'s reactor projects resolve to their
    /// outputs. Artifacts whose file cannot be located keep `file: None`;
    /// adding them later is a configuration error.
    fn resolve_dependencies(
        &self,
        project: &Project,
        transitive: bool,
        config: &AssemblyConfig,
    ) -> Result<Vec<Artifact>, ResolveError>;
}

/// Artifact to the project that produced it.
pub trait ProjectBuilder: Send + Sync {
    fn build_project(
        &self,
        artifact: &Artifact,
        config: &AssemblyConfig,
    ) -> Result<Project, ResolveError>;
}

/// Populates a directory in Maven repository layout.
pub trait RepositoryAssembler: Send + Sync {
    fn assemble(
        &self,
        repository_dir: &Path,
        repository: &Repository,
        config: &AssemblyConfig,
    ) -> Result<(), ResolveError>;
}

/// The set of collaborators handed to the standard phases.
#[derive(Clone)]
pub struct Collaborators {
    pub artifact_resolver: Arc<dyn ArtifactResolver>,
    pub dependency_resolver: Arc<dyn DependencyResolver>,
    pub project_builder: Arc<dyn ProjectBuilder>,
    pub repository_assembler: Arc<dyn RepositoryAssembler>,
}

impl Collaborators {
    /// File-backed collaborators reading from `local_repository`.
    pub fn local(local_repository: Option<PathBuf>, diagnostics: SharedDiagnostics) -> Self {
        let artifact_resolver: Arc<dyn ArtifactResolver> =
            Arc::new(LocalRepositoryResolver::new(local_repository));
        let dependency_resolver: Arc<dyn DependencyResolver> =
            Arc::new(DefaultDependencyResolver::new(artifact_resolver.clone()));
        Self {
            repository_assembler: Arc::new(DefaultRepositoryAssembler::new(
                dependency_resolver.clone(),
                artifact_resolver.clone(),
                diagnostics,
            )),
            project_builder: Arc::new(ReactorProjectBuilder),
            artifact_resolver,
            dependency_resolver,
        }
    }

    /// Collaborators for `config`'s local repository.
    pub fn for_config(config: &AssemblyConfig, diagnostics: SharedDiagnostics) -> Self {
        Self::local(config.local_repository.clone(), diagnostics)
    }

    pub fn with_project_builder(mut self, builder: Arc<dyn ProjectBuilder>) -> Self {
        self.project_builder = builder;
        self
    }

    pub fn with_repository_assembler(mut self, assembler: Arc<dyn RepositoryAssembler>) -> Self {
        self.repository_assembler = assembler;
        self
    }

    pub fn with_dependency_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.dependency_resolver = resolver;
        self
    }
}
