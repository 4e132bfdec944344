//! Runtime configuration handed to phases.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use assembly_model::Project;

use super::effective::Settings;

/// Everything a phase may consult besides the descriptor.
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    pub basedir: PathBuf,
    pub final_name: String,
    pub temporary_root_directory: PathBuf,
    pub output_directory: PathBuf,

    /// The project being assembled.
    pub project: Project,

    /// All projects of the build, root first.
    pub reactor_projects: Vec<Project>,

    pub local_repository: Option<PathBuf>,
    pub remote_repositories: Vec<String>,

    /// User-supplied properties (`-D key=value` and config `properties`).
    pub execution_properties: BTreeMap<String, String>,

    /// Snapshot of the process environment for `${env.*}` expressions.
    pub environment: BTreeMap<String, String>,

    pub append_assembly_id: bool,
}

impl AssemblyConfig {
    /// Minimal configuration for `project`, using its basedir and final name.
    pub fn new(project: Project) -> Self {
        let basedir = project.basedir.clone();
        Self {
            final_name: project.final_name(),
            temporary_root_directory: basedir.join("target").join("assembly-tmp"),
            output_directory: basedir.join("target"),
            reactor_projects: vec![project.clone()],
            project,
            basedir,
            local_repository: None,
            remote_repositories: Vec::new(),
            execution_properties: BTreeMap::new(),
            environment: BTreeMap::new(),
            append_assembly_id: true,
        }
    }

    /// Configuration for a loaded reactor; the first project is the one
    /// being assembled.
    pub fn from_settings(settings: &Settings, reactor: Vec<Project>) -> Option<Self> {
        let project = reactor.first()?.clone();
        let basedir = project.basedir.clone();
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                basedir.join(path)
            }
        };

        Some(Self {
            final_name: settings
                .final_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| project.final_name()),
            temporary_root_directory: resolve(&settings.temporary_directory),
            output_directory: resolve(&settings.output_directory),
            local_repository: settings.local_repository_or_default().map(|p| resolve(&p)),
            remote_repositories: settings.remote_repositories.clone(),
            execution_properties: settings.properties.clone(),
            environment: std::env::vars().collect(),
            append_assembly_id: settings.append_assembly_id,
            reactor_projects: reactor,
            project,
            basedir,
        })
    }

    pub fn with_reactor(mut self, reactor: Vec<Project>) -> Self {
        self.reactor_projects = reactor;
        self
    }

    pub fn with_temporary_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temporary_root_directory = dir.into();
        self
    }

    pub fn with_output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_directory = dir.into();
        self
    }

    pub fn with_local_repository(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_repository = Some(dir.into());
        self
    }

    pub fn with_final_name(mut self, name: &str) -> Self {
        self.final_name = name.to_string();
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.execution_properties
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.environment.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_append_assembly_id(mut self, append: bool) -> Self {
        self.append_assembly_id = append;
        self
    }

    /// `final_name[-id]`
    pub fn distribution_name(&self, assembly_id: &str) -> String {
        if self.append_assembly_id && !assembly_id.is_empty() {
            format!("{}-{}", self.final_name, assembly_id)
        } else {
            self.final_name.clone()
        }
    }

    /// Resolve a path against the basedir unless already absolute.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.basedir.join(path)
        }
    }

    /// Reactor project built from the given coordinates, if any.
    pub fn reactor_project_for(&self, group_id: &str, artifact_id: &str) -> Option<&Project> {
        self.reactor_projects
            .iter()
            .find(|p| p.group_id == group_id && p.artifact_id == artifact_id)
    }
}
