//! Project model and reactor loading.
//!
//! A project is described by a `project.toml` next to its sources. Relative
//! file references inside it are resolved against the directory holding the
//! file, which also becomes the project's basedir.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::artifact::Artifact;
use crate::error::ModelError;
use crate::read_model_file;

/// Conventional project file name.
pub const PROJECT_FILE: &str = "project.toml";

fn default_packaging() -> String {
    "jar".to_string()
}

/// An additional artifact produced by a project's build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub classifier: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// A build project: coordinates, outputs, resolved dependencies and modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,

    #[serde(default = "default_packaging")]
    pub packaging: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub basedir: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_final_name: Option<String>,

    /// Main build output; `None` until the project has been packaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_file: Option<PathBuf>,

    #[serde(default)]
    pub attached_artifacts: Vec<Attachment>,

    /// Resolved dependencies, transitive ones included.
    #[serde(default)]
    pub dependencies: Vec<Artifact>,

    /// Module directories relative to `basedir`.
    #[serde(default)]
    pub modules: Vec<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Project {
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            packaging: default_packaging(),
            name: None,
            basedir: PathBuf::new(),
            build_final_name: None,
            artifact_file: None,
            attached_artifacts: Vec::new(),
            dependencies: Vec::new(),
            modules: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Load a single project file.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let mut project: Project = read_model_file(path)?;
        let basedir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        project.rebase(&basedir);
        project.validate()?;
        Ok(project)
    }

    fn rebase(&mut self, basedir: &Path) {
        self.basedir = if self.basedir.as_os_str().is_empty() {
            basedir.to_path_buf()
        } else if self.basedir.is_relative() {
            basedir.join(&self.basedir)
        } else {
            self.basedir.clone()
        };

        let root = self.basedir.clone();
        let absolutize = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut() {
                if path.is_relative() {
                    *path = root.join(&*path);
                }
            }
        };

        absolutize(&mut self.artifact_file);
        for attachment in &mut self.attached_artifacts {
            absolutize(&mut attachment.file);
        }
        for dependency in &mut self.dependencies {
            absolutize(&mut dependency.file);
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.group_id.is_empty() || self.artifact_id.is_empty() || self.version.is_empty() {
            return Err(ModelError::Validation(format!(
                "project at {} must declare group_id, artifact_id and version",
                self.basedir.display()
            )));
        }
        Ok(())
    }

    /// `groupId:artifactId:packaging:version`
    pub fn id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.packaging, self.version
        )
    }

    /// Build output name without extension.
    pub fn final_name(&self) -> String {
        self.build_final_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.artifact_id, self.version))
    }

    /// The project's own artifact, typed by its packaging.
    pub fn artifact(&self) -> Artifact {
        let mut artifact = Artifact::new(&self.group_id, &self.artifact_id, &self.version)
            .with_type(&self.packaging);
        artifact.file = self.artifact_file.clone();
        artifact.dependency_trail = vec![artifact.id()];
        artifact
    }

    /// Attached artifacts expanded to full coordinates.
    pub fn attachments(&self) -> Vec<Artifact> {
        self.attached_artifacts
            .iter()
            .map(|attachment| {
                let mut artifact = Artifact::new(&self.group_id, &self.artifact_id, &self.version)
                    .with_type(attachment.artifact_type.as_deref().unwrap_or("jar"))
                    .with_classifier(&attachment.classifier);
                artifact.file = attachment.file.clone();
                artifact
            })
            .collect()
    }

    /// Absolute directories of the declared modules.
    pub fn module_directories(&self) -> Vec<PathBuf> {
        self.modules.iter().map(|m| self.basedir.join(m)).collect()
    }

    /// Whether this project is built from the given coordinates.
    pub fn matches(&self, artifact: &Artifact) -> bool {
        self.group_id == artifact.group_id
            && self.artifact_id == artifact.artifact_id
            && self.version == artifact.version
    }
}

/// Load a project and, recursively, every module it declares.
///
/// The root project comes first; modules follow depth-first in declaration
/// order. Each module directory must contain a [`PROJECT_FILE`].
pub fn load_reactor(root_file: &Path) -> Result<Vec<Project>, ModelError> {
    let mut projects = Vec::new();
    let mut seen = HashSet::new();
    load_recursive(root_file, &mut projects, &mut seen)?;
    Ok(projects)
}

fn load_recursive(
    file: &Path,
    projects: &mut Vec<Project>,
    seen: &mut HashSet<PathBuf>,
) -> Result<(), ModelError> {
    let canonical = file.canonicalize().map_err(|e| ModelError::Io {
        path: file.to_path_buf(),
        source: e,
    })?;
    if !seen.insert(canonical) {
        return Err(ModelError::Validation(format!(
            "module cycle detected at {}",
            file.display()
        )));
    }

    let project = Project::from_file(file)?;
    let module_files: Vec<PathBuf> = project
        .module_directories()
        .into_iter()
        .map(|dir| dir.join(PROJECT_FILE))
        .collect();
    projects.push(project);

    for module_file in module_files {
        load_recursive(&module_file, projects, seen)?;
    }
    Ok(())
}
