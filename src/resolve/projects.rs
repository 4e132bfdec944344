//! Artifact-to-project lookup.

use assembly_model::{Artifact, Project};

use super::{ProjectBuilder, ResolveError};
use crate::config::AssemblyConfig;

/// Returns the reactor project that built an artifact, or a project
/// synthesized from the artifact's coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactorProjectBuilder;

impl ProjectBuilder for ReactorProjectBuilder {
    fn build_project(
        &self,
        artifact: &Artifact,
        config: &AssemblyConfig,
    ) -> Result<Project, ResolveError> {
        if let Some(project) = config.reactor_projects.iter().find(|p| p.matches(artifact)) {
            return Ok(project.clone());
        }

        if artifact.group_id.is_empty() || artifact.artifact_id.is_empty() {
            return Err(ResolveError::Project {
                id: artifact.id(),
                reason: "incomplete coordinates".to_string(),
            });
        }

        let mut project = Project::new(&artifact.group_id, &artifact.artifact_id, &artifact.version);
        project.packaging = artifact.artifact_type.clone();
        project.artifact_file = artifact.file.clone();
        if let Some(dir) = artifact.file.as_ref().and_then(|f| f.parent()) {
            project.basedir = dir.to_path_buf();
        }
        Ok(project)
    }
}
