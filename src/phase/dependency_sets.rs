use assembly_model::AssemblyDescriptor;

use super::AssemblyPhase;
use crate::archive::Archiver;
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::AssemblyResult;
use crate::resolve::Collaborators;
use crate::task::AddDependencySetsTask;

/// Adds the main project's dependencies selected by each dependency set.
pub struct DependencySetPhase {
    collaborators: Collaborators,
    diagnostics: SharedDiagnostics,
}

impl DependencySetPhase {
    pub fn new(collaborators: Collaborators, diagnostics: SharedDiagnostics) -> Self {
        Self {
            collaborators,
            diagnostics,
        }
    }
}

impl AssemblyPhase for DependencySetPhase {
    fn name(&self) -> &str {
        "dependency-sets"
    }

    fn order(&self) -> Option<i32> {
        Some(30)
    }

    fn execute(
        &self,
        descriptor: &AssemblyDescriptor,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
    ) -> AssemblyResult<()> {
        if descriptor.dependency_sets.is_empty() {
            return Ok(());
        }
        AddDependencySetsTask::new(
            &descriptor.dependency_sets,
            &config.project,
            &self.collaborators,
            &self.diagnostics,
        )
        .execute(archiver, config)
    }
}
