use std::fs;

use assembly_model::AssemblyDescriptor;

use super::AssemblyPhase;
use crate::archive::{Archiver, DirectorySource};
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::{AssemblyError, AssemblyResult};
use crate::format::{evaluate_output_directory, parse_mode, ExpressionContext};
use crate::resolve::Collaborators;

const COMPONENT: &str = "repositories";

/// Directory under the temporary root used when no output directory is set.
const DEFAULT_REPOSITORY_DIR: &str = "repository";

/// Materializes each repository under the temporary root, then adds it.
pub struct RepositoryPhase {
    collaborators: Collaborators,
    diagnostics: SharedDiagnostics,
}

impl RepositoryPhase {
    pub fn new(collaborators: Collaborators, diagnostics: SharedDiagnostics) -> Self {
        Self {
            collaborators,
            diagnostics,
        }
    }
}

impl AssemblyPhase for RepositoryPhase {
    fn name(&self) -> &str {
        "repositories"
    }

    fn execute(
        &self,
        descriptor: &AssemblyDescriptor,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
    ) -> AssemblyResult<()> {
        for repository in &descriptor.repositories {
            let output_dir = evaluate_output_directory(
                repository.output_directory.as_deref(),
                Some(&config.final_name),
                &ExpressionContext::default(),
                config,
            )?;
            let local_name = match output_dir.trim_end_matches('/') {
                "" => DEFAULT_REPOSITORY_DIR,
                name => name,
            };
            let repository_dir = config.temporary_root_directory.join(local_name);
            fs::create_dir_all(&repository_dir)
                .map_err(|e| AssemblyError::io_at("create", &repository_dir, e))?;

            self.collaborators
                .repository_assembler
                .assemble(&repository_dir, repository, config)
                .map_err(|e| {
                    AssemblyError::configuration_caused_by(
                        format!("Failed to assemble repository: {}", e),
                        e,
                    )
                })?;

            let file_mode = parse_mode(repository.file_mode.as_deref())?;
            let directory_mode = parse_mode(repository.directory_mode.as_deref())?;
            self.diagnostics.debug(
                COMPONENT,
                &format!(
                    "Adding repository {} as '{}'",
                    repository_dir.display(),
                    output_dir
                ),
            );
            archiver.add_directory(
                DirectorySource::new(&repository_dir, &output_dir)
                    .with_modes(file_mode, directory_mode)
                    .with_default_excludes(repository.use_default_excludes),
            )?;
        }
        Ok(())
    }
}
