//! Assembly orchestration
//!
//! Validates the descriptor, runs the ordered phases into a recorder rooted
//! at the base directory, then writes one archive per requested format.

use std::fs;
use std::path::{Path, PathBuf};

use assembly_model::AssemblyDescriptor;

use crate::archive::{
    ArchiveFormat, ArchiveRecorder, ArchiveWriter, ProxyArchiver, WrittenArchive,
};
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::{AssemblyError, AssemblyResult};
use crate::format::{evaluate_output_directory, ExpressionContext};
use crate::phase::PhaseRegistry;
use crate::resolve::Collaborators;

const COMPONENT: &str = "assembly";

/// Runs phases and writes archives.
pub struct AssemblyArchiver {
    registry: PhaseRegistry,
    diagnostics: SharedDiagnostics,
}

impl AssemblyArchiver {
    pub fn new(registry: PhaseRegistry, diagnostics: SharedDiagnostics) -> Self {
        Self {
            registry,
            diagnostics,
        }
    }

    /// The standard phases over the given collaborators.
    pub fn standard(collaborators: Collaborators, diagnostics: SharedDiagnostics) -> Self {
        Self::new(
            PhaseRegistry::standard(collaborators, diagnostics.clone()),
            diagnostics,
        )
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    /// Prefix every entry is placed under; empty without a base directory.
    pub fn base_directory(
        descriptor: &AssemblyDescriptor,
        config: &AssemblyConfig,
    ) -> AssemblyResult<String> {
        if !descriptor.include_base_directory {
            return Ok(String::new());
        }
        let base = descriptor
            .base_directory
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&config.final_name);
        evaluate_output_directory(
            Some(base),
            Some(&config.final_name),
            &ExpressionContext::default(),
            config,
        )
    }

    fn work_directory(descriptor: &AssemblyDescriptor, config: &AssemblyConfig) -> PathBuf {
        config
            .temporary_root_directory
            .join(format!("{}-work", config.distribution_name(&descriptor.id)))
    }

    fn run_phases(
        &self,
        descriptor: &AssemblyDescriptor,
        config: &AssemblyConfig,
        work_dir: &Path,
    ) -> AssemblyResult<ArchiveRecorder> {
        descriptor.validate()?;
        if descriptor.is_empty() {
            return Err(AssemblyError::configuration(format!(
                "Assembly '{}' has no dependency sets, file sets, files, module sets or repositories",
                descriptor.id
            )));
        }

        let work_config = config.clone().with_temporary_root(work_dir);
        let prefix = Self::base_directory(descriptor, &work_config)?;

        let mut recorder = ArchiveRecorder::new();
        {
            let mut proxy = ProxyArchiver::new(&mut recorder, &prefix);
            for phase in self.registry.ordered() {
                self.diagnostics
                    .debug(COMPONENT, &format!("Running phase {}", phase.name()));
                phase.execute(descriptor, &mut proxy, &work_config)?;
            }
        }

        self.diagnostics.info(
            COMPONENT,
            &format!(
                "Assembly '{}' produced {} add-operation(s)",
                descriptor.id,
                recorder.len()
            ),
        );
        Ok(recorder)
    }

    fn prepare_work_directory(work_dir: &Path) -> AssemblyResult<()> {
        if work_dir.exists() {
            fs::remove_dir_all(work_dir).map_err(|e| AssemblyError::io_at("remove", work_dir, e))?;
        }
        fs::create_dir_all(work_dir).map_err(|e| AssemblyError::io_at("create", work_dir, e))
    }

    fn clean_work_directory(&self, work_dir: &Path) {
        if let Err(e) = fs::remove_dir_all(work_dir) {
            if work_dir.exists() {
                self.diagnostics.warn(
                    COMPONENT,
                    &format!(
                        "Failed to remove temporary directory {}: {}",
                        work_dir.display(),
                        e
                    ),
                );
            }
        }
    }

    /// Record the add-operations without writing anything.
    ///
    /// Filtered copies are removed afterwards, so `File` sources under the
    /// work directory no longer exist when this returns.
    pub fn plan(
        &self,
        descriptor: &AssemblyDescriptor,
        config: &AssemblyConfig,
    ) -> AssemblyResult<ArchiveRecorder> {
        let work_dir = Self::work_directory(descriptor, config);
        Self::prepare_work_directory(&work_dir)?;
        let result = self.run_phases(descriptor, config, &work_dir);
        self.clean_work_directory(&work_dir);
        result
    }

    /// Assemble and write one archive per format into the output directory.
    pub fn create_archives(
        &self,
        descriptor: &AssemblyDescriptor,
        config: &AssemblyConfig,
        formats: &[ArchiveFormat],
    ) -> AssemblyResult<Vec<WrittenArchive>> {
        if formats.is_empty() {
            return Err(AssemblyError::configuration(format!(
                "No archive formats configured for assembly '{}'",
                descriptor.id
            )));
        }

        let work_dir = Self::work_directory(descriptor, config);
        Self::prepare_work_directory(&work_dir)?;
        let result = self.write_archives(descriptor, config, formats, &work_dir);
        self.clean_work_directory(&work_dir);
        result
    }

    fn write_archives(
        &self,
        descriptor: &AssemblyDescriptor,
        config: &AssemblyConfig,
        formats: &[ArchiveFormat],
        work_dir: &Path,
    ) -> AssemblyResult<Vec<WrittenArchive>> {
        let recorder = self.run_phases(descriptor, config, work_dir)?;

        let mut writer = ArchiveWriter::new(self.diagnostics.clone());
        recorder.replay(&mut writer)?;

        let distribution_name = config.distribution_name(&descriptor.id);
        let mut written = Vec::with_capacity(formats.len());
        for format in formats {
            written.push(writer.write_archive(
                *format,
                &config.output_directory,
                &distribution_name,
                &descriptor.id,
            )?);
        }
        Ok(written)
    }
}

/// Parse format names, rejecting unknown ones.
pub fn parse_formats(names: &[String]) -> AssemblyResult<Vec<ArchiveFormat>> {
    names
        .iter()
        .map(|name| {
            ArchiveFormat::parse(name).map_err(|e| {
                AssemblyError::configuration_caused_by(format!("Invalid format '{}'", name), e)
            })
        })
        .collect()
}
