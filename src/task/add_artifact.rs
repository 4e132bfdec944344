//! Adds one artifact, as a file or unpacked.

use std::path::Path;

use assembly_model::{Artifact, UnpackOptions};

use crate::archive::{Archiver, DirectorySource};
use crate::config::AssemblyConfig;
use crate::error::{AssemblyError, AssemblyResult};
use crate::format::{
    evaluate_file_name_mapping, evaluate_output_directory, join_archive_path, ExpressionContext,
};

/// Adds `artifact` under an output directory and file name mapping.
pub struct AddArtifactTask<'a> {
    artifact: &'a Artifact,
    context: ExpressionContext<'a>,
    output_directory: Option<&'a str>,
    file_name_mapping: &'a str,
    file_mode: Option<u32>,
    directory_mode: Option<u32>,
    unpack: bool,
    unpack_options: Option<&'a UnpackOptions>,
}

impl<'a> AddArtifactTask<'a> {
    pub fn new(artifact: &'a Artifact, context: ExpressionContext<'a>, mapping: &'a str) -> Self {
        Self {
            artifact,
            context,
            output_directory: None,
            file_name_mapping: mapping,
            file_mode: None,
            directory_mode: None,
            unpack: false,
            unpack_options: None,
        }
    }

    pub fn output_directory(mut self, output_directory: Option<&'a str>) -> Self {
        self.output_directory = output_directory;
        self
    }

    pub fn modes(mut self, file_mode: Option<u32>, directory_mode: Option<u32>) -> Self {
        self.file_mode = file_mode;
        self.directory_mode = directory_mode;
        self
    }

    pub fn unpack(mut self, unpack: bool, options: Option<&'a UnpackOptions>) -> Self {
        self.unpack = unpack;
        self.unpack_options = options;
        self
    }

    fn resolved_file(&self) -> AssemblyResult<&'a Path> {
        match self.artifact.file.as_deref() {
            Some(file) if file.exists() => Ok(file),
            Some(file) => Err(AssemblyError::configuration(format!(
                "Artifact {} points at {}, which does not exist",
                self.artifact.id(),
                file.display()
            ))),
            None => Err(AssemblyError::configuration(format!(
                "Artifact {} has no resolved file; resolution must complete before assembly",
                self.artifact.id()
            ))),
        }
    }

    pub fn execute(&self, archiver: &mut dyn Archiver, config: &AssemblyConfig) -> AssemblyResult<()> {
        let file = self.resolved_file()?;
        let output_dir = evaluate_output_directory(
            self.output_directory,
            Some(&config.final_name),
            &self.context,
            config,
        )?;

        // pom artifacts are metadata, never archives
        if self.unpack && self.artifact.artifact_type != "pom" {
            let mut source = DirectorySource::new(file, &output_dir)
                .with_modes(self.file_mode, self.directory_mode);
            if let Some(options) = self.unpack_options {
                source = source.with_filters(&options.includes, &options.excludes);
            }
            archiver.add_archive_contents(source)?;
            return Ok(());
        }

        let name = evaluate_file_name_mapping(self.file_name_mapping, &self.context, config)?;
        let target = join_archive_path(&output_dir, &name);
        archiver.add_file(file, &target, self.file_mode)?;
        Ok(())
    }
}
