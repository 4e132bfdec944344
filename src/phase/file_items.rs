use std::path::Path;

use assembly_model::{AssemblyDescriptor, FileItem};

use super::AssemblyPhase;
use crate::archive::Archiver;
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::{AssemblyError, AssemblyResult};
use crate::format::{
    evaluate_output_directory, join_archive_path, parse_mode, ExpressionContext, FileFormatter,
};

const COMPONENT: &str = "file-items";

/// Adds single files, optionally filtered or with converted line endings.
///
/// The archive entry is always named after `dest_name` or the source file,
/// never after the formatter's working copy.
pub struct FileItemPhase {
    diagnostics: SharedDiagnostics,
}

impl FileItemPhase {
    pub fn new(diagnostics: SharedDiagnostics) -> Self {
        Self { diagnostics }
    }

    fn add_item(
        &self,
        item: &FileItem,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
        formatter: &mut FileFormatter<'_>,
    ) -> AssemblyResult<()> {
        let source = config.resolve(&item.source);
        if !source.is_file() {
            return Err(AssemblyError::configuration(format!(
                "File item source does not exist: {}",
                source.display()
            )));
        }

        let dest_name = match item.dest_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => file_name(&source)?,
        };
        let output_dir = evaluate_output_directory(
            item.output_directory.as_deref(),
            Some(&config.final_name),
            &ExpressionContext::default(),
            config,
        )?;
        let file_mode = parse_mode(item.file_mode.as_deref())?;
        let content = formatter.format(&source, item.filtered, item.line_ending.as_deref())?;

        let target = join_archive_path(&output_dir, &dest_name);
        self.diagnostics.debug(
            COMPONENT,
            &format!("Adding {} as {}", source.display(), target),
        );
        archiver.add_file(&content, &target, file_mode)?;
        Ok(())
    }
}

fn file_name(path: &Path) -> AssemblyResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            AssemblyError::configuration(format!("File item has no file name: {}", path.display()))
        })
}

impl AssemblyPhase for FileItemPhase {
    fn name(&self) -> &str {
        "file-items"
    }

    fn order(&self) -> Option<i32> {
        Some(20)
    }

    fn execute(
        &self,
        descriptor: &AssemblyDescriptor,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
    ) -> AssemblyResult<()> {
        if descriptor.files.is_empty() {
            return Ok(());
        }
        let mut formatter = FileFormatter::new(config, self.name())?;
        for item in &descriptor.files {
            self.add_item(item, archiver, config, &mut formatter)?;
        }
        Ok(())
    }
}
