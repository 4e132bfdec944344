use assembly_model::AssemblyDescriptor;

use super::AssemblyPhase;
use crate::archive::Archiver;
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::AssemblyResult;
use crate::format::FileFormatter;
use crate::task::AddFileSetsTask;

/// Adds the descriptor's file sets, resolved against the project basedir.
pub struct FileSetPhase {
    diagnostics: SharedDiagnostics,
}

impl FileSetPhase {
    pub fn new(diagnostics: SharedDiagnostics) -> Self {
        Self { diagnostics }
    }
}

impl AssemblyPhase for FileSetPhase {
    fn name(&self) -> &str {
        "file-sets"
    }

    fn order(&self) -> Option<i32> {
        Some(10)
    }

    fn execute(
        &self,
        descriptor: &AssemblyDescriptor,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
    ) -> AssemblyResult<()> {
        if descriptor.file_sets.is_empty() {
            return Ok(());
        }
        let mut formatter = FileFormatter::new(config, self.name())?;
        AddFileSetsTask::new(&descriptor.file_sets, &self.diagnostics).execute(
            archiver,
            config,
            &mut formatter,
        )
    }
}
