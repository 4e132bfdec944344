//! In-memory archiver that records operations.

use std::path::Path;

use super::{AddOperation, ArchiveError, Archiver, DirectorySource};

/// Records every operation in emission order.
#[derive(Debug, Default, Clone)]
pub struct ArchiveRecorder {
    operations: Vec<AddOperation>,
}

impl ArchiveRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[AddOperation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<AddOperation> {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Targets of all recorded operations.
    pub fn targets(&self) -> Vec<&str> {
        self.operations.iter().map(AddOperation::target).collect()
    }

    /// Apply every recorded operation to another archiver.
    pub fn replay(&self, target: &mut dyn Archiver) -> Result<(), ArchiveError> {
        for operation in &self.operations {
            target.apply(operation.clone())?;
        }
        Ok(())
    }
}

impl Archiver for ArchiveRecorder {
    fn add_file(
        &mut self,
        source: &Path,
        target: &str,
        mode: Option<u32>,
    ) -> Result<(), ArchiveError> {
        self.operations.push(AddOperation::File {
            source: source.to_path_buf(),
            target: target.to_string(),
            mode,
        });
        Ok(())
    }

    fn add_directory(&mut self, directory: DirectorySource) -> Result<(), ArchiveError> {
        self.operations.push(AddOperation::Directory(directory));
        Ok(())
    }

    fn add_archive_contents(&mut self, archive: DirectorySource) -> Result<(), ArchiveError> {
        self.operations.push(AddOperation::ArchiveContents(archive));
        Ok(())
    }
}
