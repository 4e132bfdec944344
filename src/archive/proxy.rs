//! Archiver wrapper that roots every entry under the base directory.

use std::path::Path;

use super::{ArchiveError, Archiver, DirectorySource};

/// Prefixes file targets and directory prefixes with `root_prefix`.
pub struct ProxyArchiver<'a> {
    inner: &'a mut dyn Archiver,
    root_prefix: String,
}

impl<'a> ProxyArchiver<'a> {
    /// An empty prefix passes targets through unchanged.
    pub fn new(inner: &'a mut dyn Archiver, root_prefix: &str) -> Self {
        let mut prefix = root_prefix.replace('\\', "/");
        prefix = prefix.trim_start_matches('/').to_string();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            inner,
            root_prefix: prefix,
        }
    }

    pub fn root_prefix(&self) -> &str {
        &self.root_prefix
    }

    fn rooted(&self, path: &str) -> String {
        let path = path.replace('\\', "/");
        format!("{}{}", self.root_prefix, path.trim_start_matches('/'))
    }
}

impl Archiver for ProxyArchiver<'_> {
    fn add_file(
        &mut self,
        source: &Path,
        target: &str,
        mode: Option<u32>,
    ) -> Result<(), ArchiveError> {
        let target = self.rooted(target);
        self.inner.add_file(source, &target, mode)
    }

    fn add_directory(&mut self, mut directory: DirectorySource) -> Result<(), ArchiveError> {
        directory.prefix = self.rooted(&directory.prefix);
        self.inner.add_directory(directory)
    }

    fn add_archive_contents(&mut self, mut archive: DirectorySource) -> Result<(), ArchiveError> {
        archive.prefix = self.rooted(&archive.prefix);
        self.inner.add_archive_contents(archive)
    }
}
