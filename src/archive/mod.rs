//! Archive construction
//!
//! Phases emit [`AddOperation`]s through the [`Archiver`] trait. An
//! [`ArchiveRecorder`] keeps them for inspection; an [`ArchiveWriter`]
//! materializes them into sorted entries and writes deterministic `dir`,
//! `tar`, `tar.gz` or `zip` output plus an [`AssemblyManifest`].

mod manifest;
mod proxy;
mod recorder;
mod writer;

pub use manifest::{AssemblyManifest, EntryType, ManifestEntry};
pub use proxy::ProxyArchiver;
pub use recorder::ArchiveRecorder;
pub use writer::{ArchiveFormat, ArchiveWriter, WrittenArchive};

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while adding to or writing an archive
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("cannot read archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("filter error: {0}")]
    Filter(#[from] assembly_filter::FilterError),

    #[error("invalid archive path '{0}'")]
    InvalidPath(String),

    #[error("source does not exist: {0}")]
    MissingSource(PathBuf),

    #[error("cannot unpack {0}: unknown archive type")]
    UnknownArchiveType(PathBuf),

    #[error("unsupported archive format '{0}'")]
    UnsupportedFormat(String),
}

impl ArchiveError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ArchiveError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io_at(action: &str, path: &Path, source: io::Error) -> Self {
        Self::io(format!("failed to {} {}", action, path.display()), source)
    }
}

/// A directory tree or archive whose contents are added under `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySource {
    pub source: PathBuf,

    /// Target directory inside the archive; empty or ending with `/`.
    pub prefix: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,

    pub use_default_excludes: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_mode: Option<u32>,
}

impl DirectorySource {
    pub fn new(source: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            source: source.into(),
            prefix: prefix.to_string(),
            includes: Vec::new(),
            excludes: Vec::new(),
            use_default_excludes: true,
            file_mode: None,
            directory_mode: None,
        }
    }

    pub fn with_filters(mut self, includes: &[String], excludes: &[String]) -> Self {
        self.includes = includes.to_vec();
        self.excludes = excludes.to_vec();
        self
    }

    pub fn with_modes(mut self, file_mode: Option<u32>, directory_mode: Option<u32>) -> Self {
        self.file_mode = file_mode;
        self.directory_mode = directory_mode;
        self
    }

    pub fn with_default_excludes(mut self, use_default_excludes: bool) -> Self {
        self.use_default_excludes = use_default_excludes;
        self
    }
}

/// One unit of archive content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddOperation {
    File {
        source: PathBuf,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<u32>,
    },
    Directory(DirectorySource),
    ArchiveContents(DirectorySource),
}

impl AddOperation {
    /// Target file path or directory prefix inside the archive.
    pub fn target(&self) -> &str {
        match self {
            AddOperation::File { target, .. } => target,
            AddOperation::Directory(dir) | AddOperation::ArchiveContents(dir) => &dir.prefix,
        }
    }

    pub fn source(&self) -> &Path {
        match self {
            AddOperation::File { source, .. } => source,
            AddOperation::Directory(dir) | AddOperation::ArchiveContents(dir) => &dir.source,
        }
    }
}

/// Sink for archive content.
pub trait Archiver {
    /// Add a single file at `target`.
    fn add_file(&mut self, source: &Path, target: &str, mode: Option<u32>)
        -> Result<(), ArchiveError>;

    /// Add a directory tree recursively.
    fn add_directory(&mut self, directory: DirectorySource) -> Result<(), ArchiveError>;

    /// Expand an archive (or exploded directory) into the target prefix.
    fn add_archive_contents(&mut self, archive: DirectorySource) -> Result<(), ArchiveError>;

    /// Dispatch an operation to the matching method.
    fn apply(&mut self, operation: AddOperation) -> Result<(), ArchiveError> {
        match operation {
            AddOperation::File {
                source,
                target,
                mode,
            } => self.add_file(&source, &target, mode),
            AddOperation::Directory(dir) => self.add_directory(dir),
            AddOperation::ArchiveContents(dir) => self.add_archive_contents(dir),
        }
    }
}

/// Normalize an archive path: `/` separators, no leading `/`, no `.` or
/// `..` segments.
pub(crate) fn sanitize_archive_path(path: &str) -> Result<String, ArchiveError> {
    let unix = path.replace('\\', "/");
    let mut parts = Vec::new();
    for part in unix.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(ArchiveError::InvalidPath(path.to_string())),
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}
