//! Assembly manifest
//!
//! Records every entry of a written archive with its size, mode and hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Schema version for assembly manifests
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "assembly-archiver/assembly_manifest@1";

/// Entry type in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

/// A single archive entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path inside the archive; directories end with `/`
    pub path: String,

    /// Size in bytes (0 for directories)
    pub size: u64,

    /// SHA-256 of file contents (empty for directories)
    pub sha256: String,

    /// Octal permission string
    pub mode: String,

    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

/// Manifest written next to each archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyManifest {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,

    pub assembly_id: String,
    pub distribution_name: String,
    pub format: String,

    /// Path of the archive file or directory
    pub archive: String,

    /// SHA-256 of the archive bytes; for `dir` output, of the entry list
    pub archive_sha256: String,

    pub entries: Vec<ManifestEntry>,
}

impl AssemblyManifest {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }

    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }

    /// Total size of all files
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// (files, directories)
    pub fn entry_counts(&self) -> (usize, usize) {
        let files = self
            .entries
            .iter()
            .filter(|e| e.entry_type == EntryType::File)
            .count();
        (files, self.entries.len() - files)
    }

    pub fn find_entry(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Paths of all file entries, in archive order.
    pub fn file_paths(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == EntryType::File)
            .map(|e| e.path.as_str())
            .collect()
    }
}
