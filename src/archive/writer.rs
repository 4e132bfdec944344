//! Deterministic archive writer
//!
//! Add operations are expanded into a sorted entry table (implicit parent
//! directories included). Output uses normalized metadata: mtime 0,
//! uid/gid 0, sorted paths and explicit modes, so identical inputs give
//! identical bytes.

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, Header};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use assembly_filter::PathFilter;

use super::manifest::{self, AssemblyManifest, EntryType, ManifestEntry};
use super::{sanitize_archive_path, ArchiveError, Archiver, DirectorySource};
use crate::diagnostics::SharedDiagnostics;
use crate::format::{format_mode, join_archive_path, DEFAULT_DIRECTORY_MODE, DEFAULT_FILE_MODE};

const COMPONENT: &str = "archive-writer";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Dir,
    Tar,
    TarGz,
    Tgz,
    Zip,
    Jar,
}

impl ArchiveFormat {
    pub fn parse(name: &str) -> Result<Self, ArchiveError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dir" => Ok(ArchiveFormat::Dir),
            "tar" => Ok(ArchiveFormat::Tar),
            "tar.gz" => Ok(ArchiveFormat::TarGz),
            "tgz" => Ok(ArchiveFormat::Tgz),
            "zip" => Ok(ArchiveFormat::Zip),
            "jar" => Ok(ArchiveFormat::Jar),
            other => Err(ArchiveError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Dir => "dir",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Tgz => "tgz",
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Jar => "jar",
        }
    }

    /// Where an archive named `distribution_name` lands in `output_dir`.
    pub fn output_path(&self, output_dir: &Path, distribution_name: &str) -> PathBuf {
        match self {
            ArchiveFormat::Dir => output_dir.join(distribution_name),
            other => output_dir.join(format!("{}.{}", distribution_name, other.as_str())),
        }
    }
}

/// A written archive and its manifest
#[derive(Debug, Clone)]
pub struct WrittenArchive {
    pub format: ArchiveFormat,
    pub path: PathBuf,
    pub manifest_path: PathBuf,
    pub sha256: String,
    pub manifest: AssemblyManifest,
}

#[derive(Debug, Clone)]
enum EntryData {
    Directory,
    File(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Entry {
    data: EntryData,
    mode: u32,
}

impl Entry {
    fn is_directory(&self) -> bool {
        matches!(self.data, EntryData::Directory)
    }

    fn contents(&self) -> Result<Cow<'_, [u8]>, ArchiveError> {
        match &self.data {
            EntryData::Directory => Ok(Cow::Borrowed(&[][..])),
            EntryData::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            EntryData::File(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| ArchiveError::io_at("read", path, e)),
        }
    }
}

/// Collects archive entries and writes them out in any supported format.
pub struct ArchiveWriter {
    entries: BTreeMap<String, Entry>,
    diagnostics: SharedDiagnostics,
}

impl ArchiveWriter {
    pub fn new(diagnostics: SharedDiagnostics) -> Self {
        Self {
            entries: BTreeMap::new(),
            diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted entry paths; directories end with `/`.
    pub fn entry_paths(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(path, entry)| display_path(path, entry))
            .collect()
    }

    /// Mode of an entry, looked up without a trailing `/`.
    pub fn mode_of(&self, path: &str) -> Option<u32> {
        self.entries
            .get(path.trim_end_matches('/'))
            .map(|entry| entry.mode)
    }

    fn ensure_parents(&mut self, path: &str, mode: u32) {
        for (index, _) in path.match_indices('/') {
            self.entries
                .entry(path[..index].to_string())
                .or_insert(Entry {
                    data: EntryData::Directory,
                    mode,
                });
        }
    }

    fn insert(&mut self, target: &str, entry: Entry, parent_mode: u32) -> Result<(), ArchiveError> {
        let path = sanitize_archive_path(target)?;
        if path.is_empty() {
            return Ok(());
        }
        self.ensure_parents(&path, parent_mode);

        match self.entries.get(&path) {
            Some(existing) if existing.is_directory() && entry.is_directory() => {}
            Some(_) => {
                self.diagnostics.warn(
                    COMPONENT,
                    &format!(
                        "Duplicate archive entry {}; keeping the first one added",
                        path
                    ),
                );
            }
            None => {
                self.entries.insert(path, entry);
            }
        }
        Ok(())
    }

    fn unpack_zip(
        &mut self,
        archive: &DirectorySource,
        filter: &PathFilter,
    ) -> Result<(), ArchiveError> {
        let source = &archive.source;
        let file = File::open(source).map_err(|e| ArchiveError::io_at("open", source, e))?;
        let mut zip = ZipArchive::new(file).map_err(|e| ArchiveError::Zip {
            path: source.clone(),
            source: e,
        })?;
        let dir_mode = archive.directory_mode.unwrap_or(DEFAULT_DIRECTORY_MODE);

        for index in 0..zip.len() {
            let mut item = zip.by_index(index).map_err(|e| ArchiveError::Zip {
                path: source.clone(),
                source: e,
            })?;
            let Some(name) = item.enclosed_name() else {
                return Err(ArchiveError::InvalidPath(item.name().to_string()));
            };
            let rel = name.to_string_lossy().replace('\\', "/");
            if rel.is_empty() || !filter.is_included(Path::new(&rel)) {
                continue;
            }
            let target = join_archive_path(&archive.prefix, &rel);

            if item.is_dir() {
                let entry = Entry {
                    data: EntryData::Directory,
                    mode: dir_mode,
                };
                self.insert(&target, entry, dir_mode)?;
                continue;
            }

            let mut data = Vec::new();
            item.read_to_end(&mut data)
                .map_err(|e| ArchiveError::io_at("read entry of", source, e))?;
            let mode = archive
                .file_mode
                .or_else(|| item.unix_mode().map(|m| m & 0o7777))
                .unwrap_or(DEFAULT_FILE_MODE);
            self.insert(
                &target,
                Entry {
                    data: EntryData::Bytes(data),
                    mode,
                },
                dir_mode,
            )?;
        }
        Ok(())
    }

    fn unpack_tar<R: Read>(
        &mut self,
        reader: R,
        archive: &DirectorySource,
        filter: &PathFilter,
    ) -> Result<(), ArchiveError> {
        let source = &archive.source;
        let dir_mode = archive.directory_mode.unwrap_or(DEFAULT_DIRECTORY_MODE);
        let mut tar = tar::Archive::new(reader);
        let entries = tar
            .entries()
            .map_err(|e| ArchiveError::io_at("read", source, e))?;

        for item in entries {
            let mut item = item.map_err(|e| ArchiveError::io_at("read entry of", source, e))?;
            let rel = item
                .path()
                .map_err(|e| ArchiveError::io_at("read entry of", source, e))?
                .to_string_lossy()
                .replace('\\', "/");
            let rel = rel.trim_end_matches('/').to_string();
            if rel.is_empty() || !filter.is_included(Path::new(&rel)) {
                continue;
            }
            let target = join_archive_path(&archive.prefix, &rel);
            let entry_type = item.header().entry_type();
            let header_mode = item.header().mode().ok();

            if entry_type.is_dir() {
                let entry = Entry {
                    data: EntryData::Directory,
                    mode: dir_mode,
                };
                self.insert(&target, entry, dir_mode)?;
            } else if entry_type.is_file() {
                let mut data = Vec::new();
                item.read_to_end(&mut data)
                    .map_err(|e| ArchiveError::io_at("read entry of", source, e))?;
                let mode = archive
                    .file_mode
                    .or(header_mode.map(|m| m & 0o7777))
                    .unwrap_or(DEFAULT_FILE_MODE);
                self.insert(
                    &target,
                    Entry {
                        data: EntryData::Bytes(data),
                        mode,
                    },
                    dir_mode,
                )?;
            } else {
                self.diagnostics.debug(
                    COMPONENT,
                    &format!("Skipping non-regular entry {} in {}", rel, source.display()),
                );
            }
        }
        Ok(())
    }

    /// Write all entries to `destination` in `format`.
    ///
    /// Returns the archive digest and the manifest entries.
    pub fn write(
        &self,
        format: ArchiveFormat,
        destination: &Path,
    ) -> Result<(String, Vec<ManifestEntry>), ArchiveError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io_at("create", parent, e))?;
        }

        let mut sink = Sink::open(format, destination)?;
        let mut manifest_entries = Vec::with_capacity(self.entries.len());

        for (path, entry) in &self.entries {
            let display = display_path(path, entry);
            if entry.is_directory() {
                sink.directory(&display, entry.mode)?;
                manifest_entries.push(ManifestEntry {
                    path: display,
                    size: 0,
                    sha256: String::new(),
                    mode: format_mode(entry.mode),
                    entry_type: EntryType::Directory,
                });
            } else {
                let contents = entry.contents()?;
                sink.file(path, entry.mode, &contents)?;
                manifest_entries.push(ManifestEntry {
                    path: display,
                    size: contents.len() as u64,
                    sha256: hex::encode(Sha256::digest(&contents)),
                    mode: format_mode(entry.mode),
                    entry_type: EntryType::File,
                });
            }
        }
        sink.finish()?;

        let sha256 = if format == ArchiveFormat::Dir {
            let mut hasher = Sha256::new();
            for entry in &manifest_entries {
                hasher.update(entry.path.as_bytes());
                hasher.update([0u8]);
                hasher.update(entry.mode.as_bytes());
                hasher.update([0u8]);
                hasher.update(entry.sha256.as_bytes());
                hasher.update(b"\n");
            }
            hex::encode(hasher.finalize())
        } else {
            let bytes =
                fs::read(destination).map_err(|e| ArchiveError::io_at("read", destination, e))?;
            hex::encode(Sha256::digest(&bytes))
        };

        Ok((sha256, manifest_entries))
    }

    /// Write `<output_dir>/<distribution_name>.<ext>` plus its manifest.
    pub fn write_archive(
        &self,
        format: ArchiveFormat,
        output_dir: &Path,
        distribution_name: &str,
        assembly_id: &str,
    ) -> Result<WrittenArchive, ArchiveError> {
        let path = format.output_path(output_dir, distribution_name);
        let (sha256, entries) = self.write(format, &path)?;

        let manifest = AssemblyManifest {
            schema_version: manifest::SCHEMA_VERSION,
            schema_id: manifest::SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            assembly_id: assembly_id.to_string(),
            distribution_name: distribution_name.to_string(),
            format: format.as_str().to_string(),
            archive: path.display().to_string(),
            archive_sha256: sha256.clone(),
            entries,
        };

        let manifest_name = match path.file_name() {
            Some(name) => format!("{}.manifest.json", name.to_string_lossy()),
            None => format!("{}.manifest.json", distribution_name),
        };
        let manifest_path = output_dir.join(manifest_name);
        manifest
            .write_to_file(&manifest_path)
            .map_err(|e| ArchiveError::io_at("write", &manifest_path, e))?;

        self.diagnostics.info(
            COMPONENT,
            &format!(
                "Wrote {} ({} entries, sha256 {})",
                path.display(),
                manifest.entries.len(),
                sha256
            ),
        );

        Ok(WrittenArchive {
            format,
            path,
            manifest_path,
            sha256,
            manifest,
        })
    }
}

impl Archiver for ArchiveWriter {
    fn add_file(
        &mut self,
        source: &Path,
        target: &str,
        mode: Option<u32>,
    ) -> Result<(), ArchiveError> {
        if !source.is_file() {
            return Err(ArchiveError::MissingSource(source.to_path_buf()));
        }
        let mode = mode.unwrap_or_else(|| default_file_mode(source));
        self.insert(
            target,
            Entry {
                data: EntryData::File(source.to_path_buf()),
                mode,
            },
            DEFAULT_DIRECTORY_MODE,
        )
    }

    fn add_directory(&mut self, directory: DirectorySource) -> Result<(), ArchiveError> {
        let root = directory.source.clone();
        if !root.is_dir() {
            return Err(ArchiveError::MissingSource(root));
        }
        let filter = PathFilter::new(
            &directory.includes,
            &directory.excludes,
            directory.use_default_excludes,
        )?;
        let dir_mode = directory.directory_mode.unwrap_or(DEFAULT_DIRECTORY_MODE);

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let rel = e.path().strip_prefix(&root).unwrap_or(e.path());
                !filter.is_excluded(rel)
            });

        for item in walker {
            let item = item?;
            if item.depth() == 0 {
                continue;
            }
            let rel = item
                .path()
                .strip_prefix(&root)
                .map_err(|_| ArchiveError::InvalidPath(item.path().display().to_string()))?;
            if !filter.is_included(rel) {
                continue;
            }
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let target = join_archive_path(&directory.prefix, &rel_str);

            let entry = if item.file_type().is_dir() {
                Entry {
                    data: EntryData::Directory,
                    mode: dir_mode,
                }
            } else {
                Entry {
                    data: EntryData::File(item.path().to_path_buf()),
                    mode: directory
                        .file_mode
                        .unwrap_or_else(|| default_file_mode(item.path())),
                }
            };
            self.insert(&target, entry, dir_mode)?;
        }
        Ok(())
    }

    fn add_archive_contents(&mut self, archive: DirectorySource) -> Result<(), ArchiveError> {
        let source = archive.source.clone();
        if source.is_dir() {
            return self.add_directory(archive);
        }
        if !source.is_file() {
            return Err(ArchiveError::MissingSource(source));
        }
        let filter = PathFilter::new(&archive.includes, &archive.excludes, archive.use_default_excludes)?;

        match detect_archive_kind(&source)? {
            ArchiveKind::Zip => self.unpack_zip(&archive, &filter),
            ArchiveKind::Tar => {
                let file =
                    File::open(&source).map_err(|e| ArchiveError::io_at("open", &source, e))?;
                self.unpack_tar(file, &archive, &filter)
            }
            ArchiveKind::TarGz => {
                let file =
                    File::open(&source).map_err(|e| ArchiveError::io_at("open", &source, e))?;
                self.unpack_tar(GzDecoder::new(file), &archive, &filter)
            }
        }
    }
}

fn display_path(path: &str, entry: &Entry) -> String {
    if entry.is_directory() {
        format!("{}/", path)
    } else {
        path.to_string()
    }
}

fn default_file_mode(path: &Path) -> u32 {
    if is_executable(path) {
        0o755
    } else {
        DEFAULT_FILE_MODE
    }
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            return metadata.permissions().mode() & 0o111 != 0;
        }
    }
    false
}

enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

/// Identify an archive by magic bytes, then by name.
fn detect_archive_kind(path: &Path) -> Result<ArchiveKind, ArchiveError> {
    let mut magic = [0u8; 4];
    let read = File::open(path)
        .and_then(|mut f| f.read(&mut magic))
        .map_err(|e| ArchiveError::io_at("read", path, e))?;

    if read >= 4 && magic == *b"PK\x03\x04" {
        return Ok(ArchiveKind::Zip);
    }
    if read >= 2 && magic[..2] == [0x1f, 0x8b] {
        return Ok(ArchiveKind::TarGz);
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".tar") {
        return Ok(ArchiveKind::Tar);
    }
    Err(ArchiveError::UnknownArchiveType(path.to_path_buf()))
}

fn tar_header(size: u64, mode: u32, entry_type: tar::EntryType) -> Header {
    let mut header = Header::new_gnu();
    header.set_size(size);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(mode);
    header.set_entry_type(entry_type);
    header
}

fn append_tar_entry<W: Write>(
    builder: &mut Builder<W>,
    path: &str,
    mode: u32,
    contents: &[u8],
    entry_type: tar::EntryType,
) -> io::Result<()> {
    let mut header = tar_header(contents.len() as u64, mode, entry_type);
    builder.append_data(&mut header, path, contents)
}

fn zip_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode)
        .last_modified_time(zip::DateTime::default())
}

/// Format-specific output target.
enum Sink {
    Dir(PathBuf),
    Tar(Builder<BufWriter<File>>, PathBuf),
    TarGz(Builder<GzEncoder<BufWriter<File>>>, PathBuf),
    Zip(ZipWriter<BufWriter<File>>, PathBuf),
}

impl Sink {
    fn open(format: ArchiveFormat, destination: &Path) -> Result<Self, ArchiveError> {
        let dest = destination.to_path_buf();
        if format == ArchiveFormat::Dir {
            if dest.exists() {
                fs::remove_dir_all(&dest).map_err(|e| ArchiveError::io_at("remove", &dest, e))?;
            }
            fs::create_dir_all(&dest).map_err(|e| ArchiveError::io_at("create", &dest, e))?;
            return Ok(Sink::Dir(dest));
        }

        let file = File::create(&dest).map_err(|e| ArchiveError::io_at("create", &dest, e))?;
        let writer = BufWriter::new(file);
        Ok(match format {
            ArchiveFormat::Tar => Sink::Tar(Builder::new(writer), dest),
            ArchiveFormat::TarGz | ArchiveFormat::Tgz => Sink::TarGz(
                Builder::new(GzEncoder::new(writer, Compression::default())),
                dest,
            ),
            _ => Sink::Zip(ZipWriter::new(writer), dest),
        })
    }

    fn directory(&mut self, path: &str, mode: u32) -> Result<(), ArchiveError> {
        match self {
            Sink::Dir(root) => {
                let target = root.join(path.trim_end_matches('/'));
                fs::create_dir_all(&target).map_err(|e| ArchiveError::io_at("create", &target, e))?;
                set_permissions(&target, mode)
            }
            Sink::Tar(builder, dest) => {
                append_tar_entry(builder, path, mode, &[], tar::EntryType::Directory)
                    .map_err(|e| ArchiveError::io_at("write", dest, e))
            }
            Sink::TarGz(builder, dest) => {
                append_tar_entry(builder, path, mode, &[], tar::EntryType::Directory)
                    .map_err(|e| ArchiveError::io_at("write", dest, e))
            }
            Sink::Zip(zip, dest) => zip
                .add_directory(path, zip_options(mode))
                .map_err(|e| ArchiveError::Zip {
                    path: dest.clone(),
                    source: e,
                }),
        }
    }

    fn file(&mut self, path: &str, mode: u32, contents: &[u8]) -> Result<(), ArchiveError> {
        match self {
            Sink::Dir(root) => {
                let target = root.join(path);
                fs::write(&target, contents).map_err(|e| ArchiveError::io_at("write", &target, e))?;
                set_permissions(&target, mode)
            }
            Sink::Tar(builder, dest) => {
                append_tar_entry(builder, path, mode, contents, tar::EntryType::Regular)
                    .map_err(|e| ArchiveError::io_at("write", dest, e))
            }
            Sink::TarGz(builder, dest) => {
                append_tar_entry(builder, path, mode, contents, tar::EntryType::Regular)
                    .map_err(|e| ArchiveError::io_at("write", dest, e))
            }
            Sink::Zip(zip, dest) => {
                zip.start_file(path, zip_options(mode))
                    .map_err(|e| ArchiveError::Zip {
                        path: dest.clone(),
                        source: e,
                    })?;
                zip.write_all(contents)
                    .map_err(|e| ArchiveError::io_at("write", dest, e))
            }
        }
    }

    fn finish(self) -> Result<(), ArchiveError> {
        match self {
            Sink::Dir(_) => Ok(()),
            Sink::Tar(builder, dest) => builder
                .into_inner()
                .and_then(|mut w| w.flush())
                .map_err(|e| ArchiveError::io_at("finish", &dest, e)),
            Sink::TarGz(builder, dest) => builder
                .into_inner()
                .and_then(|gz| gz.finish())
                .and_then(|mut w| w.flush())
                .map_err(|e| ArchiveError::io_at("finish", &dest, e)),
            Sink::Zip(zip, dest) => {
                let mut writer = zip.finish().map_err(|e| ArchiveError::Zip {
                    path: dest.clone(),
                    source: e,
                })?;
                writer
                    .flush()
                    .map_err(|e| ArchiveError::io_at("finish", &dest, e))
            }
        }
    }
}

fn set_permissions(path: &Path, mode: u32) -> Result<(), ArchiveError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| ArchiveError::io_at("chmod", path, e))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
