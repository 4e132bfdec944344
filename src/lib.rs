//! Assembly Archiver - descriptor-driven archive assembly
//!
//! An assembly descriptor lists dependency sets, file sets, single files,
//! module sets and repositories. Each kind is handled by a phase; phases run
//! in a deterministic order and emit add-operations into an [`Archiver`],
//! which the [`AssemblyArchiver`] finally writes as dir, tar, tar.gz or zip
//! archives with a manifest.

pub mod archive;
pub mod archiver;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod phase;
pub mod resolve;
pub mod task;

pub use archive::{AddOperation, ArchiveFormat, ArchiveRecorder, Archiver, DirectorySource};
pub use archiver::{parse_formats, AssemblyArchiver};
pub use config::{AssemblyConfig, EffectiveConfig, Settings};
pub use diagnostics::{CollectingDiagnostics, Diagnostics, SharedDiagnostics, TracingDiagnostics};
pub use error::{AssemblyError, AssemblyResult, ErrorKind};
pub use phase::{AssemblyPhase, PhaseRegistry};
pub use resolve::Collaborators;

pub use assembly_filter as filter;
pub use assembly_model as model;
