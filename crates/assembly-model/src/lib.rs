//! Assembly model types
//!
//! Defines the assembly descriptor, artifact coordinates and the project
//! model consumed by the archiver phases. Model files are TOML or JSON.

pub mod artifact;
pub mod descriptor;
pub mod error;
pub mod project;

pub use artifact::{Artifact, Scope};
pub use descriptor::{
    AssemblyDescriptor, DependencySet, FileItem, FileSet, GroupVersionAlignment, ModuleBinaries,
    ModuleSet, ModuleSources, Repository, UnpackOptions,
};
pub use error::ModelError;
pub use project::{load_reactor, Attachment, Project, PROJECT_FILE};

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read a model file, choosing JSON for `.json` and TOML otherwise.
pub(crate) fn read_model_file<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let contents = fs::read_to_string(path).map_err(|e| ModelError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&contents).map_err(|e| ModelError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    } else {
        toml::from_str(&contents).map_err(|e| ModelError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
