//! Assembly descriptor: the declarative list of archive sections.
//!
//! Field names follow the snake_case TOML/JSON form of the classic
//! descriptor elements (`dependencySets` becomes `dependency_sets`, a file
//! item list is `files`, and so on).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::artifact::Scope;
use crate::error::ModelError;
use crate::read_model_file;

/// Default mapping for dependency artifacts.
pub const DEFAULT_DEPENDENCY_MAPPING: &str =
    "${artifact.artifactId}-${artifact.version}${dashClassifier?}.${artifact.extension}";

/// Default mapping for module binaries.
pub const DEFAULT_MODULE_MAPPING: &str =
    "${module.artifactId}-${module.version}${dashClassifier?}.${module.extension}";

/// Default directory mapping for module sources.
pub const DEFAULT_MODULE_DIRECTORY_MAPPING: &str = "${module.artifactId}";

fn default_true() -> bool {
    true
}

fn default_module_mapping() -> String {
    DEFAULT_MODULE_MAPPING.to_string()
}

fn default_module_directory_mapping() -> String {
    DEFAULT_MODULE_DIRECTORY_MAPPING.to_string()
}

/// Root of an assembly definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyDescriptor {
    /// Assembly id, appended to the distribution name when configured.
    #[serde(default)]
    pub id: String,

    /// Archive formats to produce (`dir`, `tar`, `tar.gz`, `zip`).
    #[serde(default)]
    pub formats: Vec<String>,

    /// Whether every entry lives under a single top-level directory.
    #[serde(default = "default_true")]
    pub include_base_directory: bool,

    /// Name of the top-level directory (defaults to the final name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_directory: Option<String>,

    #[serde(default)]
    pub dependency_sets: Vec<DependencySet>,

    #[serde(default)]
    pub file_sets: Vec<FileSet>,

    #[serde(default)]
    pub files: Vec<FileItem>,

    #[serde(default)]
    pub module_sets: Vec<ModuleSet>,

    #[serde(default)]
    pub repositories: Vec<Repository>,
}

impl AssemblyDescriptor {
    /// Load a descriptor from a `.toml` or `.json` file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let descriptor: AssemblyDescriptor = read_model_file(path)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Parse a descriptor from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ModelError> {
        let descriptor: AssemblyDescriptor = toml::from_str(text).map_err(|e| ModelError::Toml {
            path: "<inline>".into(),
            source: e,
        })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Structural checks that do not need the filesystem.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (index, item) in self.files.iter().enumerate() {
            if item.source.trim().is_empty() {
                return Err(ModelError::Validation(format!(
                    "files[{}]: source must not be empty",
                    index
                )));
            }
            if let Some(name) = &item.dest_name {
                if name.contains('/') || name.contains('\\') {
                    return Err(ModelError::Validation(format!(
                        "files[{}]: dest_name must be a plain file name, got '{}'",
                        index, name
                    )));
                }
            }
        }

        for (index, alignment) in self
            .repositories
            .iter()
            .flat_map(|r| r.group_version_alignments.iter())
            .enumerate()
        {
            if alignment.id.is_empty() || alignment.version.is_empty() {
                return Err(ModelError::Validation(format!(
                    "group_version_alignments[{}]: id and version are required",
                    index
                )));
            }
        }

        Ok(())
    }

    /// True when the descriptor has nothing to add.
    pub fn is_empty(&self) -> bool {
        self.dependency_sets.is_empty()
            && self.file_sets.is_empty()
            && self.files.is_empty()
            && self.module_sets.is_empty()
            && self.repositories.is_empty()
    }
}

/// Include/exclude patterns applied when unpacking an archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnpackOptions {
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// Selection of the project's dependency artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencySet {
    /// Only dependencies with exactly this scope; absent means any scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    #[serde(default)]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name_mapping: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<String>,

    #[serde(default)]
    pub unpack: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpack_options: Option<UnpackOptions>,

    #[serde(default)]
    pub use_project_artifact: bool,

    #[serde(default)]
    pub use_project_attachments: bool,

    #[serde(default = "default_true")]
    pub use_transitive_dependencies: bool,

    #[serde(default)]
    pub use_transitive_filtering: bool,

    #[serde(default)]
    pub use_strict_filtering: bool,
}

impl Default for DependencySet {
    fn default() -> Self {
        Self {
            scope: None,
            includes: Vec::new(),
            excludes: Vec::new(),
            output_directory: None,
            output_file_name_mapping: None,
            directory_mode: None,
            file_mode: None,
            unpack: false,
            unpack_options: None,
            use_project_artifact: false,
            use_project_attachments: false,
            use_transitive_dependencies: true,
            use_transitive_filtering: false,
            use_strict_filtering: false,
        }
    }
}

impl DependencySet {
    /// Mapping to use, falling back to the supplied default.
    pub fn mapping_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.output_file_name_mapping.as_deref().unwrap_or(default)
    }
}

/// A directory of files copied with include/exclude filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSet {
    /// Source directory; absent means the project basedir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    /// Destination; absent means the `directory` string itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    #[serde(default)]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default = "default_true")]
    pub use_default_excludes: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_mode: Option<String>,

    #[serde(default)]
    pub filtered: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_ending: Option<String>,
}

impl Default for FileSet {
    fn default() -> Self {
        Self {
            directory: None,
            output_directory: None,
            includes: Vec::new(),
            excludes: Vec::new(),
            use_default_excludes: true,
            file_mode: None,
            directory_mode: None,
            filtered: false,
            line_ending: None,
        }
    }
}

impl FileSet {
    pub fn in_directory(directory: &str) -> Self {
        Self {
            directory: Some(directory.to_string()),
            ..Self::default()
        }
    }

    /// Whether files must pass through the formatter before being added.
    pub fn needs_formatting(&self) -> bool {
        self.filtered || self.line_ending.as_deref().is_some_and(|l| l != "keep")
    }
}

/// A single file, optionally renamed and transformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<String>,

    #[serde(default)]
    pub filtered: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_ending: Option<String>,
}

/// Reactor module selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSet {
    #[serde(default)]
    pub use_all_reactor_projects: bool,

    #[serde(default = "default_true")]
    pub include_sub_modules: bool,

    #[serde(default)]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<ModuleSources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binaries: Option<ModuleBinaries>,
}

impl Default for ModuleSet {
    fn default() -> Self {
        Self {
            use_all_reactor_projects: false,
            include_sub_modules: true,
            includes: Vec::new(),
            excludes: Vec::new(),
            sources: None,
            binaries: None,
        }
    }
}

/// Source directories of each selected module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSources {
    /// File sets re-resolved against every module basedir.
    #[serde(default)]
    pub file_sets: Vec<FileSet>,

    #[serde(default = "default_true")]
    pub include_module_directory: bool,

    #[serde(default = "default_true")]
    pub exclude_sub_module_directories: bool,

    #[serde(default = "default_module_directory_mapping")]
    pub output_directory_mapping: String,
}

impl Default for ModuleSources {
    fn default() -> Self {
        Self {
            file_sets: Vec::new(),
            include_module_directory: true,
            exclude_sub_module_directories: true,
            output_directory_mapping: default_module_directory_mapping(),
        }
    }
}

impl ModuleSources {
    /// Declared file sets, or a single `src` set when none are declared.
    pub fn effective_file_sets(&self) -> Vec<FileSet> {
        if self.file_sets.is_empty() {
            vec![FileSet::in_directory("src")]
        } else {
            self.file_sets.clone()
        }
    }
}

/// Built artifacts (and optionally dependencies) of each selected module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleBinaries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_classifier: Option<String>,

    #[serde(default = "default_true")]
    pub include_dependencies: bool,

    #[serde(default)]
    pub dependency_sets: Vec<DependencySet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    #[serde(default = "default_module_mapping")]
    pub output_file_name_mapping: String,

    #[serde(default)]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default)]
    pub unpack: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpack_options: Option<UnpackOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_mode: Option<String>,
}

impl Default for ModuleBinaries {
    fn default() -> Self {
        Self {
            attachment_classifier: None,
            include_dependencies: true,
            dependency_sets: Vec::new(),
            output_directory: None,
            output_file_name_mapping: default_module_mapping(),
            includes: Vec::new(),
            excludes: Vec::new(),
            unpack: false,
            unpack_options: None,
            file_mode: None,
            directory_mode: None,
        }
    }
}

impl ModuleBinaries {
    /// Dependency sets to apply to each module.
    ///
    /// When none are declared and `include_dependencies` is set, a single set
    /// is implied from the binaries' own output settings and filters. The
    /// default module mapping names files after the module, so the implied
    /// set only inherits a mapping that was changed from it.
    pub fn effective_dependency_sets(&self) -> Vec<DependencySet> {
        if !self.dependency_sets.is_empty() {
            return self.dependency_sets.clone();
        }
        if !self.include_dependencies {
            return Vec::new();
        }
        vec![DependencySet {
            output_directory: self.output_directory.clone(),
            output_file_name_mapping: (self.output_file_name_mapping != DEFAULT_MODULE_MAPPING)
                .then(|| self.output_file_name_mapping.clone()),
            file_mode: self.file_mode.clone(),
            directory_mode: self.directory_mode.clone(),
            includes: self.includes.clone(),
            excludes: self.excludes.clone(),
            unpack: self.unpack,
            unpack_options: self.unpack_options.clone(),
            ..DependencySet::default()
        }]
    }
}

/// Pin every artifact of a group to one version inside a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupVersionAlignment {
    pub id: String,
    pub version: String,
    /// Artifact ids exempt from the alignment.
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// A repository-layout directory built from dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    #[serde(default)]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    #[serde(default)]
    pub include_metadata: bool,

    #[serde(default = "default_true")]
    pub use_default_excludes: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_mode: Option<String>,

    #[serde(default)]
    pub group_version_alignments: Vec<GroupVersionAlignment>,
}

impl Default for Repository {
    fn default() -> Self {
        Self {
            output_directory: None,
            includes: Vec::new(),
            excludes: Vec::new(),
            scope: None,
            include_metadata: false,
            use_default_excludes: true,
            file_mode: None,
            directory_mode: None,
            group_version_alignments: Vec::new(),
        }
    }
}
