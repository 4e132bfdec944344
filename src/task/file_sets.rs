//! File set processing.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use assembly_filter::PathFilter;
use assembly_model::{FileSet, Project};

use crate::archive::Archiver;
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::{AssemblyError, AssemblyResult};
use crate::format::{
    evaluate_output_directory, join_archive_path, parse_mode, ExpressionContext, FileFormatter,
};

const COMPONENT: &str = "file-sets";

/// Adds every file of each file set, one add-operation per file.
///
/// Directories resolve against the module basedir when a module is set,
/// otherwise against the main project's basedir.
pub struct AddFileSetsTask<'a> {
    file_sets: &'a [FileSet],
    module: Option<&'a Project>,
    output_prefix: Option<String>,
    extra_excludes: Vec<String>,
    diagnostics: &'a SharedDiagnostics,
}

impl<'a> AddFileSetsTask<'a> {
    pub fn new(file_sets: &'a [FileSet], diagnostics: &'a SharedDiagnostics) -> Self {
        Self {
            file_sets,
            module: None,
            output_prefix: None,
            extra_excludes: Vec::new(),
            diagnostics,
        }
    }

    pub fn with_module(mut self, module: &'a Project) -> Self {
        self.module = Some(module);
        self
    }

    /// Prepended to every set's output directory before evaluation.
    pub fn with_output_prefix(mut self, prefix: String) -> Self {
        self.output_prefix = Some(prefix);
        self
    }

    /// Absolute directories to leave out of every set.
    pub fn excluding_directories(mut self, directories: &[PathBuf]) -> Self {
        self.extra_excludes = directories
            .iter()
            .map(|d| d.to_string_lossy().replace('\\', "/"))
            .collect();
        self
    }

    pub fn execute(
        &self,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
        formatter: &mut FileFormatter<'_>,
    ) -> AssemblyResult<()> {
        for set in self.file_sets {
            self.add_file_set(set, archiver, config, formatter)?;
        }
        Ok(())
    }

    fn basedir<'c>(&self, config: &'c AssemblyConfig) -> &'c Path
    where
        'a: 'c,
    {
        self.module.map_or(config.basedir.as_path(), |m| m.basedir.as_path())
    }

    /// Exclude patterns for `extra_excludes` and for the configured
    /// temporary and output directories that fall inside `directory`.
    fn directory_excludes(&self, directory: &Path, config: &AssemblyConfig) -> Vec<String> {
        let generated = [
            &config.temporary_root_directory,
            &config.output_directory,
        ];
        let mut patterns = Vec::new();
        let candidates = self
            .extra_excludes
            .iter()
            .map(PathBuf::from)
            .chain(generated.into_iter().cloned());
        for excluded in candidates {
            let Some(rel) = relative_inside(&excluded, directory) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if !rel.is_empty() && !patterns.contains(&rel) {
                patterns.push(format!("{}/**", rel));
                patterns.push(rel);
            }
        }
        patterns
    }

    fn add_file_set(
        &self,
        set: &FileSet,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
        formatter: &mut FileFormatter<'_>,
    ) -> AssemblyResult<()> {
        let basedir = self.basedir(config);
        let directory_str = set.directory.as_deref().unwrap_or("");
        let directory = if directory_str.is_empty() {
            basedir.to_path_buf()
        } else if Path::new(directory_str).is_absolute() {
            PathBuf::from(directory_str)
        } else {
            basedir.join(directory_str)
        };

        let output = set.output_directory.as_deref().unwrap_or(directory_str);
        let output = match &self.output_prefix {
            Some(prefix) => join_archive_path(prefix, output),
            None => output.to_string(),
        };
        let context = self
            .module
            .map(|m| ExpressionContext {
                module_project: Some(m),
                ..ExpressionContext::default()
            })
            .unwrap_or_default();
        let output_dir =
            evaluate_output_directory(Some(&output), Some(&config.final_name), &context, config)?;

        if !directory.is_dir() {
            self.diagnostics.warn(
                COMPONENT,
                &format!(
                    "The following file-set directory does not exist and will be skipped: {}",
                    directory.display()
                ),
            );
            return Ok(());
        }

        let file_mode = parse_mode(set.file_mode.as_deref())?;
        let mut excludes = set.excludes.clone();
        excludes.extend(self.directory_excludes(&directory, config));
        let filter = PathFilter::new(&set.includes, &excludes, set.use_default_excludes)?;

        let walker = WalkDir::new(&directory)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let rel = e.path().strip_prefix(&directory).unwrap_or(e.path());
                !filter.is_excluded(rel)
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                AssemblyError::configuration_caused_by(
                    format!("Failed to scan file-set directory {}", directory.display()),
                    e,
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&directory).unwrap_or(entry.path());
            if filter.is_included(rel) {
                let rel = rel.to_string_lossy().replace('\\', "/");
                files.push((entry.into_path(), rel));
            }
        }

        // The formatter writes below the temporary root, so the scan must
        // finish before the first copy is made.
        for (path, rel) in &files {
            let source = if set.needs_formatting() {
                formatter.format(path, set.filtered, set.line_ending.as_deref())?
            } else {
                path.clone()
            };
            let target = join_archive_path(&output_dir, rel);
            archiver.add_file(&source, &target, file_mode)?;
        }
        let added = files.len();

        self.diagnostics.debug(
            COMPONENT,
            &format!("Added {} file(s) from {}", added, directory.display()),
        );
        Ok(())
    }
}

/// `path` relative to `directory` when it lies inside it.
///
/// Falls back to canonical paths so a symlinked basedir still matches.
fn relative_inside(path: &Path, directory: &Path) -> Option<PathBuf> {
    if let Ok(rel) = path.strip_prefix(directory) {
        return Some(rel.to_path_buf());
    }
    let path = path.canonicalize().ok()?;
    let directory = directory.canonicalize().ok()?;
    path.strip_prefix(&directory).ok().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{AddOperation, ArchiveRecorder};
    use crate::diagnostics::CollectingDiagnostics;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AssemblyConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/main")).unwrap();
        fs::write(root.join("src/main/App.java"), "class App {}").unwrap();
        fs::write(root.join("src/README.md"), "version ${project.version}\n").unwrap();
        fs::create_dir_all(root.join("src/.svn")).unwrap();
        fs::write(root.join("src/.svn/entries"), "svn").unwrap();
        fs::create_dir_all(root.join("src/sub/inner")).unwrap();
        fs::write(root.join("src/sub/inner/x.txt"), "x").unwrap();

        let mut project = Project::new("org.example", "app", "1.0");
        project.basedir = root.to_path_buf();
        let config = AssemblyConfig::new(project)
            .with_temporary_root(root.join("tmp"));
        (dir, config)
    }

    #[test]
    fn test_relative_directory_and_default_output() {
        let (_dir, config) = setup();
        let sink = CollectingDiagnostics::new();
        let diagnostics: SharedDiagnostics = sink.clone();
        let sets = vec![FileSet {
            directory: Some("src".to_string()),
            file_mode: Some("0640".to_string()),
            ..FileSet::default()
        }];

        let mut recorder = ArchiveRecorder::new();
        let mut formatter = FileFormatter::new(&config, "file-sets").unwrap();
        AddFileSetsTask::new(&sets, &diagnostics)
            .execute(&mut recorder, &config, &mut formatter)
            .unwrap();

        assert_eq!(
            recorder.targets(),
            vec!["src/README.md", "src/main/App.java", "src/sub/inner/x.txt"]
        );
        match &recorder.operations()[0] {
            AddOperation::File { mode, .. } => assert_eq!(*mode, Some(0o640)),
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_filtered_set_keeps_relative_names() {
        let (_dir, config) = setup();
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let sets = vec![FileSet {
            directory: Some("src".to_string()),
            output_directory: Some("docs".to_string()),
            includes: vec!["*.md".to_string()],
            filtered: true,
            ..FileSet::default()
        }];

        let mut recorder = ArchiveRecorder::new();
        let mut formatter = FileFormatter::new(&config, "file-sets").unwrap();
        AddFileSetsTask::new(&sets, &diagnostics)
            .execute(&mut recorder, &config, &mut formatter)
            .unwrap();

        assert_eq!(recorder.targets(), vec!["docs/README.md"]);
        let source = recorder.operations()[0].source().to_path_buf();
        assert!(source.starts_with(formatter.work_dir()));
        assert_eq!(fs::read_to_string(source).unwrap(), "version 1.0\n");
    }

    #[test]
    fn test_excluded_directories_and_prefix() {
        let (dir, config) = setup();
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let sets = vec![FileSet {
            directory: Some("src".to_string()),
            output_directory: Some("sources".to_string()),
            ..FileSet::default()
        }];

        let mut recorder = ArchiveRecorder::new();
        let mut formatter = FileFormatter::new(&config, "module-sets").unwrap();
        AddFileSetsTask::new(&sets, &diagnostics)
            .with_output_prefix("app".to_string())
            .excluding_directories(&[dir.path().join("src/sub")])
            .execute(&mut recorder, &config, &mut formatter)
            .unwrap();

        assert_eq!(
            recorder.targets(),
            vec!["app/sources/README.md", "app/sources/main/App.java"]
        );
    }

    #[test]
    fn test_basedir_set_skips_generated_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "${project.artifactId}\n").unwrap();
        fs::create_dir_all(root.join("target/assembly-tmp/stale")).unwrap();
        fs::write(root.join("target/assembly-tmp/stale/old.txt"), "old").unwrap();
        fs::write(root.join("target/app-1.0.zip"), "zip").unwrap();

        let mut project = Project::new("org.example", "app", "1.0");
        project.basedir = root.to_path_buf();
        let config = AssemblyConfig::new(project);
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let sets = vec![FileSet {
            filtered: true,
            ..FileSet::default()
        }];

        let mut recorder = ArchiveRecorder::new();
        let mut formatter = FileFormatter::new(&config, "file-sets").unwrap();
        AddFileSetsTask::new(&sets, &diagnostics)
            .execute(&mut recorder, &config, &mut formatter)
            .unwrap();

        assert_eq!(recorder.targets(), vec!["a.txt"]);
        let source = recorder.operations()[0].source().to_path_buf();
        assert!(source.starts_with(&config.temporary_root_directory));
        assert_eq!(fs::read_to_string(source).unwrap(), "app\n");
    }

    #[test]
    fn test_missing_directory_is_a_warning() {
        let (_dir, config) = setup();
        let sink = CollectingDiagnostics::new();
        let diagnostics: SharedDiagnostics = sink.clone();
        let sets = vec![FileSet::in_directory("does-not-exist")];

        let mut recorder = ArchiveRecorder::new();
        let mut formatter = FileFormatter::new(&config, "file-sets").unwrap();
        AddFileSetsTask::new(&sets, &diagnostics)
            .execute(&mut recorder, &config, &mut formatter)
            .unwrap();

        assert!(recorder.is_empty());
        assert_eq!(sink.warnings().len(), 1);
    }
}
