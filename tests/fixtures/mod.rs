//! Shared fixtures for the integration tests
//!
//! Builds throwaway project trees on disk: a root project with optional
//! modules, dependency jars and plain files.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assembly_archiver::model::{Artifact, Project, Scope};
use assembly_archiver::{
    AssemblyArchiver, AssemblyConfig, CollectingDiagnostics, Collaborators, SharedDiagnostics,
};
use tempfile::TempDir;

/// A project tree rooted in a temporary directory.
pub struct Workspace {
    pub dir: TempDir,
    pub reactor: Vec<Project>,
}

impl Workspace {
    /// Root project `org.example:app:1.0` with no modules.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut root = Project::new("org.example", "app", "1.0");
        root.basedir = dir.path().to_path_buf();
        Self {
            dir,
            reactor: vec![root],
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.reactor[0]
    }

    /// Write `contents` to `relative` under the root, creating parents.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// A dependency backed by a jar under `lib-cache/`.
    pub fn jar(&self, group: &str, id: &str, scope: Scope) -> Artifact {
        let file = self.write(&format!("lib-cache/{}-1.0.jar", id), id);
        Artifact::new(group, id, "1.0").with_scope(scope).with_file(file)
    }

    /// Add a packaged module under `<root>/<id>` and list it on the root.
    pub fn add_module(&mut self, id: &str, dependencies: Vec<Artifact>) -> &mut Project {
        let basedir = self.root().join(id);
        fs::create_dir_all(&basedir).unwrap();
        let jar = basedir.join(format!("{}-1.0.jar", id));
        fs::write(&jar, id).unwrap();

        let mut module = Project::new("org.example", id, "1.0");
        module.basedir = basedir;
        module.artifact_file = Some(jar);
        module.dependencies = dependencies;

        let root = &mut self.reactor[0];
        root.packaging = "pom".to_string();
        root.modules.push(id.to_string());
        self.reactor.push(module);
        self.reactor.last_mut().unwrap()
    }

    pub fn config(&self) -> AssemblyConfig {
        AssemblyConfig::new(self.reactor[0].clone()).with_reactor(self.reactor.clone())
    }
}

/// Standard archiver over local collaborators plus its diagnostics sink.
pub fn archiver() -> (AssemblyArchiver, Arc<CollectingDiagnostics>) {
    archiver_with(|c| c)
}

/// Standard archiver with customized collaborators.
pub fn archiver_with(
    customize: impl FnOnce(Collaborators) -> Collaborators,
) -> (AssemblyArchiver, Arc<CollectingDiagnostics>) {
    let sink = CollectingDiagnostics::new();
    let diagnostics: SharedDiagnostics = sink.clone();
    let collaborators = customize(Collaborators::local(None, diagnostics.clone()));
    (AssemblyArchiver::standard(collaborators, diagnostics), sink)
}
