//! Phase behavior through the full archiver
//!
//! Each test builds a project tree, runs `plan` and inspects the recorded
//! add-operations.

mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assembly_archiver::archive::{AddOperation, Archiver};
use assembly_archiver::model::{
    Artifact, AssemblyDescriptor, DependencySet, FileItem, FileSet, ModuleBinaries, ModuleSet, Repository,
    Scope,
};
use assembly_archiver::phase::{FileItemPhase, FileSetPhase};
use assembly_archiver::resolve::{RepositoryAssembler, ResolveError};
use assembly_archiver::{
    AssemblyArchiver, AssemblyConfig, AssemblyPhase, AssemblyResult, CollectingDiagnostics,
    ErrorKind, PhaseRegistry, SharedDiagnostics,
};
use fixtures::{archiver, archiver_with, Workspace};

fn descriptor(id: &str) -> AssemblyDescriptor {
    AssemblyDescriptor {
        id: id.to_string(),
        ..AssemblyDescriptor::default()
    }
}

// =============================================================================
// Dependency sets
// =============================================================================

#[test]
fn test_runtime_dependencies_with_group_exclude() {
    let mut ws = Workspace::new();
    let deps = vec![
        ws.jar("org", "a", Scope::Compile),
        ws.jar("org", "b", Scope::Runtime),
        ws.jar("com.foo", "c", Scope::Runtime),
    ];
    ws.project_mut().dependencies = deps;

    let descriptor = AssemblyDescriptor {
        dependency_sets: vec![DependencySet {
            scope: Some(Scope::Runtime),
            excludes: vec!["com.foo:*".to_string()],
            output_directory: Some("lib".to_string()),
            ..DependencySet::default()
        }],
        ..descriptor("bin")
    };

    let (archiver, _) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(recorder.targets(), vec!["lib/b-1.0.jar"]);
}

#[test]
fn test_unmatched_include_warns() {
    let mut ws = Workspace::new();
    let deps = vec![ws.jar("org", "a", Scope::Compile)];
    ws.project_mut().dependencies = deps;

    let descriptor = AssemblyDescriptor {
        dependency_sets: vec![DependencySet {
            includes: vec!["org:a".to_string(), "org:missing".to_string()],
            ..DependencySet::default()
        }],
        ..descriptor("bin")
    };

    let (archiver, sink) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(recorder.targets(), vec!["a-1.0.jar"]);
    assert!(sink.warnings().iter().any(|w| w.contains("org:missing")));
}

#[test]
fn test_strict_filtering_fails_on_unmatched_include() {
    let mut ws = Workspace::new();
    let deps = vec![ws.jar("org", "a", Scope::Compile)];
    ws.project_mut().dependencies = deps;

    let descriptor = AssemblyDescriptor {
        dependency_sets: vec![DependencySet {
            includes: vec!["org:missing".to_string()],
            use_strict_filtering: true,
            ..DependencySet::default()
        }],
        ..descriptor("bin")
    };

    let (archiver, _) = archiver();
    let err = archiver.plan(&descriptor, &ws.config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

// =============================================================================
// File sets and file items
// =============================================================================

#[test]
fn test_file_item_lands_in_output_directory() {
    let ws = Workspace::new();
    ws.write("notes.txt", "release ${project.version}\n");

    let plain = AssemblyDescriptor {
        files: vec![FileItem {
            source: "notes.txt".to_string(),
            output_directory: Some("docs".to_string()),
            ..FileItem::default()
        }],
        ..descriptor("bin")
    };
    let (archiver, _) = archiver();
    let recorder = archiver.plan(&plain, &ws.config()).unwrap();
    assert_eq!(recorder.targets(), vec!["docs/notes.txt"]);

    let mut filtered = plain.clone();
    filtered.files[0].filtered = true;
    let recorder = archiver.plan(&filtered, &ws.config()).unwrap();
    assert_eq!(recorder.targets(), vec!["docs/notes.txt"]);
}

#[test]
fn test_file_set_respects_patterns_and_default_excludes() {
    let ws = Workspace::new();
    ws.write("src/main/config/app.properties", "name=app");
    ws.write("src/main/config/logging.xml", "<log/>");
    ws.write("src/main/config/scratch.tmp", "tmp");
    ws.write("src/main/config/.git/HEAD", "ref");

    let descriptor = AssemblyDescriptor {
        file_sets: vec![FileSet {
            output_directory: Some("conf".to_string()),
            excludes: vec!["**/*.tmp".to_string()],
            ..FileSet::in_directory("src/main/config")
        }],
        ..descriptor("bin")
    };

    let (archiver, _) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(
        recorder.targets(),
        vec!["conf/app.properties", "conf/logging.xml"]
    );
}

#[test]
fn test_filtered_basedir_file_set_leaves_out_its_own_copies() {
    let ws = Workspace::new();
    ws.write("a.txt", "${project.version}\n");

    let descriptor = AssemblyDescriptor {
        file_sets: vec![FileSet {
            filtered: true,
            ..FileSet::default()
        }],
        ..descriptor("bin")
    };

    let (archiver, _) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(recorder.targets(), vec!["a.txt"]);
}

#[test]
fn test_missing_file_set_directory_is_skipped() {
    let ws = Workspace::new();
    let descriptor = AssemblyDescriptor {
        file_sets: vec![FileSet::in_directory("does/not/exist")],
        ..descriptor("bin")
    };

    let (archiver, sink) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert!(recorder.is_empty());
    assert_eq!(sink.warnings().len(), 1);
}

// =============================================================================
// Repositories
// =============================================================================

/// Records what the phase hands to the assembler.
#[derive(Default)]
struct RecordingAssembler {
    calls: Mutex<Vec<(PathBuf, bool)>>,
}

impl RepositoryAssembler for RecordingAssembler {
    fn assemble(
        &self,
        repository_dir: &Path,
        _repository: &Repository,
        _config: &AssemblyConfig,
    ) -> Result<(), ResolveError> {
        let fresh = repository_dir.is_dir()
            && fs::read_dir(repository_dir)
                .map_err(|e| ResolveError::Unresolved(e.to_string()))?
                .next()
                .is_none();
        self.calls
            .lock()
            .unwrap()
            .push((repository_dir.to_path_buf(), fresh));
        fs::write(repository_dir.join("marker"), "repo").unwrap();
        Ok(())
    }
}

#[test]
fn test_repository_is_assembled_then_added_as_directory() {
    let ws = Workspace::new();
    let assembler = Arc::new(RecordingAssembler::default());
    let (archiver, _) = {
        let assembler = assembler.clone();
        archiver_with(move |c| c.with_repository_assembler(assembler))
    };

    let descriptor = AssemblyDescriptor {
        repositories: vec![Repository {
            output_directory: Some("repo".to_string()),
            ..Repository::default()
        }],
        ..descriptor("bin")
    };

    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();

    let calls = assembler.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (repository_dir, fresh) = &calls[0];
    assert!(*fresh);
    assert!(repository_dir.ends_with("repo"));

    assert_eq!(recorder.len(), 1);
    match &recorder.operations()[0] {
        AddOperation::Directory(source) => {
            assert_eq!(source.prefix, "repo/");
            assert_eq!(&source.source, repository_dir);
        }
        other => panic!("expected a directory operation, got {:?}", other),
    }
}

#[test]
fn test_repository_failure_is_configuration_error() {
    struct Failing;

    impl RepositoryAssembler for Failing {
        fn assemble(&self, _: &Path, _: &Repository, _: &AssemblyConfig) -> Result<(), ResolveError> {
            Err(ResolveError::Unresolved("org:gone:jar:1.0".to_string()))
        }
    }

    let ws = Workspace::new();
    let (archiver, _) = archiver_with(|c| c.with_repository_assembler(Arc::new(Failing)));
    let descriptor = AssemblyDescriptor {
        repositories: vec![Repository::default()],
        ..descriptor("bin")
    };

    let err = archiver.plan(&descriptor, &ws.config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("Failed to assemble repository"));
}

// =============================================================================
// Module sets
// =============================================================================

fn binaries_only() -> ModuleSet {
    ModuleSet {
        binaries: Some(ModuleBinaries::default()),
        ..ModuleSet::default()
    }
}

#[test]
fn test_module_without_file_is_fatal() {
    let mut ws = Workspace::new();
    ws.add_module("core", Vec::new()).artifact_file = None;

    let descriptor = AssemblyDescriptor {
        module_sets: vec![ModuleSet {
            binaries: Some(ModuleBinaries {
                include_dependencies: false,
                ..ModuleBinaries::default()
            }),
            ..ModuleSet::default()
        }],
        ..descriptor("bin")
    };

    let (archiver, _) = archiver();
    let err = archiver.plan(&descriptor, &ws.config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("org.example:core:jar:1.0"));
    assert!(err.to_string().contains("package phase"));
}

#[test]
fn test_shared_module_dependency_added_once() {
    let mut ws = Workspace::new();
    let shared = ws.jar("org", "shared", Scope::Compile);
    let extra = ws.jar("org", "extra", Scope::Runtime);
    ws.add_module("core", vec![shared.clone()]);
    ws.add_module("web", vec![shared, extra]);

    let descriptor = AssemblyDescriptor {
        module_sets: vec![binaries_only()],
        ..descriptor("bin")
    };

    let (archiver, sink) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(
        recorder.targets(),
        vec!["core-1.0.jar", "web-1.0.jar", "shared-1.0.jar", "extra-1.0.jar"]
    );

    let conflict_warnings = sink
        .warnings()
        .into_iter()
        .filter(|w| w.contains("version conflict"))
        .count();
    assert_eq!(conflict_warnings, 1);
}

/// Sources recorded for `target`, in recording order.
fn sources_of(operations: &[AddOperation], target: &str) -> Vec<PathBuf> {
    operations
        .iter()
        .filter(|op| op.target() == target)
        .map(|op| op.source().to_path_buf())
        .collect()
}

#[test]
fn test_sibling_module_dependency_uses_reactor_output() {
    let mut ws = Workspace::new();
    ws.add_module("core", Vec::new());
    ws.add_module("web", vec![Artifact::new("org.example", "core", "1.0")]);

    let descriptor = AssemblyDescriptor {
        module_sets: vec![binaries_only()],
        ..descriptor("bin")
    };

    let (archiver, _) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    let core_jar = ws.root().join("core/core-1.0.jar");
    let sources = sources_of(recorder.operations(), "core-1.0.jar");
    assert!(!sources.is_empty());
    assert!(sources.iter().all(|s| *s == core_jar));
    assert!(recorder.targets().contains(&"web-1.0.jar"));
}

#[test]
fn test_module_artifacts_precede_module_dependencies() {
    let mut ws = Workspace::new();
    let stale = ws.write("m2/core-1.0.jar", "stale");
    let installed_core = Artifact::new("org.example", "core", "1.0").with_file(&stale);
    ws.add_module("web", vec![installed_core]);
    ws.add_module("core", Vec::new());

    let descriptor = AssemblyDescriptor {
        module_sets: vec![binaries_only()],
        ..descriptor("bin")
    };

    let (archiver, _) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(
        recorder.targets(),
        vec!["web-1.0.jar", "core-1.0.jar", "core-1.0.jar"]
    );
    assert_eq!(
        sources_of(recorder.operations(), "core-1.0.jar"),
        vec![ws.root().join("core/core-1.0.jar"), stale]
    );
}

#[test]
fn test_shared_dependency_added_once_across_module_sets() {
    let mut ws = Workspace::new();
    let shared = ws.jar("org", "shared", Scope::Compile);
    ws.add_module("core", vec![shared.clone()]);
    ws.add_module("web", vec![shared]);

    let only = |id: &str| ModuleSet {
        includes: vec![format!("org.example:{}", id)],
        ..binaries_only()
    };
    let descriptor = AssemblyDescriptor {
        module_sets: vec![only("core"), only("web")],
        ..descriptor("bin")
    };

    let (archiver, _) = archiver();
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(
        recorder.targets(),
        vec!["core-1.0.jar", "shared-1.0.jar", "web-1.0.jar"]
    );
}

// =============================================================================
// Phase ordering
// =============================================================================

/// Adds one fixed file so its position in the output is visible.
struct MarkerPhase {
    name: &'static str,
    order: Option<i32>,
    source: PathBuf,
}

impl AssemblyPhase for MarkerPhase {
    fn name(&self) -> &str {
        self.name
    }

    fn order(&self) -> Option<i32> {
        self.order
    }

    fn execute(
        &self,
        _descriptor: &AssemblyDescriptor,
        archiver: &mut dyn Archiver,
        _config: &AssemblyConfig,
    ) -> AssemblyResult<()> {
        archiver.add_file(&self.source, &format!("{}.txt", self.name), None)?;
        Ok(())
    }
}

fn full_descriptor(ws: &mut Workspace) -> AssemblyDescriptor {
    ws.write("conf/app.properties", "name=app");
    ws.write("README", "readme");
    let deps = vec![ws.jar("org", "a", Scope::Compile)];
    ws.project_mut().dependencies = deps;

    AssemblyDescriptor {
        file_sets: vec![FileSet::in_directory("conf")],
        files: vec![FileItem {
            source: "README".to_string(),
            ..FileItem::default()
        }],
        dependency_sets: vec![DependencySet {
            output_directory: Some("lib".to_string()),
            ..DependencySet::default()
        }],
        ..descriptor("bin")
    }
}

#[test]
fn test_standard_phase_order() {
    let mut ws = Workspace::new();
    let descriptor = full_descriptor(&mut ws);
    let (archiver, _) = archiver();

    assert_eq!(
        archiver.registry().names(),
        vec![
            "file-sets",
            "file-items",
            "dependency-sets",
            "module-sets",
            "repositories"
        ]
    );

    let first = archiver.plan(&descriptor, &ws.config()).unwrap();
    let second = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(
        first.targets(),
        vec!["conf/app.properties", "README", "lib/a-1.0.jar"]
    );
    assert_eq!(first.targets(), second.targets());
}

#[test]
fn test_custom_phases_slot_into_order() {
    let mut ws = Workspace::new();
    let descriptor = full_descriptor(&mut ws);
    let marker = ws.write("marker.txt", "m");

    let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
    let mut registry = PhaseRegistry::new();
    for (name, order) in [("zz-unordered", None), ("aa-unordered", None), ("between", Some(15))] {
        registry.register(MarkerPhase {
            name,
            order,
            source: marker.clone(),
        });
    }
    registry.register(FileItemPhase::new(diagnostics.clone()));
    registry.register(FileSetPhase::new(diagnostics.clone()));
    assert_eq!(
        registry.names(),
        vec!["file-sets", "between", "file-items", "aa-unordered", "zz-unordered"]
    );

    let archiver = AssemblyArchiver::new(registry, diagnostics);
    let recorder = archiver.plan(&descriptor, &ws.config()).unwrap();
    assert_eq!(
        recorder.targets(),
        vec![
            "conf/app.properties",
            "between.txt",
            "README",
            "aa-unordered.txt",
            "zz-unordered.txt"
        ]
    );
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_empty_descriptor_is_configuration_error() {
    let ws = Workspace::new();
    let (archiver, _) = archiver();
    let err = archiver.plan(&descriptor("bin"), &ws.config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.exit_code(), 2);
}
