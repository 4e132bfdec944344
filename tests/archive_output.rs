//! End-to-end archive writing
//!
//! Assembles a small distribution into zip, tar.gz and dir outputs and
//! checks the written entries, manifests and reproducibility.

mod fixtures;

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::Path;

use assembly_archiver::archive::{ArchiveFormat, AssemblyManifest, EntryType};
use assembly_archiver::model::{AssemblyDescriptor, DependencySet, FileItem, FileSet, Scope};
use fixtures::{archiver, Workspace};
use flate2::read::GzDecoder;

fn distribution(ws: &mut Workspace) -> AssemblyDescriptor {
    ws.write("src/main/config/app.properties", "version=${project.version}\n");
    ws.write("src/main/config/.gitignore", "target/\n");
    ws.write("bin/run.sh", "#!/bin/sh\necho run\n");
    ws.write("NOTICE", "notice\r\n");
    let deps = vec![
        ws.jar("org", "core", Scope::Compile),
        ws.jar("org", "junit", Scope::Test),
    ];
    ws.project_mut().dependencies = deps;

    AssemblyDescriptor {
        id: "bin".to_string(),
        include_base_directory: true,
        file_sets: vec![
            FileSet {
                output_directory: Some("conf".to_string()),
                filtered: true,
                ..FileSet::in_directory("src/main/config")
            },
            FileSet {
                file_mode: Some("0755".to_string()),
                ..FileSet::in_directory("bin")
            },
        ],
        files: vec![FileItem {
            source: "NOTICE".to_string(),
            line_ending: Some("lf".to_string()),
            ..FileItem::default()
        }],
        dependency_sets: vec![DependencySet {
            scope: Some(Scope::Compile),
            output_directory: Some("lib".to_string()),
            ..DependencySet::default()
        }],
        ..AssemblyDescriptor::default()
    }
}

const EXPECTED_FILES: &[&str] = &[
    "app-1.0/NOTICE",
    "app-1.0/bin/run.sh",
    "app-1.0/conf/app.properties",
    "app-1.0/lib/core-1.0.jar",
];

fn zip_names(path: &Path) -> BTreeSet<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

fn tar_gz_files(path: &Path) -> BTreeSet<String> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.header().entry_type().is_file())
        .map(|e| e.path().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_writes_every_format_with_manifest() {
    let mut ws = Workspace::new();
    let descriptor = distribution(&mut ws);
    let config = ws.config();
    let (archiver, _) = archiver();

    let written = archiver
        .create_archives(
            &descriptor,
            &config,
            &[ArchiveFormat::Zip, ArchiveFormat::TarGz, ArchiveFormat::Dir],
        )
        .unwrap();
    assert_eq!(written.len(), 3);

    let target = ws.root().join("target");
    let zip_path = target.join("app-1.0-bin.zip");
    let tgz_path = target.join("app-1.0-bin.tar.gz");
    let dir_path = target.join("app-1.0-bin");

    let expected: BTreeSet<String> = EXPECTED_FILES.iter().map(|s| s.to_string()).collect();
    let zip_files: BTreeSet<String> = zip_names(&zip_path)
        .into_iter()
        .filter(|n| !n.ends_with('/'))
        .collect();
    assert_eq!(zip_files, expected);
    assert!(zip_names(&zip_path).contains("app-1.0/conf/"));
    assert_eq!(tar_gz_files(&tgz_path), expected);

    assert_eq!(
        fs::read_to_string(dir_path.join("app-1.0/conf/app.properties")).unwrap(),
        "version=1.0\n"
    );
    assert_eq!(
        fs::read_to_string(dir_path.join("app-1.0/NOTICE")).unwrap(),
        "notice\n"
    );

    let manifest =
        AssemblyManifest::from_file(&target.join("app-1.0-bin.zip.manifest.json")).unwrap();
    assert_eq!(manifest.assembly_id, "bin");
    assert_eq!(manifest.format, "zip");
    assert_eq!(manifest.archive_sha256, written[0].sha256);
    let manifest_files: BTreeSet<String> =
        manifest.file_paths().into_iter().map(str::to_string).collect();
    assert_eq!(manifest_files, expected);

    let run = manifest
        .entries
        .iter()
        .find(|e| e.path == "app-1.0/bin/run.sh")
        .unwrap();
    assert_eq!(run.mode, "0755");
    assert_eq!(run.entry_type, EntryType::File);

    assert!(!ws
        .root()
        .join("target/assembly-tmp/app-1.0-bin-work")
        .exists());
}

#[test]
fn test_archives_are_reproducible() {
    let mut ws = Workspace::new();
    let descriptor = distribution(&mut ws);
    let config = ws.config();
    let (archiver, _) = archiver();
    let formats = [ArchiveFormat::Zip, ArchiveFormat::TarGz];

    let first: Vec<String> = archiver
        .create_archives(&descriptor, &config, &formats)
        .unwrap()
        .into_iter()
        .map(|w| w.sha256)
        .collect();
    let second: Vec<String> = archiver
        .create_archives(&descriptor, &config, &formats)
        .unwrap()
        .into_iter()
        .map(|w| w.sha256)
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_unpacked_dependency_contents() {
    let mut ws = Workspace::new();
    ws.write("staging/META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n");
    ws.write("staging/org/example/Core.class", "class");

    let jar_path = ws.root().join("lib-cache/core-1.0.jar");
    fs::create_dir_all(jar_path.parent().unwrap()).unwrap();
    {
        let mut writer = zip::ZipWriter::new(File::create(&jar_path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for name in ["META-INF/MANIFEST.MF", "org/example/Core.class"] {
            writer.start_file(name, options).unwrap();
            std::io::Write::write_all(
                &mut writer,
                &fs::read(ws.root().join("staging").join(name)).unwrap(),
            )
            .unwrap();
        }
        writer.finish().unwrap();
    }
    let core = assembly_archiver::model::Artifact::new("org", "core", "1.0").with_file(&jar_path);
    ws.project_mut().dependencies = vec![core];

    let descriptor = AssemblyDescriptor {
        id: "classes".to_string(),
        dependency_sets: vec![DependencySet {
            unpack: true,
            unpack_options: Some(assembly_archiver::model::UnpackOptions {
                includes: Vec::new(),
                excludes: vec!["META-INF/**".to_string()],
            }),
            ..DependencySet::default()
        }],
        ..AssemblyDescriptor::default()
    };

    let (archiver, _) = archiver();
    let written = archiver
        .create_archives(&descriptor, &ws.config(), &[ArchiveFormat::Dir])
        .unwrap();
    assert_eq!(
        written[0].manifest.file_paths(),
        vec!["org/example/Core.class"]
    );
}
