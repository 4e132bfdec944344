//! Repository materialization in Maven layout.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assembly_filter::{filter_artifacts, ArtifactFilter, ScopeFilter};
use assembly_model::{Artifact, GroupVersionAlignment, Repository};

use super::{ArtifactResolver, DependencyResolver, RepositoryAssembler, ResolveError};
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;

const COMPONENT: &str = "repository-assembler";

/// Per-artifact metadata file written when `include_metadata` is set.
pub const METADATA_FILE: &str = "maven-metadata-local.xml";

/// Copies the project's filtered dependencies into a repository tree.
pub struct DefaultRepositoryAssembler {
    dependencies: Arc<dyn DependencyResolver>,
    artifacts: Arc<dyn ArtifactResolver>,
    diagnostics: SharedDiagnostics,
}

impl DefaultRepositoryAssembler {
    pub fn new(
        dependencies: Arc<dyn DependencyResolver>,
        artifacts: Arc<dyn ArtifactResolver>,
        diagnostics: SharedDiagnostics,
    ) -> Self {
        Self {
            dependencies,
            artifacts,
            diagnostics,
        }
    }

    /// Apply the first alignment whose group matches, unless excluded.
    fn align(
        &self,
        artifact: &Artifact,
        alignments: &[GroupVersionAlignment],
    ) -> Result<Artifact, ResolveError> {
        let Some(alignment) = alignments.iter().find(|a| a.id == artifact.group_id) else {
            return Ok(artifact.clone());
        };
        if alignment.excludes.contains(&artifact.artifact_id) || alignment.version == artifact.version
        {
            return Ok(artifact.clone());
        }

        let mut aligned = Artifact {
            version: alignment.version.clone(),
            file: None,
            ..artifact.clone()
        };
        aligned.file = Some(self.artifacts.resolve(&aligned)?);
        self.diagnostics.debug(
            COMPONENT,
            &format!("Aligned {} to version {}", artifact.id(), alignment.version),
        );
        Ok(aligned)
    }

    fn copy(source: &Path, target: &Path) -> Result<(), ResolveError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ResolveError::io(parent, e))?;
        }
        fs::copy(source, target).map_err(|e| ResolveError::io(source, e))?;
        Ok(())
    }

    fn write_checksum(target: &Path) -> Result<(), ResolveError> {
        let bytes = fs::read(target).map_err(|e| ResolveError::io(target, e))?;
        let checksum_path = PathBuf::from(format!("{}.sha256", target.display()));
        fs::write(&checksum_path, hex::encode(Sha256::digest(&bytes)))
            .map_err(|e| ResolveError::io(&checksum_path, e))
    }

    /// Copy the artifact's `.pom` when it sits next to the artifact file.
    fn copy_pom(source: &Path, artifact: &Artifact, target_dir: &Path) -> Result<(), ResolveError> {
        let pom_name = format!("{}-{}.pom", artifact.artifact_id, artifact.version);
        let pom = source.with_file_name(&pom_name);
        if pom.is_file() {
            let target = target_dir.join(&pom_name);
            Self::copy(&pom, &target)?;
            Self::write_checksum(&target)?;
        }
        Ok(())
    }

    fn write_metadata(
        repository_dir: &Path,
        group_id: &str,
        artifact_id: &str,
        versions: &BTreeSet<String>,
    ) -> Result<(), ResolveError> {
        let mut dir = repository_dir.to_path_buf();
        for part in group_id.split('.') {
            dir.push(part);
        }
        dir.push(artifact_id);

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");
        xml.push_str(&format!("  <groupId>{}</groupId>\n", escape_xml(group_id)));
        xml.push_str(&format!(
            "  <artifactId>{}</artifactId>\n",
            escape_xml(artifact_id)
        ));
        xml.push_str("  <versioning>\n    <versions>\n");
        for version in versions {
            xml.push_str(&format!("      <version>{}</version>\n", escape_xml(version)));
        }
        xml.push_str("    </versions>\n  </versioning>\n</metadata>\n");

        fs::create_dir_all(&dir).map_err(|e| ResolveError::io(&dir, e))?;
        let path = dir.join(METADATA_FILE);
        fs::write(&path, xml).map_err(|e| ResolveError::io(&path, e))
    }
}

impl RepositoryAssembler for DefaultRepositoryAssembler {
    fn assemble(
        &self,
        repository_dir: &Path,
        repository: &Repository,
        config: &AssemblyConfig,
    ) -> Result<(), ResolveError> {
        let candidates = self
            .dependencies
            .resolve_dependencies(&config.project, true, config)?;

        let scope_filter = repository.scope.map(ScopeFilter::new);
        let extra: Vec<&dyn ArtifactFilter> = scope_filter
            .as_ref()
            .map(|f| f as &dyn ArtifactFilter)
            .into_iter()
            .collect();
        let outcome = filter_artifacts(
            &candidates,
            &repository.includes,
            &repository.excludes,
            false,
            true,
            &extra,
        )?;
        for pattern in &outcome.unmatched_includes {
            self.diagnostics.warn(
                COMPONENT,
                &format!("Repository include pattern was never triggered: {}", pattern),
            );
        }

        let mut versions: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
        for artifact in &outcome.kept {
            let artifact = self.align(artifact, &repository.group_version_alignments)?;
            let source = artifact
                .file
                .clone()
                .ok_or_else(|| ResolveError::Unresolved(artifact.id()))?;

            let target = repository_dir.join(artifact.repository_path());
            Self::copy(&source, &target)?;
            Self::write_checksum(&target)?;
            if let Some(target_dir) = target.parent() {
                Self::copy_pom(&source, &artifact, target_dir)?;
            }

            versions
                .entry((artifact.group_id.clone(), artifact.artifact_id.clone()))
                .or_default()
                .insert(artifact.version.clone());
        }

        if repository.include_metadata {
            for ((group_id, artifact_id), versions) in &versions {
                Self::write_metadata(repository_dir, group_id, artifact_id, versions)?;
            }
        }

        self.diagnostics.debug(
            COMPONENT,
            &format!(
                "Assembled {} artifact(s) into {}",
                outcome.kept.len(),
                repository_dir.display()
            ),
        );
        Ok(())
    }
}

/// Escape text for an XML element body.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
