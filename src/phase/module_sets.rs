//! Module sets: sources and binaries of reactor modules.

use std::cell::Cell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use assembly_filter::filter_projects;
use assembly_model::{
    Artifact, AssemblyDescriptor, ModuleBinaries, ModuleSet, ModuleSources, Project,
};

use super::AssemblyPhase;
use crate::archive::Archiver;
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::{AssemblyError, AssemblyResult};
use crate::format::{evaluate_file_name_mapping, parse_mode, ExpressionContext, FileFormatter};
use crate::resolve::Collaborators;
use crate::task::{AddArtifactTask, AddDependencySetsTask, AddFileSetsTask};

const COMPONENT: &str = "module-sets";

const VERSION_CONFLICT_WARNING: &str = "Inclusion of module dependencies may produce \
    unpredictable results if a version conflict occurs: each dependency is added once, \
    for the first module that pulls it in";

/// Adds module sources and module binaries.
///
/// Module dependencies are de-duplicated by conflict id across every module
/// set of one execution, first module wins. Two modules needing different
/// versions of the same artifact therefore get only the first version.
pub struct ModuleSetPhase {
    collaborators: Collaborators,
    diagnostics: SharedDiagnostics,
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Modules declared by `project`, looked up in the reactor by basedir.
fn collect_modules(
    project: &Project,
    reactor: &[Project],
    recurse: bool,
    found: &mut Vec<Project>,
) {
    for dir in project.module_directories() {
        let Some(module) = reactor.iter().find(|p| same_directory(&p.basedir, &dir)) else {
            continue;
        };
        if found.iter().any(|p| p.id() == module.id()) {
            continue;
        }
        found.push(module.clone());
        if recurse {
            collect_modules(module, reactor, recurse, found);
        }
    }
}

impl ModuleSetPhase {
    pub fn new(collaborators: Collaborators, diagnostics: SharedDiagnostics) -> Self {
        Self {
            collaborators,
            diagnostics,
        }
    }

    /// Reactor modules selected by `set`, filtered by its patterns.
    pub fn select_modules(
        &self,
        set: &ModuleSet,
        config: &AssemblyConfig,
    ) -> AssemblyResult<Vec<Project>> {
        let candidates = if set.use_all_reactor_projects && !set.include_sub_modules {
            config.reactor_projects.clone()
        } else {
            let root = if set.use_all_reactor_projects {
                config.reactor_projects.first().unwrap_or(&config.project)
            } else {
                &config.project
            };
            let mut found = Vec::new();
            collect_modules(root, &config.reactor_projects, set.include_sub_modules, &mut found);
            found
        };

        let outcome = filter_projects(&candidates, &set.includes, &set.excludes, true)?;
        if !outcome.unmatched_includes.is_empty() {
            self.diagnostics.warn(
                COMPONENT,
                &format!(
                    "The following module include patterns were never triggered: {}",
                    outcome.unmatched_includes.join(", ")
                ),
            );
        }
        Ok(outcome.kept)
    }

    fn add_sources(
        &self,
        sources: &ModuleSources,
        modules: &[Project],
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
        formatter: &mut FileFormatter<'_>,
    ) -> AssemblyResult<()> {
        let file_sets = sources.effective_file_sets();

        for module in modules {
            let module_artifact = module.artifact();
            let mut task = AddFileSetsTask::new(&file_sets, &self.diagnostics).with_module(module);

            if sources.include_module_directory {
                let context = ExpressionContext::for_module(module, Some(&module_artifact));
                let prefix =
                    evaluate_file_name_mapping(&sources.output_directory_mapping, &context, config)?;
                task = task.with_output_prefix(prefix);
            }
            if sources.exclude_sub_module_directories {
                let sub_modules: Vec<PathBuf> = module.module_directories();
                task = task.excluding_directories(&sub_modules);
            }

            task.execute(archiver, config, formatter)?;
        }
        Ok(())
    }

    fn module_artifact(&self, binaries: &ModuleBinaries, module: &Project) -> AssemblyResult<Artifact> {
        let artifact = match &binaries.attachment_classifier {
            Some(classifier) => module
                .attachments()
                .into_iter()
                .find(|a| a.classifier.as_deref() == Some(classifier.as_str()))
                .ok_or_else(|| {
                    AssemblyError::configuration(format!(
                        "Cannot find attachment with classifier: {} in module project: {}. \
                         Please exclude this module from the module-set.",
                        classifier,
                        module.id()
                    ))
                })?,
            None => module.artifact(),
        };

        if artifact.file.is_none() {
            return Err(AssemblyError::configuration(format!(
                "Artifact: {} (included by module) does not have an artifact with a file. \
                 Please ensure the package phase is run before the assembly is generated.",
                artifact.id()
            )));
        }
        Ok(artifact)
    }

    fn add_binaries(
        &self,
        binaries: &ModuleBinaries,
        modules: &[Project],
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
        visited: &mut HashSet<String>,
        warned: &Cell<bool>,
    ) -> AssemblyResult<()> {
        let file_mode = parse_mode(binaries.file_mode.as_deref())?;
        let directory_mode = parse_mode(binaries.directory_mode.as_deref())?;
        let dependency_sets = binaries.effective_dependency_sets();

        if binaries.include_dependencies && !warned.replace(true) {
            self.diagnostics.warn(COMPONENT, VERSION_CONFLICT_WARNING);
        }

        // Every module artifact goes in before any module dependency, so a
        // dependency copy of a sibling module never claims its target first.
        let mut added = Vec::with_capacity(modules.len());
        for module in modules {
            if module.packaging == "pom" && binaries.attachment_classifier.is_none() {
                self.diagnostics.debug(
                    COMPONENT,
                    &format!("Skipping binaries of {}: pom packaging", module.id()),
                );
                continue;
            }

            let artifact = self.module_artifact(binaries, module)?;
            let context = ExpressionContext::for_module(module, Some(&artifact))
                .with_artifact(&artifact, Some(module));
            AddArtifactTask::new(&artifact, context, &binaries.output_file_name_mapping)
                .output_directory(binaries.output_directory.as_deref())
                .modes(file_mode, directory_mode)
                .unpack(binaries.unpack, binaries.unpack_options.as_ref())
                .execute(archiver, config)?;
            added.push((module, artifact));
        }

        if !binaries.include_dependencies || dependency_sets.is_empty() {
            return Ok(());
        }
        for (module, artifact) in &added {
            AddDependencySetsTask::new(
                &dependency_sets,
                module,
                &self.collaborators,
                &self.diagnostics,
            )
            .with_module(module, artifact)
            .with_visited(visited)
            .execute(archiver, config)?;
        }
        Ok(())
    }
}

impl AssemblyPhase for ModuleSetPhase {
    fn name(&self) -> &str {
        "module-sets"
    }

    fn order(&self) -> Option<i32> {
        Some(40)
    }

    fn execute(
        &self,
        descriptor: &AssemblyDescriptor,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
    ) -> AssemblyResult<()> {
        if descriptor.module_sets.is_empty() {
            return Ok(());
        }

        let mut formatter = FileFormatter::new(config, self.name())?;
        let mut visited = HashSet::new();
        let warned = Cell::new(false);

        for set in &descriptor.module_sets {
            if set.sources.is_none() && set.binaries.is_none() {
                self.diagnostics.warn(
                    COMPONENT,
                    "Encountered a module set with neither sources nor binaries; skipping",
                );
                continue;
            }

            let modules = self.select_modules(set, config)?;
            if modules.is_empty() {
                self.diagnostics.warn(
                    COMPONENT,
                    "The module set did not select any reactor projects; skipping",
                );
                continue;
            }

            if let Some(sources) = &set.sources {
                self.add_sources(sources, &modules, archiver, config, &mut formatter)?;
            }
            if let Some(binaries) = &set.binaries {
                self.add_binaries(binaries, &modules, archiver, config, &mut visited, &warned)?;
            }
        }
        Ok(())
    }
}
