//! Reusable add-tasks shared by the phases.

mod add_artifact;
mod dependency_sets;
mod file_sets;

pub use add_artifact::AddArtifactTask;
pub use dependency_sets::AddDependencySetsTask;
pub use file_sets::AddFileSetsTask;
