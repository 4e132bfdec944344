//! Assembly phases
//!
//! Each phase turns one kind of descriptor section into add-operations on
//! the shared archiver. Phases are registered explicitly and run in the
//! order given by [`compare_phases`].

mod dependency_sets;
mod file_items;
mod file_sets;
mod module_sets;
mod repositories;

pub use dependency_sets::DependencySetPhase;
pub use file_items::FileItemPhase;
pub use file_sets::FileSetPhase;
pub use module_sets::ModuleSetPhase;
pub use repositories::RepositoryPhase;

use std::cmp::Ordering;

use assembly_model::AssemblyDescriptor;

use crate::archive::Archiver;
use crate::config::AssemblyConfig;
use crate::diagnostics::SharedDiagnostics;
use crate::error::AssemblyResult;
use crate::resolve::Collaborators;

/// One step of the assembly.
pub trait AssemblyPhase {
    /// Stable name, used for ordering ties and logging.
    fn name(&self) -> &str;

    /// Explicit priority; ordered phases run before unordered ones.
    fn order(&self) -> Option<i32> {
        None
    }

    fn execute(
        &self,
        descriptor: &AssemblyDescriptor,
        archiver: &mut dyn Archiver,
        config: &AssemblyConfig,
    ) -> AssemblyResult<()>;
}

/// Total order over phases.
///
/// Ordered phases come first by ascending priority; everything else falls
/// back to the phase name.
pub fn compare_phases(a: &dyn AssemblyPhase, b: &dyn AssemblyPhase) -> Ordering {
    match (a.order(), b.order()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name().cmp(b.name())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name().cmp(b.name()),
    }
}

/// Sort phases into execution order.
pub fn order_phases(mut phases: Vec<Box<dyn AssemblyPhase>>) -> Vec<Box<dyn AssemblyPhase>> {
    phases.sort_by(|a, b| compare_phases(a.as_ref(), b.as_ref()));
    phases
}

/// Explicit list of phase instances.
#[derive(Default)]
pub struct PhaseRegistry {
    phases: Vec<Box<dyn AssemblyPhase>>,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in phases.
    pub fn standard(collaborators: Collaborators, diagnostics: SharedDiagnostics) -> Self {
        let mut registry = Self::new();
        registry.register(FileSetPhase::new(diagnostics.clone()));
        registry.register(FileItemPhase::new(diagnostics.clone()));
        registry.register(DependencySetPhase::new(
            collaborators.clone(),
            diagnostics.clone(),
        ));
        registry.register(ModuleSetPhase::new(collaborators.clone(), diagnostics.clone()));
        registry.register(RepositoryPhase::new(collaborators, diagnostics));
        registry
    }

    pub fn register(&mut self, phase: impl AssemblyPhase + 'static) {
        self.phases.push(Box::new(phase));
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Phases in execution order.
    pub fn ordered(&self) -> Vec<&dyn AssemblyPhase> {
        let mut phases: Vec<&dyn AssemblyPhase> = self.phases.iter().map(|p| p.as_ref()).collect();
        phases.sort_by(|a, b| compare_phases(*a, *b));
        phases
    }

    pub fn names(&self) -> Vec<String> {
        self.ordered().iter().map(|p| p.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;

    struct Named(&'static str, Option<i32>);

    impl AssemblyPhase for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn order(&self) -> Option<i32> {
            self.1
        }

        fn execute(
            &self,
            _: &AssemblyDescriptor,
            _: &mut dyn Archiver,
            _: &AssemblyConfig,
        ) -> AssemblyResult<()> {
            Ok(())
        }
    }

    fn names(phases: &[Box<dyn AssemblyPhase>]) -> Vec<&str> {
        phases.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_ordered_before_unordered() {
        let phases: Vec<Box<dyn AssemblyPhase>> = vec![
            Box::new(Named("zeta", None)),
            Box::new(Named("late", Some(50))),
            Box::new(Named("alpha", None)),
            Box::new(Named("early", Some(-5))),
            Box::new(Named("same-b", Some(10))),
            Box::new(Named("same-a", Some(10))),
        ];
        let ordered = order_phases(phases);
        assert_eq!(
            names(&ordered),
            vec!["early", "same-a", "same-b", "late", "alpha", "zeta"]
        );
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let build = || -> Vec<Box<dyn AssemblyPhase>> {
            vec![
                Box::new(Named("c", None)),
                Box::new(Named("b", Some(1))),
                Box::new(Named("a", None)),
            ]
        };
        let mut reversed = build();
        reversed.reverse();
        assert_eq!(names(&order_phases(build())), names(&order_phases(reversed)));
    }

    #[test]
    fn test_standard_registry_order() {
        let diagnostics: SharedDiagnostics = CollectingDiagnostics::new();
        let registry =
            PhaseRegistry::standard(Collaborators::local(None, diagnostics.clone()), diagnostics);
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.names(),
            vec![
                "file-sets",
                "file-items",
                "dependency-sets",
                "module-sets",
                "repositories"
            ]
        );
    }
}
