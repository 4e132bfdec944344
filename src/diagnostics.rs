//! Diagnostic sinks handed to phases and tasks at construction.

use std::sync::{Arc, Mutex};

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
}

/// Receives messages emitted while assembling.
pub trait Diagnostics: Send + Sync {
    fn emit(&self, severity: Severity, component: &str, message: &str);

    fn debug(&self, component: &str, message: &str) {
        self.emit(Severity::Debug, component, message);
    }

    fn info(&self, component: &str, message: &str) {
        self.emit(Severity::Info, component, message);
    }

    fn warn(&self, component: &str, message: &str) {
        self.emit(Severity::Warn, component, message);
    }
}

/// Shared handle to a diagnostics sink
pub type SharedDiagnostics = Arc<dyn Diagnostics>;

/// Forwards to `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl TracingDiagnostics {
    pub fn shared() -> SharedDiagnostics {
        Arc::new(TracingDiagnostics)
    }
}

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, severity: Severity, component: &str, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(component, "{}", message),
            Severity::Info => tracing::info!(component, "{}", message),
            Severity::Warn => tracing::warn!(component, "{}", message),
        }
    }
}

/// A recorded diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub severity: Severity,
    pub component: String,
    pub message: String,
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    records: Mutex<Vec<Record>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Messages at exactly the given severity.
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.severity == severity)
            .map(|r| r.message)
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages(Severity::Warn)
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn emit(&self, severity: Severity, component: &str, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(Record {
                severity,
                component: component.to_string(),
                message: message.to_string(),
            });
        }
    }
}
