//! Assembly error taxonomy
//!
//! Every failure surfaces as one of three kinds. All of them are fatal to
//! the assembly in progress; nothing is retried.

use std::error::Error as StdError;
use std::io;
use std::path::Path;

use assembly_filter::FilterError;
use assembly_model::ModelError;

use crate::archive::ArchiveError;
use crate::config::ConfigError;
use crate::resolve::ResolveError;

type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Formatting,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Formatting => "formatting",
            ErrorKind::Io => "io",
        }
    }
}

/// Errors raised while assembling an archive
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// Unresolved artifact file, unbuildable module project, failed
    /// repository assembly, invalid descriptor.
    #[error("{message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Bad mode string, filtering or interpolation failure.
    #[error("{message}")]
    Formatting {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },
}

impl AssemblyError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AssemblyError::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn configuration_caused_by(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        AssemblyError::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn formatting(message: impl Into<String>) -> Self {
        AssemblyError::Formatting {
            message: message.into(),
            source: None,
        }
    }

    pub fn formatting_caused_by(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        AssemblyError::Formatting {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        AssemblyError::Io {
            message: message.into(),
            source,
        }
    }

    /// I/O failure on a specific path.
    pub fn io_at(action: &str, path: &Path, source: io::Error) -> Self {
        Self::io(format!("failed to {} {}", action, path.display()), source)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AssemblyError::Configuration { .. } => ErrorKind::Configuration,
            AssemblyError::Formatting { .. } => ErrorKind::Formatting,
            AssemblyError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Formatting => 3,
            ErrorKind::Io => 4,
        }
    }

    /// The message without the cause chain.
    pub fn message(&self) -> &str {
        match self {
            AssemblyError::Configuration { message, .. }
            | AssemblyError::Formatting { message, .. }
            | AssemblyError::Io { message, .. } => message,
        }
    }
}

impl From<ModelError> for AssemblyError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Io { path, source } => AssemblyError::io_at("read", &path, source),
            other => AssemblyError::configuration_caused_by(other.to_string(), other),
        }
    }
}

impl From<FilterError> for AssemblyError {
    fn from(err: FilterError) -> Self {
        AssemblyError::configuration_caused_by(err.to_string(), err)
    }
}

impl From<ConfigError> for AssemblyError {
    fn from(err: ConfigError) -> Self {
        AssemblyError::configuration_caused_by(err.to_string(), err)
    }
}

impl From<ArchiveError> for AssemblyError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io { context, source } => AssemblyError::io(context, source),
            other => AssemblyError::configuration_caused_by(other.to_string(), other),
        }
    }
}

impl From<ResolveError> for AssemblyError {
    fn from(err: ResolveError) -> Self {
        AssemblyError::configuration_caused_by(err.to_string(), err)
    }
}

/// Result type for assembly operations
pub type AssemblyResult<T> = Result<T, AssemblyError>;
