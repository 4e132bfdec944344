//! Artifact coordinates and dependency scopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ModelError;

/// Build-time applicability of a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Provided,
    Runtime,
    Test,
    System,
    Import,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
            Scope::Import => "import",
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Compile
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compile" => Ok(Scope::Compile),
            "provided" => Ok(Scope::Provided),
            "runtime" => Ok(Scope::Runtime),
            "test" => Ok(Scope::Test),
            "system" => Ok(Scope::System),
            "import" => Ok(Scope::Import),
            other => Err(ModelError::Validation(format!("unknown scope: {}", other))),
        }
    }
}

fn default_type() -> String {
    "jar".to_string()
}

/// A resolved (or resolvable) artifact.
///
/// Identity for de-duplication is the conflict id, which ignores the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,

    #[serde(default = "default_type", rename = "type")]
    pub artifact_type: String,

    #[serde(default)]
    pub scope: Scope,

    /// Local file backing this artifact; `None` until resolution has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Ids from the root project down to this artifact (inclusive).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_trail: Vec<String>,
}

impl Artifact {
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier: None,
            artifact_type: default_type(),
            scope: Scope::default(),
            file: None,
            dependency_trail: Vec::new(),
        }
    }

    pub fn with_type(mut self, artifact_type: &str) -> Self {
        self.artifact_type = artifact_type.to_string();
        self
    }

    pub fn with_classifier(mut self, classifier: &str) -> Self {
        self.classifier = Some(classifier.to_string());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_trail(mut self, trail: Vec<String>) -> Self {
        self.dependency_trail = trail;
        self
    }

    /// `groupId:artifactId:type[:classifier]:version`
    pub fn id(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}:{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.artifact_type, c, self.version
            ),
            None => format!(
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.artifact_type, self.version
            ),
        }
    }

    /// `groupId:artifactId:type[:classifier]`, version ignored.
    pub fn conflict_id(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.artifact_type, c
            ),
            None => format!("{}:{}:{}", self.group_id, self.artifact_id, self.artifact_type),
        }
    }

    /// `groupId:artifactId`
    pub fn versionless_key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// File extension implied by the artifact type.
    pub fn extension(&self) -> &str {
        match self.artifact_type.as_str() {
            "test-jar" | "maven-plugin" | "ejb" | "ejb-client" | "bundle" | "java-source"
            | "javadoc" => "jar",
            other => other,
        }
    }

    /// Whether the version is a snapshot.
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with("-SNAPSHOT")
    }

    /// File name in repository layout: `artifactId-version[-classifier].ext`
    pub fn repository_file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.artifact_id, self.version, c, self.extension()),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension()),
        }
    }

    /// Relative path in a Maven repository layout.
    pub fn repository_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for part in self.group_id.split('.') {
            path.push(part);
        }
        path.push(&self.artifact_id);
        path.push(&self.version);
        path.push(self.repository_file_name());
        path
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())?;
        write!(f, ":{}", self.scope)
    }
}
