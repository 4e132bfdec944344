//! Effective configuration with provenance
//!
//! Records the merged configuration plus where each layer came from, and
//! turns the merged value into typed [`Settings`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::defaults::{BuiltinDefaults, KNOWN_FORMATS};
use super::merge::merge_layers;

/// Schema version for effective_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "assembly-archiver/effective_config@1";

/// Project-level config file name, looked up in the basedir.
pub const PROJECT_CONFIG_FILE: &str = ".assembly.toml";

/// `<config_dir>/assembly/config.toml`, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("assembly").join("config.toml"))
}

/// `.assembly.toml` inside the project basedir.
pub fn project_config_path(basedir: &Path) -> PathBuf {
    basedir.join(PROJECT_CONFIG_FILE)
}

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Typed view of the merged configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Formats to write; empty defers to the descriptor.
    #[serde(default)]
    pub formats: Vec<String>,

    pub fallback_format: String,
    pub output_directory: PathBuf,
    pub temporary_directory: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_repository: Option<PathBuf>,

    #[serde(default)]
    pub remote_repositories: Vec<String>,

    pub append_assembly_id: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_name: Option<String>,

    /// User properties, highest precedence during interpolation.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Settings {
    /// Formats to write for a descriptor that declares `declared`.
    pub fn formats_for(&self, declared: &[String]) -> Vec<String> {
        if !self.formats.is_empty() {
            self.formats.clone()
        } else if !declared.is_empty() {
            declared.to_vec()
        } else {
            vec![self.fallback_format.clone()]
        }
    }

    /// Local repository, falling back to `~/.m2/repository`.
    pub fn local_repository_or_default(&self) -> Option<PathBuf> {
        self.local_repository
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".m2").join("repository")))
    }
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build effective config from layers. Missing files are skipped.
    pub fn build(
        user_config_path: Option<&Path>,
        project_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [
            (ConfigOrigin::User, user_config_path),
            (ConfigOrigin::Project, project_config_path),
        ] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        Self::validate_config(&merged)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let digest = hex::encode(Sha256::digest(&bytes));

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("{}: invalid UTF-8: {}", path.display(), e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        if let Some(formats) = config.get("formats").and_then(|v| v.as_array()) {
            for format in formats {
                let name = format.as_str().unwrap_or_default();
                if !KNOWN_FORMATS.contains(&name) {
                    return Err(ConfigError::ValidationError(format!(
                        "unknown archive format '{}' (expected one of: {})",
                        format,
                        KNOWN_FORMATS.join(", ")
                    )));
                }
            }
        }

        for key in ["output_directory", "temporary_directory"] {
            let empty = config
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().is_empty())
                .unwrap_or(true);
            if empty {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a non-empty path",
                    key
                )));
            }
        }

        if let Some(props) = config.get("properties").and_then(|v| v.as_object()) {
            if let Some((key, _)) = props.iter().find(|(_, v)| !v.is_string()) {
                return Err(ConfigError::ValidationError(format!(
                    "properties.{} must be a string",
                    key
                )));
            }
        }

        Ok(())
    }

    /// Typed settings from the merged value.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ValidationError(format!("invalid settings: {}", e)))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Get a config value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_with_defaults_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();

        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.get_str("output_directory"), Some("target"));
        assert_eq!(config.get_bool("append_assembly_id"), Some(true));

        let settings = config.settings().unwrap();
        assert!(settings.formats.is_empty());
        assert!(settings.final_name.is_none());
        assert_eq!(settings.formats_for(&[]), vec!["zip".to_string()]);
    }

    #[test]
    fn test_cli_override() {
        let cli = serde_json::json!({
            "formats": ["dir"],
            "properties": {"release": "7"}
        });
        let settings = EffectiveConfig::build(None, None, Some(cli))
            .unwrap()
            .settings()
            .unwrap();

        assert_eq!(settings.formats_for(&["zip".to_string()]), vec!["dir".to_string()]);
        assert_eq!(settings.properties["release"], "7");
    }

    #[test]
    fn test_descriptor_formats_used_without_override() {
        let settings = EffectiveConfig::build(None, None, None)
            .unwrap()
            .settings()
            .unwrap();
        let declared = vec!["tar.gz".to_string(), "zip".to_string()];
        assert_eq!(settings.formats_for(&declared), declared);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let cli = serde_json::json!({"formats": ["rar"]});
        let err = EffectiveConfig::build(None, None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("rar"));
    }

    #[test]
    fn test_empty_output_directory_rejected() {
        let cli = serde_json::json!({"output_directory": " "});
        let err = EffectiveConfig::build(None, None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("output_directory"));
    }

    #[test]
    fn test_non_string_property_rejected() {
        let cli = serde_json::json!({"properties": {"n": 1}});
        assert!(EffectiveConfig::build(None, None, Some(cli)).is_err());
    }

    #[test]
    fn test_layers_and_sources() {
        let mut user = NamedTempFile::new().unwrap();
        writeln!(user, "output_directory = \"out\"").unwrap();
        writeln!(user, "[properties]").unwrap();
        writeln!(user, "vendor = \"acme\"").unwrap();

        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "local_repository = \"/repo\"").unwrap();
        writeln!(project, "[properties]").unwrap();
        writeln!(project, "vendor = \"example\"").unwrap();

        let config = EffectiveConfig::build(Some(user.path()), Some(project.path()), None).unwrap();

        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[1].origin, ConfigOrigin::User);
        assert_eq!(config.sources[2].origin, ConfigOrigin::Project);
        assert_eq!(config.sources[2].digest.as_ref().unwrap().len(), 64);

        let settings = config.settings().unwrap();
        assert_eq!(settings.output_directory, PathBuf::from("out"));
        assert_eq!(settings.local_repository, Some(PathBuf::from("/repo")));
        assert_eq!(settings.properties["vendor"], "example");
    }

    #[test]
    fn test_missing_files_skipped() {
        let config = EffectiveConfig::build(
            Some(Path::new("/nonexistent/assembly/config.toml")),
            None,
            None,
        )
        .unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "output_directory = ").unwrap();
        let err = EffectiveConfig::build(Some(file.path()), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_project_config_path() {
        assert_eq!(
            project_config_path(Path::new("/work/app")),
            PathBuf::from("/work/app/.assembly.toml")
        );
    }
}
