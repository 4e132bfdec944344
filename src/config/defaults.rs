//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Archive formats the writer understands.
pub const KNOWN_FORMATS: &[&str] = &["dir", "tar", "tar.gz", "tgz", "zip", "jar"];

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Where finished archives are written, relative to the basedir
    pub output_directory: String,

    /// Scratch space for repositories and filtered files
    pub temporary_directory: String,

    /// Append `-<id>` to the distribution name (default: true)
    pub append_assembly_id: bool,

    /// Format used when neither CLI nor descriptor names one
    pub fallback_format: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            output_directory: "target".to_string(),
            temporary_directory: "target/assembly-tmp".to_string(),
            append_assembly_id: true,
            fallback_format: "zip".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "output_directory": self.output_directory,
            "temporary_directory": self.temporary_directory,
            "append_assembly_id": self.append_assembly_id,
            "fallback_format": self.fallback_format,
            "formats": [],
            "remote_repositories": [],
            "properties": {}
        })
    }
}
