//! Content filtering and line-ending conversion for copied files.

use regex_lite::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::AssemblyConfig;
use crate::error::AssemblyError;

use super::content_interpolator;

/// Subdirectory of the temporary root holding formatted copies.
pub const FILTERED_DIR: &str = "filtered";

/// Target line ending style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Keep,
    Unix,
    Dos,
}

impl LineEnding {
    /// Parse a descriptor value; `None` means keep.
    pub fn parse(value: Option<&str>) -> Result<Self, AssemblyError> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(LineEnding::Keep);
        };
        match value.to_ascii_lowercase().as_str() {
            "keep" => Ok(LineEnding::Keep),
            "unix" | "lf" => Ok(LineEnding::Unix),
            "dos" | "windows" | "crlf" => Ok(LineEnding::Dos),
            other => Err(AssemblyError::formatting(format!(
                "Unsupported line ending '{}' (expected keep, unix, lf, dos, windows or crlf)",
                other
            ))),
        }
    }

    fn as_bytes(&self) -> Option<&'static [u8]> {
        match self {
            LineEnding::Keep => None,
            LineEnding::Unix => Some(b"\n"),
            LineEnding::Dos => Some(b"\r\n"),
        }
    }
}

/// Rewrite every `\r\n`, `\r` or `\n` as `ending`.
fn convert_line_endings(content: &[u8], ending: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + content.len() / 16);
    let mut i = 0;
    while i < content.len() {
        match content[i] {
            b'\r' => {
                out.extend_from_slice(ending);
                if content.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => out.extend_from_slice(ending),
            byte => out.push(byte),
        }
        i += 1;
    }
    out
}

/// Produces filtered copies of files under the temporary root.
///
/// Copies keep their original file name inside a numbered directory, so
/// callers always name the archive entry after the source file.
pub struct FileFormatter<'a> {
    config: &'a AssemblyConfig,
    work_dir: PathBuf,
    counter: usize,
    at_token: Regex,
}

impl<'a> FileFormatter<'a> {
    /// `scope` separates the copies of different phases.
    pub fn new(config: &'a AssemblyConfig, scope: &str) -> Result<Self, AssemblyError> {
        let at_token = Regex::new(r"@([A-Za-z0-9_.\-]+)@").map_err(|e| {
            AssemblyError::formatting_caused_by("Failed to compile token pattern", e)
        })?;
        Ok(Self {
            config,
            work_dir: config
                .temporary_root_directory
                .join(FILTERED_DIR)
                .join(scope),
            counter: 0,
            at_token,
        })
    }

    /// Return a path whose content is `source` filtered and converted.
    ///
    /// When nothing needs to change, `source` itself is returned.
    pub fn format(
        &mut self,
        source: &Path,
        filtered: bool,
        line_ending: Option<&str>,
    ) -> Result<PathBuf, AssemblyError> {
        let ending = LineEnding::parse(line_ending)?;
        if !filtered && ending == LineEnding::Keep {
            return Ok(source.to_path_buf());
        }

        let raw = fs::read(source).map_err(|e| AssemblyError::io_at("read", source, e))?;

        let mut content = if filtered {
            self.filter_content(source, raw)?
        } else {
            raw
        };
        if let Some(bytes) = ending.as_bytes() {
            content = convert_line_endings(&content, bytes);
        }

        self.counter += 1;
        let dir = self.work_dir.join(format!("{:04}", self.counter));
        fs::create_dir_all(&dir).map_err(|e| AssemblyError::io_at("create", &dir, e))?;

        let name = source.file_name().ok_or_else(|| {
            AssemblyError::formatting(format!("Cannot format {}: no file name", source.display()))
        })?;
        let target = dir.join(name);
        fs::write(&target, content).map_err(|e| AssemblyError::io_at("write", &target, e))?;
        Ok(target)
    }

    fn filter_content(&self, source: &Path, raw: Vec<u8>) -> Result<Vec<u8>, AssemblyError> {
        let text = String::from_utf8(raw).map_err(|e| {
            AssemblyError::formatting_caused_by(
                format!("Failed to filter {}: content is not UTF-8", source.display()),
                e,
            )
        })?;

        let interp = content_interpolator(self.config);
        let text = interp.interpolate(&text).map_err(|e| {
            AssemblyError::formatting_caused_by(format!("Failed to filter {}", source.display()), e)
        })?;

        let mut failure = None;
        let text = self.at_token.replace_all(&text, |caps: &regex_lite::Captures<'_>| {
            match interp.resolve(&caps[1]) {
                Ok(Some(value)) => value,
                Ok(None) => caps[0].to_string(),
                Err(e) => {
                    failure.get_or_insert(e);
                    caps[0].to_string()
                }
            }
        });
        if let Some(e) = failure {
            return Err(AssemblyError::formatting_caused_by(
                format!("Failed to filter {}", source.display()),
                e,
            ));
        }

        Ok(text.into_owned().into_bytes())
    }

    /// Directory holding this formatter's copies.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}
