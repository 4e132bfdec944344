//! Octal permission strings.

use crate::error::AssemblyError;

pub const DEFAULT_FILE_MODE: u32 = 0o644;
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;

/// Parse an octal mode such as `"0755"` or `"644"`.
///
/// `None` and blank strings mean "not configured".
pub fn parse_mode(mode: Option<&str>) -> Result<Option<u32>, AssemblyError> {
    let Some(text) = mode.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(None);
    };

    let value = u32::from_str_radix(text, 8).map_err(|e| {
        AssemblyError::formatting_caused_by(format!("Failed to parse mode '{}'", text), e)
    })?;

    if value > 0o7777 {
        return Err(AssemblyError::formatting(format!(
            "Mode '{}' is out of range",
            text
        )));
    }

    Ok(Some(value))
}

/// Render a mode the way it is written in descriptors.
pub fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode)
}
