//! Coordinate patterns such as `org.example:*` or `*:core:jar`.

use globset::{Glob, GlobMatcher};

use crate::FilterError;

/// A compiled `groupId:artifactId[:type[:classifier[:version]]]` pattern.
///
/// Each `:`-separated token is a glob matched against the token at the same
/// position of an artifact id. Missing trailing tokens match anything.
#[derive(Debug, Clone)]
pub struct ArtifactPattern {
    raw: String,
    tokens: Vec<GlobMatcher>,
}

impl ArtifactPattern {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let raw = pattern.trim().to_string();
        if raw.is_empty() {
            return Err(FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "empty pattern".to_string(),
            });
        }

        let tokens = raw
            .split(':')
            .map(|token| {
                let token = if token.is_empty() { "*" } else { token };
                Glob::new(token)
                    .map(|g| g.compile_matcher())
                    .map_err(|e| FilterError::InvalidPattern {
                        pattern: raw.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { raw, tokens })
    }

    /// Compile a list of patterns, failing on the first invalid one.
    pub fn compile_all(patterns: &[String]) -> Result<Vec<Self>, FilterError> {
        patterns.iter().map(|p| Self::new(p)).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match against a `:`-separated id.
    pub fn matches_id(&self, id: &str) -> bool {
        let values: Vec<&str> = id.split(':').collect();
        if self.tokens.len() > values.len() {
            return false;
        }
        self.tokens
            .iter()
            .zip(values.iter())
            .all(|(matcher, value)| matcher.is_match(value))
    }

    /// Match against any of the given ids.
    pub fn matches_any<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        ids.into_iter().any(|id| self.matches_id(id))
    }
}
