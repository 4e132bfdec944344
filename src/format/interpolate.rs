//! `${expression}` interpolation over an ordered list of value sources.
//!
//! The first source that knows an expression wins. Resolved values are
//! themselves interpolated; an expression that refers back to itself is an
//! error. Unknown expressions are left in place.

use std::collections::BTreeMap;

use assembly_model::{Artifact, Project};

/// Something that can answer an expression.
pub trait ValueSource {
    fn value(&self, expression: &str) -> Option<String>;
}

/// Plain key/value lookup.
pub struct MapSource<'a>(pub &'a BTreeMap<String, String>);

impl ValueSource for MapSource<'_> {
    fn value(&self, expression: &str) -> Option<String> {
        self.0.get(expression).cloned()
    }
}

/// Fixed key/value pairs owned by the source.
pub struct FixedSource(pub Vec<(String, String)>);

impl ValueSource for FixedSource {
    fn value(&self, expression: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(k, _)| k == expression)
            .map(|(_, v)| v.clone())
    }
}

/// Strips one of `prefixes` before asking the inner source.
pub struct Prefixed<S> {
    prefixes: Vec<String>,
    allow_unprefixed: bool,
    inner: S,
}

impl<S: ValueSource> Prefixed<S> {
    pub fn new(prefix: &str, inner: S) -> Self {
        Self {
            prefixes: vec![prefix.to_string()],
            allow_unprefixed: false,
            inner,
        }
    }

    pub fn any_of(prefixes: &[&str], allow_unprefixed: bool, inner: S) -> Self {
        Self {
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            allow_unprefixed,
            inner,
        }
    }
}

impl<S: ValueSource> ValueSource for Prefixed<S> {
    fn value(&self, expression: &str) -> Option<String> {
        for prefix in &self.prefixes {
            if let Some(rest) = expression.strip_prefix(prefix.as_str()) {
                return self.inner.value(rest);
            }
        }
        if self.allow_unprefixed {
            self.inner.value(expression)
        } else {
            None
        }
    }
}

/// Fields of a project model.
pub struct ProjectSource<'a>(pub &'a Project);

impl ValueSource for ProjectSource<'_> {
    fn value(&self, expression: &str) -> Option<String> {
        let p = self.0;
        let value = match expression {
            "groupId" => p.group_id.clone(),
            "artifactId" => p.artifact_id.clone(),
            "version" => p.version.clone(),
            "packaging" => p.packaging.clone(),
            "name" => p.name.clone().unwrap_or_else(|| p.artifact_id.clone()),
            "id" => p.id(),
            "basedir" => p.basedir.display().to_string(),
            "build.finalName" => p.final_name(),
            "build.directory" => p.basedir.join("target").display().to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// Fields of an artifact and its type handler.
pub struct ArtifactSource<'a>(pub &'a Artifact);

impl ValueSource for ArtifactSource<'_> {
    fn value(&self, expression: &str) -> Option<String> {
        let a = self.0;
        let value = match expression {
            "groupId" => a.group_id.clone(),
            "artifactId" => a.artifact_id.clone(),
            "version" | "baseVersion" => a.version.clone(),
            "classifier" => a.classifier.clone()?,
            "type" => a.artifact_type.clone(),
            "extension" | "handler.extension" => a.extension().to_string(),
            "scope" => a.scope.as_str().to_string(),
            "id" => a.id(),
            "dependencyConflictId" => a.conflict_id(),
            "file" => a.file.as_ref()?.display().to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// Errors raised by [`Interpolator::interpolate`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpolationError {
    #[error("expression '${{{0}}}' refers to itself")]
    Cycle(String),
}

/// Ordered value sources.
#[derive(Default)]
pub struct Interpolator<'a> {
    sources: Vec<Box<dyn ValueSource + 'a>>,
}

impl<'a> Interpolator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl ValueSource + 'a) {
        self.sources.push(Box::new(source));
    }

    pub fn with(mut self, source: impl ValueSource + 'a) -> Self {
        self.push(source);
        self
    }

    /// Raw lookup without recursive interpolation.
    pub fn lookup(&self, expression: &str) -> Option<String> {
        self.sources.iter().find_map(|s| s.value(expression))
    }

    /// Resolve a single expression, interpolating its value.
    pub fn resolve(&self, expression: &str) -> Result<Option<String>, InterpolationError> {
        let mut stack = Vec::new();
        self.resolve_inner(expression, &mut stack)
    }

    pub fn interpolate(&self, text: &str) -> Result<String, InterpolationError> {
        let mut stack = Vec::new();
        self.interpolate_inner(text, &mut stack)
    }

    fn resolve_inner(
        &self,
        expression: &str,
        stack: &mut Vec<String>,
    ) -> Result<Option<String>, InterpolationError> {
        let Some(raw) = self.lookup(expression) else {
            return Ok(None);
        };
        if !raw.contains("${") {
            return Ok(Some(raw));
        }
        if stack.iter().any(|e| e == expression) {
            return Err(InterpolationError::Cycle(expression.to_string()));
        }
        stack.push(expression.to_string());
        let value = self.interpolate_inner(&raw, stack)?;
        stack.pop();
        Ok(Some(value))
    }

    fn interpolate_inner(
        &self,
        text: &str,
        stack: &mut Vec<String>,
    ) -> Result<String, InterpolationError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let expression = &after[..end];
            match self.resolve_inner(expression, stack)? {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[start..start + 2 + end + 1]),
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}
