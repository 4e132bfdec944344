//! Output path and file name evaluation
//!
//! Output directories and file name mappings are templates such as
//! `lib/${artifact.groupId}/` or
//! `${artifact.artifactId}-${artifact.version}${dashClassifier?}.${artifact.extension}`.
//! The functions here resolve them against the artifact/module being added,
//! the main project, user properties and the environment.

mod formatter;
mod interpolate;
mod mode;

pub use formatter::{FileFormatter, LineEnding, FILTERED_DIR};
pub use interpolate::{
    ArtifactSource, FixedSource, InterpolationError, Interpolator, MapSource, Prefixed,
    ProjectSource, ValueSource,
};
pub use mode::{format_mode, parse_mode, DEFAULT_DIRECTORY_MODE, DEFAULT_FILE_MODE};

use assembly_model::{Artifact, Project};

use crate::config::AssemblyConfig;
use crate::error::AssemblyError;

const PROJECT_PREFIXES: &[&str] = &["pom.", "project."];
const PROJECT_PROPERTIES_PREFIXES: &[&str] = &["pom.properties.", "project.properties."];

/// The artifact and module an expression is evaluated for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionContext<'a> {
    pub module_project: Option<&'a Project>,
    pub module_artifact: Option<&'a Artifact>,
    pub artifact_project: Option<&'a Project>,
    pub artifact: Option<&'a Artifact>,
}

impl<'a> ExpressionContext<'a> {
    pub fn for_artifact(artifact: &'a Artifact, project: Option<&'a Project>) -> Self {
        Self {
            artifact: Some(artifact),
            artifact_project: project,
            ..Self::default()
        }
    }

    pub fn for_module(module: &'a Project, module_artifact: Option<&'a Artifact>) -> Self {
        Self {
            module_project: Some(module),
            module_artifact,
            ..Self::default()
        }
    }

    pub fn with_artifact(mut self, artifact: &'a Artifact, project: Option<&'a Project>) -> Self {
        self.artifact = Some(artifact);
        self.artifact_project = project;
        self
    }

    /// Classifier used for `${dashClassifier?}`.
    fn classifier(&self) -> Option<&'a str> {
        self.artifact
            .or(self.module_artifact)
            .and_then(|a| a.classifier.as_deref())
    }
}

fn push_module_and_artifact<'a>(interp: &mut Interpolator<'a>, ctx: &ExpressionContext<'a>) {
    if let Some(artifact) = ctx.module_artifact {
        interp.push(Prefixed::new("module.", ArtifactSource(artifact)));
    }
    if let Some(project) = ctx.module_project {
        interp.push(Prefixed::new("module.", ProjectSource(project)));
    }
    if let Some(artifact) = ctx.artifact {
        interp.push(Prefixed::new("artifact.", ArtifactSource(artifact)));
    }
    if let Some(project) = ctx.artifact_project {
        interp.push(Prefixed::new("artifact.", ProjectSource(project)));
    }
}

fn push_project_properties<'a>(interp: &mut Interpolator<'a>, project: &'a Project) {
    interp.push(Prefixed::any_of(
        PROJECT_PROPERTIES_PREFIXES,
        true,
        MapSource(&project.properties),
    ));
}

/// Interpolator for an output directory.
///
/// Order: special names, `module.*`, `artifact.*`, user properties, main
/// project fields, main project properties, `env.*`.
pub fn output_directory_interpolator<'a>(
    final_name: Option<&str>,
    ctx: &ExpressionContext<'a>,
    config: &'a AssemblyConfig,
) -> Interpolator<'a> {
    let mut interp = Interpolator::new();
    if let Some(name) = final_name {
        interp.push(FixedSource(vec![
            ("finalName".to_string(), name.to_string()),
            ("build.finalName".to_string(), name.to_string()),
        ]));
    }
    push_module_and_artifact(&mut interp, ctx);
    interp.push(MapSource(&config.execution_properties));
    interp.push(Prefixed::any_of(PROJECT_PREFIXES, true, ProjectSource(&config.project)));
    push_project_properties(&mut interp, &config.project);
    interp.push(Prefixed::new("env.", MapSource(&config.environment)));
    interp
}

/// Interpolator for a file name mapping.
///
/// Order: `module.*`, `artifact.*`, main project fields, `dashClassifier`,
/// user properties, main project properties, `env.*`.
pub fn file_name_interpolator<'a>(
    ctx: &ExpressionContext<'a>,
    config: &'a AssemblyConfig,
) -> Interpolator<'a> {
    let mut interp = Interpolator::new();
    push_module_and_artifact(&mut interp, ctx);
    interp.push(Prefixed::any_of(PROJECT_PREFIXES, true, ProjectSource(&config.project)));

    let dash_classifier = ctx
        .classifier()
        .map(|c| format!("-{}", c))
        .unwrap_or_default();
    interp.push(FixedSource(vec![
        ("dashClassifier?".to_string(), dash_classifier.clone()),
        ("dashClassifier".to_string(), dash_classifier),
    ]));

    interp.push(MapSource(&config.execution_properties));
    push_project_properties(&mut interp, &config.project);
    interp.push(Prefixed::new("env.", MapSource(&config.environment)));
    interp
}

/// Interpolator for filtered file content.
pub fn content_interpolator(config: &AssemblyConfig) -> Interpolator<'_> {
    let mut interp = Interpolator::new();
    interp.push(MapSource(&config.execution_properties));
    interp.push(Prefixed::any_of(PROJECT_PREFIXES, true, ProjectSource(&config.project)));
    push_project_properties(&mut interp, &config.project);
    interp.push(Prefixed::new("env.", MapSource(&config.environment)));
    interp
}

fn remove_current_dir_segments(value: &str) -> String {
    let mut value = value.to_string();
    while let Some(rest) = value.strip_prefix("./") {
        value = rest.to_string();
    }
    while value.contains("/./") {
        value = value.replace("/./", "/");
    }
    while value.contains("//") {
        value = value.replace("//", "/");
    }
    value
}

/// Normalize an interpolated output directory.
///
/// Non-empty results end with `/`; leading separators, doubled separators
/// and `./` segments are dropped. Backslashes become `/`.
pub fn normalize_output_directory(value: &str) -> String {
    let mut value = value.replace('\\', "/");
    if !value.is_empty() && !value.ends_with('/') {
        value.push('/');
    }
    let value = remove_current_dir_segments(value.trim_start_matches('/'));
    if value == "/" || value == "./" || value == "." {
        String::new()
    } else {
        value
    }
}

/// Evaluate an output directory template for archive targets.
pub fn evaluate_output_directory(
    output: Option<&str>,
    final_name: Option<&str>,
    ctx: &ExpressionContext<'_>,
    config: &AssemblyConfig,
) -> Result<String, AssemblyError> {
    let template = output.unwrap_or("");
    let interpolated = output_directory_interpolator(final_name, ctx, config)
        .interpolate(template)
        .map_err(|e| {
            AssemblyError::formatting_caused_by(
                format!("Failed to interpolate output directory '{}'", template),
                e,
            )
        })?;
    Ok(normalize_output_directory(&interpolated))
}

/// Evaluate a file name mapping template.
pub fn evaluate_file_name_mapping(
    expression: &str,
    ctx: &ExpressionContext<'_>,
    config: &AssemblyConfig,
) -> Result<String, AssemblyError> {
    let interpolated = file_name_interpolator(ctx, config)
        .interpolate(expression)
        .map_err(|e| {
            AssemblyError::formatting_caused_by(
                format!("Failed to interpolate output filename mapping '{}'", expression),
                e,
            )
        })?;
    Ok(remove_current_dir_segments(&interpolated.replace('\\', "/")))
}

/// Join a base directory prefix and a relative path with exactly one `/`.
pub fn join_archive_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => format!("{}/", prefix),
        (false, false) => format!("{}/{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assembly_model::descriptor::{DEFAULT_DEPENDENCY_MAPPING, DEFAULT_MODULE_MAPPING};
    use std::path::PathBuf;

    fn config() -> AssemblyConfig {
        let mut project = Project::new("org.example", "main", "1.0");
        project.basedir = PathBuf::from("/work/main");
        project
            .properties
            .insert("dist.dir".to_string(), "distribution".to_string());
        AssemblyConfig::new(project)
            .with_property("user.dir", "from-user")
            .with_env("HOME", "/home/builder")
    }

    #[test]
    fn test_output_directory_normalization() {
        assert_eq!(normalize_output_directory(""), "");
        assert_eq!(normalize_output_directory("/"), "");
        assert_eq!(normalize_output_directory("."), "");
        assert_eq!(normalize_output_directory("docs"), "docs/");
        assert_eq!(normalize_output_directory("/docs/"), "docs/");
        assert_eq!(normalize_output_directory("a//b"), "a/b/");
        assert_eq!(normalize_output_directory("./a/./b"), "a/b/");
        assert_eq!(normalize_output_directory("a\\b"), "a/b/");
        assert_eq!(normalize_output_directory("../up"), "../up/");
    }

    #[test]
    fn test_output_directory_special_names() {
        let config = config();
        let out = evaluate_output_directory(
            Some("${finalName}/lib"),
            Some("custom"),
            &ExpressionContext::default(),
            &config,
        )
        .unwrap();
        assert_eq!(out, "custom/lib/");
    }

    #[test]
    fn test_output_directory_precedence() {
        let config = config();
        let artifact = Artifact::new("org.dep", "dep", "3.1");
        let ctx = ExpressionContext::for_artifact(&artifact, None);

        let out = evaluate_output_directory(
            Some("${artifact.groupId}/${project.artifactId}/${dist.dir}/${user.dir}/${env.HOME}"),
            None,
            &ctx,
            &config,
        )
        .unwrap();
        assert_eq!(out, "org.dep/main/distribution/from-user/home/builder/");
    }

    #[test]
    fn test_user_property_beats_project_field() {
        let config = config().with_property("artifactId", "overridden");
        let out =
            evaluate_output_directory(Some("${artifactId}"), None, &ExpressionContext::default(), &config)
                .unwrap();
        assert_eq!(out, "overridden/");
    }

    #[test]
    fn test_default_dependency_mapping() {
        let config = config();
        let plain = Artifact::new("org.dep", "dep", "3.1");
        let ctx = ExpressionContext::for_artifact(&plain, None);
        assert_eq!(
            evaluate_file_name_mapping(DEFAULT_DEPENDENCY_MAPPING, &ctx, &config).unwrap(),
            "dep-3.1.jar"
        );

        let classified = Artifact::new("org.dep", "dep", "3.1")
            .with_classifier("sources")
            .with_type("java-source");
        let ctx = ExpressionContext::for_artifact(&classified, None);
        assert_eq!(
            evaluate_file_name_mapping(DEFAULT_DEPENDENCY_MAPPING, &ctx, &config).unwrap(),
            "dep-3.1-sources.jar"
        );
    }

    #[test]
    fn test_module_mapping() {
        let config = config();
        let mut module = Project::new("org.example", "core", "1.0");
        module.packaging = "war".to_string();
        let module_artifact = module.artifact();
        let ctx = ExpressionContext::for_module(&module, Some(&module_artifact));

        assert_eq!(
            evaluate_file_name_mapping(DEFAULT_MODULE_MAPPING, &ctx, &config).unwrap(),
            "core-1.0.war"
        );
    }

    #[test]
    fn test_file_name_mapping_project_fields_before_user_props() {
        let config = config().with_property("version", "user");
        let artifact = Artifact::new("g", "a", "9");
        let ctx = ExpressionContext::for_artifact(&artifact, None);
        assert_eq!(
            evaluate_file_name_mapping("${version}", &ctx, &config).unwrap(),
            "1.0"
        );
    }

    #[test]
    fn test_mapping_with_subdirectory_normalized() {
        let config = config();
        let artifact = Artifact::new("g", "a", "9");
        let ctx = ExpressionContext::for_artifact(&artifact, None);
        assert_eq!(
            evaluate_file_name_mapping("./${artifact.groupId}//${artifact.artifactId}.jar", &ctx, &config)
                .unwrap(),
            "g/a.jar"
        );
    }

    #[test]
    fn test_join_archive_path() {
        assert_eq!(join_archive_path("", "a.txt"), "a.txt");
        assert_eq!(join_archive_path("base/", "/a.txt"), "base/a.txt");
        assert_eq!(join_archive_path("base", "docs/"), "base/docs/");
        assert_eq!(join_archive_path("base", ""), "base/");
    }
}
