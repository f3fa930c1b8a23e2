//! Project configuration (`ontoindex.toml`)
//!
//! Every field has a default so a project without a config file still
//! indexes. A config file that cannot be read or parsed falls back to the
//! defaults with a warning; configuration problems never abort a build.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OntoError, Result};

/// Config file looked up at the project root
pub const CONFIG_FILE_NAME: &str = "ontoindex.toml";

/// Ignore file whose simple name patterns are merged into the excludes
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// Entries that are never worth indexing; matched by exact name
pub const DEFAULT_EXCLUDES: &[&str] = &[".git", "node_modules", "target", "dist", "build", "coverage"];

/// Which analyzer backend the registry prefers for languages that have both
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerBackend {
    #[default]
    Ast,
    Regex,
}

/// Supported AI providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Anthropic,
    OpenAi,
    Gemini,
}

impl AiProvider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable consulted when `api_key_env` is not set
    pub fn default_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash",
        }
    }
}

/// AI backend settings; absent means the domain layer is skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub max_tokens_per_request: u32,
    pub rate_limit_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            api_key_env: None,
            model: None,
            max_tokens_per_request: 2048,
            rate_limit_ms: 1000,
        }
    }
}

impl AiConfig {
    pub fn key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_key_env())
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// Annotation analyzer thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationThresholds {
    pub anchor_fan_in: usize,
    pub max_parameters: usize,
    pub max_function_lines: usize,
    pub max_nesting_depth: usize,
}

impl Default for AnnotationThresholds {
    fn default() -> Self {
        Self {
            anchor_fan_in: 3,
            max_parameters: 5,
            max_function_lines: 50,
            max_nesting_depth: 3,
        }
    }
}

/// Incremental update policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePolicy {
    /// Changed-file count above which the structure layer is rescanned in full
    pub structure_rescan_ceiling: usize,
    /// Changed-file ratio above which the domain layer is rebuilt
    pub domain_materiality_ratio: f64,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            structure_rescan_ceiling: 50,
            domain_materiality_ratio: 0.2,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntoConfig {
    /// Languages that receive semantic analysis
    pub languages: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub max_depth: usize,
    /// Output directory, relative to the project root
    pub output_dir: String,
    pub analyzer: AnalyzerBackend,
    pub ai: Option<AiConfig>,
    pub thresholds: AnnotationThresholds,
    pub update: UpdatePolicy,
}

impl Default for OntoConfig {
    fn default() -> Self {
        Self {
            languages: vec!["typescript".to_string(), "javascript".to_string()],
            exclude_patterns: Vec::new(),
            max_depth: 10,
            output_dir: ".ontoindex".to_string(),
            analyzer: AnalyzerBackend::default(),
            ai: None,
            thresholds: AnnotationThresholds::default(),
            update: UpdatePolicy::default(),
        }
    }
}

impl OntoConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| OntoError::Config {
            message: e.to_string(),
        })
    }

    /// Load `ontoindex.toml` from the project root, falling back to defaults
    pub fn load(project_root: &Path) -> Self {
        let path = project_root.join(CONFIG_FILE_NAME);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Self::default(),
        };
        match Self::from_toml(&text) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("[CONFIG] Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load an explicitly named config file; unlike [`load`](Self::load) a
    /// missing or invalid file is an error
    pub fn load_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| OntoError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml(&text)
    }

    /// Name of the output directory's first path component, which is always excluded
    pub fn output_dir_name(&self) -> &str {
        self.output_dir
            .trim_start_matches("./")
            .split(['/', '\\'])
            .next()
            .unwrap_or(&self.output_dir)
    }

    /// Built-in names and the output directory (exact), plus configured
    /// and ignore-file patterns (prefix)
    pub fn effective_excludes(&self, project_root: &Path) -> ExcludeSet {
        let exact = DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(self.output_dir_name().to_string()));
        let prefixes = self
            .exclude_patterns
            .iter()
            .cloned()
            .chain(read_ignore_file(project_root));
        ExcludeSet::new(exact, prefixes)
    }
}

/// Entry-name exclusion used by the scanner and the hasher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeSet {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl ExcludeSet {
    pub fn new<E, P>(exact: E, prefixes: P) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            exact: normalize(exact),
            prefixes: normalize(prefixes),
        }
    }

    /// Only prefix patterns, as a configured `exclude_patterns` list would give
    pub fn from_prefixes<P>(prefixes: P) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self::new(Vec::<String>::new(), prefixes)
    }

    /// Whether an entry name is excluded
    pub fn matches(&self, name: &str) -> bool {
        self.exact.iter().any(|p| name == p) || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    pub fn prefix_patterns(&self) -> &[String] {
        &self.prefixes
    }
}

fn normalize<I>(patterns: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut patterns: Vec<String> = patterns
        .into_iter()
        .map(Into::into)
        .filter(|p| !p.is_empty())
        .collect();
    patterns.sort();
    patterns.dedup();
    patterns
}

/// Read simple name patterns from the project's ignore file.
///
/// A missing or unreadable file yields no patterns.
pub fn read_ignore_file(project_root: &Path) -> Vec<String> {
    match fs::read_to_string(project_root.join(IGNORE_FILE_NAME)) {
        Ok(text) => parse_ignore_patterns(&text),
        Err(_) => Vec::new(),
    }
}

/// Keep only ignore lines that are plain names.
///
/// Lines with a path separator, a negation, or glob metacharacters are
/// dropped: name-prefix matching cannot honor them faithfully.
pub fn parse_ignore_patterns(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.strip_suffix('/').unwrap_or(line))
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with('!')
                && !line.contains(['/', '\\'])
                && !line.contains(['*', '?', '[', ']', '{', '}'])
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignore_patterns_keeps_plain_names() {
        let text = "# comment\nnode_modules/\n.env\n*.log\n!keep.txt\nsrc/generated\n\n.cache\n";
        assert_eq!(
            parse_ignore_patterns(text),
            vec!["node_modules", ".env", ".cache"]
        );
    }

    #[test]
    fn test_from_toml_partial() {
        let config = OntoConfig::from_toml(
            r#"
languages = ["typescript"]
max_depth = 4

[ai]
provider = "openai"
rate_limit_ms = 0

[update]
domain_materiality_ratio = 0.5
"#,
        )
        .unwrap();

        assert_eq!(config.languages, vec!["typescript"]);
        assert_eq!(config.max_depth, 4);
        let ai = config.ai.unwrap();
        assert_eq!(ai.provider, AiProvider::OpenAi);
        assert_eq!(ai.key_env(), "OPENAI_API_KEY");
        assert_eq!(ai.max_tokens_per_request, 2048);
        assert_eq!(config.update.domain_materiality_ratio, 0.5);
        assert_eq!(config.update.structure_rescan_ceiling, 50);
        assert_eq!(config.thresholds.anchor_fan_in, 3);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = OntoConfig::from_toml("max_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, OntoError::Config { .. }));
    }

    #[test]
    fn test_effective_excludes_includes_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "tmp\n*.bak\n").unwrap();
        let config = OntoConfig {
            exclude_patterns: vec!["vendor".into()],
            ..Default::default()
        };
        let excludes = config.effective_excludes(dir.path());
        assert!(excludes.matches(".ontoindex"));
        assert!(excludes.matches("vendor"));
        assert!(excludes.matches("vendored"));
        assert!(excludes.matches("tmp"));
        assert!(!excludes.prefix_patterns().iter().any(|p| p.contains('*')));
    }

    #[test]
    fn test_builtin_excludes_match_exact_names_only() {
        let dir = tempfile::tempdir().unwrap();
        let excludes = OntoConfig::default().effective_excludes(dir.path());
        for name in ["dist", "build", "target", "coverage", "node_modules", ".git"] {
            assert!(excludes.matches(name), "{name} should be excluded");
        }
        for name in ["distance.ts", "builder.ts", "targeting.ts", "coverage.ts", ".github", ".ontoindex2"] {
            assert!(!excludes.matches(name), "{name} should be kept");
        }
    }

    #[test]
    fn test_configured_patterns_match_by_prefix() {
        let excludes = ExcludeSet::from_prefixes(["dist", ".git"]);
        assert!(excludes.matches("distance.ts"));
        assert!(excludes.matches(".github"));
        assert!(!excludes.matches("src"));
        assert!(!excludes.matches(""));
    }
}
