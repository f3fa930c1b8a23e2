//! Language analyzers and the registry that picks one per file
//!
//! # Architecture
//!
//! Every analyzer implements [`LanguageAnalyzer`] and produces a
//! [`SemanticFile`] of the same shape regardless of backend:
//!
//! 1. **AST backend** (`typescript.rs`): tree-sitter based, sees class
//!    members, heritage clauses, parameter types and doc comments.
//! 2. **Regex backend** (`typescript_regex.rs`, `python.rs`): line-anchored
//!    patterns over raw text; only top-level declarations.
//!
//! The registry is configured once with a backend preference and then tries
//! analyzers in order, first match wins. Analysis never fails the caller: a
//! backend error or panic degrades to [`SemanticFile::empty`].

pub mod common;
pub mod python;
pub mod typescript;
pub mod typescript_regex;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::config::AnalyzerBackend;
use crate::lang::Language;
use crate::schema::SemanticFile;

pub use python::PythonRegexAnalyzer;
pub use typescript::TypeScriptAstAnalyzer;
pub use typescript_regex::TypeScriptRegexAnalyzer;

/// Capability interface shared by every analyzer
pub trait LanguageAnalyzer: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Lowercase extensions (no dot) this analyzer accepts
    fn extensions(&self) -> &'static [&'static str];

    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.extensions().iter().any(|x| *x == e)
            })
            .unwrap_or(false)
    }

    /// Analyze one file. Must return an empty-but-valid file on failure.
    fn analyze_file(&self, path: &str, content: &str) -> SemanticFile;
}

/// Language name for a project-relative path, `"unknown"` if unrecognized
pub fn language_name(path: &str) -> &'static str {
    Language::from_path(Path::new(path))
        .map(|l| l.name())
        .unwrap_or("unknown")
}

/// Ordered set of analyzers
pub struct AnalyzerRegistry {
    analyzers: Vec<Box<dyn LanguageAnalyzer>>,
}

impl AnalyzerRegistry {
    /// Empty registry; use [`register`](Self::register) to populate
    pub fn empty() -> Self {
        Self {
            analyzers: Vec::new(),
        }
    }

    /// Registry with the built-in analyzers, preferring `backend` where both exist
    pub fn with_backend(backend: AnalyzerBackend) -> Self {
        let mut registry = Self::empty();
        match backend {
            AnalyzerBackend::Ast => {
                registry.register(Box::new(TypeScriptAstAnalyzer::new()));
                registry.register(Box::new(TypeScriptRegexAnalyzer::new()));
            }
            AnalyzerBackend::Regex => {
                registry.register(Box::new(TypeScriptRegexAnalyzer::new()));
            }
        }
        registry.register(Box::new(PythonRegexAnalyzer::new()));
        registry
    }

    pub fn register(&mut self, analyzer: Box<dyn LanguageAnalyzer>) {
        self.analyzers.push(analyzer);
    }

    /// First analyzer whose extension set matches
    pub fn resolve(&self, path: &Path) -> Option<&dyn LanguageAnalyzer> {
        self.analyzers
            .iter()
            .find(|a| a.can_handle(path))
            .map(|a| a.as_ref())
    }

    pub fn can_handle(&self, path: &Path) -> bool {
        self.resolve(path).is_some()
    }

    /// Analyze a file with the resolved analyzer.
    ///
    /// Returns `None` when no analyzer handles the path. A panicking analyzer
    /// yields an empty file.
    pub fn analyze(&self, path: &str, content: &str) -> Option<SemanticFile> {
        let analyzer = self.resolve(Path::new(path))?;
        let result = catch_unwind(AssertUnwindSafe(|| analyzer.analyze_file(path, content)));
        Some(match result {
            Ok(file) => file,
            Err(_) => {
                tracing::warn!("[ANALYZE] {} panicked on {}", analyzer.name(), path);
                SemanticFile::empty(path, language_name(path))
            }
        })
    }

    /// Names of registered analyzers in resolution order
    pub fn names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::with_backend(AnalyzerBackend::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Panicky;

    impl LanguageAnalyzer for Panicky {
        fn name(&self) -> &'static str {
            "panicky"
        }
        fn extensions(&self) -> &'static [&'static str] {
            &["ts"]
        }
        fn analyze_file(&self, _path: &str, _content: &str) -> SemanticFile {
            panic!("boom")
        }
    }

    #[test]
    fn test_registry_prefers_configured_backend() {
        let ast = AnalyzerRegistry::with_backend(AnalyzerBackend::Ast);
        assert_eq!(ast.resolve(Path::new("a.ts")).unwrap().name(), "typescript-ast");

        let regex = AnalyzerRegistry::with_backend(AnalyzerBackend::Regex);
        assert_eq!(regex.resolve(Path::new("a.ts")).unwrap().name(), "typescript-regex");
        assert_eq!(regex.resolve(Path::new("a.py")).unwrap().name(), "python-regex");
        assert!(regex.resolve(Path::new("a.go")).is_none());
    }

    #[test]
    fn test_panicking_analyzer_degrades_to_empty_file() {
        let mut registry = AnalyzerRegistry::empty();
        registry.register(Box::new(Panicky));
        let file = registry.analyze("src/a.ts", "export const a = 1;").unwrap();
        assert_eq!(file.path, "src/a.ts");
        assert_eq!(file.language, "typescript");
        assert!(file.exports.is_empty());
    }

    #[test]
    fn test_backends_agree_on_exported_function_shape() {
        let src = "export function loadConfig(path: string, strict: boolean): Config {\n  return read(path);\n}\n";
        let ast = TypeScriptAstAnalyzer::new().analyze_file("a.ts", src);
        let regex = TypeScriptRegexAnalyzer::new().analyze_file("a.ts", src);

        for file in [&ast, &regex] {
            assert_eq!(file.exports.len(), 1);
            assert_eq!(file.exports[0].name, "loadConfig");
            let f = &file.functions[0];
            assert_eq!(f.name, "loadConfig");
            assert_eq!(f.line, 1);
            assert!(f.exported);
            assert_eq!(f.parameters.len(), 2);
            assert_eq!(f.parameters[0].type_annotation.as_deref(), Some("string"));
            assert_eq!(f.return_type.as_deref(), Some("Config"));
        }
    }
}
