//! Textual module-relation extraction
//!
//! Three independent scans per file (static import, re-export, dynamic
//! import). They work on raw text so files that would not parse still yield
//! whatever edges the regexes can see.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lang::Language;
use crate::schema::{ModuleRelation, RelationKind};

static JS_STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?(?:[\w$*{}\s,]+?\s+from\s+)?["']([^"']+)["']"#)
        .expect("valid regex")
});

static JS_REQUIRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\brequire\(\s*["']([^"']+)["']\s*\)"#).expect("valid regex"));

static JS_RE_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*export\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s+["']([^"']+)["']"#,
    )
    .expect("valid regex")
});

static JS_DYNAMIC_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\(\s*["']([^"']+)["']\s*\)"#).expect("valid regex"));

static PY_FROM_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*from\s+(\.*[\w.]*)\s+import\b").expect("valid regex"));

static PY_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([^\n#]+)").expect("valid regex"));

static PY_DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:importlib\.)?import_module\(\s*["']([^"']+)["']"#).expect("valid regex")
});

/// Extract module relations for one file.
///
/// `source` is the project-relative path of the file.
pub fn extract_relations(source: &str, content: &str, lang: Language) -> Vec<ModuleRelation> {
    let mut relations = match lang {
        Language::TypeScript | Language::JavaScript => extract_js(source, content),
        Language::Python => extract_python(source, content),
        _ => Vec::new(),
    };
    relations.sort();
    relations.dedup();
    relations
}

fn extract_js(source: &str, content: &str) -> Vec<ModuleRelation> {
    let mut out = Vec::new();
    collect(&mut out, source, content, &JS_STATIC_IMPORT, RelationKind::Import);
    collect(&mut out, source, content, &JS_REQUIRE, RelationKind::Import);
    collect(&mut out, source, content, &JS_RE_EXPORT, RelationKind::ReExport);
    collect(&mut out, source, content, &JS_DYNAMIC_IMPORT, RelationKind::DynamicImport);
    out
}

fn extract_python(source: &str, content: &str) -> Vec<ModuleRelation> {
    let mut out = Vec::new();
    collect(&mut out, source, content, &PY_FROM_IMPORT, RelationKind::Import);

    for cap in PY_IMPORT.captures_iter(content) {
        for module in cap[1].split(',') {
            let name = module.split_whitespace().next().unwrap_or("");
            if !name.is_empty() {
                out.push(relation(source, name, RelationKind::Import));
            }
        }
    }

    collect(&mut out, source, content, &PY_DYNAMIC_IMPORT, RelationKind::DynamicImport);
    out
}

fn collect(
    out: &mut Vec<ModuleRelation>,
    source: &str,
    content: &str,
    pattern: &Regex,
    kind: RelationKind,
) {
    for cap in pattern.captures_iter(content) {
        let target = cap[1].trim();
        if !target.is_empty() {
            out.push(relation(source, target, kind));
        }
    }
}

fn relation(source: &str, target: &str, kind: RelationKind) -> ModuleRelation {
    ModuleRelation {
        source: source.to_string(),
        target: target.to_string(),
        kind,
    }
}

/// Whether an import specifier points inside the project.
///
/// A leading dot marks both path-style specifiers (`./a`, `../b`) and
/// Python relative modules (`.models`, `..pkg.x`, `.`); no package name
/// starts with one.
pub fn is_relative_specifier(target: &str) -> bool {
    target.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(relations: &[ModuleRelation], kind: RelationKind) -> Vec<&str> {
        relations
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.target.as_str())
            .collect()
    }

    #[test]
    fn test_js_three_scans() {
        let content = r#"
import React from 'react';
import { a,
  b } from "./utils";
import type { Props } from './types';
import './side-effect.css';
const fs = require('fs');
export * from './reexported';
export { thing } from "../thing";
const lazy = () => import('./lazy');
"#;
        let rels = extract_relations("src/app.ts", content, Language::TypeScript);

        let imports = targets(&rels, RelationKind::Import);
        assert!(imports.contains(&"react"));
        assert!(imports.contains(&"./utils"));
        assert!(imports.contains(&"./types"));
        assert!(imports.contains(&"./side-effect.css"));
        assert!(imports.contains(&"fs"));

        assert_eq!(
            targets(&rels, RelationKind::ReExport),
            vec!["../thing", "./reexported"]
        );
        assert_eq!(targets(&rels, RelationKind::DynamicImport), vec!["./lazy"]);
        assert!(rels.iter().all(|r| r.source == "src/app.ts"));
    }

    #[test]
    fn test_python_imports() {
        let content = "import os, sys as system\nfrom .models import User\nfrom pkg.sub import thing\nmod = importlib.import_module('plugins.x')\n";
        let rels = extract_relations("app/main.py", content, Language::Python);
        let imports = targets(&rels, RelationKind::Import);
        assert!(imports.contains(&"os"));
        assert!(imports.contains(&"sys"));
        assert!(imports.contains(&".models"));
        assert!(imports.contains(&"pkg.sub"));
        assert_eq!(targets(&rels, RelationKind::DynamicImport), vec!["plugins.x"]);
    }

    #[test]
    fn test_unsupported_language_yields_nothing() {
        assert!(extract_relations("a.go", "import \"fmt\"", Language::Go).is_empty());
    }

    #[test]
    fn test_is_relative_specifier() {
        assert!(is_relative_specifier("./a"));
        assert!(is_relative_specifier("../b/c"));
        assert!(is_relative_specifier("."));
        assert!(is_relative_specifier(".models"));
        assert!(is_relative_specifier("..pkg.x"));
        assert!(!is_relative_specifier("react"));
        assert!(!is_relative_specifier("@scope/pkg"));
    }
}
