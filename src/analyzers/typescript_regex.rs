//! Regex fallback for TypeScript and JavaScript
//!
//! Line-anchored patterns over the raw text. Only top-level exported
//! declarations are seen; class bodies are not walked.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::analyzers::common::{clean_type_annotation, normalize_whitespace, parse_parameter_list};
use crate::analyzers::typescript::TS_FAMILY_EXTENSIONS;
use crate::analyzers::{language_name, LanguageAnalyzer};
use crate::schema::{ExportEntry, ImportEntry, SemanticFile, SymbolEntry, SymbolKind};

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+(type\s+)?([^'";]*?)\s+from\s+["']([^"']+)["']"#)
        .expect("valid regex")
});

static IMPORT_SIDE_EFFECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^[ \t]*import\s+["']([^"']+)["']"#).expect("valid regex"));

static EXPORT_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^export\s+(default\s+)?(async\s+)?function\s*\*?\s*([\w$]+)\s*(?:<[^(]*>)?\s*\(([^)]*)\)\s*(?::\s*([^{;]+?))?\s*[{;]",
    )
    .expect("valid regex")
});

static EXPORT_ARROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^export\s+(?:const|let|var)\s+([\w$]+)\s*(?::[^=]+)?=\s*(async\s+)?(?:\(([^)]*)\)|([\w$]+))\s*(?::\s*([^=]+?))?\s*=>",
    )
    .expect("valid regex")
});

static EXPORT_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^export\s+(?:const|let|var)\s+([\w$]+)").expect("valid regex"));

static EXPORT_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^export\s+(default\s+)?(?:abstract\s+)?class\s+([\w$]+)(?:\s*<[^>{]*>)?(?:\s+extends\s+([\w$.]+)(?:<[^>{]*>)?)?(?:\s+implements\s+([^{]+?))?\s*\{",
    )
    .expect("valid regex")
});

static EXPORT_INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^export\s+(?:default\s+)?interface\s+([\w$]+)(?:\s*<[^>{]*>)?(?:\s+extends\s+([^{]+?))?\s*\{")
        .expect("valid regex")
});

static EXPORT_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^export\s+(?:declare\s+)?type\s+([\w$]+)").expect("valid regex")
});

static EXPORT_ENUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^export\s+(?:declare\s+)?(?:const\s+)?enum\s+([\w$]+)").expect("valid regex")
});

static EXPORT_DEFAULT_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^export\s+default\s+([\w$]+)\s*;?[ \t]*$").expect("valid regex"));

static EXPORT_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^export\s+(?:type\s+)?\{([^}]*)\}\s*(from\s+["'])?"#).expect("valid regex")
});

/// Regex-backed analyzer
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeScriptRegexAnalyzer;

impl TypeScriptRegexAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageAnalyzer for TypeScriptRegexAnalyzer {
    fn name(&self) -> &'static str {
        "typescript-regex"
    }

    fn extensions(&self) -> &'static [&'static str] {
        TS_FAMILY_EXTENSIONS
    }

    fn analyze_file(&self, path: &str, content: &str) -> SemanticFile {
        let mut file = SemanticFile::empty(path, language_name(path));
        file.imports = extract_imports(content);
        extract_declarations(content, &mut file);
        extract_export_clauses(content, &mut file);
        file.exports.sort_by_key(|e| e.line);
        file
    }
}

/// 1-indexed line of a byte offset
pub(crate) fn line_at(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

fn start_of(cap: &Captures) -> usize {
    cap.get(0).map(|m| m.start()).unwrap_or(0)
}

fn extract_imports(content: &str) -> Vec<ImportEntry> {
    let mut found: Vec<(usize, ImportEntry)> = Vec::new();

    for cap in IMPORT_FROM.captures_iter(content) {
        let mut import = ImportEntry {
            source: cap[3].to_string(),
            is_type_only: cap.get(1).is_some(),
            ..Default::default()
        };
        parse_import_clause(&cap[2], &mut import);
        found.push((start_of(&cap), import));
    }

    for cap in IMPORT_SIDE_EFFECT.captures_iter(content) {
        found.push((
            start_of(&cap),
            ImportEntry {
                source: cap[1].to_string(),
                ..Default::default()
            },
        ));
    }

    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, import)| import).collect()
}

/// `Default, { a, b as c }` / `* as ns`
fn parse_import_clause(clause: &str, import: &mut ImportEntry) {
    let (outside, named) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if open < close => (
            format!("{}{}", &clause[..open], &clause[close + 1..]),
            Some(&clause[open + 1..close]),
        ),
        _ => (clause.to_string(), None),
    };

    for part in outside.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(ns) = part.strip_prefix('*') {
            let name = ns.trim().trim_start_matches("as").trim();
            if !name.is_empty() {
                import.specifiers.push(name.to_string());
            }
        } else {
            import.is_default = true;
            import.specifiers.push(part.to_string());
        }
    }

    if let Some(named) = named {
        for spec in named.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let spec = spec.strip_prefix("type ").unwrap_or(spec);
            if let Some(name) = spec.split_whitespace().next() {
                import.specifiers.push(name.to_string());
            }
        }
    }
}

fn push_declaration(file: &mut SemanticFile, entry: SymbolEntry, is_default: bool) {
    file.exports.push(ExportEntry {
        name: entry.name.clone(),
        kind: entry.kind,
        line: entry.line,
        is_default,
    });
    match entry.kind {
        SymbolKind::Class => file.classes.push(entry),
        SymbolKind::Interface => file.interfaces.push(entry),
        SymbolKind::Type | SymbolKind::Enum => file.types.push(entry),
        _ => file.functions.push(entry),
    }
}

fn extract_declarations(content: &str, file: &mut SemanticFile) {
    for cap in EXPORT_FUNCTION.captures_iter(content) {
        let mut entry = SymbolEntry::new(&cap[3], SymbolKind::Function, line_at(content, start_of(&cap)), true);
        entry.is_async = cap.get(2).is_some();
        entry.parameters = parse_parameter_list(&cap[4]);
        entry.return_type = cap.get(5).map(|m| clean_type_annotation(m.as_str()));
        push_declaration(file, entry, cap.get(1).is_some());
    }

    let mut arrow_starts = BTreeSet::new();
    for cap in EXPORT_ARROW.captures_iter(content) {
        let start = start_of(&cap);
        arrow_starts.insert(start);
        let mut entry = SymbolEntry::new(&cap[1], SymbolKind::Function, line_at(content, start), true);
        entry.is_async = cap.get(2).is_some();
        entry.parameters = match (cap.get(3), cap.get(4)) {
            (Some(list), _) => parse_parameter_list(list.as_str()),
            (None, Some(single)) => parse_parameter_list(single.as_str()),
            _ => Vec::new(),
        };
        entry.return_type = cap.get(5).map(|m| clean_type_annotation(m.as_str()));
        push_declaration(file, entry, false);
    }

    for cap in EXPORT_VARIABLE.captures_iter(content) {
        let start = start_of(&cap);
        if arrow_starts.contains(&start) {
            continue;
        }
        file.exports.push(ExportEntry {
            name: cap[1].to_string(),
            kind: SymbolKind::Variable,
            line: line_at(content, start),
            is_default: false,
        });
    }

    for cap in EXPORT_CLASS.captures_iter(content) {
        let mut entry = SymbolEntry::new(&cap[2], SymbolKind::Class, line_at(content, start_of(&cap)), true);
        entry.extends = cap.get(3).map(|m| vec![m.as_str().to_string()]).unwrap_or_default();
        entry.implements = cap
            .get(4)
            .map(|m| split_type_list(m.as_str()))
            .unwrap_or_default();
        push_declaration(file, entry, cap.get(1).is_some());
    }

    for cap in EXPORT_INTERFACE.captures_iter(content) {
        let mut entry =
            SymbolEntry::new(&cap[1], SymbolKind::Interface, line_at(content, start_of(&cap)), true);
        entry.extends = cap
            .get(2)
            .map(|m| split_type_list(m.as_str()))
            .unwrap_or_default();
        push_declaration(file, entry, false);
    }

    for (pattern, kind) in [(&*EXPORT_TYPE, SymbolKind::Type), (&*EXPORT_ENUM, SymbolKind::Enum)] {
        for cap in pattern.captures_iter(content) {
            let entry = SymbolEntry::new(&cap[1], kind, line_at(content, start_of(&cap)), true);
            push_declaration(file, entry, false);
        }
    }

    for cap in EXPORT_DEFAULT_IDENT.captures_iter(content) {
        let name = &cap[1];
        if matches!(name, "function" | "class" | "async" | "abstract" | "interface") {
            continue;
        }
        file.exports.push(ExportEntry {
            name: name.to_string(),
            kind: SymbolKind::Variable,
            line: line_at(content, start_of(&cap)),
            is_default: true,
        });
    }
}

fn extract_export_clauses(content: &str, file: &mut SemanticFile) {
    for cap in EXPORT_CLAUSE.captures_iter(content) {
        // re-export from another module
        if cap.get(2).is_some() {
            continue;
        }
        let line = line_at(content, start_of(&cap));
        for spec in cap[1].split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let mut words = spec.split_whitespace();
            let local = words.next().unwrap_or_default();
            let exported = match (words.next(), words.next()) {
                (Some("as"), Some(alias)) => alias,
                _ => local,
            };
            let kind = file
                .declarations()
                .find(|d| d.name == local)
                .map(|d| d.kind)
                .unwrap_or(SymbolKind::Variable);
            file.exports.push(ExportEntry {
                name: exported.to_string(),
                kind,
                line,
                is_default: exported == "default",
            });
        }
    }
}

/// `A, B<T>, C` -> ["A", "B<T>", "C"]
fn split_type_list(list: &str) -> Vec<String> {
    crate::analyzers::common::split_top_level(list)
        .into_iter()
        .map(|s| normalize_whitespace(&s))
        .collect()
}
