//! Regex analyzer for Python
//!
//! Top-level `def`/`async def`/`class` and both import forms. Methods are
//! the indented `def`s inside a class body. A name is exported unless it
//! starts with `_`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzers::common::{clean_type_annotation, parse_parameter_list};
use crate::analyzers::typescript_regex::line_at;
use crate::analyzers::{language_name, LanguageAnalyzer};
use crate::schema::{ExportEntry, ImportEntry, Parameter, SemanticFile, SymbolEntry, SymbolKind};

static DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)(async[ \t]+)?def[ \t]+(\w+)\s*\(([^)]*)\)\s*(?:->\s*([^:]+?))?\s*:")
        .expect("valid regex")
});

static CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^class[ \t]+(\w+)\s*(?:\(([^)]*)\))?\s*:").expect("valid regex")
});

static FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*from[ \t]+(\.*[\w.]*)[ \t]+import[ \t]+(\([^)]*\)|[^\n#]+)").expect("valid regex")
});

static IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*import[ \t]+([^\n#]+)").expect("valid regex"));

/// Python analyzer
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonRegexAnalyzer;

impl PythonRegexAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageAnalyzer for PythonRegexAnalyzer {
    fn name(&self) -> &'static str {
        "python-regex"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn analyze_file(&self, path: &str, content: &str) -> SemanticFile {
        let mut file = SemanticFile::empty(path, language_name(path));
        file.imports = extract_imports(content);

        let lines: Vec<&str> = content.lines().collect();
        let mut classes: Vec<(SymbolEntry, usize)> = CLASS
            .captures_iter(content)
            .map(|cap| {
                let line = line_at(content, cap.get(0).map(|m| m.start()).unwrap_or(0));
                let name = &cap[1];
                let mut entry = SymbolEntry::new(name, SymbolKind::Class, line, is_public(name));
                entry.extends = cap
                    .get(2)
                    .map(|bases| {
                        bases
                            .as_str()
                            .split(',')
                            .map(str::trim)
                            .filter(|b| !b.is_empty() && !b.contains('='))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                entry.jsdoc = docstring_after(&lines, line);
                (entry, block_end(&lines, line))
            })
            .collect();

        for cap in DEF.captures_iter(content) {
            let line = line_at(content, cap.get(0).map(|m| m.start()).unwrap_or(0));
            let indented = !cap[1].is_empty();
            let name = &cap[3];

            let mut entry = SymbolEntry::new(name, SymbolKind::Function, line, false);
            entry.is_async = cap.get(2).is_some();
            entry.parameters = python_parameters(&cap[4]);
            entry.return_type = cap.get(5).map(|m| clean_type_annotation(m.as_str()));
            entry.jsdoc = docstring_after(&lines, line);

            if !indented {
                entry.exported = is_public(name);
                file.functions.push(entry);
                continue;
            }

            // Indented def: a method when it sits inside a top-level class body
            if let Some((class, _)) = classes
                .iter_mut()
                .find(|(c, end)| c.line < line && line <= *end)
            {
                entry.kind = SymbolKind::Method;
                class.members.push(entry);
            }
        }

        file.classes = classes.into_iter().map(|(c, _)| c).collect();

        let mut exports: Vec<ExportEntry> = file
            .declarations()
            .filter(|d| d.exported)
            .map(|d| ExportEntry {
                name: d.name.clone(),
                kind: d.kind,
                line: d.line,
                is_default: false,
            })
            .collect();
        exports.sort_by_key(|e| e.line);
        file.exports = exports;
        file
    }
}

fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}

fn python_parameters(list: &str) -> Vec<Parameter> {
    parse_parameter_list(list)
        .into_iter()
        .filter(|p| !matches!(p.name.as_str(), "self" | "cls" | "*" | "/"))
        .collect()
}

/// Last line (1-indexed) of the indented block opened at `header_line`
fn block_end(lines: &[&str], header_line: usize) -> usize {
    let mut end = header_line;
    for (idx, line) in lines.iter().enumerate().skip(header_line) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.len() == line.len() {
            break;
        }
        end = idx + 1;
    }
    end
}

/// Triple-quoted docstring on the first non-blank line after a header
fn docstring_after(lines: &[&str], header_line: usize) -> Option<String> {
    let mut iter = lines.iter().skip(header_line).skip_while(|l| l.trim().is_empty());
    let first = iter.next()?.trim();
    let quote = ["\"\"\"", "'''"].into_iter().find(|q| first.starts_with(q))?;

    let rest = &first[quote.len()..];
    if let Some(end) = rest.find(quote) {
        let doc = rest[..end].trim();
        return (!doc.is_empty()).then(|| doc.to_string());
    }

    let mut body = vec![rest.trim().to_string()];
    for line in iter {
        let trimmed = line.trim();
        if let Some(end) = trimmed.find(quote) {
            body.push(trimmed[..end].trim().to_string());
            break;
        }
        body.push(trimmed.to_string());
    }
    let doc = body
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!doc.is_empty()).then_some(doc)
}

fn extract_imports(content: &str) -> Vec<ImportEntry> {
    let mut found: Vec<(usize, ImportEntry)> = Vec::new();

    for cap in FROM_IMPORT.captures_iter(content) {
        let names = cap[2].trim().trim_start_matches('(').trim_end_matches(')');
        let specifiers = names
            .split(',')
            .filter_map(|n| n.split_whitespace().next())
            .map(str::to_string)
            .collect();
        found.push((
            cap.get(0).map(|m| m.start()).unwrap_or(0),
            ImportEntry {
                source: cap[1].to_string(),
                specifiers,
                is_type_only: false,
                is_default: false,
            },
        ));
    }

    for cap in IMPORT.captures_iter(content) {
        let offset = cap.get(0).map(|m| m.start()).unwrap_or(0);
        for module in cap[1].split(',') {
            let mut words = module.split_whitespace();
            let Some(source) = words.next() else {
                continue;
            };
            let bound = match (words.next(), words.next()) {
                (Some("as"), Some(alias)) => alias,
                _ => source,
            };
            found.push((
                offset,
                ImportEntry {
                    source: source.to_string(),
                    specifiers: vec![bound.to_string()],
                    is_type_only: false,
                    is_default: true,
                },
            ));
        }
    }

    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, import)| import).collect()
}
