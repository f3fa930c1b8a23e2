//! Cross-cutting annotations: ANCHOR, WARN, NOTE and TODO
//!
//! - ANCHOR marks declarations many other files import (fan-in).
//! - WARN flags signature and source-shape complexity.
//! - NOTE/TODO come from markers written in the code.
//!
//! [`generate`] is pure over the semantics layer plus file contents;
//! [`apply`] writes the result back into the layer.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::config::AnnotationThresholds;
use crate::schema::{
    AnchorSummary, AnnotationSummary, AnnotationTag, MxAnnotation, SemanticFile, SemanticsLayer,
    SymbolEntry, SymbolKind, WarningSummary,
};

/// Number of anchors kept in the summary
pub const TOP_ANCHORS_LIMIT: usize = 20;
/// Number of warnings kept in the summary
pub const WARNINGS_LIMIT: usize = 30;

static MX_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)@MX:(ANCHOR|WARN|NOTE|TODO)\b[:\s]*(.*)").expect("valid regex")
});

static CONVENTIONAL_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?://|#|/\*|^\s*\*|<!--)\s*(TODO|FIXME|HACK|XXX)\b[:\s]*(.*)").expect("valid regex")
});

/// Annotations grouped by file plus the layer-wide summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationResult {
    pub by_file: BTreeMap<String, Vec<MxAnnotation>>,
    pub summary: AnnotationSummary,
}

/// Compute every annotation for the layer.
///
/// Files that can no longer be read still get ANCHOR and signature WARN
/// annotations; only the source-based checks are skipped.
pub fn generate(
    semantics: &SemanticsLayer,
    project_root: &Path,
    thresholds: &AnnotationThresholds,
) -> AnnotationResult {
    let mut by_file: BTreeMap<String, Vec<MxAnnotation>> = BTreeMap::new();

    for (path, anchor) in fan_in_anchors(&semantics.files, thresholds.anchor_fan_in) {
        by_file.entry(path).or_default().push(anchor);
    }

    for file in &semantics.files {
        let entry = by_file.entry(file.path.clone()).or_default();
        entry.extend(signature_warnings(file, thresholds));

        match fs::read_to_string(project_root.join(&file.path)) {
            Ok(content) => {
                entry.extend(source_warnings(file, &content, thresholds));
                entry.extend(markers(file, &content));
            }
            Err(e) => tracing::debug!("[ANNOTATE] Skipping source checks for {}: {}", file.path, e),
        }
    }

    by_file.retain(|_, list| !list.is_empty());
    for list in by_file.values_mut() {
        list.sort_by_key(|a| a.line);
    }

    let summary = summarize(&by_file);
    tracing::debug!("[ANNOTATE] {} annotations across {} files", summary.total, by_file.len());
    AnnotationResult { by_file, summary }
}

/// Attach annotations to files and same-named exported symbols, set the summary.
///
/// Previous annotations are cleared first.
pub fn apply(semantics: &mut SemanticsLayer, result: AnnotationResult) {
    let AnnotationResult { mut by_file, summary } = result;

    for file in &mut semantics.files {
        file.annotations.clear();
        for decl in file.declarations_mut() {
            decl.annotations.clear();
        }

        let Some(annotations) = by_file.remove(&file.path) else {
            continue;
        };
        for annotation in &annotations {
            let Some(symbol) = annotation.symbol_name.as_deref() else {
                continue;
            };
            for decl in file.declarations_mut().filter(|d| d.exported && d.name == symbol) {
                decl.annotations.push(annotation.clone());
            }
        }
        file.annotations = annotations;
    }

    semantics.annotation_summary = Some(summary);
}

// ============================================================================
// ANCHOR
// ============================================================================

fn fan_in_anchors(files: &[SemanticFile], threshold: usize) -> Vec<(String, MxAnnotation)> {
    // specifier name -> importing files, built once
    let mut importers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for file in files {
        for import in &file.imports {
            for spec in &import.specifiers {
                importers.entry(spec.as_str()).or_default().insert(file.path.as_str());
            }
        }
    }

    // name -> (first declaring file, line, every declaring file); files are in path order
    let mut declared: BTreeMap<&str, (&str, usize, BTreeSet<&str>)> = BTreeMap::new();
    for file in files {
        let names = file
            .exports
            .iter()
            .map(|e| (e.name.as_str(), e.line))
            .chain(file.declarations().map(|d| (d.name.as_str(), d.line)));
        for (name, line) in names {
            declared
                .entry(name)
                .or_insert_with(|| (file.path.as_str(), line, BTreeSet::new()))
                .2
                .insert(file.path.as_str());
        }
    }

    let mut anchors = Vec::new();
    for (name, (first_file, line, declaring)) in declared {
        let Some(users) = importers.get(name) else {
            continue;
        };
        let external: Vec<&str> = users.difference(&declaring).copied().collect();
        let fan_in = external.len();
        if fan_in == 0 || fan_in < threshold {
            continue;
        }
        let mut metadata = BTreeMap::new();
        metadata.insert("fanIn".to_string(), json!(fan_in));
        metadata.insert("importers".to_string(), json!(external));
        anchors.push((
            first_file.to_string(),
            MxAnnotation {
                tag: AnnotationTag::Anchor,
                message: format!("High fan-in: imported by {} files", fan_in),
                line,
                symbol_name: Some(name.to_string()),
                metadata,
            },
        ));
    }
    anchors
}

// ============================================================================
// WARN
// ============================================================================

/// Functions plus class methods, ordered by line
fn callables(file: &SemanticFile) -> Vec<&SymbolEntry> {
    let mut out: Vec<&SymbolEntry> = file
        .functions
        .iter()
        .chain(
            file.classes
                .iter()
                .flat_map(|c| c.members.iter())
                .filter(|m| m.kind == SymbolKind::Method),
        )
        .collect();
    out.sort_by_key(|s| s.line);
    out
}

fn warn(message: String, line: usize, symbol: &str, metadata: BTreeMap<String, serde_json::Value>) -> MxAnnotation {
    MxAnnotation {
        tag: AnnotationTag::Warn,
        message,
        line,
        symbol_name: Some(symbol.to_string()),
        metadata,
    }
}

fn signature_warnings(file: &SemanticFile, thresholds: &AnnotationThresholds) -> Vec<MxAnnotation> {
    let mut out = Vec::new();
    for f in callables(file) {
        let count = f.parameters.len();
        if count >= thresholds.max_parameters {
            let mut metadata = BTreeMap::new();
            metadata.insert("parameterCount".to_string(), json!(count));
            out.push(warn(
                format!("High parameter count: {} has {} parameters", f.name, count),
                f.line,
                &f.name,
                metadata,
            ));
        }

        let any_params = f
            .parameters
            .iter()
            .any(|p| is_any(p.type_annotation.as_deref()));
        if any_params || is_any(f.return_type.as_deref()) {
            out.push(warn(
                format!("Uses any type: {} weakens type checking", f.name),
                f.line,
                &f.name,
                BTreeMap::new(),
            ));
        }
    }
    out
}

/// TypeScript `any` and Python `Any` / `typing.Any`
fn is_any(annotation: Option<&str>) -> bool {
    matches!(annotation.map(str::trim), Some("any" | "Any" | "typing.Any"))
}

fn source_warnings(file: &SemanticFile, content: &str, thresholds: &AnnotationThresholds) -> Vec<MxAnnotation> {
    let mut out = Vec::new();
    let total_lines = content.lines().count();
    let fns = callables(file);

    for (i, f) in fns.iter().enumerate() {
        let end = fns
            .get(i + 1)
            .map(|next| next.line)
            .unwrap_or(total_lines + 1);
        let span = end.saturating_sub(f.line);
        if span >= thresholds.max_function_lines {
            let mut metadata = BTreeMap::new();
            metadata.insert("lines".to_string(), json!(span));
            out.push(warn(
                format!("Long function: {} spans {} lines", f.name, span),
                f.line,
                &f.name,
                metadata,
            ));
        }
    }

    let (depth, line) = max_brace_depth(content, file.language == "python");
    if depth >= thresholds.max_nesting_depth {
        let owner = fns.iter().rev().find(|f| f.line <= line).or(fns.first());
        let mut metadata = BTreeMap::new();
        metadata.insert("depth".to_string(), json!(depth));
        out.push(MxAnnotation {
            tag: AnnotationTag::Warn,
            message: format!("Deep nesting: depth {}", depth),
            line: owner.map(|f| f.line).unwrap_or(line),
            symbol_name: owner.map(|f| f.name.clone()),
            metadata,
        });
    }
    out
}

/// Deepest brace nesting and the line where it is first reached.
///
/// String literals and line comments are skipped; template literals may span
/// lines.
pub fn max_brace_depth(content: &str, hash_comments: bool) -> (usize, usize) {
    let mut depth = 0usize;
    let mut max = (0usize, 0usize);
    let mut in_string: Option<char> = None;

    for (idx, line) in content.lines().enumerate() {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if let Some(quote) = in_string {
                if c == '\\' {
                    chars.next();
                } else if c == quote {
                    in_string = None;
                }
                continue;
            }
            match c {
                '"' | '\'' | '`' => in_string = Some(c),
                '/' if chars.peek() == Some(&'/') => break,
                '#' if hash_comments => break,
                '{' => {
                    depth += 1;
                    if depth > max.0 {
                        max = (depth, idx + 1);
                    }
                }
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        if matches!(in_string, Some('"') | Some('\'')) {
            in_string = None;
        }
    }
    max
}

// ============================================================================
// NOTE / TODO markers
// ============================================================================

fn markers(file: &SemanticFile, content: &str) -> Vec<MxAnnotation> {
    let fns = callables(file);
    let owner = |line: usize| {
        fns.iter()
            .rev()
            .find(|f| f.line <= line)
            .map(|f| f.name.clone())
    };

    let mut out = Vec::new();
    for (idx, text) in content.lines().enumerate() {
        let line = idx + 1;
        if let Some(cap) = MX_MARKER.captures(text) {
            let Some(tag) = AnnotationTag::parse(&cap[1]) else {
                continue;
            };
            out.push(MxAnnotation {
                tag,
                message: clean_marker_text(&cap[2]),
                line,
                symbol_name: owner(line),
                metadata: BTreeMap::new(),
            });
            continue;
        }
        if let Some(cap) = CONVENTIONAL_MARKER.captures(text) {
            let mut metadata = BTreeMap::new();
            metadata.insert("marker".to_string(), json!(&cap[1]));
            out.push(MxAnnotation {
                tag: AnnotationTag::Todo,
                message: clean_marker_text(&cap[2]),
                line,
                symbol_name: owner(line),
                metadata,
            });
        }
    }
    out
}

fn clean_marker_text(raw: &str) -> String {
    raw.trim()
        .trim_end_matches("-->")
        .trim_end_matches("*/")
        .trim()
        .to_string()
}

// ============================================================================
// Summary
// ============================================================================

fn summarize(by_file: &BTreeMap<String, Vec<MxAnnotation>>) -> AnnotationSummary {
    let mut summary = AnnotationSummary::default();
    let mut anchors = Vec::new();

    for (path, list) in by_file {
        for a in list {
            summary.total += 1;
            *summary.by_tag.entry(a.tag.as_str().to_string()).or_insert(0) += 1;

            match a.tag {
                AnnotationTag::Anchor => anchors.push(AnchorSummary {
                    symbol: a.symbol_name.clone().unwrap_or_default(),
                    file: path.clone(),
                    fan_in: a
                        .metadata
                        .get("fanIn")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as usize,
                }),
                AnnotationTag::Warn if summary.warnings.len() < WARNINGS_LIMIT => {
                    summary.warnings.push(WarningSummary {
                        file: path.clone(),
                        line: a.line,
                        symbol: a.symbol_name.clone(),
                        message: a.message.clone(),
                    })
                }
                _ => {}
            }
        }
    }

    // stable: equal fan-in keeps path order
    anchors.sort_by(|a, b| b.fan_in.cmp(&a.fan_in));
    anchors.truncate(TOP_ANCHORS_LIMIT);
    summary.top_anchors = anchors;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::AnalyzerRegistry;
    use crate::config::ExcludeSet;
    use crate::{semantics, structure};
    use tempfile::TempDir;

    fn project(files: &[(&str, String)]) -> (TempDir, SemanticsLayer) {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let layer = structure::scan(dir.path(), &ExcludeSet::default(), 10).unwrap();
        let registry = AnalyzerRegistry::default();
        let langs = vec!["typescript".to_string(), "python".to_string()];
        let built = semantics::build(dir.path(), &layer, &langs, &registry);
        (dir, built.layer)
    }

    fn importer(i: usize) -> (String, String) {
        (
            format!("src/user{}.ts", i),
            "import { loadConfig } from './config';\nexport const x = loadConfig('a');\n".to_string(),
        )
    }

    fn with_importers(count: usize) -> Vec<(String, String)> {
        let mut files = vec![(
            "src/config.ts".to_string(),
            "export function loadConfig(path: string) {\n  return path;\n}\n".to_string(),
        )];
        files.extend((0..count).map(importer));
        files
    }

    fn run(files: Vec<(String, String)>) -> AnnotationResult {
        let refs: Vec<(&str, String)> = files.iter().map(|(p, c)| (p.as_str(), c.clone())).collect();
        let (dir, layer) = project(&refs);
        generate(&layer, dir.path(), &AnnotationThresholds::default())
    }

    fn tagged<'a>(result: &'a AnnotationResult, tag: AnnotationTag) -> Vec<&'a MxAnnotation> {
        result
            .by_file
            .values()
            .flatten()
            .filter(|a| a.tag == tag)
            .collect()
    }

    #[test]
    fn test_anchor_at_threshold() {
        let result = run(with_importers(3));
        let anchors = tagged(&result, AnnotationTag::Anchor);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].symbol_name.as_deref(), Some("loadConfig"));
        assert_eq!(anchors[0].metadata["fanIn"], json!(3));
        assert_eq!(anchors[0].metadata["importers"].as_array().unwrap().len(), 3);
        assert!(result.by_file["src/config.ts"].iter().any(|a| a.tag == AnnotationTag::Anchor));
        assert_eq!(result.summary.top_anchors[0].fan_in, 3);
    }

    #[test]
    fn test_no_anchor_below_threshold() {
        let result = run(with_importers(2));
        assert!(tagged(&result, AnnotationTag::Anchor).is_empty());
        assert!(result.summary.top_anchors.is_empty());
    }

    #[test]
    fn test_declaring_file_does_not_count_toward_fan_in() {
        let mut files = with_importers(2);
        files.push((
            "src/also.ts".to_string(),
            "import { loadConfig } from './config';\nexport function loadConfig() {}\n".to_string(),
        ));
        let result = run(files);
        assert!(tagged(&result, AnnotationTag::Anchor).is_empty());
    }

    #[test]
    fn test_top_anchors_sorted_by_fan_in() {
        let mut files = vec![(
            "src/lib.ts".to_string(),
            "export function small() {}\nexport function big() {}\n".to_string(),
        )];
        for i in 0..3 {
            files.push((format!("src/s{}.ts", i), "import { small } from './lib';\n".to_string()));
        }
        for i in 0..5 {
            files.push((format!("src/b{}.ts", i), "import { big } from './lib';\n".to_string()));
        }
        let result = run(files);
        let fan_ins: Vec<usize> = result.summary.top_anchors.iter().map(|a| a.fan_in).collect();
        assert_eq!(fan_ins, vec![5, 3]);
        assert_eq!(result.summary.top_anchors[0].symbol, "big");
    }

    #[test]
    fn test_parameter_count_warning() {
        let src = "export function five(a: number, b: number, c: number, d: number, e: number) {\n  return a;\n}\nexport function four(a: number, b: number, c: number, d: number) {\n  return a;\n}\n";
        let result = run(vec![("src/p.ts".to_string(), src.to_string())]);
        let warns = tagged(&result, AnnotationTag::Warn);
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].symbol_name.as_deref(), Some("five"));
        assert!(warns[0].message.contains("parameter count"));
    }

    #[test]
    fn test_any_type_warning() {
        let src = "export function loose(a: any): string {\n  return a;\n}\n";
        let result = run(vec![("src/any.ts".to_string(), src.to_string())]);
        let warns = tagged(&result, AnnotationTag::Warn);
        assert_eq!(warns.len(), 1);
        assert!(warns[0].message.contains("any type"));
    }

    #[test]
    fn test_python_any_warning() {
        let src = "from typing import Any\nimport typing\n\ndef f(a: Any) -> Any:\n    return a\n\ndef g(b: typing.Any):\n    return b\n\ndef h(c: int) -> Anything:\n    return c\n";
        let result = run(vec![("pkg/loose.py".to_string(), src.to_string())]);
        let mut names: Vec<&str> = tagged(&result, AnnotationTag::Warn)
            .iter()
            .filter(|a| a.message.contains("any type"))
            .filter_map(|a| a.symbol_name.as_deref())
            .collect();
        names.sort();
        assert_eq!(names, vec!["f", "g"]);
    }

    #[test]
    fn test_long_function_warning_only() {
        let mut src = String::from("export function long(a: number, b: number, c: number) {\n");
        for i in 0..58 {
            src.push_str(&format!("  const v{} = a + b + c;\n", i));
        }
        src.push_str("}\n");
        assert_eq!(src.lines().count(), 60);

        let result = run(vec![("src/long.ts".to_string(), src)]);
        let warns = tagged(&result, AnnotationTag::Warn);
        assert_eq!(warns.len(), 1);
        assert!(warns[0].message.starts_with("Long function"));
        assert_eq!(warns[0].metadata["lines"], json!(60));
    }

    #[test]
    fn test_short_function_with_five_params_gets_parameter_warning_only() {
        let mut src = String::from("export function wide(a: number, b: number, c: number, d: number, e: number) {\n");
        for i in 0..8 {
            src.push_str(&format!("  const v{} = a;\n", i));
        }
        src.push_str("}\n");
        let result = run(vec![("src/wide.ts".to_string(), src)]);
        let warns = tagged(&result, AnnotationTag::Warn);
        assert_eq!(warns.len(), 1);
        assert!(warns[0].message.starts_with("High parameter count"));
    }

    #[test]
    fn test_nesting_warning_attributed_to_enclosing_function() {
        let src = "export function first() {}\nexport function nested(x: number) {\n  if (x) {\n    for (;;) {\n      const s = \"{{{\"; // {\n    }\n  }\n}\n";
        let result = run(vec![("src/n.ts".to_string(), src.to_string())]);
        let warns = tagged(&result, AnnotationTag::Warn);
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].symbol_name.as_deref(), Some("nested"));
        assert_eq!(warns[0].metadata["depth"], json!(3));
    }

    #[test]
    fn test_max_brace_depth_skips_strings_and_comments() {
        assert_eq!(max_brace_depth("a { b { } }", false).0, 2);
        assert_eq!(max_brace_depth("x = '{{{'; // {{{\n{", false), (1, 2));
        assert_eq!(max_brace_depth("d = {} # {{{", true).0, 1);
    }

    #[test]
    fn test_markers() {
        let src = "// @MX:NOTE cache invalidated on write\nexport function f() {\n  // TODO: handle retries\n  // @mx:warn fragile ordering\n  return 1; /* FIXME later */\n}\n";
        let result = run(vec![("src/m.ts".to_string(), src.to_string())]);
        let list = &result.by_file["src/m.ts"];
        let tags: Vec<(AnnotationTag, usize)> = list.iter().map(|a| (a.tag, a.line)).collect();
        assert_eq!(
            tags,
            vec![
                (AnnotationTag::Note, 1),
                (AnnotationTag::Todo, 3),
                (AnnotationTag::Warn, 4),
                (AnnotationTag::Todo, 5),
            ]
        );
        assert_eq!(list[0].message, "cache invalidated on write");
        assert_eq!(list[1].message, "handle retries");
        assert_eq!(list[1].symbol_name.as_deref(), Some("f"));
        assert_eq!(list[3].message, "later");
        assert_eq!(result.summary.by_tag["TODO"], 2);
    }

    #[test]
    fn test_apply_attaches_to_exported_symbols() {
        let files = with_importers(3);
        let refs: Vec<(&str, String)> = files.iter().map(|(p, c)| (p.as_str(), c.clone())).collect();
        let (dir, mut layer) = project(&refs);
        let result = generate(&layer, dir.path(), &AnnotationThresholds::default());
        apply(&mut layer, result);

        let config = layer.files.iter().find(|f| f.path == "src/config.ts").unwrap();
        assert_eq!(config.annotations.len(), 1);
        assert_eq!(config.functions[0].annotations.len(), 1);
        assert_eq!(layer.annotation_summary.as_ref().unwrap().total, 1);

        // applying again replaces rather than accumulates
        let again = generate(&layer, dir.path(), &AnnotationThresholds::default());
        apply(&mut layer, again);
        let config = layer.files.iter().find(|f| f.path == "src/config.ts").unwrap();
        assert_eq!(config.functions[0].annotations.len(), 1);
    }
}
