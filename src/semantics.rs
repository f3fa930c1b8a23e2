//! Semantics builder: per-file analysis, symbol index and dependency graph
//!
//! Files are analyzed in parallel on the rayon pool. Anything that goes
//! wrong with a single file becomes a warning; the layer itself always
//! builds.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde_json::Value;

use crate::analyzers::AnalyzerRegistry;
use crate::incremental::FileChanges;
use crate::schema::{
    DependencyGraph, ExternalDependency, SemanticFile, SemanticsLayer, StructureLayer, SymbolIndex,
    SymbolLocation,
};
use crate::structure::is_relative_specifier;

/// Manifest read for external dependency versions
pub const MANIFEST_FILE: &str = "package.json";

const MANIFEST_DEPENDENCY_TABLES: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// Layer plus the per-file problems met while building it
#[derive(Debug, Clone, Default)]
pub struct SemanticsBuild {
    pub layer: SemanticsLayer,
    pub warnings: Vec<String>,
}

/// Full build over every configured, handled file in the structure tree
pub fn build(
    project_root: &Path,
    structure: &StructureLayer,
    languages: &[String],
    registry: &AnalyzerRegistry,
) -> SemanticsBuild {
    let candidates = candidate_files(structure, languages, registry);
    let paths: Vec<&str> = candidates.iter().map(String::as_str).collect();
    let (files, warnings) = analyze_paths(project_root, &paths, registry);

    tracing::debug!(
        "[SEMANTICS] Analyzed {} of {} candidate files ({} warnings)",
        files.len(),
        candidates.len(),
        warnings.len()
    );

    SemanticsBuild {
        layer: assemble(project_root, files, structure),
        warnings,
    }
}

/// Re-analyze only added and modified files, then rebuild the index and graph.
pub fn update_incremental(
    project_root: &Path,
    existing: &SemanticsLayer,
    structure: &StructureLayer,
    changes: &FileChanges,
    languages: &[String],
    registry: &AnalyzerRegistry,
) -> SemanticsBuild {
    let removed: BTreeSet<&str> = changes
        .deleted
        .iter()
        .chain(changes.modified.iter())
        .map(String::as_str)
        .collect();

    let mut files: Vec<SemanticFile> = existing
        .files
        .iter()
        .filter(|f| !removed.contains(f.path.as_str()))
        .cloned()
        .collect();

    let candidates: BTreeSet<String> = candidate_files(structure, languages, registry).into_iter().collect();
    let to_analyze: Vec<&str> = changes
        .added
        .iter()
        .chain(changes.modified.iter())
        .filter(|p| candidates.contains(p.as_str()))
        .map(String::as_str)
        .collect();

    let (fresh, warnings) = analyze_paths(project_root, &to_analyze, registry);
    tracing::debug!(
        "[SEMANTICS] Incremental: kept {}, re-analyzed {}",
        files.len(),
        fresh.len()
    );

    // A file can only appear once
    let fresh_paths: BTreeSet<&str> = fresh.iter().map(|f| f.path.as_str()).collect();
    files.retain(|f| !fresh_paths.contains(f.path.as_str()));
    files.extend(fresh);

    SemanticsBuild {
        layer: assemble(project_root, files, structure),
        warnings,
    }
}

fn candidate_files(structure: &StructureLayer, languages: &[String], registry: &AnalyzerRegistry) -> Vec<String> {
    structure
        .tree
        .files()
        .into_iter()
        .filter(|node| {
            node.language()
                .map(|lang| languages.iter().any(|l| l.eq_ignore_ascii_case(lang)))
                .unwrap_or(false)
        })
        .filter(|node| registry.can_handle(Path::new(&node.path)))
        .map(|node| node.path.clone())
        .collect()
}

fn analyze_paths(
    project_root: &Path,
    paths: &[&str],
    registry: &AnalyzerRegistry,
) -> (Vec<SemanticFile>, Vec<String>) {
    let outcomes: Vec<std::result::Result<Option<SemanticFile>, String>> = paths
        .par_iter()
        .map(|rel| match fs::read_to_string(project_root.join(rel)) {
            Ok(content) => Ok(registry.analyze(rel, &content)),
            Err(e) => Err(format!("Skipped {}: {}", rel, e)),
        })
        .collect();

    let mut files = Vec::new();
    let mut warnings = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(Some(file)) => files.push(file),
            Ok(None) => {}
            Err(warning) => {
                tracing::warn!("[SEMANTICS] {}", warning);
                warnings.push(warning);
            }
        }
    }
    (files, warnings)
}

fn assemble(project_root: &Path, mut files: Vec<SemanticFile>, structure: &StructureLayer) -> SemanticsLayer {
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);

    let symbols = build_symbol_index(&files);
    let manifest_versions = read_manifest_versions(project_root);
    let dependencies = build_dependency_graph(&files, structure, &manifest_versions);

    SemanticsLayer {
        files,
        symbols,
        dependencies,
        annotation_summary: None,
    }
}

/// Name index over exports plus non-exported top-level declarations
pub fn build_symbol_index(files: &[SemanticFile]) -> SymbolIndex {
    let mut index = SymbolIndex::default();

    for file in files {
        for export in &file.exports {
            index
                .by_name
                .entry(export.name.clone())
                .or_default()
                .push(SymbolLocation {
                    file: file.path.clone(),
                    line: export.line,
                    kind: export.kind,
                });
            index.exported_count += 1;
        }
        for decl in file.declarations().filter(|d| !d.exported) {
            index
                .by_name
                .entry(decl.name.clone())
                .or_default()
                .push(SymbolLocation {
                    file: file.path.clone(),
                    line: decl.line,
                    kind: decl.kind,
                });
        }
        index.total_count += file.symbol_count();
    }

    index
}

/// Package a bare specifier belongs to, `None` for relative specifiers
pub fn package_name(specifier: &str, language: &str) -> Option<String> {
    let spec = specifier.trim();
    if spec.is_empty() || is_relative_specifier(spec) || spec.starts_with('/') {
        return None;
    }
    if language == "python" {
        return spec.split('.').next().map(str::to_string);
    }
    let mut segments = spec.split('/');
    let first = segments.next()?;
    if first.starts_with('@') {
        return match segments.next() {
            Some(second) => Some(format!("{}/{}", first, second)),
            None => Some(first.to_string()),
        };
    }
    Some(first.to_string())
}

fn build_dependency_graph(
    files: &[SemanticFile],
    structure: &StructureLayer,
    versions: &BTreeMap<String, String>,
) -> DependencyGraph {
    let internal = structure
        .modules
        .iter()
        .filter(|m| is_relative_specifier(&m.target))
        .cloned()
        .collect();

    let mut consumers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for file in files {
        for import in &file.imports {
            if let Some(package) = package_name(&import.source, &file.language) {
                consumers.entry(package).or_default().insert(file.path.clone());
            }
        }
    }

    let external = consumers
        .into_iter()
        .map(|(name, used_by)| ExternalDependency {
            version: versions.get(&name).cloned(),
            name,
            used_by: used_by.into_iter().collect(),
        })
        .collect();

    DependencyGraph { internal, external }
}

/// Versions from every dependency table of the manifest.
///
/// A missing or malformed manifest yields an empty map.
pub fn read_manifest_versions(project_root: &Path) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    let Some(manifest) = read_manifest(project_root) else {
        return versions;
    };
    for table in MANIFEST_DEPENDENCY_TABLES {
        if let Some(Value::Object(entries)) = manifest.get(*table) {
            for (name, version) in entries {
                if let Some(v) = version.as_str() {
                    versions.entry(name.clone()).or_insert_with(|| v.to_string());
                }
            }
        }
    }
    versions
}

/// Parsed manifest, if present and valid JSON
pub fn read_manifest(project_root: &Path) -> Option<Value> {
    let text = fs::read_to_string(project_root.join(MANIFEST_FILE)).ok()?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("[SEMANTICS] Ignoring malformed {}: {}", MANIFEST_FILE, e);
            None
        }
    }
}
