//! Inputs of the domain steps, gathered once per build
//!
//! Hosts that run their own analysis get this instead of a domain layer.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzers::common::truncate_to_char_boundary;
use crate::domain::docs;
use crate::schema::{SemanticsLayer, StructureLayer, SymbolKind};
use crate::structure::render_tree;

pub const TREE_PREVIEW_LIMIT: usize = 50;
pub const EXPORTED_SIGNATURE_LIMIT: usize = 30;
pub const CLASS_SIGNATURE_LIMIT: usize = 40;
pub const INTERFACE_SIGNATURE_LIMIT: usize = 40;
pub const RELATION_SAMPLE_LIMIT: usize = 30;
pub const TEST_SYMBOL_LIMIT: usize = 30;
pub const ENTRY_POINT_LIMIT: usize = 20;
const MANIFEST_EXCERPT_LIMIT: usize = 2000;

/// Manifests tried in order for the project summary
const MANIFEST_CANDIDATES: &[&str] = &["package.json", "pyproject.toml", "Cargo.toml", "go.mod"];

const ENTRY_POINT_MARKERS: &[&str] = &["index", "main", "cli"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainContext {
    pub tree_preview: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_excerpt: Option<String>,
    pub entry_points: Vec<String>,
    pub dependency_names: Vec<String>,
    pub exported_signatures: Vec<String>,
    pub class_signatures: Vec<String>,
    pub interface_signatures: Vec<String>,
    pub module_relations: Vec<String>,
    pub test_files: Vec<String>,
    pub test_symbols: Vec<String>,
    pub schema_signatures: Vec<String>,
    pub doc_files: Vec<String>,
}

impl DomainContext {
    pub fn collect(project_root: &Path, structure: &StructureLayer, semantics: &SemanticsLayer) -> Self {
        let all_files: Vec<&str> = structure.tree.files().iter().map(|f| f.path.as_str()).collect();
        let test_files: Vec<String> = all_files
            .iter()
            .filter(|p| is_test_file(p))
            .map(|p| p.to_string())
            .collect();

        let entry_points = semantics
            .files
            .iter()
            .map(|f| f.path.as_str())
            .filter(|p| is_entry_point(p))
            .take(ENTRY_POINT_LIMIT)
            .map(str::to_string)
            .collect();

        let exported_signatures = semantics
            .files
            .iter()
            .flat_map(|f| f.declarations())
            .filter(|d| d.exported)
            .take(EXPORTED_SIGNATURE_LIMIT)
            .map(|d| d.signature())
            .collect();

        let class_signatures = semantics
            .files
            .iter()
            .flat_map(|f| f.classes.iter())
            .take(CLASS_SIGNATURE_LIMIT)
            .map(|c| c.signature())
            .collect();

        let interface_signatures = semantics
            .files
            .iter()
            .flat_map(|f| f.interfaces.iter())
            .take(INTERFACE_SIGNATURE_LIMIT)
            .map(|i| i.signature())
            .collect();

        let schema_signatures = semantics
            .files
            .iter()
            .flat_map(|f| f.interfaces.iter().chain(f.types.iter().filter(|t| t.kind == SymbolKind::Type)))
            .take(INTERFACE_SIGNATURE_LIMIT)
            .map(|s| s.signature())
            .collect();

        let module_relations = structure
            .modules
            .iter()
            .take(RELATION_SAMPLE_LIMIT)
            .map(|m| format!("{} -> {} ({})", m.source, m.target, m.kind.as_str()))
            .collect();

        let subjects: BTreeSet<String> = test_files.iter().map(|t| test_subject(t)).collect();
        let test_symbols = semantics
            .files
            .iter()
            .filter(|f| !is_test_file(&f.path) && subjects.contains(&file_stem(&f.path)))
            .flat_map(|f| f.declarations().filter(|d| d.exported))
            .take(TEST_SYMBOL_LIMIT)
            .map(|d| d.signature())
            .collect();

        Self {
            tree_preview: render_tree(&structure.tree, TREE_PREVIEW_LIMIT),
            manifest_excerpt: read_manifest_excerpt(project_root),
            entry_points,
            dependency_names: semantics
                .dependencies
                .external
                .iter()
                .map(|d| d.name.clone())
                .collect(),
            exported_signatures,
            class_signatures,
            interface_signatures,
            module_relations,
            test_files,
            test_symbols,
            schema_signatures,
            doc_files: docs::list_doc_files(project_root),
        }
    }
}

/// Whether a path looks like a test file
pub fn is_test_file(path: &str) -> bool {
    let name = basename(path).to_lowercase();
    [".test.", ".spec.", "_test.", "_spec."]
        .iter()
        .any(|m| name.contains(m))
        || name.starts_with("test_")
        || name.starts_with("test.")
}

fn is_entry_point(path: &str) -> bool {
    let lower = path.to_lowercase();
    ENTRY_POINT_MARKERS.iter().any(|m| lower.contains(m))
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// File name up to the first dot
fn file_stem(path: &str) -> String {
    basename(path).split('.').next().unwrap_or_default().to_lowercase()
}

/// `user.test.ts`, `user_spec.py`, `test_user.py` -> `user`
fn test_subject(path: &str) -> String {
    let stem = file_stem(path);
    let stem = stem.strip_prefix("test_").unwrap_or(&stem);
    let stem = stem
        .strip_suffix("_test")
        .or_else(|| stem.strip_suffix("_spec"))
        .unwrap_or(stem);
    stem.to_string()
}

fn read_manifest_excerpt(project_root: &Path) -> Option<String> {
    MANIFEST_CANDIDATES.iter().find_map(|name| {
        let text = fs::read_to_string(project_root.join(name)).ok()?;
        let excerpt = truncate_to_char_boundary(&text, MANIFEST_EXCERPT_LIMIT);
        Some(format!("{}:\n{}", name, excerpt))
    })
}
