//! Structure scanner: directory tree, file metadata and module relations
//!
//! The scan is a plain depth-first walk. Exclusion is by entry name, see
//! [`ExcludeSet`]; [`crate::config::parse_ignore_patterns`] shows how ignore
//! lines are reduced to names.

pub mod relations;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::config::ExcludeSet;
use crate::error::{OntoError, Result};
use crate::incremental::FileChanges;
use crate::lang::{is_text_like, Language};
use crate::schema::{DirectoryNode, FileInfo, ModuleRelation, NodeType, StructureLayer, StructureStats};

pub use relations::{extract_relations, is_relative_specifier};

/// Join a parent relative path and a child name with `/`
pub fn join_rel(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Scan a project tree.
///
/// # Errors
///
/// Fails only when `project_root` is missing or not a directory. Unreadable
/// subdirectories and files are logged and skipped.
pub fn scan(project_root: &Path, excludes: &ExcludeSet, max_depth: usize) -> Result<StructureLayer> {
    scan_with(project_root, excludes, max_depth, true)
}

/// Rebuild the tree and re-extract relations only for changed files.
///
/// Relations whose source file is untouched are carried over from `existing`.
pub fn update_incremental(
    project_root: &Path,
    existing: &StructureLayer,
    changes: &FileChanges,
    excludes: &ExcludeSet,
    max_depth: usize,
) -> Result<StructureLayer> {
    let mut layer = scan_with(project_root, excludes, max_depth, false)?;

    let touched: BTreeSet<&str> = changes.all().map(String::as_str).collect();
    let present: BTreeSet<String> = layer.tree.files().iter().map(|n| n.path.clone()).collect();

    let mut modules: Vec<ModuleRelation> = existing
        .modules
        .iter()
        .filter(|m| !touched.contains(m.source.as_str()) && present.contains(&m.source))
        .cloned()
        .collect();

    for rel_path in changes.added.iter().chain(changes.modified.iter()) {
        if !present.contains(rel_path) {
            continue;
        }
        let Some(lang) = Language::from_path(Path::new(rel_path)) else {
            continue;
        };
        if !lang.has_module_relations() {
            continue;
        }
        match fs::read_to_string(project_root.join(rel_path)) {
            Ok(content) => modules.extend(extract_relations(rel_path, &content, lang)),
            Err(e) => tracing::debug!("[SCAN] Skipping relations for {}: {}", rel_path, e),
        }
    }

    modules.sort();
    modules.dedup();
    layer.modules = modules;
    Ok(layer)
}

fn scan_with(
    project_root: &Path,
    excludes: &ExcludeSet,
    max_depth: usize,
    extract: bool,
) -> Result<StructureLayer> {
    if !project_root.exists() {
        return Err(OntoError::ProjectNotFound {
            path: project_root.display().to_string(),
        });
    }
    if !project_root.is_dir() {
        return Err(OntoError::NotADirectory {
            path: project_root.display().to_string(),
        });
    }

    let mut walker = Walker {
        excludes,
        max_depth,
        extract,
        modules: Vec::new(),
        stats: StructureStats::default(),
    };

    let root_name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string());
    let tree = walker.walk_dir(project_root, root_name, String::new(), 0);

    let mut modules = walker.modules;
    modules.sort();
    modules.dedup();

    tracing::debug!(
        "[SCAN] {} files, {} dirs, {} relations",
        walker.stats.total_files,
        walker.stats.total_dirs,
        modules.len()
    );

    Ok(StructureLayer {
        root_dir: project_root.display().to_string(),
        tree,
        modules,
        stats: walker.stats,
    })
}

struct Walker<'a> {
    excludes: &'a ExcludeSet,
    max_depth: usize,
    extract: bool,
    modules: Vec<ModuleRelation>,
    stats: StructureStats,
}

impl Walker<'_> {
    fn walk_dir(&mut self, abs: &Path, name: String, rel: String, depth: usize) -> DirectoryNode {
        let mut node = DirectoryNode {
            name,
            path: rel.clone(),
            node_type: NodeType::Directory,
            info: None,
            children: Vec::new(),
        };

        if depth >= self.max_depth {
            return node;
        }

        let entries = match fs::read_dir(abs) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("[SCAN] Cannot read directory {}: {}", abs.display(), e);
                return node;
            }
        };

        let mut entries: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| !self.excludes.matches(&e.file_name().to_string_lossy()))
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let child_name = entry.file_name().to_string_lossy().to_string();
            let child_rel = join_rel(&rel, &child_name);
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("[SCAN] Cannot stat {}: {}", child_rel, e);
                    continue;
                }
            };

            if file_type.is_dir() {
                self.stats.total_dirs += 1;
                let child = self.walk_dir(&entry.path(), child_name, child_rel, depth + 1);
                node.children.push(child);
            } else if file_type.is_file() {
                node.children.push(self.visit_file(&entry.path(), child_name, child_rel));
            }
        }

        node
    }

    fn visit_file(&mut self, abs: &Path, name: String, rel: String) -> DirectoryNode {
        let extension = Path::new(&name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let language = Language::from_extension(&extension);
        let size = fs::metadata(abs).map(|m| m.len()).unwrap_or(0);

        let mut line_count = 0;
        if is_text_like(&extension) {
            if let Ok(content) = fs::read_to_string(abs) {
                line_count = content.lines().count();
                if let Some(lang) = language.filter(|l| self.extract && l.has_module_relations()) {
                    self.modules.extend(extract_relations(&rel, &content, lang));
                }
            }
        }

        self.stats.total_files += 1;
        if let Some(lang) = language {
            *self.stats.by_language.entry(lang.name().to_string()).or_insert(0) += 1;
        }
        if !extension.is_empty() {
            *self.stats.by_extension.entry(extension.clone()).or_insert(0) += 1;
        }

        DirectoryNode {
            name,
            path: rel,
            node_type: NodeType::File,
            info: Some(FileInfo {
                extension,
                size,
                line_count,
                language: language.map(|l| l.name().to_string()),
            }),
            children: Vec::new(),
        }
    }
}

/// Render the tree as indented lines, stopping after `limit` entries
pub fn render_tree(tree: &DirectoryNode, limit: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack: Vec<(&DirectoryNode, usize)> = tree.children.iter().rev().map(|c| (c, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        if lines.len() >= limit {
            lines.push("...".to_string());
            break;
        }
        let suffix = if node.node_type == NodeType::Directory { "/" } else { "" };
        lines.push(format!("{}{}{}", "  ".repeat(depth), node.name, suffix));
        for child in node.children.iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    lines
}
