//! Markdown rendering for the three layers and the ontology index
//!
//! The `render_*` functions are pure. [`write_documents`] puts the results
//! on disk next to the cache.

use std::path::{Path, PathBuf};

use crate::cache::LayerData;
use crate::error::Result;
use crate::fs_utils::write_atomic;
use crate::schema::{AnnotationSummary, DomainLayer, SemanticsLayer, StructureLayer};
use crate::structure::render_tree;

pub const STRUCTURE_DOC: &str = "structure.md";
pub const SEMANTICS_DOC: &str = "semantics.md";
pub const DOMAIN_DOC: &str = "domain.md";
pub const INDEX_DOC: &str = "index.md";

/// Human-maintained files tracked by the index, relative to the project root
pub const COMPANION_FILES: &[&str] = &["PLAN.md", "TODO.md", "CONTEXT.md", "MEMORY.md"];

const TREE_RENDER_LIMIT: usize = 500;
const USED_BY_LIMIT: usize = 5;

/// Keep a value inside one table cell
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn or_dash(text: &str) -> &str {
    if text.trim().is_empty() {
        "-"
    } else {
        text
    }
}

fn push_list(md: &mut String, items: &[String]) {
    for item in items {
        md.push_str(&format!("- {}\n", item));
    }
}

pub fn render_structure(layer: &StructureLayer) -> String {
    let mut md = String::new();
    md.push_str("# Project Structure\n\n");
    md.push_str(&format!("Root: `{}`\n\n", layer.root_dir));

    md.push_str("## Statistics\n\n");
    md.push_str("| Metric | Value |\n|---|---:|\n");
    md.push_str(&format!("| Files | {} |\n", layer.stats.total_files));
    md.push_str(&format!("| Directories | {} |\n", layer.stats.total_dirs));
    md.push_str(&format!("| Module relations | {} |\n\n", layer.modules.len()));

    md.push_str("## Languages\n\n");
    md.push_str("| Language | Files |\n|---|---:|\n");
    for (language, count) in &layer.stats.by_language {
        md.push_str(&format!("| {} | {} |\n", language, count));
    }
    md.push('\n');

    md.push_str("## Directory Tree\n\n```\n");
    for line in render_tree(&layer.tree, TREE_RENDER_LIMIT) {
        md.push_str(&line);
        md.push('\n');
    }
    md.push_str("```\n\n");

    md.push_str("## Module Relations\n\n");
    md.push_str("| Source | Target | Kind |\n|---|---|---|\n");
    for relation in &layer.modules {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            escape_cell(&relation.source),
            escape_cell(&relation.target),
            relation.kind.as_str()
        ));
    }
    md
}

pub fn render_semantics(layer: &SemanticsLayer) -> String {
    let mut md = String::new();
    md.push_str("# Code Semantics\n\n");

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- Files analyzed: {}\n", layer.files.len()));
    md.push_str(&format!("- Symbols: {}\n", layer.symbols.total_count));
    md.push_str(&format!("- Exported: {}\n", layer.symbols.exported_count));
    md.push_str(&format!(
        "- External packages: {}\n\n",
        layer.dependencies.external.len()
    ));

    md.push_str("## Files\n\n");
    for file in &layer.files {
        md.push_str(&format!("### {}\n\n", file.path));
        let mut decls: Vec<_> = file.declarations().collect();
        if decls.is_empty() {
            md.push_str("_No declarations_\n\n");
            continue;
        }
        decls.sort_by_key(|d| d.line);
        md.push_str("| Symbol | Kind | Line | Exported |\n|---|---|---:|---|\n");
        for decl in decls {
            md.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                escape_cell(&decl.signature()),
                decl.kind.as_str(),
                decl.line,
                if decl.exported { "yes" } else { "no" }
            ));
        }
        md.push('\n');
    }

    md.push_str("## Symbol Index\n\n");
    md.push_str("| Name | Kind | File | Line |\n|---|---|---|---:|\n");
    for (name, locations) in &layer.symbols.by_name {
        for loc in locations {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                escape_cell(name),
                loc.kind.as_str(),
                loc.file,
                loc.line
            ));
        }
    }
    md.push('\n');

    md.push_str("## Internal Dependencies\n\n");
    md.push_str("| Source | Target | Kind |\n|---|---|---|\n");
    for relation in &layer.dependencies.internal {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            relation.source,
            escape_cell(&relation.target),
            relation.kind.as_str()
        ));
    }
    md.push('\n');

    md.push_str("## External Dependencies\n\n");
    md.push_str("| Package | Version | Used By |\n|---|---|---|\n");
    for dep in &layer.dependencies.external {
        let mut used_by = dep
            .used_by
            .iter()
            .take(USED_BY_LIMIT)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if dep.used_by.len() > USED_BY_LIMIT {
            used_by.push_str(&format!(" (+{} more)", dep.used_by.len() - USED_BY_LIMIT));
        }
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            dep.name,
            dep.version.as_deref().unwrap_or("-"),
            escape_cell(&used_by)
        ));
    }
    md.push('\n');

    md.push_str("## Annotations\n\n");
    match &layer.annotation_summary {
        Some(summary) => render_annotation_summary(&mut md, summary),
        None => md.push_str("_Not computed_\n"),
    }
    md
}

fn render_annotation_summary(md: &mut String, summary: &AnnotationSummary) {
    md.push_str(&format!("Total: {}\n\n", summary.total));
    md.push_str("| Tag | Count |\n|---|---:|\n");
    for (tag, count) in &summary.by_tag {
        md.push_str(&format!("| {} | {} |\n", tag, count));
    }
    md.push('\n');

    md.push_str("### Anchors\n\n");
    md.push_str("| Symbol | File | Fan-in |\n|---|---|---:|\n");
    for anchor in &summary.top_anchors {
        md.push_str(&format!("| `{}` | {} | {} |\n", anchor.symbol, anchor.file, anchor.fan_in));
    }
    md.push('\n');

    md.push_str("### Warnings\n\n");
    md.push_str("| File | Line | Symbol | Message |\n|---|---:|---|---|\n");
    for warning in &summary.warnings {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            warning.file,
            warning.line,
            warning.symbol.as_deref().unwrap_or("-"),
            escape_cell(&warning.message)
        ));
    }
}

pub fn render_domain(layer: &DomainLayer) -> String {
    let mut md = String::new();
    md.push_str("# Domain Knowledge\n\n");

    md.push_str("## Project Summary\n\n");
    md.push_str(or_dash(&layer.project_summary));
    md.push_str("\n\n");

    let arch = &layer.architecture;
    md.push_str("## Architecture\n\n");
    md.push_str(&format!("**Style:** {}\n\n", or_dash(&arch.style)));
    if !arch.layers.is_empty() {
        md.push_str("**Layers:**\n\n");
        push_list(&mut md, &arch.layers);
        md.push('\n');
    }
    if !arch.key_decisions.is_empty() {
        md.push_str("**Key decisions:**\n\n");
        push_list(&mut md, &arch.key_decisions);
        md.push('\n');
    }
    if !arch.entry_points.is_empty() {
        md.push_str("**Entry points:**\n\n");
        push_list(&mut md, &arch.entry_points);
        md.push('\n');
    }

    md.push_str("## Patterns\n\n");
    md.push_str("| Pattern | Description |\n|---|---|\n");
    for pattern in &layer.patterns {
        md.push_str(&format!(
            "| {} | {} |\n",
            escape_cell(&pattern.name),
            escape_cell(&pattern.description)
        ));
    }
    md.push('\n');

    md.push_str("## Conventions\n\n");
    md.push_str("| Category | Convention |\n|---|---|\n");
    for convention in &layer.conventions {
        md.push_str(&format!(
            "| {} | {} |\n",
            escape_cell(&convention.category),
            escape_cell(&convention.description)
        ));
    }
    md.push('\n');

    md.push_str("## Glossary\n\n");
    md.push_str("| Term | Definition |\n|---|---|\n");
    for term in &layer.glossary {
        md.push_str(&format!(
            "| {} | {} |\n",
            escape_cell(&term.term),
            escape_cell(&term.definition)
        ));
    }
    md.push('\n');

    md.push_str("## Domain-Driven Design\n\n");
    match &layer.ddd {
        Some(ddd) => {
            for context in &ddd.bounded_contexts {
                md.push_str(&format!("### {}\n\n{}\n\n", context.name, or_dash(&context.description)));
                if !context.modules.is_empty() {
                    md.push_str(&format!("Modules: {}\n\n", context.modules.join(", ")));
                }
            }
            for (label, items) in [
                ("Aggregate roots", &ddd.aggregate_roots),
                ("Domain services", &ddd.domain_services),
                ("Repositories", &ddd.repositories),
                ("Value objects", &ddd.value_objects),
                ("Domain events", &ddd.domain_events),
            ] {
                if !items.is_empty() {
                    md.push_str(&format!("**{}:** {}\n\n", label, items.join(", ")));
                }
            }
        }
        None => md.push_str("_Not analyzed_\n\n"),
    }

    md.push_str("## Test Maturity\n\n");
    match &layer.test_maturity {
        Some(tm) => {
            md.push_str(&format!("**Level:** {}\n\n", or_dash(&tm.maturity_level)));
            md.push_str(&format!("**Test files:** {}\n\n", tm.test_file_count));
            if !tm.frameworks.is_empty() {
                md.push_str(&format!("**Frameworks:** {}\n\n", tm.frameworks.join(", ")));
            }
            for (label, items) in [
                ("Strengths", &tm.strengths),
                ("Gaps", &tm.gaps),
                ("Recommendations", &tm.recommendations),
            ] {
                if !items.is_empty() {
                    md.push_str(&format!("**{}:**\n\n", label));
                    push_list(&mut md, items);
                    md.push('\n');
                }
            }
        }
        None => md.push_str("_Not analyzed_\n\n"),
    }

    md.push_str("## Schema Consistency\n\n");
    match &layer.schema_consistency {
        Some(sc) => {
            let score = sc
                .consistency_score
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!("**Score:** {}\n\n", score));
            if !sc.validation_libraries.is_empty() {
                md.push_str(&format!(
                    "**Validation libraries:** {}\n\n",
                    sc.validation_libraries.join(", ")
                ));
            }
            for issue in &sc.issues {
                md.push_str(&format!("- {}", issue.description));
                if !issue.locations.is_empty() {
                    md.push_str(&format!(" ({})", issue.locations.join(", ")));
                }
                md.push('\n');
            }
            if !sc.issues.is_empty() {
                md.push('\n');
            }
            if !sc.recommendations.is_empty() {
                md.push_str("**Recommendations:**\n\n");
                push_list(&mut md, &sc.recommendations);
                md.push('\n');
            }
        }
        None => md.push_str("_Not analyzed_\n\n"),
    }

    md.push_str("## Documentation Index\n\n");
    match &layer.documentation_index {
        Some(index) => {
            md.push_str(&format!("Source: `{}`\n\n", index.docs_dir));
            md.push_str("| Document | Type | Title | Summary |\n|---|---|---|---|\n");
            for doc in &index.documents {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    doc.path,
                    doc.doc_type.as_str(),
                    escape_cell(&doc.title),
                    escape_cell(or_dash(&doc.summary))
                ));
            }
        }
        None => md.push_str("_No documentation directory_\n"),
    }
    md
}

/// One row of `index.md`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the project root
    pub file: String,
    pub kind: &'static str,
    pub present: bool,
    pub auto_generated: bool,
}

/// Index rows for the companion files and the layer documents under `output_dir_name`
pub fn index_entries(project_root: &Path, output_dir_name: &str) -> Vec<IndexEntry> {
    let mut entries: Vec<IndexEntry> = COMPANION_FILES
        .iter()
        .map(|name| IndexEntry {
            file: name.to_string(),
            kind: "companion",
            present: project_root.join(name).is_file(),
            auto_generated: false,
        })
        .collect();

    for (doc, kind) in [
        (STRUCTURE_DOC, "structure"),
        (SEMANTICS_DOC, "semantics"),
        (DOMAIN_DOC, "domain"),
    ] {
        let rel = format!("{}/{}", output_dir_name, doc);
        entries.push(IndexEntry {
            present: project_root.join(&rel).is_file(),
            file: rel,
            kind,
            auto_generated: true,
        });
    }
    entries
}

pub fn render_index(entries: &[IndexEntry]) -> String {
    let mut md = String::new();
    md.push_str("# Ontology Index\n\n");
    md.push_str("| File | Kind | Status | Maintained By |\n|---|---|---|---|\n");
    for entry in entries {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            entry.file,
            entry.kind,
            if entry.present { "present" } else { "missing" },
            if entry.auto_generated {
                "auto-generated"
            } else {
                "human-maintained"
            }
        ));
    }
    md
}

/// Write one document per present layer, then the index.
///
/// Returns the written paths in write order.
pub fn write_documents(project_root: &Path, output_dir_name: &str, layers: &LayerData) -> Result<Vec<PathBuf>> {
    let output_dir = project_root.join(output_dir_name);
    let mut written = Vec::new();

    let docs = [
        (STRUCTURE_DOC, layers.structure.as_ref().map(render_structure)),
        (SEMANTICS_DOC, layers.semantics.as_ref().map(render_semantics)),
        (DOMAIN_DOC, layers.domain.as_ref().map(render_domain)),
    ];
    for (name, body) in docs {
        let Some(body) = body else {
            continue;
        };
        let path = output_dir.join(name);
        write_atomic(&path, body.as_bytes())?;
        written.push(path);
    }

    let index = render_index(&index_entries(project_root, output_dir_name));
    let path = output_dir.join(INDEX_DOC);
    write_atomic(&path, index.as_bytes())?;
    written.push(path);

    tracing::debug!("[RENDER] Wrote {} documents to {}", written.len(), output_dir.display());
    Ok(written)
}
