//! Documentation index: local extraction and symbol cross references
//!
//! Everything here is deterministic. The AI pass only fills `summary`,
//! `key_concepts` and `related_symbols` on top of what is extracted here.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzers::common::truncate_to_char_boundary;
use crate::schema::{Confidence, DocCrossReference, DocType, DocumentInsight, SemanticsLayer};

/// Candidate documentation directories, first existing one wins
pub const DOC_DIRS: &[&str] = &["docs", "doc", "documentation"];
pub const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "txt", "yaml", "yml"];
pub const MAX_DOC_DEPTH: usize = 3;
/// Body characters sent to the AI per document
pub const DOC_BODY_LIMIT: usize = 4000;
/// Declared names shorter than this are not cross-referenced
pub const MIN_SYMBOL_LEN: usize = 3;

static SQL_DDL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bCREATE\s+(?:TABLE|INDEX|UNIQUE\s+INDEX|VIEW|TYPE)\b").expect("valid regex")
});

static API_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*"?(?:openapi|swagger)"?\s*:"#).expect("valid regex"));

static DECISION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^(?:#{1,6}\s+(?:decision|decision outcome|consequences)\s*$|\**status\**:\s*(?:accepted|proposed|superseded|deprecated)\b)")
        .expect("valid regex")
});

static PROCEDURE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^#{1,6}\s+(?:procedure|rollback|escalation|remediation)\b").expect("valid regex")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("valid regex"));

static BACKTICKED: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));

/// A document as read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDocument {
    pub insight: DocumentInsight,
    pub body: String,
}

impl LocalDocument {
    /// Body as sent to the AI
    pub fn truncated_body(&self) -> &str {
        truncate_to_char_boundary(&self.body, DOC_BODY_LIMIT)
    }
}

/// First documentation directory that exists, as (relative name, absolute path)
pub fn find_docs_dir(project_root: &Path) -> Option<(String, PathBuf)> {
    DOC_DIRS.iter().find_map(|name| {
        let path = project_root.join(name);
        path.is_dir().then(|| (name.to_string(), path))
    })
}

/// Project-relative paths of every documentation file
pub fn list_doc_files(project_root: &Path) -> Vec<String> {
    let Some((name, dir)) = find_docs_dir(project_root) else {
        return Vec::new();
    };
    walk_docs(&dir)
        .into_iter()
        .map(|(rel, _)| format!("{}/{}", name, rel))
        .collect()
}

fn walk_docs(dir: &Path) -> Vec<(String, PathBuf)> {
    let mut out: Vec<(String, PathBuf)> = WalkBuilder::new(dir)
        .standard_filters(false)
        .max_depth(Some(MAX_DOC_DEPTH))
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| DOC_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(dir).ok()?;
            let rel = rel.to_string_lossy().replace('\\', "/");
            Some((rel, entry.path().to_path_buf()))
        })
        .collect();
    out.sort();
    out
}

/// Read and locally classify every document under the docs directory
pub fn scan_documents(project_root: &Path) -> Option<(String, Vec<LocalDocument>)> {
    let (name, dir) = find_docs_dir(project_root)?;
    let mut docs = Vec::new();
    for (rel, abs) in walk_docs(&dir) {
        let body = match fs::read_to_string(&abs) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("[DOCS] Cannot read {}: {}", abs.display(), e);
                continue;
            }
        };
        let path = format!("{}/{}", name, rel);
        docs.push(LocalDocument {
            insight: extract_insight(&path, &body),
            body,
        });
    }
    Some((name, docs))
}

/// Title, type, headings and code fence languages of one document
pub fn extract_insight(path: &str, body: &str) -> DocumentInsight {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let title = body
        .lines()
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| stem.to_string());

    DocumentInsight {
        path: path.to_string(),
        doc_type: classify(file_name, &title, body),
        title,
        headings: headings(body),
        code_block_languages: code_block_languages(body),
        ..Default::default()
    }
}

/// Heuristic document type
pub fn classify(file_name: &str, title: &str, body: &str) -> DocType {
    let name = file_name.to_lowercase();
    let title = title.to_lowercase();
    let tokens: Vec<&str> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let has_token = |t: &str| tokens.iter().any(|x| *x == t);
    let ext = name.rsplit('.').next().unwrap_or("");

    if SQL_DDL.is_match(body) {
        DocType::Schema
    } else if API_SPEC.is_match(body) {
        DocType::ApiSpec
    } else if has_token("adr")
        || name.contains("decision")
        || title.contains("decision")
        || DECISION_MARKER.is_match(body)
    {
        DocType::Adr
    } else if name.contains("runbook")
        || name.contains("playbook")
        || title.contains("procedure")
        || PROCEDURE_MARKER.is_match(body)
    {
        DocType::Runbook
    } else if name.contains("guide") || name.contains("tutorial") {
        DocType::Guide
    } else if name.contains("reference") || has_token("api") {
        DocType::Reference
    } else if ext == "yaml" || ext == "yml" {
        DocType::Config
    } else {
        DocType::Other
    }
}

fn headings(body: &str) -> Vec<String> {
    let mut in_fence = false;
    let mut out = Vec::new();
    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let hashes = line.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
            out.push(line[hashes..].trim().to_string());
        }
    }
    out
}

fn code_block_languages(body: &str) -> Vec<String> {
    let mut in_fence = false;
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for line in body.lines() {
        let Some(rest) = line.trim_start().strip_prefix("```") else {
            continue;
        };
        if !in_fence {
            let lang = rest.trim().split_whitespace().next().unwrap_or("").to_lowercase();
            if !lang.is_empty() && seen.insert(lang.clone()) {
                out.push(lang);
            }
        }
        in_fence = !in_fence;
    }
    out
}

/// Whole-word matches of declared names in every document.
///
/// Names are the exported and top-level declared names of the semantics
/// layer, at least [`MIN_SYMBOL_LEN`] characters long. Each name points to
/// its first declaring file.
pub fn cross_references(docs: &[LocalDocument], semantics: &SemanticsLayer) -> Vec<DocCrossReference> {
    let mut declared: BTreeMap<&str, &str> = BTreeMap::new();
    for file in &semantics.files {
        let names = file
            .exports
            .iter()
            .map(|e| e.name.as_str())
            .chain(file.declarations().map(|d| d.name.as_str()));
        for name in names.filter(|n| n.chars().count() >= MIN_SYMBOL_LEN) {
            declared.entry(name).or_insert(file.path.as_str());
        }
    }

    let mut refs = Vec::new();
    for doc in docs {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for m in IDENTIFIER.find_iter(&doc.body) {
            *counts.entry(m.as_str()).or_insert(0) += 1;
        }
        let backticked: BTreeSet<&str> = BACKTICKED
            .captures_iter(&doc.body)
            .filter_map(|c| c.get(1))
            .flat_map(|m| IDENTIFIER.find_iter(m.as_str()).map(|i| i.as_str()))
            .collect();

        for (name, file) in &declared {
            let Some(&occurrences) = counts.get(name) else {
                continue;
            };
            let confidence = if backticked.contains(name) {
                Confidence::High
            } else if occurrences >= 2 {
                Confidence::Medium
            } else {
                Confidence::Low
            };
            refs.push(DocCrossReference {
                document: doc.insight.path.clone(),
                symbol: name.to_string(),
                symbol_file: file.to_string(),
                occurrences,
                confidence,
            });
        }
    }
    refs
}

/// Add cross-referenced symbols to each document's related symbols
pub fn merge_related_symbols(documents: &mut [DocumentInsight], refs: &[DocCrossReference]) {
    for doc in documents {
        for r in refs.iter().filter(|r| r.document == doc.path) {
            if !doc.related_symbols.contains(&r.symbol) {
                doc.related_symbols.push(r.symbol.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExportEntry, SemanticFile, SymbolKind};
    use tempfile::TempDir;

    #[test]
    fn test_extract_insight() {
        let body = "# Billing Guide\n\nIntro.\n\n## Setup\n\n```ts\n# not a heading\n```\n\n```bash\nnpm i\n```\n";
        let insight = extract_insight("docs/billing-guide.md", body);
        assert_eq!(insight.title, "Billing Guide");
        assert_eq!(insight.doc_type, DocType::Guide);
        assert_eq!(insight.headings, vec!["Billing Guide", "Setup"]);
        assert_eq!(insight.code_block_languages, vec!["ts", "bash"]);

        let untitled = extract_insight("docs/notes.txt", "plain text");
        assert_eq!(untitled.title, "notes");
        assert_eq!(untitled.doc_type, DocType::Other);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("schema.md", "", "CREATE TABLE users (id int);"), DocType::Schema);
        assert_eq!(classify("api.yaml", "", "openapi: 3.0.0\n"), DocType::ApiSpec);
        assert_eq!(classify("0001-adr-storage.md", "", ""), DocType::Adr);
        assert_eq!(classify("storage.md", "Decision: use sqlite", ""), DocType::Adr);
        assert_eq!(classify("oncall-runbook.md", "", ""), DocType::Runbook);
        assert_eq!(classify("api-overview.md", "", ""), DocType::Reference);
        assert_eq!(classify("settings.yml", "", "a: 1"), DocType::Config);
        assert_eq!(classify("readme.md", "", ""), DocType::Other);
        // "adr" inside a word is not a token
        assert_eq!(classify("quadrant.md", "", ""), DocType::Other);
    }

    #[test]
    fn test_classify_by_body_markers() {
        let adr = "# Storage engine\n\n## Context\nWe need durable state.\n\n## Decision\nWe will use SQLite.\n";
        assert_eq!(classify("storage.md", "Storage engine", adr), DocType::Adr);

        let status = "# Queue\n\nStatus: Accepted\n";
        assert_eq!(classify("queue.md", "Queue", status), DocType::Adr);

        let runbook = "# Restoring backups\n\n## Procedure\n1. Stop the writers\n2. Restore\n";
        assert_eq!(classify("restore.md", "Restoring backups", runbook), DocType::Runbook);

        // a decision marker wins over a procedure marker
        let both = "## Decision\nUse blue/green.\n\n## Rollback\nSwitch back.\n";
        assert_eq!(classify("deploy.md", "Deploy", both), DocType::Adr);

        // only headings count, not prose
        let prose = "# Notes\n\nThe decision was hard and the procedure unclear.\n";
        assert_eq!(classify("notes.md", "Notes", prose), DocType::Other);
    }

    #[test]
    fn test_cross_references_and_confidence() {
        let mut file = SemanticFile::empty("src/billing.ts", "typescript");
        for name in ["createInvoice", "refund", "Ledger", "id"] {
            file.exports.push(ExportEntry {
                name: name.to_string(),
                kind: SymbolKind::Function,
                line: 1,
                is_default: false,
            });
        }
        let semantics = SemanticsLayer {
            files: vec![file],
            ..Default::default()
        };
        let body = "Call `createInvoice` first. A refund reverses a refund. The Ledger records id.".to_string();
        let docs = vec![LocalDocument {
            insight: extract_insight("docs/billing.md", &body),
            body,
        }];

        let refs = cross_references(&docs, &semantics);
        let found: Vec<(&str, Confidence, usize)> = refs
            .iter()
            .map(|r| (r.symbol.as_str(), r.confidence, r.occurrences))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Ledger", Confidence::Low, 1),
                ("createInvoice", Confidence::High, 1),
                ("refund", Confidence::Medium, 2),
            ]
        );
        assert!(refs.iter().all(|r| r.symbol_file == "src/billing.ts"));

        let mut insights: Vec<DocumentInsight> = docs.iter().map(|d| d.insight.clone()).collect();
        merge_related_symbols(&mut insights, &refs);
        assert_eq!(insights[0].related_symbols.len(), 3);
    }

    #[test]
    fn test_scan_prefers_docs_dir_and_limits_depth() {
        let dir = TempDir::new().unwrap();
        let write = |rel: &str, body: &str| {
            let p = dir.path().join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, body).unwrap();
        };
        write("docs/intro.md", "# Intro\n");
        write("docs/a/b/deep.md", "# Deep\n");
        write("docs/a/b/c/too-deep.md", "# Too deep\n");
        write("docs/image.png", "binary");
        write("doc/ignored.md", "# Other dir\n");

        let (name, docs) = scan_documents(dir.path()).unwrap();
        assert_eq!(name, "docs");
        let paths: Vec<&str> = docs.iter().map(|d| d.insight.path.as_str()).collect();
        assert_eq!(paths, vec!["docs/a/b/deep.md", "docs/intro.md"]);
    }

    #[test]
    fn test_no_docs_dir() {
        let dir = TempDir::new().unwrap();
        assert!(scan_documents(dir.path()).is_none());
        assert!(list_doc_files(dir.path()).is_empty());
    }
}
