//! Layer data model shared by every pipeline stage
//!
//! Everything here is serialized into the on-disk cache, so field names are
//! camelCase on the wire and optional collections are skipped when empty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the cache/layer schema.
/// 1.0 - initial three-layer layout
/// 1.1 - symbol-level annotations, domain input hash
pub const SCHEMA_VERSION: &str = "1.1";

// ============================================================================
// Structure layer
// ============================================================================

/// Node type in the directory tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
}

/// Per-file metadata captured during the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Lowercase extension without the dot (empty when none)
    pub extension: String,

    /// Size in bytes
    pub size: u64,

    /// Line count (0 for binary or unread files)
    pub line_count: usize,

    /// Detected language name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A node in the scanned directory tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryNode {
    pub name: String,

    /// Path relative to the project root, `/`-separated (empty for the root)
    pub path: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<FileInfo>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DirectoryNode>,
}

impl DirectoryNode {
    /// Depth-first iterator over every file node in the tree
    pub fn files(&self) -> Vec<&DirectoryNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node.node_type {
                NodeType::File => out.push(node),
                NodeType::Directory => {
                    for child in node.children.iter().rev() {
                        stack.push(child);
                    }
                }
            }
        }
        out
    }

    /// Detected language of a file node
    pub fn language(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.language.as_deref())
    }
}

/// Kind of edge between two modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Import,
    ReExport,
    DynamicImport,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::ReExport => "re-export",
            Self::DynamicImport => "dynamic-import",
        }
    }
}

/// A module-level dependency edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleRelation {
    /// Project-relative path of the importing file
    pub source: String,
    /// Raw specifier: relative path or bare package identifier
    pub target: String,
    pub kind: RelationKind,
}

/// Aggregate counts over the scanned tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureStats {
    pub total_files: usize,
    pub total_dirs: usize,
    pub by_language: BTreeMap<String, usize>,
    pub by_extension: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureLayer {
    pub root_dir: String,
    pub tree: DirectoryNode,
    pub modules: Vec<ModuleRelation>,
    pub stats: StructureStats,
}

// ============================================================================
// Semantics layer
// ============================================================================

/// One parsed import statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEntry {
    pub source: String,
    pub specifiers: Vec<String>,
    pub is_type_only: bool,
    pub is_default: bool,
}

/// Kind tag shared by every declared symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    #[default]
    Function,
    Class,
    Interface,
    Type,
    Enum,
    Variable,
    Method,
    Property,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Enum => "enum",
            Self::Variable => "variable",
            Self::Method => "method",
            Self::Property => "property",
        }
    }
}

/// A function or method parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_annotation: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// A declared symbol. Functions, classes, interfaces and type aliases all use
/// this shape and are told apart by `kind`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolEntry {
    pub name: String,
    pub kind: SymbolKind,

    /// Start line (1-indexed)
    pub line: usize,

    pub exported: bool,

    /// Leading documentation comment, trimmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsdoc: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_async: bool,

    /// Class/interface members (methods and properties)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<SymbolEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<MxAnnotation>,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: usize, exported: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            line,
            exported,
            ..Default::default()
        }
    }

    /// One-line signature used in prompts and rendered docs
    pub fn signature(&self) -> String {
        let prefix = if self.exported { "export " } else { "" };
        match self.kind {
            SymbolKind::Function | SymbolKind::Method => {
                let params = self
                    .parameters
                    .iter()
                    .map(|p| match &p.type_annotation {
                        Some(t) => format!("{}: {}", p.name, t),
                        None => p.name.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let asyncness = if self.is_async { "async " } else { "" };
                let ret = self
                    .return_type
                    .as_ref()
                    .map(|r| format!(": {}", r))
                    .unwrap_or_default();
                format!("{}{}function {}({}){}", prefix, asyncness, self.name, params, ret)
            }
            SymbolKind::Class | SymbolKind::Interface => {
                let mut sig = format!("{}{} {}", prefix, self.kind.as_str(), self.name);
                if !self.extends.is_empty() {
                    sig.push_str(&format!(" extends {}", self.extends.join(", ")));
                }
                if !self.implements.is_empty() {
                    sig.push_str(&format!(" implements {}", self.implements.join(", ")));
                }
                if !self.members.is_empty() {
                    let names: Vec<&str> = self.members.iter().map(|m| m.name.as_str()).collect();
                    sig.push_str(&format!(" {{ {} }}", names.join("; ")));
                }
                sig
            }
            _ => format!("{}{} {}", prefix, self.kind.as_str(), self.name),
        }
    }
}

/// An exported name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub name: String,
    pub kind: SymbolKind,
    pub line: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
}

/// Per-file analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticFile {
    pub path: String,
    pub language: String,
    pub exports: Vec<ExportEntry>,
    pub imports: Vec<ImportEntry>,
    pub classes: Vec<SymbolEntry>,
    pub functions: Vec<SymbolEntry>,
    pub interfaces: Vec<SymbolEntry>,
    pub types: Vec<SymbolEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<MxAnnotation>,
}

impl SemanticFile {
    /// Empty-but-valid result for a file that could not be analyzed
    pub fn empty(path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            ..Default::default()
        }
    }

    /// All top-level declarations (classes, functions, interfaces, types)
    pub fn declarations(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.classes
            .iter()
            .chain(self.functions.iter())
            .chain(self.interfaces.iter())
            .chain(self.types.iter())
    }

    /// Mutable access to all top-level declarations
    pub fn declarations_mut(&mut self) -> impl Iterator<Item = &mut SymbolEntry> {
        self.classes
            .iter_mut()
            .chain(self.functions.iter_mut())
            .chain(self.interfaces.iter_mut())
            .chain(self.types.iter_mut())
    }

    /// Number of symbols this file contributes to the symbol index
    pub fn symbol_count(&self) -> usize {
        self.exports.len() + self.declarations().filter(|s| !s.exported).count()
    }
}

/// Where a name is declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub file: String,
    pub line: usize,
    pub kind: SymbolKind,
}

/// Denormalized name -> declarations index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolIndex {
    pub by_name: BTreeMap<String, Vec<SymbolLocation>>,
    pub exported_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub used_by: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub internal: Vec<ModuleRelation>,
    pub external: Vec<ExternalDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticsLayer {
    pub files: Vec<SemanticFile>,
    pub symbols: SymbolIndex,
    pub dependencies: DependencyGraph,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_summary: Option<AnnotationSummary>,
}

// ============================================================================
// Annotations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnnotationTag {
    Anchor,
    Warn,
    Note,
    Todo,
}

impl AnnotationTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anchor => "ANCHOR",
            Self::Warn => "WARN",
            Self::Note => "NOTE",
            Self::Todo => "TODO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ANCHOR" => Some(Self::Anchor),
            "WARN" => Some(Self::Warn),
            "NOTE" => Some(Self::Note),
            "TODO" => Some(Self::Todo),
            _ => None,
        }
    }
}

/// A cross-cutting fact attached to a file or symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MxAnnotation {
    pub tag: AnnotationTag,
    pub message: String,
    pub line: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSummary {
    pub symbol: String,
    pub file: String,
    pub fan_in: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningSummary {
    pub file: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSummary {
    pub total: usize,
    pub by_tag: BTreeMap<String, usize>,
    pub top_anchors: Vec<AnchorSummary>,
    pub warnings: Vec<WarningSummary>,
}

// ============================================================================
// Domain layer
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArchitectureInsight {
    pub style: String,
    pub layers: Vec<String>,
    pub key_decisions: Vec<String>,
    pub entry_points: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatternInsight {
    pub name: String,
    pub description: String,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConventionInsight {
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlossaryTerm {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoundedContext {
    pub name: String,
    pub description: String,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DddInsight {
    pub bounded_contexts: Vec<BoundedContext>,
    pub aggregate_roots: Vec<String>,
    pub domain_services: Vec<String>,
    pub repositories: Vec<String>,
    pub value_objects: Vec<String>,
    pub domain_events: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestMaturityInsight {
    pub maturity_level: String,
    pub test_file_count: usize,
    pub frameworks: Vec<String>,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaIssue {
    pub description: String,
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaConsistencyInsight {
    pub consistency_score: Option<f64>,
    pub issues: Vec<SchemaIssue>,
    pub validation_libraries: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Heuristic classification of a documentation file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocType {
    Schema,
    ApiSpec,
    Adr,
    Runbook,
    Guide,
    Reference,
    Config,
    #[default]
    Other,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::ApiSpec => "api-spec",
            Self::Adr => "adr",
            Self::Runbook => "runbook",
            Self::Guide => "guide",
            Self::Reference => "reference",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentInsight {
    pub path: String,
    pub title: String,
    pub doc_type: DocType,
    pub summary: String,
    pub key_concepts: Vec<String>,
    pub related_symbols: Vec<String>,
    pub headings: Vec<String>,
    pub code_block_languages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocCrossReference {
    pub document: String,
    pub symbol: String,
    pub symbol_file: String,
    pub occurrences: usize,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentationIndex {
    pub docs_dir: String,
    pub documents: Vec<DocumentInsight>,
    pub cross_references: Vec<DocCrossReference>,
}

/// AI-derived knowledge. Optional fields that are `None` were not computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DomainLayer {
    pub project_summary: String,
    pub architecture: ArchitectureInsight,
    pub patterns: Vec<PatternInsight>,
    pub conventions: Vec<ConventionInsight>,
    pub glossary: Vec<GlossaryTerm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddd: Option<DddInsight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_maturity: Option<TestMaturityInsight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_consistency: Option<SchemaConsistencyInsight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_index: Option<DocumentationIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_count_counts_exports_and_private_declarations() {
        let mut file = SemanticFile::empty("a.ts", "typescript");
        file.exports.push(ExportEntry {
            name: "visible".into(),
            kind: SymbolKind::Function,
            line: 1,
            is_default: false,
        });
        file.functions
            .push(SymbolEntry::new("visible", SymbolKind::Function, 1, true));
        file.functions
            .push(SymbolEntry::new("hidden", SymbolKind::Function, 5, false));
        file.types.push(SymbolEntry::new("Local", SymbolKind::Type, 9, false));

        assert_eq!(file.symbol_count(), 3);
    }

    #[test]
    fn test_relation_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&RelationKind::DynamicImport).unwrap();
        assert_eq!(json, "\"dynamic-import\"");
    }

    #[test]
    fn test_function_signature() {
        let mut f = SymbolEntry::new("load", SymbolKind::Function, 3, true);
        f.is_async = true;
        f.parameters.push(Parameter {
            name: "path".into(),
            type_annotation: Some("string".into()),
            optional: false,
        });
        f.return_type = Some("Promise<Config>".into());
        assert_eq!(
            f.signature(),
            "export async function load(path: string): Promise<Config>"
        );
    }

    #[test]
    fn test_tree_files_in_order() {
        let file = |name: &str| DirectoryNode {
            name: name.into(),
            path: name.into(),
            node_type: NodeType::File,
            info: None,
            children: vec![],
        };
        let root = DirectoryNode {
            name: "root".into(),
            path: String::new(),
            node_type: NodeType::Directory,
            info: None,
            children: vec![file("a.ts"), file("b.ts")],
        };
        let names: Vec<&str> = root.files().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a.ts", "b.ts"]);
    }
}
