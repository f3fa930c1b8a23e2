//! tree-sitter backend for TypeScript and JavaScript
//!
//! Walks the top level of the program only; nested functions are not
//! symbols. Class and interface bodies are walked one level for members.

use tree_sitter::{Node, Parser};

use crate::analyzers::common::{
    clean_doc_comment, clean_type_annotation, get_node_text, get_node_text_normalized,
    has_token_child, named_children, start_line, strip_quotes,
};
use crate::analyzers::{language_name, LanguageAnalyzer};
use crate::error::{OntoError, Result};
use crate::schema::{ExportEntry, ImportEntry, Parameter, SemanticFile, SymbolEntry, SymbolKind};

/// Extensions handled by both TypeScript backends
pub const TS_FAMILY_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// AST-backed analyzer
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeScriptAstAnalyzer;

impl TypeScriptAstAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageAnalyzer for TypeScriptAstAnalyzer {
    fn name(&self) -> &'static str {
        "typescript-ast"
    }

    fn extensions(&self) -> &'static [&'static str] {
        TS_FAMILY_EXTENSIONS
    }

    fn analyze_file(&self, path: &str, content: &str) -> SemanticFile {
        match extract_with_ast(path, content) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!("[ANALYZE] AST extraction failed for {}: {}", path, e);
                SemanticFile::empty(path, language_name(path))
            }
        }
    }
}

fn grammar_for(path: &str) -> tree_sitter::Language {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "tsx" | "jsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        "js" | "mjs" | "cjs" => tree_sitter_javascript::LANGUAGE.into(),
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

fn extract_with_ast(path: &str, content: &str) -> Result<SemanticFile> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar_for(path))
        .map_err(|e| OntoError::ParseFailure {
            message: format!("Failed to set language for {}: {:?}", path, e),
        })?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| OntoError::ParseFailure {
            message: format!("Parser produced no tree for {}", path),
        })?;

    let mut collector = Collector {
        source: content,
        file: SemanticFile::empty(path, language_name(path)),
        pending_exports: Vec::new(),
    };
    for child in named_children(&tree.root_node()) {
        collector.visit_top_level(child);
    }
    Ok(collector.finish())
}

/// `export { local as exported }` entries resolved after the walk
struct PendingExport {
    local: String,
    exported: String,
    line: usize,
    is_default: bool,
}

struct Collector<'s> {
    source: &'s str,
    file: SemanticFile,
    pending_exports: Vec<PendingExport>,
}

impl Collector<'_> {
    fn text(&self, node: &Node) -> String {
        get_node_text(node, self.source)
    }

    fn field_text(&self, node: &Node, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|n| self.text(&n))
    }

    fn visit_top_level(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => {
                let import = self.parse_import(&node);
                self.file.imports.push(import);
            }
            "export_statement" => self.visit_export(node),
            _ => self.visit_declaration(node, node, false, false),
        }
    }

    fn visit_export(&mut self, node: Node) {
        let is_default = has_token_child(&node, "default");

        if let Some(decl) = node.child_by_field_name("declaration") {
            self.visit_declaration(decl, node, true, is_default);
            return;
        }

        // `export ... from '...'` re-exports names declared elsewhere
        if node.child_by_field_name("source").is_some() {
            return;
        }

        if let Some(value) = node.child_by_field_name("value") {
            self.visit_default_value(value, node);
            return;
        }

        let line = start_line(&node);
        for clause in named_children(&node) {
            if clause.kind() != "export_clause" {
                continue;
            }
            for spec in named_children(&clause) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let Some(local) = self.field_text(&spec, "name") else {
                    continue;
                };
                let exported = self.field_text(&spec, "alias").unwrap_or_else(|| local.clone());
                self.pending_exports.push(PendingExport {
                    is_default: exported == "default",
                    local,
                    exported,
                    line,
                });
            }
        }
    }

    fn visit_default_value(&mut self, value: Node, export: Node) {
        let line = start_line(&export);
        let jsdoc = self.leading_doc(&export);
        match value.kind() {
            "identifier" => {
                let name = self.text(&value);
                self.pending_exports.push(PendingExport {
                    local: name.clone(),
                    exported: name,
                    line,
                    is_default: true,
                });
            }
            "function_expression" | "function" | "arrow_function" | "generator_function" => {
                let name = self
                    .field_text(&value, "name")
                    .unwrap_or_else(|| "default".to_string());
                let mut entry = self.function_entry(&value, name, line, true);
                entry.jsdoc = jsdoc;
                self.push_export(&entry, true);
                self.file.functions.push(entry);
            }
            "class" => {
                let mut entry = self.class_entry(&value, true);
                entry.jsdoc = jsdoc;
                self.push_export(&entry, true);
                self.file.classes.push(entry);
            }
            _ => self.file.exports.push(ExportEntry {
                name: "default".to_string(),
                kind: SymbolKind::Variable,
                line,
                is_default: true,
            }),
        }
    }

    fn visit_declaration(&mut self, decl: Node, doc_anchor: Node, exported: bool, is_default: bool) {
        let jsdoc = self.leading_doc(&doc_anchor);
        let line = start_line(&doc_anchor);

        match decl.kind() {
            "function_declaration" | "generator_function_declaration" | "function_signature" => {
                let name = self
                    .field_text(&decl, "name")
                    .unwrap_or_else(|| "default".to_string());
                let mut entry = self.function_entry(&decl, name, line, exported);
                entry.jsdoc = jsdoc;
                if exported {
                    self.push_export(&entry, is_default);
                }
                self.file.functions.push(entry);
            }
            "class_declaration" | "abstract_class_declaration" => {
                let mut entry = self.class_entry(&decl, exported);
                entry.line = line;
                entry.jsdoc = jsdoc;
                if exported {
                    self.push_export(&entry, is_default);
                }
                self.file.classes.push(entry);
            }
            "interface_declaration" => {
                let mut entry = self.interface_entry(&decl, exported);
                entry.line = line;
                entry.jsdoc = jsdoc;
                if exported {
                    self.push_export(&entry, is_default);
                }
                self.file.interfaces.push(entry);
            }
            "type_alias_declaration" | "enum_declaration" => {
                let kind = if decl.kind() == "enum_declaration" {
                    SymbolKind::Enum
                } else {
                    SymbolKind::Type
                };
                let Some(name) = self.field_text(&decl, "name") else {
                    return;
                };
                let mut entry = SymbolEntry::new(name, kind, line, exported);
                entry.jsdoc = jsdoc;
                if exported {
                    self.push_export(&entry, is_default);
                }
                self.file.types.push(entry);
            }
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(&decl) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    self.visit_declarator(declarator, line, exported, jsdoc.clone());
                }
            }
            _ => {}
        }
    }

    fn visit_declarator(&mut self, declarator: Node, line: usize, exported: bool, jsdoc: Option<String>) {
        let Some(name_node) = declarator.child_by_field_name("name") else {
            return;
        };
        // Destructuring patterns do not declare a single named symbol
        if name_node.kind() != "identifier" {
            return;
        }
        let name = self.text(&name_node);
        let value = declarator.child_by_field_name("value");

        match value {
            Some(v)
                if matches!(
                    v.kind(),
                    "arrow_function" | "function_expression" | "function" | "generator_function"
                ) =>
            {
                let mut entry = self.function_entry(&v, name, line, exported);
                entry.jsdoc = jsdoc;
                if exported {
                    self.push_export(&entry, false);
                }
                self.file.functions.push(entry);
            }
            _ if exported => self.file.exports.push(ExportEntry {
                name,
                kind: SymbolKind::Variable,
                line,
                is_default: false,
            }),
            _ => {}
        }
    }

    fn push_export(&mut self, entry: &SymbolEntry, is_default: bool) {
        self.file.exports.push(ExportEntry {
            name: entry.name.clone(),
            kind: entry.kind,
            line: entry.line,
            is_default,
        });
    }

    fn function_entry(&self, node: &Node, name: String, line: usize, exported: bool) -> SymbolEntry {
        let mut entry = SymbolEntry::new(name, SymbolKind::Function, line, exported);
        entry.parameters = self.parameters_of(node);
        entry.return_type = self
            .field_text(node, "return_type")
            .map(|t| clean_type_annotation(&t));
        entry.is_async = has_token_child(node, "async");
        entry
    }

    fn parameters_of(&self, node: &Node) -> Vec<Parameter> {
        if let Some(params) = node.child_by_field_name("parameters") {
            return self.parse_formal_parameters(&params);
        }
        // Arrow function with a single bare parameter: `x => ...`
        node.child_by_field_name("parameter")
            .map(|p| {
                vec![Parameter {
                    name: self.text(&p),
                    type_annotation: None,
                    optional: false,
                }]
            })
            .unwrap_or_default()
    }

    fn parse_formal_parameters(&self, params: &Node) -> Vec<Parameter> {
        let mut out = Vec::new();
        for p in named_children(params) {
            match p.kind() {
                "required_parameter" | "optional_parameter" => {
                    let name = p
                        .child_by_field_name("pattern")
                        .map(|n| get_node_text_normalized(&n, self.source))
                        .unwrap_or_else(|| get_node_text_normalized(&p, self.source));
                    out.push(Parameter {
                        name,
                        type_annotation: self
                            .field_text(&p, "type")
                            .map(|t| clean_type_annotation(&t)),
                        optional: p.kind() == "optional_parameter"
                            || p.child_by_field_name("value").is_some(),
                    });
                }
                "assignment_pattern" => out.push(Parameter {
                    name: self
                        .field_text(&p, "left")
                        .unwrap_or_else(|| self.text(&p)),
                    type_annotation: None,
                    optional: true,
                }),
                "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => {
                    out.push(Parameter {
                        name: get_node_text_normalized(&p, self.source),
                        type_annotation: None,
                        optional: false,
                    })
                }
                _ => {}
            }
        }
        out
    }

    fn class_entry(&self, node: &Node, exported: bool) -> SymbolEntry {
        let name = self
            .field_text(node, "name")
            .unwrap_or_else(|| "default".to_string());
        let mut entry = SymbolEntry::new(name, SymbolKind::Class, start_line(node), exported);

        for child in named_children(node) {
            if child.kind() != "class_heritage" {
                continue;
            }
            for clause in named_children(&child) {
                match clause.kind() {
                    "extends_clause" => {
                        for v in named_children(&clause) {
                            if v.kind() != "type_arguments" {
                                entry.extends.push(self.text(&v));
                            }
                        }
                    }
                    "implements_clause" => {
                        for t in named_children(&clause) {
                            entry.implements.push(get_node_text_normalized(&t, self.source));
                        }
                    }
                    // JavaScript grammar: heritage holds the expression directly
                    _ => entry.extends.push(self.text(&clause)),
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            for member in named_children(&body) {
                if let Some(m) = self.member_entry(&member) {
                    entry.members.push(m);
                }
            }
        }
        entry
    }

    fn interface_entry(&self, node: &Node, exported: bool) -> SymbolEntry {
        let name = self.field_text(node, "name").unwrap_or_default();
        let mut entry = SymbolEntry::new(name, SymbolKind::Interface, start_line(node), exported);

        for child in named_children(node) {
            if child.kind() == "extends_type_clause" {
                for t in named_children(&child) {
                    entry.extends.push(get_node_text_normalized(&t, self.source));
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            for member in named_children(&body) {
                if let Some(m) = self.member_entry(&member) {
                    entry.members.push(m);
                }
            }
        }
        entry
    }

    fn member_entry(&self, member: &Node) -> Option<SymbolEntry> {
        match member.kind() {
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                let name = self.field_text(member, "name")?;
                let mut entry = self.function_entry(member, name, start_line(member), false);
                entry.kind = SymbolKind::Method;
                entry.jsdoc = self.leading_doc(member);
                Some(entry)
            }
            "public_field_definition" | "field_definition" | "property_signature" => {
                let name = self
                    .field_text(member, "name")
                    .or_else(|| self.field_text(member, "property"))?;
                let mut entry = SymbolEntry::new(name, SymbolKind::Property, start_line(member), false);
                entry.return_type = self
                    .field_text(member, "type")
                    .map(|t| clean_type_annotation(&t));
                Some(entry)
            }
            _ => None,
        }
    }

    fn parse_import(&self, node: &Node) -> ImportEntry {
        let mut import = ImportEntry {
            is_type_only: has_token_child(node, "type"),
            ..Default::default()
        };

        if let Some(source) = self.field_text(node, "source") {
            import.source = strip_quotes(&source);
        }

        for clause in named_children(node) {
            match clause.kind() {
                "import_clause" => {
                    for c in named_children(&clause) {
                        match c.kind() {
                            "identifier" => {
                                import.is_default = true;
                                import.specifiers.push(self.text(&c));
                            }
                            "namespace_import" => {
                                if let Some(id) =
                                    named_children(&c).into_iter().find(|n| n.kind() == "identifier")
                                {
                                    import.specifiers.push(self.text(&id));
                                }
                            }
                            "named_imports" => {
                                for spec in named_children(&c) {
                                    if spec.kind() == "import_specifier" {
                                        if let Some(name) = self.field_text(&spec, "name") {
                                            import.specifiers.push(name);
                                        }
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                // `import x = require('y')`
                "import_require_clause" => {
                    if let Some(id) = named_children(&clause).into_iter().find(|n| n.kind() == "identifier") {
                        import.is_default = true;
                        import.specifiers.push(self.text(&id));
                    }
                    if let Some(source) = self.field_text(&clause, "source") {
                        import.source = strip_quotes(&source);
                    }
                }
                _ => {}
            }
        }
        import
    }

    /// `/** ... */` comment ending on the line right above `anchor`
    fn leading_doc(&self, anchor: &Node) -> Option<String> {
        let prev = anchor.prev_sibling()?;
        if prev.kind() != "comment" {
            return None;
        }
        let text = self.text(&prev);
        if !text.starts_with("/**") {
            return None;
        }
        if anchor.start_position().row > prev.end_position().row + 1 {
            return None;
        }
        let doc = clean_doc_comment(&text);
        (!doc.is_empty()).then_some(doc)
    }

    fn finish(mut self) -> SemanticFile {
        for pending in std::mem::take(&mut self.pending_exports) {
            let mut kind = SymbolKind::Variable;
            if let Some(decl) = self
                .file
                .declarations_mut()
                .find(|d| d.name == pending.local)
            {
                decl.exported = true;
                kind = decl.kind;
            }
            self.file.exports.push(ExportEntry {
                name: pending.exported,
                kind,
                line: pending.line,
                is_default: pending.is_default,
            });
        }
        self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(path: &str, src: &str) -> SemanticFile {
        TypeScriptAstAnalyzer::new().analyze_file(path, src)
    }

    #[test]
    fn test_imports() {
        let src = r#"
import React, { useState, useEffect as effect } from 'react';
import type { Props } from './types';
import * as path from "path";
import './styles.css';
"#;
        let file = analyze("src/App.tsx", src);
        assert_eq!(file.imports.len(), 4);

        let react = &file.imports[0];
        assert_eq!(react.source, "react");
        assert!(react.is_default);
        assert_eq!(react.specifiers, vec!["React", "useState", "useEffect"]);

        assert!(file.imports[1].is_type_only);
        assert_eq!(file.imports[1].specifiers, vec!["Props"]);
        assert_eq!(file.imports[2].specifiers, vec!["path"]);
        assert!(file.imports[3].specifiers.is_empty());
        assert_eq!(file.imports[3].source, "./styles.css");
    }

    #[test]
    fn test_class_members_and_heritage() {
        let src = r#"
/** Stores users. */
export class UserRepo extends BaseRepo implements Repo, Disposable {
  private cache: Map<string, User>;
  constructor(db: Db) { super(db); }
  async find(id: string): Promise<User> { return this.db.get(id); }
}
"#;
        let file = analyze("repo.ts", src);
        assert_eq!(file.classes.len(), 1);
        let class = &file.classes[0];
        assert_eq!(class.name, "UserRepo");
        assert_eq!(class.line, 3);
        assert!(class.exported);
        assert_eq!(class.jsdoc.as_deref(), Some("Stores users."));
        assert_eq!(class.extends, vec!["BaseRepo"]);
        assert_eq!(class.implements, vec!["Repo", "Disposable"]);

        let names: Vec<&str> = class.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["cache", "constructor", "find"]);
        let find = &class.members[2];
        assert_eq!(find.kind, SymbolKind::Method);
        assert!(find.is_async);
        assert_eq!(find.return_type.as_deref(), Some("Promise<User>"));
        assert_eq!(file.exports.len(), 1);
    }

    #[test]
    fn test_interfaces_types_enums() {
        let src = r#"
export interface Config extends Base {
  name: string;
  load(path: string): void;
}
type Local = { a: number };
export enum Color { Red, Green }
"#;
        let file = analyze("types.ts", src);
        assert_eq!(file.interfaces.len(), 1);
        assert_eq!(file.interfaces[0].extends, vec!["Base"]);
        assert_eq!(file.interfaces[0].members.len(), 2);
        assert_eq!(file.types.len(), 2);
        assert!(!file.types[0].exported);
        assert_eq!(file.types[1].kind, SymbolKind::Enum);
        assert_eq!(file.exports.len(), 2);
        assert_eq!(file.symbol_count(), 3);
    }

    #[test]
    fn test_arrow_functions_and_export_clause() {
        let src = r#"
const helper = (a: number, b = 2) => a + b;
async function run(): Promise<void> {}
export const VERSION = "1";
export { helper, run as start };
"#;
        let file = analyze("util.ts", src);
        assert_eq!(file.functions.len(), 2);
        assert!(file.functions.iter().all(|f| f.exported));
        assert_eq!(file.functions[0].parameters.len(), 2);
        assert!(file.functions[0].parameters[1].optional);
        assert!(file.functions[1].is_async);

        let exported: Vec<&str> = file.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(exported, vec!["VERSION", "helper", "start"]);
        assert_eq!(file.exports[2].kind, SymbolKind::Function);
    }

    #[test]
    fn test_default_exports() {
        let file = analyze("a.ts", "export default function main(argv: string[]) {}\n");
        assert_eq!(file.exports.len(), 1);
        assert!(file.exports[0].is_default);
        assert_eq!(file.functions[0].name, "main");

        let file = analyze("b.ts", "const app = 1;\nexport default app;\n");
        assert_eq!(file.exports[0].name, "app");
        assert!(file.exports[0].is_default);
    }

    #[test]
    fn test_javascript_grammar() {
        let src = "const fs = require('fs');\nclass Worker extends Base {\n  run(job) { return job; }\n}\nmodule.exports = Worker;\n";
        let file = analyze("worker.js", src);
        assert_eq!(file.language, "javascript");
        assert_eq!(file.classes.len(), 1);
        assert_eq!(file.classes[0].extends, vec!["Base"]);
        assert_eq!(file.classes[0].members[0].parameters[0].name, "job");
        assert!(!file.classes[0].exported);
    }
}
