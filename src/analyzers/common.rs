//! Helpers shared by the AST and regex analyzers

use tree_sitter::Node;

use crate::schema::Parameter;

// ============================================================================
// Text Extraction
// ============================================================================

/// Get text content of a node
pub fn get_node_text(node: &Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

/// Get text content of a node, normalized to single line (collapse whitespace)
pub fn get_node_text_normalized(node: &Node, source: &str) -> String {
    normalize_whitespace(&get_node_text(node, source))
}

/// Normalize whitespace: collapse multiple spaces/newlines to single space
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 1-indexed start line of a node
pub fn start_line(node: &Node) -> usize {
    node.start_position().row + 1
}

/// Remove surrounding quotes from a string literal
pub fn strip_quotes(s: &str) -> String {
    s.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

/// Type annotation text without the leading `:` or `->`
pub fn clean_type_annotation(s: &str) -> String {
    let s = s.trim();
    let s = s.strip_prefix(':').or_else(|| s.strip_prefix("->")).unwrap_or(s);
    normalize_whitespace(s)
}

/// Strip `/** ... */` framing and leading `*` from a doc comment
pub fn clean_doc_comment(raw: &str) -> String {
    let body = raw
        .trim()
        .trim_start_matches("/**")
        .trim_end_matches("*/");
    body.lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate a string to at most `max` bytes on a char boundary
pub fn truncate_to_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// AST Traversal
// ============================================================================

/// Named children of a node collected into a Vec
pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Whether a node has a direct anonymous child token with this kind (e.g. `async`)
pub fn has_token_child(node: &Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

// ============================================================================
// Textual parameter parsing (regex backends)
// ============================================================================

/// Split a parameter list on top-level commas
pub fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut prev = ' ';
    for c in list.chars() {
        match c {
            '>' if prev == '=' => current.push(c),
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
        prev = c;
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parse `name?: Type = default` style parameters (TypeScript and Python)
pub fn parse_parameter_list(list: &str) -> Vec<Parameter> {
    split_top_level(list)
        .into_iter()
        .map(|raw| {
            let (decl, has_default) = match split_once_top_level(&raw, '=') {
                Some((decl, _)) => (decl, true),
                None => (raw.clone(), false),
            };
            let (name, ty) = match split_once_top_level(&decl, ':') {
                Some((n, t)) => (n.trim().to_string(), Some(normalize_whitespace(&t))),
                None => (decl.trim().to_string(), None),
            };
            let optional = has_default || name.ends_with('?');
            Parameter {
                name: name.trim_end_matches('?').to_string(),
                type_annotation: ty.filter(|t| !t.is_empty()),
                optional,
            }
        })
        .collect()
}

fn split_once_top_level(s: &str, sep: char) -> Option<(String, String)> {
    let mut depth = 0i32;
    let mut prev = ' ';
    for (i, c) in s.char_indices() {
        match c {
            '>' if prev == '=' => {}
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            // `=>` inside a function type is not a default value
            '=' if sep == '=' && s[i + 1..].starts_with('>') => {}
            c if c == sep && depth == 0 => {
                return Some((s[..i].to_string(), s[i + c.len_utf8()..].to_string()));
            }
            _ => {}
        }
        prev = c;
    }
    None
}
