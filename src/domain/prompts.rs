//! Step prompts and response schemas
//!
//! Every schema is `#[serde(default)]` so a partial answer still fills what
//! it can.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::context::DomainContext;
use super::docs::LocalDocument;
use crate::schema::{ConventionInsight, GlossaryTerm, PatternInsight};

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else.";

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn manifest(ctx: &DomainContext) -> &str {
    ctx.manifest_excerpt.as_deref().unwrap_or("(no manifest)")
}

pub fn project_summary(ctx: &DomainContext) -> String {
    format!(
        "Summarize what this software project does in 2-4 sentences.\n\n\
         Directory tree:\n{}\n\nManifest:\n{}\n\n{} Schema: {{\"summary\": string}}",
        ctx.tree_preview.join("\n"),
        manifest(ctx),
        JSON_ONLY
    )
}

pub fn architecture(ctx: &DomainContext) -> String {
    format!(
        "Describe the architecture of this project.\n\nEntry points:\n{}\n\nExternal dependencies:\n{}\n\n\
         {} Schema: {{\"style\": string, \"layers\": [string], \"keyDecisions\": [string], \"entryPoints\": [string]}}",
        bullet_list(&ctx.entry_points),
        bullet_list(&ctx.dependency_names),
        JSON_ONLY
    )
}

pub fn patterns(ctx: &DomainContext) -> String {
    format!(
        "Identify design patterns and coding conventions from these exported symbols.\n\n{}\n\n\
         {} Schema: {{\"patterns\": [{{\"name\": string, \"description\": string, \"examples\": [string]}}], \
         \"conventions\": [{{\"category\": string, \"description\": string}}]}}",
        bullet_list(&ctx.exported_signatures),
        JSON_ONLY
    )
}

pub fn glossary(ctx: &DomainContext) -> String {
    format!(
        "List the domain terms a newcomer must know, inferred from this directory tree.\n\n{}\n\n\
         {} Schema: {{\"glossary\": [{{\"term\": string, \"definition\": string}}]}}",
        ctx.tree_preview.join("\n"),
        JSON_ONLY
    )
}

pub fn ddd(ctx: &DomainContext) -> String {
    format!(
        "Analyze this code from a domain-driven design perspective.\n\nClasses:\n{}\n\nInterfaces:\n{}\n\n\
         Module relations:\n{}\n\n{} Schema: {{\"boundedContexts\": [{{\"name\": string, \"description\": string, \
         \"modules\": [string]}}], \"aggregateRoots\": [string], \"domainServices\": [string], \
         \"repositories\": [string], \"valueObjects\": [string], \"domainEvents\": [string]}}",
        bullet_list(&ctx.class_signatures),
        bullet_list(&ctx.interface_signatures),
        bullet_list(&ctx.module_relations),
        JSON_ONLY
    )
}

pub fn test_maturity(ctx: &DomainContext) -> String {
    format!(
        "Assess the test maturity of this project.\n\nTest files ({}):\n{}\n\nManifest:\n{}\n\n\
         Symbols under test:\n{}\n\n{} Schema: {{\"maturityLevel\": string, \"frameworks\": [string], \
         \"strengths\": [string], \"gaps\": [string], \"recommendations\": [string]}}",
        ctx.test_files.len(),
        bullet_list(&ctx.test_files),
        manifest(ctx),
        bullet_list(&ctx.test_symbols),
        JSON_ONLY
    )
}

pub fn schema_consistency(ctx: &DomainContext) -> String {
    format!(
        "Review these data shapes for consistency (naming, optionality, duplication).\n\n{}\n\n\
         Dependencies:\n{}\n\n{} Schema: {{\"consistencyScore\": number between 0 and 1, \
         \"issues\": [{{\"description\": string, \"locations\": [string]}}], \
         \"validationLibraries\": [string], \"recommendations\": [string]}}",
        bullet_list(&ctx.schema_signatures),
        bullet_list(&ctx.dependency_names),
        JSON_ONLY
    )
}

pub fn document(doc: &LocalDocument) -> String {
    format!(
        "Summarize this {} document titled \"{}\" ({}).\n\n{}\n\n\
         {} Schema: {{\"summary\": string, \"keyConcepts\": [string], \"relatedSymbols\": [string]}}",
        doc.insight.doc_type.as_str(),
        doc.insight.title,
        doc.insight.path,
        doc.truncated_body(),
        JSON_ONLY
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SummaryResponse {
    #[serde(alias = "projectSummary")]
    pub summary: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatternsResponse {
    pub patterns: Vec<PatternInsight>,
    pub conventions: Vec<ConventionInsight>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GlossaryResponse {
    #[serde(alias = "terms")]
    pub glossary: Vec<GlossaryTerm>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentResponse {
    pub summary: String,
    pub key_concepts: Vec<String>,
    pub related_symbols: Vec<String>,
}

/// JSON object inside a response that may be fenced or surrounded by prose
pub fn extract_json(text: &str) -> Option<&str> {
    let mut body = text.trim();
    if let Some(start) = body.find("```") {
        let after = &body[start + 3..];
        // skip the fence's language tag
        let after = after.find('\n').map(|i| &after[i + 1..]).unwrap_or(after);
        body = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        };
    }
    let open = body.find('{')?;
    let close = body.rfind('}')?;
    (open < close).then(|| &body[open..=close])
}

/// Deserialize a step response into its schema
pub fn parse_response<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let json = extract_json(text).ok_or_else(|| "no JSON object in response".to_string())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ArchitectureInsight;

    #[test]
    fn test_extract_json_from_fence() {
        let text = "Here you go:\n```json\n{\"summary\": \"A CLI.\"}\n```\nThanks";
        assert_eq!(extract_json(text), Some("{\"summary\": \"A CLI.\"}"));
    }

    #[test]
    fn test_extract_json_from_prose() {
        assert_eq!(extract_json("sure {\"a\": {\"b\": 1}} done"), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_partial_response_fills_defaults() {
        let arch: ArchitectureInsight = parse_response(r#"{"style": "layered"}"#).unwrap();
        assert_eq!(arch.style, "layered");
        assert!(arch.layers.is_empty());

        let summary: SummaryResponse = parse_response(r#"{"projectSummary": "x"}"#).unwrap();
        assert_eq!(summary.summary, "x");
    }

    #[test]
    fn test_malformed_response_is_error() {
        assert!(parse_response::<SummaryResponse>("{not json}").is_err());
        assert!(parse_response::<PatternsResponse>(r#"{"patterns": "oops"}"#).is_err());
    }
}
