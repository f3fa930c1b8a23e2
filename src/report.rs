//! Report types returned by the pipeline entry points

use std::time::Instant;

use serde::Serialize;

use crate::domain::DomainContext;
use crate::incremental::FileChanges;
use crate::schema::AnnotationSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Structure,
    Semantics,
    Domain,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Semantics => "semantics",
            Self::Domain => "domain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    Full,
    Incremental,
    /// Refresh found nothing to do
    UpToDate,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::UpToDate => "up-to-date",
        }
    }
}

/// Outcome of building one layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerResult {
    pub layer: LayerKind,
    pub success: bool,
    pub duration_ms: u64,
    pub file_count: usize,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LayerResult {
    pub fn ok(layer: LayerKind, started: Instant, file_count: usize, warnings: Vec<String>) -> Self {
        Self {
            layer,
            success: true,
            duration_ms: started.elapsed().as_millis() as u64,
            file_count,
            warnings,
            error: None,
        }
    }

    pub fn failed(layer: LayerKind, started: Instant, error: impl Into<String>) -> Self {
        Self {
            layer,
            success: false,
            duration_ms: started.elapsed().as_millis() as u64,
            file_count: 0,
            warnings: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub mode: BuildMode,
    pub results: Vec<LayerResult>,
    pub output_files: Vec<String>,
    /// Step inputs for hosts, present when no AI backend ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_context: Option<DomainContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_summary: Option<AnnotationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<FileChanges>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn result(&self, layer: LayerKind) -> Option<&LayerResult> {
        self.results.iter().find(|r| r.layer == layer)
    }

    /// Every warning, prefixed with its layer
    pub fn warnings(&self) -> Vec<String> {
        self.results
            .iter()
            .flat_map(|r| r.warnings.iter().map(move |w| format!("[{}] {}", r.layer.as_str(), w)))
            .collect()
    }

    /// Human-readable summary for the terminal
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("mode: {}\n", self.mode.as_str()));
        if let Some(changes) = &self.changes {
            out.push_str(&format!(
                "changes: +{} ~{} -{}\n",
                changes.added.len(),
                changes.modified.len(),
                changes.deleted.len()
            ));
        }
        for r in &self.results {
            let status = if r.success { "ok" } else { "FAILED" };
            out.push_str(&format!(
                "{:<10} {:<6} {:>6} files {:>7} ms\n",
                r.layer.as_str(),
                status,
                r.file_count,
                r.duration_ms
            ));
            if let Some(err) = &r.error {
                out.push_str(&format!("  error: {}\n", err));
            }
        }
        if let Some(summary) = &self.annotation_summary {
            let tags: Vec<String> = summary.by_tag.iter().map(|(t, n)| format!("{}={}", t, n)).collect();
            out.push_str(&format!("annotations: {} ({})\n", summary.total, tags.join(", ")));
        }
        let warnings = self.warnings();
        if !warnings.is_empty() {
            out.push_str(&format!("warnings[{}]:\n", warnings.len()));
            for w in warnings {
                out.push_str(&format!("  {}\n", w));
            }
        }
        if !self.output_files.is_empty() {
            out.push_str(&format!("output[{}]:\n", self.output_files.len()));
            for f in &self.output_files {
                out.push_str(&format!("  {}\n", f));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LayerPresence {
    pub structure: bool,
    pub semantics: bool,
    pub domain: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub project_root: String,
    pub output_dir: String,
    pub cache_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    pub tracked_files: usize,
    pub layers: LayerPresence,
    /// Changes since the last build; absent without a cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_changes: Option<FileChanges>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_backend: Option<String>,
}

impl StatusReport {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("project: {}\n", self.project_root));
        out.push_str(&format!("output: {}\n", self.output_dir));
        if !self.cache_present {
            out.push_str("cache: none (run `ontoindex build`)\n");
        } else {
            out.push_str(&format!(
                "cache: schema {} built {}\n",
                self.schema_version.as_deref().unwrap_or("?"),
                self.built_at.as_deref().unwrap_or("?")
            ));
            out.push_str(&format!("tracked_files: {}\n", self.tracked_files));
            let layers: Vec<&str> = [
                ("structure", self.layers.structure),
                ("semantics", self.layers.semantics),
                ("domain", self.layers.domain),
            ]
            .into_iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| name)
            .collect();
            out.push_str(&format!("layers: {}\n", layers.join(", ")));
        }
        if let Some(changes) = &self.pending_changes {
            out.push_str(&format!("pending_changes: {}\n", changes.total()));
            for path in changes.all().take(20) {
                out.push_str(&format!("  {}\n", path));
            }
        }
        out.push_str(&format!(
            "ai_backend: {}\n",
            self.ai_backend.as_deref().unwrap_or("none")
        ));
        out
    }
}
