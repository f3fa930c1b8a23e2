//! Domain synthesizer: eight AI steps over the structure and semantics layers
//!
//! # Steps
//!
//! 1. project summary, 2. architecture, 3. patterns and conventions,
//! 4. glossary, 5. domain-driven design, 6. test maturity,
//! 7. schema consistency, 8. documentation index.
//!
//! Steps run strictly in order with `rate_limit_ms` between calls. A failed
//! or malformed step leaves its field at the default and records a warning;
//! the remaining steps still run.
//!
//! Results are cached in `domain-cache.json` keyed by a hash of the layer
//! inputs, so an unchanged project costs no AI calls.

pub mod context;
pub mod docs;
pub mod prompts;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::ai::{AiClient, AiRequest};
use crate::config::AiConfig;
use crate::fs_utils::write_json_atomic;
use crate::schema::{
    ArchitectureInsight, DddInsight, DocumentationIndex, DomainLayer, SchemaConsistencyInsight,
    SemanticsLayer, StructureLayer, TestMaturityInsight,
};

pub use context::DomainContext;

/// File name of the persisted domain cache inside the output directory
pub const DOMAIN_CACHE_FILE: &str = "domain-cache.json";

/// Last full synthesis, keyed by its input hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCacheEntry {
    pub input_hash: String,
    pub built_at: String,
    pub domain: DomainLayer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainBuildOptions {
    /// Ignore a matching cache entry and run every step
    pub force_refresh: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainBuild {
    pub domain: DomainLayer,
    pub warnings: Vec<String>,
    /// AI requests issued, successful or not
    pub ai_calls: usize,
    pub cache_hit: bool,
}

/// Hash over the inputs that decide whether a cached domain layer is still valid
pub fn domain_input_hash(structure: &StructureLayer, semantics: &SemanticsLayer) -> String {
    let input = json!({
        "stats": structure.stats,
        "moduleCount": structure.modules.len(),
        "fileCount": semantics.files.len(),
        "symbolTotal": semantics.symbols.total_count,
    });
    format!("{:x}", Sha256::digest(input.to_string().as_bytes()))
}

/// Load the cache entry, `None` if missing or unreadable
pub fn load_cache_entry(path: &Path) -> Option<DomainCacheEntry> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!("[DOMAIN] Ignoring unreadable {}: {}", path.display(), e);
            None
        }
    }
}

pub struct DomainSynthesizer {
    client: Option<Arc<dyn AiClient>>,
    settings: AiConfig,
    cache_path: PathBuf,
}

impl DomainSynthesizer {
    /// `output_dir` is where `domain-cache.json` lives
    pub fn new(client: Option<Arc<dyn AiClient>>, settings: AiConfig, output_dir: &Path) -> Self {
        Self {
            client,
            settings,
            cache_path: output_dir.join(DOMAIN_CACHE_FILE),
        }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub async fn build(
        &self,
        project_root: &Path,
        structure: &StructureLayer,
        semantics: &SemanticsLayer,
        options: DomainBuildOptions,
    ) -> DomainBuild {
        let Some(client) = self.client.as_deref() else {
            tracing::info!("[DOMAIN] No AI backend configured, skipping domain synthesis");
            return DomainBuild {
                warnings: vec!["AI backend not configured; domain layer skipped".to_string()],
                ..Default::default()
            };
        };

        let input_hash = domain_input_hash(structure, semantics);
        if !options.force_refresh {
            if let Some(entry) = load_cache_entry(&self.cache_path) {
                if entry.input_hash == input_hash {
                    tracing::info!("[DOMAIN] Inputs unchanged, using cached domain layer");
                    return DomainBuild {
                        domain: entry.domain,
                        cache_hit: true,
                        ..Default::default()
                    };
                }
            }
        }

        let ctx = DomainContext::collect(project_root, structure, semantics);
        let mut session = Session {
            client,
            settings: &self.settings,
            ai_calls: 0,
            warnings: Vec::new(),
        };
        let domain = session.run(project_root, semantics, &ctx).await;

        let entry = DomainCacheEntry {
            input_hash,
            built_at: chrono::Utc::now().to_rfc3339(),
            domain,
        };
        if let Err(e) = write_json_atomic(&self.cache_path, &entry) {
            let warning = format!("Failed to write {}: {}", self.cache_path.display(), e);
            tracing::warn!("[DOMAIN] {}", warning);
            session.warnings.push(warning);
        }

        DomainBuild {
            domain: entry.domain,
            warnings: session.warnings,
            ai_calls: session.ai_calls,
            cache_hit: false,
        }
    }
}

/// One synthesis pass
struct Session<'a> {
    client: &'a dyn AiClient,
    settings: &'a AiConfig,
    ai_calls: usize,
    warnings: Vec<String>,
}

impl Session<'_> {
    async fn run(&mut self, project_root: &Path, semantics: &SemanticsLayer, ctx: &DomainContext) -> DomainLayer {
        let mut domain = DomainLayer::default();

        if let Some(r) = self
            .ask::<prompts::SummaryResponse>("project summary", prompts::project_summary(ctx))
            .await
        {
            domain.project_summary = r.summary;
        }

        if let Some(r) = self
            .ask::<ArchitectureInsight>("architecture", prompts::architecture(ctx))
            .await
        {
            domain.architecture = r;
        }

        if let Some(r) = self
            .ask::<prompts::PatternsResponse>("patterns", prompts::patterns(ctx))
            .await
        {
            domain.patterns = r.patterns;
            domain.conventions = r.conventions;
        }

        if let Some(r) = self
            .ask::<prompts::GlossaryResponse>("glossary", prompts::glossary(ctx))
            .await
        {
            domain.glossary = r.glossary;
        }

        domain.ddd = self.ask::<DddInsight>("domain-driven design", prompts::ddd(ctx)).await;

        domain.test_maturity = self
            .ask::<TestMaturityInsight>("test maturity", prompts::test_maturity(ctx))
            .await
            .map(|mut t| {
                t.test_file_count = ctx.test_files.len();
                t
            });

        domain.schema_consistency = self
            .ask::<SchemaConsistencyInsight>("schema consistency", prompts::schema_consistency(ctx))
            .await
            .map(|mut s| {
                s.consistency_score = s.consistency_score.map(|v| v.clamp(0.0, 1.0));
                s
            });

        domain.documentation_index = self.documentation_index(project_root, semantics).await;
        domain
    }

    async fn documentation_index(
        &mut self,
        project_root: &Path,
        semantics: &SemanticsLayer,
    ) -> Option<DocumentationIndex> {
        let (docs_dir, local) = docs::scan_documents(project_root)?;
        tracing::debug!("[DOMAIN] Indexing {} documents in {}", local.len(), docs_dir);

        let mut documents = Vec::with_capacity(local.len());
        for doc in &local {
            let mut insight = doc.insight.clone();
            let step = format!("document {}", insight.path);
            if let Some(r) = self.ask::<prompts::DocumentResponse>(&step, prompts::document(doc)).await {
                insight.summary = r.summary;
                insight.key_concepts = r.key_concepts;
                insight.related_symbols = r.related_symbols;
            }
            documents.push(insight);
        }

        let cross_references = docs::cross_references(&local, semantics);
        docs::merge_related_symbols(&mut documents, &cross_references);

        Some(DocumentationIndex {
            docs_dir,
            documents,
            cross_references,
        })
    }

    /// Issue one request and parse it into `T`; failures become warnings
    async fn ask<T: DeserializeOwned>(&mut self, step: &str, prompt: String) -> Option<T> {
        if self.ai_calls > 0 && self.settings.rate_limit_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.rate_limit_ms)).await;
        }
        self.ai_calls += 1;

        let request = AiRequest::prompt(self.settings.model(), self.settings.max_tokens_per_request, prompt);
        let outcome = match self.client.complete(&request).await {
            Ok(text) => prompts::parse_response::<T>(&text)
                .map_err(|e| format!("Malformed {} response: {}", step, e)),
            Err(e) => Err(format!("{} step failed: {}", step, e)),
        };

        match outcome {
            Ok(value) => Some(value),
            Err(warning) => {
                tracing::warn!("[DOMAIN] {}", warning);
                self.warnings.push(warning);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, AiFuture};
    use crate::schema::{DirectoryNode, NodeType, StructureStats};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replies from a queue; an empty queue answers `{}`
    struct Scripted {
        replies: Mutex<Vec<Result<String, AiError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, AiError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl AiClient for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn complete(&self, _request: &AiRequest) -> AiFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("{}".to_string()));
            Box::pin(async move { reply })
        }
    }

    fn settings() -> AiConfig {
        AiConfig {
            rate_limit_ms: 0,
            ..AiConfig::default()
        }
    }

    fn empty_layers(root: &Path) -> (StructureLayer, SemanticsLayer) {
        let structure = StructureLayer {
            root_dir: root.display().to_string(),
            tree: DirectoryNode {
                name: "root".into(),
                path: String::new(),
                node_type: NodeType::Directory,
                info: None,
                children: Vec::new(),
            },
            modules: Vec::new(),
            stats: StructureStats::default(),
        };
        (structure, SemanticsLayer::default())
    }

    #[tokio::test]
    async fn test_no_client_skips_with_single_warning() {
        let dir = TempDir::new().unwrap();
        let (structure, semantics) = empty_layers(dir.path());
        let synth = DomainSynthesizer::new(None, settings(), dir.path());

        let build = synth
            .build(dir.path(), &structure, &semantics, DomainBuildOptions::default())
            .await;
        assert_eq!(build.warnings.len(), 1);
        assert_eq!(build.ai_calls, 0);
        assert_eq!(build.domain, DomainLayer::default());
    }

    #[tokio::test]
    async fn test_failed_steps_keep_defaults() {
        let dir = TempDir::new().unwrap();
        let (structure, semantics) = empty_layers(dir.path());
        let client = Scripted::new(vec![
            Ok("```json\n{\"summary\": \"Billing service.\"}\n```".to_string()),
            Err(AiError::Status {
                status: 529,
                body: "overloaded".to_string(),
            }),
            Ok("not json at all".to_string()),
        ]);
        let synth = DomainSynthesizer::new(Some(client.clone()), settings(), dir.path());

        let build = synth
            .build(dir.path(), &structure, &semantics, DomainBuildOptions::default())
            .await;

        assert_eq!(build.ai_calls, 7);
        assert_eq!(client.calls.load(Ordering::SeqCst), 7);
        assert_eq!(build.domain.project_summary, "Billing service.");
        assert_eq!(build.domain.architecture, ArchitectureInsight::default());
        assert!(build.domain.patterns.is_empty());
        assert_eq!(build.warnings.len(), 2);
        assert!(build.warnings[0].contains("architecture"));
        assert!(build.warnings[1].contains("patterns"));
        // remaining steps answered `{}`
        assert!(build.domain.ddd.is_some());
        assert!(build.domain.documentation_index.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_ai() {
        let dir = TempDir::new().unwrap();
        let (structure, semantics) = empty_layers(dir.path());
        let client = Scripted::new(vec![Ok(r#"{"summary": "First pass."}"#.to_string())]);
        let synth = DomainSynthesizer::new(Some(client.clone()), settings(), dir.path());

        let first = synth
            .build(dir.path(), &structure, &semantics, DomainBuildOptions::default())
            .await;
        let second = synth
            .build(dir.path(), &structure, &semantics, DomainBuildOptions::default())
            .await;

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(second.ai_calls, 0);
        assert_eq!(
            serde_json::to_string(&first.domain).unwrap(),
            serde_json::to_string(&second.domain).unwrap()
        );

        let forced = synth
            .build(dir.path(), &structure, &semantics, DomainBuildOptions { force_refresh: true })
            .await;
        assert!(!forced.cache_hit);
        assert_eq!(forced.ai_calls, 7);
    }

    #[tokio::test]
    async fn test_documents_get_one_call_each() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/a.md"), "# A\n").unwrap();
        std::fs::write(dir.path().join("docs/b.md"), "# B\n").unwrap();
        let (structure, semantics) = empty_layers(dir.path());
        let client = Scripted::new(Vec::new());
        let synth = DomainSynthesizer::new(Some(client), settings(), dir.path());

        let build = synth
            .build(dir.path(), &structure, &semantics, DomainBuildOptions::default())
            .await;
        assert_eq!(build.ai_calls, 9);
        let index = build.domain.documentation_index.unwrap();
        assert_eq!(index.docs_dir, "docs");
        assert_eq!(index.documents.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_rate_limit() {
        let dir = TempDir::new().unwrap();
        let (structure, semantics) = empty_layers(dir.path());
        let client = Scripted::new(Vec::new());
        let settings = AiConfig {
            rate_limit_ms: 250,
            ..AiConfig::default()
        };
        let synth = DomainSynthesizer::new(Some(client), settings, dir.path());

        let started = tokio::time::Instant::now();
        let build = synth
            .build(dir.path(), &structure, &semantics, DomainBuildOptions::default())
            .await;
        let elapsed = started.elapsed();

        assert_eq!(build.ai_calls, 7);
        // no delay before the first call
        assert!(elapsed >= Duration::from_millis(250 * 6), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(250 * 7), "elapsed {:?}", elapsed);
    }

    #[test]
    fn test_input_hash_tracks_counts() {
        let dir = TempDir::new().unwrap();
        let (structure, mut semantics) = empty_layers(dir.path());
        let before = domain_input_hash(&structure, &semantics);
        assert_eq!(before, domain_input_hash(&structure, &semantics));
        semantics.symbols.total_count = 4;
        assert_ne!(before, domain_input_hash(&structure, &semantics));
        assert_eq!(before.len(), 64);
    }
}
