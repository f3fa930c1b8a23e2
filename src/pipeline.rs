//! Build, refresh, status and context entry points
//!
//! Each layer is built in isolation. A failing layer produces a failed
//! [`LayerResult`] and the layers that depend on it are reported as skipped;
//! whatever did get built is still cached and rendered.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::ai::{resolve_client, AiClient, ProcessEnv, SecretSource};
use crate::analyzers::AnalyzerRegistry;
use crate::annotations;
use crate::cache::{LayerData, OntologyCache};
use crate::config::OntoConfig;
use crate::domain::{DomainBuildOptions, DomainContext, DomainSynthesizer};
use crate::error::{OntoError, Result};
use crate::incremental::{apply_update, diff_hashes, hash_project_files, UpdateContext};
use crate::render;
use crate::report::{BuildMode, BuildReport, LayerKind, LayerPresence, LayerResult, StatusReport};
use crate::schema::DomainLayer;
use crate::semantics;
use crate::structure;

const SKIPPED_NO_STRUCTURE: &str = "skipped: structure layer unavailable";

/// Owns configuration, analyzers and the optional AI client for one project
pub struct Indexer {
    config: OntoConfig,
    registry: AnalyzerRegistry,
    ai: Option<Arc<dyn AiClient>>,
}

impl Indexer {
    /// Resolve the AI client from the process environment
    pub fn new(config: OntoConfig) -> Self {
        Self::with_secrets(config, &ProcessEnv)
    }

    pub fn with_secrets(config: OntoConfig, secrets: &dyn SecretSource) -> Self {
        let ai = match &config.ai {
            Some(settings) => match resolve_client(settings, secrets) {
                Ok(client) => {
                    tracing::info!("[CONFIG] AI backend: {} ({})", client.name(), settings.model());
                    Some(Arc::new(client) as Arc<dyn AiClient>)
                }
                Err(e) => {
                    tracing::warn!("[CONFIG] AI backend disabled: {}", e);
                    None
                }
            },
            None => None,
        };
        Self {
            registry: AnalyzerRegistry::with_backend(config.analyzer),
            config,
            ai,
        }
    }

    /// Replace the AI client, e.g. with a host-provided one
    pub fn with_ai_client(mut self, client: Arc<dyn AiClient>) -> Self {
        self.ai = Some(client);
        self
    }

    pub fn config(&self) -> &OntoConfig {
        &self.config
    }

    pub fn ai_backend(&self) -> Option<&str> {
        self.ai.as_deref().map(|c| c.name())
    }

    fn output_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.config.output_dir)
    }

    fn synthesizer(&self, project_root: &Path) -> DomainSynthesizer {
        DomainSynthesizer::new(
            self.ai.clone(),
            self.config.ai.clone().unwrap_or_default(),
            &self.output_dir(project_root),
        )
    }

    /// Build every layer from scratch, then cache and render the results.
    ///
    /// # Errors
    ///
    /// Only for a missing project root or a failed cache write. Layer
    /// failures are reported in the returned [`BuildReport`].
    pub async fn build(&self, project_root: &Path) -> Result<BuildReport> {
        check_root(project_root)?;
        let excludes = self.config.effective_excludes(project_root);
        let hashes = hash_project_files(project_root, &excludes);
        tracing::info!("[SCAN] Full build of {} ({} files)", project_root.display(), hashes.len());

        let mut results = Vec::new();
        let mut layers = LayerData::default();
        let mut annotation_summary = None;
        let mut domain_context = None;

        let started = Instant::now();
        match structure::scan(project_root, &excludes, self.config.max_depth) {
            Ok(layer) => {
                results.push(LayerResult::ok(
                    LayerKind::Structure,
                    started,
                    layer.stats.total_files,
                    Vec::new(),
                ));
                layers.structure = Some(layer);
            }
            Err(e) => {
                tracing::warn!("[SCAN] Structure layer failed: {}", e);
                results.push(LayerResult::failed(LayerKind::Structure, started, e.to_string()));
            }
        }

        let started = Instant::now();
        match &layers.structure {
            Some(structure_layer) => {
                let mut built = semantics::build(project_root, structure_layer, &self.config.languages, &self.registry);
                let annotated = annotations::generate(&built.layer, project_root, &self.config.thresholds);
                annotation_summary = Some(annotated.summary.clone());
                annotations::apply(&mut built.layer, annotated);
                results.push(LayerResult::ok(
                    LayerKind::Semantics,
                    started,
                    built.layer.files.len(),
                    built.warnings,
                ));
                layers.semantics = Some(built.layer);
            }
            None => results.push(LayerResult::failed(LayerKind::Semantics, started, SKIPPED_NO_STRUCTURE)),
        }

        let started = Instant::now();
        match (&layers.structure, &layers.semantics) {
            (Some(structure_layer), Some(semantics_layer)) => {
                let domain = self
                    .synthesizer(project_root)
                    .build(project_root, structure_layer, semantics_layer, DomainBuildOptions::default())
                    .await;
                tracing::info!(
                    "[DOMAIN] {} AI calls{}",
                    domain.ai_calls,
                    if domain.cache_hit { " (cache hit)" } else { "" }
                );
                if self.ai.is_none() {
                    domain_context = Some(DomainContext::collect(project_root, structure_layer, semantics_layer));
                }
                let doc_count = documentation_count(&domain.domain);
                results.push(LayerResult::ok(LayerKind::Domain, started, doc_count, domain.warnings));
                layers.domain = Some(domain.domain);
            }
            _ => results.push(LayerResult::failed(LayerKind::Domain, started, SKIPPED_NO_STRUCTURE)),
        }

        let output_files = self.persist(project_root, hashes, layers)?;
        Ok(BuildReport {
            mode: BuildMode::Full,
            results,
            output_files,
            domain_context,
            annotation_summary,
            changes: None,
        })
    }

    /// Update the cached layers for files changed since the last build.
    ///
    /// Falls back to [`build`](Self::build) without a usable cache.
    pub async fn refresh(&self, project_root: &Path) -> Result<BuildReport> {
        check_root(project_root)?;
        let output_dir = self.output_dir(project_root);
        let cache = match OntologyCache::load(&output_dir) {
            Some(cache) if cache.supports_incremental() => cache,
            _ => {
                tracing::info!("[UPDATE] No usable cache, running a full build");
                return self.build(project_root).await;
            }
        };

        let excludes = self.config.effective_excludes(project_root);
        let hashes = hash_project_files(project_root, &excludes);
        let changes = diff_hashes(&cache.file_hashes, &hashes);
        if changes.is_empty() {
            tracing::info!("[UPDATE] No changes since {}", cache.built_at);
            return Ok(BuildReport {
                mode: BuildMode::UpToDate,
                results: Vec::new(),
                output_files: Vec::new(),
                domain_context: None,
                annotation_summary: None,
                changes: Some(changes),
            });
        }
        tracing::info!(
            "[UPDATE] {} added, {} modified, {} deleted",
            changes.added.len(),
            changes.modified.len(),
            changes.deleted.len()
        );

        let synthesizer = self.synthesizer(project_root);
        let ctx = UpdateContext {
            project_root,
            config: &self.config,
            excludes: &excludes,
            tracked_files: hashes.len(),
            registry: &self.registry,
            synthesizer: &synthesizer,
        };
        let outcome = apply_update(&cache.layer_data, &changes, &ctx).await;

        let domain_context = match (&outcome.layers.structure, &outcome.layers.semantics, &self.ai) {
            (Some(s), Some(m), None) => Some(DomainContext::collect(project_root, s, m)),
            _ => None,
        };
        let output_files = self.persist(project_root, hashes, outcome.layers)?;
        Ok(BuildReport {
            mode: BuildMode::Incremental,
            results: outcome.results,
            output_files,
            domain_context,
            annotation_summary: outcome.annotation_summary,
            changes: Some(changes),
        })
    }

    /// Report what is cached and what changed since, without building anything
    pub fn status(&self, project_root: &Path) -> Result<StatusReport> {
        check_root(project_root)?;
        let output_dir = self.output_dir(project_root);
        let cache = OntologyCache::load(&output_dir);

        let pending_changes = cache.as_ref().map(|c| {
            let excludes = self.config.effective_excludes(project_root);
            diff_hashes(&c.file_hashes, &hash_project_files(project_root, &excludes))
        });
        let layers = cache
            .as_ref()
            .map(|c| LayerPresence {
                structure: c.layer_data.structure.is_some(),
                semantics: c.layer_data.semantics.is_some(),
                domain: c.layer_data.domain.is_some(),
            })
            .unwrap_or_default();

        Ok(StatusReport {
            project_root: project_root.display().to_string(),
            output_dir: output_dir.display().to_string(),
            cache_present: cache.is_some(),
            built_at: cache.as_ref().map(|c| c.built_at.clone()),
            schema_version: cache.as_ref().map(|c| c.version.clone()),
            tracked_files: cache.as_ref().map(|c| c.file_hashes.len()).unwrap_or(0),
            layers,
            pending_changes,
            ai_backend: self.ai_backend().map(str::to_string),
        })
    }

    /// Domain step inputs for hosts that run the analysis themselves.
    ///
    /// Uses cached layers when present, otherwise scans the project.
    pub fn domain_context(&self, project_root: &Path) -> Result<DomainContext> {
        check_root(project_root)?;
        if let Some(cache) = OntologyCache::load(&self.output_dir(project_root)) {
            if let (Some(s), Some(m)) = (&cache.layer_data.structure, &cache.layer_data.semantics) {
                return Ok(DomainContext::collect(project_root, s, m));
            }
        }
        let excludes = self.config.effective_excludes(project_root);
        let structure_layer = structure::scan(project_root, &excludes, self.config.max_depth)?;
        let built = semantics::build(project_root, &structure_layer, &self.config.languages, &self.registry);
        Ok(DomainContext::collect(project_root, &structure_layer, &built.layer))
    }

    /// Save the cache and render documents, returning every written path
    fn persist(
        &self,
        project_root: &Path,
        hashes: BTreeMap<String, String>,
        layers: LayerData,
    ) -> Result<Vec<String>> {
        let output_dir = self.output_dir(project_root);
        let documents = render::write_documents(project_root, &self.config.output_dir, &layers)?;
        let cache_path = OntologyCache::new(hashes, layers).save(&output_dir)?;

        let mut files: Vec<String> = documents.iter().map(|p| p.display().to_string()).collect();
        files.push(cache_path.display().to_string());
        Ok(files)
    }
}

fn documentation_count(domain: &DomainLayer) -> usize {
    domain
        .documentation_index
        .as_ref()
        .map(|d| d.documents.len())
        .unwrap_or(0)
}

fn check_root(project_root: &Path) -> Result<()> {
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
    Ok(())
}
