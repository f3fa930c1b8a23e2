//! Change detection and selective layer updates
//!
//! Content hashes (SHA-256) of every tracked file are kept in the ontology
//! cache. A refresh hashes the tree again, classifies the difference, and
//! re-runs only what the policy in [`UpdatePolicy`] asks for:
//!
//! - structure: incremental, or a full rescan above the rescan ceiling
//! - semantics: changed files re-analyzed, annotations regenerated in full
//! - domain: rebuilt only when the changed ratio exceeds the materiality
//!   threshold, otherwise the cached layer is kept as is

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analyzers::AnalyzerRegistry;
use crate::annotations;
use crate::cache::{LayerData, OntologyCache};
use crate::config::{ExcludeSet, OntoConfig, UpdatePolicy};
use crate::domain::{DomainBuildOptions, DomainSynthesizer};
use crate::report::{LayerKind, LayerResult};
use crate::schema::AnnotationSummary;
use crate::semantics;
use crate::structure;

/// Files that differ from the last recorded hashes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl FileChanges {
    /// Every changed path: added, then modified, then deleted
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.modified.iter()).chain(self.deleted.iter())
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// SHA-256 hex digest of a byte slice
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hash every file under the root that survives the exclude filter.
///
/// Unreadable files are skipped with a warning.
pub fn hash_project_files(project_root: &Path, excludes: &ExcludeSet) -> BTreeMap<String, String> {
    let patterns = excludes.clone();
    let walker = WalkBuilder::new(project_root)
        .standard_filters(false)
        .filter_entry(move |entry| {
            entry.depth() == 0 || !patterns.matches(&entry.file_name().to_string_lossy())
        })
        .build();

    let mut hashes = BTreeMap::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("[UPDATE] Walk error: {}", e);
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(project_root) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        match fs::read(entry.path()) {
            Ok(bytes) => {
                hashes.insert(rel, hash_bytes(&bytes));
            }
            Err(e) => tracing::warn!("[UPDATE] Cannot hash {}: {}", rel, e),
        }
    }
    hashes
}

/// Classify the difference between two hash maps; each list is sorted
pub fn diff_hashes(previous: &BTreeMap<String, String>, current: &BTreeMap<String, String>) -> FileChanges {
    let mut changes = FileChanges::default();
    for (path, hash) in current {
        match previous.get(path) {
            None => changes.added.push(path.clone()),
            Some(old) if old != hash => changes.modified.push(path.clone()),
            Some(_) => {}
        }
    }
    changes.deleted = previous
        .keys()
        .filter(|p| !current.contains_key(*p))
        .cloned()
        .collect();
    changes
}

/// Changes since the hashes recorded in `cache`
pub fn compute_changes(project_root: &Path, cache: &OntologyCache, excludes: &ExcludeSet) -> FileChanges {
    diff_hashes(&cache.file_hashes, &hash_project_files(project_root, excludes))
}

/// Share of tracked files touched by `changes`
pub fn change_ratio(changes: &FileChanges, tracked_files: usize) -> f64 {
    changes.total() as f64 / tracked_files.max(1) as f64
}

/// Whether the domain layer must be rebuilt for this change set.
///
/// `tracked_files` is the size of the hash map the changes were diffed
/// against, so both sides of the ratio count the same files.
pub fn domain_needs_rebuild(changes: &FileChanges, tracked_files: usize, policy: &UpdatePolicy) -> bool {
    change_ratio(changes, tracked_files) > policy.domain_materiality_ratio
}

/// Everything an update needs besides the previous layers
pub struct UpdateContext<'a> {
    pub project_root: &'a Path,
    pub config: &'a OntoConfig,
    pub excludes: &'a ExcludeSet,
    /// Files in the current hash map
    pub tracked_files: usize,
    pub registry: &'a AnalyzerRegistry,
    pub synthesizer: &'a DomainSynthesizer,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    pub layers: LayerData,
    pub results: Vec<LayerResult>,
    pub annotation_summary: Option<AnnotationSummary>,
    pub domain_rebuilt: bool,
}

/// Bring `existing` up to date with `changes`.
///
/// A layer that cannot be updated keeps its previous value and reports a
/// failed [`LayerResult`]; layers that depend on it are not touched.
pub async fn apply_update(existing: &LayerData, changes: &FileChanges, ctx: &UpdateContext<'_>) -> UpdateOutcome {
    let mut outcome = UpdateOutcome {
        layers: existing.clone(),
        ..Default::default()
    };
    let config = ctx.config;

    // Structure
    let started = Instant::now();
    let structure_result = match &existing.structure {
        Some(previous) if changes.total() <= config.update.structure_rescan_ceiling => {
            tracing::debug!("[UPDATE] Incremental structure update for {} files", changes.total());
            structure::update_incremental(ctx.project_root, previous, changes, ctx.excludes, config.max_depth)
        }
        _ => {
            tracing::debug!("[UPDATE] Full structure rescan ({} changed files)", changes.total());
            structure::scan(ctx.project_root, ctx.excludes, config.max_depth)
        }
    };
    let structure_layer = match structure_result {
        Ok(layer) => {
            outcome.results.push(LayerResult::ok(
                LayerKind::Structure,
                started,
                layer.stats.total_files,
                Vec::new(),
            ));
            layer
        }
        Err(e) => {
            outcome
                .results
                .push(LayerResult::failed(LayerKind::Structure, started, e.to_string()));
            return outcome;
        }
    };

    // Semantics + annotations
    let started = Instant::now();
    let mut build = match &existing.semantics {
        Some(previous) => semantics::update_incremental(
            ctx.project_root,
            previous,
            &structure_layer,
            changes,
            &config.languages,
            ctx.registry,
        ),
        None => semantics::build(ctx.project_root, &structure_layer, &config.languages, ctx.registry),
    };
    let result = annotations::generate(&build.layer, ctx.project_root, &config.thresholds);
    outcome.annotation_summary = Some(result.summary.clone());
    annotations::apply(&mut build.layer, result);
    outcome.results.push(LayerResult::ok(
        LayerKind::Semantics,
        started,
        build.layer.files.len(),
        build.warnings,
    ));

    // Domain
    let started = Instant::now();
    let tracked_files = ctx.tracked_files;
    let rebuild = existing.domain.is_none() || domain_needs_rebuild(changes, tracked_files, &config.update);

    if rebuild {
        let options = DomainBuildOptions {
            force_refresh: existing.domain.is_some(),
        };
        let domain = ctx
            .synthesizer
            .build(ctx.project_root, &structure_layer, &build.layer, options)
            .await;
        let file_count = domain
            .domain
            .documentation_index
            .as_ref()
            .map(|d| d.documents.len())
            .unwrap_or(0);
        if ctx.synthesizer.has_client() || existing.domain.is_none() {
            outcome.layers.domain = Some(domain.domain);
            outcome.domain_rebuilt = ctx.synthesizer.has_client();
        }
        outcome
            .results
            .push(LayerResult::ok(LayerKind::Domain, started, file_count, domain.warnings));
    } else {
        let warning = format!(
            "{} of {} files changed ({:.0}%), below the {:.0}% materiality threshold; cache retained",
            changes.total(),
            tracked_files,
            change_ratio(changes, tracked_files) * 100.0,
            config.update.domain_materiality_ratio * 100.0
        );
        tracing::info!("[UPDATE] {}", warning);
        outcome
            .results
            .push(LayerResult::ok(LayerKind::Domain, started, 0, vec![warning]));
    }

    outcome.layers.structure = Some(structure_layer);
    outcome.layers.semantics = Some(build.layer);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;
    use crate::schema::{DomainLayer, ModuleRelation, RelationKind};
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_hashing_respects_excludes() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/a.ts", "a");
        write(&dir, "node_modules/x/index.js", "x");
        write(&dir, ".ontoindex/cache.json", "{}");

        let excludes = ExcludeSet::new(["node_modules", ".ontoindex"], Vec::<String>::new());
        let hashes = hash_project_files(dir.path(), &excludes);
        let paths: Vec<&str> = hashes.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["src/a.ts"]);
        assert_eq!(hashes["src/a.ts"], hash_bytes(b"a"));
    }

    #[test]
    fn test_compute_changes_twice_is_empty_the_second_time() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.ts", "one");
        write(&dir, "b.ts", "two");
        let cache = OntologyCache::new(BTreeMap::new(), LayerData::default());

        let first = compute_changes(dir.path(), &cache, &ExcludeSet::default());
        assert_eq!(first.added, vec!["a.ts", "b.ts"]);

        let hashes = hash_project_files(dir.path(), &ExcludeSet::default());
        let cache = OntologyCache::new(hashes, LayerData::default());
        let second = compute_changes(dir.path(), &cache, &ExcludeSet::default());
        assert!(second.is_empty());
    }

    #[test]
    fn test_diff_classifies_each_kind() {
        let previous: BTreeMap<String, String> = [("a", "1"), ("b", "2"), ("c", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let current: BTreeMap<String, String> = [("a", "1"), ("b", "changed"), ("d", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let changes = diff_hashes(&previous, &current);
        assert_eq!(changes.added, vec!["d"]);
        assert_eq!(changes.modified, vec!["b"]);
        assert_eq!(changes.deleted, vec!["c"]);
        assert_eq!(changes.total(), 3);
    }

    #[test]
    fn test_materiality_threshold() {
        let policy = UpdatePolicy::default();
        let changes = |n: usize| FileChanges {
            modified: (0..n).map(|i| format!("f{}", i)).collect(),
            ..Default::default()
        };
        assert!(domain_needs_rebuild(&changes(6), 10, &policy));
        assert!(!domain_needs_rebuild(&changes(1), 20, &policy));
        // exactly at the ratio is not above it
        assert!(!domain_needs_rebuild(&changes(2), 10, &policy));
        assert!(domain_needs_rebuild(&changes(1), 0, &policy));
    }

    async fn update_with(
        dir: &TempDir,
        config: &OntoConfig,
        existing: &LayerData,
        changes: &FileChanges,
        tracked_files: usize,
    ) -> UpdateOutcome {
        let registry = AnalyzerRegistry::default();
        let synthesizer = DomainSynthesizer::new(None, AiConfig::default(), &dir.path().join(".ontoindex"));
        let excludes = config.effective_excludes(dir.path());
        let ctx = UpdateContext {
            project_root: dir.path(),
            config,
            excludes: &excludes,
            tracked_files,
            registry: &registry,
            synthesizer: &synthesizer,
        };
        apply_update(existing, changes, &ctx).await
    }

    fn edges(outcome: &UpdateOutcome) -> Vec<(String, String)> {
        outcome
            .layers
            .structure
            .as_ref()
            .unwrap()
            .modules
            .iter()
            .map(|m| (m.source.clone(), m.target.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_changes_above_ceiling_rescan_every_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.ts", "import x from './x';\n");
        write(&dir, "b.ts", "import y from './y';\n");
        let config = OntoConfig {
            update: UpdatePolicy {
                structure_rescan_ceiling: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let excludes = config.effective_excludes(dir.path());
        let mut previous = structure::scan(dir.path(), &excludes, config.max_depth).unwrap();
        // an edge b.ts does not contain; only a full rescan drops it
        previous.modules.push(ModuleRelation {
            source: "b.ts".into(),
            target: "./stale".into(),
            kind: RelationKind::Import,
        });
        let existing = LayerData {
            structure: Some(previous),
            ..Default::default()
        };

        write(&dir, "a.ts", "import z from './z';\n");
        write(&dir, "c.ts", "import w from './w';\n");
        let changes = FileChanges {
            added: vec!["c.ts".into()],
            modified: vec!["a.ts".into()],
            ..Default::default()
        };

        let rescanned = update_with(&dir, &config, &existing, &changes, 3).await;
        let pair = |s: &str, t: &str| (s.to_string(), t.to_string());
        assert_eq!(
            edges(&rescanned),
            vec![pair("a.ts", "./z"), pair("b.ts", "./y"), pair("c.ts", "./w")]
        );

        let within_ceiling = update_with(&dir, &OntoConfig::default(), &existing, &changes, 3).await;
        assert!(edges(&within_ceiling).contains(&pair("b.ts", "./stale")));
        assert!(edges(&within_ceiling).contains(&pair("a.ts", "./z")));
    }

    #[tokio::test]
    async fn test_materiality_counts_files_beyond_depth_limit() {
        let dir = TempDir::new().unwrap();
        write(&dir, "top.ts", "export const top = 1;\n");
        for i in 0..9 {
            write(&dir, &format!("a/b/c/deep{}.ts", i), "export const d = 1;\n");
        }
        let config = OntoConfig {
            max_depth: 2,
            ..Default::default()
        };
        let excludes = config.effective_excludes(dir.path());
        let hashes = hash_project_files(dir.path(), &excludes);
        assert_eq!(hashes.len(), 10);
        let structure_layer = structure::scan(dir.path(), &excludes, config.max_depth).unwrap();
        assert_eq!(structure_layer.stats.total_files, 1);
        let existing = LayerData {
            structure: Some(structure_layer),
            domain: Some(DomainLayer::default()),
            ..Default::default()
        };

        write(&dir, "top.ts", "export const top = 2;\n");
        let changes = FileChanges {
            modified: vec!["top.ts".into()],
            ..Default::default()
        };
        let outcome = update_with(&dir, &config, &existing, &changes, hashes.len()).await;

        assert!(!outcome.domain_rebuilt);
        let domain = outcome.results.iter().find(|r| r.layer == LayerKind::Domain).unwrap();
        assert_eq!(domain.warnings.len(), 1);
        assert!(domain.warnings[0].starts_with("1 of 10 files changed (10%)"));
        assert!(domain.warnings[0].ends_with("cache retained"));
    }
}
