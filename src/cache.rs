//! Persisted layer state: `<output_dir>/cache.json`
//!
//! The cache is the only place layers survive between runs. It is read
//! leniently (anything unreadable or from another schema version counts as
//! absent) and written atomically.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OntoError, Result};
use crate::fs_utils::write_json_atomic;
use crate::schema::{DomainLayer, SemanticsLayer, StructureLayer, SCHEMA_VERSION};

/// Cache file name inside the output directory
pub const CACHE_FILE: &str = "cache.json";

/// Layers as last built; a missing layer was never built or failed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantics: Option<SemanticsLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyCache {
    /// Schema version for compatibility
    pub version: String,

    /// RFC 3339 time of the write
    pub built_at: String,

    /// Project-relative path -> SHA-256 hex of the content
    pub file_hashes: BTreeMap<String, String>,

    pub layer_data: LayerData,
}

impl OntologyCache {
    pub fn new(file_hashes: BTreeMap<String, String>, layer_data: LayerData) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            built_at: chrono::Utc::now().to_rfc3339(),
            file_hashes,
            layer_data,
        }
    }

    pub fn path(output_dir: &Path) -> PathBuf {
        output_dir.join(CACHE_FILE)
    }

    /// Load the cache, `None` when missing, unreadable or from another schema version
    pub fn load(output_dir: &Path) -> Option<Self> {
        let path = Self::path(output_dir);
        let text = fs::read_to_string(&path).ok()?;
        let cache: Self = match serde_json::from_str(&text) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("[CACHE] Ignoring unreadable {}: {}", path.display(), e);
                return None;
            }
        };
        if cache.version != SCHEMA_VERSION {
            tracing::info!(
                "[CACHE] Schema version {} != {}, ignoring cache",
                cache.version,
                SCHEMA_VERSION
            );
            return None;
        }
        Some(cache)
    }

    /// Write atomically, returning the cache path
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = Self::path(output_dir);
        write_json_atomic(&path, self).map_err(|e| OntoError::Cache {
            message: format!("Failed to write {}: {}", path.display(), e),
        })?;
        Ok(path)
    }

    /// Structure and semantics are both present, so a refresh can be incremental
    pub fn supports_incremental(&self) -> bool {
        self.layer_data.structure.is_some() && self.layer_data.semantics.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut hashes = BTreeMap::new();
        hashes.insert("src/a.ts".to_string(), "ab".repeat(32));
        let cache = OntologyCache::new(hashes, LayerData::default());

        let path = cache.save(dir.path()).unwrap();
        assert!(path.ends_with(CACHE_FILE));

        let loaded = OntologyCache::load(dir.path()).unwrap();
        assert_eq!(loaded, cache);
        assert!(!loaded.supports_incremental());
    }

    #[test]
    fn test_missing_or_corrupt_is_absent() {
        let dir = TempDir::new().unwrap();
        assert!(OntologyCache::load(dir.path()).is_none());

        fs::write(dir.path().join(CACHE_FILE), "{ not json").unwrap();
        assert!(OntologyCache::load(dir.path()).is_none());
    }

    #[test]
    fn test_version_mismatch_is_absent() {
        let dir = TempDir::new().unwrap();
        let mut cache = OntologyCache::new(BTreeMap::new(), LayerData::default());
        cache.version = "0.9".to_string();
        cache.save(dir.path()).unwrap();
        assert!(OntologyCache::load(dir.path()).is_none());
    }
}
