//! ontoindex: a layered knowledge index for source code projects
//!
//! Three layers are built over a project and kept up to date as it changes:
//!
//! - **structure**: directory tree, file metadata, module-relation edges
//! - **semantics**: symbols, imports, dependency graph and `@MX` annotations
//! - **domain**: architecture, patterns and glossary synthesized by an AI backend
//!
//! Layers are cached in `<output_dir>/cache.json` and rendered as markdown
//! next to it. A refresh re-hashes the project and only redoes the work the
//! changed files require.
//!
//! # Example
//!
//! ```ignore
//! use ontoindex::{Indexer, OntoConfig};
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let indexer = Indexer::new(OntoConfig::load(root));
//! let report = indexer.build(root).await?;
//! for warning in report.warnings() {
//!     eprintln!("{}", warning);
//! }
//! ```

pub mod ai;
pub mod analyzers;
pub mod annotations;
pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_utils;
pub mod incremental;
pub mod lang;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod schema;
pub mod semantics;
pub mod structure;

// Re-export commonly used types
pub use ai::{AiClient, AiError, AiFuture, AiRequest, SecretSource};
pub use analyzers::{AnalyzerRegistry, LanguageAnalyzer};
pub use cache::{LayerData, OntologyCache};
pub use config::{AiConfig, AiProvider, AnalyzerBackend, ExcludeSet, OntoConfig};
pub use domain::{DomainBuildOptions, DomainContext, DomainSynthesizer};
pub use error::{OntoError, Result};
pub use incremental::{compute_changes, FileChanges};
pub use lang::Language;
pub use pipeline::Indexer;
pub use report::{BuildMode, BuildReport, LayerKind, LayerResult, StatusReport};
pub use schema::{DomainLayer, SemanticsLayer, StructureLayer, SCHEMA_VERSION};
