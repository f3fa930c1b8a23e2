//! Common test utilities and fixtures for ontoindex integration tests
//!
//! - `TestRepo` builder for throwaway project trees
//! - `MockAi`, an [`ontoindex::AiClient`] that counts calls

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod mock_ai;
pub mod test_repo;

pub use mock_ai::MockAi;
pub use test_repo::TestRepo;

use ontoindex::{AiConfig, OntoConfig};

/// Default config with an AI section and no rate limiting
pub fn config_with_ai() -> OntoConfig {
    OntoConfig {
        ai: Some(AiConfig {
            rate_limit_ms: 0,
            ..AiConfig::default()
        }),
        ..OntoConfig::default()
    }
}
