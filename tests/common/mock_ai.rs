//! Deterministic AI client for domain-layer tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ontoindex::{AiClient, AiError, AiFuture, AiRequest};

/// One reply that every domain step can parse
pub const UNIVERSAL_REPLY: &str = r#"{
  "summary": "Order management service.",
  "style": "layered",
  "layers": ["api", "services", "storage"],
  "keyDecisions": ["TypeScript everywhere"],
  "patterns": [{"name": "Repository", "description": "Storage behind an interface", "examples": ["OrderRepo"]}],
  "conventions": [{"category": "naming", "description": "camelCase functions"}],
  "glossary": [{"term": "Order", "definition": "A customer purchase"}],
  "aggregateRoots": ["Order"],
  "maturityLevel": "basic",
  "consistencyScore": 0.8,
  "keyConcepts": ["orders"]
}"#;

/// Answers every request with [`UNIVERSAL_REPLY`] and counts calls
#[derive(Default)]
pub struct MockAi {
    calls: AtomicUsize,
}

impl MockAi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AiClient for MockAi {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(&self, _request: &AiRequest) -> AiFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply: Result<String, AiError> = Ok(UNIVERSAL_REPLY.to_string());
        Box::pin(async move { reply })
    }
}
