//! AI completion port
//!
//! The domain synthesizer only sees [`AiClient`]. Provider wire formats live
//! in [`http`]; tests substitute their own client.

pub mod http;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::{resolve_client, HttpAiClient};

/// Boxed future returned by [`AiClient::complete`], keeps the trait object-safe
pub type AiFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>>;

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: String,
}

impl AiMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Provider-neutral completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<AiMessage>,
}

impl AiRequest {
    /// Request with a single user message
    pub fn prompt(model: impl Into<String>, max_tokens: u32, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages: vec![AiMessage::user(prompt)],
        }
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    /// Non-2xx response; body kept as plain text
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("API key not found in environment variable {0}")]
    MissingKey(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Sends completion requests to a language model
pub trait AiClient: Send + Sync {
    /// Provider name for logs and reports
    fn name(&self) -> &str;

    /// Complete a request, returning the concatenated response text.
    ///
    /// # Errors
    ///
    /// [`AiError::Status`] for non-2xx responses, [`AiError::Transport`] when
    /// the request never completed.
    fn complete(&self, request: &AiRequest) -> AiFuture<'_>;
}

/// Where API keys come from
pub trait SecretSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl SecretSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl SecretSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).filter(|v| !v.trim().is_empty()).cloned()
    }
}
