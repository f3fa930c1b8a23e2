//! HTTPS adapters for the supported providers

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{AiClient, AiError, AiFuture, AiRequest, SecretSource};
use crate::config::{AiConfig, AiProvider};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Live client for one provider
pub struct HttpAiClient {
    client: Client,
    provider: AiProvider,
    api_key: String,
}

impl HttpAiClient {
    pub fn new(provider: AiProvider, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            provider,
            api_key: api_key.into(),
        }
    }

    pub fn provider(&self) -> AiProvider {
        self.provider
    }

    async fn post_json(
        &self,
        request: reqwest::RequestBuilder,
        body: &serde_json::Value,
    ) -> Result<String, AiError> {
        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::Transport(format!("{} request failed: {}", self.provider.name(), e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AiError::Transport(format!("Failed to read {} response: {}", self.provider.name(), e)))?;

        if !status.is_success() {
            return Err(AiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn complete_anthropic(&self, request: &AiRequest) -> Result<String, AiError> {
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });
        let builder = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let text = self.post_json(builder, &body).await?;

        let parsed: AnthropicResponse =
            serde_json::from_str(&text).map_err(|e| AiError::Malformed(e.to_string()))?;
        Ok(parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<String>())
    }

    async fn complete_openai(&self, request: &AiRequest) -> Result<String, AiError> {
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });
        let builder = self.client.post(OPENAI_API_URL).bearer_auth(&self.api_key);
        let text = self.post_json(builder, &body).await?;

        let parsed: OpenAiResponse =
            serde_json::from_str(&text).map_err(|e| AiError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::Malformed("response has no choices".to_string()))
    }

    async fn complete_gemini(&self, request: &AiRequest) -> Result<String, AiError> {
        let contents: Vec<GeminiContent> = request
            .messages
            .iter()
            .map(|m| GeminiContent {
                role: m.role.clone(),
                parts: vec![GeminiPart {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();
        let body = json!({
            "contents": contents,
            "generationConfig": { "maxOutputTokens": request.max_tokens },
        });
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, request.model);
        let builder = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())]);
        let text = self.post_json(builder, &body).await?;

        let parsed: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| AiError::Malformed(e.to_string()))?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Malformed("response has no candidates".to_string()))?;
        Ok(candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<String>())
    }
}

impl AiClient for HttpAiClient {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn complete(&self, request: &AiRequest) -> AiFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            match self.provider {
                AiProvider::Anthropic => self.complete_anthropic(&request).await,
                AiProvider::OpenAi => self.complete_openai(&request).await,
                AiProvider::Gemini => self.complete_gemini(&request).await,
            }
        })
    }
}

/// Build a live client for the configured provider.
///
/// # Errors
///
/// [`AiError::MissingKey`] when the key variable is unset or empty.
pub fn resolve_client(config: &AiConfig, secrets: &dyn SecretSource) -> Result<HttpAiClient, AiError> {
    let key_env = config.key_env();
    let api_key = secrets
        .get(key_env)
        .ok_or_else(|| AiError::MissingKey(key_env.to_string()))?;
    Ok(HttpAiClient::new(config.provider, api_key))
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}
