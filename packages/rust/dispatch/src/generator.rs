//! Generation-service adapter.
//!
//! The service turns one identifier (usually a URL) into a Markdown summary.
//! It speaks the OpenAI-compatible chat-completions protocol: the identifier
//! is sent as the sole user message and the reply's first choice is the
//! fragment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use mdigest_shared::{AppConfig, DigestError, Result, validate_generation};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("mdigest/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// MarkdownGenerator
// ---------------------------------------------------------------------------

/// Produces a Markdown fragment for a single identifier.
///
/// Errors only affect the item they were raised for; the dispatcher records
/// them as failed outcomes and carries on.
#[async_trait]
pub trait MarkdownGenerator: Send + Sync {
    async fn generate(&self, identifier: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ChatCompletionsGenerator
// ---------------------------------------------------------------------------

/// [`MarkdownGenerator`] backed by a chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsGenerator {
    client: Client,
    endpoint: String,
    model_id: String,
    api_key: String,
}

impl ChatCompletionsGenerator {
    /// Build a generator for `base_url`. Requests go to
    /// `{base_url}/chat/completions`.
    pub fn new(
        base_url: &Url,
        model_id: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DigestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.as_str().trim_end_matches('/')),
            model_id: model_id.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a generator from the `[generation]` config section, validating
    /// the model id and API key first.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = validate_generation(config)?;
        let generation = &config.generation;
        let base_url = Url::parse(&generation.base_url)
            .map_err(|e| DigestError::config(format!("invalid generation base_url: {e}")))?;

        Self::new(
            &base_url,
            &generation.model_id,
            api_key,
            Duration::from_secs(generation.timeout_secs),
        )
    }

    /// The full request URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MarkdownGenerator for ChatCompletionsGenerator {
    #[instrument(skip_all, fields(identifier = %identifier))]
    async fn generate(&self, identifier: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model_id,
            messages: [ChatMessage {
                role: "user",
                content: identifier,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DigestError::generation(identifier, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DigestError::generation(
                identifier,
                format!("HTTP {}: {}", status.as_u16(), detail.trim()),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DigestError::generation(identifier, format!("malformed response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DigestError::generation(identifier, "response contained no content"))?;

        debug!(len = content.len(), "fragment received");
        Ok(trim_preamble(&content).to_string())
    }
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

/// Drop any chatter the service puts before the first heading.
///
/// Text that already starts with `#` is returned as-is, and text without any
/// `#` is kept verbatim.
pub fn trim_preamble(text: &str) -> &str {
    if text.starts_with('#') {
        return text;
    }
    match text.find('#') {
        Some(pos) => &text[pos..],
        None => text,
    }
}
