//! LLM-written news transcript.
//!
//! [`TranscriptProvider`] walks the news items of one show and asks a
//! [`ChatClient`] to turn each into a few calm paragraphs.  A failed LLM call
//! never stalls the show: the item is replaced by a single fallback
//! paragraph and the next call moves on to the next story.
//!
//! [`ApiChatClient`] speaks the OpenAI-compatible `/v1/chat/completions`
//! wire format (OpenAI, Groq, Ollama, LM Studio, vLLM ...).

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;

use super::context::ContextWindow;
use super::news::{NewsItem, NewsSource};
use super::prompt::PromptBuilder;
use super::script::split_paragraphs;
use super::{ContentError, ContentProvider};
use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// ChatClient trait
// ---------------------------------------------------------------------------

/// One-shot chat completion.
///
/// Implementors must be `Send + Sync` so they can be boxed into a provider
/// that moves onto the producer thread.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ContentError>;
}

// ---------------------------------------------------------------------------
// ApiChatClient
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// All connection details (`base_url`, `api_key`, `model`) come from the
/// [`LlmConfig`] passed to [`ApiChatClient::from_config`].
pub struct ApiChatClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ApiChatClient {
    /// Build from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ChatClient for ApiChatClient {
    /// The `Authorization: Bearer …` header is attached only when
    /// `config.api_key` is a non-empty string.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ContentError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user",   "content": user   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        });

        let mut req = self.client.post(&url).json(&body);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Request(format!("LLM endpoint returned {status}")));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ContentError::Parse(e.to_string()))?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ContentError::EmptyResponse)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(ContentError::EmptyResponse);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extract paragraphs from a model reply.
///
/// Accepts a JSON array of strings, optionally wrapped in a markdown code
/// fence (```` ```json ````).  Anything else is split on blank lines.
pub fn parse_paragraphs(reply: &str) -> Vec<String> {
    let body = strip_code_fence(reply.trim());

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        Ok(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => split_paragraphs(body),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let inner = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

// ---------------------------------------------------------------------------
// TranscriptProvider
// ---------------------------------------------------------------------------

/// Content provider that narrates a list of news items through an LLM.
///
/// News is fetched lazily on the first call.  A failed fetch is returned as
/// an error and retried on the next call, so a flaky network at startup
/// delays the show rather than ending it.
pub struct TranscriptProvider {
    source: Box<dyn NewsSource>,
    chat: Box<dyn ChatClient>,
    prompt: PromptBuilder,
    context: ContextWindow,
    items: Option<VecDeque<NewsItem>>,
    total: usize,
    fallback_paragraph: String,
}

impl TranscriptProvider {
    pub fn new(
        source: Box<dyn NewsSource>,
        chat: Box<dyn ChatClient>,
        fallback_paragraph: impl Into<String>,
    ) -> Self {
        Self {
            source,
            chat,
            prompt: PromptBuilder::new(),
            context: ContextWindow::new(),
            items: None,
            total: 0,
            fallback_paragraph: fallback_paragraph.into(),
        }
    }

    /// Replace the default prompt builder.
    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    /// Items not yet narrated, or `None` before the first fetch.
    pub fn remaining(&self) -> Option<usize> {
        self.items.as_ref().map(VecDeque::len)
    }

    async fn ensure_fetched(&mut self) -> Result<(), ContentError> {
        if self.items.is_none() {
            let fetched = self.source.fetch().await?;
            log::info!("transcript: {} news items to narrate", fetched.len());
            self.total = fetched.len();
            self.items = Some(fetched.into());
        }
        Ok(())
    }

    async fn narrate(&mut self, item: &NewsItem) -> Vec<String> {
        let context = self.context.build_context();
        let (system, user) =
            self.prompt
                .build_chat(item, context.as_deref(), self.context.is_opening());

        let paragraphs = match self.chat.complete(&system, &user).await {
            Ok(reply) => parse_paragraphs(&reply),
            Err(e) => {
                log::warn!("transcript: LLM failed for '{}': {e}", item.title);
                Vec::new()
            }
        };

        if paragraphs.is_empty() {
            self.context.skip_item();
            return vec![self.fallback_paragraph.clone()];
        }
        self.context.record_item(&paragraphs);
        paragraphs
    }
}

#[async_trait]
impl ContentProvider for TranscriptProvider {
    async fn next_batch(&mut self) -> Result<Option<Vec<String>>, ContentError> {
        self.ensure_fetched().await?;
        let Some(item) = self.items.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        let remaining = self.remaining().unwrap_or(0);
        log::info!(
            "transcript: narrating {}/{}: {}",
            self.total - remaining,
            self.total,
            item.title
        );

        let paragraphs = self.narrate(&item).await;
        Ok(Some(paragraphs))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
