//! Content generation — where the paragraphs read on air come from.
//!
//! This module provides:
//! * [`ContentProvider`] — async trait the producer loop pulls batches from.
//! * [`ScriptProvider`] — fixed paragraphs (offline mode and tests).
//! * [`TranscriptProvider`] — turns news items into a soothing transcript
//!   via an LLM ([`ChatClient`] / [`ApiChatClient`]).
//! * [`PromptBuilder`] — builds the transcript-writing prompt.
//! * [`ContextWindow`] — rolling window of recent paragraphs.
//! * [`news`] — news items from a JSON feed file or Reddit.
//! * [`ContentError`] — error variants for content operations.
//!
//! # Quick start
//!
//! ```rust
//! use sleepy_news::content::{ContentProvider, ScriptProvider};
//!
//! # async fn demo() {
//! let mut provider = ScriptProvider::from_text("First.\n\nSecond.", 1);
//! assert_eq!(provider.next_batch().await.unwrap(), Some(vec!["First.".to_string()]));
//! assert_eq!(provider.next_batch().await.unwrap(), Some(vec!["Second.".to_string()]));
//! assert_eq!(provider.next_batch().await.unwrap(), None);
//! # }
//! ```

pub mod context;
pub mod news;
pub mod prompt;
pub mod script;
pub mod transcript;

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use context::ContextWindow;
pub use news::{Comment, FeedFile, NewsItem, NewsSource, RedditSource};
pub use prompt::PromptBuilder;
pub use script::ScriptProvider;
pub use transcript::{parse_paragraphs, ApiChatClient, ChatClient, TranscriptProvider};

// ---------------------------------------------------------------------------
// ContentError
// ---------------------------------------------------------------------------

/// Errors that can occur while producing content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("content request timed out")]
    Timeout,

    /// A response or feed could not be parsed.
    #[error("failed to parse content: {0}")]
    Parse(String),

    /// The model returned nothing usable.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// Reading a local script or feed failed.
    #[error("cannot read content file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ContentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ContentError::Timeout
        } else {
            ContentError::Request(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(e: serde_json::Error) -> Self {
        ContentError::Parse(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// ContentProvider trait
// ---------------------------------------------------------------------------

/// Source of paragraphs for the producer loop.
///
/// * `Ok(Some(batch))` — the next unit of content (may be empty).
/// * `Ok(None)` — content is exhausted; the producer enqueues its closing
///   line and stops asking.
/// * `Err(_)` — this cycle produced nothing; the producer logs it and asks
///   again on the next wake.
///
/// The producer owns its provider exclusively, hence `&mut self`.
#[async_trait]
pub trait ContentProvider: Send {
    async fn next_batch(&mut self) -> Result<Option<Vec<String>>, ContentError>;
}
