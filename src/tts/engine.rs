//! Core [`SpeechSynthesizer`] trait and [`SynthError`].
//!
//! [`MockSynth`] (available under `#[cfg(test)]`) returns the text's own bytes
//! as "audio" and can be told to fail on chosen paragraphs, which is all the
//! pipeline tests need.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// SynthError
// ---------------------------------------------------------------------------

/// Errors that can arise while turning text into speech.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthError {
    /// Nothing to say.
    #[error("text must be non-empty")]
    EmptyText,

    /// HTTP transport or connection error.
    #[error("TTS request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("TTS request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("TTS service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A success status with no audio in the body.
    #[error("TTS service returned no audio")]
    EmptyAudio,
}

impl From<reqwest::Error> for SynthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthError::Timeout
        } else {
            SynthError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Async text-to-speech.
///
/// Returns encoded audio (WAV/MP3/...) ready for an
/// [`AudioPlayer`](crate::audio::AudioPlayer).  Implementors must be
/// `Send + Sync`; the consumer thread holds them as `Arc<dyn SpeechSynthesizer>`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthError>;
}

// ---------------------------------------------------------------------------
// MockSynth  (test-only)
// ---------------------------------------------------------------------------

/// Test double: echoes the text as bytes, fails for texts listed in
/// `fail_on`, and records every request.
#[cfg(test)]
#[derive(Default)]
pub struct MockSynth {
    fail_on: Vec<String>,
    delay: std::time::Duration,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with `SynthError::Request` whenever the text equals `text`.
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.fail_on.push(text.into());
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Texts requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SpeechSynthesizer for MockSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthError> {
        self.calls.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if text.is_empty() {
            return Err(SynthError::EmptyText);
        }
        if self.fail_on.iter().any(|t| t == text) {
            return Err(SynthError::Request("injected failure".into()));
        }
        Ok(text.as_bytes().to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
