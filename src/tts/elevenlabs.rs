//! ElevenLabs text-to-speech over HTTP.
//!
//! `POST {base_url}/text-to-speech/{voice_id}` with an `xi-api-key` header and
//! a `{text, model_id}` JSON body.  A response counts as success only when the
//! status is 200 and the body is non-empty; anything else is retried up to
//! `max_retries` attempts in total, sleeping `retry_backoff_ms` in between.

use std::time::Duration;

use async_trait::async_trait;

use super::engine::{SpeechSynthesizer, SynthError};
use crate::config::TtsConfig;

/// Longest slice of an error body kept in [`SynthError::Status`].
const ERROR_BODY_PREVIEW: usize = 200;

/// ElevenLabs client.
///
/// All connection details come from the [`TtsConfig`] passed to
/// [`ElevenLabsSynth::from_config`].
pub struct ElevenLabsSynth {
    client: reqwest::Client,
    config: TtsConfig,
}

impl ElevenLabsSynth {
    /// Build from the `[tts]` config section.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        )
    }

    async fn attempt(&self, text: &str) -> Result<Vec<u8>, SynthError> {
        let body = serde_json::json!({
            "text":     text,
            "model_id": self.config.model_id,
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", self.config.api_key.as_deref().unwrap_or(""))
            .header("accept", "audio/wav")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_PREVIEW).collect(),
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(SynthError::EmptyAudio);
        }
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthError> {
        if text.trim().is_empty() {
            return Err(SynthError::EmptyText);
        }

        let attempts = self.config.max_retries.max(1);
        let backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut last_err = SynthError::EmptyAudio;

        for attempt in 1..=attempts {
            match self.attempt(text).await {
                Ok(audio) => {
                    log::debug!("tts: {} bytes for {} chars", audio.len(), text.len());
                    return Ok(audio);
                }
                Err(e) => {
                    log::warn!("tts: attempt {attempt}/{attempts} failed: {e}");
                    last_err = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
