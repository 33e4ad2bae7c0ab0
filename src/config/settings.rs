//! Application settings structs, defaults, environment overrides and TOML
//! persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone` so
//! they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! needs the keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Rejected configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment override did not parse.
    #[error("{key} must be an integer, got {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Queue sizing and loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum paragraphs waiting to be spoken.
    pub queue_capacity: usize,
    /// The consumer asks for more content when the queue holds at most this
    /// many paragraphs.
    pub low_watermark: usize,
    /// Provider calls per wake-up.
    pub batch_produce_count: usize,
    /// How long the producer waits for queue space before dropping a paragraph.
    pub push_timeout_ms: u64,
    /// How long the consumer waits for a paragraph per attempt.
    pub pop_timeout_ms: u64,
    /// Producer wake-wait slice; bounds how late it notices a stop.
    pub wake_poll_ms: u64,
    /// Consumer wait slice while starved.
    pub starve_poll_ms: u64,
    /// Upper bound on one synthesis call.
    pub synth_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            low_watermark: 1,
            batch_produce_count: 1,
            push_timeout_ms: 500,
            pop_timeout_ms: 200,
            wake_poll_ms: 1000,
            starve_poll_ms: 1000,
            synth_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn wake_poll(&self) -> Duration {
        Duration::from_millis(self.wake_poll_ms)
    }

    pub fn starve_poll(&self) -> Duration {
        Duration::from_millis(self.starve_poll_ms)
    }

    pub fn synth_timeout(&self) -> Duration {
        Duration::from_secs(self.synth_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// ShutdownConfig
// ---------------------------------------------------------------------------

/// Signal handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Seconds between the first stop signal and a forced exit.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

// ---------------------------------------------------------------------------
// BackgroundConfig
// ---------------------------------------------------------------------------

/// Looping background music that is ducked under speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Music file; `None` disables background music.
    pub music_path: Option<PathBuf>,
    /// Gain while nobody is speaking (0.0 – 1.0).
    pub initial_volume: f32,
    /// Gain under speech (0.0 – 1.0).
    pub ducked_volume: f32,
    /// Length of each duck / unduck fade in seconds.
    pub fade_secs: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            music_path: None,
            initial_volume: 0.4,
            ducked_volume: 0.1,
            fade_secs: 1.0,
        }
    }
}

/// Longest duck / unduck fade honoured; longer (or infinite) values are capped.
pub const MAX_FADE_SECS: f32 = 30.0;

impl BackgroundConfig {
    pub fn fade(&self) -> Duration {
        Duration::from_secs_f32(clamp_fade(self.fade_secs))
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// ElevenLabs text-to-speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// API root, e.g. `https://api.elevenlabs.io/v1`.
    pub base_url: String,
    /// `xi-api-key`; usually supplied through `ELEVENLABS_API_KEY`.
    pub api_key: Option<String>,
    pub voice_id: String,
    pub model_id: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Total attempts per paragraph (at least one is always made).
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_backoff_ms: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io/v1".into(),
            api_key: None,
            voice_id: "qWdiyiWdNPlPyVCOLW0h".into(),
            model_id: "eleven_v3".into(),
            timeout_secs: 15,
            max_retries: 2,
            retry_backoff_ms: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat endpoint used to write the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the API endpoint.
    ///
    /// - OpenAI: `https://api.openai.com`
    /// - Ollama: `http://localhost:11434`
    pub base_url: String,
    /// API key; `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Response length cap.
    pub max_tokens: u32,
    /// Maximum seconds to wait for a response.
    pub timeout_secs: u64,
    /// Ask for a short sleep-guidance paragraph with every story.
    pub sleep_guidance: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout_secs: 30,
            sleep_guidance: true,
        }
    }
}

// ---------------------------------------------------------------------------
// NewsConfig
// ---------------------------------------------------------------------------

/// Where the night's stories come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub subreddit: String,
    /// Reddit `top` window: hour, day, week, month, year or all.
    pub timeframe: String,
    /// Number of posts per show.
    pub limit: u32,
    /// Top comments per post.
    pub comment_limit: u32,
    /// Read items from this JSON file instead of Reddit.
    pub feed_file: Option<PathBuf>,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            subreddit: "worldnews".into(),
            timeframe: "day".into(),
            limit: 10,
            comment_limit: 5,
            feed_file: None,
            user_agent: concat!("sleepy-news/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// How synthesized speech reaches the speakers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// External player reading audio from stdin, e.g.
    /// `["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet", "-"]`.
    /// `None` plays in-process.
    pub command: Option<Vec<String>>,
    /// Time an external player gets to exit after SIGTERM before SIGKILL.
    pub kill_grace_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            command: None,
            kill_grace_ms: 500,
        }
    }
}

impl PlaybackConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Loading
///
/// ```rust,no_run
/// use sleepy_news::config::AppConfig;
///
/// // settings.toml (or defaults), then environment overrides, then checks.
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Spoken once all news has been read.
    pub closing_message: String,
    /// Spoken in place of a story the LLM failed to narrate.
    pub fallback_paragraph: String,
    pub pipeline: PipelineConfig,
    pub shutdown: ShutdownConfig,
    pub background: BackgroundConfig,
    pub tts: TtsConfig,
    pub llm: LlmConfig,
    pub news: NewsConfig,
    pub playback: PlaybackConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            closing_message: "That's all for tonight's news. Thank you for listening. \
                              May you have a peaceful and restful sleep. Goodnight."
                .into(),
            fallback_paragraph: "Let us move on to the next story. \
                                 May your mind stay calm and peaceful as you rest."
                .into(),
            pipeline: PipelineConfig::default(),
            shutdown: ShutdownConfig::default(),
            background: BackgroundConfig::default(),
            tts: TtsConfig::default(),
            llm: LlmConfig::default(),
            news: NewsConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (the environment, or a map in tests).
    ///
    /// Empty values are ignored.  Integer keys that fail to parse are an
    /// error rather than silently falling back to the configured value.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ELEVENLABS_API_KEY") {
            self.tts.api_key = Some(v);
        }
        if let Some(v) = get("ELEVENLABS_VOICE_ID") {
            self.tts.voice_id = v;
        }
        if let Some(v) = get("ELEVENLABS_MODEL_ID") {
            self.tts.model_id = v;
        }
        if let Some(v) = get("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("BGM_PATH") {
            self.background.music_path = Some(PathBuf::from(v));
        }

        let int = |key: &'static str| -> Result<Option<usize>, ConfigError> {
            match get(key) {
                None => Ok(None),
                Some(v) => v
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidEnv { key, value: v }),
            }
        };
        if let Some(n) = int("QUEUE_MAXSIZE")? {
            self.pipeline.queue_capacity = n;
        }
        if let Some(n) = int("LOW_WATERMARK")? {
            self.pipeline.low_watermark = n;
        }
        if let Some(n) = int("BATCH_PRODUCE_COUNT")? {
            self.pipeline.batch_produce_count = n;
        }

        Ok(())
    }

    /// Reject unusable values and clamp the audio ones into range.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be > 0".into()));
        }
        if self.pipeline.batch_produce_count == 0 {
            return Err(ConfigError::Invalid("batch_produce_count must be > 0".into()));
        }
        if self.pipeline.low_watermark >= self.pipeline.queue_capacity {
            log::warn!(
                "config: low_watermark {} >= queue_capacity {}; the consumer will ask for \
                 content after every paragraph",
                self.pipeline.low_watermark,
                self.pipeline.queue_capacity
            );
        }

        let bg = &mut self.background;
        bg.initial_volume = clamp_volume(bg.initial_volume);
        bg.ducked_volume = clamp_volume(bg.ducked_volume);
        bg.fade_secs = clamp_fade(bg.fade_secs);
        Ok(())
    }
}

fn clamp_fade(secs: f32) -> f32 {
    if secs.is_nan() {
        0.0
    } else {
        secs.clamp(0.0, MAX_FADE_SECS)
    }
}

fn clamp_volume(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    /// A default `AppConfig` survives a TOML round trip.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.closing_message, loaded.closing_message);
        assert_eq!(original.pipeline.queue_capacity, loaded.pipeline.queue_capacity);
        assert_eq!(original.pipeline.low_watermark, loaded.pipeline.low_watermark);
        assert_eq!(original.shutdown.grace_secs, loaded.shutdown.grace_secs);
        assert_eq!(original.background.ducked_volume, loaded.background.ducked_volume);
        assert_eq!(original.tts.voice_id, loaded.tts.voice_id);
        assert_eq!(original.llm.temperature, loaded.llm.temperature);
        assert_eq!(original.news.subreddit, loaded.news.subreddit);
        assert_eq!(original.playback.command, loaded.playback.command);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let config = AppConfig::load_from(&dir.path().join("nope.toml")).expect("load");
        assert_eq!(config.pipeline.queue_capacity, 50);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[pipeline]\nqueue_capacity = 8\n\n[playback]\ncommand = [\"ffplay\", \"-\"]\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).expect("load");

        assert_eq!(config.pipeline.queue_capacity, 8);
        assert_eq!(config.pipeline.low_watermark, 1);
        assert_eq!(config.tts.model_id, "eleven_v3");
        assert_eq!(
            config.playback.command,
            Some(vec!["ffplay".to_string(), "-".to_string()])
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[pipeline\nqueue_capacity = ").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.pipeline.queue_capacity, 50);
        assert_eq!(cfg.pipeline.low_watermark, 1);
        assert_eq!(cfg.pipeline.batch_produce_count, 1);
        assert_eq!(cfg.pipeline.push_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.pipeline.pop_timeout(), Duration::from_millis(200));
        assert_eq!(cfg.shutdown.grace(), Duration::from_secs(5));
        assert_eq!(cfg.background.initial_volume, 0.4);
        assert_eq!(cfg.background.ducked_volume, 0.1);
        assert_eq!(cfg.background.fade(), Duration::from_secs(1));
        assert_eq!(cfg.tts.timeout_secs, 15);
        assert_eq!(cfg.tts.max_retries, 2);
        assert!(cfg.tts.api_key.is_none());
        assert!(cfg.closing_message.ends_with("Goodnight."));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = AppConfig::default();
        cfg.apply_env_with(env(&[
            ("ELEVENLABS_API_KEY", "xi-123"),
            ("ELEVENLABS_MODEL_ID", "eleven_turbo_v2"),
            ("LLM_MODEL", "llama3"),
            ("QUEUE_MAXSIZE", " 10 "),
            ("LOW_WATERMARK", "2"),
            ("BATCH_PRODUCE_COUNT", "3"),
            ("BGM_PATH", "/music/rain.mp3"),
        ]))
        .unwrap();

        assert_eq!(cfg.tts.api_key.as_deref(), Some("xi-123"));
        assert_eq!(cfg.tts.model_id, "eleven_turbo_v2");
        assert_eq!(cfg.llm.model, "llama3");
        assert_eq!(cfg.pipeline.queue_capacity, 10);
        assert_eq!(cfg.pipeline.low_watermark, 2);
        assert_eq!(cfg.pipeline.batch_produce_count, 3);
        assert_eq!(
            cfg.background.music_path,
            Some(PathBuf::from("/music/rain.mp3"))
        );
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut cfg = AppConfig::default();
        cfg.apply_env_with(env(&[("LLM_BASE_URL", ""), ("QUEUE_MAXSIZE", "  ")]))
            .unwrap();
        assert_eq!(cfg.llm.base_url, "https://api.openai.com");
        assert_eq!(cfg.pipeline.queue_capacity, 50);
    }

    #[test]
    fn non_integer_env_is_rejected() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_env_with(env(&[("LOW_WATERMARK", "one")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                key: "LOW_WATERMARK",
                value: "one".into()
            }
        );
    }

    #[test]
    fn validate_rejects_zero_capacity_and_batch() {
        let mut cfg = AppConfig::default();
        cfg.pipeline.queue_capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.pipeline.batch_produce_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_clamps_audio_values() {
        let mut cfg = AppConfig::default();
        cfg.background.initial_volume = 1.7;
        cfg.background.ducked_volume = f32::NAN;
        cfg.background.fade_secs = -2.0;

        cfg.validate().unwrap();

        assert_eq!(cfg.background.initial_volume, 1.0);
        assert_eq!(cfg.background.ducked_volume, 0.0);
        assert_eq!(cfg.background.fade_secs, 0.0);
    }

    #[test]
    fn infinite_fade_is_capped() {
        let mut cfg = AppConfig::default();
        cfg.background.fade_secs = f32::INFINITY;
        assert_eq!(cfg.background.fade(), Duration::from_secs(30));

        cfg.validate().unwrap();
        assert_eq!(cfg.background.fade_secs, MAX_FADE_SECS);
    }

    #[test]
    fn infinite_fade_in_toml_loads_and_is_capped() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[background]\nfade_secs = inf\n").unwrap();

        let mut cfg = AppConfig::load_from(&path).expect("load");
        cfg.validate().unwrap();

        assert_eq!(cfg.background.fade(), Duration::from_secs(30));
    }

    #[test]
    fn sleep_guidance_is_on_by_default_and_configurable() {
        assert!(AppConfig::default().llm.sleep_guidance);

        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[llm]\nsleep_guidance = false\n").unwrap();
        assert!(!AppConfig::load_from(&path).expect("load").llm.sleep_guidance);
    }
}
