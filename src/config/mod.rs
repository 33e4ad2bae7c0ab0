//! Configuration module for Sleepy News.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform config directories, environment overrides,
//! and TOML persistence via `AppConfig::load` / `AppConfig::save_to`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, BackgroundConfig, ConfigError, LlmConfig, NewsConfig, PipelineConfig,
    PlaybackConfig, ShutdownConfig, TtsConfig,
};
