//! Sleepy News — a bedtime news channel read aloud over soft music.
//!
//! * [`content`] — where paragraphs come from (script file or news + LLM).
//! * [`tts`] — text-to-speech synthesis.
//! * [`audio`] — speech playback and background-music ducking.
//! * [`pipeline`] — bounded producer/consumer loops, shutdown and supervision.
//! * [`config`] — `settings.toml`, environment overrides, app paths.

pub mod audio;
pub mod config;
pub mod content;
pub mod pipeline;
pub mod tts;
