//! TTS (text-to-speech) module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        SpeechSynthesizer (async trait)       │
//! │                                              │
//! │   ┌──────────────┐      ┌────────────────┐   │
//! │   │  TtsConfig   │─────▶│ ElevenLabsSynth│   │
//! │   │ - voice_id   │      │ - retries      │   │
//! │   │ - model_id   │      │ - backoff      │   │
//! │   └──────────────┘      └───────┬────────┘   │
//! │                                 ▼            │
//! │                     synthesize(text) → bytes │
//! └──────────────────────────────────────────────┘
//! ```

pub mod elevenlabs;
pub mod engine;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use elevenlabs::ElevenLabsSynth;
pub use engine::{SpeechSynthesizer, SynthError};

// test-only re-export so the pipeline tests can use `crate::tts::MockSynth`.
#[cfg(test)]
pub use engine::MockSynth;
