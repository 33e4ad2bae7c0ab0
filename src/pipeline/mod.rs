//! Producer/consumer pipeline that keeps the narration flowing.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────── WakeSignal ◀──────────────┐
//!                     ▼                                       │ len ≤ low_watermark
//! ContentProvider ─▶ Producer ─push─▶ BoundedQueue ─pop─▶ Consumer
//!   (async)          (thread)         (capacity N)        (thread)
//!                                                           │
//!                                     SpeechSynthesizer ◀───┤ synthesize
//!                                     Ducker + AudioPlayer ◀┘ duck, play, unduck
//!
//! Supervisor ── spawns both loops, polls ShutdownController::check_deadline
//! listen_for_signals ── SIGINT/SIGTERM ─▶ Shared::request_stop
//! ```
//!
//! All cross-thread state lives in [`Shared`]; nothing here is a global.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sleepy_news::audio::{BackgroundTrack, CommandPlayer, Ducker};
//! use sleepy_news::config::AppConfig;
//! use sleepy_news::content::ScriptProvider;
//! use sleepy_news::pipeline::{
//!     Consumer, ConsumerSettings, Producer, ProducerSettings, Shared, Supervisor,
//! };
//! use sleepy_news::tts::ElevenLabsSynth;
//!
//! let config = AppConfig::default();
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let shared = Shared::new(config.pipeline.queue_capacity, config.shutdown.grace());
//!
//! let provider = ScriptProvider::from_text("Once upon a time.\n\nThe end.", 1);
//! let producer = Producer::new(
//!     shared.clone(),
//!     Box::new(provider),
//!     ProducerSettings::from_config(&config),
//!     rt.handle().clone(),
//! );
//!
//! let player = CommandPlayer::new(&["ffplay".to_string(), "-".to_string()], Duration::from_millis(500));
//! let consumer = Consumer::new(
//!     shared.clone(),
//!     Arc::new(ElevenLabsSynth::from_config(&config.tts)),
//!     Arc::new(player.unwrap()),
//!     Ducker::new(Arc::new(BackgroundTrack::disabled()), 0.4, 0.1, Duration::from_secs(1)),
//!     ConsumerSettings::from_config(&config),
//!     rt.handle().clone(),
//! );
//!
//! let status = Supervisor::new(shared).run(producer, consumer).unwrap();
//! std::process::exit(i32::from(status.code()));
//! ```

pub mod consumer;
pub mod producer;
pub mod queue;
pub mod shutdown;
pub mod state;
pub mod supervisor;
pub mod wake;

pub use consumer::{Consumer, ConsumerSettings};
pub use producer::{Producer, ProducerSettings};
pub use queue::{BoundedQueue, QueueError, Ticket};
pub use shutdown::{ShutdownController, ShutdownPhase};
pub use state::{Outcome, PipelineStats, Shared, StatsSnapshot};
pub use supervisor::{listen_for_signals, ExitStatus, Supervisor};
pub use wake::WakeSignal;

/// Helpers shared by the loop tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::thread;
    use std::time::{Duration, Instant};

    /// Runtime whose worker keeps timers and IO moving while test threads
    /// call `Handle::block_on`.
    pub fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    /// Poll `cond` until it holds or a few seconds pass.
    pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond()
    }
}
