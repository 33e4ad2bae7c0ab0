//! Consumer loop — speaks queued paragraphs one at a time.
//!
//! ```text
//! loop until forced, or stopping with an empty queue:
//!   pop(pop_timeout)
//!     empty → len <= low_watermark ? raise wake, wait_for_items(starve_poll)
//!     item  → stopping ? abandon
//!                      : synthesize (synth_timeout)
//!                        duck ─ play (cancel on ForceExit) ─ unduck
//!                        ForceExit cuts the fades short and restores the bed
//!             ticket dropped → item complete, on every path
//!   len <= low_watermark ? raise wake
//! ```
//!
//! Synthesis is async and runs on the shared tokio runtime through
//! `Handle::block_on`; playback blocks this thread.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::runtime::Handle;

use super::queue::Ticket;
use super::state::{Outcome, Shared};
use crate::audio::{AudioPlayer, Ducker, PlaybackOutcome};
use crate::config::AppConfig;
use crate::tts::{SpeechSynthesizer, SynthError};

// ---------------------------------------------------------------------------
// ConsumerSettings
// ---------------------------------------------------------------------------

/// Consumer tuning, normally taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub low_watermark: usize,
    pub pop_timeout: Duration,
    pub starve_poll: Duration,
    pub synth_timeout: Duration,
}

impl ConsumerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            low_watermark: config.pipeline.low_watermark,
            pop_timeout: config.pipeline.pop_timeout(),
            starve_poll: config.pipeline.starve_poll(),
            synth_timeout: config.pipeline.synth_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Pops paragraphs, synthesizes them and plays them over a ducked bed.
pub struct Consumer {
    shared: Shared,
    synth: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    ducker: Ducker,
    settings: ConsumerSettings,
    runtime: Handle,
}

impl Consumer {
    pub fn new(
        shared: Shared,
        synth: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
        ducker: Ducker,
        settings: ConsumerSettings,
        runtime: Handle,
    ) -> Self {
        let shutdown = Arc::clone(&shared.shutdown);
        Self {
            shared,
            synth,
            player,
            ducker: ducker.interrupted_by(move || shutdown.is_forced()),
            settings,
            runtime,
        }
    }

    /// Run [`run`](Self::run) on a named OS thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("consumer".into())
            .spawn(move || self.run())
    }

    /// Block until a forced exit, or a stop with nothing left to drain.
    ///
    /// Must not be called from inside the tokio runtime.
    pub fn run(self) {
        log::info!("consumer: started");

        loop {
            if self.shared.shutdown.is_forced() {
                break;
            }

            let ticket = match self.shared.queue.pop(self.settings.pop_timeout) {
                Ok(ticket) => ticket,
                Err(e) => {
                    if self.shared.shutdown.is_stopping() {
                        break;
                    }
                    log::trace!("consumer: {e}");
                    if self.is_low() {
                        self.request_more();
                        self.shared.queue.wait_for_items(self.settings.starve_poll);
                    }
                    continue;
                }
            };

            self.handle(ticket);

            if !self.shared.shutdown.is_stopping() && self.is_low() {
                self.request_more();
            }
        }

        log::info!("consumer: stopping ({})", self.shared.stats.snapshot());
    }

    fn is_low(&self) -> bool {
        self.shared.queue.len() <= self.settings.low_watermark
    }

    fn request_more(&self) {
        self.shared.stats.record_wake();
        self.shared.wake.raise();
    }

    /// The ticket is dropped on return, completing the item on every path.
    fn handle(&self, ticket: Ticket<'_, String>) {
        let outcome = if self.shared.shutdown.is_stopping() {
            log::debug!("consumer: stop requested, abandoning queued paragraph");
            Outcome::Abandoned
        } else {
            self.speak(&ticket)
        };
        self.shared.stats.record(outcome);
    }

    fn speak(&self, text: &str) -> Outcome {
        let audio = match self.synthesize(text) {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("consumer: synthesis failed, skipping paragraph: {e}");
                return Outcome::Failed;
            }
        };
        if self.shared.shutdown.is_forced() {
            return Outcome::Cancelled;
        }

        let shutdown = &self.shared.shutdown;
        let _duck = self.ducker.duck_scope();
        if self.shared.shutdown.is_forced() {
            return Outcome::Cancelled;
        }
        match self.player.play(&audio, &|| shutdown.is_forced()) {
            Ok(PlaybackOutcome::Finished) => Outcome::Spoken,
            Ok(PlaybackOutcome::Cancelled) => {
                log::info!("consumer: playback cancelled");
                Outcome::Cancelled
            }
            Err(e) => {
                log::warn!("consumer: playback failed, skipping paragraph: {e}");
                Outcome::Failed
            }
        }
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthError> {
        let limit = self.settings.synth_timeout;
        self.runtime.block_on(async {
            tokio::time::timeout(limit, self.synth.synthesize(text))
                .await
                .unwrap_or(Err(SynthError::Timeout))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
