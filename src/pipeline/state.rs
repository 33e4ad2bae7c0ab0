//! Handles shared by the supervisor and both pipeline loops.
//!
//! [`Shared`] bundles the queue, the wake signal, the shutdown controller
//! and the run counters.  It is cheap to clone (four `Arc`s) and is handed
//! to every loop at construction; there is no ambient global state.
//!
//! [`PipelineStats`] counts what happened to every paragraph.  Once the
//! pipeline is idle, each accepted paragraph has exactly one outcome:
//!
//! ```text
//! produced == spoken + failed + cancelled + abandoned + queue.len()
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::queue::BoundedQueue;
use super::shutdown::{ShutdownController, ShutdownPhase};
use super::wake::WakeSignal;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What the consumer did with one popped paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Synthesized and played to the end.
    Spoken,
    /// Synthesis or playback failed; the paragraph was skipped.
    Failed,
    /// Playback was interrupted by a forced exit.
    Cancelled,
    /// Popped after a stop request and discarded unspoken.
    Abandoned,
}

// ---------------------------------------------------------------------------
// PipelineStats
// ---------------------------------------------------------------------------

/// Lock-free run counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    produced: AtomicU64,
    dropped: AtomicU64,
    spoken: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    abandoned: AtomicU64,
    wakes: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A paragraph was accepted by the queue.
    pub fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    /// A paragraph was dropped because the queue stayed full.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// The consumer asked for more content.
    pub fn record_wake(&self) {
        self.wakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Spoken => &self.spoken,
            Outcome::Failed => &self.failed,
            Outcome::Cancelled => &self.cancelled,
            Outcome::Abandoned => &self.abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            produced: self.produced.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            spoken: self.spoken.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            wakes: self.wakes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub produced: u64,
    pub dropped: u64,
    pub spoken: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub abandoned: u64,
    pub wakes: u64,
}

impl StatsSnapshot {
    /// Paragraphs the consumer has finished with, whatever the outcome.
    pub fn handled(&self) -> u64 {
        self.spoken + self.failed + self.cancelled + self.abandoned
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "produced={} dropped={} spoken={} failed={} cancelled={} abandoned={} wakes={}",
            self.produced,
            self.dropped,
            self.spoken,
            self.failed,
            self.cancelled,
            self.abandoned,
            self.wakes
        )
    }
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Everything the producer, consumer and supervisor share.
#[derive(Debug, Clone)]
pub struct Shared {
    pub queue: Arc<BoundedQueue<String>>,
    pub wake: Arc<WakeSignal>,
    pub shutdown: Arc<ShutdownController>,
    pub stats: Arc<PipelineStats>,
}

impl Shared {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, grace: Duration) -> Self {
        Self {
            queue: Arc::new(BoundedQueue::new(capacity)),
            wake: Arc::new(WakeSignal::new()),
            shutdown: Arc::new(ShutdownController::new(grace)),
            stats: Arc::new(PipelineStats::new()),
        }
    }

    /// Handle one stop request (OS signal or internal) and wake the producer
    /// so it notices without waiting out its poll.
    pub fn request_stop(&self, source: &str) -> ShutdownPhase {
        let phase = self.shutdown.on_signal();
        self.wake.raise();
        log::info!("pipeline: stop requested by {source} → {}", phase.label());
        phase
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
