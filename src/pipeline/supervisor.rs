//! Supervisor — starts both loops, watches them and decides the exit code.
//!
//! ```text
//! prime wake ─▶ spawn producer ─▶ spawn consumer
//!      │
//!      ▼  every poll_interval
//! check_deadline() == ForceExit ──▶ return Forced (130), loops left behind
//! both loops finished           ──▶ abandon leftovers, return Graceful (0)
//! one loop died while running   ──▶ request stop, keep watching
//! ```
//!
//! OS signals reach the pipeline through [`listen_for_signals`], which runs
//! on the tokio runtime and calls [`Shared::request_stop`].

use std::io;
use std::process::ExitCode;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::runtime::Handle;

use super::consumer::Consumer;
use super::producer::Producer;
use super::shutdown::ShutdownPhase;
use super::state::{Outcome, Shared};

/// How often the supervisor looks at the loops and the shutdown deadline.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// ExitStatus
// ---------------------------------------------------------------------------

/// How the pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Both loops drained and stopped after a stop request.
    Graceful,
    /// Second signal or grace deadline; loops were not waited for.
    Forced,
}

impl ExitStatus {
    /// Process exit code: `0` or `130`.
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Graceful => 0,
            ExitStatus::Forced => 130,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct Supervisor {
    shared: Shared,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(shared: Shared) -> Self {
        Self {
            shared,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the pipeline to completion.
    ///
    /// Only fails if a loop thread cannot be spawned.
    pub fn run(&self, producer: Producer, consumer: Consumer) -> io::Result<ExitStatus> {
        // Start producing without waiting for the first watermark event.
        self.shared.wake.raise();

        let producer = producer.spawn()?;
        let consumer = match consumer.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.request_stop("supervisor");
                join_logged("producer", producer);
                return Err(e);
            }
        };
        log::info!("supervisor: pipeline running");

        loop {
            if self.shared.shutdown.check_deadline() == ShutdownPhase::ForceExit {
                log::warn!(
                    "supervisor: forced exit ({})",
                    self.shared.stats.snapshot()
                );
                return Ok(ExitStatus::Forced);
            }

            let producer_done = producer.is_finished();
            let consumer_done = consumer.is_finished();
            if producer_done && consumer_done {
                break;
            }
            if (producer_done || consumer_done) && !self.shared.shutdown.is_stopping() {
                let which = if producer_done { "producer" } else { "consumer" };
                log::error!("supervisor: {which} exited unexpectedly; shutting down");
                self.shared.request_stop("supervisor");
            }

            thread::sleep(self.poll_interval);
        }

        join_logged("producer", producer);
        join_logged("consumer", consumer);

        // A push can land after the consumer's last empty pop.
        let leftover = abandon_leftovers(&self.shared);
        if leftover > 0 {
            log::debug!("supervisor: abandoned {leftover} paragraphs queued during shutdown");
        }
        log::info!("supervisor: graceful exit ({})", self.shared.stats.snapshot());
        Ok(ExitStatus::Graceful)
    }
}

/// Complete whatever is still queued once both loops are gone.
fn abandon_leftovers(shared: &Shared) -> usize {
    let mut count = 0;
    while let Ok(ticket) = shared.queue.pop(Duration::ZERO) {
        drop(ticket);
        shared.stats.record(Outcome::Abandoned);
        count += 1;
    }
    count
}

fn join_logged(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        log::error!("supervisor: {name} thread panicked");
    }
}

// ---------------------------------------------------------------------------
// Signal listener
// ---------------------------------------------------------------------------

/// Route SIGINT/SIGTERM (Ctrl-C on other platforms) into
/// [`Shared::request_stop`] for as long as the runtime lives.
#[cfg(unix)]
pub fn listen_for_signals(runtime: &Handle, shared: Shared) -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let _guard = runtime.enter();
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    runtime.spawn(async move {
        loop {
            let source = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            shared.request_stop(source);
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn listen_for_signals(runtime: &Handle, shared: Shared) -> io::Result<()> {
    runtime.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            shared.request_stop("Ctrl-C");
        }
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{BackgroundTrack, Ducker, MockPlayer};
    use crate::content::{ContentError, ContentProvider, ScriptProvider};
    use crate::pipeline::consumer::ConsumerSettings;
    use crate::pipeline::producer::ProducerSettings;
    use crate::pipeline::testing::{runtime, wait_until};
    use crate::tts::MockSynth;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    /// Takes far longer than any grace period to answer.
    struct StalledProvider {
        entered: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ContentProvider for StalledProvider {
        async fn next_batch(&mut self) -> Result<Option<Vec<String>>, ContentError> {
            self.entered.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Some(vec!["too late".to_string()]))
        }
    }

    const CLOSING: &str = "That's all for tonight.";

    struct Rig {
        rt: tokio::runtime::Runtime,
        shared: Shared,
        synth: Arc<MockSynth>,
        player: Arc<MockPlayer>,
    }

    impl Rig {
        fn new(capacity: usize, grace: Duration, synth: MockSynth, player: MockPlayer) -> Self {
            Self {
                rt: runtime(),
                shared: Shared::new(capacity, grace),
                synth: Arc::new(synth),
                player: Arc::new(player),
            }
        }

        fn loops(&self, provider: Box<dyn ContentProvider>) -> (Producer, Consumer) {
            let producer = Producer::new(
                self.shared.clone(),
                provider,
                ProducerSettings {
                    batch_count: 1,
                    wake_poll: Duration::from_millis(20),
                    push_timeout: Duration::from_millis(50),
                    closing_message: CLOSING.into(),
                },
                self.rt.handle().clone(),
            );
            let consumer = Consumer::new(
                self.shared.clone(),
                self.synth.clone(),
                self.player.clone(),
                Ducker::new(
                    Arc::new(BackgroundTrack::disabled()),
                    0.4,
                    0.1,
                    Duration::from_millis(10),
                ),
                ConsumerSettings {
                    low_watermark: 1,
                    pop_timeout: Duration::from_millis(20),
                    starve_poll: Duration::from_millis(20),
                    synth_timeout: Duration::from_secs(2),
                },
                self.rt.handle().clone(),
            );
            (producer, consumer)
        }

        fn start(&self, batches: &[&[&str]]) -> JoinHandle<io::Result<ExitStatus>> {
            self.start_with(Box::new(ScriptProvider::new(
                batches
                    .iter()
                    .map(|b| b.iter().map(|s| s.to_string()).collect())
                    .collect(),
            )))
        }

        fn start_with(
            &self,
            provider: Box<dyn ContentProvider>,
        ) -> JoinHandle<io::Result<ExitStatus>> {
            let (producer, consumer) = self.loops(provider);
            let supervisor =
                Supervisor::new(self.shared.clone()).with_poll_interval(Duration::from_millis(10));
            thread::spawn(move || supervisor.run(producer, consumer))
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ExitStatus::Graceful.code(), 0);
        assert_eq!(ExitStatus::Forced.code(), 130);
    }

    #[test]
    fn plays_everything_then_closing_and_exits_cleanly_on_signal() {
        let rig = Rig::new(5, Duration::from_secs(5), MockSynth::new(), MockPlayer::new());
        let supervisor = rig.start(&[&["A", "B"]]);

        assert!(wait_until(|| rig.player.finished().len() == 3));
        assert_eq!(rig.player.finished(), vec!["A", "B", CLOSING]);

        // Exhausted: idle, nothing more arrives.
        thread::sleep(Duration::from_millis(100));
        assert_eq!(rig.player.finished().len(), 3);
        assert!(rig.shared.queue.is_empty());
        assert!(rig.shared.stats.snapshot().wakes >= 1);
        assert!(!supervisor.is_finished());

        rig.shared.request_stop("test");
        let status = supervisor.join().unwrap().unwrap();

        assert_eq!(status, ExitStatus::Graceful);
        assert_eq!(status.code(), 0);
        assert_eq!(rig.shared.queue.pending(), 0);
    }

    #[test]
    fn second_signal_forces_exit_immediately() {
        let rig = Rig::new(
            5,
            Duration::from_secs(30),
            MockSynth::new(),
            MockPlayer::new().with_clip_length(Duration::from_secs(30)),
        );
        let supervisor = rig.start(&[&["a very long story"]]);
        assert!(wait_until(|| !rig.player.started().is_empty()));

        rig.shared.request_stop("test");
        thread::sleep(Duration::from_millis(50));
        assert!(!supervisor.is_finished(), "one signal only drains");

        let second_at = Instant::now();
        rig.shared.request_stop("test");
        let status = supervisor.join().unwrap().unwrap();

        assert_eq!(status, ExitStatus::Forced);
        assert_eq!(status.code(), 130);
        assert!(second_at.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn grace_deadline_forces_exit_without_second_signal() {
        let rig = Rig::new(
            5,
            Duration::from_millis(200),
            MockSynth::new(),
            MockPlayer::new().with_clip_length(Duration::from_secs(30)),
        );
        let supervisor = rig.start(&[&["a very long story"]]);
        assert!(wait_until(|| !rig.player.started().is_empty()));

        let signalled_at = Instant::now();
        rig.shared.request_stop("test");
        let status = supervisor.join().unwrap().unwrap();

        assert_eq!(status, ExitStatus::Forced);
        let waited = signalled_at.elapsed();
        assert!(waited >= Duration::from_millis(200), "{waited:?}");
        assert!(waited < Duration::from_secs(2), "{waited:?}");
    }

    #[test]
    fn every_paragraph_is_accounted_for_despite_failures() {
        let rig = Rig::new(
            5,
            Duration::from_secs(5),
            MockSynth::new().failing_on("bad-voice"),
            MockPlayer::new().failing_on("bad-speaker"),
        );
        let supervisor = rig.start(&[&["one", "bad-voice"], &["two", "bad-speaker"], &["three"]]);

        // Five paragraphs plus the closing line.
        assert!(wait_until(|| rig.shared.stats.snapshot().handled() == 6));
        rig.shared.request_stop("test");
        assert_eq!(supervisor.join().unwrap().unwrap(), ExitStatus::Graceful);

        let snap = rig.shared.stats.snapshot();
        assert_eq!(snap.produced, 6);
        assert_eq!(snap.dropped, 0);
        assert_eq!(snap.spoken, 4);
        assert_eq!(snap.failed, 2);
        assert_eq!(snap.produced, snap.handled());
        assert_eq!(rig.shared.queue.pending(), 0);
        assert_eq!(rig.player.finished(), vec!["one", "two", "three", CLOSING]);
    }

    #[test]
    fn one_signal_stops_production_and_drains_the_rest() {
        let rig = Rig::new(
            10,
            Duration::from_secs(5),
            MockSynth::new(),
            MockPlayer::new().with_clip_length(Duration::from_millis(300)),
        );
        let supervisor = rig.start(&[&["p1", "p2", "p3", "p4"], &["never"]]);

        assert!(wait_until(|| !rig.player.started().is_empty()));
        rig.shared.request_stop("test");
        assert_eq!(supervisor.join().unwrap().unwrap(), ExitStatus::Graceful);

        assert_eq!(rig.player.finished(), vec!["p1"]);
        assert_eq!(rig.synth.calls(), vec!["p1"]);
        let snap = rig.shared.stats.snapshot();
        assert_eq!(snap.spoken, 1);
        assert_eq!(snap.produced, snap.handled());
        assert_eq!(rig.shared.queue.pending(), 0);
    }

    #[test]
    fn stop_during_slow_content_request_exits_gracefully() {
        let rig = Rig::new(5, Duration::from_millis(500), MockSynth::new(), MockPlayer::new());
        let entered = Arc::new(AtomicBool::new(false));
        let supervisor = rig.start_with(Box::new(StalledProvider {
            entered: Arc::clone(&entered),
        }));
        assert!(wait_until(|| entered.load(Ordering::SeqCst)));

        let signalled_at = Instant::now();
        rig.shared.request_stop("test");
        let status = supervisor.join().unwrap().unwrap();

        assert_eq!(status, ExitStatus::Graceful);
        assert!(signalled_at.elapsed() < Duration::from_millis(400));
        let snap = rig.shared.stats.snapshot();
        assert_eq!(snap.produced, 0);
        assert!(rig.synth.calls().is_empty());
    }

    #[test]
    fn items_left_after_both_loops_end_are_abandoned() {
        let shared = Shared::new(5, Duration::from_secs(5));
        for text in ["late one", "late two"] {
            shared.queue.push(text.to_string(), Duration::ZERO).unwrap();
            shared.stats.record_produced();
        }

        assert_eq!(abandon_leftovers(&shared), 2);

        let snap = shared.stats.snapshot();
        assert_eq!(snap.abandoned, 2);
        assert_eq!(snap.produced, snap.handled());
        assert_eq!(shared.queue.pending(), 0);
        assert_eq!(abandon_leftovers(&shared), 0);
    }
}
