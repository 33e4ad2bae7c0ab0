//! Producer loop — turns wake-ups into queued paragraphs.
//!
//! ```text
//! loop until stopping:
//!   wait_and_clear(wake, wake_poll)      ── timeout → re-check stop
//!   repeat batch_count times:
//!     provider.next_batch()              ── Err  → log, nothing this cycle
//!       Some(paragraphs) → push each (push_timeout; timeout → drop)
//!       None             → push closing message once, then idle
//! ```
//!
//! The provider is async; the loop drives it on the shared tokio runtime
//! with `Handle::block_on` from its own OS thread.  A provider call is
//! abandoned as soon as a stop is observed (checked every `wake_poll`), so a
//! slow LLM or news fetch never holds up a graceful shutdown.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::runtime::Handle;

use super::shutdown::ShutdownController;
use super::state::Shared;
use crate::config::AppConfig;
use crate::content::{ContentError, ContentProvider};

// ---------------------------------------------------------------------------
// ProducerSettings
// ---------------------------------------------------------------------------

/// Producer tuning, normally taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub batch_count: usize,
    pub wake_poll: Duration,
    pub push_timeout: Duration,
    pub closing_message: String,
}

impl ProducerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_count: config.pipeline.batch_produce_count,
            wake_poll: config.pipeline.wake_poll(),
            push_timeout: config.pipeline.push_timeout(),
            closing_message: config.closing_message.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Owns the content provider and feeds the queue on demand.
pub struct Producer {
    shared: Shared,
    provider: Box<dyn ContentProvider>,
    settings: ProducerSettings,
    runtime: Handle,
    exhausted: bool,
}

impl Producer {
    pub fn new(
        shared: Shared,
        provider: Box<dyn ContentProvider>,
        settings: ProducerSettings,
        runtime: Handle,
    ) -> Self {
        Self {
            shared,
            provider,
            settings,
            runtime,
            exhausted: false,
        }
    }

    /// Run [`run`](Self::run) on a named OS thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("producer".into())
            .spawn(move || self.run())
    }

    /// Block until a stop is requested.
    ///
    /// Must not be called from inside the tokio runtime.
    pub fn run(mut self) {
        log::info!("producer: started");

        while !self.shared.shutdown.is_stopping() {
            if !self.shared.wake.wait_and_clear(self.settings.wake_poll) {
                continue;
            }
            if self.shared.shutdown.is_stopping() {
                break;
            }
            self.produce_batch();
        }

        log::info!("producer: stopping");
    }

    fn produce_batch(&mut self) {
        for _ in 0..self.settings.batch_count {
            if self.exhausted || self.shared.shutdown.is_stopping() {
                return;
            }

            let Some(result) = self.next_batch() else {
                log::info!("producer: stop requested, content request abandoned");
                return;
            };
            match result {
                Ok(Some(paragraphs)) => {
                    log::info!("producer: produced {} paragraphs", paragraphs.len());
                    for paragraph in paragraphs {
                        if self.shared.shutdown.is_stopping() {
                            log::debug!("producer: stop requested, discarding rest of batch");
                            return;
                        }
                        self.enqueue(paragraph);
                    }
                }
                Ok(None) => {
                    log::info!("producer: content exhausted, sending closing message");
                    self.exhausted = true;
                    self.enqueue(self.settings.closing_message.clone());
                }
                Err(e) => {
                    log::warn!("producer: content provider failed: {e}");
                }
            }
        }
    }

    /// `None` when a stop arrived before the provider answered.
    fn next_batch(&mut self) -> Option<Result<Option<Vec<String>>, ContentError>> {
        let provider = &mut self.provider;
        let shutdown = &self.shared.shutdown;
        let poll = self.settings.wake_poll;

        self.runtime.block_on(async {
            tokio::select! {
                result = provider.next_batch() => Some(result),
                _ = stop_requested(shutdown, poll) => None,
            }
        })
    }

    fn enqueue(&self, paragraph: String) {
        match self.shared.queue.push(paragraph, self.settings.push_timeout) {
            Ok(()) => self.shared.stats.record_produced(),
            Err(e) => {
                log::debug!("producer: {e}; paragraph dropped");
                self.shared.stats.record_dropped();
            }
        }
    }
}

async fn stop_requested(shutdown: &ShutdownController, poll: Duration) {
    while !shutdown.is_stopping() {
        tokio::time::sleep(poll).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentError, ScriptProvider};
    use crate::pipeline::testing::{runtime, wait_until};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    const POLL: Duration = Duration::from_millis(20);

    fn settings(batch_count: usize) -> ProducerSettings {
        ProducerSettings {
            batch_count,
            wake_poll: POLL,
            push_timeout: Duration::from_millis(20),
            closing_message: "Goodnight.".into(),
        }
    }

    fn script(batches: &[&[&str]]) -> Box<dyn ContentProvider> {
        Box::new(ScriptProvider::new(
            batches
                .iter()
                .map(|b| b.iter().map(|s| s.to_string()).collect())
                .collect(),
        ))
    }

    fn drain(shared: &Shared) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(ticket) = shared.queue.pop(Duration::ZERO) {
            out.push(ticket.complete());
        }
        out
    }

    /// Returns the scripted results in order, then reports exhaustion.
    struct Flaky(VecDeque<Result<Vec<String>, ContentError>>);

    #[async_trait]
    impl ContentProvider for Flaky {
        async fn next_batch(&mut self) -> Result<Option<Vec<String>>, ContentError> {
            self.0.pop_front().transpose()
        }
    }

    #[test]
    fn nothing_is_produced_without_a_wake() {
        let rt = runtime();
        let shared = Shared::new(8, Duration::from_secs(5));
        let handle = Producer::new(shared.clone(), script(&[&["A"]]), settings(1), rt.handle().clone())
            .spawn()
            .unwrap();

        thread::sleep(POLL * 5);
        assert!(shared.queue.is_empty());

        shared.request_stop("test");
        handle.join().unwrap();
    }

    #[test]
    fn each_wake_produces_one_batch_then_closing_once() {
        let rt = runtime();
        let shared = Shared::new(8, Duration::from_secs(5));
        let handle = Producer::new(
            shared.clone(),
            script(&[&["A", "B"], &["C"]]),
            settings(1),
            rt.handle().clone(),
        )
        .spawn()
        .unwrap();

        shared.wake.raise();
        assert!(wait_until(|| shared.queue.len() == 2));
        assert_eq!(drain(&shared), vec!["A", "B"]);

        shared.wake.raise();
        assert!(wait_until(|| shared.queue.len() == 1));
        assert_eq!(drain(&shared), vec!["C"]);

        shared.wake.raise();
        assert!(wait_until(|| shared.queue.len() == 1));
        assert_eq!(drain(&shared), vec!["Goodnight."]);

        // Exhausted: further wakes produce nothing, but the loop stays alive.
        shared.wake.raise();
        thread::sleep(POLL * 5);
        assert!(shared.queue.is_empty());
        assert!(!handle.is_finished());

        shared.request_stop("test");
        handle.join().unwrap();
        assert_eq!(shared.stats.snapshot().produced, 4);
    }

    #[test]
    fn batch_count_calls_provider_repeatedly_per_wake() {
        let rt = runtime();
        let shared = Shared::new(8, Duration::from_secs(5));
        let handle = Producer::new(
            shared.clone(),
            script(&[&["A"], &["B"], &["C"]]),
            settings(2),
            rt.handle().clone(),
        )
        .spawn()
        .unwrap();

        shared.wake.raise();
        assert!(wait_until(|| shared.queue.len() == 2));
        thread::sleep(POLL * 3);
        assert_eq!(drain(&shared), vec!["A", "B"]);

        shared.request_stop("test");
        handle.join().unwrap();
    }

    #[test]
    fn provider_failure_does_not_stop_the_loop() {
        let rt = runtime();
        let shared = Shared::new(8, Duration::from_secs(5));
        let provider = Flaky(VecDeque::from(vec![
            Err(ContentError::Timeout),
            Ok(vec!["after the storm".to_string()]),
        ]));
        let handle = Producer::new(shared.clone(), Box::new(provider), settings(1), rt.handle().clone())
            .spawn()
            .unwrap();

        shared.wake.raise();
        thread::sleep(POLL * 5);
        assert!(shared.queue.is_empty());
        assert!(!handle.is_finished());

        shared.wake.raise();
        assert!(wait_until(|| shared.queue.len() == 1));
        assert_eq!(drain(&shared), vec!["after the storm"]);

        shared.request_stop("test");
        handle.join().unwrap();
    }

    #[test]
    fn full_queue_drops_paragraphs_after_push_timeout() {
        let rt = runtime();
        let shared = Shared::new(1, Duration::from_secs(5));
        let handle = Producer::new(
            shared.clone(),
            script(&[&["A", "B", "C"]]),
            settings(1),
            rt.handle().clone(),
        )
        .spawn()
        .unwrap();

        shared.wake.raise();
        assert!(wait_until(|| shared.stats.snapshot().dropped == 2));

        let snap = shared.stats.snapshot();
        assert_eq!(snap.produced, 1);
        assert_eq!(drain(&shared), vec!["A"]);

        shared.request_stop("test");
        handle.join().unwrap();
    }

    #[test]
    fn stop_is_observed_within_a_poll_interval() {
        let rt = runtime();
        let shared = Shared::new(8, Duration::from_secs(5));
        let handle = Producer::new(shared.clone(), script(&[]), settings(1), rt.handle().clone())
            .spawn()
            .unwrap();

        // Not through request_stop: no wake is raised, the poll must notice.
        shared.shutdown.on_signal();
        assert!(wait_until(|| handle.is_finished()));
        handle.join().unwrap();
    }

    #[test]
    fn wake_after_stop_produces_nothing() {
        let rt = runtime();
        let shared = Shared::new(8, Duration::from_secs(5));
        shared.request_stop("test");

        Producer::new(shared.clone(), script(&[&["A"]]), settings(1), rt.handle().clone()).run();

        assert!(shared.queue.is_empty());
    }
}
