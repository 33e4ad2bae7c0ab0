//! Shutdown state machine shared by the supervisor and both pipeline loops.
//!
//! [`ShutdownPhase`] only ever moves forward:
//!
//! ```text
//! Running ──1st stop signal──▶ GracefulStop ──2nd stop signal──▶ ForceExit
//!                                           ──grace deadline───▶ ForceExit
//! ```
//!
//! The grace deadline is not enforced by a timer thread: the supervisor calls
//! [`ShutdownController::check_deadline`] from its join loop.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// ShutdownPhase
// ---------------------------------------------------------------------------

/// Lifecycle phase of the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ShutdownPhase {
    /// Producing and playing normally.
    #[default]
    Running,

    /// A stop was requested: finish in-flight work, produce nothing new.
    GracefulStop,

    /// Terminal.  Playback is cancelled and the supervisor exits without
    /// waiting for the loops.
    ForceExit,
}

impl ShutdownPhase {
    /// Returns `true` once any stop has been requested.
    ///
    /// ```
    /// use sleepy_news::pipeline::ShutdownPhase;
    ///
    /// assert!(!ShutdownPhase::Running.is_stopping());
    /// assert!(ShutdownPhase::GracefulStop.is_stopping());
    /// assert!(ShutdownPhase::ForceExit.is_stopping());
    /// ```
    pub fn is_stopping(self) -> bool {
        self != ShutdownPhase::Running
    }

    /// A short label for log lines.
    pub fn label(self) -> &'static str {
        match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::GracefulStop => "graceful-stop",
            ShutdownPhase::ForceExit => "force-exit",
        }
    }
}

// ---------------------------------------------------------------------------
// ShutdownController
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct State {
    phase: ShutdownPhase,
    first_signal_at: Option<Instant>,
    signals: u32,
}

/// Counts stop signals and enforces the grace deadline.
///
/// Shared as `Arc<ShutdownController>` between the signal listener, the
/// supervisor and both loops.
#[derive(Debug)]
pub struct ShutdownController {
    state: Mutex<State>,
    grace: Duration,
}

impl ShutdownController {
    /// Create a controller in [`ShutdownPhase::Running`].
    pub fn new(grace: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            grace,
        }
    }

    /// Record an external stop signal received now.
    pub fn on_signal(&self) -> ShutdownPhase {
        self.on_signal_at(Instant::now())
    }

    /// Record an external stop signal received at `now`.
    ///
    /// The first signal moves `Running → GracefulStop` and starts the grace
    /// window; any later signal moves to `ForceExit`.
    pub fn on_signal_at(&self, now: Instant) -> ShutdownPhase {
        let mut st = self.lock();
        st.signals += 1;

        match st.phase {
            ShutdownPhase::Running => {
                st.phase = ShutdownPhase::GracefulStop;
                st.first_signal_at = Some(now);
                log::info!(
                    "shutdown: stop requested, draining (grace {:?})",
                    self.grace
                );
            }
            ShutdownPhase::GracefulStop => {
                st.phase = ShutdownPhase::ForceExit;
                log::warn!("shutdown: second stop signal, forcing exit");
            }
            ShutdownPhase::ForceExit => {}
        }

        st.phase
    }

    /// Escalate to `ForceExit` if the grace window has run out.
    pub fn check_deadline(&self) -> ShutdownPhase {
        self.check_deadline_at(Instant::now())
    }

    /// Escalate to `ForceExit` if more than the grace deadline has elapsed
    /// between the first signal and `now`.
    pub fn check_deadline_at(&self, now: Instant) -> ShutdownPhase {
        let mut st = self.lock();

        if st.phase == ShutdownPhase::GracefulStop {
            if let Some(first) = st.first_signal_at {
                if now.saturating_duration_since(first) > self.grace {
                    st.phase = ShutdownPhase::ForceExit;
                    log::warn!(
                        "shutdown: grace deadline of {:?} expired, forcing exit",
                        self.grace
                    );
                }
            }
        }

        st.phase
    }

    /// Current phase.
    pub fn phase(&self) -> ShutdownPhase {
        self.lock().phase
    }

    /// Returns `true` once any stop was requested.
    pub fn is_stopping(&self) -> bool {
        self.phase().is_stopping()
    }

    /// Returns `true` once the phase reached `ForceExit`.
    pub fn is_forced(&self) -> bool {
        self.phase() == ShutdownPhase::ForceExit
    }

    /// Number of stop signals received so far.
    pub fn signal_count(&self) -> u32 {
        self.lock().signals
    }

    /// Configured grace deadline.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
