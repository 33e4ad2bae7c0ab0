//! Coalescing wake-up flag used by the consumer to request more content.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Edge-triggered single-slot signal.
///
/// Any number of [`raise`](Self::raise) calls before the next successful
/// [`wait_and_clear`](Self::wait_and_clear) collapse into one wake-up.
///
/// ```rust
/// use std::time::Duration;
/// use sleepy_news::pipeline::WakeSignal;
///
/// let wake = WakeSignal::new();
/// wake.raise();
/// wake.raise();
/// assert!(wake.wait_and_clear(Duration::ZERO));
/// assert!(!wake.wait_and_clear(Duration::ZERO));
/// ```
#[derive(Debug, Default)]
pub struct WakeSignal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag.  No-op when it is already set.
    pub fn raise(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        if !*raised {
            *raised = true;
            self.cond.notify_all();
        }
    }

    /// Wait up to `timeout` for the flag, then clear it atomically.
    ///
    /// Returns `false` on timeout without touching the flag.
    pub fn wait_and_clear(&self, timeout: Duration) -> bool {
        let raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut raised, _) = self
            .cond
            .wait_timeout_while(raised, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);

        if *raised {
            *raised = false;
            true
        } else {
            false
        }
    }

    /// Peek at the flag without clearing it.
    pub fn is_raised(&self) -> bool {
        *self.raised.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
