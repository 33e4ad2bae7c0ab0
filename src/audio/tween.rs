//! Volume tweening and background ducking.
//!
//! [`tween`] walks a [`VolumeSink`] from one gain to another in fixed steps
//! (about 30 updates per second), then writes the exact target so no
//! floating-point drift survives.  [`Ducker`] uses it to lower the background
//! bed while speech plays and to restore it afterwards.
//!
//! Ducking is best-effort: an unavailable sink turns every operation into a
//! no-op and nothing here returns an error.

use std::sync::Arc;
use std::time::Duration;

use super::background::VolumeSink;

/// Volume updates per second of fade.
pub const UPDATES_PER_SEC: f32 = 30.0;

// ---------------------------------------------------------------------------
// Tween
// ---------------------------------------------------------------------------

/// A precomputed linear gain ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    from: f32,
    to: f32,
    steps: u32,
    step_duration: Duration,
}

impl Tween {
    /// Plan a ramp from `from` to `to` over `duration`.
    ///
    /// Uses `max(1, duration_secs * 30)` steps.  Both ends are clamped to
    /// `[0, 1]`.
    ///
    /// ```
    /// use std::time::Duration;
    /// use sleepy_news::audio::Tween;
    ///
    /// let t = Tween::new(0.4, 0.1, Duration::from_secs(1));
    /// assert_eq!(t.steps(), 30);
    /// assert_eq!(t.values().last(), Some(0.1));
    /// ```
    pub fn new(from: f32, to: f32, duration: Duration) -> Self {
        let steps = ((duration.as_secs_f32() * UPDATES_PER_SEC) as u32).max(1);
        Self {
            from: clamp_unit(from),
            to: clamp_unit(to),
            steps,
            step_duration: duration / steps,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn step_duration(&self) -> Duration {
        self.step_duration
    }

    /// Gain after `step` of [`steps`](Self::steps) updates.
    ///
    /// Always within `[min(from, to), max(from, to)]`; the last step is
    /// exactly `to`.
    pub fn value_at(&self, step: u32) -> f32 {
        if step >= self.steps {
            return self.to;
        }
        let (lo, hi) = if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        };
        let progress = step as f32 / self.steps as f32;
        (self.from + (self.to - self.from) * progress).clamp(lo, hi)
    }

    /// Every gain the ramp writes, in order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        (1..=self.steps).map(move |step| self.value_at(step))
    }

    /// Drive `sink` through the ramp, calling `sleep` between updates.
    ///
    /// Returns `false` if the sink rejected a write; the ramp stops there.
    pub fn run_with(&self, sink: &dyn VolumeSink, sleep: impl FnMut(Duration)) -> bool {
        self.run_until(sink, sleep, || false)
    }

    /// Like [`run_with`](Self::run_with), but checks `interrupt` before each
    /// update and stops without the final write once it returns `true`.
    pub fn run_until(
        &self,
        sink: &dyn VolumeSink,
        mut sleep: impl FnMut(Duration),
        interrupt: impl Fn() -> bool,
    ) -> bool {
        for value in self.values() {
            if interrupt() {
                log::debug!("tween: fade interrupted");
                return true;
            }
            if sink.set_volume(value).is_err() {
                log::debug!("tween: sink unavailable, aborting fade");
                return false;
            }
            sleep(self.step_duration);
        }
        // Exact target, whatever rounding happened on the way.
        sink.set_volume(self.to).is_ok()
    }
}

/// Fade `sink` from `from` to `to` over `duration`, blocking the caller.
///
/// Returns `false` when the fade was cut short by an unavailable sink.
pub fn tween(from: f32, to: f32, duration: Duration, sink: &dyn VolumeSink) -> bool {
    Tween::new(from, to, duration).run_with(sink, std::thread::sleep)
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Ducker
// ---------------------------------------------------------------------------

/// Lowers the background bed to `ducked` and restores it to `initial`.
///
/// Both directions are no-ops while the bed is not playing. Once the
/// interrupt set by [`interrupted_by`](Self::interrupted_by) fires, fades stop
/// early and the bed jumps straight back to `initial`.
pub struct Ducker {
    sink: Arc<dyn VolumeSink>,
    initial: f32,
    ducked: f32,
    fade: Duration,
    interrupt: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
}

impl Ducker {
    pub fn new(sink: Arc<dyn VolumeSink>, initial: f32, ducked: f32, fade: Duration) -> Self {
        Self {
            sink,
            initial: clamp_unit(initial),
            ducked: clamp_unit(ducked),
            fade,
            interrupt: None,
        }
    }

    pub fn interrupted_by(mut self, interrupt: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.interrupt = Some(Arc::new(interrupt));
        self
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|interrupt| interrupt())
    }

    /// Fade from the current gain (or `initial` if unreadable) to `ducked`.
    pub fn duck(&self) {
        if !self.sink.is_playing() {
            return;
        }
        let current = self.sink.volume().unwrap_or(self.initial);
        self.fade_to(current, self.ducked);
    }

    /// Fade from the current gain (or `ducked` if unreadable) back to
    /// `initial`.
    pub fn unduck(&self) {
        if !self.sink.is_playing() {
            return;
        }
        let current = self.sink.volume().unwrap_or(self.ducked);
        self.fade_to(current, self.initial);
        if self.is_interrupted() {
            let _ = self.sink.set_volume(self.initial);
        }
    }

    fn fade_to(&self, from: f32, to: f32) {
        Tween::new(from, to, self.fade).run_until(
            self.sink.as_ref(),
            std::thread::sleep,
            || self.is_interrupted(),
        );
    }

    /// Duck now and unduck when the returned guard is dropped.
    pub fn duck_scope(&self) -> DuckGuard<'_> {
        self.duck();
        DuckGuard { ducker: self }
    }
}

/// Restores the background gain on drop, whatever happened to playback.
#[must_use = "the bed is restored as soon as the guard is dropped"]
pub struct DuckGuard<'a> {
    ducker: &'a Ducker,
}

impl Drop for DuckGuard<'_> {
    fn drop(&mut self) {
        self.ducker.unduck();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
