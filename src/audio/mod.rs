//! Audio side of the pipeline — speech playback and background ducking.
//!
//! # Layout
//!
//! ```text
//! Consumer ── Ducker::duck_scope ──▶ tween ──▶ VolumeSink (BackgroundTrack)
//!          └─ AudioPlayer::play  (RodioPlayer | CommandPlayer)
//! ```
//!
//! Everything here is driven from the consumer thread only; the single
//! background gain value therefore has exactly one writer.

pub mod background;
pub mod player;
pub mod tween;

pub use background::{AudioUnavailable, BackgroundTrack, VolumeSink};
pub use player::{
    select_player, AudioPlayer, CommandPlayer, PlaybackError, PlaybackOutcome, RodioPlayer,
    CANCEL_POLL,
};
pub use tween::{tween, DuckGuard, Ducker, Tween};

// test-only re-export so the pipeline tests can use `crate::audio::MockPlayer`.
#[cfg(test)]
pub use player::MockPlayer;
