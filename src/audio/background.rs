//! Looping background music bed whose gain is ducked during speech.
//!
//! [`VolumeSink`] is the only surface the ducking controller sees.
//! [`BackgroundTrack`] implements it on top of a `rodio::Sink`; when no track
//! is configured, or the file cannot be decoded, the track is created
//! *disabled* and every volume call reports [`AudioUnavailable`].

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rodio::{Decoder, OutputStreamHandle, Sink, Source};
use thiserror::Error;

use super::tween::tween;

// ---------------------------------------------------------------------------
// VolumeSink
// ---------------------------------------------------------------------------

/// The audio engine behind the sink is not ready (never opened, or torn down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("background audio engine is not available")]
pub struct AudioUnavailable;

/// A single scalar gain in `[0, 1]`.
///
/// Implementations must be `Send + Sync`; in practice only the consumer
/// thread writes to the sink.
pub trait VolumeSink: Send + Sync {
    /// Set the gain.  Fails when the engine is not ready.
    fn set_volume(&self, volume: f32) -> Result<(), AudioUnavailable>;

    /// Read the current gain.  Fails when the engine is not ready.
    fn volume(&self) -> Result<f32, AudioUnavailable>;

    /// Returns `true` when the engine is ready **and** the track is playing.
    fn is_playing(&self) -> bool;
}

// ---------------------------------------------------------------------------
// BackgroundTrack
// ---------------------------------------------------------------------------

/// Background music looping forever on its own rodio sink.
pub struct BackgroundTrack {
    sink: Option<Sink>,
    path: Option<PathBuf>,
}

impl BackgroundTrack {
    /// A track that never plays; all volume calls fail with
    /// [`AudioUnavailable`].
    pub fn disabled() -> Self {
        Self {
            sink: None,
            path: None,
        }
    }

    /// Open `path` on the given output and queue it paused at `volume`.
    ///
    /// Tries the path as given, then the same stem with `.wav` and `.ogg`.
    /// Any failure is logged and yields a disabled track; background music
    /// is never fatal.
    pub fn open(handle: &OutputStreamHandle, path: &Path, volume: f32) -> Self {
        let sink = match Sink::try_new(handle) {
            Ok(sink) => sink,
            Err(e) => {
                log::warn!("background: cannot create sink ({e}); music disabled");
                return Self::disabled();
            }
        };

        for candidate in candidate_paths(path) {
            match decode_file(&candidate) {
                Ok(source) => {
                    sink.pause();
                    sink.set_volume(volume.clamp(0.0, 1.0));
                    sink.append(source.repeat_infinite());
                    if candidate != path {
                        log::info!("background: fell back to {}", candidate.display());
                    }
                    log::info!("background: loaded {}", candidate.display());
                    return Self {
                        sink: Some(sink),
                        path: Some(candidate),
                    };
                }
                Err(e) => {
                    log::debug!("background: cannot load {}: {e}", candidate.display());
                }
            }
        }

        log::warn!(
            "background: failed to load {}; music disabled \
             (converting to 44.1 kHz 16-bit WAV or OGG usually helps)",
            path.display()
        );
        Self::disabled()
    }

    /// Open the configured music, if any, on whatever output is available.
    ///
    /// Without an output device the track is disabled and ducking becomes a
    /// no-op.
    pub fn from_output(output: Option<&OutputStreamHandle>, path: Option<&Path>, volume: f32) -> Self {
        match (output, path) {
            (Some(handle), Some(path)) => Self::open(handle, path, volume),
            (None, Some(path)) => {
                log::warn!(
                    "background: no audio output; not playing {}",
                    path.display()
                );
                Self::disabled()
            }
            (_, None) => Self::disabled(),
        }
    }

    /// Start (or resume) looping playback.
    pub fn start(&self) {
        if let Some(sink) = &self.sink {
            sink.play();
            log::info!("background: music started");
        }
    }

    /// Fade out over `fade`, then stop for good.
    pub fn stop(&self, fade: Duration) {
        let Some(sink) = &self.sink else {
            return;
        };
        tween(sink.volume(), 0.0, fade, self);
        sink.stop();
        log::info!("background: music stopped");
    }

    /// The file actually playing, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl VolumeSink for BackgroundTrack {
    fn set_volume(&self, volume: f32) -> Result<(), AudioUnavailable> {
        let sink = self.sink.as_ref().ok_or(AudioUnavailable)?;
        sink.set_volume(volume);
        Ok(())
    }

    fn volume(&self) -> Result<f32, AudioUnavailable> {
        self.sink
            .as_ref()
            .map(Sink::volume)
            .ok_or(AudioUnavailable)
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode_file(path: &Path) -> Result<Decoder<BufReader<File>>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())
}

/// `path` itself followed by the `.wav` / `.ogg` siblings that differ from it.
fn candidate_paths(path: &Path) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    for ext in ["wav", "ogg"] {
        let sibling = path.with_extension(ext);
        if sibling != path && sibling.exists() {
            paths.push(sibling);
        }
    }
    paths
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_track_rejects_volume_calls() {
        let track = BackgroundTrack::disabled();
        assert_eq!(track.set_volume(0.5), Err(AudioUnavailable));
        assert_eq!(track.volume(), Err(AudioUnavailable));
        assert!(!track.is_playing());
        assert!(track.path().is_none());
    }

    #[test]
    fn stopping_disabled_track_is_noop() {
        BackgroundTrack::disabled().stop(Duration::from_secs(1));
    }

    #[test]
    fn candidates_start_with_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let mp3 = dir.path().join("bed.mp3");
        assert_eq!(candidate_paths(&mp3), vec![mp3]);
    }

    #[test]
    fn candidates_include_existing_siblings_only() {
        let dir = tempfile::tempdir().unwrap();
        let mp3 = dir.path().join("bed.mp3");
        let ogg = dir.path().join("bed.ogg");
        std::fs::write(&ogg, b"not really ogg").unwrap();

        assert_eq!(candidate_paths(&mp3), vec![mp3, ogg]);
    }

    #[test]
    fn music_without_output_device_is_disabled() {
        let track = BackgroundTrack::from_output(None, Some(Path::new("/music/rain.mp3")), 0.4);
        assert!(!track.is_playing());
        assert!(track.path().is_none());
        assert_eq!(track.volume(), Err(AudioUnavailable));
    }

    #[test]
    fn no_music_configured_is_disabled() {
        let track = BackgroundTrack::from_output(None, None, 0.4);
        assert!(!track.is_playing());
    }

    #[test]
    fn volume_sink_is_object_safe() {
        let _: Box<dyn VolumeSink> = Box::new(BackgroundTrack::disabled());
    }
}
