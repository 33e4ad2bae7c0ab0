//! Foreground speech playback.
//!
//! [`AudioPlayer::play`] blocks until the clip finishes or the `cancel`
//! callback returns `true`.  Both implementations poll `cancel` every
//! [`CANCEL_POLL`], so a forced shutdown interrupts playback well within a
//! second.
//!
//! * [`RodioPlayer`] decodes in-process on a fresh `rodio::Sink`.
//! * [`CommandPlayer`] pipes the clip into an external program (e.g.
//!   `ffplay -nodisp -autoexit -`) and stops it with SIGTERM, escalating to
//!   SIGKILL when it does not exit within the kill grace period.

use std::io::{self, Cursor, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rodio::{Decoder, OutputStreamHandle, Sink};
use thiserror::Error;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// How often a playing clip checks its cancel callback.
pub const CANCEL_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// PlaybackError / PlaybackOutcome
// ---------------------------------------------------------------------------

/// Errors that can occur while playing a synthesized clip.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No audio output device / sink could be created.
    #[error("audio output unavailable: {0}")]
    Output(String),

    /// The clip bytes are not a format the decoder understands.
    #[error("cannot decode audio: {0}")]
    Decode(String),

    /// Spawning or talking to the player process failed.
    #[error("player process failed: {0}")]
    Process(#[from] io::Error),

    /// The player process exited unsuccessfully.
    #[error("player exited with {0}")]
    Exit(ExitStatus),
}

/// How a `play` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The whole clip was played.
    Finished,
    /// Playback was interrupted through the cancel callback.
    Cancelled,
}

// ---------------------------------------------------------------------------
// AudioPlayer trait
// ---------------------------------------------------------------------------

/// Blocking, cancellable playback of an encoded audio clip.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, audio: &[u8], cancel: &dyn Fn() -> bool)
        -> Result<PlaybackOutcome, PlaybackError>;
}

// ---------------------------------------------------------------------------
// RodioPlayer
// ---------------------------------------------------------------------------

/// Plays clips on the process's default output through rodio.
pub struct RodioPlayer {
    handle: OutputStreamHandle,
}

impl RodioPlayer {
    /// `handle` must come from an `OutputStream` that outlives the player.
    pub fn new(handle: OutputStreamHandle) -> Self {
        Self { handle }
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(
        &self,
        audio: &[u8],
        cancel: &dyn Fn() -> bool,
    ) -> Result<PlaybackOutcome, PlaybackError> {
        let sink = Sink::try_new(&self.handle).map_err(|e| PlaybackError::Output(e.to_string()))?;
        let source = Decoder::new(Cursor::new(audio.to_vec()))
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;
        sink.append(source);

        loop {
            if sink.empty() {
                return Ok(PlaybackOutcome::Finished);
            }
            if cancel() {
                sink.stop();
                return Ok(PlaybackOutcome::Cancelled);
            }
            thread::sleep(CANCEL_POLL);
        }
    }
}

// ---------------------------------------------------------------------------
// CommandPlayer
// ---------------------------------------------------------------------------

/// Plays clips by writing them to the stdin of an external player program.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    kill_grace: Duration,
}

impl CommandPlayer {
    /// Build from a command line such as `["ffplay", "-nodisp", "-autoexit", "-"]`.
    ///
    /// Returns `None` for an empty command.
    pub fn new(command: &[String], kill_grace: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            kill_grace,
        })
    }
}

impl AudioPlayer for CommandPlayer {
    fn play(
        &self,
        audio: &[u8],
        cancel: &dyn Fn() -> bool,
    ) -> Result<PlaybackOutcome, PlaybackError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Feed stdin from a helper thread so a slow reader never blocks the
        // cancel polling below.
        let writer = child.stdin.take().map(|mut stdin| {
            let clip = audio.to_vec();
            thread::spawn(move || {
                if let Err(e) = stdin.write_all(&clip) {
                    log::debug!("player: stdin closed early: {e}");
                }
            })
        });

        let outcome = loop {
            if let Some(status) = child.try_wait()? {
                break if status.success() {
                    Ok(PlaybackOutcome::Finished)
                } else {
                    Err(PlaybackError::Exit(status))
                };
            }
            if cancel() {
                let status = terminate(&mut child, self.kill_grace)?;
                log::info!("player: cancelled ({status})");
                break Ok(PlaybackOutcome::Cancelled);
            }
            thread::sleep(CANCEL_POLL);
        };

        if let Some(writer) = writer {
            let _ = writer.join();
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Player selection
// ---------------------------------------------------------------------------

/// Pick the player for this run.
///
/// A configured command wins and needs no output device; otherwise clips are
/// played in-process, which does.
pub fn select_player(
    command: Option<&[String]>,
    kill_grace: Duration,
    output: Option<&OutputStreamHandle>,
) -> Result<Arc<dyn AudioPlayer>, PlaybackError> {
    if let Some(player) = command.and_then(|cmd| CommandPlayer::new(cmd, kill_grace)) {
        return Ok(Arc::new(player));
    }
    match output {
        Some(handle) => Ok(Arc::new(RodioPlayer::new(handle.clone()))),
        None => Err(PlaybackError::Output(
            "no audio output device and no playback.command configured".into(),
        )),
    }
}

/// Ask `child` to exit, then kill it if it is still alive after `grace`.
#[cfg(unix)]
fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let pid = Pid::from_raw(child.id() as i32);
    if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait();
        }
        return Err(io::Error::other(e));
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        thread::sleep(Duration::from_millis(20));
    }

    log::warn!("player: process ignored SIGTERM for {grace:?}, killing");
    child.kill()?;
    child.wait()
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, _grace: Duration) -> io::Result<ExitStatus> {
    child.kill()?;
    child.wait()
}

// ---------------------------------------------------------------------------
// MockPlayer  (test-only)
// ---------------------------------------------------------------------------

/// Test double that "plays" UTF-8 clips by recording their text.
///
/// Clips listed in `fail_on` fail with [`PlaybackError::Decode`]; with a
/// `clip_length` every clip lasts that long and honours `cancel`. A gated
/// player holds each clip until the test sends `()` or drops the sender.
#[cfg(test)]
#[derive(Default)]
pub struct MockPlayer {
    fail_on: Vec<String>,
    clip_length: Option<Duration>,
    gate: Option<std::sync::Mutex<std::sync::mpsc::Receiver<()>>>,
    started: std::sync::Mutex<Vec<String>>,
    finished: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.fail_on.push(text.into());
        self
    }

    pub fn with_clip_length(mut self, length: Duration) -> Self {
        self.clip_length = Some(length);
        self
    }

    pub fn gated() -> (Self, std::sync::mpsc::Sender<()>) {
        let (release, gate) = std::sync::mpsc::channel();
        let player = Self {
            gate: Some(std::sync::Mutex::new(gate)),
            ..Self::default()
        };
        (player, release)
    }

    /// Clips handed to `play`, in order.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    /// Clips played to the end, in order.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl AudioPlayer for MockPlayer {
    fn play(
        &self,
        audio: &[u8],
        cancel: &dyn Fn() -> bool,
    ) -> Result<PlaybackOutcome, PlaybackError> {
        let text = String::from_utf8_lossy(audio).into_owned();
        self.started.lock().unwrap().push(text.clone());

        if self.fail_on.contains(&text) {
            return Err(PlaybackError::Decode("injected failure".into()));
        }
        if let Some(gate) = &self.gate {
            let gate = gate.lock().unwrap();
            loop {
                match gate.recv_timeout(CANCEL_POLL) {
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) if !cancel() => continue,
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                        return Ok(PlaybackOutcome::Cancelled)
                    }
                    _ => break,
                }
            }
        }
        if let Some(length) = self.clip_length {
            let end = Instant::now() + length;
            while Instant::now() < end {
                if cancel() {
                    return Ok(PlaybackOutcome::Cancelled);
                }
                thread::sleep(CANCEL_POLL.min(end.saturating_duration_since(Instant::now())));
            }
        }

        self.finished.lock().unwrap().push(text);
        Ok(PlaybackOutcome::Finished)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
