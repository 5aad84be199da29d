//! Interruptible audio playback via OS player subprocesses
//!
//! Narration is played by spawning a system audio player so the cancel key
//! can kill it mid-clip. If no player can be spawned, a fixed fallback
//! chain is tried synchronously; only when every fallback is exhausted does
//! a play call fail. Beep cues are fire-and-forget and may fail silently.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::broadcast;

use super::hotkey::{HotkeyEvent, HotkeyListener};
use crate::{Error, Result};

/// Known audio player binaries, in fallback preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerBackend {
    /// macOS `afplay` (plays both WAV and MP3)
    Afplay,
    /// Linux `mpg123` (MP3)
    Mpg123,
    /// Linux ALSA `aplay` (WAV)
    Aplay,
    /// PulseAudio `paplay` (WAV)
    Paplay,
}

impl PlayerBackend {
    /// Fixed fallback preference order
    pub const PREFERENCE: [Self; 4] = [Self::Afplay, Self::Mpg123, Self::Aplay, Self::Paplay];

    /// Binary name on PATH
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Afplay => "afplay",
            Self::Mpg123 => "mpg123",
            Self::Aplay => "aplay",
            Self::Paplay => "paplay",
        }
    }

    /// Build the player invocation for `path`
    #[must_use]
    pub fn command(self, path: &Path) -> Command {
        let mut cmd = Command::new(self.program());
        match self {
            Self::Mpg123 => {
                cmd.arg("-q").arg(path);
            }
            Self::Aplay => {
                cmd.arg("-q").arg(path);
            }
            Self::Afplay | Self::Paplay => {
                cmd.arg(path);
            }
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        cmd
    }
}

/// Detect the first available player backend
#[must_use]
pub fn detect_backend() -> Option<PlayerBackend> {
    PlayerBackend::PREFERENCE
        .into_iter()
        .find(|b| which::which(b.program()).is_ok())
}

/// How a play call concluded. Exactly one outcome occurs per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Clip played to its natural end
    Completed,
    /// Cancel key fired; the player process was killed
    Interrupted,
    /// Primary path failed; a fallback player finished the clip
    FallbackCompleted,
}

/// Anything narration can be played through (mocked in tests)
#[async_trait]
pub trait PlaySink: Send + Sync {
    /// Play the audio file at `path` to completion or interruption.
    ///
    /// # Errors
    ///
    /// Returns `Error::Playback` only when every fallback is exhausted.
    async fn play(&self, path: &Path) -> Result<PlaybackOutcome>;
}

/// Short feedback beeps (capture start/end, interruption acknowledgement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Recording started
    Start,
    /// Recording finished
    End,
    /// Playback was interrupted
    Ack,
}

/// Generated beep files plus a WAV-capable player for them.
///
/// Cue playback is strictly best-effort: a missing player or a failed spawn
/// is swallowed, never surfaced.
pub struct Cues {
    dir: PathBuf,
    player: Option<PathBuf>,
}

impl Cues {
    /// Generate the beep files under `dir` (if missing) and probe a player.
    ///
    /// # Errors
    ///
    /// Returns an error if the cue files cannot be written.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        for cue in [Cue::Start, Cue::End, Cue::Ack] {
            let path = dir.join(cue.file_name());
            if !path.exists() {
                write_beep(&path, cue.frequency(), cue.duration_ms())?;
            }
        }

        // mpg123 cannot play WAV cues, so probe WAV-capable players only.
        let player = ["afplay", "aplay", "paplay"]
            .iter()
            .find_map(|p| which::which(p).ok());

        Ok(Self {
            dir: dir.to_path_buf(),
            player,
        })
    }

    /// Play a cue without blocking (detached child, errors swallowed)
    pub fn play(&self, cue: Cue) {
        let Some(player) = &self.player else { return };
        let mut cmd = std::process::Command::new(player);
        cmd.arg(self.dir.join(cue.file_name()))
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Err(e) = spawn_detached(cmd) {
            tracing::debug!(?cue, error = %e, "cue playback failed");
        }
    }
}

/// Spawn a fire-and-forget child and reap it on a detached thread.
///
/// Cues fire on every capture gesture and interruption; without the
/// reaper each finished child would sit as a zombie until process exit.
fn spawn_detached(mut cmd: std::process::Command) -> std::io::Result<std::thread::JoinHandle<()>> {
    let mut child = cmd.spawn()?;
    Ok(std::thread::spawn(move || {
        let _ = child.wait();
    }))
}

impl Cue {
    const fn file_name(self) -> &'static str {
        match self {
            Self::Start => "cue_start.wav",
            Self::End => "cue_end.wav",
            Self::Ack => "cue_ack.wav",
        }
    }

    const fn frequency(self) -> f32 {
        match self {
            Self::Start => 880.0,
            Self::End => 520.0,
            Self::Ack => 340.0,
        }
    }

    const fn duration_ms(self) -> u32 {
        match self {
            Self::Start | Self::End => 120,
            Self::Ack => 80,
        }
    }
}

/// Write a mono 16-bit sine beep to `path`
fn write_beep(path: &Path, frequency: f32, duration_ms: u32) -> Result<()> {
    const RATE: u32 = 16_000;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| Error::Audio(e.to_string()))?;

    let num_samples = RATE * duration_ms / 1000;
    for i in 0..num_samples {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f32 / RATE as f32;
        let sample = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.4;
        #[allow(clippy::cast_possible_truncation)]
        writer
            .write_sample((sample * 32767.0) as i16)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(())
}

/// Plays narration clips with cancel-key interruption
pub struct Player {
    backend: Option<PlayerBackend>,
    hotkeys: Option<Arc<HotkeyListener>>,
    cues: Option<Arc<Cues>>,
}

impl Player {
    /// Create a player, probing for an available backend.
    ///
    /// With `hotkeys`, playback is interruptible by the cancel key; without,
    /// it runs to completion. `cues` provides the interrupt acknowledgement
    /// beep.
    #[must_use]
    pub fn new(hotkeys: Option<Arc<HotkeyListener>>, cues: Option<Arc<Cues>>) -> Self {
        let backend = detect_backend();
        tracing::debug!(?backend, interruptible = hotkeys.is_some(), "player initialized");
        Self {
            backend,
            hotkeys,
            cues,
        }
    }

    /// Try every backend in preference order, non-interruptibly.
    async fn fallback_chain(&self, path: &Path) -> Result<PlaybackOutcome> {
        for backend in PlayerBackend::PREFERENCE {
            if which::which(backend.program()).is_err() {
                continue;
            }
            match backend.command(path).status().await {
                Ok(status) if status.success() => {
                    tracing::debug!(backend = backend.program(), "fallback playback complete");
                    return Ok(PlaybackOutcome::FallbackCompleted);
                }
                Ok(status) => {
                    tracing::warn!(backend = backend.program(), %status, "fallback player failed");
                }
                Err(e) => {
                    tracing::warn!(backend = backend.program(), error = %e, "fallback spawn failed");
                }
            }
        }
        Err(Error::Playback(format!(
            "no working audio player for {}",
            path.display()
        )))
    }
}

#[async_trait]
impl PlaySink for Player {
    async fn play(&self, path: &Path) -> Result<PlaybackOutcome> {
        if let Some(backend) = self.backend {
            if let Some(hotkeys) = &self.hotkeys {
                let events = hotkeys.subscribe();
                match run_interruptible(backend.command(path), events).await {
                    Ok(PlaybackOutcome::Interrupted) => {
                        if let Some(cues) = &self.cues {
                            cues.play(Cue::Ack);
                        }
                        return Ok(PlaybackOutcome::Interrupted);
                    }
                    Ok(outcome) => return Ok(outcome),
                    Err(e) => {
                        tracing::warn!(error = %e, "interruptible playback failed, falling back");
                    }
                }
            } else {
                match backend.command(path).status().await {
                    Ok(status) if status.success() => return Ok(PlaybackOutcome::Completed),
                    Ok(status) => {
                        tracing::warn!(%status, "player exited abnormally, falling back");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "player spawn failed, falling back");
                    }
                }
            }
        }

        self.fallback_chain(path).await
    }
}

/// Run a player command, killing it if the cancel key fires first.
///
/// Returns `Interrupted` on cancel, `Completed` on natural exit. A spawn
/// failure or abnormal exit is an error so the caller can fall back.
pub(crate) async fn run_interruptible(
    mut cmd: Command,
    mut events: broadcast::Receiver<HotkeyEvent>,
) -> Result<PlaybackOutcome> {
    let mut child = cmd
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Playback(format!("failed to spawn player: {e}")))?;

    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| Error::Playback(e.to_string()))?;
                if status.success() {
                    return Ok(PlaybackOutcome::Completed);
                }
                return Err(Error::Playback(format!("player exited with {status}")));
            }
            event = events.recv() => match event {
                Ok(HotkeyEvent::Cancel) => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    tracing::debug!("playback interrupted");
                    return Ok(PlaybackOutcome::Interrupted);
                }
                // Other hotkeys and lagged receivers don't affect playback.
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    let status = child.wait().await.map_err(|e| Error::Playback(e.to_string()))?;
                    if status.success() {
                        return Ok(PlaybackOutcome::Completed);
                    }
                    return Err(Error::Playback(format!("player exited with {status}")));
                }
            }
        }
    }
}
