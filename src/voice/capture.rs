//! Push-to-talk audio capture
//!
//! One capture gesture spans a hotkey press to its release: press arms the
//! engine and opens a microphone stream, frames accumulate in a channel
//! while the key is held, release drains them into a WAV and hands it to
//! the STT provider. The cancel key aborts at any point and discards
//! partial audio.
//!
//! The gesture loop blocks, so callers run [`PushToTalk::capture`] from the
//! conversation loop which offloads it to a blocking task internally. The
//! hotkey listener thread and the cpal callback never share mutable state:
//! events arrive over a broadcast channel, frames over an mpsc channel.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};
use tokio::sync::broadcast;

use super::hotkey::{HotkeyEvent, HotkeyListener};
use super::playback::{Cue, Cues};
use crate::config::VoiceConfig;
use crate::speech::SttProvider;
use crate::{Error, Result};

/// Interval at which the gesture loop polls for release/cancel.
/// Short enough to feel instant, long enough not to spin.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Elapsed recording time after which an unbounded gesture logs a warning
const UNBOUNDED_WARN_AFTER: Duration = Duration::from_secs(60);

/// How a capture gesture ended
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GestureOutcome {
    /// Cancel key fired; partial audio is discarded
    Cancelled,
    /// Key released (or duration bound hit); samples in capture order
    Finished(Vec<f32>),
}

/// Push-to-talk capture engine
pub struct PushToTalk {
    stt: Arc<dyn SttProvider>,
    hotkeys: Arc<HotkeyListener>,
    cues: Arc<Cues>,
    sample_rate: u32,
    max_capture: Option<Duration>,
}

impl PushToTalk {
    /// Create the capture engine, verifying the required capabilities.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if there is no input device or the hotkey
    /// listener is not running. These are fatal and checked here, before
    /// any recording is attempted.
    pub fn new(
        stt: Arc<dyn SttProvider>,
        hotkeys: Arc<HotkeyListener>,
        cues: Arc<Cues>,
        config: &VoiceConfig,
    ) -> Result<Self> {
        if !hotkeys.is_healthy() {
            return Err(Error::Config(
                "hotkey listener is not running; push-to-talk unavailable".to_string(),
            ));
        }

        let host = cpal::default_host();
        if host.default_input_device().is_none() {
            return Err(Error::Config(
                "no audio input device available; cannot record".to_string(),
            ));
        }

        Ok(Self {
            stt,
            hotkeys,
            cues,
            sample_rate: config.sample_rate,
            max_capture: config.max_capture,
        })
    }

    /// Capture one push-to-talk gesture and return the transcribed text.
    ///
    /// Blocks until the user completes or cancels the gesture. Returns an
    /// empty string for a cancelled gesture or one that captured no audio;
    /// in both cases the STT provider is not called.
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the microphone stream fails and
    /// `Error::Transcription` if the STT backend fails.
    pub async fn capture(&self) -> Result<String> {
        let events = self.hotkeys.subscribe();
        let cues = Arc::clone(&self.cues);
        let sample_rate = self.sample_rate;
        let max_capture = self.max_capture;

        let outcome = tokio::task::spawn_blocking(move || {
            record_gesture(events, &cues, sample_rate, max_capture)
        })
        .await
        .map_err(|e| Error::Audio(format!("capture task failed: {e}")))??;

        resolve_gesture(outcome, &self.stt, self.sample_rate).await
    }
}

/// Run one full gesture on the current (blocking) thread.
fn record_gesture(
    mut events: broadcast::Receiver<HotkeyEvent>,
    cues: &Cues,
    sample_rate: u32,
    max_capture: Option<Duration>,
) -> Result<GestureOutcome> {
    // IDLE -> ARMED: wait for the press, bailing out on cancel.
    if !wait_for_press(&mut events)? {
        tracing::debug!("capture cancelled before press");
        return Ok(GestureOutcome::Cancelled);
    }

    cues.play(Cue::Start);

    // ARMED -> RECORDING: frames flow from the cpal callback into the
    // channel; this thread only polls for release/cancel.
    let (frame_tx, frame_rx) = mpsc::channel::<Vec<f32>>();
    let stream = build_input_stream(sample_rate, frame_tx)?;
    stream
        .play()
        .map_err(|e| Error::Audio(e.to_string()))?;

    let outcome = run_gesture(&mut events, &frame_rx, max_capture, POLL_INTERVAL);

    drop(stream);
    cues.play(Cue::End);

    Ok(outcome)
}

/// Wait for the push-to-talk press. Returns `false` when cancelled first.
fn wait_for_press(events: &mut broadcast::Receiver<HotkeyEvent>) -> Result<bool> {
    loop {
        match events.blocking_recv() {
            Ok(HotkeyEvent::PttPressed) => return Ok(true),
            Ok(HotkeyEvent::Cancel) => return Ok(false),
            Ok(HotkeyEvent::PttReleased) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                return Err(Error::Hotkey("hotkey listener went away".to_string()));
            }
        }
    }
}

/// RECORDING -> {FINISHED, CANCELLED}: poll for release or cancel while the
/// audio callback keeps producing frames.
fn run_gesture(
    events: &mut broadcast::Receiver<HotkeyEvent>,
    frames: &mpsc::Receiver<Vec<f32>>,
    max_capture: Option<Duration>,
    poll: Duration,
) -> GestureOutcome {
    let started = Instant::now();
    let mut warned = false;

    loop {
        match events.try_recv() {
            Ok(HotkeyEvent::PttReleased) => break,
            Ok(HotkeyEvent::Cancel) => {
                tracing::debug!("capture cancelled, discarding partial audio");
                return GestureOutcome::Cancelled;
            }
            Ok(HotkeyEvent::PttPressed) => {}
            Err(broadcast::error::TryRecvError::Empty)
            | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(broadcast::error::TryRecvError::Closed) => break,
        }

        if let Some(max) = max_capture {
            if started.elapsed() >= max {
                tracing::warn!(?max, "capture duration bound reached, finishing gesture");
                break;
            }
        } else if !warned && started.elapsed() >= UNBOUNDED_WARN_AFTER {
            // Unbounded capture is a deliberate accessibility choice; still
            // worth a breadcrumb when it runs long.
            tracing::warn!("unbounded capture exceeded 60s; consider --max-capture-secs");
            warned = true;
        }

        std::thread::sleep(poll);
    }

    let samples: Vec<f32> = frames.try_iter().flatten().collect();
    tracing::debug!(samples = samples.len(), "gesture finished");
    GestureOutcome::Finished(samples)
}

/// Map a finished gesture to text, invoking STT only when audio exists.
pub(crate) async fn resolve_gesture(
    outcome: GestureOutcome,
    stt: &Arc<dyn SttProvider>,
    sample_rate: u32,
) -> Result<String> {
    match outcome {
        GestureOutcome::Cancelled => Ok(String::new()),
        GestureOutcome::Finished(samples) if samples.is_empty() => Ok(String::new()),
        GestureOutcome::Finished(samples) => {
            transcribe_samples(stt, &samples, sample_rate).await
        }
    }
}

/// Write samples to a temp WAV and transcribe it.
///
/// The temp file is removed when the guard drops, on success and failure.
async fn transcribe_samples(
    stt: &Arc<dyn SttProvider>,
    samples: &[f32],
    sample_rate: u32,
) -> Result<String> {
    let wav = samples_to_wav(samples, sample_rate)?;

    let file = tempfile::Builder::new()
        .prefix("aria_ptt_")
        .suffix(".wav")
        .tempfile()
        .map_err(|e| Error::Audio(e.to_string()))?;
    std::fs::write(file.path(), &wav)?;

    stt.transcribe(file.path()).await
}

/// Open a mono input stream at `sample_rate`, sending each callback buffer
/// into `frame_tx`.
fn build_input_stream(sample_rate: u32, frame_tx: mpsc::Sender<Vec<f32>>) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(sample_rate))
        .config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        "opening capture stream"
    );

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !data.is_empty() {
                    // Receiver gone means the gesture already ended.
                    let _ = frame_tx.send(data.to_vec());
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    Ok(stream)
}

/// Convert f32 samples to 16-bit WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
