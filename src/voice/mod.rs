//! Voice I/O: push-to-talk capture, interruptible playback, narration
//!
//! Speech backends themselves live in `crate::speech`; this module owns the
//! concurrency-heavy plumbing around them.

mod capture;
mod hotkey;
mod narrator;
mod playback;

pub use capture::{PushToTalk, samples_to_wav};
pub use hotkey::{HotkeyEvent, HotkeyListener};
pub use narrator::{CACHE_KEY_LEN, Narrator, cache_key};
pub use playback::{Cue, Cues, PlaySink, PlaybackOutcome, Player, PlayerBackend, detect_backend};
