//! Global hotkey listener for push-to-talk and playback interruption
//!
//! Captures keyboard events system-wide using `rdev` on a dedicated OS
//! thread and broadcasts them to any number of subscribers (the capture
//! gesture loop, the playback interrupter). The listener thread is spawned
//! once per process; `rdev` only supports a single listener.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rdev::{Event, EventType, Key, listen};
use tokio::sync::broadcast;

use crate::{Error, Result};

/// Events emitted by the hotkey listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Push-to-talk key pressed down (arm and start recording)
    PttPressed,
    /// Push-to-talk key released (finish recording)
    PttReleased,
    /// Cancel key pressed (abort capture or interrupt playback)
    Cancel,
}

/// Global hotkey listener handle.
///
/// Space is the push-to-talk key, Escape the cancel key. Subscribers get
/// every event; a slow subscriber may observe `Lagged` and should resync.
pub struct HotkeyListener {
    tx: broadcast::Sender<HotkeyEvent>,
    failed: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Spawn the listener thread.
    ///
    /// # Errors
    ///
    /// Returns `Error::Hotkey` if the OS thread cannot be spawned. A later
    /// failure of the OS hook itself is reported through [`Self::is_healthy`].
    pub fn spawn() -> Result<Self> {
        let (tx, _) = broadcast::channel(64);
        let failed = Arc::new(AtomicBool::new(false));

        let thread_tx = tx.clone();
        let thread_failed = Arc::clone(&failed);

        std::thread::Builder::new()
            .name("aria-hotkeys".to_string())
            .spawn(move || {
                // Debounce OS key-repeat: only the first press of a held key
                // is forwarded, and a release resets the state.
                let ptt_down = AtomicBool::new(false);

                let callback = move |event: Event| {
                    let forwarded = match event.event_type {
                        EventType::KeyPress(Key::Space) => {
                            if ptt_down.swap(true, Ordering::SeqCst) {
                                None
                            } else {
                                Some(HotkeyEvent::PttPressed)
                            }
                        }
                        EventType::KeyRelease(Key::Space) => {
                            if ptt_down.swap(false, Ordering::SeqCst) {
                                Some(HotkeyEvent::PttReleased)
                            } else {
                                None
                            }
                        }
                        EventType::KeyPress(Key::Escape) => Some(HotkeyEvent::Cancel),
                        _ => None,
                    };

                    if let Some(ev) = forwarded {
                        // Send fails only when nobody is subscribed.
                        let _ = thread_tx.send(ev);
                    }
                };

                if let Err(e) = listen(callback) {
                    tracing::error!(?e, "hotkey listener stopped");
                    thread_failed.store(true, Ordering::SeqCst);
                }
            })
            .map_err(|e| Error::Hotkey(format!("failed to spawn listener thread: {e}")))?;

        tracing::debug!("hotkey listener started (space = talk, escape = cancel)");
        Ok(Self { tx, failed })
    }

    /// Subscribe to hotkey events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HotkeyEvent> {
        self.tx.subscribe()
    }

    /// Whether the OS hook is still running
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.failed.load(Ordering::SeqCst)
    }
}
