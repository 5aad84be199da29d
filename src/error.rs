//! Error types for the aria agent

use thiserror::Error;

/// Result type alias for aria operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the aria agent
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing capability, unknown provider name).
    /// Fatal: surfaced at startup before any turn runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed conversation history passed to a provider.
    /// A caller bug; never retried internally.
    #[error("invalid turn input: {0}")]
    InvalidTurnInput(String),

    /// A pending safety check was not acknowledged; the turn is aborted.
    #[error("safety check rejected: {0}")]
    SafetyCheckRejected(String),

    /// Navigation landed on a blocklisted URL; the turn is aborted.
    #[error("blocked url: {0}")]
    BlockedUrl(String),

    /// Speech-to-text error
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Text-to-speech error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio playback error (surfaced only after every fallback failed)
    #[error("playback error: {0}")]
    Playback(String),

    /// Audio capture error
    #[error("audio error: {0}")]
    Audio(String),

    /// Hotkey listener error
    #[error("hotkey error: {0}")]
    Hotkey(String),

    /// Opaque automation engine failure
    #[error("engine error: {0}")]
    Engine(String),

    /// Agent provider error
    #[error("agent error: {0}")]
    Agent(String),

    /// Browser session error
    #[error("browser error: {0}")]
    Browser(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
