//! Speech provider abstraction
//!
//! `SttProvider` and `TtsProvider` are the seams between the voice engine
//! and the actual speech backends (cloud API or offline system binaries).
//! Instances are constructed here and injected explicitly; nothing registers
//! itself globally.

mod openai;
mod system;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

pub use openai::{OpenAiStt, OpenAiTts};
pub use system::{SystemStt, SystemTts};

use crate::config::SpeechConfig;
use crate::{Error, Result};

/// Transcribes a recorded audio file to text
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Transcribe the audio file at `path`.
    ///
    /// Returns an empty string only when no speech was detected; backend
    /// failures and unreadable files are errors, never silently empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transcription` on backend failure.
    async fn transcribe(&self, path: &Path) -> Result<String>;
}

/// Synthesizes speech audio from text
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Synthesize `text` into an audio file.
    ///
    /// Writes to `output_path` when given; otherwise the provider creates
    /// its own temporary file. Returns the path of the generated audio.
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` on backend failure.
    async fn synthesize(&self, text: &str, output_path: Option<&Path>) -> Result<PathBuf>;

    /// Native file extension (including the leading dot) of this provider's
    /// output, used to suffix cache keys correctly.
    fn file_extension(&self) -> &'static str;
}

/// Construct the configured STT provider.
///
/// # Errors
///
/// Returns `Error::Config` for an unknown provider name or a missing API key.
pub fn stt_provider(config: &SpeechConfig) -> Result<Arc<dyn SttProvider>> {
    match normalize(&config.stt_provider).as_str() {
        "openai" | "whisper" => Ok(Arc::new(OpenAiStt::new(
            require_openai_key(config)?,
            config.stt_model.clone(),
        ))),
        "system" | "offline" => Ok(Arc::new(SystemStt::new()?)),
        other => Err(Error::Config(format!(
            "unknown {}: {other}",
            crate::config::ENV_STT_PROVIDER
        ))),
    }
}

/// Construct the configured TTS provider.
///
/// # Errors
///
/// Returns `Error::Config` for an unknown provider name or a missing API key.
pub fn tts_provider(config: &SpeechConfig) -> Result<Arc<dyn TtsProvider>> {
    match normalize(&config.tts_provider).as_str() {
        "openai" => Ok(Arc::new(OpenAiTts::new(
            require_openai_key(config)?,
            config.tts_model.clone(),
            config.tts_voice.clone(),
            config.tts_speed,
        ))),
        "system" | "offline" => Ok(Arc::new(SystemTts::new()?)),
        other => Err(Error::Config(format!(
            "unknown {}: {other}",
            crate::config::ENV_TTS_PROVIDER
        ))),
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

fn require_openai_key(config: &SpeechConfig) -> Result<String> {
    config.openai_api_key.clone().ok_or_else(|| {
        Error::Config("OPENAI_API_KEY is required for the openai speech provider".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stt_provider_is_config_error() {
        let config = SpeechConfig {
            stt_provider: "parrot".to_string(),
            ..SpeechConfig::default()
        };
        assert!(matches!(stt_provider(&config), Err(Error::Config(_))));
    }

    #[test]
    fn openai_provider_requires_key() {
        let config = SpeechConfig::default();
        assert!(config.openai_api_key.is_none());
        assert!(matches!(tts_provider(&config), Err(Error::Config(_))));
    }

    #[test]
    fn provider_names_are_normalized() {
        let config = SpeechConfig {
            stt_provider: " OpenAI ".to_string(),
            openai_api_key: Some("sk-test".to_string()),
            ..SpeechConfig::default()
        };
        assert!(stt_provider(&config).is_ok());
    }
}
