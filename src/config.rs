//! Configuration for the aria agent
//!
//! Assembled from CLI flags and `ARIA_*` environment variables. There is no
//! config file; everything the agent needs fits in a handful of knobs.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Environment variable selecting the STT provider ("openai" or "system")
pub const ENV_STT_PROVIDER: &str = "ARIA_STT_PROVIDER";
/// Environment variable selecting the TTS provider ("openai" or "system")
pub const ENV_TTS_PROVIDER: &str = "ARIA_TTS_PROVIDER";

/// Top-level agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Agent provider name ("browser" or "computer")
    pub agent_provider: String,

    /// URL opened once on the first turn (browser-capable providers)
    pub start_url: Option<String>,

    /// Propagate turn errors instead of narrating and continuing
    pub debug: bool,

    /// Voice I/O configuration
    pub voice: VoiceConfig,

    /// Speech provider configuration
    pub speech: SpeechConfig,

    /// Browser session configuration
    pub browser: BrowserConfig,

    /// Hostnames that fail a turn when navigated to
    pub url_blocklist: Vec<String>,
}

/// Voice capture/playback configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable push-to-talk input and spoken narration
    pub enabled: bool,

    /// Capture sample rate in Hz (16 kHz is what speech models expect)
    pub sample_rate: u32,

    /// Maximum push-to-talk recording duration. `None` means unbounded:
    /// the accessibility default is to never cut a user off mid-sentence.
    pub max_capture: Option<Duration>,

    /// Cache synthesized narration by content hash
    pub cache_narration: bool,

    /// Directory for cached narration audio
    pub cache_dir: PathBuf,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_rate: 16_000,
            max_capture: None,
            cache_narration: true,
            cache_dir: default_cache_dir(),
        }
    }
}

/// Speech provider selection and model settings
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// STT provider name ("openai" or "system")
    pub stt_provider: String,

    /// TTS provider name ("openai" or "system")
    pub tts_provider: String,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f32,

    /// OpenAI API key (required for the "openai" providers)
    pub openai_api_key: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_provider: "openai".to_string(),
            tts_provider: "openai".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            openai_api_key: None,
        }
    }
}

/// Browser session configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium executable
    pub chrome_path: Option<PathBuf>,
    /// Run in headless mode
    pub headless: bool,
    /// Window width
    pub width: u32,
    /// Window height
    pub height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: false,
            width: 1280,
            height: 720,
        }
    }
}

impl Config {
    /// Build a configuration from already-parsed CLI values plus the
    /// `ARIA_*` environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a value fails validation.
    pub fn resolve(
        agent_provider: &str,
        start_url: Option<String>,
        voice: bool,
        debug: bool,
        max_capture_secs: Option<u64>,
        no_cache: bool,
    ) -> Result<Self> {
        let speech = SpeechConfig {
            stt_provider: env_or(ENV_STT_PROVIDER, "openai"),
            tts_provider: env_or(ENV_TTS_PROVIDER, "openai"),
            stt_model: env_or("ARIA_STT_MODEL", "whisper-1"),
            tts_model: env_or("ARIA_TTS_MODEL", "tts-1"),
            tts_voice: env_or("ARIA_TTS_VOICE", "alloy"),
            tts_speed: 1.0,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
        };

        if let Some(0) = max_capture_secs {
            return Err(Error::Config(
                "--max-capture-secs must be greater than zero".to_string(),
            ));
        }

        let voice_config = VoiceConfig {
            enabled: voice,
            max_capture: max_capture_secs.map(Duration::from_secs),
            cache_narration: !no_cache,
            ..VoiceConfig::default()
        };

        let browser = BrowserConfig {
            chrome_path: std::env::var("ARIA_CHROME_PATH").ok().map(PathBuf::from),
            ..BrowserConfig::default()
        };

        let url_blocklist = std::env::var("ARIA_URL_BLOCKLIST")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            agent_provider: agent_provider.to_string(),
            start_url: start_url.filter(|u| !u.is_empty()),
            debug,
            voice: voice_config,
            speech,
            browser,
            url_blocklist,
        })
    }
}

/// Read an env var with a default fallback
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Cache directory for synthesized narration, under the platform cache root
fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "aria", "aria-agent")
        .map(|dirs| dirs.cache_dir().join("tts"))
        .unwrap_or_else(|| std::env::temp_dir().join("aria-tts-cache"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults() {
        let config = Config::resolve("browser", None, false, false, None, false).unwrap();
        assert_eq!(config.agent_provider, "browser");
        assert!(config.start_url.is_none());
        assert!(!config.voice.enabled);
        assert!(config.voice.max_capture.is_none());
        assert!(config.voice.cache_narration);
    }

    #[test]
    fn resolve_rejects_zero_capture_bound() {
        let err = Config::resolve("browser", None, true, false, Some(0), false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_start_url_is_none() {
        let config =
            Config::resolve("browser", Some(String::new()), false, false, None, false).unwrap();
        assert!(config.start_url.is_none());
    }
}
