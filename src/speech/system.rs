//! Offline speech backends using system binaries
//!
//! These exist so the agent keeps working without network access or an API
//! key. Quality is what the OS gives us; the point is availability.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{SttProvider, TtsProvider};
use crate::{Error, Result};

/// Offline speech-to-text using `pocketsphinx_continuous`
pub struct SystemStt {
    binary: PathBuf,
}

impl SystemStt {
    /// Probe for an offline recognizer on PATH.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no recognizer binary is installed.
    pub fn new() -> Result<Self> {
        let binary = which::which("pocketsphinx_continuous").map_err(|_| {
            Error::Config(
                "no offline recognizer found; install pocketsphinx or use ARIA_STT_PROVIDER=openai"
                    .to_string(),
            )
        })?;
        Ok(Self { binary })
    }
}

#[async_trait]
impl SttProvider for SystemStt {
    async fn transcribe(&self, path: &Path) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("-infile")
            .arg(path)
            .arg("-logfn")
            .arg("/dev/null")
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Transcription(format!("recognizer failed to run: {e}")))?;

        if !output.status.success() {
            return Err(Error::Transcription(format!(
                "recognizer exited with {}",
                output.status
            )));
        }

        // No recognized speech legitimately yields empty output here.
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// TTS backend command available on this system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SystemTtsBackend {
    /// macOS `say`
    Say,
    /// Linux `pico2wave`
    Pico2Wave,
    /// Linux `espeak`
    Espeak,
}

/// Offline text-to-speech using built-in OS capabilities
pub struct SystemTts {
    backend: SystemTtsBackend,
}

impl SystemTts {
    /// Probe for a system synthesizer, preferring the better-sounding ones.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no synthesizer binary is installed.
    pub fn new() -> Result<Self> {
        let backend = if which::which("say").is_ok() {
            SystemTtsBackend::Say
        } else if which::which("pico2wave").is_ok() {
            SystemTtsBackend::Pico2Wave
        } else if which::which("espeak").is_ok() {
            SystemTtsBackend::Espeak
        } else {
            return Err(Error::Config(
                "no system TTS found (tried say, pico2wave, espeak); \
                 use ARIA_TTS_PROVIDER=openai"
                    .to_string(),
            ));
        };

        tracing::debug!(?backend, "system TTS backend selected");
        Ok(Self { backend })
    }
}

#[async_trait]
impl TtsProvider for SystemTts {
    async fn synthesize(&self, text: &str, output_path: Option<&Path>) -> Result<PathBuf> {
        let path = match output_path {
            Some(p) => {
                if let Some(parent) = p.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                p.to_path_buf()
            }
            None => {
                let file = tempfile::Builder::new()
                    .prefix("aria_sys_tts_")
                    .suffix(self.file_extension())
                    .tempfile()
                    .map_err(|e| Error::Synthesis(e.to_string()))?;
                file.into_temp_path()
                    .keep()
                    .map_err(|e| Error::Synthesis(e.to_string()))?
            }
        };

        let mut cmd = match self.backend {
            SystemTtsBackend::Say => {
                let mut c = Command::new("say");
                c.arg("-o").arg(&path).arg(text);
                c
            }
            SystemTtsBackend::Pico2Wave => {
                let mut c = Command::new("pico2wave");
                c.arg("-w").arg(&path).arg(text);
                c
            }
            SystemTtsBackend::Espeak => {
                let mut c = Command::new("espeak");
                c.arg("-w").arg(&path).arg(text);
                c
            }
        };

        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Synthesis(format!("system TTS failed to run: {e}")))?;

        if !status.success() {
            return Err(Error::Synthesis(format!(
                "system TTS exited with {status}"
            )));
        }

        Ok(path)
    }

    fn file_extension(&self) -> &'static str {
        match self.backend {
            SystemTtsBackend::Say => ".aiff",
            SystemTtsBackend::Pico2Wave | SystemTtsBackend::Espeak => ".wav",
        }
    }
}
