//! OpenAI speech backends (Whisper STT, TTS)

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{SttProvider, TtsProvider};
use crate::{Error, Result};

/// Response from the OpenAI transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Speech-to-text via the OpenAI Whisper API
pub struct OpenAiStt {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiStt {
    /// Create a new Whisper transcriber
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl SttProvider for OpenAiStt {
    async fn transcribe(&self, path: &Path) -> Result<String> {
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Transcription(format!("unreadable audio file: {e}")))?;

        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Transcription(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transcription(format!("Whisper request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Transcription(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("bad Whisper response: {e}")))?;

        let text = result.text.trim().to_string();
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

/// Text-to-speech via the OpenAI audio API
pub struct OpenAiTts {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    speed: f32,
}

impl OpenAiTts {
    /// Create a new OpenAI synthesizer
    #[must_use]
    pub fn new(api_key: String, model: String, voice: String, speed: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            voice,
            speed,
        }
    }
}

#[async_trait]
impl TtsProvider for OpenAiTts {
    async fn synthesize(&self, text: &str, output_path: Option<&Path>) -> Result<PathBuf> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("TTS request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        let path = match output_path {
            Some(p) => {
                if let Some(parent) = p.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                p.to_path_buf()
            }
            None => {
                let file = tempfile::Builder::new()
                    .prefix("aria_tts_")
                    .suffix(self.file_extension())
                    .tempfile()
                    .map_err(|e| Error::Synthesis(e.to_string()))?;
                // The caller owns cleanup of provider-created temp files.
                file.into_temp_path().keep().map_err(|e| Error::Synthesis(e.to_string()))?
            }
        };

        tokio::fs::write(&path, &audio).await?;
        tracing::debug!(bytes = audio.len(), path = %path.display(), "synthesis complete");
        Ok(path)
    }

    fn file_extension(&self) -> &'static str {
        ".mp3"
    }
}
