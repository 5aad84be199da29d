//! Spoken narration with a content-addressed TTS cache
//!
//! Frequently repeated prompts ("Waiting for input...") are synthesized
//! once and replayed from disk. Cache entries are keyed by a truncated
//! SHA-256 of the text and are never pruned within or across runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::playback::PlaySink;
use crate::Result;
use crate::speech::TtsProvider;

/// Hex characters of SHA-256 kept in a cache key.
///
/// Truncation means distinct texts can collide in principle. At 128 bits
/// the chance is negligible for this workload, but it is a real risk we
/// accept rather than resolve.
pub const CACHE_KEY_LEN: usize = 32;

/// Derive the cache key for a narration text
#[must_use]
pub fn cache_key(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(CACHE_KEY_LEN);
    key
}

/// Speaks text to the user, caching synthesized audio on request
pub struct Narrator {
    tts: Arc<dyn TtsProvider>,
    sink: Arc<dyn PlaySink>,
    cache_dir: PathBuf,
    cache_enabled: bool,
}

impl Narrator {
    /// Create a narrator writing cached clips under `cache_dir`.
    ///
    /// With `cache_enabled` false (`--no-cache`), every clip is treated as
    /// uncached regardless of what callers request.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new(
        tts: Arc<dyn TtsProvider>,
        sink: Arc<dyn PlaySink>,
        cache_dir: &Path,
        cache_enabled: bool,
    ) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        Ok(Self {
            tts,
            sink,
            cache_dir: cache_dir.to_path_buf(),
            cache_enabled,
        })
    }

    /// Speak `text`, synthesizing it unless a cached clip exists.
    ///
    /// Whitespace-only text is a no-op. With `cache` the synthesized file
    /// is kept for future calls; without it, the throwaway file is removed
    /// whether playback succeeds or not.
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` or `Error::Playback` on failure; the
    /// caller (the conversation loop) reports and continues.
    pub async fn speak(&self, text: &str, cache: bool) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if cache && self.cache_enabled {
            let path = self.cache_path(text);
            if path.exists() {
                tracing::debug!(path = %path.display(), "narration cache hit");
            } else {
                // Write-then-rename keeps concurrent readers from ever
                // seeing a half-written clip.
                let partial = self.cache_dir.join(format!(".{}.part", cache_key(text)));
                self.tts.synthesize(text, Some(&partial)).await?;
                tokio::fs::rename(&partial, &path).await?;
                tracing::debug!(path = %path.display(), "narration cached");
            }
            self.sink.play(&path).await?;
            return Ok(());
        }

        let path = self.tts.synthesize(text, None).await?;
        let played = self.sink.play(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!(path = %path.display(), error = %e, "temp clip cleanup failed");
        }
        played.map(|_| ())
    }

    /// Deterministic cache path for `text`, suffixed with the TTS
    /// provider's native extension.
    #[must_use]
    pub fn cache_path(&self, text: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}{}", cache_key(text), self.tts.file_extension()))
    }
}
