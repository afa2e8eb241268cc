//! Speech engine seam.
//!
//! The controller only needs "speak this text in this voice and tell me when
//! you are done". Engines report failure through the same completion path as
//! success.

use crate::error::SpeechError;
use crate::voice::Voice;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "http-tts")]
pub mod http;

#[cfg(feature = "http-tts")]
pub use http::HttpTtsEngine;

/// Turns an utterance into audible speech.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Resolves once the utterance has finished (or failed).
    async fn speak(&self, text: &str, voice: &Voice) -> Result<(), SpeechError>;

    /// Stop whatever is currently playing. Engines with no playback state can ignore it.
    fn cancel(&self) {}
}

/// Completes every utterance immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderSpeech;

#[async_trait]
impl SpeechEngine for PlaceholderSpeech {
    async fn speak(&self, text: &str, voice: &Voice) -> Result<(), SpeechError> {
        debug!(voice = %voice.name, chars = text.len(), "placeholder speech");
        Ok(())
    }
}

/// Simulates reading time at a fixed word rate. Useful headless.
#[derive(Debug, Clone)]
pub struct PacedSpeechEngine {
    words_per_second: f64,
    min_utterance: Duration,
}

impl PacedSpeechEngine {
    pub fn new(words_per_second: f64, min_utterance: Duration) -> Self {
        Self {
            words_per_second,
            min_utterance,
        }
    }

    /// Time the engine will take for `text`.
    pub fn duration_for(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as f64;
        let spoken = if self.words_per_second > 0.0 {
            // Saturates rather than panicking on absurd rates.
            Duration::try_from_secs_f64(words / self.words_per_second).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        spoken.max(self.min_utterance)
    }
}

impl Default for PacedSpeechEngine {
    fn default() -> Self {
        Self::new(2.5, Duration::from_millis(500))
    }
}

#[async_trait]
impl SpeechEngine for PacedSpeechEngine {
    async fn speak(&self, text: &str, voice: &Voice) -> Result<(), SpeechError> {
        let duration = self.duration_for(text);
        debug!(voice = %voice.name, ?duration, "paced speech");
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
