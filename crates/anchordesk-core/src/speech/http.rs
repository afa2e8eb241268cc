//! OpenAI-compatible `/audio/speech` synthesis played on the default output device.

use super::SpeechEngine;
use crate::error::SpeechError;
use crate::voice::Voice;
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Synthesizes over HTTP, then plays through a `rodio::Sink` until the clip ends.
pub struct HttpTtsEngine {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    base_url: String,
    api_key: String,
    /// tts-1 or tts-1-hd.
    model: String,
    client: reqwest::Client,
    playing: Arc<Mutex<PlaybackSlot>>,
}

/// The sink on air plus a cancel counter. An utterance only plays while the
/// counter still matches the value it started under.
#[derive(Default)]
struct PlaybackSlot {
    generation: u64,
    sink: Option<Arc<Sink>>,
}

impl PlaybackSlot {
    /// Take the slot for `sink`. Fails if a cancel arrived since `generation`.
    fn claim(&mut self, generation: u64, sink: &Arc<Sink>) -> bool {
        if self.generation != generation {
            return false;
        }
        self.sink = Some(Arc::clone(sink));
        true
    }

    /// Clear the slot if `sink` still owns it.
    fn release(&mut self, sink: &Arc<Sink>) {
        if self.sink.as_ref().is_some_and(|s| Arc::ptr_eq(s, sink)) {
            self.sink = None;
        }
    }

    fn cancel(&mut self) -> Option<Arc<Sink>> {
        self.generation = self.generation.wrapping_add(1);
        self.sink.take()
    }
}

fn lock_slot(playing: &Mutex<PlaybackSlot>) -> Result<MutexGuard<'_, PlaybackSlot>, SpeechError> {
    playing
        .lock()
        .map_err(|e| SpeechError::Playback(format!("playback slot poisoned: {}", e)))
}

impl HttpTtsEngine {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SpeechError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
            playing: Arc::new(Mutex::new(PlaybackSlot::default())),
        })
    }

    fn generation(&self) -> Result<u64, SpeechError> {
        Ok(lock_slot(&self.playing)?.generation)
    }

    async fn synthesize(&self, text: &str, voice: &Voice) -> Result<Vec<u8>, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice.name,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SpeechError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| SpeechError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechEngine for HttpTtsEngine {
    async fn speak(&self, text: &str, voice: &Voice) -> Result<(), SpeechError> {
        let generation = self.generation()?;
        let bytes = self.synthesize(text, voice).await?;
        if bytes.is_empty() {
            return Ok(());
        }
        if self.generation()? != generation {
            debug!("HttpTtsEngine: cancelled during synthesis");
            return Err(SpeechError::Cancelled);
        }
        let playing = Arc::clone(&self.playing);
        tokio::task::spawn_blocking(move || play_to_end(bytes, &playing, generation))
            .await
            .map_err(|e| SpeechError::Playback(e.to_string()))?
    }

    fn cancel(&self) {
        let sink = match self.playing.lock() {
            Ok(mut slot) => slot.cancel(),
            Err(e) => {
                warn!(error = %e, "HttpTtsEngine: playback slot poisoned");
                None
            }
        };
        if let Some(sink) = sink {
            sink.stop();
            info!("HttpTtsEngine: playback stopped");
        }
    }
}

// OutputStream is not Send, so it lives and dies on the blocking thread.
fn play_to_end(
    bytes: Vec<u8>,
    playing: &Mutex<PlaybackSlot>,
    generation: u64,
) -> Result<(), SpeechError> {
    let (_stream, handle) =
        OutputStream::try_default().map_err(|e| SpeechError::Playback(e.to_string()))?;
    let sink = Arc::new(Sink::try_new(&handle).map_err(|e| SpeechError::Playback(e.to_string()))?);
    let source = Decoder::new(Cursor::new(bytes))
        .map_err(|e| SpeechError::Playback(format!("Decode failed: {}", e)))?;

    if !lock_slot(playing)?.claim(generation, &sink) {
        return Err(SpeechError::Cancelled);
    }
    sink.append(source.convert_samples::<f32>());

    // `append` clears a stop that landed between claim and append.
    let cancelled = lock_slot(playing)?.generation != generation;
    if !cancelled {
        sink.sleep_until_end();
        debug!("HttpTtsEngine: clip finished");
    }
    sink.stop();

    let mut slot = lock_slot(playing)?;
    slot.release(&sink);
    if slot.generation != generation {
        return Err(SpeechError::Cancelled);
    }
    Ok(())
}
