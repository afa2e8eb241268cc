//! Presenter configuration.
//!
//! Precedence: env `ANCHORDESK_CONFIG` path (default `config/presenter`, extension
//! optional) > built-in defaults, then `ANCHORDESK__*` environment overrides on top
//! (e.g. `ANCHORDESK__SPEECH__ENGINE=http`, `ANCHORDESK__RETRY_TICK_MS=250`).

use crate::backchannel::BackchannelConfig;
use crate::controller::{ControllerConfig, NoVoicePolicy};
use crate::error::{DeskError, DeskResult};
use crate::speech::{PacedSpeechEngine, PlaceholderSpeech, SpeechEngine};
use crate::voice::{StaticVoiceCatalog, Voice};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "ANCHORDESK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/presenter";

/// Longest allowed hold re-check interval.
pub const MAX_RETRY_TICK_MS: u64 = 500;

/// Slowest paced speech rate accepted.
pub const MIN_WORDS_PER_SECOND: f64 = 0.1;

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_retry_tick_ms() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_words_per_second() -> f64 {
    2.5
}

fn default_min_utterance_ms() -> u64 {
    500
}

fn default_tts_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

/// Which [`SpeechEngine`] the host wires up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Wait out the estimated reading time. No audio.
    #[default]
    Paced,
    /// Complete instantly.
    Placeholder,
    /// OpenAI-compatible TTS with local playback (`http-tts` feature).
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub engine: EngineKind,
    /// Reading rate for the paced engine.
    #[serde(default = "default_words_per_second")]
    pub words_per_second: f64,
    #[serde(default = "default_min_utterance_ms")]
    pub min_utterance_ms: u64,
    #[serde(default = "default_tts_api_url")]
    pub tts_api_url: String,
    #[serde(default)]
    pub tts_api_key: Option<String>,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            words_per_second: default_words_per_second(),
            min_utterance_ms: default_min_utterance_ms(),
            tts_api_url: default_tts_api_url(),
            tts_api_key: None,
            tts_model: default_tts_model(),
        }
    }
}

impl SpeechConfig {
    pub fn build_engine(&self) -> DeskResult<Arc<dyn SpeechEngine>> {
        match self.engine {
            EngineKind::Paced => Ok(Arc::new(PacedSpeechEngine::new(
                self.words_per_second,
                Duration::from_millis(self.min_utterance_ms),
            ))),
            EngineKind::Placeholder => Ok(Arc::new(PlaceholderSpeech)),
            EngineKind::Http => self.build_http_engine(),
        }
    }

    #[cfg(feature = "http-tts")]
    fn build_http_engine(&self) -> DeskResult<Arc<dyn SpeechEngine>> {
        let api_key = self
            .tts_api_key
            .clone()
            .ok_or_else(|| DeskError::Config("http engine requires speech.tts_api_key".to_string()))?;
        let engine =
            crate::speech::HttpTtsEngine::new(&self.tts_api_url, api_key, &self.tts_model)?;
        Ok(Arc::new(engine))
    }

    #[cfg(not(feature = "http-tts"))]
    fn build_http_engine(&self) -> DeskResult<Arc<dyn SpeechEngine>> {
        Err(DeskError::Config(
            "http engine requires the http-tts feature".to_string(),
        ))
    }
}

/// Top-level presenter configuration. Load from TOML or env.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenterConfig {
    /// Listen address for the host binary.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub backchannel: BackchannelConfig,
    #[serde(default = "default_retry_tick_ms")]
    pub retry_tick_ms: u64,
    #[serde(default)]
    pub no_voice_policy: NoVoicePolicy,
    #[serde(default = "default_true")]
    pub cancel_speech_on_interrupt: bool,
    /// Initial static voice catalog. May be empty; voices can be posted later.
    #[serde(default)]
    pub voices: Vec<Voice>,
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            backchannel: BackchannelConfig::default(),
            retry_tick_ms: default_retry_tick_ms(),
            no_voice_policy: NoVoicePolicy::default(),
            cancel_speech_on_interrupt: true,
            voices: Vec::new(),
            speech: SpeechConfig::default(),
        }
    }
}

impl PresenterConfig {
    /// Load from the file named by `ANCHORDESK_CONFIG` (or the default path) and the environment.
    pub fn load() -> DeskResult<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// A missing file is not an error; defaults apply.
    pub fn load_from(path: &str) -> DeskResult<Self> {
        let built = config::Config::builder()
            .set_default("bind_addr", default_bind_addr())?
            .set_default("retry_tick_ms", default_retry_tick_ms() as i64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ANCHORDESK").separator("__"))
            .build()?;

        Ok(built.try_deserialize()?)
    }

    pub fn validate(&self) -> DeskResult<()> {
        if self.retry_tick_ms == 0 || self.retry_tick_ms > MAX_RETRY_TICK_MS {
            return Err(DeskError::Config(format!(
                "retry_tick_ms must be between 1 and {}, got {}",
                MAX_RETRY_TICK_MS, self.retry_tick_ms
            )));
        }
        let wps = self.speech.words_per_second;
        if !wps.is_finite() || wps < MIN_WORDS_PER_SECOND {
            return Err(DeskError::Config(format!(
                "speech.words_per_second must be finite and at least {}, got {}",
                MIN_WORDS_PER_SECOND, wps
            )));
        }
        if self.speech.engine == EngineKind::Http && self.speech.tts_api_key.is_none() {
            return Err(DeskError::Config(
                "http engine requires speech.tts_api_key".to_string(),
            ));
        }
        Ok(())
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            backchannel: self.backchannel.clone(),
            retry_tick: Duration::from_millis(self.retry_tick_ms),
            no_voice_policy: self.no_voice_policy,
            cancel_speech_on_interrupt: self.cancel_speech_on_interrupt,
        }
    }

    pub fn voice_catalog(&self) -> StaticVoiceCatalog {
        StaticVoiceCatalog::new(self.voices.clone())
    }
}
