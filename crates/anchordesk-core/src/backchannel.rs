//! Backchannel hold: keep short interjections from flipping the on-air anchor
//! too soon after the previous switch.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interjections treated as low-content regardless of token count.
pub const DEFAULT_SHORT_PHRASES: &[&str] = &["yes", "ok", "okay", "i understand"];

fn default_hold_window_ms() -> u64 {
    2000
}

fn default_max_short_tokens() -> usize {
    2
}

fn default_short_phrases() -> Vec<String> {
    DEFAULT_SHORT_PHRASES.iter().map(|s| s.to_string()).collect()
}

/// Tuning for the hold decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackchannelConfig {
    /// Minimum gap since the last switch before a short segment may start (default 2000ms).
    #[serde(default = "default_hold_window_ms")]
    pub hold_window_ms: u64,
    /// Utterances with at most this many whitespace tokens are short (default 2).
    #[serde(default = "default_max_short_tokens")]
    pub max_short_tokens: usize,
    /// Phrases that are always short, compared case-insensitively.
    #[serde(default = "default_short_phrases")]
    pub short_phrases: Vec<String>,
}

impl Default for BackchannelConfig {
    fn default() -> Self {
        Self {
            hold_window_ms: default_hold_window_ms(),
            max_short_tokens: default_max_short_tokens(),
            short_phrases: default_short_phrases(),
        }
    }
}

/// Outcome for the segment at the queue head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Leave it at the head and look again after the retry tick.
    Hold,
    /// Start it now.
    Release,
}

/// Pure decision over `(elapsed since last switch, segment text)`.
#[derive(Debug, Clone)]
pub struct BackchannelFilter {
    hold_window: Duration,
    max_short_tokens: usize,
    short_phrases: Vec<String>,
}

impl BackchannelFilter {
    pub fn new(config: &BackchannelConfig) -> Self {
        Self {
            hold_window: Duration::from_millis(config.hold_window_ms),
            max_short_tokens: config.max_short_tokens,
            short_phrases: config
                .short_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn hold_window(&self) -> Duration {
        self.hold_window
    }

    pub fn is_short(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.split_whitespace().count() <= self.max_short_tokens {
            return true;
        }
        let lowered = trimmed.to_lowercase();
        self.short_phrases.iter().any(|p| *p == lowered)
    }

    /// `elapsed` is `None` before the first switch of the session.
    pub fn decide(&self, elapsed: Option<Duration>, text: &str) -> Verdict {
        match elapsed {
            Some(elapsed) if elapsed < self.hold_window && self.is_short(text) => Verdict::Hold,
            _ => Verdict::Release,
        }
    }
}

impl Default for BackchannelFilter {
    fn default() -> Self {
        Self::new(&BackchannelConfig::default())
    }
}
