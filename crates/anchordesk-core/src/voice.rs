//! Synthesis voices: the catalog seam and accent-based resolution.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A synthesis voice as enumerated by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Backend voice identifier passed to the speech engine.
    pub name: String,
    /// Locale tag (e.g. en-US).
    #[serde(default)]
    pub locale: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
        }
    }
}

/// Source of available voices. The list may be empty or change over time.
pub trait VoiceCatalog: Send + Sync {
    /// Snapshot of the voices available right now.
    fn voices(&self) -> Vec<Voice>;

    /// Change notifications, when the catalog can change after start-up.
    fn changes(&self) -> Option<watch::Receiver<Vec<Voice>>> {
        None
    }
}

/// First voice whose locale contains `accent` (case-insensitive), else the first voice.
///
/// `None` only when no voices are available at all.
pub fn resolve_voice<'a>(accent: &str, voices: &'a [Voice]) -> Option<&'a Voice> {
    let accent = accent.trim().to_lowercase();
    voices
        .iter()
        .find(|v| v.locale.to_lowercase().contains(&accent))
        .or_else(|| voices.first())
}

/// Catalog backed by a watch channel so voices can be replaced at runtime.
#[derive(Debug)]
pub struct StaticVoiceCatalog {
    tx: watch::Sender<Vec<Voice>>,
}

impl StaticVoiceCatalog {
    pub fn new(voices: Vec<Voice>) -> Self {
        let (tx, _rx) = watch::channel(voices);
        Self { tx }
    }

    /// Replace the whole list and notify subscribers.
    pub fn replace(&self, voices: Vec<Voice>) {
        self.tx.send_replace(voices);
    }
}

impl Default for StaticVoiceCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl VoiceCatalog for StaticVoiceCatalog {
    fn voices(&self) -> Vec<Voice> {
        self.tx.borrow().clone()
    }

    fn changes(&self) -> Option<watch::Receiver<Vec<Voice>>> {
        Some(self.tx.subscribe())
    }
}
