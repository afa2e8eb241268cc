//! Single-slot video override.

use tracing::debug;

/// Holds at most one active video reference. Last write wins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InterruptChannel {
    active: Option<String>,
}

impl InterruptChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot. A previous clip is dropped, not queued.
    pub fn push(&mut self, url: impl Into<String>) {
        let url = url.into();
        if let Some(previous) = self.active.replace(url) {
            debug!(dropped = %previous, "video override replaced");
        }
    }

    /// Empty the slot. Returns the clip that was active.
    pub fn clear(&mut self) -> Option<String> {
        self.active.take()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}
