//! Rundown segments and the FIFO queue the controller drains.

use crate::error::{IngressError, QueueError};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// One of the two fixed anchor roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    A,
    B,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::A => "A",
            Speaker::B => "B",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of spoken content. Immutable once constructed.
///
/// Wire shape: `{ id, speaker: "A"|"B", text, est_seconds, video_url? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    id: String,
    speaker: Speaker,
    text: String,
    /// Informational only; completion is signalled by the speech engine.
    #[serde(default)]
    est_seconds: f64,
    /// Attached motion media. Preserved, not used by playback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
}

impl Segment {
    /// Build a segment with an estimated duration derived from its word count.
    pub fn new(id: impl Into<String>, speaker: Speaker, text: impl Into<String>) -> Self {
        let text = text.into();
        let est_seconds = Self::estimate_seconds(&text);
        Self {
            id: id.into(),
            speaker,
            text,
            est_seconds,
            video_url: None,
        }
    }

    pub fn with_est_seconds(mut self, est_seconds: f64) -> Self {
        self.est_seconds = est_seconds;
        self
    }

    pub fn with_video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    /// Rough speaking time at 2.5 words per second, clamped to 2..=10 seconds.
    pub fn estimate_seconds(text: &str) -> f64 {
        let words = text.split_whitespace().count() as f64;
        (words / 2.5).clamp(2.0, 10.0)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn est_seconds(&self) -> f64 {
        self.est_seconds
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    /// Reject segments that could never be spoken.
    pub fn validate(&self) -> Result<(), IngressError> {
        let invalid = |reason: &str| IngressError::InvalidSegment {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if self.text.trim().is_empty() {
            return Err(invalid("empty text"));
        }
        if !self.est_seconds.is_finite() || self.est_seconds < 0.0 {
            return Err(invalid("est_seconds must be a non-negative number"));
        }
        Ok(())
    }
}

/// Ordered pending-segment buffer. Head is the next segment to speak.
#[derive(Debug, Default)]
pub struct SegmentQueue {
    segments: VecDeque<Segment>,
    ids: HashSet<String>,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the tail. An id already in the queue is rejected.
    pub fn append(&mut self, segment: Segment) -> Result<(), QueueError> {
        if self.ids.contains(segment.id()) {
            return Err(QueueError::Duplicate(segment.id().to_string()));
        }
        self.ids.insert(segment.id().to_string());
        self.segments.push_back(segment);
        Ok(())
    }

    pub fn peek_head(&self) -> Option<&Segment> {
        self.segments.front()
    }

    pub fn pop_head(&mut self) -> Result<Segment, QueueError> {
        let segment = self.segments.pop_front().ok_or(QueueError::Empty)?;
        self.ids.remove(segment.id());
        Ok(segment)
    }

    /// Snapshot replacement. Later duplicates of an id are dropped; returns how many.
    pub fn replace(&mut self, segments: impl IntoIterator<Item = Segment>) -> usize {
        self.segments.clear();
        self.ids.clear();
        let mut dropped = 0;
        for segment in segments {
            if self.append(segment).is_err() {
                dropped += 1;
            }
        }
        dropped
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }
}
