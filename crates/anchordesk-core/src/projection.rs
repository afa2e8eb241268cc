//! Read-only view of the presentation for the rendering surface.

use crate::ingress::UpcomingEvent;
use crate::segment::Speaker;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    #[default]
    Idle,
    Speaking,
    VideoOverride,
}

/// Everything a display layer needs without reaching into the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub state: StateKind,
    /// Active anchor, if one is speaking.
    pub speaker: Option<Speaker>,
    pub speaker_name: Option<String>,
    pub portrait: Option<String>,
    /// Text of the segment being spoken.
    pub text: Option<String>,
    /// Override clip, while one is on screen.
    pub video_url: Option<String>,
    pub is_playing: bool,
    pub queue_len: usize,
    pub headlines: Vec<String>,
    pub upcoming: Vec<UpcomingEvent>,
}

impl Projection {
    pub fn is_speaking(&self) -> bool {
        self.state == StateKind::Speaking
    }

    pub fn is_video_override(&self) -> bool {
        self.state == StateKind::VideoOverride
    }
}
