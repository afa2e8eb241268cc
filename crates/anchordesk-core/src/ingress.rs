//! Push-channel ingress: `{ channel, data }` envelopes to typed commands.
//!
//! A message is decoded and validated completely before a command is produced,
//! so a malformed message never causes a partial mutation.

use crate::avatar::AvatarRoster;
use crate::error::IngressError;
use crate::segment::Segment;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CHANNEL_INIT: &str = "init";
pub const CHANNEL_RUNDOWN_APPEND: &str = "rundown.append";
pub const CHANNEL_PLAYSTATE: &str = "control.playstate";
pub const CHANNEL_VIDEO: &str = "control.video";
pub const CHANNEL_AVATARS: &str = "avatars.update";

/// Raw push-channel message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    pub channel: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Ticker item carried by `init`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

/// Upcoming programme item carried by `init`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingEvent {
    #[serde(default)]
    pub title: String,
    /// ISO timestamp as sent by the backend.
    #[serde(default)]
    pub when: String,
}

/// Full-state snapshot sent on connect.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub avatars: AvatarRoster,
    #[serde(default)]
    pub news: Vec<NewsItem>,
    #[serde(default)]
    pub events: Vec<UpcomingEvent>,
    /// Pending rundown. Absent leaves the queue as it is; present replaces it.
    #[serde(default)]
    pub segments: Option<Vec<Segment>>,
}

#[derive(Debug, Deserialize)]
struct AppendPayload {
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct PlaystatePayload {
    is_playing: bool,
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoPayload {
    url: String,
}

/// Mutation requested by one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum IngressCommand {
    /// Replace queue, avatars, play flag, and auxiliary lists wholesale.
    Snapshot(Snapshot),
    /// Append segments to the tail in order.
    Append(Vec<Segment>),
    /// Master play flag.
    SetPlaying(bool),
    /// Push a video override (last write wins).
    PushVideo(String),
    /// Replace the avatar roster.
    ReplaceAvatars(AvatarRoster),
}

impl IngressCommand {
    pub fn channel(&self) -> &'static str {
        match self {
            IngressCommand::Snapshot(_) => CHANNEL_INIT,
            IngressCommand::Append(_) => CHANNEL_RUNDOWN_APPEND,
            IngressCommand::SetPlaying(_) => CHANNEL_PLAYSTATE,
            IngressCommand::PushVideo(_) => CHANNEL_VIDEO,
            IngressCommand::ReplaceAvatars(_) => CHANNEL_AVATARS,
        }
    }
}

/// Parse one text frame. `Ok(None)` means an unrecognized channel.
pub fn parse_message(raw: &str) -> Result<Option<IngressCommand>, IngressError> {
    let envelope: Envelope = serde_json::from_str(raw).map_err(IngressError::Envelope)?;
    decode(envelope)
}

/// Translate an envelope into a command.
pub fn decode(envelope: Envelope) -> Result<Option<IngressCommand>, IngressError> {
    let Envelope { channel, data } = envelope;
    let command = match channel.as_str() {
        CHANNEL_INIT => {
            let snapshot: Snapshot = payload(&channel, data)?;
            if let Some(segments) = &snapshot.segments {
                validate_segments(segments)?;
            }
            IngressCommand::Snapshot(snapshot)
        }
        CHANNEL_RUNDOWN_APPEND => {
            let append: AppendPayload = payload(&channel, data)?;
            validate_segments(&append.segments)?;
            IngressCommand::Append(append.segments)
        }
        CHANNEL_PLAYSTATE => {
            let state: PlaystatePayload = payload(&channel, data)?;
            if let Some(ts) = state.ts.as_deref() {
                debug!(is_playing = state.is_playing, ts, "playstate received");
            }
            IngressCommand::SetPlaying(state.is_playing)
        }
        CHANNEL_VIDEO => {
            let video: VideoPayload = payload(&channel, data)?;
            let url = video.url.trim();
            if url.is_empty() {
                return Err(IngressError::Invalid {
                    channel,
                    reason: "empty video url".to_string(),
                });
            }
            IngressCommand::PushVideo(url.to_string())
        }
        CHANNEL_AVATARS => IngressCommand::ReplaceAvatars(payload(&channel, data)?),
        other => {
            debug!(channel = other, "ignoring unrecognized channel");
            return Ok(None);
        }
    };
    Ok(Some(command))
}

fn payload<T: serde::de::DeserializeOwned>(
    channel: &str,
    data: serde_json::Value,
) -> Result<T, IngressError> {
    serde_json::from_value(data).map_err(|source| IngressError::Payload {
        channel: channel.to_string(),
        source,
    })
}

fn validate_segments(segments: &[Segment]) -> Result<(), IngressError> {
    segments.iter().try_for_each(Segment::validate)
}
