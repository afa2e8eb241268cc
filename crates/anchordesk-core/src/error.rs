//! Error types for the Anchordesk presentation core

use thiserror::Error;

/// Result type alias for presenter operations
pub type DeskResult<T> = Result<T, DeskError>;

/// Errors that can occur in the presentation core
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Ingress error: {0}")]
    Ingress(#[from] IngressError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Channel receive error: {0}")]
    ChannelReceive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DeskError {
    fn from(err: config::ConfigError) -> Self {
        DeskError::Config(err.to_string())
    }
}

/// Rundown queue failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("rundown queue is empty")]
    Empty,

    #[error("segment '{0}' is already queued")]
    Duplicate(String),
}

/// Inbound push-channel message failures. The whole message is rejected.
#[derive(Error, Debug)]
pub enum IngressError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("malformed '{channel}' payload: {source}")]
    Payload {
        channel: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid '{channel}' payload: {reason}")]
    Invalid { channel: String, reason: String },

    #[error("invalid segment '{id}': {reason}")]
    InvalidSegment { id: String, reason: String },
}

/// Synthesis engine failures. The controller treats all of them as completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("utterance cancelled")]
    Cancelled,
}
