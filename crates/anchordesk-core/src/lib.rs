//! # Anchordesk Core - Two-Anchor Presentation Control
//!
//! Decides which of two virtual anchors is speaking, when the next rundown
//! segment may start, and when an externally pushed video clip takes the screen.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Presenter task                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐    │
//! │  │   Ingress    │→ │   Rundown    │→ │ Playback         │    │
//! │  │  (envelopes) │  │    Queue     │  │ Controller       │    │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘    │
//! │         ↓                  ↑ hold         ↓         ↑        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐    │
//! │  │  Interrupt   │  │ Backchannel  │  │  SpeechEngine    │    │
//! │  │   (video)    │  │   Filter     │  │  (completion)    │    │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘    │
//! │                                           ↓                  │
//! │                               Projection (watch channel)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod avatar;
pub mod backchannel;
pub mod config;
pub mod controller;
pub mod error;
pub mod ingress;
pub mod interrupt;
pub mod projection;
pub mod runtime;
pub mod segment;
pub mod speech;
pub mod voice;

pub use avatar::{AvatarConfig, AvatarRoster};
pub use backchannel::{BackchannelConfig, BackchannelFilter, Verdict};
pub use config::{EngineKind, PresenterConfig, SpeechConfig};
pub use controller::{
    Action, ControllerConfig, NoVoicePolicy, PlaybackController, PlaybackState, Utterance,
};
pub use error::{DeskError, DeskResult, IngressError, QueueError, SpeechError};
pub use ingress::{parse_message, Envelope, IngressCommand, NewsItem, Snapshot, UpcomingEvent};
pub use interrupt::InterruptChannel;
pub use projection::{Projection, StateKind};
pub use runtime::{spawn_presenter, IngestOutcome, PresenterHandle, RuntimeEvent};
pub use segment::{Segment, SegmentQueue, Speaker};
#[cfg(feature = "http-tts")]
pub use speech::HttpTtsEngine;
pub use speech::{PacedSpeechEngine, PlaceholderSpeech, SpeechEngine};
pub use voice::{resolve_voice, StaticVoiceCatalog, Voice, VoiceCatalog};
