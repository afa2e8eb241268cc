//! Playback state machine.
//!
//! Decides when to start, hold, or end a spoken segment and when to yield to a
//! video override. The controller does no I/O: [`PlaybackController::evaluate`]
//! returns [`Action`]s for the runtime to carry out, with `now` passed in so the
//! rules can be exercised without timers.

use crate::avatar::AvatarRoster;
use crate::backchannel::{BackchannelConfig, BackchannelFilter, Verdict};
use crate::error::SpeechError;
use crate::ingress::{IngressCommand, NewsItem, UpcomingEvent};
use crate::interrupt::InterruptChannel;
use crate::projection::{Projection, StateKind};
use crate::segment::{Segment, SegmentQueue, Speaker};
use crate::voice::{resolve_voice, Voice};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What to do with a released segment when no synthesis voice exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoVoicePolicy {
    /// Pop it and treat it as spoken so the rundown keeps moving.
    #[default]
    Skip,
    /// Keep it at the head until a voice shows up.
    Hold,
}

/// Configuration for the playback controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub backchannel: BackchannelConfig,
    /// Re-check interval while the head is held (default: 300ms, at most 500ms).
    pub retry_tick: Duration,
    pub no_voice_policy: NoVoicePolicy,
    /// Stop in-flight speech when a video override takes focus (default: true).
    pub cancel_speech_on_interrupt: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backchannel: BackchannelConfig::default(),
            retry_tick: Duration::from_millis(300),
            no_voice_policy: NoVoicePolicy::Skip,
            cancel_speech_on_interrupt: true,
        }
    }
}

/// Exactly one of these holds at any instant.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Speaking(Segment),
    VideoOverride(String),
}

/// A request to the speech engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Completions must quote this ticket; anything else is stale.
    pub ticket: u64,
    pub segment_id: String,
    pub speaker: Speaker,
    pub text: String,
    pub voice: Voice,
}

/// Side effects requested by an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Speak(Utterance),
    CancelSpeech { ticket: u64 },
    ScheduleRecheck { at: Instant },
    CancelRecheck,
    SegmentSkipped { segment_id: String },
}

/// Owns playback state, the rundown queue, and the interrupt slot.
#[derive(Debug)]
pub struct PlaybackController {
    state: PlaybackState,
    queue: SegmentQueue,
    interrupt: InterruptChannel,
    avatars: AvatarRoster,
    master_play: bool,
    last_switch: Option<Instant>,
    filter: BackchannelFilter,
    retry_tick: Duration,
    no_voice_policy: NoVoicePolicy,
    cancel_speech_on_interrupt: bool,
    current_ticket: Option<u64>,
    next_ticket: u64,
    recheck_at: Option<Instant>,
    news: Vec<NewsItem>,
    upcoming: Vec<UpcomingEvent>,
}

impl PlaybackController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            state: PlaybackState::Idle,
            queue: SegmentQueue::new(),
            interrupt: InterruptChannel::new(),
            avatars: AvatarRoster::default(),
            master_play: false,
            last_switch: None,
            filter: BackchannelFilter::new(&config.backchannel),
            retry_tick: config.retry_tick,
            no_voice_policy: config.no_voice_policy,
            cancel_speech_on_interrupt: config.cancel_speech_on_interrupt,
            current_ticket: None,
            next_ticket: 1,
            recheck_at: None,
            news: Vec::new(),
            upcoming: Vec::new(),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn queue(&self) -> &SegmentQueue {
        &self.queue
    }

    pub fn interrupt(&self) -> &InterruptChannel {
        &self.interrupt
    }

    pub fn avatars(&self) -> &AvatarRoster {
        &self.avatars
    }

    pub fn master_play(&self) -> bool {
        self.master_play
    }

    pub fn last_switch(&self) -> Option<Instant> {
        self.last_switch
    }

    pub fn recheck_at(&self) -> Option<Instant> {
        self.recheck_at
    }

    pub fn current_ticket(&self) -> Option<u64> {
        self.current_ticket
    }

    fn current_segment_id(&self) -> Option<&str> {
        match &self.state {
            PlaybackState::Speaking(segment) => Some(segment.id()),
            _ => None,
        }
    }

    /// Apply an ingress command. Call [`evaluate`](Self::evaluate) afterwards.
    pub fn apply(&mut self, command: IngressCommand) {
        match command {
            IngressCommand::Snapshot(snapshot) => {
                if let Some(segments) = snapshot.segments {
                    let speaking = self.current_segment_id().map(str::to_string);
                    let segments = segments
                        .into_iter()
                        .filter(|s| Some(s.id()) != speaking.as_deref());
                    let dropped = self.queue.replace(segments);
                    if dropped > 0 {
                        warn!(dropped, "snapshot contained duplicate segment ids");
                    }
                }
                self.avatars = snapshot.avatars;
                self.master_play = snapshot.is_playing;
                self.news = snapshot.news;
                self.upcoming = snapshot.events;
                info!(
                    queued = self.queue.len(),
                    is_playing = self.master_play,
                    "snapshot applied"
                );
            }
            IngressCommand::Append(segments) => {
                for segment in segments {
                    if Some(segment.id()) == self.current_segment_id() {
                        warn!(segment_id = %segment.id(), "segment is already on air, dropping");
                        continue;
                    }
                    let segment_id = segment.id().to_string();
                    match self.queue.append(segment) {
                        Ok(()) => debug!(segment_id = %segment_id, "segment queued"),
                        Err(e) => warn!(error = %e, "dropping segment"),
                    }
                }
            }
            IngressCommand::SetPlaying(is_playing) => {
                if self.master_play != is_playing {
                    info!(is_playing, "master play changed");
                }
                self.master_play = is_playing;
            }
            IngressCommand::PushVideo(url) => {
                info!(url = %url, "video override pushed");
                self.interrupt.push(url);
            }
            IngressCommand::ReplaceAvatars(roster) => {
                debug!("avatar roster replaced");
                self.avatars = roster;
            }
        }
    }

    /// External playback-finished signal for the override clip.
    ///
    /// When `url` is given it must name the active clip, so a late signal for
    /// an already replaced clip does not end the newer one.
    pub fn media_ended(&mut self, url: Option<&str>) -> bool {
        let Some(active) = self.interrupt.active() else {
            debug!("media ended with no active override");
            return false;
        };
        if let Some(url) = url {
            if url != active {
                debug!(ended = url, active, "ignoring media-ended for a replaced clip");
                return false;
            }
        }
        if let Some(cleared) = self.interrupt.clear() {
            info!(url = %cleared, "video override cleared");
        }
        true
    }

    /// Completion (or failure) reported by the speech engine.
    ///
    /// Failures count as completion; the segment is never retried.
    pub fn speech_finished(&mut self, ticket: u64, result: Result<(), SpeechError>) -> bool {
        if self.current_ticket != Some(ticket) {
            debug!(ticket, "ignoring stale speech completion");
            return false;
        }
        if let PlaybackState::Speaking(segment) = &self.state {
            match &result {
                Ok(()) => info!(segment_id = %segment.id(), "segment finished"),
                Err(e) => warn!(segment_id = %segment.id(), error = %e, "speech failed, moving on"),
            }
        }
        self.current_ticket = None;
        self.state = PlaybackState::Idle;
        true
    }

    /// Re-run the transition rules against current inputs.
    ///
    /// `voices` is the catalog snapshot for this decision.
    pub fn evaluate(&mut self, now: Instant, voices: &[Voice]) -> Vec<Action> {
        let mut actions = Vec::new();

        if let Some(url) = self.interrupt.active() {
            let on_screen = matches!(&self.state, PlaybackState::VideoOverride(u) if u == url);
            if !on_screen {
                let url = url.to_string();
                info!(url = %url, "entering video override");
                let previous = std::mem::replace(&mut self.state, PlaybackState::VideoOverride(url));
                if let PlaybackState::Speaking(segment) = previous {
                    if let Some(ticket) = self.current_ticket.take() {
                        if self.cancel_speech_on_interrupt {
                            actions.push(Action::CancelSpeech { ticket });
                        }
                    }
                    info!(segment_id = %segment.id(), "speech preempted by video override");
                }
                self.cancel_recheck(&mut actions);
            }
            return actions;
        }

        if matches!(self.state, PlaybackState::VideoOverride(_)) {
            info!("video override finished");
            self.state = PlaybackState::Idle;
        }

        if matches!(self.state, PlaybackState::Speaking(_)) {
            return actions;
        }

        if !self.master_play {
            self.cancel_recheck(&mut actions);
            return actions;
        }

        loop {
            let Some(head) = self.queue.peek_head() else {
                self.cancel_recheck(&mut actions);
                break;
            };

            let elapsed = self.last_switch.map(|t| now.saturating_duration_since(t));
            if self.filter.decide(elapsed, head.text()) == Verdict::Hold {
                debug!(
                    segment_id = %head.id(),
                    ?elapsed,
                    window = ?self.filter.hold_window(),
                    "holding backchannel"
                );
                self.schedule_recheck(now, &mut actions);
                break;
            }

            let accent = self.avatars.get(head.speaker()).accent.as_str();
            let voice = resolve_voice(accent, voices).cloned();
            let Some(voice) = voice else {
                match self.no_voice_policy {
                    NoVoicePolicy::Skip => {
                        let Ok(segment) = self.queue.pop_head() else {
                            break;
                        };
                        warn!(segment_id = %segment.id(), "no synthesis voice, skipping segment");
                        actions.push(Action::SegmentSkipped {
                            segment_id: segment.id().to_string(),
                        });
                        continue;
                    }
                    NoVoicePolicy::Hold => {
                        debug!(segment_id = %head.id(), "no synthesis voice, waiting");
                        self.schedule_recheck(now, &mut actions);
                        break;
                    }
                }
            };

            let Ok(segment) = self.queue.pop_head() else {
                break;
            };
            let ticket = self.next_ticket;
            self.next_ticket += 1;
            info!(
                segment_id = %segment.id(),
                speaker = %segment.speaker(),
                voice = %voice.name,
                ticket,
                "segment started"
            );
            actions.push(Action::Speak(Utterance {
                ticket,
                segment_id: segment.id().to_string(),
                speaker: segment.speaker(),
                text: segment.text().to_string(),
                voice,
            }));
            self.state = PlaybackState::Speaking(segment);
            self.current_ticket = Some(ticket);
            self.last_switch = Some(now);
            self.cancel_recheck(&mut actions);
            break;
        }

        actions
    }

    fn schedule_recheck(&mut self, now: Instant, actions: &mut Vec<Action>) {
        let at = now + self.retry_tick;
        self.recheck_at = Some(at);
        actions.push(Action::ScheduleRecheck { at });
    }

    fn cancel_recheck(&mut self, actions: &mut Vec<Action>) {
        if self.recheck_at.take().is_some() {
            actions.push(Action::CancelRecheck);
        }
    }

    pub fn projection(&self) -> Projection {
        let (state, speaker, text, video_url) = match &self.state {
            PlaybackState::Idle => (StateKind::Idle, None, None, None),
            PlaybackState::Speaking(segment) => (
                StateKind::Speaking,
                Some(segment.speaker()),
                Some(segment.text().to_string()),
                None,
            ),
            PlaybackState::VideoOverride(url) => {
                (StateKind::VideoOverride, None, None, Some(url.clone()))
            }
        };
        let avatar = speaker.map(|s| self.avatars.get(s));
        Projection {
            state,
            speaker,
            speaker_name: avatar.map(|a| a.name.clone()).filter(|n| !n.is_empty()),
            portrait: avatar.map(|a| a.image.clone()).filter(|i| !i.is_empty()),
            text,
            video_url,
            is_playing: self.master_play,
            queue_len: self.queue.len(),
            headlines: self.news.iter().map(|n| n.headline.clone()).collect(),
            upcoming: self.upcoming.clone(),
        }
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}
