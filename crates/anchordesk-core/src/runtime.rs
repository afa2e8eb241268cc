//! Single-task presenter runtime.
//!
//! One task owns the [`PlaybackController`]. Ingress messages, media-ended
//! signals, speech completions, hold re-checks, and voice catalog changes are
//! all serialized through it, so the queue and the playback state never need
//! locks. The latest [`Projection`] is published on a watch channel.

use crate::controller::{Action, ControllerConfig, PlaybackController};
use crate::error::{DeskError, DeskResult, SpeechError};
use crate::ingress::{parse_message, IngressCommand};
use crate::projection::Projection;
use crate::speech::SpeechEngine;
use crate::voice::{Voice, VoiceCatalog};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Input to the presenter task.
#[derive(Debug)]
pub enum RuntimeEvent {
    Ingress(IngressCommand),
    /// The override clip finished playing. `url`, when known, names the clip.
    MediaEnded { url: Option<String> },
    Query(oneshot::Sender<Projection>),
    Shutdown,
}

/// What happened to a raw push-channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Applied,
    /// Unrecognized channel.
    Ignored,
    /// Malformed or invalid; nothing was changed.
    Rejected,
}

struct Completion {
    ticket: u64,
    result: Result<(), SpeechError>,
}

/// Cloneable handle to a running presenter.
#[derive(Clone)]
pub struct PresenterHandle {
    tx: mpsc::UnboundedSender<RuntimeEvent>,
    projection: watch::Receiver<Projection>,
}

impl PresenterHandle {
    pub fn submit(&self, event: RuntimeEvent) -> DeskResult<()> {
        self.tx
            .send(event)
            .map_err(|e| DeskError::ChannelSend(e.to_string()))
    }

    /// Parse and apply one push-channel text frame.
    pub fn ingest(&self, raw: &str) -> DeskResult<IngestOutcome> {
        match parse_message(raw) {
            Ok(Some(command)) => {
                debug!(channel = command.channel(), "ingress message accepted");
                self.submit(RuntimeEvent::Ingress(command))?;
                Ok(IngestOutcome::Applied)
            }
            Ok(None) => Ok(IngestOutcome::Ignored),
            Err(e) => {
                warn!(error = %e, "discarding malformed ingress message");
                Ok(IngestOutcome::Rejected)
            }
        }
    }

    pub fn media_ended(&self, url: Option<String>) -> DeskResult<()> {
        self.submit(RuntimeEvent::MediaEnded { url })
    }

    /// Latest published projection.
    pub fn projection(&self) -> Projection {
        self.projection.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Projection> {
        self.projection.clone()
    }

    /// Round-trip through the presenter task, so every earlier event is reflected.
    pub async fn query(&self) -> DeskResult<Projection> {
        let (reply, rx) = oneshot::channel();
        self.submit(RuntimeEvent::Query(reply))?;
        rx.await
            .map_err(|e| DeskError::ChannelReceive(e.to_string()))
    }

    pub fn shutdown(&self) -> DeskResult<()> {
        self.submit(RuntimeEvent::Shutdown)
    }
}

/// Spawn the presenter task. Must be called inside a Tokio runtime.
pub fn spawn_presenter(
    config: ControllerConfig,
    engine: Arc<dyn SpeechEngine>,
    catalog: Arc<dyn VoiceCatalog>,
) -> (PresenterHandle, JoinHandle<()>) {
    let (tx, events) = mpsc::unbounded_channel();
    let (completions_tx, completions) = mpsc::unbounded_channel();
    let controller = PlaybackController::new(config);
    let (projection_tx, projection_rx) = watch::channel(controller.projection());

    let presenter = Presenter {
        controller,
        engine,
        catalog,
        events,
        completions_tx,
        completions,
        projection: projection_tx,
        speaking: None,
        recheck: None,
    };
    let task = tokio::spawn(presenter.run());

    (
        PresenterHandle {
            tx,
            projection: projection_rx,
        },
        task,
    )
}

struct Presenter {
    controller: PlaybackController,
    engine: Arc<dyn SpeechEngine>,
    catalog: Arc<dyn VoiceCatalog>,
    events: mpsc::UnboundedReceiver<RuntimeEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    projection: watch::Sender<Projection>,
    /// In-flight utterance task, keyed by ticket.
    speaking: Option<(u64, JoinHandle<()>)>,
    recheck: Option<Instant>,
}

impl Presenter {
    async fn run(mut self) {
        info!("presenter started");
        let mut voice_changes = self.catalog.changes();
        self.step();

        loop {
            let recheck = self.recheck;
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(RuntimeEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event),
                },
                Some(done) = self.completions.recv() => self.finish(done),
                _ = sleep_until_opt(recheck) => {
                    debug!("hold re-check");
                    self.recheck = None;
                }
                changed = voices_changed(&mut voice_changes) => {
                    if changed {
                        debug!("voice catalog changed");
                    } else {
                        voice_changes = None;
                    }
                }
            }
            self.step();
        }

        if let Some((ticket, handle)) = self.speaking.take() {
            debug!(ticket, "stopping speech on shutdown");
            self.engine.cancel();
            handle.abort();
        }
        info!("presenter stopped");
    }

    fn handle(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Ingress(command) => self.controller.apply(command),
            RuntimeEvent::MediaEnded { url } => {
                self.controller.media_ended(url.as_deref());
            }
            RuntimeEvent::Query(reply) => {
                let _ = reply.send(self.controller.projection());
            }
            RuntimeEvent::Shutdown => {}
        }
    }

    fn finish(&mut self, done: Completion) {
        if self.speaking.as_ref().is_some_and(|(t, _)| *t == done.ticket) {
            self.speaking = None;
        }
        self.controller.speech_finished(done.ticket, done.result);
    }

    /// Evaluate against a fresh voice snapshot, run the actions, publish.
    fn step(&mut self) {
        let voices = self.catalog.voices();
        let actions = self.controller.evaluate(Instant::now(), &voices);
        for action in actions {
            self.execute(action);
        }

        let next = self.controller.projection();
        self.projection.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Speak(utterance) => {
                let engine = Arc::clone(&self.engine);
                let done = self.completions_tx.clone();
                let ticket = utterance.ticket;
                if let Some((previous, task)) = self.speaking.take() {
                    debug!(ticket = previous, "previous utterance still running, aborting");
                    self.engine.cancel();
                    task.abort();
                }
                let handle = tokio::spawn(async move {
                    let speech = AssertUnwindSafe(engine.speak(&utterance.text, &utterance.voice));
                    let result = match speech.catch_unwind().await {
                        Ok(result) => result,
                        Err(_) => {
                            error!(ticket, "speech engine panicked");
                            Err(SpeechError::Tts("speech engine panicked".into()))
                        }
                    };
                    let _ = done.send(Completion { ticket, result });
                });
                self.speaking = Some((ticket, handle));
            }
            Action::CancelSpeech { ticket } => match self.speaking.take() {
                Some((current, task)) if current == ticket => {
                    self.engine.cancel();
                    task.abort();
                    info!(ticket, "speech cancelled");
                }
                other => self.speaking = other,
            },
            Action::ScheduleRecheck { at } => self.recheck = Some(at),
            Action::CancelRecheck => self.recheck = None,
            Action::SegmentSkipped { segment_id } => {
                debug!(segment_id = %segment_id, "segment skipped");
            }
        }
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// `false` once the catalog's sender is gone.
async fn voices_changed(rx: &mut Option<watch::Receiver<Vec<Voice>>>) -> bool {
    match rx {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}
