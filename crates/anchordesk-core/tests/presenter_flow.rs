//! Presenter runtime driven end to end on a paused clock.

use anchordesk_core::{
    spawn_presenter, ControllerConfig, IngestOutcome, NoVoicePolicy, SpeechEngine, SpeechError,
    StateKind, StaticVoiceCatalog, Voice, VoiceCatalog,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone)]
struct Spoken {
    text: String,
    voice: String,
    started: Instant,
    finished: Option<Instant>,
}

/// Sleeps a scripted time per text and records what it said.
#[derive(Default)]
struct ScriptedEngine {
    durations: HashMap<String, Duration>,
    log: Mutex<Vec<Spoken>>,
    cancels: AtomicUsize,
    /// Text that makes `speak` panic.
    panic_on: Option<String>,
}

impl ScriptedEngine {
    fn with(durations: &[(&str, u64)]) -> Arc<Self> {
        Arc::new(Self {
            durations: durations
                .iter()
                .map(|(t, ms)| (t.to_string(), Duration::from_millis(*ms)))
                .collect(),
            ..Default::default()
        })
    }

    fn spoken(&self) -> Vec<Spoken> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechEngine for ScriptedEngine {
    async fn speak(&self, text: &str, voice: &Voice) -> Result<(), SpeechError> {
        let index = {
            let mut log = self.log.lock().unwrap();
            log.push(Spoken {
                text: text.to_string(),
                voice: voice.name.clone(),
                started: Instant::now(),
                finished: None,
            });
            log.len() - 1
        };
        if self.panic_on.as_deref() == Some(text) {
            panic!("engine failure on {text:?}");
        }
        let duration = self
            .durations
            .get(text)
            .copied()
            .unwrap_or(Duration::from_secs(1));
        sleep(duration).await;
        self.log.lock().unwrap()[index].finished = Some(Instant::now());
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn catalog() -> Arc<StaticVoiceCatalog> {
    Arc::new(StaticVoiceCatalog::new(vec![
        Voice::new("Samantha", "en-US"),
        Voice::new("Daniel", "en-GB"),
    ]))
}

const INIT_PLAYING: &str = r#"{"channel":"init","data":{
    "is_playing": true,
    "avatars": {
        "A": {"name": "Anchor A", "voice": "en-US", "accent": "US"},
        "B": {"name": "Anchor B", "voice": "en-GB", "accent": "GB"}
    }
}}"#;

#[tokio::test(start_paused = true)]
async fn backchannel_waits_out_the_window_and_next_segment_follows() {
    init_tracing();
    let engine = ScriptedEngine::with(&[
        ("Welcome to the news", 1000),
        ("ok", 2500),
        ("Let's begin", 1000),
    ]);
    let (presenter, task) =
        spawn_presenter(ControllerConfig::default(), engine.clone(), catalog());

    assert_eq!(presenter.ingest(INIT_PLAYING).unwrap(), IngestOutcome::Applied);
    let append = r#"{"channel":"rundown.append","data":{"segments":[
        {"id":"1","speaker":"A","text":"Welcome to the news"},
        {"id":"2","speaker":"B","text":"ok"},
        {"id":"3","speaker":"A","text":"Let's begin"}
    ]}}"#;
    assert_eq!(presenter.ingest(append).unwrap(), IngestOutcome::Applied);

    sleep(Duration::from_secs(10)).await;

    let spoken = engine.spoken();
    let texts: Vec<&str> = spoken.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Welcome to the news", "ok", "Let's begin"]);
    assert_eq!(spoken[0].voice, "Samantha");
    assert_eq!(spoken[1].voice, "Daniel");

    let first_end = spoken[0].finished.unwrap();
    let gap = spoken[1].started - spoken[0].started;
    assert!(spoken[1].started > first_end, "short segment must be held");
    assert!(gap >= Duration::from_millis(2000), "released too early: {gap:?}");
    assert!(gap < Duration::from_millis(2500), "released too late: {gap:?}");

    let follow = spoken[2].started - spoken[1].finished.unwrap();
    assert!(follow < Duration::from_millis(50), "segment 3 waited {follow:?}");

    let projection = presenter.query().await.unwrap();
    assert_eq!(projection.state, StateKind::Idle);
    assert_eq!(projection.queue_len, 0);

    presenter.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn quick_backchannel_holds_the_following_short_segment() {
    init_tracing();
    let engine = ScriptedEngine::with(&[
        ("Welcome to the news", 1000),
        ("ok", 500),
        ("Let's begin", 1000),
    ]);
    let (presenter, task) =
        spawn_presenter(ControllerConfig::default(), engine.clone(), catalog());

    presenter.ingest(INIT_PLAYING).unwrap();
    presenter
        .ingest(
            r#"{"channel":"rundown.append","data":{"segments":[
                {"id":"1","speaker":"A","text":"Welcome to the news"},
                {"id":"2","speaker":"B","text":"ok"},
                {"id":"3","speaker":"A","text":"Let's begin"}
            ]}}"#,
        )
        .unwrap();

    sleep(Duration::from_secs(10)).await;

    let spoken = engine.spoken();
    let texts: Vec<&str> = spoken.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Welcome to the news", "ok", "Let's begin"]);

    let gap = spoken[2].started - spoken[1].started;
    assert!(gap >= Duration::from_millis(2000), "released too early: {gap:?}");
    assert!(gap < Duration::from_millis(2500), "released too late: {gap:?}");
    let waited = spoken[2].started - spoken[1].finished.unwrap();
    assert!(waited > Duration::from_millis(50), "segment 3 was not held: {waited:?}");

    presenter.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn panicking_engine_does_not_stall_the_rundown() {
    init_tracing();
    let engine = Arc::new(ScriptedEngine {
        panic_on: Some("This line breaks the engine".to_string()),
        ..Default::default()
    });
    let (presenter, _task) =
        spawn_presenter(ControllerConfig::default(), engine.clone(), catalog());

    presenter.ingest(INIT_PLAYING).unwrap();
    presenter
        .ingest(
            r#"{"channel":"rundown.append","data":{"segments":[
                {"id":"1","speaker":"A","text":"This line breaks the engine"},
                {"id":"2","speaker":"B","text":"Thank you for that report"}
            ]}}"#,
        )
        .unwrap();

    sleep(Duration::from_secs(3)).await;
    let spoken = engine.spoken();
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[1].text, "Thank you for that report");
    assert!(spoken[1].finished.is_some());
    let projection = presenter.query().await.unwrap();
    assert_eq!(projection.state, StateKind::Idle);
    assert_eq!(projection.queue_len, 0);
}

#[tokio::test(start_paused = true)]
async fn init_without_segments_keeps_the_rundown() {
    init_tracing();
    let engine = ScriptedEngine::with(&[]);
    let (presenter, _task) =
        spawn_presenter(ControllerConfig::default(), engine.clone(), catalog());

    presenter
        .ingest(
            r#"{"channel":"rundown.append","data":{"segments":[
                {"id":"1","speaker":"A","text":"Welcome to the news"},
                {"id":"2","speaker":"B","text":"Thank you and good evening"}
            ]}}"#,
        )
        .unwrap();
    presenter
        .ingest(r#"{"channel":"init","data":{"is_playing":false,"news":[{"headline":"Markets steady"}]}}"#)
        .unwrap();

    let projection = presenter.query().await.unwrap();
    assert_eq!(projection.queue_len, 2);
    assert_eq!(projection.headlines, vec!["Markets steady".to_string()]);
    assert!(engine.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn overlapping_speech_is_stopped_when_the_next_segment_starts() {
    init_tracing();
    let engine = ScriptedEngine::with(&[("Here is a long story about markets", 10_000)]);
    let config = ControllerConfig {
        cancel_speech_on_interrupt: false,
        ..Default::default()
    };
    let (presenter, _task) = spawn_presenter(config, engine.clone(), catalog());

    presenter.ingest(INIT_PLAYING).unwrap();
    presenter
        .ingest(
            r#"{"channel":"rundown.append","data":{"segments":[
                {"id":"1","speaker":"A","text":"Here is a long story about markets"},
                {"id":"2","speaker":"B","text":"Thank you for that report"}
            ]}}"#,
        )
        .unwrap();
    sleep(Duration::from_millis(500)).await;

    presenter
        .ingest(r#"{"channel":"control.video","data":{"url":"/api/media/1_clip.mp4"}}"#)
        .unwrap();
    assert!(presenter.query().await.unwrap().is_video_override());
    assert_eq!(engine.cancels.load(Ordering::SeqCst), 0);

    presenter
        .media_ended(Some("/api/media/1_clip.mp4".to_string()))
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    let spoken = engine.spoken();
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[1].text, "Thank you for that report");
    assert!(spoken[0].finished.is_none());
    assert_eq!(engine.cancels.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn video_override_cancels_speech_then_rundown_resumes() {
    init_tracing();
    let engine = ScriptedEngine::with(&[("Here is a long story about markets", 5000)]);
    let (presenter, _task) =
        spawn_presenter(ControllerConfig::default(), engine.clone(), catalog());

    presenter.ingest(INIT_PLAYING).unwrap();
    presenter
        .ingest(
            r#"{"channel":"rundown.append","data":{"segments":[
                {"id":"1","speaker":"A","text":"Here is a long story about markets"},
                {"id":"2","speaker":"B","text":"Thank you for that report"}
            ]}}"#,
        )
        .unwrap();
    sleep(Duration::from_millis(500)).await;
    assert!(presenter.query().await.unwrap().is_speaking());

    presenter
        .ingest(r#"{"channel":"control.video","data":{"url":"/api/media/1_clip.mp4"}}"#)
        .unwrap();
    let projection = presenter.query().await.unwrap();
    assert_eq!(projection.state, StateKind::VideoOverride);
    assert_eq!(projection.video_url.as_deref(), Some("/api/media/1_clip.mp4"));
    assert_eq!(projection.queue_len, 1);
    assert_eq!(engine.cancels.load(Ordering::SeqCst), 1);

    sleep(Duration::from_secs(6)).await;
    assert!(presenter.query().await.unwrap().is_video_override());
    assert_eq!(engine.spoken().len(), 1);

    presenter
        .media_ended(Some("/api/media/1_clip.mp4".to_string()))
        .unwrap();
    sleep(Duration::from_millis(100)).await;
    let spoken = engine.spoken();
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[1].text, "Thank you for that report");
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_change_nothing() {
    init_tracing();
    let engine = ScriptedEngine::with(&[]);
    let (presenter, _task) =
        spawn_presenter(ControllerConfig::default(), engine.clone(), catalog());

    let before = presenter.query().await.unwrap();
    assert_eq!(presenter.ingest("{not json").unwrap(), IngestOutcome::Rejected);
    assert_eq!(
        presenter
            .ingest(r#"{"channel":"rundown.append","data":{"segments":[{"id":"1","speaker":"C","text":"hi"}]}}"#)
            .unwrap(),
        IngestOutcome::Rejected
    );
    assert_eq!(
        presenter
            .ingest(r#"{"channel":"weather.update","data":{}}"#)
            .unwrap(),
        IngestOutcome::Ignored
    );
    assert_eq!(presenter.query().await.unwrap(), before);
    assert!(engine.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pause_lets_segment_finish_and_blocks_the_next() {
    init_tracing();
    let engine = ScriptedEngine::with(&[]);
    let (presenter, _task) =
        spawn_presenter(ControllerConfig::default(), engine.clone(), catalog());

    presenter.ingest(INIT_PLAYING).unwrap();
    presenter
        .ingest(
            r#"{"channel":"rundown.append","data":{"segments":[
                {"id":"1","speaker":"A","text":"Welcome to the evening news"},
                {"id":"2","speaker":"B","text":"Tonight we look at markets"}
            ]}}"#,
        )
        .unwrap();
    sleep(Duration::from_millis(100)).await;
    presenter
        .ingest(r#"{"channel":"control.playstate","data":{"is_playing":false}}"#)
        .unwrap();

    sleep(Duration::from_secs(5)).await;
    assert_eq!(engine.spoken().len(), 1);
    assert!(engine.spoken()[0].finished.is_some());
    let projection = presenter.query().await.unwrap();
    assert_eq!(projection.state, StateKind::Idle);
    assert!(!projection.is_playing);
    assert_eq!(projection.queue_len, 1);

    presenter
        .ingest(r#"{"channel":"control.playstate","data":{"is_playing":true}}"#)
        .unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.spoken().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn held_segment_starts_when_voices_arrive() {
    init_tracing();
    let engine = ScriptedEngine::with(&[]);
    let voices = Arc::new(StaticVoiceCatalog::default());
    let config = ControllerConfig {
        no_voice_policy: NoVoicePolicy::Hold,
        ..Default::default()
    };
    let catalog: Arc<dyn VoiceCatalog> = voices.clone();
    let (presenter, _task) = spawn_presenter(config, engine.clone(), catalog);

    presenter.ingest(INIT_PLAYING).unwrap();
    presenter
        .ingest(
            r#"{"channel":"rundown.append","data":{"segments":[
                {"id":"1","speaker":"B","text":"Good evening from London"}
            ]}}"#,
        )
        .unwrap();
    sleep(Duration::from_secs(1)).await;
    assert!(engine.spoken().is_empty());
    assert_eq!(presenter.query().await.unwrap().queue_len, 1);

    voices.replace(vec![Voice::new("Daniel", "en-GB")]);
    sleep(Duration::from_millis(10)).await;
    let spoken = engine.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].voice, "Daniel");
}

#[tokio::test(start_paused = true)]
async fn projection_updates_are_published() {
    init_tracing();
    let engine = ScriptedEngine::with(&[]);
    let (presenter, _task) =
        spawn_presenter(ControllerConfig::default(), engine, catalog());
    let mut updates = presenter.subscribe();

    presenter.ingest(INIT_PLAYING).unwrap();
    presenter
        .ingest(
            r#"{"channel":"rundown.append","data":{"segments":[
                {"id":"1","speaker":"A","text":"Welcome to the news"}
            ]}}"#,
        )
        .unwrap();

    let speaking = updates
        .wait_for(|p| p.is_speaking())
        .await
        .unwrap()
        .clone();
    assert_eq!(speaking.speaker_name.as_deref(), Some("Anchor A"));
    assert_eq!(speaking.text.as_deref(), Some("Welcome to the news"));
    assert_eq!(presenter.projection().state, StateKind::Speaking);
}
