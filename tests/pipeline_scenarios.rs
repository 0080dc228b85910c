//! End-to-end turn scenarios with scripted backends.
//!
//! Each test drives [`TurnPipeline`] through one conversational situation and
//! checks the transcript, the route taken and what reached the backend.

use async_trait::async_trait;
use sahayak::backend::{
    GenerateRequest, RemoteError, SessionAdapter, SpeechRequest, SpeechSynthesizer,
    TextGenerator, Turn, TurnRole,
};
use sahayak::tone::ToneFilter;
use sahayak::{PhraseBook, Role, SahayakError, TurnEvent, TurnPipeline, TurnRoute};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

type Reply = Result<String, RemoteError>;

/// Replays scripted replies and records the history of every request.
#[derive(Default)]
struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<(Vec<Turn>, String)>>,
    /// When set, each call signals `started` then waits for `release`.
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedGenerator {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    fn gated(replies: Vec<Reply>, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            gate: Some((started, release)),
            ..Self::new(replies)
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn history_of(&self, call: usize) -> Vec<Turn> {
        self.seen.lock().unwrap()[call].0.clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerateRequest<'_>) -> Reply {
        self.seen
            .lock()
            .unwrap()
            .push((request.history.to_vec(), request.prompt.to_owned()));
        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("I'm listening.".to_owned()))
    }
}

/// Returns a fixed clip, or no audio at all.
struct FixedSynth(Option<Vec<u8>>);

#[async_trait]
impl SpeechSynthesizer for FixedSynth {
    async fn synthesize(
        &self,
        _request: SpeechRequest<'_>,
    ) -> Result<Option<Vec<u8>>, RemoteError> {
        Ok(self.0.clone())
    }
}

/// Signals `started`, waits for `release`, then returns a clip.
struct GatedSynth {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl SpeechSynthesizer for GatedSynth {
    async fn synthesize(
        &self,
        _request: SpeechRequest<'_>,
    ) -> Result<Option<Vec<u8>>, RemoteError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(Some(vec![5, 5]))
    }
}

fn build(generator: Arc<ScriptedGenerator>, audio: Option<Vec<u8>>) -> TurnPipeline {
    let adapter = SessionAdapter::new(
        generator,
        Arc::new(FixedSynth(audio)),
        "Be gentle.",
        "Kore",
    );
    TurnPipeline::new(adapter, &PhraseBook::default()).unwrap()
}

fn texts(pipeline: &TurnPipeline) -> Vec<(Role, String)> {
    pipeline
        .snapshot()
        .transcript()
        .iter()
        .map(|m| (m.role, m.text.clone()))
        .collect()
}

#[tokio::test]
async fn whitespace_input_gets_only_a_clarification() {
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = build(generator.clone(), Some(vec![0, 0]));

    let outcome = pipeline.process_turn("   ").await.unwrap();

    assert_eq!(outcome.route, TurnRoute::Clarification);
    let book = PhraseBook::default();
    assert_eq!(
        texts(&pipeline),
        vec![(Role::Agent, book.messages.clarification.clone())]
    );
    assert_eq!(generator.calls(), 0);
    assert!(outcome.audio.is_none());
}

#[tokio::test]
async fn crisis_reply_never_reaches_backend() {
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = build(generator.clone(), Some(vec![9, 9]));

    let outcome = pipeline.process_turn("I want to die").await.unwrap();

    assert_eq!(outcome.route, TurnRoute::Crisis);
    assert_eq!(generator.calls(), 0);
    let transcript = texts(&pipeline);
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0], (Role::User, "I want to die".to_owned()));
    assert_eq!(transcript[1].0, Role::Agent);
    assert!(transcript[1].1.contains("9820466726"));
    assert_eq!(outcome.audio, Some(vec![9, 9]));
}

#[tokio::test]
async fn exam_reply_is_moderated_before_display() {
    let raw = "You should study harder. You must see a doctor. Exams are stressful. \
               Many students feel this. It will pass.";
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(raw.to_owned())]));
    let pipeline = build(generator.clone(), Some(vec![0, 0]));

    let outcome = pipeline
        .process_turn("I'm stressed about exams")
        .await
        .unwrap();

    assert_eq!(outcome.route, TurnRoute::Reply);
    let reply = outcome.reply().unwrap();
    let tone = ToneFilter::new(&PhraseBook::default()).unwrap();
    assert!(!tone.contains_advice(reply), "advice left in: {reply}");
    assert!(tone.has_softener(reply));
    assert!(!reply.contains("Many students"));
    assert!(sahayak::tone::split_sentences(reply).len() <= 4);
    assert_eq!(generator.history_of(0), Vec::<Turn>::new());
}

#[tokio::test]
async fn backend_failure_apologizes_and_next_turn_reseeds() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Err(RemoteError::new("503")),
        Ok("I'm glad you came back.".to_owned()),
    ]));
    let pipeline = build(generator.clone(), Some(vec![0, 0]));
    let apology = PhraseBook::default().messages.backend_apology;

    let first = pipeline.process_turn("hello").await.unwrap();
    assert_eq!(first.route, TurnRoute::BackendFallback);
    assert_eq!(first.reply(), Some(apology.as_str()));
    assert_eq!(first.audio, Some(vec![0, 0]));
    assert!(pipeline.chat_handle_id().await.is_none());

    let second = pipeline.process_turn("still there?").await.unwrap();
    assert_eq!(second.route, TurnRoute::Reply);
    assert_eq!(
        generator.history_of(1),
        vec![
            Turn::new(TurnRole::User, "hello"),
            Turn::new(TurnRole::Model, apology.clone()),
        ]
    );
    assert_eq!(texts(&pipeline).len(), 4);
}

#[tokio::test]
async fn handle_history_grows_across_successful_turns() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok("Hi. I hear you.".to_owned()),
        Ok("Okay. I hear you.".to_owned()),
    ]));
    let pipeline = build(generator.clone(), None);
    let pipeline = pipeline.with_speech(false);

    pipeline.process_turn("hello").await.unwrap();
    let handle = pipeline.chat_handle_id().await;
    pipeline.process_turn("thanks").await.unwrap();

    assert_eq!(pipeline.chat_handle_id().await, handle);
    assert_eq!(
        generator.history_of(1),
        vec![Turn::user("hello"), Turn::model("Hi. I hear you.")]
    );
}

#[tokio::test]
async fn clear_memory_starts_a_fresh_session() {
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = build(generator.clone(), Some(vec![0, 0]));
    pipeline.process_turn("hello").await.unwrap();
    let old = pipeline.session_id();

    let new = pipeline.clear_memory();

    assert_ne!(old, new);
    assert_eq!(pipeline.session_id(), new);
    assert_eq!(pipeline.snapshot().len(), 0);

    pipeline.process_turn("again").await.unwrap();
    assert_eq!(generator.history_of(1), Vec::<Turn>::new());
}

#[tokio::test]
async fn speech_failure_keeps_reply_and_adds_notice() {
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
        "That sounds hard. I hear you.".to_owned(),
    )]));
    let pipeline = build(generator, None);

    let outcome = pipeline.process_turn("long day").await.unwrap();

    assert_eq!(outcome.route, TurnRoute::Reply);
    assert!(outcome.audio.is_none());
    let transcript = texts(&pipeline);
    assert_eq!(transcript.len(), 3);
    assert_eq!(
        transcript[1],
        (Role::Agent, "That sounds hard. I hear you.".to_owned())
    );
    assert_eq!(
        transcript[2],
        (Role::Agent, PhraseBook::default().messages.audio_trouble)
    );
}

#[tokio::test]
async fn crisis_speech_failure_adds_notice_after_emergency_message() {
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = build(generator.clone(), None);
    let book = PhraseBook::default();

    let outcome = pipeline.process_turn("I can't go on").await.unwrap();

    assert_eq!(outcome.route, TurnRoute::Crisis);
    assert!(outcome.audio.is_none());
    assert_eq!(generator.calls(), 0);
    assert_eq!(
        texts(&pipeline),
        vec![
            (Role::User, "I can't go on".to_owned()),
            (Role::Agent, book.messages.crisis.clone()),
            (Role::Agent, book.messages.audio_trouble.clone()),
        ]
    );
}

#[tokio::test]
async fn fallback_speech_failure_adds_notice_after_apology() {
    let generator = Arc::new(ScriptedGenerator::new(vec![Err(RemoteError::new(
        "timeout",
    ))]));
    let pipeline = build(generator, None);
    let book = PhraseBook::default();

    let outcome = pipeline.process_turn("hello").await.unwrap();

    assert_eq!(outcome.route, TurnRoute::BackendFallback);
    assert!(outcome.audio.is_none());
    assert_eq!(
        texts(&pipeline),
        vec![
            (Role::User, "hello".to_owned()),
            (Role::Agent, book.messages.backend_apology.clone()),
            (Role::Agent, book.messages.audio_trouble.clone()),
        ]
    );
}

#[tokio::test]
async fn clear_during_speech_drops_handle_and_late_audio() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let adapter = SessionAdapter::new(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(GatedSynth {
            started: started.clone(),
            release: release.clone(),
        }),
        "Be gentle.",
        "Kore",
    );
    let pipeline = Arc::new(TurnPipeline::new(adapter, &PhraseBook::default()).unwrap());

    let turn = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.process_turn("hello").await }
    });
    started.notified().await;

    pipeline.clear_memory();
    let handle = tokio::time::timeout(Duration::from_secs(1), pipeline.chat_handle_id())
        .await
        .expect("adapter is free while speech is pending");
    assert!(handle.is_none());

    release.notify_one();
    let outcome = turn.await.unwrap().unwrap();
    assert!(outcome.discarded);
    assert!(outcome.audio.is_none());
    assert!(pipeline.snapshot().is_empty());
}

#[tokio::test]
async fn concurrent_turn_is_rejected() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let generator = Arc::new(ScriptedGenerator::gated(
        vec![Ok("Take your time.".to_owned())],
        started.clone(),
        release.clone(),
    ));
    let pipeline = Arc::new(build(generator, None).with_speech(false));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.process_turn("first").await }
    });
    started.notified().await;

    let err = pipeline.process_turn("second").await.unwrap_err();
    assert!(matches!(err, SahayakError::TurnInFlight));

    release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.route, TurnRoute::Reply);
    assert_eq!(texts(&pipeline).len(), 2);
}

#[tokio::test]
async fn reply_arriving_after_clear_is_discarded() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let generator = Arc::new(ScriptedGenerator::gated(
        vec![Ok("Late reply.".to_owned())],
        started.clone(),
        release.clone(),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = Arc::new(build(generator, None).with_speech(false).with_events(tx));

    let turn = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.process_turn("hello").await }
    });
    started.notified().await;

    let new_session = pipeline.clear_memory();
    release.notify_one();
    let outcome = turn.await.unwrap().unwrap();

    assert!(outcome.discarded);
    assert_ne!(outcome.session_id, new_session);
    assert!(pipeline.snapshot().is_empty());

    let mut saw_discard = false;
    while let Ok(event) = rx.try_recv() {
        if let TurnEvent::ResultDiscarded { session_id } = event {
            assert_eq!(session_id, outcome.session_id);
            saw_discard = true;
        }
    }
    assert!(saw_discard);
}
