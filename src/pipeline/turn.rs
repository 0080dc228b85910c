//! The turn pipeline: safety gate, backend dispatch, tone filter and speech.
//!
//! One turn runs at a time. Starting a second turn while one is in flight is
//! rejected with [`SahayakError::TurnInFlight`], because the chat handle's
//! history and the transcript order both assume sequential turns.
//!
//! Every append is committed against the session id captured when the turn
//! started. If memory is cleared while a backend call is pending, the late
//! reply is dropped instead of landing in the new session's transcript.

use super::events::{TurnEvent, TurnState};
use crate::audio::Playback;
use crate::backend::{GeminiClient, SessionAdapter, SpeechVoice};
use crate::config::SahayakConfig;
use crate::conversation::{ConversationSession, Message, SharedConversation};
use crate::error::{Result, SahayakError};
use crate::phrases::{CannedMessages, PhraseBook};
use crate::safety::CrisisDetector;
use crate::tone::ToneFilter;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which branch a turn took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRoute {
    /// Empty input answered with the clarification prompt.
    Clarification,
    /// Crisis phrasing answered with the emergency message.
    Crisis,
    /// Backend reply, tone-filtered.
    Reply,
    /// Backend failed; the apology was used instead.
    BackendFallback,
}

/// Result of one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub route: TurnRoute,
    /// Session the turn was started in.
    pub session_id: Uuid,
    /// Messages committed to the transcript, in order.
    pub appended: Vec<Message>,
    /// Synthesized speech for the agent reply, if any.
    pub audio: Option<Vec<u8>>,
    /// True when the session was cleared mid-turn and results were dropped.
    pub discarded: bool,
}

impl TurnOutcome {
    /// The agent reply text delivered this turn (first agent message).
    pub fn reply(&self) -> Option<&str> {
        self.appended
            .iter()
            .find(|m| m.role == crate::conversation::Role::Agent)
            .map(|m| m.text.as_str())
    }
}

/// Accumulates what one turn committed.
struct TurnRecord {
    session_id: Uuid,
    appended: Vec<Message>,
    discarded: bool,
}

impl TurnRecord {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            appended: Vec::new(),
            discarded: false,
        }
    }

    fn finish(self, route: TurnRoute, audio: Option<Vec<u8>>) -> TurnOutcome {
        TurnOutcome {
            route,
            session_id: self.session_id,
            appended: self.appended,
            audio,
            discarded: self.discarded,
        }
    }
}

/// Orchestrates crisis detection, backend dispatch, tone filtering and
/// speech synthesis for one conversation.
pub struct TurnPipeline {
    conversation: SharedConversation,
    adapter: Mutex<SessionAdapter>,
    speech: SpeechVoice,
    turn_gate: Mutex<()>,
    detector: CrisisDetector,
    tone: ToneFilter,
    messages: CannedMessages,
    speech_enabled: bool,
    events: Option<mpsc::UnboundedSender<TurnEvent>>,
    playback: Option<Arc<dyn Playback>>,
}

impl std::fmt::Debug for TurnPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnPipeline")
            .field("session_id", &self.conversation.session_id())
            .field("speech_enabled", &self.speech_enabled)
            .field("crisis_patterns", &self.detector.len())
            .finish_non_exhaustive()
    }
}

impl TurnPipeline {
    /// Build a pipeline around an adapter and a validated phrase book.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::Config`] if the phrase book is invalid.
    pub fn new(adapter: SessionAdapter, book: &PhraseBook) -> Result<Self> {
        Ok(Self {
            conversation: SharedConversation::new(),
            speech: adapter.speech(),
            adapter: Mutex::new(adapter),
            turn_gate: Mutex::new(()),
            detector: CrisisDetector::new(book)?,
            tone: ToneFilter::new(book)?,
            messages: book.messages.clone(),
            speech_enabled: true,
            events: None,
            playback: None,
        })
    }

    /// Build the production pipeline: Gemini for text and speech.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::Config`] if the API key is missing or the
    /// phrase book cannot be loaded.
    pub fn from_config(config: &SahayakConfig) -> Result<Self> {
        let book = config.load_phrase_book()?;
        let client = Arc::new(GeminiClient::new(config.backend.gemini_config()?)?);
        let adapter = SessionAdapter::new(
            client.clone(),
            client,
            config.backend.system_instruction.clone(),
            config.backend.voice.clone(),
        );
        info!(
            text_model = %config.backend.text_model,
            voice = %config.backend.voice,
            phrase_book_version = book.version,
            "turn pipeline configured"
        );
        Ok(Self::new(adapter, &book)?.with_speech(config.audio.speech_enabled))
    }

    /// Publish [`TurnEvent`]s on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TurnEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Hand synthesized audio to `playback`.
    ///
    /// `play` runs on the blocking pool and the turn waits for it.
    pub fn with_playback(mut self, playback: Arc<dyn Playback>) -> Self {
        self.playback = Some(playback);
        self
    }

    /// Enable or disable speech synthesis.
    pub fn with_speech(mut self, enabled: bool) -> Self {
        self.speech_enabled = enabled;
        self
    }

    /// Shared view of the conversation for display collaborators.
    pub fn conversation(&self) -> &SharedConversation {
        &self.conversation
    }

    pub fn session_id(&self) -> Uuid {
        self.conversation.session_id()
    }

    /// Clone of the current session.
    pub fn snapshot(&self) -> ConversationSession {
        self.conversation.snapshot()
    }

    /// Id of the open chat handle, if any. Waits while a backend call is
    /// in flight.
    pub async fn chat_handle_id(&self) -> Option<Uuid> {
        self.adapter.lock().await.handle().map(|h| h.id())
    }

    /// Process one user turn.
    ///
    /// Recoverable conditions (empty input, crisis, backend or speech
    /// failure) never surface as errors: each is answered with its canned
    /// agent message and reported through [`TurnOutcome::route`].
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::TurnInFlight`] if another turn is running.
    pub async fn process_turn(&self, input: &str) -> Result<TurnOutcome> {
        let Ok(_gate) = self.turn_gate.try_lock() else {
            warn!("turn rejected, another turn is in flight");
            return Err(SahayakError::TurnInFlight);
        };

        let session_id = self.conversation.session_id();
        let mut record = TurnRecord::new(session_id);
        self.set_state(session_id, TurnState::Validating);

        if input.trim().is_empty() {
            info!(%session_id, code = SahayakError::EmptyInput.code(), "empty turn, asking again");
            self.commit(&mut record, Message::agent(self.messages.clarification.clone()));
            self.set_state(session_id, TurnState::Idle);
            return Ok(record.finish(TurnRoute::Clarification, None));
        }

        let user = Message::user(input);
        let user_id = user.id;
        self.commit(&mut record, user);
        if record.discarded {
            self.set_state(session_id, TurnState::Idle);
            return Ok(record.finish(TurnRoute::Reply, None));
        }

        if self.detector.detect(input) {
            info!(
                %session_id,
                code = SahayakError::CrisisDetected.code(),
                "crisis phrasing detected, sending emergency message"
            );
            self.set_state(session_id, TurnState::CrisisReply);
            let audio = self.deliver(&mut record, self.messages.crisis.clone()).await;
            self.set_state(session_id, TurnState::Idle);
            return Ok(record.finish(TurnRoute::Crisis, audio));
        }

        self.set_state(session_id, TurnState::BackendCall);
        let history = self
            .conversation
            .turns_before(session_id, user_id)
            .unwrap_or_default();
        let result = {
            let mut adapter = self.adapter.lock().await;
            adapter.send_turn(session_id, input, &history).await
        };

        let (route, reply) = match result {
            Ok(raw) => {
                self.set_state(session_id, TurnState::ToneFiltering);
                let filtered = self.tone.filter(&raw);
                debug!(
                    raw_chars = raw.len(),
                    filtered_chars = filtered.len(),
                    "reply tone-filtered"
                );
                (TurnRoute::Reply, filtered)
            }
            Err(e) => {
                warn!(%session_id, code = e.code(), "backend unavailable, sending apology");
                (
                    TurnRoute::BackendFallback,
                    self.messages.backend_apology.clone(),
                )
            }
        };

        let audio = self.deliver(&mut record, reply).await;
        self.set_state(session_id, TurnState::Idle);
        info!(%session_id, ?route, appended = record.appended.len(), "turn complete");
        Ok(record.finish(route, audio))
    }

    /// Clear the transcript, start a new session and drop the chat handle.
    ///
    /// Safe to call while a turn is in flight: the pending result is
    /// discarded on arrival and the stale handle is replaced on the next
    /// turn.
    pub fn clear_memory(&self) -> Uuid {
        let session_id = self.conversation.clear();
        if let Ok(mut adapter) = self.adapter.try_lock() {
            adapter.invalidate();
        }
        info!(%session_id, "memory cleared");
        self.emit(TurnEvent::MemoryCleared { session_id });
        session_id
    }

    /// Append an agent reply, then synthesize and hand off its audio.
    async fn deliver(&self, record: &mut TurnRecord, text: String) -> Option<Vec<u8>> {
        let message = Message::agent(text);
        let message_id = message.id;
        let spoken = message.text.clone();
        self.commit(record, message);
        if record.discarded || !self.speech_enabled {
            return None;
        }

        self.set_state(record.session_id, TurnState::Synthesizing);
        match self.speech.synthesize(&spoken).await {
            Ok(audio) => {
                if self.conversation.session_id() != record.session_id {
                    self.discard(record);
                    return None;
                }
                self.emit(TurnEvent::AudioReady {
                    session_id: record.session_id,
                    message_id,
                    bytes: audio.len(),
                });
                if let Some(playback) = &self.playback {
                    self.play(playback.clone(), audio.clone()).await;
                }
                Some(audio)
            }
            Err(e) => {
                warn!(code = e.code(), error = %e, "speech unavailable, text reply kept");
                self.commit(record, Message::agent(self.messages.audio_trouble.clone()));
                None
            }
        }
    }

    async fn play(&self, playback: Arc<dyn Playback>, audio: Vec<u8>) {
        match tokio::task::spawn_blocking(move || playback.play(&audio)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "playback failed"),
            Err(e) => warn!(error = %e, "playback task failed"),
        }
    }

    fn commit(&self, record: &mut TurnRecord, message: Message) {
        if self.conversation.commit(record.session_id, message.clone()) {
            self.emit(TurnEvent::MessageAppended {
                session_id: record.session_id,
                message: message.clone(),
            });
            record.appended.push(message);
        } else {
            self.discard(record);
        }
    }

    fn discard(&self, record: &mut TurnRecord) {
        if !record.discarded {
            warn!(
                session_id = %record.session_id,
                "session cleared mid-turn, discarding late result"
            );
            record.discarded = true;
            self.emit(TurnEvent::ResultDiscarded {
                session_id: record.session_id,
            });
        }
    }

    fn set_state(&self, session_id: Uuid, state: TurnState) {
        debug!(%session_id, %state, "turn state");
        self.emit(TurnEvent::StateChanged { session_id, state });
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
