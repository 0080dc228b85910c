//! Backend session adapter: one lazily-opened chat handle per conversation
//! session, plus stateless speech synthesis.
//!
//! The handle carries the backend's running turn history. It is seeded from
//! the caller's transcript only when it is opened; afterwards the handle's own
//! history is authoritative. Any text-generation failure drops the handle so
//! the next turn reopens it from a fresh seed. There is no retry.

use super::{GenerateRequest, SpeechRequest, SpeechSynthesizer, TextGenerator, Turn};
use crate::error::{Result, SahayakError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// An open chat context with the text backend.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    id: Uuid,
    session_id: Uuid,
    history: Vec<Turn>,
    opened_at: Instant,
}

impl ChatHandle {
    fn open(session_id: Uuid, seed: &[Turn]) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            history: seed.to_vec(),
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The conversation session this handle was opened for.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The running history sent with the next request.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }
}

/// Speech synthesis bound to one voice.
///
/// Stateless and cheap to clone, so callers can synthesize without holding
/// the adapter.
#[derive(Clone)]
pub struct SpeechVoice {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: String,
}

impl std::fmt::Debug for SpeechVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechVoice")
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

impl SpeechVoice {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, voice: impl Into<String>) -> Self {
        Self {
            synthesizer,
            voice: voice.into(),
        }
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Synthesize `text` with this voice.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::SpeechUnavailable`] when the call fails or the
    /// response carries no audio.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            text,
            voice: &self.voice,
        };
        match self.synthesizer.synthesize(request).await {
            Ok(Some(audio)) if !audio.is_empty() => Ok(audio),
            Ok(_) => Err(SahayakError::SpeechUnavailable(
                "no audio data returned".to_owned(),
            )),
            Err(e) => Err(SahayakError::SpeechUnavailable(e.to_string())),
        }
    }
}

/// Owns the chat handle and the two remote connections.
pub struct SessionAdapter {
    generator: Arc<dyn TextGenerator>,
    speech: SpeechVoice,
    system_instruction: String,
    handle: Option<ChatHandle>,
    handles_opened: u64,
}

impl std::fmt::Debug for SessionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAdapter")
            .field("generator", &self.generator.name())
            .field("voice", &self.speech.voice)
            .field("handle", &self.handle.as_ref().map(ChatHandle::id))
            .field("handles_opened", &self.handles_opened)
            .finish()
    }
}

impl SessionAdapter {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        system_instruction: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            speech: SpeechVoice::new(synthesizer, voice),
            system_instruction: system_instruction.into(),
            handle: None,
            handles_opened: 0,
        }
    }

    /// Send one user prompt through the chat handle.
    ///
    /// `prior_history` seeds the handle only when one has to be opened: there
    /// is none yet, the previous one was invalidated, or it belongs to an
    /// older `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::BackendUnavailable`] when the remote call
    /// fails. The handle is invalidated before returning.
    pub async fn send_turn(
        &mut self,
        session_id: Uuid,
        prompt: &str,
        prior_history: &[Turn],
    ) -> Result<String> {
        if self
            .handle
            .as_ref()
            .is_some_and(|h| h.session_id != session_id)
        {
            debug!(%session_id, "chat handle belongs to a cleared session, reopening");
            self.handle = None;
        }
        if self.handle.is_none() {
            self.handles_opened += 1;
            debug!(
                %session_id,
                seed_turns = prior_history.len(),
                "opening chat handle"
            );
        }
        let handle = self
            .handle
            .get_or_insert_with(|| ChatHandle::open(session_id, prior_history));

        let request = GenerateRequest {
            system_instruction: &self.system_instruction,
            history: &handle.history,
            prompt,
        };
        match self.generator.generate(request).await {
            Ok(reply) => {
                handle.history.push(Turn::user(prompt));
                handle.history.push(Turn::model(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                warn!(
                    provider = self.generator.name(),
                    error = %e,
                    "text generation failed, invalidating chat handle"
                );
                self.invalidate();
                Err(SahayakError::BackendUnavailable(e.to_string()))
            }
        }
    }

    /// Synthesize speech for `text` with the configured voice.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::SpeechUnavailable`] when the call fails or the
    /// response carries no audio.
    pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>> {
        self.speech.synthesize(text).await
    }

    /// A detached handle on the speech side of this adapter.
    pub fn speech(&self) -> SpeechVoice {
        self.speech.clone()
    }

    /// Drop the chat handle so the next turn opens a fresh one.
    ///
    /// Returns `true` if a handle was open.
    pub fn invalidate(&mut self) -> bool {
        let had_handle = self.handle.take().is_some();
        if had_handle {
            debug!("chat handle invalidated");
        }
        had_handle
    }

    pub fn handle(&self) -> Option<&ChatHandle> {
        self.handle.as_ref()
    }

    /// How many handles have been opened over the adapter's lifetime.
    pub fn handles_opened(&self) -> u64 {
        self.handles_opened
    }

    pub fn voice(&self) -> &str {
        self.speech.voice()
    }
}
