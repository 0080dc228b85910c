//! Remote generative backends and the session adapter that owns the chat
//! handle.
//!
//! The remote services sit behind two small traits so the pipeline can be
//! driven by the Gemini client in production and by scripted fakes in tests:
//!
//! - [`TextGenerator`]: one stateless text-generation round trip.
//! - [`SpeechSynthesizer`]: one stateless speech-synthesis round trip.
//!
//! [`SessionAdapter`] layers the chat-handle lifecycle on top.

pub mod gemini;
pub mod session;

pub use gemini::{GeminiClient, GeminiConfig};
pub use session::{ChatHandle, SessionAdapter, SpeechVoice};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fixed persona constraint sent with every text request.
pub const SYSTEM_INSTRUCTION: &str = "You are Sahayak, a calm, friendly, empathetic \
mental-wellness assistant. Keep replies short (2-4 sentences). Validate feelings, avoid \
clinical advice, and offer one simple micro-step when suitable.";

/// Speaker role in the backend's turn format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One entry of backend chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Model, text)
    }
}

/// A text-generation request: the new prompt plus the running history.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub system_instruction: &'a str,
    pub history: &'a [Turn],
    pub prompt: &'a str,
}

/// A speech-synthesis request.
#[derive(Debug, Clone, Copy)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub voice: &'a str,
}

/// Failure reported by a remote backend call.
///
/// Carries the raw provider message for logging only; it never reaches the
/// transcript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Stateless generative text service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the provider name (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// Generate a reply to `request.prompt` given the prior history.
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, RemoteError>;
}

/// Stateless speech synthesis service.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `request.text`. `Ok(None)` means the provider answered
    /// without an audio payload.
    async fn synthesize(&self, request: SpeechRequest<'_>) -> Result<Option<Vec<u8>>, RemoteError>;
}
