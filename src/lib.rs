//! Sahayak: a text-first mental-wellness conversation agent.
//!
//! Each user turn runs through a fixed pipeline:
//! input → crisis gate → generative backend → tone filter → transcript → speech
//!
//! # Architecture
//!
//! - **Safety**: regex crisis detection that bypasses the backend entirely
//! - **Backend**: Gemini text and speech over HTTP, behind small traits
//! - **Tone**: deterministic moderation of backend replies
//! - **Conversation**: in-memory transcript with session identity
//! - **Audio**: line/text capture and WAV playback sinks
//!
//! Phrase data (crisis patterns, softeners, advice terms, canned messages)
//! lives in a versioned [`PhraseBook`] that can be swapped from config.

pub mod audio;
pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod phrases;
pub mod pipeline;
pub mod safety;
pub mod tone;

pub use config::SahayakConfig;
pub use conversation::{ConversationSession, Message, Role, SharedConversation};
pub use error::{Result, SahayakError};
pub use phrases::PhraseBook;
pub use pipeline::{TurnEvent, TurnOutcome, TurnPipeline, TurnRoute, TurnState};
