//! Events emitted by the turn pipeline for display collaborators.
//!
//! Audio is reported by size only. Consumers that need the bytes take them
//! from the [`TurnOutcome`](super::TurnOutcome).

use crate::conversation::Message;
use uuid::Uuid;

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Validating,
    CrisisReply,
    BackendCall,
    ToneFiltering,
    Synthesizing,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::CrisisReply => "crisis_reply",
            Self::BackendCall => "backend_call",
            Self::ToneFiltering => "tone_filtering",
            Self::Synthesizing => "synthesizing",
        };
        f.write_str(name)
    }
}

/// What the pipeline is doing "right now".
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// The in-flight turn moved to a new state.
    StateChanged { session_id: Uuid, state: TurnState },
    /// A message was committed to the transcript.
    MessageAppended { session_id: Uuid, message: Message },
    /// Speech audio for an agent message is ready for playback.
    AudioReady {
        session_id: Uuid,
        message_id: Uuid,
        bytes: usize,
    },
    /// A late result was dropped because the session was cleared mid-turn.
    ResultDiscarded { session_id: Uuid },
    /// Memory was cleared; `session_id` is the new session.
    MemoryCleared { session_id: Uuid },
}
