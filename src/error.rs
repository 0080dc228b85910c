//! Error types for the sahayak turn pipeline.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`SahayakError::code()`].
//! None of these errors is fatal: the pipeline recovers every one of them with
//! a canned agent message and the session stays usable for the next turn.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Input was empty or whitespace-only.
    pub const EMPTY_INPUT: &str = "EMPTY_INPUT";

    /// Input matched a crisis pattern (a routing branch, not a failure).
    pub const CRISIS_DETECTED: &str = "CRISIS_DETECTED";

    /// Remote text generation failed.
    pub const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";

    /// Remote speech synthesis failed or returned no audio.
    pub const SPEECH_UNAVAILABLE: &str = "SPEECH_UNAVAILABLE";

    /// A turn was started while another was still in flight.
    pub const TURN_IN_FLIGHT: &str = "TURN_IN_FLIGHT";

    /// Invalid configuration or phrase book.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Filesystem error.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Top-level error type for the conversation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SahayakError {
    /// The user turn had no content.
    #[error("[{}] input is empty", error_codes::EMPTY_INPUT)]
    EmptyInput,

    /// The user turn matched a crisis pattern.
    #[error("[{}] crisis phrasing detected", error_codes::CRISIS_DETECTED)]
    CrisisDetected,

    /// Text generation failed; the chat handle has been invalidated.
    #[error("[{}] {}", error_codes::BACKEND_UNAVAILABLE, .0)]
    BackendUnavailable(String),

    /// Speech synthesis failed or produced no audio payload.
    #[error("[{}] {}", error_codes::SPEECH_UNAVAILABLE, .0)]
    SpeechUnavailable(String),

    /// Another turn is still being processed for this session.
    #[error("[{}] a turn is already in flight", error_codes::TURN_IN_FLIGHT)]
    TurnInFlight,

    /// Configuration error.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl SahayakError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => error_codes::EMPTY_INPUT,
            Self::CrisisDetected => error_codes::CRISIS_DETECTED,
            Self::BackendUnavailable(_) => error_codes::BACKEND_UNAVAILABLE,
            Self::SpeechUnavailable(_) => error_codes::SPEECH_UNAVAILABLE,
            Self::TurnInFlight => error_codes::TURN_IN_FLIGHT,
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SahayakError>;
