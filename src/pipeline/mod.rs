//! Turn-processing pipeline.
//!
//! Every user turn flows through the same ordered stages:
//!
//! ```text
//! input → validate → crisis gate ─┬─ crisis reply ─────────────┐
//!                                 └─ backend call → tone filter ┴→ append → synthesize → playback
//! ```

pub mod events;
pub mod turn;

pub use events::{TurnEvent, TurnState};
pub use turn::{TurnOutcome, TurnPipeline, TurnRoute};
