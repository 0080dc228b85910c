//! Capability interfaces for the input-capture and playback collaborators.
//!
//! The pipeline has no opinion on how text is captured or how audio is
//! played; hosts plug in implementations of [`InputCapture`] and
//! [`Playback`] for their platform.

pub mod capture;
pub mod playback;

pub use capture::{CaptureEvent, InputCapture, LineCapture, StdinCapture};
pub use playback::{NullPlayback, Playback, WavFilePlayback};
