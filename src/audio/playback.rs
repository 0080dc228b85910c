//! Playback sinks for synthesized speech.
//!
//! The speech backend returns raw 16-bit little-endian mono PCM. How it is
//! decoded and played is the sink's concern.

use crate::error::{Result, SahayakError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Receives raw audio bytes for playback.
pub trait Playback: Send + Sync {
    /// Hand one synthesized clip to the player.
    ///
    /// # Errors
    ///
    /// Returns an error if the clip cannot be played or stored.
    fn play(&self, audio: &[u8]) -> Result<()>;
}

/// Discards every clip.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayback;

impl Playback for NullPlayback {
    fn play(&self, audio: &[u8]) -> Result<()> {
        debug!(bytes = audio.len(), "discarding audio clip");
        Ok(())
    }
}

/// Writes each clip to a numbered WAV file in a directory.
#[derive(Debug)]
pub struct WavFilePlayback {
    dir: PathBuf,
    sample_rate: u32,
    next_clip: AtomicU64,
}

impl WavFilePlayback {
    /// Create the sink, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>, sample_rate: u32) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!("writing reply audio to {}", dir.display());
        Ok(Self {
            dir,
            sample_rate,
            next_clip: AtomicU64::new(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_wav(&self, path: &Path, audio: &[u8]) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| SahayakError::Io(std::io::Error::other(e)))?;
        for frame in audio.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([frame[0], frame[1]]))
                .map_err(|e| SahayakError::Io(std::io::Error::other(e)))?;
        }
        writer
            .finalize()
            .map_err(|e| SahayakError::Io(std::io::Error::other(e)))
    }
}

impl Playback for WavFilePlayback {
    fn play(&self, audio: &[u8]) -> Result<()> {
        let n = self.next_clip.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("reply-{n:04}.wav"));
        self.write_wav(&path, audio)?;
        debug!(bytes = audio.len(), path = %path.display(), "wrote reply audio");
        Ok(())
    }
}
