//! Text input capture.
//!
//! Hosts feed the pipeline raw transcribed or typed strings. A platform
//! speech recognizer would implement [`InputCapture`] the same way
//! [`LineCapture`] does for line-delimited text.

use crate::error::{Result, SahayakError};
use async_trait::async_trait;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Events produced by a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// One complete utterance or typed line.
    Transcript(String),
    /// The source failed; capture has stopped.
    Error(String),
}

/// A source of user input.
#[async_trait]
pub trait InputCapture: Send {
    /// Begin delivering events to `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if capture is already running or cannot start.
    async fn start(&mut self, events: mpsc::Sender<CaptureEvent>) -> Result<()>;

    /// Stop delivering events. Stopping an idle capture is a no-op.
    async fn stop(&mut self) -> Result<()>;
}

/// Captures one transcript per line from a blocking reader.
///
/// The reader runs on a detached OS thread, not the runtime's blocking pool:
/// a read parked on an idle terminal cannot be cancelled and must never hold
/// up runtime shutdown. [`InputCapture::stop`] only stops delivery.
pub struct LineCapture<R> {
    reader: Option<R>,
    running: Arc<AtomicBool>,
}

/// Line capture over standard input.
pub type StdinCapture = LineCapture<std::io::BufReader<std::io::Stdin>>;

impl StdinCapture {
    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }
}

impl<R> LineCapture<R>
where
    R: BufRead + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the reader thread is still delivering lines.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<R> InputCapture for LineCapture<R>
where
    R: BufRead + Send + 'static,
{
    async fn start(&mut self, events: mpsc::Sender<CaptureEvent>) -> Result<()> {
        let Some(reader) = self.reader.take() else {
            return Err(SahayakError::Config(
                "line capture was already started".to_owned(),
            ));
        };

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        std::thread::Builder::new()
            .name("sahayak-capture".to_owned())
            .spawn(move || {
                for line in reader.lines() {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    match line {
                        Ok(line) => {
                            if events.blocking_send(CaptureEvent::Transcript(line)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "capture read failed");
                            let _ = events.blocking_send(CaptureEvent::Error(e.to_string()));
                            break;
                        }
                    }
                }
                running.store(false, Ordering::Release);
                debug!("capture input closed");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                SahayakError::Io(e)
            })?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}
