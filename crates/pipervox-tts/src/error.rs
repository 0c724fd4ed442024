//! Error types for synthesis.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use pipervox_queue::QueueError;

#[derive(Debug, Error)]
pub enum TtsError {
    /// Engine binary missing or not runnable on this system.
    #[error("TTS engine not available: {0}")]
    EngineNotAvailable(String),

    /// The external synthesis call failed; carries captured diagnostics.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// The engine exited cleanly but the expected file never appeared.
    #[error("synthesis produced no output file: {}", .0.display())]
    MissingOutput(PathBuf),

    /// The per-sentence deadline elapsed.
    #[error("synthesis timed out after {0:?}")]
    Timeout(Duration),

    /// The batch was aborted because a sibling sentence failed.
    #[error("synthesis cancelled")]
    Cancelled,

    #[error("invalid text input: {0}")]
    InvalidInput(String),

    #[error("task queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TtsResult<T> = Result<T, TtsError>;
