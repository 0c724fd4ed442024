use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio files to concatenate")]
    NoInput,

    #[error("audio format mismatch in {}: expected {expected}, found {found}", .path.display())]
    FormatMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: hound::Error,
    },

    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        source: hound::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
