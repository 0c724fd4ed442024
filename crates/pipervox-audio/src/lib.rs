//! WAV handling for Pipervox
//!
//! Decodes the per-sentence WAV files produced by the synthesis engine
//! and merges them, in order, into a single output file. Merging fails
//! closed on any format disagreement; there is no best-effort mixing.

pub mod concat;
pub mod error;
pub mod wav;

pub use concat::concatenate_wav_files;
pub use error::AudioError;
pub use wav::{read_wav, write_wav, AudioBuffer, SampleData};
