//! Text processing for speech synthesis
//!
//! This crate prepares free-form text for a sentence-at-a-time TTS engine:
//! punctuation and whitespace are canonicalized, the text is split into
//! independently synthesizable sentences, and model-specific find/replace
//! pairs can be applied ahead of segmentation.

pub mod normalize;
pub mod replace;
pub mod segment;

pub use normalize::normalize;
pub use replace::apply_replacements;
pub use segment::split_sentences;
