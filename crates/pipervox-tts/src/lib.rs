//! Text-to-speech abstraction layer for Pipervox
//!
//! Defines the synthesis parameter types, the engine trait implemented
//! by concrete backends, and the parallel orchestrator that fans
//! sentence synthesis out through the bounded task queue and collects
//! the audio artifacts back in original sentence order.

pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use engine::TtsEngine;
pub use error::{TtsError, TtsResult};
pub use orchestrator::{SynthesisOrchestrator, SynthesisOutcome};
pub use types::SynthesisOptions;
