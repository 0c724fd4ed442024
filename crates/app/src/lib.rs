//! Pipervox hosting service
//!
//! HTTP boundary around the synthesis pipeline: model discovery,
//! runtime settings, and the convert endpoint that ties segmentation,
//! the task queue, the Piper engine, and WAV concatenation together.

pub mod models;
pub mod server;
pub mod settings;
