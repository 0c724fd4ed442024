//! Core types for synthesis requests.

use serde::{Deserialize, Serialize};

/// Numeric knobs forwarded to the synthesis engine for every sentence.
///
/// Field names match the wire format accepted by the hosting service,
/// so a partial JSON object deserializes with the remaining fields at
/// their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOptions {
    /// Speaker id for multi-speaker models.
    #[serde(default)]
    pub speaker: u32,
    /// Generator noise; higher values sound more varied.
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,
    /// Phoneme duration multiplier; values above 1.0 slow speech down.
    #[serde(default = "default_length_scale")]
    pub length_scale: f32,
    /// Phoneme width noise.
    #[serde(default = "default_noise_w")]
    pub noise_w: f32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            speaker: 0,
            noise_scale: default_noise_scale(),
            length_scale: default_length_scale(),
            noise_w: default_noise_w(),
        }
    }
}

fn default_noise_scale() -> f32 {
    0.667
}

fn default_length_scale() -> f32 {
    1.0
}

fn default_noise_w() -> f32 {
    0.8
}
