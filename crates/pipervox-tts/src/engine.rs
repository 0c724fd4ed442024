//! Engine abstraction implemented by concrete synthesis backends.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TtsResult;
use crate::types::SynthesisOptions;

/// Turns one sentence of text into one PCM WAV file on disk.
///
/// Implementations wrap an external synthesis process. They must stop
/// the underlying work promptly when `cancel` fires and must not leave
/// an output file behind on failure.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Engine name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Check whether the engine can run on this system.
    async fn is_available(&self) -> bool;

    /// Synthesize `text` with the voice model at `model` into a WAV file
    /// at `output`.
    async fn synthesize_to_file(
        &self,
        text: &str,
        model: &Path,
        options: &SynthesisOptions,
        output: &Path,
        cancel: &CancellationToken,
    ) -> TtsResult<()>;
}
