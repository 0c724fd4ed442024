//! Parallel fan-out of sentence synthesis with ordered fan-in.
//!
//! One queue task is submitted per sentence. Results land in an
//! index-addressed slot array, so the returned artifact list always
//! follows the original sentence order no matter when each task
//! finishes. The first failure cancels every sibling task, the
//! artifacts already produced are deleted, and only the error is
//! returned; partial output never escapes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use pipervox_queue::TaskQueue;

use crate::engine::TtsEngine;
use crate::error::{TtsError, TtsResult};
use crate::types::SynthesisOptions;

/// Result of one sentence's synthesis task.
pub type SynthesisOutcome = Result<PathBuf, TtsError>;

const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(120);

pub struct SynthesisOrchestrator {
    queue: Arc<TaskQueue<SynthesisOutcome>>,
    engine: Arc<dyn TtsEngine>,
    task_timeout: Duration,
    work_dir: PathBuf,
}

impl SynthesisOrchestrator {
    pub fn new(queue: Arc<TaskQueue<SynthesisOutcome>>, engine: Arc<dyn TtsEngine>) -> Self {
        Self {
            queue,
            engine,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            work_dir: std::env::temp_dir(),
        }
    }

    /// Override the per-sentence deadline.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Override where per-sentence artifacts are written.
    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = dir;
        self
    }

    /// Synthesize every sentence and return one artifact per sentence,
    /// ordered by sentence index.
    pub async fn synthesize_batch(
        &self,
        sentences: &[String],
        model: &Path,
        options: &SynthesisOptions,
    ) -> TtsResult<Vec<PathBuf>> {
        if sentences.is_empty() {
            return Err(TtsError::InvalidInput("no sentences to synthesize".into()));
        }

        debug!(
            sentences = sentences.len(),
            engine = self.engine.name(),
            "starting synthesis batch"
        );
        let cancel = CancellationToken::new();

        let submissions = sentences.iter().enumerate().map(|(index, sentence)| {
            let engine = self.engine.clone();
            let text = sentence.clone();
            let model = model.to_path_buf();
            let options = *options;
            let output = self
                .work_dir
                .join(format!("tts_{index:04}_{:08x}.wav", fastrand::u32(..)));
            let cancel = cancel.clone();
            let timeout = self.task_timeout;
            async move {
                let outcome = self
                    .queue
                    .submit(synthesize_one(
                        engine, text, model, options, output, cancel, timeout,
                    ))
                    .await
                    .unwrap_or_else(|e| Err(TtsError::Queue(e)));
                (index, outcome)
            }
        });
        let results = futures::future::join_all(submissions).await;

        let mut artifacts: Vec<Option<PathBuf>> = vec![None; sentences.len()];
        let mut failures: Vec<(usize, TtsError)> = Vec::new();
        for (index, outcome) in results {
            match outcome {
                Ok(path) => artifacts[index] = Some(path),
                Err(e) => failures.push((index, e)),
            }
        }

        if !failures.is_empty() {
            for path in artifacts.iter().flatten() {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %e, "failed to remove sibling artifact");
                }
            }
            // Report the root failure, not a sibling that was merely
            // cancelled on its account; failures are index-ordered
            // because results are.
            let root = failures
                .iter()
                .position(|(_, e)| !matches!(e, TtsError::Cancelled))
                .unwrap_or(0);
            let (index, cause) = failures.swap_remove(root);
            error!(sentence = index + 1, error = %cause, "synthesis batch aborted");
            return Err(cause);
        }

        let ordered: Vec<PathBuf> = artifacts.into_iter().flatten().collect();
        debug!(artifacts = ordered.len(), "synthesis batch complete");
        Ok(ordered)
    }
}

/// Run one sentence through the engine under the batch's cancellation
/// token and the per-task deadline. Any failure other than cancellation
/// trips the token so sibling tasks stop instead of finishing doomed
/// work.
async fn synthesize_one(
    engine: Arc<dyn TtsEngine>,
    text: String,
    model: PathBuf,
    options: SynthesisOptions,
    output: PathBuf,
    cancel: CancellationToken,
    task_timeout: Duration,
) -> SynthesisOutcome {
    if cancel.is_cancelled() {
        return Err(TtsError::Cancelled);
    }

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(TtsError::Cancelled),
        synthesis = tokio::time::timeout(
            task_timeout,
            engine.synthesize_to_file(&text, &model, &options, &output, &cancel),
        ) => match synthesis {
            Ok(Ok(())) => Ok(output.clone()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TtsError::Timeout(task_timeout)),
        },
    };

    if let Err(e) = &result {
        if !matches!(e, TtsError::Cancelled) {
            warn!(error = %e, "sentence synthesis failed, cancelling batch");
            cancel.cancel();
        }
        let _ = tokio::fs::remove_file(&output).await;
    }
    result
}
