//! Piper TTS engine implementation for Pipervox

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use pipervox_tts::{SynthesisOptions, TtsEngine, TtsError, TtsResult};


/// Drives the `piper` command-line synthesizer: one process per
/// sentence, text on stdin, a single mono PCM WAV written to the
/// requested output path.
pub struct PiperEngine {
    binary: PathBuf,
    library_dir: Option<PathBuf>,
}

impl PiperEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            library_dir: None,
        }
    }

    /// Directory holding piper's bundled shared libraries (onnxruntime,
    /// espeak-ng, phonemize); prepended to `LD_LIBRARY_PATH` for the
    /// child process.
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn build_args(&self, model: &Path, options: &SynthesisOptions, output: &Path) -> Vec<OsString> {
        vec![
            OsString::from("-m"),
            model.as_os_str().to_os_string(),
            OsString::from("-f"),
            output.as_os_str().to_os_string(),
            OsString::from("--speaker"),
            OsString::from(options.speaker.to_string()),
            OsString::from("--noise-scale"),
            OsString::from(format!("{:.3}", options.noise_scale)),
            OsString::from("--length-scale"),
            OsString::from(format!("{:.3}", options.length_scale)),
            OsString::from("--noise-w"),
            OsString::from(format!("{:.3}", options.noise_w)),
        ]
    }

    /// `LD_LIBRARY_PATH` for the child: the configured library directory
    /// first, then whatever the host environment already has.
    fn library_search_path(&self) -> Option<OsString> {
        let dir = self.library_dir.as_ref()?;
        let mut value = OsString::from(dir.as_os_str());
        match std::env::var_os("LD_LIBRARY_PATH") {
            Some(existing) if !existing.is_empty() => {
                value.push(":");
                value.push(existing);
            }
            _ => value.push(":/usr/local/lib:/usr/lib:/lib"),
        }
        Some(value)
    }
}

#[async_trait]
impl TtsEngine for PiperEngine {
    fn name(&self) -> &str {
        "piper"
    }

    async fn is_available(&self) -> bool {
        match tokio::fs::metadata(&self.binary).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    async fn synthesize_to_file(
        &self,
        text: &str,
        model: &Path,
        options: &SynthesisOptions,
        output: &Path,
        cancel: &CancellationToken,
    ) -> TtsResult<()> {
        if text.trim().is_empty() {
            return Err(TtsError::InvalidInput("empty text input".into()));
        }

        let args = self.build_args(model, options, output);
        debug!(binary = %self.binary.display(), ?args, "spawning piper");

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = self.library_search_path() {
            command.env("LD_LIBRARY_PATH", path);
        }

        let mut child = command.spawn().map_err(|e| {
            TtsError::EngineNotAvailable(format!(
                "failed to start {}: {e}",
                self.binary.display()
            ))
        })?;

        // Drain stderr concurrently so a chatty process cannot fill the
        // pipe and stall before exiting.
        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut captured = String::new();
                let _ = pipe.read_to_string(&mut captured).await;
                captured
            })
        });

        if let Some(mut stdin) = child.stdin.take() {
            // A write error here usually means the process already died;
            // the exit status below carries the real diagnosis.
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                debug!(error = %e, "piper stdin write failed");
            }
            // Dropping the handle closes the pipe so piper sees EOF.
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("cancellation requested, killing piper process");
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(TtsError::Cancelled);
            }
            status = child.wait() => status?,
        };

        let diagnostics = match stderr_task {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            error!(%status, "piper synthesis failed");
            return Err(TtsError::Synthesis(format!(
                "piper exited with {status}: {}",
                diagnostics.trim()
            )));
        }

        match tokio::fs::metadata(output).await {
            Ok(_) => Ok(()),
            Err(_) => Err(TtsError::MissingOutput(output.to_path_buf())),
        }
    }
}
