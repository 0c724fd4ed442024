//! Full-pipeline tests: segmentation, queue-bounded parallel synthesis,
//! and ordered WAV concatenation working together.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use pipervox_audio::{concatenate_wav_files, read_wav, write_wav, SampleData};
use pipervox_queue::TaskQueue;
use pipervox_text::split_sentences;
use pipervox_tts::{SynthesisOptions, SynthesisOrchestrator, TtsEngine, TtsError, TtsResult};

/// Synthesis stand-in writing a real mono 16-bit WAV whose sample count
/// tracks the sentence length, while recording peak concurrency.
struct StubEngine {
    sample_rate: u32,
    running: AtomicUsize,
    peak: AtomicUsize,
    fail_on: Option<String>,
}

impl StubEngine {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn stub_wav_samples(text: &str) -> Vec<i32> {
    (0..text.len() as i32 * 10).collect()
}

#[async_trait]
impl TtsEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn synthesize_to_file(
        &self,
        text: &str,
        _model: &Path,
        _options: &SynthesisOptions,
        output: &Path,
        cancel: &CancellationToken,
    ) -> TtsResult<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = async {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TtsError::Cancelled),
                _ = tokio::time::sleep(Duration::from_millis(30)) => {}
            }
            if self.fail_on.as_deref() == Some(text) {
                return Err(TtsError::Synthesis("injected failure".into()));
            }
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: self.sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            write_wav(output, spec, &SampleData::Int(stub_wav_samples(text)))
                .map_err(|e| TtsError::Synthesis(e.to_string()))?;
            Ok(())
        }
        .await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn orchestrator_with(
    engine: Arc<StubEngine>,
    capacity: usize,
    work_dir: &Path,
) -> SynthesisOrchestrator {
    let queue = Arc::new(TaskQueue::new(capacity));
    SynthesisOrchestrator::new(queue, engine).with_work_dir(work_dir.to_path_buf())
}

#[tokio::test]
async fn three_sentences_through_capacity_two_concatenate_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let sentences = split_sentences("Hello world. This is great! Are you sure?");
    assert_eq!(
        sentences,
        vec!["Hello world.", "This is great!", "¿Are you sure?"]
    );

    let engine = Arc::new(StubEngine::new(22_050));
    let orchestrator = orchestrator_with(engine.clone(), 2, dir.path());

    let artifacts = orchestrator
        .synthesize_batch(
            &sentences,
            Path::new("model.onnx"),
            &SynthesisOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(artifacts.len(), 3);
    assert!(engine.peak_concurrency() <= 2, "capacity was exceeded");

    let expected_total: usize = sentences.iter().map(|s| s.len() * 10).sum();
    let output = dir.path().join("final.wav");
    let spec = concatenate_wav_files(&artifacts, &output).unwrap();
    assert_eq!(spec.sample_rate, 22_050);

    let merged = read_wav(&output).unwrap();
    assert_eq!(merged.sample_count(), expected_total);

    // Per-sentence intermediates are cleaned up by the merge.
    for artifact in &artifacts {
        assert!(!artifact.exists());
    }
}

#[tokio::test]
async fn concatenated_samples_follow_sentence_order() {
    let dir = tempfile::tempdir().unwrap();
    let sentences: Vec<String> = vec![
        "La primera oración habla del mar.".into(),
        "La segunda oración habla del cielo enorme.".into(),
    ];
    let engine = Arc::new(StubEngine::new(16_000));
    let orchestrator = orchestrator_with(engine, 2, dir.path());

    let artifacts = orchestrator
        .synthesize_batch(
            &sentences,
            Path::new("model.onnx"),
            &SynthesisOptions::default(),
        )
        .await
        .unwrap();

    let output = dir.path().join("final.wav");
    concatenate_wav_files(&artifacts, &output).unwrap();
    let merged = read_wav(&output).unwrap();
    let first_len = stub_wav_samples(&sentences[0]).len();
    match merged.samples {
        SampleData::Int(values) => {
            // The stub's ramp restarts where the second sentence begins.
            assert_eq!(values[0], 0);
            assert_eq!(values[first_len], 0);
            assert_eq!(values[first_len - 1], first_len as i32 - 1);
        }
        SampleData::Float(_) => panic!("expected integer samples"),
    }
}

#[tokio::test]
async fn mid_batch_failure_leaves_no_artifacts_behind() {
    let dir = tempfile::tempdir().unwrap();
    let sentences: Vec<String> = vec![
        "La primera oración termina bien.".into(),
        "La segunda oración está condenada.".into(),
        "La tercera oración nunca se oirá.".into(),
    ];
    let engine =
        Arc::new(StubEngine::new(22_050).failing_on("La segunda oración está condenada."));
    let orchestrator = orchestrator_with(engine, 2, dir.path());

    let err = orchestrator
        .synthesize_batch(
            &sentences,
            Path::new("model.onnx"),
            &SynthesisOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TtsError::Synthesis(_)), "got {err:?}");

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(leftovers.is_empty(), "leftover files: {leftovers:?}");
}
