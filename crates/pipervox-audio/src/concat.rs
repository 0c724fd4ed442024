//! Ordered, format-checked WAV concatenation.

use std::path::{Path, PathBuf};

use hound::WavSpec;
use tracing::{debug, warn};

use crate::error::AudioError;
use crate::wav::{describe_spec, read_wav, write_wav};

/// Merge `inputs`, in order, into a single WAV at `output`.
///
/// Every input after the first must match the first file's sample rate,
/// channel count, bit depth, and sample format exactly; any mismatch
/// fails the whole operation before the output file is created. The
/// per-sentence inputs are deleted once the merged file is on disk; a
/// single-element input list is accepted and simply rewritten.
pub fn concatenate_wav_files(inputs: &[PathBuf], output: &Path) -> Result<WavSpec, AudioError> {
    let Some((first_path, rest)) = inputs.split_first() else {
        return Err(AudioError::NoInput);
    };

    let first = read_wav(first_path)?;
    let spec = first.spec;
    let mut combined = first.samples;

    for path in rest {
        let buffer = read_wav(path)?;
        if buffer.spec != spec {
            return Err(AudioError::FormatMismatch {
                path: path.clone(),
                expected: describe_spec(&spec),
                found: describe_spec(&buffer.spec),
            });
        }
        combined.extend(buffer.samples);
    }

    write_wav(output, spec, &combined)?;
    debug!(
        files = inputs.len(),
        samples = combined.len(),
        output = %output.display(),
        "wav concatenation complete"
    );

    for path in inputs {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove intermediate wav");
        }
    }

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavWriter};

    fn write_fixture(path: &Path, sample_rate: u32, samples: &[i16]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn concatenates_in_order_and_removes_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        let out = dir.path().join("out.wav");
        write_fixture(&a, 22_050, &[1, 2, 3]);
        write_fixture(&b, 22_050, &[4, 5]);

        let spec = concatenate_wav_files(&[a.clone(), b.clone()], &out).unwrap();
        assert_eq!(spec.sample_rate, 22_050);

        let merged = read_wav(&out).unwrap();
        assert_eq!(merged.sample_count(), 5);
        match merged.samples {
            crate::SampleData::Int(values) => assert_eq!(values, vec![1, 2, 3, 4, 5]),
            crate::SampleData::Float(_) => panic!("expected integer samples"),
        }
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn sample_rate_mismatch_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        let out = dir.path().join("out.wav");
        write_fixture(&a, 22_050, &[1, 2, 3]);
        write_fixture(&b, 44_100, &[4, 5]);

        let err = concatenate_wav_files(&[a.clone(), b.clone()], &out).unwrap_err();
        assert!(matches!(err, AudioError::FormatMismatch { .. }));
        assert!(!out.exists(), "mismatch must not produce an output file");
        // Inputs are kept on failure so the caller can clean up.
        assert!(a.exists());
        assert!(b.exists());
    }

    #[test]
    fn single_input_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let out = dir.path().join("out.wav");
        write_fixture(&a, 16_000, &[7, 8, 9]);

        concatenate_wav_files(&[a.clone()], &out).unwrap();
        let merged = read_wav(&out).unwrap();
        assert_eq!(merged.sample_count(), 3);
        assert!(!a.exists());
    }

    #[test]
    fn empty_input_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.wav");
        let err = concatenate_wav_files(&[], &out).unwrap_err();
        assert!(matches!(err, AudioError::NoInput));
    }

    #[test]
    fn missing_input_reports_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.wav");
        let out = dir.path().join("out.wav");
        let err = concatenate_wav_files(&[missing], &out).unwrap_err();
        assert!(matches!(err, AudioError::Decode { .. }));
    }
}
