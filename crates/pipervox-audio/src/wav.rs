//! WAV decode/encode built on `hound`.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::AudioError;

/// Decoded PCM samples plus their format description.
pub struct AudioBuffer {
    pub spec: WavSpec,
    pub samples: SampleData,
}

/// Sample storage matching the file's sample format. Integer formats up
/// to 32 bits are widened into `i32`.
pub enum SampleData {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            SampleData::Int(values) => values.len(),
            SampleData::Float(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `other`, which must hold the same sample representation.
    pub(crate) fn extend(&mut self, other: SampleData) {
        match (self, other) {
            (SampleData::Int(dst), SampleData::Int(src)) => dst.extend(src),
            (SampleData::Float(dst), SampleData::Float(src)) => dst.extend(src),
            // Callers compare WavSpecs (which include the sample format)
            // before appending, so mixed variants cannot occur.
            (SampleData::Int(_), SampleData::Float(_))
            | (SampleData::Float(_), SampleData::Int(_)) => {
                debug_assert!(false, "sample format mismatch slipped past spec check");
            }
        }
    }
}

impl AudioBuffer {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Read a whole WAV file into memory.
pub fn read_wav(path: &Path) -> Result<AudioBuffer, AudioError> {
    let mut reader = WavReader::open(path).map_err(|e| AudioError::Decode {
        path: path.to_path_buf(),
        source: e,
    })?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Int => SampleData::Int(
            reader
                .samples::<i32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AudioError::Decode {
                    path: path.to_path_buf(),
                    source: e,
                })?,
        ),
        SampleFormat::Float => SampleData::Float(
            reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AudioError::Decode {
                    path: path.to_path_buf(),
                    source: e,
                })?,
        ),
    };
    Ok(AudioBuffer { spec, samples })
}

/// Write samples out with the given format description.
pub fn write_wav(path: &Path, spec: WavSpec, samples: &SampleData) -> Result<(), AudioError> {
    let encode_err = |e: hound::Error| AudioError::Encode {
        path: path.to_path_buf(),
        source: e,
    };
    let mut writer = WavWriter::create(path, spec).map_err(encode_err)?;
    match samples {
        SampleData::Int(values) => {
            for &value in values {
                writer.write_sample(value).map_err(encode_err)?;
            }
        }
        SampleData::Float(values) => {
            for &value in values {
                writer.write_sample(value).map_err(encode_err)?;
            }
        }
    }
    writer.finalize().map_err(encode_err)
}

/// Human-readable format description used in mismatch errors.
pub(crate) fn describe_spec(spec: &WavSpec) -> String {
    format!(
        "{} Hz, {} channel(s), {}-bit",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    )
}
