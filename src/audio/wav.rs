use std::path::Path;

use hound::{SampleFormat, WavReader};
use log::debug;

use super::AudioBuffer;
use crate::error::{EngineError, Result};

/// Reads a WAV file into normalized mono `f32` samples at its native rate.
pub fn decode_wav_file<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(EngineError::audio(format!(
                    "unsupported bit depth {}",
                    spec.bits_per_sample
                )));
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    debug!(
        "Decoded {:?}: {} samples @ {} Hz ({} ch, {} bit)",
        path.as_ref(),
        samples.len(),
        spec.sample_rate,
        channels,
        spec.bits_per_sample
    );

    Ok(AudioBuffer::with_sample_rate(samples, spec.sample_rate))
}
