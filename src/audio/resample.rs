use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use super::AudioBuffer;
use crate::error::{EngineError, Result};

const CHUNK_SIZE: usize = 1024;

pub struct AudioResampler {
    resampler: FastFixedIn<f32>,
    input_buffer: Vec<f32>,
}

impl AudioResampler {
    pub fn new(source_rate: usize, target_rate: usize, chunk_size: usize) -> Result<Self> {
        let resampler = FastFixedIn::<f32>::new(
            target_rate as f64 / source_rate as f64,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| EngineError::audio(format!("resampler setup failed: {}", e)))?;

        Ok(Self {
            resampler,
            input_buffer: Vec::new(),
        })
    }

    /// Feeds samples and returns whatever full chunks produced.
    pub fn resample(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let mut output = Vec::new();
        let chunk_size = self.resampler.input_frames_next();

        self.input_buffer.extend_from_slice(input);

        while self.input_buffer.len() >= chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..chunk_size).collect();
            let mut resampled = self
                .resampler
                .process(std::slice::from_ref(&chunk), None)
                .map_err(|e| EngineError::audio(e.to_string()))?;
            output.append(&mut resampled[0]);
        }

        Ok(output)
    }

    /// Pushes the buffered tail plus one empty chunk so delayed frames come out.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let mut output = Vec::new();
        let tail: Vec<f32> = std::mem::take(&mut self.input_buffer);
        if !tail.is_empty() {
            let mut resampled = self
                .resampler
                .process_partial(Some(std::slice::from_ref(&tail)), None)
                .map_err(|e| EngineError::audio(e.to_string()))?;
            output.append(&mut resampled[0]);
        }
        let mut resampled = self
            .resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| EngineError::audio(e.to_string()))?;
        output.append(&mut resampled[0]);
        Ok(output)
    }

    pub fn output_delay(&self) -> usize {
        self.resampler.output_delay()
    }
}

/// Converts a whole buffer to `target_rate`, trimming resampler delay so the
/// result keeps the source duration.
pub fn resample_to(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if buffer.sample_rate == target_rate || buffer.is_empty() {
        return Ok(AudioBuffer::with_sample_rate(buffer.samples.clone(), target_rate));
    }
    if buffer.sample_rate == 0 || target_rate == 0 {
        return Err(EngineError::audio("cannot resample with a zero sample rate"));
    }

    let mut resampler =
        AudioResampler::new(buffer.sample_rate as usize, target_rate as usize, CHUNK_SIZE)?;
    let mut samples = resampler.resample(&buffer.samples)?;
    samples.extend(resampler.flush()?);

    let delay = resampler.output_delay().min(samples.len());
    samples.drain(..delay);
    let expected =
        (buffer.samples.len() as u64 * target_rate as u64 / buffer.sample_rate as u64) as usize;
    samples.truncate(expected);

    Ok(AudioBuffer::with_sample_rate(samples, target_rate))
}
