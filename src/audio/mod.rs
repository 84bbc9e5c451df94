pub mod resample;
pub mod wav;

/// Rate whisper models are trained on; used whenever the caller gives none.
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Mono PCM samples handed to a single transcription call.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>) -> Self {
        Self::with_sample_rate(samples, DEFAULT_SAMPLE_RATE)
    }

    pub fn with_sample_rate(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        audio_duration_ms(self.samples.len(), self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// `floor(sample_count * 1000 / sample_rate)`, or 0 for a zero rate.
pub fn audio_duration_ms(sample_count: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    sample_count as u64 * 1000 / sample_rate as u64
}
