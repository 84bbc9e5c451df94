use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use super::segments::{filter_segments, join_text, Segment};
use super::worker::SerialContext;
use crate::ai::{ContextHandle, WhisperLib};
use crate::audio::AudioBuffer;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::AssetSource;

/// A loaded whisper model, safe to share between threads.
///
/// Calls from any number of threads are queued and run one at a time against
/// the model, in the order they were made.
pub struct TranscriptionEngine {
    context: SerialContext,
    tolerance_ms: u64,
    default_sample_rate: u32,
}

impl TranscriptionEngine {
    pub fn from_file<P: AsRef<Path>>(
        lib: Arc<dyn WhisperLib>,
        model_path: P,
        config: &EngineConfig,
    ) -> Result<Self> {
        let path = model_path.as_ref();
        let handle = lib.init_from_path(path);
        Self::wrap(lib, handle, config, || {
            format!("couldn't create context with path {:?}", path)
        })
    }

    pub fn from_reader<R: Read>(
        lib: Arc<dyn WhisperLib>,
        mut reader: R,
        config: &EngineConfig,
    ) -> Result<Self> {
        let handle = lib.init_from_reader(&mut reader);
        Self::wrap(lib, handle, config, || {
            "couldn't create context from input stream".to_string()
        })
    }

    pub fn from_asset(
        lib: Arc<dyn WhisperLib>,
        assets: &AssetSource,
        asset_path: &str,
        config: &EngineConfig,
    ) -> Result<Self> {
        let handle = lib.init_from_asset(assets, asset_path);
        Self::wrap(lib, handle, config, || {
            format!("couldn't create context from asset {}", asset_path)
        })
    }

    fn wrap(
        lib: Arc<dyn WhisperLib>,
        handle: ContextHandle,
        config: &EngineConfig,
        describe: impl FnOnce() -> String,
    ) -> Result<Self> {
        if !handle.is_valid() {
            return Err(EngineError::InitializationFailed(describe()));
        }
        let context = SerialContext::spawn(lib, handle, config.threads)?;
        info!("Transcription engine ready");
        Ok(Self {
            context,
            tolerance_ms: config.segment_tolerance_ms,
            default_sample_rate: config.default_sample_rate,
        })
    }

    /// Transcribes and concatenates the kept segment texts.
    pub fn transcribe_to_text(&self, samples: Vec<f32>, sample_rate: Option<u32>) -> Result<String> {
        let segments = self.transcribe_to_segments(samples, sample_rate)?;
        Ok(join_text(&segments))
    }

    /// Transcribes and returns the kept segments in emission order.
    ///
    /// Segments ending more than the configured tolerance past the end of
    /// the audio are dropped.
    pub fn transcribe_to_segments(
        &self,
        samples: Vec<f32>,
        sample_rate: Option<u32>,
    ) -> Result<Vec<Segment>> {
        let audio =
            AudioBuffer::with_sample_rate(samples, sample_rate.unwrap_or(self.default_sample_rate));
        let duration_ms = audio.duration_ms();

        let raw = self.context.transcribe(audio)?;
        let raw_count = raw.len();
        let kept = filter_segments(raw, duration_ms, self.tolerance_ms);
        if kept.len() < raw_count {
            debug!(
                "Dropped {} segment(s) ending past {} ms (+{} ms)",
                raw_count - kept.len(),
                duration_ms,
                self.tolerance_ms
            );
        }
        Ok(kept)
    }

    pub fn bench_memcpy(&self, n_threads: usize) -> Result<String> {
        self.context.bench_memcpy(n_threads)
    }

    pub fn bench_mul_mat(&self, n_threads: usize) -> Result<String> {
        self.context.bench_mul_mat(n_threads)
    }

    pub fn release(&self) -> Result<()> {
        self.context.release()
    }

    pub fn is_released(&self) -> bool {
        !self.context.is_live()
    }

    /// Build/CPU summary from the native library; needs no loaded model.
    pub fn system_info(lib: &dyn WhisperLib) -> String {
        lib.system_info()
    }
}
