use std::collections::HashMap;
use std::ffi::CStr;
use std::io::Read;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info};
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperError,
    WhisperState,
};

use super::{ContextHandle, WhisperLib};
use crate::error::{EngineError, Result};
use crate::model::AssetSource;
use crate::transcription::Segment;

/// Decoding options applied to every `full_transcribe`.
#[derive(Debug, Clone, Default)]
pub struct WhisperOptions {
    pub language: Option<String>,
    pub translate: bool,
}

/// whisper.cpp behind the handle boundary.
///
/// Each handle owns one `WhisperState` (which keeps its context alive).
/// The registry lock is only held to look a state up, so distinct handles
/// run inference in parallel.
pub struct WhisperCppLib {
    options: WhisperOptions,
    contexts: Mutex<HashMap<u64, Arc<Mutex<WhisperState>>>>,
    next_handle: AtomicU64,
}

impl WhisperCppLib {
    pub fn new(options: WhisperOptions) -> Self {
        Self {
            options,
            contexts: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    fn register(
        &self,
        context: std::result::Result<WhisperContext, WhisperError>,
        origin: &str,
    ) -> ContextHandle {
        let state = match context.and_then(|ctx| ctx.create_state()) {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to load Whisper model from {}: {}", origin, e);
                return ContextHandle::INVALID;
            }
        };

        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        match self.contexts.lock() {
            Ok(mut contexts) => {
                contexts.insert(raw, Arc::new(Mutex::new(state)));
                info!("Whisper model loaded from {} as context {:#x}", origin, raw);
                ContextHandle::from_raw(raw)
            }
            Err(_) => {
                error!("Whisper context registry poisoned");
                ContextHandle::INVALID
            }
        }
    }

    fn state(&self, handle: ContextHandle) -> Result<Arc<Mutex<WhisperState>>> {
        let contexts = self
            .contexts
            .lock()
            .map_err(|_| EngineError::native("context registry poisoned"))?;
        contexts
            .get(&handle.raw())
            .cloned()
            .ok_or(EngineError::NotInitialized)
    }

    fn from_buffer(&self, buffer: &[u8], origin: &str) -> ContextHandle {
        let context =
            WhisperContext::new_from_buffer_with_params(buffer, WhisperContextParameters::default());
        self.register(context, origin)
    }
}

impl Default for WhisperCppLib {
    fn default() -> Self {
        Self::new(WhisperOptions::default())
    }
}

impl WhisperLib for WhisperCppLib {
    fn init_from_path(&self, path: &Path) -> ContextHandle {
        let Some(path_str) = path.to_str() else {
            error!("Model path is not valid UTF-8: {:?}", path);
            return ContextHandle::INVALID;
        };
        let context =
            WhisperContext::new_with_params(path_str, WhisperContextParameters::default());
        self.register(context, path_str)
    }

    fn init_from_reader(&self, reader: &mut dyn Read) -> ContextHandle {
        let mut buffer = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buffer) {
            error!("Failed to read model stream: {}", e);
            return ContextHandle::INVALID;
        }
        self.from_buffer(&buffer, "input stream")
    }

    fn init_from_asset(&self, assets: &AssetSource, asset_path: &str) -> ContextHandle {
        match assets.read(asset_path) {
            Ok(buffer) => self.from_buffer(&buffer, asset_path),
            Err(e) => {
                error!("Failed to read asset {}: {}", asset_path, e);
                ContextHandle::INVALID
            }
        }
    }

    fn full_transcribe(
        &self,
        handle: ContextHandle,
        n_threads: usize,
        samples: &[f32],
        duration_ms: u64,
    ) -> Result<()> {
        let state = self.state(handle)?;
        let mut state = state
            .lock()
            .map_err(|_| EngineError::native("whisper state poisoned"))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(n_threads.min(c_int::MAX as usize) as c_int);
        params.set_duration_ms(duration_ms.min(c_int::MAX as u64) as c_int);
        params.set_language(self.options.language.as_deref());
        params.set_translate(self.options.translate);
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        // Note: full() expects f32, 16kHz
        state
            .full(params, samples)
            .map_err(|e| EngineError::native(format!("whisper_full failed: {}", e)))?;
        Ok(())
    }

    fn drain_segments(&self, handle: ContextHandle) -> Result<Vec<Segment>> {
        let state = self.state(handle)?;
        let state = state
            .lock()
            .map_err(|_| EngineError::native("whisper state poisoned"))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| EngineError::native(e.to_string()))?;
        let mut segments = Vec::with_capacity(num_segments.max(0) as usize);
        for i in 0..num_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| EngineError::native(e.to_string()))?;
            // whisper timestamps are in centiseconds
            let t0 = state
                .full_get_segment_t0(i)
                .map_err(|e| EngineError::native(e.to_string()))?;
            let t1 = state
                .full_get_segment_t1(i)
                .map_err(|e| EngineError::native(e.to_string()))?;
            segments.push(Segment::new(t0 * 10, t1 * 10, text));
        }
        debug!("Context {} produced {} segments", handle, segments.len());
        Ok(segments)
    }

    fn free_context(&self, handle: ContextHandle) {
        match self.contexts.lock() {
            Ok(mut contexts) => {
                if contexts.remove(&handle.raw()).is_some() {
                    info!("Freed whisper context {}", handle);
                }
            }
            Err(_) => error!("Whisper context registry poisoned, leaking {}", handle),
        }
    }

    fn bench_memcpy(&self, n_threads: usize) -> Result<String> {
        let report = unsafe {
            whisper_rs::whisper_rs_sys::whisper_bench_memcpy_str(n_threads as c_int)
        };
        report_to_string(report)
    }

    fn bench_mul_mat(&self, n_threads: usize) -> Result<String> {
        let report = unsafe {
            whisper_rs::whisper_rs_sys::whisper_bench_ggml_mul_mat_str(n_threads as c_int)
        };
        report_to_string(report)
    }

    fn system_info(&self) -> String {
        system_info()
    }
}

/// whisper.cpp build and CPU feature summary.
pub fn system_info() -> String {
    whisper_rs::print_system_info().to_string()
}

fn report_to_string(report: *const c_char) -> Result<String> {
    if report.is_null() {
        return Err(EngineError::native("benchmark returned no report"));
    }
    // Points at a static buffer inside whisper.cpp.
    let text = unsafe { CStr::from_ptr(report) };
    Ok(text.to_string_lossy().into_owned())
}
