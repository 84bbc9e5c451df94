//! Serialized access to whisper.cpp contexts.
//!
//! A whisper context is not thread-safe. [`TranscriptionEngine`] owns one
//! context and a dedicated worker thread; every call is queued on that worker
//! and the caller blocks until it completes. Results are cleaned of segments
//! stamped past the end of the submitted audio.
//!
//! ```no_run
//! # #[cfg(feature = "whisper")]
//! # fn demo() -> flowtype_engine::Result<()> {
//! use std::sync::Arc;
//! use flowtype_engine::{EngineConfig, TranscriptionEngine, WhisperCppLib};
//!
//! let lib = Arc::new(WhisperCppLib::default());
//! let engine = TranscriptionEngine::from_file(lib, "models/ggml-base.bin", &EngineConfig::default())?;
//! let text = engine.transcribe_to_text(vec![0.0; 16000], None)?;
//! println!("{}", text);
//! engine.release()?;
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod audio;
pub mod config;
pub mod cpu;
pub mod error;
pub mod model;
pub mod transcription;

pub use ai::{ContextHandle, WhisperLib};
#[cfg(feature = "whisper")]
pub use ai::{WhisperCppLib, WhisperOptions};
pub use audio::{audio_duration_ms, AudioBuffer, DEFAULT_SAMPLE_RATE};
pub use config::{ConfigStore, EngineConfig};
pub use cpu::preferred_thread_count;
pub use error::{EngineError, Result};
pub use model::{AssetSource, ModelManager};
pub use transcription::{
    filter_segments, Segment, SerialContext, TranscriptionEngine, DEFAULT_TOLERANCE_MS,
};
