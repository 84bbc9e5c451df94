//! Call boundary to the native whisper library.
//!
//! A native context is only ever named by a [`ContextHandle`]; `0` is the
//! invalid handle on both sides of the boundary. None of these calls may run
//! concurrently against the same handle; [`crate::transcription::SerialContext`]
//! is what guarantees that.

#[cfg(feature = "whisper")]
pub mod whisper;

use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::model::AssetSource;
use crate::transcription::Segment;

#[cfg(feature = "whisper")]
pub use whisper::{WhisperCppLib, WhisperOptions};

/// Opaque identifier of one native context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(u64);

impl ContextHandle {
    pub const INVALID: ContextHandle = ContextHandle(0);

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

pub trait WhisperLib: Send + Sync + 'static {
    fn init_from_path(&self, path: &Path) -> ContextHandle;

    fn init_from_reader(&self, reader: &mut dyn Read) -> ContextHandle;

    fn init_from_asset(&self, assets: &AssetSource, asset_path: &str) -> ContextHandle;

    /// Runs inference; results stay inside the context until drained.
    fn full_transcribe(
        &self,
        handle: ContextHandle,
        n_threads: usize,
        samples: &[f32],
        duration_ms: u64,
    ) -> Result<()>;

    /// Every segment of the last `full_transcribe`, in emission order.
    fn drain_segments(&self, handle: ContextHandle) -> Result<Vec<Segment>>;

    fn free_context(&self, handle: ContextHandle);

    fn bench_memcpy(&self, n_threads: usize) -> Result<String>;

    fn bench_mul_mat(&self, n_threads: usize) -> Result<String>;

    fn system_info(&self) -> String;
}
