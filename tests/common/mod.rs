//! In-memory stand-in for whisper.cpp that records every call and flags
//! overlapping or use-after-free access per handle.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use flowtype_engine::{AssetSource, ContextHandle, EngineError, Result, Segment, WhisperLib};

/// First sample value that makes `full_transcribe` wait for the gate.
pub const GATED: f32 = 9.0;
/// First sample value that makes `full_transcribe` fail.
pub const FAILING: f32 = -9.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub handle: u64,
    pub op: String,
    pub tag: i64,
    pub duration_ms: u64,
}

pub struct FakeWhisper {
    next_handle: AtomicU64,
    refuse_init: bool,
    segments: Mutex<Vec<Segment>>,
    call_delay: Duration,
    gate: Mutex<Option<Receiver<()>>>,

    in_flight: Mutex<HashSet<u64>>,
    pending: Mutex<HashMap<u64, Vec<Segment>>>,
    freed: Mutex<Vec<u64>>,
    calls: Mutex<Vec<Call>>,
    overlaps: AtomicUsize,
    use_after_free: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeWhisper {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            refuse_init: false,
            segments: Mutex::new(Vec::new()),
            call_delay: Duration::ZERO,
            gate: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            freed: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            overlaps: AtomicUsize::new(0),
            use_after_free: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Every init returns the invalid handle.
    pub fn refusing() -> Self {
        Self {
            refuse_init: true,
            ..Self::new()
        }
    }

    pub fn with_segments(segments: Vec<Segment>) -> Self {
        let fake = Self::new();
        *fake.segments.lock().unwrap() = segments;
        fake
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn with_gate(self, gate: Receiver<()>) -> Self {
        *self.gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn freed(&self) -> Vec<u64> {
        self.freed.lock().unwrap().clone()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn use_after_free(&self) -> usize {
        self.use_after_free.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next(&self) -> ContextHandle {
        if self.refuse_init {
            return ContextHandle::INVALID;
        }
        ContextHandle::from_raw(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    fn enter(&self, handle: ContextHandle, op: &str, tag: i64, duration_ms: u64) {
        if !self.in_flight.lock().unwrap().insert(handle.raw()) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if self.freed.lock().unwrap().contains(&handle.raw()) {
            self.use_after_free.fetch_add(1, Ordering::SeqCst);
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            handle: handle.raw(),
            op: op.to_string(),
            tag,
            duration_ms,
        });
    }

    fn leave(&self, handle: ContextHandle) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.in_flight.lock().unwrap().remove(&handle.raw());
    }
}

impl Default for FakeWhisper {
    fn default() -> Self {
        Self::new()
    }
}

impl WhisperLib for FakeWhisper {
    fn init_from_path(&self, _path: &Path) -> ContextHandle {
        self.next()
    }

    fn init_from_reader(&self, reader: &mut dyn Read) -> ContextHandle {
        let mut buf = Vec::new();
        if reader.read_to_end(&mut buf).is_err() || buf.is_empty() {
            return ContextHandle::INVALID;
        }
        self.next()
    }

    fn init_from_asset(&self, assets: &AssetSource, asset_path: &str) -> ContextHandle {
        match assets.read(asset_path) {
            Ok(_) => self.next(),
            Err(_) => ContextHandle::INVALID,
        }
    }

    fn full_transcribe(
        &self,
        handle: ContextHandle,
        _n_threads: usize,
        samples: &[f32],
        duration_ms: u64,
    ) -> Result<()> {
        let first = samples.first().copied().unwrap_or(0.0);
        self.enter(handle, "full", first as i64, duration_ms);

        if first == GATED {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
        }
        if !self.call_delay.is_zero() {
            thread::sleep(self.call_delay);
        }

        let outcome = if first == FAILING {
            self.pending.lock().unwrap().remove(&handle.raw());
            Err(EngineError::NativeCallFailure("decoder rejected audio".into()))
        } else {
            let segments = self.segments.lock().unwrap().clone();
            self.pending.lock().unwrap().insert(handle.raw(), segments);
            Ok(())
        };
        self.leave(handle);
        outcome
    }

    fn drain_segments(&self, handle: ContextHandle) -> Result<Vec<Segment>> {
        self.enter(handle, "drain", 0, 0);
        let segments = self
            .pending
            .lock()
            .unwrap()
            .remove(&handle.raw())
            .unwrap_or_default();
        self.leave(handle);
        Ok(segments)
    }

    fn free_context(&self, handle: ContextHandle) {
        self.enter(handle, "free", 0, 0);
        self.leave(handle);
        self.freed.lock().unwrap().push(handle.raw());
    }

    fn bench_memcpy(&self, n_threads: usize) -> Result<String> {
        Ok(format!("memcpy: {} threads", n_threads))
    }

    fn bench_mul_mat(&self, n_threads: usize) -> Result<String> {
        Ok(format!("mul_mat: {} threads", n_threads))
    }

    fn system_info(&self) -> String {
        "AVX = 0 | NEON = 1 | FAKE = 1".to_string()
    }
}
