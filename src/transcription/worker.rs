//! One worker thread per native context.
//!
//! whisper.cpp contexts must never be touched by two callers at once. Every
//! operation on a [`SerialContext`] becomes a job on an unbounded FIFO queue
//! drained by a single dedicated thread; the caller blocks on a one-shot reply
//! channel until its job has run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::segments::Segment;
use crate::ai::{ContextHandle, WhisperLib};
use crate::audio::AudioBuffer;
use crate::cpu;
use crate::error::{EngineError, Result};

type Job = Box<dyn FnOnce(&mut WorkerState) + Send>;

/// Everything the worker thread owns. Only jobs see it.
struct WorkerState {
    lib: Arc<dyn WhisperLib>,
    handle: ContextHandle,
    live: Arc<AtomicBool>,
}

impl WorkerState {
    fn ensure_live(&self) -> Result<ContextHandle> {
        if self.handle.is_valid() {
            Ok(self.handle)
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    fn free(&mut self) {
        if self.handle.is_valid() {
            self.lib.free_context(self.handle);
            self.handle = ContextHandle::INVALID;
        }
        self.live.store(false, Ordering::SeqCst);
    }
}

pub struct SerialContext {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    live: Arc<AtomicBool>,
    threads: Option<usize>,
}

impl SerialContext {
    /// Takes ownership of `handle` and starts its worker.
    ///
    /// `threads` overrides the per-call thread count hint.
    pub fn spawn(
        lib: Arc<dyn WhisperLib>,
        handle: ContextHandle,
        threads: Option<usize>,
    ) -> Result<Self> {
        if !handle.is_valid() {
            return Err(EngineError::init_failed("native layer returned an invalid handle"));
        }

        let name = format!("whisper-ctx-{}", handle);
        let live = Arc::new(AtomicBool::new(true));
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let state = WorkerState {
            lib: lib.clone(),
            handle,
            live: live.clone(),
        };

        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(state, rx));
        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                lib.free_context(handle);
                return Err(EngineError::init_failed(format!(
                    "failed to start worker thread: {}",
                    e
                )));
            }
        };

        info!("Started {}", name);
        Ok(Self {
            name,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            live,
            threads: threads.map(|n| n.max(1)),
        })
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Runs whisper on `audio` and returns every segment it emitted, unfiltered.
    pub fn transcribe(&self, audio: AudioBuffer) -> Result<Vec<Segment>> {
        let threads = self.threads;
        self.submit("transcribe", move |state| {
            let handle = state.ensure_live()?;
            let n_threads = threads.unwrap_or_else(cpu::preferred_thread_count);
            debug!("Selecting {} threads", n_threads);

            let duration_ms = audio.duration_ms();
            let t0 = Instant::now();
            state
                .lib
                .full_transcribe(handle, n_threads, &audio.samples, duration_ms)?;
            let segments = state.lib.drain_segments(handle)?;
            debug!(
                "Transcribed {} samples ({} ms of audio) in {:?}",
                audio.samples.len(),
                duration_ms,
                t0.elapsed()
            );
            Ok(segments)
        })
    }

    pub fn bench_memcpy(&self, n_threads: usize) -> Result<String> {
        self.submit("bench_memcpy", move |state| {
            state.ensure_live()?;
            state.lib.bench_memcpy(n_threads)
        })
    }

    pub fn bench_mul_mat(&self, n_threads: usize) -> Result<String> {
        self.submit("bench_mul_mat", move |state| {
            state.ensure_live()?;
            state.lib.bench_mul_mat(n_threads)
        })
    }

    /// Frees the native context after every job queued before it, then stops
    /// the worker. Calling it again is a no-op.
    pub fn release(&self) -> Result<()> {
        if !self.is_live() {
            debug!("{} already released", self.name);
            return Ok(());
        }

        let released = self.submit("release", |state| {
            state.free();
            Ok(())
        });
        match released {
            Ok(()) | Err(EngineError::NotInitialized) => {}
            Err(e) => return Err(e),
        }

        self.live.store(false, Ordering::SeqCst);
        self.shutdown();
        Ok(())
    }

    fn submit<T, F>(&self, op: &'static str, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut WorkerState) -> Result<T> + Send + 'static,
    {
        if !self.is_live() {
            return Err(EngineError::NotInitialized);
        }
        let sender = self
            .sender
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(EngineError::NotInitialized)?;

        let (reply_tx, reply_rx) = crossbeam_channel::bounded::<Result<T>>(1);
        let job: Job = Box::new(move |state| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(state)))
                .unwrap_or_else(|payload| {
                    Err(EngineError::native(format!(
                        "{} panicked: {}",
                        op,
                        panic_message(payload.as_ref())
                    )))
                });
            // The caller may have gone away; nothing to do then.
            let _ = reply_tx.send(outcome);
        });

        let sent = sender.send(job);
        drop(sender);
        if sent.is_err() {
            self.mark_dead(op);
            return Err(EngineError::NotInitialized);
        }

        match reply_rx.recv() {
            Ok(outcome) => {
                if let Err(e) = &outcome {
                    warn!("{} {} failed: {}", self.name, op, e);
                }
                outcome
            }
            Err(_) => {
                self.mark_dead(op);
                Err(EngineError::NotInitialized)
            }
        }
    }

    fn mark_dead(&self, op: &str) {
        if self.live.swap(false, Ordering::SeqCst) {
            error!("{} worker is gone (during {})", self.name, op);
        }
    }

    /// Closes the queue and joins the worker once it has drained.
    fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("{} worker panicked", self.name);
            }
        }
    }
}

impl Drop for SerialContext {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("release of {} on drop failed: {}", self.name, e);
        }
        self.shutdown();
    }
}

fn run(mut state: WorkerState, rx: Receiver<Job>) {
    debug!("Worker for context {} waiting for jobs", state.handle);
    while let Ok(job) = rx.recv() {
        job(&mut state);
    }
    // Queue closed without an explicit release.
    state.free();
    debug!("Worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
