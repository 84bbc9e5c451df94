pub mod engine;
pub mod segments;
pub mod worker;

pub use engine::TranscriptionEngine;
pub use segments::{filter_segments, join_text, Segment, DEFAULT_TOLERANCE_MS};
pub use worker::SerialContext;
