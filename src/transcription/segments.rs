//! Timestamped segments and the trailing-hallucination filter

/// Overshoot allowed past the audio end before a segment is discarded.
pub const DEFAULT_TOLERANCE_MS: u64 = 200;

/// One timestamped piece of recognized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

impl Segment {
    pub fn new<S: Into<String>>(start_ms: i64, end_ms: i64, text: S) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// `[00:00:01.250 --> 00:00:02.000]`
    pub fn format_timestamp(&self) -> String {
        format!(
            "[{} --> {}]",
            format_ms(self.start_ms),
            format_ms(self.end_ms)
        )
    }
}

fn format_ms(ms: i64) -> String {
    let ms = ms.max(0);
    let hours = ms / 3_600_000;
    let minutes = ms / 60_000 % 60;
    let seconds = ms / 1000 % 60;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms % 1000)
}

/// Keeps segments with `end_ms <= duration_ms + tolerance_ms`, in order.
///
/// Whisper sometimes emits trailing segments stamped past the end of the
/// audio it was given; those never carry real speech.
pub fn filter_segments(segments: Vec<Segment>, duration_ms: u64, tolerance_ms: u64) -> Vec<Segment> {
    let limit = duration_ms.saturating_add(tolerance_ms);
    segments
        .into_iter()
        .filter(|s| s.end_ms <= 0 || (s.end_ms as u64) <= limit)
        .collect()
}

/// Concatenates segment texts with no separator.
pub fn join_text(segments: &[Segment]) -> String {
    let mut text = String::with_capacity(segments.len() * 16);
    for segment in segments {
        text.push_str(&segment.text);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_segments_past_tolerance() {
        let segments = vec![
            Segment::new(0, 900, "a"),
            Segment::new(900, 1150, "b"),
            Segment::new(1150, 2000, "c"),
        ];
        let kept = filter_segments(segments, 1000, DEFAULT_TOLERANCE_MS);
        assert_eq!(
            kept,
            vec![Segment::new(0, 900, "a"), Segment::new(900, 1150, "b")]
        );
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let segments = vec![Segment::new(1000, 1200, "x"), Segment::new(1200, 1201, "y")];
        let kept = filter_segments(segments, 1000, 200);
        assert_eq!(kept, vec![Segment::new(1000, 1200, "x")]);
    }

    #[test]
    fn test_overshoot_dropped_anywhere_in_list() {
        let segments = vec![
            Segment::new(0, 300, "one"),
            Segment::new(300, 5000, "bogus"),
            Segment::new(400, 600, "two"),
        ];
        let kept = filter_segments(segments, 1000, 0);
        assert_eq!(join_text(&kept), "onetwo");
    }

    #[test]
    fn test_join_empty() {
        assert_eq!(join_text(&[]), "");
    }

    #[test]
    fn test_format_timestamp() {
        let seg = Segment::new(1250, 3_723_004, "hi");
        assert_eq!(seg.format_timestamp(), "[00:00:01.250 --> 01:02:03.004]");
    }
}
