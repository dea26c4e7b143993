//! Playback clock math: progress ratios, clamped seeks, timecode strings.
//!
//! Pure functions shared by per-stream state and the synchronized timeline.
//! Every function is total: out-of-range or non-finite inputs are clamped,
//! never reported as errors.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Normalized progress of `position` within `length`.
///
/// Zero-length streams always report 0 regardless of position.
pub fn compute_progress(position: Duration, length: Duration) -> f64 {
    if length.is_zero() {
        return 0.0;
    }
    (position.as_secs_f64() / length.as_secs_f64()).clamp(0.0, 1.0)
}

/// Move `current` by `delta_secs`, clamped to `[0, length]`.
///
/// Infinite deltas land on the bounds; NaN leaves the position where it was
/// (still clamped to `length`).
pub fn clamp_seek(current: Duration, delta_secs: f64, length: Duration) -> Duration {
    let target = current.as_secs_f64() + delta_secs;
    if target.is_nan() {
        return current.min(length);
    }
    from_secs_clamped(target, length)
}

/// Absolute position for a `ratio` of `length`. Ratio is clamped to `[0, 1]`.
///
/// Returns None for NaN ratios (nothing sensible to seek to).
pub fn position_at_ratio(ratio: f64, length: Duration) -> Option<Duration> {
    if ratio.is_nan() {
        return None;
    }
    let ratio = ratio.clamp(0.0, 1.0);
    Some(from_secs_clamped(length.as_secs_f64() * ratio, length))
}

// f64 -> Duration round trip may land a hair above `length`
fn from_secs_clamped(secs: f64, length: Duration) -> Duration {
    let secs = secs.clamp(0.0, length.as_secs_f64());
    Duration::try_from_secs_f64(secs).map_or(length, |d| d.min(length))
}

/// Render `H:MM:SS` for durations of an hour or more, else `MM:SS`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours >= 1 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Same as [`format_duration`] with hundredths appended (`MM:SS.hh`).
pub fn format_duration_precise(d: Duration) -> String {
    let hundredths = d.subsec_millis() / 10;
    format!("{}.{:02}", format_duration(d), hundredths)
}

/// Timecode style used for every display string of one controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timecode {
    #[default]
    Standard,
    Precise,
}

impl Timecode {
    pub fn format(self, d: Duration) -> String {
        match self {
            Timecode::Standard => format_duration(d),
            Timecode::Precise => format_duration_precise(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_progress_zero_length() {
        assert_eq!(compute_progress(secs(0.0), Duration::ZERO), 0.0);
        assert_eq!(compute_progress(secs(42.0), Duration::ZERO), 0.0);
    }

    #[test]
    fn test_progress_ratio_and_clamp() {
        assert_eq!(compute_progress(secs(30.0), secs(120.0)), 0.25);
        // Telemetry can overshoot the reported length
        assert_eq!(compute_progress(secs(130.0), secs(120.0)), 1.0);
    }

    #[test]
    fn test_clamp_seek_bounds() {
        let len = secs(90.0);
        assert_eq!(clamp_seek(secs(10.0), 5.0, len), secs(15.0));
        assert_eq!(clamp_seek(secs(10.0), -30.0, len), Duration::ZERO);
        assert_eq!(clamp_seek(secs(80.0), 30.0, len), len);
    }

    #[test]
    fn test_clamp_seek_extreme_deltas() {
        let len = secs(90.0);
        let cur = secs(45.0);
        for delta in [f64::MAX, f64::MIN, f64::INFINITY, f64::NEG_INFINITY, 1e300, -1e300] {
            let pos = clamp_seek(cur, delta, len);
            assert!(pos <= len, "delta {} gave {:?}", delta, pos);
        }
        assert_eq!(clamp_seek(cur, f64::INFINITY, len), len);
        assert_eq!(clamp_seek(cur, f64::NEG_INFINITY, len), Duration::ZERO);
        assert_eq!(clamp_seek(cur, f64::NAN, len), cur);
    }

    #[test]
    fn test_clamp_seek_zero_length() {
        assert_eq!(clamp_seek(Duration::ZERO, 10.0, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_position_at_ratio() {
        let len = secs(200.0);
        assert_eq!(position_at_ratio(0.5, len), Some(secs(100.0)));
        assert_eq!(position_at_ratio(-1.0, len), Some(Duration::ZERO));
        assert_eq!(position_at_ratio(7.0, len), Some(len));
        assert_eq!(position_at_ratio(f64::NAN, len), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(secs(0.0)), "00:00");
        assert_eq!(format_duration(secs(65.4)), "01:05");
        assert_eq!(format_duration(secs(3599.9)), "59:59");
        assert_eq!(format_duration(secs(3600.0)), "1:00:00");
        assert_eq!(format_duration(secs((3 * 3600 + 7 * 60 + 9) as f64)), "3:07:09");
    }

    #[test]
    fn test_format_duration_precise() {
        assert_eq!(format_duration_precise(Duration::from_millis(65_430)), "01:05.43");
        assert_eq!(Timecode::Precise.format(Duration::from_millis(1_005)), "00:01.00");
        assert_eq!(Timecode::Standard.format(Duration::from_millis(1_005)), "00:01");
    }
}
