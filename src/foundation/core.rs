use crate::foundation::error::{MontageError, MontageResult};

/// Absolute 0-based output frame index.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> MontageResult<Self> {
        if den == 0 {
            return Err(MontageError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(MontageError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Presentation time of `frame` in seconds.
    pub fn frame_to_secs(self, frame: FrameIndex) -> f64 {
        (frame.0 as f64) * self.frame_duration_secs()
    }

    /// Number of whole frames needed to cover `secs` (ceil semantics).
    pub fn frames_covering(self, secs: f64) -> u64 {
        let frames = secs.max(0.0) * self.as_f64();
        // Absorb float noise such as 8.000000001 frames.
        let rounded = frames.round();
        if (frames - rounded).abs() < 1e-9 {
            rounded as u64
        } else {
            frames.ceil() as u64
        }
    }

    /// First audio sample belonging to `frame`, rounded to the nearest sample.
    pub fn frame_to_sample(self, frame: FrameIndex, sample_rate: u32) -> u64 {
        let num = u128::from(frame.0) * u128::from(sample_rate) * u128::from(self.den);
        let den = u128::from(self.num);
        ((num + (den / 2)) / den) as u64
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated, non-empty canvas.
    pub fn new(width: u32, height: u32) -> MontageResult<Self> {
        if width == 0 || height == 0 {
            return Err(MontageError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }

    /// Byte length of one RGBA8 frame of this size.
    pub fn rgba_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Half-open time range `[start, end)` in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// Inclusive start.
    pub start: f64,
    /// Exclusive end.
    pub end: f64,
}

impl TimeRange {
    /// Create a validated range with finite bounds and `start <= end`.
    pub fn new(start: f64, end: f64) -> MontageResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(MontageError::validation("TimeRange bounds must be finite"));
        }
        if start > end {
            return Err(MontageError::validation("TimeRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Length in seconds.
    pub fn len_secs(self) -> f64 {
        self.end - self.start
    }

    /// Return `true` when the range is empty.
    pub fn is_empty(self) -> bool {
        self.end <= self.start
    }

    /// Return `true` when `t` is inside `[start, end)`.
    pub fn contains(self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    /// Intersection of two ranges, `None` when they do not overlap.
    pub fn intersect(self, other: Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Self { start, end })
    }
}

/// Convert seconds to a sample position, rounding to the nearest sample.
pub fn secs_to_samples(secs: f64, sample_rate: u32) -> i64 {
    (secs * f64::from(sample_rate)).round() as i64
}

/// Convert a sample position back to seconds.
pub fn samples_to_secs(samples: i64, sample_rate: u32) -> f64 {
    samples as f64 / f64::from(sample_rate)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
