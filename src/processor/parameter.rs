use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::foundation::error::{MontageError, MontageResult};

/// Real-value range of a parameter with a skewed normalized mapping.
///
/// `to_real(n) = min + (max - min) * n^(1/skew)`; `skew == 1` is linear. The mapping is
/// monotonic for every positive skew.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParameterRange {
    /// Real value at normalized 0.
    pub min: f64,
    /// Real value at normalized 1.
    pub max: f64,
    /// Skew factor, must be positive.
    pub skew: f64,
}

impl ParameterRange {
    /// Linear range.
    pub fn new(min: f64, max: f64) -> MontageResult<Self> {
        Self::with_skew(min, max, 1.0)
    }

    /// Skewed range; values below 1 give more resolution near `min`.
    pub fn with_skew(min: f64, max: f64, skew: f64) -> MontageResult<Self> {
        if !(min.is_finite() && max.is_finite()) || min >= max {
            return Err(MontageError::validation(format!(
                "parameter range needs finite min < max, got [{min}, {max}]"
            )));
        }
        if !(skew.is_finite() && skew > 0.0) {
            return Err(MontageError::validation("parameter skew must be positive"));
        }
        Ok(Self { min, max, skew })
    }

    /// Map a normalized value (clamped to `[0, 1]`) to the real range.
    pub fn to_real(&self, normalized: f64) -> f64 {
        let n = normalized.clamp(0.0, 1.0);
        let p = if self.skew == 1.0 {
            n
        } else {
            n.powf(1.0 / self.skew)
        };
        self.min + (self.max - self.min) * p
    }

    /// Map a real value (clamped to the range) to `[0, 1]`.
    pub fn to_normalized(&self, real: f64) -> f64 {
        let p = ((real - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        if self.skew == 1.0 { p } else { p.powf(self.skew) }
    }
}

/// One automatable processor parameter.
///
/// The value is stored normalized in an atomic so the processing thread reads it without
/// locking. Every change raises the dirty flag, which the controller drains when it sends
/// update notifications.
#[derive(Debug)]
pub struct ProcessorParameter {
    id: String,
    name: String,
    range: ParameterRange,
    default_normalized: f64,
    normalized: AtomicU64,
    dirty: AtomicBool,
}

impl ProcessorParameter {
    /// New parameter starting at `default_real`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        range: ParameterRange,
        default_real: f64,
    ) -> Self {
        let default_normalized = range.to_normalized(default_real);
        Self {
            id: id.into(),
            name: name.into(),
            range,
            default_normalized,
            normalized: AtomicU64::new(default_normalized.to_bits()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Stable identifier, unique within a processor.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> ParameterRange {
        self.range
    }

    pub fn default_normalized(&self) -> f64 {
        self.default_normalized
    }

    /// Current value in `[0, 1]`.
    pub fn normalized(&self) -> f64 {
        f64::from_bits(self.normalized.load(Ordering::Relaxed))
    }

    /// Current value in the real range.
    pub fn real_value(&self) -> f64 {
        self.range.to_real(self.normalized())
    }

    /// Set from a normalized value. Returns `true` if the stored value changed.
    pub fn set_normalized(&self, value: f64) -> bool {
        let v = if value.is_nan() {
            self.default_normalized
        } else {
            value.clamp(0.0, 1.0)
        };
        let old = self.normalized.swap(v.to_bits(), Ordering::Relaxed);
        let changed = f64::from_bits(old) != v;
        if changed {
            self.dirty.store(true, Ordering::Release);
        }
        changed
    }

    /// Set from a real value.
    pub fn set_real_value(&self, value: f64) -> bool {
        self.set_normalized(self.range.to_normalized(value))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/processor/parameter.rs"]
mod tests;
