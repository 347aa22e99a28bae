use crate::foundation::error::{MontageError, MontageResult};

/// Two keyframe times closer than this are the same keyframe.
pub const TIME_EPSILON: f64 = 1e-9;

/// Interpolation between adjacent keyframes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Straight line between neighbours.
    #[default]
    Linear,
    /// Keep the earlier keyframe's value until the next one.
    Hold,
}

/// One automation point.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe {
    /// Time in seconds, relative to the owner (clip-local for descriptors).
    pub time: f64,
    /// Value at `time`.
    pub value: f64,
}

/// Keyframed scalar curve.
///
/// Keys are kept sorted with strictly increasing times. An empty curve evaluates to its
/// default value everywhere; outside the keyed span the first/last value holds.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AutomationCurve {
    keys: Vec<Keyframe>,
    #[serde(default)]
    interpolation: Interpolation,
    default: f64,
}

impl AutomationCurve {
    /// Empty curve evaluating to `default`.
    pub fn new(default: f64) -> Self {
        Self {
            keys: Vec::new(),
            interpolation: Interpolation::Linear,
            default,
        }
    }

    /// Build from arbitrary keyframes; they are sorted and must have distinct finite times.
    pub fn from_keyframes(
        default: f64,
        interpolation: Interpolation,
        mut keys: Vec<Keyframe>,
    ) -> MontageResult<Self> {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        let curve = Self {
            keys,
            interpolation,
            default,
        };
        curve.validate()?;
        Ok(curve)
    }

    /// Check ordering and finiteness; used after deserialization.
    pub fn validate(&self) -> MontageResult<()> {
        if !self.default.is_finite() {
            return Err(MontageError::validation("automation default must be finite"));
        }
        if self
            .keys
            .iter()
            .any(|k| !k.time.is_finite() || !k.value.is_finite())
        {
            return Err(MontageError::validation(
                "automation keyframes must be finite",
            ));
        }
        if !self
            .keys
            .windows(2)
            .all(|w| w[1].time - w[0].time > TIME_EPSILON)
        {
            return Err(MontageError::validation(
                "automation keyframe times must be strictly increasing",
            ));
        }
        Ok(())
    }

    /// Evaluate at `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return self.default;
        };
        let idx = self.keys.partition_point(|k| k.time <= t);
        if idx == 0 {
            return first.value;
        }
        if idx >= self.keys.len() {
            return last.value;
        }

        let a = self.keys[idx - 1];
        let b = self.keys[idx];
        match self.interpolation {
            Interpolation::Hold => a.value,
            Interpolation::Linear => {
                let f = (t - a.time) / (b.time - a.time);
                a.value + (b.value - a.value) * f
            }
        }
    }

    /// Insert a keyframe at `t`, replacing one already there.
    pub fn set_value(&mut self, t: f64, value: f64) -> MontageResult<()> {
        if !t.is_finite() || !value.is_finite() {
            return Err(MontageError::validation(
                "automation keyframes must be finite",
            ));
        }
        let idx = self.keys.partition_point(|k| k.time < t - TIME_EPSILON);
        match self.keys.get_mut(idx) {
            Some(k) if (k.time - t).abs() <= TIME_EPSILON => k.value = value,
            _ => self.keys.insert(idx, Keyframe { time: t, value }),
        }
        Ok(())
    }

    /// Remove the keyframe at `t`. Returns `false` if there was none.
    pub fn remove_keyframe(&mut self, t: f64) -> bool {
        match self
            .keys
            .iter()
            .position(|k| (k.time - t).abs() <= TIME_EPSILON)
        {
            Some(idx) => {
                self.keys.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every keyframe.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Keyframes in time order.
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Value of an empty curve.
    pub fn default_value(&self) -> f64 {
        self.default
    }

    pub fn set_default_value(&mut self, value: f64) {
        self.default = value;
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }
}

impl Default for AutomationCurve {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/automation/curve.rs"]
mod tests;
