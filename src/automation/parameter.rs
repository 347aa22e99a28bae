use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::automation::curve::{AutomationCurve, Keyframe};
use crate::foundation::error::MontageResult;

/// Change notifications delivered to [`ParameterAutomation::subscribe`] receivers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterEvent {
    /// An interactive edit began.
    GestureStarted,
    /// A keyframe was written.
    ValueChanged {
        /// Keyframe time.
        time: f64,
        /// Keyframe value.
        value: f64,
        /// `true` when written between `start_gesture` and `end_gesture`.
        during_gesture: bool,
    },
    /// The interactive edit ended.
    GestureEnded,
}

/// Thread-shared automation curve with a gesture latch.
///
/// Mixer threads call [`value_at`](Self::value_at), which never blocks: if an editor thread
/// holds the write lock, the last computed value is returned instead.
#[derive(Debug)]
pub struct ParameterAutomation {
    curve: RwLock<AutomationCurve>,
    last_value: AtomicU64,
    gesture: AtomicBool,
    subscribers: Mutex<Vec<Sender<ParameterEvent>>>,
}

impl ParameterAutomation {
    pub fn new(curve: AutomationCurve) -> Self {
        let initial = curve.default_value();
        Self {
            curve: RwLock::new(curve),
            last_value: AtomicU64::new(initial.to_bits()),
            gesture: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Automation with no keyframes, evaluating to `default`.
    pub fn constant(default: f64) -> Self {
        Self::new(AutomationCurve::new(default))
    }

    /// Evaluate at `t` without blocking.
    pub fn value_at(&self, t: f64) -> f64 {
        match self.curve.try_read() {
            Some(curve) => {
                let v = curve.value_at(t);
                self.last_value.store(v.to_bits(), Ordering::Relaxed);
                v
            }
            None => self.last_value(),
        }
    }

    /// Most recently computed value.
    pub fn last_value(&self) -> f64 {
        f64::from_bits(self.last_value.load(Ordering::Relaxed))
    }

    /// Insert or replace a keyframe and notify subscribers.
    pub fn set_value(&self, t: f64, value: f64) -> MontageResult<()> {
        self.curve.write().set_value(t, value)?;
        self.notify(ParameterEvent::ValueChanged {
            time: t,
            value,
            during_gesture: self.is_gesture_active(),
        });
        Ok(())
    }

    /// `true` when the curve has keyframes. Never blocks; a locked curve counts as automated.
    pub fn is_automated(&self) -> bool {
        self.curve.try_read().is_none_or(|c| !c.is_empty())
    }

    pub fn remove_keyframe(&self, t: f64) -> bool {
        self.curve.write().remove_keyframe(t)
    }

    pub fn clear(&self) {
        self.curve.write().clear();
    }

    /// Snapshot of the keyframes.
    pub fn keyframes(&self) -> Vec<Keyframe> {
        self.curve.read().keyframes().to_vec()
    }

    /// Snapshot of the whole curve.
    pub fn curve(&self) -> AutomationCurve {
        self.curve.read().clone()
    }

    /// Swap in a new curve (state restore).
    pub fn replace_curve(&self, curve: AutomationCurve) {
        *self.curve.write() = curve;
    }

    /// Open a gesture. Returns `false` if one was already open.
    pub fn start_gesture(&self) -> bool {
        let opened = self
            .gesture
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if opened {
            self.notify(ParameterEvent::GestureStarted);
        }
        opened
    }

    /// Close the gesture. Returns `false` if none was open.
    pub fn end_gesture(&self) -> bool {
        let closed = self
            .gesture
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if closed {
            self.notify(ParameterEvent::GestureEnded);
        }
        closed
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture.load(Ordering::Acquire)
    }

    /// Receive every future [`ParameterEvent`].
    pub fn subscribe(&self) -> Receiver<ParameterEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn notify(&self, event: ParameterEvent) {
        // Receivers that hung up are dropped.
        self.subscribers.lock().retain(|tx| tx.send(event).is_ok());
    }
}

impl Default for ParameterAutomation {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/automation/parameter.rs"]
mod tests;
