//! Keyframed parameter automation.
//!
//! [`curve::AutomationCurve`] is the plain value type; [`parameter::ParameterAutomation`] wraps
//! it for sharing between an editing thread and the mixing/render threads.

/// Keyframed scalar curves.
pub mod curve;
/// Shared automation with gesture latch and notifications.
pub mod parameter;

pub use curve::{AutomationCurve, Interpolation, Keyframe};
pub use parameter::{ParameterAutomation, ParameterEvent};
