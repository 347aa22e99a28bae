//! Parameterized audio/video processors hosted per clip descriptor.

use std::sync::Arc;

use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};

/// Built-in processors.
pub mod builtin;
/// Host wrapper with automation and notifications.
pub mod controller;
/// Parameters and their ranges.
pub mod parameter;
/// Identifier to factory lookup.
pub mod registry;

pub use controller::{ParameterChange, ProcessorController, ProcessorState};
pub use parameter::{ParameterRange, ProcessorParameter};
pub use registry::PluginRegistry;

#[derive(serde::Serialize, serde::Deserialize)]
struct ParameterValues(Vec<(String, f64)>);

/// Behaviour shared by audio and video processors.
pub trait Processor: Send {
    /// Display name.
    fn name(&self) -> &str;

    /// Parameters in a stable order.
    fn parameters(&self) -> &[Arc<ProcessorParameter>];

    /// Opaque state blob. The default stores normalized parameter values as JSON.
    fn get_state(&self) -> MontageResult<Vec<u8>> {
        let values = ParameterValues(
            self.parameters()
                .iter()
                .map(|p| (p.id().to_owned(), p.normalized()))
                .collect(),
        );
        serde_json::to_vec(&values).map_err(|e| MontageError::serde(e.to_string()))
    }

    /// Restore a blob produced by [`Processor::get_state`]. Unknown ids are ignored.
    fn set_state(&mut self, blob: &[u8]) -> MontageResult<()> {
        let values: ParameterValues =
            serde_json::from_slice(blob).map_err(|e| MontageError::plugin(e.to_string()))?;
        for (id, value) in values.0 {
            if let Some(p) = self.parameters().iter().find(|p| p.id() == id) {
                p.set_normalized(value);
            }
        }
        Ok(())
    }
}

/// Processor operating in place on interleaved audio.
pub trait AudioProcessor: Processor {
    /// Called before the first block and whenever the format changes.
    fn prepare(&mut self, sample_rate: u32, channels: u16, max_block_frames: usize);
    /// Process one block in place.
    fn process(&mut self, block: &mut AudioBlock);
}

/// Processor operating in place on premultiplied frames.
pub trait VideoProcessor: Processor {
    /// Called before the first frame and whenever the canvas changes.
    fn prepare(&mut self, canvas: Canvas);
    /// Process one frame in place.
    fn process(&mut self, frame: &mut VideoFrame);
}

/// A hosted processor of either kind.
pub enum ProcessorKind {
    Audio(Box<dyn AudioProcessor>),
    Video(Box<dyn VideoProcessor>),
}

impl ProcessorKind {
    pub(crate) fn as_processor(&self) -> &dyn Processor {
        match self {
            Self::Audio(p) => &**p,
            Self::Video(p) => &**p,
        }
    }

    pub(crate) fn as_processor_mut(&mut self) -> &mut dyn Processor {
        match self {
            Self::Audio(p) => &mut **p,
            Self::Video(p) => &mut **p,
        }
    }
}

impl std::fmt::Debug for ProcessorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio(p) => f.debug_tuple("Audio").field(&p.name()).finish(),
            Self::Video(p) => f.debug_tuple("Video").field(&p.name()).finish(),
        }
    }
}
