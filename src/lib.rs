#![forbid(unsafe_code)]

pub mod automation;
pub mod clip;
pub mod engine;
pub mod fifo;
pub mod foundation;
pub mod media;
pub mod mixer;
pub mod processor;
pub mod render;
pub mod timeline;

pub use automation::{AutomationCurve, Interpolation, ParameterAutomation};
pub use clip::{
    AudioClip, Clip, ClipDescriptor, ClipKind, ClipSettings, ComposedClip, DescriptorId,
    ImageClip, MovieClip,
};
pub use engine::{EngineConfig, VideoEngine};
pub use foundation::buffer::{AudioBlock, VideoFrame};
pub use foundation::core::{Canvas, Fps, FrameIndex, TimeRange};
pub use foundation::error::{MontageError, MontageResult};
pub use media::MediaBackend;
pub use media::writer::{AudioSettings, MediaWriter, VideoSettings};
pub use processor::{PluginRegistry, ProcessorController};
pub use render::{ClipRenderer, RenderEvent, RenderHandle, RenderState};
pub use timeline::TimelineState;
