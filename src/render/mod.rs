//! Offline rendering of a clip to a [`MediaWriter`](crate::media::writer::MediaWriter).

pub mod renderer;

pub use renderer::{ClipRenderer, RenderEvent, RenderHandle, RenderState};
