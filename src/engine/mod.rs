//! The engine: owns a timeline and drives playback and rendering of it.

pub mod config;
pub(crate) mod playback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Receiver;

pub use config::{EngineConfig, PlaybackConfig};

use crate::clip::{
    AudioClip, Clip, ClipDescriptor, ComposedClip, DescriptorId, ImageClip, MovieClip,
};
use crate::engine::playback::DecodeWorkers;
use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::file::FileBackend;
use crate::media::image::is_still_image_path;
use crate::media::reader::MediaBackend;
use crate::media::writer::MediaWriter;
use crate::processor::PluginRegistry;
use crate::render::{ClipRenderer, RenderEvent, RenderHandle, RenderState};
use crate::timeline::TimelineState;

/// Owns a timeline plus everything needed to play or render it.
///
/// The timeline is a [`ComposedClip`] built with `config.clip`. While a render runs the
/// timeline lives inside the renderer and edits fail with [`MontageError::Configuration`]
/// until [`VideoEngine::finish_render`] hands it back.
pub struct VideoEngine {
    config: EngineConfig,
    backend: Arc<dyn MediaBackend>,
    registry: PluginRegistry,
    timeline: Option<ComposedClip>,
    renderer: ClipRenderer,
    workers: Option<DecodeWorkers>,
}

impl VideoEngine {
    pub fn new(config: EngineConfig, backend: Arc<dyn MediaBackend>) -> MontageResult<Self> {
        config.validate()?;
        let mut renderer = ClipRenderer::new();
        renderer.set_writer_opts(config.writer.clone());
        Ok(Self {
            timeline: Some(ComposedClip::new(config.clip)),
            config,
            backend,
            registry: PluginRegistry::with_builtins(),
            renderer,
            workers: None,
        })
    }

    /// Engine reading files from disk.
    pub fn with_file_backend(config: EngineConfig) -> MontageResult<Self> {
        let backend = Arc::new(FileBackend::new(config.clip.channels));
        Self::new(config, backend)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn MediaBackend> {
        &self.backend
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// `None` while the timeline is being rendered.
    pub fn timeline(&self) -> Option<&ComposedClip> {
        self.timeline.as_ref()
    }

    pub fn timeline_mut(&mut self) -> MontageResult<&mut ComposedClip> {
        self.timeline
            .as_mut()
            .ok_or_else(|| MontageError::configuration("the timeline is being rendered"))
    }

    /// Open `path` as the clip kind its contents call for.
    ///
    /// Stills become [`ImageClip`]s, sources with pictures [`MovieClip`]s and audio-only
    /// sources [`AudioClip`]s. Anything that cannot be probed or opened comes back failed.
    #[tracing::instrument(skip(self))]
    pub fn create_clip_from_file(&self, path: &Path) -> Clip {
        let settings = &self.config.clip;
        let backend = self.backend.as_ref();
        match backend.probe(path) {
            Ok(info) if info.still => ImageClip::open(backend, path, settings).into(),
            Ok(info) if info.has_video() => MovieClip::open(backend, path, settings).into(),
            Ok(info) if info.has_audio() => AudioClip::open(backend, path, settings).into(),
            Ok(_) => MovieClip::failed(
                path,
                MontageError::media_open(path, "no audio or video streams"),
                settings,
            )
            .into(),
            Err(e) => {
                tracing::warn!(error = %e, "probe failed");
                if is_still_image_path(path) {
                    ImageClip::open(backend, path, settings).into()
                } else {
                    MovieClip::failed(path, e, settings).into()
                }
            }
        }
    }

    /// Place `clip` on `[start, start + length)` above everything already on the timeline.
    pub fn add_clip(&mut self, clip: Clip, start: f64, length: f64) -> MontageResult<DescriptorId> {
        if !(length.is_finite() && length >= 0.0) {
            return Err(MontageError::validation(format!(
                "clip length must be finite and non-negative, got {length}"
            )));
        }
        self.timeline_mut()?.add_clip(clip, start, start + length)
    }

    /// [`VideoEngine::create_clip_from_file`] followed by [`VideoEngine::add_clip`].
    pub fn add_file(&mut self, path: &Path, start: f64, length: f64) -> MontageResult<DescriptorId> {
        let clip = self.create_clip_from_file(path);
        self.add_clip(clip, start, length)
    }

    pub fn move_clip(&mut self, id: DescriptorId, start: f64) -> MontageResult<()> {
        self.timeline_mut()?.move_clip(id, start)
    }

    pub fn trim_clip(&mut self, id: DescriptorId, start: f64, end: f64) -> MontageResult<()> {
        self.timeline_mut()?.trim_clip(id, start, end)
    }

    pub fn set_offset(&mut self, id: DescriptorId, offset: f64) -> MontageResult<()> {
        self.timeline_mut()?.set_clip_offset(id, offset)
    }

    /// Take a clip off the timeline. During playback its decoders are recovered first.
    pub fn remove_clip(&mut self, id: DescriptorId) -> MontageResult<ClipDescriptor> {
        if self.timeline_mut()?.descriptor(id).is_none() {
            return Err(MontageError::validation(format!(
                "no clip with descriptor id {}",
                id.0
            )));
        }
        let resume = self.playback_position();
        self.stop_playback();
        let removed = self.timeline_mut()?.remove_clip(id);
        if let Some(position) = resume {
            self.start_playback(position)?;
        }
        removed
    }

    pub fn descriptor(&self, id: DescriptorId) -> Option<&ClipDescriptor> {
        self.timeline.as_ref()?.descriptor(id)
    }

    pub fn descriptor_mut(&mut self, id: DescriptorId) -> Option<&mut ClipDescriptor> {
        self.timeline.as_mut()?.descriptor_mut(id)
    }

    /// Instantiate `identifier` from the registry and append it to clip `id`'s chain.
    pub fn add_processor(&mut self, id: DescriptorId, identifier: &str) -> MontageResult<()> {
        let controller = self.registry.create(identifier)?;
        let descriptor = self
            .descriptor_mut(id)
            .ok_or_else(|| MontageError::validation(format!("no clip with descriptor id {}", id.0)))?;
        descriptor.add_processor(controller);
        Ok(())
    }

    /// Receive [`RenderEvent`]s of subsequent renders.
    pub fn subscribe_render(&mut self) -> Receiver<RenderEvent> {
        self.renderer.subscribe()
    }

    /// Hand the timeline to the renderer and start writing `output`.
    ///
    /// Playback is stopped first. `writer` replaces the default `ffmpeg` writer. On a
    /// configuration error the timeline stays with the engine.
    #[tracing::instrument(skip(self, writer))]
    pub fn start_render(
        &mut self,
        output: PathBuf,
        writer: Option<Box<dyn MediaWriter>>,
    ) -> MontageResult<RenderHandle> {
        self.stop_playback();
        let timeline = self
            .timeline
            .take()
            .ok_or_else(|| MontageError::configuration("a render is already running"))?;
        self.renderer.set_clip_to_render(timeline.into());
        self.renderer.set_output_file(output);
        self.renderer.set_audio_settings(self.config.audio);
        self.renderer.set_video_settings(self.config.video);
        self.renderer.set_length(None);
        if let Some(writer) = writer {
            self.renderer.set_writer(writer);
        }
        if let Err(e) = self.renderer.start_rendering() {
            self.restore_timeline();
            return Err(e);
        }
        Ok(self.renderer.handle())
    }

    /// `true` from [`VideoEngine::start_render`] until [`VideoEngine::finish_render`].
    pub fn is_rendering(&self) -> bool {
        self.timeline.is_none()
    }

    /// Wait for the running render and take the timeline back.
    pub fn finish_render(&mut self) -> MontageResult<RenderState> {
        let result = self.renderer.wait();
        self.restore_timeline();
        result
    }

    fn restore_timeline(&mut self) {
        match self.renderer.take_clip() {
            Some(Clip::Composed(timeline)) => self.timeline = Some(*timeline),
            Some(other) => {
                tracing::error!(kind = ?other.kind(), "renderer returned a foreign clip");
            }
            None => {}
        }
    }

    /// Render synchronously: [`VideoEngine::start_render`] then [`VideoEngine::finish_render`].
    pub fn render(
        &mut self,
        output: PathBuf,
        writer: Option<Box<dyn MediaWriter>>,
    ) -> MontageResult<RenderState> {
        self.start_render(output, writer)?;
        self.finish_render()
    }

    pub fn is_playing(&self) -> bool {
        self.workers.is_some()
    }

    /// Timeline position of the next audio block while playing.
    pub fn playback_position(&self) -> Option<f64> {
        self.workers.as_ref()?;
        Some(self.timeline.as_ref()?.next_read_position())
    }

    /// Move every leaf decoder onto its own worker thread and play from `position`.
    #[tracing::instrument(skip(self))]
    pub fn start_playback(&mut self, position: f64) -> MontageResult<()> {
        if !position.is_finite() {
            return Err(MontageError::validation(format!(
                "playback position must be finite, got {position}"
            )));
        }
        self.stop_playback();
        let idle = self.config.playback.idle_sleep();
        let timeline = self.timeline_mut()?;
        timeline.set_next_read_position(position);
        let mut decoders = Vec::new();
        timeline.collect_decoders(&mut decoders);
        let workers = DecodeWorkers::spawn(decoders, idle);
        tracing::info!(position, workers = workers.len(), "playback started");
        self.workers = Some(workers);
        Ok(())
    }

    /// Join the decode workers and give every decoder back to its clip.
    pub fn stop_playback(&mut self) {
        let Some(workers) = self.workers.take() else {
            return;
        };
        let decoders = workers.stop();
        let Some(timeline) = self.timeline.as_mut() else {
            return;
        };
        for decoder in decoders {
            if let Some(orphan) = timeline.attach_decoder(decoder) {
                tracing::debug!(clip = orphan.clip_id().0, "dropping decoder of a removed clip");
            }
        }
        tracing::info!("playback stopped");
    }

    /// Jump to `position`; during playback the workers are restarted there.
    pub fn seek(&mut self, position: f64) -> MontageResult<()> {
        if self.is_playing() {
            return self.start_playback(position);
        }
        if !position.is_finite() {
            return Err(MontageError::validation(format!(
                "seek position must be finite, got {position}"
            )));
        }
        self.timeline_mut()?.set_next_read_position(position);
        Ok(())
    }

    /// Mix the next `frames` sample frames of the timeline. Never blocks on decoding: a
    /// starved clip contributes silence.
    pub fn next_audio_block(&mut self, frames: usize) -> MontageResult<AudioBlock> {
        let channels = self.config.clip.channels;
        let mut block = AudioBlock::silent(channels, frames);
        self.timeline_mut()?.read_next_audio_block(&mut block);
        Ok(block)
    }

    /// Composite the timeline at `secs`; `None` outside the timeline.
    pub fn frame_at(&mut self, secs: f64) -> MontageResult<Option<Arc<VideoFrame>>> {
        Ok(self.timeline_mut()?.read_frame_at(secs))
    }

    pub fn save_state(&self) -> MontageResult<TimelineState> {
        let timeline = self
            .timeline
            .as_ref()
            .ok_or_else(|| MontageError::configuration("the timeline is being rendered"))?;
        TimelineState::capture(timeline)
    }

    /// Replace the timeline with one rebuilt from `state`. Playback is stopped.
    pub fn load_state(&mut self, state: &TimelineState) -> MontageResult<()> {
        if self.timeline.is_none() {
            return Err(MontageError::configuration("the timeline is being rendered"));
        }
        let timeline = state.restore(self.backend.as_ref(), &self.registry, self.config.clip)?;
        self.stop_playback();
        self.timeline = Some(timeline);
        Ok(())
    }
}

impl Drop for VideoEngine {
    fn drop(&mut self) {
        self.stop_playback();
    }
}

impl std::fmt::Debug for VideoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoEngine")
            .field("config", &self.config)
            .field("rendering", &self.timeline.is_none())
            .field("playing", &self.is_playing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/engine.rs"]
mod tests;
