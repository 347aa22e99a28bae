use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::clip::Clip;
use crate::clip::decoder::remix_interleaved;
use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::ffmpeg_writer::{FfmpegWriter, FfmpegWriterOpts};
use crate::media::writer::{AudioSettings, MediaWriter, VideoSettings, WriterSettings};
use crate::mixer::composite::scale_to;

/// Lifecycle of a [`ClipRenderer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Rendering,
    Completed,
    Failed { message: String },
    Cancelled,
}

impl RenderState {
    /// `true` for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// Notifications published by the render thread.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderEvent {
    /// Fraction of output frames written, in `[0, 1]`.
    Progress(f64),
    /// The render reached a terminal state.
    Finished(RenderState),
}

#[derive(Debug)]
struct Shared {
    state: Mutex<RenderState>,
    progress: AtomicU64,
    cancel: AtomicBool,
}

impl Shared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RenderState::Idle),
            progress: AtomicU64::new(0f64.to_bits()),
            cancel: AtomicBool::new(false),
        })
    }

    fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Acquire))
    }

    fn set_progress(&self, value: f64) {
        self.progress.store(value.to_bits(), Ordering::Release);
    }
}

/// Cloneable control for a running render.
#[derive(Clone, Debug)]
pub struct RenderHandle {
    shared: Arc<Shared>,
}

impl RenderHandle {
    /// Ask the render thread to stop after the current frame.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    pub fn progress(&self) -> f64 {
        self.shared.progress()
    }

    pub fn state(&self) -> RenderState {
        self.shared.state.lock().clone()
    }
}

struct RenderJob {
    clip: Clip,
    writer: Box<dyn MediaWriter>,
    settings: WriterSettings,
    total_frames: u64,
    shared: Arc<Shared>,
    events: Vec<Sender<RenderEvent>>,
}

struct RenderOutcome {
    clip: Clip,
    state: RenderState,
    error: Option<MontageError>,
}

/// Offline renderer: pulls a clip frame by frame on its own thread and feeds a [`MediaWriter`].
///
/// State machine `Idle -> Rendering -> Completed | Failed | Cancelled`.
pub struct ClipRenderer {
    clip: Option<Clip>,
    output: Option<PathBuf>,
    audio: Option<AudioSettings>,
    video: Option<VideoSettings>,
    writer: Option<Box<dyn MediaWriter>>,
    writer_opts: FfmpegWriterOpts,
    length: Option<f64>,
    shared: Arc<Shared>,
    listeners: Vec<Sender<RenderEvent>>,
    thread: Option<JoinHandle<RenderOutcome>>,
}

impl Default for ClipRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipRenderer {
    pub fn new() -> Self {
        Self {
            clip: None,
            output: None,
            audio: None,
            video: None,
            writer: None,
            writer_opts: FfmpegWriterOpts::default(),
            length: None,
            shared: Shared::new(),
            listeners: Vec::new(),
            thread: None,
        }
    }

    pub fn set_clip_to_render(&mut self, clip: Clip) {
        self.clip = Some(clip);
    }

    pub fn set_output_file(&mut self, path: impl Into<PathBuf>) {
        self.output = Some(path.into());
    }

    pub fn set_audio_settings(&mut self, settings: AudioSettings) {
        self.audio = Some(settings);
    }

    pub fn set_video_settings(&mut self, settings: VideoSettings) {
        self.video = Some(settings);
    }

    /// Use `writer` instead of an [`FfmpegWriter`] for the output path.
    pub fn set_writer(&mut self, writer: Box<dyn MediaWriter>) {
        self.writer = Some(writer);
    }

    /// Options for the default [`FfmpegWriter`].
    pub fn set_writer_opts(&mut self, opts: FfmpegWriterOpts) {
        self.writer_opts = opts;
    }

    /// Render `[0, length)` instead of the clip's whole duration.
    pub fn set_length(&mut self, length: Option<f64>) {
        self.length = length;
    }

    pub fn state(&self) -> RenderState {
        self.shared.state.lock().clone()
    }

    /// Fraction of frames written, monotonically increasing during a render.
    pub fn progress(&self) -> f64 {
        self.shared.progress()
    }

    pub fn is_rendering(&self) -> bool {
        self.state() == RenderState::Rendering
    }

    /// Receive [`RenderEvent`]s of subsequent renders.
    pub fn subscribe(&mut self) -> Receiver<RenderEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.listeners.push(tx);
        rx
    }

    pub fn handle(&self) -> RenderHandle {
        RenderHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn missing(what: &str) -> MontageError {
        MontageError::configuration(format!("cannot start rendering: no {what} set"))
    }

    /// Validate the configuration and spawn the render thread.
    ///
    /// Missing clip, output file or settings fail with [`MontageError::Configuration`] and leave
    /// the renderer untouched.
    #[tracing::instrument(skip(self), fields(output = ?self.output))]
    pub fn start_rendering(&mut self) -> MontageResult<()> {
        if self.thread.is_some() {
            return Err(MontageError::configuration("a render is already running"));
        }
        let clip = self.clip.as_ref().ok_or_else(|| Self::missing("clip"))?;
        let output = self.output.clone().ok_or_else(|| Self::missing("output file"))?;
        let audio = self.audio.ok_or_else(|| Self::missing("audio settings"))?;
        let video = self.video.ok_or_else(|| Self::missing("video settings"))?;
        audio.validate()?;
        video.validate()?;

        let info = clip.info();
        if info.has_audio && info.sample_rate != audio.sample_rate {
            return Err(MontageError::configuration(format!(
                "clip produces {} Hz audio but the output is {} Hz",
                info.sample_rate, audio.sample_rate
            )));
        }
        if !clip.decoders_attached() {
            return Err(MontageError::configuration(
                "clip decoders are detached for playback",
            ));
        }
        let length = self
            .length
            .or(info.duration)
            .ok_or_else(|| MontageError::configuration("render length is unknown for this clip"))?;
        if !(length.is_finite() && length >= 0.0) {
            return Err(MontageError::configuration(format!(
                "render length must be finite and non-negative, got {length}"
            )));
        }

        let total_frames = video.fps.frames_covering(length);
        let writer = self
            .writer
            .take()
            .unwrap_or_else(|| Box::new(FfmpegWriter::new(self.writer_opts.clone())));
        let Some(clip) = self.clip.take() else {
            return Err(Self::missing("clip"));
        };

        self.shared.set_progress(0.0);
        self.shared.cancel.store(false, Ordering::Release);
        *self.shared.state.lock() = RenderState::Rendering;
        let job = RenderJob {
            clip,
            writer,
            settings: WriterSettings {
                output,
                audio,
                video,
            },
            total_frames,
            shared: Arc::clone(&self.shared),
            events: self.listeners.clone(),
        };
        tracing::info!(total_frames, length, "render started");

        let spawned = thread::Builder::new()
            .name("montage-render".to_owned())
            .spawn(move || run(job));
        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.shared.state.lock() = RenderState::Failed {
                    message: e.to_string(),
                };
                Err(MontageError::Other(anyhow::Error::new(e).context("spawn render thread")))
            }
        }
    }

    /// Request cancellation; the render stops at the next frame boundary.
    pub fn stop_rendering(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// Join the render thread and return its terminal state.
    ///
    /// A failed render returns the error that stopped it. Without a running render this returns
    /// the current state.
    pub fn wait(&mut self) -> MontageResult<RenderState> {
        let Some(handle) = self.thread.take() else {
            return Ok(self.state());
        };
        let outcome = handle
            .join()
            .map_err(|_| MontageError::Other(anyhow::anyhow!("render thread panicked")))?;
        self.clip = Some(outcome.clip);
        match outcome.error {
            Some(e) => Err(e),
            None => Ok(outcome.state),
        }
    }

    /// Take back the clip, once any render has been waited for.
    pub fn take_clip(&mut self) -> Option<Clip> {
        self.clip.take()
    }
}

impl Drop for ClipRenderer {
    fn drop(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.shared.cancel.store(true, Ordering::Release);
            let _ = handle.join();
        }
    }
}

fn publish(events: &[Sender<RenderEvent>], event: RenderEvent) {
    for tx in events {
        let _ = tx.send(event.clone());
    }
}

fn run(mut job: RenderJob) -> RenderOutcome {
    let result = render_frames(&mut job);
    let (state, error) = match result {
        Ok(true) => match job.writer.finish() {
            Ok(()) => (RenderState::Completed, None),
            Err(e) => (
                RenderState::Failed {
                    message: e.to_string(),
                },
                Some(e),
            ),
        },
        Ok(false) => {
            if let Err(e) = job.writer.finish() {
                tracing::warn!(error = %e, "finishing cancelled output failed");
            }
            (RenderState::Cancelled, None)
        }
        Err(e) => {
            if let Err(finish) = job.writer.finish() {
                tracing::warn!(error = %finish, "finishing failed output failed");
            }
            (
                RenderState::Failed {
                    message: e.to_string(),
                },
                Some(e),
            )
        }
    };
    match &state {
        RenderState::Failed { message } => tracing::error!(%message, "render failed"),
        other => tracing::info!(state = ?other, "render finished"),
    }
    *job.shared.state.lock() = state.clone();
    publish(&job.events, RenderEvent::Finished(state.clone()));
    RenderOutcome {
        clip: job.clip,
        state,
        error,
    }
}

/// Write every frame. `Ok(false)` means cancelled.
fn render_frames(job: &mut RenderJob) -> MontageResult<bool> {
    let WriterSettings { audio, video, .. } = job.settings.clone();
    job.writer.start_writing(&job.settings)?;
    job.clip.set_next_read_position(0.0);

    let clip_channels = job.clip.info().channels.max(1);
    let mut clip_block = AudioBlock::silent(clip_channels, 0);
    let mut out_samples = Vec::new();

    for f in 0..job.total_frames {
        if job.shared.cancel.load(Ordering::Acquire) {
            tracing::info!(frame = f, "render cancelled");
            return Ok(false);
        }

        let s0 = video.fps.frame_to_sample(FrameIndex(f), audio.sample_rate);
        let s1 = video.fps.frame_to_sample(FrameIndex(f + 1), audio.sample_rate);
        clip_block.reset(clip_channels, (s1 - s0) as usize);
        job.clip.read_next_audio_block(&mut clip_block);
        remix_interleaved(
            clip_block.samples(),
            clip_channels,
            &mut out_samples,
            audio.channels,
        );
        let out_block = AudioBlock::from_interleaved(audio.channels, std::mem::take(&mut out_samples))?;
        job.writer.write_audio(&out_block)?;
        out_samples = out_block.into_interleaved();

        let t = video.fps.frame_to_secs(FrameIndex(f));
        let mut frame = match job.clip.read_frame_at(t) {
            Some(frame) => scale_to(&frame, video.canvas),
            None => VideoFrame::black(video.canvas, t),
        };
        frame.timestamp = t;
        job.writer.write_frame(&frame)?;

        let progress = (f + 1) as f64 / job.total_frames as f64;
        job.shared.set_progress(progress);
        publish(&job.events, RenderEvent::Progress(progress));
    }
    if job.total_frames == 0 {
        job.shared.set_progress(1.0);
    }
    Ok(true)
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
