use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MontageError, MontageResult};

/// Output audio format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl AudioSettings {
    /// Reject zero rates and channel counts.
    pub fn validate(&self) -> MontageResult<()> {
        if self.sample_rate == 0 {
            return Err(MontageError::validation("audio sample_rate must be non-zero"));
        }
        if self.channels == 0 {
            return Err(MontageError::validation("audio channels must be non-zero"));
        }
        Ok(())
    }
}

/// Output picture format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VideoSettings {
    /// Output frame size.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1280,
                height: 720,
            },
            fps: Fps { num: 25, den: 1 },
        }
    }
}

impl VideoSettings {
    /// Reject empty canvases and zero frame rates.
    pub fn validate(&self) -> MontageResult<()> {
        Canvas::new(self.canvas.width, self.canvas.height)?;
        Fps::new(self.fps.num, self.fps.den)?;
        Ok(())
    }
}

/// Everything a [`MediaWriter`] needs before the first block arrives.
#[derive(Clone, Debug, PartialEq)]
pub struct WriterSettings {
    /// Destination file.
    pub output: PathBuf,
    /// Audio format of every [`MediaWriter::write_audio`] block.
    pub audio: AudioSettings,
    /// Picture format of every [`MediaWriter::write_frame`] frame.
    pub video: VideoSettings,
}

/// Sink contract for rendered output.
///
/// Call order: `start_writing`, then interleaved `write_audio`/`write_frame` in timestamp order,
/// then `finish` exactly once.
pub trait MediaWriter: Send {
    /// Prepare the output.
    fn start_writing(&mut self, settings: &WriterSettings) -> MontageResult<()>;
    /// Append interleaved samples.
    fn write_audio(&mut self, block: &AudioBlock) -> MontageResult<()>;
    /// Append one frame.
    fn write_frame(&mut self, frame: &VideoFrame) -> MontageResult<()>;
    /// Flush and close the output.
    fn finish(&mut self) -> MontageResult<()>;
}

/// Everything an [`InMemoryWriter`] received.
#[derive(Clone, Debug, Default)]
pub struct CapturedOutput {
    /// Settings passed to `start_writing`, if it was called.
    pub settings: Option<WriterSettings>,
    /// Concatenated interleaved audio.
    pub audio: Vec<f32>,
    /// Number of `write_audio` calls.
    pub audio_blocks: usize,
    /// Frames in the order they were written.
    pub frames: Vec<VideoFrame>,
    /// `true` once `finish` was called.
    pub finished: bool,
}

impl CapturedOutput {
    /// Interleaved samples covering `[start, end)` seconds of the output.
    pub fn audio_between(&self, start: f64, end: f64) -> &[f32] {
        let Some(settings) = self.settings.as_ref() else {
            return &[];
        };
        let ch = usize::from(settings.audio.channels);
        let rate = f64::from(settings.audio.sample_rate);
        let a = ((start * rate).round().max(0.0) as usize * ch).min(self.audio.len());
        let b = ((end * rate).round().max(0.0) as usize * ch).min(self.audio.len());
        &self.audio[a..b.max(a)]
    }
}

/// Writer that keeps everything in memory, for tests and previews.
///
/// The captured output is shared, so a clone of [`InMemoryWriter::capture`] taken before the
/// writer is handed to a renderer can be inspected after the render finishes.
#[derive(Clone, Debug, Default)]
pub struct InMemoryWriter {
    captured: Arc<Mutex<CapturedOutput>>,
    fail_after_frames: Option<usize>,
}

impl InMemoryWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `write_frame` fail with [`MontageError::WriterIo`] once `frames` frames were stored.
    pub fn failing_after(frames: usize) -> Self {
        Self {
            fail_after_frames: Some(frames),
            ..Self::default()
        }
    }

    /// Shared handle to the captured output.
    pub fn capture(&self) -> Arc<Mutex<CapturedOutput>> {
        Arc::clone(&self.captured)
    }

    /// Copy of what has been captured so far.
    pub fn snapshot(&self) -> CapturedOutput {
        self.captured.lock().clone()
    }
}

impl MediaWriter for InMemoryWriter {
    fn start_writing(&mut self, settings: &WriterSettings) -> MontageResult<()> {
        let mut captured = self.captured.lock();
        *captured = CapturedOutput {
            settings: Some(settings.clone()),
            ..CapturedOutput::default()
        };
        Ok(())
    }

    fn write_audio(&mut self, block: &AudioBlock) -> MontageResult<()> {
        let mut captured = self.captured.lock();
        captured.audio.extend_from_slice(block.samples());
        captured.audio_blocks += 1;
        Ok(())
    }

    fn write_frame(&mut self, frame: &VideoFrame) -> MontageResult<()> {
        let mut captured = self.captured.lock();
        if let Some(limit) = self.fail_after_frames
            && captured.frames.len() >= limit
        {
            return Err(MontageError::writer_io(format!(
                "in-memory writer refused frame {limit}"
            )));
        }
        captured.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> MontageResult<()> {
        self.captured.lock().finished = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/writer.rs"]
mod tests;
