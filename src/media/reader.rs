use std::path::Path;

use crate::foundation::buffer::VideoFrame;
use crate::foundation::error::MontageResult;
use crate::media::stream::MediaInfo;

/// Result of a single reader pull.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many sample frames were appended.
    Frames(usize),
    /// The source has no more data at the current position.
    EndOfMedia,
}

/// Decoder contract for one audio source.
///
/// Positions are expressed in sample frames at the output sample rate.
pub trait AudioReader: Send {
    /// Metadata captured when the source was opened.
    fn info(&self) -> &MediaInfo;
    /// Channel count of the samples produced by [`AudioReader::read_samples`].
    fn channels(&self) -> u16;
    /// Resample output to `rate` from now on.
    fn set_output_sample_rate(&mut self, rate: u32);
    /// Current output sample rate.
    fn output_sample_rate(&self) -> u32;
    /// Seek to `frame` (output rate).
    fn set_position(&mut self, frame: u64) -> MontageResult<()>;
    /// Append up to `max_frames` interleaved frames to `out`.
    fn read_samples(&mut self, max_frames: usize, out: &mut Vec<f32>) -> MontageResult<ReadOutcome>;
}

/// Decoder contract for one picture source.
pub trait VideoReader: Send {
    /// Metadata captured when the source was opened.
    fn info(&self) -> &MediaInfo;
    /// Seek so the next frame returned is the one displayed at `secs`.
    fn set_position(&mut self, secs: f64) -> MontageResult<()>;
    /// Decode the next frame, `None` at end of media.
    fn read_frame(&mut self) -> MontageResult<Option<VideoFrame>>;
}

/// Opens readers for files. Implementations own codec bindings; the engine only sees this seam.
pub trait MediaBackend: Send + Sync {
    /// Inspect a file without decoding it.
    fn probe(&self, path: &Path) -> MontageResult<MediaInfo>;
    /// Open the audio of `path`.
    fn open_audio(&self, path: &Path) -> MontageResult<Box<dyn AudioReader>>;
    /// Open the pictures of `path`.
    fn open_video(&self, path: &Path) -> MontageResult<Box<dyn VideoReader>>;
    /// Decode a still picture.
    fn open_image(&self, path: &Path) -> MontageResult<VideoFrame>;
}
