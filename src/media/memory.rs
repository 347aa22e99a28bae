use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::foundation::buffer::VideoFrame;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::reader::{AudioReader, MediaBackend, ReadOutcome, VideoReader};
use crate::media::stream::{MediaInfo, StreamInfo, StreamType};

/// Audio reader serving interleaved PCM held in memory, resampled linearly to the output rate.
#[derive(Clone, Debug)]
pub struct PcmReader {
    info: MediaInfo,
    source: Arc<Vec<f32>>,
    source_rate: u32,
    channels: u16,
    output_rate: u32,
    position: u64,
}

impl PcmReader {
    /// Wrap interleaved samples recorded at `sample_rate`.
    pub fn new(sample_rate: u32, channels: u16, interleaved: Arc<Vec<f32>>) -> MontageResult<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(MontageError::validation(
                "pcm reader needs a non-zero sample rate and channel count",
            ));
        }
        if !interleaved.len().is_multiple_of(usize::from(channels)) {
            return Err(MontageError::validation(
                "pcm sample count is not a multiple of the channel count",
            ));
        }
        let frames = interleaved.len() / usize::from(channels);
        Ok(Self {
            info: MediaInfo::audio(sample_rate, channels, frames as f64 / f64::from(sample_rate)),
            source: interleaved,
            source_rate: sample_rate,
            channels,
            output_rate: sample_rate,
            position: 0,
        })
    }

    /// A constant-valued signal lasting `secs`.
    pub fn constant(sample_rate: u32, channels: u16, value: f32, secs: f64) -> MontageResult<Self> {
        let frames = (secs.max(0.0) * f64::from(sample_rate)).round() as usize;
        Self::new(
            sample_rate,
            channels,
            Arc::new(vec![value; frames * usize::from(channels)]),
        )
    }

    fn source_frames(&self) -> u64 {
        (self.source.len() / usize::from(self.channels)) as u64
    }

    fn output_frames(&self) -> u64 {
        if self.output_rate == self.source_rate {
            return self.source_frames();
        }
        let num = u128::from(self.source_frames()) * u128::from(self.output_rate);
        let den = u128::from(self.source_rate);
        num.div_ceil(den) as u64
    }
}

impl AudioReader for PcmReader {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn set_output_sample_rate(&mut self, rate: u32) {
        if rate > 0 {
            self.output_rate = rate;
        }
    }

    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn set_position(&mut self, frame: u64) -> MontageResult<()> {
        self.position = frame;
        Ok(())
    }

    fn read_samples(&mut self, max_frames: usize, out: &mut Vec<f32>) -> MontageResult<ReadOutcome> {
        let total = self.output_frames();
        if self.position >= total {
            return Ok(ReadOutcome::EndOfMedia);
        }
        let n = (max_frames as u64).min(total - self.position) as usize;
        let ch = usize::from(self.channels);
        let src_frames = self.source_frames() as usize;
        out.reserve(n * ch);

        if self.output_rate == self.source_rate {
            let start = self.position as usize * ch;
            out.extend_from_slice(&self.source[start..start + n * ch]);
        } else {
            let ratio = f64::from(self.source_rate) / f64::from(self.output_rate);
            for i in 0..n as u64 {
                let src_pos = (self.position + i) as f64 * ratio;
                let f0 = (src_pos.floor() as usize).min(src_frames - 1);
                let f1 = (f0 + 1).min(src_frames - 1);
                let frac = (src_pos - f0 as f64) as f32;
                for c in 0..ch {
                    let v0 = self.source[f0 * ch + c];
                    let v1 = self.source[f1 * ch + c];
                    out.push(v0 + (v1 - v0) * frac);
                }
            }
        }

        self.position += n as u64;
        Ok(ReadOutcome::Frames(n))
    }
}

/// Video reader serving a fixed sequence of frames at a constant frame rate.
#[derive(Clone, Debug)]
pub struct FrameSequenceReader {
    info: MediaInfo,
    frames: Arc<Vec<VideoFrame>>,
    fps: Fps,
    next: usize,
}

impl FrameSequenceReader {
    /// Wrap `frames`, all of which must share one size.
    pub fn new(fps: Fps, frames: Arc<Vec<VideoFrame>>) -> MontageResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| MontageError::validation("frame sequence must not be empty"))?;
        let size = first.canvas();
        if frames.iter().any(|f| f.canvas() != size) {
            return Err(MontageError::validation(
                "all frames of a sequence must share one size",
            ));
        }
        let duration = frames.len() as f64 * fps.frame_duration_secs();
        Ok(Self {
            info: MediaInfo::video(size, fps, duration),
            frames,
            fps,
            next: 0,
        })
    }

    /// `count` frames of one solid colour.
    pub fn solid(size: Canvas, fps: Fps, count: usize, rgba: [u8; 4]) -> MontageResult<Self> {
        let frames = (0..count)
            .map(|i| VideoFrame::solid(size, rgba, i as f64 * fps.frame_duration_secs()))
            .collect();
        Self::new(fps, Arc::new(frames))
    }
}

impl VideoReader for FrameSequenceReader {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn set_position(&mut self, secs: f64) -> MontageResult<()> {
        // Nudge so a timestamp computed as n/fps lands on frame n.
        let idx = (secs.max(0.0) * self.fps.as_f64() + 1e-9).floor() as usize;
        self.next = idx.min(self.frames.len());
        Ok(())
    }

    fn read_frame(&mut self) -> MontageResult<Option<VideoFrame>> {
        let Some(src) = self.frames.get(self.next) else {
            return Ok(None);
        };
        let mut frame = src.clone();
        frame.timestamp = self.next as f64 * self.fps.frame_duration_secs();
        self.next += 1;
        Ok(Some(frame))
    }
}

#[derive(Clone, Debug)]
enum MemoryMedia {
    Audio {
        sample_rate: u32,
        channels: u16,
        samples: Arc<Vec<f32>>,
    },
    Movie {
        fps: Fps,
        frames: Arc<Vec<VideoFrame>>,
        audio: Option<(u32, u16, Arc<Vec<f32>>)>,
    },
    Image(VideoFrame),
}

/// [`MediaBackend`] resolving paths against media registered in memory.
///
/// Useful for tests and for hosts that decode elsewhere and hand montage raw buffers.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    media: HashMap<PathBuf, MemoryMedia>,
}

impl MemoryBackend {
    /// Empty backend; every open fails until media is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interleaved PCM under `path`.
    pub fn insert_audio(
        &mut self,
        path: impl Into<PathBuf>,
        sample_rate: u32,
        channels: u16,
        samples: Vec<f32>,
    ) {
        self.media.insert(
            path.into(),
            MemoryMedia::Audio {
                sample_rate,
                channels,
                samples: Arc::new(samples),
            },
        );
    }

    /// Register a frame sequence (optionally with PCM) under `path`.
    pub fn insert_movie(
        &mut self,
        path: impl Into<PathBuf>,
        fps: Fps,
        frames: Vec<VideoFrame>,
        audio: Option<(u32, u16, Vec<f32>)>,
    ) {
        self.media.insert(
            path.into(),
            MemoryMedia::Movie {
                fps,
                frames: Arc::new(frames),
                audio: audio.map(|(rate, ch, s)| (rate, ch, Arc::new(s))),
            },
        );
    }

    /// Register a still picture under `path`.
    pub fn insert_image(&mut self, path: impl Into<PathBuf>, frame: VideoFrame) {
        self.media.insert(path.into(), MemoryMedia::Image(frame));
    }

    fn lookup(&self, path: &Path) -> MontageResult<&MemoryMedia> {
        self.media
            .get(path)
            .ok_or_else(|| MontageError::media_open(path, "no media registered for this path"))
    }
}

impl MediaBackend for MemoryBackend {
    fn probe(&self, path: &Path) -> MontageResult<MediaInfo> {
        match self.lookup(path)? {
            MemoryMedia::Audio {
                sample_rate,
                channels,
                samples,
            } => Ok(PcmReader::new(*sample_rate, *channels, Arc::clone(samples))?
                .info()
                .clone()),
            MemoryMedia::Movie { fps, frames, audio } => {
                let mut info = FrameSequenceReader::new(*fps, Arc::clone(frames))?
                    .info()
                    .clone();
                if let Some((rate, ch, _)) = audio {
                    info.streams.push(StreamInfo {
                        index: 1,
                        kind: StreamType::Audio,
                        codec: None,
                    });
                    info.sample_rate = *rate;
                    info.channels = *ch;
                }
                Ok(info)
            }
            MemoryMedia::Image(frame) => Ok(MediaInfo::still(frame.canvas())),
        }
    }

    fn open_audio(&self, path: &Path) -> MontageResult<Box<dyn AudioReader>> {
        match self.lookup(path)? {
            MemoryMedia::Audio {
                sample_rate,
                channels,
                samples,
            } => Ok(Box::new(PcmReader::new(
                *sample_rate,
                *channels,
                Arc::clone(samples),
            )?)),
            MemoryMedia::Movie {
                audio: Some((rate, ch, samples)),
                ..
            } => Ok(Box::new(PcmReader::new(*rate, *ch, Arc::clone(samples))?)),
            _ => Err(MontageError::media_open(path, "source has no audio stream")),
        }
    }

    fn open_video(&self, path: &Path) -> MontageResult<Box<dyn VideoReader>> {
        match self.lookup(path)? {
            MemoryMedia::Movie { fps, frames, .. } => {
                Ok(Box::new(FrameSequenceReader::new(*fps, Arc::clone(frames))?))
            }
            _ => Err(MontageError::media_open(path, "source has no moving pictures")),
        }
    }

    fn open_image(&self, path: &Path) -> MontageResult<VideoFrame> {
        match self.lookup(path)? {
            MemoryMedia::Image(frame) => Ok(frame.clone()),
            _ => Err(MontageError::media_open(path, "source is not a still picture")),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/memory.rs"]
mod tests;
