//! Clips: the things placed on a timeline.
//!
//! [`Clip`] is a closed sum over the four clip kinds. Leaf clips (audio, image, movie) own
//! their readers; [`ComposedClip`] owns a nested list of [`ClipDescriptor`]s and mixes them
//! with its own mixers, so a composition can be used wherever a leaf can.

use std::path::Path;
use std::sync::Arc;

use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::core::Canvas;
use crate::foundation::error::MontageError;

/// Audio-only clips.
pub mod audio;
/// Nested compositions.
pub mod composed;
/// Decoders and the playback seek mailbox.
pub mod decoder;
/// Timeline placement.
pub mod descriptor;
/// Still pictures.
pub mod image;
/// Moving pictures with optional audio.
pub mod movie;

pub use audio::AudioClip;
pub use composed::{ComposedClip, CompositionId};
pub use decoder::{ClipId, DecodeStatus, Decoder};
pub use descriptor::{ClipDescriptor, DescriptorId};
pub use image::ImageClip;
pub use movie::MovieClip;

/// Output format every clip produces, plus buffering sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClipSettings {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Canvas of composed frames.
    pub canvas: Canvas,
    /// Audio fifo capacity per leaf, in frames.
    pub audio_fifo_frames: usize,
    /// Video fifo capacity per leaf, in frames.
    pub video_fifo_frames: usize,
    /// Frames decoded per reader pull.
    pub decode_block_frames: usize,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            canvas: Canvas {
                width: 1280,
                height: 720,
            },
            audio_fifo_frames: 48_000,
            video_fifo_frames: 8,
            decode_block_frames: 4096,
        }
    }
}

/// What a clip can produce.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipInfo {
    /// Source length in seconds, `None` for stills.
    pub duration: Option<f64>,
    pub has_audio: bool,
    pub has_video: bool,
    /// Channels of produced audio blocks.
    pub channels: u16,
    /// Channels of the underlying source, 0 without audio.
    pub source_channels: u16,
    /// Sample rate of produced audio blocks.
    pub sample_rate: u32,
    /// Native picture size.
    pub size: Option<Canvas>,
}

/// Discriminant of [`Clip`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Audio,
    Image,
    Movie,
    Composed,
}

/// Any clip.
#[derive(Debug)]
pub enum Clip {
    Audio(AudioClip),
    Image(ImageClip),
    Movie(MovieClip),
    Composed(Box<ComposedClip>),
}

impl Clip {
    pub fn kind(&self) -> ClipKind {
        match self {
            Self::Audio(_) => ClipKind::Audio,
            Self::Image(_) => ClipKind::Image,
            Self::Movie(_) => ClipKind::Movie,
            Self::Composed(_) => ClipKind::Composed,
        }
    }

    pub fn info(&self) -> ClipInfo {
        match self {
            Self::Audio(c) => c.info(),
            Self::Image(c) => c.info(),
            Self::Movie(c) => c.info(),
            Self::Composed(c) => c.info(),
        }
    }

    /// File a leaf was opened from; `None` for compositions.
    pub fn source(&self) -> Option<&Path> {
        match self {
            Self::Audio(c) => Some(c.source()),
            Self::Image(c) => Some(c.source()),
            Self::Movie(c) => Some(c.source()),
            Self::Composed(_) => None,
        }
    }

    /// Error retained from opening the source.
    pub fn open_error(&self) -> Option<&MontageError> {
        match self {
            Self::Audio(c) => c.open_error(),
            Self::Image(c) => c.open_error(),
            Self::Movie(c) => c.open_error(),
            Self::Composed(_) => None,
        }
    }

    /// `true` once the clip can no longer produce media; reads give silence/nothing.
    pub fn is_failed(&self) -> bool {
        match self {
            Self::Audio(c) => c.is_failed(),
            Self::Image(c) => c.is_failed(),
            Self::Movie(c) => c.is_failed(),
            Self::Composed(_) => false,
        }
    }

    /// Whether a descriptor may start reading this clip before its own time zero.
    pub fn supports_preroll(&self) -> bool {
        matches!(self, Self::Image(_) | Self::Composed(_))
    }

    pub fn set_looping(&mut self, looping: bool) {
        match self {
            Self::Audio(c) => c.set_looping(looping),
            Self::Image(c) => c.set_looping(looping),
            Self::Movie(c) => c.set_looping(looping),
            Self::Composed(c) => c.set_looping(looping),
        }
    }

    pub fn is_looping(&self) -> bool {
        match self {
            Self::Audio(c) => c.is_looping(),
            Self::Image(c) => c.is_looping(),
            Self::Movie(c) => c.is_looping(),
            Self::Composed(c) => c.is_looping(),
        }
    }

    /// Source time of the next audio read, in seconds.
    pub fn next_read_position(&self) -> f64 {
        match self {
            Self::Audio(c) => c.next_read_position(),
            Self::Image(c) => c.next_read_position(),
            Self::Movie(c) => c.next_read_position(),
            Self::Composed(c) => c.next_read_position(),
        }
    }

    /// Seek; the next audio block starts at `secs` source time.
    pub fn set_next_read_position(&mut self, secs: f64) {
        match self {
            Self::Audio(c) => c.set_next_read_position(secs),
            Self::Image(c) => c.set_next_read_position(secs),
            Self::Movie(c) => c.set_next_read_position(secs),
            Self::Composed(c) => c.set_next_read_position(secs),
        }
    }

    /// Fill `block` and advance the read position by its length.
    pub fn read_next_audio_block(&mut self, block: &mut AudioBlock) {
        match self {
            Self::Audio(c) => c.read_next_audio_block(block),
            Self::Image(c) => c.read_next_audio_block(block),
            Self::Movie(c) => c.read_next_audio_block(block),
            Self::Composed(c) => c.read_next_audio_block(block),
        }
    }

    /// Frame displayed at `secs` source time, `None` when there is nothing to show.
    pub fn read_frame_at(&mut self, secs: f64) -> Option<Arc<VideoFrame>> {
        match self {
            Self::Audio(_) => None,
            Self::Image(c) => c.read_frame_at(secs),
            Self::Movie(c) => c.read_frame_at(secs),
            Self::Composed(c) => c.read_frame_at(secs),
        }
    }

    /// Move every leaf decoder out (for playback workers).
    pub fn detach_decoders(&mut self) -> Vec<Decoder> {
        let mut out = Vec::new();
        self.collect_decoders(&mut out);
        out
    }

    pub(crate) fn collect_decoders(&mut self, out: &mut Vec<Decoder>) {
        match self {
            Self::Audio(c) => {
                if let Some(d) = c.stream_mut().and_then(audio::AudioStream::detach) {
                    out.push(Decoder::Audio(d));
                }
            }
            Self::Image(_) => {}
            Self::Movie(c) => c.detach_decoders(out),
            Self::Composed(c) => c.collect_decoders(out),
        }
    }

    /// Give a decoder back to the leaf it came from. Returns it if no leaf here owns it.
    pub fn attach_decoder(&mut self, decoder: Decoder) -> Option<Decoder> {
        match (self, decoder) {
            (Self::Audio(c), Decoder::Audio(d)) => match c.stream_mut() {
                Some(stream) => stream.attach(d).map(Decoder::Audio),
                None => Some(Decoder::Audio(d)),
            },
            (Self::Movie(c), d) if c.id() == d.clip_id() => c.attach_decoder(d),
            (Self::Composed(c), d) => c.attach_decoder(d),
            (_, d) => Some(d),
        }
    }

    /// `true` when no leaf below has a decoder out.
    pub fn decoders_attached(&self) -> bool {
        match self {
            Self::Audio(c) => c.stream_attached(),
            Self::Image(_) => true,
            Self::Movie(c) => c.all_attached(),
            Self::Composed(c) => c.decoders_attached(),
        }
    }

    /// `true` when this clip is, or contains, composition `id`.
    pub fn contains_composition(&self, id: CompositionId) -> bool {
        match self {
            Self::Composed(c) => c.contains_composition(id),
            _ => false,
        }
    }

    pub fn as_composed(&self) -> Option<&ComposedClip> {
        match self {
            Self::Composed(c) => Some(&**c),
            _ => None,
        }
    }

    pub fn as_composed_mut(&mut self) -> Option<&mut ComposedClip> {
        match self {
            Self::Composed(c) => Some(&mut **c),
            _ => None,
        }
    }
}

impl From<AudioClip> for Clip {
    fn from(c: AudioClip) -> Self {
        Self::Audio(c)
    }
}

impl From<ImageClip> for Clip {
    fn from(c: ImageClip) -> Self {
        Self::Image(c)
    }
}

impl From<MovieClip> for Clip {
    fn from(c: MovieClip) -> Self {
        Self::Movie(c)
    }
}

impl From<ComposedClip> for Clip {
    fn from(c: ComposedClip) -> Self {
        Self::Composed(Box::new(c))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/clip.rs"]
mod tests;
