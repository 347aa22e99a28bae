use crate::foundation::core::{Canvas, Fps};

/// Kind of elementary stream inside a media container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// PCM-decodable audio.
    Audio,
    /// Decodable pictures (including stills).
    Video,
    /// Subtitle track; carried in metadata, never mixed.
    Subtitles,
    /// Anything else (timecode, attachments, data).
    Data,
}

impl StreamType {
    /// Map an `ffprobe` `codec_type` string.
    pub fn from_codec_type(s: &str) -> Self {
        match s {
            "audio" => Self::Audio,
            "video" => Self::Video,
            "subtitle" => Self::Subtitles,
            _ => Self::Data,
        }
    }
}

/// One stream of a probed container.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamInfo {
    /// Container stream index.
    pub index: usize,
    /// Stream kind.
    pub kind: StreamType,
    /// Codec name when known.
    pub codec: Option<String>,
}

/// Metadata reported by a reader when it opens a source.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaInfo {
    /// Total duration in seconds, `None` for unbounded sources such as stills.
    pub duration: Option<f64>,
    /// Streams found in the container.
    pub streams: Vec<StreamInfo>,
    /// Native audio sample rate, 0 without audio.
    pub sample_rate: u32,
    /// Native audio channel count, 0 without audio.
    pub channels: u16,
    /// Picture size, `None` without video.
    pub size: Option<Canvas>,
    /// Native frame rate of moving pictures.
    pub fps: Option<Fps>,
    /// `true` for single-picture sources.
    pub still: bool,
}

impl MediaInfo {
    /// Metadata for an audio-only source.
    pub fn audio(sample_rate: u32, channels: u16, duration: f64) -> Self {
        Self {
            duration: Some(duration),
            streams: vec![StreamInfo {
                index: 0,
                kind: StreamType::Audio,
                codec: None,
            }],
            sample_rate,
            channels,
            size: None,
            fps: None,
            still: false,
        }
    }

    /// Metadata for a moving-picture source without audio.
    pub fn video(size: Canvas, fps: Fps, duration: f64) -> Self {
        Self {
            duration: Some(duration),
            streams: vec![StreamInfo {
                index: 0,
                kind: StreamType::Video,
                codec: None,
            }],
            sample_rate: 0,
            channels: 0,
            size: Some(size),
            fps: Some(fps),
            still: false,
        }
    }

    /// Metadata for a still picture.
    pub fn still(size: Canvas) -> Self {
        Self {
            duration: None,
            streams: vec![StreamInfo {
                index: 0,
                kind: StreamType::Video,
                codec: None,
            }],
            sample_rate: 0,
            channels: 0,
            size: Some(size),
            fps: None,
            still: true,
        }
    }

    /// `true` when at least one stream of `kind` exists.
    pub fn has_stream(&self, kind: StreamType) -> bool {
        self.streams.iter().any(|s| s.kind == kind)
    }

    /// `true` when the source carries audio.
    pub fn has_audio(&self) -> bool {
        self.has_stream(StreamType::Audio)
    }

    /// `true` when the source carries pictures.
    pub fn has_video(&self) -> bool {
        self.has_stream(StreamType::Video)
    }
}
