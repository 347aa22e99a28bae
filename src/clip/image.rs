use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clip::decoder::ClipId;
use crate::clip::{ClipInfo, ClipSettings};
use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::error::MontageError;
use crate::media::reader::MediaBackend;

/// Clip showing one still picture for any source time.
pub struct ImageClip {
    id: ClipId,
    source: PathBuf,
    frame: Option<Arc<VideoFrame>>,
    open_error: Option<MontageError>,
    channels: u16,
    sample_rate: u32,
    position: f64,
    looping: bool,
}

impl ImageClip {
    /// Decode `path` once through `backend`; a decode failure yields a failed clip.
    pub fn open(backend: &dyn MediaBackend, path: &Path, settings: &ClipSettings) -> Self {
        match backend.open_image(path) {
            Ok(frame) => Self::from_frame(path, frame, settings),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "image clip failed to open");
                Self {
                    frame: None,
                    open_error: Some(e),
                    ..Self::from_parts(path.to_path_buf(), settings)
                }
            }
        }
    }

    /// Wrap an already decoded frame.
    pub fn from_frame(path: impl Into<PathBuf>, frame: VideoFrame, settings: &ClipSettings) -> Self {
        Self {
            frame: Some(Arc::new(frame)),
            ..Self::from_parts(path.into(), settings)
        }
    }

    fn from_parts(source: PathBuf, settings: &ClipSettings) -> Self {
        Self {
            id: ClipId::next(),
            source,
            frame: None,
            open_error: None,
            channels: settings.channels,
            sample_rate: settings.sample_rate,
            position: 0.0,
            looping: false,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn open_error(&self) -> Option<&MontageError> {
        self.open_error.as_ref()
    }

    pub fn info(&self) -> ClipInfo {
        ClipInfo {
            duration: None,
            has_audio: false,
            has_video: self.frame.is_some(),
            channels: self.channels,
            source_channels: 0,
            sample_rate: self.sample_rate,
            size: self.frame.as_ref().map(|f| f.canvas()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.frame.is_none()
    }

    /// Stills have no length, so looping only changes what `is_looping` reports.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn next_read_position(&self) -> f64 {
        self.position
    }

    pub fn set_next_read_position(&mut self, secs: f64) {
        self.position = secs;
    }

    /// Always silence.
    pub fn read_next_audio_block(&mut self, block: &mut AudioBlock) {
        block.clear();
        self.position += block.frames() as f64 / f64::from(self.sample_rate);
    }

    pub fn read_frame_at(&mut self, _secs: f64) -> Option<Arc<VideoFrame>> {
        self.frame.clone()
    }
}

impl std::fmt::Debug for ImageClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageClip")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("size", &self.frame.as_ref().map(|f| f.canvas()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/image.rs"]
mod tests;
