use std::path::Path;

use crate::foundation::buffer::VideoFrame;
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::ffmpeg::{FfmpegAudioReader, FfmpegVideoReader, probe_media};
use crate::media::image::{decode_image_file, is_still_image_path};
use crate::media::reader::{AudioReader, MediaBackend, VideoReader};
use crate::media::stream::MediaInfo;

/// [`MediaBackend`] for files on disk.
///
/// Stills are decoded in-process with `image`; everything else goes through `ffmpeg`
/// (feature `media-ffmpeg`).
#[derive(Clone, Copy, Debug)]
pub struct FileBackend {
    channels: u16,
}

impl FileBackend {
    /// Backend whose audio readers remix to `channels`.
    pub fn new(channels: u16) -> Self {
        Self {
            channels: channels.max(1),
        }
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new(2)
    }
}

impl MediaBackend for FileBackend {
    fn probe(&self, path: &Path) -> MontageResult<MediaInfo> {
        if !path.exists() {
            return Err(MontageError::media_open(path, "file does not exist"));
        }
        if is_still_image_path(path) {
            let (w, h) = image::image_dimensions(path)
                .map_err(|e| MontageError::media_open(path, e.to_string()))?;
            let size = crate::foundation::core::Canvas::new(w, h)
                .map_err(|e| MontageError::media_open(path, e.to_string()))?;
            return Ok(MediaInfo::still(size));
        }
        probe_media(path)
    }

    fn open_audio(&self, path: &Path) -> MontageResult<Box<dyn AudioReader>> {
        Ok(Box::new(FfmpegAudioReader::open(path, self.channels)?))
    }

    fn open_video(&self, path: &Path) -> MontageResult<Box<dyn VideoReader>> {
        Ok(Box::new(FfmpegVideoReader::open(path)?))
    }

    fn open_image(&self, path: &Path) -> MontageResult<VideoFrame> {
        decode_image_file(path)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/file.rs"]
mod tests;
