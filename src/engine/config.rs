use std::path::Path;
use std::time::Duration;

use crate::clip::ClipSettings;
use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::ffmpeg_writer::FfmpegWriterOpts;
use crate::media::writer::{AudioSettings, VideoSettings};

/// Decode worker tuning for realtime playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How long a worker sleeps when its fifo is full or its source is exhausted.
    pub idle_sleep_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { idle_sleep_ms: 2 }
    }
}

impl PlaybackConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

/// Everything a [`VideoEngine`](crate::engine::VideoEngine) is built from.
///
/// Deserializes from partial JSON; missing sections take their defaults.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Format of the timeline and every clip in it.
    pub clip: ClipSettings,
    /// Rendered audio format. The sample rate must match `clip.sample_rate`.
    pub audio: AudioSettings,
    /// Rendered picture format.
    pub video: VideoSettings,
    /// Options for the default `ffmpeg` writer.
    pub writer: FfmpegWriterOpts,
    pub playback: PlaybackConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> MontageResult<()> {
        if self.clip.sample_rate == 0 || self.clip.channels == 0 {
            return Err(MontageError::validation(
                "clip sample_rate and channels must be non-zero",
            ));
        }
        Canvas::new(self.clip.canvas.width, self.clip.canvas.height)?;
        if self.clip.audio_fifo_frames == 0
            || self.clip.video_fifo_frames == 0
            || self.clip.decode_block_frames == 0
        {
            return Err(MontageError::validation(
                "fifo sizes and decode block size must be non-zero",
            ));
        }
        self.audio.validate()?;
        self.video.validate()?;
        if self.audio.sample_rate != self.clip.sample_rate {
            return Err(MontageError::validation(format!(
                "output sample rate {} differs from timeline sample rate {}",
                self.audio.sample_rate, self.clip.sample_rate
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> MontageResult<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| MontageError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> MontageResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            MontageError::configuration(format!("read config '{}': {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/config.rs"]
mod tests;
