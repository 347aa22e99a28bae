//! Readers backed by the system `ffmpeg`/`ffprobe` binaries (feature `media-ffmpeg`).

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::foundation::buffer::VideoFrame;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::memory::PcmReader;
use crate::media::reader::{AudioReader, ReadOutcome, VideoReader};
use crate::media::stream::{MediaInfo, StreamInfo, StreamType};

/// Number of frames requested from `ffmpeg` per decode invocation.
const VIDEO_DECODE_BATCH: u32 = 16;

/// Probe container metadata through `ffprobe`.
#[cfg(feature = "media-ffmpeg")]
pub fn probe_media(source_path: &Path) -> MontageResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        index: Option<usize>,
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        sample_rate: Option<String>,
        channels: Option<u16>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| MontageError::media_open(source_path, format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(MontageError::media_open(
            source_path,
            format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
        ));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout).map_err(|e| {
        MontageError::media_open(source_path, format!("ffprobe json parse failed: {e}"))
    })?;

    let mut info = MediaInfo {
        duration: parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok()),
        streams: Vec::with_capacity(parsed.streams.len()),
        sample_rate: 0,
        channels: 0,
        size: None,
        fps: None,
        still: false,
    };
    for (pos, s) in parsed.streams.iter().enumerate() {
        let kind = StreamType::from_codec_type(s.codec_type.as_deref().unwrap_or(""));
        info.streams.push(StreamInfo {
            index: s.index.unwrap_or(pos),
            kind,
            codec: s.codec_name.clone(),
        });
        match kind {
            StreamType::Audio if info.sample_rate == 0 => {
                info.sample_rate = s
                    .sample_rate
                    .as_deref()
                    .and_then(|r| r.parse().ok())
                    .unwrap_or(0);
                info.channels = s.channels.unwrap_or(0);
            }
            StreamType::Video if info.size.is_none() => {
                if let (Some(w), Some(h)) = (s.width, s.height) {
                    info.size = Canvas::new(w, h).ok();
                }
                info.fps = s.r_frame_rate.as_deref().and_then(parse_rational_fps);
            }
            _ => {}
        }
    }
    Ok(info)
}

#[cfg(not(feature = "media-ffmpeg"))]
/// Probe container metadata through `ffprobe`.
///
/// Returns an error when `media-ffmpeg` feature is disabled.
pub fn probe_media(source_path: &Path) -> MontageResult<MediaInfo> {
    Err(MontageError::media_open(
        source_path,
        "video/audio files require the 'media-ffmpeg' feature",
    ))
}

#[cfg(any(feature = "media-ffmpeg", test))]
fn parse_rational_fps(s: &str) -> Option<Fps> {
    let (num, den) = s.split_once('/').unwrap_or((s, "1"));
    Fps::new(num.trim().parse().ok()?, den.trim().parse().ok()?).ok()
}

#[cfg(feature = "media-ffmpeg")]
fn decode_audio_f32(path: &Path, sample_rate: u32, channels: u16) -> MontageResult<Vec<f32>> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &channels.to_string(),
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| MontageError::media_open(path, format!("failed to run ffmpeg: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        // A missing audio stream is reported as an error; treat it as empty PCM.
        if msg.contains("Stream specifier")
            || msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
        {
            return Ok(Vec::new());
        }
        return Err(MontageError::media_open(
            path,
            format!("ffmpeg audio decode failed: {}", msg.trim()),
        ));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(MontageError::media_open(
            path,
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    Ok(out
        .stdout
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(not(feature = "media-ffmpeg"))]
fn decode_audio_f32(path: &Path, _sample_rate: u32, _channels: u16) -> MontageResult<Vec<f32>> {
    Err(MontageError::media_open(
        path,
        "video/audio files require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
fn decode_video_frames_rgba8(
    path: &Path,
    size: Canvas,
    start_time_sec: f64,
    frame_count: u32,
) -> MontageResult<Vec<Vec<u8>>> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{start_time_sec:.9}")])
        .arg("-i")
        .arg(path)
        .args([
            "-frames:v",
            &frame_count.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| MontageError::media_open(path, format!("failed to run ffmpeg: {e}")))?;

    if !out.status.success() {
        return Err(MontageError::media_open(
            path,
            format!(
                "ffmpeg video decode batch failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
        ));
    }

    let expected_len = size.rgba_len();
    if !out.stdout.len().is_multiple_of(expected_len) {
        return Err(MontageError::media_open(
            path,
            format!(
                "decoded video batch has invalid size: got {} bytes, expected multiples of {expected_len}",
                out.stdout.len()
            ),
        ));
    }
    Ok(out
        .stdout
        .chunks_exact(expected_len)
        .map(<[u8]>::to_vec)
        .collect())
}

#[cfg(not(feature = "media-ffmpeg"))]
fn decode_video_frames_rgba8(
    path: &Path,
    _size: Canvas,
    _start_time_sec: f64,
    _frame_count: u32,
) -> MontageResult<Vec<Vec<u8>>> {
    Err(MontageError::media_open(
        path,
        "video/audio files require the 'media-ffmpeg' feature",
    ))
}

/// Audio reader that decodes a whole file through `ffmpeg` on first use and serves it from
/// memory. Changing the output rate re-decodes at the new rate.
pub struct FfmpegAudioReader {
    path: PathBuf,
    info: MediaInfo,
    channels: u16,
    output_rate: u32,
    position: u64,
    pcm: Option<PcmReader>,
}

impl FfmpegAudioReader {
    /// Probe `path` and prepare a reader producing `channels` channels.
    pub fn open(path: &Path, channels: u16) -> MontageResult<Self> {
        let info = probe_media(path)?;
        if !info.has_audio() {
            return Err(MontageError::media_open(path, "no audio stream found"));
        }
        Ok(Self {
            path: path.to_path_buf(),
            output_rate: info.sample_rate.max(1),
            info,
            channels: channels.max(1),
            position: 0,
            pcm: None,
        })
    }

    fn pcm(&mut self) -> MontageResult<&mut PcmReader> {
        if self.pcm.is_none() {
            tracing::debug!(path = %self.path.display(), rate = self.output_rate, "decoding audio");
            let samples = decode_audio_f32(&self.path, self.output_rate, self.channels)?;
            let mut reader =
                PcmReader::new(self.output_rate, self.channels, std::sync::Arc::new(samples))?;
            reader.set_position(self.position)?;
            self.pcm = Some(reader);
        }
        self.pcm
            .as_mut()
            .ok_or_else(|| MontageError::media_open(&self.path, "audio decode produced no reader"))
    }
}

impl AudioReader for FfmpegAudioReader {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn set_output_sample_rate(&mut self, rate: u32) {
        if rate > 0 && rate != self.output_rate {
            self.output_rate = rate;
            self.pcm = None;
        }
    }

    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn set_position(&mut self, frame: u64) -> MontageResult<()> {
        self.position = frame;
        if let Some(pcm) = self.pcm.as_mut() {
            pcm.set_position(frame)?;
        }
        Ok(())
    }

    fn read_samples(&mut self, max_frames: usize, out: &mut Vec<f32>) -> MontageResult<ReadOutcome> {
        let outcome = self.pcm()?.read_samples(max_frames, out)?;
        if let ReadOutcome::Frames(n) = outcome {
            self.position += n as u64;
        }
        Ok(outcome)
    }
}

/// Video reader decoding batches of frames through `ffmpeg`.
pub struct FfmpegVideoReader {
    path: PathBuf,
    info: MediaInfo,
    size: Canvas,
    fps: Fps,
    next_time: f64,
    pending: VecDeque<VideoFrame>,
    exhausted: bool,
}

impl FfmpegVideoReader {
    /// Probe `path` and prepare a reader at the source's native size and rate.
    pub fn open(path: &Path) -> MontageResult<Self> {
        let info = probe_media(path)?;
        let size = info
            .size
            .ok_or_else(|| MontageError::media_open(path, "no video stream found"))?;
        let fps = info.fps.unwrap_or(Fps { num: 25, den: 1 });
        Ok(Self {
            path: path.to_path_buf(),
            info,
            size,
            fps,
            next_time: 0.0,
            pending: VecDeque::new(),
            exhausted: false,
        })
    }

    fn decode_batch(&mut self) -> MontageResult<()> {
        let raw = decode_video_frames_rgba8(&self.path, self.size, self.next_time, VIDEO_DECODE_BATCH)?;
        if raw.is_empty() {
            self.exhausted = true;
            return Ok(());
        }
        for (i, mut data) in raw.into_iter().enumerate() {
            crate::media::image::premultiply_rgba8_in_place(&mut data);
            let ts = self.next_time + i as f64 * self.fps.frame_duration_secs();
            self.pending
                .push_back(VideoFrame::from_rgba(self.size.width, self.size.height, ts, data)?);
        }
        let decoded = self.pending.len() as f64;
        self.next_time += decoded * self.fps.frame_duration_secs();
        Ok(())
    }
}

impl VideoReader for FfmpegVideoReader {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn set_position(&mut self, secs: f64) -> MontageResult<()> {
        self.pending.clear();
        self.exhausted = false;
        let frame = (secs.max(0.0) * self.fps.as_f64() + 1e-9).floor();
        self.next_time = frame * self.fps.frame_duration_secs();
        Ok(())
    }

    fn read_frame(&mut self) -> MontageResult<Option<VideoFrame>> {
        if self.pending.is_empty() && !self.exhausted {
            self.decode_batch()?;
        }
        Ok(self.pending.pop_front())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/ffmpeg.rs"]
mod tests;
