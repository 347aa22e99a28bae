use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::mul_div255_u16;
use crate::media::writer::{MediaWriter, WriterSettings};

/// Options for [`FfmpegWriter`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FfmpegWriterOpts {
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Background colour used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    /// Video codec passed to `-c:v`.
    pub video_codec: String,
    /// Audio codec passed to `-c:a`.
    pub audio_codec: String,
}

impl Default for FfmpegWriterOpts {
    fn default() -> Self {
        Self {
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
            video_codec: "libx264".to_owned(),
            audio_codec: "aac".to_owned(),
        }
    }
}

/// Writer that spawns the system `ffmpeg` and streams raw frames to its stdin.
///
/// Pictures go to a temporary video-only file while audio is spooled to a temporary `f32le`
/// file; `finish` muxes both into the output.
pub struct FfmpegWriter {
    opts: FfmpegWriterOpts,
    settings: Option<WriterSettings>,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    video_tmp: TempFileGuard,
    audio_tmp: TempFileGuard,
    audio_out: Option<BufWriter<std::fs::File>>,
    audio_samples: u64,

    scratch: Vec<u8>,
}

impl FfmpegWriter {
    /// Create a writer; nothing is spawned until `start_writing`.
    pub fn new(opts: FfmpegWriterOpts) -> Self {
        Self {
            opts,
            settings: None,
            child: None,
            stdin: None,
            stderr_drain: None,
            video_tmp: TempFileGuard(None),
            audio_tmp: TempFileGuard(None),
            audio_out: None,
            audio_samples: 0,
            scratch: Vec::new(),
        }
    }

    fn settings(&self) -> MontageResult<&WriterSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| MontageError::writer_io("ffmpeg writer not started"))
    }

    fn close_video(&mut self) -> MontageResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| MontageError::writer_io(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| MontageError::writer_io("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| MontageError::writer_io(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            return Err(MontageError::writer_io(format!(
                "ffmpeg exited with status {status}: {}",
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        Ok(())
    }

    fn mux(&self, settings: &WriterSettings, video: &Path) -> MontageResult<()> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-loglevel", "error", "-i"]).arg(video);
        if let (Some(audio), true) = (self.audio_tmp.0.as_ref(), self.audio_samples > 0) {
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &settings.audio.sample_rate.to_string(),
                "-ac",
                &settings.audio.channels.to_string(),
                "-i",
            ])
            .arg(audio)
            .args(["-c:v", "copy", "-c:a", &self.opts.audio_codec, "-shortest"]);
        } else {
            cmd.args(["-c:v", "copy", "-an"]);
        }
        cmd.args(["-movflags", "+faststart"]).arg(&settings.output);

        let out = cmd
            .output()
            .map_err(|e| MontageError::writer_io(format!("failed to run ffmpeg mux: {e}")))?;
        if !out.status.success() {
            return Err(MontageError::writer_io(format!(
                "ffmpeg mux failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl MediaWriter for FfmpegWriter {
    #[tracing::instrument(skip_all, fields(output = %settings.output.display()))]
    fn start_writing(&mut self, settings: &WriterSettings) -> MontageResult<()> {
        settings.audio.validate()?;
        settings.video.validate()?;
        let canvas = settings.video.canvas;
        if !canvas.width.is_multiple_of(2) || !canvas.height.is_multiple_of(2) {
            return Err(MontageError::validation(
                "ffmpeg writer width/height must be even (required for yuv420p output)",
            ));
        }

        ensure_parent_dir(&settings.output)?;
        if !self.opts.overwrite && settings.output.exists() {
            return Err(MontageError::writer_io(format!(
                "output file '{}' already exists",
                settings.output.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(MontageError::writer_io(
                "ffmpeg is required for file output, but was not found on PATH",
            ));
        }

        let video_tmp = temp_path("video", "mkv");
        let audio_tmp = temp_path("audio", "f32le");
        let audio_file = std::fs::File::create(&audio_tmp).map_err(|e| {
            MontageError::writer_io(format!(
                "failed to create audio spool '{}': {e}",
                audio_tmp.display()
            ))
        })?;
        self.audio_tmp.0 = Some(audio_tmp);
        self.audio_out = Some(BufWriter::new(audio_file));
        self.audio_samples = 0;

        // Input is raw RGBA8; premultiplied alpha is flattened in `write_frame`.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", canvas.width, canvas.height),
                "-r",
                &format!("{}/{}", settings.video.fps.num, settings.video.fps.den),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                &self.opts.video_codec,
                "-pix_fmt",
                "yuv420p",
            ])
            .arg(&video_tmp);

        let mut child = cmd.spawn().map_err(|e| {
            MontageError::writer_io(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        self.video_tmp.0 = Some(video_tmp);

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MontageError::writer_io("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MontageError::writer_io("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        self.scratch = vec![0u8; canvas.rgba_len()];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.settings = Some(settings.clone());
        tracing::debug!("ffmpeg writer started");
        Ok(())
    }

    fn write_audio(&mut self, block: &AudioBlock) -> MontageResult<()> {
        let channels = self.settings()?.audio.channels;
        if block.channels() != channels {
            return Err(MontageError::validation(format!(
                "audio block has {} channels, writer expects {channels}",
                block.channels()
            )));
        }
        let out = self
            .audio_out
            .as_mut()
            .ok_or_else(|| MontageError::writer_io("ffmpeg writer is already finished"))?;
        for s in block.samples() {
            out.write_all(&s.to_le_bytes())
                .map_err(|e| MontageError::writer_io(format!("audio spool write failed: {e}")))?;
        }
        self.audio_samples += block.samples().len() as u64;
        Ok(())
    }

    fn write_frame(&mut self, frame: &VideoFrame) -> MontageResult<()> {
        let canvas = self.settings()?.video.canvas;
        if frame.canvas() != canvas {
            return Err(MontageError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, canvas.width, canvas.height
            )));
        }
        flatten_premul_over_bg(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MontageError::writer_io("ffmpeg writer is already finished"));
        };
        stdin
            .write_all(&self.scratch)
            .map_err(|e| MontageError::writer_io(format!("failed to write frame to ffmpeg: {e}")))
    }

    #[tracing::instrument(skip_all)]
    fn finish(&mut self) -> MontageResult<()> {
        let settings = self.settings()?.clone();
        if let Some(mut audio) = self.audio_out.take() {
            audio
                .flush()
                .map_err(|e| MontageError::writer_io(format!("audio spool flush failed: {e}")))?;
        }
        self.close_video()?;

        if let Some(video) = self.video_tmp.0.clone() {
            self.mux(&settings, &video)?;
        }
        self.video_tmp.remove();
        self.audio_tmp.remove();
        self.settings = None;
        tracing::debug!(output = %settings.output.display(), "ffmpeg writer finished");
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn flatten_premul_over_bg(dst: &mut [u8], src_premul: &[u8], bg_rgba: [u8; 4]) -> MontageResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(MontageError::validation(
            "flatten_premul_over_bg expects equal-length rgba8 buffers",
        ));
    }

    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255_u16(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

fn temp_path(kind: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "montage_{kind}_{}_{}.{ext}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ))
}

struct TempFileGuard(Option<PathBuf>);

impl TempFileGuard {
    fn remove(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> MontageResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/media/ffmpeg_writer.rs"]
mod tests;
