use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::clip::audio::AudioStream;
use crate::clip::decoder::{ClipId, DecodeStatus, Decoder, StreamShared, VideoDecoder};
use crate::clip::{ClipInfo, ClipSettings};
use crate::fifo::video::{VideoFifo, VideoFifoReader};
use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::reader::{MediaBackend, VideoReader};

/// Frame timestamps within this distance of a request count as due.
const TIME_EPSILON: f64 = 1e-6;
/// Requests further ahead than this re-seek instead of decoding through.
const SEEK_AHEAD_SECS: f64 = 1.0;

/// Consumer side of a decoded picture source.
pub(crate) struct VideoStream {
    clip_id: ClipId,
    fifo: VideoFifoReader,
    decoder: Option<VideoDecoder>,
    shared: Arc<StreamShared>,
    length: Option<f64>,
    current: Option<Arc<VideoFrame>>,
    last_request: Option<f64>,
    pending_seek: Option<u64>,
}

impl VideoStream {
    pub(crate) fn new(
        clip_id: ClipId,
        reader: Box<dyn VideoReader>,
        size: Canvas,
        settings: &ClipSettings,
        shared: Arc<StreamShared>,
    ) -> Self {
        let length = reader.info().duration.filter(|d| *d > 0.0);
        let (writer, fifo) = VideoFifo::new(size, settings.video_fifo_frames).split();
        Self {
            clip_id,
            fifo,
            decoder: Some(VideoDecoder::new(clip_id, reader, writer, Arc::clone(&shared))),
            shared,
            length,
            current: None,
            last_request: None,
            pending_seek: None,
        }
    }

    pub(crate) fn duration(&self) -> Option<f64> {
        self.length
    }

    pub(crate) fn seek(&mut self, secs: f64) {
        self.last_request = Some(secs);
        self.fifo.clear();
        match self.decoder.as_mut() {
            Some(decoder) => {
                self.current = None;
                self.pending_seek = None;
                if let Err(e) = decoder.seek_now(secs) {
                    tracing::warn!(clip = self.clip_id.0, error = %e, "video seek failed");
                    self.shared.failed.store(true, Ordering::Release);
                }
            }
            // Keep showing the current frame until the worker catches up.
            None => self.pending_seek = Some(self.shared.seek.request(secs.max(0.0).to_bits())),
        }
    }

    /// Frame displayed at source time `t`, holding the last valid frame when decoding lags.
    pub(crate) fn frame_at(&mut self, t: f64) -> Option<Arc<VideoFrame>> {
        if self.shared.is_failed() || t < 0.0 {
            return None;
        }
        if !self.shared.is_looping() && self.length.is_some_and(|l| t >= l) {
            return None;
        }
        let needs_seek = match self.last_request {
            None => true,
            Some(last) => t < last - TIME_EPSILON || t - last > SEEK_AHEAD_SECS,
        };
        if needs_seek {
            self.seek(t);
        }
        self.last_request = Some(t);

        match self.decoder.as_mut() {
            Some(decoder) => loop {
                match self.fifo.peek_timestamp() {
                    Some(ts) if ts <= t + TIME_EPSILON => {
                        if let Some(frame) = self.fifo.pop() {
                            self.current = Some(Arc::new(frame));
                        }
                    }
                    Some(_) => break,
                    None => match decoder.step() {
                        DecodeStatus::Progressed(_) => {}
                        DecodeStatus::Full | DecodeStatus::Idle => break,
                    },
                }
            },
            None => self.drain_detached(t),
        }
        self.current.clone()
    }

    fn drain_detached(&mut self, t: f64) {
        if let Some(generation) = self.pending_seek {
            let (served, fence) = self.shared.seek.served();
            if served < generation {
                return;
            }
            let stale = fence.saturating_sub(self.fifo.read_position());
            self.fifo.skip(stale as usize);
            self.pending_seek = None;
        }
        while self
            .fifo
            .peek_timestamp()
            .is_some_and(|ts| ts <= t + TIME_EPSILON)
        {
            match self.fifo.pop() {
                Some(frame) => self.current = Some(Arc::new(frame)),
                None => break,
            }
        }
    }

    pub(crate) fn detach(&mut self) -> Option<VideoDecoder> {
        self.pending_seek = None;
        self.decoder.take()
    }

    pub(crate) fn attach(&mut self, mut decoder: VideoDecoder) -> Option<VideoDecoder> {
        if decoder.clip_id() != self.clip_id || self.decoder.is_some() {
            return Some(decoder);
        }
        self.fifo.clear();
        self.pending_seek = None;
        self.current = None;
        let resume = self.last_request.unwrap_or(0.0);
        if let Err(e) = decoder.reattach_at(resume) {
            tracing::warn!(clip = self.clip_id.0, error = %e, "video reattach seek failed");
            self.shared.failed.store(true, Ordering::Release);
        }
        self.decoder = Some(decoder);
        None
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.decoder.is_some()
    }
}

/// Clip playing the pictures (and optional audio) of a movie file.
pub struct MovieClip {
    id: ClipId,
    source: PathBuf,
    video: Option<VideoStream>,
    audio: Option<AudioStream>,
    video_shared: Arc<StreamShared>,
    audio_shared: Arc<StreamShared>,
    thumbnail: Option<Box<dyn VideoReader>>,
    size: Option<Canvas>,
    channels: u16,
    source_channels: u16,
    sample_rate: u32,
    open_error: Option<MontageError>,
    position: f64,
}

impl MovieClip {
    /// Open `path` through `backend`.
    ///
    /// A missing picture stream fails the clip; a missing or broken audio stream only makes it
    /// silent.
    pub fn open(backend: &dyn MediaBackend, path: &Path, settings: &ClipSettings) -> Self {
        let video = match backend.open_video(path) {
            Ok(reader) => reader,
            Err(e) => return Self::failed(path, e, settings),
        };
        let audio = backend
            .open_audio(path)
            .map_err(|e| {
                tracing::debug!(path = %path.display(), error = %e, "movie has no usable audio");
            })
            .ok();
        let thumbnail = backend
            .open_video(path)
            .map_err(|e| {
                tracing::debug!(path = %path.display(), error = %e, "thumbnail reader unavailable");
            })
            .ok();
        Self::from_readers(path, video, audio, thumbnail, settings)
    }

    /// Build from already opened readers.
    pub fn from_readers(
        path: impl Into<PathBuf>,
        video: Box<dyn VideoReader>,
        audio: Option<Box<dyn crate::media::reader::AudioReader>>,
        thumbnail: Option<Box<dyn VideoReader>>,
        settings: &ClipSettings,
    ) -> Self {
        let source = path.into();
        let Some(size) = video.info().size else {
            return Self::failed(
                source.clone(),
                MontageError::media_open(source, "source reports no picture size"),
                settings,
            );
        };
        let id = ClipId::next();
        let video_shared = StreamShared::new(false);
        let audio_shared = StreamShared::new(false);
        let source_channels = audio.as_ref().map_or(0, |a| a.channels());
        Self {
            id,
            source,
            video: Some(VideoStream::new(
                id,
                video,
                size,
                settings,
                Arc::clone(&video_shared),
            )),
            audio: audio.map(|a| AudioStream::new(id, a, settings, Arc::clone(&audio_shared))),
            video_shared,
            audio_shared,
            thumbnail,
            size: Some(size),
            channels: settings.channels,
            source_channels,
            sample_rate: settings.sample_rate,
            open_error: None,
            position: 0.0,
        }
    }

    /// A clip in the permanently failed state.
    pub fn failed(path: impl Into<PathBuf>, error: MontageError, settings: &ClipSettings) -> Self {
        let source = path.into();
        tracing::warn!(path = %source.display(), error = %error, "movie clip failed to open");
        let video_shared = StreamShared::new(false);
        video_shared.failed.store(true, Ordering::Release);
        Self {
            id: ClipId::next(),
            source,
            video: None,
            audio: None,
            video_shared,
            audio_shared: StreamShared::new(false),
            thumbnail: None,
            size: None,
            channels: settings.channels,
            source_channels: 0,
            sample_rate: settings.sample_rate,
            open_error: Some(error),
            position: 0.0,
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
        let duration = self
            .video
            .as_ref()
            .and_then(VideoStream::duration)
            .or_else(|| self.audio.as_ref().and_then(AudioStream::duration));
        ClipInfo {
            duration,
            has_audio: self.audio.is_some(),
            has_video: self.video.is_some(),
            channels: self.channels,
            source_channels: self.source_channels,
            sample_rate: self.sample_rate,
            size: self.size,
        }
    }

    /// Failed when the picture stream failed; audio failures only silence the clip.
    pub fn is_failed(&self) -> bool {
        self.video_shared.is_failed()
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.video_shared.looping.store(looping, Ordering::Relaxed);
        self.audio_shared.looping.store(looping, Ordering::Relaxed);
    }

    pub fn is_looping(&self) -> bool {
        self.video_shared.is_looping()
    }

    /// Position of the next audio read.
    pub fn next_read_position(&self) -> f64 {
        self.audio
            .as_ref()
            .map_or(self.position, AudioStream::position_secs)
    }

    pub fn set_next_read_position(&mut self, secs: f64) {
        self.position = secs;
        if let Some(audio) = self.audio.as_mut() {
            audio.seek(secs);
        }
        if let Some(video) = self.video.as_mut() {
            video.seek(secs);
        }
    }

    pub fn read_next_audio_block(&mut self, block: &mut AudioBlock) {
        match self.audio.as_mut() {
            Some(audio) => audio.read(block),
            None => {
                block.clear();
                self.position += block.frames() as f64 / f64::from(self.sample_rate);
            }
        }
    }

    pub fn read_frame_at(&mut self, secs: f64) -> Option<Arc<VideoFrame>> {
        self.video.as_mut()?.frame_at(secs)
    }

    /// Decode the frame at `secs` with the thumbnail reader, leaving playback untouched.
    pub fn thumbnail_at(&mut self, secs: f64) -> MontageResult<Option<VideoFrame>> {
        let reader = self.thumbnail.as_mut().ok_or_else(|| {
            MontageError::media_open(&self.source, "clip has no thumbnail reader")
        })?;
        reader.set_position(secs.max(0.0))?;
        reader.read_frame()
    }

    pub(crate) fn detach_decoders(&mut self, out: &mut Vec<Decoder>) {
        if let Some(d) = self.video.as_mut().and_then(VideoStream::detach) {
            out.push(Decoder::Video(d));
        }
        if let Some(d) = self.audio.as_mut().and_then(AudioStream::detach) {
            out.push(Decoder::Audio(d));
        }
    }

    pub(crate) fn attach_decoder(&mut self, decoder: Decoder) -> Option<Decoder> {
        match decoder {
            Decoder::Video(d) => match self.video.as_mut() {
                Some(v) => v.attach(d).map(Decoder::Video),
                None => Some(Decoder::Video(d)),
            },
            Decoder::Audio(d) => match self.audio.as_mut() {
                Some(a) => a.attach(d).map(Decoder::Audio),
                None => Some(Decoder::Audio(d)),
            },
        }
    }

    pub(crate) fn all_attached(&self) -> bool {
        self.video.as_ref().is_none_or(VideoStream::is_attached)
            && self.audio.as_ref().is_none_or(AudioStream::is_attached)
    }
}

impl std::fmt::Debug for MovieClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieClip")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("failed", &self.is_failed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/movie.rs"]
mod tests;
