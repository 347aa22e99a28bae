use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::clip::decoder::{AudioDecoder, ClipId, DecodeStatus, StreamShared};
use crate::clip::{ClipInfo, ClipSettings};
use crate::fifo::audio::{AudioFifo, AudioFifoReader};
use crate::foundation::buffer::AudioBlock;
use crate::foundation::core::{samples_to_secs, secs_to_samples};
use crate::foundation::error::MontageError;
use crate::media::reader::{AudioReader, MediaBackend};

/// Consumer side of a decoded audio source, shared by audio and movie clips.
pub(crate) struct AudioStream {
    clip_id: ClipId,
    fifo: AudioFifoReader,
    decoder: Option<AudioDecoder>,
    shared: Arc<StreamShared>,
    sample_rate: u32,
    length_frames: Option<u64>,
    /// Unwrapped output frame served by the next read.
    position: u64,
    pending_seek: Option<u64>,
    lag: u64,
}

impl AudioStream {
    pub(crate) fn new(
        clip_id: ClipId,
        mut reader: Box<dyn AudioReader>,
        settings: &ClipSettings,
        shared: Arc<StreamShared>,
    ) -> Self {
        reader.set_output_sample_rate(settings.sample_rate);
        let length_frames = reader
            .info()
            .duration
            .map(|d| secs_to_samples(d, settings.sample_rate).max(0) as u64);
        let (writer, fifo) = AudioFifo::new(settings.channels, settings.audio_fifo_frames).split();
        let decoder = AudioDecoder::new(
            clip_id,
            reader,
            writer,
            Arc::clone(&shared),
            settings.decode_block_frames,
        );
        Self {
            clip_id,
            fifo,
            decoder: Some(decoder),
            shared,
            sample_rate: settings.sample_rate,
            length_frames,
            position: 0,
            pending_seek: None,
            lag: 0,
        }
    }

    pub(crate) fn position_secs(&self) -> f64 {
        samples_to_secs(self.position as i64, self.sample_rate)
    }

    pub(crate) fn duration(&self) -> Option<f64> {
        self.length_frames
            .map(|l| samples_to_secs(l as i64, self.sample_rate))
    }

    pub(crate) fn seek(&mut self, secs: f64) {
        let frame = secs_to_samples(secs.max(0.0), self.sample_rate) as u64;
        self.position = frame;
        self.lag = 0;
        self.fifo.clear();
        match self.decoder.as_mut() {
            Some(decoder) => {
                self.pending_seek = None;
                if let Err(e) = decoder.seek_now(frame) {
                    self.fail(&e);
                }
            }
            None => self.pending_seek = Some(self.shared.seek.request(frame)),
        }
    }

    fn fail(&self, err: &MontageError) {
        tracing::warn!(clip = self.clip_id.0, error = %err, "audio seek failed; clip goes silent");
        self.shared.failed.store(true, Ordering::Release);
    }

    fn past_end(&self) -> bool {
        !self.shared.is_looping() && self.length_frames.is_some_and(|l| self.position >= l)
    }

    /// Fill `block` from the source. Anything that cannot be served is silence.
    pub(crate) fn read(&mut self, block: &mut AudioBlock) {
        let frames = block.frames();
        if self.shared.is_failed() || self.past_end() {
            block.clear();
            self.position += frames as u64;
            return;
        }
        match self.decoder.as_mut() {
            Some(decoder) => {
                let ch = usize::from(block.channels());
                let samples = block.samples_mut();
                let mut served = 0;
                while served < frames {
                    if self.fifo.available() == 0 {
                        match decoder.step() {
                            DecodeStatus::Progressed(_) => continue,
                            DecodeStatus::Full | DecodeStatus::Idle => break,
                        }
                    }
                    let got = self.fifo.pop(&mut samples[served * ch..]);
                    if got == 0 {
                        break;
                    }
                    served += got;
                }
                block.clear_from(served);
            }
            None => self.read_detached(block),
        }
        self.position += frames as u64;
    }

    fn read_detached(&mut self, block: &mut AudioBlock) {
        let frames = block.frames();
        if let Some(generation) = self.pending_seek {
            let (served, fence) = self.shared.seek.served();
            if served < generation {
                block.clear();
                self.lag += frames as u64;
                return;
            }
            let stale = fence.saturating_sub(self.fifo.read_position());
            self.fifo.skip(stale as usize);
            self.pending_seek = None;
        }
        if self.lag > 0 {
            self.lag -= self.fifo.skip(self.lag as usize) as u64;
            if self.lag > 0 {
                block.clear();
                self.lag += frames as u64;
                return;
            }
        }
        let got = self.fifo.pop(block.samples_mut());
        if got < frames {
            block.clear_from(got);
            self.lag += (frames - got) as u64;
            tracing::debug!(
                clip = self.clip_id.0,
                requested = frames,
                available = got,
                "audio fifo underrun"
            );
        }
    }

    pub(crate) fn detach(&mut self) -> Option<AudioDecoder> {
        self.pending_seek = None;
        self.decoder.take()
    }

    /// Returns the decoder back if it belongs elsewhere.
    pub(crate) fn attach(&mut self, mut decoder: AudioDecoder) -> Option<AudioDecoder> {
        if decoder.clip_id() != self.clip_id || self.decoder.is_some() {
            return Some(decoder);
        }
        self.fifo.clear();
        self.pending_seek = None;
        self.lag = 0;
        if let Err(e) = decoder.reattach_at(self.position) {
            self.fail(&e);
        }
        self.decoder = Some(decoder);
        None
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.decoder.is_some()
    }
}

/// Clip playing the audio of a file.
pub struct AudioClip {
    id: ClipId,
    source: PathBuf,
    stream: Option<AudioStream>,
    shared: Arc<StreamShared>,
    channels: u16,
    sample_rate: u32,
    source_channels: u16,
    open_error: Option<MontageError>,
    position: f64,
}

impl AudioClip {
    /// Open `path` through `backend`. Never fails: an unreadable source yields a failed clip.
    pub fn open(backend: &dyn MediaBackend, path: &Path, settings: &ClipSettings) -> Self {
        match backend.open_audio(path) {
            Ok(reader) => Self::from_reader(path, reader, settings),
            Err(e) => Self::failed(path, e, settings),
        }
    }

    /// Wrap an already opened reader.
    pub fn from_reader(
        path: impl Into<PathBuf>,
        reader: Box<dyn AudioReader>,
        settings: &ClipSettings,
    ) -> Self {
        let id = ClipId::next();
        let shared = StreamShared::new(false);
        let source_channels = reader.channels();
        Self {
            id,
            source: path.into(),
            stream: Some(AudioStream::new(id, reader, settings, Arc::clone(&shared))),
            shared,
            channels: settings.channels,
            sample_rate: settings.sample_rate,
            source_channels,
            open_error: None,
            position: 0.0,
        }
    }

    /// A clip in the permanently failed state.
    pub fn failed(path: impl Into<PathBuf>, error: MontageError, settings: &ClipSettings) -> Self {
        let source = path.into();
        tracing::warn!(path = %source.display(), error = %error, "audio clip failed to open");
        let shared = StreamShared::new(false);
        shared.failed.store(true, Ordering::Release);
        Self {
            id: ClipId::next(),
            source,
            stream: None,
            shared,
            channels: settings.channels,
            sample_rate: settings.sample_rate,
            source_channels: 0,
            open_error: Some(error),
            position: 0.0,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    /// File this clip was opened from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The error that prevented opening, if any.
    pub fn open_error(&self) -> Option<&MontageError> {
        self.open_error.as_ref()
    }

    pub fn info(&self) -> ClipInfo {
        ClipInfo {
            duration: self.stream.as_ref().and_then(AudioStream::duration),
            has_audio: self.stream.is_some(),
            has_video: false,
            channels: self.channels,
            source_channels: self.source_channels,
            sample_rate: self.sample_rate,
            size: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.shared.is_failed()
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Relaxed);
    }

    pub fn is_looping(&self) -> bool {
        self.shared.is_looping()
    }

    pub fn next_read_position(&self) -> f64 {
        self.stream
            .as_ref()
            .map_or(self.position, AudioStream::position_secs)
    }

    pub fn set_next_read_position(&mut self, secs: f64) {
        self.position = secs;
        if let Some(stream) = self.stream.as_mut() {
            stream.seek(secs);
        }
    }

    /// Fill `block` with the next samples; silence at end of media or after a failure.
    pub fn read_next_audio_block(&mut self, block: &mut AudioBlock) {
        match self.stream.as_mut() {
            Some(stream) => stream.read(block),
            None => {
                block.clear();
                self.position += block.frames() as f64 / f64::from(self.sample_rate);
            }
        }
    }

    pub(crate) fn stream_mut(&mut self) -> Option<&mut AudioStream> {
        self.stream.as_mut()
    }

    pub(crate) fn stream_attached(&self) -> bool {
        self.stream.as_ref().is_none_or(AudioStream::is_attached)
    }
}

impl std::fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClip")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("failed", &self.is_failed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/audio.rs"]
mod tests;
