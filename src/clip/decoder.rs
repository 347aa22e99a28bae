//! Leaf decoders: a reader plus the producer half of its clip's fifo.
//!
//! While attached, a clip drives its decoder synchronously. Detached decoders run on a
//! playback worker and receive seeks through a [`SeekState`] mailbox.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::fifo::audio::AudioFifoWriter;
use crate::fifo::video::VideoFifoWriter;
use crate::foundation::error::MontageResult;
use crate::media::reader::{AudioReader, ReadOutcome, VideoReader};

/// Identifies the leaf clip a decoder belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u64);

impl ClipId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Outcome of one [`Decoder::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Units were pushed into the fifo.
    Progressed(usize),
    /// The fifo has no free space.
    Full,
    /// Nothing to do: end of media, failure, or an empty read.
    Idle,
}

/// Seek mailbox between a clip and its detached decoder.
///
/// The clip bumps `requested` after storing `target`. The decoder seeks, records the fifo write
/// position at that moment as the fence and publishes `served`. Everything below the fence is
/// stale and the clip skips it.
#[derive(Debug, Default)]
pub(crate) struct SeekState {
    requested: AtomicU64,
    target: AtomicU64,
    served: AtomicU64,
    fence: AtomicU64,
}

impl SeekState {
    pub(crate) fn request(&self, target_bits: u64) -> u64 {
        self.target.store(target_bits, Ordering::Relaxed);
        self.requested.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn poll(&self, served: u64) -> Option<(u64, u64)> {
        let generation = self.requested.load(Ordering::Acquire);
        (generation != served).then(|| (generation, self.target.load(Ordering::Relaxed)))
    }

    fn ack(&self, generation: u64, fence: u64) {
        self.fence.store(fence, Ordering::Relaxed);
        self.served.store(generation, Ordering::Release);
    }

    /// `(served generation, fence)`.
    pub(crate) fn served(&self) -> (u64, u64) {
        let generation = self.served.load(Ordering::Acquire);
        (generation, self.fence.load(Ordering::Relaxed))
    }

    pub(crate) fn requested(&self) -> u64 {
        self.requested.load(Ordering::Acquire)
    }
}

/// State shared between a leaf stream and its decoder.
#[derive(Debug, Default)]
pub(crate) struct StreamShared {
    pub(crate) seek: SeekState,
    pub(crate) failed: AtomicBool,
    pub(crate) looping: AtomicBool,
}

impl StreamShared {
    pub(crate) fn new(looping: bool) -> Arc<Self> {
        let shared = Self::default();
        shared.looping.store(looping, Ordering::Relaxed);
        Arc::new(shared)
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }
}

/// Copy `src` (interleaved, `in_ch`) into `dst` as `out_ch` interleaved channels.
///
/// Mono is duplicated to every output channel; downmix to mono averages; otherwise output
/// channel `c` takes input channel `c % in_ch`.
pub fn remix_interleaved(src: &[f32], in_ch: u16, dst: &mut Vec<f32>, out_ch: u16) {
    let in_ch = usize::from(in_ch.max(1));
    let out_ch = usize::from(out_ch.max(1));
    dst.clear();
    if in_ch == out_ch {
        dst.extend_from_slice(src);
        return;
    }
    let frames = src.len() / in_ch;
    dst.reserve(frames * out_ch);
    for frame in src.chunks_exact(in_ch) {
        if out_ch == 1 {
            dst.push(frame.iter().sum::<f32>() / in_ch as f32);
        } else {
            for c in 0..out_ch {
                dst.push(frame[c % in_ch]);
            }
        }
    }
}

/// Audio reader feeding an audio fifo.
pub struct AudioDecoder {
    clip_id: ClipId,
    reader: Box<dyn AudioReader>,
    writer: AudioFifoWriter,
    shared: Arc<StreamShared>,
    block_frames: usize,
    length_frames: Option<u64>,
    scratch: Vec<f32>,
    remixed: Vec<f32>,
    ended: bool,
    /// Rewound for a loop and nothing decoded since.
    rewound: bool,
    served: u64,
}

impl AudioDecoder {
    pub(crate) fn new(
        clip_id: ClipId,
        reader: Box<dyn AudioReader>,
        writer: AudioFifoWriter,
        shared: Arc<StreamShared>,
        block_frames: usize,
    ) -> Self {
        let length_frames = reader
            .info()
            .duration
            .map(|d| (d * f64::from(reader.output_sample_rate())).round() as u64);
        Self {
            clip_id,
            reader,
            writer,
            shared,
            block_frames: block_frames.max(1),
            length_frames,
            scratch: Vec::new(),
            remixed: Vec::new(),
            ended: false,
            rewound: false,
            served: 0,
        }
    }

    pub fn clip_id(&self) -> ClipId {
        self.clip_id
    }

    /// Seek so the next pushed frame is output frame `frame` (unwrapped when looping).
    pub(crate) fn seek_now(&mut self, frame: u64) -> MontageResult<()> {
        let target = match self.length_frames {
            Some(len) if len > 0 && self.shared.is_looping() => frame % len,
            _ => frame,
        };
        self.ended = false;
        self.rewound = false;
        self.reader.set_position(target)
    }

    /// Take the decoder back from a worker: forget pending mailbox requests and seek to `frame`.
    pub(crate) fn reattach_at(&mut self, frame: u64) -> MontageResult<()> {
        self.served = self.shared.seek.requested();
        self.seek_now(frame)
    }

    fn fail(&mut self, err: &crate::MontageError) {
        tracing::warn!(clip = self.clip_id.0, error = %err, "audio decode failed; clip goes silent");
        self.shared.failed.store(true, Ordering::Release);
    }

    /// Decode one chunk into the fifo.
    pub fn step(&mut self) -> DecodeStatus {
        if self.shared.is_failed() {
            return DecodeStatus::Idle;
        }
        if let Some((generation, target)) = self.shared.seek.poll(self.served) {
            if let Err(e) = self.seek_now(target) {
                self.fail(&e);
                return DecodeStatus::Idle;
            }
            self.served = generation;
            self.shared.seek.ack(generation, self.writer.write_position());
        }
        if self.ended {
            return DecodeStatus::Idle;
        }
        let free = self.writer.free();
        if free == 0 {
            return DecodeStatus::Full;
        }

        self.scratch.clear();
        let want = free.min(self.block_frames);
        match self.reader.read_samples(want, &mut self.scratch) {
            Err(e) => {
                self.fail(&e);
                DecodeStatus::Idle
            }
            Ok(ReadOutcome::EndOfMedia) => {
                let loops = self.shared.is_looping() && self.length_frames.is_some_and(|l| l > 0);
                if loops && !self.rewound {
                    if let Err(e) = self.reader.set_position(0) {
                        self.fail(&e);
                    }
                    self.rewound = true;
                    return DecodeStatus::Progressed(0);
                }
                if loops {
                    tracing::warn!(clip = self.clip_id.0, "looping audio source is empty; clip goes silent");
                }
                self.ended = true;
                DecodeStatus::Idle
            }
            Ok(ReadOutcome::Frames(0)) => DecodeStatus::Idle,
            Ok(ReadOutcome::Frames(n)) => {
                self.rewound = false;
                remix_interleaved(
                    &self.scratch,
                    self.reader.channels(),
                    &mut self.remixed,
                    self.writer.channels(),
                );
                match self.writer.push(&self.remixed) {
                    Ok(()) => DecodeStatus::Progressed(n),
                    Err(e) => {
                        tracing::debug!(clip = self.clip_id.0, error = %e, "audio fifo rejected push");
                        DecodeStatus::Full
                    }
                }
            }
        }
    }
}

/// Video reader feeding a video fifo.
pub struct VideoDecoder {
    clip_id: ClipId,
    reader: Box<dyn VideoReader>,
    writer: VideoFifoWriter,
    shared: Arc<StreamShared>,
    length: Option<f64>,
    loop_base: f64,
    ended: bool,
    rewound: bool,
    served: u64,
}

impl VideoDecoder {
    pub(crate) fn new(
        clip_id: ClipId,
        reader: Box<dyn VideoReader>,
        writer: VideoFifoWriter,
        shared: Arc<StreamShared>,
    ) -> Self {
        let length = reader.info().duration.filter(|d| *d > 0.0);
        Self {
            clip_id,
            reader,
            writer,
            shared,
            length,
            loop_base: 0.0,
            ended: false,
            rewound: false,
            served: 0,
        }
    }

    pub fn clip_id(&self) -> ClipId {
        self.clip_id
    }

    /// Seek so the next pushed frame is the one displayed at `secs` (unwrapped when looping).
    pub(crate) fn seek_now(&mut self, secs: f64) -> MontageResult<()> {
        let secs = secs.max(0.0);
        self.loop_base = match self.length {
            Some(len) if self.shared.is_looping() => (secs / len).floor() * len,
            _ => 0.0,
        };
        self.ended = false;
        self.rewound = false;
        self.reader.set_position(secs - self.loop_base)
    }

    /// Take the decoder back from a worker: forget pending mailbox requests and seek to `secs`.
    pub(crate) fn reattach_at(&mut self, secs: f64) -> MontageResult<()> {
        self.served = self.shared.seek.requested();
        self.seek_now(secs)
    }

    fn fail(&mut self, err: &crate::MontageError) {
        tracing::warn!(clip = self.clip_id.0, error = %err, "video decode failed; clip goes black");
        self.shared.failed.store(true, Ordering::Release);
    }

    /// Decode one frame into the fifo.
    pub fn step(&mut self) -> DecodeStatus {
        if self.shared.is_failed() {
            return DecodeStatus::Idle;
        }
        if let Some((generation, target)) = self.shared.seek.poll(self.served) {
            if let Err(e) = self.seek_now(f64::from_bits(target)) {
                self.fail(&e);
                return DecodeStatus::Idle;
            }
            self.served = generation;
            self.shared.seek.ack(generation, self.writer.write_position());
        }
        if self.ended {
            return DecodeStatus::Idle;
        }
        if self.writer.free() == 0 {
            return DecodeStatus::Full;
        }

        match self.reader.read_frame() {
            Err(e) => {
                self.fail(&e);
                DecodeStatus::Idle
            }
            Ok(None) => {
                if let (Some(len), true) = (self.length, self.shared.is_looping()) {
                    if self.rewound {
                        tracing::warn!(clip = self.clip_id.0, "looping video source is empty; clip goes black");
                        self.ended = true;
                        return DecodeStatus::Idle;
                    }
                    self.loop_base += len;
                    if let Err(e) = self.reader.set_position(0.0) {
                        self.fail(&e);
                    }
                    self.rewound = true;
                    return DecodeStatus::Progressed(0);
                }
                self.ended = true;
                DecodeStatus::Idle
            }
            Ok(Some(mut frame)) => {
                self.rewound = false;
                frame.timestamp += self.loop_base;
                match self.writer.push(frame) {
                    Ok(()) => DecodeStatus::Progressed(1),
                    Err(e) if e.is_fifo_condition() => DecodeStatus::Full,
                    Err(e) => {
                        self.fail(&e);
                        DecodeStatus::Idle
                    }
                }
            }
        }
    }
}

/// A decoder handed out by [`Clip::detach_decoders`](crate::clip::Clip::detach_decoders).
pub enum Decoder {
    Audio(AudioDecoder),
    Video(VideoDecoder),
}

impl Decoder {
    /// Owning leaf clip.
    pub fn clip_id(&self) -> ClipId {
        match self {
            Self::Audio(d) => d.clip_id(),
            Self::Video(d) => d.clip_id(),
        }
    }

    pub fn step(&mut self) -> DecodeStatus {
        match self {
            Self::Audio(d) => d.step(),
            Self::Video(d) => d.step(),
        }
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio(d) => f.debug_tuple("Audio").field(&d.clip_id).finish(),
            Self::Video(d) => f.debug_tuple("Video").field(&d.clip_id).finish(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/decoder.rs"]
mod tests;
