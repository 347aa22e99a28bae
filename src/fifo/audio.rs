use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::fifo::FifoCounters;
use crate::foundation::buffer::AudioBlock;
use crate::foundation::error::{MontageError, MontageResult};

/// Interleaved `f32` sample fifo with a fixed capacity in sample frames.
pub struct AudioFifo {
    writer: AudioFifoWriter,
    reader: AudioFifoReader,
}

impl AudioFifo {
    /// Create a fifo holding up to `capacity_frames` frames of `channels` interleaved samples.
    pub fn new(channels: u16, capacity_frames: usize) -> Self {
        let channels = channels.max(1);
        let capacity_frames = capacity_frames.max(1);
        let (producer, consumer) = RingBuffer::new(capacity_frames * usize::from(channels));
        let counters = FifoCounters::new();
        Self {
            writer: AudioFifoWriter {
                channels,
                producer,
                counters: Arc::clone(&counters),
            },
            reader: AudioFifoReader {
                channels,
                consumer,
                counters,
            },
        }
    }

    /// Recombine halves previously returned by [`AudioFifo::split`].
    pub fn join(writer: AudioFifoWriter, reader: AudioFifoReader) -> MontageResult<Self> {
        if !Arc::ptr_eq(&writer.counters, &reader.counters) {
            return Err(MontageError::validation(
                "audio fifo halves belong to different fifos",
            ));
        }
        Ok(Self { writer, reader })
    }

    /// Split into the producer and consumer halves.
    pub fn split(self) -> (AudioFifoWriter, AudioFifoReader) {
        (self.writer, self.reader)
    }

    /// Reconfigure channel count and capacity. Buffered content is discarded and the absolute
    /// positions restart at zero.
    pub fn set_size(&mut self, channels: u16, capacity_frames: usize) {
        *self = Self::new(channels, capacity_frames);
    }

    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.reader.channels
    }

    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.writer.capacity()
    }

    /// See [`AudioFifoWriter::push`].
    pub fn push(&mut self, interleaved: &[f32]) -> MontageResult<()> {
        self.writer.push(interleaved)
    }

    /// See [`AudioFifoReader::pop`].
    pub fn pop(&mut self, dst: &mut [f32]) -> usize {
        self.reader.pop(dst)
    }

    /// See [`AudioFifoReader::skip`].
    pub fn skip(&mut self, frames: usize) -> usize {
        self.reader.skip(frames)
    }

    /// Frames ready to be read.
    pub fn available(&self) -> usize {
        self.reader.available()
    }

    /// Frames that can still be pushed.
    pub fn free(&self) -> usize {
        self.writer.free()
    }

    /// Absolute number of frames consumed since creation.
    pub fn read_position(&self) -> u64 {
        self.reader.read_position()
    }

    /// Absolute number of frames produced since creation.
    pub fn write_position(&self) -> u64 {
        self.writer.write_position()
    }
}

/// Producer half of an [`AudioFifo`], owned by the decode side.
pub struct AudioFifoWriter {
    channels: u16,
    producer: Producer<f32>,
    counters: Arc<FifoCounters>,
}

impl AudioFifoWriter {
    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity() / usize::from(self.channels)
    }

    /// Frames that can be pushed without overflowing.
    pub fn free(&self) -> usize {
        self.producer.slots() / usize::from(self.channels)
    }

    /// Append interleaved samples.
    ///
    /// All or nothing: when the samples do not fit, nothing is written and
    /// [`MontageError::Overflow`] reports the requested and free frame counts.
    pub fn push(&mut self, interleaved: &[f32]) -> MontageResult<()> {
        let ch = usize::from(self.channels);
        if !interleaved.len().is_multiple_of(ch) {
            return Err(MontageError::validation(
                "pushed sample count is not a multiple of the channel count",
            ));
        }
        let frames = interleaved.len() / ch;
        if frames == 0 {
            return Ok(());
        }
        let free = self.free();
        if frames > free {
            return Err(MontageError::Overflow {
                requested: frames,
                free,
            });
        }

        let mut chunk = self
            .producer
            .write_chunk(interleaved.len())
            .map_err(|_| MontageError::Overflow {
                requested: frames,
                free,
            })?;
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        first.copy_from_slice(&interleaved[..split]);
        second.copy_from_slice(&interleaved[split..]);
        chunk.commit_all();

        self.counters.add_written(frames as u64);
        Ok(())
    }

    /// Absolute number of frames produced since creation.
    pub fn write_position(&self) -> u64 {
        self.counters.written()
    }

    /// `true` once the reader half has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Consumer half of an [`AudioFifo`], owned by the mixing/render side.
pub struct AudioFifoReader {
    channels: u16,
    consumer: Consumer<f32>,
    counters: Arc<FifoCounters>,
}

impl AudioFifoReader {
    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Frames ready to be read.
    pub fn available(&self) -> usize {
        self.consumer.slots() / usize::from(self.channels)
    }

    /// Read up to `dst.len() / channels` frames into `dst`.
    ///
    /// Returns the number of frames copied; fewer than requested means the fifo was starved.
    /// The remainder of `dst` is left untouched. Never blocks.
    pub fn pop(&mut self, dst: &mut [f32]) -> usize {
        let ch = usize::from(self.channels);
        let frames = (dst.len() / ch).min(self.available());
        if frames == 0 {
            return 0;
        }
        let Ok(chunk) = self.consumer.read_chunk(frames * ch) else {
            return 0;
        };
        let (first, second) = chunk.as_slices();
        dst[..first.len()].copy_from_slice(first);
        dst[first.len()..first.len() + second.len()].copy_from_slice(second);
        chunk.commit_all();

        self.counters.add_read(frames as u64);
        frames
    }

    /// Read into the front of `block`; zero-fills whatever could not be served.
    ///
    /// Returns [`MontageError::Underrun`] when the block could not be filled completely.
    pub fn pop_block(&mut self, block: &mut AudioBlock) -> MontageResult<()> {
        let requested = block.frames();
        let got = self.pop(block.samples_mut());
        if got < requested {
            block.clear_from(got);
            return Err(MontageError::Underrun {
                requested,
                available: got,
            });
        }
        Ok(())
    }

    /// Discard up to `frames` buffered frames. Returns how many were discarded.
    pub fn skip(&mut self, frames: usize) -> usize {
        let ch = usize::from(self.channels);
        let frames = frames.min(self.available());
        if frames == 0 {
            return 0;
        }
        match self.consumer.read_chunk(frames * ch) {
            Ok(chunk) => {
                chunk.commit_all();
                self.counters.add_read(frames as u64);
                frames
            }
            Err(_) => 0,
        }
    }

    /// Discard everything currently buffered.
    pub fn clear(&mut self) -> usize {
        self.skip(self.available())
    }

    /// Absolute number of frames consumed since creation.
    pub fn read_position(&self) -> u64 {
        self.counters.read()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fifo/audio.rs"]
mod tests;
