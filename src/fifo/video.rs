use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::fifo::FifoCounters;
use crate::foundation::buffer::VideoFrame;
use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};

/// Decoded frame fifo with fixed frame dimensions and capacity.
pub struct VideoFifo {
    writer: VideoFifoWriter,
    reader: VideoFifoReader,
}

impl VideoFifo {
    /// Create a fifo for frames of `size`, holding at most `capacity` frames.
    pub fn new(size: Canvas, capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        let counters = FifoCounters::new();
        Self {
            writer: VideoFifoWriter {
                size,
                producer,
                counters: Arc::clone(&counters),
            },
            reader: VideoFifoReader {
                size,
                consumer,
                counters,
            },
        }
    }

    /// Recombine halves previously returned by [`VideoFifo::split`].
    pub fn join(writer: VideoFifoWriter, reader: VideoFifoReader) -> MontageResult<Self> {
        if !Arc::ptr_eq(&writer.counters, &reader.counters) {
            return Err(MontageError::validation(
                "video fifo halves belong to different fifos",
            ));
        }
        Ok(Self { writer, reader })
    }

    /// Split into the producer and consumer halves.
    pub fn split(self) -> (VideoFifoWriter, VideoFifoReader) {
        (self.writer, self.reader)
    }

    /// Reconfigure frame size and capacity, discarding buffered frames.
    pub fn set_size(&mut self, size: Canvas, capacity: usize) {
        *self = Self::new(size, capacity);
    }

    /// Frame dimensions accepted by this fifo.
    pub fn size(&self) -> Canvas {
        self.writer.size
    }

    /// See [`VideoFifoWriter::push`].
    pub fn push(&mut self, frame: VideoFrame) -> MontageResult<()> {
        self.writer.push(frame)
    }

    /// See [`VideoFifoReader::pop`].
    pub fn pop(&mut self) -> Option<VideoFrame> {
        self.reader.pop()
    }

    /// See [`VideoFifoReader::pop_many`].
    pub fn pop_many(&mut self, count: usize) -> Vec<VideoFrame> {
        self.reader.pop_many(count)
    }

    /// See [`VideoFifoReader::skip`].
    pub fn skip(&mut self, count: usize) -> usize {
        self.reader.skip(count)
    }

    /// Frames ready to be read.
    pub fn available(&self) -> usize {
        self.reader.available()
    }

    /// Absolute number of frames consumed since creation.
    pub fn read_position(&self) -> u64 {
        self.reader.read_position()
    }
}

/// Producer half of a [`VideoFifo`].
pub struct VideoFifoWriter {
    size: Canvas,
    producer: Producer<VideoFrame>,
    counters: Arc<FifoCounters>,
}

impl VideoFifoWriter {
    /// Frame dimensions accepted by this fifo.
    pub fn size(&self) -> Canvas {
        self.size
    }

    /// Free frame slots.
    pub fn free(&self) -> usize {
        self.producer.slots()
    }

    /// Append one frame.
    ///
    /// Fails with [`MontageError::Overflow`] when full and with a validation error when the
    /// frame does not match the configured size. The frame is dropped in both cases.
    pub fn push(&mut self, frame: VideoFrame) -> MontageResult<()> {
        if frame.width != self.size.width || frame.height != self.size.height {
            return Err(MontageError::validation(format!(
                "frame size {}x{} does not match fifo size {}x{}",
                frame.width, frame.height, self.size.width, self.size.height
            )));
        }
        self.producer
            .push(frame)
            .map_err(|_| MontageError::Overflow {
                requested: 1,
                free: 0,
            })?;
        self.counters.add_written(1);
        Ok(())
    }

    /// Absolute number of frames produced since creation.
    pub fn write_position(&self) -> u64 {
        self.counters.written()
    }
}

/// Consumer half of a [`VideoFifo`].
pub struct VideoFifoReader {
    size: Canvas,
    consumer: Consumer<VideoFrame>,
    counters: Arc<FifoCounters>,
}

impl VideoFifoReader {
    /// Frame dimensions accepted by this fifo.
    pub fn size(&self) -> Canvas {
        self.size
    }

    /// Frames ready to be read.
    pub fn available(&self) -> usize {
        self.consumer.slots()
    }

    /// Timestamp of the oldest buffered frame without consuming it.
    pub fn peek_timestamp(&self) -> Option<f64> {
        self.consumer.peek().ok().map(|f| f.timestamp)
    }

    /// Take the oldest frame, `None` when starved.
    pub fn pop(&mut self) -> Option<VideoFrame> {
        let frame = self.consumer.pop().ok()?;
        self.counters.add_read(1);
        Some(frame)
    }

    /// Take up to `count` frames in order.
    pub fn pop_many(&mut self, count: usize) -> Vec<VideoFrame> {
        let n = count.min(self.available());
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.pop() {
                Some(f) => out.push(f),
                None => break,
            }
        }
        out
    }

    /// Discard up to `count` frames. Returns how many were discarded.
    pub fn skip(&mut self, count: usize) -> usize {
        let n = count.min(self.available());
        if n == 0 {
            return 0;
        }
        match self.consumer.read_chunk(n) {
            Ok(chunk) => {
                chunk.commit_all();
                self.counters.add_read(n as u64);
                n
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
#[path = "../../tests/unit/fifo/video.rs"]
mod tests;
