//! Bounded single-producer/single-consumer fifos between decode and mix stages.
//!
//! Both fifos sit on top of `rtrb` ring buffers, so push/pop are index based and never take a
//! lock. Overflow policy is **reject**: a push that does not fit writes nothing and returns
//! [`MontageError::Overflow`](crate::MontageError::Overflow). Pops return fewer units than
//! requested when starved and never block.
//!
//! Each fifo can be split into a writer half (decode thread) and a reader half (mix/render
//! thread). Resizing needs both halves back in one [`AudioFifo`]/[`VideoFifo`], which is how
//! "stop the producer before `set_size`" is enforced.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Audio sample fifo.
pub mod audio;
/// Video frame fifo.
pub mod video;

/// Absolute positions shared by both halves of a fifo. They only ever grow, so they survive ring
/// wraparound and let consumers recover timestamps.
#[derive(Debug, Default)]
pub(crate) struct FifoCounters {
    written: AtomicU64,
    read: AtomicU64,
}

impl FifoCounters {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add_written(&self, n: u64) {
        self.written.fetch_add(n, Ordering::Release);
    }

    pub(crate) fn add_read(&self, n: u64) {
        self.read.fetch_add(n, Ordering::Release);
    }

    pub(crate) fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    pub(crate) fn read(&self) -> u64 {
        self.read.load(Ordering::Acquire)
    }
}
