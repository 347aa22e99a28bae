//! Media collaborators: reader/writer contracts and their reference implementations.
//!
//! The engine never touches codecs directly. Sources are opened through a [`MediaBackend`] and
//! output goes through a [`MediaWriter`](writer::MediaWriter).

/// `ffmpeg`/`ffprobe` subprocess readers.
pub mod ffmpeg;
/// `ffmpeg` subprocess writer.
pub mod ffmpeg_writer;
/// Backend for files on disk.
pub mod file;
/// Still-image decoding.
pub mod image;
/// In-memory readers and backend.
pub mod memory;
/// Reader contracts.
pub mod reader;
/// Container metadata.
pub mod stream;
/// Writer contract, settings and in-memory writer.
pub mod writer;

pub use reader::MediaBackend;
