use super::*;

use crate::foundation::core::Fps;
use crate::media::memory::MemoryBackend;
use crate::media::stream::MediaInfo;

fn settings() -> ClipSettings {
    ClipSettings {
        sample_rate: 10,
        channels: 1,
        canvas: Canvas::new(2, 2).unwrap(),
        audio_fifo_frames: 16,
        video_fifo_frames: 4,
        decode_block_frames: 4,
    }
}

/// Four 2x2 frames at 2 fps; frame `i` is grey level `10 * i`. Audio is 2 s of 0.5 at 10 Hz.
fn backend() -> MemoryBackend {
    let size = Canvas::new(2, 2).unwrap();
    let frames = (0..4u8)
        .map(|i| VideoFrame::solid(size, [10 * i, 10 * i, 10 * i, 255], 0.0))
        .collect();
    let mut backend = MemoryBackend::new();
    backend.insert_movie(
        "movie.mkv",
        Fps::new(2, 1).unwrap(),
        frames,
        Some((10, 1, vec![0.5; 20])),
    );
    backend.insert_movie(
        "silent.mkv",
        Fps::new(2, 1).unwrap(),
        vec![VideoFrame::solid(size, [1, 1, 1, 255], 0.0)],
        None,
    );
    backend
}

fn open(path: &str) -> MovieClip {
    MovieClip::open(&backend(), Path::new(path), &settings())
}

fn grey(frame: &VideoFrame) -> u8 {
    frame.pixel(0, 0)[0]
}

#[test]
fn frames_follow_requested_time() {
    let mut clip = open("movie.mkv");
    assert_eq!(grey(&clip.read_frame_at(0.0).unwrap()), 0);
    assert_eq!(grey(&clip.read_frame_at(0.4).unwrap()), 0);
    assert_eq!(grey(&clip.read_frame_at(0.5).unwrap()), 10);
    assert_eq!(grey(&clip.read_frame_at(1.9).unwrap()), 30);
}

#[test]
fn nothing_past_the_end_unless_looping() {
    let mut clip = open("movie.mkv");
    assert!(clip.read_frame_at(2.0).is_none());
    assert!(clip.read_frame_at(-0.1).is_none());

    clip.set_looping(true);
    assert!(clip.is_looping());
    assert_eq!(grey(&clip.read_frame_at(2.25).unwrap()), 0);
    assert_eq!(grey(&clip.read_frame_at(2.6).unwrap()), 10);
}

#[test]
fn backwards_request_seeks() {
    let mut clip = open("movie.mkv");
    assert_eq!(grey(&clip.read_frame_at(1.5).unwrap()), 30);
    assert_eq!(grey(&clip.read_frame_at(0.0).unwrap()), 0);
}

#[test]
fn audio_comes_from_the_same_file() {
    let mut clip = open("movie.mkv");
    let info = clip.info();
    assert!(info.has_audio && info.has_video);
    assert_eq!(info.duration, Some(2.0));
    assert_eq!(info.size, Some(Canvas::new(2, 2).unwrap()));

    let mut block = AudioBlock::silent(1, 4);
    clip.read_next_audio_block(&mut block);
    assert!(block.samples().iter().all(|s| (*s - 0.5).abs() < 1e-6));
}

#[test]
fn movie_without_audio_is_silent() {
    let mut clip = open("silent.mkv");
    assert!(!clip.info().has_audio);
    let mut block = AudioBlock::silent(1, 4);
    block.samples_mut().fill(1.0);
    clip.read_next_audio_block(&mut block);
    assert!(block.is_silent());
    assert!((clip.next_read_position() - 0.4).abs() < 1e-9);
}

#[test]
fn missing_movie_fails() {
    let mut clip = open("nope.mkv");
    assert!(clip.is_failed());
    assert!(clip.read_frame_at(0.0).is_none());
    assert!(matches!(clip.open_error(), Some(MontageError::MediaOpen { .. })));
}

#[test]
fn thumbnail_does_not_disturb_playback() {
    let mut clip = open("movie.mkv");
    assert_eq!(grey(&clip.read_frame_at(0.5).unwrap()), 10);
    let thumb = clip.thumbnail_at(1.5).unwrap().unwrap();
    assert_eq!(grey(&thumb), 30);
    assert_eq!(grey(&clip.read_frame_at(0.9).unwrap()), 10);
}

#[test]
fn detached_video_holds_last_frame_until_worker_catches_up() {
    let mut clip = open("movie.mkv");
    assert_eq!(grey(&clip.read_frame_at(0.0).unwrap()), 0);

    let mut decoders = Vec::new();
    clip.detach_decoders(&mut decoders);
    assert_eq!(decoders.len(), 2);
    assert!(!clip.all_attached());

    // The attached read already queued frame 1; further frames need the worker.
    assert_eq!(grey(&clip.read_frame_at(0.5).unwrap()), 10);
    assert_eq!(grey(&clip.read_frame_at(1.0).unwrap()), 10);

    for d in &mut decoders {
        d.step();
    }
    assert_eq!(grey(&clip.read_frame_at(1.0).unwrap()), 20);

    for d in decoders {
        assert!(clip.attach_decoder(d).is_none());
    }
    assert!(clip.all_attached());
    assert_eq!(grey(&clip.read_frame_at(1.5).unwrap()), 30);
}

/// Reports one second of pictures but yields no frames.
struct NoFrames(MediaInfo);

impl VideoReader for NoFrames {
    fn info(&self) -> &MediaInfo {
        &self.0
    }
    fn set_position(&mut self, _secs: f64) -> MontageResult<()> {
        Ok(())
    }
    fn read_frame(&mut self) -> MontageResult<Option<VideoFrame>> {
        Ok(None)
    }
}

#[test]
fn looping_source_without_frames_reads_nothing() {
    let size = Canvas::new(2, 2).unwrap();
    let reader = NoFrames(MediaInfo::video(size, Fps::new(2, 1).unwrap(), 1.0));
    let mut clip = MovieClip::from_readers("hollow.mkv", Box::new(reader), None, None, &settings());
    clip.set_looping(true);
    assert!(clip.read_frame_at(0.5).is_none());
    assert!(clip.read_frame_at(2.5).is_none());
}
