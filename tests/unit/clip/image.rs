use super::*;

use crate::foundation::core::Canvas;
use crate::media::memory::MemoryBackend;

fn backend() -> MemoryBackend {
    let mut backend = MemoryBackend::new();
    backend.insert_image(
        "still.png",
        VideoFrame::solid(Canvas::new(3, 2).unwrap(), [5, 6, 7, 255], 0.0),
    );
    backend
}

#[test]
fn same_frame_for_every_time() {
    let mut clip = ImageClip::open(&backend(), Path::new("still.png"), &ClipSettings::default());
    let a = clip.read_frame_at(-3.0).unwrap();
    let b = clip.read_frame_at(1e6).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.pixel(2, 1), [5, 6, 7, 255]);
    assert_eq!(clip.info().size, Some(Canvas::new(3, 2).unwrap()));
    assert_eq!(clip.info().duration, None);
}

#[test]
fn audio_is_silence_and_advances() {
    let settings = ClipSettings {
        sample_rate: 100,
        ..ClipSettings::default()
    };
    let mut clip = ImageClip::open(&backend(), Path::new("still.png"), &settings);
    let mut block = AudioBlock::silent(2, 50);
    block.samples_mut().fill(0.3);
    clip.read_next_audio_block(&mut block);
    assert!(block.is_silent());
    assert!((clip.next_read_position() - 0.5).abs() < 1e-9);
}

#[test]
fn undecodable_image_fails() {
    let mut clip = ImageClip::open(&backend(), Path::new("other.png"), &ClipSettings::default());
    assert!(clip.is_failed());
    assert!(clip.open_error().is_some());
    assert!(clip.read_frame_at(0.0).is_none());
}
