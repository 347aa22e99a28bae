use super::*;

use std::time::{Duration, Instant};

use crate::clip::{ClipKind, ClipSettings};
use crate::foundation::core::{Canvas, Fps};
use crate::media::memory::MemoryBackend;
use crate::media::writer::{AudioSettings, InMemoryWriter, VideoSettings};
use crate::processor::builtin::GainProcessor;
use crate::processor::registry::builtin_identifier;

fn config() -> EngineConfig {
    let canvas = Canvas::new(2, 2).unwrap();
    EngineConfig {
        clip: ClipSettings {
            sample_rate: 10,
            channels: 1,
            canvas,
            audio_fifo_frames: 32,
            video_fifo_frames: 4,
            decode_block_frames: 4,
        },
        audio: AudioSettings {
            sample_rate: 10,
            channels: 1,
        },
        video: VideoSettings {
            canvas,
            fps: Fps::new(2, 1).unwrap(),
        },
        playback: PlaybackConfig { idle_sleep_ms: 1 },
        ..EngineConfig::default()
    }
}

fn engine() -> VideoEngine {
    let size = Canvas::new(2, 2).unwrap();
    let mut b = MemoryBackend::new();
    b.insert_audio("tone.wav", 10, 1, vec![0.5; 20]);
    b.insert_audio("long.wav", 10, 1, vec![0.5; 1000]);
    b.insert_image("blue.png", VideoFrame::solid(size, [0, 0, 255, 255], 0.0));
    b.insert_movie(
        "shot.mkv",
        Fps::new(2, 1).unwrap(),
        vec![VideoFrame::solid(size, [7, 7, 7, 255], 0.0); 4],
        None,
    );
    VideoEngine::new(config(), Arc::new(b)).unwrap()
}

#[test]
fn invalid_config_is_rejected() {
    let mut cfg = config();
    cfg.audio.sample_rate = 48_000;
    assert!(VideoEngine::new(cfg, Arc::new(MemoryBackend::new())).is_err());
}

#[test]
fn clip_kind_follows_the_probe() {
    let e = engine();
    assert_eq!(e.create_clip_from_file(Path::new("tone.wav")).kind(), ClipKind::Audio);
    assert_eq!(e.create_clip_from_file(Path::new("blue.png")).kind(), ClipKind::Image);
    assert_eq!(e.create_clip_from_file(Path::new("shot.mkv")).kind(), ClipKind::Movie);

    let missing = e.create_clip_from_file(Path::new("gone.mov"));
    assert_eq!(missing.kind(), ClipKind::Movie);
    assert!(missing.is_failed());
    let missing = e.create_clip_from_file(Path::new("gone.png"));
    assert_eq!(missing.kind(), ClipKind::Image);
    assert!(missing.is_failed());
}

#[test]
fn timeline_edits() {
    let mut e = engine();
    let id = e.add_file(Path::new("blue.png"), 1.0, 2.0).unwrap();
    assert_eq!(e.descriptor(id).unwrap().end(), 3.0);
    assert!(e.add_file(Path::new("blue.png"), 0.0, -1.0).is_err());

    e.move_clip(id, 2.0).unwrap();
    e.trim_clip(id, 2.5, 3.5).unwrap();
    e.set_offset(id, -1.0).unwrap();
    let d = e.descriptor(id).unwrap();
    assert_eq!((d.start(), d.end(), d.offset()), (2.5, 3.5, -1.0));

    let tone = e.add_file(Path::new("tone.wav"), 0.0, 2.0).unwrap();
    assert!(matches!(
        e.set_offset(tone, -1.0),
        Err(MontageError::Validation(_))
    ));

    let removed = e.remove_clip(id).unwrap();
    assert_eq!(removed.id(), id);
    assert!(e.descriptor(id).is_none());
    assert!(e.remove_clip(id).is_err());
}

#[test]
fn processors_come_from_the_registry() {
    let mut e = engine();
    let id = e.add_file(Path::new("tone.wav"), 0.0, 2.0).unwrap();
    e.add_processor(id, &builtin_identifier(GainProcessor::NAME))
        .unwrap();
    assert_eq!(e.descriptor(id).unwrap().audio_processors().len(), 1);
    assert!(matches!(
        e.add_processor(id, "VST3: Nope"),
        Err(MontageError::Plugin(_))
    ));
    assert!(e.add_processor(DescriptorId(77), &builtin_identifier(GainProcessor::NAME)).is_err());
}

#[test]
fn render_hands_the_timeline_back() {
    let mut e = engine();
    e.add_file(Path::new("tone.wav"), 0.0, 2.0).unwrap();
    e.add_file(Path::new("blue.png"), 1.0, 2.0).unwrap();
    let writer = InMemoryWriter::new();
    let capture = writer.capture();
    let events = e.subscribe_render();

    let handle = e
        .start_render(PathBuf::from("out.mp4"), Some(Box::new(writer)))
        .unwrap();
    assert!(e.is_rendering());
    assert!(matches!(
        e.add_file(Path::new("tone.wav"), 0.0, 1.0),
        Err(MontageError::Configuration(_))
    ));
    assert!(e.save_state().is_err());

    assert_eq!(e.finish_render().unwrap(), RenderState::Completed);
    assert_eq!(handle.progress(), 1.0);
    assert!(!e.is_rendering());
    assert_eq!(e.timeline().unwrap().descriptors().len(), 2);
    assert!(events.try_iter().any(|ev| ev == RenderEvent::Finished(RenderState::Completed)));

    let out = capture.lock();
    assert_eq!(out.frames.len(), 6);
    assert_eq!(out.audio.len(), 30);
    assert!(out.audio[..20].iter().all(|s| (*s - 0.5).abs() < 1e-6));
    assert!(out.audio[20..].iter().all(|s| *s == 0.0));
    assert!(out.frames[1].is_black());
    assert_eq!(out.frames[2].pixel(0, 0), [0, 0, 255, 255]);
    drop(out);

    e.add_file(Path::new("tone.wav"), 3.0, 1.0).unwrap();
}

#[test]
fn failed_render_still_restores_the_timeline() {
    let mut e = engine();
    e.add_file(Path::new("blue.png"), 0.0, 2.0).unwrap();
    e.start_render(
        PathBuf::from("out.mp4"),
        Some(Box::new(InMemoryWriter::failing_after(1))),
    )
    .unwrap();
    assert!(matches!(e.finish_render(), Err(MontageError::WriterIo(_))));
    assert!(e.timeline().is_some());
}

fn wait_for_sound(e: &mut VideoEngine) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !e.next_audio_block(2).unwrap().is_silent() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn playback_runs_on_workers_and_reattaches() {
    let mut e = engine();
    e.add_file(Path::new("long.wav"), 0.0, 100.0).unwrap();
    assert!(e.playback_position().is_none());

    e.start_playback(0.0).unwrap();
    assert!(e.is_playing());
    assert!(!e.timeline().unwrap().decoders_attached());
    assert!(wait_for_sound(&mut e));
    assert!(e.playback_position().unwrap() > 0.0);

    e.seek(50.0).unwrap();
    assert!(e.is_playing());
    assert!(wait_for_sound(&mut e));

    e.stop_playback();
    assert!(!e.is_playing());
    assert!(e.timeline().unwrap().decoders_attached());
    let block = e.next_audio_block(4).unwrap();
    assert!(block.samples().iter().all(|s| (*s - 0.5).abs() < 1e-6));
}

#[test]
fn removing_during_playback_keeps_playing() {
    let mut e = engine();
    let a = e.add_file(Path::new("long.wav"), 0.0, 100.0).unwrap();
    e.add_file(Path::new("long.wav"), 0.0, 100.0).unwrap();
    e.start_playback(1.0).unwrap();
    e.remove_clip(a).unwrap();
    assert!(e.is_playing());
    assert!(e.playback_position().unwrap() >= 1.0);
    e.stop_playback();
    assert!(e.timeline().unwrap().decoders_attached());
}

#[test]
fn seek_without_playback_moves_the_read_position() {
    let mut e = engine();
    e.add_file(Path::new("tone.wav"), 1.0, 1.0).unwrap();
    e.seek(1.0).unwrap();
    assert!(!e.is_playing());
    let block = e.next_audio_block(10).unwrap();
    assert!(block.samples().iter().all(|s| (*s - 0.5).abs() < 1e-6));
    assert!(e.seek(f64::NAN).is_err());
    assert!(e.frame_at(5.0).unwrap().is_none());
    assert!(e.frame_at(1.5).unwrap().is_some());
}

#[test]
fn state_round_trips_through_another_engine() {
    let mut e = engine();
    let id = e.add_file(Path::new("tone.wav"), 0.0, 2.0).unwrap();
    e.descriptor_mut(id).unwrap().set_description("voice");
    e.add_file(Path::new("blue.png"), 1.0, 2.0).unwrap();
    let state = e.save_state().unwrap();

    let mut other = engine();
    other.load_state(&state).unwrap();
    let timeline = other.timeline().unwrap();
    assert_eq!(timeline.descriptors().len(), 2);
    assert_eq!(other.descriptor(id).unwrap().description(), "voice");
    assert_eq!(other.save_state().unwrap(), state);
}
