use super::*;

use crate::clip::{AudioClip, ClipSettings, ComposedClip, ImageClip};
use crate::foundation::core::{Canvas, Fps};
use crate::media::memory::PcmReader;
use crate::media::writer::InMemoryWriter;

fn clip_settings() -> ClipSettings {
    ClipSettings {
        sample_rate: 100,
        channels: 1,
        canvas: Canvas::new(2, 2).unwrap(),
        audio_fifo_frames: 64,
        video_fifo_frames: 4,
        decode_block_frames: 32,
    }
}

fn audio_settings() -> AudioSettings {
    AudioSettings {
        sample_rate: 100,
        channels: 2,
    }
}

fn video_settings() -> VideoSettings {
    VideoSettings {
        canvas: Canvas::new(2, 2).unwrap(),
        fps: Fps::new(10, 1).unwrap(),
    }
}

/// One second: a 0.5 tone on `[0, 1)` and a red still on `[0.5, 1)`.
fn timeline() -> Clip {
    let mut comp = ComposedClip::new(clip_settings());
    let tone = PcmReader::constant(100, 1, 0.5, 1.0).unwrap();
    comp.add_clip(
        AudioClip::from_reader("tone.wav", Box::new(tone), &clip_settings()).into(),
        0.0,
        1.0,
    )
    .unwrap();
    let red = VideoFrame::solid(Canvas::new(2, 2).unwrap(), [255, 0, 0, 255], 0.0);
    comp.add_clip(
        ImageClip::from_frame("red.png", red, &clip_settings()).into(),
        0.5,
        1.0,
    )
    .unwrap();
    comp.into()
}

fn configured(writer: InMemoryWriter) -> ClipRenderer {
    let mut r = ClipRenderer::new();
    r.set_clip_to_render(timeline());
    r.set_output_file("memory.mp4");
    r.set_audio_settings(audio_settings());
    r.set_video_settings(video_settings());
    r.set_writer(Box::new(writer));
    r
}

/// Blocks in `write_frame` until the test lets it go.
struct GateWriter {
    gate: crossbeam_channel::Receiver<()>,
    finished: Arc<AtomicBool>,
}

impl MediaWriter for GateWriter {
    fn start_writing(&mut self, _settings: &WriterSettings) -> MontageResult<()> {
        Ok(())
    }

    fn write_audio(&mut self, _block: &AudioBlock) -> MontageResult<()> {
        Ok(())
    }

    fn write_frame(&mut self, _frame: &VideoFrame) -> MontageResult<()> {
        let _ = self.gate.recv();
        Ok(())
    }

    fn finish(&mut self) -> MontageResult<()> {
        self.finished.store(true, Ordering::Release);
        Ok(())
    }
}

#[test]
fn missing_configuration_leaves_renderer_idle() {
    let mut r = ClipRenderer::new();
    assert!(matches!(
        r.start_rendering(),
        Err(MontageError::Configuration(_))
    ));

    r.set_clip_to_render(timeline());
    r.set_audio_settings(audio_settings());
    r.set_video_settings(video_settings());
    let err = r.start_rendering().unwrap_err();
    assert!(err.to_string().contains("output file"));
    assert_eq!(r.state(), RenderState::Idle);
    assert!(r.take_clip().is_some());
}

#[test]
fn renders_every_frame_and_the_matching_audio() {
    let writer = InMemoryWriter::new();
    let capture = writer.capture();
    let mut r = configured(writer);
    let events = r.subscribe();

    r.start_rendering().unwrap();
    assert_eq!(r.wait().unwrap(), RenderState::Completed);
    assert_eq!(r.state(), RenderState::Completed);
    assert_eq!(r.progress(), 1.0);

    let out = capture.lock();
    assert!(out.finished);
    assert_eq!(out.frames.len(), 10);
    assert_eq!(out.audio.len(), 100 * 2);
    assert!(out.audio.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    assert!(out.frames[4].is_black());
    assert_eq!(out.frames[5].pixel(0, 0), [255, 0, 0, 255]);
    assert!((out.frames[3].timestamp - 0.3).abs() < 1e-9);

    let received: Vec<RenderEvent> = events.try_iter().collect();
    let progress: Vec<f64> = received
        .iter()
        .filter_map(|e| match e {
            RenderEvent::Progress(p) => Some(*p),
            RenderEvent::Finished(_) => None,
        })
        .collect();
    assert_eq!(progress.len(), 10);
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(
        received.last(),
        Some(&RenderEvent::Finished(RenderState::Completed))
    );
    drop(out);
    assert!(r.take_clip().is_some());
}

#[test]
fn writer_failure_fails_the_render() {
    let writer = InMemoryWriter::failing_after(3);
    let capture = writer.capture();
    let mut r = configured(writer);
    r.start_rendering().unwrap();

    let err = r.wait().unwrap_err();
    assert!(matches!(err, MontageError::WriterIo(_)));
    assert!(matches!(r.state(), RenderState::Failed { .. }));
    let out = capture.lock();
    assert_eq!(out.frames.len(), 3);
    assert!(out.finished);
}

#[test]
fn cancel_stops_at_a_frame_boundary() {
    let (open, gate) = crossbeam_channel::unbounded();
    let finished = Arc::new(AtomicBool::new(false));
    let mut r = configured(InMemoryWriter::new());
    r.set_writer(Box::new(GateWriter {
        gate,
        finished: Arc::clone(&finished),
    }));
    let handle = r.handle();

    r.start_rendering().unwrap();
    handle.cancel();
    drop(open);

    assert_eq!(r.wait().unwrap(), RenderState::Cancelled);
    assert_eq!(handle.state(), RenderState::Cancelled);
    assert!(handle.progress() < 1.0);
    assert!(finished.load(Ordering::Acquire));
}

#[test]
fn sample_rate_mismatch_is_a_configuration_error() {
    let mut r = configured(InMemoryWriter::new());
    r.set_audio_settings(AudioSettings {
        sample_rate: 48_000,
        channels: 2,
    });
    assert!(matches!(
        r.start_rendering(),
        Err(MontageError::Configuration(_))
    ));
}

#[test]
fn stills_need_an_explicit_length() {
    let red = VideoFrame::solid(Canvas::new(2, 2).unwrap(), [255, 0, 0, 255], 0.0);
    let writer = InMemoryWriter::new();
    let capture = writer.capture();
    let mut r = configured(writer);
    r.set_clip_to_render(ImageClip::from_frame("red.png", red, &clip_settings()).into());
    assert!(matches!(
        r.start_rendering(),
        Err(MontageError::Configuration(_))
    ));

    r.set_length(Some(0.25));
    r.start_rendering().unwrap();
    assert_eq!(r.wait().unwrap(), RenderState::Completed);
    let out = capture.lock();
    assert_eq!(out.frames.len(), 3);
    assert!(out.audio.iter().all(|s| *s == 0.0));
}

#[test]
fn wait_without_a_render_reports_state() {
    let mut r = ClipRenderer::new();
    assert_eq!(r.wait().unwrap(), RenderState::Idle);
    assert!(!RenderState::Idle.is_terminal());
    assert!(RenderState::Cancelled.is_terminal());
}
