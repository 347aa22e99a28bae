use super::*;

#[test]
fn pcm_reader_serves_samples_then_end_of_media() {
    let mut r = PcmReader::new(4, 1, Arc::new(vec![0.1, 0.2, 0.3, 0.4, 0.5])).unwrap();
    let mut out = Vec::new();
    assert_eq!(r.read_samples(3, &mut out).unwrap(), ReadOutcome::Frames(3));
    assert_eq!(r.read_samples(3, &mut out).unwrap(), ReadOutcome::Frames(2));
    assert_eq!(r.read_samples(3, &mut out).unwrap(), ReadOutcome::EndOfMedia);
    assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
}

#[test]
fn pcm_reader_resamples_to_output_rate() {
    let mut r = PcmReader::new(2, 1, Arc::new(vec![0.0, 1.0])).unwrap();
    r.set_output_sample_rate(4);
    let mut out = Vec::new();
    assert_eq!(r.read_samples(10, &mut out).unwrap(), ReadOutcome::Frames(4));
    assert_eq!(out.len(), 4);
    assert!((out[1] - 0.5).abs() < 1e-6);
    assert_eq!(out[3], 1.0);
}

#[test]
fn pcm_reader_seek() {
    let mut r = PcmReader::constant(10, 2, 0.25, 1.0).unwrap();
    r.set_position(8).unwrap();
    let mut out = Vec::new();
    assert_eq!(r.read_samples(10, &mut out).unwrap(), ReadOutcome::Frames(2));
    assert_eq!(out.len(), 4);
}

#[test]
fn frame_sequence_positions_by_time() {
    let fps = Fps::new(10, 1).unwrap();
    let size = Canvas::new(1, 1).unwrap();
    let mut r = FrameSequenceReader::solid(size, fps, 5, [1, 2, 3, 255]).unwrap();
    r.set_position(0.3).unwrap();
    let f = r.read_frame().unwrap().unwrap();
    assert!((f.timestamp - 0.3).abs() < 1e-9);
    r.set_position(10.0).unwrap();
    assert!(r.read_frame().unwrap().is_none());
}

#[test]
fn backend_reports_missing_media_as_open_error() {
    let backend = MemoryBackend::new();
    let err = backend.open_audio(Path::new("nope.wav")).err().unwrap();
    assert!(matches!(err, MontageError::MediaOpen { .. }));
}

#[test]
fn backend_probe_movie_with_audio() {
    let mut backend = MemoryBackend::new();
    let fps = Fps::new(25, 1).unwrap();
    let size = Canvas::new(2, 2).unwrap();
    backend.insert_movie(
        "m.mov",
        fps,
        vec![VideoFrame::black(size, 0.0); 25],
        Some((48_000, 2, vec![0.0; 96_000])),
    );
    let info = backend.probe(Path::new("m.mov")).unwrap();
    assert!(info.has_audio());
    assert!(info.has_video());
    assert!((info.duration.unwrap() - 1.0).abs() < 1e-9);
}
