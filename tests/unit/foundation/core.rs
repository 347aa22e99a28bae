use super::*;

#[test]
fn time_range_contains_boundaries() {
    let r = TimeRange::new(2.0, 5.0).unwrap();
    assert!(!r.contains(1.999));
    assert!(r.contains(2.0));
    assert!(r.contains(4.999));
    assert!(!r.contains(5.0));
}

#[test]
fn time_range_rejects_inverted_bounds() {
    assert!(TimeRange::new(3.0, 1.0).is_err());
    assert!(TimeRange::new(f64::NAN, 1.0).is_err());
}

#[test]
fn time_range_intersection() {
    let a = TimeRange::new(0.0, 5.0).unwrap();
    let b = TimeRange::new(2.0, 8.0).unwrap();
    assert_eq!(a.intersect(b), Some(TimeRange { start: 2.0, end: 5.0 }));
    let c = TimeRange::new(5.0, 6.0).unwrap();
    assert_eq!(a.intersect(c), None);
}

#[test]
fn frame_to_sample_uses_rational_fps() {
    let fps = Fps::new(30000, 1001).unwrap();
    let samples = fps.frame_to_sample(FrameIndex(300), 48_000);
    assert!(samples > 470_000 && samples < 490_000);
    assert_eq!(fps.frame_to_sample(FrameIndex(0), 48_000), 0);
}

#[test]
fn frames_covering_absorbs_float_noise() {
    let fps = Fps::new(25, 1).unwrap();
    assert_eq!(fps.frames_covering(8.0), 200);
    assert_eq!(fps.frames_covering(0.01), 1);
    assert_eq!(fps.frames_covering(-1.0), 0);
}

#[test]
fn canvas_rejects_zero_size() {
    assert!(Canvas::new(0, 10).is_err());
    assert_eq!(Canvas::new(4, 2).unwrap().rgba_len(), 32);
}

#[test]
fn seconds_samples_conversion() {
    assert_eq!(secs_to_samples(1.5, 48_000), 72_000);
    assert!((samples_to_secs(24_000, 48_000) - 0.5).abs() < 1e-12);
}
