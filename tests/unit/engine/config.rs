use super::*;

#[test]
fn defaults_are_valid() {
    let cfg = EngineConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.audio.sample_rate, cfg.clip.sample_rate);
    assert_eq!(cfg.playback.idle_sleep(), Duration::from_millis(2));
}

#[test]
fn partial_json_fills_in_defaults() {
    let cfg = EngineConfig::from_json(
        r#"{ "video": { "canvas": { "width": 64, "height": 36 }, "fps": { "num": 30, "den": 1 } },
             "playback": { "idle_sleep_ms": 5 } }"#,
    )
    .unwrap();
    assert_eq!(cfg.video.canvas, Canvas::new(64, 36).unwrap());
    assert_eq!(cfg.playback.idle_sleep_ms, 5);
    assert_eq!(cfg.clip, ClipSettings::default());
    assert_eq!(cfg.writer.video_codec, "libx264");
}

#[test]
fn mismatched_rates_are_rejected() {
    let mut cfg = EngineConfig::default();
    cfg.audio.sample_rate = 44_100;
    assert!(matches!(cfg.validate(), Err(MontageError::Validation(_))));
}

#[test]
fn zero_sizes_are_rejected() {
    let mut cfg = EngineConfig::default();
    cfg.clip.video_fifo_frames = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = EngineConfig::default();
    cfg.clip.channels = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn bad_json_is_a_serde_error() {
    assert!(matches!(
        EngineConfig::from_json("[1, 2]"),
        Err(MontageError::Serde(_))
    ));
    assert!(matches!(
        EngineConfig::from_json_file(Path::new("/no/such/config.json")),
        Err(MontageError::Configuration(_))
    ));
}
