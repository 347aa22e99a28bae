use super::*;

use crate::foundation::buffer::VideoFrame;
use crate::foundation::core::{Canvas, Fps};
use crate::media::memory::MemoryBackend;
use crate::processor::builtin::GainProcessor;
use crate::processor::registry::builtin_identifier;

fn settings() -> ClipSettings {
    ClipSettings {
        sample_rate: 10,
        channels: 1,
        canvas: Canvas::new(2, 2).unwrap(),
        audio_fifo_frames: 32,
        video_fifo_frames: 4,
        decode_block_frames: 4,
    }
}

fn backend() -> MemoryBackend {
    let size = Canvas::new(2, 2).unwrap();
    let mut b = MemoryBackend::new();
    b.insert_audio("music.wav", 10, 1, vec![0.25; 30]);
    b.insert_image("logo.png", VideoFrame::solid(size, [0, 0, 255, 255], 0.0));
    b.insert_movie(
        "shot.mkv",
        Fps::new(2, 1).unwrap(),
        vec![VideoFrame::solid(size, [9, 9, 9, 255], 0.0); 4],
        None,
    );
    b
}

fn build() -> ComposedClip {
    let b = backend();
    let registry = PluginRegistry::with_builtins();
    let mut timeline = ComposedClip::new(settings());

    let music = timeline
        .add_clip(
            AudioClip::open(&b, Path::new("music.wav"), &settings()).into(),
            0.0,
            3.0,
        )
        .unwrap();
    let d = timeline.descriptor_mut(music).unwrap();
    d.set_description("music bed");
    d.volume().set_value(0.0, 0.0).unwrap();
    d.volume().set_value(1.0, 1.0).unwrap();
    let gain = registry.create(&builtin_identifier(GainProcessor::NAME)).unwrap();
    gain.set_real("gain_db", -6.0).unwrap();
    d.add_processor(gain);

    let mut inner = ComposedClip::new(settings());
    inner
        .add_clip(
            MovieClip::open(&b, Path::new("shot.mkv"), &settings()).into(),
            0.0,
            2.0,
        )
        .unwrap();
    inner.set_length(Some(2.0)).unwrap();
    let nested = timeline.add_clip(inner.into(), 1.0, 3.0).unwrap();
    timeline.set_clip_offset(nested, -0.5).unwrap();

    let logo = timeline
        .add_clip(
            ImageClip::open(&b, Path::new("logo.png"), &settings()).into(),
            0.5,
            2.5,
        )
        .unwrap();
    let d = timeline.descriptor_mut(logo).unwrap();
    d.set_audio_playing(false);
    d.opacity().set_value(0.0, 0.5).unwrap();
    timeline
}

#[test]
fn capture_then_restore_keeps_the_timeline() {
    let original = build();
    let state = TimelineState::capture(&original).unwrap();
    assert_eq!(state.version, TIMELINE_STATE_VERSION);
    assert_eq!(state.composition.clips.len(), 3);

    let json = state.to_json().unwrap();
    let parsed = TimelineState::from_json(&json).unwrap();
    assert_eq!(parsed, state);

    let restored = parsed
        .restore(&backend(), &PluginRegistry::with_builtins(), settings())
        .unwrap();
    assert_ne!(restored.id(), original.id());
    assert_eq!(restored.descriptors().len(), 3);
    assert_eq!(restored.length(), 3.0);

    let music = &restored.descriptors()[0];
    assert_eq!(music.clip().kind(), ClipKind::Audio);
    assert_eq!(music.description(), "music bed");
    assert!((music.volume().value_at(0.5) - 0.5).abs() < 1e-9);
    assert_eq!(music.audio_processors().len(), 1);
    let gain = &music.audio_processors()[0];
    assert!((gain.parameter("gain_db").unwrap().real_value() + 6.0).abs() < 1e-6);

    let nested = &restored.descriptors()[1];
    assert_eq!(nested.offset(), -0.5);
    let inner = nested.clip().as_composed().unwrap();
    assert_eq!(inner.explicit_length(), Some(2.0));
    assert_eq!(inner.descriptors()[0].clip().kind(), ClipKind::Movie);

    let logo = &restored.descriptors()[2];
    assert!(!logo.is_audio_playing());
    assert!(logo.is_video_visible());
    assert_eq!(logo.opacity().value_at(0.0), 0.5);

    assert_eq!(TimelineState::capture(&restored).unwrap(), state);
}

#[test]
fn missing_sources_come_back_failed() {
    let state = TimelineState::capture(&build()).unwrap();
    let restored = state
        .restore(&MemoryBackend::new(), &PluginRegistry::with_builtins(), settings())
        .unwrap();
    assert!(restored.descriptors()[0].clip().is_failed());
    assert!(restored.descriptors()[2].clip().is_failed());
}

#[test]
fn unregistered_processor_survives_a_round_trip() {
    let state = TimelineState::capture(&build()).unwrap();
    let restored = state
        .restore(&backend(), &PluginRegistry::empty(), settings())
        .unwrap();
    assert_eq!(restored.descriptors().len(), 3);

    let placeholder = &restored.descriptors()[0].audio_processors()[0];
    assert_eq!(placeholder.plugin_status(), Some(PLUGIN_NOT_KNOWN));
    assert!(placeholder.is_bypassed());
    assert_eq!(placeholder.identifier(), builtin_identifier(GainProcessor::NAME));

    let resaved = TimelineState::capture(&restored).unwrap();
    let mut expected = state.clone();
    expected.composition.clips[0].audio_processors[0].plugin_status =
        Some(PLUGIN_NOT_KNOWN.to_owned());
    assert_eq!(resaved, expected);

    // Once the plugin is registered again it loads normally.
    let reloaded = resaved
        .restore(&backend(), &PluginRegistry::with_builtins(), settings())
        .unwrap();
    let gain = &reloaded.descriptors()[0].audio_processors()[0];
    assert_eq!(gain.plugin_status(), None);
    assert!((gain.parameter("gain_db").unwrap().real_value() + 6.0).abs() < 1e-6);
    assert_eq!(TimelineState::capture(&reloaded).unwrap(), state);
}

#[test]
fn newer_versions_are_rejected() {
    let mut state = TimelineState::capture(&build()).unwrap();
    state.version = 99;
    let err = state
        .restore(&backend(), &PluginRegistry::with_builtins(), settings())
        .unwrap_err();
    assert!(matches!(err, MontageError::Serde(_)));
}

#[test]
fn sparse_json_uses_defaults() {
    let json = r#"{
        "version": 1,
        "composition": {
            "clips": [
                { "id": 4, "source": { "kind": "image", "path": "logo.png" }, "start": 1.0, "end": 2.0 }
            ]
        }
    }"#;
    let state = TimelineState::from_json(json).unwrap();
    let d = &state.composition.clips[0];
    assert_eq!(d.description, "unnamed");
    assert!(d.video_visible && d.audio_playing);
    assert_eq!(d.source.kind(), ClipKind::Image);

    let restored = state
        .restore(&backend(), &PluginRegistry::with_builtins(), settings())
        .unwrap();
    assert_eq!(restored.descriptors()[0].id(), DescriptorId(4));
    assert_eq!(restored.descriptors()[0].volume().value_at(0.0), 1.0);
}

#[test]
fn invalid_placement_is_a_validation_error() {
    let json = r#"{
        "version": 1,
        "composition": { "clips": [
            { "id": 1, "source": { "kind": "audio", "path": "music.wav" }, "start": 2.0, "end": 1.0 }
        ] }
    }"#;
    let err = TimelineState::from_json(json)
        .unwrap()
        .restore(&backend(), &PluginRegistry::with_builtins(), settings())
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation(_)));
    assert!(matches!(
        TimelineState::from_json("{ not json"),
        Err(MontageError::Serde(_))
    ));
}

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timeline.json");
    let state = TimelineState::capture(&build()).unwrap();
    state.save_to_file(&path).unwrap();
    assert_eq!(TimelineState::load_from_file(&path).unwrap(), state);
    assert!(TimelineState::load_from_file(&dir.path().join("missing.json")).is_err());
}

#[test]
fn relative_paths_resolve_against_a_base() {
    let mut state = TimelineState::capture(&build()).unwrap();
    state.resolve_paths(Path::new("/media"));
    let SourceState::Audio { path } = &state.composition.clips[0].source else {
        panic!("expected an audio source");
    };
    assert_eq!(path, Path::new("/media/music.wav"));
    let SourceState::Composed(inner) = &state.composition.clips[1].source else {
        panic!("expected a nested composition");
    };
    assert_eq!(
        inner.clips[0].source,
        SourceState::Movie {
            path: PathBuf::from("/media/shot.mkv")
        }
    );

    state.resolve_paths(Path::new("/elsewhere"));
    let SourceState::Image { path } = &state.composition.clips[2].source else {
        panic!("expected an image source");
    };
    assert_eq!(path, Path::new("/media/logo.png"));
}
