use super::*;

use std::sync::Arc;

use crate::clip::{AudioClip, ClipSettings, DescriptorId};
use crate::foundation::core::Canvas;
use crate::media::memory::PcmReader;
use crate::processor::PluginRegistry;
use crate::processor::registry::builtin_identifier;

fn settings() -> ClipSettings {
    ClipSettings {
        sample_rate: 10,
        channels: 1,
        canvas: Canvas::new(2, 2).unwrap(),
        audio_fifo_frames: 32,
        video_fifo_frames: 4,
        decode_block_frames: 8,
    }
}

fn descriptor(id: u64, samples: Vec<f32>, start: f64, end: f64) -> ClipDescriptor {
    let reader = PcmReader::new(10, 1, Arc::new(samples)).unwrap();
    let clip = AudioClip::from_reader("a.wav", Box::new(reader), &settings());
    ClipDescriptor::new(DescriptorId(id), clip.into(), start, end).unwrap()
}

fn mix(descriptors: &mut [ClipDescriptor], position: f64, frames: usize) -> Vec<f32> {
    let mut mixer = AudioMixer::new(10, 1);
    let mut out = AudioBlock::silent(1, frames);
    mixer.mix(descriptors, position, &mut out);
    out.into_interleaved()
}

#[test]
fn contributes_only_inside_active_range() {
    let mut ds = [descriptor(1, vec![0.5; 20], 0.3, 0.6)];
    let out = mix(&mut ds, 0.0, 10);
    assert_eq!(&out[..3], &[0.0; 3]);
    assert!(out[3..6].iter().all(|s| (*s - 0.5).abs() < 1e-6));
    assert_eq!(&out[6..], &[0.0; 4]);
}

#[test]
fn offset_reseeks_the_clip() {
    let ramp: Vec<f32> = (0..20).map(|i| i as f32 / 100.0).collect();
    let mut ds = [descriptor(1, ramp, 0.0, 2.0)];
    ds[0].set_offset(0.5).unwrap();
    let out = mix(&mut ds, 0.0, 3);
    for (a, e) in out.iter().zip([0.05, 0.06, 0.07]) {
        assert!((a - e).abs() < 1e-6, "{out:?}");
    }
}

#[test]
fn consecutive_blocks_read_without_gaps() {
    let ramp: Vec<f32> = (0..20).map(|i| i as f32 / 100.0).collect();
    let mut ds = [descriptor(1, ramp, 0.0, 2.0)];
    let mut mixer = AudioMixer::new(10, 1);
    let mut out = AudioBlock::silent(1, 4);
    mixer.mix(&mut ds, 0.0, &mut out);
    mixer.mix(&mut ds, 0.4, &mut out);
    assert!((out.samples()[0] - 0.04).abs() < 1e-6);
    assert!((ds[0].clip().next_read_position() - 0.8).abs() < 1e-9);
}

#[test]
fn volume_ramps_linearly_across_the_block() {
    let mut ds = [descriptor(1, vec![0.5; 20], 0.0, 2.0)];
    ds[0].volume().set_value(0.0, 0.0).unwrap();
    ds[0].volume().set_value(1.0, 1.0).unwrap();
    let out = mix(&mut ds, 0.0, 10);
    assert_eq!(out[0], 0.0);
    assert!((out[5] - 0.25).abs() < 1e-6);
    assert!((out[9] - 0.45).abs() < 1e-6);
}

#[test]
fn muted_descriptor_is_skipped() {
    let mut ds = [descriptor(1, vec![0.5; 20], 0.0, 2.0)];
    ds[0].set_audio_playing(false);
    assert!(mix(&mut ds, 0.0, 10).iter().all(|s| *s == 0.0));
}

#[test]
fn gain_processor_at_floor_mutes() {
    let mut ds = [descriptor(1, vec![0.5; 20], 0.0, 2.0)];
    let gain = PluginRegistry::with_builtins()
        .create(&builtin_identifier("Gain"))
        .unwrap();
    gain.set_real("gain_db", -60.0).unwrap();
    ds[0].add_processor(gain);
    assert!(mix(&mut ds, 0.0, 10).iter().all(|s| *s == 0.0));

    ds[0].audio_processors_mut()[0].set_bypassed(true);
    assert!(mix(&mut ds, 1.0, 5).iter().all(|s| (*s - 0.5).abs() < 1e-6));
}
