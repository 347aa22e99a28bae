use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::clip::decoder::Decoder;
use crate::clip::descriptor::{ClipDescriptor, DescriptorId};
use crate::clip::{Clip, ClipInfo, ClipSettings};
use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::core::secs_to_samples;
use crate::foundation::error::{MontageError, MontageResult};
use crate::mixer::{AudioMixer, SoftwareVideoMixer};

/// Identity of a composition, used for cycle detection.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct CompositionId(pub u64);

impl CompositionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A timeline that is itself a clip.
///
/// Holds an ordered list of descriptors (later ones draw on top) and mixes them with its own
/// [`AudioMixer`] and [`SoftwareVideoMixer`]. Its length is either set explicitly or is the
/// latest descriptor end. Outside `[0, length)` it produces silence and no frame.
#[derive(Debug)]
pub struct ComposedClip {
    id: CompositionId,
    settings: ClipSettings,
    descriptors: Vec<ClipDescriptor>,
    audio_mixer: AudioMixer,
    video_mixer: SoftwareVideoMixer,
    scratch: AudioBlock,
    length: Option<f64>,
    position: f64,
    looping: bool,
    next_descriptor: u64,
}

impl ComposedClip {
    pub fn new(settings: ClipSettings) -> Self {
        Self::with_id(CompositionId::next(), settings)
    }

    /// Empty composition with a known identity, as when restoring saved state.
    pub fn with_id(id: CompositionId, settings: ClipSettings) -> Self {
        Self {
            id,
            settings,
            descriptors: Vec::new(),
            audio_mixer: AudioMixer::new(settings.sample_rate, settings.channels),
            video_mixer: SoftwareVideoMixer::new(settings.canvas),
            scratch: AudioBlock::silent(settings.channels, 0),
            length: None,
            position: 0.0,
            looping: false,
            next_descriptor: 1,
        }
    }

    pub fn id(&self) -> CompositionId {
        self.id
    }

    pub fn settings(&self) -> &ClipSettings {
        &self.settings
    }

    /// Explicit length if set, otherwise the latest descriptor end (0 when empty).
    pub fn length(&self) -> f64 {
        self.length.unwrap_or_else(|| {
            self.descriptors
                .iter()
                .map(ClipDescriptor::end)
                .fold(0.0, f64::max)
        })
    }

    pub fn explicit_length(&self) -> Option<f64> {
        self.length
    }

    /// Fix the length; `None` derives it from the descriptors again.
    pub fn set_length(&mut self, length: Option<f64>) -> MontageResult<()> {
        if let Some(l) = length
            && !(l.is_finite() && l >= 0.0)
        {
            return Err(MontageError::validation(format!(
                "composition length must be finite and non-negative, got {l}"
            )));
        }
        self.length = length;
        Ok(())
    }

    pub fn descriptors(&self) -> &[ClipDescriptor] {
        &self.descriptors
    }

    pub fn descriptors_mut(&mut self) -> &mut [ClipDescriptor] {
        &mut self.descriptors
    }

    pub fn descriptor(&self, id: DescriptorId) -> Option<&ClipDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn descriptor_mut(&mut self, id: DescriptorId) -> Option<&mut ClipDescriptor> {
        self.descriptors.iter_mut().find(|d| d.id == id)
    }

    fn descriptor_or_err(&mut self, id: DescriptorId) -> MontageResult<&mut ClipDescriptor> {
        self.descriptor_mut(id)
            .ok_or_else(|| MontageError::validation(format!("no clip with descriptor id {}", id.0)))
    }

    fn check_cycle(&self, clip: &Clip) -> MontageResult<()> {
        if clip.contains_composition(self.id) {
            return Err(MontageError::cycle(format!(
                "composition {} would contain itself",
                self.id.0
            )));
        }
        Ok(())
    }

    /// Mixing reads every clip in the composition's own sample layout.
    fn check_format(&self, clip: &Clip) -> MontageResult<()> {
        let info = clip.info();
        if info.channels != self.settings.channels || info.sample_rate != self.settings.sample_rate {
            return Err(MontageError::validation(format!(
                "clip renders {} ch at {} Hz but composition {} mixes {} ch at {} Hz",
                info.channels,
                info.sample_rate,
                self.id.0,
                self.settings.channels,
                self.settings.sample_rate
            )));
        }
        Ok(())
    }

    /// Place `clip` on `[start, end)` on top of the existing clips.
    ///
    /// The clip must have been built with this composition's channel count and sample rate.
    pub fn add_clip(&mut self, clip: Clip, start: f64, end: f64) -> MontageResult<DescriptorId> {
        self.check_cycle(&clip)?;
        self.check_format(&clip)?;
        let id = DescriptorId(self.next_descriptor);
        let descriptor = ClipDescriptor::new(id, clip, start, end)?;
        self.next_descriptor += 1;
        tracing::debug!(composition = self.id.0, descriptor = id.0, start, end, "clip added");
        self.descriptors.push(descriptor);
        Ok(id)
    }

    /// Insert a fully built descriptor, keeping its id.
    pub fn insert_descriptor(&mut self, descriptor: ClipDescriptor) -> MontageResult<DescriptorId> {
        self.check_cycle(&descriptor.clip)?;
        self.check_format(&descriptor.clip)?;
        if self.descriptor(descriptor.id).is_some() {
            return Err(MontageError::validation(format!(
                "descriptor id {} is already in use",
                descriptor.id.0
            )));
        }
        let id = descriptor.id;
        self.next_descriptor = self.next_descriptor.max(id.0 + 1);
        self.descriptors.push(descriptor);
        Ok(id)
    }

    pub fn remove_clip(&mut self, id: DescriptorId) -> MontageResult<ClipDescriptor> {
        let index = self
            .descriptors
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| MontageError::validation(format!("no clip with descriptor id {}", id.0)))?;
        Ok(self.descriptors.remove(index))
    }

    pub fn move_clip(&mut self, id: DescriptorId, start: f64) -> MontageResult<()> {
        self.descriptor_or_err(id)?.move_to(start)
    }

    pub fn trim_clip(&mut self, id: DescriptorId, start: f64, end: f64) -> MontageResult<()> {
        self.descriptor_or_err(id)?.trim(start, end)
    }

    pub fn set_clip_offset(&mut self, id: DescriptorId, offset: f64) -> MontageResult<()> {
        self.descriptor_or_err(id)?.set_offset(offset)
    }

    /// Move descriptor `id` to stacking position `index` (0 is drawn first).
    pub fn reorder_clip(&mut self, id: DescriptorId, index: usize) -> MontageResult<()> {
        let descriptor = self.remove_clip(id)?;
        let index = index.min(self.descriptors.len());
        self.descriptors.insert(index, descriptor);
        Ok(())
    }

    /// `true` when this composition is `id` or nests it at any depth.
    pub fn contains_composition(&self, id: CompositionId) -> bool {
        self.id == id
            || self
                .descriptors
                .iter()
                .any(|d| d.clip.contains_composition(id))
    }

    pub fn info(&self) -> ClipInfo {
        ClipInfo {
            duration: Some(self.length()),
            has_audio: self.descriptors.iter().any(|d| d.clip.info().has_audio),
            has_video: self.descriptors.iter().any(|d| d.clip.info().has_video),
            channels: self.settings.channels,
            source_channels: self.settings.channels,
            sample_rate: self.settings.sample_rate,
            size: Some(self.settings.canvas),
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn next_read_position(&self) -> f64 {
        self.position
    }

    pub fn set_next_read_position(&mut self, secs: f64) {
        self.position = secs;
    }

    fn local(&self, t: f64, length: f64) -> f64 {
        if self.looping && length > 0.0 {
            t.rem_euclid(length)
        } else {
            t
        }
    }

    /// Mix the next block. Samples outside `[0, length)` are silence; a looping composition
    /// wraps mid-block.
    pub fn read_next_audio_block(&mut self, block: &mut AudioBlock) {
        let frames = block.frames();
        let ch = usize::from(block.channels());
        let rate = self.settings.sample_rate;
        let length = self.length();
        block.clear();

        let mut done = 0;
        while done < frames {
            let t = self.position + done as f64 / f64::from(rate);
            let local = self.local(t, length);
            let remaining = frames - done;
            let (inside, until_change) = if local < 0.0 {
                (false, secs_to_samples(-local, rate))
            } else if local < length {
                (true, secs_to_samples(length - local, rate))
            } else {
                (false, remaining as i64)
            };
            let seg = until_change.clamp(1, remaining as i64) as usize;
            if inside {
                self.scratch.reset(block.channels(), seg);
                self.audio_mixer
                    .mix(&mut self.descriptors, local, &mut self.scratch);
                block.samples_mut()[done * ch..(done + seg) * ch]
                    .copy_from_slice(self.scratch.samples());
            }
            done += seg;
        }
        self.position += frames as f64 / f64::from(rate);
    }

    /// Composite the frame at `secs`, `None` outside `[0, length)`.
    pub fn read_frame_at(&mut self, secs: f64) -> Option<Arc<VideoFrame>> {
        let length = self.length();
        let local = self.local(secs, length);
        if !(0.0..length).contains(&local) {
            return None;
        }
        Some(Arc::new(self.video_mixer.render(&mut self.descriptors, local)))
    }

    pub(crate) fn collect_decoders(&mut self, out: &mut Vec<Decoder>) {
        for d in &mut self.descriptors {
            d.clip.collect_decoders(out);
        }
    }

    pub(crate) fn attach_decoder(&mut self, mut decoder: Decoder) -> Option<Decoder> {
        for d in &mut self.descriptors {
            decoder = d.clip.attach_decoder(decoder)?;
        }
        Some(decoder)
    }

    pub(crate) fn decoders_attached(&self) -> bool {
        self.descriptors.iter().all(|d| d.clip.decoders_attached())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/composed.rs"]
mod tests;
