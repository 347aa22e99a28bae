use std::sync::Arc;

use crate::automation::ParameterAutomation;
use crate::clip::Clip;
use crate::foundation::error::{MontageError, MontageResult};
use crate::processor::ProcessorController;

/// Identifies a descriptor inside its owning composition.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct DescriptorId(pub u64);

/// Placement of one clip on a timeline.
///
/// The clip is active on `[start, end)`. At timeline time `t` it is read at source time
/// `t - start + offset`. Volume and opacity automation, and processor automation, are evaluated
/// in clip-local time `t - start`.
#[derive(Debug)]
pub struct ClipDescriptor {
    pub(crate) id: DescriptorId,
    pub(crate) clip: Clip,
    pub(crate) start: f64,
    pub(crate) end: f64,
    pub(crate) offset: f64,
    pub(crate) video_visible: bool,
    pub(crate) audio_playing: bool,
    pub(crate) description: String,
    pub(crate) volume: Arc<ParameterAutomation>,
    pub(crate) opacity: Arc<ParameterAutomation>,
    pub(crate) audio_processors: Vec<ProcessorController>,
    pub(crate) video_processors: Vec<ProcessorController>,
}

fn check_range(start: f64, end: f64) -> MontageResult<()> {
    if !start.is_finite() || !end.is_finite() {
        return Err(MontageError::validation("clip start and end must be finite"));
    }
    if start > end {
        return Err(MontageError::validation(format!(
            "clip start {start} is after its end {end}"
        )));
    }
    Ok(())
}

impl ClipDescriptor {
    /// Place `clip` on `[start, end)` with offset 0, visible and audible.
    pub fn new(id: DescriptorId, clip: Clip, start: f64, end: f64) -> MontageResult<Self> {
        check_range(start, end)?;
        Ok(Self {
            id,
            clip,
            start,
            end,
            offset: 0.0,
            video_visible: true,
            audio_playing: true,
            description: "unnamed".to_owned(),
            volume: Arc::new(ParameterAutomation::constant(1.0)),
            opacity: Arc::new(ParameterAutomation::constant(1.0)),
            audio_processors: Vec::new(),
            video_processors: Vec::new(),
        })
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn clip(&self) -> &Clip {
        &self.clip
    }

    pub fn clip_mut(&mut self) -> &mut Clip {
        &mut self.clip
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Shift the clip so it starts at `start`, keeping its length and offset.
    pub fn move_to(&mut self, start: f64) -> MontageResult<()> {
        let end = start + self.length();
        check_range(start, end)?;
        self.start = start;
        self.end = end;
        Ok(())
    }

    /// Change the active range without touching the offset.
    pub fn trim(&mut self, start: f64, end: f64) -> MontageResult<()> {
        check_range(start, end)?;
        self.start = start;
        self.end = end;
        Ok(())
    }

    /// Source time read at `start`. Negative values are pre-roll and need a clip that supports it.
    pub fn set_offset(&mut self, offset: f64) -> MontageResult<()> {
        if !offset.is_finite() {
            return Err(MontageError::validation("clip offset must be finite"));
        }
        if offset < 0.0 && !self.clip.supports_preroll() {
            return Err(MontageError::validation(format!(
                "{:?} clips cannot start before their source (offset {offset})",
                self.clip.kind()
            )));
        }
        self.offset = offset;
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn is_video_visible(&self) -> bool {
        self.video_visible
    }

    pub fn set_video_visible(&mut self, visible: bool) {
        self.video_visible = visible;
    }

    pub fn is_audio_playing(&self) -> bool {
        self.audio_playing
    }

    pub fn set_audio_playing(&mut self, playing: bool) {
        self.audio_playing = playing;
    }

    /// Gain automation, linear, in clip-local time.
    pub fn volume(&self) -> &Arc<ParameterAutomation> {
        &self.volume
    }

    /// Opacity automation in `[0, 1]`, in clip-local time.
    pub fn opacity(&self) -> &Arc<ParameterAutomation> {
        &self.opacity
    }

    /// `true` when timeline time `t` lies in `[start, end)`.
    pub fn is_active_at(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    /// Source time read at timeline time `t`.
    pub fn source_time(&self, t: f64) -> f64 {
        t - self.start + self.offset
    }

    /// Clip-local time at timeline time `t`.
    pub fn local_time(&self, t: f64) -> f64 {
        t - self.start
    }

    /// Append a processor to the audio or video chain depending on its kind.
    pub fn add_processor(&mut self, controller: ProcessorController) {
        if controller.is_audio() {
            self.audio_processors.push(controller);
        } else {
            self.video_processors.push(controller);
        }
    }

    /// Remove the processor at `index` of the audio (`audio == true`) or video chain.
    pub fn remove_processor(&mut self, audio: bool, index: usize) -> Option<ProcessorController> {
        let chain = if audio {
            &mut self.audio_processors
        } else {
            &mut self.video_processors
        };
        (index < chain.len()).then(|| chain.remove(index))
    }

    pub fn audio_processors(&self) -> &[ProcessorController] {
        &self.audio_processors
    }

    pub fn audio_processors_mut(&mut self) -> &mut [ProcessorController] {
        &mut self.audio_processors
    }

    pub fn video_processors(&self) -> &[ProcessorController] {
        &self.video_processors
    }

    pub fn video_processors_mut(&mut self) -> &mut [ProcessorController] {
        &mut self.video_processors
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clip/descriptor.rs"]
mod tests;
