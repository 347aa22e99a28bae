use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::automation::{AutomationCurve, ParameterAutomation};
use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};
use crate::processor::parameter::ProcessorParameter;
use crate::processor::{AudioProcessor, Processor, ProcessorKind, VideoProcessor};

/// Delivered by [`ProcessorController::send_update_notification`] for each changed parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterChange {
    /// Parameter id.
    pub parameter: String,
    /// New normalized value.
    pub normalized: f64,
}

/// Saved automation of one parameter.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParameterState {
    pub id: String,
    pub automation: AutomationCurve,
}

/// Serializable snapshot of a hosted processor.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProcessorState {
    /// Registry identifier, e.g. `BUILTIN: Gain`.
    pub identifier: String,
    /// Display name at save time.
    pub name: String,
    #[serde(default)]
    pub bypassed: bool,
    /// Blob from the processor's `get_state`.
    pub blob: Vec<u8>,
    #[serde(default)]
    pub parameters: Vec<ParameterState>,
    /// Why the processor could not be loaded, `None` when it is running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_status: Option<String>,
}

/// Placeholder for a processor whose plugin is unavailable. Leaves everything untouched.
struct Unavailable {
    name: String,
}

impl Processor for Unavailable {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[Arc<ProcessorParameter>] {
        &[]
    }

    fn get_state(&self) -> MontageResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn set_state(&mut self, _blob: &[u8]) -> MontageResult<()> {
        Ok(())
    }
}

impl AudioProcessor for Unavailable {
    fn prepare(&mut self, _sample_rate: u32, _channels: u16, _max_block_frames: usize) {}

    fn process(&mut self, _block: &mut AudioBlock) {}
}

impl VideoProcessor for Unavailable {
    fn prepare(&mut self, _canvas: Canvas) {}

    fn process(&mut self, _frame: &mut VideoFrame) {}
}

struct Slot {
    parameter: Arc<ProcessorParameter>,
    automation: Arc<ParameterAutomation>,
}

/// Hosts one processor: its parameters, their automation, and change notification.
pub struct ProcessorController {
    identifier: String,
    processor: ProcessorKind,
    slots: Vec<Slot>,
    bypassed: bool,
    listeners: Mutex<Vec<Sender<ParameterChange>>>,
    audio_format: Option<(u32, u16, usize)>,
    video_canvas: Option<Canvas>,
    /// Saved state of an unavailable plugin, handed back verbatim by `state`.
    preserved: Option<ProcessorState>,
}

impl ProcessorController {
    /// Wrap a processor created for `identifier`.
    pub fn new(identifier: impl Into<String>, processor: ProcessorKind) -> Self {
        let slots = processor
            .as_processor()
            .parameters()
            .iter()
            .map(|p| Slot {
                parameter: Arc::clone(p),
                automation: Arc::new(ParameterAutomation::constant(p.default_normalized())),
            })
            .collect();
        Self {
            identifier: identifier.into(),
            processor,
            slots,
            bypassed: false,
            listeners: Mutex::new(Vec::new()),
            audio_format: None,
            video_canvas: None,
            preserved: None,
        }
    }

    /// Keep `state` for a plugin that could not be created.
    ///
    /// The controller is a bypassed pass-through in the audio (`audio == true`) or video
    /// chain, and [`ProcessorController::state`] returns `state` with `status` attached.
    pub fn unavailable(mut state: ProcessorState, audio: bool, status: impl Into<String>) -> Self {
        state.plugin_status = Some(status.into());
        let placeholder = Unavailable {
            name: state.name.clone(),
        };
        let processor = if audio {
            ProcessorKind::Audio(Box::new(placeholder))
        } else {
            ProcessorKind::Video(Box::new(placeholder))
        };
        let mut controller = Self::new(state.identifier.clone(), processor);
        controller.bypassed = true;
        controller.preserved = Some(state);
        controller
    }

    /// Load problem of this processor, `None` when it is running.
    pub fn plugin_status(&self) -> Option<&str> {
        self.preserved.as_ref()?.plugin_status.as_deref()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        self.processor.as_processor().name()
    }

    /// `true` for audio processors.
    pub fn is_audio(&self) -> bool {
        matches!(self.processor, ProcessorKind::Audio(_))
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// A bypassed processor leaves blocks untouched.
    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    /// Parameters in processor order.
    pub fn parameters(&self) -> impl Iterator<Item = &Arc<ProcessorParameter>> {
        self.slots.iter().map(|s| &s.parameter)
    }

    pub fn parameter(&self, id: &str) -> Option<&Arc<ProcessorParameter>> {
        self.slot(id).map(|s| &s.parameter)
    }

    /// Automation curve (normalized values) of parameter `id`.
    pub fn automation(&self, id: &str) -> Option<&Arc<ParameterAutomation>> {
        self.slot(id).map(|s| &s.automation)
    }

    fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.parameter.id() == id)
    }

    fn require(&self, id: &str) -> MontageResult<&Slot> {
        self.slot(id).ok_or_else(|| {
            MontageError::validation(format!(
                "processor '{}' has no parameter '{id}'",
                self.name()
            ))
        })
    }

    /// Set a normalized value directly.
    pub fn set_normalized(&self, id: &str, value: f64) -> MontageResult<bool> {
        Ok(self.require(id)?.parameter.set_normalized(value))
    }

    /// Set a value in the parameter's real range.
    pub fn set_real(&self, id: &str, value: f64) -> MontageResult<bool> {
        Ok(self.require(id)?.parameter.set_real_value(value))
    }

    pub fn begin_gesture(&self, id: &str) -> MontageResult<bool> {
        Ok(self.require(id)?.automation.start_gesture())
    }

    pub fn end_gesture(&self, id: &str) -> MontageResult<bool> {
        Ok(self.require(id)?.automation.end_gesture())
    }

    /// Apply automation at presentation time `t` to every automated parameter.
    pub fn update_automation(&self, t: f64) {
        for slot in &self.slots {
            if slot.automation.is_automated() {
                slot.parameter.set_normalized(slot.automation.value_at(t));
            }
        }
    }

    /// Listen for [`ParameterChange`]s.
    pub fn subscribe(&self) -> Receiver<ParameterChange> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.listeners.lock().push(tx);
        rx
    }

    /// Notify listeners about every parameter changed since the last call. Returns how many
    /// parameters were reported.
    pub fn send_update_notification(&self) -> usize {
        let mut listeners = self.listeners.lock();
        let mut sent = 0;
        for slot in &self.slots {
            if !slot.parameter.take_dirty() {
                continue;
            }
            let change = ParameterChange {
                parameter: slot.parameter.id().to_owned(),
                normalized: slot.parameter.normalized(),
            };
            listeners.retain(|tx| tx.send(change.clone()).is_ok());
            sent += 1;
        }
        sent
    }

    /// Prepare for a format. Repeated calls are no-ops unless the rate or channel count
    /// changes or the block grows.
    pub fn prepare_audio(&mut self, sample_rate: u32, channels: u16, max_block_frames: usize) {
        if let Some((rate, ch, max)) = self.audio_format
            && rate == sample_rate
            && ch == channels
            && max >= max_block_frames
        {
            return;
        }
        if let ProcessorKind::Audio(p) = &mut self.processor {
            p.prepare(sample_rate, channels, max_block_frames);
        }
        self.audio_format = Some((sample_rate, channels, max_block_frames));
    }

    /// Prepare for `canvas`; repeated calls with the same canvas are no-ops.
    pub fn prepare_video(&mut self, canvas: Canvas) {
        if self.video_canvas == Some(canvas) {
            return;
        }
        if let ProcessorKind::Video(p) = &mut self.processor {
            p.prepare(canvas);
        }
        self.video_canvas = Some(canvas);
    }

    /// Update automation at `t` and process `block`. Video processors ignore audio.
    pub fn process_audio(&mut self, t: f64, block: &mut AudioBlock) {
        self.update_automation(t);
        if self.bypassed {
            return;
        }
        if let ProcessorKind::Audio(p) = &mut self.processor {
            p.process(block);
        }
    }

    /// Update automation at `t` and process `frame`. Audio processors ignore frames.
    pub fn process_video(&mut self, t: f64, frame: &mut VideoFrame) {
        self.update_automation(t);
        if self.bypassed {
            return;
        }
        if let ProcessorKind::Video(p) = &mut self.processor {
            p.process(frame);
        }
    }

    /// Snapshot for persistence.
    pub fn state(&self) -> MontageResult<ProcessorState> {
        if let Some(saved) = &self.preserved {
            return Ok(saved.clone());
        }
        Ok(ProcessorState {
            identifier: self.identifier.clone(),
            name: self.name().to_owned(),
            bypassed: self.bypassed,
            blob: self.processor.as_processor().get_state()?,
            parameters: self
                .slots
                .iter()
                .map(|s| ParameterState {
                    id: s.parameter.id().to_owned(),
                    automation: s.automation.curve(),
                })
                .collect(),
            plugin_status: None,
        })
    }

    /// Apply a snapshot produced by [`ProcessorController::state`].
    pub fn restore(&mut self, state: &ProcessorState) -> MontageResult<()> {
        if state.identifier != self.identifier {
            return Err(MontageError::plugin(format!(
                "state for '{}' cannot be applied to '{}'",
                state.identifier, self.identifier
            )));
        }
        if let Some(saved) = self.preserved.as_mut() {
            let status = saved.plugin_status.take();
            *saved = state.clone();
            saved.plugin_status = status;
            return Ok(());
        }
        self.processor.as_processor_mut().set_state(&state.blob)?;
        self.bypassed = state.bypassed;
        for saved in &state.parameters {
            saved.automation.validate()?;
            match self.slot(&saved.id) {
                Some(slot) => slot.automation.replace_curve(saved.automation.clone()),
                None => tracing::warn!(
                    processor = %self.identifier,
                    parameter = %saved.id,
                    "dropping automation for unknown parameter"
                ),
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProcessorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorController")
            .field("identifier", &self.identifier)
            .field("processor", &self.processor)
            .field("bypassed", &self.bypassed)
            .field("plugin_status", &self.plugin_status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/processor/controller.rs"]
mod tests;
