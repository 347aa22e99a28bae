use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::automation::AutomationCurve;
use crate::clip::{
    AudioClip, Clip, ClipDescriptor, ClipKind, ClipSettings, ComposedClip, DescriptorId,
    ImageClip, MovieClip,
};
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::reader::MediaBackend;
use crate::processor::registry::PLUGIN_NOT_KNOWN;
use crate::processor::{PluginRegistry, ProcessorController, ProcessorState};

/// Format version written by [`TimelineState::capture`].
pub const TIMELINE_STATE_VERSION: u32 = 1;

/// Serializable snapshot of a timeline.
///
/// Clips are referenced by source path and reopened on restore. Callers should treat the
/// JSON as opaque; only [`TimelineState::capture`] and [`TimelineState::restore`] define it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineState {
    pub version: u32,
    pub composition: CompositionState,
}

/// One composition level.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompositionState {
    /// Explicit length, `None` when derived from the clips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default)]
    pub looping: bool,
    /// Descriptors in stacking order.
    #[serde(default)]
    pub clips: Vec<DescriptorState>,
}

/// Where a descriptor's clip comes from.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceState {
    Audio { path: PathBuf },
    Image { path: PathBuf },
    Movie { path: PathBuf },
    Composed(CompositionState),
}

impl SourceState {
    pub fn kind(&self) -> ClipKind {
        match self {
            Self::Audio { .. } => ClipKind::Audio,
            Self::Image { .. } => ClipKind::Image,
            Self::Movie { .. } => ClipKind::Movie,
            Self::Composed(_) => ClipKind::Composed,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_description() -> String {
    "unnamed".to_owned()
}

fn unit_curve() -> AutomationCurve {
    AutomationCurve::new(1.0)
}

/// One placed clip.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DescriptorState {
    pub id: u64,
    pub source: SourceState,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub looping: bool,
    #[serde(default = "default_true")]
    pub video_visible: bool,
    #[serde(default = "default_true")]
    pub audio_playing: bool,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "unit_curve")]
    pub volume: AutomationCurve,
    #[serde(default = "unit_curve")]
    pub opacity: AutomationCurve,
    #[serde(default)]
    pub audio_processors: Vec<ProcessorState>,
    #[serde(default)]
    pub video_processors: Vec<ProcessorState>,
}

impl TimelineState {
    /// Snapshot `timeline`, including automation and processor state.
    pub fn capture(timeline: &ComposedClip) -> MontageResult<Self> {
        Ok(Self {
            version: TIMELINE_STATE_VERSION,
            composition: capture_composition(timeline)?,
        })
    }

    /// Rebuild a timeline, reopening every source through `backend`.
    ///
    /// Sources that fail to open come back as failed clips. Processors whose identifier is not
    /// registered come back as bypassed placeholders that save their state unchanged. Invalid
    /// placements are errors.
    #[tracing::instrument(skip_all, fields(clips = self.composition.clips.len()))]
    pub fn restore(
        &self,
        backend: &dyn MediaBackend,
        registry: &PluginRegistry,
        settings: ClipSettings,
    ) -> MontageResult<ComposedClip> {
        if self.version != TIMELINE_STATE_VERSION {
            return Err(MontageError::serde(format!(
                "unsupported timeline state version {} (expected {TIMELINE_STATE_VERSION})",
                self.version
            )));
        }
        restore_composition(&self.composition, backend, registry, settings)
    }

    /// Prefix every relative source path with `base`, e.g. the directory of the JSON file.
    pub fn resolve_paths(&mut self, base: &Path) {
        resolve_composition(&mut self.composition, base);
    }

    pub fn to_json(&self) -> MontageResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MontageError::serde(e.to_string()))
    }

    pub fn from_json(json: &str) -> MontageResult<Self> {
        serde_json::from_str(json).map_err(|e| MontageError::serde(e.to_string()))
    }

    pub fn save_to_file(&self, path: &Path) -> MontageResult<()> {
        let file = File::create(path).map_err(|e| {
            MontageError::serde(format!("create '{}': {e}", path.display()))
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| MontageError::serde(e.to_string()))
    }

    pub fn load_from_file(path: &Path) -> MontageResult<Self> {
        let file = File::open(path)
            .map_err(|e| MontageError::serde(format!("open '{}': {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| MontageError::serde(format!("parse '{}': {e}", path.display())))
    }
}

fn resolve_composition(comp: &mut CompositionState, base: &Path) {
    for d in &mut comp.clips {
        match &mut d.source {
            SourceState::Audio { path } | SourceState::Image { path } | SourceState::Movie { path } => {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
            SourceState::Composed(inner) => resolve_composition(inner, base),
        }
    }
}

fn capture_composition(comp: &ComposedClip) -> MontageResult<CompositionState> {
    let clips = comp
        .descriptors()
        .iter()
        .map(capture_descriptor)
        .collect::<MontageResult<Vec<_>>>()?;
    Ok(CompositionState {
        length: comp.explicit_length(),
        looping: comp.is_looping(),
        clips,
    })
}

fn capture_source(clip: &Clip) -> MontageResult<SourceState> {
    if let Some(inner) = clip.as_composed() {
        return Ok(SourceState::Composed(capture_composition(inner)?));
    }
    let path = clip
        .source()
        .ok_or_else(|| MontageError::serde("leaf clip without a source path"))?
        .to_path_buf();
    Ok(match clip.kind() {
        ClipKind::Audio => SourceState::Audio { path },
        ClipKind::Image => SourceState::Image { path },
        ClipKind::Movie | ClipKind::Composed => SourceState::Movie { path },
    })
}

fn capture_descriptor(d: &ClipDescriptor) -> MontageResult<DescriptorState> {
    let processors = |list: &[crate::processor::ProcessorController]| {
        list.iter()
            .map(|p| p.state())
            .collect::<MontageResult<Vec<_>>>()
    };
    Ok(DescriptorState {
        id: d.id().0,
        source: capture_source(d.clip())?,
        start: d.start(),
        end: d.end(),
        offset: d.offset(),
        looping: d.clip().is_looping(),
        video_visible: d.is_video_visible(),
        audio_playing: d.is_audio_playing(),
        description: d.description().to_owned(),
        volume: d.volume().curve(),
        opacity: d.opacity().curve(),
        audio_processors: processors(d.audio_processors())?,
        video_processors: processors(d.video_processors())?,
    })
}

fn restore_composition(
    state: &CompositionState,
    backend: &dyn MediaBackend,
    registry: &PluginRegistry,
    settings: ClipSettings,
) -> MontageResult<ComposedClip> {
    let mut comp = ComposedClip::new(settings);
    for saved in &state.clips {
        let descriptor = restore_descriptor(saved, backend, registry, settings)?;
        comp.insert_descriptor(descriptor)?;
    }
    comp.set_length(state.length)?;
    comp.set_looping(state.looping);
    Ok(comp)
}

fn restore_descriptor(
    saved: &DescriptorState,
    backend: &dyn MediaBackend,
    registry: &PluginRegistry,
    settings: ClipSettings,
) -> MontageResult<ClipDescriptor> {
    let mut clip: Clip = match &saved.source {
        SourceState::Audio { path } => AudioClip::open(backend, path, &settings).into(),
        SourceState::Image { path } => ImageClip::open(backend, path, &settings).into(),
        SourceState::Movie { path } => MovieClip::open(backend, path, &settings).into(),
        SourceState::Composed(inner) => {
            restore_composition(inner, backend, registry, settings)?.into()
        }
    };
    clip.set_looping(saved.looping);

    let mut d = ClipDescriptor::new(DescriptorId(saved.id), clip, saved.start, saved.end)?;
    d.set_offset(saved.offset)?;
    d.set_video_visible(saved.video_visible);
    d.set_audio_playing(saved.audio_playing);
    d.set_description(saved.description.clone());
    saved.volume.validate()?;
    saved.opacity.validate()?;
    d.volume().replace_curve(saved.volume.clone());
    d.opacity().replace_curve(saved.opacity.clone());

    let chains = [(true, &saved.audio_processors), (false, &saved.video_processors)];
    for (audio, list) in chains {
        for ps in list {
            if !registry.contains(&ps.identifier) {
                tracing::warn!(
                    descriptor = saved.id,
                    processor = %ps.identifier,
                    "processor not registered; keeping its saved state"
                );
                d.add_processor(ProcessorController::unavailable(ps.clone(), audio, PLUGIN_NOT_KNOWN));
                continue;
            }
            let mut controller = registry.create(&ps.identifier)?;
            controller.restore(ps)?;
            d.add_processor(controller);
        }
    }
    Ok(d)
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/state.rs"]
mod tests;
