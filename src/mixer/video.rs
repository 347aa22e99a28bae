use crate::clip::ClipDescriptor;
use crate::foundation::buffer::VideoFrame;
use crate::foundation::core::Canvas;
use crate::mixer::composite::{over_in_place, scale_to};

/// CPU compositor: layers every visible descriptor over opaque black, in descriptor order.
#[derive(Debug)]
pub struct SoftwareVideoMixer {
    canvas: Canvas,
}

impl SoftwareVideoMixer {
    pub fn new(canvas: Canvas) -> Self {
        Self { canvas }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Composite timeline time `t`. Later descriptors are drawn on top.
    pub fn render(&mut self, descriptors: &mut [ClipDescriptor], t: f64) -> VideoFrame {
        let mut out = VideoFrame::black(self.canvas, t);
        for d in descriptors.iter_mut() {
            if !d.video_visible || !d.is_active_at(t) {
                continue;
            }
            let local = d.local_time(t);
            let opacity = d.opacity.value_at(local).clamp(0.0, 1.0) as f32;
            if opacity <= 0.0 {
                continue;
            }
            let Some(frame) = d.clip.read_frame_at(d.source_time(t)) else {
                continue;
            };
            let mut layer = scale_to(&frame, self.canvas);
            for p in d.video_processors.iter_mut() {
                p.prepare_video(self.canvas);
                p.process_video(local, &mut layer);
            }
            if let Err(e) = over_in_place(&mut out, &layer, opacity) {
                tracing::warn!(descriptor = d.id.0, error = %e, "layer skipped");
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mixer/video.rs"]
mod tests;
