use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::buffer::{AudioBlock, VideoFrame};
use crate::foundation::core::Canvas;
use crate::foundation::math::db_to_gain;
use crate::processor::parameter::{ParameterRange, ProcessorParameter};
use crate::processor::{AudioProcessor, Processor, VideoProcessor};

fn param(id: &str, name: &str, min: f64, max: f64, default: f64) -> Arc<ProcessorParameter> {
    let range = ParameterRange { min, max, skew: 1.0 };
    Arc::new(ProcessorParameter::new(id, name, range, default))
}

/// Audio gain in decibels.
#[derive(Debug)]
pub struct GainProcessor {
    params: [Arc<ProcessorParameter>; 1],
}

impl GainProcessor {
    /// Registry name.
    pub const NAME: &'static str = "Gain";

    pub fn new() -> Self {
        Self {
            params: [param("gain_db", "Gain (dB)", -60.0, 12.0, 0.0)],
        }
    }
}

impl Default for GainProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for GainProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parameters(&self) -> &[Arc<ProcessorParameter>] {
        &self.params
    }
}

impl AudioProcessor for GainProcessor {
    fn prepare(&mut self, _sample_rate: u32, _channels: u16, _max_block_frames: usize) {}

    fn process(&mut self, block: &mut AudioBlock) {
        let db = self.params[0].real_value();
        // The bottom of the range mutes.
        let gain: f32 = if db <= -60.0 {
            0.0
        } else {
            db_to_gain(db) as f32
        };
        if gain == 1.0 {
            return;
        }
        for s in block.samples_mut() {
            *s *= gain;
        }
    }
}

/// Brightness/contrast/alpha adjustment on premultiplied frames.
#[derive(Debug)]
pub struct ColourCurveProcessor {
    params: [Arc<ProcessorParameter>; 3],
}

impl ColourCurveProcessor {
    /// Registry name.
    pub const NAME: &'static str = "Colour Curve";

    pub fn new() -> Self {
        Self {
            params: [
                param("brightness", "Brightness", -1.0, 1.0, 0.0),
                param("contrast", "Contrast", 0.0, 2.0, 1.0),
                param("alpha", "Alpha", 0.0, 1.0, 1.0),
            ],
        }
    }
}

impl Default for ColourCurveProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for ColourCurveProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parameters(&self) -> &[Arc<ProcessorParameter>] {
        &self.params
    }
}

impl VideoProcessor for ColourCurveProcessor {
    fn prepare(&mut self, _canvas: Canvas) {}

    fn process(&mut self, frame: &mut VideoFrame) {
        let brightness = self.params[0].real_value() as f32;
        let contrast = self.params[1].real_value() as f32;
        let alpha = self.params[2].real_value() as f32;
        if brightness == 0.0 && contrast == 1.0 && alpha == 1.0 {
            return;
        }
        let row_len = frame.width as usize * 4;
        if row_len == 0 {
            return;
        }

        frame.data.par_chunks_mut(row_len).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                let a = f32::from(px[3]);
                // Work in premultiplied space so colour never exceeds alpha.
                let mid = 0.5 * a;
                for c in &mut px[..3] {
                    let v = (f32::from(*c) - mid) * contrast + mid + brightness * a;
                    *c = (v.clamp(0.0, a) * alpha).round() as u8;
                }
                px[3] = (a * alpha).round() as u8;
            }
        });
    }
}
