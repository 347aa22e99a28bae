use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};

/// A block of interleaved `f32` PCM.
///
/// `data.len()` is always `frames * channels`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    channels: u16,
    data: Vec<f32>,
}

impl AudioBlock {
    /// Allocate a silent block.
    pub fn silent(channels: u16, frames: usize) -> Self {
        Self {
            channels: channels.max(1),
            data: vec![0.0; frames * usize::from(channels.max(1))],
        }
    }

    /// Wrap existing interleaved samples.
    pub fn from_interleaved(channels: u16, data: Vec<f32>) -> MontageResult<Self> {
        if channels == 0 {
            return Err(MontageError::validation("audio block needs at least one channel"));
        }
        if !data.len().is_multiple_of(usize::from(channels)) {
            return Err(MontageError::validation(
                "interleaved sample count is not a multiple of the channel count",
            ));
        }
        Ok(Self { channels, data })
    }

    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / usize::from(self.channels)
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Mutable interleaved samples.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Resize to `frames` and zero every sample.
    pub fn reset(&mut self, channels: u16, frames: usize) {
        self.channels = channels.max(1);
        self.data.clear();
        self.data.resize(frames * usize::from(self.channels), 0.0);
    }

    /// Zero every sample.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Zero the frames in `[from, frames())`.
    pub fn clear_from(&mut self, from: usize) {
        let start = (from * usize::from(self.channels)).min(self.data.len());
        self.data[start..].fill(0.0);
    }

    /// `true` when every sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.data.iter().all(|s| *s == 0.0)
    }

    /// Peak absolute sample value.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Consume the block and return the interleaved samples.
    pub fn into_interleaved(self) -> Vec<f32> {
        self.data
    }
}

/// A video frame as premultiplied RGBA8 pixels with its presentation time.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Presentation timestamp in seconds (source time for decoded frames, timeline time for
    /// composited frames).
    pub timestamp: f64,
    /// RGBA8 bytes, tightly packed, row-major, premultiplied alpha.
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Opaque black frame.
    pub fn black(canvas: Canvas, timestamp: f64) -> Self {
        Self::solid(canvas, [0, 0, 0, 255], timestamp)
    }

    /// Frame filled with a single premultiplied colour.
    pub fn solid(canvas: Canvas, rgba: [u8; 4], timestamp: f64) -> Self {
        let mut data = Vec::with_capacity(canvas.rgba_len());
        for _ in 0..(canvas.width as usize * canvas.height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self {
            width: canvas.width,
            height: canvas.height,
            timestamp,
            data,
        }
    }

    /// Wrap premultiplied RGBA8 bytes, validating the length.
    pub fn from_rgba(width: u32, height: u32, timestamp: f64, data: Vec<u8>) -> MontageResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(MontageError::validation(format!(
                "frame data has {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            timestamp,
            data,
        })
    }

    /// Dimensions of this frame.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Pixel at `(x, y)`; panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// `true` when every pixel is opaque black.
    pub fn is_black(&self) -> bool {
        self.data
            .chunks_exact(4)
            .all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0 && p[3] == 255)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/buffer.rs"]
mod tests;
