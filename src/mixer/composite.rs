use rayon::prelude::*;

use crate::foundation::buffer::VideoFrame;
use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::mul_div255_u8;

/// One premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Source-over of `src` scaled by `opacity` onto `dst`, premultiplied.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255_u8(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255_u8(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Composite `src` over `dst` in place. Both frames must share a size.
pub fn over_in_place(dst: &mut VideoFrame, src: &VideoFrame, opacity: f32) -> MontageResult<()> {
    if dst.canvas() != src.canvas() || dst.data.len() != src.data.len() {
        return Err(MontageError::validation(
            "over_in_place expects equally sized frames",
        ));
    }
    if opacity <= 0.0 {
        return Ok(());
    }
    let row = dst.width as usize * 4;
    if row == 0 {
        return Ok(());
    }
    dst.data
        .par_chunks_mut(row)
        .zip(src.data.par_chunks(row))
        .for_each(|(d_row, s_row)| {
            for (d, s) in d_row.chunks_exact_mut(4).zip(s_row.chunks_exact(4)) {
                let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
                d.copy_from_slice(&out);
            }
        });
    Ok(())
}

/// Nearest-neighbour resample of `src` to `canvas`. Returns a clone when sizes already match.
pub fn scale_to(src: &VideoFrame, canvas: Canvas) -> VideoFrame {
    if src.canvas() == canvas {
        return src.clone();
    }
    let mut out = VideoFrame::solid(canvas, [0, 0, 0, 0], src.timestamp);
    if src.width == 0 || src.height == 0 || canvas.width == 0 || canvas.height == 0 {
        return out;
    }
    let row = canvas.width as usize * 4;
    let (sw, sh) = (u64::from(src.width), u64::from(src.height));
    let (dw, dh) = (u64::from(canvas.width), u64::from(canvas.height));
    out.data.par_chunks_mut(row).enumerate().for_each(|(y, d_row)| {
        let sy = ((y as u64 * sh) / dh).min(sh - 1) as usize;
        for (x, d) in d_row.chunks_exact_mut(4).enumerate() {
            let sx = ((x as u64 * sw) / dw).min(sw - 1) as usize;
            let i = (sy * src.width as usize + sx) * 4;
            d.copy_from_slice(&src.data[i..i + 4]);
        }
    });
    out
}

#[cfg(test)]
#[path = "../../tests/unit/mixer/composite.rs"]
mod tests;
