use std::path::Path;

use anyhow::Context as _;

use crate::foundation::buffer::VideoFrame;
use crate::foundation::error::{MontageError, MontageResult};

/// Decode an encoded still (PNG, JPEG, ...) into a premultiplied [`VideoFrame`].
pub fn decode_image(bytes: &[u8]) -> MontageResult<VideoFrame> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(frame_from_dynamic(dyn_img))
}

/// Decode a still from disk. Failures are reported as [`MontageError::MediaOpen`].
pub fn decode_image_file(path: &Path) -> MontageResult<VideoFrame> {
    let dyn_img = image::open(path).map_err(|e| MontageError::media_open(path, e.to_string()))?;
    Ok(frame_from_dynamic(dyn_img))
}

/// `true` when the file extension names a still format the `image` crate can decode.
pub fn is_still_image_path(path: &Path) -> bool {
    image::ImageFormat::from_path(path).is_ok()
}

fn frame_from_dynamic(dyn_img: image::DynamicImage) -> VideoFrame {
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();
    premultiply_rgba8_in_place(&mut data);
    VideoFrame {
        width,
        height,
        timestamp: 0.0,
        data,
    }
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        if a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/image.rs"]
mod tests;
