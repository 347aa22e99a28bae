use std::io::Cursor;

use super::*;

fn encode_png(w: u32, h: u32, rgba: Vec<u8>) -> Vec<u8> {
    let img = image::RgbaImage::from_raw(w, h, rgba).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_image_png_dimensions_and_premul() {
    let buf = encode_png(1, 1, vec![100u8, 50u8, 200u8, 128u8]);
    let frame = decode_image(&buf).unwrap();
    assert_eq!(frame.width, 1);
    assert_eq!(frame.height, 1);
    assert_eq!(
        frame.data,
        vec![
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn decode_image_file_missing_is_media_open_error() {
    let err = decode_image_file(Path::new("/definitely/not/here.png")).unwrap_err();
    assert!(matches!(err, MontageError::MediaOpen { .. }));
}

#[test]
fn still_detection_by_extension() {
    assert!(is_still_image_path(Path::new("a/b/logo.png")));
    assert!(is_still_image_path(Path::new("photo.JPG")));
    assert!(!is_still_image_path(Path::new("clip.unknownext")));
}
