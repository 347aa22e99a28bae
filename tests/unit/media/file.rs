use super::*;

#[test]
fn probe_missing_file_is_media_open() {
    let err = FileBackend::default()
        .probe(Path::new("/definitely/not/here.png"))
        .unwrap_err();
    assert!(matches!(err, MontageError::MediaOpen { .. }));
}

#[test]
fn probe_png_reports_still() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]))
        .save(&path)
        .unwrap();

    let info = FileBackend::default().probe(&path).unwrap();
    assert!(info.still);
    assert_eq!(info.size.map(|s| (s.width, s.height)), Some((3, 2)));
    assert!(info.duration.is_none());
}
