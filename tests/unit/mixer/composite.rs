use super::*;

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    assert_eq!(over(dst, [200, 200, 200, 200], 0.0), dst);
}

#[test]
fn over_src_alpha_0_is_noop() {
    let dst = [10, 20, 30, 40];
    assert_eq!(over(dst, [255, 255, 255, 0], 1.0), dst);
}

#[test]
fn over_opaque_src_replaces_dst() {
    let src = [255, 0, 0, 255];
    assert_eq!(over([0, 0, 0, 255], src, 1.0), src);
}

#[test]
fn over_half_opacity_on_black() {
    assert_eq!(over([0, 0, 0, 255], [255, 0, 0, 255], 0.5), [128, 0, 0, 255]);
}

#[test]
fn over_in_place_rejects_size_mismatch() {
    let mut dst = VideoFrame::black(Canvas::new(2, 2).unwrap(), 0.0);
    let src = VideoFrame::black(Canvas::new(1, 2).unwrap(), 0.0);
    assert!(over_in_place(&mut dst, &src, 1.0).is_err());
}

#[test]
fn scale_to_is_nearest_neighbour() {
    let src = VideoFrame::from_rgba(
        2,
        1,
        0.25,
        vec![10, 10, 10, 255, 20, 20, 20, 255],
    )
    .unwrap();
    let out = scale_to(&src, Canvas::new(4, 2).unwrap());
    assert_eq!(out.timestamp, 0.25);
    assert_eq!(out.pixel(0, 0)[0], 10);
    assert_eq!(out.pixel(1, 1)[0], 10);
    assert_eq!(out.pixel(2, 0)[0], 20);
    assert_eq!(out.pixel(3, 1)[0], 20);
}
