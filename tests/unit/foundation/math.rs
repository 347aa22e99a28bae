use super::*;

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u8(0, 200), 0);
}

#[test]
fn db_to_gain_reference_points() {
    assert!((db_to_gain(0.0) - 1.0).abs() < 1e-12);
    assert!((db_to_gain(-6.0) - 0.501_187).abs() < 1e-5);
    assert_eq!(db_to_gain(-120.0), 0.0);
}
