use super::*;

#[test]
fn range_rejects_degenerate_bounds() {
    assert!(ParameterRange::new(1.0, 1.0).is_err());
    assert!(ParameterRange::new(2.0, 1.0).is_err());
    assert!(ParameterRange::with_skew(0.0, 1.0, 0.0).is_err());
    assert!(ParameterRange::new(f64::NEG_INFINITY, 0.0).is_err());
}

#[test]
fn linear_mapping_round_trips() {
    let r = ParameterRange::new(-60.0, 12.0).unwrap();
    assert_eq!(r.to_real(0.0), -60.0);
    assert_eq!(r.to_real(1.0), 12.0);
    let n = r.to_normalized(0.0);
    assert!((r.to_real(n) - 0.0).abs() < 1e-9);
}

#[test]
fn skewed_mapping_is_monotonic() {
    let r = ParameterRange::with_skew(20.0, 20_000.0, 0.3).unwrap();
    let mut prev = f64::NEG_INFINITY;
    for i in 0..=1000 {
        let n = f64::from(i) / 1000.0;
        let real = r.to_real(n);
        assert!(real >= prev, "not monotonic at {n}");
        prev = real;
        assert!((r.to_normalized(real) - n).abs() < 1e-6);
    }
}

#[test]
fn mapping_clamps_out_of_range_inputs() {
    let r = ParameterRange::new(0.0, 10.0).unwrap();
    assert_eq!(r.to_real(-1.0), 0.0);
    assert_eq!(r.to_real(2.0), 10.0);
    assert_eq!(r.to_normalized(50.0), 1.0);
}

#[test]
fn set_normalized_clamps_and_marks_dirty() {
    let p = ProcessorParameter::new("gain", "Gain", ParameterRange::new(0.0, 2.0).unwrap(), 1.0);
    assert_eq!(p.normalized(), 0.5);
    assert!(!p.is_dirty());

    assert!(p.set_normalized(3.0));
    assert_eq!(p.normalized(), 1.0);
    assert_eq!(p.real_value(), 2.0);
    assert!(p.take_dirty());
    assert!(!p.take_dirty());

    assert!(!p.set_normalized(1.0));
    assert!(!p.is_dirty());
}

#[test]
fn nan_resets_to_default() {
    let p = ProcessorParameter::new("x", "X", ParameterRange::new(0.0, 1.0).unwrap(), 0.25);
    p.set_normalized(0.9);
    p.set_normalized(f64::NAN);
    assert_eq!(p.normalized(), 0.25);
}

#[test]
fn set_real_value_goes_through_range() {
    let p = ProcessorParameter::new("x", "X", ParameterRange::new(-1.0, 1.0).unwrap(), 0.0);
    p.set_real_value(0.5);
    assert!((p.normalized() - 0.75).abs() < 1e-12);
    assert_eq!(p.id(), "x");
    assert_eq!(p.name(), "X");
}
