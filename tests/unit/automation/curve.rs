use super::*;

fn ramp() -> AutomationCurve {
    let mut c = AutomationCurve::new(0.5);
    c.set_value(1.0, 0.0).unwrap();
    c.set_value(3.0, 1.0).unwrap();
    c
}

#[test]
fn empty_curve_returns_default() {
    let c = AutomationCurve::new(0.75);
    assert_eq!(c.value_at(-10.0), 0.75);
    assert_eq!(c.value_at(123.0), 0.75);
}

#[test]
fn clamps_outside_keyed_span() {
    let c = ramp();
    assert_eq!(c.value_at(0.0), 0.0);
    assert_eq!(c.value_at(10.0), 1.0);
}

#[test]
fn exact_value_at_keyframe_time() {
    let c = ramp();
    assert_eq!(c.value_at(1.0), 0.0);
    assert_eq!(c.value_at(3.0), 1.0);
}

#[test]
fn linear_between_keys_stays_bracketed() {
    let c = ramp();
    assert!((c.value_at(2.0) - 0.5).abs() < 1e-12);
    for i in 0..=100 {
        let t = 1.0 + 2.0 * f64::from(i) / 100.0;
        let v = c.value_at(t);
        assert!((0.0..=1.0).contains(&v), "t={t} v={v}");
    }
}

#[test]
fn hold_keeps_earlier_value() {
    let mut c = ramp();
    c.set_interpolation(Interpolation::Hold);
    assert_eq!(c.value_at(2.9), 0.0);
    assert_eq!(c.value_at(3.0), 1.0);
}

#[test]
fn set_value_inserts_sorted_and_replaces() {
    let mut c = AutomationCurve::default();
    c.set_value(2.0, 2.0).unwrap();
    c.set_value(0.0, 0.0).unwrap();
    c.set_value(1.0, 1.0).unwrap();
    c.set_value(1.0, 5.0).unwrap();
    let times: Vec<f64> = c.keyframes().iter().map(|k| k.time).collect();
    assert_eq!(times, vec![0.0, 1.0, 2.0]);
    assert_eq!(c.value_at(1.0), 5.0);
    assert!(c.validate().is_ok());
}

#[test]
fn rejects_non_finite_values() {
    let mut c = AutomationCurve::default();
    assert!(c.set_value(f64::NAN, 1.0).is_err());
    assert!(c.set_value(1.0, f64::INFINITY).is_err());
    assert!(c.is_empty());
}

#[test]
fn remove_and_clear() {
    let mut c = ramp();
    assert!(c.remove_keyframe(1.0));
    assert!(!c.remove_keyframe(1.0));
    assert_eq!(c.value_at(0.0), 1.0);
    c.clear();
    assert_eq!(c.value_at(0.0), 0.5);
}

#[test]
fn from_keyframes_sorts_and_rejects_duplicates() {
    let c = AutomationCurve::from_keyframes(
        0.0,
        Interpolation::Linear,
        vec![
            Keyframe {
                time: 2.0,
                value: 1.0,
            },
            Keyframe {
                time: 0.0,
                value: 0.0,
            },
        ],
    )
    .unwrap();
    assert_eq!(c.keyframes()[0].time, 0.0);

    let dup = AutomationCurve::from_keyframes(
        0.0,
        Interpolation::Linear,
        vec![
            Keyframe {
                time: 1.0,
                value: 1.0,
            },
            Keyframe {
                time: 1.0,
                value: 2.0,
            },
        ],
    );
    assert!(dup.is_err());
}

#[test]
fn serde_round_trip_keeps_interpolation() {
    let mut c = ramp();
    c.set_interpolation(Interpolation::Hold);
    let json = serde_json::to_string(&c).unwrap();
    let back: AutomationCurve = serde_json::from_str(&json).unwrap();
    assert_eq!(back, c);
}
