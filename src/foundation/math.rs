pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Convert decibels to a linear gain factor.
pub(crate) fn db_to_gain(db: f64) -> f64 {
    if db <= -100.0 {
        0.0
    } else {
        10f64.powf(db / 20.0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
