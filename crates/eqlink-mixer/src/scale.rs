//! Mapping between native control values and the fixed 0-100 mixer scale.

pub const EXTERNAL_MIN: i64 = 0;
pub const EXTERNAL_MAX: i64 = 100;
pub const EXTERNAL_STEP: i64 = 1;

/// Slack added before rounding down. Stored values are `f32`, so a value written
/// from step `k` can land just below `k` on the way back.
const READ_TOLERANCE: f64 = 1e-3;

/// Native value to mixer scale, rounding down. Values outside `[min, max]` clamp.
pub fn native_to_external(value: f32, min: f32, max: f32) -> i64 {
    let (value, min, max) = (f64::from(value), f64::from(min), f64::from(max));
    let scaled = ((value - min) / (max - min) * EXTERNAL_MAX as f64 + READ_TOLERANCE).floor();
    if scaled.is_nan() {
        return EXTERNAL_MIN;
    }
    (scaled as i64).clamp(EXTERNAL_MIN, EXTERNAL_MAX)
}

/// Mixer scale to native value. The end points map exactly onto `min` and `max`.
pub fn external_to_native(value: i64, min: f32, max: f32) -> f32 {
    let t = value.clamp(EXTERNAL_MIN, EXTERNAL_MAX) as f64 / EXTERNAL_MAX as f64;
    (f64::from(min) * (1.0 - t) + f64::from(max) * t) as f32
}
