//! Default values derived from LADSPA range hints.
//!
//! Control files written by earlier releases store defaults computed with this
//! exact arithmetic, so the float/double mix below mirrors the reference SDK
//! helper operation by operation.

use crate::ffi;
use crate::port::RangeHint;

/// Reference rate used when a control file is first created.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default-value category encoded in the `LADSPA_HINT_DEFAULT_MASK` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultHint {
    None,
    Minimum,
    Low,
    Middle,
    High,
    Maximum,
    Zero,
    One,
    Hundred,
    FourForty,
    Unknown(i32),
}

impl DefaultHint {
    pub fn from_descriptor(descriptor: i32) -> Self {
        match descriptor & ffi::LADSPA_HINT_DEFAULT_MASK {
            ffi::LADSPA_HINT_DEFAULT_NONE => Self::None,
            ffi::LADSPA_HINT_DEFAULT_MINIMUM => Self::Minimum,
            ffi::LADSPA_HINT_DEFAULT_LOW => Self::Low,
            ffi::LADSPA_HINT_DEFAULT_MIDDLE => Self::Middle,
            ffi::LADSPA_HINT_DEFAULT_HIGH => Self::High,
            ffi::LADSPA_HINT_DEFAULT_MAXIMUM => Self::Maximum,
            ffi::LADSPA_HINT_DEFAULT_0 => Self::Zero,
            ffi::LADSPA_HINT_DEFAULT_1 => Self::One,
            ffi::LADSPA_HINT_DEFAULT_100 => Self::Hundred,
            ffi::LADSPA_HINT_DEFAULT_440 => Self::FourForty,
            other => Self::Unknown(other),
        }
    }

    pub fn bits(self) -> i32 {
        match self {
            Self::None => ffi::LADSPA_HINT_DEFAULT_NONE,
            Self::Minimum => ffi::LADSPA_HINT_DEFAULT_MINIMUM,
            Self::Low => ffi::LADSPA_HINT_DEFAULT_LOW,
            Self::Middle => ffi::LADSPA_HINT_DEFAULT_MIDDLE,
            Self::High => ffi::LADSPA_HINT_DEFAULT_HIGH,
            Self::Maximum => ffi::LADSPA_HINT_DEFAULT_MAXIMUM,
            Self::Zero => ffi::LADSPA_HINT_DEFAULT_0,
            Self::One => ffi::LADSPA_HINT_DEFAULT_1,
            Self::Hundred => ffi::LADSPA_HINT_DEFAULT_100,
            Self::FourForty => ffi::LADSPA_HINT_DEFAULT_440,
            Self::Unknown(bits) => bits,
        }
    }
}

impl RangeHint {
    pub fn default_hint(&self) -> DefaultHint {
        DefaultHint::from_descriptor(self.descriptor)
    }
}

/// Computes the declared default for a port.
///
/// Returns `None` for `DEFAULT_NONE` and for categories this SDK revision does
/// not know; callers decide what to store in that case.
pub fn default_value(hint: &RangeHint, sample_rate: u32) -> Option<f32> {
    let lower = hint.lower;
    let upper = hint.upper;
    let logarithmic = hint.is_logarithmic();

    let value = match hint.default_hint() {
        DefaultHint::None | DefaultHint::Unknown(_) => return None,
        DefaultHint::Zero => return Some(0.0),
        DefaultHint::One => return Some(1.0),
        DefaultHint::Hundred => return Some(100.0),
        DefaultHint::FourForty => return Some(440.0),
        DefaultHint::Minimum => lower,
        DefaultHint::Maximum => upper,
        DefaultHint::Low => interpolate(lower, upper, 0.25, logarithmic),
        DefaultHint::High => interpolate(lower, upper, 0.75, logarithmic),
        DefaultHint::Middle => {
            if logarithmic {
                f64::from(lower * upper).sqrt() as f32
            } else {
                (0.5 * f64::from(lower + upper)) as f32
            }
        }
    };

    if hint.is_sample_rate() {
        Some(value * sample_rate as f32)
    } else {
        Some(value)
    }
}

fn interpolate(lower: f32, upper: f32, toward_upper: f64, logarithmic: bool) -> f32 {
    let toward_lower = 1.0 - toward_upper;
    if logarithmic {
        (f64::from(lower).ln() * toward_lower + f64::from(upper).ln() * toward_upper).exp() as f32
    } else {
        (f64::from(lower) * toward_lower + f64::from(upper) * toward_upper) as f32
    }
}
