use std::fmt;

use crate::ffi;

/// Direction of a port as seen from the processing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

/// Whether a port carries a sample stream or a scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Audio,
    Control,
}

/// Exact role of a port. Only ports whose descriptor bits name exactly one
/// direction and one kind have a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRole {
    pub direction: PortDirection,
    pub kind: PortKind,
}

impl PortRole {
    pub const AUDIO_INPUT: Self = Self::new(PortDirection::Input, PortKind::Audio);
    pub const AUDIO_OUTPUT: Self = Self::new(PortDirection::Output, PortKind::Audio);
    pub const CONTROL_INPUT: Self = Self::new(PortDirection::Input, PortKind::Control);
    pub const CONTROL_OUTPUT: Self = Self::new(PortDirection::Output, PortKind::Control);

    pub const fn new(direction: PortDirection, kind: PortKind) -> Self {
        Self { direction, kind }
    }

    pub fn flags(self) -> PortFlags {
        let direction = match self.direction {
            PortDirection::Input => ffi::LADSPA_PORT_INPUT,
            PortDirection::Output => ffi::LADSPA_PORT_OUTPUT,
        };
        let kind = match self.kind {
            PortKind::Audio => ffi::LADSPA_PORT_AUDIO,
            PortKind::Control => ffi::LADSPA_PORT_CONTROL,
        };
        PortFlags(direction | kind)
    }
}

/// Raw LADSPA port descriptor bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortFlags(pub i32);

impl PortFlags {
    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn is_control(self) -> bool {
        self.0 & ffi::LADSPA_PORT_CONTROL != 0
    }

    pub fn is_audio(self) -> bool {
        self.0 & ffi::LADSPA_PORT_AUDIO != 0
    }

    pub fn is_input(self) -> bool {
        self.0 & ffi::LADSPA_PORT_INPUT != 0
    }

    pub fn is_output(self) -> bool {
        self.0 & ffi::LADSPA_PORT_OUTPUT != 0
    }

    /// Returns the role only when the bits match one of the four well-formed
    /// combinations exactly.
    pub fn role(self) -> Option<PortRole> {
        [
            PortRole::AUDIO_INPUT,
            PortRole::AUDIO_OUTPUT,
            PortRole::CONTROL_INPUT,
            PortRole::CONTROL_OUTPUT,
        ]
        .into_iter()
        .find(|role| role.flags() == self)
    }
}

impl From<PortRole> for PortFlags {
    fn from(role: PortRole) -> Self {
        role.flags()
    }
}

/// Range metadata declared for a port.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeHint {
    pub descriptor: i32,
    pub lower: f32,
    pub upper: f32,
}

impl RangeHint {
    pub fn new(descriptor: i32, lower: f32, upper: f32) -> Self {
        Self {
            descriptor,
            lower,
            upper,
        }
    }

    pub fn is_bounded_below(&self) -> bool {
        self.descriptor & ffi::LADSPA_HINT_BOUNDED_BELOW != 0
    }

    pub fn is_bounded_above(&self) -> bool {
        self.descriptor & ffi::LADSPA_HINT_BOUNDED_ABOVE != 0
    }

    pub fn is_logarithmic(&self) -> bool {
        self.descriptor & ffi::LADSPA_HINT_LOGARITHMIC != 0
    }

    pub fn is_sample_rate(&self) -> bool {
        self.descriptor & ffi::LADSPA_HINT_SAMPLE_RATE != 0
    }

    pub fn is_toggled(&self) -> bool {
        self.descriptor & ffi::LADSPA_HINT_TOGGLED != 0
    }

    pub fn is_integer(&self) -> bool {
        self.descriptor & ffi::LADSPA_HINT_INTEGER != 0
    }
}

impl From<ffi::LADSPA_PortRangeHint> for RangeHint {
    fn from(raw: ffi::LADSPA_PortRangeHint) -> Self {
        Self::new(raw.HintDescriptor, raw.LowerBound, raw.UpperBound)
    }
}

/// One entry of a unit's port table.
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub flags: PortFlags,
    pub hint: RangeHint,
}

impl PortInfo {
    pub fn new(index: usize, name: impl Into<String>, flags: impl Into<PortFlags>, hint: RangeHint) -> Self {
        Self {
            index,
            name: name.into(),
            flags: flags.into(),
            hint,
        }
    }

    pub fn role(&self) -> Option<PortRole> {
        self.flags.role()
    }

    pub fn is_control(&self) -> bool {
        self.flags.is_control()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_require_exact_bits() {
        assert_eq!(PortFlags(0x1 | 0x8).role(), Some(PortRole::AUDIO_INPUT));
        assert_eq!(PortFlags(0x2 | 0x8).role(), Some(PortRole::AUDIO_OUTPUT));
        assert_eq!(PortFlags(0x1 | 0x4).role(), Some(PortRole::CONTROL_INPUT));
        assert_eq!(PortFlags(0x1 | 0x2 | 0x8).role(), None);
        assert_eq!(PortFlags(0x8).role(), None);
    }

    #[test]
    fn control_bit_is_independent_of_direction() {
        let flags = PortFlags(ffi::LADSPA_PORT_OUTPUT | ffi::LADSPA_PORT_CONTROL);
        assert!(flags.is_control());
        assert!(!flags.is_input());
        assert!(!flags.is_audio());
    }
}
