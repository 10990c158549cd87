use std::fmt;

use eqlink_control::{ControlFile, SlotDirection};
use eqlink_unit::{PortRole, UnitDescriptor};
use tracing::debug;

use crate::error::SurfaceError;
use crate::scale::{
    external_to_native, native_to_external, EXTERNAL_MAX, EXTERNAL_MIN, EXTERNAL_STEP,
};

/// Appended to every control name so mixers show them as volume sliders.
pub const CONTROL_SUFFIX: &str = " Playback Volume";

pub const DRIVER_NAME: &str = "LADSPA Plugin";
pub const MIXER_NAME: &str = "alsaequal";

/// External name of a control: zero-padded port index, port name, suffix.
pub fn control_name(port_index: usize, port_name: &str) -> String {
    format!("{port_index:02}. {port_name}{CONTROL_SUFFIX}")
}

/// Opaque handle to one element of a [`ControlSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElemKey(usize);

impl ElemKey {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One tunable control as seen by a mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDescriptor {
    pub name: String,
    pub slot: usize,
    pub port_index: usize,
    pub range_min: f32,
    pub range_max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElemAttribute {
    pub elem_type: ElemType,
    pub readable: bool,
    pub writable: bool,
    /// Number of values, one per channel.
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerInfo {
    pub min: i64,
    pub max: i64,
    pub step: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceIdentity {
    pub id: String,
    pub name: String,
    pub longname: String,
    pub driver: String,
    pub mixername: String,
}

/// Exposes the input controls of a control file as integer mixer elements.
///
/// Element order follows the slot order of the file, which follows the unit's
/// port order, so keys and names are stable across opens.
pub struct ControlSurface {
    control: ControlFile,
    controls: Vec<ControlDescriptor>,
    identity: SurfaceIdentity,
}

impl ControlSurface {
    pub fn new(unit: &dyn UnitDescriptor, control: ControlFile) -> Result<Self, SurfaceError> {
        let mut controls = Vec::new();
        for (slot, entry) in control.slots().iter().enumerate() {
            if entry.direction != SlotDirection::Input {
                continue;
            }
            let port = unit
                .port(entry.port_index)
                .filter(|port| port.role() == Some(PortRole::CONTROL_INPUT))
                .ok_or_else(|| SurfaceError::MisassignedControl {
                    path: control.path().to_path_buf(),
                    slot,
                    port_index: entry.port_index,
                })?;

            let name = control_name(port.index, &port.name);
            let (range_min, range_max) = (port.hint.lower, port.hint.upper);
            if !(range_max > range_min) {
                return Err(SurfaceError::DegenerateRange {
                    name,
                    min: range_min,
                    max: range_max,
                });
            }
            controls.push(ControlDescriptor {
                name,
                slot,
                port_index: port.index,
                range_min,
                range_max,
            });
        }

        let identity = SurfaceIdentity {
            id: unit.label().to_owned(),
            name: unit.label().to_owned(),
            longname: unit.name().to_owned(),
            driver: DRIVER_NAME.to_owned(),
            mixername: MIXER_NAME.to_owned(),
        };
        debug!(
            path = %control.path().display(),
            elements = controls.len(),
            "control surface ready"
        );
        Ok(Self {
            control,
            controls,
            identity,
        })
    }

    pub fn identity(&self) -> &SurfaceIdentity {
        &self.identity
    }

    pub fn control_file(&self) -> &ControlFile {
        &self.control
    }

    pub fn channels(&self) -> usize {
        self.control.channels()
    }

    pub fn elem_count(&self) -> usize {
        self.controls.len()
    }

    pub fn elem_list(&self) -> impl Iterator<Item = (ElemKey, &str)> + '_ {
        self.controls
            .iter()
            .enumerate()
            .map(|(index, control)| (ElemKey(index), control.name.as_str()))
    }

    /// Looks up an element by its full name. Unknown names are not an error.
    pub fn find_elem(&self, name: &str) -> Option<ElemKey> {
        self.controls
            .iter()
            .position(|control| control.name == name)
            .map(ElemKey)
    }

    pub fn descriptor(&self, key: ElemKey) -> Result<&ControlDescriptor, SurfaceError> {
        self.controls
            .get(key.0)
            .ok_or(SurfaceError::UnknownKey { key: key.0 })
    }

    pub fn attribute(&self, key: ElemKey) -> Result<ElemAttribute, SurfaceError> {
        self.descriptor(key)?;
        Ok(ElemAttribute {
            elem_type: ElemType::Integer,
            readable: true,
            writable: true,
            count: self.channels(),
        })
    }

    /// Every element uses the same 0-100 scale, whatever its native range.
    pub fn integer_info(&self, key: ElemKey) -> Result<IntegerInfo, SurfaceError> {
        self.descriptor(key)?;
        Ok(IntegerInfo {
            min: EXTERNAL_MIN,
            max: EXTERNAL_MAX,
            step: EXTERNAL_STEP,
        })
    }

    /// Current value of every channel on the 0-100 scale.
    pub fn read_integer(&self, key: ElemKey) -> Result<Vec<i64>, SurfaceError> {
        let control = self.descriptor(key)?;
        Ok((0..self.channels())
            .map(|channel| {
                let value = self.control.read(control.slot, channel);
                native_to_external(value, control.range_min, control.range_max)
            })
            .collect())
    }

    /// Stores one 0-100 value per channel. Each channel is written separately,
    /// so a concurrent reader may see a mix of old and new values.
    pub fn write_integer(&self, key: ElemKey, values: &[i64]) -> Result<(), SurfaceError> {
        let control = self.descriptor(key)?;
        if values.len() != self.channels() {
            return Err(SurfaceError::ValueCount {
                expected: self.channels(),
                found: values.len(),
            });
        }
        for (channel, &value) in values.iter().enumerate() {
            let native = external_to_native(value, control.range_min, control.range_max);
            self.control.write(control.slot, channel, native);
        }
        Ok(())
    }

    /// Change notifications are never generated; there is never an event to read.
    pub fn read_event(&self) -> Option<ElemKey> {
        None
    }

    /// Releases the control file mapping.
    pub fn close(self) {
        self.control.close();
    }
}

impl fmt::Debug for ControlSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSurface")
            .field("identity", &self.identity)
            .field("elements", &self.controls.len())
            .field("control", &self.control)
            .finish()
    }
}
