use std::sync::Arc;

use anyhow::{Context, Result};
use eqlink_control::ControlFile;
use eqlink_mixer::{ControlSurface, SurfaceIdentity};
use eqlink_unit::UnitDescriptor;

use crate::config::EqualizerConfig;
use crate::pcm::load_unit;

/// The equalizer as a mixer device.
pub struct EqualizerCtl {
    // Declared first so the mapping goes away before the unit (and with it
    // possibly the library) is released.
    surface: ControlSurface,
    unit: Arc<dyn UnitDescriptor>,
}

impl EqualizerCtl {
    pub fn open(config: &EqualizerConfig) -> Result<Self> {
        let unit = load_unit(config)?;
        Self::open_with_unit(config, unit)
    }

    pub fn open_with_unit(config: &EqualizerConfig, unit: Arc<dyn UnitDescriptor>) -> Result<Self> {
        let path = config.control_path()?;
        let control = ControlFile::open_or_create(unit.as_ref(), &path, config.channels)
            .with_context(|| format!("failed to open control file {}", path.display()))?;
        let surface = ControlSurface::new(unit.as_ref(), control)?;
        Ok(Self { surface, unit })
    }

    pub fn surface(&self) -> &ControlSurface {
        &self.surface
    }

    pub fn identity(&self) -> &SurfaceIdentity {
        self.surface.identity()
    }

    pub fn unit(&self) -> &Arc<dyn UnitDescriptor> {
        &self.unit
    }

    /// Per-channel 0-100 values of the named control, or `None` if it does not exist.
    pub fn get(&self, name: &str) -> Result<Option<Vec<i64>>> {
        match self.surface.find_elem(name) {
            Some(key) => Ok(Some(self.surface.read_integer(key)?)),
            None => Ok(None),
        }
    }

    /// Sets the named control. A single value is applied to every channel.
    pub fn set(&self, name: &str, values: &[i64]) -> Result<()> {
        let key = self
            .surface
            .find_elem(name)
            .with_context(|| format!("no control named \"{name}\""))?;
        if let [value] = values {
            let replicated = vec![*value; self.surface.channels()];
            self.surface.write_integer(key, &replicated)?;
        } else {
            self.surface.write_integer(key, values)?;
        }
        Ok(())
    }

    pub fn close(self) {
        let Self { surface, unit } = self;
        surface.close();
        drop(unit);
    }
}

impl std::fmt::Debug for EqualizerCtl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqualizerCtl")
            .field("surface", &self.surface)
            .field("unit", &self.unit.label())
            .finish()
    }
}
