//! Processing-unit layer for eqlink.
//!
//! A processing unit is a LADSPA plug-in living in a shared library. This crate
//! resolves the library along `LADSPA_PATH`, locates a unit by label and exposes
//! its port table read-only. Instances are created through the capability
//! interface in [`descriptor`], so the engine and the control store never touch
//! the raw ABI directly.

pub mod descriptor;
mod error;
pub mod hints;
pub mod library;
pub mod port;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use descriptor::{Capabilities, LadspaInstance, LadspaUnit, UnitDescriptor, UnitInstance};
pub use error::UnitError;
pub use hints::{default_value, DefaultHint, DEFAULT_SAMPLE_RATE};
pub use library::UnitLibrary;
pub use port::{PortDirection, PortFlags, PortInfo, PortKind, PortRole, RangeHint};

/// Raw LADSPA ABI, for callers that need to drop down to the C interface.
pub mod ffi;
