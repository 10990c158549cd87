//! Shared control state for eqlink.
//!
//! Both the PCM filter and the mixer surface map the same control file and
//! read or write per-channel control values in place. The file is created on
//! first use with the processing unit's default values and is validated, never
//! repaired, on every later open.

mod error;
#[cfg(feature = "fuzzing")]
mod fuzz;
pub mod layout;
pub mod path;
mod store;

pub use error::ControlError;
pub use layout::{file_length, SlotDirection, MAX_CHANNELS};
pub use path::{resolve_control_path, DEFAULT_CONTROL_FILE};
pub use store::{ControlFile, ControlSlot};

#[cfg(feature = "fuzzing")]
pub use fuzz::fuzz_open_control_file;
