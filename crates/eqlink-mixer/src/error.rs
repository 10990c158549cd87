use std::path::PathBuf;

use eqlink_control::ControlError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(
        "control file \"{}\" slot {slot} maps to port {port_index}, which is not a control input",
        path.display()
    )]
    MisassignedControl {
        path: PathBuf,
        slot: usize,
        port_index: usize,
    },
    #[error("control \"{name}\" has an empty range [{min}, {max}]")]
    DegenerateRange { name: String, min: f32, max: f32 },
    #[error("no control element with key {key}")]
    UnknownKey { key: usize },
    #[error("expected {expected} channel values, got {found}")]
    ValueCount { expected: usize, found: usize },
}
