use std::io;
use std::path::PathBuf;

use eqlink_unit::PortDirection;
use thiserror::Error;

/// Reasons a control file cannot be created or opened. None of them are repaired
/// automatically; the caller has to delete or recreate the file.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("failed to access control file \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "control file \"{}\" cannot hold {channels} channels (supported: 1..={max})",
        path.display()
    )]
    UnsupportedChannels {
        path: PathBuf,
        channels: usize,
        max: usize,
    },
    #[error("plugin \"{label}\" has no control ports to store in \"{}\"", path.display())]
    NoControls { path: PathBuf, label: String },
    #[error(
        "control file \"{}\" has the wrong size: expected {expected} bytes, found {found}",
        path.display()
    )]
    WrongLength {
        path: PathBuf,
        expected: u64,
        found: u64,
    },
    #[error(
        "control file \"{}\" was created for plugin id {found}, loaded plugin is {expected}",
        path.display()
    )]
    WrongUnit {
        path: PathBuf,
        expected: u64,
        found: u64,
    },
    #[error(
        "control file \"{}\" has {found} channels, {expected} were requested",
        path.display()
    )]
    WrongChannels {
        path: PathBuf,
        expected: usize,
        found: u64,
    },
    #[error("plugin for control file \"{}\" has no audio {direction} port", path.display())]
    MissingAudioPort {
        path: PathBuf,
        direction: PortDirection,
    },
    #[error(
        "plugin for control file \"{}\" has {count} audio {direction} ports, expected one",
        path.display()
    )]
    AmbiguousAudioPort {
        path: PathBuf,
        direction: PortDirection,
        count: usize,
    },
    #[error(
        "control file \"{}\" stores port {index} as the audio {direction} port, but the plugin disagrees",
        path.display()
    )]
    MisassignedAudioPort {
        path: PathBuf,
        direction: PortDirection,
        index: i32,
    },
    #[error(
        "control file \"{}\" slot {slot} refers to port {port_index}, which is not a control port",
        path.display()
    )]
    CorruptSlot {
        path: PathBuf,
        slot: usize,
        port_index: i32,
    },
    #[error("cannot resolve control file \"{}\": no home directory", path.display())]
    NoHomeDirectory { path: PathBuf },
}

impl ControlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
