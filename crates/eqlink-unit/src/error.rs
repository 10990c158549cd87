use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating a processing unit or creating instances of it.
///
/// Every variant except [`UnitError::InstantiateFailed`] means the unit is
/// unavailable; hosts decide whether that fails the operation or the process.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("failed to load plugin \"{name}\": {source}")]
    LibraryNotFound {
        name: String,
        #[source]
        source: libloading::Error,
    },
    #[error(
        "unable to find ladspa_descriptor() in plugin library \"{}\" (is this a LADSPA plugin file?): {source}",
        path.display()
    )]
    MissingEntryPoint {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("unable to find label \"{label}\" in plugin library \"{}\"", path.display())]
    LabelNotFound { label: String, path: PathBuf },
    #[error("plugin \"{label}\" has an unusable descriptor: {reason}")]
    InvalidDescriptor { label: String, reason: String },
    #[error("plugin \"{label}\" failed to instantiate at {sample_rate} Hz")]
    InstantiateFailed { label: String, sample_rate: u32 },
}

impl UnitError {
    pub(crate) fn invalid_descriptor(label: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            label: label.to_owned(),
            reason: reason.into(),
        }
    }

    /// True for every failure that makes the unit unavailable, as opposed to a
    /// failure of a single instance.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, Self::InstantiateFailed { .. })
    }
}
