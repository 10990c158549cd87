use std::path::PathBuf;

use eqlink_unit::UnitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to instantiate plugin for channel {channel}: {source}")]
    Instantiate {
        channel: usize,
        #[source]
        source: UnitError,
    },
    #[error("engine is not active")]
    NotActive,
    #[error("engine has already been started")]
    AlreadyStarted,
    #[error(
        "audio buffers too small for {frames} frames of {channels} channels (input {input}, output {output} samples)"
    )]
    BufferMismatch {
        frames: usize,
        channels: usize,
        input: usize,
        output: usize,
    },
    #[error("block of {frames} frames exceeds the configured maximum of {max}")]
    BlockTooLarge { frames: usize, max: usize },
    #[error(
        "control file \"{}\" does not match plugin \"{label}\" (id {unit_id})",
        path.display()
    )]
    UnitMismatch {
        path: PathBuf,
        label: String,
        unit_id: u64,
    },
}
