//! Audio side of eqlink: runs a LADSPA unit per channel with its control ports
//! bound to the shared control file.

mod engine;
mod error;
pub mod interleave;

pub use engine::{EngineOptions, EngineState, TransformEngine};
pub use error::EngineError;
