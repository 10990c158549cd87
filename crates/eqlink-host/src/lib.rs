//! Host-facing glue: the equalizer as a PCM filter and as a mixer device,
//! both built from the same configuration and sharing one control file.

pub mod config;
pub mod ctl;
pub mod pcm;

pub use config::{ConfigError, EqualizerConfig};
pub use ctl::EqualizerCtl;
pub use pcm::{EqualizerPcm, SampleFormat, StreamConstraints};
