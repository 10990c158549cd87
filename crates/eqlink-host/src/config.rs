use std::fs;
use std::path::{Path, PathBuf};

use eqlink_control::{resolve_control_path, ControlError, DEFAULT_CONTROL_FILE};
use eqlink_engine::EngineOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LIBRARY: &str = "/usr/lib/ladspa/caps.so";
pub const DEFAULT_MODULE: &str = "Eq10";
pub const DEFAULT_CHANNELS: usize = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown field {0}")]
    UnknownOption(String),
    #[error("channels must be 1 or more, got {0}")]
    InvalidChannels(i64),
    #[error("invalid value \"{value}\" for field {key}")]
    InvalidValue { key: String, value: String },
    #[error("no slave configuration for equalizer pcm")]
    MissingSlave,
    #[error("failed to read configuration {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a valid equalizer configuration: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the option set comes from. The PCM side has a few extra keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Pcm,
    Ctl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerConfig {
    /// Control file; relative paths live in the home directory.
    pub controls: PathBuf,
    /// LADSPA library, absolute or searched along `LADSPA_PATH`.
    pub library: PathBuf,
    /// Label of the unit inside `library`.
    pub module: String,
    pub channels: usize,
    pub sample_rate: u32,
    pub max_block_frames: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slave: Option<String>,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            controls: PathBuf::from(DEFAULT_CONTROL_FILE),
            library: PathBuf::from(DEFAULT_LIBRARY),
            module: DEFAULT_MODULE.to_owned(),
            channels: DEFAULT_CHANNELS,
            sample_rate: 44_100,
            max_block_frames: EngineOptions::default().max_block_frames,
            slave: None,
        }
    }
}

impl EqualizerConfig {
    pub fn with_controls<P: Into<PathBuf>>(mut self, controls: P) -> Self {
        self.controls = controls.into();
        self
    }

    pub fn with_library<P: Into<PathBuf>>(mut self, library: P) -> Self {
        self.library = library.into();
        self
    }

    pub fn with_module<S: Into<String>>(mut self, module: S) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_max_block_frames(mut self, frames: usize) -> Self {
        self.max_block_frames = frames;
        self
    }

    /// Parses the option block of a PCM definition. `slave` is required.
    pub fn from_pcm_options<I, K, V>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let config = Self::from_options(options, Scope::Pcm)?;
        if config.slave.is_none() {
            return Err(ConfigError::MissingSlave);
        }
        Ok(config)
    }

    /// Parses the option block of a control (mixer) definition.
    pub fn from_ctl_options<I, K, V>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::from_options(options, Scope::Ctl)
    }

    fn from_options<I, K, V>(options: I, scope: Scope) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in options {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "comment" | "type" => {}
                "hint" if scope == Scope::Pcm => {}
                "slave" if scope == Scope::Pcm => config.slave = Some(value.to_owned()),
                "controls" => config.controls = PathBuf::from(value),
                "library" => config.library = PathBuf::from(value),
                "module" => config.module = value.to_owned(),
                "channels" => {
                    let channels: i64 =
                        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                            key: key.to_owned(),
                            value: value.to_owned(),
                        })?;
                    if channels < 1 {
                        return Err(ConfigError::InvalidChannels(channels));
                    }
                    config.channels = usize::try_from(channels)
                        .map_err(|_| ConfigError::InvalidChannels(channels))?;
                }
                other => return Err(ConfigError::UnknownOption(other.to_owned())),
            }
        }
        Ok(config)
    }

    /// Reads a configuration from a JSON file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.channels < 1 {
            return Err(ConfigError::InvalidChannels(0));
        }
        Ok(config)
    }

    pub fn control_path(&self) -> Result<PathBuf, ControlError> {
        resolve_control_path(&self.controls)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::default().with_max_block_frames(self.max_block_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_the_stock_equalizer() {
        let config = EqualizerConfig::from_ctl_options(Vec::<(&str, &str)>::new()).expect("empty");
        assert_eq!(config, EqualizerConfig::default());
        assert_eq!(config.controls, PathBuf::from(".alsaequal.bin"));
        assert_eq!(config.library, PathBuf::from("/usr/lib/ladspa/caps.so"));
        assert_eq!(config.module, "Eq10");
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn ctl_options_override_defaults() {
        let config = EqualizerConfig::from_ctl_options([
            ("type", "equal"),
            ("comment", "bedroom speakers"),
            ("controls", "/var/lib/eq/room.bin"),
            ("library", "caps"),
            ("module", "Eq10X2"),
            ("channels", "6"),
        ])
        .expect("valid options");
        assert_eq!(
            config,
            EqualizerConfig::default()
                .with_controls("/var/lib/eq/room.bin")
                .with_library("caps")
                .with_module("Eq10X2")
                .with_channels(6)
        );
    }

    #[test]
    fn pcm_only_keys_are_scoped() {
        let err = EqualizerConfig::from_ctl_options([("slave", "plughw:0")]).expect_err("ctl");
        assert!(matches!(err, ConfigError::UnknownOption(key) if key == "slave"));
        let err = EqualizerConfig::from_ctl_options([("hint", "x")]).expect_err("ctl");
        assert!(matches!(err, ConfigError::UnknownOption(key) if key == "hint"));

        let config =
            EqualizerConfig::from_pcm_options([("slave", "plughw:0"), ("hint", "description")])
                .expect("pcm");
        assert_eq!(config.slave.as_deref(), Some("plughw:0"));

        let err = EqualizerConfig::from_pcm_options([("module", "Eq10")]).expect_err("no slave");
        assert!(matches!(err, ConfigError::MissingSlave));
    }

    #[test]
    fn bad_channel_counts() {
        let err = EqualizerConfig::from_ctl_options([("channels", "0")]).expect_err("zero");
        assert!(matches!(err, ConfigError::InvalidChannels(0)));
        let err = EqualizerConfig::from_ctl_options([("channels", "two")]).expect_err("text");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        let err = EqualizerConfig::from_ctl_options([("bands", "10")]).expect_err("unknown");
        assert_eq!(err.to_string(), "unknown field bands");
    }

    #[test]
    fn json_files_fill_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("eq.json");
        fs::write(&path, r#"{ "module": "Eq10X2", "channels": 4 }"#).expect("write");
        let config = EqualizerConfig::load(&path).expect("load");
        assert_eq!(config.module, "Eq10X2");
        assert_eq!(config.channels, 4);
        assert_eq!(config.library, PathBuf::from(DEFAULT_LIBRARY));

        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(EqualizerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
