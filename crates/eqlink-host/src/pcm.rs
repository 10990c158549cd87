use std::sync::Arc;

use anyhow::{Context, Result};
use eqlink_control::ControlFile;
use eqlink_engine::{EngineError, EngineState, TransformEngine};
use eqlink_unit::{UnitDescriptor, UnitLibrary};
use tracing::info;

use crate::config::EqualizerConfig;

/// Sample formats the filter accepts on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Native-endian 32-bit float.
    Float32,
}

/// Stream parameters the filter enforces towards its slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub format: SampleFormat,
    pub channels: usize,
}

impl StreamConstraints {
    pub fn accepts(&self, format: SampleFormat, channels: usize) -> bool {
        self.format == format && self.channels == channels
    }
}

/// The equalizer as an audio filter in front of a slave device.
#[derive(Debug)]
pub struct EqualizerPcm {
    engine: TransformEngine,
    slave: Option<String>,
    sample_rate: u32,
}

impl EqualizerPcm {
    /// Loads the configured unit and opens (or creates) its control file.
    pub fn open(config: &EqualizerConfig) -> Result<Self> {
        let unit = load_unit(config)?;
        Self::open_with_unit(config, unit)
    }

    pub fn open_with_unit(config: &EqualizerConfig, unit: Arc<dyn UnitDescriptor>) -> Result<Self> {
        let path = config.control_path()?;
        let control = ControlFile::open_or_create(unit.as_ref(), &path, config.channels)
            .with_context(|| format!("failed to open control file {}", path.display()))?;
        let engine = TransformEngine::new(unit, control, config.engine_options())?;
        Ok(Self {
            engine,
            slave: config.slave.clone(),
            sample_rate: config.sample_rate,
        })
    }

    pub fn slave(&self) -> Option<&str> {
        self.slave.as_deref()
    }

    pub fn constraints(&self) -> StreamConstraints {
        StreamConstraints {
            format: SampleFormat::Float32,
            channels: self.engine.channels(),
        }
    }

    pub fn engine(&self) -> &TransformEngine {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.engine.state() == EngineState::Active
    }

    /// Starts processing at the configured sample rate.
    pub fn start(&mut self) -> Result<()> {
        self.start_at(self.sample_rate)
    }

    /// Starts processing at the rate negotiated with the slave.
    pub fn start_at(&mut self, sample_rate: u32) -> Result<()> {
        self.engine
            .start(sample_rate)
            .with_context(|| format!("failed to start equalizer at {sample_rate} Hz"))?;
        self.sample_rate = sample_rate;
        Ok(())
    }

    /// Filters `frames` interleaved frames, splitting periods longer than the
    /// engine's block size into several blocks.
    pub fn transfer(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        frames: usize,
    ) -> Result<usize, EngineError> {
        let channels = self.engine.channels();
        let needed = frames * channels;
        if input.len() < needed || output.len() < needed {
            return Err(EngineError::BufferMismatch {
                frames,
                channels,
                input: input.len(),
                output: output.len(),
            });
        }

        let block = self.engine.max_block_frames();
        let mut done = 0;
        while done < frames {
            let count = (frames - done).min(block);
            let range = done * channels..(done + count) * channels;
            self.engine
                .transfer(&input[range.clone()], &mut output[range], count)?;
            done += count;
        }
        // Zero-length periods still report an inactive engine.
        if frames == 0 {
            self.engine.transfer(input, output, 0)?;
        }
        Ok(frames)
    }

    pub fn transfer_in_place(&mut self, buffer: &mut [f32], frames: usize) -> Result<usize, EngineError> {
        let channels = self.engine.channels();
        if buffer.len() < frames * channels {
            return Err(EngineError::BufferMismatch {
                frames,
                channels,
                input: buffer.len(),
                output: buffer.len(),
            });
        }
        let block = self.engine.max_block_frames();
        let mut done = 0;
        while done < frames {
            let count = (frames - done).min(block);
            let range = done * channels..(done + count) * channels;
            self.engine.transfer_in_place(&mut buffer[range], count)?;
            done += count;
        }
        if frames == 0 {
            self.engine.transfer_in_place(buffer, 0)?;
        }
        Ok(frames)
    }

    pub fn close(&mut self) {
        self.engine.close();
    }
}

pub(crate) fn load_unit(config: &EqualizerConfig) -> Result<Arc<dyn UnitDescriptor>> {
    let library = UnitLibrary::load(&config.library)
        .with_context(|| format!("failed to load {}", config.library.display()))?;
    let unit = library.find(&config.module)?;
    info!(
        library = %library.path().display(),
        label = %config.module,
        unique_id = unit.unique_id(),
        "loaded equalizer unit"
    );
    Ok(Arc::new(unit))
}
