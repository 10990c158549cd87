use std::sync::Arc;

use eqlink_control::ControlFile;
use eqlink_unit::{Capabilities, PortRole, UnitDescriptor, UnitInstance};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::interleave::{deinterleave, interleave};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Largest block accepted by [`TransformEngine::transfer`]. Scratch buffers
    /// are sized for it up front.
    pub max_block_frames: usize,
    /// Call the unit's `cleanup` when releasing instances. Off by default: some
    /// units crash in `cleanup` when hosted this way, so instances are dropped
    /// without it unless asked.
    pub invoke_cleanup: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_block_frames: 4096,
            invoke_cleanup: false,
        }
    }
}

impl EngineOptions {
    pub fn with_max_block_frames(mut self, frames: usize) -> Self {
        self.max_block_frames = frames.max(1);
        self
    }

    pub fn with_cleanup(mut self, invoke: bool) -> Self {
        self.invoke_cleanup = invoke;
        self
    }
}

/// Runs one unit instance per channel over interleaved audio blocks.
///
/// Control ports are bound straight to the values in the shared control file
/// before every block, so changes made by another process apply to the next
/// block without any refresh. `transfer` neither allocates nor locks.
pub struct TransformEngine {
    unit: Option<Arc<dyn UnitDescriptor>>,
    control: Option<ControlFile>,
    capabilities: Capabilities,
    options: EngineOptions,
    channels: usize,
    input_port: usize,
    output_port: usize,
    instances: Vec<Box<dyn UnitInstance>>,
    scratch_in: Vec<f32>,
    scratch_out: Vec<f32>,
    sample_rate: u32,
    state: EngineState,
}

impl TransformEngine {
    pub fn new(
        unit: Arc<dyn UnitDescriptor>,
        control: ControlFile,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let input_port = control.input_audio_port();
        let output_port = control.output_audio_port();
        if control.unit_id() != unit.unique_id()
            || !unit.port_has_role(input_port, PortRole::AUDIO_INPUT)
            || !unit.port_has_role(output_port, PortRole::AUDIO_OUTPUT)
        {
            return Err(EngineError::UnitMismatch {
                path: control.path().to_path_buf(),
                label: unit.label().to_owned(),
                unit_id: unit.unique_id(),
            });
        }

        let channels = control.channels();
        let scratch = options.max_block_frames * channels;
        Ok(Self {
            capabilities: unit.capabilities(),
            unit: Some(unit),
            control: Some(control),
            options,
            channels,
            input_port,
            output_port,
            instances: Vec::with_capacity(channels),
            scratch_in: vec![0.0; scratch],
            scratch_out: vec![0.0; scratch],
            sample_rate: 0,
            state: EngineState::Uninitialized,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn max_block_frames(&self) -> usize {
        self.options.max_block_frames
    }

    pub fn control(&self) -> Option<&ControlFile> {
        self.control.as_ref()
    }

    pub fn unit(&self) -> Option<&Arc<dyn UnitDescriptor>> {
        self.unit.as_ref()
    }

    /// Instantiates and activates one unit per channel.
    ///
    /// If any channel fails, every instance created so far is torn down and the
    /// engine stays uninitialized.
    pub fn start(&mut self, sample_rate: u32) -> Result<(), EngineError> {
        if self.state != EngineState::Uninitialized {
            return Err(EngineError::AlreadyStarted);
        }
        let Some(unit) = self.unit.clone() else {
            return Err(EngineError::NotActive);
        };

        for channel in 0..self.channels {
            match unit.instantiate(sample_rate) {
                Ok(mut instance) => {
                    if self.capabilities.activate {
                        instance.activate();
                    }
                    self.instances.push(instance);
                }
                Err(source) => {
                    self.release_instances();
                    return Err(EngineError::Instantiate { channel, source });
                }
            }
        }

        self.sample_rate = sample_rate;
        self.state = EngineState::Active;
        info!(
            label = unit.label(),
            channels = self.channels,
            sample_rate,
            "transform engine started"
        );
        Ok(())
    }

    /// Processes `frames` interleaved frames from `input` into `output`.
    ///
    /// Returns the number of frames processed, which is always `frames`.
    pub fn transfer(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        frames: usize,
    ) -> Result<usize, EngineError> {
        self.check_block(frames, input.len(), output.len())?;
        deinterleave(input, &mut self.scratch_in, frames, self.channels);
        self.run_channels(frames);
        interleave(&self.scratch_out, output, frames, self.channels);
        Ok(frames)
    }

    /// Like [`transfer`](Self::transfer) with the same buffer as source and destination.
    pub fn transfer_in_place(
        &mut self,
        buffer: &mut [f32],
        frames: usize,
    ) -> Result<usize, EngineError> {
        self.check_block(frames, buffer.len(), buffer.len())?;
        deinterleave(buffer, &mut self.scratch_in, frames, self.channels);
        self.run_channels(frames);
        interleave(&self.scratch_out, buffer, frames, self.channels);
        Ok(frames)
    }

    fn check_block(&self, frames: usize, input: usize, output: usize) -> Result<(), EngineError> {
        if self.state != EngineState::Active {
            return Err(EngineError::NotActive);
        }
        if frames > self.options.max_block_frames {
            return Err(EngineError::BlockTooLarge {
                frames,
                max: self.options.max_block_frames,
            });
        }
        let needed = frames * self.channels;
        if input < needed || output < needed {
            return Err(EngineError::BufferMismatch {
                frames,
                channels: self.channels,
                input,
                output,
            });
        }
        Ok(())
    }

    fn run_channels(&mut self, frames: usize) {
        let Some(control) = self.control.as_ref() else {
            return;
        };
        if frames == 0 {
            return;
        }
        let input = self.scratch_in.as_mut_ptr();
        let output = self.scratch_out.as_mut_ptr();

        for (channel, instance) in self.instances.iter_mut().enumerate() {
            // Safety: both scratch buffers hold `max_block_frames * channels`
            // samples and `frames <= max_block_frames`. Control values point
            // into the mapping, which outlives every instance.
            unsafe {
                let offset = channel * frames;
                instance.connect_port(self.input_port, input.add(offset));
                instance.connect_port(self.output_port, output.add(offset));
                for (slot, entry) in control.slots().iter().enumerate() {
                    instance.connect_port(entry.port_index, control.value_ptr(slot, channel));
                }
            }
            instance.run(frames);
        }
    }

    /// Deactivates and releases every instance, then unmaps the control file
    /// and drops the unit. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        let was_active = self.state == EngineState::Active;
        self.release_instances();
        if let Some(control) = self.control.take() {
            control.close();
        }
        let unit = self.unit.take();
        self.state = EngineState::Closed;
        if was_active {
            info!(
                label = unit.as_ref().map(|unit| unit.label()).unwrap_or_default(),
                "transform engine stopped"
            );
        }
    }

    fn release_instances(&mut self) {
        if self.instances.is_empty() {
            return;
        }
        if self.capabilities.deactivate {
            for instance in &mut self.instances {
                instance.deactivate();
            }
        }
        let cleanup = self.options.invoke_cleanup && self.capabilities.cleanup;
        if self.capabilities.cleanup && !cleanup {
            debug!(
                instances = self.instances.len(),
                "skipping unit cleanup; instances are dropped without it"
            );
        }
        for instance in self.instances.drain(..) {
            if cleanup {
                instance.cleanup();
            } else {
                drop(instance);
            }
        }
    }
}

impl Drop for TransformEngine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("state", &self.state)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("control", &self.control)
            .finish()
    }
}
