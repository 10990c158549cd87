//! In-process mock units for tests that must not depend on a real LADSPA library.

use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptor::{Capabilities, UnitDescriptor, UnitInstance};
use crate::error::UnitError;
use crate::ffi;
use crate::hints::DefaultHint;
use crate::port::{PortFlags, PortInfo, PortRole, RangeHint};

/// Lifecycle calls observed by a [`MockUnit`], tagged with the instance number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Instantiated { instance: usize, sample_rate: u32 },
    Activated(usize),
    Deactivated(usize),
    CleanedUp(usize),
    Dropped(usize),
}

/// What a mock instance does in `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockProcess {
    /// Copies input to output.
    Passthrough,
    /// Multiplies input by the first input control port.
    Gain,
}

/// Bounded range hint with the given default category.
pub fn bounded(default: DefaultHint, lower: f32, upper: f32) -> RangeHint {
    RangeHint::new(
        default.bits() | ffi::LADSPA_HINT_BOUNDED_BELOW | ffi::LADSPA_HINT_BOUNDED_ABOVE,
        lower,
        upper,
    )
}

/// Bounded logarithmic range hint with the given default category.
pub fn logarithmic(default: DefaultHint, lower: f32, upper: f32) -> RangeHint {
    let mut hint = bounded(default, lower, upper);
    hint.descriptor |= ffi::LADSPA_HINT_LOGARITHMIC;
    hint
}

pub struct MockUnitBuilder {
    unique_id: u64,
    label: String,
    name: String,
    ports: Vec<PortInfo>,
    capabilities: Capabilities,
    process: MockProcess,
    fail_at: Option<usize>,
}

impl MockUnitBuilder {
    pub fn unique_id(mut self, id: u64) -> Self {
        self.unique_id = id;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn port(mut self, name: &str, flags: impl Into<PortFlags>, hint: RangeHint) -> Self {
        let index = self.ports.len();
        self.ports.push(PortInfo::new(index, name, flags, hint));
        self
    }

    pub fn audio_input(self, name: &str) -> Self {
        self.port(name, PortRole::AUDIO_INPUT, RangeHint::default())
    }

    pub fn audio_output(self, name: &str) -> Self {
        self.port(name, PortRole::AUDIO_OUTPUT, RangeHint::default())
    }

    pub fn control_input(self, name: &str, hint: RangeHint) -> Self {
        self.port(name, PortRole::CONTROL_INPUT, hint)
    }

    pub fn control_output(self, name: &str) -> Self {
        self.port(name, PortRole::CONTROL_OUTPUT, RangeHint::default())
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn process(mut self, process: MockProcess) -> Self {
        self.process = process;
        self
    }

    /// Makes the `n`th instantiation (zero based) fail.
    pub fn fail_instantiation_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn build(self) -> MockUnit {
        MockUnit {
            unique_id: self.unique_id,
            label: self.label,
            name: self.name,
            ports: self.ports,
            capabilities: self.capabilities,
            process: self.process,
            fail_at: self.fail_at,
            created: AtomicUsize::new(0),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// A processing unit implemented in Rust that records its lifecycle.
pub struct MockUnit {
    unique_id: u64,
    label: String,
    name: String,
    ports: Vec<PortInfo>,
    capabilities: Capabilities,
    process: MockProcess,
    fail_at: Option<usize>,
    created: AtomicUsize,
    log: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl MockUnit {
    pub fn builder(label: &str) -> MockUnitBuilder {
        MockUnitBuilder {
            unique_id: 1,
            label: label.to_owned(),
            name: format!("Mock {label}"),
            ports: Vec::new(),
            capabilities: Capabilities {
                activate: true,
                deactivate: true,
                cleanup: true,
            },
            process: MockProcess::Passthrough,
            fail_at: None,
        }
    }

    /// Audio in/out, a `Gain` control in `[0, 4]` defaulting to 1 and a `Peak` meter.
    pub fn gain() -> Self {
        Self::builder("mock_gain")
            .unique_id(4_242)
            .audio_input("Input")
            .audio_output("Output")
            .control_input("Gain", bounded(DefaultHint::One, 0.0, 4.0))
            .control_output("Peak")
            .process(MockProcess::Gain)
            .build()
    }

    /// A graphic equalizer shaped like the CAPS `Eq10`: one control per band in
    /// `[-48, 24]` defaulting to 0 dB, followed by the audio ports.
    pub fn equalizer(bands: usize) -> Self {
        let mut builder = Self::builder("Eq10").unique_id(1_773).name("Mock Equalizer");
        for band in 0..bands {
            let name = format!("{} Hz", 31.25 * f64::from(1u32 << band.min(31)));
            builder = builder.control_input(&name, bounded(DefaultHint::Zero, -48.0, 24.0));
        }
        builder.audio_input("in").audio_output("out").build()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.log.lock().clone()
    }

    pub fn event_log(&self) -> Arc<Mutex<Vec<LifecycleEvent>>> {
        Arc::clone(&self.log)
    }

    pub fn instances_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn first_port(&self, role: PortRole) -> Option<usize> {
        self.ports
            .iter()
            .find(|port| port.role() == Some(role))
            .map(|port| port.index)
    }
}

impl UnitDescriptor for MockUnit {
    fn unique_id(&self) -> u64 {
        self.unique_id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &[PortInfo] {
        &self.ports
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn instantiate(&self, sample_rate: u32) -> Result<Box<dyn UnitInstance>, UnitError> {
        let instance = self.created.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(instance) {
            return Err(UnitError::InstantiateFailed {
                label: self.label.clone(),
                sample_rate,
            });
        }
        self.log.lock().push(LifecycleEvent::Instantiated {
            instance,
            sample_rate,
        });

        let meters = self
            .ports
            .iter()
            .filter(|port| port.role() == Some(PortRole::CONTROL_OUTPUT))
            .map(|port| port.index)
            .collect();

        Ok(Box::new(MockInstance {
            id: instance,
            bindings: vec![ptr::null_mut(); self.ports.len()],
            input: self.first_port(PortRole::AUDIO_INPUT),
            output: self.first_port(PortRole::AUDIO_OUTPUT),
            gain: self.first_port(PortRole::CONTROL_INPUT),
            meters,
            process: self.process,
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockInstance {
    id: usize,
    bindings: Vec<*mut f32>,
    input: Option<usize>,
    output: Option<usize>,
    gain: Option<usize>,
    meters: Vec<usize>,
    process: MockProcess,
    log: Arc<Mutex<Vec<LifecycleEvent>>>,
}

unsafe impl Send for MockInstance {}

impl MockInstance {
    fn binding(&self, port: Option<usize>) -> *mut f32 {
        port.and_then(|index| self.bindings.get(index).copied())
            .unwrap_or(ptr::null_mut())
    }
}

impl UnitInstance for MockInstance {
    unsafe fn connect_port(&mut self, port: usize, data: *mut f32) {
        if let Some(slot) = self.bindings.get_mut(port) {
            *slot = data;
        }
    }

    fn activate(&mut self) {
        self.log.lock().push(LifecycleEvent::Activated(self.id));
    }

    fn run(&mut self, frames: usize) {
        let input = self.binding(self.input);
        let output = self.binding(self.output);
        if input.is_null() || output.is_null() {
            return;
        }
        let gain = match (self.process, self.binding(self.gain)) {
            (MockProcess::Gain, gain) if !gain.is_null() => unsafe { ptr::read_volatile(gain) },
            _ => 1.0,
        };

        let mut peak = 0.0f32;
        for frame in 0..frames {
            unsafe {
                let sample = *input.add(frame) * gain;
                *output.add(frame) = sample;
                peak = peak.max(sample.abs());
            }
        }
        for &meter in &self.meters {
            let target = self.bindings[meter];
            if !target.is_null() {
                unsafe { ptr::write_volatile(target, peak) };
            }
        }
    }

    fn deactivate(&mut self) {
        self.log.lock().push(LifecycleEvent::Deactivated(self.id));
    }

    fn cleanup(self: Box<Self>) {
        self.log.lock().push(LifecycleEvent::CleanedUp(self.id));
    }
}

impl Drop for MockInstance {
    fn drop(&mut self) {
        self.log.lock().push(LifecycleEvent::Dropped(self.id));
    }
}
