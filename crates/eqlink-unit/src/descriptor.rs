use std::ffi::CStr;
use std::fmt;
use std::os::raw::{c_char, c_ulong};
use std::sync::Arc;

use crate::error::UnitError;
use crate::ffi::{LADSPA_Data, LADSPA_Descriptor, LADSPA_Handle};
use crate::library::UnitLibrary;
use crate::port::{PortFlags, PortInfo, PortRole, RangeHint};

/// Optional lifecycle operations a unit provides. Queried once when the unit is
/// loaded instead of on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub activate: bool,
    pub deactivate: bool,
    pub cleanup: bool,
}

/// Metadata and instance factory for one processing unit.
pub trait UnitDescriptor: Send + Sync {
    fn unique_id(&self) -> u64;
    fn label(&self) -> &str;
    fn name(&self) -> &str;
    fn ports(&self) -> &[PortInfo];
    fn capabilities(&self) -> Capabilities;
    fn instantiate(&self, sample_rate: u32) -> Result<Box<dyn UnitInstance>, UnitError>;

    fn port(&self, index: usize) -> Option<&PortInfo> {
        self.ports().get(index)
    }

    fn control_port_count(&self) -> usize {
        self.ports().iter().filter(|port| port.is_control()).count()
    }

    /// True when `index` names a port with exactly the given role.
    fn port_has_role(&self, index: usize, role: PortRole) -> bool {
        self.port(index).and_then(PortInfo::role) == Some(role)
    }
}

/// A running instance of a processing unit.
///
/// `activate`, `deactivate` and `cleanup` may only be called when the matching
/// [`Capabilities`] flag of the owning descriptor is set.
pub trait UnitInstance: Send {
    /// Binds `port` to the memory at `data`.
    ///
    /// # Safety
    ///
    /// `data` must point to enough valid `f32`s for every subsequent `run` call
    /// (one for control ports, one per frame for audio ports) and must stay
    /// valid until the port is rebound or the instance is dropped.
    unsafe fn connect_port(&mut self, port: usize, data: *mut f32);

    fn activate(&mut self);

    /// Processes `frames` samples on every connected port.
    fn run(&mut self, frames: usize);

    fn deactivate(&mut self);

    /// Releases the instance through the unit's own cleanup operation.
    fn cleanup(self: Box<Self>);
}

type InstantiateFn = unsafe extern "C" fn(*const LADSPA_Descriptor, c_ulong) -> LADSPA_Handle;
type ConnectPortFn = unsafe extern "C" fn(LADSPA_Handle, c_ulong, *mut LADSPA_Data);
type RunFn = unsafe extern "C" fn(LADSPA_Handle, c_ulong);
type LifecycleFn = unsafe extern "C" fn(LADSPA_Handle);

/// Entry points of one descriptor, resolved when the unit is loaded.
#[derive(Clone, Copy)]
struct Callbacks {
    instantiate: InstantiateFn,
    connect_port: ConnectPortFn,
    run: RunFn,
    activate: Option<LifecycleFn>,
    deactivate: Option<LifecycleFn>,
    cleanup: Option<LifecycleFn>,
}

impl Callbacks {
    fn resolve(descriptor: &LADSPA_Descriptor, label: &str) -> Result<Self, UnitError> {
        let missing = |name: &str| UnitError::invalid_descriptor(label, format!("missing {name}()"));
        Ok(Self {
            instantiate: descriptor.instantiate.ok_or_else(|| missing("instantiate"))?,
            connect_port: descriptor.connect_port.ok_or_else(|| missing("connect_port"))?,
            run: descriptor.run.ok_or_else(|| missing("run"))?,
            activate: descriptor.activate,
            deactivate: descriptor.deactivate,
            cleanup: descriptor.cleanup,
        })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            activate: self.activate.is_some(),
            deactivate: self.deactivate.is_some(),
            cleanup: self.cleanup.is_some(),
        }
    }
}

/// A unit located inside a loaded LADSPA library.
pub struct LadspaUnit {
    library: Arc<UnitLibrary>,
    raw: *const LADSPA_Descriptor,
    callbacks: Callbacks,
    unique_id: u64,
    label: String,
    name: String,
    maker: String,
    ports: Vec<PortInfo>,
}

unsafe impl Send for LadspaUnit {}
unsafe impl Sync for LadspaUnit {}

impl LadspaUnit {
    /// Builds a safe view of a raw descriptor exported by `library`.
    ///
    /// # Safety
    ///
    /// `raw` must be a non-null descriptor returned by the library's
    /// `ladspa_descriptor` entry point.
    pub(crate) unsafe fn from_raw(
        library: Arc<UnitLibrary>,
        raw: *const LADSPA_Descriptor,
    ) -> Result<Self, UnitError> {
        let descriptor = unsafe { &*raw };
        let label = unsafe { c_string(descriptor.Label) };

        let callbacks = Callbacks::resolve(descriptor, &label)?;

        let count = descriptor.PortCount as usize;
        if count > 0
            && (descriptor.PortDescriptors.is_null()
                || descriptor.PortNames.is_null()
                || descriptor.PortRangeHints.is_null())
        {
            return Err(UnitError::invalid_descriptor(&label, "port tables are missing"));
        }

        let mut ports = Vec::with_capacity(count);
        for index in 0..count {
            let (flags, name, hint) = unsafe {
                (
                    *descriptor.PortDescriptors.add(index),
                    c_string(*descriptor.PortNames.add(index)),
                    *descriptor.PortRangeHints.add(index),
                )
            };
            ports.push(PortInfo::new(index, name, PortFlags(flags), RangeHint::from(hint)));
        }

        Ok(Self {
            library,
            raw,
            callbacks,
            unique_id: descriptor.UniqueID as u64,
            name: unsafe { c_string(descriptor.Name) },
            maker: unsafe { c_string(descriptor.Maker) },
            label,
            ports,
        })
    }

    pub fn maker(&self) -> &str {
        &self.maker
    }

    pub fn library(&self) -> &Arc<UnitLibrary> {
        &self.library
    }
}

impl UnitDescriptor for LadspaUnit {
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
        self.callbacks.capabilities()
    }

    fn instantiate(&self, sample_rate: u32) -> Result<Box<dyn UnitInstance>, UnitError> {
        let handle = unsafe { (self.callbacks.instantiate)(self.raw, sample_rate as c_ulong) };
        if handle.is_null() {
            return Err(UnitError::InstantiateFailed {
                label: self.label.clone(),
                sample_rate,
            });
        }
        Ok(Box::new(LadspaInstance {
            _library: Arc::clone(&self.library),
            callbacks: self.callbacks,
            handle,
        }))
    }
}

impl fmt::Debug for LadspaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LadspaUnit")
            .field("library", &self.library.path())
            .field("unique_id", &self.unique_id)
            .field("label", &self.label)
            .field("ports", &self.ports.len())
            .finish()
    }
}

/// An instance handle created by a [`LadspaUnit`].
///
/// Dropping the instance does not call the unit's `cleanup`; that only happens
/// through [`UnitInstance::cleanup`].
pub struct LadspaInstance {
    _library: Arc<UnitLibrary>,
    callbacks: Callbacks,
    handle: LADSPA_Handle,
}

unsafe impl Send for LadspaInstance {}

impl UnitInstance for LadspaInstance {
    unsafe fn connect_port(&mut self, port: usize, data: *mut f32) {
        unsafe { (self.callbacks.connect_port)(self.handle, port as c_ulong, data) };
    }

    fn activate(&mut self) {
        if let Some(activate) = self.callbacks.activate {
            unsafe { activate(self.handle) };
        }
    }

    fn run(&mut self, frames: usize) {
        unsafe { (self.callbacks.run)(self.handle, frames as c_ulong) };
    }

    fn deactivate(&mut self) {
        if let Some(deactivate) = self.callbacks.deactivate {
            unsafe { deactivate(self.handle) };
        }
    }

    fn cleanup(self: Box<Self>) {
        if let Some(cleanup) = self.callbacks.cleanup {
            unsafe { cleanup(self.handle) };
        }
    }
}

unsafe fn c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
