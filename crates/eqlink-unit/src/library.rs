use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_ulong;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use tracing::debug;

use crate::descriptor::LadspaUnit;
use crate::error::UnitError;
use crate::ffi::{LADSPA_Descriptor, LADSPA_Descriptor_Function, LADSPA_DESCRIPTOR_SYMBOL};

/// Environment variable listing the directories searched for relative library names.
pub const SEARCH_PATH_VAR: &str = "LADSPA_PATH";

/// A loaded LADSPA shared library.
///
/// The library is shared through an `Arc` by every unit and instance derived
/// from it, so it is unloaded exactly once, after the last of them is dropped.
pub struct UnitLibrary {
    path: PathBuf,
    // Only `None` for entry points compiled into the test binary.
    _library: Option<Library>,
    entry: LADSPA_Descriptor_Function,
}

unsafe impl Send for UnitLibrary {}
unsafe impl Sync for UnitLibrary {}

impl UnitLibrary {
    /// Loads a library by name, searching `LADSPA_PATH` for relative names.
    pub fn load(name: impl AsRef<Path>) -> Result<Arc<Self>, UnitError> {
        let search_path = std::env::var(SEARCH_PATH_VAR).ok();
        Self::load_with_search_path(name, search_path.as_deref())
    }

    /// Loads a library using an explicit colon separated search path.
    pub fn load_with_search_path(
        name: impl AsRef<Path>,
        search_path: Option<&str>,
    ) -> Result<Arc<Self>, UnitError> {
        let name = name.as_ref();

        for candidate in search_candidates(name, search_path) {
            match unsafe { Library::new(&candidate) } {
                Ok(library) => {
                    debug!(path = %candidate.display(), "loaded LADSPA library");
                    return Self::from_library(candidate, library).map(Arc::new);
                }
                Err(err) => {
                    debug!(path = %candidate.display(), ?err, "LADSPA library candidate rejected");
                }
            }
        }

        // Last resort: hand the bare name to the dynamic loader so the reported
        // error is the one for what the caller actually asked for.
        match unsafe { Library::new(name) } {
            Ok(library) => Self::from_library(name.to_path_buf(), library).map(Arc::new),
            Err(source) => Err(UnitError::LibraryNotFound {
                name: name.display().to_string(),
                source,
            }),
        }
    }

    fn from_library(path: PathBuf, library: Library) -> Result<Self, UnitError> {
        let entry = unsafe {
            library
                .get::<LADSPA_Descriptor_Function>(LADSPA_DESCRIPTOR_SYMBOL)
                .map(|symbol| *symbol)
        }
        .map_err(|source| UnitError::MissingEntryPoint {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            _library: Some(library),
            entry,
        })
    }

    /// Wraps an entry point that lives in the current binary.
    #[cfg(test)]
    pub(crate) fn from_entry(
        path: impl Into<PathBuf>,
        entry: LADSPA_Descriptor_Function,
    ) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            _library: None,
            entry,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn descriptor_at(&self, index: usize) -> *const LADSPA_Descriptor {
        unsafe { (self.entry)(index as c_ulong) }
    }

    /// Labels of every unit exported by the library, in export order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        for index in 0.. {
            let raw = self.descriptor_at(index);
            if raw.is_null() {
                break;
            }
            let label = unsafe { (*raw).Label };
            if !label.is_null() {
                labels.push(unsafe { CStr::from_ptr(label) }.to_string_lossy().into_owned());
            }
        }
        labels
    }

    /// Finds a unit by label. The first exported unit with a matching label wins.
    pub fn find(self: &Arc<Self>, label: &str) -> Result<LadspaUnit, UnitError> {
        for index in 0.. {
            let raw = self.descriptor_at(index);
            if raw.is_null() {
                break;
            }
            let raw_label = unsafe { (*raw).Label };
            if raw_label.is_null() {
                continue;
            }
            if unsafe { CStr::from_ptr(raw_label) }.to_bytes() == label.as_bytes() {
                return unsafe { LadspaUnit::from_raw(Arc::clone(self), raw) };
            }
        }

        Err(UnitError::LabelNotFound {
            label: label.to_owned(),
            path: self.path.clone(),
        })
    }
}

impl fmt::Debug for UnitLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitLibrary")
            .field("path", &self.path)
            .finish()
    }
}

/// Paths tried, in order, before falling back to the bare name.
///
/// Absolute names are tried as given; relative names are joined with each
/// search directory. Names without a `.so` suffix are then retried with the
/// suffix appended.
pub fn search_candidates(name: &Path, search_path: Option<&str>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    push_search_candidates(name, search_path, &mut candidates);

    let has_suffix = name
        .to_str()
        .map(|text| text.len() > 3 && text.ends_with(".so"))
        .unwrap_or(false);
    if !has_suffix {
        let mut with_suffix = name.as_os_str().to_owned();
        with_suffix.push(".so");
        let with_suffix = PathBuf::from(with_suffix);
        push_search_candidates(&with_suffix, search_path, &mut candidates);
        if !with_suffix.is_absolute() {
            candidates.push(with_suffix);
        }
    }

    candidates
}

fn push_search_candidates(name: &Path, search_path: Option<&str>, candidates: &mut Vec<PathBuf>) {
    if name.is_absolute() {
        candidates.push(name.to_path_buf());
        return;
    }
    let Some(search_path) = search_path else {
        return;
    };
    for dir in search_path.split(':').filter(|dir| !dir.is_empty()) {
        candidates.push(Path::new(dir).join(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::os::raw::c_char;
    use std::ptr;

    use pretty_assertions::assert_eq;

    use crate::descriptor::{Capabilities, UnitDescriptor};
    use crate::ffi::*;

    struct Exported(LADSPA_Descriptor);
    unsafe impl Sync for Exported {}

    struct PortNames([*const c_char; 4]);
    unsafe impl Sync for PortNames {}

    static GAIN_PORTS: [LADSPA_PortDescriptor; 4] = [
        LADSPA_PORT_INPUT | LADSPA_PORT_AUDIO,
        LADSPA_PORT_OUTPUT | LADSPA_PORT_AUDIO,
        LADSPA_PORT_INPUT | LADSPA_PORT_CONTROL,
        LADSPA_PORT_OUTPUT | LADSPA_PORT_CONTROL,
    ];
    static GAIN_NAMES: PortNames = PortNames([
        c"in".as_ptr(),
        c"out".as_ptr(),
        c"Gain".as_ptr(),
        c"Active".as_ptr(),
    ]);
    static GAIN_HINTS: [LADSPA_PortRangeHint; 4] = [
        LADSPA_PortRangeHint {
            HintDescriptor: 0,
            LowerBound: 0.0,
            UpperBound: 0.0,
        },
        LADSPA_PortRangeHint {
            HintDescriptor: 0,
            LowerBound: 0.0,
            UpperBound: 0.0,
        },
        LADSPA_PortRangeHint {
            HintDescriptor: LADSPA_HINT_BOUNDED_BELOW
                | LADSPA_HINT_BOUNDED_ABOVE
                | LADSPA_HINT_DEFAULT_1,
            LowerBound: 0.0,
            UpperBound: 4.0,
        },
        LADSPA_PortRangeHint {
            HintDescriptor: 0,
            LowerBound: 0.0,
            UpperBound: 0.0,
        },
    ];

    /// Per-instance state of the in-process gain unit.
    struct GainState {
        ports: [*mut f32; 4],
        active: bool,
    }

    unsafe extern "C" fn gain_instantiate(
        _descriptor: *const LADSPA_Descriptor,
        sample_rate: c_ulong,
    ) -> LADSPA_Handle {
        if sample_rate == 0 {
            return ptr::null_mut();
        }
        let state = Box::new(GainState {
            ports: [ptr::null_mut(); 4],
            active: false,
        });
        Box::into_raw(state).cast()
    }

    unsafe extern "C" fn gain_connect_port(handle: LADSPA_Handle, port: c_ulong, data: *mut f32) {
        let state = unsafe { &mut *handle.cast::<GainState>() };
        if let Some(slot) = state.ports.get_mut(port as usize) {
            *slot = data;
        }
    }

    unsafe extern "C" fn gain_activate(handle: LADSPA_Handle) {
        unsafe { (*handle.cast::<GainState>()).active = true };
    }

    unsafe extern "C" fn gain_deactivate(handle: LADSPA_Handle) {
        unsafe { (*handle.cast::<GainState>()).active = false };
    }

    // Output = input * Gain; the Active port reports the activation state.
    unsafe extern "C" fn gain_run(handle: LADSPA_Handle, frames: c_ulong) {
        let state = unsafe { &*handle.cast::<GainState>() };
        let [input, output, gain, active] = state.ports;
        unsafe {
            for frame in 0..frames as usize {
                *output.add(frame) = *input.add(frame) * *gain;
            }
            *active = if state.active { 1.0 } else { 0.0 };
        }
    }

    unsafe extern "C" fn gain_cleanup(handle: LADSPA_Handle) {
        drop(unsafe { Box::from_raw(handle.cast::<GainState>()) });
    }

    macro_rules! exported {
        ($id:expr, $label:expr, run: $run:expr, lifecycle: $lifecycle:expr) => {
            Exported(LADSPA_Descriptor {
                UniqueID: $id,
                Label: $label.as_ptr(),
                Properties: LADSPA_PROPERTY_HARD_RT_CAPABLE,
                Name: c"Fixture Gain".as_ptr(),
                Maker: c"eqlink".as_ptr(),
                Copyright: ptr::null(),
                PortCount: 4,
                PortDescriptors: GAIN_PORTS.as_ptr(),
                PortNames: GAIN_NAMES.0.as_ptr(),
                PortRangeHints: GAIN_HINTS.as_ptr(),
                ImplementationData: ptr::null_mut(),
                instantiate: Some(gain_instantiate),
                connect_port: Some(gain_connect_port),
                activate: if $lifecycle { Some(gain_activate) } else { None },
                run: $run,
                run_adding: None,
                set_run_adding_gain: None,
                deactivate: if $lifecycle { Some(gain_deactivate) } else { None },
                cleanup: if $lifecycle { Some(gain_cleanup) } else { None },
            })
        };
    }

    static GAIN: Exported = exported!(11, c"gain", run: Some(gain_run), lifecycle: true);
    static BROKEN: Exported = exported!(12, c"broken", run: None, lifecycle: true);
    static SHADOW: Exported = exported!(13, c"gain", run: Some(gain_run), lifecycle: true);
    static BARE: Exported = exported!(14, c"bare", run: Some(gain_run), lifecycle: false);

    unsafe extern "C" fn ladspa_descriptor(index: c_ulong) -> *const LADSPA_Descriptor {
        let exported = match index {
            0 => &GAIN,
            1 => &BROKEN,
            2 => &SHADOW,
            3 => &BARE,
            _ => return ptr::null(),
        };
        &exported.0
    }

    fn fixtures() -> Arc<UnitLibrary> {
        UnitLibrary::from_entry("/fixtures/gain.so", ladspa_descriptor)
    }

    #[test]
    fn labels_follow_export_order() {
        assert_eq!(fixtures().labels(), ["gain", "broken", "gain", "bare"]);
    }

    #[test]
    fn first_unit_with_the_label_wins() {
        let unit = fixtures().find("gain").expect("gain");
        assert_eq!(unit.unique_id(), 11);
        assert_eq!(unit.name(), "Fixture Gain");
        assert_eq!(unit.maker(), "eqlink");
        let names: Vec<_> = unit.ports().iter().map(|port| port.name.as_str()).collect();
        assert_eq!(names, ["in", "out", "Gain", "Active"]);
        assert_eq!(unit.control_port_count(), 2);
        assert_eq!(unit.library().path(), Path::new("/fixtures/gain.so"));
    }

    #[test]
    fn unknown_label_names_label_and_library() {
        let err = fixtures().find("Eq10").expect_err("no such label");
        match &err {
            UnitError::LabelNotFound { label, path } => {
                assert_eq!(label, "Eq10");
                assert_eq!(path, Path::new("/fixtures/gain.so"));
            }
            other => panic!("unexpected error: {other}"),
        }
        let message = err.to_string();
        assert!(message.contains("Eq10") && message.contains("/fixtures/gain.so"));
    }

    #[test]
    fn descriptor_without_run_is_unusable() {
        let err = fixtures().find("broken").expect_err("missing run");
        match err {
            UnitError::InvalidDescriptor { label, reason } => {
                assert_eq!(label, "broken");
                assert_eq!(reason, "missing run()");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn capabilities_mirror_optional_callbacks() {
        let library = fixtures();
        assert_eq!(
            library.find("gain").expect("gain").capabilities(),
            Capabilities {
                activate: true,
                deactivate: true,
                cleanup: true,
            }
        );
        assert_eq!(
            library.find("bare").expect("bare").capabilities(),
            Capabilities::default()
        );
    }

    #[test]
    fn instance_calls_reach_the_unit() {
        let unit = fixtures().find("gain").expect("gain");
        let mut instance = unit.instantiate(48_000).expect("instantiate");

        let mut input = [1.0f32, 2.0, 3.0, 4.0];
        let mut output = [0.0f32; 4];
        let mut gain = 0.5f32;
        let mut active = -1.0f32;
        unsafe {
            instance.connect_port(0, input.as_mut_ptr());
            instance.connect_port(1, output.as_mut_ptr());
            instance.connect_port(2, &mut gain);
            instance.connect_port(3, &mut active);
        }

        instance.activate();
        instance.run(4);
        assert_eq!(output, [0.5, 1.0, 1.5, 2.0]);
        assert_eq!(active, 1.0);

        instance.deactivate();
        instance.run(0);
        assert_eq!(active, 0.0);
        instance.cleanup();
    }

    #[test]
    fn null_handle_is_an_instantiation_failure() {
        let unit = fixtures().find("gain").expect("gain");
        let err = unit.instantiate(0).err().expect("null handle");
        assert!(matches!(
            err,
            UnitError::InstantiateFailed { ref label, sample_rate: 0 } if label == "gain"
        ));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn label_lookup_compares_whole_strings() {
        let label = unsafe { CStr::from_ptr(GAIN.0.Label) };
        assert_eq!(label.to_bytes(), b"gain");
        assert!(matches!(
            fixtures().find("gai"),
            Err(UnitError::LabelNotFound { .. })
        ));
    }

    #[test]
    fn absolute_library_with_suffix_is_tried_directly() {
        let name = Path::new("/usr/lib/ladspa/caps.so");
        assert_eq!(
            search_candidates(name, Some("/ignored")),
            vec![PathBuf::from("/usr/lib/ladspa/caps.so")]
        );
    }

    #[test]
    fn relative_library_walks_search_path_then_suffix() {
        let name = Path::new("caps");
        assert_eq!(
            search_candidates(name, Some("/opt/ladspa::/usr/lib/ladspa/")),
            vec![
                PathBuf::from("/opt/ladspa/caps"),
                PathBuf::from("/usr/lib/ladspa/caps"),
                PathBuf::from("/opt/ladspa/caps.so"),
                PathBuf::from("/usr/lib/ladspa/caps.so"),
                PathBuf::from("caps.so"),
            ]
        );
    }

    #[test]
    fn relative_library_without_search_path() {
        assert_eq!(
            search_candidates(Path::new("caps.so"), None),
            Vec::<PathBuf>::new()
        );
    }

    #[test]
    fn missing_library_names_the_request() {
        let err = UnitLibrary::load_with_search_path("/nonexistent/eqlink-missing.so", None)
            .expect_err("library must not load");
        assert!(matches!(err, UnitError::LibraryNotFound { .. }));
        assert!(err.to_string().contains("/nonexistent/eqlink-missing.so"));
        assert!(err.is_unavailable());
    }
}
