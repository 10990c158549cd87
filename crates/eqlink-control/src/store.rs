use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use eqlink_unit::{
    default_value, PortDirection, PortInfo, PortRole, UnitDescriptor, DEFAULT_SAMPLE_RATE,
};
use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, info, warn};

use crate::error::ControlError;
use crate::layout::{
    file_length, slot_offset, value_offset, ControlHeader, ControlSlotRecord, SlotDirection,
    HEADER_SIZE, MAX_CHANNELS, SLOT_SIZE,
};

#[cfg(unix)]
const FILE_MODE: u32 = 0o664;

/// One control port captured in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSlot {
    pub port_index: usize,
    pub direction: SlotDirection,
}

/// A mapped control file.
///
/// Values are accessed as independent 32-bit cells with relaxed atomic loads and
/// stores. Nothing is locked, and updates spanning several cells (all channels
/// of one control, for instance) are not atomic as a whole. Another process
/// mapping the same file sees writes on its next read.
pub struct ControlFile {
    path: PathBuf,
    header: ControlHeader,
    slots: Vec<ControlSlot>,
    base: NonNull<u8>,
    mmap: MmapMut,
}

// `base` points into `mmap`, which lives as long as the `ControlFile`. All
// access through it goes through atomics or raw pointers handed to the caller.
unsafe impl Send for ControlFile {}
unsafe impl Sync for ControlFile {}

impl ControlFile {
    /// Opens the control file at `path`, creating it with the unit's defaults
    /// when it does not exist yet.
    pub fn open_or_create(
        unit: &dyn UnitDescriptor,
        path: impl AsRef<Path>,
        channels: usize,
    ) -> Result<Self, ControlError> {
        let path = path.as_ref();
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(reject(ControlError::UnsupportedChannels {
                path: path.to_path_buf(),
                channels,
                max: MAX_CHANNELS,
            }));
        }
        let num_controls = unit.control_port_count();
        if num_controls == 0 {
            return Err(reject(ControlError::NoControls {
                path: path.to_path_buf(),
                label: unit.label().to_owned(),
            }));
        }

        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => Self::open_existing(unit, path, file, channels),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Self::create(unit, path, channels)
            }
            Err(err) => Err(reject(ControlError::io(path, err))),
        }
    }

    /// Writes a complete image next to `path` and links it into place, so no
    /// other opener ever sees a partial file. Losing the race to another
    /// creator falls back to opening the winner's file.
    fn create(
        unit: &dyn UnitDescriptor,
        path: &Path,
        channels: usize,
    ) -> Result<Self, ControlError> {
        let image = build_image(unit, path, channels).map_err(reject)?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(".eqlink-");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(FILE_MODE));
        }
        let mut staged = builder
            .tempfile_in(dir)
            .map_err(|err| reject(ControlError::io(path, err)))?;
        staged
            .write_all(&image)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|err| reject(ControlError::io(path, err)))?;

        let file = match staged.persist_noclobber(path) {
            Ok(file) => file,
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "control file created concurrently");
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(|err| reject(ControlError::io(path, err)))?;
                return Self::open_existing(unit, path, file, channels);
            }
            Err(err) => return Err(reject(ControlError::io(path, err.error))),
        };

        let control = Self::map(path, &file, image.len())?;
        info!(
            path = %path.display(),
            unit_id = control.header.unit_id,
            controls = control.header.num_controls,
            channels,
            bytes = control.header.length,
            "created control file"
        );
        Ok(control)
    }

    fn open_existing(
        unit: &dyn UnitDescriptor,
        path: &Path,
        mut file: File,
        channels: usize,
    ) -> Result<Self, ControlError> {
        let actual = file
            .metadata()
            .map_err(|err| reject(ControlError::io(path, err)))?
            .len();
        let expected = file_length(unit.control_port_count(), channels);

        let mut raw = [0u8; HEADER_SIZE];
        let header = match file.read_exact(&mut raw) {
            Ok(()) => ControlHeader::decode(&raw),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(err) => return Err(reject(ControlError::io(path, err))),
        };
        let Some(header) = header else {
            return Err(reject(ControlError::WrongLength {
                path: path.to_path_buf(),
                expected,
                found: actual,
            }));
        };

        if header.unit_id != unit.unique_id() {
            return Err(reject(ControlError::WrongUnit {
                path: path.to_path_buf(),
                expected: unit.unique_id(),
                found: header.unit_id,
            }));
        }
        if header.channels != channels as u64 {
            return Err(reject(ControlError::WrongChannels {
                path: path.to_path_buf(),
                expected: channels,
                found: header.channels,
            }));
        }
        if header.length != expected
            || actual != expected
            || header.num_controls != unit.control_port_count() as u64
        {
            let found = if header.length != expected {
                header.length
            } else if actual != expected {
                actual
            } else {
                // Right size, but for a different control count.
                usize::try_from(header.num_controls)
                    .ok()
                    .filter(|&count| count <= actual as usize)
                    .map(|count| file_length(count, channels))
                    .unwrap_or(u64::MAX)
            };
            return Err(reject(ControlError::WrongLength {
                path: path.to_path_buf(),
                expected,
                found,
            }));
        }

        check_audio_port(unit, path, header.input_index, PortRole::AUDIO_INPUT)?;
        check_audio_port(unit, path, header.output_index, PortRole::AUDIO_OUTPUT)?;

        let control = Self::map(path, &file, expected as usize)?;
        for (slot, entry) in control.slots.iter().enumerate() {
            let valid = unit
                .port(entry.port_index)
                .map(PortInfo::is_control)
                .unwrap_or(false);
            if !valid {
                return Err(reject(ControlError::CorruptSlot {
                    path: path.to_path_buf(),
                    slot,
                    port_index: entry.port_index as i32,
                }));
            }
        }

        debug!(path = %path.display(), unit_id = header.unit_id, "reopened control file");
        Ok(control)
    }

    /// Maps `len` bytes of an already validated file and decodes its slot table.
    fn map(path: &Path, file: &File, len: usize) -> Result<Self, ControlError> {
        let mut mmap = unsafe { MmapOptions::new().len(len).map_mut(file) }
            .map_err(|err| reject(ControlError::io(path, err)))?;

        let corrupt = |slot: usize, port_index: i32| {
            reject(ControlError::CorruptSlot {
                path: path.to_path_buf(),
                slot,
                port_index,
            })
        };

        let header = ControlHeader::decode(&mmap).ok_or_else(|| corrupt(0, -1))?;
        let mut slots = Vec::with_capacity(header.num_controls as usize);
        for slot in 0..header.num_controls as usize {
            let start = slot_offset(slot);
            let record = mmap
                .get(start..start + SLOT_SIZE)
                .and_then(ControlSlotRecord::decode)
                .ok_or_else(|| corrupt(slot, -1))?;
            let direction = SlotDirection::from_raw(record.direction)
                .ok_or_else(|| corrupt(slot, record.port_index))?;
            let port_index = usize::try_from(record.port_index)
                .map_err(|_| corrupt(slot, record.port_index))?;
            slots.push(ControlSlot {
                port_index,
                direction,
            });
        }

        let base = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| corrupt(0, -1))?;
        Ok(Self {
            path: path.to_path_buf(),
            header,
            slots,
            base,
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ControlHeader {
        &self.header
    }

    pub fn unit_id(&self) -> u64 {
        self.header.unit_id
    }

    pub fn channels(&self) -> usize {
        self.header.channels as usize
    }

    pub fn num_controls(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[ControlSlot] {
        &self.slots
    }

    pub fn slot(&self, slot: usize) -> Option<&ControlSlot> {
        self.slots.get(slot)
    }

    /// Port index of the unit's audio input. Validated when the file was opened.
    pub fn input_audio_port(&self) -> usize {
        self.header.input_index as usize
    }

    pub fn output_audio_port(&self) -> usize {
        self.header.output_index as usize
    }

    /// Mapped size in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    fn cell(&self, slot: usize, channel: usize) -> &AtomicU32 {
        assert!(
            slot < self.slots.len(),
            "slot {slot} out of range ({} controls)",
            self.slots.len()
        );
        assert!(
            channel < self.channels(),
            "channel {channel} out of range ({} channels)",
            self.channels()
        );
        unsafe { &*(self.base.as_ptr().add(value_offset(slot, channel)) as *const AtomicU32) }
    }

    /// Reads one native value.
    ///
    /// # Panics
    ///
    /// Panics if `slot` or `channel` is out of range.
    pub fn read(&self, slot: usize, channel: usize) -> f32 {
        f32::from_bits(self.cell(slot, channel).load(Ordering::Relaxed))
    }

    /// Overwrites one native value in place.
    ///
    /// # Panics
    ///
    /// Panics if `slot` or `channel` is out of range.
    pub fn write(&self, slot: usize, channel: usize, value: f32) {
        self.cell(slot, channel)
            .store(value.to_bits(), Ordering::Relaxed);
    }

    /// Address of one value inside the mapping, for binding to a unit port.
    ///
    /// The pointer stays valid for as long as this `ControlFile` is alive.
    ///
    /// # Panics
    ///
    /// Panics if `slot` or `channel` is out of range.
    pub fn value_ptr(&self, slot: usize, channel: usize) -> *mut f32 {
        self.cell(slot, channel).as_ptr() as *mut f32
    }

    /// Flushes outstanding writes to disk.
    pub fn flush(&self) -> Result<(), ControlError> {
        self.mmap
            .flush()
            .map_err(|err| ControlError::io(&self.path, err))
    }

    /// Releases the mapping.
    pub fn close(self) {
        debug!(path = %self.path.display(), "closing control file");
    }
}

impl std::fmt::Debug for ControlFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlFile")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("slots", &self.slots.len())
            .finish()
    }
}

fn reject(err: ControlError) -> ControlError {
    warn!(%err, "control file rejected");
    err
}

fn unique_audio_port(
    unit: &dyn UnitDescriptor,
    path: &Path,
    role: PortRole,
) -> Result<i32, ControlError> {
    let mut matches = unit
        .ports()
        .iter()
        .filter(|port| port.role() == Some(role))
        .map(|port| port.index);
    let direction = role.direction;
    match (matches.next(), matches.count()) {
        (None, _) => Err(ControlError::MissingAudioPort {
            path: path.to_path_buf(),
            direction,
        }),
        (Some(index), 0) => Ok(index as i32),
        (Some(_), extra) => Err(ControlError::AmbiguousAudioPort {
            path: path.to_path_buf(),
            direction,
            count: extra + 1,
        }),
    }
}

fn check_audio_port(
    unit: &dyn UnitDescriptor,
    path: &Path,
    index: i32,
    role: PortRole,
) -> Result<(), ControlError> {
    let valid = usize::try_from(index)
        .map(|index| unit.port_has_role(index, role))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(reject(ControlError::MisassignedAudioPort {
            path: path.to_path_buf(),
            direction: role.direction,
            index,
        }))
    }
}

/// Value stored for a port at creation time.
fn initial_value(port: &PortInfo) -> f32 {
    if let Some(value) = default_value(&port.hint, DEFAULT_SAMPLE_RATE) {
        return value;
    }
    let fallback = if port.flags.is_input() && port.hint.is_bounded_below() {
        port.hint.lower
    } else {
        0.0
    };
    debug!(port = %port.name, fallback, "port declares no usable default");
    fallback
}

/// Serializes a fresh control file for `unit`.
fn build_image(
    unit: &dyn UnitDescriptor,
    path: &Path,
    channels: usize,
) -> Result<Vec<u8>, ControlError> {
    let controls: Vec<&PortInfo> = unit.ports().iter().filter(|port| port.is_control()).collect();
    let length = file_length(controls.len(), channels);

    let header = ControlHeader {
        length,
        unit_id: unit.unique_id(),
        channels: channels as u64,
        num_controls: controls.len() as u64,
        input_index: unique_audio_port(unit, path, PortRole::AUDIO_INPUT)?,
        output_index: unique_audio_port(unit, path, PortRole::AUDIO_OUTPUT)?,
    };

    let mut image = vec![0u8; length as usize];
    image[..HEADER_SIZE].copy_from_slice(&header.encode());
    for (slot, port) in controls.iter().enumerate() {
        let direction = if port.flags.is_input() {
            SlotDirection::Input
        } else {
            SlotDirection::Output
        };
        // Every channel starts from the channel 0 default.
        let record = ControlSlotRecord::new(port.index as i32, direction, initial_value(port));
        let start = slot_offset(slot);
        image[start..start + SLOT_SIZE].copy_from_slice(&record.encode());
    }
    Ok(image)
}

impl From<SlotDirection> for PortDirection {
    fn from(direction: SlotDirection) -> Self {
        match direction {
            SlotDirection::Input => PortDirection::Input,
            SlotDirection::Output => PortDirection::Output,
        }
    }
}
