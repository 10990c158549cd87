//! Bit-exact schema of the shared control file.
//!
//! The file is a native-endian image of two C structs: a fixed header followed
//! by one slot record per control port. Each slot reserves room for
//! [`MAX_CHANNELS`] values regardless of how many channels are in use.
//!
//! The stored `length` field doubles as a version check. It keeps a trailing
//! `num_controls * channels * 4` term that older writers always included, so the
//! file is slightly larger than the records it holds.

use std::mem::{offset_of, size_of};

/// Per-slot channel capacity.
pub const MAX_CHANNELS: usize = 16;

pub const DIRECTION_INPUT: i32 = 0;
pub const DIRECTION_OUTPUT: i32 = 1;

/// Sentinel stored for an audio port index that has not been resolved.
pub const UNRESOLVED_PORT: i32 = -1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    pub length: u64,
    pub unit_id: u64,
    pub channels: u64,
    pub num_controls: u64,
    pub input_index: i32,
    pub output_index: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSlotRecord {
    pub port_index: i32,
    pub values: [f32; MAX_CHANNELS],
    pub direction: i32,
}

pub const HEADER_SIZE: usize = size_of::<ControlHeader>();
pub const SLOT_SIZE: usize = size_of::<ControlSlotRecord>();

const _: () = assert!(HEADER_SIZE == 40);
const _: () = assert!(SLOT_SIZE == 72);

const VALUES_OFFSET: usize = offset_of!(ControlSlotRecord, values);

/// Whether a slot is tunable from outside or produced by the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotDirection {
    Input,
    Output,
}

impl SlotDirection {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            DIRECTION_INPUT => Some(Self::Input),
            DIRECTION_OUTPUT => Some(Self::Output),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Input => DIRECTION_INPUT,
            Self::Output => DIRECTION_OUTPUT,
        }
    }
}

/// Size a control file must have for the given shape.
pub fn file_length(num_controls: usize, channels: usize) -> u64 {
    let records = HEADER_SIZE + num_controls * SLOT_SIZE;
    let trailing = num_controls * size_of::<f32>() * channels;
    (records + trailing) as u64
}

pub fn slot_offset(slot: usize) -> usize {
    HEADER_SIZE + slot * SLOT_SIZE
}

/// Byte offset of one channel value. Always 4-byte aligned.
pub fn value_offset(slot: usize, channel: usize) -> usize {
    slot_offset(slot) + VALUES_OFFSET + channel * size_of::<f32>()
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.at..self.at + N]);
        self.at += N;
        out
    }
}

impl ControlHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[offset_of!(Self, length)..][..8].copy_from_slice(&self.length.to_ne_bytes());
        out[offset_of!(Self, unit_id)..][..8].copy_from_slice(&self.unit_id.to_ne_bytes());
        out[offset_of!(Self, channels)..][..8].copy_from_slice(&self.channels.to_ne_bytes());
        out[offset_of!(Self, num_controls)..][..8]
            .copy_from_slice(&self.num_controls.to_ne_bytes());
        out[offset_of!(Self, input_index)..][..4]
            .copy_from_slice(&self.input_index.to_ne_bytes());
        out[offset_of!(Self, output_index)..][..4]
            .copy_from_slice(&self.output_index.to_ne_bytes());
        out
    }

    /// Decodes a header from the first [`HEADER_SIZE`] bytes, or `None` if too short.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let mut cursor = Cursor { bytes, at: 0 };
        Some(Self {
            length: u64::from_ne_bytes(cursor.take()),
            unit_id: u64::from_ne_bytes(cursor.take()),
            channels: u64::from_ne_bytes(cursor.take()),
            num_controls: u64::from_ne_bytes(cursor.take()),
            input_index: i32::from_ne_bytes(cursor.take()),
            output_index: i32::from_ne_bytes(cursor.take()),
        })
    }
}

impl ControlSlotRecord {
    pub fn new(port_index: i32, direction: SlotDirection, value: f32) -> Self {
        Self {
            port_index,
            values: [value; MAX_CHANNELS],
            direction: direction.to_raw(),
        }
    }

    pub fn encode(&self) -> [u8; SLOT_SIZE] {
        let mut out = [0u8; SLOT_SIZE];
        out[..4].copy_from_slice(&self.port_index.to_ne_bytes());
        for (channel, value) in self.values.iter().enumerate() {
            let at = VALUES_OFFSET + channel * 4;
            out[at..at + 4].copy_from_slice(&value.to_ne_bytes());
        }
        out[offset_of!(Self, direction)..].copy_from_slice(&self.direction.to_ne_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SLOT_SIZE {
            return None;
        }
        let mut cursor = Cursor { bytes, at: 0 };
        let port_index = i32::from_ne_bytes(cursor.take());
        let mut values = [0.0f32; MAX_CHANNELS];
        for value in &mut values {
            *value = f32::from_ne_bytes(cursor.take());
        }
        let direction = i32::from_ne_bytes(cursor.take());
        Some(Self {
            port_index,
            values,
            direction,
        })
    }
}
