//! Image format types and constants.
//!
//! Defines the fixed 72-byte header and the shared constants every record
//! layout depends on. All multi-byte integers are little-endian.

use std::io::Write;

use crate::error::OpenError;

// ── Constants ──────────────────────────────────────────────────────

/// Magic bytes at the start of every image.
pub const MAGIC: [u8; 4] = *b"RDEX";

/// Format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 72;

/// SHA-1 digest length.
pub const SHA1_LEN: usize = 20;

/// Size of one size-index bucket: start u32 + end u32.
pub const SIZE_BUCKET_SIZE: usize = 8;

/// "None" for 24-bit references (machine, ROM, name, string).
pub const NONE_U24: u32 = 0x00FF_FFFF;

/// "None" for 16-bit manufacturer references.
pub const NONE_U16: u16 = 0xFFFF;

/// Largest table addressable by a 24-bit reference (sentinel excluded).
pub const MAX_U24_ENTRIES: usize = NONE_U24 as usize;

/// Largest manufacturer table (sentinel excluded).
pub const MAX_U16_ENTRIES: usize = NONE_U16 as usize;

/// Largest exponent a ROM size can have (sizes are u32 on the wire upstream).
pub const MAX_SIZE_EXPONENT: u8 = 31;

pub type Sha1 = [u8; SHA1_LEN];

// ── Typed indices ──────────────────────────────────────────────────

macro_rules! dense_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

dense_id!(
    /// Dense index into the ROM table.
    RomId
);
dense_id!(
    /// Dense index into the machine table.
    MachineId
);
dense_id!(
    /// Dense index into the ROM-name table.
    NameId
);
dense_id!(
    /// Dense index into the manufacturer table.
    ManufacturerId
);

// ── 24-bit helpers ─────────────────────────────────────────────────

/// Write the low 24 bits of `value` (little-endian).
pub fn write_u24<W: Write>(writer: &mut W, value: u32) -> std::io::Result<()> {
    debug_assert!(value <= NONE_U24, "value exceeds 24 bits");
    writer.write_all(&value.to_le_bytes()[..3])
}

/// Read a 24-bit little-endian value from the first three bytes.
#[inline]
pub fn u24_from(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

/// Map an optional 24-bit reference to its wire value.
#[inline]
pub fn opt_u24(value: Option<u32>) -> u32 {
    value.unwrap_or(NONE_U24)
}

/// Map a 24-bit wire value back to an optional reference.
#[inline]
pub fn u24_opt(value: u32) -> Option<u32> {
    (value != NONE_U24).then_some(value)
}

// ── Header ─────────────────────────────────────────────────────────

/// Image header, exactly 72 bytes.
///
/// ```text
/// Offset  Size  Field
/// 0       4     magic: b"RDEX"
/// 4       2     version: u16 = 1
/// 6       1     min_size_exponent: u8
/// 7       1     max_size_exponent: u8
/// 8       4     manufacturer_count: u32
/// 12      4     machine_count: u32
/// 16      4     rom_count: u32
/// 20      4     rom_name_count: u32
/// 24      4     association_count: u32
/// 28      4     string_count: u32
/// 32      4     size_index_offset: u32
/// 36      4     roms_offset: u32
/// 40      4     machines_offset: u32
/// 44      4     associations_offset: u32
/// 48      4     manufacturers_offset: u32
/// 52      4     rom_names_offset: u32
/// 56      4     strings_offset: u32
/// 60      4     descriptions_offset: u32
/// 64      4     descriptions_len: u32
/// 68      4     image_len: u32
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub min_size_exponent: u8,
    pub max_size_exponent: u8,
    pub manufacturer_count: u32,
    pub machine_count: u32,
    pub rom_count: u32,
    pub rom_name_count: u32,
    pub association_count: u32,
    pub string_count: u32,
    pub size_index_offset: u32,
    pub roms_offset: u32,
    pub machines_offset: u32,
    pub associations_offset: u32,
    pub manufacturers_offset: u32,
    pub rom_names_offset: u32,
    pub strings_offset: u32,
    pub descriptions_offset: u32,
    pub descriptions_len: u32,
    pub image_len: u32,
}

impl ImageHeader {
    /// Number of size-index buckets. Zero when the image holds no ROMs.
    pub fn bucket_count(&self) -> usize {
        if self.rom_count == 0 {
            0
        } else {
            usize::from(self.max_size_exponent.saturating_sub(self.min_size_exponent)) + 1
        }
    }

    /// Validate identity fields only (magic + version).
    pub fn validate(&self) -> Result<(), OpenError> {
        if self.magic != MAGIC {
            return Err(OpenError::BadMagic { found: self.magic });
        }
        if self.version != FORMAT_VERSION {
            return Err(OpenError::UnsupportedVersion {
                found: self.version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(())
    }

    /// Parse and validate a header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OpenError> {
        let buf: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(OpenError::Truncated {
                needed: HEADER_SIZE,
                actual: bytes.len(),
            })?;

        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        let header = Self {
            magic: [buf[0], buf[1], buf[2], buf[3]],
            version: u16::from_le_bytes([buf[4], buf[5]]),
            min_size_exponent: buf[6],
            max_size_exponent: buf[7],
            manufacturer_count: u32_at(8),
            machine_count: u32_at(12),
            rom_count: u32_at(16),
            rom_name_count: u32_at(20),
            association_count: u32_at(24),
            string_count: u32_at(28),
            size_index_offset: u32_at(32),
            roms_offset: u32_at(36),
            machines_offset: u32_at(40),
            associations_offset: u32_at(44),
            manufacturers_offset: u32_at(48),
            rom_names_offset: u32_at(52),
            strings_offset: u32_at(56),
            descriptions_offset: u32_at(60),
            descriptions_len: u32_at(64),
            image_len: u32_at(68),
        };
        header.validate()?;
        Ok(header)
    }

    /// Write header to writer (exactly HEADER_SIZE bytes).
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&[self.min_size_exponent, self.max_size_exponent])?;
        for value in [
            self.manufacturer_count,
            self.machine_count,
            self.rom_count,
            self.rom_name_count,
            self.association_count,
            self.string_count,
            self.size_index_offset,
            self.roms_offset,
            self.machines_offset,
            self.associations_offset,
            self.manufacturers_offset,
            self.rom_names_offset,
            self.strings_offset,
            self.descriptions_offset,
            self.descriptions_len,
            self.image_len,
        ] {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }
}

// ── Size Index ─────────────────────────────────────────────────────

/// Half-open range of ROM indices sharing one size exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeBucket {
    pub start: u32,
    pub end: u32,
}

impl SizeBucket {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.start.to_le_bytes())?;
        writer.write_all(&self.end.to_le_bytes())
    }

    pub fn decode(buf: &[u8; SIZE_BUCKET_SIZE]) -> Self {
        Self {
            start: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            end: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Base-2 exponent of a power-of-two size, or `None` for anything else.
pub fn size_exponent(size: u64) -> Option<u8> {
    if size.is_power_of_two() {
        Some(size.trailing_zeros() as u8)
    } else {
        None
    }
}
