//! Fixed-width record layouts.
//!
//! Every table in the image is an array of one of these records. Records are
//! pointer-free: references are dense indices into other tables, with the
//! 24-bit (or 16-bit) all-ones pattern meaning "none".
//!
//! # ROM record (28 bytes)
//!
//! ```text
//! Offset  Size  Field
//! 0       20    sha1
//! 20      4     crc32: u32
//! 24      1     size_exponent: u8
//! 25      3     name: u24 (RomName index)
//! ```
//!
//! # Machine record (21 bytes)
//!
//! ```text
//! Offset  Size  Field
//! 0       3     name: u24 (string index)
//! 3       4     desc_offset: u32 (into descriptions blob)
//! 7       2     desc_len: u16 (compressed)
//! 9       2     desc_original_len: u16
//! 11      2     year: u16 (0 = unknown)
//! 13      2     manufacturer: u16
//! 15      3     clone_of: u24 (machine index)
//! 18      3     rom_of: u24 (machine index)
//! ```
//!
//! # Association record (9 bytes)
//!
//! ```text
//! Offset  Size  Field
//! 0       3     machine: u24
//! 3       3     rom: u24
//! 6       3     name: u24 (RomName index)
//! ```
//!
//! Manufacturer and RomName records are a single u24 string index (3 bytes).

use std::io::Write;

use crate::format::types::{
    u24_from, write_u24, Sha1, NONE_U16, NONE_U24, SHA1_LEN,
};

pub const ROM_RECORD_SIZE: usize = 28;
pub const MACHINE_RECORD_SIZE: usize = 21;
pub const ASSOCIATION_RECORD_SIZE: usize = 9;
pub const NAME_RECORD_SIZE: usize = 3;

// ── ROM ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomRecord {
    pub sha1: Sha1,
    pub crc32: u32,
    pub size_exponent: u8,
    /// Canonical RomName index, or `NONE_U24`.
    pub name: u32,
}

impl RomRecord {
    /// Search key: (size exponent, SHA-1).
    pub fn key(&self) -> (u8, &Sha1) {
        (self.size_exponent, &self.sha1)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.sha1)?;
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&[self.size_exponent])?;
        write_u24(w, self.name)
    }

    pub fn decode(buf: &[u8; ROM_RECORD_SIZE]) -> Self {
        let mut sha1 = [0u8; SHA1_LEN];
        sha1.copy_from_slice(&buf[..SHA1_LEN]);
        Self {
            sha1,
            crc32: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
            size_exponent: buf[24],
            name: u24_from([buf[25], buf[26], buf[27]]),
        }
    }
}

// ── Machine ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineRecord {
    /// String-table index of the short name.
    pub name: u32,
    pub desc_offset: u32,
    /// Compressed length; 0 = no description.
    pub desc_len: u16,
    pub desc_original_len: u16,
    pub year: u16,
    /// Manufacturer index, or `NONE_U16`.
    pub manufacturer: u16,
    /// Parent machine index, or `NONE_U24`.
    pub clone_of: u32,
    /// ROM-set source machine index, or `NONE_U24`.
    pub rom_of: u32,
}

impl MachineRecord {
    pub fn new(name: u32) -> Self {
        Self {
            name,
            desc_offset: 0,
            desc_len: 0,
            desc_original_len: 0,
            year: 0,
            manufacturer: NONE_U16,
            clone_of: NONE_U24,
            rom_of: NONE_U24,
        }
    }

    pub fn has_description(&self) -> bool {
        self.desc_len > 0
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_u24(w, self.name)?;
        w.write_all(&self.desc_offset.to_le_bytes())?;
        w.write_all(&self.desc_len.to_le_bytes())?;
        w.write_all(&self.desc_original_len.to_le_bytes())?;
        w.write_all(&self.year.to_le_bytes())?;
        w.write_all(&self.manufacturer.to_le_bytes())?;
        write_u24(w, self.clone_of)?;
        write_u24(w, self.rom_of)
    }

    pub fn decode(buf: &[u8; MACHINE_RECORD_SIZE]) -> Self {
        Self {
            name: u24_from([buf[0], buf[1], buf[2]]),
            desc_offset: u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]),
            desc_len: u16::from_le_bytes([buf[7], buf[8]]),
            desc_original_len: u16::from_le_bytes([buf[9], buf[10]]),
            year: u16::from_le_bytes([buf[11], buf[12]]),
            manufacturer: u16::from_le_bytes([buf[13], buf[14]]),
            clone_of: u24_from([buf[15], buf[16], buf[17]]),
            rom_of: u24_from([buf[18], buf[19], buf[20]]),
        }
    }
}

// ── Association ────────────────────────────────────────────────────

/// Machine ↔ ROM link. Ordered by (rom, machine, name), which is the order
/// the association table is sorted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AssociationRecord {
    pub rom: u32,
    pub machine: u32,
    /// RomName index this ROM carries inside `machine`, or `NONE_U24`.
    pub name: u32,
}

impl AssociationRecord {
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_u24(w, self.machine)?;
        write_u24(w, self.rom)?;
        write_u24(w, self.name)
    }

    pub fn decode(buf: &[u8; ASSOCIATION_RECORD_SIZE]) -> Self {
        Self {
            machine: u24_from([buf[0], buf[1], buf[2]]),
            rom: u24_from([buf[3], buf[4], buf[5]]),
            name: u24_from([buf[6], buf[7], buf[8]]),
        }
    }

    /// ROM field only, without decoding the whole record.
    #[inline]
    pub fn rom_of(buf: &[u8; ASSOCIATION_RECORD_SIZE]) -> u32 {
        u24_from([buf[3], buf[4], buf[5]])
    }
}

// ── Tests ──────────────────────────────────────────────────────────
