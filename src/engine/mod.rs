//! Query engine over a built image.
//!
//! [`RomDb`] borrows the image bytes and answers every query by reading
//! fixed-width records in place. `open` validates the header and section
//! table once; after that no operation allocates, logs or panics, whatever
//! the indices passed in. Multi-result queries write into caller buffers.
//!
//! Navigation state (the "current" machine or ROM in a UI) belongs to the
//! caller; [`cycle`] provides the wraparound arithmetic.

mod embedded;
mod search;

use std::ops::RangeInclusive;

use crate::codec;
use crate::error::{DescriptionError, OpenError};
use crate::format::*;

pub use embedded::{EmbeddedImage, ImageFile};

/// One machine that uses a ROM, with the filename the ROM has inside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MachineMatch {
    pub machine: MachineId,
    pub filename: Option<NameId>,
}

/// Outcome of a multi-result query: how many entries were copied into the
/// caller buffer, and how many exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchCount {
    pub written: usize,
    pub total: usize,
}

impl MatchCount {
    /// The buffer was too small to hold every match.
    pub fn is_truncated(&self) -> bool {
        self.written < self.total
    }
}

/// Read-only view of an image. Cheap to copy; share freely across threads.
#[derive(Debug, Clone, Copy)]
pub struct RomDb<'a> {
    bytes: &'a [u8],
    header: ImageHeader,
    strings: StringTableView<'a>,
}

impl<'a> RomDb<'a> {
    /// Validate the header and section table of `bytes`.
    ///
    /// Bytes past `image_len` are ignored, so an image may sit at the start
    /// of a larger region (flash page, padded file).
    pub fn open(bytes: &'a [u8]) -> Result<Self, OpenError> {
        let header = ImageHeader::from_bytes(bytes)?;
        let image_len = header.image_len as usize;
        if image_len > bytes.len() {
            return Err(OpenError::Truncated {
                needed: image_len,
                actual: bytes.len(),
            });
        }
        if image_len < HEADER_SIZE {
            return Err(OpenError::Corrupt("image length smaller than header"));
        }
        let bytes = &bytes[..image_len];

        if header.rom_count > 0 && header.min_size_exponent > header.max_size_exponent {
            return Err(OpenError::Corrupt("inverted size exponent range"));
        }

        let strings_len = check_sections(&header, bytes)?;
        let strings = bytes
            .get(header.strings_offset as usize..)
            .and_then(|b| StringTableView::new(b, header.string_count))
            .filter(|view| view.byte_len() == strings_len)
            .ok_or(OpenError::Corrupt("string table does not match its section"))?;

        let db = Self {
            bytes,
            header,
            strings,
        };
        db.check_size_index()?;
        Ok(db)
    }

    /// Size-index buckets must tile `0..rom_count` in order.
    fn check_size_index(&self) -> Result<(), OpenError> {
        let mut expected = 0u32;
        for i in 0..self.header.bucket_count() {
            let bucket = self
                .bucket(i)
                .ok_or(OpenError::Corrupt("size index truncated"))?;
            if bucket.start != expected || bucket.end < bucket.start {
                return Err(OpenError::Corrupt("size index buckets out of order"));
            }
            expected = bucket.end;
        }
        if expected != self.header.rom_count {
            return Err(OpenError::Corrupt("size index does not cover the ROM table"));
        }
        Ok(())
    }

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// The image bytes, cut to `image_len`.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn rom_count(&self) -> u32 {
        self.header.rom_count
    }

    pub fn machine_count(&self) -> u32 {
        self.header.machine_count
    }

    pub fn manufacturer_count(&self) -> u32 {
        self.header.manufacturer_count
    }

    pub fn rom_name_count(&self) -> u32 {
        self.header.rom_name_count
    }

    pub fn association_count(&self) -> u32 {
        self.header.association_count
    }

    /// Exponents present in the size index, `None` for an image without ROMs.
    pub fn size_exponent_range(&self) -> Option<RangeInclusive<u8>> {
        (self.header.rom_count > 0)
            .then(|| self.header.min_size_exponent..=self.header.max_size_exponent)
    }

    /// `(size exponent, ROM index range)` per bucket, smallest exponent first.
    pub fn size_buckets(&self) -> impl Iterator<Item = (u8, SizeBucket)> + 'a {
        let db = *self;
        (0..db.header.bucket_count()).filter_map(move |i| {
            let exponent = db.header.min_size_exponent.checked_add(i as u8)?;
            Some((exponent, db.bucket(i)?))
        })
    }

    // ── Identification ─────────────────────────────────────────────

    /// Find the ROM with this size exponent and SHA-1.
    ///
    /// O(1) to reach the size bucket, then O(log n) within it.
    pub fn find_rom(&self, size_exponent: u8, sha1: &Sha1) -> Option<RomId> {
        if !self.size_exponent_range()?.contains(&size_exponent) {
            return None;
        }
        let bucket = self.bucket(usize::from(size_exponent - self.header.min_size_exponent))?;
        search::find(bucket.start, bucket.end, |i| match self.rom_bytes(i) {
            Some(record) => record[..SHA1_LEN].cmp(&sha1[..]),
            // Unreadable record: steer the search toward the low end and stop.
            None => std::cmp::Ordering::Greater,
        })
        .map(RomId)
    }

    pub fn rom(&self, rom: RomId) -> Option<RomRecord> {
        self.rom_bytes(rom.0).map(RomRecord::decode)
    }

    // ── Relationships ──────────────────────────────────────────────

    /// Machines that use `rom`, copied into `out` in ascending machine order.
    /// One entry per association: a machine holding the ROM under two
    /// filenames appears twice, once per filename.
    ///
    /// `total` is the exact number of associations even when `out` is
    /// shorter; a zero-length `out` is a pure count.
    pub fn machines_for_rom(&self, rom: RomId, out: &mut [MachineMatch]) -> MatchCount {
        let count = self.header.association_count;
        let rom_at = |i: u32| self.association_bytes(i).map(AssociationRecord::rom_of);

        let lower = search::partition_point(0, count, |i| rom_at(i).is_some_and(|r| r < rom.0));
        let upper = search::partition_point(lower, count, |i| rom_at(i).is_some_and(|r| r <= rom.0));

        let total = (upper - lower) as usize;
        let mut written = 0;
        for (slot, index) in out.iter_mut().zip(lower..upper) {
            let Some(record) = self.association_bytes(index).map(AssociationRecord::decode) else {
                break;
            };
            *slot = MachineMatch {
                machine: MachineId(record.machine),
                filename: u24_opt(record.name).map(NameId),
            };
            written += 1;
        }
        MatchCount { written, total }
    }

    // ── Attributes ─────────────────────────────────────────────────

    pub fn machine(&self, machine: MachineId) -> Option<MachineRecord> {
        self.machine_bytes(machine.0).map(MachineRecord::decode)
    }

    pub fn machine_name(&self, machine: MachineId) -> Option<&'a str> {
        self.strings.get(self.machine(machine)?.name)
    }

    /// Release year; 0 when unknown.
    pub fn machine_year(&self, machine: MachineId) -> Option<u16> {
        Some(self.machine(machine)?.year)
    }

    pub fn machine_manufacturer(&self, machine: MachineId) -> Option<ManufacturerId> {
        let manufacturer = self.machine(machine)?.manufacturer;
        (manufacturer != NONE_U16).then(|| ManufacturerId(u32::from(manufacturer)))
    }

    /// Parent of a clone.
    pub fn machine_clone_of(&self, machine: MachineId) -> Option<MachineId> {
        u24_opt(self.machine(machine)?.clone_of).map(MachineId)
    }

    /// Machine whose ROM set this one draws from.
    pub fn machine_rom_of(&self, machine: MachineId) -> Option<MachineId> {
        u24_opt(self.machine(machine)?.rom_of).map(MachineId)
    }

    pub fn manufacturer_name(&self, manufacturer: ManufacturerId) -> Option<&'a str> {
        let record = self.name_record(
            self.header.manufacturers_offset,
            self.header.manufacturer_count,
            manufacturer.0,
        )?;
        self.strings.get(record)
    }

    pub fn rom_filename(&self, name: NameId) -> Option<&'a str> {
        let record = self.name_record(self.header.rom_names_offset, self.header.rom_name_count, name.0)?;
        self.strings.get(record)
    }

    /// Uncompressed description length; `Some(0)` when the machine has none.
    pub fn description_len(&self, machine: MachineId) -> Option<usize> {
        let record = self.machine(machine)?;
        Some(if record.has_description() {
            record.desc_original_len as usize
        } else {
            0
        })
    }

    /// Inflate a machine's description into `out`, returning its length.
    ///
    /// `out` must hold the whole text; a shorter buffer is reported with the
    /// exact size required and left untouched. A machine without a
    /// description yields `Ok(0)`.
    pub fn machine_description(&self, machine: MachineId, out: &mut [u8]) -> Result<usize, DescriptionError> {
        let record = self.machine(machine).ok_or(DescriptionError::NoSuchMachine)?;
        if !record.has_description() {
            return Ok(0);
        }
        let required = record.desc_original_len as usize;
        if out.len() < required {
            return Err(DescriptionError::InsufficientBuffer { required });
        }

        let start = record.desc_offset as usize;
        let end = start
            .checked_add(record.desc_len as usize)
            .ok_or(DescriptionError::Corrupt)?;
        let stream = self
            .descriptions()
            .get(start..end)
            .ok_or(DescriptionError::Corrupt)?;
        match codec::inflate_into(stream, &mut out[..required]) {
            Some(n) if n == required => Ok(n),
            _ => Err(DescriptionError::Corrupt),
        }
    }

    // ── Raw record access ──────────────────────────────────────────

    fn record<const N: usize>(&self, offset: u32, count: u32, index: u32) -> Option<&'a [u8; N]> {
        if index >= count {
            return None;
        }
        let start = (offset as usize).checked_add((index as usize).checked_mul(N)?)?;
        self.bytes.get(start..start.checked_add(N)?)?.try_into().ok()
    }

    fn bucket(&self, i: usize) -> Option<SizeBucket> {
        let count = self.header.bucket_count() as u32;
        self.record::<SIZE_BUCKET_SIZE>(self.header.size_index_offset, count, i as u32)
            .map(SizeBucket::decode)
    }

    fn rom_bytes(&self, index: u32) -> Option<&'a [u8; ROM_RECORD_SIZE]> {
        self.record(self.header.roms_offset, self.header.rom_count, index)
    }

    fn machine_bytes(&self, index: u32) -> Option<&'a [u8; MACHINE_RECORD_SIZE]> {
        self.record(self.header.machines_offset, self.header.machine_count, index)
    }

    fn association_bytes(&self, index: u32) -> Option<&'a [u8; ASSOCIATION_RECORD_SIZE]> {
        self.record(self.header.associations_offset, self.header.association_count, index)
    }

    fn name_record(&self, offset: u32, count: u32, index: u32) -> Option<u32> {
        self.record::<NAME_RECORD_SIZE>(offset, count, index)
            .map(|b| u24_from(*b))
    }

    fn descriptions(&self) -> &'a [u8] {
        let start = self.header.descriptions_offset as usize;
        let end = start + self.header.descriptions_len as usize;
        self.bytes.get(start..end).unwrap_or(&[])
    }
}

/// Check that every section lies inside the image, after the header and in
/// layout order. Returns the byte length of the string-table section.
fn check_sections(header: &ImageHeader, bytes: &[u8]) -> Result<usize, OpenError> {
    let table = |count: u32, size: usize| (count as usize).checked_mul(size);
    let sections: [(u32, Option<usize>, &'static str); 7] = [
        (header.size_index_offset, table(header.bucket_count() as u32, SIZE_BUCKET_SIZE), "size index out of bounds"),
        (header.roms_offset, table(header.rom_count, ROM_RECORD_SIZE), "ROM table out of bounds"),
        (header.machines_offset, table(header.machine_count, MACHINE_RECORD_SIZE), "machine table out of bounds"),
        (header.associations_offset, table(header.association_count, ASSOCIATION_RECORD_SIZE), "association table out of bounds"),
        (header.manufacturers_offset, table(header.manufacturer_count, NAME_RECORD_SIZE), "manufacturer table out of bounds"),
        (header.rom_names_offset, table(header.rom_name_count, NAME_RECORD_SIZE), "ROM-name table out of bounds"),
        (header.strings_offset, Some(0), "string table out of bounds"),
    ];

    let mut cursor = HEADER_SIZE;
    for (offset, len, what) in sections {
        let start = offset as usize;
        let end = len.and_then(|len| start.checked_add(len));
        match end {
            Some(end) if start >= cursor && end <= bytes.len() => cursor = end,
            _ => return Err(OpenError::Corrupt(what)),
        }
    }

    let descriptions = header.descriptions_offset as usize;
    let descriptions_end = descriptions.checked_add(header.descriptions_len as usize);
    if descriptions < cursor || descriptions_end != Some(bytes.len()) {
        return Err(OpenError::Corrupt("descriptions blob out of bounds"));
    }
    Ok(descriptions - cursor)
}

/// Step `delta` places from `current` through `0..total`, wrapping at both
/// ends. Returns 0 when `total` is 0.
pub fn cycle(current: usize, delta: isize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    let total = total as i128;
    (((current as i128) + (delta as i128)).rem_euclid(total)) as usize
}
