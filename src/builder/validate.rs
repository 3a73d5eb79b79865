//! Pre-emission validation.
//!
//! Re-checks the laid-out tables against the invariants the query engine
//! relies on. Any violation aborts the build and names the offending record.

use rayon::prelude::*;

use crate::builder::layout::Layout;
use crate::codec;
use crate::error::BuildError;
use crate::format::{MachineRecord, NONE_U16, NONE_U24};

pub(crate) fn validate(layout: &Layout<'_>, blob: &[u8], parallel: bool) -> Result<(), BuildError> {
    check_rom_order(layout)?;
    check_association_order(layout)?;
    check_references(layout)?;
    check_description_ranges(&layout.machines, blob)?;
    verify_descriptions(layout, blob, parallel)?;
    tracing::debug!(
        "validated {} roms, {} machines, {} associations",
        layout.roms.len(),
        layout.machines.len(),
        layout.associations.len()
    );
    Ok(())
}

fn check_rom_order(layout: &Layout<'_>) -> Result<(), BuildError> {
    for (i, pair) in layout.roms.windows(2).enumerate() {
        if pair[0].key() >= pair[1].key() {
            return Err(BuildError::UnsortedRoms { index: i as u32 + 1 });
        }
    }
    Ok(())
}

/// Strictly ascending (rom, machine, name) also means each ROM's run is
/// contiguous and free of duplicate triples.
fn check_association_order(layout: &Layout<'_>) -> Result<(), BuildError> {
    for (i, pair) in layout.associations.windows(2).enumerate() {
        if pair[0] >= pair[1] {
            return Err(BuildError::UnsortedAssociations { index: i as u32 + 1 });
        }
    }
    Ok(())
}

struct RefCheck {
    table: &'static str,
    index: u32,
}

impl RefCheck {
    fn at(table: &'static str, index: usize) -> Self {
        Self {
            table,
            index: index as u32,
        }
    }

    fn required(&self, field: &'static str, value: u32, count: usize) -> Result<(), BuildError> {
        if (value as usize) < count {
            Ok(())
        } else {
            Err(BuildError::ReferenceOutOfRange {
                table: self.table,
                index: self.index,
                field,
                value,
                count: count as u32,
            })
        }
    }

    fn optional(&self, field: &'static str, value: u32, count: usize) -> Result<(), BuildError> {
        if value == NONE_U24 {
            return Ok(());
        }
        self.required(field, value, count)
    }
}

fn check_references(layout: &Layout<'_>) -> Result<(), BuildError> {
    let strings = layout.strings.len();
    let roms = layout.roms.len();
    let machines = layout.machines.len();
    let names = layout.rom_names.len();
    let manufacturers = layout.manufacturers.len();

    for (i, rom) in layout.roms.iter().enumerate() {
        RefCheck::at("rom", i).optional("name", rom.name, names)?;
    }
    for (i, machine) in layout.machines.iter().enumerate() {
        let check = RefCheck::at("machine", i);
        check.required("name", machine.name, strings)?;
        if machine.manufacturer != NONE_U16 {
            check.required("manufacturer", u32::from(machine.manufacturer), manufacturers)?;
        }
        check.optional("clone_of", machine.clone_of, machines)?;
        check.optional("rom_of", machine.rom_of, machines)?;
    }
    for (i, assoc) in layout.associations.iter().enumerate() {
        let check = RefCheck::at("association", i);
        check.required("rom", assoc.rom, roms)?;
        check.required("machine", assoc.machine, machines)?;
        check.optional("name", assoc.name, names)?;
    }
    for (i, &string) in layout.manufacturers.iter().enumerate() {
        RefCheck::at("manufacturer", i).required("name", string, strings)?;
    }
    for (i, &string) in layout.rom_names.iter().enumerate() {
        RefCheck::at("rom name", i).required("name", string, strings)?;
    }
    Ok(())
}

/// Every range lies inside the blob; any two ranges are identical or
/// disjoint.
fn check_description_ranges(machines: &[MachineRecord], blob: &[u8]) -> Result<(), BuildError> {
    let mut ranges: Vec<(u32, u16, u32)> = Vec::new();
    for (i, machine) in machines.iter().enumerate() {
        if !machine.has_description() {
            continue;
        }
        let end = machine.desc_offset as usize + machine.desc_len as usize;
        if end > blob.len() {
            return Err(BuildError::DescriptionOutOfBounds {
                machine: i as u32,
                offset: machine.desc_offset,
                len: machine.desc_len,
                blob_len: blob.len(),
            });
        }
        ranges.push((machine.desc_offset, machine.desc_len, i as u32));
    }

    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        let (offset_a, len_a, machine_a) = pair[0];
        let (offset_b, len_b, machine_b) = pair[1];
        if offset_a == offset_b && len_a == len_b {
            let (a, b) = (&machines[machine_a as usize], &machines[machine_b as usize]);
            if a.desc_original_len == b.desc_original_len {
                continue;
            }
        }
        if offset_b < offset_a + u32::from(len_a) {
            return Err(BuildError::OverlappingDescriptions {
                machine: machine_b,
                other: machine_a,
            });
        }
    }
    Ok(())
}

/// Inflate every stored description and compare it to its source text.
fn verify_descriptions(layout: &Layout<'_>, blob: &[u8], parallel: bool) -> Result<(), BuildError> {
    let verify_one = |i: usize| -> Result<(), BuildError> {
        let machine = &layout.machines[i];
        let text = layout.descriptions[i].1.unwrap_or("");
        if !machine.has_description() {
            return if text.is_empty() {
                Ok(())
            } else {
                Err(BuildError::MalformedDescription { machine: i as u32 })
            };
        }

        let start = machine.desc_offset as usize;
        let stream = &blob[start..start + machine.desc_len as usize];
        // One spare byte so a stream longer than its recorded length is caught.
        let mut out = vec![0u8; machine.desc_original_len as usize + 1];
        match codec::inflate_into(stream, &mut out) {
            Some(n) if n == machine.desc_original_len as usize && &out[..n] == text.as_bytes() => Ok(()),
            _ => Err(BuildError::MalformedDescription { machine: i as u32 }),
        }
    };

    let count = layout.machines.len();
    if parallel && count > 1 {
        (0..count).into_par_iter().try_for_each(verify_one)
    } else {
        (0..count).try_for_each(verify_one)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::descriptions::compress_descriptions;
    use crate::builder::layout::lay_out;
    use crate::config::BuildConfig;
    use crate::dataset::{Dataset, Machine, MachineRom, Rom};

    fn dataset() -> Dataset {
        let machine = |id: u32, name: &str, description: &str| Machine {
            id,
            name: name.into(),
            description: Some(description.into()),
            year: Some(1994),
            manufacturer_id: None,
            clone_of: None,
            rom_of: None,
        };
        let rom = |id: u32, b: u8| Rom {
            id,
            sha1: [b; 20],
            crc32: 0,
            size: 4096,
            name_id: None,
        };
        Dataset {
            machines: vec![machine(1, "a", "Alpha"), machine(2, "b", "Beta"), machine(3, "c", "Alpha")],
            roms: vec![rom(10, 1), rom(11, 2)],
            machine_roms: vec![
                MachineRom { machine_id: 1, rom_id: 10, name_id: None },
                MachineRom { machine_id: 2, rom_id: 10, name_id: None },
                MachineRom { machine_id: 3, rom_id: 11, name_id: None },
            ],
            ..Dataset::default()
        }
    }

    fn prepared(ds: &Dataset) -> (Layout<'_>, Vec<u8>) {
        let mut layout = lay_out(ds, &BuildConfig::default()).unwrap();
        let blob = compress_descriptions(&layout.descriptions, &mut layout.machines, 9, false).unwrap();
        (layout, blob.bytes)
    }

    #[test]
    fn test_valid_layout_passes() {
        let ds = dataset();
        let (layout, blob) = prepared(&ds);
        validate(&layout, &blob, false).unwrap();
        validate(&layout, &blob, true).unwrap();
    }

    #[test]
    fn test_unsorted_roms_detected() {
        let ds = dataset();
        let (mut layout, blob) = prepared(&ds);
        layout.roms.swap(0, 1);
        assert!(matches!(validate(&layout, &blob, false), Err(BuildError::UnsortedRoms { index: 1 })));
    }

    #[test]
    fn test_unsorted_associations_detected() {
        let ds = dataset();
        let (mut layout, blob) = prepared(&ds);
        layout.associations.swap(1, 2);
        assert!(matches!(
            validate(&layout, &blob, false),
            Err(BuildError::UnsortedAssociations { index: 2 })
        ));
    }

    #[test]
    fn test_reference_out_of_range_detected() {
        let ds = dataset();
        let (mut layout, blob) = prepared(&ds);
        layout.machines[1].clone_of = 7;
        let err = validate(&layout, &blob, false).unwrap_err();
        assert!(matches!(
            err,
            BuildError::ReferenceOutOfRange { table: "machine", index: 1, field: "clone_of", value: 7, count: 3 }
        ));
    }

    #[test]
    fn test_overlapping_ranges_detected() {
        let ds = dataset();
        let (mut layout, blob) = prepared(&ds);
        layout.machines[1].desc_offset = 1;
        assert!(matches!(
            validate(&layout, &blob, false),
            Err(BuildError::OverlappingDescriptions { .. })
        ));
    }

    #[test]
    fn test_out_of_bounds_range_detected() {
        let ds = dataset();
        let (mut layout, blob) = prepared(&ds);
        layout.machines[0].desc_offset = blob.len() as u32;
        assert!(matches!(
            validate(&layout, &blob, false),
            Err(BuildError::DescriptionOutOfBounds { machine: 0, .. })
        ));
    }

    #[test]
    fn test_corrupt_stream_detected() {
        let ds = dataset();
        let (layout, mut blob) = prepared(&ds);
        let last = blob.len() - 1;
        blob[last] ^= 0x55;
        assert!(matches!(
            validate(&layout, &blob, false),
            Err(BuildError::MalformedDescription { .. })
        ));
    }

    #[test]
    fn test_wrong_original_length_detected() {
        let ds = dataset();
        let (mut layout, blob) = prepared(&ds);
        layout.machines[1].desc_original_len -= 1;
        assert!(matches!(
            validate(&layout, &blob, false),
            Err(BuildError::MalformedDescription { machine: 1 })
        ));
    }
}
