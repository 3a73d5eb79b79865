//! Dense index assignment and record layout.
//!
//! Turns the id-keyed dataset into in-memory tables that mirror the image
//! sections one to one. Everything iterates in a fixed order (upstream id
//! order, or (size exponent, SHA-1) for ROMs) so identical input always lays
//! out identically.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::BuildConfig;
use crate::dataset::{Dataset, Machine};
use crate::error::BuildError;
use crate::format::{
    size_exponent, AssociationRecord, MachineRecord, RomRecord, SizeBucket, StringTable,
    MAX_U16_ENTRIES, MAX_U24_ENTRIES, NONE_U16, NONE_U24,
};

/// In-memory image tables, before descriptions are compressed.
#[derive(Debug)]
pub(crate) struct Layout<'a> {
    pub min_size_exponent: u8,
    pub max_size_exponent: u8,
    pub buckets: Vec<SizeBucket>,
    pub roms: Vec<RomRecord>,
    pub machines: Vec<MachineRecord>,
    pub associations: Vec<AssociationRecord>,
    /// String index per manufacturer.
    pub manufacturers: Vec<u32>,
    /// String index per ROM name.
    pub rom_names: Vec<u32>,
    pub strings: StringTable,
    /// Upstream id and description text per dense machine.
    pub descriptions: Vec<(u32, Option<&'a str>)>,
}

/// Index a list by upstream id, rejecting duplicates.
fn index_by_id<'a, T>(
    entity: &'static str,
    items: &'a [T],
    id: impl Fn(&T) -> u32,
) -> Result<BTreeMap<u32, &'a T>, BuildError> {
    let mut map = BTreeMap::new();
    for item in items {
        let key = id(item);
        if map.insert(key, item).is_some() {
            return Err(BuildError::DuplicateId { entity, id: key });
        }
    }
    Ok(map)
}

fn check_ref<T>(
    map: &BTreeMap<u32, T>,
    value: Option<u32>,
    entity: &'static str,
    id: u32,
    field: &'static str,
    target: &'static str,
) -> Result<(), BuildError> {
    match value {
        Some(missing) if !map.contains_key(&missing) => Err(BuildError::DanglingReference {
            entity,
            id,
            field,
            target,
            missing,
        }),
        _ => Ok(()),
    }
}

fn check_capacity(table: &'static str, count: usize, limit: usize) -> Result<(), BuildError> {
    if count > limit {
        return Err(BuildError::TableOverflow {
            table,
            count,
            limit,
        });
    }
    Ok(())
}

/// Assign dense indices (in upstream id order) to the ids in `keep`.
fn assign_dense(keep: impl Iterator<Item = u32>) -> HashMap<u32, u32> {
    keep.enumerate().map(|(dense, id)| (id, dense as u32)).collect()
}

pub(crate) fn lay_out<'a>(
    dataset: &'a Dataset,
    config: &BuildConfig,
) -> Result<Layout<'a>, BuildError> {
    let manufacturers = index_by_id("manufacturer", &dataset.manufacturers, |m| m.id)?;
    let machines = index_by_id("machine", &dataset.machines, |m| m.id)?;
    let rom_names = index_by_id("rom name", &dataset.rom_names, |n| n.id)?;
    let roms = index_by_id("rom", &dataset.roms, |r| r.id)?;

    // ── Referential integrity ──────────────────────────────────────

    for (&id, machine) in &machines {
        check_ref(&manufacturers, machine.manufacturer_id, "machine", id, "manufacturer_id", "manufacturer")?;
        check_ref(&machines, machine.clone_of, "machine", id, "clone_of", "machine")?;
        check_ref(&machines, machine.rom_of, "machine", id, "rom_of", "machine")?;
    }
    for (&id, rom) in &roms {
        check_ref(&rom_names, rom.name_id, "rom", id, "name_id", "rom name")?;
    }
    for assoc in &dataset.machine_roms {
        let id = assoc.machine_id;
        check_ref(&machines, Some(assoc.machine_id), "machine_rom", id, "machine_id", "machine")?;
        check_ref(&roms, Some(assoc.rom_id), "machine_rom", id, "rom_id", "rom")?;
        check_ref(&rom_names, assoc.name_id, "machine_rom", id, "name_id", "rom name")?;
    }

    // ── ROMs: (size exponent, SHA-1) order ─────────────────────────

    let mut keyed = Vec::with_capacity(roms.len());
    for (&id, rom) in &roms {
        let exponent = size_exponent(rom.size).ok_or(BuildError::InvalidRomSize {
            rom_id: id,
            size: rom.size,
        })?;
        if exponent < config.min_size_exponent || exponent > config.max_size_exponent {
            return Err(BuildError::SizeExponentOutOfRange {
                rom_id: id,
                exponent,
                min: config.min_size_exponent,
                max: config.max_size_exponent,
            });
        }
        keyed.push((exponent, rom.sha1, id));
    }
    keyed.sort_unstable();
    for pair in keyed.windows(2) {
        if pair[0].0 == pair[1].0 && pair[0].1 == pair[1].1 {
            return Err(BuildError::DuplicateRom {
                first: pair[0].2,
                second: pair[1].2,
                size_exponent: pair[0].0,
                sha1: hex::encode_upper(pair[0].1),
            });
        }
    }
    check_capacity("rom", keyed.len(), MAX_U24_ENTRIES)?;
    let rom_index: HashMap<u32, u32> = assign_dense(keyed.iter().map(|&(_, _, id)| id));

    // ── Pruning ────────────────────────────────────────────────────

    let prune = config.prune_unreferenced;
    let used_machines: HashSet<u32> = dataset.machine_roms.iter().map(|a| a.machine_id).collect();
    let kept_machines: Vec<(u32, &Machine)> = machines
        .iter()
        .filter(|(id, _)| !prune || used_machines.contains(*id))
        .map(|(&id, &m)| (id, m))
        .collect();

    let used_manufacturers: HashSet<u32> = kept_machines
        .iter()
        .filter_map(|(_, m)| m.manufacturer_id)
        .collect();
    let used_names: HashSet<u32> = roms
        .values()
        .filter_map(|r| r.name_id)
        .chain(dataset.machine_roms.iter().filter_map(|a| a.name_id))
        .collect();

    let kept_manufacturers: Vec<u32> = manufacturers
        .keys()
        .copied()
        .filter(|id| !prune || used_manufacturers.contains(id))
        .collect();
    let kept_names: Vec<u32> = rom_names
        .keys()
        .copied()
        .filter(|id| !prune || used_names.contains(id))
        .collect();

    if prune {
        let dropped = machines.len() - kept_machines.len();
        if dropped > 0 {
            tracing::warn!("pruned {} machines without ROMs", dropped);
        }
        tracing::debug!(
            "pruned {} manufacturers, {} rom names",
            manufacturers.len() - kept_manufacturers.len(),
            rom_names.len() - kept_names.len()
        );
    }

    check_capacity("machine", kept_machines.len(), MAX_U24_ENTRIES)?;
    check_capacity("manufacturer", kept_manufacturers.len(), MAX_U16_ENTRIES)?;
    check_capacity("rom name", kept_names.len(), MAX_U24_ENTRIES)?;

    let machine_index = assign_dense(kept_machines.iter().map(|&(id, _)| id));
    let manufacturer_index = assign_dense(kept_manufacturers.iter().copied());
    let name_index = assign_dense(kept_names.iter().copied());

    // ── Strings ────────────────────────────────────────────────────

    let mut string_set: BTreeSet<&str> = BTreeSet::new();
    string_set.extend(kept_machines.iter().map(|(_, m)| m.name.as_str()));
    string_set.extend(kept_manufacturers.iter().map(|id| manufacturers[id].name.as_str()));
    string_set.extend(kept_names.iter().map(|id| rom_names[id].name.as_str()));
    check_capacity("string", string_set.len(), MAX_U24_ENTRIES)?;
    let strings = StringTable::from_sorted(string_set);

    let string_of = |s: &str| strings.index_of(s).unwrap_or(NONE_U24);

    // ── Records ────────────────────────────────────────────────────

    let manufacturer_records: Vec<u32> = kept_manufacturers
        .iter()
        .map(|id| string_of(&manufacturers[id].name))
        .collect();
    let name_records: Vec<u32> = kept_names
        .iter()
        .map(|id| string_of(&rom_names[id].name))
        .collect();

    let name_ref = |id: Option<u32>| id.and_then(|i| name_index.get(&i).copied()).unwrap_or(NONE_U24);
    // A reference to a pruned machine becomes "none".
    let machine_ref = |id: Option<u32>| id.and_then(|i| machine_index.get(&i).copied()).unwrap_or(NONE_U24);

    let rom_records: Vec<RomRecord> = keyed
        .iter()
        .map(|&(size_exponent, sha1, id)| {
            let rom = roms[&id];
            RomRecord {
                sha1,
                crc32: rom.crc32,
                size_exponent,
                name: name_ref(rom.name_id),
            }
        })
        .collect();

    let mut machine_records = Vec::with_capacity(kept_machines.len());
    let mut descriptions = Vec::with_capacity(kept_machines.len());
    for &(id, machine) in &kept_machines {
        let mut record = MachineRecord::new(string_of(&machine.name));
        record.year = machine.year.unwrap_or(0);
        record.manufacturer = machine
            .manufacturer_id
            .and_then(|m| manufacturer_index.get(&m))
            .map_or(NONE_U16, |&dense| dense as u16);
        record.clone_of = machine_ref(machine.clone_of);
        record.rom_of = machine_ref(machine.rom_of);
        machine_records.push(record);

        let text = machine.description.as_deref().filter(|d| !d.is_empty());
        descriptions.push((id, text));
    }

    let mut associations: Vec<AssociationRecord> = dataset
        .machine_roms
        .iter()
        .filter_map(|a| {
            Some(AssociationRecord {
                rom: rom_index[&a.rom_id],
                machine: *machine_index.get(&a.machine_id)?,
                name: name_ref(a.name_id),
            })
        })
        .collect();
    associations.sort_unstable();
    associations.dedup();

    // ── Size index ─────────────────────────────────────────────────

    let (min_size_exponent, max_size_exponent) = match (rom_records.first(), rom_records.last()) {
        (Some(first), Some(last)) => (first.size_exponent, last.size_exponent),
        _ => (0, 0),
    };
    let mut buckets = Vec::new();
    if !rom_records.is_empty() {
        let mut start = 0usize;
        for exponent in min_size_exponent..=max_size_exponent {
            let len = rom_records[start..]
                .iter()
                .take_while(|r| r.size_exponent == exponent)
                .count();
            buckets.push(SizeBucket {
                start: start as u32,
                end: (start + len) as u32,
            });
            start += len;
        }
    }

    Ok(Layout {
        min_size_exponent,
        max_size_exponent,
        buckets,
        roms: rom_records,
        machines: machine_records,
        associations,
        manufacturers: manufacturer_records,
        rom_names: name_records,
        strings,
        descriptions,
    })
}
