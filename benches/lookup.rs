//! Benchmark suite for romdex queries and builds
//!
//! Covers:
//! - Identification: find_rom hit and miss
//! - Relationships: machines_for_rom on a widely shared ROM
//! - Attributes: machine_name, machine_description
//! - Build: full dataset → image
//!
//! Run: cargo bench --bench lookup

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use romdex::dataset::{Machine, MachineRom, Manufacturer, Rom, RomName};
use romdex::{build, Dataset, MachineId, MachineMatch, RomDb};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sha1_of(i: u32) -> [u8; 20] {
    let mut sha1 = [0u8; 20];
    let h = blake3::hash(&i.to_le_bytes());
    sha1.copy_from_slice(&h.as_bytes()[..20]);
    sha1
}

/// `machine_count` machines, four private ROMs each, all also sharing ROM 0.
fn synthetic_dataset(machine_count: u32) -> Dataset {
    let mut ds = Dataset {
        manufacturers: (0..16).map(|i| Manufacturer { id: i, name: format!("Maker {i}") }).collect(),
        ..Dataset::default()
    };
    ds.roms.push(Rom { id: 0, sha1: sha1_of(0), crc32: 0, size: 1 << 17, name_id: None });

    for m in 0..machine_count {
        ds.machines.push(Machine {
            id: m,
            name: format!("game{m:05}"),
            description: Some(format!("Game {m} (World, revision {})", m % 7)),
            year: Some(1980 + (m % 20) as u16),
            manufacturer_id: Some(m % 16),
            clone_of: None,
            rom_of: None,
        });
        ds.machine_roms.push(MachineRom { machine_id: m, rom_id: 0, name_id: None });
        for r in 0..4 {
            let id = 1 + m * 4 + r;
            ds.rom_names.push(RomName { id, name: format!("g{m:05}.{r}") });
            ds.roms.push(Rom {
                id,
                sha1: sha1_of(id),
                crc32: id,
                size: 1 << (12 + id % 10),
                name_id: Some(id),
            });
            ds.machine_roms.push(MachineRom { machine_id: m, rom_id: id, name_id: Some(id) });
        }
    }
    ds
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_find_rom(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_rom");

    for size in [1_000u32, 10_000, 50_000] {
        let image = build(&synthetic_dataset(size)).unwrap();
        let db = RomDb::open(image.bytes()).unwrap();
        let probe = sha1_of(size * 2 + 1);
        let exponent = 12 + ((size * 2 + 1) % 10) as u8;

        group.bench_with_input(BenchmarkId::new("hit", size), &size, |b, _| {
            b.iter(|| black_box(db.find_rom(black_box(exponent), black_box(&probe))));
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &size, |b, _| {
            b.iter(|| black_box(db.find_rom(black_box(exponent), black_box(&[0xA5; 20]))));
        });
    }

    group.finish();
}

fn bench_machines_for_rom(c: &mut Criterion) {
    let mut group = c.benchmark_group("machines_for_rom");

    for size in [1_000u32, 10_000] {
        let image = build(&synthetic_dataset(size)).unwrap();
        let db = RomDb::open(image.bytes()).unwrap();
        let shared = db.find_rom(17, &sha1_of(0)).unwrap();
        let mut out = [MachineMatch::default(); 32];

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(db.machines_for_rom(black_box(shared), &mut out)));
        });
    }

    group.finish();
}

fn bench_attributes(c: &mut Criterion) {
    let image = build(&synthetic_dataset(10_000)).unwrap();
    let db = RomDb::open(image.bytes()).unwrap();
    let machine = MachineId(4_321);
    let mut buf = [0u8; 256];

    c.bench_function("machine_name", |b| {
        b.iter(|| black_box(db.machine_name(black_box(machine))));
    });
    c.bench_function("machine_description", |b| {
        b.iter(|| black_box(db.machine_description(black_box(machine), &mut buf)));
    });
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for size in [1_000u32, 10_000] {
        let ds = synthetic_dataset(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &ds, |b, ds| {
            b.iter(|| black_box(build(ds).unwrap()));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion group registration
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_find_rom,
    bench_machines_for_rom,
    bench_attributes,
    bench_build,
);
criterion_main!(benches);
