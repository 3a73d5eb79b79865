//! romdex - build and inspect ROM identification images
//!
//! Usage:
//!   romdex build <dataset.json> <image.bin> [--config <build.json>]
//!   romdex stats <image.bin>
//!   romdex lookup <image.bin> <size-exponent> <sha1-hex>
//!
//! Logging goes to stderr; --verbose turns on debug output.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing_subscriber::fmt;

use romdex::dataset::parse_sha1;
use romdex::{
    BuildConfig, BuildReport, Dataset, ImageBuilder, ImageFile, MachineMatch, RomDb,
};

/// Machines printed per ROM before the listing is cut short.
const LOOKUP_CAPACITY: usize = 64;

const USAGE: &str = "Usage:
  romdex build <dataset.json> <image.bin> [--config <build.json>]
  romdex stats <image.bin>
  romdex lookup <image.bin> <size-exponent> <sha1-hex>

Flags:
  -v, --verbose  Debug logging
  -V, --version  Print version information
  -h, --help     Print this help message";

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("romdex {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("romdex {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("{USAGE}");
        return Ok(());
    }

    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    // Positional arguments, with flags and their values removed.
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);
    let mut positional = Vec::new();
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
        } else if arg == "--config" {
            skip_next = true;
        } else if !arg.starts_with('-') {
            positional.push(arg.as_str());
        }
    }

    match positional.as_slice() {
        ["build", dataset, image] => cmd_build(Path::new(dataset), Path::new(image), config_path.as_deref()),
        ["stats", image] => cmd_stats(Path::new(image)),
        ["lookup", image, exponent, sha1] => cmd_lookup(Path::new(image), exponent, sha1),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}

fn cmd_build(dataset_path: &Path, image_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => BuildConfig::read_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BuildConfig::default(),
    };
    let dataset = Dataset::read_from(dataset_path)
        .with_context(|| format!("loading dataset {}", dataset_path.display()))?;

    let image = ImageBuilder::new(config).build(&dataset)?;
    image.write_to_file(image_path)?;
    print_report(image.report());
    Ok(())
}

fn cmd_stats(image_path: &Path) -> anyhow::Result<()> {
    let file = ImageFile::open(image_path)?;
    let db = file.db()?;
    print_report(&BuildReport::for_image(db.header(), db.bytes()));

    println!();
    println!("size buckets:");
    for (exponent, bucket) in db.size_buckets().filter(|(_, b)| !b.is_empty()) {
        println!("  2^{:<2} {:>10} bytes  {:>8} roms", exponent, size_bytes(exponent), bucket.len());
    }
    Ok(())
}

fn cmd_lookup(image_path: &Path, exponent: &str, sha1: &str) -> anyhow::Result<()> {
    let exponent: u8 = exponent
        .parse()
        .with_context(|| format!("size exponent {exponent:?} is not a number"))?;
    let Some(sha1) = parse_sha1(sha1) else {
        bail!("{sha1:?} is not a 40-character hex SHA-1");
    };

    let file = ImageFile::open(image_path)?;
    let db = file.db()?;
    let Some(rom) = db.find_rom(exponent, &sha1) else {
        println!("not found");
        return Ok(());
    };

    let record = db.rom(rom).context("ROM record unreadable")?;
    println!(
        "rom #{}  crc32 {:08x}  {} bytes  {}",
        rom.0,
        record.crc32,
        size_bytes(record.size_exponent),
        db.rom_filename(romdex::NameId(record.name)).unwrap_or("-")
    );

    let mut matches = [MachineMatch::default(); LOOKUP_CAPACITY];
    let count = db.machines_for_rom(rom, &mut matches);
    for m in &matches[..count.written] {
        print_machine(&db, m);
    }
    if count.is_truncated() {
        println!("  ... {} more", count.total - count.written);
    }
    Ok(())
}

fn size_bytes(exponent: u8) -> u64 {
    1u64.checked_shl(u32::from(exponent)).unwrap_or(0)
}

fn print_machine(db: &RomDb<'_>, m: &MachineMatch) {
    let name = db.machine_name(m.machine).unwrap_or("?");
    let filename = m.filename.and_then(|n| db.rom_filename(n)).unwrap_or("-");
    let year = db.machine_year(m.machine).filter(|&y| y != 0);
    let maker = db
        .machine_manufacturer(m.machine)
        .and_then(|id| db.manufacturer_name(id))
        .unwrap_or("");

    let mut description = vec![0u8; db.description_len(m.machine).unwrap_or(0)];
    let text = match db.machine_description(m.machine, &mut description) {
        Ok(n) => String::from_utf8_lossy(&description[..n]).into_owned(),
        Err(e) => format!("<{e}>"),
    };

    let parent = db
        .machine_clone_of(m.machine)
        .and_then(|p| db.machine_name(p))
        .map(|p| format!(" (clone of {p})"))
        .unwrap_or_default();

    match year {
        Some(year) => println!("  {name:<16} {filename:<16} {year} {maker}  {text}{parent}"),
        None => println!("  {name:<16} {filename:<16} ???? {maker}  {text}{parent}"),
    }
}

fn print_report(report: &BuildReport) {
    println!("image:         {} bytes", report.image_bytes);
    println!("blake3:        {}", report.blake3);
    println!("roms:          {}", report.roms);
    println!("machines:      {}", report.machines);
    println!("associations:  {}", report.associations);
    println!("manufacturers: {}", report.manufacturers);
    println!("rom names:     {}", report.rom_names);
    println!("strings:       {}", report.strings);
    if report.roms > 0 {
        println!("size range:    2^{}..=2^{}", report.min_size_exponent, report.max_size_exponent);
    }
    println!();
    println!("sections:");
    let s = &report.sections;
    for (name, size) in [
        ("header", s.header),
        ("size index", s.size_index),
        ("roms", s.roms),
        ("machines", s.machines),
        ("associations", s.associations),
        ("manufacturers", s.manufacturers),
        ("rom names", s.rom_names),
        ("strings", s.strings),
        ("descriptions", s.descriptions),
    ] {
        println!("  {name:<14} {size:>10}");
    }
}
