//! Offline image builder.
//!
//! Flattens a [`Dataset`] into one immutable, pointer-free byte image:
//!
//! 1. `layout`: dense index assignment, sorting, string table, records
//! 2. `descriptions`: per-description zlib streams, identical texts shared
//! 3. `validate`: ordering, reference bounds, blob ranges, inflate checks
//! 4. emission: header + sections, concatenated in `format` order
//!
//! A build either yields a complete image or a [`BuildError`]; nothing is
//! written on failure. Identical input always produces identical bytes,
//! regardless of how many threads compress descriptions.

mod descriptions;
mod layout;
mod validate;

use std::path::Path;

use serde::Serialize;

use crate::config::BuildConfig;
use crate::dataset::Dataset;
use crate::engine::RomDb;
use crate::error::{BuildError, OpenError, Result};
use crate::format::*;

pub use descriptions::MAX_DESCRIPTION_LEN;

use self::layout::Layout;

/// Build an image with the default [`BuildConfig`].
pub fn build(dataset: &Dataset) -> std::result::Result<Image, BuildError> {
    ImageBuilder::default().build(dataset)
}

#[derive(Debug, Clone, Default)]
pub struct ImageBuilder {
    config: BuildConfig,
}

impl ImageBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn build(&self, dataset: &Dataset) -> std::result::Result<Image, BuildError> {
        let config = &self.config;
        config.check().map_err(BuildError::InvalidConfig)?;
        tracing::debug!(
            "building image: {} machines, {} roms, {} associations",
            dataset.machines.len(),
            dataset.roms.len(),
            dataset.machine_roms.len()
        );

        let mut layout = layout::lay_out(dataset, config)?;
        let blob = descriptions::compress_descriptions(
            &layout.descriptions,
            &mut layout.machines,
            config.compression_level,
            config.parallel,
        )?;
        validate::validate(&layout, &blob.bytes, config.parallel)?;

        let (bytes, header) = emit(&layout, &blob.bytes)?;
        let report = BuildReport::for_image(&header, &bytes);
        tracing::info!(
            "built image: {} bytes, {} roms, {} machines, {} associations, blake3 {}",
            report.image_bytes,
            report.roms,
            report.machines,
            report.associations,
            report.blake3
        );
        tracing::debug!("sections: {:?}", report.sections);

        Ok(Image {
            bytes,
            header,
            report,
        })
    }
}

/// Write header and sections into one buffer.
fn emit(layout: &Layout<'_>, blob: &[u8]) -> std::result::Result<(Vec<u8>, ImageHeader), BuildError> {
    let sizes = [
        layout.buckets.len() * SIZE_BUCKET_SIZE,
        layout.roms.len() * ROM_RECORD_SIZE,
        layout.machines.len() * MACHINE_RECORD_SIZE,
        layout.associations.len() * ASSOCIATION_RECORD_SIZE,
        layout.manufacturers.len() * NAME_RECORD_SIZE,
        layout.rom_names.len() * NAME_RECORD_SIZE,
        layout.strings.serialized_size(),
        blob.len(),
    ];
    let mut offsets = [0u32; 8];
    let mut cursor = HEADER_SIZE;
    for (offset, size) in offsets.iter_mut().zip(sizes) {
        *offset = u32::try_from(cursor).map_err(|_| BuildError::ImageTooLarge(cursor))?;
        cursor += size;
    }
    let image_len = u32::try_from(cursor).map_err(|_| BuildError::ImageTooLarge(cursor))?;

    let header = ImageHeader {
        magic: MAGIC,
        version: FORMAT_VERSION,
        min_size_exponent: layout.min_size_exponent,
        max_size_exponent: layout.max_size_exponent,
        manufacturer_count: layout.manufacturers.len() as u32,
        machine_count: layout.machines.len() as u32,
        rom_count: layout.roms.len() as u32,
        rom_name_count: layout.rom_names.len() as u32,
        association_count: layout.associations.len() as u32,
        string_count: layout.strings.len() as u32,
        size_index_offset: offsets[0],
        roms_offset: offsets[1],
        machines_offset: offsets[2],
        associations_offset: offsets[3],
        manufacturers_offset: offsets[4],
        rom_names_offset: offsets[5],
        strings_offset: offsets[6],
        descriptions_offset: offsets[7],
        descriptions_len: blob.len() as u32,
        image_len,
    };

    let mut out = Vec::with_capacity(cursor);
    header.write_to(&mut out)?;
    for bucket in &layout.buckets {
        bucket.write_to(&mut out)?;
    }
    for rom in &layout.roms {
        rom.write_to(&mut out)?;
    }
    for machine in &layout.machines {
        machine.write_to(&mut out)?;
    }
    for assoc in &layout.associations {
        assoc.write_to(&mut out)?;
    }
    for &string in layout.manufacturers.iter().chain(&layout.rom_names) {
        write_u24(&mut out, string)?;
    }
    layout.strings.write_to(&mut out)?;
    out.extend_from_slice(blob);
    debug_assert_eq!(out.len(), cursor);

    Ok((out, header))
}

// ── Image ──────────────────────────────────────────────────────────

/// A finished image: the bytes plus what was learned producing them.
#[derive(Debug, Clone)]
pub struct Image {
    bytes: Vec<u8>,
    header: ImageHeader,
    report: BuildReport,
}

impl Image {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Open a query view over the in-memory bytes.
    pub fn db(&self) -> std::result::Result<RomDb<'_>, OpenError> {
        RomDb::open(&self.bytes)
    }

    /// Write the image to `path`, replacing any existing file.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        // Readers never see a partially written image.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &self.bytes)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!("wrote {} bytes to {:?}", self.bytes.len(), path);
        Ok(())
    }
}

// ── Report ─────────────────────────────────────────────────────────

/// Byte size of each image section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionSizes {
    pub header: usize,
    pub size_index: usize,
    pub roms: usize,
    pub machines: usize,
    pub associations: usize,
    pub manufacturers: usize,
    pub rom_names: usize,
    pub strings: usize,
    pub descriptions: usize,
}

/// Counts, section sizes and content digest of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub image_bytes: usize,
    pub manufacturers: u32,
    pub machines: u32,
    pub roms: u32,
    pub rom_names: u32,
    pub associations: u32,
    pub strings: u32,
    pub min_size_exponent: u8,
    pub max_size_exponent: u8,
    pub sections: SectionSizes,
    /// BLAKE3 of the whole image, lowercase hex.
    pub blake3: String,
}

impl BuildReport {
    /// Describe an image from its header. Section sizes are the distances
    /// between consecutive section offsets.
    pub fn for_image(header: &ImageHeader, bytes: &[u8]) -> Self {
        let span = |from: u32, to: u32| to.saturating_sub(from) as usize;
        Self {
            image_bytes: bytes.len(),
            manufacturers: header.manufacturer_count,
            machines: header.machine_count,
            roms: header.rom_count,
            rom_names: header.rom_name_count,
            associations: header.association_count,
            strings: header.string_count,
            min_size_exponent: header.min_size_exponent,
            max_size_exponent: header.max_size_exponent,
            sections: SectionSizes {
                header: HEADER_SIZE,
                size_index: span(header.size_index_offset, header.roms_offset),
                roms: span(header.roms_offset, header.machines_offset),
                machines: span(header.machines_offset, header.associations_offset),
                associations: span(header.associations_offset, header.manufacturers_offset),
                manufacturers: span(header.manufacturers_offset, header.rom_names_offset),
                rom_names: span(header.rom_names_offset, header.strings_offset),
                strings: span(header.strings_offset, header.descriptions_offset),
                descriptions: header.descriptions_len as usize,
            },
            blake3: blake3::hash(bytes).to_hex().to_string(),
        }
    }
}
