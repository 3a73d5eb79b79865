//! Image sources: compiled-in bytes and memory-mapped files.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use memmap2::Mmap;

use crate::engine::RomDb;
use crate::error::{OpenError, Result};

/// An image linked into the binary, opened on first use.
///
/// ```ignore
/// static ROMS: EmbeddedImage = EmbeddedImage::new(include_bytes!("roms.bin"));
///
/// let db = ROMS.db()?;
/// ```
pub struct EmbeddedImage {
    bytes: &'static [u8],
    db: OnceLock<std::result::Result<RomDb<'static>, OpenError>>,
}

impl EmbeddedImage {
    pub const fn new(bytes: &'static [u8]) -> Self {
        Self {
            bytes,
            db: OnceLock::new(),
        }
    }

    /// The opened image. Validation runs once; later calls return the
    /// cached outcome, including a cached error.
    pub fn db(&self) -> std::result::Result<RomDb<'static>, OpenError> {
        self.db.get_or_init(|| RomDb::open(self.bytes)).clone()
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.bytes
    }
}

/// A read-only memory map of an image file.
#[derive(Debug)]
pub struct ImageFile {
    mmap: Mmap,
    path: PathBuf,
}

impl ImageFile {
    /// Map `path` and validate it as an image.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // The file is treated as immutable for the lifetime of the map.
        let mmap = unsafe { Mmap::map(&file) }?;
        let db = RomDb::open(&mmap)?;
        tracing::debug!(
            "mapped {:?}: {} bytes, {} roms, {} machines",
            path,
            mmap.len(),
            db.rom_count(),
            db.machine_count()
        );
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Query view over the mapping. Only fails if the file changed under
    /// the map after `open`.
    pub fn db(&self) -> std::result::Result<RomDb<'_>, OpenError> {
        RomDb::open(&self.mmap)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}
