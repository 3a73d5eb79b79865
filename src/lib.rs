//! romdex: arcade ROM identification index.
//!
//! Two halves share one binary format:
//!
//! - [`builder`] flattens a relational [`Dataset`] (manufacturers, machines,
//!   ROMs, filenames, machine↔ROM links) into an immutable, pointer-free
//!   image. Offline, deterministic, all-or-nothing.
//! - [`engine`] answers identification (size + SHA-1 → ROM), relationship
//!   (ROM → machines) and attribute queries directly against the image
//!   bytes, without allocating.
//!
//! ```ignore
//! let image = romdex::build(&dataset)?;
//! let db = romdex::RomDb::open(image.bytes())?;
//! let rom = db.find_rom(21, &sha1).expect("known ROM");
//! let mut out = [romdex::MachineMatch::default(); 16];
//! let count = db.machines_for_rom(rom, &mut out);
//! ```

pub mod builder;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod format;

pub use builder::{build, BuildReport, Image, ImageBuilder, SectionSizes};
pub use config::BuildConfig;
pub use dataset::Dataset;
pub use engine::{cycle, EmbeddedImage, ImageFile, MachineMatch, MatchCount, RomDb};
pub use error::{BuildError, DescriptionError, Error, OpenError, Result};
pub use format::{MachineId, ManufacturerId, NameId, RomId, RomRecord, Sha1};
