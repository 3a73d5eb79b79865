//! Binary image format shared by the builder and the query engine.
//!
//! ```text
//! [ImageHeader]                72 bytes
//! [size index]                 8 bytes per size exponent in min..=max
//! [ROM records]                28 bytes each, sorted by (size exponent, SHA-1)
//! [machine records]            21 bytes each
//! [association records]        9 bytes each, sorted by (rom, machine, name)
//! [manufacturer records]       3 bytes each
//! [ROM-name records]           3 bytes each
//! [string table]               offsets + UTF-8 data
//! [descriptions blob]          independent zlib streams
//! ```

pub mod records;
pub mod string_table;
pub mod types;

pub use records::{
    AssociationRecord, MachineRecord, RomRecord, ASSOCIATION_RECORD_SIZE, MACHINE_RECORD_SIZE,
    NAME_RECORD_SIZE, ROM_RECORD_SIZE,
};
pub use string_table::{StringTable, StringTableView};
pub use types::*;
