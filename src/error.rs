//! Error types for the image builder and query engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Invariant violation found while building an image. Fatal to the build;
/// no bytes are emitted.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid build config: {0}")]
    InvalidConfig(String),

    #[error("Duplicate {entity} id {id}")]
    DuplicateId { entity: &'static str, id: u32 },

    #[error("{entity} {id}: {field} references missing {target} id {missing}")]
    DanglingReference {
        entity: &'static str,
        id: u32,
        field: &'static str,
        target: &'static str,
        missing: u32,
    },

    #[error("ROM {rom_id}: size {size} is not a power of two")]
    InvalidRomSize { rom_id: u32, size: u64 },

    #[error("ROM {rom_id}: size exponent {exponent} outside {min}..={max}")]
    SizeExponentOutOfRange {
        rom_id: u32,
        exponent: u8,
        min: u8,
        max: u8,
    },

    #[error("ROMs {first} and {second} share size exponent {size_exponent} and SHA-1 {sha1}")]
    DuplicateRom {
        first: u32,
        second: u32,
        size_exponent: u8,
        sha1: String,
    },

    #[error("{table} table has {count} entries (limit {limit})")]
    TableOverflow {
        table: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("Machine {machine_id}: description is {len} bytes (limit {limit})")]
    DescriptionTooLong {
        machine_id: u32,
        len: usize,
        limit: usize,
    },

    #[error("Machine {machine_id}: description compression failed: {source}")]
    Compression {
        machine_id: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Machine index {machine}: compressed description does not inflate to its original text")]
    MalformedDescription { machine: u32 },

    #[error("Machine index {machine}: description range overlaps machine index {other}")]
    OverlappingDescriptions { machine: u32, other: u32 },

    #[error("Machine index {machine}: description range {offset}+{len} exceeds blob of {blob_len} bytes")]
    DescriptionOutOfBounds {
        machine: u32,
        offset: u32,
        len: u16,
        blob_len: usize,
    },

    #[error("ROM index {index} is not strictly after its predecessor")]
    UnsortedRoms { index: u32 },

    #[error("Association index {index} is out of order")]
    UnsortedAssociations { index: u32 },

    #[error("{table} index {index}: {field} = {value} is out of range (count {count})")]
    ReferenceOutOfRange {
        table: &'static str,
        index: u32,
        field: &'static str,
        value: u32,
        count: u32,
    },

    #[error("Image of {0} bytes exceeds 32-bit offset space")]
    ImageTooLarge(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image rejected at open time. No queries are possible against it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    #[error("Not a romdex image: expected RDEX, got {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("Unsupported image version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("Image truncated: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Corrupt image: {0}")]
    Corrupt(&'static str),
}

/// Non-fatal failure of `machine_description`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionError {
    #[error("No such machine")]
    NoSuchMachine,

    #[error("Buffer too small: description needs {required} bytes")]
    InsufficientBuffer { required: usize },

    #[error("Compressed description is corrupt")]
    Corrupt,
}

/// Crate-level error for file-backed operations (dataset loading, config,
/// image files).
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Open failed: {0}")]
    Open(#[from] OpenError),

    #[error("Description error: {0}")]
    Description(#[from] DescriptionError),
}

impl Error {
    /// Stable machine-readable code for tooling.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "IO",
            Error::Json(_) => "JSON",
            Error::Config(_) => "INVALID_CONFIG",
            Error::Build(_) => "BUILD_FAILED",
            Error::Open(OpenError::BadMagic { .. }) => "BAD_MAGIC",
            Error::Open(OpenError::UnsupportedVersion { .. }) => "UNSUPPORTED_VERSION",
            Error::Open(OpenError::Truncated { .. }) => "TRUNCATED",
            Error::Open(OpenError::Corrupt(_)) => "CORRUPT_IMAGE",
            Error::Description(DescriptionError::InsufficientBuffer { .. }) => "INSUFFICIENT_BUFFER",
            Error::Description(_) => "DESCRIPTION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: Error = OpenError::BadMagic { found: *b"XXXX" }.into();
        assert_eq!(err.code(), "BAD_MAGIC");

        let err: Error = DescriptionError::InsufficientBuffer { required: 12 }.into();
        assert_eq!(err.code(), "INSUFFICIENT_BUFFER");

        let err = Error::Config("min > max".into());
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_build_error_names_record() {
        let err = BuildError::DanglingReference {
            entity: "machine",
            id: 7,
            field: "clone_of",
            target: "machine",
            missing: 99,
        };
        let msg = err.to_string();
        assert!(msg.contains("machine 7"));
        assert!(msg.contains("99"));
    }
}
