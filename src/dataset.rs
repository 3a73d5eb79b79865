//! Upstream relational dataset, the builder's only input.
//!
//! The dataset is already filtered, merged and deduplicated by the upstream
//! collaborator. Entities are keyed by upstream ids, which need not be dense
//! or ordered; the builder assigns dense indices.
//!
//! JSON shape:
//! ```json
//! {
//!   "manufacturers": [{"id": 1, "name": "Taito Corporation"}],
//!   "machines": [{"id": 10, "name": "kaiserkn", "description": "Kaiser Knuckle (Ver 2.1O 1994/07/29)",
//!                 "year": 1994, "manufacturer_id": 1, "clone_of": null, "rom_of": null}],
//!   "rom_names": [{"id": 5, "name": "d84-01.rom"}],
//!   "roms": [{"id": 100, "sha1": "48055822E0CEA228CDECF3D05AC24E50979B6F4D",
//!             "crc32": "9ad22149", "size": 2097152, "name_id": 5}],
//!   "machine_roms": [{"machine_id": 10, "rom_id": 100, "name_id": 5}]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::format::{Sha1, SHA1_LEN};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub manufacturers: Vec<Manufacturer>,
    #[serde(default)]
    pub machines: Vec<Machine>,
    #[serde(default)]
    pub rom_names: Vec<RomName>,
    #[serde(default)]
    pub roms: Vec<Rom>,
    #[serde(default)]
    pub machine_roms: Vec<MachineRom>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub manufacturer_id: Option<u32>,
    /// Parent machine when this is a clone.
    #[serde(default)]
    pub clone_of: Option<u32>,
    /// Machine whose ROM set this one draws from.
    #[serde(default)]
    pub rom_of: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomName {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rom {
    pub id: u32,
    #[serde(with = "sha1_hex")]
    pub sha1: Sha1,
    #[serde(with = "crc32_hex")]
    pub crc32: u32,
    /// Size in bytes; must be a power of two.
    pub size: u64,
    /// Canonical display name.
    #[serde(default)]
    pub name_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRom {
    pub machine_id: u32,
    pub rom_id: u32,
    /// Filename of the ROM inside this machine.
    #[serde(default)]
    pub name_id: Option<u32>,
}

impl Dataset {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let dataset: Self = serde_json::from_reader(reader)?;
        tracing::debug!(
            "loaded dataset {:?}: {} machines, {} roms, {} associations",
            path,
            dataset.machines.len(),
            dataset.roms.len(),
            dataset.machine_roms.len()
        );
        Ok(dataset)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Parse a 40-character hex SHA-1 (either case).
pub fn parse_sha1(hex_str: &str) -> Option<Sha1> {
    let mut out = [0u8; SHA1_LEN];
    hex::decode_to_slice(hex_str.trim(), &mut out).ok()?;
    Some(out)
}

mod sha1_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::format::Sha1;

    pub fn serialize<S: Serializer>(sha1: &Sha1, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode_upper(sha1))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Sha1, D::Error> {
        let s = String::deserialize(d)?;
        super::parse_sha1(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid SHA-1 hex: {s:?}")))
    }
}

mod crc32_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(crc: &u32, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{crc:08x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let s = String::deserialize(d)?;
        let mut out = [0u8; 4];
        hex::decode_to_slice(s.trim(), &mut out)
            .map_err(|e| serde::de::Error::custom(format!("invalid CRC32 hex {s:?}: {e}")))?;
        Ok(u32::from_be_bytes(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "manufacturers": [{"id": 1, "name": "Taito Corporation"}],
        "machines": [{"id": 10, "name": "kaiserkn", "description": "Kaiser Knuckle", "year": 1994,
                      "manufacturer_id": 1}],
        "rom_names": [{"id": 5, "name": "d84-01.rom"}],
        "roms": [{"id": 100, "sha1": "48055822e0cea228cdecf3d05ac24e50979b6f4d",
                  "crc32": "9AD22149", "size": 2097152, "name_id": 5}],
        "machine_roms": [{"machine_id": 10, "rom_id": 100, "name_id": 5}]
    }"#;

    #[test]
    fn test_parse_sample() {
        let ds = Dataset::from_json_str(SAMPLE).unwrap();
        assert_eq!(ds.machines[0].clone_of, None);
        assert_eq!(ds.machines[0].year, Some(1994));
        assert_eq!(ds.roms[0].sha1[0], 0x48);
        assert_eq!(ds.roms[0].sha1[19], 0x4D);
        assert_eq!(ds.roms[0].crc32, 0x9AD2_2149);
    }

    #[test]
    fn test_json_roundtrip() {
        let ds = Dataset::from_json_str(SAMPLE).unwrap();
        let json = serde_json::to_string(&ds).unwrap();
        assert!(json.contains("48055822E0CEA228CDECF3D05AC24E50979B6F4D"));
        assert!(json.contains("9ad22149"));
        assert_eq!(Dataset::from_json_str(&json).unwrap(), ds);
    }

    #[test]
    fn test_rejects_short_sha1() {
        let bad = SAMPLE.replace("48055822e0cea228", "4805");
        let err = Dataset::from_json_str(&bad).unwrap_err();
        assert!(err.to_string().contains("SHA-1"));
    }

    #[test]
    fn test_parse_sha1() {
        assert!(parse_sha1("48055822E0CEA228CDECF3D05AC24E50979B6F4D").is_some());
        assert!(parse_sha1("zz055822E0CEA228CDECF3D05AC24E50979B6F4D").is_none());
        assert!(parse_sha1("4805").is_none());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        let ds = Dataset::from_json_str(SAMPLE).unwrap();
        ds.write_to(&path).unwrap();
        assert_eq!(Dataset::read_from(&path).unwrap(), ds);
    }

    #[test]
    fn test_empty_object_is_empty_dataset() {
        assert_eq!(Dataset::from_json_str("{}").unwrap(), Dataset::default());
    }
}
