//! Description compression.
//!
//! Every distinct description text becomes one independent zlib stream in
//! the blob. Machines with identical text point at the same range.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::codec;
use crate::error::BuildError;
use crate::format::MachineRecord;

/// Longest description (and compressed stream) a machine record can address.
pub const MAX_DESCRIPTION_LEN: usize = u16::MAX as usize;

/// Compressed descriptions, ready to be appended as the last section.
#[derive(Debug, Default)]
pub(crate) struct DescriptionBlob {
    pub bytes: Vec<u8>,
    /// Distinct texts stored.
    pub unique: usize,
    /// Machines that reuse another machine's range.
    pub shared: usize,
    /// Sum of original lengths over distinct texts.
    pub original_bytes: usize,
}

/// Compress `descriptions` (one entry per dense machine, upstream id
/// alongside for error reporting) and fill in the machines' description
/// fields.
pub(crate) fn compress_descriptions(
    descriptions: &[(u32, Option<&str>)],
    machines: &mut [MachineRecord],
    level: u32,
    parallel: bool,
) -> Result<DescriptionBlob, BuildError> {
    debug_assert_eq!(descriptions.len(), machines.len());

    // Distinct texts in first-appearance order, with the upstream id of the
    // first machine that carries each.
    let mut slot_of: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<(u32, &str)> = Vec::new();
    let mut slots: Vec<Option<usize>> = Vec::with_capacity(descriptions.len());
    for &(machine_id, text) in descriptions {
        let slot = match text {
            Some(text) => {
                if text.len() > MAX_DESCRIPTION_LEN {
                    return Err(BuildError::DescriptionTooLong {
                        machine_id,
                        len: text.len(),
                        limit: MAX_DESCRIPTION_LEN,
                    });
                }
                let next = unique.len();
                let slot = *slot_of.entry(text).or_insert(next);
                if slot == next {
                    unique.push((machine_id, text));
                }
                Some(slot)
            }
            None => None,
        };
        slots.push(slot);
    }

    let compress_one = |&(machine_id, text): &(u32, &str)| {
        codec::compress(text.as_bytes(), level)
            .map_err(|source| BuildError::Compression { machine_id, source })
    };
    let compressed: Vec<Result<Vec<u8>, BuildError>> = if parallel && unique.len() > 1 {
        unique.par_iter().map(compress_one).collect()
    } else {
        unique.iter().map(compress_one).collect()
    };

    let mut blob = DescriptionBlob {
        unique: unique.len(),
        ..DescriptionBlob::default()
    };
    let mut ranges: Vec<(u32, u16, u16)> = Vec::with_capacity(unique.len());
    for (&(machine_id, text), stream) in unique.iter().zip(compressed) {
        let stream = stream?;
        if stream.len() > MAX_DESCRIPTION_LEN {
            return Err(BuildError::DescriptionTooLong {
                machine_id,
                len: stream.len(),
                limit: MAX_DESCRIPTION_LEN,
            });
        }
        let offset = u32::try_from(blob.bytes.len())
            .map_err(|_| BuildError::ImageTooLarge(blob.bytes.len()))?;
        ranges.push((offset, stream.len() as u16, text.len() as u16));
        blob.original_bytes += text.len();
        blob.bytes.extend_from_slice(&stream);
    }

    for (record, slot) in machines.iter_mut().zip(&slots) {
        if let Some(slot) = *slot {
            let (offset, len, original_len) = ranges[slot];
            record.desc_offset = offset;
            record.desc_len = len;
            record.desc_original_len = original_len;
        }
    }
    blob.shared = slots.iter().filter(|s| s.is_some()).count() - unique.len();

    tracing::debug!(
        "compressed {} descriptions ({} shared): {} -> {} bytes",
        blob.unique,
        blob.shared,
        blob.original_bytes,
        blob.bytes.len()
    );
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machines(n: usize) -> Vec<MachineRecord> {
        (0..n).map(|i| MachineRecord::new(i as u32)).collect()
    }

    fn inflate(blob: &[u8], record: &MachineRecord) -> String {
        let start = record.desc_offset as usize;
        let stream = &blob[start..start + record.desc_len as usize];
        let mut out = vec![0u8; record.desc_original_len as usize];
        let n = codec::inflate_into(stream, &mut out).unwrap();
        assert_eq!(n, out.len());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_identical_texts_share_range() {
        let input = [
            (1, Some("Kaiser Knuckle")),
            (2, None),
            (3, Some("Dan-Ku-Ga")),
            (4, Some("Kaiser Knuckle")),
        ];
        let mut records = machines(4);
        let blob = compress_descriptions(&input, &mut records, 9, false).unwrap();

        assert_eq!(blob.unique, 2);
        assert_eq!(blob.shared, 1);
        assert!(!records[1].has_description());
        assert_eq!(records[0].desc_offset, records[3].desc_offset);
        assert_eq!(records[0].desc_len, records[3].desc_len);
        assert_eq!(records[2].desc_offset, u32::from(records[0].desc_len));
        assert_eq!(inflate(&blob.bytes, &records[0]), "Kaiser Knuckle");
        assert_eq!(inflate(&blob.bytes, &records[2]), "Dan-Ku-Ga");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let texts: Vec<String> = (0..64).map(|i| format!("Machine number {i} (rev {})", i % 5)).collect();
        let input: Vec<(u32, Option<&str>)> = texts.iter().enumerate().map(|(i, t)| (i as u32, Some(t.as_str()))).collect();

        let mut seq = machines(input.len());
        let mut par = machines(input.len());
        let a = compress_descriptions(&input, &mut seq, 9, false).unwrap();
        let b = compress_descriptions(&input, &mut par, 9, true).unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_too_long_rejected() {
        let text = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        let mut records = machines(1);
        let err = compress_descriptions(&[(42, Some(&text))], &mut records, 9, false).unwrap_err();
        assert!(matches!(err, BuildError::DescriptionTooLong { machine_id: 42, .. }));
    }

    #[test]
    fn test_no_descriptions() {
        let mut records = machines(2);
        let blob = compress_descriptions(&[(1, None), (2, None)], &mut records, 9, true).unwrap();
        assert!(blob.bytes.is_empty());
        assert_eq!(blob.shared, 0);
    }
}
