//! Description codec.
//!
//! Each description is one self-contained zlib stream, so any single
//! description can be inflated without touching the others. Compression uses
//! `flate2`; inflation goes through `miniz_oxide`'s slice-to-slice decoder,
//! which keeps its state on the stack and never touches the heap.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Compress `text` into a standalone zlib stream.
pub fn compress(text: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(text.len() / 2 + 16), Compression::new(level));
    encoder.write_all(text)?;
    encoder.finish()
}

/// Inflate a zlib stream into `out`, returning the number of bytes written.
///
/// `None` when the stream is corrupt, fails its Adler-32 check, or does not
/// fit in `out`.
pub fn inflate_into(compressed: &[u8], out: &mut [u8]) -> Option<usize> {
    miniz_oxide::inflate::decompress_slice_iter_to_slice(
        out,
        std::iter::once(compressed),
        true,
        false,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"Kaiser Knuckle (Ver 2.1O 1994/07/29)";

    #[test]
    fn test_roundtrip() {
        let packed = compress(TEXT, 9).unwrap();
        let mut out = [0u8; 64];
        let n = inflate_into(&packed, &mut out).unwrap();
        assert_eq!(&out[..n], TEXT);
    }

    #[test]
    fn test_exact_fit() {
        let packed = compress(TEXT, 6).unwrap();
        let mut out = vec![0u8; TEXT.len()];
        assert_eq!(inflate_into(&packed, &mut out), Some(TEXT.len()));
        assert_eq!(out, TEXT);
    }

    #[test]
    fn test_output_too_small() {
        let packed = compress(TEXT, 9).unwrap();
        let mut out = [0u8; 8];
        assert_eq!(inflate_into(&packed, &mut out), None);
    }

    #[test]
    fn test_corrupt_stream() {
        let mut packed = compress(TEXT, 9).unwrap();
        let last = packed.len() - 1;
        packed[last] ^= 0xFF; // break the Adler-32 trailer
        let mut out = [0u8; 64];
        assert_eq!(inflate_into(&packed, &mut out), None);
        assert_eq!(inflate_into(&[0x78], &mut out), None);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(compress(TEXT, 9).unwrap(), compress(TEXT, 9).unwrap());
    }
}
