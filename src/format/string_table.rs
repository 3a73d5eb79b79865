//! Index-addressed string table with O(1) lookup.
//!
//! All names in an image (machine names, manufacturer names, ROM filenames)
//! live in one deduplicated table, sorted lexicographically so that the same
//! set of names always produces the same bytes.
//!
//! Binary format:
//! ```text
//! [offsets: u32 LE x (string_count + 1)]   // offsets[i]..offsets[i+1] is string i
//! [data: u8 x offsets[string_count]]       // concatenated UTF-8, no terminators
//! ```
//!
//! `StringTable` is the build-side owner; `StringTableView` reads the same
//! bytes in place without copying.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;

/// Build-side string table: collect, then freeze into sorted order.
#[derive(Debug, Default)]
pub struct StringTable {
    /// Concatenated UTF-8 string bytes.
    data: Vec<u8>,
    /// Start offset of each string, plus one trailing end offset.
    offsets: Vec<u32>,
    /// String → index, for resolving references while laying out records.
    index: HashMap<String, u32>,
}

impl StringTable {
    /// Freeze a set of strings. Indices follow the set's sorted order.
    pub fn from_sorted(strings: BTreeSet<&str>) -> Self {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(strings.len() + 1);
        let mut index = HashMap::with_capacity(strings.len());

        for (idx, s) in strings.into_iter().enumerate() {
            debug_assert!(
                data.len() + s.len() < u32::MAX as usize,
                "String table data exceeds u32 range"
            );
            offsets.push(data.len() as u32);
            data.extend_from_slice(s.as_bytes());
            index.insert(s.to_string(), idx as u32);
        }
        offsets.push(data.len() as u32);

        Self {
            data,
            offsets,
            index,
        }
    }

    /// Index of a string that was part of the frozen set.
    pub fn index_of(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }

    /// Get a string by its 0-based index. O(1).
    pub fn get(&self, index: u32) -> Option<&str> {
        let i = index as usize;
        let start = *self.offsets.get(i)? as usize;
        let end = *self.offsets.get(i + 1)? as usize;
        std::str::from_utf8(self.data.get(start..end)?).ok()
    }

    /// Number of strings.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the table in binary format.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for &offset in &self.offsets {
            writer.write_all(&offset.to_le_bytes())?;
        }
        writer.write_all(&self.data)
    }

    /// Total byte size when serialized.
    pub fn serialized_size(&self) -> usize {
        self.offsets.len() * 4 + self.data.len()
    }
}

/// Zero-copy view over a serialized string table.
#[derive(Debug, Clone, Copy)]
pub struct StringTableView<'a> {
    offsets: &'a [u8],
    data: &'a [u8],
}

impl<'a> StringTableView<'a> {
    /// View `count` strings at the start of `bytes`. Returns `None` if the
    /// offset table or the data it describes does not fit.
    pub fn new(bytes: &'a [u8], count: u32) -> Option<Self> {
        let offsets_len = (count as usize).checked_add(1)?.checked_mul(4)?;
        let offsets = bytes.get(..offsets_len)?;
        let rest = &bytes[offsets_len..];
        let data_len = read_u32(offsets, count as usize)? as usize;
        let data = rest.get(..data_len)?;
        Some(Self { offsets, data })
    }

    /// Get a string by index. `None` when out of range or malformed.
    pub fn get(&self, index: u32) -> Option<&'a str> {
        let i = index as usize;
        let start = read_u32(self.offsets, i)? as usize;
        let end = read_u32(self.offsets, i.checked_add(1)?)? as usize;
        if start > end {
            return None;
        }
        std::str::from_utf8(self.data.get(start..end)?).ok()
    }

    /// Number of strings.
    pub fn len(&self) -> usize {
        self.offsets.len() / 4 - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes covered by the table.
    pub fn byte_len(&self) -> usize {
        self.offsets.len() + self.data.len()
    }
}

#[inline]
fn read_u32(bytes: &[u8], index: usize) -> Option<u32> {
    let at = index.checked_mul(4)?;
    let b = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(strings: &[&'static str]) -> StringTable {
        StringTable::from_sorted(strings.iter().copied().collect())
    }

    #[test]
    fn test_string_table_empty() {
        let st = table(&[]);
        assert_eq!(st.len(), 0);
        assert!(st.is_empty());
        assert_eq!(st.get(0), None);
        assert_eq!(st.serialized_size(), 4);
    }

    #[test]
    fn test_string_table_sorted_dedup() {
        let st = table(&["kaiserkn", "dankuga", "kaiserkn", "d84-01.rom"]);
        assert_eq!(st.len(), 3);
        assert_eq!(st.get(0), Some("d84-01.rom"));
        assert_eq!(st.get(1), Some("dankuga"));
        assert_eq!(st.get(2), Some("kaiserkn"));
        assert_eq!(st.index_of("dankuga"), Some(1));
        assert_eq!(st.index_of("gblchmp"), None);
    }

    #[test]
    fn test_string_table_view_roundtrip() {
        let st = table(&["Taito Corporation", "", "\u{30bf}\u{30a4}\u{30c8}\u{30fc}"]);
        let mut buf = Vec::new();
        st.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), st.serialized_size());

        let view = StringTableView::new(&buf, st.len() as u32).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.byte_len(), buf.len());
        for i in 0..3 {
            assert_eq!(view.get(i), st.get(i));
        }
        assert_eq!(view.get(0), Some(""));
        assert_eq!(view.get(3), None);
        assert_eq!(view.get(u32::MAX), None);
    }

    #[test]
    fn test_string_table_view_truncated() {
        let st = table(&["hello", "world"]);
        let mut buf = Vec::new();
        st.write_to(&mut buf).unwrap();

        // Cut into the offsets.
        assert!(StringTableView::new(&buf[..6], 2).is_none());
        // Cut into the data.
        assert!(StringTableView::new(&buf[..buf.len() - 1], 2).is_none());
    }

    #[test]
    fn test_string_table_view_rejects_bad_offsets() {
        // Two strings whose offsets go backwards: [0, 4, 2] over 2 data bytes.
        let mut buf = Vec::new();
        for offset in [0u32, 4, 2] {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf.extend_from_slice(b"ab");
        let view = StringTableView::new(&buf, 2).unwrap();
        assert_eq!(view.get(0), None); // 0..4 runs past the data
        assert_eq!(view.get(1), None); // 4..2 is inverted
    }

    #[test]
    fn test_string_table_view_invalid_utf8() {
        let mut buf = Vec::new();
        for offset in [0u32, 2] {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf.extend_from_slice(&[0xC3, 0x28]);
        let view = StringTableView::new(&buf, 1).unwrap();
        assert_eq!(view.get(0), None);
    }
}
