//! Index-based binary search over records that are read in place.
//!
//! The slice helpers in `std` need a `&[T]`; image tables are raw bytes, so
//! these work on index ranges and a probe closure instead.

use std::cmp::Ordering;

/// First index in `lo..hi` for which `is_before` is false. `is_before` must
/// be true for a prefix of the range and false for the rest.
#[inline]
pub(crate) fn partition_point(mut lo: u32, mut hi: u32, mut is_before: impl FnMut(u32) -> bool) -> u32 {
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if is_before(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Index in `lo..hi` whose probe compares `Equal`, for a range sorted in
/// ascending order. `probe` returns how the record at an index compares to
/// the needle.
#[inline]
pub(crate) fn find(mut lo: u32, mut hi: u32, mut probe: impl FnMut(u32) -> Ordering) -> Option<u32> {
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match probe(mid) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Some(mid),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORTED: [u32; 9] = [1, 3, 3, 3, 5, 8, 8, 13, 21];

    #[test]
    fn test_partition_point_matches_std() {
        for needle in 0..25 {
            let ours = partition_point(0, SORTED.len() as u32, |i| SORTED[i as usize] < needle);
            assert_eq!(ours as usize, SORTED.partition_point(|&v| v < needle), "needle {needle}");
        }
    }

    #[test]
    fn test_partition_point_subrange() {
        assert_eq!(partition_point(4, 9, |i| SORTED[i as usize] <= 8), 7);
        assert_eq!(partition_point(4, 4, |_| true), 4);
    }

    #[test]
    fn test_find() {
        for (i, &v) in SORTED.iter().enumerate() {
            let hit = find(0, SORTED.len() as u32, |j| SORTED[j as usize].cmp(&v)).unwrap();
            assert_eq!(SORTED[hit as usize], v, "index {i}");
        }
        assert_eq!(find(0, SORTED.len() as u32, |j| SORTED[j as usize].cmp(&4)), None);
        assert_eq!(find(0, 0, |_| Ordering::Equal), None);
    }
}
