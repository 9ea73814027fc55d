//! Masked pattern search over a byte region
//!
//! The primary search is Boyer-Moore-Horspool adapted to wildcard masks.
//! When it reports nothing, an exhaustive one-byte-step scan runs over the
//! same region, so an occurrence is never missed.

use memchr::memchr_iter;

use crate::pattern::Pattern;

/// Per-byte shift distances for [`horspool`].
#[derive(Clone)]
pub struct SkipTable {
    shifts: [usize; 256],
    len: usize,
    /// Largest shift that cannot jump over a wildcard-aligned match.
    max_shift: usize,
    tail_is_wildcard: bool,
}

impl SkipTable {
    /// Build the table for `pattern`.
    ///
    /// Every entry starts at the pattern length. Each literal byte at
    /// position `i` (the final position excluded) sets its entry to
    /// `len - 1 - i`, later positions overwriting earlier ones.
    pub fn build(pattern: &Pattern) -> Self {
        let len = pattern.len();
        let mut shifts = [len; 256];
        let mut max_shift = len;

        for i in 0..len.saturating_sub(1) {
            if pattern.is_literal(i) {
                shifts[pattern.bytes()[i] as usize] = len - 1 - i;
            } else {
                max_shift = len - 1 - i;
            }
        }

        Self {
            shifts,
            len,
            max_shift,
            tail_is_wildcard: len > 0 && !pattern.is_literal(len - 1),
        }
    }

    /// Raw table entry for `byte`
    #[inline]
    pub fn get(&self, byte: u8) -> usize {
        self.shifts[byte as usize]
    }

    /// Shift to apply after a mismatch, given the haystack byte aligned with
    /// the pattern's last position.
    #[inline]
    pub fn shift_for(&self, tail: u8) -> usize {
        if self.tail_is_wildcard {
            return 1;
        }
        self.get(tail).min(self.max_shift).max(1)
    }

    /// Entries that differ from the default (pattern length)
    pub fn non_default(&self) -> Vec<(u8, usize)> {
        (0..=u8::MAX)
            .filter(|&b| self.shifts[b as usize] != self.len)
            .map(|b| (b, self.shifts[b as usize]))
            .collect()
    }
}

impl std::fmt::Debug for SkipTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipTable")
            .field("non_default", &self.non_default())
            .field("max_shift", &self.max_shift)
            .field("tail_is_wildcard", &self.tail_is_wildcard)
            .finish()
    }
}

/// Find the first occurrence of `pattern` in `haystack`.
///
/// Runs [`horspool`] and falls back to [`exhaustive`] if it finds nothing.
/// Returns the offset of the match within `haystack`.
pub fn find(haystack: &[u8], pattern: &Pattern, table: &SkipTable) -> Option<usize> {
    horspool(haystack, pattern, table).or_else(|| exhaustive(haystack, pattern))
}

/// Masked Boyer-Moore-Horspool search.
///
/// Compares from the last pattern position backwards. Wildcards always
/// agree. A wildcard in the last position forces a one-byte shift.
pub fn horspool(haystack: &[u8], pattern: &Pattern, table: &SkipTable) -> Option<usize> {
    let len = pattern.len();
    if len == 0 {
        return Some(0);
    }
    let last = haystack.len().checked_sub(len)?;
    let bytes = pattern.bytes();
    let mask = pattern.mask();

    let mut pos = 0;
    while pos <= last {
        let window = &haystack[pos..pos + len];
        if (0..len).rev().all(|i| !mask[i] || window[i] == bytes[i]) {
            return Some(pos);
        }
        pos += table.shift_for(window[len - 1]);
    }

    None
}

/// Exhaustive masked scan, one byte at a time.
pub fn exhaustive(haystack: &[u8], pattern: &Pattern) -> Option<usize> {
    if pattern.is_empty() {
        return Some(0);
    }
    let last = haystack.len().checked_sub(pattern.len())?;
    (0..=last).find(|&pos| pattern.matches_at(haystack, pos))
}

/// Every occurrence of `pattern`, in ascending order.
///
/// Candidates are located with `memchr` on the first literal byte; an
/// all-wildcard pattern matches at every position.
pub fn find_all(haystack: &[u8], pattern: &Pattern) -> Vec<usize> {
    if pattern.is_empty() {
        return Vec::new();
    }
    let Some(last) = haystack.len().checked_sub(pattern.len()) else {
        return Vec::new();
    };

    match pattern.first_literal() {
        Some((index, value)) => memchr_iter(value, haystack)
            .filter_map(|hit| hit.checked_sub(index))
            .take_while(|&pos| pos <= last)
            .filter(|&pos| pattern.matches_at(haystack, pos))
            .collect(),
        None => (0..=last).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(haystack: &[u8], signature: &str) -> (Option<usize>, Option<usize>) {
        let pattern = Pattern::compile(signature);
        let table = SkipTable::build(&pattern);
        (
            horspool(haystack, &pattern, &table),
            exhaustive(haystack, &pattern),
        )
    }

    #[test]
    fn test_skip_table_values() {
        let pattern = Pattern::compile("AA BB ?? AA CC");
        let table = SkipTable::build(&pattern);
        // Last literal occurrence before the final position wins
        assert_eq!(table.get(0xAA), 1);
        assert_eq!(table.get(0xBB), 3);
        // Final position is excluded
        assert_eq!(table.get(0xCC), 5);
        assert_eq!(table.get(0x00), 5);
        assert_eq!(table.non_default(), vec![(0xAA, 1), (0xBB, 3)]);
    }

    #[test]
    fn test_skip_table_ignores_wildcards() {
        let pattern = Pattern::compile("?? ?? 90");
        let table = SkipTable::build(&pattern);
        // Wildcards hold 0x00 but must not touch its entry
        assert_eq!(table.get(0x00), 3);
        assert!(table.non_default().is_empty());
    }

    #[test]
    fn test_concrete_region() {
        let region = [0x10, 0xAA, 0xBB, 0x10, 0xCC, 0xBB];
        assert_eq!(search(&region, "10 ? BB"), (Some(0), Some(0)));
    }

    #[test]
    fn test_all_wildcards_match_first_position() {
        let region = [0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(search(&region, "?? ??"), (Some(0), Some(0)));
        assert_eq!(find_all(&region, &Pattern::compile("?? ??")), vec![0, 1, 2]);
    }

    #[test]
    fn test_pattern_longer_than_region() {
        let region = [0x01, 0x02];
        assert_eq!(search(&region, "01 02 03"), (None, None));
        assert!(find_all(&region, &Pattern::compile("01 02 03")).is_empty());
    }

    #[test]
    fn test_match_at_region_end() {
        let region = [0x00, 0x00, 0x00, 0x41, 0x42];
        assert_eq!(search(&region, "41 42"), (Some(3), Some(3)));
    }

    #[test]
    fn test_no_match() {
        let region = [0x00; 64];
        assert_eq!(search(&region, "00 01"), (None, None));
    }

    #[test]
    fn test_single_occurrence_agrees() {
        let mut region = vec![0x90u8; 4096];
        region[3000..3006].copy_from_slice(&[0x48, 0x8B, 0x05, 0x11, 0x22, 0xC3]);
        assert_eq!(search(&region, "48 8B ?? ?? ?? C3"), (Some(3000), Some(3000)));
    }

    #[test]
    fn test_trailing_wildcard_shifts_by_one() {
        let region = [0x00, 0x00, 0xE8, 0x01, 0x02];
        assert_eq!(search(&region, "E8 ??"), (Some(2), Some(2)));
    }

    #[test]
    fn test_interior_wildcard_keeps_first_occurrence() {
        // Matches at 1 and 4; an unclamped shift would jump from 0 to 2
        let region = [0x00, 0x01, 0xBB, 0x02, 0x03, 0xBB];
        assert_eq!(search(&region, "?? BB"), (Some(1), Some(1)));
    }

    #[test]
    fn test_find_all_returns_every_match() {
        let region = [0x10, 0xAA, 0xBB, 0x10, 0xCC, 0xBB, 0x10];
        let pattern = Pattern::compile("10 ? BB");
        assert_eq!(find_all(&region, &pattern), vec![0, 3]);
    }

    #[test]
    fn test_find_all_with_leading_wildcard() {
        let region = [0xBB, 0x00, 0xBB, 0xBB];
        let pattern = Pattern::compile("?? BB");
        assert_eq!(find_all(&region, &pattern), vec![1, 2]);
    }

    #[test]
    fn test_find_uses_first_match() {
        let region = [0xC3, 0x55, 0x48, 0x89, 0xE5, 0x55, 0x48, 0x89, 0xE5];
        let pattern = Pattern::compile("55 48 89 E5");
        let table = SkipTable::build(&pattern);
        assert_eq!(find(&region, &pattern, &table), Some(1));
    }

    #[test]
    fn test_horspool_agrees_with_exhaustive() {
        let region: Vec<u8> = (0..2048u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        for start in [0usize, 7, 100, 1500, 2040] {
            let window = &region[start..start + 6];
            let signature = format!(
                "{:02X} ?? {:02X} {:02X} ?? {:02X}",
                window[0], window[2], window[3], window[5]
            );
            let (fast, slow) = search(&region, &signature);
            assert_eq!(fast, slow, "signature {}", signature);
            assert!(slow.unwrap() <= start);
        }
    }
}
