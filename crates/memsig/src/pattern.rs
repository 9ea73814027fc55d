//! Signature compiler
//!
//! Turns hand-written signatures such as `"48 8B ?? ?? 05"` into a byte
//! pattern with a parallel match mask. Parsing never fails: anything the
//! compiler cannot make sense of at the end of the string is dropped.

use std::fmt;

/// A compiled byte pattern.
///
/// `bytes` and `mask` always have the same length. Positions where `mask`
/// is `false` are wildcards; their byte value is `0` and is never compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<bool>,
}

impl Pattern {
    /// Compile a signature string.
    ///
    /// Tokens are separated by whitespace. `?` and `??` are wildcards; any
    /// other token is read as two hex characters. A lone trailing character
    /// ends parsing, and a token that is only partly hex keeps the value of
    /// its leading hex digit (a token with no hex prefix reads as `00`).
    pub fn compile(signature: &str) -> Self {
        let text = signature.as_bytes();
        let mut pattern = Self::default();
        let mut i = 0;

        while i < text.len() {
            let c = text[i];
            if c.is_ascii_whitespace() {
                i += 1;
                continue;
            }

            if c == b'?' {
                pattern.push_wildcard();
                i += if text.get(i + 1) == Some(&b'?') { 2 } else { 1 };
                continue;
            }

            let Some(&next) = text.get(i + 1) else {
                break;
            };
            pattern.push_literal(hex_prefix_value(c, next));
            i += 2;
        }

        pattern
    }

    /// Build a pattern directly from optional bytes (`None` = wildcard)
    pub fn from_options(bytes: &[Option<u8>]) -> Self {
        let mut pattern = Self::default();
        for byte in bytes {
            match byte {
                Some(value) => pattern.push_literal(*value),
                None => pattern.push_wildcard(),
            }
        }
        pattern
    }

    fn push_literal(&mut self, value: u8) {
        self.bytes.push(value);
        self.mask.push(true);
    }

    fn push_wildcard(&mut self) {
        self.bytes.push(0);
        self.mask.push(false);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Number of positions that must match exactly
    pub fn literal_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Whether position `index` is a literal byte
    #[inline]
    pub fn is_literal(&self, index: usize) -> bool {
        self.mask[index]
    }

    /// Index and value of the first literal position, if any
    pub fn first_literal(&self) -> Option<(usize, u8)> {
        self.mask
            .iter()
            .position(|&m| m)
            .map(|index| (index, self.bytes[index]))
    }

    /// Check whether the window of `haystack` starting at `offset` matches.
    ///
    /// Returns `false` when the window would run past the end of `haystack`.
    pub fn matches_at(&self, haystack: &[u8], offset: usize) -> bool {
        let Some(window) = offset
            .checked_add(self.len())
            .and_then(|end| haystack.get(offset..end))
        else {
            return false;
        };

        window
            .iter()
            .zip(self.bytes.iter().zip(&self.mask))
            .all(|(&actual, (&expected, &literal))| !literal || actual == expected)
    }
}

/// `strtoul`-style value of a two-character hex token: the longest valid
/// hex prefix wins, no valid prefix reads as zero.
fn hex_prefix_value(high: u8, low: u8) -> u8 {
    match ((high as char).to_digit(16), (low as char).to_digit(16)) {
        (Some(h), Some(l)) => (h * 16 + l) as u8,
        (Some(h), None) => h as u8,
        _ => 0,
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (byte, literal)) in self.bytes.iter().zip(&self.mask).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if *literal {
                write!(f, "{:02X}", byte)?;
            } else {
                f.write_str("??")?;
            }
        }
        Ok(())
    }
}

impl From<&str> for Pattern {
    fn from(signature: &str) -> Self {
        Self::compile(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_with_wildcards() {
        let pattern = Pattern::compile("10 ? BB");
        assert_eq!(pattern.bytes(), &[0x10, 0x00, 0xBB]);
        assert_eq!(pattern.mask(), &[true, false, true]);
        assert_eq!(pattern.literal_count(), 2);
    }

    #[test]
    fn test_compile_double_question_mark() {
        let pattern = Pattern::compile("48 8D 0D ?? ?? ?? ??");
        assert_eq!(pattern.len(), 7);
        assert_eq!(pattern.bytes()[..3], [0x48, 0x8D, 0x0D]);
        assert_eq!(pattern.mask(), &[true, true, true, false, false, false, false]);
    }

    #[test]
    fn test_compile_empty_and_blank() {
        assert!(Pattern::compile("").is_empty());
        assert!(Pattern::compile("   ").is_empty());
    }

    #[test]
    fn test_compile_lowercase_and_unseparated() {
        let pattern = Pattern::compile("ff0a??c3");
        assert_eq!(pattern.bytes(), &[0xFF, 0x0A, 0x00, 0xC3]);
        assert_eq!(pattern.mask(), &[true, true, false, true]);
    }

    #[test]
    fn test_compile_truncates_trailing_fragment() {
        let pattern = Pattern::compile("AA BB C");
        assert_eq!(pattern.bytes(), &[0xAA, 0xBB]);
        assert!(pattern.mask().iter().all(|&m| m));
    }

    #[test]
    fn test_compile_single_digit_token() {
        // "1 " is consumed as one token; the trailing "2" is a lone fragment
        let pattern = Pattern::compile("1 2");
        assert_eq!(pattern.bytes(), &[0x01]);
        assert_eq!(pattern.mask(), &[true]);
    }

    #[test]
    fn test_compile_non_hex_token_reads_as_zero() {
        let pattern = Pattern::compile("ZZ 90");
        assert_eq!(pattern.bytes(), &[0x00, 0x90]);
        assert_eq!(pattern.mask(), &[true, true]);
    }

    #[test]
    fn test_compile_triple_question_mark() {
        let pattern = Pattern::compile("???");
        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern.literal_count(), 0);
    }

    #[test]
    fn test_display_is_canonical() {
        let pattern = Pattern::compile("48 8b ? 05");
        assert_eq!(pattern.to_string(), "48 8B ?? 05");
        assert_eq!(Pattern::compile(&pattern.to_string()), pattern);
    }

    #[test]
    fn test_from_options() {
        let pattern = Pattern::from_options(&[Some(0xE8), None, Some(0x90)]);
        assert_eq!(pattern, Pattern::compile("E8 ?? 90"));
        assert_eq!(pattern.first_literal(), Some((0, 0xE8)));
    }

    #[test]
    fn test_matches_at() {
        let haystack = [0x10, 0xAA, 0xBB, 0x10, 0xCC, 0xBB];
        let pattern = Pattern::compile("10 ? BB");
        assert!(pattern.matches_at(&haystack, 0));
        assert!(!pattern.matches_at(&haystack, 1));
        assert!(pattern.matches_at(&haystack, 3));
        assert!(!pattern.matches_at(&haystack, 4));
        assert!(!pattern.matches_at(&haystack, usize::MAX));
    }
}
