//! Typo detection for literal grammar tokens
//!
//! Two tokens are "typo-equivalent" when their Levenshtein distance,
//! divided by their mean length, stays within a tolerance ratio. This lets
//! `"tume"` match `"time"` while keeping `"cat"` away from `"dog"`.

use crate::core::error::{AssistantError, Result};

/// Default maximum difference ratio for two tokens to count as a typo
pub const DEFAULT_TYPO_RATIO: f32 = 0.3;

/// Check whether two strings are close enough to be treated as equal
///
/// # Arguments
/// * `a`, `b` - The strings to compare (compared as given, case-sensitive)
/// * `ratio` - Maximum allowed `distance / mean length`, in `[0, 1]`
///
/// # Returns
/// `true` if the normalized edit distance is within `ratio`
pub fn check_typo(a: &str, b: &str, ratio: f32) -> Result<bool> {
    Ok(TypoTolerance::new(ratio)?.accepts(a, b))
}

/// A validated typo tolerance ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypoTolerance {
    ratio: f32,
}

impl TypoTolerance {
    /// Create a tolerance, rejecting ratios outside `[0, 1]`
    pub fn new(ratio: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(AssistantError::InvalidRatio(ratio));
        }
        Ok(Self { ratio })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Returns true if `a` and `b` are typo-equivalent under this tolerance
    pub fn accepts(&self, a: &str, b: &str) -> bool {
        let len_a = a.chars().count();
        let len_b = b.chars().count();
        if len_a + len_b == 0 {
            return true;
        }

        let distance = levenshtein_distance(a, b) as f32;
        let mean_len = (len_a + len_b) as f32 / 2.0;
        distance / mean_len <= self.ratio
    }
}

impl Default for TypoTolerance {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_TYPO_RATIO,
        }
    }
}

/// Levenshtein distance over chars, keeping two rolling rows of `len(b) + 1`
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0usize; b_len + 1];

    for (i, a_char) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if a_char == *b_char { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("time", "tiem"), 2);
    }

    #[test]
    fn test_single_substitution_is_typo() {
        // 1 / 4 = 0.25
        assert!(check_typo("time", "tume", DEFAULT_TYPO_RATIO).unwrap());
        // 1 / 5.5
        assert!(check_typo("lights", "light", DEFAULT_TYPO_RATIO).unwrap());
    }

    #[test]
    fn test_distant_words_are_not_typos() {
        // 2 / 4 = 0.5
        assert!(!check_typo("time", "tiem", DEFAULT_TYPO_RATIO).unwrap());
        assert!(!check_typo("cat", "dog", DEFAULT_TYPO_RATIO).unwrap());
        // 1 / 3 > 0.3
        assert!(!check_typo("day", "dat", DEFAULT_TYPO_RATIO).unwrap());
    }

    #[test]
    fn test_ratio_bounds() {
        assert!(check_typo("a", "b", 1.0).unwrap());
        assert!(!check_typo("a", "b", 0.0).unwrap());
        assert!(check_typo("same", "same", 0.0).unwrap());
        assert!(matches!(
            check_typo("a", "b", 1.5),
            Err(AssistantError::InvalidRatio(_))
        ));
        assert!(TypoTolerance::new(-0.1).is_err());
    }

    #[test]
    fn test_empty_strings() {
        assert!(check_typo("", "", DEFAULT_TYPO_RATIO).unwrap());
        assert!(!check_typo("", "abc", DEFAULT_TYPO_RATIO).unwrap());
    }

    proptest! {
        #[test]
        fn prop_check_typo_is_pure(a in "[a-z]{0,12}", b in "[a-z]{0,12}", r in 0.0f32..=1.0) {
            let first = check_typo(&a, &b, r).unwrap();
            let second = check_typo(&a, &b, r).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_check_typo_is_symmetric(a in "[a-z]{0,12}", b in "[a-z]{0,12}") {
            prop_assert_eq!(
                check_typo(&a, &b, DEFAULT_TYPO_RATIO).unwrap(),
                check_typo(&b, &a, DEFAULT_TYPO_RATIO).unwrap()
            );
        }

        #[test]
        fn prop_identical_strings_always_match(a in "[a-z]{0,12}") {
            prop_assert!(check_typo(&a, &a, 0.0).unwrap());
        }
    }
}
