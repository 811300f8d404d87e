use std::collections::HashMap;

use crate::patcher::Patcher;

/// Bit rows are `u64`, so the locator can never handle patterns past 64
/// bytes no matter what `match_max_bits` says.
const ROW_BITS: usize = 64;

impl Patcher {
    /// Locate the best instance of `pattern` in `text` near `loc` with the
    /// bitap algorithm, scoring candidates by error count and distance from
    /// `loc`. Returns `None` when no candidate scores under
    /// [`Settings::match_threshold`](crate::Settings).
    pub fn match_bitap(
        &self,
        text: impl AsRef<[u8]>,
        pattern: impl AsRef<[u8]>,
        loc: usize,
    ) -> Option<usize> {
        let text = text.as_ref();
        let pattern = pattern.as_ref();
        let m = pattern.len();
        // The empty pattern is the dispatcher's business; past the row
        // width no mask can be built.
        if m == 0 || m > self.settings.match_max_bits.min(ROW_BITS) {
            return None;
        }

        let alphabet = self.match_alphabet(pattern);

        // Highest score beyond which we give up.
        let mut score_threshold = self.settings.match_threshold;
        // Is there a nearby exact match? (speedup)
        if let Some(exact) = index_from(text, pattern, loc) {
            score_threshold = self.bitap_score(0, exact as i64, loc, m).min(score_threshold);
            // What about in the other direction? (speedup)
            if let Some(exact) = last_index_through(text, pattern, loc + m) {
                score_threshold = self.bitap_score(0, exact as i64, loc, m).min(score_threshold);
            }
        }

        let match_mask = 1u64 << (m - 1);
        let mut best_loc: i64 = -1;

        let loc = loc as i64;
        let text_len = text.len() as i64;
        let mut bin_max = (m as i64) + text_len;
        let mut last_rd: Vec<u64> = Vec::new();
        for d in 0..m {
            // Binary search for how far from `loc` a candidate with d
            // errors may stray and still beat the threshold. Seeded with
            // the previous level's radius, which only shrinks.
            let mut bin_min = 0;
            let mut bin_mid = bin_max;
            while bin_min < bin_mid {
                if self.bitap_score(d, loc + bin_mid, loc as usize, m) <= score_threshold {
                    bin_min = bin_mid;
                } else {
                    bin_max = bin_mid;
                }
                bin_mid = (bin_max - bin_min) / 2 + bin_min;
            }
            bin_max = bin_mid;

            let mut start = (loc - bin_mid + 1).max(1);
            let finish = (loc + bin_mid).min(text_len) + m as i64;

            let mut rd = vec![0u64; (finish + 2) as usize];
            rd[(finish + 1) as usize] = (1u64 << d) - 1;
            let mut j = finish;
            while j >= start {
                let char_match = if text_len <= j - 1 {
                    // Out of range.
                    0
                } else {
                    alphabet.get(&text[(j - 1) as usize]).copied().unwrap_or(0)
                };
                rd[j as usize] = if d == 0 {
                    // First pass: exact match.
                    ((rd[(j + 1) as usize] << 1) | 1) & char_match
                } else {
                    // Subsequent passes: fuzzy match.
                    ((rd[(j + 1) as usize] << 1) | 1) & char_match
                        | (((last_rd[(j + 1) as usize] | last_rd[j as usize]) << 1) | 1)
                        | last_rd[(j + 1) as usize]
                };
                if rd[j as usize] & match_mask != 0 {
                    let score = self.bitap_score(d, j - 1, loc as usize, m);
                    // This match will almost certainly be better than any
                    // existing match, but check anyway.
                    if score <= score_threshold {
                        score_threshold = score;
                        best_loc = j - 1;
                        if best_loc > loc {
                            // When passing loc, don't exceed the current
                            // distance from loc.
                            start = (2 * loc - best_loc).max(1);
                        } else {
                            // Already passed loc; downhill from here.
                            break;
                        }
                    }
                }
                j -= 1;
            }
            if self.bitap_score(d + 1, loc, loc as usize, m) > score_threshold {
                // No hope for a better match at higher error levels.
                break;
            }
            last_rd = rd;
        }

        (best_loc >= 0).then(|| best_loc as usize)
    }

    /// Build the per-byte bitmask table for `pattern`: bit `m - 1 - i` of
    /// a byte's mask is set iff the byte occurs at position `i`. Bytes
    /// absent from the table have mask 0.
    pub fn match_alphabet(&self, pattern: impl AsRef<[u8]>) -> HashMap<u8, u64> {
        let pattern = pattern.as_ref();
        let mut alphabet = HashMap::new();
        for (i, &byte) in pattern.iter().enumerate() {
            *alphabet.entry(byte).or_insert(0) |= 1u64 << (pattern.len() - i - 1);
        }
        alphabet
    }

    /// Score a candidate with `errors` errors at position `x` against the
    /// expected position `loc`: error fraction plus distance penalty, both
    /// weighted equally at `match_distance`. Lower is better; 0 is perfect.
    fn bitap_score(&self, errors: usize, x: i64, loc: usize, pattern_len: usize) -> f64 {
        let accuracy = errors as f64 / pattern_len as f64;
        let proximity = (loc as i64 - x).unsigned_abs() as f64;
        if self.settings.match_distance == 0 {
            // Dodge a divide by zero.
            if proximity == 0.0 {
                return accuracy;
            }
            return 1.0;
        }
        accuracy + proximity / self.settings.match_distance as f64
    }
}

/// First occurrence of `pattern` in `text` at or after `from`.
fn index_from(text: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
    crate::diff::engine::sub_index_from(text, pattern, from.min(text.len()))
}

/// Last occurrence of `pattern` in `text` starting at or before `through`.
fn last_index_through(text: &[u8], pattern: &[u8], through: usize) -> Option<usize> {
    let end = if through >= text.len() {
        text.len()
    } else {
        through + 1
    };
    let haystack = &text[..end];
    if pattern.is_empty() {
        return Some(haystack.len());
    }
    if pattern.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(pattern.len())
        .rposition(|window| window == pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patcher() -> Patcher {
        Patcher::new()
    }

    #[test]
    fn alphabet_masks() {
        let p = patcher();
        let alphabet = p.match_alphabet("abc");
        assert_eq!(alphabet[&b'a'], 4);
        assert_eq!(alphabet[&b'b'], 2);
        assert_eq!(alphabet[&b'c'], 1);

        let alphabet = p.match_alphabet("abcaba");
        assert_eq!(alphabet[&b'a'], 37);
        assert_eq!(alphabet[&b'b'], 18);
        assert_eq!(alphabet[&b'c'], 8);
    }

    #[test]
    fn exact_fuzzy_matches() {
        let p = patcher();
        assert_eq!(p.match_bitap("abcdefghijk", "fgh", 5), Some(5));
        assert_eq!(p.match_bitap("abcdefghijk", "fgh", 0), Some(5));
    }

    #[test]
    fn fuzzy_matches_with_errors() {
        let p = patcher();
        assert_eq!(p.match_bitap("abcdefghijk", "efxhi", 0), Some(4));
        assert_eq!(p.match_bitap("abcdefghijk", "cdefxyhijk", 5), Some(2));
        assert_eq!(p.match_bitap("abcdefghijk", "bxy", 1), None);
    }

    #[test]
    fn overflow_sized_pattern() {
        let p = patcher();
        // 123456789xx0 has 12 bytes; well inside the row width.
        assert_eq!(p.match_bitap("123456789xx0", "3456789x0", 2), Some(2));
        // Past the row width no match can be reported.
        let long = "x".repeat(65);
        assert_eq!(p.match_bitap(long.as_str(), long.as_str(), 0), None);
    }

    #[test]
    fn threshold_tightens_and_loosens() {
        let mut p = patcher();
        p.settings_mut().match_threshold = 0.4;
        assert_eq!(p.match_bitap("abcdefghijk", "efxyhi", 1), Some(4));

        p.settings_mut().match_threshold = 0.3;
        assert_eq!(p.match_bitap("abcdefghijk", "efxyhi", 1), None);

        p.settings_mut().match_threshold = 0.0;
        assert_eq!(p.match_bitap("abcdefghijk", "bcdef", 1), Some(1));
    }

    #[test]
    fn distance_weighs_proximity() {
        let mut p = patcher();
        p.settings_mut().match_distance = 10; // strict location
        assert_eq!(
            p.match_bitap("abcdefghijklmnopqrstuvwxyz", "abcdefg", 24),
            None
        );
        assert_eq!(
            p.match_bitap("abcdefghijklmnopqrstuvwxyz", "abcdxxefg", 1),
            Some(0)
        );

        p.settings_mut().match_distance = 1000; // loose location
        assert_eq!(
            p.match_bitap("abcdefghijklmnopqrstuvwxyz", "abcdefg", 24),
            Some(0)
        );
    }

    #[test]
    fn score_is_monotone_in_errors_and_distance() {
        let p = patcher();
        let m = 8;
        let mut previous = 0.0;
        for errors in 0..m {
            let score = p.bitap_score(errors, 10, 10, m);
            assert!(score >= previous);
            previous = score;
        }
        let mut previous = 0.0;
        for distance in 0..50 {
            let score = p.bitap_score(1, 10 + distance, 10, m);
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn zero_distance_requires_exact_location() {
        let mut p = patcher();
        p.settings_mut().match_distance = 0;
        assert_eq!(p.bitap_score(0, 5, 5, 4), 0.0);
        assert_eq!(p.bitap_score(0, 6, 5, 4), 1.0);
    }
}
