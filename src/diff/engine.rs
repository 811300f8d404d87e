use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::diff::ops::{Diff, Operation};
use crate::patcher::Patcher;

impl Patcher {
    /// Compute the diff transforming `text1` into `text2`.
    ///
    /// With `checklines` set, inputs larger than 100 bytes are first diffed
    /// line-by-line and the coarse result refined byte-by-byte; this is a
    /// large speedup on multi-line documents at a small cost in optimality.
    ///
    /// Runtime is bounded by [`Settings::diff_timeout`](crate::Settings):
    /// when the deadline expires mid-computation the remaining region
    /// degrades to a plain delete + insert pair.
    pub fn diff_main(
        &self,
        text1: impl AsRef<[u8]>,
        text2: impl AsRef<[u8]>,
        checklines: bool,
    ) -> Vec<Diff> {
        let deadline = if self.settings.diff_timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + self.settings.diff_timeout)
        };
        diff_bytes(self, text1.as_ref(), text2.as_ref(), checklines, deadline)
    }
}

/// Recursive byte-level diff: equality shortcut, common affix trimming,
/// then the middle-block computation.
pub(crate) fn diff_bytes(
    patcher: &Patcher,
    text1: &[u8],
    text2: &[u8],
    checklines: bool,
    deadline: Option<Instant>,
) -> Vec<Diff> {
    if text1 == text2 {
        if text1.is_empty() {
            return Vec::new();
        }
        return vec![Diff::equal(text1)];
    }

    let prefix_len = common_prefix(text1, text2);
    let prefix = &text1[..prefix_len];
    let trimmed1 = &text1[prefix_len..];
    let trimmed2 = &text2[prefix_len..];

    let suffix_len = common_suffix(trimmed1, trimmed2);
    let suffix = &trimmed1[trimmed1.len() - suffix_len..];
    let core1 = &trimmed1[..trimmed1.len() - suffix_len];
    let core2 = &trimmed2[..trimmed2.len() - suffix_len];

    let mut diffs = compute(patcher, core1, core2, checklines, deadline);

    if !prefix.is_empty() {
        diffs.insert(0, Diff::equal(prefix));
    }
    if !suffix.is_empty() {
        diffs.push(Diff::equal(suffix));
    }
    patcher.diff_cleanup_merge(&mut diffs);
    diffs
}

/// Diff a middle block that shares no common prefix or suffix.
fn compute(
    patcher: &Patcher,
    text1: &[u8],
    text2: &[u8],
    checklines: bool,
    deadline: Option<Instant>,
) -> Vec<Diff> {
    if text1.is_empty() {
        return vec![Diff::insert(text2)];
    }
    if text2.is_empty() {
        return vec![Diff::delete(text1)];
    }

    let (longer, shorter) = if text1.len() > text2.len() {
        (text1, text2)
    } else {
        (text2, text1)
    };

    if let Some(i) = sub_index(longer, shorter) {
        // Shorter text sits inside the longer one.
        let op = if text1.len() > text2.len() {
            Operation::Delete
        } else {
            Operation::Insert
        };
        return vec![
            Diff::new(op, &longer[..i]),
            Diff::equal(shorter),
            Diff::new(op, &longer[i + shorter.len()..]),
        ];
    }

    if shorter.len() == 1 {
        // After the shortcuts above the single byte cannot be an equality.
        return vec![Diff::delete(text1), Diff::insert(text2)];
    }

    if let Some(hm) = half_match(patcher, text1, text2) {
        let mut diffs = diff_bytes(patcher, hm.prefix1, hm.prefix2, checklines, deadline);
        diffs.push(Diff::equal(hm.common));
        diffs.extend(diff_bytes(patcher, hm.suffix1, hm.suffix2, checklines, deadline));
        return diffs;
    }

    if checklines && text1.len() > 100 && text2.len() > 100 {
        return line_mode(patcher, text1, text2, deadline);
    }

    match bisect_point(text1, text2, deadline) {
        Some((x, y)) => {
            let mut diffs = diff_bytes(patcher, &text1[..x], &text2[..y], false, deadline);
            diffs.extend(diff_bytes(patcher, &text1[x..], &text2[y..], false, deadline));
            diffs
        }
        None => {
            // Deadline hit, or no commonality at all.
            vec![Diff::delete(text1), Diff::insert(text2)]
        }
    }
}

/// A split of both texts around a shared region at least half the length of
/// the longer text.
struct HalfMatch<'a> {
    prefix1: &'a [u8],
    suffix1: &'a [u8],
    prefix2: &'a [u8],
    suffix2: &'a [u8],
    common: &'a [u8],
}

/// Look for a shared substring at least half the length of the longer text.
/// Skipped entirely when no diff timeout is set, since the split can make
/// the result non-optimal.
fn half_match<'a>(patcher: &Patcher, text1: &'a [u8], text2: &'a [u8]) -> Option<HalfMatch<'a>> {
    if patcher.settings.diff_timeout.is_zero() {
        return None;
    }

    let (longer, shorter) = if text1.len() > text2.len() {
        (text1, text2)
    } else {
        (text2, text1)
    };
    if longer.len() < 4 || shorter.len() * 2 < longer.len() {
        return None;
    }

    // Seed from the second quarter, then from the third.
    let hm1 = half_match_at(longer, shorter, (longer.len() + 3) / 4);
    let hm2 = half_match_at(longer, shorter, (longer.len() + 1) / 2);
    let hm = match (hm1, hm2) {
        (None, None) => return None,
        (Some(hm), None) => hm,
        (None, Some(hm)) => hm,
        (Some(a), Some(b)) => {
            if a.4.len() > b.4.len() {
                a
            } else {
                b
            }
        }
    };

    let (long_prefix, long_suffix, short_prefix, short_suffix, common) = hm;
    if text1.len() > text2.len() {
        Some(HalfMatch {
            prefix1: long_prefix,
            suffix1: long_suffix,
            prefix2: short_prefix,
            suffix2: short_suffix,
            common,
        })
    } else {
        Some(HalfMatch {
            prefix1: short_prefix,
            suffix1: short_suffix,
            prefix2: long_prefix,
            suffix2: long_suffix,
            common,
        })
    }
}

type RawHalfMatch<'a> = (&'a [u8], &'a [u8], &'a [u8], &'a [u8], &'a [u8]);

/// Does a quarter-length substring of `longer` starting at `i` anchor a
/// shared region covering at least half of `longer`?
fn half_match_at<'a>(longer: &'a [u8], shorter: &'a [u8], i: usize) -> Option<RawHalfMatch<'a>> {
    let seed = &longer[i..i + longer.len() / 4];
    let mut best_common_len = 0;
    let mut best: Option<RawHalfMatch<'a>> = None;

    let mut j = sub_index_from(shorter, seed, 0);
    while let Some(found) = j {
        let prefix_len = common_prefix(&longer[i..], &shorter[found..]);
        let suffix_len = common_suffix(&longer[..i], &shorter[..found]);
        if best_common_len < suffix_len + prefix_len {
            best_common_len = suffix_len + prefix_len;
            best = Some((
                &longer[..i - suffix_len],
                &longer[i + prefix_len..],
                &shorter[..found - suffix_len],
                &shorter[found + prefix_len..],
                &shorter[found - suffix_len..found + prefix_len],
            ));
        }
        j = sub_index_from(shorter, seed, found + 1);
    }

    if best_common_len * 2 >= longer.len() {
        best
    } else {
        None
    }
}

/// Find the middle "snake" of the edit path: walk D-paths forward from the
/// start and backward from the end until they overlap, and return the
/// coordinates of the overlap. `None` means the deadline expired or the
/// texts share nothing.
fn bisect_point<T: Copy + Eq>(
    seq1: &[T],
    seq2: &[T],
    deadline: Option<Instant>,
) -> Option<(usize, usize)> {
    let len1 = seq1.len() as i64;
    let len2 = seq2.len() as i64;
    if len1 + len2 < 3 {
        return None;
    }

    let max_d = (len1 + len2 + 1) / 2;
    let v_offset = max_d;
    let v_length = (2 * max_d) as usize;
    let mut v1 = vec![-1i64; v_length];
    let mut v2 = vec![-1i64; v_length];
    v1[(v_offset + 1) as usize] = 0;
    v2[(v_offset + 1) as usize] = 0;

    let delta = len1 - len2;
    // With an odd total length the forward path collides with the reverse
    // path; with an even total the reverse path does the colliding.
    let front = delta % 2 != 0;
    let mut k1start = 0i64;
    let mut k1end = 0i64;
    let mut k2start = 0i64;
    let mut k2end = 0i64;

    for d in 0..max_d {
        if let Some(deadline) = deadline {
            if d % 16 == 0 && Instant::now() > deadline {
                debug!(d, "diff bisect hit the deadline");
                break;
            }
        }

        // Forward path.
        let mut k1 = -d + k1start;
        while k1 <= d - k1end {
            let k1_offset = (v_offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                v1[k1_offset + 1]
            } else {
                v1[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < len1 && y1 < len2 && seq1[x1 as usize] == seq2[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset] = x1;
            if x1 > len1 {
                // Ran off the right of the graph.
                k1end += 2;
            } else if y1 > len2 {
                // Ran off the bottom of the graph.
                k1start += 2;
            } else if front {
                let k2_offset = v_offset + delta - k1;
                if k2_offset >= 0 && (k2_offset as usize) < v_length && v2[k2_offset as usize] != -1
                {
                    // Mirror x2 onto the top-left coordinate system.
                    let x2 = len1 - v2[k2_offset as usize];
                    if x1 >= x2 {
                        return Some((x1 as usize, y1 as usize));
                    }
                }
            }
            k1 += 2;
        }

        // Reverse path.
        let mut k2 = -d + k2start;
        while k2 <= d - k2end {
            let k2_offset = (v_offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                v2[k2_offset + 1]
            } else {
                v2[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < len1
                && y2 < len2
                && seq1[(len1 - x2 - 1) as usize] == seq2[(len2 - y2 - 1) as usize]
            {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset] = x2;
            if x2 > len1 {
                k2end += 2;
            } else if y2 > len2 {
                k2start += 2;
            } else if !front {
                let k1_offset = v_offset + delta - k2;
                if k1_offset >= 0 && (k1_offset as usize) < v_length && v1[k1_offset as usize] != -1
                {
                    let x1 = v1[k1_offset as usize];
                    let y1 = v_offset + x1 - k1_offset;
                    let x2 = len1 - x2;
                    if x1 >= x2 {
                        return Some((x1 as usize, y1 as usize));
                    }
                }
            }
            k2 += 2;
        }
    }
    None
}

/// Line-by-line diff for large texts: hash each line to a token, diff the
/// token sequences, rehydrate, clean up freak matches, then re-diff every
/// delete/insert run byte-by-byte.
fn line_mode(
    patcher: &Patcher,
    text1: &[u8],
    text2: &[u8],
    deadline: Option<Instant>,
) -> Vec<Diff> {
    let (tokens1, tokens2, lines) = lines_to_tokens(text1, text2);
    let token_diffs = token_diff(&tokens1, &tokens2, deadline);

    let mut diffs: Vec<Diff> = token_diffs
        .into_iter()
        .map(|(op, tokens)| {
            let mut text = Vec::new();
            for t in tokens {
                text.extend_from_slice(&lines[t as usize]);
            }
            Diff::new(op, text)
        })
        .collect();

    patcher.diff_cleanup_semantic(&mut diffs);

    // Re-diff each replacement block character by character. The dummy
    // trailing equality flushes the final run.
    diffs.push(Diff::equal(""));
    let mut pointer = 0;
    let mut count_delete = 0;
    let mut count_insert = 0;
    let mut text_delete: Vec<u8> = Vec::new();
    let mut text_insert: Vec<u8> = Vec::new();
    while pointer < diffs.len() {
        match diffs[pointer].op {
            Operation::Insert => {
                count_insert += 1;
                text_insert.extend_from_slice(&diffs[pointer].text);
            }
            Operation::Delete => {
                count_delete += 1;
                text_delete.extend_from_slice(&diffs[pointer].text);
            }
            Operation::Equal => {
                if count_delete >= 1 && count_insert >= 1 {
                    let start = pointer - count_delete - count_insert;
                    let sub = diff_bytes(patcher, &text_delete, &text_insert, false, deadline);
                    let sub_len = sub.len();
                    diffs.splice(start..pointer, sub);
                    pointer = start + sub_len;
                }
                count_insert = 0;
                count_delete = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
        pointer += 1;
    }
    diffs.pop();
    diffs
}

/// Map each unique line (including its trailing newline) of both texts to a
/// token, returning the token sequences and the line table.
fn lines_to_tokens(text1: &[u8], text2: &[u8]) -> (Vec<u32>, Vec<u32>, Vec<Vec<u8>>) {
    // Token 0 is reserved so the line table can be indexed directly.
    let mut lines: Vec<Vec<u8>> = vec![Vec::new()];
    let mut table: HashMap<Vec<u8>, u32> = HashMap::new();
    let tokens1 = tokenize_lines(text1, &mut lines, &mut table);
    let tokens2 = tokenize_lines(text2, &mut lines, &mut table);
    (tokens1, tokens2, lines)
}

fn tokenize_lines(
    text: &[u8],
    lines: &mut Vec<Vec<u8>>,
    table: &mut HashMap<Vec<u8>, u32>,
) -> Vec<u32> {
    let mut tokens = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let end = text[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| start + i + 1)
            .unwrap_or(text.len());
        let line = &text[start..end];
        let token = match table.get(line) {
            Some(&token) => token,
            None => {
                let token = lines.len() as u32;
                lines.push(line.to_vec());
                table.insert(line.to_vec(), token);
                token
            }
        };
        tokens.push(token);
        start = end;
    }
    tokens
}

/// Diff two token sequences: equality shortcut, affix trims, then bisect.
fn token_diff(
    tokens1: &[u32],
    tokens2: &[u32],
    deadline: Option<Instant>,
) -> Vec<(Operation, Vec<u32>)> {
    if tokens1 == tokens2 {
        if tokens1.is_empty() {
            return Vec::new();
        }
        return vec![(Operation::Equal, tokens1.to_vec())];
    }

    let prefix_len = common_prefix(tokens1, tokens2);
    let trimmed1 = &tokens1[prefix_len..];
    let trimmed2 = &tokens2[prefix_len..];
    let suffix_len = common_suffix(trimmed1, trimmed2);
    let core1 = &trimmed1[..trimmed1.len() - suffix_len];
    let core2 = &trimmed2[..trimmed2.len() - suffix_len];

    let mut diffs = if core1.is_empty() {
        vec![(Operation::Insert, core2.to_vec())]
    } else if core2.is_empty() {
        vec![(Operation::Delete, core1.to_vec())]
    } else {
        match bisect_point(core1, core2, deadline) {
            Some((x, y)) => {
                let mut diffs = token_diff(&core1[..x], &core2[..y], deadline);
                diffs.extend(token_diff(&core1[x..], &core2[y..], deadline));
                diffs
            }
            None => vec![
                (Operation::Delete, core1.to_vec()),
                (Operation::Insert, core2.to_vec()),
            ],
        }
    };

    if prefix_len > 0 {
        diffs.insert(0, (Operation::Equal, tokens1[..prefix_len].to_vec()));
    }
    if suffix_len > 0 {
        diffs.push((
            Operation::Equal,
            trimmed1[trimmed1.len() - suffix_len..].to_vec(),
        ));
    }
    diffs
}

/// Length of the common prefix of two sequences.
pub(crate) fn common_prefix<T: PartialEq>(seq1: &[T], seq2: &[T]) -> usize {
    seq1.iter()
        .zip(seq2.iter())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Length of the common suffix of two sequences.
pub(crate) fn common_suffix<T: PartialEq>(seq1: &[T], seq2: &[T]) -> usize {
    seq1.iter()
        .rev()
        .zip(seq2.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

/// First index of `needle` in `haystack`, or `None`.
pub(crate) fn sub_index<T: PartialEq>(haystack: &[T], needle: &[T]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// First index of `needle` in `haystack` at or after `from`, or `None`.
pub(crate) fn sub_index_from<T: PartialEq>(
    haystack: &[T],
    needle: &[T],
    from: usize,
) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    sub_index(&haystack[from..], needle).map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn patcher() -> Patcher {
        Patcher::new()
    }

    #[test]
    fn common_affixes() {
        assert_eq!(common_prefix(b"1234abcdef".as_slice(), b"1234xyz"), 4);
        assert_eq!(common_prefix(b"abc".as_slice(), b"xyz"), 0);
        assert_eq!(common_prefix(b"1234".as_slice(), b"1234xyz"), 4);
        assert_eq!(common_suffix(b"abcdef1234".as_slice(), b"xyz1234"), 4);
        assert_eq!(common_suffix(b"abc".as_slice(), b"xyz"), 0);
        assert_eq!(common_suffix(b"1234".as_slice(), b"xyz1234"), 4);
    }

    #[test]
    fn trivial_diffs() {
        let p = patcher();
        assert_eq!(p.diff_main("", "", false), vec![]);
        assert_eq!(
            p.diff_main("abc", "abc", false),
            vec![Diff::equal("abc")]
        );
        assert_eq!(
            p.diff_main("abc", "ab123c", false),
            vec![Diff::equal("ab"), Diff::insert("123"), Diff::equal("c")]
        );
        assert_eq!(
            p.diff_main("a123bc", "abc", false),
            vec![Diff::equal("a"), Diff::delete("123"), Diff::equal("bc")]
        );
    }

    #[test]
    fn simple_substitutions() {
        let p = patcher();
        assert_eq!(
            p.diff_main("a", "b", false),
            vec![Diff::delete("a"), Diff::insert("b")]
        );
    }

    #[test]
    fn round_trips_through_rebuild() {
        let p = patcher();
        let a = b"The quick brown fox jumps over the lazy dog.".as_slice();
        let b = b"That quick brown fox jumped over a lazy dog.".as_slice();
        let diffs = p.diff_main(a, b, false);
        assert_eq!(crate::diff::before_text(&diffs), a);
        assert_eq!(crate::diff::after_text(&diffs), b);
    }

    #[test]
    fn half_match_splits_on_shared_middle() {
        let p = patcher();
        let a = "The quick brown fox jumps over the lazy dog.";
        let b = "Everything quick brown fox jumps over the dog barks.";
        let diffs = p.diff_main(a, b, false);
        assert_eq!(crate::diff::before_text(&diffs), a.as_bytes());
        assert_eq!(crate::diff::after_text(&diffs), b.as_bytes());
    }

    #[test]
    fn half_match_disabled_without_timeout() {
        let mut p = patcher();
        p.settings_mut().diff_timeout = Duration::ZERO;
        assert!(half_match(&p, b"1234567890", b"a345678z").is_none());

        p.settings_mut().diff_timeout = Duration::from_secs(1);
        let hm = half_match(&p, b"1234567890", b"a345678z").unwrap();
        assert_eq!(hm.common, b"345678");
        assert_eq!(hm.prefix1, b"12");
        assert_eq!(hm.suffix1, b"90");
        assert_eq!(hm.prefix2, b"a");
        assert_eq!(hm.suffix2, b"z");
    }

    #[test]
    fn bisect_finds_split() {
        // "cat" -> "map" shares the middle 'a'.
        let diffs = diff_bytes(&patcher(), b"cat", b"map", false, None);
        assert_eq!(crate::diff::before_text(&diffs), b"cat");
        assert_eq!(crate::diff::after_text(&diffs), b"map");
    }

    #[test]
    fn line_mode_matches_char_mode() {
        let p = patcher();
        let a = "1234567890\n".repeat(13);
        let b = "abcdefghij\n".repeat(13);
        let coarse = p.diff_main(&a, &b, true);
        let fine = p.diff_main(&a, &b, false);
        assert_eq!(crate::diff::before_text(&coarse), a.as_bytes());
        assert_eq!(crate::diff::after_text(&coarse), b.as_bytes());
        assert_eq!(crate::diff::after_text(&coarse), crate::diff::after_text(&fine));
    }

    #[test]
    fn tokenizer_shares_line_table() {
        let (t1, t2, lines) = lines_to_tokens(b"alpha\nbeta\nalpha\n", b"beta\nalpha\ngamma\n");
        assert_eq!(t1.len(), 3);
        assert_eq!(t2.len(), 3);
        assert_eq!(t1[0], t1[2]);
        assert_eq!(t1[1], t2[0]);
        // Reserved slot plus three unique lines.
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn timeout_degrades_but_stays_valid() {
        let mut p = patcher();
        p.settings_mut().diff_timeout = Duration::from_nanos(1);
        let a = "`Twas brillig, and the slithy toves did gyre and gimble in the wabe.\n".repeat(8);
        let b = "I am the very model of a modern major general.\n".repeat(8);
        let diffs = p.diff_main(&a, &b, false);
        assert_eq!(crate::diff::before_text(&diffs), a.as_bytes());
        assert_eq!(crate::diff::after_text(&diffs), b.as_bytes());
    }
}
