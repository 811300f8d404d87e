use tracing::debug;

use crate::diff::{self, Diff, Operation};
use crate::patch::Patch;
use crate::patcher::Patcher;

impl Patcher {
    /// Apply a list of patches to `text`, tolerating drift near each
    /// patch's expected location.
    ///
    /// Returns the patched text and one flag per input patch indicating
    /// whether it could be applied. The input patches are deep-copied and
    /// never mutated; the returned text always reflects every successful
    /// patch, and a failed patch never disturbs the expected positions of
    /// the patches after it.
    pub fn patch_apply(&self, patches: &[Patch], text: impl AsRef<[u8]>) -> (Vec<u8>, Vec<bool>) {
        let text = text.as_ref();
        if patches.is_empty() {
            return (text.to_vec(), Vec::new());
        }

        // Work on copies so callers' patches stay pristine.
        let mut patches = patches.to_vec();
        let null_padding = self.patch_add_padding(&mut patches);
        let mut text = [null_padding.as_slice(), text, null_padding.as_slice()].concat();
        self.patch_split_max(&mut patches);

        let max_bits = self.settings.match_max_bits;
        // Offset between the expected and actual location of the previous
        // patch: if the patches expected at 10 and 20 were found at 12,
        // the second's effective expected position is 22.
        let mut delta: i64 = 0;
        let mut results = vec![false; patches.len()];
        for (x, patch) in patches.iter().enumerate() {
            let expected_loc = patch.start2 as i64 + delta;
            let text1 = diff::before_text(&patch.diffs);
            let mut start_loc;
            let mut end_loc = None;
            if text1.len() > max_bits {
                // The splitter only lets an oversized pattern through for a
                // monster delete; match its two ends separately.
                start_loc = self.match_main(&text, &text1[..max_bits], clamp(expected_loc));
                if let Some(found_start) = start_loc {
                    let tail_expected =
                        clamp(expected_loc + (text1.len() - max_bits) as i64);
                    end_loc =
                        self.match_main(&text, &text1[text1.len() - max_bits..], tail_expected);
                    match end_loc {
                        Some(found_end) if found_start < found_end => {}
                        _ => {
                            // No valid trailing context. Drop this patch.
                            start_loc = None;
                        }
                    }
                }
            } else {
                start_loc = self.match_main(&text, &text1, clamp(expected_loc));
            }

            let Some(found_start) = start_loc else {
                debug!(patch = x, "no match found; dropping patch");
                results[x] = false;
                // Subtract the delta for this failed patch from subsequent
                // patches.
                delta -= patch.length2 as i64 - patch.length1 as i64;
                continue;
            };

            results[x] = true;
            delta = found_start as i64 - expected_loc;
            let end = match end_loc {
                None => text.len().min(found_start + text1.len()),
                Some(found_end) => text.len().min(found_end + max_bits),
            };
            let text2 = text[found_start..end].to_vec();

            if text1 == text2 {
                // Perfect match: shove the replacement text in.
                let replacement = diff::after_text(&patch.diffs);
                text.splice(found_start..found_start + text1.len(), replacement);
            } else {
                // Imperfect match: run a diff between expected and found
                // text to get a framework of equivalent indices.
                let mut diffs = self.diff_main(&text1, &text2, false);
                if text1.len() > max_bits
                    && diff::levenshtein(&diffs) as f64 / text1.len() as f64
                        > self.settings.patch_delete_threshold
                {
                    // The end points match, but the content is
                    // unacceptably bad.
                    debug!(patch = x, "matched region too corrupted; dropping patch");
                    results[x] = false;
                } else {
                    self.diff_cleanup_semantic_lossless(&mut diffs);
                    let mut index1 = 0;
                    for d in &patch.diffs {
                        if d.op != Operation::Equal {
                            let index2 = diff::translate_position(&diffs, index1);
                            match d.op {
                                Operation::Insert => {
                                    let at = (found_start + index2).min(text.len());
                                    text.splice(at..at, d.text.iter().copied());
                                }
                                Operation::Delete => {
                                    let delete_end = diff::translate_position(
                                        &diffs,
                                        index1 + d.text.len(),
                                    );
                                    let from = (found_start + index2).min(text.len());
                                    let to = (found_start + delete_end).min(text.len());
                                    text.splice(from..to.max(from), std::iter::empty());
                                }
                                Operation::Equal => {}
                            }
                        }
                        if d.op != Operation::Delete {
                            index1 += d.text.len();
                        }
                    }
                }
            }
        }

        // Strip the padding.
        let inner_end = text.len().saturating_sub(null_padding.len());
        let text = if inner_end >= null_padding.len() {
            text[null_padding.len()..inner_end].to_vec()
        } else {
            Vec::new()
        };
        (text, results)
    }

    /// Wrap the patch list in null-sentinel padding so edits at the very
    /// start or end of the text have context to match against. Every
    /// patch's coordinates shift forward by `patch_margin`; the padding
    /// bytes (values `1..=patch_margin`) are returned for stripping.
    pub fn patch_add_padding(&self, patches: &mut [Patch]) -> Vec<u8> {
        let margin = self.settings.patch_margin;
        let null_padding: Vec<u8> = (1..=margin as u8).collect();
        if patches.is_empty() {
            return null_padding;
        }

        // Bump all the patches forward.
        for patch in patches.iter_mut() {
            patch.start1 += margin;
            patch.start2 += margin;
        }

        // Add some padding on the start of the first diff.
        let first = &mut patches[0];
        if first.diffs.first().map_or(true, |d| d.op != Operation::Equal) {
            first.diffs.insert(0, Diff::equal(null_padding.as_slice()));
            first.start1 -= margin; // Should be 0.
            first.start2 -= margin;
            first.length1 += margin;
            first.length2 += margin;
        } else if margin > first.diffs[0].text.len() {
            // Grow the first equality.
            let extra = margin - first.diffs[0].text.len();
            let mut grown = null_padding[first.diffs[0].text.len()..].to_vec();
            grown.extend_from_slice(&first.diffs[0].text);
            first.diffs[0].text = grown;
            first.start1 -= extra;
            first.start2 -= extra;
            first.length1 += extra;
            first.length2 += extra;
        }

        // Add some padding on the end of the last diff.
        let last_index = patches.len() - 1;
        let last = &mut patches[last_index];
        if last.diffs.last().map_or(true, |d| d.op != Operation::Equal) {
            last.diffs.push(Diff::equal(null_padding.as_slice()));
            last.length1 += margin;
            last.length2 += margin;
        } else if margin > last.diffs.last().map_or(0, |d| d.text.len()) {
            // Grow the last equality.
            if let Some(last_diff) = last.diffs.last_mut() {
                let extra = margin - last_diff.text.len();
                last_diff.text.extend_from_slice(&null_padding[..extra]);
                last.length1 += extra;
                last.length2 += extra;
            }
        }

        null_padding
    }

    /// Break up any patch whose pre-image span exceeds what the
    /// bit-parallel matcher can locate, re-anchoring each piece with
    /// rolling context. A delete longer than twice the limit passes
    /// through whole; the applier matches its two ends instead.
    pub fn patch_split_max(&self, patches: &mut Vec<Patch>) {
        let patch_size = self.settings.match_max_bits;
        let margin = self.settings.patch_margin;
        let fill_limit = patch_size.saturating_sub(margin);

        let mut x = 0;
        while x < patches.len() {
            if patches[x].length1 <= patch_size {
                x += 1;
                continue;
            }
            // Remove the big old patch and emit a run of replacements.
            let mut bigpatch = patches.remove(x);
            let mut start1 = bigpatch.start1;
            let mut start2 = bigpatch.start2;
            let mut precontext: Vec<u8> = Vec::new();

            while !bigpatch.diffs.is_empty() {
                let mut patch = Patch::default();
                let mut empty = true;
                patch.start1 = start1 - precontext.len();
                patch.start2 = start2 - precontext.len();
                if !precontext.is_empty() {
                    patch.length1 = precontext.len();
                    patch.length2 = precontext.len();
                    patch.diffs.push(Diff::equal(precontext.as_slice()));
                }

                while !bigpatch.diffs.is_empty() && patch.length1 < fill_limit {
                    let op = bigpatch.diffs[0].op;
                    if op == Operation::Insert {
                        // Insertions are harmless.
                        let d = bigpatch.diffs.remove(0);
                        patch.length2 += d.text.len();
                        start2 += d.text.len();
                        patch.diffs.push(d);
                        empty = false;
                    } else if op == Operation::Delete
                        && patch.diffs.len() == 1
                        && patch.diffs[0].op == Operation::Equal
                        && bigpatch.diffs[0].text.len() > 2 * patch_size
                    {
                        // A monster delete: let it pass in one chunk.
                        let d = bigpatch.diffs.remove(0);
                        patch.length1 += d.text.len();
                        start1 += d.text.len();
                        patch.diffs.push(d);
                        empty = false;
                    } else {
                        // Deletion or equality; take as much as fits.
                        let take = bigpatch.diffs[0]
                            .text
                            .len()
                            .min(fill_limit - patch.length1);
                        let taken: Vec<u8> = bigpatch.diffs[0].text[..take].to_vec();
                        patch.length1 += take;
                        start1 += take;
                        if op == Operation::Equal {
                            patch.length2 += take;
                            start2 += take;
                        } else {
                            empty = false;
                        }
                        patch.diffs.push(Diff::new(op, taken));
                        if take == bigpatch.diffs[0].text.len() {
                            bigpatch.diffs.remove(0);
                        } else {
                            bigpatch.diffs[0].text.drain(..take);
                        }
                    }
                }

                // Head context for the next patch: tail of what this one
                // produces.
                precontext = diff::after_text(&patch.diffs);
                let keep_from = precontext.len().saturating_sub(margin);
                precontext = precontext[keep_from..].to_vec();

                // Tail context for this patch: head of what remains.
                let remaining = diff::before_text(&bigpatch.diffs);
                let postcontext = &remaining[..remaining.len().min(margin)];
                if !postcontext.is_empty() {
                    patch.length1 += postcontext.len();
                    patch.length2 += postcontext.len();
                    match patch.diffs.last_mut() {
                        Some(last) if last.op == Operation::Equal => {
                            last.text.extend_from_slice(postcontext);
                        }
                        _ => patch.diffs.push(Diff::equal(postcontext)),
                    }
                }

                if !empty {
                    patches.insert(x, patch);
                    x += 1;
                }
            }
        }
    }
}

fn clamp(loc: i64) -> usize {
    loc.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patcher() -> Patcher {
        Patcher::new()
    }

    fn text_of(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn apply_exact_match() {
        let p = patcher();
        let patches = p.patch_make(
            "The quick brown fox jumps over the lazy dog.",
            "That quick brown fox jumped over a lazy dog.",
        );
        let (new_text, results) =
            p.patch_apply(&patches, "The quick brown fox jumps over the lazy dog.");
        assert_eq!(
            text_of(new_text),
            "That quick brown fox jumped over a lazy dog."
        );
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn apply_to_drifted_text() {
        let p = patcher();
        let patches = p.patch_make(
            "The quick brown fox jumps over the lazy dog.",
            "That quick brown fox jumped over a lazy dog.",
        );
        let (new_text, results) =
            p.patch_apply(&patches, "The quick red rabbit jumps over the tired tiger.");
        assert_eq!(
            text_of(new_text),
            "That quick red rabbit jumped over a tired tiger."
        );
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn apply_reports_failures() {
        let p = patcher();
        let patches = p.patch_make(
            "The quick brown fox jumps over the lazy dog.",
            "That quick brown fox jumped over a lazy dog.",
        );
        let (new_text, results) =
            p.patch_apply(&patches, "I am the very model of a modern major general.");
        assert_eq!(
            text_of(new_text),
            "I am the very model of a modern major general."
        );
        assert_eq!(results, vec![false, false]);
    }

    #[test]
    fn apply_big_delete_small_change() {
        let p = patcher();
        let patches = p.patch_make(
            "x1234567890123456789012345678901234567890123456789012345678901234567890y",
            "xabcy",
        );
        let (new_text, results) = p.patch_apply(
            &patches,
            "x123456789012345678901234567890-----++++++++++-----123456789012345678901234567890y",
        );
        assert_eq!(text_of(new_text), "xabcy");
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn apply_big_delete_rejects_garbage_body() {
        let p = patcher();
        let patches = p.patch_make(
            "x1234567890123456789012345678901234567890123456789012345678901234567890y",
            "xabcy",
        );
        let (new_text, results) = p.patch_apply(
            &patches,
            "x12345678901234567890---------------++++++++++---------------12345678901234567890y",
        );
        assert_eq!(
            text_of(new_text),
            "xabc12345678901234567890---------------++++++++++---------------12345678901234567890y"
        );
        assert_eq!(results, vec![false, true]);
    }

    #[test]
    fn apply_big_delete_with_loose_threshold() {
        let mut p = patcher();
        p.settings_mut().patch_delete_threshold = 0.6;
        let patches = p.patch_make(
            "x1234567890123456789012345678901234567890123456789012345678901234567890y",
            "xabcy",
        );
        let (new_text, results) = p.patch_apply(
            &patches,
            "x12345678901234567890---------------++++++++++---------------12345678901234567890y",
        );
        assert_eq!(text_of(new_text), "xabcy");
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn failed_patch_keeps_later_positions_aligned() {
        let mut p = patcher();
        p.settings_mut().match_threshold = 0.0;
        p.settings_mut().match_distance = 0;
        let patches = p.patch_make(
            "abcdefghijklmnopqrstuvwxyz--------------------1234567890",
            "abcXXXXXXXXXXdefghijklmnopqrstuvwxyz--------------------1234567YYYYYYYYYY890",
        );
        let (new_text, results) =
            p.patch_apply(&patches, "ABCDEFGHIJKLMNOPQRSTUVWXYZ--------------------1234567890");
        assert_eq!(
            text_of(new_text),
            "ABCDEFGHIJKLMNOPQRSTUVWXYZ--------------------1234567YYYYYYYYYY890"
        );
        assert_eq!(results, vec![false, true]);
    }

    #[test]
    fn edge_patches_apply_via_padding() {
        let p = patcher();
        let patches = p.patch_make("", "test");
        let (new_text, results) = p.patch_apply(&patches, "");
        assert_eq!(text_of(new_text), "test");
        assert_eq!(results, vec![true]);

        let patches = p.patch_make("XY", "XtestY");
        let (new_text, results) = p.patch_apply(&patches, "XY");
        assert_eq!(text_of(new_text), "XtestY");
        assert_eq!(results, vec![true]);

        let patches = p.patch_make("y", "y123");
        let (new_text, results) = p.patch_apply(&patches, "x");
        assert_eq!(text_of(new_text), "x123");
        assert_eq!(results, vec![true]);
    }

    #[test]
    fn empty_patch_list_is_identity() {
        let p = patcher();
        let (new_text, results) = p.patch_apply(&[], "Hello world.");
        assert_eq!(text_of(new_text), "Hello world.");
        assert_eq!(results, Vec::<bool>::new());
    }

    #[test]
    fn apply_does_not_mutate_input_patches() {
        let p = patcher();
        let patches = p.patch_make("The quick brown fox.", "The slow red fox.");
        let before = p.patch_to_text(&patches);
        let _ = p.patch_apply(&patches, "The quick brown fox.");
        assert_eq!(p.patch_to_text(&patches), before);
    }

    #[test]
    fn padding_bumps_coordinates_by_margin() {
        let p = patcher();
        let mut patches = p.patch_make("", "test");
        assert_eq!(p.patch_to_text(&patches), "@@ -0,0 +1,4 @@\n+test\n");
        let padding = p.patch_add_padding(&mut patches);
        assert_eq!(padding, vec![1, 2, 3, 4]);
        assert_eq!(padding.len(), p.settings().patch_margin);
        assert_eq!(
            p.patch_to_text(&patches),
            "@@ -1,8 +1,12 @@\n %01%02%03%04\n+test\n %01%02%03%04\n"
        );
    }

    #[test]
    fn padding_grows_short_edge_equalities() {
        let p = patcher();
        let mut patches = p.patch_make("XY", "XtestY");
        assert_eq!(p.patch_to_text(&patches), "@@ -1,2 +1,6 @@\n X\n+test\n Y\n");
        p.patch_add_padding(&mut patches);
        assert_eq!(
            p.patch_to_text(&patches),
            "@@ -2,8 +2,12 @@\n %02%03%04X\n+test\n Y%01%02%03\n"
        );
    }

    #[test]
    fn padding_leaves_long_edge_equalities_alone() {
        let p = patcher();
        let mut patches = p.patch_make("XXXXYYYY", "XXXXtestYYYY");
        assert_eq!(
            p.patch_to_text(&patches),
            "@@ -1,8 +1,12 @@\n XXXX\n+test\n YYYY\n"
        );
        p.patch_add_padding(&mut patches);
        assert_eq!(
            p.patch_to_text(&patches),
            "@@ -5,8 +5,12 @@\n XXXX\n+test\n YYYY\n"
        );
    }

    #[test]
    fn split_bounds_every_pattern() {
        let p = patcher();
        let max_bits = p.settings().match_max_bits;
        let patches = p.patch_make(
            "abcdefghijklmnopqrstuvwxyz01234567890",
            "XabXcdXefXghXijXklXmnXopXqrXstXuvXwxXyzX01X23X45X67X89X0",
        );
        let mut split = patches.clone();
        p.patch_split_max(&mut split);
        for patch in &split {
            assert!(patch.length1 <= max_bits);
        }
        // The split run still applies cleanly.
        let (new_text, results) =
            p.patch_apply(&patches, "abcdefghijklmnopqrstuvwxyz01234567890");
        assert!(results.iter().all(|&r| r));
        assert_eq!(
            text_of(new_text),
            "XabXcdXefXghXijXklXmnXopXqrXstXuvXwxXyzX01X23X45X67X89X0"
        );
    }

    #[test]
    fn split_preserves_application() {
        let p = patcher();
        for (a, b) in [
            (
                "abcdef1234567890123456789012345678901234567890123456789012345678901234567890uvwxyz",
                "abcdefuvwxyz",
            ),
            (
                "1234567890123456789012345678901234567890123456789012345678901234567890",
                "abc",
            ),
        ] {
            let patches = p.patch_make(a, b);
            let (new_text, results) = p.patch_apply(&patches, a);
            assert!(results.iter().all(|&r| r));
            assert_eq!(new_text, b.as_bytes());
        }
    }
}
