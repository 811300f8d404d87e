use crate::diff::{self, Diff, Operation};
use crate::patch::Patch;
use crate::patcher::Patcher;

impl Patcher {
    /// Compute the patches needed to turn `text1` into `text2`.
    ///
    /// The diff is computed internally and run through the semantic and
    /// efficiency cleanups before patch construction.
    pub fn patch_make(
        &self,
        text1: impl AsRef<[u8]>,
        text2: impl AsRef<[u8]>,
    ) -> Vec<Patch> {
        let text1 = text1.as_ref();
        let mut diffs = self.diff_main(text1, text2, true);
        if diffs.len() > 2 {
            self.diff_cleanup_semantic(&mut diffs);
            self.diff_cleanup_efficiency(&mut diffs);
        }
        self.patch_make_with_diffs(text1, &diffs)
    }

    /// Compute patches from a diff alone; the pre-image text is rebuilt
    /// from the equal and delete segments.
    pub fn patch_make_from_diffs(&self, diffs: &[Diff]) -> Vec<Patch> {
        let text1 = diff::before_text(diffs);
        self.patch_make_with_diffs(&text1, diffs)
    }

    /// Compute patches from a pre-image text and the diff that transforms
    /// it. This is the core constructor the other two delegate to.
    pub fn patch_make_with_diffs(&self, text1: impl AsRef<[u8]>, diffs: &[Diff]) -> Vec<Patch> {
        let text1 = text1.as_ref();
        let mut patches = Vec::new();
        if diffs.is_empty() {
            return patches;
        }

        let margin = self.settings.patch_margin;
        let mut patch = Patch::default();
        // Byte cursors into the pre- and post-image texts.
        let mut count1 = 0;
        let mut count2 = 0;
        // Text to which the current patch's coordinates refer: the
        // pre-image with all *previously emitted* patches applied. Context
        // is rolling, unlike unidiff.
        let mut prepatch_text = text1.to_vec();
        let mut postpatch_text = text1.to_vec();

        for (i, d) in diffs.iter().enumerate() {
            if patch.diffs.is_empty() && d.op != Operation::Equal {
                // A new patch starts here.
                patch.start1 = count1;
                patch.start2 = count2;
            }

            match d.op {
                Operation::Insert => {
                    patch.diffs.push(d.clone());
                    patch.length2 += d.text.len();
                    postpatch_text.splice(count2..count2, d.text.iter().copied());
                }
                Operation::Delete => {
                    patch.length1 += d.text.len();
                    patch.diffs.push(d.clone());
                    postpatch_text.splice(count2..count2 + d.text.len(), std::iter::empty());
                }
                Operation::Equal => {
                    if d.text.len() <= 2 * margin
                        && !patch.diffs.is_empty()
                        && i != diffs.len() - 1
                    {
                        // Small equality inside a patch.
                        patch.diffs.push(d.clone());
                        patch.length1 += d.text.len();
                        patch.length2 += d.text.len();
                    }
                    if d.text.len() >= 2 * margin && !patch.diffs.is_empty() {
                        // Time for a new patch.
                        self.patch_add_context(&mut patch, &prepatch_text);
                        patches.push(std::mem::take(&mut patch));
                        prepatch_text = postpatch_text.clone();
                        count1 = count2;
                    }
                }
            }

            if d.op != Operation::Insert {
                count1 += d.text.len();
            }
            if d.op != Operation::Delete {
                count2 += d.text.len();
            }
        }

        // Pick up the leftover patch if not empty.
        if !patch.diffs.is_empty() {
            self.patch_add_context(&mut patch, &prepatch_text);
            patches.push(patch);
        }

        patches
    }

    /// Grow a patch's context until its pattern is unique in `text`, then
    /// wrap it in equality prefix/suffix segments. The pattern never grows
    /// past what the bit-parallel matcher can locate.
    pub fn patch_add_context(&self, patch: &mut Patch, text: &[u8]) {
        if text.is_empty() {
            return;
        }
        let margin = self.settings.patch_margin;
        let cap = self.settings.match_max_bits.saturating_sub(2 * margin);

        let mut pattern = &text[patch.start2..patch.start2 + patch.length1];
        let mut padding = 0;
        while first_index(text, pattern) != last_index(text, pattern) && pattern.len() < cap {
            padding += margin;
            let start = patch.start2.saturating_sub(padding);
            let end = text.len().min(patch.start2 + patch.length1 + padding);
            pattern = &text[start..end];
        }
        // One more chunk for luck.
        padding += margin;

        let prefix = &text[patch.start2.saturating_sub(padding)..patch.start2];
        if !prefix.is_empty() {
            patch.diffs.insert(0, Diff::equal(prefix));
        }
        let suffix = &text
            [patch.start2 + patch.length1..text.len().min(patch.start2 + patch.length1 + padding)];
        if !suffix.is_empty() {
            patch.diffs.push(Diff::equal(suffix));
        }

        // Roll back the start points and extend the lengths.
        patch.start1 -= prefix.len();
        patch.start2 -= prefix.len();
        patch.length1 += prefix.len() + suffix.len();
        patch.length2 += prefix.len() + suffix.len();
    }
}

/// First occurrence of `pattern` in `text`; an empty pattern reports 0.
fn first_index(text: &[u8], pattern: &[u8]) -> usize {
    crate::diff::engine::sub_index(text, pattern).unwrap_or(usize::MAX)
}

/// Last occurrence of `pattern` in `text`; an empty pattern reports
/// `text.len()`.
fn last_index(text: &[u8], pattern: &[u8]) -> usize {
    if pattern.is_empty() {
        return text.len();
    }
    if pattern.len() > text.len() {
        return usize::MAX;
    }
    text.windows(pattern.len())
        .rposition(|w| w == pattern)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patcher() -> Patcher {
        Patcher::new()
    }

    #[test]
    fn add_context_simple() {
        let p = patcher();
        let mut patch = p
            .patch_from_text("@@ -21,4 +21,10 @@\n-jump\n+somersault\n")
            .unwrap()
            .remove(0);
        p.patch_add_context(
            &mut patch,
            b"The quick brown fox jumps over the lazy dog.",
        );
        assert_eq!(
            p.patch_to_text(&[patch]),
            "@@ -17,12 +17,18 @@\n fox \n-jump\n+somersault\n s ov\n"
        );
    }

    #[test]
    fn add_context_short_trailing_context() {
        let p = patcher();
        let mut patch = p
            .patch_from_text("@@ -21,4 +21,10 @@\n-jump\n+somersault\n")
            .unwrap()
            .remove(0);
        p.patch_add_context(&mut patch, b"The quick brown fox jumps.");
        assert_eq!(
            p.patch_to_text(&[patch]),
            "@@ -17,10 +17,16 @@\n fox \n-jump\n+somersault\n s.\n"
        );
    }

    #[test]
    fn add_context_against_text_edges() {
        let p = patcher();
        let mut patch = p
            .patch_from_text("@@ -3 +3,2 @@\n-e\n+at\n")
            .unwrap()
            .remove(0);
        p.patch_add_context(&mut patch, b"The quick brown fox jumps.");
        assert_eq!(
            p.patch_to_text(&[patch]),
            "@@ -1,7 +1,8 @@\n Th\n-e\n+at\n  qui\n"
        );
    }

    #[test]
    fn add_context_grows_past_ambiguity() {
        let p = patcher();
        let mut patch = p
            .patch_from_text("@@ -3 +3,2 @@\n-e\n+at\n")
            .unwrap()
            .remove(0);
        p.patch_add_context(
            &mut patch,
            b"The quick brown fox jumps.  The quick brown fox crashes.",
        );
        assert_eq!(
            p.patch_to_text(&[patch]),
            "@@ -1,27 +1,28 @@\n Th\n-e\n+at\n  quick brown fox jumps. \n"
        );
    }

    #[test]
    fn make_from_two_texts_golden() {
        let p = patcher();
        let text1 = "The quick brown fox jumps over the lazy dog.";
        let text2 = "That quick brown fox jumped over a lazy dog.";
        // The diff of text2 -> text1 exercises the documented golden form;
        // the second header must be -21,17 (rolling context), not -22,17.
        let expected = "@@ -1,8 +1,7 @@\n Th\n-at\n+e\n  qui\n@@ -21,17 +21,18 @@\n jump\n-ed\n+s\n  over \n-a\n+the\n  laz\n";
        let patches = p.patch_make(text2, text1);
        assert_eq!(p.patch_to_text(&patches), expected);
    }

    #[test]
    fn make_from_diffs_matches_two_text_form() {
        let p = patcher();
        let text1 = "The quick brown fox jumps over the lazy dog.";
        let text2 = "That quick brown fox jumped over a lazy dog.";
        let diffs = {
            let mut diffs = p.diff_main(text1, text2, true);
            if diffs.len() > 2 {
                p.diff_cleanup_semantic(&mut diffs);
                p.diff_cleanup_efficiency(&mut diffs);
            }
            diffs
        };
        let from_texts = p.patch_make(text1, text2);
        let from_diffs = p.patch_make_from_diffs(&diffs);
        let with_both = p.patch_make_with_diffs(text1, &diffs);
        assert_eq!(from_diffs, from_texts);
        assert_eq!(with_both, from_texts);
    }

    #[test]
    fn empty_inputs_make_no_patches() {
        let p = patcher();
        assert_eq!(p.patch_make("", ""), vec![]);
        let diffs: Vec<Diff> = vec![];
        assert_eq!(p.patch_make_from_diffs(&diffs), vec![]);
    }

    #[test]
    fn character_encoding_survives_make() {
        let p = patcher();
        let patches = p.patch_make("`1234567890-=[]\\;',./", "~!@#$%^&*()_+{}|:\"<>?");
        assert_eq!(
            p.patch_to_text(&patches),
            "@@ -1,21 +1,21 @@\n-%601234567890-=%5B%5D%5C;',./\n+~!@#$%25%5E&*()_+%7B%7D%7C:%22%3C%3E?\n"
        );
    }
}
