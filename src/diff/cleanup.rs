use crate::diff::engine::{common_prefix, common_suffix, sub_index};
use crate::diff::ops::{Diff, Operation};
use crate::patcher::Patcher;

impl Patcher {
    /// Coalesce a diff: merge adjacent segments with the same operation,
    /// factor common affixes out of delete/insert runs, and slide single
    /// edits over neighbouring equalities they duplicate.
    pub fn diff_cleanup_merge(&self, diffs: &mut Vec<Diff>) {
        if diffs.is_empty() {
            return;
        }
        // Dummy trailing equality flushes the final run.
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
                    pointer += 1;
                }
                Operation::Delete => {
                    count_delete += 1;
                    text_delete.extend_from_slice(&diffs[pointer].text);
                    pointer += 1;
                }
                Operation::Equal => {
                    if count_delete + count_insert > 1 {
                        if count_delete != 0 && count_insert != 0 {
                            // Factor out a common prefix.
                            let common = common_prefix(&text_insert, &text_delete);
                            if common != 0 {
                                let run_start = pointer - count_delete - count_insert;
                                if run_start > 0
                                    && diffs[run_start - 1].op == Operation::Equal
                                {
                                    let prefix = text_insert[..common].to_vec();
                                    diffs[run_start - 1].text.extend_from_slice(&prefix);
                                } else {
                                    diffs.insert(0, Diff::equal(&text_insert[..common]));
                                    pointer += 1;
                                }
                                text_insert.drain(..common);
                                text_delete.drain(..common);
                            }
                            // Factor out a common suffix.
                            let common = common_suffix(&text_insert, &text_delete);
                            if common != 0 {
                                let mut text = text_insert[text_insert.len() - common..].to_vec();
                                text.extend_from_slice(&diffs[pointer].text);
                                diffs[pointer].text = text;
                                text_insert.truncate(text_insert.len() - common);
                                text_delete.truncate(text_delete.len() - common);
                            }
                        }
                        // Replace the run with the merged segments.
                        let run_start = pointer - count_delete - count_insert;
                        let mut merged = Vec::with_capacity(2);
                        if !text_delete.is_empty() {
                            merged.push(Diff::delete(text_delete.clone()));
                        }
                        if !text_insert.is_empty() {
                            merged.push(Diff::insert(text_insert.clone()));
                        }
                        let merged_len = merged.len();
                        diffs.splice(run_start..pointer, merged);
                        pointer = run_start + merged_len + 1;
                    } else if pointer != 0 && diffs[pointer - 1].op == Operation::Equal {
                        // Merge this equality into the previous one.
                        let text = std::mem::take(&mut diffs[pointer].text);
                        diffs[pointer - 1].text.extend_from_slice(&text);
                        diffs.remove(pointer);
                    } else {
                        pointer += 1;
                    }
                    count_insert = 0;
                    count_delete = 0;
                    text_delete.clear();
                    text_insert.clear();
                }
            }
        }
        if diffs.last().is_some_and(|d| d.text.is_empty()) {
            diffs.pop();
        }

        // Second pass: single edits surrounded on both sides by equalities
        // can sometimes be shifted sideways to eliminate an equality,
        // e.g. A<ins>BA</ins>C -> <ins>AB</ins>AC.
        let mut changes = false;
        let mut pointer = 1;
        while pointer + 1 < diffs.len() {
            if diffs[pointer - 1].op == Operation::Equal
                && diffs[pointer + 1].op == Operation::Equal
            {
                if diffs[pointer].text.ends_with(&diffs[pointer - 1].text) {
                    // Shift the edit over the previous equality.
                    let previous = diffs[pointer - 1].text.clone();
                    let keep = diffs[pointer].text.len() - previous.len();
                    let mut edit = previous.clone();
                    edit.extend_from_slice(&diffs[pointer].text[..keep]);
                    diffs[pointer].text = edit;
                    let mut next = previous;
                    next.extend_from_slice(&diffs[pointer + 1].text);
                    diffs[pointer + 1].text = next;
                    diffs.remove(pointer - 1);
                    changes = true;
                } else if diffs[pointer].text.starts_with(&diffs[pointer + 1].text) {
                    // Shift the edit over the next equality.
                    let next = diffs[pointer + 1].text.clone();
                    diffs[pointer - 1].text.extend_from_slice(&next);
                    let mut edit = diffs[pointer].text[next.len()..].to_vec();
                    edit.extend_from_slice(&next);
                    diffs[pointer].text = edit;
                    diffs.remove(pointer + 1);
                    changes = true;
                }
            }
            pointer += 1;
        }
        if changes {
            self.diff_cleanup_merge(diffs);
        }
    }

    /// Reduce a diff to its most human-readable form: drop equalities that
    /// are dominated by the edits on both sides, then surface overlaps
    /// between neighbouring deletions and insertions.
    pub fn diff_cleanup_semantic(&self, diffs: &mut Vec<Diff>) {
        let mut changes = false;
        // Indices of equalities that are candidates for elimination.
        let mut equalities: Vec<usize> = Vec::new();
        let mut last_equality: Option<Vec<u8>> = None;
        // Bytes changed before and after the candidate equality.
        let mut len_insertions1 = 0;
        let mut len_deletions1 = 0;
        let mut len_insertions2 = 0;
        let mut len_deletions2 = 0;

        let mut pointer: isize = 0;
        while (pointer as usize) < diffs.len() {
            let idx = pointer as usize;
            if diffs[idx].op == Operation::Equal {
                equalities.push(idx);
                len_insertions1 = len_insertions2;
                len_deletions1 = len_deletions2;
                len_insertions2 = 0;
                len_deletions2 = 0;
                last_equality = Some(diffs[idx].text.clone());
            } else {
                if diffs[idx].op == Operation::Insert {
                    len_insertions2 += diffs[idx].text.len();
                } else {
                    len_deletions2 += diffs[idx].text.len();
                }
                let before = len_insertions1.max(len_deletions1);
                let after = len_insertions2.max(len_deletions2);
                let eliminate = last_equality
                    .as_ref()
                    .is_some_and(|eq| !eq.is_empty() && eq.len() <= before && eq.len() <= after);
                if eliminate {
                    if let Some(&eq_index) = equalities.last() {
                        let equality = last_equality.take().unwrap_or_default();
                        // Replace the equality with a delete + insert pair.
                        diffs.insert(eq_index, Diff::delete(equality));
                        diffs[eq_index + 1].op = Operation::Insert;
                        let _ = equalities.pop();
                        if !equalities.is_empty() {
                            let _ = equalities.pop();
                        }
                        pointer = equalities.last().map(|&i| i as isize).unwrap_or(-1);
                        len_insertions1 = 0;
                        len_deletions1 = 0;
                        len_insertions2 = 0;
                        len_deletions2 = 0;
                        last_equality = None;
                        changes = true;
                    }
                }
            }
            pointer += 1;
        }

        if changes {
            self.diff_cleanup_merge(diffs);
        }
        self.diff_cleanup_semantic_lossless(diffs);

        // Extract overlaps between deletions and insertions:
        //   <del>abcxxx</del><ins>xxxdef</ins> -> <del>abc</del>xxx<ins>def</ins>
        //   <del>xxxabc</del><ins>defxxx</ins> -> <ins>def</ins>xxx<del>abc</del>
        // An overlap must be as large as half the edit ahead or behind it.
        let mut pointer = 1;
        while pointer < diffs.len() {
            if diffs[pointer - 1].op == Operation::Delete
                && diffs[pointer].op == Operation::Insert
            {
                let deletion = diffs[pointer - 1].text.clone();
                let insertion = diffs[pointer].text.clone();
                let overlap1 = common_overlap(&deletion, &insertion);
                let overlap2 = common_overlap(&insertion, &deletion);
                if overlap1 >= overlap2 {
                    if overlap1 * 2 >= deletion.len() || overlap1 * 2 >= insertion.len() {
                        diffs.insert(pointer, Diff::equal(&insertion[..overlap1]));
                        diffs[pointer - 1].text = deletion[..deletion.len() - overlap1].to_vec();
                        diffs[pointer + 1].text = insertion[overlap1..].to_vec();
                        pointer += 1;
                    }
                } else if overlap2 * 2 >= deletion.len() || overlap2 * 2 >= insertion.len() {
                    // Reverse overlap: swap and trim the surrounding edits.
                    diffs.insert(pointer, Diff::equal(&deletion[..overlap2]));
                    diffs[pointer - 1] =
                        Diff::insert(insertion[..insertion.len() - overlap2].to_vec());
                    diffs[pointer + 1] = Diff::delete(deletion[overlap2..].to_vec());
                    pointer += 1;
                }
                pointer += 1;
            }
            pointer += 1;
        }
    }

    /// Shift single edits sideways so they land on semantically cleaner
    /// boundaries (word edges, line breaks), without changing the texts the
    /// diff reproduces.
    pub fn diff_cleanup_semantic_lossless(&self, diffs: &mut Vec<Diff>) {
        let mut pointer = 1;
        // First and last elements never need checking.
        while pointer + 1 < diffs.len() {
            if diffs[pointer - 1].op == Operation::Equal
                && diffs[pointer + 1].op == Operation::Equal
            {
                let mut equality1 = diffs[pointer - 1].text.clone();
                let mut edit = diffs[pointer].text.clone();
                let mut equality2 = diffs[pointer + 1].text.clone();

                // Shift the edit as far left as possible.
                let offset = common_suffix(&equality1, &edit);
                if offset > 0 {
                    let common = edit[edit.len() - offset..].to_vec();
                    equality1.truncate(equality1.len() - offset);
                    let mut shifted = common.clone();
                    shifted.extend_from_slice(&edit[..edit.len() - offset]);
                    edit = shifted;
                    let mut shifted = common;
                    shifted.extend_from_slice(&equality2);
                    equality2 = shifted;
                }

                // Step byte by byte right, looking for the best fit.
                let mut best_equality1 = equality1.clone();
                let mut best_edit = edit.clone();
                let mut best_equality2 = equality2.clone();
                let mut best_score =
                    boundary_score(&equality1, &edit) + boundary_score(&edit, &equality2);
                while !edit.is_empty() && !equality2.is_empty() && edit[0] == equality2[0] {
                    let shifted_byte = equality2[0];
                    equality1.push(edit[0]);
                    edit.remove(0);
                    edit.push(shifted_byte);
                    equality2.remove(0);
                    let score =
                        boundary_score(&equality1, &edit) + boundary_score(&edit, &equality2);
                    // >= favours trailing over leading whitespace on edits.
                    if score >= best_score {
                        best_score = score;
                        best_equality1 = equality1.clone();
                        best_edit = edit.clone();
                        best_equality2 = equality2.clone();
                    }
                }

                if diffs[pointer - 1].text != best_equality1 {
                    // An improvement was found.
                    if !best_equality1.is_empty() {
                        diffs[pointer - 1].text = best_equality1;
                    } else {
                        diffs.remove(pointer - 1);
                        pointer -= 1;
                    }
                    diffs[pointer].text = best_edit;
                    if !best_equality2.is_empty() {
                        diffs[pointer + 1].text = best_equality2;
                    } else {
                        diffs.remove(pointer + 1);
                        pointer = pointer.saturating_sub(1);
                    }
                }
            }
            pointer += 1;
        }
    }

    /// Collapse short equalities that sit between edits on three or four
    /// sides, trading a few equal bytes for fewer, larger edit runs.
    pub fn diff_cleanup_efficiency(&self, diffs: &mut Vec<Diff>) {
        let edit_cost = self.settings.diff_edit_cost;
        let mut changes = false;
        let mut equalities: Vec<usize> = Vec::new();
        let mut last_equality: Option<Vec<u8>> = None;
        // Edits adjacent to the candidate equality.
        let mut pre_insert = false;
        let mut pre_delete = false;
        let mut post_insert = false;
        let mut post_delete = false;

        let mut pointer: isize = 0;
        while (pointer as usize) < diffs.len() {
            let idx = pointer as usize;
            if diffs[idx].op == Operation::Equal {
                if diffs[idx].text.len() < edit_cost && (post_insert || post_delete) {
                    // Candidate found.
                    equalities.push(idx);
                    pre_insert = post_insert;
                    pre_delete = post_delete;
                    last_equality = Some(diffs[idx].text.clone());
                } else {
                    // Not a candidate, and can never become one.
                    equalities.clear();
                    last_equality = None;
                }
                post_insert = false;
                post_delete = false;
            } else {
                if diffs[idx].op == Operation::Delete {
                    post_delete = true;
                } else {
                    post_insert = true;
                }
                let adjacent_edits = [pre_insert, pre_delete, post_insert, post_delete]
                    .iter()
                    .filter(|&&b| b)
                    .count();
                let eliminate = last_equality.as_ref().is_some_and(|eq| {
                    !eq.is_empty()
                        && ((pre_insert && pre_delete && post_insert && post_delete)
                            || (eq.len() < edit_cost / 2 && adjacent_edits == 3))
                });
                if eliminate {
                    if let Some(eq_index) = equalities.pop() {
                        let equality = last_equality.take().unwrap_or_default();
                        diffs.insert(eq_index, Diff::delete(equality));
                        diffs[eq_index + 1].op = Operation::Insert;
                        if pre_insert && pre_delete {
                            // No earlier entry can be affected; keep going.
                            post_insert = true;
                            post_delete = true;
                            equalities.clear();
                        } else {
                            let _ = equalities.pop();
                            pointer = equalities.last().map(|&i| i as isize).unwrap_or(-1);
                            post_insert = false;
                            post_delete = false;
                        }
                        changes = true;
                    }
                }
            }
            pointer += 1;
        }

        if changes {
            self.diff_cleanup_merge(diffs);
        }
    }
}

/// Score how semantically clean a boundary between `one` and `two` is.
/// 6 = edge of the text, 5 = blank line, 4 = line break, 3 = end of
/// sentence, 2 = whitespace, 1 = non-alphanumeric, 0 = none of the above.
/// Byte classes are ASCII; non-ASCII bytes rank as non-alphanumeric.
fn boundary_score(one: &[u8], two: &[u8]) -> u32 {
    if one.is_empty() || two.is_empty() {
        return 6;
    }
    let byte1 = one[one.len() - 1];
    let byte2 = two[0];
    let non_alnum1 = !byte1.is_ascii_alphanumeric();
    let non_alnum2 = !byte2.is_ascii_alphanumeric();
    let whitespace1 = non_alnum1 && byte1.is_ascii_whitespace();
    let whitespace2 = non_alnum2 && byte2.is_ascii_whitespace();
    let line_break1 = whitespace1 && (byte1 == b'\n' || byte1 == b'\r');
    let line_break2 = whitespace2 && (byte2 == b'\n' || byte2 == b'\r');
    let blank_line1 = line_break1 && (one.ends_with(b"\n\n") || one.ends_with(b"\n\r\n"));
    let blank_line2 = line_break2
        && (two.starts_with(b"\n\n")
            || two.starts_with(b"\r\n\n")
            || two.starts_with(b"\n\r\n")
            || two.starts_with(b"\r\n\r\n"));

    if blank_line1 || blank_line2 {
        5
    } else if line_break1 || line_break2 {
        4
    } else if non_alnum1 && !whitespace1 && whitespace2 {
        3
    } else if whitespace1 || whitespace2 {
        2
    } else if non_alnum1 || non_alnum2 {
        1
    } else {
        0
    }
}

/// Length of the longest suffix of `text1` that is a prefix of `text2`.
pub(crate) fn common_overlap(text1: &[u8], text2: &[u8]) -> usize {
    if text1.is_empty() || text2.is_empty() {
        return 0;
    }
    // Truncate to equal lengths.
    let (text1, text2) = if text1.len() > text2.len() {
        (&text1[text1.len() - text2.len()..], text2)
    } else {
        (text1, &text2[..text1.len()])
    };
    let length = text1.len();
    if text1 == text2 {
        return length;
    }

    // Grow a candidate suffix one byte at a time, jumping ahead by where it
    // reappears in text2.
    let mut best = 0;
    let mut size = 1;
    loop {
        if size > length {
            return best;
        }
        let pattern = &text1[length - size..];
        match sub_index(text2, pattern) {
            None => return best,
            Some(found) => {
                size += found;
                if found == 0 || text1[length - size..] == text2[..size] {
                    best = size;
                    size += 1;
                }
            }
        }
    }
}
