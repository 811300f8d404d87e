/// The kind of edit a diff segment represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Text present in the pre-image only.
    Delete,
    /// Text present in the post-image only.
    Insert,
    /// Text common to both sides.
    Equal,
}

/// One diff segment: an operation applied to a run of bytes.
///
/// Texts are byte strings. All offsets and lengths in this crate are byte
/// offsets over UTF-8 text; that convention is load-bearing for the
/// serialized patch coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub op: Operation,
    pub text: Vec<u8>,
}

impl Diff {
    pub fn new(op: Operation, text: impl Into<Vec<u8>>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }

    pub fn delete(text: impl Into<Vec<u8>>) -> Self {
        Self::new(Operation::Delete, text)
    }

    pub fn insert(text: impl Into<Vec<u8>>) -> Self {
        Self::new(Operation::Insert, text)
    }

    pub fn equal(text: impl Into<Vec<u8>>) -> Self {
        Self::new(Operation::Equal, text)
    }
}

/// Rebuild the pre-image text (equalities and deletions) from a diff.
pub fn before_text(diffs: &[Diff]) -> Vec<u8> {
    let mut out = Vec::new();
    for d in diffs {
        if d.op != Operation::Insert {
            out.extend_from_slice(&d.text);
        }
    }
    out
}

/// Rebuild the post-image text (equalities and insertions) from a diff.
pub fn after_text(diffs: &[Diff]) -> Vec<u8> {
    let mut out = Vec::new();
    for d in diffs {
        if d.op != Operation::Delete {
            out.extend_from_slice(&d.text);
        }
    }
    out
}

/// Edit weight of a diff: inserted plus deleted bytes, where a paired
/// deletion and insertion counts once as a substitution.
pub fn levenshtein(diffs: &[Diff]) -> usize {
    let mut total = 0;
    let mut insertions = 0;
    let mut deletions = 0;
    for d in diffs {
        match d.op {
            Operation::Insert => insertions += d.text.len(),
            Operation::Delete => deletions += d.text.len(),
            Operation::Equal => {
                total += insertions.max(deletions);
                insertions = 0;
                deletions = 0;
            }
        }
    }
    total + insertions.max(deletions)
}

/// Map a byte offset in the pre-image to the corresponding offset in the
/// post-image under the given diff. Offsets falling inside a deletion map
/// to the deletion point.
pub fn translate_position(diffs: &[Diff], loc: usize) -> usize {
    let mut chars1 = 0;
    let mut chars2 = 0;
    let mut last_chars1 = 0;
    let mut last_chars2 = 0;
    let mut overshoot_op = None;
    for d in diffs {
        if d.op != Operation::Insert {
            chars1 += d.text.len();
        }
        if d.op != Operation::Delete {
            chars2 += d.text.len();
        }
        if chars1 > loc {
            overshoot_op = Some(d.op);
            break;
        }
        last_chars1 = chars1;
        last_chars2 = chars2;
    }
    if overshoot_op == Some(Operation::Delete) {
        return last_chars2;
    }
    last_chars2 + (loc - last_chars1)
}
