//! Patch records and the operations that build, serialize and apply them.

mod apply;
mod builder;
mod errors;
mod wire;

pub use errors::ParseError;

use crate::diff::Diff;

/// One localized edit: pre-image context, the mutations, and positions in
/// the pre- and post-image texts.
///
/// Invariants at the boundary of every public operation:
/// `length1` is the byte total of the delete and equal segments,
/// `length2` of the insert and equal segments, and no two adjacent
/// segments share an operation.
///
/// Patches are values: `Clone` produces a fully independent deep copy, and
/// [`Patcher::patch_apply`](crate::Patcher::patch_apply) copies its input
/// so callers' patches are never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    /// Diff segments covering the patch body in reading order.
    pub diffs: Vec<Diff>,
    /// Byte offset into the pre-patch text.
    pub start1: usize,
    /// Byte offset into the post-patch text.
    pub start2: usize,
    /// Bytes consumed on the pre-patch side.
    pub length1: usize,
    /// Bytes consumed on the post-patch side.
    pub length2: usize,
}
