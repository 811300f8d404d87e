//! Driftpatch: fuzzy matching and patch application for plain text
//!
//! A synchronization toolkit for text documents: compute a diff between two
//! versions, condense it into compact context-bearing patches, serialize
//! them to a portable GNU-diff-like textual form, parse that form back, and
//! apply the patches to a target text that may have drifted from the
//! original — the context is located fuzzily, so edits near (but not
//! identical to) the expected surroundings still land.
//!
//! # Architecture
//!
//! Everything hangs off [`Patcher`], a cheap value carrying a [`Settings`]
//! record:
//!
//! - `diff_*` methods compute and normalize diffs between byte texts
//! - `match_*` methods locate a pattern fuzzily near an expected position
//! - `patch_*` methods build, serialize, parse, split and apply patches
//!
//! All offsets and lengths are byte offsets over UTF-8 text; this matches
//! the serialized coordinate format other implementations of the patch
//! format expect.
//!
//! # Example
//!
//! ```
//! use driftpatch::Patcher;
//!
//! let patcher = Patcher::new();
//! let patches = patcher.patch_make(
//!     "The quick brown fox jumps over the lazy dog.",
//!     "The quick brown fox leaps over the lazy dog.",
//! );
//! let wire = patcher.patch_to_text(&patches);
//!
//! // ...transmit `wire`, then on the other side:
//! let patches = patcher.patch_from_text(&wire).unwrap();
//! let (patched, results) =
//!     patcher.patch_apply(&patches, "The quick brown fox jumps over a lazy dog.");
//! assert!(results.iter().all(|&ok| ok));
//! assert_eq!(
//!     String::from_utf8(patched).unwrap(),
//!     "The quick brown fox leaps over a lazy dog.",
//! );
//! ```

pub mod diff;
pub mod matcher;
pub mod patch;
mod patcher;
mod settings;

// Re-exports
pub use diff::{Diff, Operation};
pub use patch::{ParseError, Patch};
pub use patcher::Patcher;
pub use settings::Settings;
