use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs shared by the diff engine, the fuzzy matcher and the
/// patch machinery.
///
/// A `Settings` value is read-only for the duration of any single call;
/// callers that want different parameters per call hold their own instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Score above which no match is declared (0.0 = perfection,
    /// 1.0 = very loose).
    pub match_threshold: f64,

    /// How far from the expected location to search for a match
    /// (0 = exact location only, 1000+ = broad match). A candidate this
    /// many bytes away from the expected location adds 1.0 to its score.
    pub match_distance: usize,

    /// Maximum pattern length the bit-parallel matcher will handle.
    /// Bounded by the bit row width (64); interoperable patch streams
    /// keep this at 32.
    pub match_max_bits: usize,

    /// When deleting a large block of text (longer than `match_max_bits`),
    /// how close the found contents must be to the expected contents
    /// (0.0 = perfection, 1.0 = very loose). `match_threshold` still
    /// controls how closely the end points of the delete must match.
    pub patch_delete_threshold: f64,

    /// Chunk size for patch context, in bytes.
    pub patch_margin: usize,

    /// How long a diff computation may run before degrading to a coarser
    /// result. Zero means no limit.
    pub diff_timeout: Duration,

    /// Cost of an empty edit operation in terms of edit bytes, used by the
    /// efficiency cleanup.
    pub diff_edit_cost: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
            match_distance: 1000,
            match_max_bits: 32,
            patch_delete_threshold: 0.5,
            patch_margin: 4,
            diff_timeout: Duration::from_secs(1),
            diff_edit_cost: 4,
        }
    }
}
