//! Fuzzy substring location.
//!
//! [`Patcher::match_main`](crate::Patcher::match_main) shortcuts the exact
//! cases and otherwise delegates to the bit-parallel bitap locator.

mod bitap;

use crate::patcher::Patcher;

impl Patcher {
    /// Locate the best instance of `pattern` in `text` near `loc`.
    ///
    /// `loc` is clamped to `[0, text.len()]`. Returns the byte offset of
    /// the best match, or `None` if no acceptable match exists.
    pub fn match_main(
        &self,
        text: impl AsRef<[u8]>,
        pattern: impl AsRef<[u8]>,
        loc: usize,
    ) -> Option<usize> {
        let text = text.as_ref();
        let pattern = pattern.as_ref();
        let loc = loc.min(text.len());

        if text == pattern {
            // Shortcut (not guaranteed by the fuzzy algorithm).
            return Some(0);
        }
        if text.is_empty() {
            return None;
        }
        if loc + pattern.len() <= text.len() && &text[loc..loc + pattern.len()] == pattern {
            // Perfect match at the perfect spot (covers the empty pattern).
            return Some(loc);
        }
        self.match_bitap(text, pattern, loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matches_shortcut() {
        let p = Patcher::new();
        assert_eq!(p.match_main("abcdef", "abcdef", 1000), Some(0));
        assert_eq!(p.match_main("", "abcdef", 1), None);
        assert_eq!(p.match_main("abcdef", "", 3), Some(3));
        assert_eq!(p.match_main("abcdef", "de", 3), Some(3));
    }

    #[test]
    fn loc_is_clamped() {
        let p = Patcher::new();
        assert_eq!(p.match_main("abcdef", "defy", 4), Some(3));
        assert_eq!(p.match_main("abcdef", "abcdefy", 0), Some(0));
    }

    #[test]
    fn hopeless_patterns_report_no_match() {
        let p = Patcher::new();
        assert_eq!(p.match_main("abcdef", "xxxxx", 3), None);
    }
}
