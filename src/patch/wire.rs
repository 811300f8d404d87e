use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diff::{Diff, Operation};
use crate::patch::{ParseError, Patch};
use crate::patcher::Patcher;

/// `@@ -start1[,length1] +start2[,length2] @@`
static PATCH_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+),?(\d*) \+(\d+),?(\d*) @@$").expect("valid header regex"));

impl fmt::Display for Patch {
    /// Render in the GNU-diff-like textual form. Coordinates are printed
    /// 1-based except for the empty-range case, which stays 0-based.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{} +{} @@\n",
            coords(self.start1, self.length1),
            coords(self.start2, self.length2)
        )?;
        for d in &self.diffs {
            let sign = match d.op {
                Operation::Insert => '+',
                Operation::Delete => '-',
                Operation::Equal => ' ',
            };
            write!(f, "{}{}\n", sign, encode_body(&d.text))?;
        }
        Ok(())
    }
}

fn coords(start: usize, length: usize) -> String {
    match length {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, length),
    }
}

/// Inverse of [`coords`]: an absent length means 1, and the start drops
/// back to 0-based unless the length was rendered as 0.
fn decode_coords(start: &str, length: &str) -> (usize, usize) {
    let start: usize = start.parse().unwrap_or(0);
    match length {
        "" => (start.saturating_sub(1), 1),
        "0" => (start, 0),
        _ => (start.saturating_sub(1), length.parse().unwrap_or(0)),
    }
}

impl Patcher {
    /// Serialize a list of patches to the textual wire form.
    pub fn patch_to_text(&self, patches: &[Patch]) -> String {
        let mut text = String::new();
        for patch in patches {
            text.push_str(&patch.to_string());
        }
        text
    }

    /// Parse the textual wire form back into patches.
    ///
    /// Blank lines inside a patch body are skipped. A malformed header or
    /// an unknown sign byte fails the parse; everything accepted so far is
    /// discarded.
    pub fn patch_from_text(&self, text: impl AsRef<str>) -> Result<Vec<Patch>, ParseError> {
        let text = text.as_ref();
        let mut patches = Vec::new();
        if text.is_empty() {
            return Ok(patches);
        }

        let lines: Vec<&str> = text.split('\n').collect();
        let mut pointer = 0;
        while pointer < lines.len() {
            let header = lines[pointer];
            let captures = PATCH_HEADER.captures(header).ok_or_else(|| {
                ParseError::InvalidHeader {
                    line: header.to_string(),
                }
            })?;

            let mut patch = Patch::default();
            let (start1, length1) = decode_coords(&captures[1], &captures[2]);
            let (start2, length2) = decode_coords(&captures[3], &captures[4]);
            patch.start1 = start1;
            patch.length1 = length1;
            patch.start2 = start2;
            patch.length2 = length2;
            pointer += 1;

            while pointer < lines.len() {
                let line = lines[pointer];
                let Some(&sign) = line.as_bytes().first() else {
                    // Blank line; skip it without closing the patch.
                    pointer += 1;
                    continue;
                };
                match sign {
                    b'@' => break, // Start of the next patch.
                    b'-' | b'+' | b' ' => {
                        let op = match sign {
                            b'-' => Operation::Delete,
                            b'+' => Operation::Insert,
                            _ => Operation::Equal,
                        };
                        let body = decode_body(&line.as_bytes()[1..]);
                        patch.diffs.push(Diff::new(op, body));
                        pointer += 1;
                    }
                    other => {
                        return Err(ParseError::InvalidSign {
                            sign: other as char,
                            line: line.to_string(),
                        });
                    }
                }
            }

            patches.push(patch);
        }
        Ok(patches)
    }
}

/// Percent-encode a diff body, leaving the format's safe set literal:
/// alphanumerics, `-_.~`, space, and `!'();/?:@&=+$,#*`. Hex is uppercase.
fn encode_body(text: &[u8]) -> String {
    let encoded = urlencoding::encode_binary(text);
    let bytes = encoded.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(literal) = safe_escape(bytes[i + 1], bytes[i + 2]) {
                out.push(literal);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

/// The escapes the wire format keeps literal, as emitted by the encoder.
fn safe_escape(hex1: u8, hex2: u8) -> Option<char> {
    Some(match (hex1, hex2) {
        (b'2', b'0') => ' ',
        (b'2', b'1') => '!',
        (b'2', b'3') => '#',
        (b'2', b'4') => '$',
        (b'2', b'6') => '&',
        (b'2', b'7') => '\'',
        (b'2', b'8') => '(',
        (b'2', b'9') => ')',
        (b'2', b'A') => '*',
        (b'2', b'B') => '+',
        (b'2', b'C') => ',',
        (b'2', b'F') => '/',
        (b'3', b'A') => ':',
        (b'3', b'B') => ';',
        (b'3', b'D') => '=',
        (b'3', b'F') => '?',
        (b'4', b'0') => '@',
        (b'7', b'E') => '~',
        _ => return None,
    })
}

/// Decode a body line: percent escapes of either hex case are decoded,
/// `+` is a literal plus, malformed escapes pass through unchanged.
fn decode_body(encoded: &[u8]) -> Vec<u8> {
    urlencoding::decode_binary(encoded).into_owned()
}
