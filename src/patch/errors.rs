use thiserror::Error;

/// Failures while parsing the textual patch form.
///
/// These are the only errors this crate surfaces: building, matching and
/// applying patches accept any input and return best-effort results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid patch header: {line}")]
    InvalidHeader { line: String },

    #[error("invalid patch mode '{sign}' in: {line}")]
    InvalidSign { sign: char, line: String },
}
