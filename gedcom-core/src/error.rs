//! Error types for GEDCOM operations

use thiserror::Error;

/// The specific way a physical line failed to tokenize
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// Something other than whitespace appeared before the level number
    #[error("found non-whitespace before level")]
    NonWhitespaceBeforeLevel,

    /// The level contained non-numerics
    #[error("level contained non-numerics")]
    InvalidLevel,

    /// The level is deeper than [`MAX_LEVEL`](crate::constants::MAX_LEVEL)
    #[error("level deeper than 99")]
    LevelTooDeep,

    /// The tag contained a character outside `[A-Za-z0-9_]`
    #[error("tag contained non-alphanumeric")]
    InvalidTag,

    /// The xref contained a character outside `[A-Za-z0-9_]` or was not `@`-delimited
    #[error("xref contained non-alphanumeric")]
    InvalidXref,
}

/// Errors that can occur while decoding or encoding GEDCOM data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GedcomError {
    /// The tokenizer rejected a line
    #[error("Scan error on line {line} (byte {offset}): {kind}")]
    Scan {
        /// Physical line number, starting at 1
        line: usize,
        /// Byte offset of the offending character
        offset: u64,
        /// What went wrong
        kind: ScanErrorKind,
    },

    /// Input ended in the middle of a line
    #[error("Unexpected end of input on line {line} (byte {offset})")]
    UnexpectedEof {
        /// Physical line number, starting at 1
        line: usize,
        /// Byte offset where input ended
        offset: u64,
    },

    /// IO error during read/write
    #[error("IO error: {0}")]
    Io(String),

    /// A record that must be written as a pointer, or a top-level record, has no xref
    #[error("{tag} missing xref")]
    MissingXref {
        /// Tag of the line that needed the xref
        tag: String,
    },

    /// A record id does not resolve in the graph being encoded
    #[error("{tag} refers to a record that is not in this graph")]
    DanglingReference {
        /// Tag of the line that carried the pointer
        tag: String,
    },
}

impl From<std::io::Error> for GedcomError {
    fn from(err: std::io::Error) -> Self {
        GedcomError::Io(err.to_string())
    }
}
