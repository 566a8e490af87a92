//! Core line type produced by the scanner

use crate::constants::XREF_DELIMITER;
use serde::{Deserialize, Serialize};

/// One tokenized GEDCOM line
///
/// `xref` is the identifier the line *defines* (`0 @I1@ INDI`). A pointer
/// *to* another record (`1 FAMC @F1@`) stays in `value`. Absent fields are
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Nesting depth
    pub level: usize,

    /// Line tag, e.g. `INDI` or `_MYOWNTAG`
    pub tag: String,

    /// Defining cross-reference identifier, without the `@` delimiters
    pub xref: String,

    /// Free text following the tag
    pub value: String,

    /// Physical line number (1-based) where this line starts
    pub line_no: usize,

    /// Byte offset of the first character of the level
    pub offset: u64,
}

impl Line {
    /// Create a line with no source position
    pub fn new(level: usize, tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            level,
            tag: tag.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Attach a defining xref
    pub fn with_xref(mut self, xref: impl Into<String>) -> Self {
        self.xref = xref.into();
        self
    }

    /// The pointer carried in the value, if the value has the form `@XREF@`
    pub fn pointer(&self) -> Option<&str> {
        parse_pointer(&self.value)
    }
}

/// Extract `XREF` from a value of the form `@XREF@`
///
/// Returns `None` for plain text, for the `@@` escape and for values that
/// contain spaces or further `@` characters inside the delimiters.
pub fn parse_pointer(value: &str) -> Option<&str> {
    let inner = value
        .strip_prefix(XREF_DELIMITER)?
        .strip_suffix(XREF_DELIMITER)?;
    if inner.is_empty() || inner.contains(XREF_DELIMITER) || inner.contains(' ') {
        return None;
    }
    Some(inner)
}

/// Strip `@` delimiters from a value that is expected to be a pointer
pub fn strip_xref(value: &str) -> &str {
    value.trim_matches(XREF_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pointer() {
        assert_eq!(parse_pointer("@I1@"), Some("I1"));
        assert_eq!(parse_pointer("@FAMILY_2@"), Some("FAMILY_2"));
        assert_eq!(parse_pointer("@@"), None);
        assert_eq!(parse_pointer("@I1"), None);
        assert_eq!(parse_pointer("mail me @ home@"), None);
        assert_eq!(parse_pointer("plain text"), None);
    }

    #[test]
    fn test_line_pointer() {
        let line = Line::new(1, "FAMC", "@F1@");
        assert_eq!(line.pointer(), Some("F1"));
        assert!(line.xref.is_empty());

        let def = Line::new(0, "INDI", "").with_xref("I1");
        assert_eq!(def.xref, "I1");
        assert_eq!(def.pointer(), None);
    }

    #[test]
    fn test_strip_xref() {
        assert_eq!(strip_xref("@F1@"), "F1");
        assert_eq!(strip_xref("F1"), "F1");
        assert_eq!(strip_xref(""), "");
    }
}
