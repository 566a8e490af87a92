//! Constants and limits for the GEDCOM line format

/// Maximum number of characters of one text segment written on a single line.
/// Longer segments are continued on `CONC` lines.
pub const MAX_SEGMENT_LEN: usize = 246;

/// Number of bytes requested from the reader each time the scanner window runs dry
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Encoder buffer size after which pending output is written through to the sink
pub const WRITE_THROUGH_THRESHOLD: usize = 64 * 1024;

/// Deepest level a line may carry. Nesting below it is bounded by this.
pub const MAX_LEVEL: usize = 99;

/// Line terminator emitted by the encoder
pub const LINE_TERMINATOR: &[u8] = b"\n";

/// Delimiter wrapping cross-reference identifiers (`@I1@`)
pub const XREF_DELIMITER: char = '@';

/// Continuation tag: append a newline, then the value
pub const TAG_CONT: &str = "CONT";

/// Concatenation tag: append the value with no separator
pub const TAG_CONC: &str = "CONC";

/// Tags that open an individual event structure
pub const INDIVIDUAL_EVENT_TAGS: &[&str] = &[
    "BIRT", "CHR", "DEAT", "BURI", "CREM", "ADOP", "BAPM", "BARM", "BASM", "BLES", "CHRA",
    "CONF", "FCOM", "ORDN", "NATU", "EMIG", "IMMI", "CENS", "PROB", "WILL", "GRAD", "RETI",
    "EVEN",
];

/// Tags that open an individual attribute structure
pub const INDIVIDUAL_ATTRIBUTE_TAGS: &[&str] = &[
    "CAST", "DSCR", "EDUC", "IDNO", "NATI", "NCHI", "NMR", "OCCU", "PROP", "RELI", "RESI",
    "SSN", "TITL", "FACT",
];

/// Tags that open a family event structure
pub const FAMILY_EVENT_TAGS: &[&str] = &[
    "ANUL", "CENS", "DIV", "DIVF", "ENGA", "MARR", "MARB", "MARC", "MARL", "MARS", "EVEN",
    "RESI",
];

/// Check whether `tag` opens an individual event
pub fn is_individual_event(tag: &str) -> bool {
    INDIVIDUAL_EVENT_TAGS.contains(&tag)
}

/// Check whether `tag` opens an individual attribute
pub fn is_individual_attribute(tag: &str) -> bool {
    INDIVIDUAL_ATTRIBUTE_TAGS.contains(&tag)
}

/// Check whether `tag` opens a family event
pub fn is_family_event(tag: &str) -> bool {
    FAMILY_EVENT_TAGS.contains(&tag)
}

/// Check whether `tag` is a non-standard, user-defined tag
pub fn is_user_tag(tag: &str) -> bool {
    tag.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_tables() {
        assert!(is_individual_event("BIRT"));
        assert!(is_individual_attribute("OCCU"));
        assert!(is_family_event("MARR"));
        assert!(!is_family_event("BIRT"));
        // RESI is an individual attribute and a family event
        assert!(is_individual_attribute("RESI") && is_family_event("RESI"));
        assert!(is_user_tag("_MYOWNTAG"));
        assert!(!is_user_tag("NOTE"));
    }
}
