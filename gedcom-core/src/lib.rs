//! # Gedcom Core
//!
//! Streaming reader and writer for GEDCOM 5.5 genealogy files.
//!
//! ## Modules
//!
//! - `constants`: Line format limits and tag tables
//! - `types`: The scanned line (`Line`) and xref helpers
//! - `scanner`: Byte-level line tokenizer
//! - `decoder`: Builds the record graph from scanned lines
//! - `encoder`: Writes a record graph back out as lines
//! - `linker`: Record arenas, typed ids and xref resolution
//! - `model`: Records and substructures of the graph
//! - `names`: Personal name splitting

#![warn(missing_docs)]

pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod linker;
pub mod model;
pub mod names;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use decoder::{decode_from_bytes, Decoder};
pub use encoder::{encode_to_bytes, Encoder};
pub use error::{GedcomError, ScanErrorKind};
pub use linker::{Arena, Record, RecordId, RecordKind, ReferenceTable};
pub use model::{
    Family, Gedcom, Header, Individual, Media, MediaLink, Repository, Source, Submission,
    Submitter, UserDefinedTag,
};
pub use names::{split_personal_name, ParsedName};
pub use scanner::{scan_lines, Scanner};
pub use types::Line;

/// Result type alias for GEDCOM operations
pub type Result<T> = core::result::Result<T, GedcomError>;
