//! GEDCOM encoding
//!
//! The encoder walks a [`Gedcom`] graph in a fixed order and writes one line
//! per field: header, individuals, families, media, repositories, sources,
//! submitters, submissions, top-level user-defined records, trailer.
//!
//! Multi-line text is split on `\n` into `CONT` lines, and any segment longer
//! than [`MAX_SEGMENT_LEN`] characters is continued on `CONC` lines.

use crate::constants::{LINE_TERMINATOR, MAX_SEGMENT_LEN, TAG_CONC, TAG_CONT, WRITE_THROUGH_THRESHOLD};
use crate::error::GedcomError;
use crate::linker::{Record, RecordId};
use crate::model::*;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Write;

#[cfg(feature = "logging")]
use tracing::debug;

/// Writes a [`Gedcom`] graph as GEDCOM lines
///
/// Output is staged in a buffer and written through to the writer in large
/// blocks. If `encode` fails, whatever was already written is incomplete and
/// should be discarded.
pub struct Encoder<W: Write> {
    writer: W,
    buf: BytesMut,
    lines: usize,
}

impl<W: Write> Encoder<W> {
    /// Create an encoder writing to `writer`
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: BytesMut::with_capacity(WRITE_THROUGH_THRESHOLD),
            lines: 0,
        }
    }

    /// Encode the whole graph and flush the writer
    pub fn encode(&mut self, gedcom: &Gedcom) -> Result<(), GedcomError> {
        #[cfg(feature = "logging")]
        debug!(
            "Encoding {} individuals, {} families, {} sources",
            gedcom.individuals.len(),
            gedcom.families.len(),
            gedcom.sources.len()
        );

        self.buf.clear();
        self.lines = 0;

        if let Some(header) = &gedcom.header {
            self.header(gedcom, header)?;
        }
        for &id in &gedcom.individuals {
            self.individual(gedcom, record(gedcom, "INDI", id)?)?;
        }
        for &id in &gedcom.families {
            self.family(gedcom, record(gedcom, "FAM", id)?)?;
        }
        for &id in &gedcom.media {
            let media = record(gedcom, "OBJE", id)?;
            self.definition(0, "OBJE", &media.xref)?;
            self.media_body(gedcom, 1, media)?;
        }
        for &id in &gedcom.repositories {
            self.repository(gedcom, record(gedcom, "REPO", id)?)?;
        }
        for &id in &gedcom.sources {
            self.source(gedcom, record(gedcom, "SOUR", id)?)?;
        }
        for &id in &gedcom.submitters {
            self.submitter(gedcom, record(gedcom, "SUBM", id)?)?;
        }
        for &id in &gedcom.submissions {
            self.submission(gedcom, record(gedcom, "SUBN", id)?)?;
        }
        self.user_defined_list(0, &gedcom.user_defined)?;
        if gedcom.trailer.is_some() {
            self.line(0, "TRLR", "")?;
        }

        self.write_through()?;
        self.writer.flush()?;

        #[cfg(feature = "logging")]
        debug!("Encoded {} lines", self.lines);

        Ok(())
    }

    /// Number of lines written by the last `encode`
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn header(&mut self, g: &Gedcom, h: &Header) -> Result<(), GedcomError> {
        self.line(0, "HEAD", "")?;
        if !h.character_set.is_empty() || !h.character_set_version.is_empty() {
            self.line(1, "CHAR", &h.character_set)?;
            self.maybe(2, "VERS", &h.character_set_version)?;
        }
        if h.source_system != SystemRecord::default() {
            self.system(&h.source_system)?;
        }
        self.maybe(1, "DEST", &h.destination)?;
        if !h.date.is_empty() || !h.time.is_empty() {
            self.line(1, "DATE", &h.date)?;
            self.maybe(2, "TIME", &h.time)?;
        }
        if let Some(id) = h.submitter {
            self.pointer(g, 1, "SUBM", id)?;
        }
        if let Some(id) = h.submission {
            self.pointer(g, 1, "SUBN", id)?;
        }
        self.maybe(1, "FILE", &h.filename)?;
        self.maybe(1, "COPR", &h.copyright)?;
        if !h.version.is_empty() || !h.form.is_empty() {
            self.line(1, "GEDC", "")?;
            self.maybe(2, "VERS", &h.version)?;
            self.maybe(2, "FORM", &h.form)?;
        }
        self.maybe(1, "LANG", &h.language)?;
        self.maybe_text(1, "NOTE", &h.note)?;
        self.user_defined_list(1, &h.user_defined)
    }

    fn system(&mut self, s: &SystemRecord) -> Result<(), GedcomError> {
        self.line(1, "SOUR", &s.xref)?;
        self.maybe(2, "VERS", &s.version)?;
        self.maybe(2, "NAME", &s.product_name)?;
        if !s.business_name.is_empty() || !s.address.is_empty() {
            self.line(2, "CORP", &s.business_name)?;
            self.address(3, &s.address)?;
        }
        if !s.source_name.is_empty() || !s.source_date.is_empty() || !s.source_copyright.is_empty() {
            self.line(2, "DATA", &s.source_name)?;
            self.maybe(3, "DATE", &s.source_date)?;
            self.maybe_text(3, "COPR", &s.source_copyright)?;
        }
        self.user_defined_list(2, &s.user_defined)
    }

    fn individual(&mut self, g: &Gedcom, r: &Individual) -> Result<(), GedcomError> {
        self.definition(0, "INDI", &r.xref)?;
        for name in &r.names {
            self.name(g, 1, name)?;
        }
        self.maybe(1, "SEX", &r.sex)?;
        self.event_list(g, 1, &r.events)?;
        self.event_list(g, 1, &r.attributes)?;
        for link in &r.parents {
            self.family_link(g, 1, "FAMC", link)?;
        }
        for link in &r.families {
            self.family_link(g, 1, "FAMS", link)?;
        }
        for &id in &r.submitters {
            self.pointer(g, 1, "SUBM", id)?;
        }
        for association in &r.associations {
            self.pointer(g, 1, "ASSO", association.individual)?;
            self.maybe(2, "RELA", &association.relation)?;
            self.citation_list(g, 2, &association.citations)?;
            self.note_list(g, 2, &association.notes)?;
            self.user_defined_list(2, &association.user_defined)?;
        }
        self.maybe(1, "RFN", &r.permanent_record_file_number)?;
        self.maybe(1, "AFN", &r.ancestral_file_number)?;
        self.user_reference_list(1, &r.user_references)?;
        self.maybe(1, "RIN", &r.automated_record_id)?;
        self.change(g, 1, r.change.as_ref())?;
        self.note_list(g, 1, &r.notes)?;
        self.citation_list(g, 1, &r.citations)?;
        self.media_list(g, 1, &r.media)?;
        self.user_defined_list(1, &r.user_defined)
    }

    fn family(&mut self, g: &Gedcom, r: &Family) -> Result<(), GedcomError> {
        self.definition(0, "FAM", &r.xref)?;
        if let Some(id) = r.husband {
            self.pointer(g, 1, "HUSB", id)?;
        }
        if let Some(id) = r.wife {
            self.pointer(g, 1, "WIFE", id)?;
        }
        for &id in &r.children {
            self.pointer(g, 1, "CHIL", id)?;
        }
        self.event_list(g, 1, &r.events)?;
        self.maybe(1, "NCHI", &r.number_of_children)?;
        self.user_reference_list(1, &r.user_references)?;
        self.maybe(1, "RIN", &r.automated_record_id)?;
        self.change(g, 1, r.change.as_ref())?;
        self.note_list(g, 1, &r.notes)?;
        self.citation_list(g, 1, &r.citations)?;
        self.media_list(g, 1, &r.media)?;
        self.user_defined_list(1, &r.user_defined)
    }

    /// Everything below an `OBJE` line, at `level`
    fn media_body(&mut self, g: &Gedcom, level: usize, r: &Media) -> Result<(), GedcomError> {
        for file in &r.files {
            self.line(level, "FILE", &file.name)?;
            if !file.format.is_empty() || !file.format_type.is_empty() {
                self.line(level + 1, "FORM", &file.format)?;
                self.maybe(level + 2, "TYPE", &file.format_type)?;
            }
            self.maybe_text(level + 1, "TITL", &file.title)?;
            self.user_defined_list(level + 1, &file.user_defined)?;
        }
        self.user_reference_list(level, &r.user_references)?;
        self.maybe(level, "RIN", &r.automated_record_id)?;
        self.note_list(g, level, &r.notes)?;
        self.citation_list(g, level, &r.citations)?;
        self.change(g, level, r.change.as_ref())?;
        self.user_defined_list(level, &r.user_defined)
    }

    fn repository(&mut self, g: &Gedcom, r: &Repository) -> Result<(), GedcomError> {
        self.definition(0, "REPO", &r.xref)?;
        self.maybe(1, "NAME", &r.name)?;
        self.address(1, &r.address)?;
        self.note_list(g, 1, &r.notes)?;
        self.user_reference_list(1, &r.user_references)?;
        self.maybe(1, "RIN", &r.automated_record_id)?;
        self.change(g, 1, r.change.as_ref())?;
        self.user_defined_list(1, &r.user_defined)
    }

    fn source(&mut self, g: &Gedcom, r: &Source) -> Result<(), GedcomError> {
        self.definition(0, "SOUR", &r.xref)?;
        self.maybe_text(1, "TITL", &r.title)?;
        if let Some(data) = &r.data {
            self.line(1, "DATA", "")?;
            for event in &data.events {
                self.line(2, "EVEN", &event.kind)?;
                self.maybe(3, "DATE", &event.date)?;
                self.maybe(3, "PLAC", &event.place)?;
                self.user_defined_list(3, &event.user_defined)?;
            }
            self.user_defined_list(2, &data.user_defined)?;
        }
        self.maybe_text(1, "AUTH", &r.originator)?;
        self.maybe(1, "ABBR", &r.filed_by)?;
        self.maybe_text(1, "PUBL", &r.publication_facts)?;
        self.maybe_text(1, "TEXT", &r.text)?;
        if let Some(repository) = &r.repository {
            match repository.repository {
                Some(id) => self.pointer(g, 1, "REPO", id)?,
                None => self.line(1, "REPO", "")?,
            }
            self.note_list(g, 2, &repository.notes)?;
            for number in &repository.call_numbers {
                self.line(2, "CALN", &number.number)?;
                self.maybe(3, "MEDI", &number.media_type)?;
                self.user_defined_list(3, &number.user_defined)?;
            }
            self.user_defined_list(2, &repository.user_defined)?;
        }
        self.user_reference_list(1, &r.user_references)?;
        self.maybe(1, "RIN", &r.automated_record_id)?;
        self.change(g, 1, r.change.as_ref())?;
        self.note_list(g, 1, &r.notes)?;
        self.media_list(g, 1, &r.media)?;
        self.user_defined_list(1, &r.user_defined)
    }

    fn submitter(&mut self, g: &Gedcom, r: &Submitter) -> Result<(), GedcomError> {
        self.definition(0, "SUBM", &r.xref)?;
        self.maybe(1, "NAME", &r.name)?;
        self.address(1, &r.address)?;
        self.media_list(g, 1, &r.media)?;
        for language in &r.languages {
            self.line(1, "LANG", language)?;
        }
        self.maybe(1, "RFN", &r.submitter_record_file_id)?;
        self.maybe(1, "RIN", &r.automated_record_id)?;
        self.note_list(g, 1, &r.notes)?;
        self.change(g, 1, r.change.as_ref())?;
        self.user_defined_list(1, &r.user_defined)
    }

    fn submission(&mut self, g: &Gedcom, r: &Submission) -> Result<(), GedcomError> {
        self.definition(0, "SUBN", &r.xref)?;
        if let Some(id) = r.submitter {
            self.pointer(g, 1, "SUBM", id)?;
        }
        self.maybe(1, "FAMF", &r.family_file_name)?;
        self.maybe(1, "TEMP", &r.temple_code)?;
        self.maybe(1, "ANCE", &r.generations_of_ancestors)?;
        self.maybe(1, "DESC", &r.generations_of_descendants)?;
        self.maybe(1, "ORDI", &r.ordinance_process_flag)?;
        self.maybe(1, "RIN", &r.automated_record_id)?;
        self.user_defined_list(1, &r.user_defined)
    }

    fn name(&mut self, g: &Gedcom, level: usize, r: &Name) -> Result<(), GedcomError> {
        self.line(level, "NAME", &r.name)?;
        self.maybe(level + 1, "TYPE", &r.name_type)?;
        self.name_pieces(
            level + 1,
            [&r.prefix, &r.given, &r.nickname, &r.surname_prefix, &r.surname, &r.suffix],
        )?;
        for variant in &r.phonetic {
            self.variant_name(g, level + 1, "FONE", variant)?;
        }
        for variant in &r.romanized {
            self.variant_name(g, level + 1, "ROMN", variant)?;
        }
        self.citation_list(g, level + 1, &r.citations)?;
        self.note_list(g, level + 1, &r.notes)?;
        self.user_defined_list(level + 1, &r.user_defined)
    }

    fn variant_name(
        &mut self,
        g: &Gedcom,
        level: usize,
        tag: &str,
        r: &VariantName,
    ) -> Result<(), GedcomError> {
        self.line(level, tag, &r.name)?;
        self.maybe(level + 1, "TYPE", &r.variant_type)?;
        self.name_pieces(
            level + 1,
            [&r.prefix, &r.given, &r.nickname, &r.surname_prefix, &r.surname, &r.suffix],
        )?;
        self.citation_list(g, level + 1, &r.citations)?;
        self.note_list(g, level + 1, &r.notes)?;
        self.user_defined_list(level + 1, &r.user_defined)
    }

    fn name_pieces(&mut self, level: usize, pieces: [&String; 6]) -> Result<(), GedcomError> {
        const TAGS: [&str; 6] = ["NPFX", "GIVN", "NICK", "SPFX", "SURN", "NSFX"];
        for (tag, value) in TAGS.iter().zip(pieces) {
            self.maybe(level, tag, value)?;
        }
        Ok(())
    }

    fn event_list(&mut self, g: &Gedcom, level: usize, events: &[Event]) -> Result<(), GedcomError> {
        for event in events {
            self.event(g, level, event)?;
        }
        Ok(())
    }

    fn event(&mut self, g: &Gedcom, level: usize, r: &Event) -> Result<(), GedcomError> {
        self.line(level, &r.tag, &r.value)?;
        self.maybe(level + 1, "TYPE", &r.event_type)?;
        self.maybe(level + 1, "DATE", &r.date)?;
        self.address(level + 1, &r.address)?;
        if let Some(place) = &r.place {
            self.place(g, level + 1, place)?;
        }
        self.maybe(level + 1, "AGE", &r.age)?;
        self.maybe(level + 1, "AGNC", &r.agency)?;
        self.maybe(level + 1, "RELI", &r.religious_affiliation)?;
        self.maybe(level + 1, "CAUS", &r.cause)?;
        self.maybe(level + 1, "RESN", &r.restriction_notice)?;
        if let Some(id) = r.child_in_family {
            self.pointer(g, level + 1, "FAMC", id)?;
            if r.tag == "ADOP" {
                self.maybe(level + 2, "ADOP", &r.adopted_by_parent)?;
            }
        }
        self.note_list(g, level + 1, &r.notes)?;
        self.citation_list(g, level + 1, &r.citations)?;
        self.media_list(g, level + 1, &r.media)?;
        self.user_defined_list(level + 1, &r.user_defined)
    }

    fn place(&mut self, g: &Gedcom, level: usize, r: &Place) -> Result<(), GedcomError> {
        self.line(level, "PLAC", &r.name)?;
        for (tag, variants) in [("FONE", &r.phonetic), ("ROMN", &r.romanized)] {
            for variant in variants {
                self.line(level + 1, tag, &variant.name)?;
                self.maybe(level + 2, "TYPE", &variant.variant_type)?;
                self.user_defined_list(level + 2, &variant.user_defined)?;
            }
        }
        if !r.latitude.is_empty() || !r.longitude.is_empty() {
            self.line(level + 1, "MAP", "")?;
            self.maybe(level + 2, "LATI", &r.latitude)?;
            self.maybe(level + 2, "LONG", &r.longitude)?;
        }
        self.citation_list(g, level + 1, &r.citations)?;
        self.note_list(g, level + 1, &r.notes)?;
        self.user_defined_list(level + 1, &r.user_defined)
    }

    fn address(&mut self, level: usize, r: &Address) -> Result<(), GedcomError> {
        for detail in &r.details {
            self.text(level, "ADDR", &detail.full)?;
            self.maybe(level + 1, "ADR1", &detail.line1)?;
            self.maybe(level + 1, "ADR2", &detail.line2)?;
            self.maybe(level + 1, "ADR3", &detail.line3)?;
            self.maybe(level + 1, "CITY", &detail.city)?;
            self.maybe(level + 1, "STAE", &detail.state)?;
            self.maybe(level + 1, "POST", &detail.postal_code)?;
            self.maybe(level + 1, "CTRY", &detail.country)?;
            self.user_defined_list(level + 1, &detail.user_defined)?;
        }
        for (tag, values) in [
            ("PHON", &r.phones),
            ("EMAIL", &r.emails),
            ("FAX", &r.faxes),
            ("WWW", &r.websites),
        ] {
            for value in values {
                self.line(level, tag, value)?;
            }
        }
        Ok(())
    }

    fn family_link(
        &mut self,
        g: &Gedcom,
        level: usize,
        tag: &str,
        r: &FamilyLink,
    ) -> Result<(), GedcomError> {
        self.pointer(g, level, tag, r.family)?;
        self.maybe(level + 1, "PEDI", &r.pedigree)?;
        self.note_list(g, level + 1, &r.notes)?;
        self.user_defined_list(level + 1, &r.user_defined)
    }

    fn change(&mut self, g: &Gedcom, level: usize, r: Option<&Change>) -> Result<(), GedcomError> {
        let Some(r) = r else {
            return Ok(());
        };
        self.line(level, "CHAN", "")?;
        if !r.date.is_empty() || !r.time.is_empty() {
            self.line(level + 1, "DATE", &r.date)?;
            self.maybe(level + 2, "TIME", &r.time)?;
        }
        self.note_list(g, level + 1, &r.notes)?;
        self.user_defined_list(level + 1, &r.user_defined)
    }

    fn note_list(&mut self, g: &Gedcom, level: usize, notes: &[Note]) -> Result<(), GedcomError> {
        for note in notes {
            self.text(level, "NOTE", &note.note)?;
            self.citation_list(g, level + 1, &note.citations)?;
            self.user_defined_list(level + 1, &note.user_defined)?;
        }
        Ok(())
    }

    fn citation_list(
        &mut self,
        g: &Gedcom,
        level: usize,
        citations: &[Citation],
    ) -> Result<(), GedcomError> {
        for citation in citations {
            self.citation(g, level, citation)?;
        }
        Ok(())
    }

    fn citation(&mut self, g: &Gedcom, level: usize, r: &Citation) -> Result<(), GedcomError> {
        let source = record(g, "SOUR", r.source)?;
        if source.xref.is_empty() {
            self.text(level, "SOUR", &source.title)?;
        } else {
            self.pointer_line(level, "SOUR", &source.xref)?;
        }
        self.maybe(level + 1, "PAGE", &r.page)?;
        if !r.data.is_empty() {
            self.line(level + 1, "DATA", "")?;
            self.maybe(level + 2, "DATE", &r.data.date)?;
            for text in &r.data.text {
                self.text(level + 2, "TEXT", text)?;
            }
            self.user_defined_list(level + 2, &r.data.user_defined)?;
        }
        self.maybe(level + 1, "QUAY", &r.quality)?;
        self.note_list(g, level + 1, &r.notes)?;
        self.media_list(g, level + 1, &r.media)?;
        self.user_defined_list(level + 1, &r.user_defined)
    }

    /// Media references; anonymous media are written inline
    fn media_list(&mut self, g: &Gedcom, level: usize, media: &[MediaLink]) -> Result<(), GedcomError> {
        for link in media {
            let r = record(g, "OBJE", link.media)?;
            if r.xref.is_empty() {
                self.line(level, "OBJE", "")?;
                self.media_body(g, level + 1, r)?;
            } else {
                self.pointer_line(level, "OBJE", &r.xref)?;
            }
            self.user_defined_list(level + 1, &link.user_defined)?;
        }
        Ok(())
    }

    fn user_reference_list(
        &mut self,
        level: usize,
        references: &[UserReference],
    ) -> Result<(), GedcomError> {
        for reference in references {
            self.line(level, "REFN", &reference.number)?;
            self.maybe(level + 1, "TYPE", &reference.reference_type)?;
            self.user_defined_list(level + 1, &reference.user_defined)?;
        }
        Ok(())
    }

    /// User-defined trees in document order, walked with an explicit stack
    fn user_defined_list(&mut self, level: usize, tags: &[UserDefinedTag]) -> Result<(), GedcomError> {
        let mut pending: Vec<(usize, &UserDefinedTag)> = tags.iter().rev().map(|tag| (level, tag)).collect();
        while let Some((level, tag)) = pending.pop() {
            if tag.xref.is_empty() {
                self.line(level, &tag.tag, &tag.value)?;
            } else {
                self.line_with_xref(level, &tag.xref, &tag.tag, &tag.value)?;
            }
            pending.extend(tag.children.iter().rev().map(|child| (level + 1, child)));
        }
        Ok(())
    }

    /// `level @xref@ TAG`, for a record that must have an xref
    fn definition(&mut self, level: usize, tag: &str, xref: &str) -> Result<(), GedcomError> {
        if xref.is_empty() {
            return Err(GedcomError::MissingXref { tag: tag.to_string() });
        }
        self.line_with_xref(level, xref, tag, "")
    }

    /// `level TAG @xref@`, resolving `id` in the graph
    fn pointer<T: Record>(
        &mut self,
        g: &Gedcom,
        level: usize,
        tag: &str,
        id: RecordId<T>,
    ) -> Result<(), GedcomError> {
        let target = record(g, tag, id)?;
        self.pointer_line(level, tag, target.xref())
    }

    fn pointer_line(&mut self, level: usize, tag: &str, xref: &str) -> Result<(), GedcomError> {
        if xref.is_empty() {
            return Err(GedcomError::MissingXref { tag: tag.to_string() });
        }
        self.start_line(level, tag);
        self.buf.put_slice(b" @");
        self.buf.put_slice(xref.as_bytes());
        self.buf.put_u8(b'@');
        self.end_line()
    }

    /// Text that may span lines: `CONT` per newline, `CONC` per overlong segment
    fn text(&mut self, level: usize, tag: &str, value: &str) -> Result<(), GedcomError> {
        let mut segments = value.split('\n');
        self.segment(level, tag, segments.next().unwrap_or(""))?;
        for segment in segments {
            self.segment(level + 1, TAG_CONT, segment)?;
        }
        Ok(())
    }

    fn maybe_text(&mut self, level: usize, tag: &str, value: &str) -> Result<(), GedcomError> {
        if value.is_empty() {
            return Ok(());
        }
        self.text(level, tag, value)
    }

    /// One text segment; the continuation level is `level + 1`
    fn segment(&mut self, level: usize, tag: &str, value: &str) -> Result<(), GedcomError> {
        let (head, mut rest) = split_chars(value, MAX_SEGMENT_LEN);
        self.line(level, tag, head)?;
        while !rest.is_empty() {
            let (chunk, tail) = split_chars(rest, MAX_SEGMENT_LEN);
            self.line(level + 1, TAG_CONC, chunk)?;
            rest = tail;
        }
        Ok(())
    }

    fn maybe(&mut self, level: usize, tag: &str, value: &str) -> Result<(), GedcomError> {
        if value.is_empty() {
            return Ok(());
        }
        self.line(level, tag, value)
    }

    fn line(&mut self, level: usize, tag: &str, value: &str) -> Result<(), GedcomError> {
        self.start_line(level, tag);
        if !value.is_empty() {
            self.buf.put_u8(b' ');
            self.buf.put_slice(value.as_bytes());
        }
        self.end_line()
    }

    fn line_with_xref(
        &mut self,
        level: usize,
        xref: &str,
        tag: &str,
        value: &str,
    ) -> Result<(), GedcomError> {
        put_level(&mut self.buf, level);
        self.buf.put_slice(b" @");
        self.buf.put_slice(xref.as_bytes());
        self.buf.put_slice(b"@ ");
        self.buf.put_slice(tag.as_bytes());
        if !value.is_empty() {
            self.buf.put_u8(b' ');
            self.buf.put_slice(value.as_bytes());
        }
        self.end_line()
    }

    fn start_line(&mut self, level: usize, tag: &str) {
        put_level(&mut self.buf, level);
        self.buf.put_u8(b' ');
        self.buf.put_slice(tag.as_bytes());
    }

    fn end_line(&mut self) -> Result<(), GedcomError> {
        self.buf.put_slice(LINE_TERMINATOR);
        self.lines += 1;
        if self.buf.len() >= WRITE_THROUGH_THRESHOLD {
            self.write_through()?;
        }
        Ok(())
    }

    fn write_through(&mut self) -> Result<(), GedcomError> {
        if !self.buf.is_empty() {
            self.writer.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}

/// Encode a graph into a byte buffer
pub fn encode_to_bytes(gedcom: &Gedcom) -> Result<Bytes, GedcomError> {
    let mut encoder = Encoder::new(Vec::new());
    encoder.encode(gedcom)?;
    Ok(Bytes::from(encoder.into_inner()))
}

fn record<'g, T: Record>(g: &'g Gedcom, tag: &str, id: RecordId<T>) -> Result<&'g T, GedcomError> {
    g.get(id).ok_or_else(|| GedcomError::DanglingReference { tag: tag.to_string() })
}

/// Split after `n` characters, never inside a code point
fn split_chars(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((i, _)) => s.split_at(i),
        None => (s, ""),
    }
}

fn put_level(buf: &mut BytesMut, level: usize) {
    let mut digits = [0u8; 20];
    let mut n = level;
    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    buf.put_slice(&digits[i..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_from_bytes;

    fn encode(g: &Gedcom) -> String {
        String::from_utf8(encode_to_bytes(g).unwrap().to_vec()).unwrap()
    }

    fn individual_with_note(text: &str) -> Gedcom {
        let mut g = Gedcom::new();
        g.add(Individual {
            xref: "I1".into(),
            notes: vec![Note::new(text)],
            ..Default::default()
        });
        g
    }

    #[test]
    fn test_split_chars() {
        assert_eq!(split_chars("abcdef", 4), ("abcd", "ef"));
        assert_eq!(split_chars("abc", 4), ("abc", ""));
        assert_eq!(split_chars("ééé", 2), ("éé", "é"));
    }

    #[test]
    fn test_put_level() {
        let mut buf = BytesMut::new();
        put_level(&mut buf, 0);
        put_level(&mut buf, 7);
        put_level(&mut buf, 42);
        assert_eq!(&buf[..], b"0742");
    }

    #[test]
    fn test_encode_header() {
        let mut g = Gedcom::new();
        let subm = g.add(Submitter {
            xref: "U1".into(),
            name: "Jane".into(),
            ..Default::default()
        });
        g.header = Some(Header {
            source_system: SystemRecord {
                xref: "APP".into(),
                version: "1.0".into(),
                ..Default::default()
            },
            character_set: "UTF-8".into(),
            date: "1 JAN 2020".into(),
            time: "12:00".into(),
            submitter: Some(subm),
            version: "5.5.1".into(),
            form: "LINEAGE-LINKED".into(),
            ..Default::default()
        });
        g.trailer = Some(Trailer);

        let want = "0 HEAD\n\
                    1 CHAR UTF-8\n\
                    1 SOUR APP\n\
                    2 VERS 1.0\n\
                    1 DATE 1 JAN 2020\n\
                    2 TIME 12:00\n\
                    1 SUBM @U1@\n\
                    1 GEDC\n\
                    2 VERS 5.5.1\n\
                    2 FORM LINEAGE-LINKED\n\
                    0 @U1@ SUBM\n\
                    1 NAME Jane\n\
                    0 TRLR\n";
        assert_eq!(encode(&g), want);
    }

    #[test]
    fn test_text_continuation() {
        let got = encode(&individual_with_note("line 1\nline 2\n\nline 4"));
        assert_eq!(
            got,
            "0 @I1@ INDI\n1 NOTE line 1\n2 CONT line 2\n2 CONT\n2 CONT line 4\n"
        );
    }

    #[test]
    fn test_wrap_boundary() {
        let exact = "x".repeat(MAX_SEGMENT_LEN);
        let got = encode(&individual_with_note(&exact));
        assert_eq!(got, format!("0 @I1@ INDI\n1 NOTE {}\n", exact));

        let long = "y".repeat(256);
        let got = encode(&individual_with_note(&long));
        assert_eq!(
            got,
            format!("0 @I1@ INDI\n1 NOTE {}\n2 CONC {}\n", &long[..246], &long[246..])
        );
    }

    #[test]
    fn test_wrap_counts_characters() {
        let long = "ü".repeat(300);
        let got = encode(&individual_with_note(&long));
        let lines: Vec<&str> = got.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].strip_prefix("1 NOTE ").unwrap().chars().count(), 246);
        assert_eq!(lines[2].strip_prefix("2 CONC ").unwrap().chars().count(), 54);
    }

    #[test]
    fn test_missing_xref() {
        let mut g = Gedcom::new();
        g.add(Individual::default());
        assert_eq!(
            encode_to_bytes(&g).unwrap_err(),
            GedcomError::MissingXref { tag: "INDI".into() }
        );

        let mut g = Gedcom::new();
        let anonymous = g.alloc(Family::default());
        g.add(Individual {
            xref: "I1".into(),
            families: vec![FamilyLink::new(anonymous)],
            ..Default::default()
        });
        assert_eq!(
            encode_to_bytes(&g).unwrap_err(),
            GedcomError::MissingXref { tag: "FAMS".into() }
        );
    }

    #[test]
    fn test_dangling_reference() {
        let mut g = Gedcom::new();
        g.add(Family {
            xref: "F1".into(),
            husband: Some(RecordId::new(9)),
            ..Default::default()
        });
        assert_eq!(
            encode_to_bytes(&g).unwrap_err(),
            GedcomError::DanglingReference { tag: "HUSB".into() }
        );
    }

    #[test]
    fn test_user_defined_with_xref() {
        let mut g = Gedcom::new();
        g.user_defined.push(UserDefinedTag {
            tag: "_PLAC".into(),
            xref: "P1".into(),
            value: "Somewhere".into(),
            level: 0,
            children: vec![UserDefinedTag {
                tag: "_LAT".into(),
                value: "1.5".into(),
                ..Default::default()
            }],
        });
        assert_eq!(encode(&g), "0 @P1@ _PLAC Somewhere\n1 _LAT 1.5\n");
    }

    #[test]
    fn test_inline_source_and_media() {
        let mut g = Gedcom::new();
        let source = g.alloc(Source {
            title: "Family bible".into(),
            ..Default::default()
        });
        let media = g.alloc(Media {
            files: vec![FileRecord {
                name: "photo.jpg".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        g.add(Individual {
            xref: "I1".into(),
            citations: vec![Citation {
                page: "3".into(),
                ..Citation::new(source)
            }],
            media: vec![media.into()],
            ..Default::default()
        });

        assert_eq!(
            encode(&g),
            "0 @I1@ INDI\n1 SOUR Family bible\n2 PAGE 3\n1 OBJE\n2 FILE photo.jpg\n"
        );
    }

    #[test]
    fn test_user_defined_stays_in_substructures() {
        let input = "0 @I1@ INDI\n1 FAMC @F1@\n2 _FREL Natural\n2 _MREL Natural\n\
                     1 CHAN\n2 DATE 1 APR 1998\n2 _USR bob\n1 NOTE hi\n2 _X kept\n\
                     1 OBJE @M1@\n2 _PRIM Y\n\
                     0 @F1@ FAM\n0 @M1@ OBJE\n1 FILE a.jpg\n\
                     0 @R1@ REPO\n1 ADDR Street\n2 CITY Town\n2 _GEO 1,2\n";
        let got = encode(&decode_from_bytes(input.as_bytes()).unwrap());
        assert!(got.contains("1 FAMC @F1@\n2 _FREL Natural\n2 _MREL Natural\n"));
        assert!(got.contains("1 CHAN\n2 DATE 1 APR 1998\n2 _USR bob\n1 NOTE hi\n2 _X kept\n"));
        assert!(got.contains("1 OBJE @M1@\n2 _PRIM Y\n"));
        assert!(got.contains("1 ADDR Street\n2 CITY Town\n2 _GEO 1,2\n"));
    }

    #[test]
    fn test_deep_user_defined_chain() {
        const DEPTH: usize = 2_000;
        let mut tag = UserDefinedTag {
            tag: "_LEAF".into(),
            ..Default::default()
        };
        for _ in 0..DEPTH {
            tag = UserDefinedTag {
                tag: "_NEST".into(),
                children: vec![tag],
                ..Default::default()
            };
        }
        let mut g = Gedcom::new();
        g.user_defined.push(tag);
        g.user_defined.push(UserDefinedTag {
            tag: "_NEXT".into(),
            ..Default::default()
        });

        let got = encode(&g);
        let lines: Vec<&str> = got.lines().collect();
        assert_eq!(lines.len(), DEPTH + 2);
        assert_eq!(lines[0], "0 _NEST");
        assert_eq!(lines[DEPTH], format!("{} _LEAF", DEPTH));
        assert_eq!(lines[DEPTH + 1], "0 _NEXT");
    }

    #[test]
    fn test_reencode_is_stable() {
        let input = "0 HEAD\n1 CHAR UTF-8\n1 SOUR APP\n2 CORP Corp\n3 ADDR Line 1\n4 CONT Line 2\n4 CITY Town\n3 PHON 555\n\
                     0 @I1@ INDI\n1 NAME John /Doe/\n2 ROMN Jon /Do/\n3 TYPE pinyin\n1 SEX M\n\
                     1 BIRT\n2 DATE 1 JAN 1900\n2 PLAC Oslo\n3 MAP\n4 LATI N59.9\n2 FAMC @F1@\n\
                     1 FAMS @F2@\n2 PEDI birth\n1 ASSO @I2@\n2 RELA Godfather\n1 CHAN\n2 DATE 1 APR 1998\n3 TIME 10:00\n\
                     1 NOTE A note\n2 CONC  continued\n2 SOUR @S1@\n3 PAGE 12\n1 _CUSTOM x\n2 _DEEPER y\n\
                     0 @I2@ INDI\n1 ALIA Peggy\n\
                     0 @F1@ FAM\n1 CHIL @I1@\n0 @F2@ FAM\n1 HUSB @I1@\n1 MARR Y\n2 ADDR Church\n\
                     0 @S1@ SOUR\n1 TITL Title\n2 CONT more\n1 REPO @R1@\n2 CALN 1\n3 MEDI Book\n\
                     0 @R1@ REPO\n1 NAME Archive\n\
                     0 @N1@ SUBN\n1 TEMP SLAKE\n0 TRLR\n";

        let first = encode(&decode_from_bytes(input.as_bytes()).unwrap());
        let second = encode(&decode_from_bytes(first.as_bytes()).unwrap());
        assert_eq!(first, second);
        assert!(first.contains("1 NOTE A note continued\n2 SOUR @S1@\n3 PAGE 12\n"));
        assert!(first.contains("1 NAME Peggy\n"));
        assert!(first.ends_with("0 @N1@ SUBN\n1 TEMP SLAKE\n0 TRLR\n"));
    }

    #[test]
    fn test_write_through_large_output() {
        let mut g = Gedcom::new();
        for i in 0..5000 {
            g.add(Individual {
                xref: format!("I{}", i),
                names: vec![Name {
                    name: format!("Person {} /Example/", i),
                    ..Default::default()
                }],
                ..Default::default()
            });
        }

        let mut encoder = Encoder::new(Vec::new());
        encoder.encode(&g).unwrap();
        assert_eq!(encoder.lines_written(), 10_000);
        let out = encoder.into_inner();
        assert!(out.len() > WRITE_THROUGH_THRESHOLD);
        assert_eq!(decode_from_bytes(&out).unwrap().individuals.len(), 5000);
    }
}
