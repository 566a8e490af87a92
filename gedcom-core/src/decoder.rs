//! Hierarchical GEDCOM decoder
//!
//! Lines from the [`Scanner`] drive a stack of frames, one per open nesting
//! level. A frame's context decides what each child line means: it sets a
//! field, opens a child frame, or keeps the line as a [`UserDefinedTag`].
//! Contexts for shared records hold a [`RecordId`] and write straight into the
//! arena. Contexts for substructures own the value being built and hand it to
//! the frame beneath them when they are popped.

use crate::constants::{is_family_event, is_individual_attribute, is_individual_event, TAG_CONC, TAG_CONT};
use crate::error::GedcomError;
use crate::linker::{Record, RecordId, ReferenceTable};
use crate::model::*;
use crate::scanner::Scanner;
use crate::types::{parse_pointer, strip_xref, Line};
use std::io::{Read, Write};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// Reads a GEDCOM stream into a [`Gedcom`] graph
pub struct Decoder<'w, R> {
    scanner: Scanner<R>,
    unhandled: Option<Box<dyn Write + 'w>>,
}

impl<'w, R: Read> Decoder<'w, R> {
    /// Create a decoder reading from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            scanner: Scanner::new(reader),
            unhandled: None,
        }
    }

    /// Report every line no context recognized to `sink`, one line each
    ///
    /// Write failures on the sink are ignored.
    pub fn log_unhandled_tags(mut self, sink: impl Write + 'w) -> Self {
        self.unhandled = Some(Box::new(sink));
        self
    }

    /// Consume the whole stream and return the graph
    ///
    /// Fails only when the stream cannot be tokenized.
    pub fn decode(self) -> Result<Gedcom, GedcomError> {
        let Decoder { scanner, unhandled } = self;

        #[cfg(feature = "logging")]
        debug!("Decoding GEDCOM stream");

        let mut tree = Tree::new(unhandled);
        for line in scanner {
            tree.feed(line?);
        }
        let gedcom = tree.finish();

        #[cfg(feature = "logging")]
        debug!(
            "Decoded {} individuals, {} families, {} sources, {} media, {} repositories",
            gedcom.individuals.len(),
            gedcom.families.len(),
            gedcom.sources.len(),
            gedcom.media.len(),
            gedcom.repositories.len()
        );

        Ok(gedcom)
    }
}

/// Decode a complete in-memory buffer
pub fn decode_from_bytes(data: &[u8]) -> Result<Gedcom, GedcomError> {
    Decoder::new(data).decode()
}

/// Which list a finished event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventList {
    Individual,
    Attribute,
    Family,
}

/// Text fields that accept `CONT`/`CONC`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    HeaderNote,
    SystemCopyright,
    SourceTitle,
    SourceAuthor,
    SourceText,
    PublicationFacts,
    CitationText,
    FileTitle,
}

/// What a frame is building
#[derive(Debug)]
enum Context {
    Root,
    Header(Box<Header>),
    HeaderDate { time: String },
    HeaderVersion { version: String, form: String },
    HeaderCharset { version: String },
    System(Box<SystemRecord>),
    SystemData { date: String, copyright: String },
    Corp(Address),
    AddressDetail(AddressDetail),
    Individual(IndividualId),
    Family(FamilyId),
    Source(SourceId),
    Repository(RepositoryId),
    Media(MediaId),
    MediaLink(MediaLink),
    Submitter(SubmitterId),
    Submission(SubmissionId),
    Name(Box<Name>),
    VariantName { romanized: bool, name: VariantName },
    Event { list: EventList, event: Box<Event> },
    EventAdopt { parent: String },
    Place(Box<Place>),
    PlaceVariant { romanized: bool, name: VariantPlaceName },
    PlaceMap { latitude: String, longitude: String },
    FamilyLink { spouse: bool, link: FamilyLink },
    Association(Association),
    UserReference(UserReference),
    Change(Change),
    ChangeTime { time: String },
    Note(Note),
    Citation { citation: Box<Citation>, inline: bool },
    CitationData(CitationData),
    SourceData(SourceData),
    SourceEvent(SourceEvent),
    SourceRepository(SourceRepository),
    CallNumber(CallNumber),
    MediaFile(FileRecord),
    FileFormat { format_type: String, user_defined: Vec<UserDefinedTag> },
    Text { field: TextField, text: String },
    UserDefined(UserDefinedTag),
    Skip,
}

struct Frame {
    context: Context,
    min_level: usize,
}

/// The frame stack plus the graph under construction
struct Tree<'w> {
    stack: Vec<Frame>,
    graph: GraphBuilder<'w>,
}

impl<'w> Tree<'w> {
    fn new(unhandled: Option<Box<dyn Write + 'w>>) -> Self {
        Self {
            stack: vec![Frame {
                context: Context::Root,
                min_level: 0,
            }],
            graph: GraphBuilder {
                gedcom: Gedcom::new(),
                refs: ReferenceTable::new(),
                unhandled,
            },
        }
    }

    fn feed(&mut self, line: Line) {
        while self.stack.len() > 1
            && self
                .stack
                .last()
                .map_or(false, |frame| line.level <= frame.min_level)
        {
            self.pop();
        }

        let level = line.level;
        if let Some(top) = self.stack.last_mut() {
            if let Some(context) = self.graph.dispatch(&mut top.context, line) {
                self.stack.push(Frame {
                    context,
                    min_level: level,
                });
            }
        }
    }

    fn pop(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        match self.stack.pop().map(|frame| frame.context) {
            Some(Context::UserDefined(tag)) => self.keep(tag),
            Some(child) => {
                if let Some(parent) = self.stack.last_mut() {
                    attach(&mut parent.context, child, &mut self.graph.gedcom);
                }
            }
            None => {}
        }
    }

    /// Store a finished user-defined node on the innermost frame that keeps them
    fn keep(&mut self, tag: UserDefinedTag) {
        let gedcom = &mut self.graph.gedcom;
        for frame in self.stack.iter_mut().rev() {
            if let Some(list) = user_defined_of(&mut frame.context, gedcom) {
                list.push(tag);
                return;
            }
        }
    }

    fn finish(mut self) -> Gedcom {
        while self.stack.len() > 1 {
            self.pop();
        }

        #[cfg(feature = "logging")]
        {
            let dangling = self.graph.refs.undefined().count();
            if dangling > 0 {
                debug!("{} xrefs were pointed at but never defined", dangling);
            }
        }

        self.graph.gedcom
    }
}

struct GraphBuilder<'w> {
    gedcom: Gedcom,
    refs: ReferenceTable,
    unhandled: Option<Box<dyn Write + 'w>>,
}

impl GraphBuilder<'_> {
    /// Handle `line` in `context`, returning the child frame to open, if any
    fn dispatch(&mut self, context: &mut Context, line: Line) -> Option<Context> {
        match context {
            Context::Root => self.root(line),
            Context::Header(header) => self.header(header, line),
            Context::HeaderDate { time } => match line.tag.as_str() {
                "TIME" => set(time, line.value),
                _ => self.displace(line),
            },
            Context::HeaderVersion { version, form } => match line.tag.as_str() {
                "VERS" => set(version, line.value),
                "FORM" => set(form, line.value),
                _ => self.displace(line),
            },
            Context::HeaderCharset { version } => match line.tag.as_str() {
                "VERS" => set(version, line.value),
                _ => self.displace(line),
            },
            Context::System(system) => self.system(system, line),
            Context::SystemData { date, .. } => match line.tag.as_str() {
                "DATE" => set(date, line.value),
                "COPR" => text(TextField::SystemCopyright, line.value),
                _ => self.displace(line),
            },
            Context::Corp(address) => {
                if is_address_tag(&line.tag) {
                    address_line(address, line)
                } else {
                    self.displace(line)
                }
            }
            Context::AddressDetail(detail) => self.address_detail(detail, line),
            Context::Individual(id) => self.individual(*id, line),
            Context::Family(id) => self.family(*id, line),
            Context::Source(id) => self.source(*id, line),
            Context::Repository(id) => self.repository(*id, line),
            Context::Media(id) => self.media(*id, line),
            Context::MediaLink(_) => preserve(line),
            Context::Submitter(id) => self.submitter(*id, line),
            Context::Submission(id) => self.submission(*id, line),
            Context::Name(name) => self.name(name, line),
            Context::VariantName { name, .. } => self.variant_name(name, line),
            Context::Event { event, .. } => self.event(event, line),
            Context::EventAdopt { parent } => match line.tag.as_str() {
                "ADOP" => set(parent, line.value),
                _ => self.displace(line),
            },
            Context::Place(_) => self.place(line),
            Context::PlaceVariant { name, .. } => match line.tag.as_str() {
                "TYPE" => set(&mut name.variant_type, line.value),
                _ => preserve(line),
            },
            Context::PlaceMap { latitude, longitude } => match line.tag.as_str() {
                "LATI" => set(latitude, line.value),
                "LONG" => set(longitude, line.value),
                _ => self.displace(line),
            },
            Context::FamilyLink { link, .. } => match line.tag.as_str() {
                "PEDI" => set(&mut link.pedigree, line.value),
                "NOTE" => note(line.value),
                _ => preserve(line),
            },
            Context::Association(association) => match line.tag.as_str() {
                "RELA" => set(&mut association.relation, line.value),
                "SOUR" => Some(self.citation(line.value)),
                "NOTE" => note(line.value),
                _ => preserve(line),
            },
            Context::UserReference(reference) => match line.tag.as_str() {
                "TYPE" => set(&mut reference.reference_type, line.value),
                _ => preserve(line),
            },
            Context::Change(change) => match line.tag.as_str() {
                "DATE" => {
                    change.date = line.value;
                    Some(Context::ChangeTime {
                        time: String::new(),
                    })
                }
                "NOTE" => note(line.value),
                _ => preserve(line),
            },
            Context::ChangeTime { time } => match line.tag.as_str() {
                "TIME" => set(time, line.value),
                _ => self.displace(line),
            },
            Context::Note(n) => match line.tag.as_str() {
                TAG_CONT => continue_text(&mut n.note, &line.value),
                TAG_CONC => concatenate_text(&mut n.note, &line.value),
                "SOUR" => Some(self.citation(line.value)),
                _ => preserve(line),
            },
            Context::Citation { citation, inline } => self.citation_line(citation, *inline, line),
            Context::CitationData(data) => match line.tag.as_str() {
                "DATE" => set(&mut data.date, line.value),
                "TEXT" => text(TextField::CitationText, line.value),
                _ => preserve(line),
            },
            Context::SourceData(_) => match line.tag.as_str() {
                "EVEN" => Some(Context::SourceEvent(SourceEvent {
                    kind: line.value,
                    ..Default::default()
                })),
                _ => preserve(line),
            },
            Context::SourceEvent(event) => match line.tag.as_str() {
                "DATE" => set(&mut event.date, line.value),
                "PLAC" => set(&mut event.place, line.value),
                _ => preserve(line),
            },
            Context::SourceRepository(_) => match line.tag.as_str() {
                "NOTE" => note(line.value),
                "CALN" => Some(Context::CallNumber(CallNumber {
                    number: line.value,
                    ..Default::default()
                })),
                _ => preserve(line),
            },
            Context::CallNumber(number) => match line.tag.as_str() {
                "MEDI" => set(&mut number.media_type, line.value),
                _ => preserve(line),
            },
            Context::MediaFile(file) => match line.tag.as_str() {
                "FORM" => {
                    file.format = line.value;
                    Some(file_format())
                }
                "TITL" => text(TextField::FileTitle, line.value),
                _ => preserve(line),
            },
            Context::FileFormat { format_type, .. } => match line.tag.as_str() {
                "TYPE" => set(format_type, line.value),
                _ => preserve(line),
            },
            Context::Text { field, text } => self.text_line(*field, text, line),
            Context::UserDefined(_) => preserve(line),
            Context::Skip => {
                self.report_unhandled(&line);
                None
            }
        }
    }

    fn root(&mut self, line: Line) -> Option<Context> {
        if line.level != 0 {
            return self.skip(&line);
        }
        match line.tag.as_str() {
            "HEAD" => Some(Context::Header(Box::default())),
            "INDI" => Some(Context::Individual(self.define(&line.xref))),
            "FAM" => Some(Context::Family(self.define(&line.xref))),
            "SOUR" => Some(Context::Source(self.define(&line.xref))),
            "REPO" => Some(Context::Repository(self.define(&line.xref))),
            "OBJE" => Some(Context::Media(self.define(&line.xref))),
            "SUBM" => Some(Context::Submitter(self.define(&line.xref))),
            "SUBN" => Some(Context::Submission(self.define(&line.xref))),
            "TRLR" => {
                self.gedcom.trailer = Some(Trailer);
                Some(Context::Skip)
            }
            _ => preserve(line),
        }
    }

    fn header(&mut self, header: &mut Header, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "SOUR" => Some(Context::System(Box::new(SystemRecord {
                xref: line.value,
                ..Default::default()
            }))),
            "DEST" => set(&mut header.destination, line.value),
            "DATE" => {
                header.date = line.value;
                Some(Context::HeaderDate {
                    time: String::new(),
                })
            }
            "FILE" => set(&mut header.filename, line.value),
            "COPR" => set(&mut header.copyright, line.value),
            "GEDC" => Some(Context::HeaderVersion {
                version: String::new(),
                form: String::new(),
            }),
            "LANG" => set(&mut header.language, line.value),
            "NOTE" => text(TextField::HeaderNote, line.value),
            "SUBM" => {
                header.submitter = Some(self.pointer(&line.value));
                None
            }
            "SUBN" => {
                header.submission = Some(self.pointer(&line.value));
                None
            }
            "CHAR" => {
                header.character_set = line.value;
                Some(Context::HeaderCharset {
                    version: String::new(),
                })
            }
            _ => preserve(line),
        }
    }

    fn system(&mut self, system: &mut SystemRecord, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "VERS" => set(&mut system.version, line.value),
            "NAME" => set(&mut system.product_name, line.value),
            "CORP" => {
                system.business_name = line.value;
                Some(Context::Corp(Address::default()))
            }
            "DATA" => {
                system.source_name = line.value;
                Some(Context::SystemData {
                    date: String::new(),
                    copyright: String::new(),
                })
            }
            _ => preserve(line),
        }
    }

    fn address_detail(&mut self, detail: &mut AddressDetail, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            TAG_CONT => continue_text(&mut detail.full, &line.value),
            TAG_CONC => concatenate_text(&mut detail.full, &line.value),
            "ADR1" => set(&mut detail.line1, line.value),
            "ADR2" => set(&mut detail.line2, line.value),
            "ADR3" => set(&mut detail.line3, line.value),
            "CITY" => set(&mut detail.city, line.value),
            "STAE" => set(&mut detail.state, line.value),
            "POST" => set(&mut detail.postal_code, line.value),
            "CTRY" => set(&mut detail.country, line.value),
            _ => preserve(line),
        }
    }

    fn individual(&mut self, id: IndividualId, line: Line) -> Option<Context> {
        let tag = line.tag.as_str();
        if is_individual_event(tag) {
            return Some(event(EventList::Individual, line));
        }
        if is_individual_attribute(tag) {
            return Some(event(EventList::Attribute, line));
        }

        match tag {
            "NAME" => Some(name(line.value)),
            "SEX" => set(&mut self.gedcom[id].sex, line.value),
            "FAMC" | "FAMS" => {
                let family = self.pointer(&line.value);
                Some(Context::FamilyLink {
                    spouse: tag == "FAMS",
                    link: FamilyLink::new(family),
                })
            }
            "SUBM" => {
                let submitter = self.pointer(&line.value);
                self.gedcom[id].submitters.push(submitter);
                None
            }
            "ASSO" => {
                let individual = self.pointer(&line.value);
                Some(Context::Association(Association::new(individual)))
            }
            "ALIA" if parse_pointer(&line.value).is_none() && !line.value.is_empty() => {
                #[cfg(feature = "logging")]
                warn!(
                    "Treating ALIA on line {} as an alternate name",
                    line.line_no
                );

                Some(name(line.value))
            }
            "RFN" => set(&mut self.gedcom[id].permanent_record_file_number, line.value),
            "AFN" => set(&mut self.gedcom[id].ancestral_file_number, line.value),
            "REFN" => user_reference(line.value),
            "RIN" => set(&mut self.gedcom[id].automated_record_id, line.value),
            "CHAN" => change(),
            "NOTE" => note(line.value),
            "SOUR" => Some(self.citation(line.value)),
            "OBJE" => Some(self.object(line)),
            _ => preserve(line),
        }
    }

    fn family(&mut self, id: FamilyId, line: Line) -> Option<Context> {
        if is_family_event(&line.tag) {
            return Some(event(EventList::Family, line));
        }

        match line.tag.as_str() {
            "HUSB" => {
                let husband = self.pointer(&line.value);
                self.gedcom[id].husband = Some(husband);
                None
            }
            "WIFE" => {
                let wife = self.pointer(&line.value);
                self.gedcom[id].wife = Some(wife);
                None
            }
            "CHIL" => {
                let child = self.pointer(&line.value);
                self.gedcom[id].children.push(child);
                None
            }
            "NCHI" => set(&mut self.gedcom[id].number_of_children, line.value),
            "REFN" => user_reference(line.value),
            "RIN" => set(&mut self.gedcom[id].automated_record_id, line.value),
            "CHAN" => change(),
            "NOTE" => note(line.value),
            "SOUR" => Some(self.citation(line.value)),
            "OBJE" => Some(self.object(line)),
            _ => preserve(line),
        }
    }

    fn source(&mut self, id: SourceId, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "DATA" => {
                let data = self.gedcom[id].data.take().unwrap_or_default();
                Some(Context::SourceData(data))
            }
            "TITL" => text(TextField::SourceTitle, line.value),
            "ABBR" => set(&mut self.gedcom[id].filed_by, line.value),
            "AUTH" => text(TextField::SourceAuthor, line.value),
            "PUBL" => text(TextField::PublicationFacts, line.value),
            "TEXT" => text(TextField::SourceText, line.value),
            "REPO" => {
                let repository = match strip_xref(&line.value) {
                    "" => None,
                    xref => Some(self.refs.get_or_create(&mut self.gedcom, xref)),
                };
                Some(Context::SourceRepository(SourceRepository {
                    repository,
                    ..Default::default()
                }))
            }
            "REFN" => user_reference(line.value),
            "RIN" => set(&mut self.gedcom[id].automated_record_id, line.value),
            "CHAN" => change(),
            "NOTE" => note(line.value),
            "OBJE" => Some(self.object(line)),
            _ => preserve(line),
        }
    }

    fn repository(&mut self, id: RepositoryId, line: Line) -> Option<Context> {
        if is_address_tag(&line.tag) {
            return address_line(&mut self.gedcom[id].address, line);
        }

        match line.tag.as_str() {
            "NAME" => set(&mut self.gedcom[id].name, line.value),
            "NOTE" => note(line.value),
            "RIN" => set(&mut self.gedcom[id].automated_record_id, line.value),
            "REFN" => user_reference(line.value),
            "CHAN" => change(),
            _ => preserve(line),
        }
    }

    fn media(&mut self, id: MediaId, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "FILE" => {
                let files = &mut self.gedcom[id].files;
                let unnamed = files.last().map_or(false, |last| last.name.is_empty());
                let mut file = if unnamed {
                    files.pop().unwrap_or_default()
                } else {
                    FileRecord::default()
                };
                file.name = line.value;
                Some(Context::MediaFile(file))
            }
            "FORM" => {
                last_file(&mut self.gedcom[id].files).format = line.value;
                Some(file_format())
            }
            "TITL" => text(TextField::FileTitle, line.value),
            "RIN" => set(&mut self.gedcom[id].automated_record_id, line.value),
            "REFN" => user_reference(line.value),
            "NOTE" => note(line.value),
            "SOUR" => Some(self.citation(line.value)),
            "CHAN" => change(),
            _ => preserve(line),
        }
    }

    fn submitter(&mut self, id: SubmitterId, line: Line) -> Option<Context> {
        if is_address_tag(&line.tag) {
            return address_line(&mut self.gedcom[id].address, line);
        }

        match line.tag.as_str() {
            "NAME" => set(&mut self.gedcom[id].name, line.value),
            "OBJE" => Some(self.object(line)),
            "LANG" => {
                self.gedcom[id].languages.push(line.value);
                None
            }
            "RFN" => set(&mut self.gedcom[id].submitter_record_file_id, line.value),
            "RIN" => set(&mut self.gedcom[id].automated_record_id, line.value),
            "NOTE" => note(line.value),
            "CHAN" => change(),
            _ => preserve(line),
        }
    }

    fn submission(&mut self, id: SubmissionId, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "SUBM" => {
                let submitter = self.pointer(&line.value);
                self.gedcom[id].submitter = Some(submitter);
                None
            }
            "FAMF" => set(&mut self.gedcom[id].family_file_name, line.value),
            "TEMP" => set(&mut self.gedcom[id].temple_code, line.value),
            "ANCE" => set(&mut self.gedcom[id].generations_of_ancestors, line.value),
            "DESC" => set(&mut self.gedcom[id].generations_of_descendants, line.value),
            "ORDI" => set(&mut self.gedcom[id].ordinance_process_flag, line.value),
            "RIN" => set(&mut self.gedcom[id].automated_record_id, line.value),
            _ => preserve(line),
        }
    }

    fn name(&mut self, name: &mut Name, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "TYPE" => set(&mut name.name_type, line.value),
            "NPFX" => set(&mut name.prefix, line.value),
            "GIVN" => set(&mut name.given, line.value),
            "NICK" => set(&mut name.nickname, line.value),
            "SPFX" => set(&mut name.surname_prefix, line.value),
            "SURN" => set(&mut name.surname, line.value),
            "NSFX" => set(&mut name.suffix, line.value),
            "FONE" | "ROMN" => Some(Context::VariantName {
                romanized: line.tag == "ROMN",
                name: VariantName {
                    name: line.value,
                    ..Default::default()
                },
            }),
            "SOUR" => Some(self.citation(line.value)),
            "NOTE" => note(line.value),
            _ => preserve(line),
        }
    }

    fn variant_name(&mut self, name: &mut VariantName, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "TYPE" => set(&mut name.variant_type, line.value),
            "NPFX" => set(&mut name.prefix, line.value),
            "GIVN" => set(&mut name.given, line.value),
            "NICK" => set(&mut name.nickname, line.value),
            "SPFX" => set(&mut name.surname_prefix, line.value),
            "SURN" => set(&mut name.surname, line.value),
            "NSFX" => set(&mut name.suffix, line.value),
            "SOUR" => Some(self.citation(line.value)),
            "NOTE" => note(line.value),
            _ => preserve(line),
        }
    }

    fn event(&mut self, event: &mut Event, line: Line) -> Option<Context> {
        if line.tag == "FAMC" {
            match event.tag.as_str() {
                "BIRT" | "CHR" => {
                    event.child_in_family = Some(self.pointer(&line.value));
                    return None;
                }
                "ADOP" => {
                    event.child_in_family = Some(self.pointer(&line.value));
                    return Some(Context::EventAdopt {
                        parent: String::new(),
                    });
                }
                _ => {}
            }
        }

        if is_address_tag(&line.tag) {
            return address_line(&mut event.address, line);
        }

        match line.tag.as_str() {
            "TYPE" => set(&mut event.event_type, line.value),
            "DATE" => set(&mut event.date, line.value),
            "PLAC" => Some(Context::Place(Box::new(Place {
                name: line.value,
                ..Default::default()
            }))),
            "AGE" => set(&mut event.age, line.value),
            "AGNC" => set(&mut event.agency, line.value),
            "RELI" => set(&mut event.religious_affiliation, line.value),
            "CAUS" => set(&mut event.cause, line.value),
            "RESN" => set(&mut event.restriction_notice, line.value),
            "NOTE" => note(line.value),
            "SOUR" => Some(self.citation(line.value)),
            "OBJE" => Some(self.object(line)),
            _ => preserve(line),
        }
    }

    fn place(&mut self, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "FONE" | "ROMN" => Some(Context::PlaceVariant {
                romanized: line.tag == "ROMN",
                name: VariantPlaceName {
                    name: line.value,
                    ..Default::default()
                },
            }),
            "MAP" => Some(Context::PlaceMap {
                latitude: String::new(),
                longitude: String::new(),
            }),
            "SOUR" => Some(self.citation(line.value)),
            "NOTE" => note(line.value),
            _ => preserve(line),
        }
    }

    fn citation_line(&mut self, citation: &mut Citation, inline: bool, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            "PAGE" => set(&mut citation.page, line.value),
            "QUAY" => set(&mut citation.quality, line.value),
            "DATA" => Some(Context::CitationData(std::mem::take(&mut citation.data))),
            "NOTE" => note(line.value),
            "OBJE" => Some(self.object(line)),
            TAG_CONT if inline => continue_text(&mut self.gedcom[citation.source].title, &line.value),
            TAG_CONC if inline => concatenate_text(&mut self.gedcom[citation.source].title, &line.value),
            _ => preserve(line),
        }
    }

    fn text_line(&mut self, field: TextField, text: &mut String, line: Line) -> Option<Context> {
        match line.tag.as_str() {
            TAG_CONT => continue_text(text, &line.value),
            TAG_CONC => concatenate_text(text, &line.value),
            "DATE" | "PLAC" if field == TextField::PublicationFacts => {
                #[cfg(feature = "logging")]
                warn!(
                    "Folding PUBL.{} on line {} into publication facts",
                    line.tag, line.line_no
                );

                if !text.is_empty() {
                    text.push_str(", ");
                }
                text.push_str(&line.value);
                None
            }
            _ => self.displace(line),
        }
    }

    /// Open a citation; a value that is not a pointer describes an inline source
    fn citation(&mut self, value: String) -> Context {
        match parse_pointer(&value) {
            Some(xref) => {
                let source = self.refs.get_or_create(&mut self.gedcom, xref);
                Context::Citation {
                    citation: Box::new(Citation::new(source)),
                    inline: false,
                }
            }
            None => {
                let source = self.gedcom.alloc(Source {
                    title: value,
                    ..Default::default()
                });
                Context::Citation {
                    citation: Box::new(Citation::new(source)),
                    inline: true,
                }
            }
        }
    }

    /// Open an `OBJE` line: a link to the media it names, or an inline media record
    fn object(&mut self, line: Line) -> Context {
        match parse_pointer(&line.value) {
            Some(xref) => {
                let media = self.refs.get_or_create(&mut self.gedcom, xref);
                Context::MediaLink(MediaLink::new(media))
            }
            None => Context::Media(self.gedcom.alloc(Media::default())),
        }
    }

    fn pointer<T: Record>(&mut self, value: &str) -> RecordId<T> {
        self.refs.get_or_create(&mut self.gedcom, strip_xref(value))
    }

    fn define<T: Record>(&mut self, xref: &str) -> RecordId<T> {
        let (id, first) = self.refs.define(&mut self.gedcom, xref);
        if first {
            T::listed_mut(&mut self.gedcom).push(id);
        }
        id
    }

    fn skip(&mut self, line: &Line) -> Option<Context> {
        self.report_unhandled(line);
        Some(Context::Skip)
    }

    /// Keep a line whose frame has no room for unknown tags
    ///
    /// The line and its subtree land on the nearest enclosing structure that
    /// keeps user-defined tags, and are reported to the unhandled sink.
    fn displace(&mut self, line: Line) -> Option<Context> {
        self.report_unhandled(&line);
        preserve(line)
    }

    fn report_unhandled(&mut self, line: &Line) {
        #[cfg(feature = "logging")]
        trace!(
            "Unhandled tag {} at level {} on line {}",
            line.tag,
            line.level,
            line.line_no
        );

        if let Some(sink) = self.unhandled.as_mut() {
            let _ = writeln!(
                sink,
                "unhandled tag on line {}; level={}; tag={}; value={}; xref={}",
                line.line_no, line.level, line.tag, line.value, line.xref
            );
        }
    }
}

fn set(field: &mut String, value: String) -> Option<Context> {
    *field = value;
    None
}

fn continue_text(text: &mut String, value: &str) -> Option<Context> {
    text.push('\n');
    text.push_str(value);
    None
}

fn concatenate_text(text: &mut String, value: &str) -> Option<Context> {
    text.push_str(value);
    None
}

fn text(field: TextField, value: String) -> Option<Context> {
    Some(Context::Text { field, text: value })
}

fn note(value: String) -> Option<Context> {
    Some(Context::Note(Note::new(value)))
}

fn name(value: String) -> Context {
    Context::Name(Box::new(Name {
        name: value,
        ..Default::default()
    }))
}

fn event(list: EventList, line: Line) -> Context {
    Context::Event {
        list,
        event: Box::new(Event::new(line.tag, line.value)),
    }
}

fn user_reference(value: String) -> Option<Context> {
    Some(Context::UserReference(UserReference {
        number: value,
        ..Default::default()
    }))
}

fn change() -> Option<Context> {
    Some(Context::Change(Change::default()))
}

fn file_format() -> Context {
    Context::FileFormat {
        format_type: String::new(),
        user_defined: Vec::new(),
    }
}

fn preserve(line: Line) -> Option<Context> {
    Some(Context::UserDefined(UserDefinedTag {
        tag: line.tag,
        value: line.value,
        xref: line.xref,
        level: line.level,
        children: Vec::new(),
    }))
}

fn is_address_tag(tag: &str) -> bool {
    matches!(tag, "ADDR" | "PHON" | "EMAIL" | "FAX" | "WWW" | "URL")
}

/// Shared handling of the address and contact tags
fn address_line(address: &mut Address, line: Line) -> Option<Context> {
    match line.tag.as_str() {
        "ADDR" => {
            return Some(Context::AddressDetail(AddressDetail {
                full: line.value,
                ..Default::default()
            }))
        }
        "PHON" => address.phones.push(line.value),
        "EMAIL" => address.emails.push(line.value),
        "FAX" => address.faxes.push(line.value),
        _ => address.websites.push(line.value),
    }
    None
}

fn last_file(files: &mut Vec<FileRecord>) -> &mut FileRecord {
    if files.is_empty() {
        files.push(FileRecord::default());
    }
    let last = files.len() - 1;
    &mut files[last]
}

/// Hand a finished child context to the frame beneath it
fn attach(parent: &mut Context, child: Context, gedcom: &mut Gedcom) {
    match child {
        Context::Header(header) => gedcom.header = Some(*header),
        Context::HeaderDate { time } => {
            if let Context::Header(header) = parent {
                header.time = time;
            }
        }
        Context::HeaderVersion { version, form } => {
            if let Context::Header(header) = parent {
                header.version = version;
                header.form = form;
            }
        }
        Context::HeaderCharset { version } => {
            if let Context::Header(header) = parent {
                header.character_set_version = version;
            }
        }
        Context::System(system) => {
            if let Context::Header(header) = parent {
                header.source_system = *system;
            }
        }
        Context::SystemData { date, copyright } => {
            if let Context::System(system) = parent {
                system.source_date = date;
                system.source_copyright = copyright;
            }
        }
        Context::Corp(address) => {
            if let Context::System(system) = parent {
                let target = &mut system.address;
                target.details.extend(address.details);
                target.phones.extend(address.phones);
                target.emails.extend(address.emails);
                target.faxes.extend(address.faxes);
                target.websites.extend(address.websites);
            }
        }
        Context::AddressDetail(detail) => {
            if let Some(address) = address_of(parent, gedcom) {
                address.details.push(detail);
            }
        }
        Context::Name(name) => {
            if let Context::Individual(id) = parent {
                gedcom[*id].names.push(*name);
            }
        }
        Context::VariantName { romanized, name } => {
            if let Context::Name(parent) = parent {
                if romanized {
                    parent.romanized.push(name);
                } else {
                    parent.phonetic.push(name);
                }
            }
        }
        Context::Event { list, event } => match (parent, list) {
            (Context::Individual(id), EventList::Individual) => gedcom[*id].events.push(*event),
            (Context::Individual(id), EventList::Attribute) => gedcom[*id].attributes.push(*event),
            (Context::Family(id), EventList::Family) => gedcom[*id].events.push(*event),
            _ => {}
        },
        Context::EventAdopt { parent: adopter } => {
            if let Context::Event { event, .. } = parent {
                event.adopted_by_parent = adopter;
            }
        }
        Context::Place(place) => {
            if let Context::Event { event, .. } = parent {
                event.place = Some(*place);
            }
        }
        Context::PlaceVariant { romanized, name } => {
            if let Context::Place(place) = parent {
                if romanized {
                    place.romanized.push(name);
                } else {
                    place.phonetic.push(name);
                }
            }
        }
        Context::PlaceMap {
            latitude,
            longitude,
        } => {
            if let Context::Place(place) = parent {
                place.latitude = latitude;
                place.longitude = longitude;
            }
        }
        Context::FamilyLink { spouse, link } => {
            if let Context::Individual(id) = parent {
                if spouse {
                    gedcom[*id].families.push(link);
                } else {
                    gedcom[*id].parents.push(link);
                }
            }
        }
        Context::Association(association) => {
            if let Context::Individual(id) = parent {
                gedcom[*id].associations.push(association);
            }
        }
        Context::UserReference(reference) => {
            if let Some(references) = user_references_of(parent, gedcom) {
                references.push(reference);
            }
        }
        Context::Change(change) => {
            if let Some(slot) = change_of(parent, gedcom) {
                *slot = Some(change);
            }
        }
        Context::ChangeTime { time } => {
            if let Context::Change(change) = parent {
                change.time = time;
            }
        }
        Context::Note(note) => {
            if let Some(notes) = notes_of(parent, gedcom) {
                notes.push(note);
            }
        }
        Context::Citation { citation, .. } => {
            if let Some(citations) = citations_of(parent, gedcom) {
                citations.push(*citation);
            }
        }
        Context::CitationData(data) => {
            if let Context::Citation { citation, .. } = parent {
                citation.data = data;
            }
        }
        Context::SourceData(data) => {
            if let Context::Source(id) = parent {
                gedcom[*id].data = Some(data);
            }
        }
        Context::SourceEvent(event) => {
            if let Context::SourceData(data) = parent {
                data.events.push(event);
            }
        }
        Context::SourceRepository(repository) => {
            if let Context::Source(id) = parent {
                gedcom[*id].repository = Some(repository);
            }
        }
        Context::CallNumber(number) => {
            if let Context::SourceRepository(repository) = parent {
                repository.call_numbers.push(number);
            }
        }
        Context::MediaFile(file) => {
            if let Context::Media(id) = parent {
                gedcom[*id].files.push(file);
            }
        }
        Context::FileFormat {
            format_type,
            user_defined,
        } => {
            let file = match parent {
                Context::MediaFile(file) => file,
                Context::Media(id) => last_file(&mut gedcom[*id].files),
                _ => return,
            };
            file.format_type = format_type;
            file.user_defined.extend(user_defined);
        }
        Context::Text { field, text } => attach_text(parent, field, text, gedcom),
        Context::Media(id) => {
            if let Some(media) = media_of(parent, gedcom) {
                media.push(MediaLink::new(id));
            }
        }
        Context::MediaLink(link) => {
            if let Some(media) = media_of(parent, gedcom) {
                media.push(link);
            }
        }
        Context::Root
        | Context::Individual(_)
        | Context::Family(_)
        | Context::Source(_)
        | Context::Repository(_)
        | Context::Submitter(_)
        | Context::Submission(_)
        | Context::Skip => {}
        // Tree::keep stores these, falling back past frames without a list
        Context::UserDefined(_) => {}
    }
}

fn attach_text(parent: &mut Context, field: TextField, text: String, gedcom: &mut Gedcom) {
    match (parent, field) {
        (Context::Header(header), TextField::HeaderNote) => header.note = text,
        (Context::SystemData { copyright, .. }, TextField::SystemCopyright) => *copyright = text,
        (Context::Source(id), TextField::SourceTitle) => gedcom[*id].title = text,
        (Context::Source(id), TextField::SourceAuthor) => gedcom[*id].originator = text,
        (Context::Source(id), TextField::SourceText) => gedcom[*id].text = text,
        (Context::Source(id), TextField::PublicationFacts) => gedcom[*id].publication_facts = text,
        (Context::CitationData(data), TextField::CitationText) => data.text.push(text),
        (Context::MediaFile(file), TextField::FileTitle) => file.title = text,
        (Context::Media(id), TextField::FileTitle) => last_file(&mut gedcom[*id].files).title = text,
        _ => {}
    }
}

fn notes_of<'a>(context: &'a mut Context, gedcom: &'a mut Gedcom) -> Option<&'a mut Vec<Note>> {
    Some(match context {
        Context::Individual(id) => &mut gedcom[*id].notes,
        Context::Family(id) => &mut gedcom[*id].notes,
        Context::Source(id) => &mut gedcom[*id].notes,
        Context::Repository(id) => &mut gedcom[*id].notes,
        Context::Media(id) => &mut gedcom[*id].notes,
        Context::Submitter(id) => &mut gedcom[*id].notes,
        Context::Name(name) => &mut name.notes,
        Context::VariantName { name, .. } => &mut name.notes,
        Context::Event { event, .. } => &mut event.notes,
        Context::Place(place) => &mut place.notes,
        Context::FamilyLink { link, .. } => &mut link.notes,
        Context::Association(association) => &mut association.notes,
        Context::Change(change) => &mut change.notes,
        Context::Citation { citation, .. } => &mut citation.notes,
        Context::SourceRepository(repository) => &mut repository.notes,
        _ => return None,
    })
}

fn citations_of<'a>(
    context: &'a mut Context,
    gedcom: &'a mut Gedcom,
) -> Option<&'a mut Vec<Citation>> {
    Some(match context {
        Context::Individual(id) => &mut gedcom[*id].citations,
        Context::Family(id) => &mut gedcom[*id].citations,
        Context::Media(id) => &mut gedcom[*id].citations,
        Context::Name(name) => &mut name.citations,
        Context::VariantName { name, .. } => &mut name.citations,
        Context::Event { event, .. } => &mut event.citations,
        Context::Place(place) => &mut place.citations,
        Context::Association(association) => &mut association.citations,
        Context::Note(note) => &mut note.citations,
        _ => return None,
    })
}

fn user_references_of<'a>(
    context: &'a mut Context,
    gedcom: &'a mut Gedcom,
) -> Option<&'a mut Vec<UserReference>> {
    Some(match context {
        Context::Individual(id) => &mut gedcom[*id].user_references,
        Context::Family(id) => &mut gedcom[*id].user_references,
        Context::Source(id) => &mut gedcom[*id].user_references,
        Context::Repository(id) => &mut gedcom[*id].user_references,
        Context::Media(id) => &mut gedcom[*id].user_references,
        _ => return None,
    })
}

fn change_of<'a>(
    context: &'a mut Context,
    gedcom: &'a mut Gedcom,
) -> Option<&'a mut Option<Change>> {
    Some(match context {
        Context::Individual(id) => &mut gedcom[*id].change,
        Context::Family(id) => &mut gedcom[*id].change,
        Context::Source(id) => &mut gedcom[*id].change,
        Context::Repository(id) => &mut gedcom[*id].change,
        Context::Media(id) => &mut gedcom[*id].change,
        Context::Submitter(id) => &mut gedcom[*id].change,
        _ => return None,
    })
}

fn media_of<'a>(
    context: &'a mut Context,
    gedcom: &'a mut Gedcom,
) -> Option<&'a mut Vec<MediaLink>> {
    Some(match context {
        Context::Individual(id) => &mut gedcom[*id].media,
        Context::Family(id) => &mut gedcom[*id].media,
        Context::Source(id) => &mut gedcom[*id].media,
        Context::Submitter(id) => &mut gedcom[*id].media,
        Context::Event { event, .. } => &mut event.media,
        Context::Citation { citation, .. } => &mut citation.media,
        _ => return None,
    })
}

fn address_of<'a>(context: &'a mut Context, gedcom: &'a mut Gedcom) -> Option<&'a mut Address> {
    Some(match context {
        Context::Corp(address) => address,
        Context::Event { event, .. } => &mut event.address,
        Context::Repository(id) => &mut gedcom[*id].address,
        Context::Submitter(id) => &mut gedcom[*id].address,
        _ => return None,
    })
}

fn user_defined_of<'a>(
    context: &'a mut Context,
    gedcom: &'a mut Gedcom,
) -> Option<&'a mut Vec<UserDefinedTag>> {
    Some(match context {
        Context::Root => &mut gedcom.user_defined,
        Context::Header(header) => &mut header.user_defined,
        Context::System(system) => &mut system.user_defined,
        Context::Individual(id) => &mut gedcom[*id].user_defined,
        Context::Family(id) => &mut gedcom[*id].user_defined,
        Context::Source(id) => &mut gedcom[*id].user_defined,
        Context::Repository(id) => &mut gedcom[*id].user_defined,
        Context::Media(id) => &mut gedcom[*id].user_defined,
        Context::Submitter(id) => &mut gedcom[*id].user_defined,
        Context::Submission(id) => &mut gedcom[*id].user_defined,
        Context::Name(name) => &mut name.user_defined,
        Context::VariantName { name, .. } => &mut name.user_defined,
        Context::Event { event, .. } => &mut event.user_defined,
        Context::Place(place) => &mut place.user_defined,
        Context::Citation { citation, .. } => &mut citation.user_defined,
        Context::CitationData(data) => &mut data.user_defined,
        Context::SourceData(data) => &mut data.user_defined,
        Context::MediaFile(file) => &mut file.user_defined,
        Context::FileFormat { user_defined, .. } => user_defined,
        Context::AddressDetail(detail) => &mut detail.user_defined,
        Context::PlaceVariant { name, .. } => &mut name.user_defined,
        Context::FamilyLink { link, .. } => &mut link.user_defined,
        Context::Association(association) => &mut association.user_defined,
        Context::UserReference(reference) => &mut reference.user_defined,
        Context::Change(change) => &mut change.user_defined,
        Context::Note(note) => &mut note.user_defined,
        Context::SourceEvent(event) => &mut event.user_defined,
        Context::SourceRepository(repository) => &mut repository.user_defined,
        Context::CallNumber(number) => &mut number.user_defined,
        Context::MediaLink(link) => &mut link.user_defined,
        Context::UserDefined(tag) => &mut tag.children,
        _ => return None,
    })
}
