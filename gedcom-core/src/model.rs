//! Typed record graph
//!
//! A decoded file is a [`Gedcom`]: a header, top-level lists of record ids,
//! and the arenas owning every shared record. Substructures (names, events,
//! citations, ...) are owned by value by the record they belong to.

use crate::linker::{Arena, Record, RecordId, RecordKind};
use crate::names::{split_personal_name, ParsedName};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Id of an [`Individual`]
pub type IndividualId = RecordId<Individual>;
/// Id of a [`Family`]
pub type FamilyId = RecordId<Family>;
/// Id of a [`Source`]
pub type SourceId = RecordId<Source>;
/// Id of a [`Media`] object
pub type MediaId = RecordId<Media>;
/// Id of a [`Repository`]
pub type RepositoryId = RecordId<Repository>;
/// Id of a [`Submitter`]
pub type SubmitterId = RecordId<Submitter>;
/// Id of a [`Submission`]
pub type SubmissionId = RecordId<Submission>;

/// Storage for every shared record, listed at top level or not
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arenas {
    /// `INDI` records
    pub individuals: Arena<Individual>,
    /// `FAM` records
    pub families: Arena<Family>,
    /// `SOUR` records, including inline sources
    pub sources: Arena<Source>,
    /// `OBJE` records, including inline media
    pub media: Arena<Media>,
    /// `REPO` records
    pub repositories: Arena<Repository>,
    /// `SUBM` records
    pub submitters: Arena<Submitter>,
    /// `SUBN` records
    pub submissions: Arena<Submission>,
}

/// A complete GEDCOM file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gedcom {
    /// `HEAD`
    pub header: Option<Header>,

    /// Individuals in file order
    pub individuals: Vec<IndividualId>,
    /// Families in file order
    pub families: Vec<FamilyId>,
    /// Media objects in file order
    pub media: Vec<MediaId>,
    /// Repositories in file order
    pub repositories: Vec<RepositoryId>,
    /// Sources in file order
    pub sources: Vec<SourceId>,
    /// Submitters in file order
    pub submitters: Vec<SubmitterId>,
    /// Submissions in file order
    pub submissions: Vec<SubmissionId>,

    /// Unrecognized level-0 records
    pub user_defined: Vec<UserDefinedTag>,

    /// `TRLR`, if the file had one
    pub trailer: Option<Trailer>,

    /// Record storage
    pub arenas: Arenas,
}

impl Gedcom {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a record and list it at top level
    pub fn add<T: Record>(&mut self, record: T) -> RecordId<T> {
        let id = T::arena_mut(self).alloc(record);
        T::listed_mut(self).push(id);
        id
    }

    /// Allocate a record without listing it
    pub fn alloc<T: Record>(&mut self, record: T) -> RecordId<T> {
        T::arena_mut(self).alloc(record)
    }

    /// Look up a record
    pub fn get<T: Record>(&self, id: RecordId<T>) -> Option<&T> {
        T::arena(self).get(id)
    }

    /// Look up a record mutably
    pub fn get_mut<T: Record>(&mut self, id: RecordId<T>) -> Option<&mut T> {
        T::arena_mut(self).get_mut(id)
    }

    /// Find a record by its xref
    ///
    /// This walks the kind's arena, so it costs O(n) in the number of records.
    /// Resolve many xrefs with a [`ReferenceTable`](crate::linker::ReferenceTable)
    /// or keep the ids the decoder hands out instead.
    pub fn find<T: Record>(&self, xref: &str) -> Option<RecordId<T>> {
        if xref.is_empty() {
            return None;
        }
        T::arena(self)
            .iter()
            .find(|(_, record)| record.xref() == xref)
            .map(|(id, _)| id)
    }

    /// Listed records of one kind, in file order
    pub fn records<'a, T: Record + 'a>(&'a self) -> impl Iterator<Item = &'a T> + 'a {
        let arena = T::arena(self);
        T::listed(self).iter().filter_map(move |&id| arena.get(id))
    }

    /// Listed individuals
    pub fn individuals(&self) -> impl Iterator<Item = &Individual> + '_ {
        self.records()
    }

    /// Listed families
    pub fn families(&self) -> impl Iterator<Item = &Family> + '_ {
        self.records()
    }

    /// Listed media objects
    pub fn media(&self) -> impl Iterator<Item = &Media> + '_ {
        self.records()
    }

    /// Listed repositories
    pub fn repositories(&self) -> impl Iterator<Item = &Repository> + '_ {
        self.records()
    }

    /// Listed sources
    pub fn sources(&self) -> impl Iterator<Item = &Source> + '_ {
        self.records()
    }

    /// Listed submitters
    pub fn submitters(&self) -> impl Iterator<Item = &Submitter> + '_ {
        self.records()
    }

    /// Listed submissions
    pub fn submissions(&self) -> impl Iterator<Item = &Submission> + '_ {
        self.records()
    }
}

impl<T: Record> Index<RecordId<T>> for Gedcom {
    type Output = T;

    fn index(&self, id: RecordId<T>) -> &T {
        &T::arena(self)[id]
    }
}

impl<T: Record> IndexMut<RecordId<T>> for Gedcom {
    fn index_mut(&mut self, id: RecordId<T>) -> &mut T {
        &mut T::arena_mut(self)[id]
    }
}

macro_rules! impl_record {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Record for $ty {
            const KIND: RecordKind = RecordKind::$kind;

            fn xref(&self) -> &str {
                &self.xref
            }

            fn set_xref(&mut self, xref: String) {
                self.xref = xref;
            }

            fn arena(gedcom: &Gedcom) -> &Arena<Self> {
                &gedcom.arenas.$field
            }

            fn arena_mut(gedcom: &mut Gedcom) -> &mut Arena<Self> {
                &mut gedcom.arenas.$field
            }

            fn listed(gedcom: &Gedcom) -> &[RecordId<Self>] {
                &gedcom.$field
            }

            fn listed_mut(gedcom: &mut Gedcom) -> &mut Vec<RecordId<Self>> {
                &mut gedcom.$field
            }
        }
    };
}

impl_record!(Individual, Individual, individuals);
impl_record!(Family, Family, families);
impl_record!(Source, Source, sources);
impl_record!(Media, Media, media);
impl_record!(Repository, Repository, repositories);
impl_record!(Submitter, Submitter, submitters);
impl_record!(Submission, Submission, submissions);

/// `HEAD`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// `SOUR`: the producing system
    pub source_system: SystemRecord,
    /// `DEST`
    pub destination: String,
    /// `DATE`
    pub date: String,
    /// `DATE.TIME`
    pub time: String,
    /// `SUBM`
    pub submitter: Option<SubmitterId>,
    /// `SUBN`
    pub submission: Option<SubmissionId>,
    /// `FILE`
    pub filename: String,
    /// `COPR`
    pub copyright: String,
    /// `GEDC.VERS`
    pub version: String,
    /// `GEDC.FORM`
    pub form: String,
    /// `CHAR`
    pub character_set: String,
    /// `CHAR.VERS`
    pub character_set_version: String,
    /// `LANG`
    pub language: String,
    /// `NOTE`
    pub note: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `HEAD.SOUR`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    /// Approved system id (the `SOUR` value)
    pub xref: String,
    /// `VERS`
    pub version: String,
    /// `NAME`
    pub product_name: String,
    /// `CORP`
    pub business_name: String,
    /// Address of the business
    pub address: Address,
    /// `DATA`
    pub source_name: String,
    /// `DATA.DATE`
    pub source_date: String,
    /// `DATA.COPR`
    pub source_copyright: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `INDI`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Defining xref
    pub xref: String,
    /// `NAME`, plus non-pointer `ALIA` values
    pub names: Vec<Name>,
    /// `SEX`
    pub sex: String,
    /// Individual events
    pub events: Vec<Event>,
    /// Individual attributes
    pub attributes: Vec<Event>,
    /// `FAMC`
    pub parents: Vec<FamilyLink>,
    /// `FAMS`
    pub families: Vec<FamilyLink>,
    /// `SUBM`
    pub submitters: Vec<SubmitterId>,
    /// `ASSO`
    pub associations: Vec<Association>,
    /// `RFN`
    pub permanent_record_file_number: String,
    /// `AFN`
    pub ancestral_file_number: String,
    /// `REFN`
    pub user_references: Vec<UserReference>,
    /// `RIN`
    pub automated_record_id: String,
    /// `CHAN`
    pub change: Option<Change>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// `OBJE`
    pub media: Vec<MediaLink>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `FAM`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Family {
    /// Defining xref
    pub xref: String,
    /// `HUSB`
    pub husband: Option<IndividualId>,
    /// `WIFE`
    pub wife: Option<IndividualId>,
    /// `CHIL`
    pub children: Vec<IndividualId>,
    /// Family events
    pub events: Vec<Event>,
    /// `NCHI`
    pub number_of_children: String,
    /// `REFN`
    pub user_references: Vec<UserReference>,
    /// `RIN`
    pub automated_record_id: String,
    /// `CHAN`
    pub change: Option<Change>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// `OBJE`
    pub media: Vec<MediaLink>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `SOUR` record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Defining xref, empty for a source described inline by a citation
    pub xref: String,
    /// `TITL`
    pub title: String,
    /// `DATA`
    pub data: Option<SourceData>,
    /// `AUTH`
    pub originator: String,
    /// `ABBR`
    pub filed_by: String,
    /// `PUBL`
    pub publication_facts: String,
    /// `TEXT`
    pub text: String,
    /// `REPO`
    pub repository: Option<SourceRepository>,
    /// `REFN`
    pub user_references: Vec<UserReference>,
    /// `RIN`
    pub automated_record_id: String,
    /// `CHAN`
    pub change: Option<Change>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// `OBJE`
    pub media: Vec<MediaLink>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `SOUR.DATA`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    /// `EVEN`
    pub events: Vec<SourceEvent>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `SOUR.DATA.EVEN`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Events recorded, the `EVEN` value
    pub kind: String,
    /// `DATE`
    pub date: String,
    /// `PLAC`
    pub place: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `SOUR.REPO`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRepository {
    /// The repository pointed at, if any
    pub repository: Option<RepositoryId>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// `CALN`
    pub call_numbers: Vec<CallNumber>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `CALN`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallNumber {
    /// Call number
    pub number: String,
    /// `MEDI`
    pub media_type: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// A source citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Cited source; anonymous when described inline
    pub source: SourceId,
    /// `PAGE`
    pub page: String,
    /// `DATA`
    pub data: CitationData,
    /// `QUAY`
    pub quality: String,
    /// `OBJE`
    pub media: Vec<MediaLink>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

impl Citation {
    /// Cite `source` with no detail
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            page: String::new(),
            data: CitationData::default(),
            quality: String::new(),
            media: Vec::new(),
            notes: Vec::new(),
            user_defined: Vec::new(),
        }
    }
}

/// `SOUR.DATA` within a citation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationData {
    /// `DATE`
    pub date: String,
    /// `TEXT`, one entry per occurrence
    pub text: Vec<String>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

impl CitationData {
    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.date.is_empty() && self.text.is_empty() && self.user_defined.is_empty()
    }
}

/// `REPO`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Defining xref
    pub xref: String,
    /// `NAME`
    pub name: String,
    /// Address of the repository
    pub address: Address,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// `REFN`
    pub user_references: Vec<UserReference>,
    /// `RIN`
    pub automated_record_id: String,
    /// `CHAN`
    pub change: Option<Change>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `OBJE`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// Defining xref, empty for media described inline
    pub xref: String,
    /// `FILE`
    pub files: Vec<FileRecord>,
    /// `REFN`
    pub user_references: Vec<UserReference>,
    /// `RIN`
    pub automated_record_id: String,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// `CHAN`
    pub change: Option<Change>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `OBJE.FILE`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File reference
    pub name: String,
    /// `FORM`
    pub format: String,
    /// `FORM.TYPE`
    pub format_type: String,
    /// `TITL`
    pub title: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `SUBM`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submitter {
    /// Defining xref
    pub xref: String,
    /// `NAME`
    pub name: String,
    /// Address of the submitter
    pub address: Address,
    /// `OBJE`
    pub media: Vec<MediaLink>,
    /// `LANG`
    pub languages: Vec<String>,
    /// `RFN`
    pub submitter_record_file_id: String,
    /// `RIN`
    pub automated_record_id: String,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// `CHAN`
    pub change: Option<Change>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `SUBN`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Defining xref
    pub xref: String,
    /// `SUBM`
    pub submitter: Option<SubmitterId>,
    /// `FAMF`
    pub family_file_name: String,
    /// `TEMP`
    pub temple_code: String,
    /// `ANCE`
    pub generations_of_ancestors: String,
    /// `DESC`
    pub generations_of_descendants: String,
    /// `ORDI`
    pub ordinance_process_flag: String,
    /// `RIN`
    pub automated_record_id: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `TRLR`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trailer;

/// `NAME`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Name {
    /// Full name, surname between slashes
    pub name: String,
    /// `TYPE`
    pub name_type: String,
    /// `NPFX`
    pub prefix: String,
    /// `GIVN`
    pub given: String,
    /// `NICK`
    pub nickname: String,
    /// `SPFX`
    pub surname_prefix: String,
    /// `SURN`
    pub surname: String,
    /// `NSFX`
    pub suffix: String,
    /// `FONE`
    pub phonetic: Vec<VariantName>,
    /// `ROMN`
    pub romanized: Vec<VariantName>,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

impl Name {
    /// Split the full name into given name, surname, suffix and nickname
    pub fn parsed(&self) -> ParsedName {
        split_personal_name(&self.name)
    }
}

/// `NAME.FONE` / `NAME.ROMN`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantName {
    /// Variant of the full name
    pub name: String,
    /// `TYPE`: phonetic or romanization method
    pub variant_type: String,
    /// `NPFX`
    pub prefix: String,
    /// `GIVN`
    pub given: String,
    /// `NICK`
    pub nickname: String,
    /// `SPFX`
    pub surname_prefix: String,
    /// `SURN`
    pub surname: String,
    /// `NSFX`
    pub suffix: String,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// An individual or family event, or an individual attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event tag, e.g. `BIRT`
    pub tag: String,
    /// Line value, e.g. `Y` or an attribute's text
    pub value: String,
    /// `TYPE`
    pub event_type: String,
    /// `DATE`
    pub date: String,
    /// `PLAC`
    pub place: Option<Place>,
    /// Address where the event took place
    pub address: Address,
    /// `AGE`
    pub age: String,
    /// `AGNC`
    pub agency: String,
    /// `RELI`
    pub religious_affiliation: String,
    /// `CAUS`
    pub cause: String,
    /// `RESN`
    pub restriction_notice: String,
    /// `FAMC` under `BIRT`, `CHR` or `ADOP`
    pub child_in_family: Option<FamilyId>,
    /// `ADOP.FAMC.ADOP`: `HUSB`, `WIFE` or `BOTH`
    pub adopted_by_parent: String,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// `OBJE`
    pub media: Vec<MediaLink>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

impl Event {
    /// An event with only its tag and value set
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// `PLAC`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Jurisdictions, comma separated
    pub name: String,
    /// `FONE`
    pub phonetic: Vec<VariantPlaceName>,
    /// `ROMN`
    pub romanized: Vec<VariantPlaceName>,
    /// `MAP.LATI`
    pub latitude: String,
    /// `MAP.LONG`
    pub longitude: String,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `PLAC.FONE` / `PLAC.ROMN`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantPlaceName {
    /// Variant of the place name
    pub name: String,
    /// `TYPE`
    pub variant_type: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `NOTE`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Text with `CONT` lines joined by newlines
    pub note: String,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

impl Note {
    /// A note holding `text` and no citations
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            note: text.into(),
            citations: Vec::new(),
            user_defined: Vec::new(),
        }
    }
}

/// `FAMC` / `FAMS` on an individual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyLink {
    /// Linked family
    pub family: FamilyId,
    /// `PEDI`
    pub pedigree: String,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

impl FamilyLink {
    /// Link to `family` with no pedigree
    pub fn new(family: FamilyId) -> Self {
        Self {
            family,
            pedigree: String::new(),
            notes: Vec::new(),
            user_defined: Vec::new(),
        }
    }
}

/// `OBJE` on a record or substructure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaLink {
    /// Linked media; anonymous when described inline
    pub media: MediaId,
    /// Unrecognized substructures below a pointer `OBJE`
    pub user_defined: Vec<UserDefinedTag>,
}

impl MediaLink {
    /// Link to `media` with nothing below it
    pub fn new(media: MediaId) -> Self {
        Self {
            media,
            user_defined: Vec::new(),
        }
    }
}

impl From<MediaId> for MediaLink {
    fn from(media: MediaId) -> Self {
        Self::new(media)
    }
}

/// `ASSO`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// Associated individual
    pub individual: IndividualId,
    /// `RELA`
    pub relation: String,
    /// `SOUR`
    pub citations: Vec<Citation>,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

impl Association {
    /// Associate with `individual`
    pub fn new(individual: IndividualId) -> Self {
        Self {
            individual,
            relation: String::new(),
            citations: Vec::new(),
            notes: Vec::new(),
            user_defined: Vec::new(),
        }
    }
}

/// `REFN`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReference {
    /// Reference number
    pub number: String,
    /// `TYPE`
    pub reference_type: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// `CHAN`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// `DATE`
    pub date: String,
    /// `DATE.TIME`
    pub time: String,
    /// `NOTE`
    pub notes: Vec<Note>,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// Address and contact details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// `ADDR`, one entry per occurrence
    pub details: Vec<AddressDetail>,
    /// `PHON`
    pub phones: Vec<String>,
    /// `EMAIL`
    pub emails: Vec<String>,
    /// `FAX`
    pub faxes: Vec<String>,
    /// `WWW` or `URL`
    pub websites: Vec<String>,
}

impl Address {
    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
            && self.phones.is_empty()
            && self.emails.is_empty()
            && self.faxes.is_empty()
            && self.websites.is_empty()
    }
}

/// `ADDR`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDetail {
    /// Full address, `CONT` lines joined by newlines
    pub full: String,
    /// `ADR1`
    pub line1: String,
    /// `ADR2`
    pub line2: String,
    /// `ADR3`
    pub line3: String,
    /// `CITY`
    pub city: String,
    /// `STAE`
    pub state: String,
    /// `POST`
    pub postal_code: String,
    /// `CTRY`
    pub country: String,
    /// Unrecognized substructures
    pub user_defined: Vec<UserDefinedTag>,
}

/// A line the decoder did not recognize, with everything nested below it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDefinedTag {
    /// Tag as it appeared
    pub tag: String,
    /// Value as it appeared
    pub value: String,
    /// Defining xref, if any
    pub xref: String,
    /// Level in the source file
    pub level: usize,
    /// Nested lines
    pub children: Vec<UserDefinedTag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_lists_and_alloc_does_not() {
        let mut gedcom = Gedcom::new();
        let listed = gedcom.add(Individual {
            xref: "I1".into(),
            ..Default::default()
        });
        let hidden = gedcom.alloc(Individual::default());

        assert_eq!(gedcom.individuals, vec![listed]);
        assert_eq!(gedcom.arenas.individuals.len(), 2);
        assert!(gedcom.get(hidden).is_some());
        assert_eq!(gedcom.individuals().count(), 1);
    }

    #[test]
    fn test_index_and_find() {
        let mut gedcom = Gedcom::new();
        let fam = gedcom.add(Family {
            xref: "F1".into(),
            ..Default::default()
        });
        gedcom[fam].number_of_children = "2".into();

        assert_eq!(gedcom.find::<Family>("F1"), Some(fam));
        assert_eq!(gedcom.find::<Family>("F2"), None);
        assert_eq!(gedcom.find::<Individual>("F1"), None);
        assert_eq!(gedcom.families().next().unwrap().number_of_children, "2");
    }

    #[test]
    fn test_records_borrow_the_graph() {
        let mut gedcom = Gedcom::new();
        gedcom.add(Family {
            xref: "F1".into(),
            ..Default::default()
        });
        gedcom.alloc(Family::default());

        let xrefs: Vec<&str> = gedcom.records::<Family>().map(|f| f.xref.as_str()).collect();
        assert_eq!(xrefs, ["F1"]);
        assert_eq!(gedcom.find::<Family>(""), None);
    }

    #[test]
    fn test_name_parsed() {
        let name = Name {
            name: "John \"Jack\" /Doe/ Jr.".into(),
            ..Default::default()
        };
        let parsed = name.parsed();
        assert_eq!(parsed.given, "John");
        assert_eq!(parsed.surname, "Doe");
        assert_eq!(parsed.suffix, "Jr.");
        assert_eq!(parsed.nickname, "Jack");
    }

    #[test]
    fn test_graph_serializes() {
        let mut gedcom = Gedcom::new();
        let src = gedcom.add(Source {
            xref: "S1".into(),
            title: "Parish register".into(),
            ..Default::default()
        });
        gedcom.add(Individual {
            xref: "I1".into(),
            citations: vec![Citation::new(src)],
            ..Default::default()
        });

        let json = serde_json::to_string(&gedcom).unwrap();
        let back: Gedcom = serde_json::from_str(&json).unwrap();
        assert_eq!(back, gedcom);
    }
}
