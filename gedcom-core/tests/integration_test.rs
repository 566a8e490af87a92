//! Integration tests for the complete scan → decode → encode flow

use gedcom_core::{
    decode_from_bytes, encode_to_bytes, model::Note, scan_lines, Decoder, Encoder, Gedcom,
    GedcomError, Individual, ScanErrorKind,
};

const SAMPLE: &[u8] = include_bytes!("fixtures/sample.ged");
const BAD_NOTE: &[u8] = include_bytes!("fixtures/badnote.ged");

fn individual<'g>(gedcom: &'g Gedcom, xref: &str) -> &'g Individual {
    let id = gedcom.find::<Individual>(xref).unwrap();
    &gedcom[id]
}

#[test]
fn test_decode_sample() {
    let gedcom = decode_from_bytes(SAMPLE).unwrap();

    assert_eq!(gedcom.individuals.len(), 3);
    assert_eq!(gedcom.families.len(), 1);
    assert_eq!(gedcom.sources.len(), 1);
    assert_eq!(gedcom.repositories.len(), 1);
    assert_eq!(gedcom.submitters.len(), 1);
    assert!(gedcom.trailer.is_some());

    let header = gedcom.header.as_ref().unwrap();
    assert_eq!(header.source_system.xref, "FamilyTool");
    assert_eq!(header.source_system.product_name, "Family Tool");
    assert_eq!(header.time, "08:15:00");
    assert_eq!(header.version, "5.5.1");
    assert_eq!(header.character_set, "UTF-8");
    let submitter = &gedcom[header.submitter.unwrap()];
    assert_eq!(submitter.name, "Ada Archivist");
    assert_eq!(submitter.address.details[0].full, "1 Main Street\nSpringfield");
    assert_eq!(submitter.address.details[0].city, "Springfield");

    let robert = individual(&gedcom, "I1");
    let name = robert.names[0].parsed();
    assert_eq!(name.given, "Robert Eugene");
    assert_eq!(name.surname, "Williams");
    assert_eq!(robert.events.len(), 2);
    assert_eq!(robert.attributes[0].tag, "OCCU");
    assert_eq!(robert.attributes[0].value, "Carpenter");
    assert_eq!(
        robert.notes[0].note,
        "Robert was a carpenter by trade.\nHe lived in Connecticut."
    );

    let birth = &robert.events[0];
    assert_eq!(birth.place.as_ref().unwrap().name, "Weston, Madison, Connecticut");
    let citation = &birth.citations[0];
    assert_eq!(citation.page, "Sec. 2, p. 45");
    assert_eq!(citation.source, gedcom.sources[0]);
    let source = &gedcom[citation.source];
    assert_eq!(source.originator, "Madison County Clerk");
    let repository = source.repository.as_ref().unwrap();
    assert_eq!(repository.repository, Some(gedcom.repositories[0]));
    assert_eq!(repository.call_numbers[0].number, "13B-1234.01");

    let family = &gedcom[gedcom.families[0]];
    assert_eq!(family.husband, gedcom.find("I1"));
    assert_eq!(family.wife, gedcom.find("I2"));
    assert_eq!(family.children, vec![gedcom.find("I3").unwrap()]);
    assert_eq!(family.events[0].date, "Dec 1859");
    assert_eq!(family.user_defined[0].tag, "_MSTAT");

    let joe = individual(&gedcom, "I3");
    assert_eq!(joe.parents[0].family, gedcom.families[0]);
    assert_eq!(joe.parents[0].pedigree, "birth");
}

#[test]
fn test_encode_is_stable_across_round_trips() {
    let first = encode_to_bytes(&decode_from_bytes(SAMPLE).unwrap()).unwrap();
    let second = encode_to_bytes(&decode_from_bytes(&first).unwrap()).unwrap();
    assert_eq!(first, second);

    let text = std::str::from_utf8(&first).unwrap();
    assert!(text.starts_with("0 HEAD\n1 CHAR UTF-8\n1 SOUR FamilyTool\n"));
    assert!(text.contains("0 @I1@ INDI\n1 NAME Robert Eugene /Williams/\n2 GIVN Robert Eugene\n"));
    assert!(text.contains("1 NOTE Robert was a carpenter by trade.\n2 CONT He lived in Connecticut.\n"));
    assert!(text.contains("0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n"));
    assert!(text.ends_with("0 TRLR\n"));
}

#[test]
fn test_malformed_note_recovery() {
    let gedcom = decode_from_bytes(BAD_NOTE).unwrap();
    let anna = individual(&gedcom, "I1");
    assert_eq!(
        anna.notes[0].note,
        "Letter found in the attic,\nwritten in 1890 by her sister."
    );
    assert_eq!(anna.sex, "F");
    assert_eq!(anna.user_defined[0].tag, "_APID");

    let encoded = encode_to_bytes(&gedcom).unwrap();
    let text = std::str::from_utf8(&encoded).unwrap();
    assert!(text.contains("1 NOTE Letter found in the attic,\n2 CONT written in 1890 by her sister.\n"));
}

#[test]
fn test_scan_reports_position() {
    let err = scan_lines(b"0 HEAD\n1 CHAR UTF-8\nx 1 BAD\n").unwrap_err();
    assert_eq!(
        err,
        GedcomError::Scan {
            line: 3,
            offset: 20,
            kind: ScanErrorKind::NonWhitespaceBeforeLevel,
        }
    );
}

#[test]
fn test_unknown_tags_in_substructures_are_kept() {
    let input = b"0 @I1@ INDI\n1 FAMC @F1@\n2 _FOO bar\n0 TRLR\n";
    let mut log = Vec::new();
    let gedcom = Decoder::new(&input[..])
        .log_unhandled_tags(&mut log)
        .decode()
        .unwrap();

    let link = &individual(&gedcom, "I1").parents[0];
    assert_eq!(link.user_defined[0].tag, "_FOO");
    assert_eq!(link.user_defined[0].value, "bar");
    assert!(log.is_empty());
}

#[test]
fn test_lines_under_scalar_fields_are_logged_and_kept() {
    let input = b"0 HEAD\n1 DATE 1 JAN 2000\n2 TIME 10:00\n2 _X y\n3 _Z z\n0 TRLR\n";
    let mut log = Vec::new();
    let gedcom = Decoder::new(&input[..])
        .log_unhandled_tags(&mut log)
        .decode()
        .unwrap();

    let header = gedcom.header.as_ref().unwrap();
    assert_eq!(header.time, "10:00");
    assert_eq!(header.user_defined[0].tag, "_X");
    assert_eq!(header.user_defined[0].children[0].tag, "_Z");
    let log = String::from_utf8(log).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("level=2; tag=_X; value=y"));

    let text = String::from_utf8(encode_to_bytes(&gedcom).unwrap().to_vec()).unwrap();
    assert!(text.contains("1 DATE 1 JAN 2000\n2 TIME 10:00\n1 _X y\n2 _Z z\n"));
}

#[test]
fn test_underscore_tags_survive_round_trip() {
    let input = "0 @I1@ INDI\n1 FAMC @F1@\n2 _FREL Natural\n2 _MREL Natural\n\
                 1 CHAN\n2 _USR bob\n1 NOTE hi\n2 _X kept?\n\
                 0 @F1@ FAM\n1 CHIL @I1@\n\
                 0 @R1@ REPO\n1 NAME Archive\n1 ADDR 1 Main St\n2 _GEO 1,2\n\
                 0 @S1@ SOUR\n1 REPO @R1@\n2 _ACCT 77\n2 CALN 9\n3 _SHELF B\n\
                 1 DATA\n2 EVEN BIRT\n3 _SEEN y\n\
                 0 TRLR\n";
    let mut wanted: Vec<&str> = input
        .lines()
        .filter(|line| line.contains(" _"))
        .map(|line| &line[2..])
        .collect();

    let first = encode_to_bytes(&decode_from_bytes(input.as_bytes()).unwrap()).unwrap();
    let text = std::str::from_utf8(&first).unwrap();
    let mut found: Vec<&str> = text
        .lines()
        .filter(|line| line.contains(" _"))
        .map(|line| &line[2..])
        .collect();
    wanted.sort_unstable();
    found.sort_unstable();
    assert_eq!(found, wanted);

    let second = encode_to_bytes(&decode_from_bytes(&first).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_build_and_encode_graph() {
    let mut gedcom = Gedcom::new();
    let id = gedcom.add(Individual {
        xref: "P1".into(),
        notes: vec![Note::new("first\nsecond")],
        ..Default::default()
    });
    gedcom[id].sex = "M".into();

    let mut encoder = Encoder::new(Vec::new());
    encoder.encode(&gedcom).unwrap();
    assert_eq!(encoder.lines_written(), 4);
    assert_eq!(
        encoder.into_inner(),
        b"0 @P1@ INDI\n1 SEX M\n1 NOTE first\n2 CONT second\n"
    );
}
