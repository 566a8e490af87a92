//! Line tokenizer for GEDCOM streams
//!
//! The scanner is a byte-level state machine. It pulls bytes from a reader
//! into a working window, refilling it whenever it runs dry, and hands out one
//! [`Line`] per call. It knows nothing about GEDCOM semantics beyond the
//! line shape `<level> [@xref@ ]<tag>[ <value>]`.

use crate::constants::{MAX_LEVEL, READ_CHUNK_SIZE};
use crate::error::{GedcomError, ScanErrorKind};
use crate::types::Line;
use bytes::{Buf, BytesMut};
use std::io::{ErrorKind, Read};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Scanner states, in the order a well-formed line passes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Begin,
    Level,
    SeekTagOrXref,
    SeekTag,
    Tag,
    Xref,
    XrefEnd,
    SeekValue,
    Value,
}

/// Pull-based tokenizer over any [`Read`]
pub struct Scanner<R> {
    reader: R,
    buf: BytesMut,
    eof: bool,
    done: bool,

    /// Physical line number of the next unread byte
    line_no: usize,

    /// Absolute offset of the next unread byte
    offset: u64,

    /// Number of logical lines handed out so far
    lines: usize,
}

impl<R: Read> Scanner<R> {
    /// Create a scanner reading from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            eof: false,
            done: false,
            line_no: 1,
            offset: 0,
            lines: 0,
        }
    }

    /// Number of lines produced so far
    pub fn lines_scanned(&self) -> usize {
        self.lines
    }

    /// Number of input bytes consumed so far
    pub fn bytes_consumed(&self) -> u64 {
        self.offset
    }

    /// Read the next line
    ///
    /// Returns `Ok(None)` at a clean end of input (only whitespace left).
    /// Any error is fatal: once one has been returned, later calls yield
    /// `Ok(None)`.
    pub fn next_line(&mut self) -> Result<Option<Line>, GedcomError> {
        if self.done {
            return Ok(None);
        }
        let result = self.scan_line();
        match &result {
            Ok(Some(_)) => self.lines += 1,
            Ok(None) => {
                self.done = true;

                #[cfg(feature = "logging")]
                debug!(
                    "Scan complete: {} lines from {} bytes",
                    self.lines, self.offset
                );
            }
            Err(_) => self.done = true,
        }
        result
    }

    fn scan_line(&mut self) -> Result<Option<Line>, GedcomError> {
        let mut state = State::Begin;
        let mut line = Line::default();
        let mut tag: Vec<u8> = Vec::new();
        let mut xref: Vec<u8> = Vec::new();
        let mut value: Vec<u8> = Vec::new();

        loop {
            let c = match self.peek_at(0)? {
                Some(c) => c,
                None if state == State::Begin => return Ok(None),
                None => {
                    return Err(GedcomError::UnexpectedEof {
                        line: self.line_no,
                        offset: self.offset,
                    })
                }
            };

            match state {
                State::Begin => match c {
                    0xEF if self.offset == 0 && self.starts_with_bom()? => self.advance(UTF8_BOM.len()),
                    b'0'..=b'9' => {
                        line.line_no = self.line_no;
                        line.offset = self.offset;
                        state = State::Level;
                    }
                    b'\r' | b'\n' => self.consume_terminator()?,
                    b' ' | b'\t' => self.bump(),
                    _ => return Err(self.error(ScanErrorKind::NonWhitespaceBeforeLevel)),
                },

                State::Level => match c {
                    b'0'..=b'9' => {
                        line.level = line.level * 10 + usize::from(c - b'0');
                        if line.level > MAX_LEVEL {
                            return Err(self.error(ScanErrorKind::LevelTooDeep));
                        }
                        self.bump();
                    }
                    b' ' => {
                        self.bump();
                        state = State::SeekTagOrXref;
                    }
                    _ => return Err(self.error(ScanErrorKind::InvalidLevel)),
                },

                State::SeekTagOrXref => match c {
                    c if is_alphanumeric(c) => state = State::Tag,
                    b'@' => {
                        self.bump();
                        state = State::Xref;
                    }
                    b' ' => self.bump(),
                    _ => return Err(self.error(ScanErrorKind::InvalidTag)),
                },

                State::SeekTag => match c {
                    c if is_alphanumeric(c) => state = State::Tag,
                    b' ' => self.bump(),
                    _ => return Err(self.error(ScanErrorKind::InvalidTag)),
                },

                State::Tag => match c {
                    c if is_alphanumeric(c) => {
                        tag.push(c);
                        self.bump();
                    }
                    b'\r' | b'\n' => {
                        self.consume_terminator()?;
                        return Ok(Some(finish(line, tag, xref, value)));
                    }
                    b' ' => {
                        // exactly one delimiter; further spaces belong to the value
                        self.bump();
                        state = State::SeekValue;
                    }
                    _ => return Err(self.error(ScanErrorKind::InvalidTag)),
                },

                State::Xref => match c {
                    c if is_alphanumeric(c) => {
                        xref.push(c);
                        self.bump();
                    }
                    b'@' if !xref.is_empty() => {
                        self.bump();
                        state = State::XrefEnd;
                    }
                    _ => return Err(self.error(ScanErrorKind::InvalidXref)),
                },

                State::XrefEnd => match c {
                    b' ' => {
                        self.bump();
                        state = State::SeekTag;
                    }
                    _ => return Err(self.error(ScanErrorKind::InvalidXref)),
                },

                State::SeekValue => match c {
                    b'\r' | b'\n' => {
                        self.consume_terminator()?;
                        return Ok(Some(finish(line, tag, xref, value)));
                    }
                    _ => state = State::Value,
                },

                State::Value => match memchr::memchr2(b'\n', b'\r', &self.buf) {
                    Some(0) => {
                        self.consume_terminator()?;
                        if tag == b"NOTE" && self.continues_malformed_note()? {
                            #[cfg(feature = "logging")]
                            warn!(
                                "Folding unterminated NOTE text onto line {}",
                                self.line_no
                            );

                            value.push(b'\n');
                            continue;
                        }
                        return Ok(Some(finish(line, tag, xref, value)));
                    }
                    Some(end) => {
                        value.extend_from_slice(&self.buf[..end]);
                        self.advance(end);
                    }
                    None => {
                        value.extend_from_slice(&self.buf);
                        let len = self.buf.len();
                        self.advance(len);
                    }
                },
            }
        }
    }

    /// After a `NOTE` value line, decide whether the next physical line is raw
    /// note text rather than a new `<level> <tag>` line.
    fn continues_malformed_note(&mut self) -> Result<bool, GedcomError> {
        let mut n = 0;
        loop {
            match self.peek_at(n)? {
                Some(b' ' | b'\t') => n += 1,
                Some(b'0'..=b'9' | b'\r' | b'\n') | None => return Ok(false),
                Some(_) => return Ok(true),
            }
        }
    }

    fn starts_with_bom(&mut self) -> Result<bool, GedcomError> {
        for (i, &b) in UTF8_BOM.iter().enumerate() {
            if self.peek_at(i)? != Some(b) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Consume one line terminator; CR immediately followed by LF counts once
    fn consume_terminator(&mut self) -> Result<(), GedcomError> {
        if self.peek_at(0)? == Some(b'\r') {
            self.bump();
            if self.peek_at(0)? == Some(b'\n') {
                self.bump();
            }
        } else {
            self.bump();
        }
        self.line_no += 1;
        Ok(())
    }

    fn peek_at(&mut self, n: usize) -> Result<Option<u8>, GedcomError> {
        while self.buf.len() <= n && !self.eof {
            self.fill()?;
        }
        Ok(self.buf.get(n).copied())
    }

    fn fill(&mut self) -> Result<(), GedcomError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn bump(&mut self) {
        self.advance(1);
    }

    fn advance(&mut self, n: usize) {
        self.buf.advance(n);
        self.offset += n as u64;
    }

    fn error(&self, kind: ScanErrorKind) -> GedcomError {
        GedcomError::Scan {
            line: self.line_no,
            offset: self.offset,
            kind,
        }
    }
}

impl<R: Read> Iterator for Scanner<R> {
    type Item = Result<Line, GedcomError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

/// Tokenize a complete in-memory buffer
pub fn scan_lines(data: &[u8]) -> Result<Vec<Line>, GedcomError> {
    Scanner::new(data).collect()
}

fn finish(mut line: Line, tag: Vec<u8>, xref: Vec<u8>, value: Vec<u8>) -> Line {
    line.tag = String::from_utf8_lossy(&tag).into_owned();
    line.xref = String::from_utf8_lossy(&xref).into_owned();
    line.value = String::from_utf8_lossy(&value).into_owned();
    line
}

fn is_alphanumeric(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &[u8]) -> Line {
        let mut scanner = Scanner::new(input);
        let line = scanner.next_line().unwrap().expect("one line");
        assert!(scanner.next_line().unwrap().is_none());
        line
    }

    #[test]
    fn test_scan_simple_lines() {
        let cases: &[(&[u8], usize, &str, &str, &str)] = &[
            (b"1 SEX F\n", 1, "SEX", "F", ""),
            (b" 1 SEX F\n", 1, "SEX", "F", ""),
            (b"  \r\n\t 1 SEX F\n", 1, "SEX", "F", ""),
            (b"1 SEX F\r", 1, "SEX", "F", ""),
            (b"1 SEX F \r", 1, "SEX", "F ", ""),
            (b"0 HEAD\r", 0, "HEAD", "", ""),
            (b"0 @OTHER@ SUBM\n", 0, "SUBM", "", "OTHER"),
            (b"1 PUBL Corp, Inc.\n", 1, "PUBL", "Corp, Inc.", ""),
            (b"1 NOTE <i>markup</i>. plain\n", 1, "NOTE", "<i>markup</i>. plain", ""),
            (b"12 _MYOWNTAG x\n", 12, "_MYOWNTAG", "x", ""),
        ];

        for (input, level, tag, value, xref) in cases {
            let line = single(input);
            assert_eq!(line.level, *level, "level for {:?}", input);
            assert_eq!(line.tag, *tag, "tag for {:?}", input);
            assert_eq!(line.value, *value, "value for {:?}", input);
            assert_eq!(line.xref, *xref, "xref for {:?}", input);
        }
    }

    #[test]
    fn test_value_keeps_spaces_after_delimiter() {
        let line = single(b"1     SEX      F\n");
        assert_eq!(line.tag, "SEX");
        assert_eq!(line.value, "     F");

        let line = single(b"2 CONT  indented\n");
        assert_eq!(line.value, " indented");
    }

    #[test]
    fn test_value_pointer_left_verbatim() {
        let line = single(b"1 FAMC @F1@\n");
        assert_eq!(line.value, "@F1@");
        assert!(line.xref.is_empty());
    }

    #[test]
    fn test_unterminated_line_is_unexpected_eof() {
        for input in [&b"1 SEX F"[..], &b" 1 SEX F "[..], &b"0 HEAD"[..], &b"3"[..]] {
            let mut scanner = Scanner::new(input);
            let err = scanner.next_line().unwrap_err();
            assert!(
                matches!(err, GedcomError::UnexpectedEof { .. }),
                "got {:?} for {:?}",
                err,
                input
            );
            // error state is terminal
            assert!(scanner.next_line().unwrap().is_none());
        }
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(scan_lines(b"").unwrap().is_empty());
        assert!(scan_lines(b" \r\n\n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_scan_errors() {
        let err = scan_lines(b"X HEAD\n").unwrap_err();
        assert!(matches!(
            err,
            GedcomError::Scan { kind: ScanErrorKind::NonWhitespaceBeforeLevel, .. }
        ));

        let err = scan_lines(b"1X HEAD\n").unwrap_err();
        assert!(matches!(
            err,
            GedcomError::Scan { kind: ScanErrorKind::InvalidLevel, .. }
        ));

        let err = scan_lines(b"0 HE-AD\n").unwrap_err();
        assert!(matches!(
            err,
            GedcomError::Scan { kind: ScanErrorKind::InvalidTag, .. }
        ));

        let err = scan_lines(b"0 @I-1@ INDI\n").unwrap_err();
        assert!(matches!(
            err,
            GedcomError::Scan { kind: ScanErrorKind::InvalidXref, .. }
        ));

        let err = scan_lines(b"99999999999999999999999 HEAD\n").unwrap_err();
        assert!(matches!(
            err,
            GedcomError::Scan { kind: ScanErrorKind::LevelTooDeep, .. }
        ));
    }

    #[test]
    fn test_level_limit() {
        let lines = scan_lines(b"99 _DEEP\n").unwrap();
        assert_eq!(lines[0].level, 99);

        let err = scan_lines(b"0 HEAD\n100 _DEEP\n").unwrap_err();
        assert_eq!(
            err,
            GedcomError::Scan {
                line: 2,
                offset: 9,
                kind: ScanErrorKind::LevelTooDeep,
            }
        );
    }

    #[test]
    fn test_leading_bom_is_skipped() {
        let lines = scan_lines(b"\xEF\xBB\xBF0 HEAD\n1 CHAR UTF-8\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].tag, "HEAD");
        assert_eq!((lines[0].line_no, lines[0].offset), (1, 3));

        // only at the very start of the stream
        let err = scan_lines(b"0 HEAD\n\xEF\xBB\xBF1 CHAR UTF-8\n").unwrap_err();
        assert!(matches!(
            err,
            GedcomError::Scan { kind: ScanErrorKind::NonWhitespaceBeforeLevel, .. }
        ));
    }

    #[test]
    fn test_error_position() {
        let err = scan_lines(b"0 HEAD\n1 CHAR ASCII\n1 G!DC\n").unwrap_err();
        assert_eq!(
            err,
            GedcomError::Scan {
                line: 3,
                offset: 23,
                kind: ScanErrorKind::InvalidTag,
            }
        );
    }

    #[test]
    fn test_line_endings() {
        let inputs: [&[u8]; 3] = [
            b"0 HEAD\n1 CHAR UTF-8\n1 GEDC\n1 NOTE first line\n2 CONT second line\n",
            b"0 HEAD\r\n1 CHAR UTF-8\r\n1 GEDC\r\n1 NOTE first line\r\n2 CONT second line\r\n",
            b"0 HEAD\r1 CHAR UTF-8\r\n1 GEDC\r1 NOTE first line\r2 CONT second line\r",
        ];

        let want = vec![
            Line::new(0, "HEAD", ""),
            Line::new(1, "CHAR", "UTF-8"),
            Line::new(1, "GEDC", ""),
            Line::new(1, "NOTE", "first line"),
            Line::new(2, "CONT", "second line"),
        ];

        for input in inputs {
            let got: Vec<Line> = scan_lines(input)
                .unwrap()
                .into_iter()
                .map(|l| Line::new(l.level, l.tag, l.value))
                .collect();
            assert_eq!(got, want, "input {:?}", String::from_utf8_lossy(input));
        }
    }

    #[test]
    fn test_line_numbers_and_offsets() {
        let lines = scan_lines(b"0 HEAD\r\n\r\n1 CHAR ASCII\n0 TRLR\n").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!((lines[0].line_no, lines[0].offset), (1, 0));
        assert_eq!((lines[1].line_no, lines[1].offset), (3, 10));
        assert_eq!((lines[2].line_no, lines[2].offset), (4, 23));
    }

    #[test]
    fn test_malformed_note_is_folded() {
        let input = b"1 NOTE first part\nraw second part\n1 _APID 1,1558::0\n";
        let lines = scan_lines(input).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].value, "first part\nraw second part");
        assert_eq!(lines[1].tag, "_APID");
    }

    #[test]
    fn test_note_followed_by_indented_line_is_not_folded() {
        let lines = scan_lines(b"1 NOTE text\n  2 CONT more\n\n1 SEX M\n").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].value, "text");
        assert_eq!(lines[1].value, "more");
    }

    #[test]
    fn test_non_note_is_not_folded() {
        let err = scan_lines(b"1 TITL title\nraw text\n").unwrap_err();
        assert!(matches!(
            err,
            GedcomError::Scan { kind: ScanErrorKind::NonWhitespaceBeforeLevel, .. }
        ));
    }

    #[test]
    fn test_small_reads_refill_window() {
        struct Trickle<'a>(&'a [u8]);

        impl Read for Trickle<'_> {
            fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() || out.is_empty() {
                    return Ok(0);
                }
                out[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }

        let input = b"0 @I1@ INDI\r\n1 NAME John /Doe/\r\n1 NOTE a\r\nb\r\n0 TRLR\r\n";
        let lines: Vec<Line> = Scanner::new(Trickle(input))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].xref, "I1");
        assert_eq!(lines[1].value, "John /Doe/");
        assert_eq!(lines[2].value, "a\nb");
        assert_eq!(lines[3].tag, "TRLR");
    }

    #[test]
    fn test_counters() {
        let mut scanner = Scanner::new(&b"0 HEAD\n0 TRLR\n"[..]);
        while scanner.next_line().unwrap().is_some() {}
        assert_eq!(scanner.lines_scanned(), 2);
        assert_eq!(scanner.bytes_consumed(), 14);
    }
}
