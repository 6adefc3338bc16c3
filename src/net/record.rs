use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use crate::error::{FormatError, FormatErrorKind};

const INCOMING_MARKER: &str = "<RECV";
const OUTGOING_MARKER: &str = "<SEND";
const CODE_TOKEN: &str = "Code:0x";
const LEN_TOKEN: &str = "Len:";
const BYTES_PER_LINE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub direction: Direction,
    pub opcode: u8,
    pub declared_len: u16,
    pub body: Vec<u8>,
    /// Line number of the header, for diagnostics.
    pub line: u64,
}

impl RawRecord {
    pub fn is(&self, direction: Direction, opcode: u8) -> bool {
        self.direction == direction && self.opcode == opcode
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub direction: Option<Direction>,
    pub opcode: Option<u8>,
}

impl RecordFilter {
    pub const ANY: RecordFilter = RecordFilter {
        direction: None,
        opcode: None,
    };

    pub fn incoming() -> Self {
        Self {
            direction: Some(Direction::Incoming),
            opcode: None,
        }
    }

    pub fn outgoing() -> Self {
        Self {
            direction: Some(Direction::Outgoing),
            opcode: None,
        }
    }

    pub fn with_opcode(self, opcode: u8) -> Self {
        Self {
            opcode: Some(opcode),
            ..self
        }
    }

    pub fn matches(&self, direction: Direction, opcode: u8) -> bool {
        self.direction.map_or(true, |d| d == direction) && self.opcode.map_or(true, |o| o == opcode)
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    direction: Direction,
    opcode: u8,
    declared_len: u16,
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("log read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Scans a textual packet log and yields one binary record per header.
pub struct RecordReader<R: BufRead> {
    input: R,
    line_no: u64,
    buf: Vec<u8>,
    pushed_back: Option<RawRecord>,
    records_read: u64,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line_no: 0,
            buf: Vec::new(),
            pushed_back: None,
            records_read: 0,
        }
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Hands a record back so the next read returns it again.
    pub fn push_back(&mut self, record: RawRecord) {
        self.pushed_back = Some(record);
    }

    pub fn next_record(&mut self) -> Result<Option<RawRecord>, ReaderError> {
        self.next_matching(&RecordFilter::ANY)
    }

    /// Skips ahead to the next record accepted by `filter`. Bodies of skipped
    /// records are stepped over without being decoded.
    pub fn next_matching(&mut self, filter: &RecordFilter) -> Result<Option<RawRecord>, ReaderError> {
        if let Some(record) = self.pushed_back.take() {
            if filter.matches(record.direction, record.opcode) {
                return Ok(Some(record));
            }
        }
        loop {
            let Some((header, line)) = self.next_header()? else {
                return Ok(None);
            };
            let body_lines = (header.declared_len as usize).div_ceil(BYTES_PER_LINE);
            if !filter.matches(header.direction, header.opcode) {
                self.skip_lines(body_lines, line)?;
                continue;
            }
            let body = self.read_body(header.declared_len as usize, body_lines, line)?;
            self.records_read += 1;
            return Ok(Some(RawRecord {
                direction: header.direction,
                opcode: header.opcode,
                declared_len: header.declared_len,
                body,
                line,
            }));
        }
    }

    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        let read = self.input.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let text = String::from_utf8_lossy(&self.buf);
        Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn next_header(&mut self) -> Result<Option<(Header, u64)>, ReaderError> {
        while let Some(line) = self.read_line()? {
            let direction = if line.starts_with(INCOMING_MARKER) {
                Direction::Incoming
            } else if line.starts_with(OUTGOING_MARKER) {
                Direction::Outgoing
            } else {
                continue;
            };
            let header = parse_header(&line, direction, self.line_no)?;
            return Ok(Some((header, self.line_no)));
        }
        Ok(None)
    }

    fn skip_lines(&mut self, count: usize, header_line: u64) -> Result<(), ReaderError> {
        for _ in 0..count {
            if self.read_line()?.is_none() {
                return Err(FormatError::new(
                    header_line,
                    FormatErrorKind::TruncatedBody,
                    "log ended inside a record body",
                )
                .into());
            }
        }
        Ok(())
    }

    fn read_body(
        &mut self,
        declared_len: usize,
        body_lines: usize,
        header_line: u64,
    ) -> Result<Vec<u8>, ReaderError> {
        let mut body = Vec::with_capacity(declared_len);
        for _ in 0..body_lines {
            let Some(line) = self.read_line()? else {
                return Err(FormatError::new(
                    header_line,
                    FormatErrorKind::TruncatedBody,
                    format!("log ended after {} of {} bytes", body.len(), declared_len),
                )
                .into());
            };
            parse_hex_line(&line, &mut body, self.line_no)?;
        }
        if body.len() < declared_len {
            return Err(FormatError::new(
                header_line,
                FormatErrorKind::TruncatedBody,
                format!("body holds {} of {} bytes", body.len(), declared_len),
            )
            .into());
        }
        if body.len() > declared_len {
            return Err(FormatError::new(
                header_line,
                FormatErrorKind::OverlongBody,
                format!("body holds {} bytes, header declares {}", body.len(), declared_len),
            )
            .into());
        }
        Ok(body)
    }
}

fn parse_header(line: &str, direction: Direction, line_no: u64) -> Result<Header, FormatError> {
    let code_start = line
        .find(CODE_TOKEN)
        .map(|idx| idx + CODE_TOKEN.len())
        .ok_or_else(|| FormatError::new(line_no, FormatErrorKind::MissingCode, line))?;
    let digits: String = line[code_start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .take(4)
        .collect();
    if digits.is_empty() {
        return Err(FormatError::new(line_no, FormatErrorKind::BadCode, line));
    }
    let opcode = u16::from_str_radix(&digits, 16)
        .ok()
        .and_then(|value| u8::try_from(value).ok())
        .ok_or_else(|| FormatError::new(line_no, FormatErrorKind::BadCode, line))?;

    let len_start = line
        .find(LEN_TOKEN)
        .map(|idx| idx + LEN_TOKEN.len())
        .ok_or_else(|| FormatError::new(line_no, FormatErrorKind::MissingLength, line))?;
    let len_end = line[len_start..]
        .find('>')
        .map(|idx| len_start + idx)
        .ok_or_else(|| FormatError::new(line_no, FormatErrorKind::MissingLength, line))?;
    let declared_len = line[len_start..len_end]
        .trim()
        .parse::<u16>()
        .map_err(|_| FormatError::new(line_no, FormatErrorKind::BadLength, line))?;

    Ok(Header {
        direction,
        opcode,
        declared_len,
    })
}

fn parse_hex_line(line: &str, out: &mut Vec<u8>, line_no: u64) -> Result<(), FormatError> {
    let hex = match line.find("  ") {
        Some(gutter) => &line[..gutter],
        None => line,
    };
    for token in hex.split_whitespace() {
        let byte = u8::from_str_radix(token, 16).map_err(|_| {
            FormatError::new(line_no, FormatErrorKind::BadHexToken, token)
        })?;
        out.push(byte);
    }
    Ok(())
}

/// Renders a record the way the capture tool writes it.
pub fn format_record(direction: Direction, opcode: u8, body: &[u8]) -> String {
    let marker = match direction {
        Direction::Incoming => INCOMING_MARKER,
        Direction::Outgoing => OUTGOING_MARKER,
    };
    let mut out = format!("{marker} Code:0x{opcode:04X} Len: {}>\n", body.len());
    for chunk in body.chunks(BYTES_PER_LINE) {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        out.push_str(&format!("{:<47}  {}\n", hex.join(" "), ascii));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> RecordReader<Cursor<Vec<u8>>> {
        RecordReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    fn expect_format(err: ReaderError) -> FormatError {
        match err {
            ReaderError::Format(err) => err,
            ReaderError::Io(err) => panic!("unexpected io error {err}"),
        }
    }

    #[test]
    fn reads_declared_bytes_across_lines() {
        let body: Vec<u8> = (0u8..20).collect();
        let text = format!(
            "session start\n{}",
            format_record(Direction::Incoming, 0x20, &body)
        );
        let mut reader = reader(&text);
        let record = reader.next_record().unwrap().expect("record");
        assert_eq!(record.direction, Direction::Incoming);
        assert_eq!(record.opcode, 0x20);
        assert_eq!(record.declared_len, 20);
        assert_eq!(record.body, body);
        assert_eq!(record.line, 2);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn gutter_text_is_ignored() {
        let text = "<SEND Code:0xFC Len:3>\n41 42 43  AB C 44 45\n";
        let record = reader(text).next_record().unwrap().expect("record");
        assert_eq!(record.direction, Direction::Outgoing);
        assert_eq!(record.body, vec![0x41, 0x42, 0x43]);
    }

    #[test]
    fn two_digit_and_four_digit_codes_parse() {
        let text = "<RECV Code:0xDA Len:1>\n01  .\n<RECV 12:00:01 Code:0x00C4 Len: 1 >\n02  .\n";
        let mut reader = reader(text);
        assert_eq!(reader.next_record().unwrap().unwrap().opcode, 0xDA);
        assert_eq!(reader.next_record().unwrap().unwrap().opcode, 0xC4);
    }

    #[test]
    fn missing_length_is_a_format_error() {
        let err = reader("<RECV Code:0x20 Size:4\n").next_record().unwrap_err();
        assert_eq!(expect_format(err).kind, FormatErrorKind::MissingLength);
    }

    #[test]
    fn missing_code_is_a_format_error() {
        let err = reader("<SEND Len:4>\n").next_record().unwrap_err();
        assert_eq!(expect_format(err).kind, FormatErrorKind::MissingCode);
    }

    #[test]
    fn opcode_wider_than_a_byte_is_rejected() {
        let err = reader("<SEND Code:0x1FC Len:0>\n").next_record().unwrap_err();
        assert_eq!(expect_format(err).kind, FormatErrorKind::BadCode);
    }

    #[test]
    fn short_body_is_truncated() {
        let err = reader("<RECV Code:0x20 Len:4>\n01 02 03  ...\n")
            .next_record()
            .unwrap_err();
        assert_eq!(expect_format(err).kind, FormatErrorKind::TruncatedBody);
    }

    #[test]
    fn log_ending_mid_body_is_truncated() {
        let err = reader("<RECV Code:0x20 Len:20>\n00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00  ................\n")
            .next_record()
            .unwrap_err();
        assert_eq!(expect_format(err).kind, FormatErrorKind::TruncatedBody);
    }

    #[test]
    fn extra_bytes_are_rejected() {
        let err = reader("<RECV Code:0x20 Len:2>\n01 02 03  ...\n")
            .next_record()
            .unwrap_err();
        assert_eq!(expect_format(err).kind, FormatErrorKind::OverlongBody);
    }

    #[test]
    fn filter_skips_uninteresting_records() {
        let mut text = String::new();
        text.push_str(&format_record(Direction::Incoming, 0x20, &[0; 24]));
        text.push_str(&format_record(Direction::Outgoing, 0xA9, &[1; 11]));
        text.push_str(&format_record(Direction::Outgoing, 0xFC, &[2; 3]));
        let mut reader = reader(&text);
        let record = reader
            .next_matching(&RecordFilter::outgoing().with_opcode(0xFC))
            .unwrap()
            .expect("record");
        assert_eq!(record.body, vec![2, 2, 2]);
        assert_eq!(reader.records_read(), 1);
    }

    #[test]
    fn zero_length_record_has_no_body_lines() {
        let mut text = format_record(Direction::Outgoing, 0x90, &[]);
        text.push_str(&format_record(Direction::Incoming, 0x20, &[9]));
        let mut reader = reader(&text);
        assert!(reader.next_record().unwrap().unwrap().body.is_empty());
        assert_eq!(reader.next_record().unwrap().unwrap().body, vec![9]);
    }

    #[test]
    fn pushed_back_record_is_returned_again() {
        let text = format_record(Direction::Incoming, 0x15, &[1, 2]);
        let mut reader = reader(&text);
        let record = reader.next_record().unwrap().expect("record");
        reader.push_back(record.clone());
        assert_eq!(reader.next_record().unwrap(), Some(record));
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn filler_lines_between_records_are_inert() {
        let mut text = String::from("# capture v2\n\n");
        text.push_str(&format_record(Direction::Incoming, 0x20, &[7]));
        text.push_str("some note\n");
        text.push_str(&format_record(Direction::Incoming, 0x21, &[8]));
        let mut reader = reader(&text);
        assert_eq!(reader.next_record().unwrap().unwrap().body, vec![7]);
        assert_eq!(reader.next_record().unwrap().unwrap().body, vec![8]);
    }
}
