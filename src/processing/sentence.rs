//! Checksum-validated ASCII sentence decoder
//!
//! Shared by the GNSS receiver, the depth sounder and the SEAKER unit. A
//! sentence is `$payload*HH` where `HH` is the XOR of every payload byte in
//! two uppercase hex digits. Malformed input is dropped without reporting:
//! the next line is always a fresh chance.

use crate::hardware::ByteSource;
use log::trace;
use thiserror::Error;

/// Longest line kept in the carry-over buffer (bytes)
pub const MAX_LINE_LEN: usize = 256;

/// Fields kept per sentence; extra fields are ignored
pub const MAX_FIELDS: usize = 32;

const START_MARKER: u8 = b'$';
const CHECKSUM_DELIMITER: u8 = b'*';
const FIELD_DELIMITER: char = ',';

/// XOR of every payload byte
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Frame a payload as `$payload*HH\r\n`
pub fn encode(payload: &str) -> String {
    format!("${}*{:02X}\r\n", payload, checksum(payload.as_bytes()))
}

/// Accumulates bytes into lines across polls
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Feed one byte; returns the trimmed line when a terminator completes it.
    /// Overlong lines lose their oldest bytes.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if byte == b'\r' || byte == b'\n' {
            if self.buf.is_empty() {
                return None;
            }
            let line = std::mem::take(&mut self.buf);
            let trimmed = trim_ascii(&line);
            return if trimmed.is_empty() { None } else { Some(trimmed.to_vec()) };
        }

        self.buf.push(byte);
        if self.buf.len() > MAX_LINE_LEN {
            let excess = self.buf.len() - MAX_LINE_LEN;
            self.buf.drain(..excess);
        }
        None
    }

    /// Bytes of the partial line carried to the next poll
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Why a line was not accepted as a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("missing start marker")]
    MissingStart,
    #[error("missing checksum delimiter")]
    MissingDelimiter,
    #[error("malformed checksum field")]
    MalformedChecksum,
    #[error("checksum mismatch: frame says {received:02X}, payload gives {computed:02X}")]
    ChecksumMismatch { received: u8, computed: u8 },
}

/// Validate framing and checksum; returns the payload between `$` and `*`
pub fn decode_frame(line: &[u8]) -> Result<&[u8], FrameError> {
    if line.first() != Some(&START_MARKER) {
        return Err(FrameError::MissingStart);
    }
    let star = line
        .iter()
        .rposition(|&b| b == CHECKSUM_DELIMITER)
        .ok_or(FrameError::MissingDelimiter)?;
    let payload = &line[1..star];
    let received = parse_checksum_field(&line[star + 1..]).ok_or(FrameError::MalformedChecksum)?;
    let computed = checksum(payload);
    if received != computed {
        return Err(FrameError::ChecksumMismatch { received, computed });
    }
    Ok(payload)
}

fn parse_checksum_field(field: &[u8]) -> Option<u8> {
    let field = trim_ascii(field);
    if field.len() != 2 {
        return None;
    }
    let digit = |b: u8| match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    };
    Some(digit(field[0])? << 4 | digit(field[1])?)
}

/// Decode a complete line into a sentence, `None` if it is not one
pub fn decode_line(line: &[u8]) -> Option<Sentence<'_>> {
    let payload = match decode_frame(line) {
        Ok(payload) => payload,
        Err(e) => {
            trace!("dropped line: {}", e);
            return None;
        }
    };
    let payload = std::str::from_utf8(payload).ok()?;
    Some(Sentence::parse(payload))
}

/// Sentence types understood by the readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentenceKind {
    /// Position and fix quality
    Gga,
    /// Recommended minimum: status, position, speed, course, date
    Rmc,
    /// Course and speed over ground
    Vtg,
    /// Dilution of precision
    Gsa,
    /// True heading (HDT and THS share the layout)
    Hdt,
    /// Attitude extension carrying true heading
    Pashr,
    /// SkyTraq heading/pitch/roll extension
    Psti036,
    /// Depth below transducer with offset
    Dpt,
    /// Depth in feet / meters / fathoms
    Dbt,
    /// Water temperature
    Mtw,
    /// SEAKER ranging ping
    Ping,
    /// SEAKER link status
    Status,
    Unknown,
}

impl SentenceKind {
    fn classify(fields: &[&str]) -> Self {
        let tag = fields.first().copied().unwrap_or_default();
        match tag {
            "" => return SentenceKind::Unknown,
            "DTPING" => return SentenceKind::Ping,
            "STATUS" => return SentenceKind::Status,
            _ => {}
        }
        if tag.starts_with("PASHR") {
            return SentenceKind::Pashr;
        }
        if tag.starts_with("PSTI") {
            return if fields.get(1) == Some(&"036") {
                SentenceKind::Psti036
            } else {
                SentenceKind::Unknown
            };
        }

        const BY_SUFFIX: [(&str, SentenceKind); 9] = [
            ("GGA", SentenceKind::Gga),
            ("RMC", SentenceKind::Rmc),
            ("VTG", SentenceKind::Vtg),
            ("GSA", SentenceKind::Gsa),
            ("HDT", SentenceKind::Hdt),
            ("THS", SentenceKind::Hdt),
            ("DPT", SentenceKind::Dpt),
            ("DBT", SentenceKind::Dbt),
            ("MTW", SentenceKind::Mtw),
        ];
        BY_SUFFIX
            .iter()
            .find(|(suffix, _)| tag.ends_with(suffix))
            .map(|(_, kind)| *kind)
            .unwrap_or(SentenceKind::Unknown)
    }

    /// Fields (tag included) a sentence needs before its handler runs
    pub fn min_fields(&self) -> usize {
        match self {
            SentenceKind::Gga => 15,
            SentenceKind::Rmc => 10,
            SentenceKind::Vtg => 10,
            SentenceKind::Gsa => 18,
            SentenceKind::Hdt => 3,
            SentenceKind::Pashr => 4,
            SentenceKind::Psti036 => 7,
            SentenceKind::Dpt => 2,
            SentenceKind::Dbt => 5,
            SentenceKind::Mtw => 3,
            SentenceKind::Ping => 3,
            SentenceKind::Status => 2,
            SentenceKind::Unknown => 1,
        }
    }
}

/// A validated, tokenized sentence
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence<'a> {
    kind: SentenceKind,
    fields: Vec<&'a str>,
}

impl<'a> Sentence<'a> {
    /// Tokenize a checksum-validated payload
    pub fn parse(payload: &'a str) -> Self {
        let fields: Vec<&str> = payload.split(FIELD_DELIMITER).take(MAX_FIELDS).collect();
        let kind = SentenceKind::classify(&fields);
        Self { kind, fields }
    }

    pub fn kind(&self) -> SentenceKind {
        self.kind
    }

    pub fn tag(&self) -> &'a str {
        self.fields.first().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the sentence carries enough fields for its type
    pub fn has_required_fields(&self) -> bool {
        self.fields.len() >= self.kind.min_fields()
    }

    /// Non-empty field text
    pub fn field(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).copied().filter(|f| !f.is_empty())
    }

    /// Finite floating point field; empty or unparsable means unknown
    pub fn float(&self, index: usize) -> Option<f64> {
        self.field(index)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Integer field; empty or unparsable means unknown
    pub fn integer<T: std::str::FromStr>(&self, index: usize) -> Option<T> {
        self.field(index)?.trim().parse::<T>().ok()
    }
}

/// Receiver of decoded sentences
pub trait SentenceHandler {
    fn handle(&mut self, sentence: &Sentence<'_>, now_ms: u64);

    /// Called for every complete line before validation
    fn on_line(&mut self, _line: &[u8], _now_ms: u64) {}
}

/// Line and sentence counters for one or more polls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub bytes: u64,
    pub lines: u64,
    pub sentences: u64,
    pub rejected: u64,
}

impl DecoderStats {
    pub fn merge(&mut self, other: DecoderStats) {
        self.bytes += other.bytes;
        self.lines += other.lines;
        self.sentences += other.sentences;
        self.rejected += other.rejected;
    }
}

/// Drain up to `budget` currently available bytes into `handler`.
/// Partial lines stay in `lines` for the next call.
pub fn drain<H: SentenceHandler + ?Sized>(
    source: &mut dyn ByteSource,
    lines: &mut LineBuffer,
    handler: &mut H,
    budget: usize,
    now_ms: u64,
) -> DecoderStats {
    let mut stats = DecoderStats::default();
    while stats.bytes < budget as u64 && source.bytes_available() > 0 {
        let Some(byte) = source.read_byte() else { break };
        stats.bytes += 1;

        let Some(line) = lines.push(byte) else { continue };
        stats.lines += 1;
        handler.on_line(&line, now_ms);
        match decode_line(&line) {
            Some(sentence) => {
                stats.sentences += 1;
                handler.handle(&sentence, now_ms);
            }
            None => stats.rejected += 1,
        }
    }
    stats
}
