//! Incremental reader for `data: ` event streams.
//!
//! Bytes arrive in arbitrary network chunks. [`Utf8StreamDecoder`] turns them
//! into text without corrupting multi-byte characters split across chunks,
//! [`LineBuffer`] hands out only newline-terminated lines and keeps the
//! trailing segment for the next chunk, and [`FrameParser`] classifies each
//! line into a [`ParsedRecord`].

use log::debug;

use crate::types::{StreamFrame, DATA_PREFIX, DONE_SENTINEL};

/// Decodes UTF-8 across chunk boundaries.
///
/// An incomplete sequence at the end of a chunk is held back until the next
/// chunk completes it. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // truncated sequence, wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// Bytes held back waiting for the rest of a character.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }
}

/// Splits text into complete lines, retaining the unterminated tail.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` and returns every line completed by it, in order.
    /// The last segment after the final `\n` is never returned here.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };

        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        complete[..last_newline]
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    /// The retained, possibly incomplete, tail.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

/// Classification of one complete line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// Not a data line (blank keep-alive, comment, other field).
    Ignored,
    /// The `[DONE]` sentinel.
    Done,
    /// A data payload, prefix stripped and trimmed.
    Data(&'a str),
}

pub fn classify_line(line: &str) -> SseLine<'_> {
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Ignored;
    };
    let payload = rest.trim();
    if payload == DONE_SENTINEL {
        SseLine::Done
    } else {
        SseLine::Data(payload)
    }
}

/// Reads raw chunks and yields the data payloads of complete lines.
///
/// Shared by the browser client and by the server when it consumes an
/// upstream provider's event stream.
#[derive(Debug, Default)]
pub struct SseLineReader {
    decoder: Utf8StreamDecoder,
    lines: LineBuffer,
    done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsePayload {
    Data(String),
    Done,
}

impl SseLineReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SsePayload> {
        if self.done {
            return Vec::new();
        }

        let text = self.decoder.decode(chunk);
        let mut out = Vec::new();
        for line in self.lines.push(&text) {
            match classify_line(&line) {
                SseLine::Ignored => {}
                SseLine::Done => {
                    self.done = true;
                    out.push(SsePayload::Done);
                    break;
                }
                SseLine::Data(payload) => out.push(SsePayload::Data(payload.to_string())),
            }
        }
        out
    }

    /// True once `[DONE]` has been seen; later input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn pending(&self) -> &str {
        self.lines.pending()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    Frame(StreamFrame),
    Done,
}

/// Turns raw chunks of a generation stream into frames.
#[derive(Debug, Default)]
pub struct FrameParser {
    reader: SseLineReader,
    skipped: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<ParsedRecord> {
        let mut records = Vec::new();
        for payload in self.reader.push(chunk) {
            match payload {
                SsePayload::Done => records.push(ParsedRecord::Done),
                SsePayload::Data(data) => match serde_json::from_str::<StreamFrame>(&data) {
                    Ok(frame) => records.push(ParsedRecord::Frame(frame)),
                    Err(e) => {
                        self.skipped += 1;
                        debug!("Skipping malformed frame ({e}): {data}");
                    }
                },
            }
        }
        records
    }

    pub fn is_done(&self) -> bool {
        self.reader.is_done()
    }

    /// Number of data lines dropped because they did not parse as frames.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn pending(&self) -> &str {
        self.reader.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{done_record, FrameKind};

    fn sample_stream() -> String {
        let mut wire = String::new();
        wire.push_str(&StreamFrame::status("Fetching").to_record().unwrap());
        wire.push_str(&StreamFrame::thought("Looking at café repos ☕").to_record().unwrap());
        wire.push_str(&StreamFrame::text("Héllo ").to_record().unwrap());
        wire.push_str(&StreamFrame::text("wörld 🌍").to_record().unwrap());
        wire.push_str(&done_record());
        wire
    }

    fn parse_in_chunks(bytes: &[u8], sizes: &[usize]) -> Vec<ParsedRecord> {
        let mut parser = FrameParser::new();
        let mut records = Vec::new();
        let mut offset = 0;
        let mut i = 0;
        while offset < bytes.len() {
            let size = sizes[i % sizes.len()].max(1);
            let end = (offset + size).min(bytes.len());
            records.extend(parser.push(&bytes[offset..end]));
            offset = end;
            i += 1;
        }
        records
    }

    #[test]
    fn chunk_boundaries_do_not_change_frames() {
        let wire = sample_stream();
        let bytes = wire.as_bytes();
        let whole = parse_in_chunks(bytes, &[bytes.len()]);
        assert_eq!(whole.len(), 5);
        assert_eq!(whole.last(), Some(&ParsedRecord::Done));

        for sizes in [&[1][..], &[2], &[3, 7], &[5, 1, 13], &[64]] {
            assert_eq!(parse_in_chunks(bytes, sizes), whole, "chunk sizes {sizes:?}");
        }
    }

    #[test]
    fn every_split_point_yields_same_frames() {
        let wire = sample_stream();
        let bytes = wire.as_bytes();
        let whole = parse_in_chunks(bytes, &[bytes.len()]);
        for split in 1..bytes.len() {
            let mut parser = FrameParser::new();
            let mut records = parser.push(&bytes[..split]);
            records.extend(parser.push(&bytes[split..]));
            assert_eq!(records, whole, "split at byte {split}");
        }
    }

    #[test]
    fn decoder_carries_partial_multibyte_sequences() {
        let bytes = "é🌍".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(out, "é🌍");
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn retained_tail_never_holds_a_complete_line() {
        let wire = sample_stream();
        let mut lines = LineBuffer::new();
        for chunk in wire.as_bytes().chunks(3) {
            let text = String::from_utf8_lossy(chunk).into_owned();
            for line in lines.push(&text) {
                assert!(!line.contains('\n'));
            }
            assert!(!lines.pending().contains('\n'));
        }
    }

    #[test]
    fn unterminated_line_is_held_back() {
        let mut lines = LineBuffer::new();
        assert!(lines.push("data: {\"type\":\"te").is_empty());
        assert_eq!(lines.pending(), "data: {\"type\":\"te");
        let done = lines.push("xt\",\"content\":\"a\"}\n");
        assert_eq!(done, vec!["data: {\"type\":\"text\",\"content\":\"a\"}".to_string()]);
        assert_eq!(lines.pending(), "");
    }

    #[test]
    fn done_sentinel_stops_parsing() {
        let mut parser = FrameParser::new();
        let wire = format!(
            "data: [DONE]\n\n{}",
            StreamFrame::text("after").to_record().unwrap()
        );
        assert_eq!(parser.push(wire.as_bytes()), vec![ParsedRecord::Done]);
        assert!(parser.is_done());
        assert!(parser.push(b"data: {\"type\":\"text\",\"content\":\"x\"}\n").is_empty());
        assert_eq!(parser.skipped(), 0);
    }

    #[test]
    fn done_sentinel_with_surrounding_whitespace() {
        assert_eq!(classify_line("data:  [DONE] \r"), SseLine::Done);
    }

    #[test]
    fn malformed_frames_are_skipped() {
        let mut parser = FrameParser::new();
        let wire = format!(
            "{}data: {{not json\n\ndata: {{\"type\":\"text\",\"content\":7}}\n\n{}",
            StreamFrame::text("a").to_record().unwrap(),
            StreamFrame::text("b").to_record().unwrap(),
        );
        let records = parser.push(wire.as_bytes());
        assert_eq!(
            records,
            vec![
                ParsedRecord::Frame(StreamFrame::text("a")),
                ParsedRecord::Frame(StreamFrame::text("b")),
            ]
        );
        assert_eq!(parser.skipped(), 2);
    }

    #[test]
    fn keep_alive_and_other_fields_are_ignored() {
        let mut parser = FrameParser::new();
        let wire = ":\n\nevent: ping\nid: 4\n\ndata: {\"type\":\"status\",\"content\":\"ok\"}\n\n";
        let records = parser.push(wire.as_bytes());
        assert_eq!(records.len(), 1);
        assert!(matches!(&records[0], ParsedRecord::Frame(f) if f.kind == FrameKind::Status));
    }
}
